//! Opcode definitions and the per-opcode encoding table.
//!
//! Each non-pseudo opcode maps to an [`Encoding`] whose flag bits describe
//! which operand slots are register defs/uses and what kind of instruction
//! it is. [`build::setup_resource_masks`](super::build::setup_resource_masks)
//! turns those flags plus the concrete operands into resource masks.

// ── Encoding flag bits ───────────────────────────────────────────────────────

/// operands[0] is written.
pub const REG_DEF0: u32 = 1 << 0;
/// operands[0] is read.
pub const REG_USE0: u32 = 1 << 1;
/// operands[1] is read.
pub const REG_USE1: u32 = 1 << 2;
/// operands[2] is read.
pub const REG_USE2: u32 = 1 << 3;
/// Reads the program counter (pc-relative addressing).
pub const REG_USE_PC: u32 = 1 << 4;
pub const IS_LOAD: u32 = 1 << 5;
pub const IS_STORE: u32 = 1 << 6;
pub const IS_BRANCH: u32 = 1 << 7;
pub const SETS_CCODES: u32 = 1 << 8;
pub const USES_CCODES: u32 = 1 << 9;
/// Full scheduling barrier: nothing may be reordered across it.
pub const IS_BARRIER: u32 = 1 << 10;

// ── Barrel-shifter encodings ─────────────────────────────────────────────────

/// Logical shift left, as encoded in operands[3] of a shifted add.
pub const SHIFT_LSL: i32 = 0;
/// Logical shift right.
pub const SHIFT_LSR: i32 = 1;

// ── Opcodes ──────────────────────────────────────────────────────────────────

/// The ARMv7/Thumb-2 instruction subset the trace backend emits.
///
/// `Label` is a pseudo opcode: it marks a position in the list (trace
/// entry, branch target) and never becomes a machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Pseudo: block label / sentinel. Scheduling barrier.
    Label,

    /// ldr rd, [rn, #imm]
    LdrRRI12,
    /// str rt, [rn, #imm]
    StrRRI12,
    /// ldrb rd, [rn, #imm]
    LdrbRRI12,
    /// strb rt, [rn, #imm]
    StrbRRI12,
    /// ldr rd, [rn, rm]
    LdrRRR,
    /// str rt, [rn, rm]
    StrRRR,
    /// ldr rd, [pc, #imm] - constant-pool load
    LdrPcRel,
    /// vldr sd, [rn, #imm]
    VldrS,
    /// vldr dd, [rn, #imm]
    VldrD,
    /// vstr st, [rn, #imm]
    VstrS,
    /// vstr dt, [rn, #imm]
    VstrD,

    /// mov rd, rm
    MovRR,
    /// mov rd, #imm
    MovImm,
    /// vmov.f32 sd, sm
    VmovS,
    /// vmov.f64 dd, dm
    VmovD,

    /// add rd, rn, rm - operands[3] holds the optional shift encoding
    AddRRR,
    /// lsl rd, rm, #imm5
    LslRRI5,
    /// lsr rd, rm, #imm5
    LsrRRI5,
    /// cmp rn, rm
    CmpRR,

    /// vmul.f64 dd, dn, dm
    Vmuld,
    /// vadd.f64 dd, dn, dm
    Vaddd,
    /// vmla.f64 dd, dn, dm - dd += dn * dm
    Vmlad,

    /// b target
    B,
    /// b<cond> target
    BCond,
    /// dmb - data memory barrier
    Dmb,
}

/// Static description of one opcode.
pub struct Encoding {
    pub name: &'static str,
    pub flags: u32,
}

impl Opcode {
    /// Pseudo opcodes carry annotations, not machine instructions; the
    /// optimizer never pattern-matches them.
    #[inline]
    pub fn is_pseudo(self) -> bool {
        matches!(self, Opcode::Label)
    }

    /// Encoding-table lookup. Valid for pseudo opcodes too (flags are 0).
    pub fn encoding(self) -> Encoding {
        use Opcode::*;
        let (name, flags) = match self {
            Label => ("label", 0),

            LdrRRI12 => ("ldr", IS_LOAD | REG_DEF0 | REG_USE1),
            StrRRI12 => ("str", IS_STORE | REG_USE0 | REG_USE1),
            LdrbRRI12 => ("ldrb", IS_LOAD | REG_DEF0 | REG_USE1),
            StrbRRI12 => ("strb", IS_STORE | REG_USE0 | REG_USE1),
            LdrRRR => ("ldr", IS_LOAD | REG_DEF0 | REG_USE1 | REG_USE2),
            StrRRR => ("str", IS_STORE | REG_USE0 | REG_USE1 | REG_USE2),
            LdrPcRel => ("ldr", IS_LOAD | REG_DEF0 | REG_USE_PC),
            VldrS => ("vldr", IS_LOAD | REG_DEF0 | REG_USE1),
            VldrD => ("vldr", IS_LOAD | REG_DEF0 | REG_USE1),
            VstrS => ("vstr", IS_STORE | REG_USE0 | REG_USE1),
            VstrD => ("vstr", IS_STORE | REG_USE0 | REG_USE1),

            MovRR => ("mov", REG_DEF0 | REG_USE1),
            MovImm => ("mov", REG_DEF0),
            VmovS => ("vmov", REG_DEF0 | REG_USE1),
            VmovD => ("vmov", REG_DEF0 | REG_USE1),

            AddRRR => ("add", REG_DEF0 | REG_USE1 | REG_USE2),
            LslRRI5 => ("lsl", REG_DEF0 | REG_USE1),
            LsrRRI5 => ("lsr", REG_DEF0 | REG_USE1),
            CmpRR => ("cmp", REG_USE0 | REG_USE1 | SETS_CCODES),

            Vmuld => ("vmul.f64", REG_DEF0 | REG_USE1 | REG_USE2),
            Vaddd => ("vadd.f64", REG_DEF0 | REG_USE1 | REG_USE2),
            Vmlad => ("vmla.f64", REG_DEF0 | REG_USE0 | REG_USE1 | REG_USE2),

            B => ("b", IS_BRANCH),
            BCond => ("b<cond>", IS_BRANCH | USES_CCODES),
            Dmb => ("dmb", IS_BARRIER),
        };
        Encoding { name, flags }
    }

    /// Shorthand for `self.encoding().flags`.
    #[inline]
    pub fn flags(self) -> u32 {
        self.encoding().flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_store_classification() {
        assert!(Opcode::LdrRRI12.flags() & IS_LOAD != 0);
        assert!(Opcode::LdrbRRI12.flags() & IS_LOAD != 0);
        assert!(Opcode::VstrD.flags() & IS_STORE != 0);
        assert!(Opcode::StrbRRI12.flags() & IS_STORE != 0);
        assert!(Opcode::AddRRR.flags() & (IS_LOAD | IS_STORE) == 0);
        assert!(Opcode::LdrPcRel.flags() & REG_USE_PC != 0);
    }

    #[test]
    fn test_pseudo_predicate() {
        assert!(Opcode::Label.is_pseudo());
        assert!(!Opcode::MovRR.is_pseudo());
        assert_eq!(Opcode::Label.flags(), 0);
    }

    #[test]
    fn test_accumulator_reads_its_destination() {
        // vmla reads the accumulator it writes; vadd does not.
        assert!(Opcode::Vmlad.flags() & REG_USE0 != 0);
        assert!(Opcode::Vaddd.flags() & REG_USE0 == 0);
    }
}
