//! Resource masks and alias information.
//!
//! Every instruction advertises the machine resources it reads and writes
//! as bits of a 64-bit mask: core registers in bits 0-15, VFP singles in
//! 16-47, the condition flags at 48, and the three memory regions in the
//! bits above, so the register-only dependence check can strip memory with
//! a single AND. A saturated def mask ([`ENCODE_ALL`]) marks a scheduling
//! barrier.
//!
//! Memory is split into three disjoint regions:
//! - [`ENCODE_VREG`]: the spill frame, one slot per bytecode virtual
//!   register. `alias_info` identifies the exact slot, so accesses can be
//!   fully disambiguated.
//! - [`ENCODE_LITERAL`]: the constant pool. Read-only; `alias_info` holds
//!   the pool offset.
//! - [`ENCODE_HEAP_REF`]: everything else. Never disambiguated; any two
//!   heap accesses may alias.

use super::LirInsn;

// ── Register operand encoding ────────────────────────────────────────────────

/// Operand flag: VFP single-precision register (s0-s31).
pub const FP_REG: i32 = 0x20;
/// Operand flag: double-precision pair; the operand carries the even
/// s-number of the pair (d4 is `FP_DOUBLE | FP_REG | 8`).
pub const FP_DOUBLE: i32 = 0x40;
const REG_NUM_MASK: i32 = 0x1f;

/// r15, the program counter.
pub const REG_PC: i32 = 15;
/// r5, the spill-frame base register.
pub const REG_FP: i32 = 5;

/// Single-precision VFP register operand.
#[inline]
pub fn sreg(n: i32) -> i32 {
    FP_REG | n
}

/// Double-precision VFP register operand.
#[inline]
pub fn dreg(n: i32) -> i32 {
    FP_DOUBLE | FP_REG | (2 * n)
}

/// Register class of an operand. Forwarding a value between two memory
/// operations requires identical classes (core, single, double).
#[inline]
pub fn reg_type(reg: i32) -> i32 {
    reg & (FP_REG | FP_DOUBLE)
}

// ── Resource bits ────────────────────────────────────────────────────────────

pub const ENCODE_REG_PC: u64 = 1 << REG_PC;
/// Condition flags.
pub const ENCODE_CCODE: u64 = 1 << 48;
/// Spill-frame slot of a bytecode virtual register.
pub const ENCODE_VREG: u64 = 1 << 49;
/// Constant-pool entry.
pub const ENCODE_LITERAL: u64 = 1 << 50;
/// General memory; always may-alias.
pub const ENCODE_HEAP_REF: u64 = 1 << 51;
/// All memory regions.
pub const ENCODE_MEM: u64 = ENCODE_VREG | ENCODE_LITERAL | ENCODE_HEAP_REF;
/// Every resource; a def mask of this value is a scheduling barrier.
pub const ENCODE_ALL: u64 = !0;

/// Resource bits occupied by one register operand. A double takes both
/// bits of its s-register pair.
pub fn reg_bits(reg: i32) -> u64 {
    let n = (reg & REG_NUM_MASK) as u64;
    if reg & FP_DOUBLE != 0 {
        0b11 << (16 + n)
    } else if reg & FP_REG != 0 {
        1 << (16 + n)
    } else {
        debug_assert!(n <= 15, "core register out of range: {}", reg);
        1 << n
    }
}

// ── Dependence check ─────────────────────────────────────────────────────────

/// RAW/WAR/WAW check between a pivot's (use, def) masks and a later
/// instruction. Callers strip [`ENCODE_MEM`] from the pivot's masks first;
/// memory dependence is decided separately via alias info.
#[inline]
pub fn check_reg_dep(stop_use: u64, stop_def: u64, check: &LirInsn) -> bool {
    (stop_def & check.use_mask) != 0 || ((stop_use | stop_def) & check.def_mask) != 0
}

// ── Alias info ───────────────────────────────────────────────────────────────

/// Wide (64-bit) access flag in `alias_info`.
pub const ALIAS_WIDE: u32 = 1 << 31;

/// Pack a spill-slot identity: slot number plus a wide bit for accesses
/// covering the slot pair (vreg, vreg+1).
#[inline]
pub fn encode_alias_info(vreg: u16, wide: bool) -> u32 {
    vreg as u32 | if wide { ALIAS_WIDE } else { 0 }
}

#[inline]
pub fn alias_reg(info: u32) -> i32 {
    (info & 0xffff) as i32
}

#[inline]
pub fn alias_wide(info: u32) -> i32 {
    if info & ALIAS_WIDE != 0 {
        1
    } else {
        0
    }
}

/// True iff two spill-frame accesses with different `alias_info` still
/// touch a common slot (wide/narrow overlap).
pub fn vreg_clobbered(info1: u32, info2: u32) -> bool {
    let reg1_lo = alias_reg(info1);
    let reg1_hi = reg1_lo + alias_wide(info1);
    let reg2_lo = alias_reg(info2);
    let reg2_hi = reg2_lo + alias_wide(info2);

    reg1_lo == reg2_lo || reg1_lo == reg2_hi || reg1_hi == reg2_lo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg_bits_core_and_fp() {
        assert_eq!(reg_bits(0), 1);
        assert_eq!(reg_bits(REG_PC), ENCODE_REG_PC);
        assert_eq!(reg_bits(sreg(0)), 1 << 16);
        assert_eq!(reg_bits(sreg(31)), 1 << 47);
        // d4 covers s8 and s9.
        assert_eq!(reg_bits(dreg(4)), 0b11 << 24);
    }

    #[test]
    fn test_reg_type_classes_are_distinct() {
        assert_eq!(reg_type(3), reg_type(12));
        assert_ne!(reg_type(3), reg_type(sreg(3)));
        assert_ne!(reg_type(sreg(3)), reg_type(dreg(3)));
    }

    #[test]
    fn test_alias_info_round_trip() {
        let info = encode_alias_info(17, true);
        assert_eq!(alias_reg(info), 17);
        assert_eq!(alias_wide(info), 1);
        assert_eq!(alias_wide(encode_alias_info(17, false)), 0);
    }

    #[test]
    fn test_vreg_clobbered_wide_narrow_overlap() {
        let wide6 = encode_alias_info(6, true); // slots 6,7
        let narrow7 = encode_alias_info(7, false);
        let narrow8 = encode_alias_info(8, false);
        assert!(vreg_clobbered(wide6, narrow7));
        assert!(vreg_clobbered(narrow7, wide6));
        assert!(!vreg_clobbered(wide6, narrow8));
        assert!(!vreg_clobbered(narrow7, narrow8));
    }
}
