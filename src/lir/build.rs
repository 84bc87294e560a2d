//! Construction helpers for LIR instructions.
//!
//! Code selection and the optimizer both synthesize instructions through
//! these helpers so that resource masks are always consistent with the
//! encoding table before any scan inspects them.

use super::encoding::{
    Opcode, IS_BARRIER, IS_BRANCH, IS_LOAD, IS_STORE, REG_DEF0, REG_USE0, REG_USE1, REG_USE2,
    REG_USE_PC, SETS_CCODES, USES_CCODES,
};
use super::masks::{
    reg_bits, reg_type, ENCODE_ALL, ENCODE_CCODE, ENCODE_HEAP_REF, ENCODE_LITERAL, ENCODE_MEM,
    ENCODE_REG_PC, ENCODE_VREG, FP_DOUBLE, FP_REG, REG_FP,
};
use super::{CompilationUnit, LirId, LirInsn};

/// Derive `use_mask`/`def_mask` from the encoding table and the concrete
/// operands. Loads and stores are given the conservative heap region by
/// default; [`annotate_vreg_access`] and [`set_mem_ref_type`] retarget the
/// region bit for accesses the optimizer can disambiguate.
pub fn setup_resource_masks(insn: &mut LirInsn) {
    insn.use_mask = 0;
    insn.def_mask = 0;

    if insn.opcode.is_pseudo() {
        // All labels are scheduling barriers.
        insn.def_mask = ENCODE_ALL;
        return;
    }

    let flags = insn.opcode.flags();
    if flags & IS_BARRIER != 0 {
        insn.def_mask = ENCODE_ALL;
        return;
    }

    if flags & REG_DEF0 != 0 {
        insn.def_mask |= reg_bits(insn.operands[0]);
    }
    if flags & REG_USE0 != 0 {
        insn.use_mask |= reg_bits(insn.operands[0]);
    }
    if flags & REG_USE1 != 0 {
        insn.use_mask |= reg_bits(insn.operands[1]);
    }
    if flags & REG_USE2 != 0 {
        insn.use_mask |= reg_bits(insn.operands[2]);
    }
    if flags & REG_USE_PC != 0 {
        insn.use_mask |= ENCODE_REG_PC;
    }
    if flags & IS_BRANCH != 0 {
        insn.use_mask |= ENCODE_REG_PC;
        insn.def_mask |= ENCODE_REG_PC;
    }
    if flags & SETS_CCODES != 0 {
        insn.def_mask |= ENCODE_CCODE;
    }
    if flags & USES_CCODES != 0 {
        insn.use_mask |= ENCODE_CCODE;
    }
    if flags & IS_LOAD != 0 {
        insn.use_mask |= ENCODE_HEAP_REF;
    }
    if flags & IS_STORE != 0 {
        insn.def_mask |= ENCODE_HEAP_REF;
    }
}

/// Retarget the memory-region bit of a load (use side) or store (def side).
pub fn set_mem_ref_type(insn: &mut LirInsn, is_load: bool, region: u64) {
    debug_assert!(
        region & ENCODE_MEM == region && region.count_ones() == 1,
        "not a single memory-region bit: {:#x}",
        region
    );
    let mask = if is_load {
        &mut insn.use_mask
    } else {
        &mut insn.def_mask
    };
    *mask = (*mask & !ENCODE_MEM) | region;
}

/// Mark a load/store as a spill-frame access to `vreg` (and `vreg + 1`
/// when wide), recording the slot identity for alias analysis.
pub fn annotate_vreg_access(insn: &mut LirInsn, vreg: u16, wide: bool, is_load: bool) {
    set_mem_ref_type(insn, is_load, ENCODE_VREG);
    insn.alias_info = super::masks::encode_alias_info(vreg, wide);
}

/// Build (without inserting) a register-to-register copy matching the
/// operands' register class.
pub fn reg_copy_no_insert(unit: &mut CompilationUnit, dest: i32, src: i32) -> LirId {
    debug_assert_eq!(
        reg_type(dest),
        reg_type(src),
        "copy between register classes"
    );
    let opcode = if dest & FP_DOUBLE != 0 {
        Opcode::VmovD
    } else if dest & FP_REG != 0 {
        Opcode::VmovS
    } else {
        Opcode::MovRR
    };
    let id = unit.new_insn(opcode);
    let insn = unit.insn_mut(id);
    insn.operands[0] = dest;
    insn.operands[1] = src;
    setup_resource_masks(insn);
    id
}

/// Build an instruction with masks set and append it before the tail
/// sentinel.
pub fn append_insn(unit: &mut CompilationUnit, opcode: Opcode, operands: [i32; 4]) -> LirId {
    let id = unit.new_insn(opcode);
    let insn = unit.insn_mut(id);
    insn.operands = operands;
    setup_resource_masks(insn);
    let tail = unit.tail();
    unit.insert_before(tail, id);
    id
}

/// Append a load of `vreg`'s spill slot. The destination's register class
/// selects the opcode; a double destination reads the wide slot pair.
pub fn load_vreg(unit: &mut CompilationUnit, dest: i32, vreg: u16) -> LirId {
    let wide = dest & FP_DOUBLE != 0;
    let opcode = if wide {
        Opcode::VldrD
    } else if dest & FP_REG != 0 {
        Opcode::VldrS
    } else {
        Opcode::LdrRRI12
    };
    let id = append_insn(unit, opcode, [dest, REG_FP, vreg as i32 * 4, 0]);
    annotate_vreg_access(unit.insn_mut(id), vreg, wide, true);
    id
}

/// Append a store of `src` to `vreg`'s spill slot.
pub fn store_vreg(unit: &mut CompilationUnit, src: i32, vreg: u16) -> LirId {
    let wide = src & FP_DOUBLE != 0;
    let opcode = if wide {
        Opcode::VstrD
    } else if src & FP_REG != 0 {
        Opcode::VstrS
    } else {
        Opcode::StrRRI12
    };
    let id = append_insn(unit, opcode, [src, REG_FP, vreg as i32 * 4, 0]);
    annotate_vreg_access(unit.insn_mut(id), vreg, wide, false);
    id
}

/// Append a pc-relative load from the constant pool at `offset`.
pub fn load_literal(unit: &mut CompilationUnit, dest: i32, offset: i32) -> LirId {
    let id = append_insn(unit, Opcode::LdrPcRel, [dest, offset, 0, 0]);
    let insn = unit.insn_mut(id);
    set_mem_ref_type(insn, true, ENCODE_LITERAL);
    insn.alias_info = offset as u32;
    id
}
