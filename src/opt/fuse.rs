//! Adjacent-pair fusers: fold a shift into the barrel shifter of a
//! following add, and a double multiply into a following accumulating add.
//!
//! Both patterns are structural: the second instruction must be the next
//! live one and must directly consume the first's destination, so no
//! resource-mask dependence analysis is needed.

use crate::lir::build::setup_resource_masks;
use crate::lir::encoding::{Opcode, SHIFT_LSL, SHIFT_LSR};
use crate::lir::{CompilationUnit, LirId};

/// Next non-nop, non-pseudo instruction after `id`, or `tail`.
fn next_real_insn(unit: &CompilationUnit, id: LirId, tail: LirId) -> LirId {
    let mut next_id = unit.next_id(id);
    while next_id != tail {
        let next = unit.insn(next_id);
        if !next.is_nop() && !next.opcode.is_pseudo() {
            break;
        }
        next_id = unit.next_id(next_id);
    }
    next_id
}

/// Fold `lsl/lsr rX, rM, #imm` followed by `add rD, rN, rX` into a single
/// add with a shifted operand. Returns the number of pairs fused.
///
/// All four operand arrangements of the add are handled:
///
/// ```text
///   lsl rX, rM, #i          lsl rX, rM, #i
///   add rD, rN, rX          add rD, rX, rN
///   add rD, rM, rX          add rD, rX, rM
/// ```
///
/// becoming `add rD, rN|rM, rM, lsl #i` - the shifted register always goes
/// in the second source slot.
pub(crate) fn apply_shift_arithmetic(unit: &mut CompilationUnit, head: LirId, tail: LirId) -> usize {
    let mut fused = 0;

    let mut this_id = head;
    while this_id != tail {
        let this = unit.insn(this_id);

        if this.is_nop() || !matches!(this.opcode, Opcode::LslRRI5 | Opcode::LsrRRI5) {
            this_id = unit.next_id(this_id);
            continue;
        }

        let shift_dest = this.operands[0];
        let shift_src = this.operands[1];
        let shift_amount = this.operands[2];
        let shift_type = if this.opcode == Opcode::LsrRRI5 {
            SHIFT_LSR
        } else {
            SHIFT_LSL
        };

        let next_id = next_real_insn(unit, this_id, tail);
        if next_id == tail {
            return fused;
        }

        let next = unit.insn(next_id);
        if next.opcode == Opcode::AddRRR
            && next.operands[3] == 0
            && (next.operands[1] == shift_dest || next.operands[2] == shift_dest)
        {
            let r_dest = next.operands[0];
            // Keep the add's other source; when the shift result sits in
            // the first slot, the plain source moves over, since the
            // shifted register has to be the second.
            let r_src1 = if next.operands[1] == shift_dest {
                next.operands[2]
            } else {
                next.operands[1]
            };
            let r_src2 = shift_src;
            let shift = ((shift_amount & 0x1f) << 2) | shift_type;

            let new_id = unit.new_insn(Opcode::AddRRR);
            let new_insn = unit.insn_mut(new_id);
            new_insn.operands = [r_dest, r_src1, r_src2, shift];
            setup_resource_masks(new_insn);
            unit.insert_before(next_id, new_id);

            unit.insn_mut(this_id).mark_nop();
            unit.insn_mut(next_id).mark_nop();
            fused += 1;

            // Continue directly after the pair instead of walking the
            // nops just created.
            this_id = next_id;
        }

        this_id = unit.next_id(this_id);
    }

    fused
}

/// Fold `vmul.f64 dX, dN, dM` followed by `vadd.f64 dD, dD, dX` into
/// `vmla.f64 dD, dN, dM`. Returns the number of pairs fused.
pub(crate) fn apply_multiply_arithmetic(
    unit: &mut CompilationUnit,
    head: LirId,
    tail: LirId,
) -> usize {
    let mut fused = 0;

    let mut this_id = head;
    while this_id != tail {
        let this = unit.insn(this_id);

        if this.is_nop() || this.opcode != Opcode::Vmuld {
            this_id = unit.next_id(this_id);
            continue;
        }

        let mul_dest = this.operands[0];
        let mul_lhs = this.operands[1];
        let mul_rhs = this.operands[2];

        let next_id = next_real_insn(unit, this_id, tail);
        if next_id == tail {
            return fused;
        }

        let next = unit.insn(next_id);
        // Accumulator form only: the add reads and writes the same
        // register, and its addend is the multiply's result.
        if next.opcode == Opcode::Vaddd
            && next.operands[0] == next.operands[1]
            && next.operands[2] == mul_dest
        {
            let acc = next.operands[0];

            let new_id = unit.new_insn(Opcode::Vmlad);
            let new_insn = unit.insn_mut(new_id);
            new_insn.operands = [acc, mul_lhs, mul_rhs, 0];
            setup_resource_masks(new_insn);
            unit.insert_before(next_id, new_id);

            unit.insn_mut(this_id).mark_nop();
            unit.insn_mut(next_id).mark_nop();
            fused += 1;

            this_id = next_id;
        }

        this_id = unit.next_id(this_id);
    }

    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lir::build::append_insn;
    use crate::lir::masks::{dreg, reg_bits};

    fn shift_run(unit: &mut CompilationUnit) -> usize {
        let (head, tail) = (unit.head(), unit.tail());
        apply_shift_arithmetic(unit, head, tail)
    }

    fn mul_run(unit: &mut CompilationUnit) -> usize {
        let (head, tail) = (unit.head(), unit.tail());
        apply_multiply_arithmetic(unit, head, tail)
    }

    /// Non-nop instructions between the sentinels, in order.
    fn live(unit: &CompilationUnit) -> Vec<(Opcode, [i32; 4])> {
        let mut out = Vec::new();
        let mut cur = unit.next_id(unit.head());
        while cur != unit.tail() {
            let insn = unit.insn(cur);
            if !insn.is_nop() {
                out.push((insn.opcode, insn.operands));
            }
            cur = unit.next_id(cur);
        }
        out
    }

    #[test]
    fn test_lsl_add_fuses_into_shifted_add() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 2, 9, 0]);
        assert_eq!(shift_run(&mut unit), 1);
        let live = live(&unit);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, Opcode::AddRRR);
        assert_eq!(live[0].1, [0, 2, 1, (3 << 2) | SHIFT_LSL]);
    }

    #[test]
    fn test_lsr_sets_shift_type_bit() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LsrRRI5, [9, 1, 7, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 2, 9, 0]);
        assert_eq!(shift_run(&mut unit), 1);
        assert_eq!(live(&unit)[0].1[3], (7 << 2) | SHIFT_LSR);
    }

    #[test]
    fn test_swapped_add_sources_fuse() {
        // add rD, rX, rN: the plain source moves to the first slot.
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 9, 2, 0]);
        assert_eq!(shift_run(&mut unit), 1);
        assert_eq!(live(&unit)[0].1, [0, 2, 1, (3 << 2) | SHIFT_LSL]);
    }

    #[test]
    fn test_shifted_and_unshifted_same_source_fuse() {
        // r1 + (r1 << 3), in both operand orders.
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 1, 9, 0]);
        assert_eq!(shift_run(&mut unit), 1);
        assert_eq!(live(&unit)[0].1, [0, 1, 1, (3 << 2) | SHIFT_LSL]);

        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 9, 1, 0]);
        assert_eq!(shift_run(&mut unit), 1);
        assert_eq!(live(&unit)[0].1, [0, 1, 1, (3 << 2) | SHIFT_LSL]);
    }

    #[test]
    fn test_already_shifted_add_does_not_fuse() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 2, 9, SHIFT_LSL | (1 << 2)]);
        assert_eq!(shift_run(&mut unit), 0);
        assert_eq!(live(&unit).len(), 2);
    }

    #[test]
    fn test_unrelated_add_does_not_fuse() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 2, 4, 0]);
        assert_eq!(shift_run(&mut unit), 0);
    }

    #[test]
    fn test_intervening_instruction_blocks_shift_fusion() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        append_insn(&mut unit, Opcode::MovImm, [6, 0, 0, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 2, 9, 0]);
        assert_eq!(shift_run(&mut unit), 0);
    }

    #[test]
    fn test_nops_between_pair_are_skipped() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        let filler = append_insn(&mut unit, Opcode::MovImm, [6, 0, 0, 0]);
        unit.insn_mut(filler).mark_nop();
        append_insn(&mut unit, Opcode::AddRRR, [0, 2, 9, 0]);
        assert_eq!(shift_run(&mut unit), 1);
        assert_eq!(live(&unit).len(), 1);
    }

    #[test]
    fn test_fused_add_has_fresh_masks() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 2, 9, 0]);
        shift_run(&mut unit);
        // Find the synthesized add and check its masks name r1/r2, not r9.
        let mut cur = unit.next_id(unit.head());
        while cur != unit.tail() {
            let insn = unit.insn(cur);
            if !insn.is_nop() {
                assert_eq!(insn.def_mask, reg_bits(0));
                assert_eq!(insn.use_mask, reg_bits(2) | reg_bits(1));
            }
            cur = unit.next_id(cur);
        }
    }

    #[test]
    fn test_vmul_vadd_fuses_into_vmla() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::Vmuld, [dreg(9), dreg(9), dreg(10), 0]);
        append_insn(&mut unit, Opcode::Vaddd, [dreg(8), dreg(8), dreg(9), 0]);
        assert_eq!(mul_run(&mut unit), 1);
        let live = live(&unit);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, Opcode::Vmlad);
        assert_eq!(live[0].1, [dreg(8), dreg(9), dreg(10), 0]);
    }

    #[test]
    fn test_non_accumulator_add_does_not_fuse() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::Vmuld, [dreg(9), dreg(9), dreg(10), 0]);
        append_insn(&mut unit, Opcode::Vaddd, [dreg(8), dreg(7), dreg(9), 0]);
        assert_eq!(mul_run(&mut unit), 0);
        assert_eq!(live(&unit).len(), 2);
    }

    #[test]
    fn test_unrelated_addend_does_not_fuse() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::Vmuld, [dreg(9), dreg(9), dreg(10), 0]);
        append_insn(&mut unit, Opcode::Vaddd, [dreg(8), dreg(8), dreg(11), 0]);
        assert_eq!(mul_run(&mut unit), 0);
    }

    #[test]
    fn test_two_pairs_fuse_in_one_pass() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::Vmuld, [dreg(9), dreg(9), dreg(10), 0]);
        append_insn(&mut unit, Opcode::Vaddd, [dreg(8), dreg(8), dreg(9), 0]);
        append_insn(&mut unit, Opcode::Vmuld, [dreg(3), dreg(4), dreg(5), 0]);
        append_insn(&mut unit, Opcode::Vaddd, [dreg(2), dreg(2), dreg(3), 0]);
        assert_eq!(mul_run(&mut unit), 2);
        let ops: Vec<Opcode> = live(&unit).iter().map(|(op, _)| *op).collect();
        assert_eq!(ops, vec![Opcode::Vmlad, Opcode::Vmlad]);
    }

    #[test]
    fn test_fusion_is_idempotent() {
        let mut unit = CompilationUnit::new();
        append_insn(&mut unit, Opcode::LslRRI5, [9, 1, 3, 0]);
        append_insn(&mut unit, Opcode::AddRRR, [0, 2, 9, 0]);
        append_insn(&mut unit, Opcode::Vmuld, [dreg(9), dreg(9), dreg(10), 0]);
        append_insn(&mut unit, Opcode::Vaddd, [dreg(8), dreg(8), dreg(9), 0]);
        shift_run(&mut unit);
        mul_run(&mut unit);
        let after_one = live(&unit);
        assert_eq!(shift_run(&mut unit), 0);
        assert_eq!(mul_run(&mut unit), 0);
        assert_eq!(live(&unit), after_one);
    }
}
