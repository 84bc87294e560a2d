//! Load hoisting: move loads to earlier slots so independent work hides
//! their latency.
//!
//! One forward pass over the superblock. For each load, a backward walk
//! collects the instructions it could be hoisted past, stopping at the
//! first memory or register dependence (or the head sentinel, which like
//! every label is a barrier). A second, descending scan over the collected
//! window then picks the slot: right below a barrier, into an existing
//! load-use stall, or just far enough above the original position to cover
//! the load latency.

use crate::lir::encoding::IS_LOAD;
use crate::lir::masks::{
    check_reg_dep, vreg_clobbered, ENCODE_ALL, ENCODE_HEAP_REF, ENCODE_MEM, ENCODE_REG_PC,
    ENCODE_VREG,
};
use crate::lir::{CompilationUnit, LirId};

/// Upper bound on how many earlier instructions one load is walked past.
const MAX_HOIST_DISTANCE: usize = 20;
/// Slots reserved below a load-dependence anchor: two back-to-back loads
/// need this many cycles between them.
const LDLD_DISTANCE: isize = 4;
/// Hoisting fewer than this many slots no longer hides any latency.
const LD_LATENCY: isize = 2;

/// Run the pass on the superblock between `head` and `tail` (exclusive).
/// Returns the number of loads moved.
pub(crate) fn apply_load_hoisting(unit: &mut CompilationUnit, head: LirId, tail: LirId) -> usize {
    let mut hoisted = 0;

    if head == tail {
        return 0;
    }

    // Start from the second instruction.
    let mut this_id = unit.next_id(head);
    while this_id != tail {
        let this = unit.insn(this_id);

        // Skip non-interesting instructions.
        if this.is_nop() || this.opcode.is_pseudo() || this.opcode.flags() & IS_LOAD == 0 {
            this_id = unit.next_id(this_id);
            continue;
        }

        let mut stop_use_all_mask = this.use_mask;

        // Branches guarding null/range checks carry their true resource
        // bits, and spill-frame/constant-pool loads can be disambiguated
        // exactly, so only heap references need the conservative pc
        // barrier.
        if stop_use_all_mask & ENCODE_HEAP_REF != 0 {
            stop_use_all_mask |= ENCODE_REG_PC;
        }

        // Same, reduced to pure register dependence.
        let stop_use_reg_mask = stop_use_all_mask & !ENCODE_MEM;
        let stop_def_reg_mask = this.def_mask & !ENCODE_MEM;
        let this_alias = this.alias_info;

        // Independent instructions the load may be hoisted past; the best
        // slot among them is decided afterwards.
        let mut prev_inst_list = [LirId::NONE; MAX_HOIST_DISTANCE];
        let mut next_slot = 0usize;
        let mut stop_here = false;

        let mut check_id = unit.prev_id(this_id);
        while check_id != head {
            let check = unit.insn(check_id);

            // A nop's dataflow information is stale and misleading.
            if check.is_nop() {
                check_id = unit.prev_id(check_id);
                continue;
            }

            let check_mem_mask = check.def_mask & ENCODE_MEM;
            let alias_condition = stop_use_all_mask & check_mem_mask;
            stop_here = false;

            // Potential WAR alias seen - check the exact relation.
            if check_mem_mask != ENCODE_MEM && alias_condition != 0 {
                if alias_condition == ENCODE_VREG {
                    // Spill-frame refs can be fully disambiguated.
                    if check.alias_info == this_alias
                        || vreg_clobbered(this_alias, check.alias_info)
                    {
                        stop_here = true;
                    }
                } else {
                    // Heap refs are always may-alias.
                    debug_assert_eq!(
                        alias_condition, ENCODE_HEAP_REF,
                        "unexpected alias region"
                    );
                    stop_here = true;
                }
                // Memory contents may be updated - stop looking now, but
                // keep the stopper as the dependence anchor.
                if stop_here {
                    prev_inst_list[next_slot] = check_id;
                    next_slot += 1;
                    break;
                }
            }

            if !stop_here {
                stop_here = check_reg_dep(stop_use_reg_mask, stop_def_reg_mask, check);
            }

            // Record the dependent or non-pseudo instruction.
            if stop_here || !check.opcode.is_pseudo() {
                prev_inst_list[next_slot] = check_id;
                next_slot += 1;
                if next_slot == MAX_HOIST_DISTANCE {
                    break;
                }
            }

            if stop_here {
                break;
            }
            check_id = unit.prev_id(check_id);
        }

        // Reached the top - use the head as the dependence anchor, since
        // all labels are barriers.
        if !stop_here && next_slot < MAX_HOIST_DISTANCE {
            prev_inst_list[next_slot] = head;
            next_slot += 1;
        }

        // At least one independent instruction is needed between the
        // anchor and the load.
        if next_slot >= 2 {
            let mut first_slot = next_slot as isize - 2;
            let dep = unit.insn(prev_inst_list[next_slot - 1]);
            // A load anchor forces a gap: wait LDLD_DISTANCE slots.
            if !dep.opcode.is_pseudo() && dep.opcode.flags() & IS_LOAD != 0 {
                first_slot -= LDLD_DISTANCE;
            }

            // first_slot may already be negative when entering the loop.
            let mut slot = first_slot;
            while slot >= 0 {
                let cur = unit.insn(prev_inst_list[slot as usize]);
                let prev = unit.insn(prev_inst_list[slot as usize + 1]);

                // Check the instruction above the slot: a saturated def
                // mask is a scheduling barrier.
                if prev.def_mask == ENCODE_ALL {
                    // Hoisting a load to the very top of the block is
                    // unlikely to pay off; keep looking below. In every
                    // other case stop unconditionally, even past the
                    // latency threshold: the code below must not compare
                    // against a pseudo opcode.
                    if cur.opcode.flags() & IS_LOAD != 0 {
                        slot -= 1;
                        continue;
                    }
                    break;
                }

                debug_assert!(
                    !prev.opcode.is_pseudo(),
                    "non-barrier window entries are real instructions"
                );

                // Settle into an existing load-use stall, or stop once the
                // remaining distance no longer covers the load latency.
                if (cur.use_mask & prev.def_mask != 0 && prev.opcode.flags() & IS_LOAD != 0)
                    || slot < LD_LATENCY
                {
                    break;
                }
                slot -= 1;
            }

            // Found a slot to hoist to.
            if slot >= 0 {
                let cur_id = prev_inst_list[slot as usize];
                let clone = unit.clone_insn(this_id);
                unit.insert_before(cur_id, clone);
                unit.insn_mut(this_id).mark_nop();
                hoisted += 1;
            }
        }

        this_id = unit.next_id(this_id);
    }

    hoisted
}
