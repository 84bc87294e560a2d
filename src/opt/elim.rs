//! Redundant load/store elimination with opportunistic store sinking.
//!
//! One top-down pass over the superblock, starting from the second-to-last
//! instruction:
//!
//! - An earlier load eliminates a later load iff they must-alias, the
//!   native register is not clobbered in between, and the memory location
//!   is not written in between.
//! - An earlier store eliminates a later load under the same conditions
//!   (the stored value is forwarded).
//! - A later store eliminates an earlier store iff they must-alias and the
//!   location is not read or written in between.
//!
//! Only constant-pool and spill-frame accesses are candidates; heap
//! accesses are never disambiguated. When the forward scan of a store
//! candidate ends at a register dependence after passing independent
//! instructions, the store is additionally sunk to that point, shortening
//! the live range of its source register.

use crate::lir::build::reg_copy_no_insert;
use crate::lir::encoding::{IS_LOAD, IS_STORE};
use crate::lir::masks::{
    check_reg_dep, reg_type, vreg_clobbered, ENCODE_LITERAL, ENCODE_MEM, ENCODE_REG_PC,
    ENCODE_VREG,
};
use crate::lir::{CompilationUnit, LirId};

/// Replace a memory operation whose value is already live in `src` with a
/// register copy into `dest`. The copy is inserted *after* the original:
/// the scan is top-down, and the new instruction must be re-examined with
/// fresh dependence information (its dest may clobber a register a later
/// candidate still relies on).
fn convert_mem_op_into_move(unit: &mut CompilationUnit, orig: LirId, dest: i32, src: i32) {
    let mov = reg_copy_no_insert(unit, dest, src);
    unit.insert_after(orig, mov);
}

/// Run the pass on the superblock between `head` and `tail` (exclusive).
/// Returns the number of rewrites (eliminations, forwards, sinks).
pub(crate) fn apply_load_store_elimination(
    unit: &mut CompilationUnit,
    head: LirId,
    tail: LirId,
) -> usize {
    let mut rewrites = 0;

    if head == tail {
        return 0;
    }

    let mut this_id = unit.prev_id(tail);
    while this_id != head {
        let this = unit.insn(this_id);
        let this_flags = this.opcode.flags();

        // Skip non-interesting instructions.
        if this.is_nop()
            || this.opcode.is_pseudo()
            || this_flags & (IS_LOAD | IS_STORE) == 0
        {
            this_id = unit.prev_id(this_id);
            continue;
        }

        let is_this_load = this_flags & IS_LOAD != 0;
        let native_reg = this.operands[0];
        let this_alias = this.alias_info;
        // The mem mask gives the rough memory location.
        let this_mem_mask = (this.use_mask | this.def_mask) & ENCODE_MEM;

        // Only constant-pool and spill-frame accesses can be disambiguated.
        if this_mem_mask & (ENCODE_LITERAL | ENCODE_VREG) == 0 {
            this_id = unit.prev_id(this_id);
            continue;
        }

        // Add the pc to the use set so the candidate never sinks past a
        // branch, and take the memory bits out: the stop masks check
        // data/control dependence only.
        let stop_use_mask = (ENCODE_REG_PC | this.use_mask) & !ENCODE_MEM;
        let stop_def_mask = this.def_mask & !ENCODE_MEM;

        let mut sink_distance = 0usize;

        let mut check_id = unit.next_id(this_id);
        while check_id != tail {
            let check = unit.insn(check_id);

            // A nop's dataflow information is stale and misleading.
            if check.is_nop() {
                check_id = unit.next_id(check_id);
                continue;
            }

            let check_flags = check.opcode.flags();
            let check_mem_mask = (check.use_mask | check.def_mask) & ENCODE_MEM;
            let check_alias = check.alias_info;
            let check_dest = check.operands[0];
            let alias_condition = this_mem_mask & check_mem_mask;
            let mut stop_here = false;

            // Potential aliases seen - check the exact relation.
            if check_mem_mask != ENCODE_MEM && alias_condition != 0 {
                let is_check_load = check_flags & IS_LOAD != 0;
                if alias_condition == ENCODE_LITERAL {
                    // The constant pool is read-only.
                    debug_assert!(
                        check_flags & IS_STORE == 0,
                        "store into the literal pool"
                    );
                    // Same constant, same register class.
                    if check_alias == this_alias && reg_type(check_dest) == reg_type(native_reg) {
                        if check_dest != native_reg {
                            convert_mem_op_into_move(unit, check_id, check_dest, native_reg);
                        }
                        unit.insn_mut(check_id).mark_nop();
                        rewrites += 1;
                    }
                } else if alias_condition == ENCODE_VREG {
                    if check_alias == this_alias {
                        // Must-alias.
                        let reg_compatible = reg_type(check_dest) == reg_type(native_reg);
                        if is_check_load {
                            // RAR (load/load) or RAW (store/load): the
                            // value is still in nativeReg.
                            if reg_compatible {
                                if check_dest != native_reg {
                                    convert_mem_op_into_move(
                                        unit, check_id, check_dest, native_reg,
                                    );
                                }
                                unit.insn_mut(check_id).mark_nop();
                                rewrites += 1;
                            } else {
                                // Destinations live in different register
                                // classes - something complicated is going
                                // on, stop looking.
                                stop_here = true;
                            }
                        } else if is_this_load {
                            // WAR - the cached register value is killed.
                            stop_here = true;
                        } else {
                            // WAW - nuke the earlier store.
                            unit.insn_mut(this_id).mark_nop();
                            rewrites += 1;
                            stop_here = true;
                        }
                    } else if vreg_clobbered(this_alias, check_alias) {
                        // Partial wide/narrow overlap. Continuing would be
                        // sound when the check is a read, but stay
                        // conservative.
                        stop_here = true;
                    }
                }
                // Memory contents may be updated - stop looking now.
                if stop_here {
                    break;
                }
                // The check was transformed - move on to the next one.
                if unit.insn(check_id).is_nop() {
                    check_id = unit.next_id(check_id);
                    continue;
                }
            }

            // No memory dependence; stop at any register RAW/WAR/WAW.
            if check_reg_dep(stop_use_mask, stop_def_mask, unit.insn(check_id)) {
                // Stop point found. Sinking is only for stores: clone the
                // store here, where its source register's live range ends.
                // Insert *before* the stopper - the list is scanned
                // top-down and the clone must not be revisited.
                if sink_distance > 0 && !is_this_load {
                    let clone = unit.clone_insn(this_id);
                    unit.insert_before(check_id, clone);
                    unit.insn_mut(this_id).mark_nop();
                    rewrites += 1;
                }
                break;
            }
            sink_distance += 1;
            check_id = unit.next_id(check_id);
        }

        this_id = unit.prev_id(this_id);
    }

    rewrites
}
