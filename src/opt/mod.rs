//! Local (intra-superblock) optimizations: pass orchestration.
//!
//! A superblock is the straight-line stretch of LIR between two label
//! sentinels; labels and any instruction with a saturated def mask are
//! scheduling barriers, so no pass ever moves an instruction across them.
//! The pass implementations live in submodules:
//!
//! - [`elim`]: redundant load/store elimination with opportunistic store
//!   sinking
//! - [`hoist`]: load hoisting to hide load-use latency
//! - [`fuse`]: shift+add fusion (barrel shifter) and vmul+vadd fusion
//!   (vmla)
//!
//! All passes rewrite the list in place: they mark instructions nop and
//! splice in replacements, never unlinking anything. Each returns the
//! number of rewrites it performed.

pub(crate) mod elim;
pub(crate) mod fuse;
pub(crate) mod hoist;

use crate::lir::{CompilationUnit, LirId};

/// Local optimizations, one disable bit each in
/// [`CompilationUnit::disable_opt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOpt {
    LoadStoreElimination = 0,
    LoadHoisting = 1,
    ShiftArithmetic = 2,
    MultiplyArithmetic = 3,
}

impl LocalOpt {
    #[inline]
    pub fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Run every enabled local pass, in the fixed order, on the superblock
/// delimited by `head` and `tail` (both exclusive sentinels).
pub fn apply_local_optimizations(unit: &mut CompilationUnit, head: LirId, tail: LirId) {
    if unit.disable_opt & LocalOpt::LoadStoreElimination.bit() == 0 {
        let n = elim::apply_load_store_elimination(unit, head, tail);
        log_pass(unit, "load_store_elim", n);
    }
    if unit.disable_opt & LocalOpt::LoadHoisting.bit() == 0 {
        let n = hoist::apply_load_hoisting(unit, head, tail);
        log_pass(unit, "load_hoist", n);
    }
    if unit.disable_opt & LocalOpt::ShiftArithmetic.bit() == 0 {
        let n = fuse::apply_shift_arithmetic(unit, head, tail);
        log_pass(unit, "shift_arith", n);
    }
    if unit.disable_opt & LocalOpt::MultiplyArithmetic.bit() == 0 {
        let n = fuse::apply_multiply_arithmetic(unit, head, tail);
        log_pass(unit, "multiply_arith", n);
    }
}

fn log_pass(unit: &CompilationUnit, name: &str, rewrites: usize) {
    if unit.log_passes && rewrites > 0 {
        eprintln!("[LOPT] {}: {} rewrites", name, rewrites);
    }
}
