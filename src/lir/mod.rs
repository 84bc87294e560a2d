//! Low-level IR for the ARMv7 trace backend.
//!
//! LIR instructions are nodes of an intrusive doubly-linked list. The nodes
//! live in an arena `Vec` inside the [`CompilationUnit`] and are addressed
//! by [`LirId`], so links stay valid while passes splice new instructions
//! into the list. Nothing is ever unlinked or freed during optimization:
//! a dead instruction is marked nop, skipped by every later scan, and
//! flattened away by the emission pass.

pub mod build;
pub mod encoding;
pub mod masks;

use encoding::Opcode;

/// Index of an LIR instruction in the compilation unit's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LirId(pub u32);

impl LirId {
    /// Null link.
    pub const NONE: LirId = LirId(u32::MAX);
}

/// A single LIR instruction.
///
/// `operands[0]` is the destination register of loads and the source
/// register of stores. `operands[3]` of a three-register add carries the
/// optional barrel-shifter encoding (see [`encoding::SHIFT_LSL`]).
#[derive(Debug, Clone)]
pub struct LirInsn {
    pub opcode: Opcode,
    pub operands: [i32; 4],
    /// Resources read, including one memory-region bit for loads.
    pub use_mask: u64,
    /// Resources written, including one memory-region bit for stores.
    pub def_mask: u64,
    /// Slot identity for spill-frame and literal-pool accesses
    /// (see [`masks::encode_alias_info`]).
    pub alias_info: u32,
    nop: bool,
    prev: LirId,
    next: LirId,
}

impl LirInsn {
    /// Dead instruction: skipped by every scan, dropped at emission.
    #[inline]
    pub fn is_nop(&self) -> bool {
        self.nop
    }

    /// Mark this instruction dead. There is no way back: a nop's dataflow
    /// information is stale and must never be consulted again.
    #[inline]
    pub fn mark_nop(&mut self) {
        self.nop = true;
    }
}

/// Per-trace compilation context: the LIR arena, the sentinel labels
/// delimiting the current trace, and optimizer configuration.
pub struct CompilationUnit {
    insns: Vec<LirInsn>,
    head: LirId,
    tail: LirId,
    /// Disabled local optimizations, one bit per [`crate::opt::LocalOpt`].
    pub disable_opt: u32,
    /// Report per-pass rewrite counts on stderr.
    pub log_passes: bool,
}

impl CompilationUnit {
    /// Create a unit holding an empty trace: a head and a tail sentinel
    /// label linked to each other. Labels carry a saturated def mask, so
    /// both sentinels double as scheduling barriers.
    pub fn new() -> CompilationUnit {
        let mut unit = CompilationUnit {
            insns: Vec::new(),
            head: LirId::NONE,
            tail: LirId::NONE,
            disable_opt: 0,
            log_passes: false,
        };
        let head = unit.new_insn(Opcode::Label);
        let tail = unit.new_insn(Opcode::Label);
        unit.insns[head.0 as usize].next = tail;
        unit.insns[tail.0 as usize].prev = head;
        unit.head = head;
        unit.tail = tail;
        unit
    }

    /// Head sentinel of the trace.
    #[inline]
    pub fn head(&self) -> LirId {
        self.head
    }

    /// Tail sentinel of the trace.
    #[inline]
    pub fn tail(&self) -> LirId {
        self.tail
    }

    #[inline]
    pub fn insn(&self, id: LirId) -> &LirInsn {
        &self.insns[id.0 as usize]
    }

    #[inline]
    pub fn insn_mut(&mut self, id: LirId) -> &mut LirInsn {
        &mut self.insns[id.0 as usize]
    }

    #[inline]
    pub fn next_id(&self, id: LirId) -> LirId {
        self.insns[id.0 as usize].next
    }

    #[inline]
    pub fn prev_id(&self, id: LirId) -> LirId {
        self.insns[id.0 as usize].prev
    }

    /// Allocate a zero-initialized, unlinked instruction in the arena.
    /// Resource masks are not set; see [`build::setup_resource_masks`].
    pub fn new_insn(&mut self, opcode: Opcode) -> LirId {
        let id = LirId(self.insns.len() as u32);
        self.insns.push(LirInsn {
            opcode,
            operands: [0; 4],
            use_mask: 0,
            def_mask: 0,
            alias_info: 0,
            nop: false,
            prev: LirId::NONE,
            next: LirId::NONE,
        });
        if opcode.is_pseudo() || opcode.flags() & encoding::IS_BARRIER != 0 {
            self.insns[id.0 as usize].def_mask = masks::ENCODE_ALL;
        }
        id
    }

    /// Deep-copy an instruction into a fresh unlinked arena slot.
    pub fn clone_insn(&mut self, src: LirId) -> LirId {
        let mut insn = self.insns[src.0 as usize].clone();
        insn.prev = LirId::NONE;
        insn.next = LirId::NONE;
        let id = LirId(self.insns.len() as u32);
        self.insns.push(insn);
        id
    }

    /// Splice an unlinked instruction into the list before `anchor`.
    pub fn insert_before(&mut self, anchor: LirId, id: LirId) {
        let prev = self.insns[anchor.0 as usize].prev;
        debug_assert!(prev != LirId::NONE, "cannot insert before the head sentinel");
        self.insns[id.0 as usize].prev = prev;
        self.insns[id.0 as usize].next = anchor;
        self.insns[prev.0 as usize].next = id;
        self.insns[anchor.0 as usize].prev = id;
    }

    /// Splice an unlinked instruction into the list after `anchor`.
    pub fn insert_after(&mut self, anchor: LirId, id: LirId) {
        let next = self.insns[anchor.0 as usize].next;
        debug_assert!(next != LirId::NONE, "cannot insert after the tail sentinel");
        self.insns[id.0 as usize].prev = anchor;
        self.insns[id.0 as usize].next = next;
        self.insns[next.0 as usize].prev = id;
        self.insns[anchor.0 as usize].next = id;
    }
}

impl Default for CompilationUnit {
    fn default() -> Self {
        CompilationUnit::new()
    }
}
