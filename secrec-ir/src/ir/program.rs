//! The program: procedures, basic blocks and labelled control flow edges.
//!
//! A [`Program`] owns every instruction, block and procedure through arena
//! maps keyed by entity references; the neighbour maps and back-edge sets are
//! non-owning sets of handles describing relationships. Every structural
//! edit maintains them symmetrically: if `(n, l)` is among the successors of
//! `b` then `(b, l)` is among the predecessors of `n`.

use crate::ir::entities::{Block, Inst, Proc, Sym};
use crate::ir::instructions::{def_symbols, use_symbols, ImopData, Opcode};
use crate::ir::symbol::SymbolTable;
use crate::context::Context;
use bitflags::bitflags;
use secrec_entity::packed_option::PackedOption;
use secrec_entity::PrimaryMap;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

bitflags! {
    /// Labels of a control flow edge. Two control paths between the same
    /// pair of blocks store the OR of their labels.
    #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct Edge: u8 {
        /// Unconditional jump or plain fall-through.
        const JUMP = 0x01;
        /// Taken branch of a conditional jump.
        const TRUE = 0x02;
        /// Fall-through branch of a conditional jump.
        const FALSE = 0x04;
        /// Interprocedural edge from a CALL to the callee entry.
        const CALL = 0x08;
        /// Interprocedural edge from a RETURN back to a return site.
        const RET = 0x10;
        /// Local edge from a CALL's block to its RETCLEAN block.
        const CALL_PASS = 0x20;
        /// Edge into the program exit.
        const END = 0x40;
    }
}

impl Edge {
    /// Does the label contain any local component?
    pub fn is_local(self) -> bool {
        self.intersects(Self::JUMP | Self::TRUE | Self::FALSE | Self::CALL_PASS)
    }

    /// Does the label contain any interprocedural component?
    pub fn is_global(self) -> bool {
        self.intersects(Self::CALL | Self::RET)
    }
}

/// A basic block: an ordered run of instructions plus the labelled neighbour
/// maps of the control flow graph.
#[derive(Debug)]
pub struct BlockData {
    /// 1-based index of the block, in construction order.
    pub index: u32,
    /// The procedure that owns this block.
    pub proc: Proc,
    /// Whether any control path from the program entry reaches this block.
    pub reachable: bool,
    pub(crate) insts: Vec<Inst>,
    pub(crate) preds: BTreeMap<Block, Edge>,
    pub(crate) succs: BTreeMap<Block, Edge>,
}

impl BlockData {
    pub(crate) fn new(index: u32, proc: Proc) -> Self {
        Self {
            index,
            proc,
            reachable: false,
            insts: Vec::new(),
            preds: BTreeMap::new(),
            succs: BTreeMap::new(),
        }
    }

    /// The instructions of the block, in order.
    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    /// First instruction of the block.
    pub fn first_inst(&self) -> Inst {
        *self.insts.first().expect("blocks are never empty")
    }

    /// Last instruction of the block.
    pub fn last_inst(&self) -> Inst {
        *self.insts.last().expect("blocks are never empty")
    }

    /// Predecessors with the labels of their edges.
    pub fn preds(&self) -> impl Iterator<Item = (Block, Edge)> + '_ {
        self.preds.iter().map(|(&b, &l)| (b, l))
    }

    /// Successors with the labels of their edges.
    pub fn succs(&self) -> impl Iterator<Item = (Block, Edge)> + '_ {
        self.succs.iter().map(|(&b, &l)| (b, l))
    }

    /// Does any jump-family edge enter this block?
    pub fn has_incoming_jumps(&self) -> bool {
        self.preds
            .values()
            .any(|l| l.intersects(Edge::JUMP | Edge::TRUE | Edge::FALSE))
    }
}

/// A procedure: an ordered list of blocks, entered through the first.
#[derive(Debug)]
pub struct ProcData {
    /// The procedure symbol, or none for the main procedure group.
    pub name: PackedOption<Sym>,
    pub(crate) blocks: Vec<Block>,
    /// Blocks of this procedure that end in a RETURN, RETURNVOID or END.
    pub exit_blocks: BTreeSet<Block>,
    /// Blocks (of other procedures) that call this procedure.
    pub call_from: BTreeSet<Block>,
    /// Return-site blocks this procedure's returns jump back to.
    pub return_to: BTreeSet<Block>,
}

impl ProcData {
    pub(crate) fn new(name: Option<Sym>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            exit_blocks: BTreeSet::new(),
            call_from: BTreeSet::new(),
            return_to: BTreeSet::new(),
        }
    }

    /// The blocks of the procedure in layout order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The entry block of the procedure.
    pub fn entry(&self) -> Block {
        *self.blocks.first().expect("procedures are never empty")
    }
}

/// A complete program: the hierarchical container for procedures, blocks and
/// instructions, together with the symbol table and interning context that
/// give the operands meaning.
#[derive(Debug)]
pub struct Program {
    pub(crate) imops: PrimaryMap<Inst, ImopData>,
    pub(crate) block_data: PrimaryMap<Block, BlockData>,
    pub(crate) proc_data: PrimaryMap<Proc, ProcData>,
    pub(crate) proc_order: Vec<Proc>,
    pub(crate) exit: PackedOption<Block>,
    /// The symbol table of the translation unit.
    pub symbols: SymbolTable,
    /// The interning context of the translation unit.
    pub context: Context,
}

impl Program {
    /// The procedures of the program in order; the main procedure is first.
    pub fn procs(&self) -> impl Iterator<Item = Proc> + '_ {
        self.proc_order.iter().copied()
    }

    /// Every block of every procedure, in procedure and layout order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.procs()
            .flat_map(|p| self.proc_data[p].blocks.iter().copied())
    }

    /// Payload of a block.
    pub fn block(&self, block: Block) -> &BlockData {
        &self.block_data[block]
    }

    /// Payload of a procedure.
    pub fn proc(&self, proc: Proc) -> &ProcData {
        &self.proc_data[proc]
    }

    /// Contents of an instruction.
    pub fn imop(&self, inst: Inst) -> &ImopData {
        &self.imops[inst]
    }

    /// The program entry block: the first block of the main procedure.
    pub fn entry_block(&self) -> Block {
        let main = *self.proc_order.first().expect("programs are never empty");
        self.proc_data[main].entry()
    }

    /// The program exit block: the unique block whose final instruction is
    /// END.
    pub fn exit_block(&self) -> Block {
        self.exit.expect("a built program always has an END block")
    }

    /// Is `block` the entry of the whole program?
    pub fn is_program_entry(&self, block: Block) -> bool {
        block == self.entry_block()
    }

    /// Is `block` the exit of the whole program?
    pub fn is_program_exit(&self, block: Block) -> bool {
        block == self.exit_block()
    }

    /// Is `block` the entry of its procedure?
    pub fn is_entry(&self, block: Block) -> bool {
        self.proc_data[self.block_data[block].proc].entry() == block
    }

    /// Is `block` an exit of its procedure?
    pub fn is_exit(&self, block: Block) -> bool {
        self.proc_data[self.block_data[block].proc]
            .exit_blocks
            .contains(&block)
    }

    /// The variables defined by `inst`.
    pub fn def_range(&self, inst: Inst) -> SmallVec<[Sym; 2]> {
        def_symbols(&self.imops[inst], &self.symbols)
    }

    /// The variables used by `inst`.
    pub fn use_range(&self, inst: Inst) -> SmallVec<[Sym; 3]> {
        use_symbols(&self.imops[inst], &self.symbols)
    }

    /// Remove every edge incident to `block`, symmetrically.
    pub(crate) fn unlink_block(&mut self, block: Block) {
        let preds: Vec<Block> = self.block_data[block].preds.keys().copied().collect();
        for p in preds {
            self.block_data[p].succs.remove(&block);
        }
        let succs: Vec<Block> = self.block_data[block].succs.keys().copied().collect();
        for s in succs {
            self.block_data[s].preds.remove(&block);
        }
        self.block_data[block].preds.clear();
        self.block_data[block].succs.clear();
    }

    /// Erase the back-edge registrations of `inst` from the instructions it
    /// points at.
    fn erase_back_edges_of(&mut self, inst: Inst) {
        let (op, dest, arg1, pair) = {
            let data = &self.imops[inst];
            (data.op, data.dest, data.arg1, data.pair)
        };
        if op.is_jump() {
            if let Some(target) = dest.expand().and_then(|l| self.symbols.label_target(l)) {
                self.imops[target].incoming.remove(&inst);
            }
        }
        match op {
            Opcode::Call => {
                if let Some(first) = arg1.expand().and_then(|p| self.symbols.proc_first_imop(p)) {
                    self.imops[first].incoming_calls.remove(&inst);
                }
            }
            Opcode::Return | Opcode::ReturnVoid => {
                if let Some(first) = pair.expand() {
                    self.imops[first].returns.remove(&inst);
                }
            }
            _ => {}
        }
    }

    /// Remove `block` from the program: unlink its edges, drop it from its
    /// procedure and erase its instructions from every back-edge set.
    pub fn remove_block(&mut self, block: Block) {
        self.unlink_block(block);
        let proc = self.block_data[block].proc;
        let data = &mut self.proc_data[proc];
        data.blocks.retain(|&b| b != block);
        data.exit_blocks.remove(&block);
        data.call_from.remove(&block);
        data.return_to.remove(&block);
        for p in self.proc_data.values_mut() {
            p.call_from.remove(&block);
            p.return_to.remove(&block);
        }

        let insts = std::mem::take(&mut self.block_data[block].insts);
        for inst in insts {
            self.erase_back_edges_of(inst);
            self.imops[inst].incoming.clear();
            self.imops[inst].incoming_calls.clear();
            self.imops[inst].returns.clear();
            self.imops[inst].block = None.into();
        }
    }

    /// Remove a single instruction from its block. The instruction must not
    /// be a terminator; removing one would change the block's edges.
    pub fn remove_imop(&mut self, inst: Inst) {
        let block = self.imops[inst]
            .block
            .expect("instruction is not in a block");
        debug_assert!(!self.imops[inst].op.is_terminator());
        self.erase_back_edges_of(inst);
        self.block_data[block].insts.retain(|&i| i != inst);
        self.imops[inst].block = None.into();
    }

    /// Rewrite `inst` into a plain assignment `dest = arg1`, keeping its
    /// position, index and incoming back-edges.
    pub fn replace_with_assign(&mut self, inst: Inst) {
        let data = &mut self.imops[inst];
        data.op = Opcode::Assign;
        data.arg2 = None.into();
        data.pair = None.into();
    }

    /// Optional strict check: does the program define a procedure named
    /// `main`? Surfaced as its own error kind so drivers can distinguish it
    /// from ill-formed code.
    pub fn require_main(&self) -> crate::IrResult<()> {
        let has_main = self.procs().any(|p| {
            self.proc_data[p]
                .name
                .expand()
                .and_then(|sym| self.symbols.data(sym).name())
                .is_some_and(|id| self.context.str(id) == "main")
        });
        if has_main {
            Ok(())
        } else {
            Err(crate::IrError::NoMain)
        }
    }

    /// Total number of instructions owned by the program, including any that
    /// removed blocks have orphaned.
    pub fn num_imops(&self) -> usize {
        self.imops.len()
    }

    /// Total number of blocks created for the program.
    pub fn num_blocks(&self) -> usize {
        self.block_data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_label_classes() {
        assert!(Edge::JUMP.is_local());
        assert!(Edge::TRUE.is_local());
        assert!(Edge::FALSE.is_local());
        assert!(Edge::CALL_PASS.is_local());
        assert!(!Edge::CALL.is_local());
        assert!(Edge::CALL.is_global());
        assert!(Edge::RET.is_global());
        assert!(!Edge::JUMP.is_global());

        // OR-composed labels answer for every component.
        let both = Edge::JUMP | Edge::CALL;
        assert!(both.is_local());
        assert!(both.is_global());
    }
}
