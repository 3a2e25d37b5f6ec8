//! Control flow graph construction.
//!
//! [`build_program`] partitions a linear instruction list into basic blocks
//! and procedures and wires the labelled edges between them, in a single
//! scan:
//!
//! - an instruction *leads* a new block iff any of its back-edge sets is
//!   non-empty (some jump or call targets it, or it is the first instruction
//!   of a procedure some RETURN leaves through), or it follows a terminator;
//! - a block *ends* after a terminator: any jump, CALL, RETURN, RETURNVOID
//!   or END.
//!
//! Forward references are resolved with three pairs of pending maps: jumps,
//! calls and returns each keep a "source block known, target not yet
//! visited" half and a "target block known, source not yet visited" half.
//! When an instruction becomes a leader it patches the pending sources that
//! land on it; when a terminator is emitted it patches against the pending
//! targets.

use crate::fx::FxHashMap;
use crate::ir::{
    Block, BlockData, Edge, ICode, Inst, Opcode, Proc, ProcData, Program, Sym,
};
use crate::result::{IrError, IrResult};
use secrec_entity::packed_option::PackedOption;
use secrec_entity::PrimaryMap;
use crate::ir::instructions::ImopData;
use crate::ir::symbol::SymbolTable;

/// How the previous block stopped growing.
#[derive(Copy, Clone, PartialEq, Eq)]
enum BlockEnd {
    /// Ended because the next instruction was a leader.
    FallThrough,
    /// Ended at a conditional jump.
    CondJump,
    /// Ended at a CALL; the next block starts at its RETCLEAN.
    Call,
    /// Ended at an unconditional JUMP, RETURN, RETURNVOID or END.
    NoFall,
}

struct Builder {
    imops: PrimaryMap<Inst, ImopData>,
    order: Vec<Inst>,
    symbols: SymbolTable,

    block_data: PrimaryMap<Block, BlockData>,
    proc_data: PrimaryMap<Proc, ProcData>,
    proc_order: Vec<Proc>,
    exit: PackedOption<Block>,

    /// Procedure symbol keyed by the first instruction of its body.
    proc_starts: FxHashMap<Inst, Sym>,

    // Pending forward references.
    jump_from: FxHashMap<Inst, Block>,
    jump_to: FxHashMap<Inst, Block>,
    call_from: FxHashMap<Inst, Block>,
    call_to: FxHashMap<Inst, Block>,
    ret_from: FxHashMap<Inst, Block>,
    ret_to: FxHashMap<Inst, Block>,
}

/// Build a [`Program`] from the linear intermediate code of a translation
/// unit.
///
/// The instruction list must be fully wired by the emitter: every
/// jump-family instruction points at a placed label, every CALL is paired
/// with the RETCLEAN that follows it, and every RETURN carries the pointer
/// to the first instruction of its procedure. Violations surface as
/// [`IrError::IllFormed`]; an empty list as [`IrError::EmptyProgram`].
pub fn build_program(icode: ICode) -> IrResult<Program> {
    let ICode {
        context,
        symbols,
        code,
    } = icode;
    let (imops, order) = code.into_parts();
    if order.is_empty() {
        return Err(IrError::EmptyProgram);
    }

    let mut proc_starts = FxHashMap::default();
    for (sym, data) in symbols.iter() {
        if let crate::ir::SymbolData::Procedure { first_imop, .. } = data {
            if let Some(first) = first_imop.expand() {
                proc_starts.insert(first, sym);
            }
        }
    }

    let mut builder = Builder {
        imops,
        order,
        symbols,
        block_data: PrimaryMap::new(),
        proc_data: PrimaryMap::new(),
        proc_order: Vec::new(),
        exit: None.into(),
        proc_starts,
        jump_from: FxHashMap::default(),
        jump_to: FxHashMap::default(),
        call_from: FxHashMap::default(),
        call_to: FxHashMap::default(),
        ret_from: FxHashMap::default(),
        ret_to: FxHashMap::default(),
    };

    builder.validate()?;
    builder.scan()?;
    let mut program = Program {
        imops: builder.imops,
        block_data: builder.block_data,
        proc_data: builder.proc_data,
        proc_order: builder.proc_order,
        exit: builder.exit,
        symbols: builder.symbols,
        context,
    };
    propagate_reachability(&mut program);
    log::debug!(
        "built program: {} procedures, {} blocks, {} instructions",
        program.proc_order.len(),
        program.num_blocks(),
        program.num_imops()
    );
    Ok(program)
}

impl Builder {
    fn ill_formed(&self, inst: Inst, reason: &'static str) -> IrError {
        IrError::IllFormed {
            index: self.imops[inst].index,
            opcode: self.imops[inst].op,
            reason,
        }
    }

    /// Check the emitter-facing contract before any block is formed.
    fn validate(&self) -> IrResult<()> {
        let first = self.order[0];
        if self.imops[first].op != Opcode::Comment {
            return Err(self.ill_formed(first, "program must start with its COMMENT"));
        }
        let mut saw_end = false;
        for (pos, &inst) in self.order.iter().enumerate() {
            let data = &self.imops[inst];
            if data.op.is_jump() {
                let target = data
                    .dest
                    .expand()
                    .and_then(|label| self.symbols.label_target(label));
                if target.is_none() {
                    return Err(self.ill_formed(inst, "jump without a placed label destination"));
                }
            } else if let Some(dest) = data.dest.expand() {
                if self.symbols.label_target(dest).is_some() {
                    return Err(self.ill_formed(inst, "label destination on a non-jump opcode"));
                }
            }
            match data.op {
                Opcode::Call => {
                    let clean = data.pair.expand();
                    let follows = self.order.get(pos + 1).copied();
                    if clean.is_none() || clean != follows {
                        return Err(
                            self.ill_formed(inst, "CALL without its RETCLEAN on the next line")
                        );
                    }
                    let callee = data
                        .arg1
                        .expand()
                        .and_then(|p| self.symbols.proc_first_imop(p));
                    if callee.is_none() {
                        return Err(self.ill_formed(inst, "CALL without an emitted callee"));
                    }
                }
                Opcode::RetClean => {
                    if self.imops[inst]
                        .pair
                        .expand()
                        .map(|c| self.imops[c].op)
                        != Some(Opcode::Call)
                    {
                        return Err(self.ill_formed(inst, "RETCLEAN without its CALL"));
                    }
                }
                Opcode::Return | Opcode::ReturnVoid => {
                    let first = data.pair.expand().map(|f| self.imops[f].op);
                    if first != Some(Opcode::Comment) {
                        return Err(
                            self.ill_formed(inst, "RETURN without a first-instruction pointer")
                        );
                    }
                }
                Opcode::End => saw_end = true,
                _ => {}
            }
        }
        if !saw_end {
            let last = *self.order.last().expect("list is non-empty");
            return Err(self.ill_formed(last, "program has no END instruction"));
        }
        Ok(())
    }

    fn is_proc_start(&self, inst: Inst) -> bool {
        self.proc_starts.contains_key(&inst) || !self.imops[inst].returns.is_empty()
    }

    fn is_leader(&self, inst: Inst) -> bool {
        !self.imops[inst].incoming.is_empty()
            || !self.imops[inst].incoming_calls.is_empty()
            || self.is_proc_start(inst)
    }

    fn add_edge(&mut self, from: Block, label: Edge, to: Block) {
        *self.block_data[from].succs.entry(to).or_default() |= label;
        *self.block_data[to].preds.entry(from).or_default() |= label;
        if label.contains(Edge::CALL) {
            let callee = self.block_data[to].proc;
            self.proc_data[callee].call_from.insert(from);
        }
        if label.contains(Edge::RET) {
            let caller_side = self.block_data[from].proc;
            self.proc_data[caller_side].return_to.insert(to);
        }
        log::trace!(
            "edge block{} -> block{} [{label:?}]",
            self.block_data[from].index,
            self.block_data[to].index
        );
    }

    /// Open a block at `inst`, starting a new procedure when `inst` begins
    /// one, and patch every pending reference that lands here.
    fn start_block(&mut self, inst: Inst, prev: Option<(Block, BlockEnd)>) -> Block {
        let starts_proc = self.is_proc_start(inst);
        if self.proc_order.is_empty() || starts_proc {
            let name = self.proc_starts.get(&inst).copied();
            let proc = self.proc_data.push(ProcData::new(name));
            self.proc_order.push(proc);
        }
        let proc = *self.proc_order.last().expect("just ensured non-empty");
        let index = self.block_data.len() as u32 + 1;
        let block = self.block_data.push(BlockData::new(index, proc));
        self.proc_data[proc].blocks.push(block);

        // Fall-through edge from the textual predecessor, unless control
        // cannot pass or we just crossed into another procedure.
        if let Some((prev_block, end)) = prev {
            if !starts_proc {
                match end {
                    BlockEnd::FallThrough => self.add_edge(prev_block, Edge::JUMP, block),
                    BlockEnd::CondJump => self.add_edge(prev_block, Edge::FALSE, block),
                    BlockEnd::Call => self.add_edge(prev_block, Edge::CALL_PASS, block),
                    BlockEnd::NoFall => {}
                }
            }
        }

        // Patch incoming jumps whose source block is already known; keep the
        // rest pending against this block.
        let incoming: Vec<Inst> = self.imops[inst].incoming.iter().copied().collect();
        for jump in incoming {
            if let Some(from) = self.jump_from.remove(&jump) {
                let label = if self.imops[jump].op == Opcode::Jump {
                    Edge::JUMP
                } else {
                    Edge::TRUE
                };
                self.add_edge(from, label, block);
            } else {
                self.jump_to.insert(inst, block);
            }
        }

        // Patch incoming calls the same way.
        let calls: Vec<Inst> = self.imops[inst].incoming_calls.iter().copied().collect();
        for call in calls {
            if let Some(from) = self.call_from.remove(&call) {
                self.add_edge(from, Edge::CALL, block);
            } else {
                self.call_to.insert(inst, block);
            }
        }

        // A RETCLEAN is the return site of its CALL's callee: link every
        // return of the callee whose block is already known, and stay
        // pending for the ones that are not.
        if self.imops[inst].op == Opcode::RetClean {
            let call = self.imops[inst].pair.expand().expect("validated");
            let callee_first = self.imops[call]
                .arg1
                .expand()
                .and_then(|p| self.symbols.proc_first_imop(p))
                .expect("validated");
            let returns: Vec<Inst> = self.imops[callee_first].returns.iter().copied().collect();
            let mut pending = false;
            for ret in &returns {
                match self.ret_from.get(ret) {
                    Some(&from) => self.add_edge(from, Edge::RET, block),
                    None => pending = true,
                }
            }
            if pending || returns.is_empty() {
                self.ret_to.insert(inst, block);
            }
        }

        block
    }

    /// Lay the outgoing edges of a block that just ended at terminator
    /// `inst`.
    fn end_block_at(&mut self, block: Block, inst: Inst) {
        let op = self.imops[inst].op;
        if op.is_jump() {
            let target = self.imops[inst]
                .dest
                .expand()
                .and_then(|label| self.symbols.label_target(label))
                .expect("validated");
            let label = if op == Opcode::Jump {
                Edge::JUMP
            } else {
                Edge::TRUE
            };
            if let Some(&to) = self.jump_to.get(&target) {
                self.add_edge(block, label, to);
            } else {
                self.jump_from.insert(inst, block);
            }
            return;
        }
        match op {
            Opcode::Call => {
                let callee_first = self.imops[inst]
                    .arg1
                    .expand()
                    .and_then(|p| self.symbols.proc_first_imop(p))
                    .expect("validated");
                if let Some(&to) = self.call_to.get(&callee_first) {
                    self.add_edge(block, Edge::CALL, to);
                } else {
                    self.call_from.insert(inst, block);
                }
            }
            Opcode::Return | Opcode::ReturnVoid => {
                let first = self.imops[inst].pair.expand().expect("validated");
                let calls: Vec<Inst> =
                    self.imops[first].incoming_calls.iter().copied().collect();
                let mut pending = false;
                for call in calls {
                    let clean = self.imops[call].pair.expand().expect("validated");
                    match self.ret_to.get(&clean) {
                        Some(&to) => self.add_edge(block, Edge::RET, to),
                        None => pending = true,
                    }
                }
                if pending {
                    self.ret_from.insert(inst, block);
                }
                let proc = self.block_data[block].proc;
                self.proc_data[proc].exit_blocks.insert(block);
            }
            Opcode::End => {
                let proc = self.block_data[block].proc;
                self.proc_data[proc].exit_blocks.insert(block);
                self.exit = block.into();
            }
            _ => unreachable!("not a terminator"),
        }
    }

    fn scan(&mut self) -> IrResult<()> {
        let order = self.order.clone();
        let mut current: Option<Block> = None;
        let mut prev: Option<(Block, BlockEnd)> = None;

        for &inst in &order {
            let block = match current {
                Some(block) if !self.is_leader(inst) => block,
                Some(block) => {
                    // A leader in the middle of straight-line code: the open
                    // block falls through into it.
                    prev = Some((block, BlockEnd::FallThrough));
                    let new = self.start_block(inst, prev);
                    current = Some(new);
                    new
                }
                None => {
                    let new = self.start_block(inst, prev);
                    current = Some(new);
                    new
                }
            };

            self.block_data[block].insts.push(inst);
            self.imops[inst].block = block.into();

            let op = self.imops[inst].op;
            if op.is_terminator() {
                self.end_block_at(block, inst);
                let end = match op {
                    Opcode::Call => BlockEnd::Call,
                    _ if op.is_cond_jump() => BlockEnd::CondJump,
                    _ => BlockEnd::NoFall,
                };
                prev = Some((block, end));
                current = None;
            }
        }

        debug_assert!(
            self.jump_from.is_empty(),
            "every jump source was patched at its target's leader"
        );
        debug_assert!(
            self.call_from.is_empty(),
            "every call source was patched at the callee's entry"
        );
        Ok(())
    }
}

/// Mark every block reachable from the program entry, following outgoing
/// edges of every label.
fn propagate_reachability(program: &mut Program) {
    let entry = program.entry_block();
    let mut stack = vec![entry];
    program.block_data[entry].reachable = true;
    while let Some(block) = stack.pop() {
        let succs: Vec<Block> = program.block_data[block].succs.keys().copied().collect();
        for succ in succs {
            if !program.block_data[succ].reachable {
                program.block_data[succ].reachable = true;
                stack.push(succ);
            }
        }
    }
}
