//! Live variables analysis.

use crate::analysis::{DataFlowAnalysis, Direction};
use crate::ir::{Block, Edge, Inst, Program, Sym};
use crate::write::symbol_text;
use secrec_entity::SecondaryMap;
use std::collections::BTreeSet;
use std::fmt::Write;

/// A set of variable symbols.
pub type Symbols = BTreeSet<Sym>;

/// Per-block liveness state.
#[derive(Clone, Default, PartialEq, Eq)]
struct BlockInfo {
    gen: Symbols,
    kill: Symbols,
    ins: Symbols,
    outs: Symbols,
}

/// Backward analysis computing the variables whose values may still be
/// needed on exit from every basic block.
///
/// Per-block gen/kill sets come from a reverse traversal of the block: a
/// definition kills, an upward-exposed use generates. The block equation is
/// `in = (out − kill) ∪ gen`; merging over successors takes the union, and
/// interprocedural edges propagate only globally scoped variables.
#[derive(Default)]
pub struct LiveVariables {
    blocks: SecondaryMap<Block, BlockInfo>,
}

impl LiveVariables {
    /// Create the analysis with no results yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The variables live on exit from `block`; empty until the analysis has
    /// run.
    pub fn live_on_exit(&self, block: Block) -> &Symbols {
        &self.blocks[block].outs
    }

    /// The variables live on entry to `block`; empty until the analysis has
    /// run.
    pub fn live_on_entry(&self, block: Block) -> &Symbols {
        &self.blocks[block].ins
    }

    /// Apply the liveness transfer of a single instruction to `live`, moving
    /// upwards: definitions die, uses become live.
    pub fn update_backwards(program: &Program, inst: Inst, live: &mut Symbols) {
        for sym in program.def_range(inst) {
            live.remove(&sym);
        }
        for sym in program.use_range(inst) {
            live.insert(sym);
        }
    }
}

impl DataFlowAnalysis for LiveVariables {
    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn start(&mut self, program: &Program) {
        self.blocks.clear();
        for block in program.blocks() {
            let info = &mut self.blocks[block];
            for &inst in program.block(block).insts().iter().rev() {
                for sym in program.def_range(inst) {
                    info.gen.remove(&sym);
                    info.kill.insert(sym);
                }
                for sym in program.use_range(inst) {
                    info.gen.insert(sym);
                }
            }
        }
    }

    fn start_block(&mut self, _program: &Program, block: Block) {
        self.blocks[block].outs.clear();
    }

    fn out_to(&mut self, program: &Program, from: Block, label: Edge, to: Block) {
        let src = self.blocks[from].ins.clone();
        let dest = &mut self.blocks[to].outs;
        if label.is_local() {
            dest.extend(src);
        } else {
            dest.extend(src.into_iter().filter(|&s| program.symbols.is_global(s)));
        }
    }

    fn finish_block(&mut self, _program: &Program, block: Block) -> bool {
        let info = &mut self.blocks[block];
        let mut ins: Symbols = info.outs.difference(&info.kill).copied().collect();
        ins.extend(info.gen.iter().copied());
        let changed = ins != info.ins;
        info.ins = ins;
        changed
    }

    fn render(&self, program: &Program) -> String {
        let mut os = String::new();
        writeln!(os, "Live variables on exit:").unwrap();
        for block in program.blocks() {
            if !program.block(block).reachable {
                continue;
            }
            write!(os, "  Block {}: ", program.block(block).index).unwrap();
            let outs = self.live_on_exit(block);
            if outs.is_empty() {
                write!(os, "NONE").unwrap();
            } else {
                let mut first = true;
                for &sym in outs {
                    if !first {
                        write!(os, ", ").unwrap();
                    }
                    first = false;
                    write!(os, "{}", symbol_text(program, sym)).unwrap();
                }
            }
            writeln!(os).unwrap();
        }
        os
    }
}
