//! Reaching definitions analysis.

use crate::analysis::{DataFlowAnalysis, Direction};
use crate::ir::{Block, Edge, Inst, Program, Sym};
use crate::write::symbol_text;
use secrec_entity::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// The instructions that may have last defined a symbol.
pub type Defs = BTreeSet<Inst>;
/// Per-symbol reaching definitions.
pub type SymDefs = BTreeMap<Sym, Defs>;

/// Forward analysis computing, for every block, which instruction may have
/// produced the current value of each variable on block entry.
///
/// The transfer function of an instruction redefines every symbol in its def
/// set to a singleton; merging takes the per-symbol union. Interprocedural
/// edges propagate only globally scoped variables.
#[derive(Default)]
pub struct ReachingDefinitions {
    ins: SecondaryMap<Block, SymDefs>,
    outs: SecondaryMap<Block, SymDefs>,
}

impl ReachingDefinitions {
    /// Create the analysis with no results yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The definitions reaching the entry of `block`; empty until the
    /// analysis has run.
    pub fn reaching_defs(&self, block: Block) -> &SymDefs {
        &self.ins[block]
    }

    fn make_outs(program: &Program, block: Block, ins: &SymDefs) -> SymDefs {
        let mut out = ins.clone();
        for &inst in program.block(block).insts() {
            for sym in program.def_range(inst) {
                let defs = out.entry(sym).or_default();
                defs.clear();
                defs.insert(inst);
            }
        }
        out
    }
}

impl DataFlowAnalysis for ReachingDefinitions {
    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn start(&mut self, program: &Program) {
        self.ins.clear();
        self.outs.clear();
        // Initialize the OUT set of the entry block; the worklist never
        // visits it.
        let entry = program.entry_block();
        let out = Self::make_outs(program, entry, &self.ins[entry]);
        self.outs[entry] = out;
    }

    fn start_block(&mut self, _program: &Program, block: Block) {
        self.ins[block].clear();
    }

    fn in_from(&mut self, program: &Program, from: Block, label: Edge, to: Block) {
        let global_only = !label.is_local();
        let src = &self.outs[from];
        let dest = &mut self.ins[to];
        for (&sym, defs) in src {
            if !global_only || program.symbols.is_global(sym) {
                dest.entry(sym).or_default().extend(defs.iter().copied());
            }
        }
    }

    fn finish_block(&mut self, program: &Program, block: Block) -> bool {
        let out = Self::make_outs(program, block, &self.ins[block]);
        let changed = self.outs[block] != out;
        self.outs[block] = out;
        changed
    }

    fn finish(&mut self) {
        self.outs.clear();
    }

    fn render(&self, program: &Program) -> String {
        let mut os = String::new();
        writeln!(os, "Reaching definitions analysis results:").unwrap();
        for block in program.blocks() {
            if !program.block(block).reachable {
                continue;
            }
            write!(os, "  Block {}: ", program.block(block).index).unwrap();
            let sd = &self.ins[block];
            if sd.is_empty() {
                writeln!(os, " NONE").unwrap();
                continue;
            }
            writeln!(os).unwrap();
            for (&sym, defs) in sd {
                write!(os, "      {}: ", symbol_text(program, sym)).unwrap();
                let mut first = true;
                for &def in defs {
                    if !first {
                        write!(os, ", ").unwrap();
                    }
                    first = false;
                    write!(os, "{}", program.imop(def).index).unwrap();
                }
                writeln!(os).unwrap();
            }
        }
        os
    }
}
