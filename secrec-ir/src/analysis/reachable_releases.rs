//! Reachable releases analysis.

use crate::analysis::{DataFlowAnalysis, Direction};
use crate::ir::{Block, Edge, Inst, Opcode, Program, Sym};
use crate::write::symbol_text;
use secrec_entity::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// The release instructions reachable for one symbol.
pub type Domain = BTreeSet<Inst>;
/// Per-symbol reachable releases.
pub type Values = BTreeMap<Sym, Domain>;

/// Backward analysis computing which RELEASE instructions a control path may
/// still reach for each array symbol, with no intervening redefinition.
///
/// Moving upwards: a definition of a symbol erases its binding, a RELEASE
/// generates itself for its argument, and a RETURN generates itself for
/// every array it uses (returning hands the arrays back to the caller, which
/// releases them). Merging is the pointwise union; interprocedural edges
/// propagate only globally scoped symbols.
#[derive(Default)]
pub struct ReachableReleases {
    gen: SecondaryMap<Block, Values>,
    kill: SecondaryMap<Block, BTreeSet<Sym>>,
    ins: SecondaryMap<Block, Values>,
    outs: SecondaryMap<Block, Values>,
}

impl ReachableReleases {
    /// Create the analysis with no results yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The releases reachable from the exit of `block`; empty until the
    /// analysis has run.
    pub fn released_on_exit(&self, block: Block) -> &Values {
        &self.outs[block]
    }

    /// Apply the transfer of a single instruction to `vals`, moving upwards.
    pub fn update(program: &Program, inst: Inst, vals: &mut Values) {
        for sym in program.def_range(inst) {
            vals.remove(&sym);
        }
        let data = program.imop(inst);
        match data.op {
            Opcode::Release => {
                if let Some(arg) = data.arg1.expand() {
                    vals.entry(arg).or_default().insert(inst);
                }
            }
            Opcode::Return => {
                for sym in program.use_range(inst) {
                    if program.symbols.is_array(sym) {
                        vals.entry(sym).or_default().insert(inst);
                    }
                }
            }
            _ => {}
        }
    }
}

impl DataFlowAnalysis for ReachableReleases {
    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn start(&mut self, program: &Program) {
        self.gen.clear();
        self.kill.clear();
        self.ins.clear();
        self.outs.clear();

        for block in program.blocks() {
            let mut gen = Values::new();
            let mut kill = BTreeSet::new();
            for &inst in program.block(block).insts().iter().rev() {
                for sym in program.def_range(inst) {
                    gen.remove(&sym);
                    kill.insert(sym);
                }
                let data = program.imop(inst);
                match data.op {
                    Opcode::Release => {
                        if let Some(arg) = data.arg1.expand() {
                            gen.entry(arg).or_default().insert(inst);
                        }
                    }
                    Opcode::Return => {
                        for sym in program.use_range(inst) {
                            if program.symbols.is_array(sym) {
                                gen.entry(sym).or_default().insert(inst);
                            }
                        }
                    }
                    _ => {}
                }
            }
            self.gen[block] = gen;
            self.kill[block] = kill;
        }
    }

    fn start_block(&mut self, _program: &Program, block: Block) {
        self.outs[block].clear();
    }

    fn out_to(&mut self, program: &Program, from: Block, label: Edge, to: Block) {
        let src = &self.ins[from];
        let dest = &mut self.outs[to];
        for (&sym, insts) in src {
            if label.is_local() || program.symbols.is_global(sym) {
                dest.entry(sym).or_default().extend(insts.iter().copied());
            }
        }
    }

    fn finish_block(&mut self, _program: &Program, block: Block) -> bool {
        let mut ins = self.outs[block].clone();
        for sym in &self.kill[block] {
            ins.remove(sym);
        }
        for (&sym, insts) in &self.gen[block] {
            ins.entry(sym).or_default().extend(insts.iter().copied());
        }
        let changed = self.ins[block] != ins;
        self.ins[block] = ins;
        changed
    }

    fn render(&self, program: &Program) -> String {
        let mut os = String::new();
        writeln!(os, "Reachable releases:").unwrap();
        for block in program.blocks() {
            if !program.block(block).reachable {
                continue;
            }
            write!(os, "  Block {}: ", program.block(block).index).unwrap();
            let outs = self.released_on_exit(block);
            if outs.is_empty() {
                writeln!(os, "NONE").unwrap();
                continue;
            }
            writeln!(os).unwrap();
            for (&sym, insts) in outs {
                write!(os, "      {}: ", symbol_text(program, sym)).unwrap();
                let mut first = true;
                for &inst in insts {
                    if !first {
                        write!(os, ", ").unwrap();
                    }
                    first = false;
                    write!(os, "{}", program.imop(inst).index).unwrap();
                }
                writeln!(os).unwrap();
            }
        }
        os
    }
}
