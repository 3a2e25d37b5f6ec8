//! Live memory analysis.

use crate::analysis::{DataFlowAnalysis, Direction};
use crate::ir::{Block, Edge, Inst, Opcode, Program, Sym};
use crate::write::symbol_text;
use bitflags::bitflags;
use secrec_entity::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

bitflags! {
    /// How the memory of an array symbol is observed further down the
    /// control flow.
    #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct Liveness: u8 {
        /// Some element of the array is read.
        const READ = 0x1;
        /// Some element of the array is written.
        const WRITE = 0x2;
    }
}

/// Per-symbol memory liveness.
pub type Values = BTreeMap<Sym, Liveness>;

/// Backward analysis tracking how array memory is used ahead of every
/// program point.
///
/// A RELEASE is not a use: an array whose liveness is empty at some point is
/// only ever released afterwards. That makes array copies with empty
/// destination liveness *dead copies*: the fresh array is never read or
/// written, so the copy can be turned into a plain aliasing assignment and
/// the releases of the pair dropped. [`LiveMemory::dead_copies`] reports
/// them.
#[derive(Default)]
pub struct LiveMemory {
    ins: SecondaryMap<Block, Values>,
    outs: SecondaryMap<Block, Values>,
}

impl LiveMemory {
    /// Create the analysis with no results yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the transfer of a single instruction to `vals`, moving upwards.
    pub fn update(program: &Program, inst: Inst, vals: &mut Values) {
        let data = program.imop(inst);
        // An element store mutates its destination in place; every other
        // definition produces a whole new array and kills the binding.
        if data.op != Opcode::Store {
            for sym in program.def_range(inst) {
                if program.symbols.is_array(sym) {
                    vals.remove(&sym);
                }
            }
        }
        match data.op {
            Opcode::Release | Opcode::Comment | Opcode::VarIntro => {}
            Opcode::Store => {
                if let Some(dest) = data.dest.expand() {
                    if program.symbols.is_array(dest) {
                        *vals.entry(dest).or_default() |= Liveness::WRITE;
                    }
                }
                if let Some(value) = data.arg2.expand() {
                    if program.symbols.is_array(value) {
                        *vals.entry(value).or_default() |= Liveness::READ;
                    }
                }
            }
            _ => {
                for sym in program.use_range(inst) {
                    if program.symbols.is_array(sym) {
                        *vals.entry(sym).or_default() |= Liveness::READ;
                    }
                }
            }
        }
    }

    /// The array copies whose destination is only ever released afterwards.
    pub fn dead_copies(&self, program: &Program) -> BTreeSet<Inst> {
        let mut dead = BTreeSet::new();
        for block in program.blocks() {
            if !program.block(block).reachable {
                continue;
            }
            let mut vals = self.outs[block].clone();
            for &inst in program.block(block).insts().iter().rev() {
                let data = program.imop(inst);
                if data.is_array_copy() {
                    let dest = data.dest.expand().expect("copies write a destination");
                    if program.symbols.is_array(dest)
                        && vals.get(&dest).copied().unwrap_or_default().is_empty()
                    {
                        dead.insert(inst);
                    }
                }
                Self::update(program, inst, &mut vals);
            }
        }
        dead
    }
}

impl DataFlowAnalysis for LiveMemory {
    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn start(&mut self, _program: &Program) {
        self.ins.clear();
        self.outs.clear();
    }

    fn start_block(&mut self, _program: &Program, block: Block) {
        self.outs[block].clear();
    }

    fn out_to(&mut self, program: &Program, from: Block, label: Edge, to: Block) {
        let src = &self.ins[from];
        let dest = &mut self.outs[to];
        for (&sym, &liveness) in src {
            if label.is_local() || program.symbols.is_global(sym) {
                *dest.entry(sym).or_default() |= liveness;
            }
        }
    }

    fn finish_block(&mut self, program: &Program, block: Block) -> bool {
        let mut ins = self.outs[block].clone();
        for &inst in program.block(block).insts().iter().rev() {
            Self::update(program, inst, &mut ins);
        }
        let changed = self.ins[block] != ins;
        self.ins[block] = ins;
        changed
    }

    fn render(&self, program: &Program) -> String {
        let mut os = String::new();
        writeln!(os, "Memory liveness on exit:").unwrap();
        for block in program.blocks() {
            if !program.block(block).reachable {
                continue;
            }
            write!(os, "  Block {}: ", program.block(block).index).unwrap();
            let vals = &self.outs[block];
            if vals.is_empty() {
                write!(os, "NONE").unwrap();
            } else {
                let mut first = true;
                for (&sym, &liveness) in vals {
                    if !first {
                        write!(os, ", ").unwrap();
                    }
                    first = false;
                    let marker = match (
                        liveness.contains(Liveness::READ),
                        liveness.contains(Liveness::WRITE),
                    ) {
                        (true, true) => "rw",
                        (true, false) => "r",
                        (false, true) => "w",
                        (false, false) => "dead",
                    };
                    write!(os, "{} [{marker}]", symbol_text(program, sym)).unwrap();
                }
            }
            writeln!(os).unwrap();
        }
        os
    }
}
