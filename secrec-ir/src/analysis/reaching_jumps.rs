//! Reaching jumps analysis.

use crate::analysis::{DataFlowAnalysis, Direction};
use crate::ir::{Block, Edge, Inst, Program};
use secrec_entity::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// A set of conditional jump instructions.
pub type Jumps = BTreeSet<Inst>;

/// Forward analysis tracking which conditional jumps a block's entry was
/// reached through, and with which polarity.
///
/// A block reached over a `True` edge of jump `j` knows `j` took its positive
/// branch; over the `False` edge, its negative branch. Plain `Jump` and
/// `CallPass` edges propagate both sets unchanged. Reaching a block both ways
/// leaves `j` in both sets.
#[derive(Default)]
pub struct ReachingJumps {
    in_pos: SecondaryMap<Block, Jumps>,
    in_neg: SecondaryMap<Block, Jumps>,
    out_pos: SecondaryMap<Block, Jumps>,
    out_neg: SecondaryMap<Block, Jumps>,
}

impl ReachingJumps {
    /// Create the analysis with no results yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Conditional jumps reaching `block` with positive polarity.
    pub fn pos_jumps(&self, block: Block) -> &Jumps {
        &self.in_pos[block]
    }

    /// Conditional jumps reaching `block` with negative polarity.
    pub fn neg_jumps(&self, block: Block) -> &Jumps {
        &self.in_neg[block]
    }
}

impl DataFlowAnalysis for ReachingJumps {
    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn start(&mut self, _program: &Program) {
        self.in_pos.clear();
        self.in_neg.clear();
        self.out_pos.clear();
        self.out_neg.clear();
    }

    fn start_block(&mut self, _program: &Program, block: Block) {
        self.in_pos[block].clear();
        self.in_neg[block].clear();
    }

    fn in_from(&mut self, program: &Program, from: Block, label: Edge, to: Block) {
        if label.intersects(Edge::JUMP | Edge::CALL_PASS) {
            let pos = self.out_pos[from].clone();
            let neg = self.out_neg[from].clone();
            self.in_pos[to].extend(pos);
            self.in_neg[to].extend(neg);
        }

        if label.contains(Edge::FALSE) {
            let cjump = program.block(from).last_inst();
            debug_assert!(program.imop(cjump).op.is_cond_jump());
            let mut pos = self.out_pos[from].clone();
            pos.remove(&cjump);
            let neg = self.out_neg[from].clone();
            self.in_pos[to].extend(pos);
            let in_neg = &mut self.in_neg[to];
            in_neg.extend(neg);
            in_neg.insert(cjump);
        }

        if label.contains(Edge::TRUE) {
            let cjump = program.block(from).last_inst();
            debug_assert!(program.imop(cjump).op.is_cond_jump());
            let mut neg = self.out_neg[from].clone();
            neg.remove(&cjump);
            let pos = self.out_pos[from].clone();
            self.in_neg[to].extend(neg);
            let in_pos = &mut self.in_pos[to];
            in_pos.extend(pos);
            in_pos.insert(cjump);
        }
    }

    fn finish_block(&mut self, _program: &Program, block: Block) -> bool {
        let mut changed = false;

        if self.in_neg[block] != self.out_neg[block] {
            changed = true;
            self.out_neg[block] = self.in_neg[block].clone();
        }

        if self.in_pos[block] != self.out_pos[block] {
            changed = true;
            self.out_pos[block] = self.in_pos[block].clone();
        }

        changed
    }

    fn finish(&mut self) {
        self.out_pos.clear();
        self.out_neg.clear();
    }

    fn render(&self, program: &Program) -> String {
        let mut os = String::new();
        writeln!(os, "Reaching jumps analysis results:").unwrap();
        for block in program.blocks() {
            if !program.block(block).reachable {
                continue;
            }
            write!(os, "  Block {}: ", program.block(block).index).unwrap();

            // Collect every jump with its polarity marker: `+` if only
            // positive, `-` if only negative, `*` if both.
            let mut jumps: BTreeMap<u32, char> = BTreeMap::new();
            for &j in &self.in_pos[block] {
                jumps.insert(program.imop(j).index, '+');
            }
            for &j in &self.in_neg[block] {
                jumps
                    .entry(program.imop(j).index)
                    .and_modify(|c| *c = '*')
                    .or_insert('-');
            }

            if jumps.is_empty() {
                write!(os, "NONE").unwrap();
            } else {
                let mut first = true;
                for (index, polarity) in jumps {
                    if !first {
                        write!(os, ", ").unwrap();
                    }
                    first = false;
                    write!(os, "{index}{polarity}").unwrap();
                }
            }
            writeln!(os).unwrap();
        }
        os
    }
}
