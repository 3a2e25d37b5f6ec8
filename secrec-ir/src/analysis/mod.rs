//! Data-flow analyses over the control flow graph.
//!
//! An analysis implements [`DataFlowAnalysis`]: per-block state transformers
//! driven to a fixed point by the worklist engine in
//! [`DataFlowAnalysisRunner`]. Forward analyses derive a block's `in` value
//! from its predecessors and its `out` value from a pass over the block's
//! instructions; backward analyses mirror this over successors and a reverse
//! pass.
//!
//! When several analyses are registered, the runner executes each as an
//! independent task over the shared read-only [`Program`] and joins them;
//! analyses never observe each other, so no ordering between them is
//! guaranteed, only that each result equals its sequential execution.

pub mod live_memory;
pub mod live_variables;
pub mod reachable_releases;
pub mod reaching_definitions;
pub mod reaching_jumps;

pub use live_memory::LiveMemory;
pub use live_variables::LiveVariables;
pub use reachable_releases::ReachableReleases;
pub use reaching_definitions::ReachingDefinitions;
pub use reaching_jumps::ReachingJumps;

use crate::ir::{Block, Edge, Program};
use crate::result::{IrError, IrResult};
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Direction of an analysis.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Direction {
    /// Information flows from predecessors to successors.
    Forward,
    /// Information flows from successors to predecessors.
    Backward,
}

/// A data-flow analysis driven by the worklist engine.
///
/// The lattice of every analysis must have finite height and every transfer
/// function must be monotone; all analyses in this module use finite sets of
/// instructions or symbols, which satisfies both.
pub trait DataFlowAnalysis: Send {
    /// Which way information flows.
    fn direction(&self) -> Direction;

    /// Called once before iteration starts; typically computes per-block
    /// gen/kill sets.
    fn start(&mut self, program: &Program) {
        let _ = program;
    }

    /// Reset the accumulator of `block` before its edges are merged.
    fn start_block(&mut self, program: &Program, block: Block) {
        let _ = (program, block);
    }

    /// Merge one labelled edge into the `in` accumulator of `to`.
    /// Only called on forward analyses.
    fn in_from(&mut self, program: &Program, from: Block, label: Edge, to: Block) {
        let _ = (program, from, label, to);
    }

    /// Merge one labelled edge into the `out` accumulator of `to`; `from` is
    /// the successor contributing its state. Only called on backward
    /// analyses.
    fn out_to(&mut self, program: &Program, from: Block, label: Edge, to: Block) {
        let _ = (program, from, label, to);
    }

    /// Recompute the produced value of `block` from its accumulator; return
    /// true if it changed.
    fn finish_block(&mut self, program: &Program, block: Block) -> bool {
        let _ = (program, block);
        false
    }

    /// Called once after the worklist is drained.
    fn finish(&mut self) {}

    /// Render the per-block results in the program's block order.
    fn render(&self, program: &Program) -> String;
}

/// Worklist driver for a set of registered analyses.
///
/// ```no_run
/// # use secrec_ir::analysis::{DataFlowAnalysisRunner, LiveVariables, ReachingDefinitions};
/// # fn demo(program: &secrec_ir::ir::Program) -> secrec_ir::IrResult<()> {
/// let mut rd = ReachingDefinitions::new();
/// let mut lv = LiveVariables::new();
/// DataFlowAnalysisRunner::new()
///     .add_analysis(&mut rd)
///     .add_analysis(&mut lv)
///     .run(program)?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct DataFlowAnalysisRunner<'a> {
    analyses: Vec<&'a mut dyn DataFlowAnalysis>,
}

impl<'a> DataFlowAnalysisRunner<'a> {
    /// Create a runner with no analyses registered.
    pub fn new() -> Self {
        Self {
            analyses: Vec::new(),
        }
    }

    /// Register an analysis.
    pub fn add_analysis(&mut self, analysis: &'a mut dyn DataFlowAnalysis) -> &mut Self {
        self.analyses.push(analysis);
        self
    }

    /// Run every registered analysis to its fixed point over `program`.
    ///
    /// The analyses run as independent tasks sharing read access to the
    /// program; the first error (only ever an internal divergence error)
    /// aborts the run.
    pub fn run(&mut self, program: &Program) -> IrResult<&mut Self> {
        let errors: Mutex<Vec<IrError>> = Mutex::new(Vec::new());
        rayon::scope(|scope| {
            for analysis in self.analyses.iter_mut() {
                let errors = &errors;
                scope.spawn(move |_| {
                    if let Err(e) = run_one(&mut **analysis, program) {
                        errors.lock().expect("no poisoned analyses").push(e);
                    }
                });
            }
        });
        match errors.into_inner().expect("scope joined").into_iter().next() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    /// Concatenate the rendered results of every analysis.
    pub fn render(&self, program: &Program) -> String {
        let mut out = String::new();
        for analysis in &self.analyses {
            out.push_str(&analysis.render(program));
        }
        out
    }
}

/// Drive a single analysis to its fixed point.
fn run_one(analysis: &mut dyn DataFlowAnalysis, program: &Program) -> IrResult<()> {
    let mut worklist: BTreeSet<Block> = program.blocks().collect();
    // A conservative bound on worklist pops: the lattices used here are sets
    // of instructions or symbols, so their height cannot exceed the program
    // size. Exceeding the bound means a transfer function is not monotone.
    let budget = (program.num_blocks() + 1)
        * (program.num_imops() + program.symbols.len() + 2);
    let mut pops = 0usize;

    let direction = analysis.direction();
    analysis.start(program);
    while let Some(block) = worklist.pop_first() {
        pops += 1;
        if pops > budget {
            return Err(IrError::Internal(format!(
                "data-flow analysis failed to converge within {budget} steps"
            )));
        }
        if !program.block(block).reachable {
            continue;
        }
        match direction {
            Direction::Forward => {
                if program.is_program_entry(block) {
                    continue;
                }
                analysis.start_block(program, block);
                let preds: Vec<(Block, Edge)> = program.block(block).preds().collect();
                for (pred, label) in preds {
                    analysis.in_from(program, pred, label, block);
                }
                if analysis.finish_block(program, block) {
                    worklist.extend(program.block(block).succs().map(|(b, _)| b));
                }
            }
            Direction::Backward => {
                if program.is_program_exit(block) {
                    continue;
                }
                analysis.start_block(program, block);
                let succs: Vec<(Block, Edge)> = program.block(block).succs().collect();
                for (succ, label) in succs {
                    analysis.out_to(program, succ, label, block);
                }
                if analysis.finish_block(program, block) {
                    worklist.extend(program.block(block).preds().map(|(b, _)| b));
                }
            }
        }
    }
    analysis.finish();
    Ok(())
}
