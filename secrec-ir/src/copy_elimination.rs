//! Redundant array copy elimination.
//!
//! SecreC arrays have value semantics, so the code generator conservatively
//! materializes a fresh array for every assignment. When the fresh array is
//! never read or written afterwards, because its only remaining use is a
//! RELEASE, the copy can share the source array instead: the copy becomes a
//! plain aliasing assignment and the releases of both halves of the pair are
//! dropped.

use crate::analysis::reachable_releases::Values;
use crate::analysis::{DataFlowAnalysisRunner, LiveMemory, ReachableReleases};
use crate::ir::{Inst, Opcode, Program};
use std::collections::BTreeSet;

/// Releases reachable from the point just after `inst`, recovered by
/// re-walking its block backward from the block-exit state.
fn releases_after(program: &Program, inst: Inst, rr: &ReachableReleases) -> Values {
    let block = program.imop(inst).block.expect("instruction is in a block");
    let mut after = rr.released_on_exit(block).clone();
    for &i in program.block(block).insts().iter().rev() {
        if i == inst {
            break;
        }
        ReachableReleases::update(program, i, &mut after);
    }
    after
}

/// Rewrite dead array copies into plain assignments and drop the releases of
/// their operand pairs.
///
/// The pass is non-fatal: if the analyses cannot run it leaves the program
/// unchanged and records an informational message.
pub fn eliminate_redundant_copies(program: &mut Program) {
    let mut reachable_releases = ReachableReleases::new();
    let mut live_memory = LiveMemory::new();

    let run = DataFlowAnalysisRunner::new()
        .add_analysis(&mut reachable_releases)
        .add_analysis(&mut live_memory)
        .run(program)
        .map(|_| ());
    if let Err(e) = run {
        log::info!("copy elimination skipped, leaving the program unchanged: {e}");
        return;
    }

    let copies = live_memory.dead_copies(program);
    let mut releases: BTreeSet<Inst> = BTreeSet::new();
    for &copy in &copies {
        let after = releases_after(program, copy, &reachable_releases);
        let data = program.imop(copy);
        if let Some(dest) = data.dest.expand() {
            if let Some(set) = after.get(&dest) {
                releases.extend(set.iter().copied());
            }
        }
        if let Some(src) = data.arg1.expand() {
            if let Some(set) = after.get(&src) {
                releases.extend(set.iter().copied());
            }
        }
    }

    for release in releases {
        if program.imop(release).op == Opcode::Release {
            program.remove_imop(release);
        }
    }

    for copy in &copies {
        program.replace_with_assign(*copy);
    }

    log::debug!("copy elimination rewrote {} dead copies", copies.len());
}
