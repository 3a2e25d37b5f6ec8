//! Unreachable block removal.
//!
//! The control flow graph builder keeps unreachable blocks in the program so
//! dumps can show them; analyses skip them. This pass deletes them for good,
//! together with their instructions and every edge or back-edge touching
//! them.

use crate::ir::{Block, Program};

/// Delete every block whose reachability flag is false.
pub fn remove_unreachable_blocks(program: &mut Program) {
    let unreachable: Vec<Block> = program
        .blocks()
        .filter(|&b| !program.block(b).reachable)
        .collect();
    for block in &unreachable {
        program.remove_block(*block);
    }
    if !unreachable.is_empty() {
        log::debug!("removed {} unreachable blocks", unreachable.len());
    }
}
