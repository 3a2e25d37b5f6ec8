//! Optimizer passes: copy elimination and unreachable block removal.

mod common;

use common::{assert_edge_symmetry, Emitter};
use secrec_ir::analysis::{DataFlowAnalysis, DataFlowAnalysisRunner, LiveVariables};
use secrec_ir::build_program;
use secrec_ir::copy_elimination::eliminate_redundant_copies;
use secrec_ir::ir::{Block, ImopData, Opcode, Program};
use secrec_ir::unreachable_code::remove_unreachable_blocks;

/// An intermediate array copy whose only use is a subsequent RELEASE on
/// both source and destination.
fn emit_dead_copy() -> Program {
    let mut e = Emitter::new();
    e.icode.push_comment("main");
    let x = e.array("x");
    let y = e.array("y");
    let zero = e.int(0);
    let ten = e.int(10);

    e.push(ImopData::binary(Opcode::Alloc, x, zero, ten)); // index 2
    e.copy(y, x, ten); // index 3
    e.release(y); // index 4
    e.release(x); // index 5
    let jump = e.jump();
    let end = e.end();
    let le = e.label();
    e.place_label(le, end);
    e.wire_jump(jump, le);

    build_program(e.finish()).unwrap()
}

/// The same program written without the copy in the first place.
fn emit_without_copy() -> Program {
    let mut e = Emitter::new();
    e.icode.push_comment("main");
    let x = e.array("x");
    let y = e.array("y");
    let zero = e.int(0);
    let ten = e.int(10);

    e.push(ImopData::binary(Opcode::Alloc, x, zero, ten));
    e.assign(y, x);
    let jump = e.jump();
    let end = e.end();
    let le = e.label();
    e.place_label(le, end);
    e.wire_jump(jump, le);

    build_program(e.finish()).unwrap()
}

#[test]
fn copy_elimination_rewrites_the_pair() {
    let mut program = emit_dead_copy();
    eliminate_redundant_copies(&mut program);

    let dump = program.to_string();
    assert!(!dump.contains("RELEASE"), "{dump}");
    assert!(dump.contains("y = x;"), "{dump}");

    // The rewritten copy keeps its position and index.
    let entry = program.entry_block();
    let insts = program.block(entry).insts();
    let indexes: Vec<u32> = insts.iter().map(|&i| program.imop(i).index).collect();
    assert_eq!(indexes, vec![1, 2, 3, 6]);
    let rewritten = insts[2];
    assert_eq!(program.imop(rewritten).op, Opcode::Assign);
    assert!(program.imop(rewritten).arg2.is_none());

    assert_edge_symmetry(&program);
}

#[test]
fn copy_elimination_matches_a_program_without_the_copy() {
    let mut program = emit_dead_copy();
    eliminate_redundant_copies(&mut program);

    let reference = emit_without_copy();

    let mut lv = LiveVariables::new();
    DataFlowAnalysisRunner::new()
        .add_analysis(&mut lv)
        .run(&program)
        .unwrap();
    let mut lv_ref = LiveVariables::new();
    DataFlowAnalysisRunner::new()
        .add_analysis(&mut lv_ref)
        .run(&reference)
        .unwrap();

    // Same block shapes, same live-on-exit everywhere.
    assert_eq!(lv.render(&program), lv_ref.render(&reference));
}

#[test]
fn copy_elimination_leaves_live_copies_alone() {
    // The destination is read after the copy, so nothing may change.
    let mut e = Emitter::new();
    e.icode.push_comment("main");
    let x = e.array("x");
    let y = e.array("y");
    let t = e.var("t");
    let zero = e.int(0);
    let ten = e.int(10);

    e.push(ImopData::binary(Opcode::Alloc, x, zero, ten));
    e.copy(y, x, ten);
    e.push(ImopData::binary(Opcode::Load, t, y, zero));
    e.release(y);
    e.release(x);
    e.end();

    let mut program = build_program(e.finish()).unwrap();
    let before = program.to_string();
    eliminate_redundant_copies(&mut program);
    assert_eq!(before, program.to_string());
}

#[test]
fn unreachable_block_removal() {
    // A branch never taken leaves an unreachable block behind.
    let mut e = Emitter::new();
    e.icode.push_comment("main");
    let jump = e.jump(); // index 2
    let dead_jump = e.jump(); // index 3, unreachable
    let end = e.end(); // index 4

    let le = e.label();
    e.place_label(le, end);
    e.wire_jump(jump, le);
    e.wire_jump(dead_jump, le);

    let mut program = build_program(e.finish()).unwrap();
    let all: Vec<Block> = program.blocks().collect();
    assert_eq!(all.len(), 3);
    let dead = all[1];
    assert!(!program.block(dead).reachable);

    // Both jumps are registered at the END instruction.
    let end_inst = program.block(program.exit_block()).first_inst();
    assert_eq!(program.imop(end_inst).incoming.len(), 2);

    let reachable_before: Vec<Block> = program
        .blocks()
        .filter(|&b| program.block(b).reachable)
        .collect();

    remove_unreachable_blocks(&mut program);

    // Only reachable blocks remain, untouched.
    let after: Vec<Block> = program.blocks().collect();
    assert_eq!(after, reachable_before);
    assert!(after.iter().all(|&b| program.block(b).reachable));
    assert_edge_symmetry(&program);

    // Every remaining back-edge refers to a surviving instruction: the dead
    // jump's registration is gone, the live one stays.
    let incoming = &program.imop(end_inst).incoming;
    assert_eq!(incoming.len(), 1);
    assert!(incoming.contains(&jump));

    // The exit block's predecessors shrank symmetrically.
    let exit_preds: Vec<Block> = program
        .block(program.exit_block())
        .preds()
        .map(|(b, _)| b)
        .collect();
    assert_eq!(exit_preds, vec![program.entry_block()]);
}

#[test]
fn removal_then_analysis_is_sound() {
    let mut program = {
        let mut e = Emitter::new();
        e.icode.push_comment("main");
        let x = e.var("x");
        let one = e.int(1);
        let jump = e.jump();
        e.assign(x, one); // unreachable definition
        let target = e.assign(x, one);
        let end = e.end();
        let le = e.label();
        e.place_label(le, target);
        e.wire_jump(jump, le);
        let _ = end;
        build_program(e.finish()).unwrap()
    };

    remove_unreachable_blocks(&mut program);

    // Analyses over the trimmed program still run to a fixed point.
    let mut lv = LiveVariables::new();
    DataFlowAnalysisRunner::new()
        .add_analysis(&mut lv)
        .run(&program)
        .unwrap();
}
