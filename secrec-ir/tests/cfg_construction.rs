//! Control flow graph construction over hand-emitted instruction lists.

mod common;

use common::{assert_edge_symmetry, assert_partition, Emitter};
use secrec_ir::build_program;
use secrec_ir::cfg_printer::CfgPrinter;
use secrec_ir::copy_elimination::eliminate_redundant_copies;
use secrec_ir::ir::{Block, Edge, Opcode};
use secrec_ir::IrError;

/// A diamond: `if (c) x = 1; else x = 0;` followed by END.
fn emit_diamond() -> (secrec_ir::ir::Program, Vec<Block>) {
    let mut e = Emitter::new();
    e.icode.push_comment("main");
    let c = e.var("c");
    let x = e.var("x");
    let zero = e.int(0);
    let one = e.int(1);

    let jt = e.cond_jump(Opcode::Jt, c);
    e.assign(x, zero);
    let jump = e.jump();
    let then_inst = e.assign(x, one);
    let end = e.end();

    let lt = e.label();
    e.place_label(lt, then_inst);
    let le = e.label();
    e.place_label(le, end);
    e.wire_jump(jt, lt);
    e.wire_jump(jump, le);

    let program = build_program(e.finish()).unwrap();
    let blocks: Vec<Block> = program.blocks().collect();
    (program, blocks)
}

#[test]
fn diamond_edges() {
    let (program, blocks) = emit_diamond();
    assert_eq!(blocks.len(), 4);
    let (header, else_b, then_b, join) = (blocks[0], blocks[1], blocks[2], blocks[3]);
    assert_eq!(program.block(header).succs().count(), 2);

    let succ = |b: Block, t: Block| {
        program
            .block(b)
            .succs()
            .find(|&(s, _)| s == t)
            .map(|(_, l)| l)
    };
    assert_eq!(succ(header, then_b), Some(Edge::TRUE));
    assert_eq!(succ(header, else_b), Some(Edge::FALSE));
    assert_eq!(succ(else_b, join), Some(Edge::JUMP));
    assert_eq!(succ(then_b, join), Some(Edge::JUMP));
    assert_eq!(succ(join, header), None);

    assert_edge_symmetry(&program);
    assert_partition(&program, 6);
    for &b in &blocks {
        assert!(program.block(b).reachable);
    }
    assert_eq!(program.entry_block(), header);
    assert_eq!(program.exit_block(), join);
}

#[test]
fn back_edges_match_wiring() {
    let (program, blocks) = emit_diamond();
    let header = blocks[0];
    let jt = program.block(header).last_inst();
    assert!(program.imop(jt).op.is_cond_jump());

    // The jump is registered in its target's incoming set.
    let then_first = program.block(blocks[2]).first_inst();
    assert!(program.imop(then_first).incoming.contains(&jt));
}

#[test]
fn call_and_return_edges() {
    // main calls f; every RETURN of f gets a Ret edge to the RETCLEAN
    // block.
    let mut e = Emitter::new();
    let f = e.proc_sym("f");
    e.icode.push_comment("main");
    // Body of f goes after main, so the call is a forward reference.
    let (call, _clean) = e.call(f);
    e.end();
    let f_first = e.begin_proc(f, "f");
    e.return_void(f_first);

    let program = build_program(e.finish()).unwrap();
    let blocks: Vec<Block> = program.blocks().collect();
    // main: [comment, call] [retclean, end]; f: [comment, returnvoid]
    assert_eq!(blocks.len(), 3);
    let (call_b, clean_b, f_entry) = (blocks[0], blocks[1], blocks[2]);

    let succ = |b: Block, t: Block| {
        program
            .block(b)
            .succs()
            .find(|&(s, _)| s == t)
            .map(|(_, l)| l)
    };
    assert_eq!(succ(call_b, f_entry), Some(Edge::CALL));
    assert_eq!(succ(call_b, clean_b), Some(Edge::CALL_PASS));
    assert_eq!(succ(f_entry, clean_b), Some(Edge::RET));
    assert_edge_symmetry(&program);
    assert_partition(&program, 6);

    // Procedure bookkeeping.
    let procs: Vec<_> = program.procs().collect();
    assert_eq!(procs.len(), 2);
    let f_proc = procs[1];
    assert!(program.proc(f_proc).call_from.contains(&call_b));
    assert!(program.proc(f_proc).return_to.contains(&clean_b));
    assert!(program.proc(f_proc).exit_blocks.contains(&f_entry));

    // Back-edge correctness for calls and returns.
    let first = program.block(f_entry).first_inst();
    assert!(program.imop(first).incoming_calls.contains(&call));
    let ret = program.block(f_entry).last_inst();
    assert!(program.imop(first).returns.contains(&ret));

    // The anonymous leading group is not a procedure named main.
    assert_eq!(program.require_main().unwrap_err(), IrError::NoMain);
}

#[test]
fn require_main_accepts_named_main() {
    let mut e = Emitter::new();
    let main = e.proc_sym("main");
    e.icode.push_comment("start");
    let (_call, _clean) = {
        // Wire the call after the body exists.
        let call = e.push(secrec_ir::ir::ImopData::new(Opcode::Call));
        let clean = e.push(secrec_ir::ir::ImopData::new(Opcode::RetClean));
        (call, clean)
    };
    e.end();
    let first = e.begin_proc(main, "main");
    e.return_void(first);
    e.icode.set_call_dest(_call, main, _clean);

    let program = build_program(e.finish()).unwrap();
    program.require_main().unwrap();
}

#[test]
fn dump_is_stable_under_a_noop_pass() {
    let (mut program, _) = emit_diamond();
    let before = program.to_string();
    // No dead array copies anywhere: the pass must leave the program
    // unchanged.
    eliminate_redundant_copies(&mut program);
    let after = program.to_string();
    assert_eq!(before, after);
}

#[test]
fn dump_mentions_every_block_and_instruction() {
    let (program, blocks) = emit_diamond();
    let dump = program.to_string();
    for &b in &blocks {
        assert!(dump.contains(&format!("Block {}", program.block(b).index)));
    }
    for i in 1..=6 {
        assert!(dump.contains(&format!("      {i}  ")));
    }
    assert!(dump.contains("From"));
    assert!(dump.contains("To"));

    let dot = CfgPrinter::new(&program).to_string();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("block1 -> "));
}
