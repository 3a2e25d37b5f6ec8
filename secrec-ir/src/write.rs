//! Converting a [`Program`] to text.
//!
//! The dump lists, for every block, its predecessors and successors split by
//! edge label class, followed by the block's instructions. The text is for
//! golden tests and debugging only; it is lossy and cannot be parsed back.

use crate::ir::{Block, ConstantValue, Edge, Inst, Opcode, Program, Sym, SymbolData};
use core::fmt::{self, Write};

/// Render a symbol the way the dump shows operands.
pub fn symbol_text(program: &Program, sym: Sym) -> String {
    match program.symbols.data(sym) {
        SymbolData::Variable { name, .. }
        | SymbolData::Procedure { name, .. }
        | SymbolData::Template { name }
        | SymbolData::Kind { name }
        | SymbolData::Domain { name, .. }
        | SymbolData::Dimensionality { name } => program.context.str(*name).to_string(),
        SymbolData::Constant { value, .. } => match value {
            ConstantValue::Bool(b) => b.to_string(),
            ConstantValue::Int(c) => c.to_string(),
            ConstantValue::Float(c) => c.to_string(),
            ConstantValue::Str(id) => format!("\"{}\"", program.context.str(*id)),
        },
        SymbolData::Label { target } => match target.expand() {
            Some(inst) => format!("label {}", program.imop(inst).index),
            None => "label ?".to_string(),
        },
    }
}

fn operand(program: &Program, sym: secrec_entity::packed_option::PackedOption<Sym>) -> String {
    sym.map(|s| symbol_text(program, s))
        .unwrap_or_else(|| "_".to_string())
}

fn jump_target_index(program: &Program, inst: Inst) -> u32 {
    program.imop(inst)
        .dest
        .expand()
        .and_then(|label| program.symbols.label_target(label))
        .map(|target| program.imop(target).index)
        .unwrap_or(0)
}

/// Render one instruction the way the dump shows it.
pub fn imop_text(program: &Program, inst: Inst) -> String {
    let data = program.imop(inst);
    let d = |p: &Program| operand(p, data.dest);
    let a1 = |p: &Program| operand(p, data.arg1);
    let a2 = |p: &Program| operand(p, data.arg2);
    let binop = |p: &Program, op: &str| format!("{} = {} {op} {};", d(p), a1(p), a2(p));
    match data.op {
        Opcode::Comment => format!("// {}", comment_payload(program, inst)),
        Opcode::VarIntro => format!("{};", d(program)),
        Opcode::Assign => {
            if data.arg2.is_some() {
                format!("{} = {} ({});", d(program), a1(program), a2(program))
            } else {
                format!("{} = {};", d(program), a1(program))
            }
        }
        Opcode::Cast => format!("{} = (cast) {};", d(program), a1(program)),
        Opcode::Alloc => format!("{} = ALLOC {}, {};", d(program), a1(program), a2(program)),
        Opcode::Load | Opcode::Subscript => {
            format!("{} = {}[{}];", d(program), a1(program), a2(program))
        }
        Opcode::Store => format!("{}[{}] = {};", d(program), a1(program), a2(program)),
        Opcode::Wildcard => format!("{} = {}[*];", d(program), a1(program)),
        Opcode::Uneg => format!("{} = !{};", d(program), a1(program)),
        Opcode::Uminus => format!("{} = -{};", d(program), a1(program)),
        Opcode::MatrixMul => binop(program, "#"),
        Opcode::Mul => binop(program, "*"),
        Opcode::Div => binop(program, "/"),
        Opcode::Mod => binop(program, "%"),
        Opcode::Add => binop(program, "+"),
        Opcode::Sub => binop(program, "-"),
        Opcode::Eq => binop(program, "=="),
        Opcode::Ne => binop(program, "!="),
        Opcode::Le => binop(program, "<="),
        Opcode::Lt => binop(program, "<"),
        Opcode::Ge => binop(program, ">="),
        Opcode::Gt => binop(program, ">"),
        Opcode::Land => binop(program, "&&"),
        Opcode::Lor => binop(program, "||"),
        Opcode::PutParam => format!("PUTPARAM {};", a1(program)),
        Opcode::Call => {
            if data.dest.is_some() {
                format!("{} = CALL {};", d(program), a1(program))
            } else {
                format!("CALL {};", a1(program))
            }
        }
        Opcode::RetClean => "RETCLEAN;".to_string(),
        Opcode::Return => format!("RETURN {};", a1(program)),
        Opcode::ReturnVoid => "RETURN;".to_string(),
        Opcode::End => "END".to_string(),
        Opcode::Release => format!("RELEASE {};", a1(program)),
        Opcode::Error => format!("ERROR {};", a1(program)),
        Opcode::Jump => format!("GOTO {};", jump_target_index(program, inst)),
        Opcode::Jt => format!(
            "IF ({}) GOTO {};",
            a1(program),
            jump_target_index(program, inst)
        ),
        Opcode::Jf => format!(
            "IF (!{}) GOTO {};",
            a1(program),
            jump_target_index(program, inst)
        ),
        Opcode::Je => cond_jump(program, inst, "=="),
        Opcode::Jne => cond_jump(program, inst, "!="),
        Opcode::Jle => cond_jump(program, inst, "<="),
        Opcode::Jlt => cond_jump(program, inst, "<"),
        Opcode::Jge => cond_jump(program, inst, ">="),
        Opcode::Jgt => cond_jump(program, inst, ">"),
    }
}

fn cond_jump(program: &Program, inst: Inst, op: &str) -> String {
    let data = program.imop(inst);
    format!(
        "IF ({} {op} {}) GOTO {};",
        operand(program, data.arg1),
        operand(program, data.arg2),
        jump_target_index(program, inst)
    )
}

fn comment_payload(program: &Program, inst: Inst) -> String {
    match program.imop(inst).arg1.expand() {
        Some(sym) => match program.symbols.data(sym) {
            SymbolData::Constant {
                value: ConstantValue::Str(id),
                ..
            } => program.context.str(*id).to_string(),
            _ => symbol_text(program, sym),
        },
        None => String::new(),
    }
}

/// Print one neighbour listing line: reachable block indexes first, then
/// unreachable ones in parentheses.
fn write_block_list<'a>(
    f: &mut fmt::Formatter,
    prefix: &str,
    blocks: impl Iterator<Item = &'a Block>,
    program: &Program,
) -> fmt::Result {
    let mut reachable = Vec::new();
    let mut unreachable = Vec::new();
    for &b in blocks {
        let data = program.block(b);
        if data.reachable {
            reachable.push(data.index);
        } else {
            unreachable.push(data.index);
        }
    }
    if reachable.is_empty() && unreachable.is_empty() {
        return Ok(());
    }
    f.write_str(prefix)?;
    reachable.sort_unstable();
    unreachable.sort_unstable();
    for (i, index) in reachable.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{index}")?;
    }
    if !reachable.is_empty() && !unreachable.is_empty() {
        f.write_char(' ')?;
    }
    if !unreachable.is_empty() {
        f.write_char('(')?;
        for (i, index) in unreachable.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{index}")?;
        }
        f.write_char(')')?;
    }
    f.write_char('\n')
}

fn write_neighbours(
    f: &mut fmt::Formatter,
    program: &Program,
    block: Block,
) -> fmt::Result {
    let data = program.block(block);
    let pred_classes = [
        (Edge::JUMP | Edge::CALL_PASS | Edge::END, "  ..... From: "),
        (Edge::FALSE, "  ... From -: "),
        (Edge::TRUE, "  ... From +: "),
        (Edge::CALL, "  . FromCall: "),
        (Edge::RET, "  .. FromRet: "),
    ];
    for (mask, prefix) in pred_classes {
        let members: Vec<Block> = data
            .preds
            .iter()
            .filter(|(_, &label)| label.intersects(mask))
            .map(|(&b, _)| b)
            .collect();
        write_block_list(f, prefix, members.iter(), program)?;
    }
    let succ_classes = [
        (Edge::JUMP | Edge::CALL_PASS | Edge::END, "  ....... To: "),
        (Edge::FALSE, "  ..... To -: "),
        (Edge::TRUE, "  ..... To +: "),
        (Edge::CALL, "  ... ToCall: "),
        (Edge::RET, "  .... ToRet: "),
    ];
    for (mask, prefix) in succ_classes {
        let members: Vec<Block> = data
            .succs
            .iter()
            .filter(|(_, &label)| label.intersects(mask))
            .map(|(&b, _)| b)
            .collect();
        write_block_list(f, prefix, members.iter(), program)?;
    }
    Ok(())
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for proc in self.procs() {
            let data = self.proc(proc);
            match data.name.expand() {
                Some(name) => writeln!(f, "PROCEDURE {}", symbol_text(self, name))?,
                None => writeln!(f, "PROGRAM")?,
            }
            for &block in data.blocks() {
                let bd = self.block(block);
                write!(f, "  Block {}", bd.index)?;
                if !bd.reachable {
                    write!(f, " [REMOVED]")?;
                }
                writeln!(f)?;
                write_neighbours(f, self, block)?;
                writeln!(f, "    Code:")?;
                for &inst in bd.insts() {
                    writeln!(
                        f,
                        "      {}  {}",
                        self.imop(inst).index,
                        imop_text(self, inst)
                    )?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
