//! The `CfgPrinter` utility.

use crate::ir::{Edge, Program};
use crate::write::{imop_text, symbol_text};
use core::fmt::{Display, Formatter, Result, Write};

/// A utility for pretty-printing the control flow graph of a [`Program`] in
/// the dotty graph language.
pub struct CfgPrinter<'a> {
    program: &'a Program,
}

impl<'a> CfgPrinter<'a> {
    /// Create a new CfgPrinter.
    pub fn new(program: &'a Program) -> Self {
        Self { program }
    }

    /// Write the CFG for this program to `w`.
    pub fn write(&self, w: &mut dyn Write) -> Result {
        writeln!(w, "digraph Program {{")?;
        self.block_nodes(w)?;
        self.cfg_connections(w)?;
        writeln!(w, "}}")
    }

    fn block_nodes(&self, w: &mut dyn Write) -> Result {
        for (cluster, proc) in self.program.procs().enumerate() {
            let data = self.program.proc(proc);
            writeln!(w, "    subgraph cluster_{cluster} {{")?;
            match data.name.expand() {
                Some(name) => {
                    writeln!(w, "        label=\"{}\"", symbol_text(self.program, name))?
                }
                None => writeln!(w, "        label=\"program\"")?,
            }
            for &block in data.blocks() {
                let bd = self.program.block(block);
                write!(w, "        block{} [shape=record, label=\"{{", bd.index)?;
                write!(w, "Block {}", bd.index)?;
                for &inst in bd.insts() {
                    write!(w, " | {}", imop_text(self.program, inst).replace('"', "'"))?;
                }
                writeln!(w, "}}\"]")?;
            }
            writeln!(w, "    }}")?;
        }
        Ok(())
    }

    fn cfg_connections(&self, w: &mut dyn Write) -> Result {
        for block in self.program.blocks() {
            let from = self.program.block(block).index;
            for (succ, label) in self.program.block(block).succs() {
                let to = self.program.block(succ).index;
                writeln!(
                    w,
                    "    block{from} -> block{to} [label=\"{}\"]",
                    edge_text(label)
                )?;
            }
        }
        Ok(())
    }
}

fn edge_text(label: Edge) -> String {
    let mut parts = Vec::new();
    if label.contains(Edge::JUMP) {
        parts.push("jump");
    }
    if label.contains(Edge::TRUE) {
        parts.push("+");
    }
    if label.contains(Edge::FALSE) {
        parts.push("-");
    }
    if label.contains(Edge::CALL) {
        parts.push("call");
    }
    if label.contains(Edge::RET) {
        parts.push("ret");
    }
    if label.contains(Edge::CALL_PASS) {
        parts.push("pass");
    }
    if label.contains(Edge::END) {
        parts.push("end");
    }
    parts.join(", ")
}

impl Display for CfgPrinter<'_> {
    fn fmt(&self, f: &mut Formatter) -> Result {
        self.write(f)
    }
}
