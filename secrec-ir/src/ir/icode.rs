//! The linear instruction list produced by code generation.
//!
//! Before control flow is recovered, the program is a flat list of
//! instructions in emission order. The list owns the instruction arena;
//! [`build_program`](crate::flowgraph::build_program) later moves the arena
//! into the [`Program`](crate::ir::Program) it constructs.

use crate::context::Context;
use crate::ir::entities::{Inst, Sym};
use crate::ir::instructions::{ImopData, Opcode};
use crate::ir::symbol::SymbolTable;
use secrec_entity::PrimaryMap;

/// A growable list of instructions.
///
/// Instructions are handed out 1-based indexes equal to their position in the
/// list; [`ICodeList::reset_indexes`] renumbers after bulk mutation. Code
/// generation may also insert at an arbitrary point, e.g. to hoist variable
/// introductions in front of a loop.
pub struct ICodeList {
    imops: PrimaryMap<Inst, ImopData>,
    order: Vec<Inst>,
}

impl ICodeList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            imops: PrimaryMap::new(),
            order: Vec::new(),
        }
    }

    /// Number of instructions in the list.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Is the list empty?
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Append an instruction, assigning its 1-based index.
    pub fn push(&mut self, mut data: ImopData) -> Inst {
        data.index = self.order.len() as u32 + 1;
        let inst = self.imops.push(data);
        self.order.push(inst);
        inst
    }

    /// Insert an instruction in front of `point`, then renumber.
    pub fn insert_before(&mut self, point: Inst, data: ImopData) -> Inst {
        let pos = self
            .order
            .iter()
            .position(|&i| i == point)
            .expect("insertion point must be in the list");
        let inst = self.imops.push(data);
        self.order.insert(pos, inst);
        self.reset_indexes();
        inst
    }

    /// Renumber every instruction to its current 1-based position.
    pub fn reset_indexes(&mut self) {
        for (pos, &inst) in self.order.iter().enumerate() {
            self.imops[inst].index = pos as u32 + 1;
        }
    }

    /// Iterate over the instructions in list order.
    pub fn iter(&self) -> impl Iterator<Item = Inst> + '_ {
        self.order.iter().copied()
    }

    /// Shared access to the contents of `inst`.
    pub fn imop(&self, inst: Inst) -> &ImopData {
        &self.imops[inst]
    }

    /// Mutable access to the contents of `inst`.
    pub fn imop_mut(&mut self, inst: Inst) -> &mut ImopData {
        &mut self.imops[inst]
    }

    /// Tear the list apart into its arena and its order, for the control
    /// flow graph builder.
    pub(crate) fn into_parts(self) -> (PrimaryMap<Inst, ImopData>, Vec<Inst>) {
        (self.imops, self.order)
    }
}

impl Default for ICodeList {
    fn default() -> Self {
        Self::new()
    }
}

/// Intermediate code of a complete translation unit: the interning context,
/// the symbol table and the instruction list, as handed over by the code
/// generator.
pub struct ICode {
    /// Constant and string interning context.
    pub context: Context,
    /// All symbols of the translation unit.
    pub symbols: SymbolTable,
    /// The linear instruction list.
    pub code: ICodeList,
}

impl ICode {
    /// Create an empty translation unit.
    pub fn new() -> Self {
        Self {
            context: Context::new(),
            symbols: SymbolTable::new(),
            code: ICodeList::new(),
        }
    }

    /// Append an instruction.
    pub fn push(&mut self, data: ImopData) -> Inst {
        self.code.push(data)
    }

    /// Append a COMMENT instruction carrying `text` and return it.
    pub fn push_comment(&mut self, text: &str) -> Inst {
        let payload = self.context.string_constant(&mut self.symbols, text);
        self.code.push(ImopData::with_arg1(Opcode::Comment, payload))
    }

    /// Point a jump at `label` and register it in the incoming set of the
    /// labelled instruction. The label must already be placed.
    pub fn set_jump_dest(&mut self, jump: Inst, label: Sym) {
        assert!(
            self.code.imop(jump).op.is_jump(),
            "only jump-family instructions take a label destination"
        );
        let target = self
            .symbols
            .label_target(label)
            .expect("jump destination label must be placed");
        self.code.imop_mut(jump).dest = label.into();
        self.code.imop_mut(target).incoming.insert(jump);
    }

    /// Pair a CALL with its procedure symbol and its RETCLEAN, registering
    /// the call in the callee's incoming-call set.
    pub fn set_call_dest(&mut self, call: Inst, proc: Sym, clean: Inst) {
        assert_eq!(self.code.imop(call).op, Opcode::Call);
        assert_eq!(self.code.imop(clean).op, Opcode::RetClean);
        let first = self
            .symbols
            .proc_first_imop(proc)
            .expect("callee body must be emitted before calls are wired");
        self.code.imop_mut(call).arg1 = proc.into();
        self.code.imop_mut(call).pair = clean.into();
        self.code.imop_mut(clean).pair = call.into();
        self.code.imop_mut(first).incoming_calls.insert(call);
    }

    /// Point a RETURN or RETURNVOID at the first instruction of its
    /// procedure and register it there.
    pub fn set_return_dest(&mut self, ret: Inst, first: Inst) {
        assert!(matches!(
            self.code.imop(ret).op,
            Opcode::Return | Opcode::ReturnVoid
        ));
        assert_eq!(
            self.code.imop(first).op,
            Opcode::Comment,
            "a procedure always starts with its COMMENT"
        );
        self.code.imop_mut(ret).pair = first.into();
        self.code.imop_mut(first).returns.insert(ret);
    }
}

impl Default for ICode {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::symbol::SymbolData;

    #[test]
    fn push_assigns_one_based_indexes() {
        let mut icode = ICode::new();
        let a = icode.push_comment("main");
        let b = icode.push(ImopData::new(Opcode::End));
        assert_eq!(icode.code.imop(a).index, 1);
        assert_eq!(icode.code.imop(b).index, 2);
    }

    #[test]
    fn insert_before_renumbers() {
        let mut icode = ICode::new();
        let a = icode.push_comment("main");
        let c = icode.push(ImopData::new(Opcode::End));
        let b = icode
            .code
            .insert_before(c, ImopData::new(Opcode::RetClean));
        let order: Vec<Inst> = icode.code.iter().collect();
        assert_eq!(order, vec![a, b, c]);
        assert_eq!(icode.code.imop(a).index, 1);
        assert_eq!(icode.code.imop(b).index, 2);
        assert_eq!(icode.code.imop(c).index, 3);
    }

    #[test]
    fn jump_wiring_registers_incoming() {
        let mut icode = ICode::new();
        icode.push_comment("main");
        let jump = icode.push(ImopData::new(Opcode::Jump));
        let target = icode.push(ImopData::new(Opcode::End));
        let label = icode.symbols.add(SymbolData::Label {
            target: None.into(),
        });
        icode.symbols.set_label_target(label, target);
        icode.set_jump_dest(jump, label);
        assert!(icode.code.imop(target).incoming.contains(&jump));
        assert_eq!(icode.code.imop(jump).dest.expand(), Some(label));
    }

    #[test]
    fn comment_payload_is_interned() {
        let mut icode = ICode::new();
        let a = icode.push_comment("main");
        let b = icode.push_comment("main");
        assert_eq!(icode.code.imop(a).arg1, icode.code.imop(b).arg1);
    }
}
