//! Shared helpers for building intermediate code by hand, playing the role
//! of the AST-to-IR emitter.

use secrec_ir::ir::{
    DataType, ICode, ImopData, Inst, Opcode, Scope, Sym, SymbolData, TypeNonVoid,
};

/// A tiny emitter around [`ICode`].
pub struct Emitter {
    pub icode: ICode,
}

#[allow(dead_code)]
impl Emitter {
    /// Every test starts by constructing an emitter, so this doubles as the
    /// place where the test logger gets installed. Repeated calls are no-ops.
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            icode: ICode::new(),
        }
    }

    /// Declare a local scalar int64 variable.
    pub fn var(&mut self, name: &str) -> Sym {
        self.declare_var(name, TypeNonVoid::public(DataType::Int64), Scope::Local)
    }

    /// Declare a global scalar int64 variable.
    pub fn global(&mut self, name: &str) -> Sym {
        self.declare_var(name, TypeNonVoid::public(DataType::Int64), Scope::Global)
    }

    /// Declare a local one-dimensional uint64 array.
    pub fn array(&mut self, name: &str) -> Sym {
        self.declare_var(
            name,
            TypeNonVoid::public_dim(DataType::Uint64, 1),
            Scope::Local,
        )
    }

    pub fn declare_var(&mut self, name: &str, ty: TypeNonVoid, scope: Scope) -> Sym {
        let name = self.icode.context.intern(name);
        self.icode.symbols.declare(SymbolData::Variable {
            name,
            ty,
            scope,
            size: None.into(),
            dims: Vec::new(),
        })
    }

    /// The uniqued int64 constant `value`.
    pub fn int(&mut self, value: u64) -> Sym {
        self.icode
            .context
            .int_constant(&mut self.icode.symbols, DataType::Int64, value)
    }

    /// Declare a procedure symbol; its body must be emitted later with
    /// [`Emitter::begin_proc`].
    pub fn proc_sym(&mut self, name: &str) -> Sym {
        let name = self.icode.context.intern(name);
        self.icode.symbols.declare(SymbolData::Procedure {
            name,
            first_imop: None.into(),
        })
    }

    /// Emit the leading comment of a procedure body and point the procedure
    /// symbol at it.
    pub fn begin_proc(&mut self, proc: Sym, comment: &str) -> Inst {
        let first = self.icode.push_comment(comment);
        self.icode.symbols.set_proc_first_imop(proc, first);
        first
    }

    /// A fresh unplaced label.
    pub fn label(&mut self) -> Sym {
        self.icode.symbols.add(SymbolData::Label {
            target: None.into(),
        })
    }

    pub fn place_label(&mut self, label: Sym, target: Inst) {
        self.icode.symbols.set_label_target(label, target);
    }

    pub fn push(&mut self, data: ImopData) -> Inst {
        self.icode.push(data)
    }

    pub fn assign(&mut self, dest: Sym, src: Sym) -> Inst {
        self.push(ImopData::unary(Opcode::Assign, dest, src))
    }

    /// An array copy: an assignment carrying its element count.
    pub fn copy(&mut self, dest: Sym, src: Sym, size: Sym) -> Inst {
        self.push(ImopData::binary(Opcode::Assign, dest, src, size))
    }

    pub fn release(&mut self, array: Sym) -> Inst {
        self.push(ImopData::with_arg1(Opcode::Release, array))
    }

    /// An unconditional jump; the destination is wired in once known.
    pub fn jump(&mut self) -> Inst {
        self.push(ImopData::new(Opcode::Jump))
    }

    /// A conditional jump on `cond`; the destination is wired in once known.
    pub fn cond_jump(&mut self, op: Opcode, cond: Sym) -> Inst {
        assert!(op.is_cond_jump());
        self.push(ImopData::with_arg1(op, cond))
    }

    pub fn wire_jump(&mut self, jump: Inst, label: Sym) {
        self.icode.set_jump_dest(jump, label);
    }

    /// Emit a CALL / RETCLEAN pair to `proc` and wire it.
    pub fn call(&mut self, proc: Sym) -> (Inst, Inst) {
        let call = self.push(ImopData::new(Opcode::Call));
        let clean = self.push(ImopData::new(Opcode::RetClean));
        self.icode.set_call_dest(call, proc, clean);
        (call, clean)
    }

    /// Emit a RETURNVOID from the procedure whose body starts at `first`.
    pub fn return_void(&mut self, first: Inst) -> Inst {
        let ret = self.push(ImopData::new(Opcode::ReturnVoid));
        self.icode.set_return_dest(ret, first);
        ret
    }

    pub fn end(&mut self) -> Inst {
        self.push(ImopData::new(Opcode::End))
    }

    pub fn finish(self) -> ICode {
        self.icode
    }
}

/// Assert that predecessor and successor maps mirror each other exactly.
#[allow(dead_code)]
pub fn assert_edge_symmetry(program: &secrec_ir::ir::Program) {
    for block in program.blocks() {
        for (succ, label) in program.block(block).succs() {
            let mirrored = program
                .block(succ)
                .preds()
                .find(|&(p, _)| p == block)
                .map(|(_, l)| l);
            assert_eq!(
                mirrored,
                Some(label),
                "succ edge {block:?} -> {succ:?} has no mirrored pred edge"
            );
        }
        for (pred, label) in program.block(block).preds() {
            let mirrored = program
                .block(pred)
                .succs()
                .find(|&(s, _)| s == block)
                .map(|(_, l)| l);
            assert_eq!(
                mirrored,
                Some(label),
                "pred edge {pred:?} -> {block:?} has no mirrored succ edge"
            );
        }
    }
}

/// Assert that the blocks partition the original instruction list with order
/// preserved: the concatenated indexes are exactly 1..=n.
#[allow(dead_code)]
pub fn assert_partition(program: &secrec_ir::ir::Program, n: u32) {
    let mut indexes = Vec::new();
    for block in program.blocks() {
        for &inst in program.block(block).insts() {
            indexes.push(program.imop(inst).index);
        }
    }
    assert_eq!(indexes, (1..=n).collect::<Vec<u32>>());
}
