//! Instruction formats and opcodes.
//!
//! An intermediate-code instruction (an `Imop`) is a three-address operation:
//! an opcode with up to three symbol operands `dest`, `arg1` and `arg2`. The
//! interprocedural wiring of the code (which jumps target an instruction,
//! which calls enter it, which returns leave through it) is stored on the
//! instruction itself as back-edge sets so the control flow graph builder can
//! partition a program in a single linear scan.

use crate::ir::entities::{Block, Inst, Sym};
use crate::ir::symbol::SymbolTable;
use core::fmt;
use secrec_entity::packed_option::PackedOption;
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// An instruction opcode.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    /// `// arg1`
    Comment,
    /// `d;` (variable declaration)
    VarIntro,
    /// `d = arg1;` or, with `arg2` set, an array copy of `arg2` elements.
    Assign,
    /// `d = (cast) arg1;`
    Cast,
    /// `d = ALLOC arg1, arg2;` (default value, element count)
    Alloc,
    /// `d = arg1[arg2];` (array element read)
    Load,
    /// `d[arg1] = arg2;` (array element write)
    Store,
    /// `d = arg1[*];`
    Wildcard,
    /// `d = arg1[arg2];` (slice)
    Subscript,
    /// `d = !arg1;`
    Uneg,
    /// `d = -arg1;`
    Uminus,
    /// `d = arg1 # arg2;`
    MatrixMul,
    /// `d = arg1 * arg2;`
    Mul,
    /// `d = arg1 / arg2;`
    Div,
    /// `d = arg1 % arg2;`
    Mod,
    /// `d = arg1 + arg2;`
    Add,
    /// `d = arg1 - arg2;`
    Sub,
    /// `d = arg1 == arg2;`
    Eq,
    /// `d = arg1 != arg2;`
    Ne,
    /// `d = arg1 <= arg2;`
    Le,
    /// `d = arg1 < arg2;`
    Lt,
    /// `d = arg1 >= arg2;`
    Ge,
    /// `d = arg1 > arg2;`
    Gt,
    /// `d = arg1 && arg2;`
    Land,
    /// `d = arg1 || arg2;`
    Lor,
    /// `PUTPARAM arg1;`
    PutParam,
    /// `d = CALL arg1;` paired with the RETCLEAN that follows it.
    Call,
    /// `RETCLEAN;` paired with its CALL.
    RetClean,
    /// `RETURN arg1;` paired with the first instruction of its procedure.
    Return,
    /// `RETURN;` paired with the first instruction of its procedure.
    ReturnVoid,
    /// `END PROGRAM`
    End,
    /// `RELEASE arg1;` (free the memory of an array)
    Release,
    /// `ERROR arg1;`
    Error,
    /// `GOTO d;`
    Jump,
    /// `if (arg1) GOTO d;`
    Jt,
    /// `if (!arg1) GOTO d;`
    Jf,
    /// `if (arg1 == arg2) GOTO d;`
    Je,
    /// `if (arg1 != arg2) GOTO d;`
    Jne,
    /// `if (arg1 <= arg2) GOTO d;`
    Jle,
    /// `if (arg1 < arg2) GOTO d;`
    Jlt,
    /// `if (arg1 >= arg2) GOTO d;`
    Jge,
    /// `if (arg1 > arg2) GOTO d;`
    Jgt,
}

impl Opcode {
    /// Is this any member of the jump family?
    pub fn is_jump(self) -> bool {
        use Opcode::*;
        matches!(self, Jump | Jt | Jf | Je | Jne | Jle | Jlt | Jge | Jgt)
    }

    /// Is this a conditional jump?
    pub fn is_cond_jump(self) -> bool {
        self.is_jump() && self != Self::Jump
    }

    /// Does this instruction end a basic block?
    pub fn is_terminator(self) -> bool {
        use Opcode::*;
        self.is_jump() || matches!(self, Call | Return | ReturnVoid | End)
    }

    /// Does this opcode write its `dest` operand?
    pub fn writes_dest(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            VarIntro
                | Assign
                | Cast
                | Alloc
                | Load
                | Store
                | Wildcard
                | Subscript
                | Uneg
                | Uminus
                | MatrixMul
                | Mul
                | Div
                | Mod
                | Add
                | Sub
                | Eq
                | Ne
                | Le
                | Lt
                | Ge
                | Gt
                | Land
                | Lor
                | Call
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Comment => "COMMENT",
            Self::VarIntro => "VARINTRO",
            Self::Assign => "ASSIGN",
            Self::Cast => "CAST",
            Self::Alloc => "ALLOC",
            Self::Load => "LOAD",
            Self::Store => "STORE",
            Self::Wildcard => "WILDCARD",
            Self::Subscript => "SUBSCRIPT",
            Self::Uneg => "UNEG",
            Self::Uminus => "UMINUS",
            Self::MatrixMul => "MATRIXMUL",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Le => "LE",
            Self::Lt => "LT",
            Self::Ge => "GE",
            Self::Gt => "GT",
            Self::Land => "LAND",
            Self::Lor => "LOR",
            Self::PutParam => "PUTPARAM",
            Self::Call => "CALL",
            Self::RetClean => "RETCLEAN",
            Self::Return => "RETURN",
            Self::ReturnVoid => "RETURNVOID",
            Self::End => "END",
            Self::Release => "RELEASE",
            Self::Error => "ERROR",
            Self::Jump => "JUMP",
            Self::Jt => "JT",
            Self::Jf => "JF",
            Self::Je => "JE",
            Self::Jne => "JNE",
            Self::Jle => "JLE",
            Self::Jlt => "JLT",
            Self::Jge => "JGE",
            Self::Jgt => "JGT",
        };
        f.write_str(name)
    }
}

/// Contents of an instruction.
///
/// For jump-family instructions `dest` holds a label symbol; for everything
/// else it is the written operand. The `pair` field carries the
/// interprocedural pairing that the original three-address form threads
/// through `arg2`: a CALL's matching RETCLEAN, a RETCLEAN's matching CALL,
/// and a RETURN's pointer to the first instruction of its procedure.
#[derive(Clone, Debug)]
pub struct ImopData {
    /// The opcode.
    pub op: Opcode,
    /// Destination operand, or the label symbol for jumps.
    pub dest: PackedOption<Sym>,
    /// First source operand. Comments keep their interned text here.
    pub arg1: PackedOption<Sym>,
    /// Second source operand.
    pub arg2: PackedOption<Sym>,
    /// 1-based position in the instruction list.
    pub index: u32,
    /// The basic block that owns this instruction, once partitioned.
    pub block: PackedOption<Block>,
    /// CALL ↔ RETCLEAN pairing, or a RETURN's first-instruction pointer.
    pub pair: PackedOption<Inst>,
    /// Jump-family instructions that target this instruction.
    pub incoming: BTreeSet<Inst>,
    /// CALL instructions whose callee body starts here.
    pub incoming_calls: BTreeSet<Inst>,
    /// RETURN instructions whose first-instruction pointer is this
    /// instruction.
    pub returns: BTreeSet<Inst>,
}

impl ImopData {
    /// An instruction with no operands.
    pub fn new(op: Opcode) -> Self {
        Self {
            op,
            dest: None.into(),
            arg1: None.into(),
            arg2: None.into(),
            index: 0,
            block: None.into(),
            pair: None.into(),
            incoming: BTreeSet::new(),
            incoming_calls: BTreeSet::new(),
            returns: BTreeSet::new(),
        }
    }

    /// An instruction with only a destination.
    pub fn with_dest(op: Opcode, dest: Sym) -> Self {
        let mut data = Self::new(op);
        data.dest = dest.into();
        data
    }

    /// A unary instruction.
    pub fn unary(op: Opcode, dest: Sym, arg1: Sym) -> Self {
        let mut data = Self::with_dest(op, dest);
        data.arg1 = arg1.into();
        data
    }

    /// A binary instruction.
    pub fn binary(op: Opcode, dest: Sym, arg1: Sym, arg2: Sym) -> Self {
        let mut data = Self::unary(op, dest, arg1);
        data.arg2 = arg2.into();
        data
    }

    /// An instruction with a single source operand and no destination.
    pub fn with_arg1(op: Opcode, arg1: Sym) -> Self {
        let mut data = Self::new(op);
        data.arg1 = arg1.into();
        data
    }

    /// Is this instruction an array copy: an ASSIGN carrying an element
    /// count in `arg2`?
    pub fn is_array_copy(&self) -> bool {
        self.op == Opcode::Assign && self.arg2.is_some()
    }
}

/// The symbols defined by an instruction: a pure function of its opcode and
/// operands. Only program variables participate in data flow.
pub fn def_symbols(data: &ImopData, syms: &SymbolTable) -> SmallVec<[Sym; 2]> {
    let mut defs = SmallVec::new();
    if data.op.writes_dest() {
        if let Some(dest) = data.dest.expand() {
            if syms.is_variable(dest) {
                defs.push(dest);
            }
        }
    }
    defs
}

/// The symbols used by an instruction: a pure function of its opcode and
/// operands. A STORE both reads and writes its destination array, so the
/// destination shows up here as well as in [`def_symbols`].
pub fn use_symbols(data: &ImopData, syms: &SymbolTable) -> SmallVec<[Sym; 3]> {
    use Opcode::*;
    let mut uses = SmallVec::new();
    let push = |sym: PackedOption<Sym>, uses: &mut SmallVec<[Sym; 3]>| {
        if let Some(sym) = sym.expand() {
            if syms.is_variable(sym) {
                uses.push(sym);
            }
        }
    };
    match data.op {
        Comment | VarIntro | RetClean | ReturnVoid | End | Error => {}
        // CALL reads its procedure symbol, which is not a variable; the
        // actual arguments travel through the preceding PUTPARAMs.
        Call => {}
        // Jumps read their condition operands; `dest` is a label.
        Jump => {}
        Jt | Jf | Je | Jne | Jle | Jlt | Jge | Jgt => {
            push(data.arg1, &mut uses);
            push(data.arg2, &mut uses);
        }
        Store => {
            push(data.dest, &mut uses);
            push(data.arg1, &mut uses);
            push(data.arg2, &mut uses);
        }
        _ => {
            push(data.arg1, &mut uses);
            push(data.arg2, &mut uses);
        }
    }
    uses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::symbol::{Scope, SymbolData};
    use crate::ir::types::{DataType, TypeNonVoid};
    use crate::string_table::StringTable;

    #[test]
    fn opcode_families() {
        assert!(Opcode::Jump.is_jump());
        assert!(Opcode::Jgt.is_jump());
        assert!(!Opcode::Jump.is_cond_jump());
        assert!(Opcode::Jf.is_cond_jump());
        assert!(!Opcode::Assign.is_jump());

        assert!(Opcode::Call.is_terminator());
        assert!(Opcode::End.is_terminator());
        assert!(Opcode::Return.is_terminator());
        assert!(!Opcode::RetClean.is_terminator());
        assert!(!Opcode::Comment.is_terminator());
    }

    #[test]
    fn def_use_derivation() {
        let mut strings = StringTable::new();
        let mut syms = SymbolTable::new();
        let var = |strings: &mut StringTable, syms: &mut SymbolTable, name: &str| {
            let name = strings.intern(name);
            syms.declare(SymbolData::Variable {
                name,
                ty: TypeNonVoid::public(DataType::Int64),
                scope: Scope::Local,
                size: None.into(),
                dims: Vec::new(),
            })
        };
        let x = var(&mut strings, &mut syms, "x");
        let y = var(&mut strings, &mut syms, "y");
        let z = var(&mut strings, &mut syms, "z");

        let add = ImopData::binary(Opcode::Add, x, y, z);
        assert_eq!(def_symbols(&add, &syms).as_slice(), &[x]);
        assert_eq!(use_symbols(&add, &syms).as_slice(), &[y, z]);

        let store = ImopData::binary(Opcode::Store, x, y, z);
        assert_eq!(def_symbols(&store, &syms).as_slice(), &[x]);
        assert_eq!(use_symbols(&store, &syms).as_slice(), &[x, y, z]);

        let release = ImopData::with_arg1(Opcode::Release, x);
        assert!(def_symbols(&release, &syms).is_empty());
        assert_eq!(use_symbols(&release, &syms).as_slice(), &[x]);

        // A label destination never counts as a definition.
        let label = syms.add(SymbolData::Label {
            target: None.into(),
        });
        let jt = {
            let mut data = ImopData::with_dest(Opcode::Jt, label);
            data.arg1 = x.into();
            data
        };
        assert!(def_symbols(&jt, &syms).is_empty());
        assert_eq!(use_symbols(&jt, &syms).as_slice(), &[x]);
    }
}
