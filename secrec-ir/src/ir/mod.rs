//! Representation of SecreC intermediate code.

pub mod constant;
pub mod entities;
pub mod icode;
pub mod instructions;
pub mod program;
pub mod symbol;
pub mod types;

pub use crate::ir::constant::ConstantValue;
pub use crate::ir::entities::{Block, Inst, Proc, Sym};
pub use crate::ir::icode::{ICode, ICodeList};
pub use crate::ir::instructions::{ImopData, Opcode};
pub use crate::ir::program::{BlockData, Edge, ProcData, Program};
pub use crate::ir::symbol::{Scope, SymbolData, SymbolTable};
pub use crate::ir::types::{DataType, SecType, Type, TypeNonVoid};
