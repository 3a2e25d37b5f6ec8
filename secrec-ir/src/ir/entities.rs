//! Intermediate-code entity references.
//!
//! Instructions refer to other entities of the program: the symbols they
//! operate on, the basic block that contains them, and (for interprocedural
//! wiring) other instructions. These references are not implemented as Rust
//! references, both because the graphs are cyclic and because 64-bit pointers
//! take up a lot of space. Instead, entity references are structs wrapping a
//! `u32` index into a table owned by the program, with a separate index type
//! per entity so we don't lose type safety.
//!
//! The entity references all implement the `Display` trait in a way that
//! matches the textual IR format.

use secrec_entity::entity_impl;

/// An opaque reference to a symbol: a named operand of the intermediate code.
///
/// The symbol table hands these out; variables, labels, constants, procedure
/// names, protection domains and kinds are all `Sym`s tagged by their
/// [`SymbolData`](super::SymbolData) variant.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sym(u32);
entity_impl!(Sym, "sym");

/// An opaque reference to an intermediate-code instruction (an `Imop`).
///
/// The order of `Inst` allocation matches emission order, but positions in
/// the program are determined by the instruction list and later by the block
/// that owns the instruction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "imop");

/// An opaque reference to a [basic block](https://en.wikipedia.org/wiki/Basic_block)
/// of the control flow graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// An opaque reference to a procedure of the program.
///
/// The main procedure is always allocated first.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Proc(u32);
entity_impl!(Proc, "proc");
