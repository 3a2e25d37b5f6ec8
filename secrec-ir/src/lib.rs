//! Intermediate representation and data-flow analyses for the SecreC compiler.
//!
//! This crate defines the three-address intermediate code produced from a
//! type-checked SecreC program, the control flow graph built over it, and the
//! data-flow analysis framework consumed by the optimizer passes:
//!
//! - The [`ir`] module holds the program representation: symbols,
//!   instructions, basic blocks, procedures and the [`ir::Program`]
//!   container, all referenced through compact entity handles.
//! - [`flowgraph::build_program`] partitions a linear instruction list into
//!   basic blocks and wires intra- and interprocedural edges.
//! - The [`analysis`] module contains the worklist fixed-point engine and the
//!   concrete analyses: reaching definitions, reaching jumps, live variables,
//!   reachable releases and live memory.
//! - [`copy_elimination`] and [`unreachable_code`] are the optimizer passes
//!   built on top of the analyses.
//!
//! Lexing, parsing, type checking and code generation live in sibling crates;
//! this crate only consumes their output: a wired instruction list inside an
//! [`ir::ICode`].

#![deny(missing_docs)]

pub use secrec_entity as entity;

pub mod analysis;
pub mod cfg_printer;
pub mod context;
pub mod copy_elimination;
pub mod flowgraph;
pub mod ir;
pub mod string_table;
pub mod unreachable_code;
pub mod write;

mod fx;
mod result;

pub use crate::context::Context;
pub use crate::flowgraph::build_program;
pub use crate::result::{IrError, IrResult};
