//! Result and error types representing the outcome of building or analysing
//! intermediate code.

use crate::ir::Opcode;
use thiserror::Error;

/// An error surfaced while turning a linear instruction list into a
/// [`Program`](crate::ir::Program) or while running analyses over it.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IrError {
    /// The emitter handed us intermediate code that violates a wiring
    /// invariant: a jump without a label destination, a CALL without its
    /// RETCLEAN, a RETURN without a first-instruction pointer, or a label
    /// destination on an opcode outside the jump family. These are
    /// programming bugs in the code generator, not user errors.
    #[error("ill-formed intermediate code at instruction {index} ({opcode}): {reason}")]
    IllFormed {
        /// 1-based index of the offending instruction.
        index: u32,
        /// Opcode of the offending instruction.
        opcode: Opcode,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A control flow graph was requested for zero instructions.
    #[error("empty program")]
    EmptyProgram,

    /// The program defines no main procedure.
    #[error("program has no main procedure")]
    NoMain,

    /// An internal invariant of the analysis engine was violated, e.g. a
    /// worklist that failed to reach a fixed point within its iteration
    /// budget.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A convenient alias for a `Result` that uses [`IrError`].
pub type IrResult<T> = Result<T, IrError>;
