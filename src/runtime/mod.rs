//! The interpreter and its moving parts
//!
//! Everything mutable at execution time lives here: the operand stack,
//! linear memory, tables, globals and the frame bookkeeping. Compiled code
//! is immutable and shared; a [`Runtime`] owns one module's worth of state
//! and executes against it.

mod asserts;
mod host;
mod interp;
mod memory;
mod numeric;
mod stack;
mod table;
mod value;

pub use asserts::AssertSummary;
pub use host::HostFunc;
pub use interp::Runtime;
pub use memory::{Memory, PAGE_SIZE};
pub use stack::OperandStack;
pub use table::Table;
pub use value::Value;

use crate::compiler::CompileError;
use thiserror::Error;

/// Everything that can go wrong while executing.
///
/// Traps (the conditions the WebAssembly spec requires to abort execution)
/// and engine-level failures share one enum; callers that need to
/// distinguish them match on variants.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum RuntimeError {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("function index out of bounds: {0}")]
    FunctionIndexOutOfBounds(usize),
    #[error("unresolved import: {module}.{name}")]
    UnresolvedImport { module: String, name: String },
    #[error("argument count mismatch: expected {expected}, got {actual}")]
    ArgumentCountMismatch { expected: usize, actual: usize },
    #[error("integer divide by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("unreachable executed")]
    Unreachable,
    #[error("out of bounds memory access: {0}")]
    MemoryOutOfBounds(u64),
    #[error("memory error: {0}")]
    MemoryError(String),
    #[error("undefined element: {0}")]
    UndefinedElement(u32),
    #[error("table index out of bounds: {0}")]
    TableIndexOutOfBounds(u32),
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("global index out of bounds: {0}")]
    GlobalIndexOutOfBounds(u32),
    #[error("global is immutable: {0}")]
    ImmutableGlobal(u32),
    #[error("invalid jump target: {0}")]
    InvalidJumpTarget(usize),
    #[error("constant pool index out of range: {0}")]
    PoolIndexOutOfRange(usize),
    #[error("instruction not implemented: {0}")]
    Unimplemented(&'static str),
    #[error("instruction budget exhausted")]
    InstructionBudgetExhausted,
    #[error("compilation failed: {0}")]
    Compile(#[from] CompileError),
}
