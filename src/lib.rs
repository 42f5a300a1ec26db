//! A WebAssembly bytecode execution engine written in Rust.
//!
//! flatwasm takes a structured instruction tree (blocks, loops, ifs, branches,
//! calls) as produced by an external module loader and lowers it to a flat,
//! densely packed linear instruction stream with resolved jump targets, then
//! executes that stream with a stack-machine interpreter against linear
//! memory, a local/global register file, and an operand stack.
//!
//! # Modules
//!
//! - [`catalog`] -- Static opcode catalog: one descriptor per opcode.
//! - [`module`] -- The immutable module data model and instruction AST.
//! - [`code`] -- The packed instruction word and compiled-code artifact.
//! - [`compiler`] -- Lowers the AST into packed words and constant pools.
//! - [`runtime`] -- Interpreter, operand stack, linear memory, and tables.
//!
//! # Example
//!
//! Build a two-argument add function and invoke it:
//!
//! ```
//! use flatwasm::module::{Function, FunctionType, Instr, Module, ValueType};
//! use flatwasm::catalog::Opcode;
//! use flatwasm::runtime::{Runtime, Value};
//!
//! let ty = FunctionType::new(vec![ValueType::I32, ValueType::I32], Some(ValueType::I32));
//! let body = vec![
//!     Instr::Local { op: Opcode::LocalGet, index: 0 },
//!     Instr::Local { op: Opcode::LocalGet, index: 1 },
//!     Instr::Op(Opcode::I32Add),
//! ];
//! let mut module = Module::default();
//! module.functions.push(Function::local(Some("add".to_string()), ty, vec![], body));
//!
//! let mut runtime = Runtime::new(module).unwrap();
//! let result = runtime.invoke("add", &[Value::I32(2), Value::I32(3)]).unwrap();
//! assert_eq!(result, Some(Value::I32(5)));
//! ```

pub mod catalog;
pub mod code;
pub mod compiler;
pub mod module;
pub mod runtime;

pub use compiler::CompileError;
pub use runtime::{Runtime, RuntimeError, Value};
