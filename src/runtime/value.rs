//! Runtime values

use super::RuntimeError;
use fhex::ToHex;
use std::fmt;

/// A single WebAssembly value crossing the host boundary.
///
/// Inside the interpreter values are raw bytes on the operand stack; this
/// tagged form only appears at the edges: invoke arguments and results,
/// globals, host calls and conformance checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// A nullable reference to a function by index.
    FuncRef(Option<u32>),
    /// A nullable opaque host reference.
    ExternRef(Option<u32>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::FuncRef(_) => "funcref",
            Value::ExternRef(_) => "externref",
        }
    }

    pub fn as_i32(&self) -> Result<i32, RuntimeError> {
        match self {
            Value::I32(v) => Ok(*v),
            _ => Err(RuntimeError::TypeMismatch {
                expected: "i32",
                actual: self.type_name(),
            }),
        }
    }

    pub fn as_i64(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::I64(v) => Ok(*v),
            _ => Err(RuntimeError::TypeMismatch {
                expected: "i64",
                actual: self.type_name(),
            }),
        }
    }

    pub fn as_f32(&self) -> Result<f32, RuntimeError> {
        match self {
            Value::F32(v) => Ok(*v),
            _ => Err(RuntimeError::TypeMismatch {
                expected: "f32",
                actual: self.type_name(),
            }),
        }
    }

    pub fn as_f64(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::F64(v) => Ok(*v),
            _ => Err(RuntimeError::TypeMismatch {
                expected: "f64",
                actual: self.type_name(),
            }),
        }
    }

    /// Exact bit-pattern equality. Floats compare by bits, so NaN equals
    /// the identically-encoded NaN and `-0.0` differs from `0.0`.
    pub fn bits_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::FuncRef(a), Value::FuncRef(b)) => a == b,
            (Value::ExternRef(a), Value::ExternRef(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{}", v),
            Value::I64(v) => write!(f, "i64:{}", v),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
            Value::FuncRef(Some(v)) => write!(f, "funcref:{}", v),
            Value::FuncRef(None) => write!(f, "funcref:null"),
            Value::ExternRef(Some(v)) => write!(f, "externref:{}", v),
            Value::ExternRef(None) => write!(f, "externref:null"),
        }
    }
}
