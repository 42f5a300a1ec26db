//! Module data model
//!
//! The immutable picture of a loaded module as handed over by an external
//! parser: functions with tree-shaped instruction bodies, globals with
//! initializer expressions, memory limits, tables and their element segments,
//! data segments, exports, an optional start function, and an optional list
//! of conformance checks.
//!
//! Nothing here executes or lowers anything. Each [`Function`] carries a
//! `OnceCell` slot so its compiled form is produced on first use and shared
//! afterwards.

use crate::catalog::Opcode;
use crate::code::{CompiledCode, ValueKind};
use crate::compiler::{self, CompileError};
use once_cell::unsync::OnceCell;
use std::rc::Rc;

/// A WebAssembly value type as declared in signatures, locals and globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    V128,
    FuncRef,
    ExternRef,
}

impl ValueType {
    /// The packed-word kind this type maps to.
    pub fn kind(self) -> ValueKind {
        match self {
            ValueType::I32 => ValueKind::I32,
            ValueType::I64 => ValueKind::I64,
            ValueType::F32 => ValueKind::F32,
            ValueType::F64 => ValueKind::F64,
            ValueType::V128 => ValueKind::V128,
            ValueType::FuncRef => ValueKind::FuncRef,
            ValueType::ExternRef => ValueKind::AnyRef,
        }
    }
}

/// A function signature: parameter list and at most one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub result: Option<ValueType>,
}

impl FunctionType {
    pub fn new(params: Vec<ValueType>, result: Option<ValueType>) -> FunctionType {
        FunctionType { params, result }
    }

    pub fn result_kind(&self) -> ValueKind {
        self.result.map_or(ValueKind::Void, ValueType::kind)
    }
}

/// The declared result of a block, loop or if region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(ValueType),
}

impl BlockType {
    pub fn result_kind(self) -> ValueKind {
        match self {
            BlockType::Empty => ValueKind::Void,
            BlockType::Value(ty) => ty.kind(),
        }
    }
}

/// One node of the structured instruction tree.
///
/// Plain value-to-value instructions ride in `Op` and are described entirely
/// by their catalog entry; everything that carries an index, a literal or a
/// nested body gets its own variant.
#[derive(Debug, Clone)]
pub enum Instr {
    /// A plain catalog instruction with no static operand.
    Op(Opcode),
    /// `local.get` / `local.set` / `local.tee`.
    Local { op: Opcode, index: u32 },
    /// `global.get` / `global.set`.
    Global { op: Opcode, index: u32 },
    /// Any load or store; `align` is kept for fidelity but unused.
    Memory { op: Opcode, align: u32, offset: u32 },
    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),
    Block { block_type: BlockType, body: Vec<Instr> },
    Loop { block_type: BlockType, body: Vec<Instr> },
    If { block_type: BlockType, then_body: Vec<Instr>, else_body: Vec<Instr> },
    Br { depth: u32 },
    BrIf { depth: u32 },
    BrTable { depths: Vec<u32>, default: u32 },
    Call { func: u32 },
    CallIndirect { type_idx: u32, table: u32 },
    RefFunc { func: u32 },
}

/// Where an imported function comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub module: String,
    pub name: String,
}

/// A function: either a local body or an import reference, never both.
#[derive(Debug)]
pub struct Function {
    pub name: Option<String>,
    pub ty: FunctionType,
    /// Declared (non-parameter) locals.
    pub locals: Vec<ValueType>,
    pub body: Vec<Instr>,
    pub import: Option<ImportRef>,
    compiled: OnceCell<Rc<CompiledCode>>,
}

impl Function {
    /// A function defined in this module.
    pub fn local(
        name: Option<String>,
        ty: FunctionType,
        locals: Vec<ValueType>,
        body: Vec<Instr>,
    ) -> Function {
        Function {
            name,
            ty,
            locals,
            body,
            import: None,
            compiled: OnceCell::new(),
        }
    }

    /// A function satisfied by a registered host import.
    pub fn imported(name: Option<String>, ty: FunctionType, import: ImportRef) -> Function {
        Function {
            name,
            ty,
            locals: Vec::new(),
            body: Vec::new(),
            import: Some(import),
            compiled: OnceCell::new(),
        }
    }

    pub fn is_import(&self) -> bool {
        self.import.is_some()
    }

    /// The compiled form of this function, lowering the body on first call
    /// and returning the cached artifact afterwards.
    pub fn compiled(&self, index: usize, module: &Module) -> Result<Rc<CompiledCode>, CompileError> {
        self.compiled
            .get_or_try_init(|| compiler::compile_function(self, index, module).map(Rc::new))
            .map(Rc::clone)
    }
}

/// A module global. `init` is a constant expression.
#[derive(Debug)]
pub struct Global {
    pub name: Option<String>,
    pub ty: ValueType,
    pub mutable: bool,
    pub init: Vec<Instr>,
}

/// Min/max limits for memory (pages) and tables (elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    pub fn new(min: u32, max: Option<u32>) -> Limits {
        Limits { min, max }
    }
}

/// A funcref table declaration.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub limits: Limits,
}

/// An active element segment: function indices written into a table at
/// instantiation, at an offset given by a constant expression.
#[derive(Debug)]
pub struct ElementSegment {
    pub table: u32,
    pub offset: Vec<Instr>,
    pub funcs: Vec<u32>,
}

/// An active data segment copied into memory at instantiation.
#[derive(Debug)]
pub struct DataSegment {
    pub offset: Vec<Instr>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func(u32),
    Global(u32),
    Memory(u32),
    Table(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
}

/// One `assert_return`-style conformance check carried alongside the module:
/// both sides are constant-or-invoke expressions evaluated by the runtime
/// and compared by exact bit pattern.
#[derive(Debug)]
pub struct AssertReturn {
    pub message: String,
    pub actual: Vec<Instr>,
    pub expected: Vec<Instr>,
}

/// A loaded module, as produced by an external parser.
#[derive(Debug, Default)]
pub struct Module {
    /// Signature table referenced by `call_indirect`.
    pub types: Vec<FunctionType>,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
    pub memory: Option<Limits>,
    pub tables: Vec<TableDef>,
    pub elements: Vec<ElementSegment>,
    pub datas: Vec<DataSegment>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub asserts: Vec<AssertReturn>,
}

impl Module {
    /// Resolve a function index from an export name, falling back to the
    /// function's own debug name.
    pub fn find_function(&self, name: &str) -> Option<usize> {
        for export in &self.exports {
            if let ExportKind::Func(idx) = export.kind {
                if export.name == name {
                    return Some(idx as usize);
                }
            }
        }
        self.functions
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
    }

    pub fn find_global(&self, name: &str) -> Option<usize> {
        for export in &self.exports {
            if let ExportKind::Global(idx) = export.kind {
                if export.name == name {
                    return Some(idx as usize);
                }
            }
        }
        self.globals
            .iter()
            .position(|g| g.name.as_deref() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn void_fn(name: &str) -> Function {
        Function::local(
            Some(name.to_string()),
            FunctionType::new(vec![], None),
            vec![],
            vec![],
        )
    }

    #[test]
    fn test_find_function_prefers_exports() {
        let mut module = Module::default();
        module.functions.push(void_fn("inner"));
        module.functions.push(void_fn("other"));
        module.exports.push(Export {
            name: "run".to_string(),
            kind: ExportKind::Func(1),
        });
        assert_eq!(module.find_function("run"), Some(1));
        assert_eq!(module.find_function("inner"), Some(0));
        assert_eq!(module.find_function("missing"), None);
    }

    #[test]
    fn test_value_type_kinds() {
        assert_eq!(ValueType::I32.kind(), ValueKind::I32);
        assert_eq!(ValueType::F64.kind(), ValueKind::F64);
        assert_eq!(ValueType::ExternRef.kind(), ValueKind::AnyRef);
        assert_eq!(BlockType::Empty.result_kind(), ValueKind::Void);
        assert_eq!(
            BlockType::Value(ValueType::I64).result_kind(),
            ValueKind::I64
        );
    }

    #[test]
    fn test_function_type_result_kind() {
        let ty = FunctionType::new(vec![ValueType::I32], Some(ValueType::F32));
        assert_eq!(ty.result_kind(), ValueKind::F32);
        let void = FunctionType::new(vec![], None);
        assert_eq!(void.result_kind(), ValueKind::Void);
    }
}
