//! Bytecode compiler
//!
//! Lowers the structured instruction tree into a flat stream of packed
//! words plus typed constant pools. Two passes in effect, done in one walk:
//! words are emitted with placeholder jump targets, and a deferred-patch
//! list is applied once every label's position is known.
//!
//! The walk keeps three pieces of state:
//!
//! - a stack of open control regions (function body, blocks, loops, ifs),
//!   each owning a label record in the label arena;
//! - a simulated operand-type stack, so each emitted word can carry the
//!   value kind it operates on (the byte-addressed runtime stack has no
//!   tags to consult);
//! - the deferred patches: every forward branch records the word (or i32
//!   pool slot, for `br_table`) to rewrite and the label it refers to.
//!
//! Loops resolve to their start offset, blocks and ifs to their end. A
//! patch that resolves to a negative offset at finalization is a bug in
//! this compiler, reported as [`CompileError::UnresolvedLabel`] rather
//! than ignored.

use crate::catalog::Opcode;
use crate::code::{
    self, BitOp, CompiledCode, ConvertSrc, EqOp, FloatArith, FloatUnop, IntArith, IntUnop,
    LoadWidth, OpClass, OrdOp, RecastOp, StoreWidth, TruncSrc, ValueKind, Word,
};
use crate::module::{Function, Instr, Module};
use thiserror::Error;

/// A defect detected while lowering. These indicate a malformed module or
/// a bug in the compiler itself, never a condition user code can trigger
/// at run time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("unresolved label in {func}: {mnemonic} target never bound")]
    UnresolvedLabel { func: String, mnemonic: &'static str },
    #[error("type stack underflow in {func} at {mnemonic}")]
    TypeUnderflow { func: String, mnemonic: &'static str },
    #[error("type mismatch in {func} at {mnemonic}: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        func: String,
        mnemonic: &'static str,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("immediate overflow in {func} at {mnemonic}: {value} does not fit 20 bits")]
    ImmediateOverflow {
        func: String,
        mnemonic: &'static str,
        value: i64,
    },
    #[error("unsupported instruction in {func}: {mnemonic}")]
    Unsupported { func: String, mnemonic: &'static str },
    #[error("index out of range in {func} at {mnemonic}: {index}")]
    IndexOutOfRange {
        func: String,
        mnemonic: &'static str,
        index: u32,
    },
}

/// What a control region is, which decides where branches to it land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionKind {
    /// The function body itself; branching to it returns.
    Func,
    Block,
    Loop,
    If,
}

/// A label in the arena. Offsets stay `-1` until bound.
#[derive(Debug)]
struct LabelRecord {
    kind: RegionKind,
    start: i32,
    end: i32,
}

impl LabelRecord {
    /// The word offset a branch to this label lands on.
    fn target(&self) -> i32 {
        match self.kind {
            RegionKind::Loop => self.start,
            _ => self.end,
        }
    }
}

/// Where a deferred patch writes its resolved offset.
#[derive(Debug, Clone, Copy)]
enum PatchSite {
    /// Immediate field of `words[i]`.
    Word(usize),
    /// `pool_i32[i]`, used by `br_table` target lists.
    Pool(usize),
}

#[derive(Debug)]
struct Patch {
    site: PatchSite,
    label: usize,
    mnemonic: &'static str,
}

/// One open control region during the walk.
#[derive(Debug)]
struct Control {
    label: usize,
    /// Simulated type-stack depth on entry.
    depth: usize,
    result: ValueKind,
}

struct FuncCompiler<'m> {
    func_name: String,
    module: &'m Module,
    words: Vec<Word>,
    pool_i32: Vec<i32>,
    pool_i64: Vec<i64>,
    pool_f32: Vec<f32>,
    pool_f64: Vec<f64>,
    labels: Vec<LabelRecord>,
    patches: Vec<Patch>,
    controls: Vec<Control>,
    /// Simulated operand types, innermost last.
    types: Vec<ValueKind>,
    local_kinds: Vec<ValueKind>,
    local_offsets: Vec<u32>,
    params_size: usize,
    locals_size: usize,
    result: ValueKind,
    /// Set after an instruction that never falls through; cleared when the
    /// enclosing region closes.
    dead: bool,
}

/// Lower a function body. Called through [`Function::compiled`], which
/// caches the artifact.
pub fn compile_function(
    func: &Function,
    index: usize,
    module: &Module,
) -> Result<CompiledCode, CompileError> {
    let func_name = func
        .name
        .clone()
        .unwrap_or_else(|| format!("func[{}]", index));

    let mut local_kinds = Vec::with_capacity(func.ty.params.len() + func.locals.len());
    let mut local_offsets = Vec::with_capacity(local_kinds.capacity());
    let mut offset = 0usize;
    for (i, ty) in func.ty.params.iter().chain(func.locals.iter()).enumerate() {
        let kind = ty.kind();
        if kind.is_ref() || kind == ValueKind::V128 {
            return Err(CompileError::Unsupported {
                func: func_name.clone(),
                mnemonic: if i < func.ty.params.len() {
                    "param"
                } else {
                    "local"
                },
            });
        }
        local_kinds.push(kind);
        local_offsets.push(offset as u32);
        offset += kind.slot_width();
    }
    let params_size = func
        .ty
        .params
        .iter()
        .map(|t| t.kind().slot_width())
        .sum::<usize>();

    let mut fc = FuncCompiler {
        func_name,
        module,
        words: Vec::new(),
        pool_i32: Vec::new(),
        pool_i64: Vec::new(),
        pool_f32: Vec::new(),
        pool_f64: Vec::new(),
        labels: Vec::new(),
        patches: Vec::new(),
        controls: Vec::new(),
        types: Vec::new(),
        local_kinds,
        local_offsets,
        params_size,
        locals_size: offset,
        result: func.ty.result_kind(),
        dead: false,
    };
    fc.compile_body(&func.body)?;
    fc.finish()
}

/// Lower a standalone constant-or-invoke expression (global initializers,
/// segment offsets, conformance checks). The result kind is whatever the
/// expression leaves on the simulated stack.
pub fn compile_expr(body: &[Instr], module: &Module) -> Result<CompiledCode, CompileError> {
    let mut fc = FuncCompiler {
        func_name: "<expr>".to_string(),
        module,
        words: Vec::new(),
        pool_i32: Vec::new(),
        pool_i64: Vec::new(),
        pool_f32: Vec::new(),
        pool_f64: Vec::new(),
        labels: Vec::new(),
        patches: Vec::new(),
        controls: Vec::new(),
        types: Vec::new(),
        local_kinds: Vec::new(),
        local_offsets: Vec::new(),
        params_size: 0,
        locals_size: 0,
        result: ValueKind::Void,
        dead: false,
    };
    // the expression decides its own result kind
    let body_label = fc.open_label(RegionKind::Func);
    fc.controls.push(Control {
        label: body_label,
        depth: 0,
        result: ValueKind::Void,
    });
    for instr in body {
        if fc.dead {
            break;
        }
        fc.compile_instr(instr)?;
    }
    fc.result = fc.types.last().copied().unwrap_or(ValueKind::Void);
    let result = fc.result;
    fc.bind_end(body_label);
    fc.emit(OpClass::Return, result, 0, 0);
    fc.controls.pop();
    fc.finalize()
}

impl<'m> FuncCompiler<'m> {
    fn compile_body(&mut self, body: &[Instr]) -> Result<(), CompileError> {
        let body_label = self.open_label(RegionKind::Func);
        self.controls.push(Control {
            label: body_label,
            depth: 0,
            result: self.result,
        });
        for instr in body {
            if self.dead {
                break;
            }
            self.compile_instr(instr)?;
        }
        // the function-end label is bound on the implicit return, so a
        // branch out of the outermost region still runs it
        self.bind_end(body_label);
        if !self.dead && self.result != ValueKind::Void {
            self.pop_expect(self.result, "return")?;
        }
        self.emit(OpClass::Return, self.result, 0, 0);
        self.controls.pop();
        Ok(())
    }

    fn finish(mut self) -> Result<CompiledCode, CompileError> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<CompiledCode, CompileError> {
        for patch in &self.patches {
            let label = &self.labels[patch.label];
            let target = label.target();
            if target < 0 {
                return Err(CompileError::UnresolvedLabel {
                    func: self.func_name.clone(),
                    mnemonic: patch.mnemonic,
                });
            }
            if !code::imm_fits(target as i64) {
                return Err(CompileError::ImmediateOverflow {
                    func: self.func_name.clone(),
                    mnemonic: patch.mnemonic,
                    value: target as i64,
                });
            }
            match patch.site {
                PatchSite::Word(i) => self.words[i] = self.words[i].patched(target),
                PatchSite::Pool(i) => self.pool_i32[i] = target,
            }
        }
        Ok(CompiledCode {
            words: std::mem::take(&mut self.words),
            pool_i32: std::mem::take(&mut self.pool_i32),
            pool_i64: std::mem::take(&mut self.pool_i64),
            pool_f32: std::mem::take(&mut self.pool_f32),
            pool_f64: std::mem::take(&mut self.pool_f64),
            params_size: self.params_size,
            locals_size: self.locals_size,
            local_offsets: std::mem::take(&mut self.local_offsets),
            result: self.result,
        })
    }

    // ---- emission helpers ----

    fn emit(&mut self, class: OpClass, kind: ValueKind, extra: u8, imm: i32) {
        self.words.push(Word::new(class, kind, extra, imm));
    }

    /// Emit a branch word whose immediate is patched later.
    fn emit_branch(&mut self, class: OpClass, label: usize, mnemonic: &'static str) {
        self.patches.push(Patch {
            site: PatchSite::Word(self.words.len()),
            label,
            mnemonic,
        });
        self.emit(class, ValueKind::Void, 0, 0);
    }

    fn open_label(&mut self, kind: RegionKind) -> usize {
        self.labels.push(LabelRecord {
            kind,
            start: -1,
            end: -1,
        });
        self.labels.len() - 1
    }

    fn bind_start(&mut self, label: usize) {
        self.labels[label].start = self.words.len() as i32;
    }

    fn bind_end(&mut self, label: usize) {
        self.labels[label].end = self.words.len() as i32;
    }

    fn imm(&self, value: i64, mnemonic: &'static str) -> Result<i32, CompileError> {
        if code::imm_fits(value) {
            Ok(value as i32)
        } else {
            Err(CompileError::ImmediateOverflow {
                func: self.func_name.clone(),
                mnemonic,
                value,
            })
        }
    }

    // ---- simulated type stack ----

    fn push_t(&mut self, kind: ValueKind) {
        self.types.push(kind);
    }

    fn pop_t(&mut self, mnemonic: &'static str) -> Result<ValueKind, CompileError> {
        self.types.pop().ok_or_else(|| CompileError::TypeUnderflow {
            func: self.func_name.clone(),
            mnemonic,
        })
    }

    fn pop_expect(
        &mut self,
        expected: ValueKind,
        mnemonic: &'static str,
    ) -> Result<(), CompileError> {
        let found = self.pop_t(mnemonic)?;
        if found != expected {
            return Err(CompileError::TypeMismatch {
                func: self.func_name.clone(),
                mnemonic,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Close a control region: discard whatever an early exit left behind
    /// and expose the declared result.
    fn close_region(&mut self, depth: usize, result: ValueKind) {
        self.types.truncate(depth);
        if result != ValueKind::Void {
            self.types.push(result);
        }
        self.dead = false;
    }

    fn branch_label(&self, depth: u32, mnemonic: &'static str) -> Result<usize, CompileError> {
        let pos = self
            .controls
            .len()
            .checked_sub(1 + depth as usize)
            .ok_or(CompileError::IndexOutOfRange {
                func: self.func_name.clone(),
                mnemonic,
                index: depth,
            })?;
        Ok(self.controls[pos].label)
    }

    // ---- the walk ----

    fn compile_instr(&mut self, instr: &Instr) -> Result<(), CompileError> {
        match instr {
            Instr::Op(op) => self.lower_plain(*op),
            Instr::Local { op, index } => self.lower_local(*op, *index),
            Instr::Global { op, index } => self.lower_global(*op, *index),
            Instr::Memory { op, offset, .. } => self.lower_memory(*op, *offset),
            Instr::I32Const(v) => {
                self.push_t(ValueKind::I32);
                if code::imm_fits(*v as i64) {
                    self.emit(OpClass::ShortConst, ValueKind::I32, 0, *v);
                } else {
                    let idx = self.pool_i32.len();
                    self.pool_i32.push(*v);
                    let imm = self.imm(idx as i64, "i32.const")?;
                    self.emit(OpClass::Const, ValueKind::I32, 0, imm);
                }
                Ok(())
            }
            Instr::I64Const(v) => {
                self.push_t(ValueKind::I64);
                if code::imm_fits(*v) {
                    self.emit(OpClass::ShortConst, ValueKind::I64, 0, *v as i32);
                } else {
                    let idx = self.pool_i64.len();
                    self.pool_i64.push(*v);
                    let imm = self.imm(idx as i64, "i64.const")?;
                    self.emit(OpClass::Const, ValueKind::I64, 0, imm);
                }
                Ok(())
            }
            Instr::F32Const(v) => {
                self.push_t(ValueKind::F32);
                let idx = self.pool_f32.len();
                self.pool_f32.push(*v);
                let imm = self.imm(idx as i64, "f32.const")?;
                self.emit(OpClass::Const, ValueKind::F32, 0, imm);
                Ok(())
            }
            Instr::F64Const(v) => {
                self.push_t(ValueKind::F64);
                let idx = self.pool_f64.len();
                self.pool_f64.push(*v);
                let imm = self.imm(idx as i64, "f64.const")?;
                self.emit(OpClass::Const, ValueKind::F64, 0, imm);
                Ok(())
            }
            Instr::Block { block_type, body } => {
                let label = self.open_label(RegionKind::Block);
                self.bind_start(label);
                let depth = self.types.len();
                let result = block_type.result_kind();
                self.controls.push(Control {
                    label,
                    depth,
                    result,
                });
                for instr in body {
                    if self.dead {
                        break;
                    }
                    self.compile_instr(instr)?;
                }
                self.controls.pop();
                self.bind_end(label);
                self.close_region(depth, result);
                Ok(())
            }
            Instr::Loop { block_type, body } => {
                let label = self.open_label(RegionKind::Loop);
                self.bind_start(label);
                let depth = self.types.len();
                let result = block_type.result_kind();
                self.controls.push(Control {
                    label,
                    depth,
                    result,
                });
                for instr in body {
                    if self.dead {
                        break;
                    }
                    self.compile_instr(instr)?;
                }
                self.controls.pop();
                self.bind_end(label);
                self.close_region(depth, result);
                Ok(())
            }
            Instr::If {
                block_type,
                then_body,
                else_body,
            } => self.lower_if(*block_type, then_body, else_body),
            Instr::Br { depth } => {
                let label = self.branch_label(*depth, "br")?;
                self.emit_branch(OpClass::Goto, label, "br");
                self.dead = true;
                Ok(())
            }
            Instr::BrIf { depth } => {
                self.pop_expect(ValueKind::I32, "br_if")?;
                let label = self.branch_label(*depth, "br_if")?;
                self.emit_branch(OpClass::GotoIf, label, "br_if");
                Ok(())
            }
            Instr::BrTable { depths, default } => {
                self.pop_expect(ValueKind::I32, "br_table")?;
                let base = self.pool_i32.len();
                self.pool_i32.push(depths.len() as i32);
                let default_label = self.branch_label(*default, "br_table")?;
                self.patches.push(Patch {
                    site: PatchSite::Pool(self.pool_i32.len()),
                    label: default_label,
                    mnemonic: "br_table",
                });
                self.pool_i32.push(-1);
                for depth in depths {
                    let label = self.branch_label(*depth, "br_table")?;
                    self.patches.push(Patch {
                        site: PatchSite::Pool(self.pool_i32.len()),
                        label,
                        mnemonic: "br_table",
                    });
                    self.pool_i32.push(-1);
                }
                let imm = self.imm(base as i64, "br_table")?;
                self.emit(OpClass::GotoTable, ValueKind::Void, 0, imm);
                self.dead = true;
                Ok(())
            }
            Instr::Call { func } => {
                let callee = self.module.functions.get(*func as usize).ok_or_else(|| {
                    CompileError::IndexOutOfRange {
                        func: self.func_name.clone(),
                        mnemonic: "call",
                        index: *func,
                    }
                })?;
                for param in callee.ty.params.iter().rev() {
                    self.pop_expect(param.kind(), "call")?;
                }
                let result = callee.ty.result_kind();
                if result != ValueKind::Void {
                    self.push_t(result);
                }
                let imm = self.imm(*func as i64, "call")?;
                self.emit(OpClass::Call, result, 0, imm);
                Ok(())
            }
            Instr::CallIndirect { type_idx, table } => {
                let ty = self.module.types.get(*type_idx as usize).ok_or_else(|| {
                    CompileError::IndexOutOfRange {
                        func: self.func_name.clone(),
                        mnemonic: "call_indirect",
                        index: *type_idx,
                    }
                })?;
                if *table >= 8 {
                    return Err(CompileError::ImmediateOverflow {
                        func: self.func_name.clone(),
                        mnemonic: "call_indirect",
                        value: *table as i64,
                    });
                }
                self.pop_expect(ValueKind::I32, "call_indirect")?;
                for param in ty.params.iter().rev() {
                    self.pop_expect(param.kind(), "call_indirect")?;
                }
                let result = ty.result_kind();
                if result != ValueKind::Void {
                    self.push_t(result);
                }
                let imm = self.imm(*type_idx as i64, "call_indirect")?;
                self.emit(OpClass::CallIndirect, result, *table as u8, imm);
                Ok(())
            }
            Instr::RefFunc { func } => {
                self.push_t(ValueKind::FuncRef);
                let imm = self.imm(*func as i64, "ref.func")?;
                self.emit(OpClass::RefFunc, ValueKind::FuncRef, 0, imm);
                Ok(())
            }
        }
    }

    fn lower_if(
        &mut self,
        block_type: crate::module::BlockType,
        then_body: &[Instr],
        else_body: &[Instr],
    ) -> Result<(), CompileError> {
        self.pop_expect(ValueKind::I32, "if")?;
        let else_label = self.open_label(RegionKind::Block);
        let region = self.open_label(RegionKind::If);
        self.bind_start(region);
        let depth = self.types.len();
        let result = block_type.result_kind();
        self.emit_branch(OpClass::GotoIfNot, else_label, "if");
        self.controls.push(Control {
            label: region,
            depth,
            result,
        });
        for instr in then_body {
            if self.dead {
                break;
            }
            self.compile_instr(instr)?;
        }
        if else_body.is_empty() {
            self.bind_end(else_label);
        } else {
            if !self.dead {
                self.emit_branch(OpClass::Goto, region, "else");
            }
            self.bind_end(else_label);
            self.types.truncate(depth);
            self.dead = false;
            for instr in else_body {
                if self.dead {
                    break;
                }
                self.compile_instr(instr)?;
            }
        }
        self.controls.pop();
        self.bind_end(region);
        self.close_region(depth, result);
        Ok(())
    }

    fn lower_local(&mut self, op: Opcode, index: u32) -> Result<(), CompileError> {
        let kind = *self.local_kinds.get(index as usize).ok_or_else(|| {
            CompileError::IndexOutOfRange {
                func: self.func_name.clone(),
                mnemonic: op.mnemonic(),
                index,
            }
        })?;
        let offset = self.local_offsets[index as usize];
        let imm = self.imm(offset as i64, op.mnemonic())?;
        match op {
            Opcode::LocalGet => {
                self.push_t(kind);
                self.emit(OpClass::LocalGet, kind, 0, imm);
            }
            Opcode::LocalSet => {
                self.pop_expect(kind, op.mnemonic())?;
                self.emit(OpClass::LocalSet, kind, 0, imm);
            }
            Opcode::LocalTee => {
                self.pop_expect(kind, op.mnemonic())?;
                self.push_t(kind);
                self.emit(OpClass::LocalTee, kind, 0, imm);
            }
            _ => {
                return Err(CompileError::Unsupported {
                    func: self.func_name.clone(),
                    mnemonic: op.mnemonic(),
                })
            }
        }
        Ok(())
    }

    fn lower_global(&mut self, op: Opcode, index: u32) -> Result<(), CompileError> {
        let global = self.module.globals.get(index as usize).ok_or_else(|| {
            CompileError::IndexOutOfRange {
                func: self.func_name.clone(),
                mnemonic: op.mnemonic(),
                index,
            }
        })?;
        let kind = global.ty.kind();
        let imm = self.imm(index as i64, op.mnemonic())?;
        match op {
            Opcode::GlobalGet => {
                self.push_t(kind);
                self.emit(OpClass::GlobalGet, kind, 0, imm);
            }
            Opcode::GlobalSet => {
                self.pop_expect(kind, op.mnemonic())?;
                self.emit(OpClass::GlobalSet, kind, 0, imm);
            }
            _ => {
                return Err(CompileError::Unsupported {
                    func: self.func_name.clone(),
                    mnemonic: op.mnemonic(),
                })
            }
        }
        Ok(())
    }

    fn lower_memory(&mut self, op: Opcode, offset: u32) -> Result<(), CompileError> {
        use Opcode::*;
        let (class, kind, extra) = match op {
            I32Load => (OpClass::Load, ValueKind::I32, LoadWidth::Whole.bits()),
            I64Load => (OpClass::Load, ValueKind::I64, LoadWidth::Whole.bits()),
            F32Load => (OpClass::Load, ValueKind::F32, LoadWidth::Whole.bits()),
            F64Load => (OpClass::Load, ValueKind::F64, LoadWidth::Whole.bits()),
            I32Load8S => (OpClass::Load, ValueKind::I32, LoadWidth::B8S.bits()),
            I32Load8U => (OpClass::Load, ValueKind::I32, LoadWidth::B8U.bits()),
            I32Load16S => (OpClass::Load, ValueKind::I32, LoadWidth::B16S.bits()),
            I32Load16U => (OpClass::Load, ValueKind::I32, LoadWidth::B16U.bits()),
            I64Load8S => (OpClass::Load, ValueKind::I64, LoadWidth::B8S.bits()),
            I64Load8U => (OpClass::Load, ValueKind::I64, LoadWidth::B8U.bits()),
            I64Load16S => (OpClass::Load, ValueKind::I64, LoadWidth::B16S.bits()),
            I64Load16U => (OpClass::Load, ValueKind::I64, LoadWidth::B16U.bits()),
            I64Load32S => (OpClass::Load, ValueKind::I64, LoadWidth::B32S.bits()),
            I64Load32U => (OpClass::Load, ValueKind::I64, LoadWidth::B32U.bits()),
            I32Store => (OpClass::Store, ValueKind::I32, StoreWidth::Whole.bits()),
            I64Store => (OpClass::Store, ValueKind::I64, StoreWidth::Whole.bits()),
            F32Store => (OpClass::Store, ValueKind::F32, StoreWidth::Whole.bits()),
            F64Store => (OpClass::Store, ValueKind::F64, StoreWidth::Whole.bits()),
            I32Store8 => (OpClass::Store, ValueKind::I32, StoreWidth::B8.bits()),
            I32Store16 => (OpClass::Store, ValueKind::I32, StoreWidth::B16.bits()),
            I64Store8 => (OpClass::Store, ValueKind::I64, StoreWidth::B8.bits()),
            I64Store16 => (OpClass::Store, ValueKind::I64, StoreWidth::B16.bits()),
            I64Store32 => (OpClass::Store, ValueKind::I64, StoreWidth::B32.bits()),
            _ => {
                return Err(CompileError::Unsupported {
                    func: self.func_name.clone(),
                    mnemonic: op.mnemonic(),
                })
            }
        };
        let imm = self.imm(offset as i64, op.mnemonic())?;
        if class == OpClass::Load {
            self.pop_expect(ValueKind::I32, op.mnemonic())?;
            self.push_t(kind);
        } else {
            self.pop_expect(kind, op.mnemonic())?;
            self.pop_expect(ValueKind::I32, op.mnemonic())?;
        }
        self.emit(class, kind, extra, imm);
        Ok(())
    }

    /// Lower a plain catalog instruction: no static operand, pure stack
    /// effect.
    fn lower_plain(&mut self, op: Opcode) -> Result<(), CompileError> {
        match op {
            Opcode::Nop => {
                self.emit(OpClass::Nop, ValueKind::Void, 0, 0);
                return Ok(());
            }
            Opcode::Unreachable => {
                self.emit(OpClass::Unreachable, ValueKind::Void, 0, 0);
                self.dead = true;
                return Ok(());
            }
            Opcode::Return => {
                if self.result != ValueKind::Void {
                    self.pop_expect(self.result, "return")?;
                }
                self.emit(OpClass::Return, self.result, 0, 0);
                self.dead = true;
                return Ok(());
            }
            Opcode::Drop => {
                let kind = self.pop_t("drop")?;
                self.emit(OpClass::Drop, kind, 0, 0);
                return Ok(());
            }
            Opcode::Select => {
                self.pop_expect(ValueKind::I32, "select")?;
                let b = self.pop_t("select")?;
                let a = self.pop_t("select")?;
                if a != b {
                    return Err(CompileError::TypeMismatch {
                        func: self.func_name.clone(),
                        mnemonic: "select",
                        expected: a,
                        found: b,
                    });
                }
                self.push_t(a);
                self.emit(OpClass::Select, a, 0, 0);
                return Ok(());
            }
            Opcode::MemorySize => {
                self.push_t(ValueKind::I32);
                self.emit(OpClass::MemorySize, ValueKind::I32, 0, 0);
                return Ok(());
            }
            Opcode::MemoryGrow => {
                self.pop_expect(ValueKind::I32, "memory.grow")?;
                self.push_t(ValueKind::I32);
                self.emit(OpClass::MemoryGrow, ValueKind::I32, 0, 0);
                return Ok(());
            }
            Opcode::RefNull => {
                self.push_t(ValueKind::FuncRef);
                self.emit(OpClass::RefNull, ValueKind::FuncRef, 0, 0);
                return Ok(());
            }
            Opcode::RefIsNull => {
                self.pop_expect(ValueKind::FuncRef, "ref.is_null")?;
                self.push_t(ValueKind::I32);
                self.emit(OpClass::RefIsNull, ValueKind::I32, 0, 0);
                return Ok(());
            }
            _ => {}
        }

        let (class, kind, extra) = self.numeric_lowering(op)?;
        let info = op.info();
        for _ in 0..info.inputs {
            self.pop_expect(info.operand, op.mnemonic())?;
        }
        if info.outputs > 0 {
            self.push_t(info.result);
        }
        self.emit(class, kind, extra, 0);
        Ok(())
    }

    /// The class/kind/extra triple for every numeric and conversion opcode.
    fn numeric_lowering(&self, op: Opcode) -> Result<(OpClass, ValueKind, u8), CompileError> {
        use OpClass as C;
        use Opcode::*;
        use ValueKind as K;
        Ok(match op {
            // comparisons against zero / equality
            I32Eqz => (C::CmpEq, K::I32, EqOp::Eqz.bits()),
            I32Eq => (C::CmpEq, K::I32, EqOp::Eq.bits()),
            I32Ne => (C::CmpEq, K::I32, EqOp::Ne.bits()),
            I64Eqz => (C::CmpEq, K::I64, EqOp::Eqz.bits()),
            I64Eq => (C::CmpEq, K::I64, EqOp::Eq.bits()),
            I64Ne => (C::CmpEq, K::I64, EqOp::Ne.bits()),
            F32Eq => (C::CmpEq, K::F32, EqOp::Eq.bits()),
            F32Ne => (C::CmpEq, K::F32, EqOp::Ne.bits()),
            F64Eq => (C::CmpEq, K::F64, EqOp::Eq.bits()),
            F64Ne => (C::CmpEq, K::F64, EqOp::Ne.bits()),
            // ordered comparisons; floats use the signed slots
            I32LtS => (C::CmpOrd, K::I32, OrdOp::LtS.bits()),
            I32LtU => (C::CmpOrd, K::I32, OrdOp::LtU.bits()),
            I32GtS => (C::CmpOrd, K::I32, OrdOp::GtS.bits()),
            I32GtU => (C::CmpOrd, K::I32, OrdOp::GtU.bits()),
            I32LeS => (C::CmpOrd, K::I32, OrdOp::LeS.bits()),
            I32LeU => (C::CmpOrd, K::I32, OrdOp::LeU.bits()),
            I32GeS => (C::CmpOrd, K::I32, OrdOp::GeS.bits()),
            I32GeU => (C::CmpOrd, K::I32, OrdOp::GeU.bits()),
            I64LtS => (C::CmpOrd, K::I64, OrdOp::LtS.bits()),
            I64LtU => (C::CmpOrd, K::I64, OrdOp::LtU.bits()),
            I64GtS => (C::CmpOrd, K::I64, OrdOp::GtS.bits()),
            I64GtU => (C::CmpOrd, K::I64, OrdOp::GtU.bits()),
            I64LeS => (C::CmpOrd, K::I64, OrdOp::LeS.bits()),
            I64LeU => (C::CmpOrd, K::I64, OrdOp::LeU.bits()),
            I64GeS => (C::CmpOrd, K::I64, OrdOp::GeS.bits()),
            I64GeU => (C::CmpOrd, K::I64, OrdOp::GeU.bits()),
            F32Lt => (C::CmpOrd, K::F32, OrdOp::LtS.bits()),
            F32Gt => (C::CmpOrd, K::F32, OrdOp::GtS.bits()),
            F32Le => (C::CmpOrd, K::F32, OrdOp::LeS.bits()),
            F32Ge => (C::CmpOrd, K::F32, OrdOp::GeS.bits()),
            F64Lt => (C::CmpOrd, K::F64, OrdOp::LtS.bits()),
            F64Gt => (C::CmpOrd, K::F64, OrdOp::GtS.bits()),
            F64Le => (C::CmpOrd, K::F64, OrdOp::LeS.bits()),
            F64Ge => (C::CmpOrd, K::F64, OrdOp::GeS.bits()),
            // integer arithmetic
            I32Add => (C::Binop, K::I32, IntArith::Add.bits()),
            I32Sub => (C::Binop, K::I32, IntArith::Sub.bits()),
            I32Mul => (C::Binop, K::I32, IntArith::Mul.bits()),
            I32DivS => (C::Binop, K::I32, IntArith::DivS.bits()),
            I32DivU => (C::Binop, K::I32, IntArith::DivU.bits()),
            I32RemS => (C::Binop, K::I32, IntArith::RemS.bits()),
            I32RemU => (C::Binop, K::I32, IntArith::RemU.bits()),
            I64Add => (C::Binop, K::I64, IntArith::Add.bits()),
            I64Sub => (C::Binop, K::I64, IntArith::Sub.bits()),
            I64Mul => (C::Binop, K::I64, IntArith::Mul.bits()),
            I64DivS => (C::Binop, K::I64, IntArith::DivS.bits()),
            I64DivU => (C::Binop, K::I64, IntArith::DivU.bits()),
            I64RemS => (C::Binop, K::I64, IntArith::RemS.bits()),
            I64RemU => (C::Binop, K::I64, IntArith::RemU.bits()),
            // bitwise
            I32And => (C::BinBit, K::I32, BitOp::And.bits()),
            I32Or => (C::BinBit, K::I32, BitOp::Or.bits()),
            I32Xor => (C::BinBit, K::I32, BitOp::Xor.bits()),
            I32Shl => (C::BinBit, K::I32, BitOp::Shl.bits()),
            I32ShrS => (C::BinBit, K::I32, BitOp::ShrS.bits()),
            I32ShrU => (C::BinBit, K::I32, BitOp::ShrU.bits()),
            I32Rotl => (C::BinBit, K::I32, BitOp::Rotl.bits()),
            I32Rotr => (C::BinBit, K::I32, BitOp::Rotr.bits()),
            I64And => (C::BinBit, K::I64, BitOp::And.bits()),
            I64Or => (C::BinBit, K::I64, BitOp::Or.bits()),
            I64Xor => (C::BinBit, K::I64, BitOp::Xor.bits()),
            I64Shl => (C::BinBit, K::I64, BitOp::Shl.bits()),
            I64ShrS => (C::BinBit, K::I64, BitOp::ShrS.bits()),
            I64ShrU => (C::BinBit, K::I64, BitOp::ShrU.bits()),
            I64Rotl => (C::BinBit, K::I64, BitOp::Rotl.bits()),
            I64Rotr => (C::BinBit, K::I64, BitOp::Rotr.bits()),
            // integer unary
            I32Clz => (C::Unop, K::I32, IntUnop::Clz.bits()),
            I32Ctz => (C::Unop, K::I32, IntUnop::Ctz.bits()),
            I32Popcnt => (C::Unop, K::I32, IntUnop::Popcnt.bits()),
            I32Extend8S => (C::Unop, K::I32, IntUnop::Extend8S.bits()),
            I32Extend16S => (C::Unop, K::I32, IntUnop::Extend16S.bits()),
            I64Clz => (C::Unop, K::I64, IntUnop::Clz.bits()),
            I64Ctz => (C::Unop, K::I64, IntUnop::Ctz.bits()),
            I64Popcnt => (C::Unop, K::I64, IntUnop::Popcnt.bits()),
            I64Extend8S => (C::Unop, K::I64, IntUnop::Extend8S.bits()),
            I64Extend16S => (C::Unop, K::I64, IntUnop::Extend16S.bits()),
            I64Extend32S => (C::Unop, K::I64, IntUnop::Extend32S.bits()),
            // float arithmetic
            F32Add => (C::Binop, K::F32, FloatArith::Add.bits()),
            F32Sub => (C::Binop, K::F32, FloatArith::Sub.bits()),
            F32Mul => (C::Binop, K::F32, FloatArith::Mul.bits()),
            F32Div => (C::Binop, K::F32, FloatArith::Div.bits()),
            F32Min => (C::Binop, K::F32, FloatArith::Min.bits()),
            F32Max => (C::Binop, K::F32, FloatArith::Max.bits()),
            F32Copysign => (C::Binop, K::F32, FloatArith::CopySign.bits()),
            F64Add => (C::Binop, K::F64, FloatArith::Add.bits()),
            F64Sub => (C::Binop, K::F64, FloatArith::Sub.bits()),
            F64Mul => (C::Binop, K::F64, FloatArith::Mul.bits()),
            F64Div => (C::Binop, K::F64, FloatArith::Div.bits()),
            F64Min => (C::Binop, K::F64, FloatArith::Min.bits()),
            F64Max => (C::Binop, K::F64, FloatArith::Max.bits()),
            F64Copysign => (C::Binop, K::F64, FloatArith::CopySign.bits()),
            // float unary
            F32Abs => (C::Unop, K::F32, FloatUnop::Abs.bits()),
            F32Neg => (C::Unop, K::F32, FloatUnop::Neg.bits()),
            F32Ceil => (C::Unop, K::F32, FloatUnop::Ceil.bits()),
            F32Floor => (C::Unop, K::F32, FloatUnop::Floor.bits()),
            F32Trunc => (C::Unop, K::F32, FloatUnop::Trunc.bits()),
            F32Nearest => (C::Unop, K::F32, FloatUnop::Nearest.bits()),
            F32Sqrt => (C::Unop, K::F32, FloatUnop::Sqrt.bits()),
            F64Abs => (C::Unop, K::F64, FloatUnop::Abs.bits()),
            F64Neg => (C::Unop, K::F64, FloatUnop::Neg.bits()),
            F64Ceil => (C::Unop, K::F64, FloatUnop::Ceil.bits()),
            F64Floor => (C::Unop, K::F64, FloatUnop::Floor.bits()),
            F64Trunc => (C::Unop, K::F64, FloatUnop::Trunc.bits()),
            F64Nearest => (C::Unop, K::F64, FloatUnop::Nearest.bits()),
            F64Sqrt => (C::Unop, K::F64, FloatUnop::Sqrt.bits()),
            // trapping truncation; kind is the destination
            I32TruncF32S => (C::Trunc, K::I32, TruncSrc::F32S.bits()),
            I32TruncF32U => (C::Trunc, K::I32, TruncSrc::F32U.bits()),
            I32TruncF64S => (C::Trunc, K::I32, TruncSrc::F64S.bits()),
            I32TruncF64U => (C::Trunc, K::I32, TruncSrc::F64U.bits()),
            I64TruncF32S => (C::Trunc, K::I64, TruncSrc::F32S.bits()),
            I64TruncF32U => (C::Trunc, K::I64, TruncSrc::F32U.bits()),
            I64TruncF64S => (C::Trunc, K::I64, TruncSrc::F64S.bits()),
            I64TruncF64U => (C::Trunc, K::I64, TruncSrc::F64U.bits()),
            // saturating truncation
            I32TruncSatF32S => (C::TruncSat, K::I32, TruncSrc::F32S.bits()),
            I32TruncSatF32U => (C::TruncSat, K::I32, TruncSrc::F32U.bits()),
            I32TruncSatF64S => (C::TruncSat, K::I32, TruncSrc::F64S.bits()),
            I32TruncSatF64U => (C::TruncSat, K::I32, TruncSrc::F64U.bits()),
            I64TruncSatF32S => (C::TruncSat, K::I64, TruncSrc::F32S.bits()),
            I64TruncSatF32U => (C::TruncSat, K::I64, TruncSrc::F32U.bits()),
            I64TruncSatF64S => (C::TruncSat, K::I64, TruncSrc::F64S.bits()),
            I64TruncSatF64U => (C::TruncSat, K::I64, TruncSrc::F64U.bits()),
            // int to float conversion; kind is the destination
            F32ConvertI32S => (C::Convert, K::F32, ConvertSrc::I32S.bits()),
            F32ConvertI32U => (C::Convert, K::F32, ConvertSrc::I32U.bits()),
            F32ConvertI64S => (C::Convert, K::F32, ConvertSrc::I64S.bits()),
            F32ConvertI64U => (C::Convert, K::F32, ConvertSrc::I64U.bits()),
            F64ConvertI32S => (C::Convert, K::F64, ConvertSrc::I32S.bits()),
            F64ConvertI32U => (C::Convert, K::F64, ConvertSrc::I32U.bits()),
            F64ConvertI64S => (C::Convert, K::F64, ConvertSrc::I64S.bits()),
            F64ConvertI64U => (C::Convert, K::F64, ConvertSrc::I64U.bits()),
            // width changes and reinterpretation
            I32WrapI64 => (C::Recast, K::I32, RecastOp::Wrap.bits()),
            I64ExtendI32S => (C::Recast, K::I64, RecastOp::ExtendS.bits()),
            I64ExtendI32U => (C::Recast, K::I64, RecastOp::ExtendU.bits()),
            F32DemoteF64 => (C::Recast, K::F32, RecastOp::Demote.bits()),
            F64PromoteF32 => (C::Recast, K::F64, RecastOp::Promote.bits()),
            I32ReinterpretF32 => (C::Recast, K::I32, RecastOp::Reinterpret.bits()),
            I64ReinterpretF64 => (C::Recast, K::I64, RecastOp::Reinterpret.bits()),
            F32ReinterpretI32 => (C::Recast, K::F32, RecastOp::Reinterpret.bits()),
            F64ReinterpretI64 => (C::Recast, K::F64, RecastOp::Reinterpret.bits()),
            _ => {
                return Err(CompileError::Unsupported {
                    func: self.func_name.clone(),
                    mnemonic: op.mnemonic(),
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{BlockType, Function, FunctionType, ValueType};

    fn compile(
        params: Vec<ValueType>,
        result: Option<ValueType>,
        locals: Vec<ValueType>,
        body: Vec<Instr>,
    ) -> Result<CompiledCode, CompileError> {
        let module = Module::default();
        let func = Function::local(
            Some("f".to_string()),
            FunctionType::new(params, result),
            locals,
            body,
        );
        compile_function(&func, 0, &module)
    }

    fn classes(code: &CompiledCode) -> Vec<OpClass> {
        code.words
            .iter()
            .map(|w| OpClass::from_bits(w.class_bits()).unwrap())
            .collect()
    }

    #[test]
    fn test_add_function_lowering() {
        let code = compile(
            vec![ValueType::I32, ValueType::I32],
            Some(ValueType::I32),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Local { op: Opcode::LocalGet, index: 1 },
                Instr::Op(Opcode::I32Add),
            ],
        )
        .unwrap();
        assert_eq!(
            classes(&code),
            vec![OpClass::LocalGet, OpClass::LocalGet, OpClass::Binop, OpClass::Return]
        );
        assert_eq!(code.words[0].imm(), 0);
        assert_eq!(code.words[1].imm(), 4);
        assert_eq!(code.words[2].extra(), IntArith::Add.bits());
        assert_eq!(code.params_size, 8);
        assert_eq!(code.locals_size, 8);
        assert_eq!(code.result, ValueKind::I32);
    }

    #[test]
    fn test_short_const_vs_pool_const() {
        let code = compile(
            vec![],
            Some(ValueType::I32),
            vec![],
            vec![
                Instr::I32Const(42),
                Instr::Op(Opcode::Drop),
                Instr::I32Const(1_000_000),
            ],
        )
        .unwrap();
        assert_eq!(
            classes(&code),
            vec![OpClass::ShortConst, OpClass::Drop, OpClass::Const, OpClass::Return]
        );
        assert_eq!(code.words[0].imm(), 42);
        assert_eq!(code.pool_i32, vec![1_000_000]);
        assert_eq!(code.words[2].imm(), 0);
    }

    #[test]
    fn test_negative_short_const() {
        let code = compile(
            vec![],
            Some(ValueType::I32),
            vec![],
            vec![Instr::I32Const(-500_000)],
        )
        .unwrap();
        assert_eq!(code.words[0].imm(), -500_000);
        assert!(code.pool_i32.is_empty());
    }

    #[test]
    fn test_float_consts_always_pooled() {
        let code = compile(
            vec![],
            Some(ValueType::F64),
            vec![],
            vec![Instr::F64Const(1.0)],
        )
        .unwrap();
        assert_eq!(classes(&code)[0], OpClass::Const);
        assert_eq!(code.pool_f64, vec![1.0]);
    }

    #[test]
    fn test_block_branch_resolves_to_end() {
        // block; br 0; end -> the goto jumps past the block
        let code = compile(
            vec![],
            None,
            vec![],
            vec![Instr::Block {
                block_type: BlockType::Empty,
                body: vec![Instr::Br { depth: 0 }],
            }],
        )
        .unwrap();
        assert_eq!(classes(&code), vec![OpClass::Goto, OpClass::Return]);
        assert_eq!(code.words[0].imm(), 1);
    }

    #[test]
    fn test_loop_branch_resolves_to_start() {
        let code = compile(
            vec![],
            None,
            vec![ValueType::I32],
            vec![Instr::Loop {
                block_type: BlockType::Empty,
                body: vec![
                    Instr::Local { op: Opcode::LocalGet, index: 0 },
                    Instr::BrIf { depth: 0 },
                ],
            }],
        )
        .unwrap();
        assert_eq!(
            classes(&code),
            vec![OpClass::LocalGet, OpClass::GotoIf, OpClass::Return]
        );
        // back to the loop head, offset 0
        assert_eq!(code.words[1].imm(), 0);
    }

    #[test]
    fn test_all_branch_targets_non_negative() {
        let code = compile(
            vec![ValueType::I32],
            None,
            vec![],
            vec![Instr::Block {
                block_type: BlockType::Empty,
                body: vec![Instr::Loop {
                    block_type: BlockType::Empty,
                    body: vec![
                        Instr::Local { op: Opcode::LocalGet, index: 0 },
                        Instr::BrIf { depth: 1 },
                        Instr::Local { op: Opcode::LocalGet, index: 0 },
                        Instr::BrIf { depth: 0 },
                    ],
                }],
            }],
        )
        .unwrap();
        for word in &code.words {
            let class = OpClass::from_bits(word.class_bits()).unwrap();
            if matches!(class, OpClass::Goto | OpClass::GotoIf | OpClass::GotoIfNot) {
                assert!(word.imm() >= 0);
                assert!((word.imm() as usize) <= code.words.len());
            }
        }
    }

    #[test]
    fn test_if_else_lowering() {
        let code = compile(
            vec![ValueType::I32],
            Some(ValueType::I32),
            vec![],
            vec![Instr::If {
                block_type: BlockType::Value(ValueType::I32),
                then_body: vec![Instr::I32Const(1)],
                else_body: vec![Instr::I32Const(2)],
            }],
        );
        // need the condition on the stack first
        assert!(matches!(code, Err(CompileError::TypeUnderflow { .. })));

        let code = compile(
            vec![ValueType::I32],
            Some(ValueType::I32),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::If {
                    block_type: BlockType::Value(ValueType::I32),
                    then_body: vec![Instr::I32Const(1)],
                    else_body: vec![Instr::I32Const(2)],
                },
            ],
        )
        .unwrap();
        assert_eq!(
            classes(&code),
            vec![
                OpClass::LocalGet,
                OpClass::GotoIfNot,
                OpClass::ShortConst,
                OpClass::Goto,
                OpClass::ShortConst,
                OpClass::Return,
            ]
        );
        // false arm entry and join point
        assert_eq!(code.words[1].imm(), 4);
        assert_eq!(code.words[3].imm(), 5);
    }

    #[test]
    fn test_br_table_pool_layout() {
        let code = compile(
            vec![ValueType::I32],
            None,
            vec![],
            vec![Instr::Block {
                block_type: BlockType::Empty,
                body: vec![Instr::Block {
                    block_type: BlockType::Empty,
                    body: vec![
                        Instr::Local { op: Opcode::LocalGet, index: 0 },
                        Instr::BrTable {
                            depths: vec![0, 1],
                            default: 1,
                        },
                    ],
                }],
            }],
        )
        .unwrap();
        // [n, default, targets...] with every entry resolved
        assert_eq!(code.pool_i32.len(), 4);
        assert_eq!(code.pool_i32[0], 2);
        for &target in &code.pool_i32[1..] {
            assert!(target >= 0);
        }
        let table = &code.words[1];
        assert_eq!(OpClass::from_bits(table.class_bits()), Some(OpClass::GotoTable));
        assert_eq!(table.imm(), 0);
    }

    #[test]
    fn test_type_mismatch_reported() {
        let err = compile(
            vec![],
            Some(ValueType::I32),
            vec![],
            vec![Instr::F32Const(1.0), Instr::F32Const(2.0), Instr::Op(Opcode::I32Add)],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { .. }));
    }

    #[test]
    fn test_wide_memarg_offset_rejected() {
        let err = compile(
            vec![ValueType::I32],
            Some(ValueType::I32),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Memory {
                    op: Opcode::I32Load,
                    align: 2,
                    offset: 1 << 21,
                },
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::ImmediateOverflow { .. }));
    }

    #[test]
    fn test_bulk_ops_unsupported() {
        let err = compile(vec![], None, vec![], vec![Instr::Op(Opcode::MemoryCopy)]).unwrap_err();
        match err {
            CompileError::Unsupported { mnemonic, .. } => assert_eq!(mnemonic, "memory.copy"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_expr_result_kind_inferred() {
        let module = Module::default();
        let code = compile_expr(&[Instr::F64Const(-1.0)], &module).unwrap();
        assert_eq!(code.result, ValueKind::F64);
        let void = compile_expr(&[], &module).unwrap();
        assert_eq!(void.result, ValueKind::Void);
    }

    #[test]
    fn test_locals_after_params_get_higher_offsets() {
        let code = compile(
            vec![ValueType::I64],
            None,
            vec![ValueType::I32, ValueType::F64],
            vec![],
        )
        .unwrap();
        assert_eq!(code.local_offsets, vec![0, 8, 12]);
        assert_eq!(code.params_size, 8);
        assert_eq!(code.locals_size, 20);
    }
}
