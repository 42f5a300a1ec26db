//! The execution engine
//!
//! A fetch-decode-execute loop over packed words. Dispatch is two-level:
//! first on the opcode class, then on the value kind, so `i32.add` and
//! `f64.add` share one arm. Calls are host-language recursion; each frame
//! remembers the byte offset where its locals start and unwinds the
//! operand stack back to it on return.

use crate::code::{
    BitOp, CompiledCode, ConvertSrc, EqOp, FloatArith, FloatUnop, IntArith, IntUnop, LoadWidth,
    OpClass, OrdOp, RecastOp, StoreWidth, TruncSrc, ValueKind, Word,
};
use crate::compiler;
use crate::module::{Function, Instr, Module, ValueType};
use std::rc::Rc;

use super::host::{HostFunc, HostRegistry};
use super::memory::Memory;
use super::numeric;
use super::stack::{OperandStack, DEFAULT_STACK_BYTES};
use super::table::Table;
use super::value::Value;
use super::RuntimeError;

/// Nested call limit. Every guest frame is a host `execute` frame, several
/// KiB each, so the cap must trip well before a default 2 MiB thread stack
/// runs out.
const MAX_CALL_DEPTH: usize = 200;

#[derive(Debug)]
struct GlobalSlot {
    value: Value,
    mutable: bool,
}

/// One module's worth of mutable execution state.
pub struct Runtime {
    module: Rc<Module>,
    stack: OperandStack,
    memory: Memory,
    tables: Vec<Table>,
    globals: Vec<GlobalSlot>,
    hosts: HostRegistry,
    fuel: u64,
    call_depth: usize,
}

impl Runtime {
    /// Instantiate a module: allocate memory and tables, evaluate global
    /// initializers, fill tables from element segments, copy data segments,
    /// and run the start function if there is one.
    pub fn new(module: Module) -> Result<Runtime, RuntimeError> {
        let memory = match module.memory {
            Some(limits) => Memory::new(limits.min, limits.max)?,
            None => Memory::new(0, Some(0))?,
        };
        let tables = module
            .tables
            .iter()
            .map(|t| Table::new(t.limits.min, t.limits.max))
            .collect();
        let mut runtime = Runtime {
            module: Rc::new(module),
            stack: OperandStack::new(DEFAULT_STACK_BYTES),
            memory,
            tables,
            globals: Vec::new(),
            hosts: HostRegistry::default(),
            fuel: u64::MAX,
            call_depth: 0,
        };
        runtime.init()?;
        Ok(runtime)
    }

    fn init(&mut self) -> Result<(), RuntimeError> {
        let module = Rc::clone(&self.module);

        // globals first, so segment offsets may read them
        for global in &module.globals {
            let value = if global.init.is_empty() {
                zero_value(global.ty)
            } else {
                self.eval_expr(&global.init)?
                    .ok_or(RuntimeError::StackUnderflow)?
            };
            check_value_type(&value, global.ty)?;
            self.globals.push(GlobalSlot {
                value,
                mutable: global.mutable,
            });
        }

        for segment in &module.elements {
            let offset = self
                .eval_expr(&segment.offset)?
                .ok_or(RuntimeError::StackUnderflow)?
                .as_i32()? as u32;
            let table = self
                .tables
                .get_mut(segment.table as usize)
                .ok_or(RuntimeError::TableIndexOutOfBounds(segment.table))?;
            for (i, &func) in segment.funcs.iter().enumerate() {
                let slot = offset
                    .checked_add(i as u32)
                    .ok_or(RuntimeError::TableIndexOutOfBounds(offset))?;
                table.set(slot, Some(func))?;
            }
        }

        for segment in &module.datas {
            let offset = self
                .eval_expr(&segment.offset)?
                .ok_or(RuntimeError::StackUnderflow)?
                .as_i32()? as u32;
            self.memory.write_bytes(offset as u64, &segment.bytes)?;
        }

        if let Some(start) = module.start {
            self.call_func(start as usize)?;
        }
        Ok(())
    }

    /// Register a host function under `module.name`. May happen after
    /// instantiation; imports resolve on first call.
    pub fn register(&mut self, module: &str, name: &str, func: HostFunc) {
        self.hosts.register(module, name, func);
    }

    /// Cap the number of instructions executed across all subsequent calls.
    pub fn set_fuel(&mut self, fuel: u64) {
        self.fuel = fuel;
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        let idx = self.module.find_global(name)?;
        self.globals.get(idx).map(|g| g.value)
    }

    /// Call an exported (or named) function with the given arguments.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
        let index = self
            .module
            .find_function(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;
        self.invoke_index(index, args)
    }

    /// Call a function by index with the given arguments.
    pub fn invoke_index(
        &mut self,
        index: usize,
        args: &[Value],
    ) -> Result<Option<Value>, RuntimeError> {
        let module = Rc::clone(&self.module);
        let func = module
            .functions
            .get(index)
            .ok_or(RuntimeError::FunctionIndexOutOfBounds(index))?;
        if args.len() != func.ty.params.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                expected: func.ty.params.len(),
                actual: args.len(),
            });
        }
        let base = self.stack.size();
        let refs_base = self.stack.ref_count();
        let result = self.push_args_and_call(index, func, args);
        // a trap must not leave the frame's bytes behind
        if result.is_err() {
            self.stack.truncate(base, refs_base);
        }
        result
    }

    fn push_args_and_call(
        &mut self,
        index: usize,
        func: &Function,
        args: &[Value],
    ) -> Result<Option<Value>, RuntimeError> {
        for (arg, &param) in args.iter().zip(func.ty.params.iter()) {
            check_value_type(arg, param)?;
            self.push_value(*arg)?;
        }
        self.call_func(index)?;
        match func.ty.result {
            Some(ty) => Ok(Some(self.pop_value(ty.kind())?)),
            None => Ok(None),
        }
    }

    /// Evaluate a standalone constant-or-invoke expression and return the
    /// value it leaves behind, if any.
    pub fn eval_expr(&mut self, body: &[Instr]) -> Result<Option<Value>, RuntimeError> {
        let module = Rc::clone(&self.module);
        let code = compiler::compile_expr(body, &module)?;
        let base = self.stack.size();
        let refs_base = self.stack.ref_count();
        let result = match self.execute(&code, base) {
            Ok(()) => match code.result {
                ValueKind::Void => Ok(None),
                kind => self.pop_value(kind).map(Some),
            },
            Err(err) => Err(err),
        };
        if result.is_err() {
            self.stack.truncate(base, refs_base);
        }
        result
    }

    /// Run the callee whose arguments are already on the stack, leaving its
    /// result there. The parameter bytes become the base of the new frame.
    fn call_func(&mut self, index: usize) -> Result<(), RuntimeError> {
        let module = Rc::clone(&self.module);
        let func = module
            .functions
            .get(index)
            .ok_or(RuntimeError::FunctionIndexOutOfBounds(index))?;
        if func.is_import() {
            return self.call_host(func);
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::StackOverflow);
        }
        let code = func.compiled(index, &module)?;
        let locals_base = self
            .stack
            .size()
            .checked_sub(code.params_size)
            .ok_or(RuntimeError::StackUnderflow)?;
        // declared locals start zeroed
        self.stack.zero_to(locals_base + code.locals_size)?;
        self.call_depth += 1;
        let result = self.execute(&code, locals_base);
        self.call_depth -= 1;
        result
    }

    /// Pop the arguments back into tagged values and hand them to the
    /// registered host function. Resolution happens here, at call time.
    fn call_host(&mut self, func: &Function) -> Result<(), RuntimeError> {
        let import = match &func.import {
            Some(import) => import,
            None => return Err(RuntimeError::Unimplemented("host call on local function")),
        };
        let mut args = Vec::with_capacity(func.ty.params.len());
        for &param in func.ty.params.iter().rev() {
            args.push(self.pop_value(param.kind())?);
        }
        args.reverse();
        let Runtime { hosts, memory, .. } = self;
        let host =
            hosts
                .get_mut(&import.module, &import.name)
                .ok_or_else(|| RuntimeError::UnresolvedImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                })?;
        let result = host(memory, &args)?;
        match (func.ty.result, result) {
            (Some(ty), Some(value)) => {
                check_value_type(&value, ty)?;
                self.push_value(value)
            }
            (None, None) => Ok(()),
            (Some(_), None) => Err(RuntimeError::TypeMismatch {
                expected: "value",
                actual: "void",
            }),
            (None, Some(_)) => Err(RuntimeError::TypeMismatch {
                expected: "void",
                actual: "value",
            }),
        }
    }

    fn push_value(&mut self, value: Value) -> Result<(), RuntimeError> {
        match value {
            Value::I32(v) => self.stack.push_i32(v),
            Value::I64(v) => self.stack.push_i64(v),
            Value::F32(v) => self.stack.push_f32(v),
            Value::F64(v) => self.stack.push_f64(v),
            Value::FuncRef(v) | Value::ExternRef(v) => {
                self.stack.push_ref(v);
                Ok(())
            }
        }
    }

    fn pop_value(&mut self, kind: ValueKind) -> Result<Value, RuntimeError> {
        Ok(match kind {
            ValueKind::I32 => Value::I32(self.stack.pop_i32()?),
            ValueKind::I64 => Value::I64(self.stack.pop_i64()?),
            ValueKind::F32 => Value::F32(self.stack.pop_f32()?),
            ValueKind::F64 => Value::F64(self.stack.pop_f64()?),
            ValueKind::FuncRef => Value::FuncRef(self.stack.pop_ref()?),
            ValueKind::AnyRef => Value::ExternRef(self.stack.pop_ref()?),
            ValueKind::Void | ValueKind::V128 => {
                return Err(RuntimeError::Unimplemented("unrepresentable value kind"))
            }
        })
    }

    /// The dispatch loop for one frame.
    fn execute(&mut self, code: &CompiledCode, base: usize) -> Result<(), RuntimeError> {
        let refs_base = self.stack.ref_count();
        let mut pc = 0usize;
        loop {
            if self.fuel == 0 {
                return Err(RuntimeError::InstructionBudgetExhausted);
            }
            self.fuel -= 1;

            let word = *code
                .words
                .get(pc)
                .ok_or(RuntimeError::InvalidJumpTarget(pc))?;
            pc += 1;
            let class = OpClass::from_bits(word.class_bits())
                .ok_or(RuntimeError::Unimplemented("invalid instruction word"))?;
            let kind = ValueKind::from_bits(word.kind_bits())
                .ok_or(RuntimeError::Unimplemented("invalid instruction word"))?;

            match class {
                OpClass::Nop => {}
                OpClass::Unreachable => return Err(RuntimeError::Unreachable),
                OpClass::Drop => match kind {
                    ValueKind::I32 | ValueKind::F32 => {
                        self.stack.pop_i32()?;
                    }
                    ValueKind::I64 | ValueKind::F64 => {
                        self.stack.pop_i64()?;
                    }
                    ValueKind::FuncRef | ValueKind::AnyRef => {
                        self.stack.pop_ref()?;
                    }
                    _ => return Err(RuntimeError::Unimplemented("drop")),
                },
                OpClass::Select => {
                    let cond = self.stack.pop_i32()?;
                    match kind {
                        ValueKind::I32 | ValueKind::F32 => {
                            let b = self.stack.pop_i32()?;
                            let a = self.stack.pop_i32()?;
                            self.stack.push_i32(if cond != 0 { a } else { b })?;
                        }
                        ValueKind::I64 | ValueKind::F64 => {
                            let b = self.stack.pop_i64()?;
                            let a = self.stack.pop_i64()?;
                            self.stack.push_i64(if cond != 0 { a } else { b })?;
                        }
                        ValueKind::FuncRef | ValueKind::AnyRef => {
                            let b = self.stack.pop_ref()?;
                            let a = self.stack.pop_ref()?;
                            self.stack.push_ref(if cond != 0 { a } else { b });
                        }
                        _ => return Err(RuntimeError::Unimplemented("select")),
                    }
                }
                OpClass::LocalGet => {
                    let at = base + word.imm() as usize;
                    match kind {
                        ValueKind::I32 | ValueKind::F32 => {
                            let v = self.stack.get_i32(at)?;
                            self.stack.push_i32(v)?;
                        }
                        ValueKind::I64 | ValueKind::F64 => {
                            let v = self.stack.get_i64(at)?;
                            self.stack.push_i64(v)?;
                        }
                        _ => return Err(RuntimeError::Unimplemented("local.get")),
                    }
                }
                OpClass::LocalSet => {
                    let at = base + word.imm() as usize;
                    match kind {
                        ValueKind::I32 | ValueKind::F32 => {
                            let v = self.stack.pop_i32()?;
                            self.stack.set_i32(at, v)?;
                        }
                        ValueKind::I64 | ValueKind::F64 => {
                            let v = self.stack.pop_i64()?;
                            self.stack.set_i64(at, v)?;
                        }
                        _ => return Err(RuntimeError::Unimplemented("local.set")),
                    }
                }
                OpClass::LocalTee => {
                    let at = base + word.imm() as usize;
                    match kind {
                        ValueKind::I32 | ValueKind::F32 => {
                            let v = self.stack.pop_i32()?;
                            self.stack.push_i32(v)?;
                            self.stack.set_i32(at, v)?;
                        }
                        ValueKind::I64 | ValueKind::F64 => {
                            let v = self.stack.pop_i64()?;
                            self.stack.push_i64(v)?;
                            self.stack.set_i64(at, v)?;
                        }
                        _ => return Err(RuntimeError::Unimplemented("local.tee")),
                    }
                }
                OpClass::GlobalGet => {
                    let idx = word.imm() as u32;
                    let value = self
                        .globals
                        .get(idx as usize)
                        .ok_or(RuntimeError::GlobalIndexOutOfBounds(idx))?
                        .value;
                    self.push_value(value)?;
                }
                OpClass::GlobalSet => {
                    let idx = word.imm() as u32;
                    let value = self.pop_value(kind)?;
                    let slot = self
                        .globals
                        .get_mut(idx as usize)
                        .ok_or(RuntimeError::GlobalIndexOutOfBounds(idx))?;
                    if !slot.mutable {
                        return Err(RuntimeError::ImmutableGlobal(idx));
                    }
                    slot.value = value;
                }
                OpClass::Load => self.exec_load(word, kind)?,
                OpClass::Store => self.exec_store(word, kind)?,
                OpClass::MemorySize => {
                    self.stack.push_i32(self.memory.size() as i32)?;
                }
                OpClass::MemoryGrow => {
                    let delta = self.stack.pop_i32()?;
                    let previous = self.memory.grow(delta as u32);
                    self.stack.push_i32(previous)?;
                }
                OpClass::Const => {
                    let idx = word.imm() as usize;
                    match kind {
                        ValueKind::I32 => {
                            let v = *pool(&code.pool_i32, idx)?;
                            self.stack.push_i32(v)?;
                        }
                        ValueKind::I64 => {
                            let v = *pool(&code.pool_i64, idx)?;
                            self.stack.push_i64(v)?;
                        }
                        ValueKind::F32 => {
                            let v = *pool(&code.pool_f32, idx)?;
                            self.stack.push_f32(v)?;
                        }
                        ValueKind::F64 => {
                            let v = *pool(&code.pool_f64, idx)?;
                            self.stack.push_f64(v)?;
                        }
                        _ => return Err(RuntimeError::Unimplemented("const")),
                    }
                }
                OpClass::ShortConst => match kind {
                    ValueKind::I32 => self.stack.push_i32(word.imm())?,
                    ValueKind::I64 => self.stack.push_i64(word.imm() as i64)?,
                    _ => return Err(RuntimeError::Unimplemented("short const")),
                },
                OpClass::Binop => self.exec_binop(word, kind)?,
                OpClass::BinBit => self.exec_binbit(word, kind)?,
                OpClass::Unop => self.exec_unop(word, kind)?,
                OpClass::CmpEq => self.exec_cmp_eq(word, kind)?,
                OpClass::CmpOrd => self.exec_cmp_ord(word, kind)?,
                OpClass::Trunc => self.exec_trunc(word, kind, false)?,
                OpClass::TruncSat => self.exec_trunc(word, kind, true)?,
                OpClass::Convert => self.exec_convert(word, kind)?,
                OpClass::Recast => self.exec_recast(word, kind)?,
                OpClass::Goto => {
                    pc = jump_target(word, code)?;
                }
                OpClass::GotoIf => {
                    let cond = self.stack.pop_i32()?;
                    if cond != 0 {
                        pc = jump_target(word, code)?;
                    }
                }
                OpClass::GotoIfNot => {
                    let cond = self.stack.pop_i32()?;
                    if cond == 0 {
                        pc = jump_target(word, code)?;
                    }
                }
                OpClass::GotoTable => {
                    let index = self.stack.pop_i32()?;
                    let table_base = word.imm() as usize;
                    let count = *pool(&code.pool_i32, table_base)?;
                    let slot = if index >= 0 && index < count {
                        table_base + 2 + index as usize
                    } else {
                        table_base + 1
                    };
                    let target = *pool(&code.pool_i32, slot)?;
                    if target < 0 || target as usize >= code.words.len() {
                        return Err(RuntimeError::InvalidJumpTarget(target as usize));
                    }
                    pc = target as usize;
                }
                OpClass::Call => {
                    self.call_func(word.imm() as usize)?;
                }
                OpClass::CallIndirect => {
                    self.exec_call_indirect(word)?;
                }
                OpClass::Return => {
                    if kind == ValueKind::Void {
                        self.stack.truncate(base, refs_base);
                    } else if kind.is_ref() {
                        let value = self.stack.pop_ref()?;
                        self.stack.truncate(base, refs_base);
                        self.stack.push_ref(value);
                    } else {
                        let value = self.pop_value(kind)?;
                        self.stack.truncate(base, refs_base);
                        self.push_value(value)?;
                    }
                    return Ok(());
                }
                OpClass::RefNull => {
                    self.stack.push_ref(None);
                }
                OpClass::RefIsNull => {
                    let value = self.stack.pop_ref()?;
                    self.stack.push_i32(value.is_none() as i32)?;
                }
                OpClass::RefFunc => {
                    self.stack.push_ref(Some(word.imm() as u32));
                }
            }
        }
    }

    fn exec_call_indirect(&mut self, word: Word) -> Result<(), RuntimeError> {
        let module = Rc::clone(&self.module);
        let type_idx = word.imm() as usize;
        let expected = module
            .types
            .get(type_idx)
            .ok_or(RuntimeError::IndirectCallTypeMismatch)?;
        let element = self.stack.pop_i32()? as u32;
        let table = self
            .tables
            .get(word.extra() as usize)
            .ok_or(RuntimeError::TableIndexOutOfBounds(word.extra() as u32))?;
        let func_index = table
            .get(element)?
            .ok_or(RuntimeError::UndefinedElement(element))?;
        let callee = module
            .functions
            .get(func_index as usize)
            .ok_or(RuntimeError::FunctionIndexOutOfBounds(func_index as usize))?;
        if callee.ty != *expected {
            return Err(RuntimeError::IndirectCallTypeMismatch);
        }
        self.call_func(func_index as usize)
    }

    fn exec_load(&mut self, word: Word, kind: ValueKind) -> Result<(), RuntimeError> {
        let addr = self.stack.pop_i32()? as u32 as u64 + word.imm() as u64;
        let width = LoadWidth::from_bits(word.extra())
            .ok_or(RuntimeError::Unimplemented("load width"))?;
        match kind {
            ValueKind::I32 => {
                let v = match width {
                    LoadWidth::Whole => self.memory.read_i32(addr)?,
                    LoadWidth::B8S => self.memory.read_i8(addr)? as i32,
                    LoadWidth::B8U => self.memory.read_u8(addr)? as i32,
                    LoadWidth::B16S => self.memory.read_i16(addr)? as i32,
                    LoadWidth::B16U => self.memory.read_u16(addr)? as i32,
                    _ => return Err(RuntimeError::Unimplemented("i32 load width")),
                };
                self.stack.push_i32(v)
            }
            ValueKind::I64 => {
                let v = match width {
                    LoadWidth::Whole => self.memory.read_i64(addr)?,
                    LoadWidth::B8S => self.memory.read_i8(addr)? as i64,
                    LoadWidth::B8U => self.memory.read_u8(addr)? as i64,
                    LoadWidth::B16S => self.memory.read_i16(addr)? as i64,
                    LoadWidth::B16U => self.memory.read_u16(addr)? as i64,
                    LoadWidth::B32S => self.memory.read_i32(addr)? as i64,
                    LoadWidth::B32U => self.memory.read_u32(addr)? as i64,
                };
                self.stack.push_i64(v)
            }
            ValueKind::F32 => {
                let v = self.memory.read_f32(addr)?;
                self.stack.push_f32(v)
            }
            ValueKind::F64 => {
                let v = self.memory.read_f64(addr)?;
                self.stack.push_f64(v)
            }
            _ => Err(RuntimeError::Unimplemented("load")),
        }
    }

    fn exec_store(&mut self, word: Word, kind: ValueKind) -> Result<(), RuntimeError> {
        let width = StoreWidth::from_bits(word.extra())
            .ok_or(RuntimeError::Unimplemented("store width"))?;
        match kind {
            ValueKind::I32 => {
                let v = self.stack.pop_i32()?;
                let addr = self.stack.pop_i32()? as u32 as u64 + word.imm() as u64;
                match width {
                    StoreWidth::Whole => self.memory.write_i32(addr, v),
                    StoreWidth::B8 => self.memory.write_u8(addr, v as u8),
                    StoreWidth::B16 => self.memory.write_u16(addr, v as u16),
                    StoreWidth::B32 => self.memory.write_i32(addr, v),
                }
            }
            ValueKind::I64 => {
                let v = self.stack.pop_i64()?;
                let addr = self.stack.pop_i32()? as u32 as u64 + word.imm() as u64;
                match width {
                    StoreWidth::Whole => self.memory.write_i64(addr, v),
                    StoreWidth::B8 => self.memory.write_u8(addr, v as u8),
                    StoreWidth::B16 => self.memory.write_u16(addr, v as u16),
                    StoreWidth::B32 => self.memory.write_u32(addr, v as u32),
                }
            }
            ValueKind::F32 => {
                let v = self.stack.pop_f32()?;
                let addr = self.stack.pop_i32()? as u32 as u64 + word.imm() as u64;
                self.memory.write_f32(addr, v)
            }
            ValueKind::F64 => {
                let v = self.stack.pop_f64()?;
                let addr = self.stack.pop_i32()? as u32 as u64 + word.imm() as u64;
                self.memory.write_f64(addr, v)
            }
            _ => Err(RuntimeError::Unimplemented("store")),
        }
    }

    fn exec_binop(&mut self, word: Word, kind: ValueKind) -> Result<(), RuntimeError> {
        match kind {
            ValueKind::I32 => {
                let op = IntArith::from_bits(word.extra())
                    .ok_or(RuntimeError::Unimplemented("i32 binop"))?;
                let b = self.stack.pop_i32()?;
                let a = self.stack.pop_i32()?;
                let v = match op {
                    IntArith::Add => a.wrapping_add(b),
                    IntArith::Sub => a.wrapping_sub(b),
                    IntArith::Mul => a.wrapping_mul(b),
                    IntArith::DivS => numeric::i32_div_s(a, b)?,
                    IntArith::DivU => numeric::i32_div_u(a, b)?,
                    IntArith::RemS => numeric::i32_rem_s(a, b)?,
                    IntArith::RemU => numeric::i32_rem_u(a, b)?,
                };
                self.stack.push_i32(v)
            }
            ValueKind::I64 => {
                let op = IntArith::from_bits(word.extra())
                    .ok_or(RuntimeError::Unimplemented("i64 binop"))?;
                let b = self.stack.pop_i64()?;
                let a = self.stack.pop_i64()?;
                let v = match op {
                    IntArith::Add => a.wrapping_add(b),
                    IntArith::Sub => a.wrapping_sub(b),
                    IntArith::Mul => a.wrapping_mul(b),
                    IntArith::DivS => numeric::i64_div_s(a, b)?,
                    IntArith::DivU => numeric::i64_div_u(a, b)?,
                    IntArith::RemS => numeric::i64_rem_s(a, b)?,
                    IntArith::RemU => numeric::i64_rem_u(a, b)?,
                };
                self.stack.push_i64(v)
            }
            ValueKind::F32 => {
                let op = FloatArith::from_bits(word.extra())
                    .ok_or(RuntimeError::Unimplemented("f32 binop"))?;
                let b = self.stack.pop_f32()?;
                let a = self.stack.pop_f32()?;
                let v = match op {
                    FloatArith::Add => a + b,
                    FloatArith::Sub => a - b,
                    FloatArith::Mul => a * b,
                    FloatArith::Div => a / b,
                    FloatArith::Min => numeric::f32_min(a, b),
                    FloatArith::Max => numeric::f32_max(a, b),
                    FloatArith::CopySign => a.copysign(b),
                };
                self.stack.push_f32(v)
            }
            ValueKind::F64 => {
                let op = FloatArith::from_bits(word.extra())
                    .ok_or(RuntimeError::Unimplemented("f64 binop"))?;
                let b = self.stack.pop_f64()?;
                let a = self.stack.pop_f64()?;
                let v = match op {
                    FloatArith::Add => a + b,
                    FloatArith::Sub => a - b,
                    FloatArith::Mul => a * b,
                    FloatArith::Div => a / b,
                    FloatArith::Min => numeric::f64_min(a, b),
                    FloatArith::Max => numeric::f64_max(a, b),
                    FloatArith::CopySign => a.copysign(b),
                };
                self.stack.push_f64(v)
            }
            _ => Err(RuntimeError::Unimplemented("binop")),
        }
    }

    fn exec_binbit(&mut self, word: Word, kind: ValueKind) -> Result<(), RuntimeError> {
        let op =
            BitOp::from_bits(word.extra()).ok_or(RuntimeError::Unimplemented("bit binop"))?;
        match kind {
            ValueKind::I32 => {
                let b = self.stack.pop_i32()?;
                let a = self.stack.pop_i32()?;
                let v = match op {
                    BitOp::And => a & b,
                    BitOp::Or => a | b,
                    BitOp::Xor => a ^ b,
                    BitOp::Shl => a.wrapping_shl(b as u32),
                    BitOp::ShrS => a.wrapping_shr(b as u32),
                    BitOp::ShrU => ((a as u32).wrapping_shr(b as u32)) as i32,
                    BitOp::Rotl => a.rotate_left(b as u32 & 31),
                    BitOp::Rotr => a.rotate_right(b as u32 & 31),
                };
                self.stack.push_i32(v)
            }
            ValueKind::I64 => {
                let b = self.stack.pop_i64()?;
                let a = self.stack.pop_i64()?;
                let v = match op {
                    BitOp::And => a & b,
                    BitOp::Or => a | b,
                    BitOp::Xor => a ^ b,
                    BitOp::Shl => a.wrapping_shl(b as u32),
                    BitOp::ShrS => a.wrapping_shr(b as u32),
                    BitOp::ShrU => ((a as u64).wrapping_shr(b as u32)) as i64,
                    BitOp::Rotl => a.rotate_left(b as u32 & 63),
                    BitOp::Rotr => a.rotate_right(b as u32 & 63),
                };
                self.stack.push_i64(v)
            }
            _ => Err(RuntimeError::Unimplemented("bit binop")),
        }
    }

    fn exec_unop(&mut self, word: Word, kind: ValueKind) -> Result<(), RuntimeError> {
        match kind {
            ValueKind::I32 => {
                let op = IntUnop::from_bits(word.extra())
                    .ok_or(RuntimeError::Unimplemented("i32 unop"))?;
                let v = self.stack.pop_i32()?;
                let v = match op {
                    IntUnop::Clz => v.leading_zeros() as i32,
                    IntUnop::Ctz => v.trailing_zeros() as i32,
                    IntUnop::Popcnt => v.count_ones() as i32,
                    IntUnop::Extend8S => v as i8 as i32,
                    IntUnop::Extend16S => v as i16 as i32,
                    IntUnop::Extend32S => v,
                };
                self.stack.push_i32(v)
            }
            ValueKind::I64 => {
                let op = IntUnop::from_bits(word.extra())
                    .ok_or(RuntimeError::Unimplemented("i64 unop"))?;
                let v = self.stack.pop_i64()?;
                let v = match op {
                    IntUnop::Clz => v.leading_zeros() as i64,
                    IntUnop::Ctz => v.trailing_zeros() as i64,
                    IntUnop::Popcnt => v.count_ones() as i64,
                    IntUnop::Extend8S => v as i8 as i64,
                    IntUnop::Extend16S => v as i16 as i64,
                    IntUnop::Extend32S => v as i32 as i64,
                };
                self.stack.push_i64(v)
            }
            ValueKind::F32 => {
                let op = FloatUnop::from_bits(word.extra())
                    .ok_or(RuntimeError::Unimplemented("f32 unop"))?;
                let v = self.stack.pop_f32()?;
                let v = match op {
                    FloatUnop::Abs => v.abs(),
                    FloatUnop::Neg => -v,
                    FloatUnop::Ceil => v.ceil(),
                    FloatUnop::Floor => v.floor(),
                    FloatUnop::Trunc => v.trunc(),
                    FloatUnop::Nearest => v.round_ties_even(),
                    FloatUnop::Sqrt => v.sqrt(),
                };
                self.stack.push_f32(v)
            }
            ValueKind::F64 => {
                let op = FloatUnop::from_bits(word.extra())
                    .ok_or(RuntimeError::Unimplemented("f64 unop"))?;
                let v = self.stack.pop_f64()?;
                let v = match op {
                    FloatUnop::Abs => v.abs(),
                    FloatUnop::Neg => -v,
                    FloatUnop::Ceil => v.ceil(),
                    FloatUnop::Floor => v.floor(),
                    FloatUnop::Trunc => v.trunc(),
                    FloatUnop::Nearest => v.round_ties_even(),
                    FloatUnop::Sqrt => v.sqrt(),
                };
                self.stack.push_f64(v)
            }
            _ => Err(RuntimeError::Unimplemented("unop")),
        }
    }

    fn exec_cmp_eq(&mut self, word: Word, kind: ValueKind) -> Result<(), RuntimeError> {
        let op = EqOp::from_bits(word.extra()).ok_or(RuntimeError::Unimplemented("cmp"))?;
        let v = match (kind, op) {
            (ValueKind::I32, EqOp::Eqz) => (self.stack.pop_i32()? == 0) as i32,
            (ValueKind::I32, EqOp::Eq) => {
                let b = self.stack.pop_i32()?;
                (self.stack.pop_i32()? == b) as i32
            }
            (ValueKind::I32, EqOp::Ne) => {
                let b = self.stack.pop_i32()?;
                (self.stack.pop_i32()? != b) as i32
            }
            (ValueKind::I64, EqOp::Eqz) => (self.stack.pop_i64()? == 0) as i32,
            (ValueKind::I64, EqOp::Eq) => {
                let b = self.stack.pop_i64()?;
                (self.stack.pop_i64()? == b) as i32
            }
            (ValueKind::I64, EqOp::Ne) => {
                let b = self.stack.pop_i64()?;
                (self.stack.pop_i64()? != b) as i32
            }
            (ValueKind::F32, EqOp::Eq) => {
                let b = self.stack.pop_f32()?;
                (self.stack.pop_f32()? == b) as i32
            }
            (ValueKind::F32, EqOp::Ne) => {
                let b = self.stack.pop_f32()?;
                (self.stack.pop_f32()? != b) as i32
            }
            (ValueKind::F64, EqOp::Eq) => {
                let b = self.stack.pop_f64()?;
                (self.stack.pop_f64()? == b) as i32
            }
            (ValueKind::F64, EqOp::Ne) => {
                let b = self.stack.pop_f64()?;
                (self.stack.pop_f64()? != b) as i32
            }
            _ => return Err(RuntimeError::Unimplemented("cmp")),
        };
        self.stack.push_i32(v)
    }

    fn exec_cmp_ord(&mut self, word: Word, kind: ValueKind) -> Result<(), RuntimeError> {
        let op = OrdOp::from_bits(word.extra()).ok_or(RuntimeError::Unimplemented("cmp"))?;
        let v = match kind {
            ValueKind::I32 => {
                let b = self.stack.pop_i32()?;
                let a = self.stack.pop_i32()?;
                let (ua, ub) = (a as u32, b as u32);
                match op {
                    OrdOp::LtS => a < b,
                    OrdOp::LtU => ua < ub,
                    OrdOp::GtS => a > b,
                    OrdOp::GtU => ua > ub,
                    OrdOp::LeS => a <= b,
                    OrdOp::LeU => ua <= ub,
                    OrdOp::GeS => a >= b,
                    OrdOp::GeU => ua >= ub,
                }
            }
            ValueKind::I64 => {
                let b = self.stack.pop_i64()?;
                let a = self.stack.pop_i64()?;
                let (ua, ub) = (a as u64, b as u64);
                match op {
                    OrdOp::LtS => a < b,
                    OrdOp::LtU => ua < ub,
                    OrdOp::GtS => a > b,
                    OrdOp::GtU => ua > ub,
                    OrdOp::LeS => a <= b,
                    OrdOp::LeU => ua <= ub,
                    OrdOp::GeS => a >= b,
                    OrdOp::GeU => ua >= ub,
                }
            }
            // float comparisons are all false on NaN, which IEEE operators
            // already give us
            ValueKind::F32 => {
                let b = self.stack.pop_f32()?;
                let a = self.stack.pop_f32()?;
                match op {
                    OrdOp::LtS | OrdOp::LtU => a < b,
                    OrdOp::GtS | OrdOp::GtU => a > b,
                    OrdOp::LeS | OrdOp::LeU => a <= b,
                    OrdOp::GeS | OrdOp::GeU => a >= b,
                }
            }
            ValueKind::F64 => {
                let b = self.stack.pop_f64()?;
                let a = self.stack.pop_f64()?;
                match op {
                    OrdOp::LtS | OrdOp::LtU => a < b,
                    OrdOp::GtS | OrdOp::GtU => a > b,
                    OrdOp::LeS | OrdOp::LeU => a <= b,
                    OrdOp::GeS | OrdOp::GeU => a >= b,
                }
            }
            _ => return Err(RuntimeError::Unimplemented("cmp")),
        };
        self.stack.push_i32(v as i32)
    }

    fn exec_trunc(&mut self, word: Word, kind: ValueKind, sat: bool) -> Result<(), RuntimeError> {
        let src =
            TruncSrc::from_bits(word.extra()).ok_or(RuntimeError::Unimplemented("trunc"))?;
        // widen f32 sources to f64; the conversion is exact
        let (v, unsigned) = match src {
            TruncSrc::F32S => (self.stack.pop_f32()? as f64, false),
            TruncSrc::F32U => (self.stack.pop_f32()? as f64, true),
            TruncSrc::F64S => (self.stack.pop_f64()?, false),
            TruncSrc::F64U => (self.stack.pop_f64()?, true),
        };
        match (kind, unsigned) {
            (ValueKind::I32, false) => {
                let v = if sat {
                    numeric::trunc_sat_i32_s(v)
                } else {
                    numeric::trunc_i32_s(v)?
                };
                self.stack.push_i32(v)
            }
            (ValueKind::I32, true) => {
                let v = if sat {
                    numeric::trunc_sat_i32_u(v)
                } else {
                    numeric::trunc_i32_u(v)?
                };
                self.stack.push_i32(v as i32)
            }
            (ValueKind::I64, false) => {
                let v = if sat {
                    numeric::trunc_sat_i64_s(v)
                } else {
                    numeric::trunc_i64_s(v)?
                };
                self.stack.push_i64(v)
            }
            (ValueKind::I64, true) => {
                let v = if sat {
                    numeric::trunc_sat_i64_u(v)
                } else {
                    numeric::trunc_i64_u(v)?
                };
                self.stack.push_i64(v as i64)
            }
            _ => Err(RuntimeError::Unimplemented("trunc")),
        }
    }

    fn exec_convert(&mut self, word: Word, kind: ValueKind) -> Result<(), RuntimeError> {
        let src =
            ConvertSrc::from_bits(word.extra()).ok_or(RuntimeError::Unimplemented("convert"))?;
        // convert straight from the source integer; going through f64 on
        // the way to f32 would round twice for wide i64 values
        match kind {
            ValueKind::F32 => {
                let v = match src {
                    ConvertSrc::I32S => self.stack.pop_i32()? as f32,
                    ConvertSrc::I32U => self.stack.pop_i32()? as u32 as f32,
                    ConvertSrc::I64S => self.stack.pop_i64()? as f32,
                    ConvertSrc::I64U => self.stack.pop_i64()? as u64 as f32,
                };
                self.stack.push_f32(v)
            }
            ValueKind::F64 => {
                let v = match src {
                    ConvertSrc::I32S => self.stack.pop_i32()? as f64,
                    ConvertSrc::I32U => self.stack.pop_i32()? as u32 as f64,
                    ConvertSrc::I64S => self.stack.pop_i64()? as f64,
                    ConvertSrc::I64U => self.stack.pop_i64()? as u64 as f64,
                };
                self.stack.push_f64(v)
            }
            _ => Err(RuntimeError::Unimplemented("convert")),
        }
    }

    fn exec_recast(&mut self, word: Word, kind: ValueKind) -> Result<(), RuntimeError> {
        let op =
            RecastOp::from_bits(word.extra()).ok_or(RuntimeError::Unimplemented("recast"))?;
        match op {
            RecastOp::Wrap => {
                let v = self.stack.pop_i64()?;
                self.stack.push_i32(v as i32)
            }
            RecastOp::ExtendS => {
                let v = self.stack.pop_i32()?;
                self.stack.push_i64(v as i64)
            }
            RecastOp::ExtendU => {
                let v = self.stack.pop_i32()?;
                self.stack.push_i64(v as u32 as i64)
            }
            RecastOp::Demote => {
                let v = self.stack.pop_f64()?;
                self.stack.push_f32(v as f32)
            }
            RecastOp::Promote => {
                let v = self.stack.pop_f32()?;
                self.stack.push_f64(v as f64)
            }
            RecastOp::Reinterpret => match kind {
                ValueKind::I32 => {
                    let v = self.stack.pop_f32()?;
                    self.stack.push_i32(v.to_bits() as i32)
                }
                ValueKind::I64 => {
                    let v = self.stack.pop_f64()?;
                    self.stack.push_i64(v.to_bits() as i64)
                }
                ValueKind::F32 => {
                    let v = self.stack.pop_i32()?;
                    self.stack.push_f32(f32::from_bits(v as u32))
                }
                ValueKind::F64 => {
                    let v = self.stack.pop_i64()?;
                    self.stack.push_f64(f64::from_bits(v as u64))
                }
                _ => Err(RuntimeError::Unimplemented("reinterpret")),
            },
        }
    }

    pub(super) fn module(&self) -> Rc<Module> {
        Rc::clone(&self.module)
    }

    #[cfg(test)]
    pub(super) fn stack_size(&self) -> usize {
        self.stack.size()
    }
}

fn jump_target(word: Word, code: &CompiledCode) -> Result<usize, RuntimeError> {
    let target = word.imm();
    if target < 0 || target as usize >= code.words.len() {
        return Err(RuntimeError::InvalidJumpTarget(target as usize));
    }
    Ok(target as usize)
}

fn pool<T>(pool: &[T], index: usize) -> Result<&T, RuntimeError> {
    pool.get(index)
        .ok_or(RuntimeError::PoolIndexOutOfRange(index))
}

fn zero_value(ty: ValueType) -> Value {
    match ty {
        ValueType::I32 => Value::I32(0),
        ValueType::I64 => Value::I64(0),
        ValueType::F32 => Value::F32(0.0),
        ValueType::F64 => Value::F64(0.0),
        ValueType::FuncRef => Value::FuncRef(None),
        ValueType::ExternRef | ValueType::V128 => Value::ExternRef(None),
    }
}

fn check_value_type(value: &Value, ty: ValueType) -> Result<(), RuntimeError> {
    let expected = match ty {
        ValueType::I32 => "i32",
        ValueType::I64 => "i64",
        ValueType::F32 => "f32",
        ValueType::F64 => "f64",
        ValueType::FuncRef => "funcref",
        ValueType::ExternRef => "externref",
        ValueType::V128 => "v128",
    };
    if value.type_name() != expected {
        return Err(RuntimeError::TypeMismatch {
            expected,
            actual: value.type_name(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Opcode;
    use crate::module::{BlockType, Function, FunctionType, Limits};

    fn add_module() -> Module {
        let mut module = Module::default();
        let ty = FunctionType::new(vec![ValueType::I32, ValueType::I32], Some(ValueType::I32));
        module.functions.push(Function::local(
            Some("add".to_string()),
            ty,
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Local { op: Opcode::LocalGet, index: 1 },
                Instr::Op(Opcode::I32Add),
            ],
        ));
        module
    }

    #[test]
    fn test_invoke_add() {
        let mut runtime = Runtime::new(add_module()).unwrap();
        let result = runtime
            .invoke("add", &[Value::I32(2), Value::I32(3)])
            .unwrap();
        assert_eq!(result, Some(Value::I32(5)));
    }

    #[test]
    fn test_add_wraps() {
        let mut runtime = Runtime::new(add_module()).unwrap();
        let result = runtime
            .invoke("add", &[Value::I32(i32::MAX), Value::I32(1)])
            .unwrap();
        assert_eq!(result, Some(Value::I32(i32::MIN)));
    }

    #[test]
    fn test_stack_balanced_after_calls() {
        let mut runtime = Runtime::new(add_module()).unwrap();
        for _ in 0..10 {
            runtime
                .invoke("add", &[Value::I32(1), Value::I32(2)])
                .unwrap();
        }
        assert_eq!(runtime.stack_size(), 0);
    }

    #[test]
    fn test_unknown_function() {
        let mut runtime = Runtime::new(add_module()).unwrap();
        assert_eq!(
            runtime.invoke("nope", &[]),
            Err(RuntimeError::UnknownFunction("nope".to_string()))
        );
    }

    #[test]
    fn test_argument_checks() {
        let mut runtime = Runtime::new(add_module()).unwrap();
        assert_eq!(
            runtime.invoke("add", &[Value::I32(1)]),
            Err(RuntimeError::ArgumentCountMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert!(matches!(
            runtime.invoke("add", &[Value::I32(1), Value::F32(2.0)]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_br_if_loop_counts_to_ten() {
        // local = 0; loop { local += 1; br_if (local != 10) }; return local
        let mut module = Module::default();
        module.functions.push(Function::local(
            Some("count".to_string()),
            FunctionType::new(vec![], Some(ValueType::I32)),
            vec![ValueType::I32],
            vec![
                Instr::Loop {
                    block_type: BlockType::Empty,
                    body: vec![
                        Instr::Local { op: Opcode::LocalGet, index: 0 },
                        Instr::I32Const(1),
                        Instr::Op(Opcode::I32Add),
                        Instr::Local { op: Opcode::LocalTee, index: 0 },
                        Instr::I32Const(10),
                        Instr::Op(Opcode::I32Ne),
                        Instr::BrIf { depth: 0 },
                    ],
                },
                Instr::Local { op: Opcode::LocalGet, index: 0 },
            ],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(runtime.invoke("count", &[]).unwrap(), Some(Value::I32(10)));
    }

    #[test]
    fn test_division_traps() {
        let mut module = Module::default();
        module.functions.push(Function::local(
            Some("div".to_string()),
            FunctionType::new(vec![ValueType::I32, ValueType::I32], Some(ValueType::I32)),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Local { op: Opcode::LocalGet, index: 1 },
                Instr::Op(Opcode::I32DivS),
            ],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(
            runtime.invoke("div", &[Value::I32(7), Value::I32(2)]).unwrap(),
            Some(Value::I32(3))
        );
        assert_eq!(
            runtime.invoke("div", &[Value::I32(1), Value::I32(0)]),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            runtime.invoke("div", &[Value::I32(i32::MIN), Value::I32(-1)]),
            Err(RuntimeError::IntegerOverflow)
        );
    }

    #[test]
    fn test_trap_unwinds_operand_stack() {
        let mut module = Module::default();
        module.functions.push(Function::local(
            Some("div".to_string()),
            FunctionType::new(vec![ValueType::I32, ValueType::I32], Some(ValueType::I32)),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Local { op: Opcode::LocalGet, index: 1 },
                Instr::Op(Opcode::I32DivS),
            ],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        // more trapped calls than the stack byte limit could absorb if
        // each one leaked its frame
        for _ in 0..100_000 {
            assert_eq!(
                runtime.invoke("div", &[Value::I32(1), Value::I32(0)]),
                Err(RuntimeError::DivisionByZero)
            );
        }
        assert_eq!(runtime.stack_size(), 0);
        assert_eq!(
            runtime.invoke("div", &[Value::I32(8), Value::I32(2)]).unwrap(),
            Some(Value::I32(4))
        );
    }

    #[test]
    fn test_element_segment_offset_out_of_range() {
        let mut module = Module::default();
        module.functions.push(Function::local(
            None,
            FunctionType::new(vec![], None),
            vec![],
            vec![],
        ));
        module.tables.push(crate::module::TableDef {
            limits: Limits::new(1, None),
        });
        module.elements.push(crate::module::ElementSegment {
            table: 0,
            offset: vec![Instr::I32Const(-1)],
            funcs: vec![0, 0],
        });
        assert!(matches!(
            Runtime::new(module),
            Err(RuntimeError::TableIndexOutOfBounds(_))
        ));
    }

    #[test]
    fn test_memory_load_store() {
        let mut module = Module::default();
        module.memory = Some(Limits::new(1, Some(2)));
        module.functions.push(Function::local(
            Some("store_load".to_string()),
            FunctionType::new(vec![ValueType::I32, ValueType::I32], Some(ValueType::I32)),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Local { op: Opcode::LocalGet, index: 1 },
                Instr::Memory { op: Opcode::I32Store, align: 2, offset: 0 },
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Memory { op: Opcode::I32Load, align: 2, offset: 0 },
            ],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(
            runtime
                .invoke("store_load", &[Value::I32(64), Value::I32(-5)])
                .unwrap(),
            Some(Value::I32(-5))
        );
        // out of bounds traps
        assert!(matches!(
            runtime.invoke("store_load", &[Value::I32(65536), Value::I32(1)]),
            Err(RuntimeError::MemoryOutOfBounds(_))
        ));
    }

    #[test]
    fn test_memory_grow_sentinel() {
        let mut module = Module::default();
        module.memory = Some(Limits::new(1, Some(2)));
        module.functions.push(Function::local(
            Some("grow".to_string()),
            FunctionType::new(vec![ValueType::I32], Some(ValueType::I32)),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Op(Opcode::MemoryGrow),
            ],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(runtime.invoke("grow", &[Value::I32(1)]).unwrap(), Some(Value::I32(1)));
        assert_eq!(runtime.invoke("grow", &[Value::I32(1)]).unwrap(), Some(Value::I32(-1)));
        assert_eq!(runtime.memory().size(), 2);
    }

    #[test]
    fn test_trunc_sat_negative_to_unsigned_is_zero() {
        let mut module = Module::default();
        module.functions.push(Function::local(
            Some("sat".to_string()),
            FunctionType::new(vec![ValueType::F64], Some(ValueType::I32)),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Op(Opcode::I32TruncSatF64U),
            ],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(
            runtime.invoke("sat", &[Value::F64(-1.0)]).unwrap(),
            Some(Value::I32(0))
        );
    }

    #[test]
    fn test_unreachable_traps() {
        let mut module = Module::default();
        module.functions.push(Function::local(
            Some("boom".to_string()),
            FunctionType::new(vec![], None),
            vec![],
            vec![Instr::Op(Opcode::Unreachable)],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(runtime.invoke("boom", &[]), Err(RuntimeError::Unreachable));
    }

    #[test]
    fn test_host_import_resolves_lazily() {
        let mut module = Module::default();
        module.functions.push(Function::imported(
            Some("mul2".to_string()),
            FunctionType::new(vec![ValueType::I32], Some(ValueType::I32)),
            crate::module::ImportRef {
                module: "env".to_string(),
                name: "mul2".to_string(),
            },
        ));
        let mut runtime = Runtime::new(module).unwrap();
        // not registered yet: fatal at call time
        assert!(matches!(
            runtime.invoke("mul2", &[Value::I32(4)]),
            Err(RuntimeError::UnresolvedImport { .. })
        ));
        runtime.register(
            "env",
            "mul2",
            Box::new(|_mem, args| Ok(Some(Value::I32(args[0].as_i32()? * 2)))),
        );
        assert_eq!(
            runtime.invoke("mul2", &[Value::I32(4)]).unwrap(),
            Some(Value::I32(8))
        );
    }

    #[test]
    fn test_call_indirect_through_table() {
        let mut module = Module::default();
        let ty = FunctionType::new(vec![ValueType::I32], Some(ValueType::I32));
        module.types.push(ty.clone());
        module.functions.push(Function::local(
            Some("inc".to_string()),
            ty.clone(),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::I32Const(1),
                Instr::Op(Opcode::I32Add),
            ],
        ));
        module.functions.push(Function::local(
            Some("dispatch".to_string()),
            FunctionType::new(vec![ValueType::I32, ValueType::I32], Some(ValueType::I32)),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::Local { op: Opcode::LocalGet, index: 1 },
                Instr::CallIndirect { type_idx: 0, table: 0 },
            ],
        ));
        module.tables.push(crate::module::TableDef {
            limits: Limits::new(2, None),
        });
        module.elements.push(crate::module::ElementSegment {
            table: 0,
            offset: vec![Instr::I32Const(0)],
            funcs: vec![0],
        });
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(
            runtime
                .invoke("dispatch", &[Value::I32(41), Value::I32(0)])
                .unwrap(),
            Some(Value::I32(42))
        );
        // slot 1 was never filled
        assert_eq!(
            runtime.invoke("dispatch", &[Value::I32(1), Value::I32(1)]),
            Err(RuntimeError::UndefinedElement(1))
        );
    }

    #[test]
    fn test_globals_and_data_segments() {
        let mut module = Module::default();
        module.memory = Some(Limits::new(1, None));
        module.globals.push(crate::module::Global {
            name: Some("counter".to_string()),
            ty: ValueType::I32,
            mutable: true,
            init: vec![Instr::I32Const(7)],
        });
        module.datas.push(crate::module::DataSegment {
            offset: vec![Instr::I32Const(16)],
            bytes: vec![0xAA, 0xBB],
        });
        module.functions.push(Function::local(
            Some("bump".to_string()),
            FunctionType::new(vec![], Some(ValueType::I32)),
            vec![],
            vec![
                Instr::Global { op: Opcode::GlobalGet, index: 0 },
                Instr::I32Const(1),
                Instr::Op(Opcode::I32Add),
                Instr::Global { op: Opcode::GlobalSet, index: 0 },
                Instr::Global { op: Opcode::GlobalGet, index: 0 },
            ],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(runtime.global("counter"), Some(Value::I32(7)));
        assert_eq!(runtime.invoke("bump", &[]).unwrap(), Some(Value::I32(8)));
        assert_eq!(runtime.memory().read_u8(16).unwrap(), 0xAA);
        assert_eq!(runtime.memory().read_u8(17).unwrap(), 0xBB);
    }

    #[test]
    fn test_immutable_global_set_traps() {
        let mut module = Module::default();
        module.globals.push(crate::module::Global {
            name: None,
            ty: ValueType::I32,
            mutable: false,
            init: vec![Instr::I32Const(1)],
        });
        module.functions.push(Function::local(
            Some("poke".to_string()),
            FunctionType::new(vec![], None),
            vec![],
            vec![
                Instr::I32Const(2),
                Instr::Global { op: Opcode::GlobalSet, index: 0 },
            ],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(
            runtime.invoke("poke", &[]),
            Err(RuntimeError::ImmutableGlobal(0))
        );
    }

    #[test]
    fn test_fuel_exhaustion() {
        let mut module = Module::default();
        module.functions.push(Function::local(
            Some("spin".to_string()),
            FunctionType::new(vec![], None),
            vec![],
            vec![Instr::Loop {
                block_type: BlockType::Empty,
                body: vec![Instr::I32Const(1), Instr::BrIf { depth: 0 }],
            }],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        runtime.set_fuel(1000);
        assert_eq!(
            runtime.invoke("spin", &[]),
            Err(RuntimeError::InstructionBudgetExhausted)
        );
    }

    #[test]
    fn test_deep_recursion_is_stack_error() {
        // f(n) = n == 0 ? 0 : f(n - 1), with no base case reachable
        let mut module = Module::default();
        module.functions.push(Function::local(
            Some("recurse".to_string()),
            FunctionType::new(vec![ValueType::I32], Some(ValueType::I32)),
            vec![],
            vec![
                Instr::Local { op: Opcode::LocalGet, index: 0 },
                Instr::I32Const(1),
                Instr::Op(Opcode::I32Add),
                Instr::Call { func: 0 },
            ],
        ));
        let mut runtime = Runtime::new(module).unwrap();
        assert_eq!(
            runtime.invoke("recurse", &[Value::I32(0)]),
            Err(RuntimeError::StackOverflow)
        );
    }

    #[test]
    fn test_start_function_runs_at_init() {
        let mut module = Module::default();
        module.globals.push(crate::module::Global {
            name: Some("flag".to_string()),
            ty: ValueType::I32,
            mutable: true,
            init: vec![Instr::I32Const(0)],
        });
        module.functions.push(Function::local(
            None,
            FunctionType::new(vec![], None),
            vec![],
            vec![
                Instr::I32Const(123),
                Instr::Global { op: Opcode::GlobalSet, index: 0 },
            ],
        ));
        module.start = Some(0);
        let runtime = Runtime::new(module).unwrap();
        assert_eq!(runtime.global("flag"), Some(Value::I32(123)));
    }
}
