//! Static instruction catalog
//!
//! One descriptor per opcode: numeric id, mnemonic, operand-stack arity,
//! operand/result kinds, and a coarse behavioural kind. The set is closed -
//! adding an opcode means adding an enum variant, and every `match` over
//! [`Opcode`] is checked exhaustively by the compiler.
//!
//! Ids follow the WebAssembly binary encoding, with the `0xFC`-prefixed
//! extended opcodes renumbered to `0x200 + lo` so that every id fits a flat
//! `u16` space.

use crate::code::ValueKind;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Coarse behavioural kind of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Structured control flow and branches.
    Flow,
    /// Direct and indirect calls.
    Call,
    /// Two-operand arithmetic/bitwise op.
    Binary,
    /// Comparison producing an i32 boolean.
    Compare,
    /// Memory load.
    Load,
    /// Memory store.
    Store,
    /// Constant literal.
    Literal,
    /// Local or global access.
    Variable,
    /// Everything else: unary ops, conversions, parametric ops, memory
    /// administration, references, bulk operations.
    Other,
}

/// Descriptor for one opcode. Pure data, read-only at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    /// Numeric id (binary-format opcode, `0xFC` sub-ops at `0x200 + lo`).
    pub id: u16,
    pub mnemonic: &'static str,
    /// Operand-stack values consumed.
    pub inputs: u8,
    /// Operand-stack values produced.
    pub outputs: u8,
    /// Kind of the consumed operand(s); `Void` when untyped or polymorphic.
    pub operand: ValueKind,
    /// Kind of the produced value; `Void` when none.
    pub result: ValueKind,
    pub kind: OpKind,
}

impl OpInfo {
    const fn new(
        id: u16,
        mnemonic: &'static str,
        inputs: u8,
        outputs: u8,
        operand: ValueKind,
        result: ValueKind,
        kind: OpKind,
    ) -> OpInfo {
        OpInfo {
            id,
            mnemonic,
            inputs,
            outputs,
            operand,
            result,
            kind,
        }
    }
}

/// Every opcode the engine recognises.
///
/// Recognised is not the same as executable: the bulk memory/table family is
/// declared here so the catalog is closed over the binary format, but
/// lowering rejects it explicitly (see `compiler::lower_plain`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Unreachable,
    Nop,
    Block,
    Loop,
    If,
    Else,
    End,
    Br,
    BrIf,
    BrTable,
    Return,
    Call,
    CallIndirect,
    Drop,
    Select,
    LocalGet,
    LocalSet,
    LocalTee,
    GlobalGet,
    GlobalSet,
    I32Load,
    I64Load,
    F32Load,
    F64Load,
    I32Load8S,
    I32Load8U,
    I32Load16S,
    I32Load16U,
    I64Load8S,
    I64Load8U,
    I64Load16S,
    I64Load16U,
    I64Load32S,
    I64Load32U,
    I32Store,
    I64Store,
    F32Store,
    F64Store,
    I32Store8,
    I32Store16,
    I64Store8,
    I64Store16,
    I64Store32,
    MemorySize,
    MemoryGrow,
    I32Const,
    I64Const,
    F32Const,
    F64Const,
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,
    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F32DemoteF64,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,
    RefNull,
    RefIsNull,
    RefFunc,
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,
    MemoryInit,
    DataDrop,
    MemoryCopy,
    MemoryFill,
    TableInit,
    ElemDrop,
    TableCopy,
    TableGrow,
    TableSize,
    TableFill,
}

impl Opcode {
    /// The descriptor for this opcode. This match is the catalog.
    pub const fn info(self) -> OpInfo {
        use OpKind::*;
        use ValueKind::*;
        match self {
            Opcode::Unreachable => OpInfo::new(0x00, "unreachable", 0, 0, Void, Void, Flow),
            Opcode::Nop => OpInfo::new(0x01, "nop", 0, 0, Void, Void, Flow),
            Opcode::Block => OpInfo::new(0x02, "block", 0, 0, Void, Void, Flow),
            Opcode::Loop => OpInfo::new(0x03, "loop", 0, 0, Void, Void, Flow),
            Opcode::If => OpInfo::new(0x04, "if", 1, 0, I32, Void, Flow),
            Opcode::Else => OpInfo::new(0x05, "else", 0, 0, Void, Void, Flow),
            Opcode::End => OpInfo::new(0x0B, "end", 0, 0, Void, Void, Flow),
            Opcode::Br => OpInfo::new(0x0C, "br", 0, 0, Void, Void, Flow),
            Opcode::BrIf => OpInfo::new(0x0D, "br_if", 1, 0, I32, Void, Flow),
            Opcode::BrTable => OpInfo::new(0x0E, "br_table", 1, 0, I32, Void, Flow),
            Opcode::Return => OpInfo::new(0x0F, "return", 0, 0, Void, Void, Flow),
            Opcode::Call => OpInfo::new(0x10, "call", 0, 0, Void, Void, OpKind::Call),
            Opcode::CallIndirect => {
                OpInfo::new(0x11, "call_indirect", 1, 0, I32, Void, OpKind::Call)
            }
            Opcode::Drop => OpInfo::new(0x1A, "drop", 1, 0, Void, Void, Other),
            Opcode::Select => OpInfo::new(0x1B, "select", 3, 1, Void, Void, Other),
            Opcode::LocalGet => OpInfo::new(0x20, "local.get", 0, 1, Void, Void, Variable),
            Opcode::LocalSet => OpInfo::new(0x21, "local.set", 1, 0, Void, Void, Variable),
            Opcode::LocalTee => OpInfo::new(0x22, "local.tee", 1, 1, Void, Void, Variable),
            Opcode::GlobalGet => OpInfo::new(0x23, "global.get", 0, 1, Void, Void, Variable),
            Opcode::GlobalSet => OpInfo::new(0x24, "global.set", 1, 0, Void, Void, Variable),
            Opcode::I32Load => OpInfo::new(0x28, "i32.load", 1, 1, I32, I32, Load),
            Opcode::I64Load => OpInfo::new(0x29, "i64.load", 1, 1, I32, I64, Load),
            Opcode::F32Load => OpInfo::new(0x2A, "f32.load", 1, 1, I32, F32, Load),
            Opcode::F64Load => OpInfo::new(0x2B, "f64.load", 1, 1, I32, F64, Load),
            Opcode::I32Load8S => OpInfo::new(0x2C, "i32.load8_s", 1, 1, I32, I32, Load),
            Opcode::I32Load8U => OpInfo::new(0x2D, "i32.load8_u", 1, 1, I32, I32, Load),
            Opcode::I32Load16S => OpInfo::new(0x2E, "i32.load16_s", 1, 1, I32, I32, Load),
            Opcode::I32Load16U => OpInfo::new(0x2F, "i32.load16_u", 1, 1, I32, I32, Load),
            Opcode::I64Load8S => OpInfo::new(0x30, "i64.load8_s", 1, 1, I32, I64, Load),
            Opcode::I64Load8U => OpInfo::new(0x31, "i64.load8_u", 1, 1, I32, I64, Load),
            Opcode::I64Load16S => OpInfo::new(0x32, "i64.load16_s", 1, 1, I32, I64, Load),
            Opcode::I64Load16U => OpInfo::new(0x33, "i64.load16_u", 1, 1, I32, I64, Load),
            Opcode::I64Load32S => OpInfo::new(0x34, "i64.load32_s", 1, 1, I32, I64, Load),
            Opcode::I64Load32U => OpInfo::new(0x35, "i64.load32_u", 1, 1, I32, I64, Load),
            Opcode::I32Store => OpInfo::new(0x36, "i32.store", 2, 0, I32, Void, Store),
            Opcode::I64Store => OpInfo::new(0x37, "i64.store", 2, 0, I64, Void, Store),
            Opcode::F32Store => OpInfo::new(0x38, "f32.store", 2, 0, F32, Void, Store),
            Opcode::F64Store => OpInfo::new(0x39, "f64.store", 2, 0, F64, Void, Store),
            Opcode::I32Store8 => OpInfo::new(0x3A, "i32.store8", 2, 0, I32, Void, Store),
            Opcode::I32Store16 => OpInfo::new(0x3B, "i32.store16", 2, 0, I32, Void, Store),
            Opcode::I64Store8 => OpInfo::new(0x3C, "i64.store8", 2, 0, I64, Void, Store),
            Opcode::I64Store16 => OpInfo::new(0x3D, "i64.store16", 2, 0, I64, Void, Store),
            Opcode::I64Store32 => OpInfo::new(0x3E, "i64.store32", 2, 0, I64, Void, Store),
            Opcode::MemorySize => OpInfo::new(0x3F, "memory.size", 0, 1, Void, I32, Other),
            Opcode::MemoryGrow => OpInfo::new(0x40, "memory.grow", 1, 1, I32, I32, Other),
            Opcode::I32Const => OpInfo::new(0x41, "i32.const", 0, 1, Void, I32, Literal),
            Opcode::I64Const => OpInfo::new(0x42, "i64.const", 0, 1, Void, I64, Literal),
            Opcode::F32Const => OpInfo::new(0x43, "f32.const", 0, 1, Void, F32, Literal),
            Opcode::F64Const => OpInfo::new(0x44, "f64.const", 0, 1, Void, F64, Literal),
            Opcode::I32Eqz => OpInfo::new(0x45, "i32.eqz", 1, 1, I32, I32, Compare),
            Opcode::I32Eq => OpInfo::new(0x46, "i32.eq", 2, 1, I32, I32, Compare),
            Opcode::I32Ne => OpInfo::new(0x47, "i32.ne", 2, 1, I32, I32, Compare),
            Opcode::I32LtS => OpInfo::new(0x48, "i32.lt_s", 2, 1, I32, I32, Compare),
            Opcode::I32LtU => OpInfo::new(0x49, "i32.lt_u", 2, 1, I32, I32, Compare),
            Opcode::I32GtS => OpInfo::new(0x4A, "i32.gt_s", 2, 1, I32, I32, Compare),
            Opcode::I32GtU => OpInfo::new(0x4B, "i32.gt_u", 2, 1, I32, I32, Compare),
            Opcode::I32LeS => OpInfo::new(0x4C, "i32.le_s", 2, 1, I32, I32, Compare),
            Opcode::I32LeU => OpInfo::new(0x4D, "i32.le_u", 2, 1, I32, I32, Compare),
            Opcode::I32GeS => OpInfo::new(0x4E, "i32.ge_s", 2, 1, I32, I32, Compare),
            Opcode::I32GeU => OpInfo::new(0x4F, "i32.ge_u", 2, 1, I32, I32, Compare),
            Opcode::I64Eqz => OpInfo::new(0x50, "i64.eqz", 1, 1, I64, I32, Compare),
            Opcode::I64Eq => OpInfo::new(0x51, "i64.eq", 2, 1, I64, I32, Compare),
            Opcode::I64Ne => OpInfo::new(0x52, "i64.ne", 2, 1, I64, I32, Compare),
            Opcode::I64LtS => OpInfo::new(0x53, "i64.lt_s", 2, 1, I64, I32, Compare),
            Opcode::I64LtU => OpInfo::new(0x54, "i64.lt_u", 2, 1, I64, I32, Compare),
            Opcode::I64GtS => OpInfo::new(0x55, "i64.gt_s", 2, 1, I64, I32, Compare),
            Opcode::I64GtU => OpInfo::new(0x56, "i64.gt_u", 2, 1, I64, I32, Compare),
            Opcode::I64LeS => OpInfo::new(0x57, "i64.le_s", 2, 1, I64, I32, Compare),
            Opcode::I64LeU => OpInfo::new(0x58, "i64.le_u", 2, 1, I64, I32, Compare),
            Opcode::I64GeS => OpInfo::new(0x59, "i64.ge_s", 2, 1, I64, I32, Compare),
            Opcode::I64GeU => OpInfo::new(0x5A, "i64.ge_u", 2, 1, I64, I32, Compare),
            Opcode::F32Eq => OpInfo::new(0x5B, "f32.eq", 2, 1, F32, I32, Compare),
            Opcode::F32Ne => OpInfo::new(0x5C, "f32.ne", 2, 1, F32, I32, Compare),
            Opcode::F32Lt => OpInfo::new(0x5D, "f32.lt", 2, 1, F32, I32, Compare),
            Opcode::F32Gt => OpInfo::new(0x5E, "f32.gt", 2, 1, F32, I32, Compare),
            Opcode::F32Le => OpInfo::new(0x5F, "f32.le", 2, 1, F32, I32, Compare),
            Opcode::F32Ge => OpInfo::new(0x60, "f32.ge", 2, 1, F32, I32, Compare),
            Opcode::F64Eq => OpInfo::new(0x61, "f64.eq", 2, 1, F64, I32, Compare),
            Opcode::F64Ne => OpInfo::new(0x62, "f64.ne", 2, 1, F64, I32, Compare),
            Opcode::F64Lt => OpInfo::new(0x63, "f64.lt", 2, 1, F64, I32, Compare),
            Opcode::F64Gt => OpInfo::new(0x64, "f64.gt", 2, 1, F64, I32, Compare),
            Opcode::F64Le => OpInfo::new(0x65, "f64.le", 2, 1, F64, I32, Compare),
            Opcode::F64Ge => OpInfo::new(0x66, "f64.ge", 2, 1, F64, I32, Compare),
            Opcode::I32Clz => OpInfo::new(0x67, "i32.clz", 1, 1, I32, I32, Other),
            Opcode::I32Ctz => OpInfo::new(0x68, "i32.ctz", 1, 1, I32, I32, Other),
            Opcode::I32Popcnt => OpInfo::new(0x69, "i32.popcnt", 1, 1, I32, I32, Other),
            Opcode::I32Add => OpInfo::new(0x6A, "i32.add", 2, 1, I32, I32, Binary),
            Opcode::I32Sub => OpInfo::new(0x6B, "i32.sub", 2, 1, I32, I32, Binary),
            Opcode::I32Mul => OpInfo::new(0x6C, "i32.mul", 2, 1, I32, I32, Binary),
            Opcode::I32DivS => OpInfo::new(0x6D, "i32.div_s", 2, 1, I32, I32, Binary),
            Opcode::I32DivU => OpInfo::new(0x6E, "i32.div_u", 2, 1, I32, I32, Binary),
            Opcode::I32RemS => OpInfo::new(0x6F, "i32.rem_s", 2, 1, I32, I32, Binary),
            Opcode::I32RemU => OpInfo::new(0x70, "i32.rem_u", 2, 1, I32, I32, Binary),
            Opcode::I32And => OpInfo::new(0x71, "i32.and", 2, 1, I32, I32, Binary),
            Opcode::I32Or => OpInfo::new(0x72, "i32.or", 2, 1, I32, I32, Binary),
            Opcode::I32Xor => OpInfo::new(0x73, "i32.xor", 2, 1, I32, I32, Binary),
            Opcode::I32Shl => OpInfo::new(0x74, "i32.shl", 2, 1, I32, I32, Binary),
            Opcode::I32ShrS => OpInfo::new(0x75, "i32.shr_s", 2, 1, I32, I32, Binary),
            Opcode::I32ShrU => OpInfo::new(0x76, "i32.shr_u", 2, 1, I32, I32, Binary),
            Opcode::I32Rotl => OpInfo::new(0x77, "i32.rotl", 2, 1, I32, I32, Binary),
            Opcode::I32Rotr => OpInfo::new(0x78, "i32.rotr", 2, 1, I32, I32, Binary),
            Opcode::I64Clz => OpInfo::new(0x79, "i64.clz", 1, 1, I64, I64, Other),
            Opcode::I64Ctz => OpInfo::new(0x7A, "i64.ctz", 1, 1, I64, I64, Other),
            Opcode::I64Popcnt => OpInfo::new(0x7B, "i64.popcnt", 1, 1, I64, I64, Other),
            Opcode::I64Add => OpInfo::new(0x7C, "i64.add", 2, 1, I64, I64, Binary),
            Opcode::I64Sub => OpInfo::new(0x7D, "i64.sub", 2, 1, I64, I64, Binary),
            Opcode::I64Mul => OpInfo::new(0x7E, "i64.mul", 2, 1, I64, I64, Binary),
            Opcode::I64DivS => OpInfo::new(0x7F, "i64.div_s", 2, 1, I64, I64, Binary),
            Opcode::I64DivU => OpInfo::new(0x80, "i64.div_u", 2, 1, I64, I64, Binary),
            Opcode::I64RemS => OpInfo::new(0x81, "i64.rem_s", 2, 1, I64, I64, Binary),
            Opcode::I64RemU => OpInfo::new(0x82, "i64.rem_u", 2, 1, I64, I64, Binary),
            Opcode::I64And => OpInfo::new(0x83, "i64.and", 2, 1, I64, I64, Binary),
            Opcode::I64Or => OpInfo::new(0x84, "i64.or", 2, 1, I64, I64, Binary),
            Opcode::I64Xor => OpInfo::new(0x85, "i64.xor", 2, 1, I64, I64, Binary),
            Opcode::I64Shl => OpInfo::new(0x86, "i64.shl", 2, 1, I64, I64, Binary),
            Opcode::I64ShrS => OpInfo::new(0x87, "i64.shr_s", 2, 1, I64, I64, Binary),
            Opcode::I64ShrU => OpInfo::new(0x88, "i64.shr_u", 2, 1, I64, I64, Binary),
            Opcode::I64Rotl => OpInfo::new(0x89, "i64.rotl", 2, 1, I64, I64, Binary),
            Opcode::I64Rotr => OpInfo::new(0x8A, "i64.rotr", 2, 1, I64, I64, Binary),
            Opcode::F32Abs => OpInfo::new(0x8B, "f32.abs", 1, 1, F32, F32, Other),
            Opcode::F32Neg => OpInfo::new(0x8C, "f32.neg", 1, 1, F32, F32, Other),
            Opcode::F32Ceil => OpInfo::new(0x8D, "f32.ceil", 1, 1, F32, F32, Other),
            Opcode::F32Floor => OpInfo::new(0x8E, "f32.floor", 1, 1, F32, F32, Other),
            Opcode::F32Trunc => OpInfo::new(0x8F, "f32.trunc", 1, 1, F32, F32, Other),
            Opcode::F32Nearest => OpInfo::new(0x90, "f32.nearest", 1, 1, F32, F32, Other),
            Opcode::F32Sqrt => OpInfo::new(0x91, "f32.sqrt", 1, 1, F32, F32, Other),
            Opcode::F32Add => OpInfo::new(0x92, "f32.add", 2, 1, F32, F32, Binary),
            Opcode::F32Sub => OpInfo::new(0x93, "f32.sub", 2, 1, F32, F32, Binary),
            Opcode::F32Mul => OpInfo::new(0x94, "f32.mul", 2, 1, F32, F32, Binary),
            Opcode::F32Div => OpInfo::new(0x95, "f32.div", 2, 1, F32, F32, Binary),
            Opcode::F32Min => OpInfo::new(0x96, "f32.min", 2, 1, F32, F32, Binary),
            Opcode::F32Max => OpInfo::new(0x97, "f32.max", 2, 1, F32, F32, Binary),
            Opcode::F32Copysign => OpInfo::new(0x98, "f32.copysign", 2, 1, F32, F32, Binary),
            Opcode::F64Abs => OpInfo::new(0x99, "f64.abs", 1, 1, F64, F64, Other),
            Opcode::F64Neg => OpInfo::new(0x9A, "f64.neg", 1, 1, F64, F64, Other),
            Opcode::F64Ceil => OpInfo::new(0x9B, "f64.ceil", 1, 1, F64, F64, Other),
            Opcode::F64Floor => OpInfo::new(0x9C, "f64.floor", 1, 1, F64, F64, Other),
            Opcode::F64Trunc => OpInfo::new(0x9D, "f64.trunc", 1, 1, F64, F64, Other),
            Opcode::F64Nearest => OpInfo::new(0x9E, "f64.nearest", 1, 1, F64, F64, Other),
            Opcode::F64Sqrt => OpInfo::new(0x9F, "f64.sqrt", 1, 1, F64, F64, Other),
            Opcode::F64Add => OpInfo::new(0xA0, "f64.add", 2, 1, F64, F64, Binary),
            Opcode::F64Sub => OpInfo::new(0xA1, "f64.sub", 2, 1, F64, F64, Binary),
            Opcode::F64Mul => OpInfo::new(0xA2, "f64.mul", 2, 1, F64, F64, Binary),
            Opcode::F64Div => OpInfo::new(0xA3, "f64.div", 2, 1, F64, F64, Binary),
            Opcode::F64Min => OpInfo::new(0xA4, "f64.min", 2, 1, F64, F64, Binary),
            Opcode::F64Max => OpInfo::new(0xA5, "f64.max", 2, 1, F64, F64, Binary),
            Opcode::F64Copysign => OpInfo::new(0xA6, "f64.copysign", 2, 1, F64, F64, Binary),
            Opcode::I32WrapI64 => OpInfo::new(0xA7, "i32.wrap_i64", 1, 1, I64, I32, Other),
            Opcode::I32TruncF32S => OpInfo::new(0xA8, "i32.trunc_f32_s", 1, 1, F32, I32, Other),
            Opcode::I32TruncF32U => OpInfo::new(0xA9, "i32.trunc_f32_u", 1, 1, F32, I32, Other),
            Opcode::I32TruncF64S => OpInfo::new(0xAA, "i32.trunc_f64_s", 1, 1, F64, I32, Other),
            Opcode::I32TruncF64U => OpInfo::new(0xAB, "i32.trunc_f64_u", 1, 1, F64, I32, Other),
            Opcode::I64ExtendI32S => OpInfo::new(0xAC, "i64.extend_i32_s", 1, 1, I32, I64, Other),
            Opcode::I64ExtendI32U => OpInfo::new(0xAD, "i64.extend_i32_u", 1, 1, I32, I64, Other),
            Opcode::I64TruncF32S => OpInfo::new(0xAE, "i64.trunc_f32_s", 1, 1, F32, I64, Other),
            Opcode::I64TruncF32U => OpInfo::new(0xAF, "i64.trunc_f32_u", 1, 1, F32, I64, Other),
            Opcode::I64TruncF64S => OpInfo::new(0xB0, "i64.trunc_f64_s", 1, 1, F64, I64, Other),
            Opcode::I64TruncF64U => OpInfo::new(0xB1, "i64.trunc_f64_u", 1, 1, F64, I64, Other),
            Opcode::F32ConvertI32S => OpInfo::new(0xB2, "f32.convert_i32_s", 1, 1, I32, F32, Other),
            Opcode::F32ConvertI32U => OpInfo::new(0xB3, "f32.convert_i32_u", 1, 1, I32, F32, Other),
            Opcode::F32ConvertI64S => OpInfo::new(0xB4, "f32.convert_i64_s", 1, 1, I64, F32, Other),
            Opcode::F32ConvertI64U => OpInfo::new(0xB5, "f32.convert_i64_u", 1, 1, I64, F32, Other),
            Opcode::F32DemoteF64 => OpInfo::new(0xB6, "f32.demote_f64", 1, 1, F64, F32, Other),
            Opcode::F64ConvertI32S => OpInfo::new(0xB7, "f64.convert_i32_s", 1, 1, I32, F64, Other),
            Opcode::F64ConvertI32U => OpInfo::new(0xB8, "f64.convert_i32_u", 1, 1, I32, F64, Other),
            Opcode::F64ConvertI64S => OpInfo::new(0xB9, "f64.convert_i64_s", 1, 1, I64, F64, Other),
            Opcode::F64ConvertI64U => OpInfo::new(0xBA, "f64.convert_i64_u", 1, 1, I64, F64, Other),
            Opcode::F64PromoteF32 => OpInfo::new(0xBB, "f64.promote_f32", 1, 1, F32, F64, Other),
            Opcode::I32ReinterpretF32 => {
                OpInfo::new(0xBC, "i32.reinterpret_f32", 1, 1, F32, I32, Other)
            }
            Opcode::I64ReinterpretF64 => {
                OpInfo::new(0xBD, "i64.reinterpret_f64", 1, 1, F64, I64, Other)
            }
            Opcode::F32ReinterpretI32 => {
                OpInfo::new(0xBE, "f32.reinterpret_i32", 1, 1, I32, F32, Other)
            }
            Opcode::F64ReinterpretI64 => {
                OpInfo::new(0xBF, "f64.reinterpret_i64", 1, 1, I64, F64, Other)
            }
            Opcode::I32Extend8S => OpInfo::new(0xC0, "i32.extend8_s", 1, 1, I32, I32, Other),
            Opcode::I32Extend16S => OpInfo::new(0xC1, "i32.extend16_s", 1, 1, I32, I32, Other),
            Opcode::I64Extend8S => OpInfo::new(0xC2, "i64.extend8_s", 1, 1, I64, I64, Other),
            Opcode::I64Extend16S => OpInfo::new(0xC3, "i64.extend16_s", 1, 1, I64, I64, Other),
            Opcode::I64Extend32S => OpInfo::new(0xC4, "i64.extend32_s", 1, 1, I64, I64, Other),
            Opcode::RefNull => OpInfo::new(0xD0, "ref.null", 0, 1, Void, FuncRef, Other),
            Opcode::RefIsNull => OpInfo::new(0xD1, "ref.is_null", 1, 1, FuncRef, I32, Other),
            Opcode::RefFunc => OpInfo::new(0xD2, "ref.func", 0, 1, Void, FuncRef, Other),
            Opcode::I32TruncSatF32S => {
                OpInfo::new(0x200, "i32.trunc_sat_f32_s", 1, 1, F32, I32, Other)
            }
            Opcode::I32TruncSatF32U => {
                OpInfo::new(0x201, "i32.trunc_sat_f32_u", 1, 1, F32, I32, Other)
            }
            Opcode::I32TruncSatF64S => {
                OpInfo::new(0x202, "i32.trunc_sat_f64_s", 1, 1, F64, I32, Other)
            }
            Opcode::I32TruncSatF64U => {
                OpInfo::new(0x203, "i32.trunc_sat_f64_u", 1, 1, F64, I32, Other)
            }
            Opcode::I64TruncSatF32S => {
                OpInfo::new(0x204, "i64.trunc_sat_f32_s", 1, 1, F32, I64, Other)
            }
            Opcode::I64TruncSatF32U => {
                OpInfo::new(0x205, "i64.trunc_sat_f32_u", 1, 1, F32, I64, Other)
            }
            Opcode::I64TruncSatF64S => {
                OpInfo::new(0x206, "i64.trunc_sat_f64_s", 1, 1, F64, I64, Other)
            }
            Opcode::I64TruncSatF64U => {
                OpInfo::new(0x207, "i64.trunc_sat_f64_u", 1, 1, F64, I64, Other)
            }
            Opcode::MemoryInit => OpInfo::new(0x208, "memory.init", 3, 0, I32, Void, Other),
            Opcode::DataDrop => OpInfo::new(0x209, "data.drop", 0, 0, Void, Void, Other),
            Opcode::MemoryCopy => OpInfo::new(0x20A, "memory.copy", 3, 0, I32, Void, Other),
            Opcode::MemoryFill => OpInfo::new(0x20B, "memory.fill", 3, 0, I32, Void, Other),
            Opcode::TableInit => OpInfo::new(0x20C, "table.init", 3, 0, I32, Void, Other),
            Opcode::ElemDrop => OpInfo::new(0x20D, "elem.drop", 0, 0, Void, Void, Other),
            Opcode::TableCopy => OpInfo::new(0x20E, "table.copy", 3, 0, I32, Void, Other),
            Opcode::TableGrow => OpInfo::new(0x20F, "table.grow", 2, 1, I32, I32, Other),
            Opcode::TableSize => OpInfo::new(0x210, "table.size", 0, 1, Void, I32, Other),
            Opcode::TableFill => OpInfo::new(0x211, "table.fill", 3, 0, I32, Void, Other),
        }
    }

    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    pub fn id(self) -> u16 {
        self.info().id
    }

    /// Look up an opcode by mnemonic.
    pub fn by_name(name: &str) -> Option<Opcode> {
        BY_NAME.get(name).copied()
    }

    /// Look up an opcode by numeric id.
    pub fn by_id(id: u16) -> Option<Opcode> {
        BY_ID.get(&id).copied()
    }

    /// Every opcode, in id order.
    pub const ALL: &'static [Opcode] = &[
        Opcode::Unreachable,
        Opcode::Nop,
        Opcode::Block,
        Opcode::Loop,
        Opcode::If,
        Opcode::Else,
        Opcode::End,
        Opcode::Br,
        Opcode::BrIf,
        Opcode::BrTable,
        Opcode::Return,
        Opcode::Call,
        Opcode::CallIndirect,
        Opcode::Drop,
        Opcode::Select,
        Opcode::LocalGet,
        Opcode::LocalSet,
        Opcode::LocalTee,
        Opcode::GlobalGet,
        Opcode::GlobalSet,
        Opcode::I32Load,
        Opcode::I64Load,
        Opcode::F32Load,
        Opcode::F64Load,
        Opcode::I32Load8S,
        Opcode::I32Load8U,
        Opcode::I32Load16S,
        Opcode::I32Load16U,
        Opcode::I64Load8S,
        Opcode::I64Load8U,
        Opcode::I64Load16S,
        Opcode::I64Load16U,
        Opcode::I64Load32S,
        Opcode::I64Load32U,
        Opcode::I32Store,
        Opcode::I64Store,
        Opcode::F32Store,
        Opcode::F64Store,
        Opcode::I32Store8,
        Opcode::I32Store16,
        Opcode::I64Store8,
        Opcode::I64Store16,
        Opcode::I64Store32,
        Opcode::MemorySize,
        Opcode::MemoryGrow,
        Opcode::I32Const,
        Opcode::I64Const,
        Opcode::F32Const,
        Opcode::F64Const,
        Opcode::I32Eqz,
        Opcode::I32Eq,
        Opcode::I32Ne,
        Opcode::I32LtS,
        Opcode::I32LtU,
        Opcode::I32GtS,
        Opcode::I32GtU,
        Opcode::I32LeS,
        Opcode::I32LeU,
        Opcode::I32GeS,
        Opcode::I32GeU,
        Opcode::I64Eqz,
        Opcode::I64Eq,
        Opcode::I64Ne,
        Opcode::I64LtS,
        Opcode::I64LtU,
        Opcode::I64GtS,
        Opcode::I64GtU,
        Opcode::I64LeS,
        Opcode::I64LeU,
        Opcode::I64GeS,
        Opcode::I64GeU,
        Opcode::F32Eq,
        Opcode::F32Ne,
        Opcode::F32Lt,
        Opcode::F32Gt,
        Opcode::F32Le,
        Opcode::F32Ge,
        Opcode::F64Eq,
        Opcode::F64Ne,
        Opcode::F64Lt,
        Opcode::F64Gt,
        Opcode::F64Le,
        Opcode::F64Ge,
        Opcode::I32Clz,
        Opcode::I32Ctz,
        Opcode::I32Popcnt,
        Opcode::I32Add,
        Opcode::I32Sub,
        Opcode::I32Mul,
        Opcode::I32DivS,
        Opcode::I32DivU,
        Opcode::I32RemS,
        Opcode::I32RemU,
        Opcode::I32And,
        Opcode::I32Or,
        Opcode::I32Xor,
        Opcode::I32Shl,
        Opcode::I32ShrS,
        Opcode::I32ShrU,
        Opcode::I32Rotl,
        Opcode::I32Rotr,
        Opcode::I64Clz,
        Opcode::I64Ctz,
        Opcode::I64Popcnt,
        Opcode::I64Add,
        Opcode::I64Sub,
        Opcode::I64Mul,
        Opcode::I64DivS,
        Opcode::I64DivU,
        Opcode::I64RemS,
        Opcode::I64RemU,
        Opcode::I64And,
        Opcode::I64Or,
        Opcode::I64Xor,
        Opcode::I64Shl,
        Opcode::I64ShrS,
        Opcode::I64ShrU,
        Opcode::I64Rotl,
        Opcode::I64Rotr,
        Opcode::F32Abs,
        Opcode::F32Neg,
        Opcode::F32Ceil,
        Opcode::F32Floor,
        Opcode::F32Trunc,
        Opcode::F32Nearest,
        Opcode::F32Sqrt,
        Opcode::F32Add,
        Opcode::F32Sub,
        Opcode::F32Mul,
        Opcode::F32Div,
        Opcode::F32Min,
        Opcode::F32Max,
        Opcode::F32Copysign,
        Opcode::F64Abs,
        Opcode::F64Neg,
        Opcode::F64Ceil,
        Opcode::F64Floor,
        Opcode::F64Trunc,
        Opcode::F64Nearest,
        Opcode::F64Sqrt,
        Opcode::F64Add,
        Opcode::F64Sub,
        Opcode::F64Mul,
        Opcode::F64Div,
        Opcode::F64Min,
        Opcode::F64Max,
        Opcode::F64Copysign,
        Opcode::I32WrapI64,
        Opcode::I32TruncF32S,
        Opcode::I32TruncF32U,
        Opcode::I32TruncF64S,
        Opcode::I32TruncF64U,
        Opcode::I64ExtendI32S,
        Opcode::I64ExtendI32U,
        Opcode::I64TruncF32S,
        Opcode::I64TruncF32U,
        Opcode::I64TruncF64S,
        Opcode::I64TruncF64U,
        Opcode::F32ConvertI32S,
        Opcode::F32ConvertI32U,
        Opcode::F32ConvertI64S,
        Opcode::F32ConvertI64U,
        Opcode::F32DemoteF64,
        Opcode::F64ConvertI32S,
        Opcode::F64ConvertI32U,
        Opcode::F64ConvertI64S,
        Opcode::F64ConvertI64U,
        Opcode::F64PromoteF32,
        Opcode::I32ReinterpretF32,
        Opcode::I64ReinterpretF64,
        Opcode::F32ReinterpretI32,
        Opcode::F64ReinterpretI64,
        Opcode::I32Extend8S,
        Opcode::I32Extend16S,
        Opcode::I64Extend8S,
        Opcode::I64Extend16S,
        Opcode::I64Extend32S,
        Opcode::RefNull,
        Opcode::RefIsNull,
        Opcode::RefFunc,
        Opcode::I32TruncSatF32S,
        Opcode::I32TruncSatF32U,
        Opcode::I32TruncSatF64S,
        Opcode::I32TruncSatF64U,
        Opcode::I64TruncSatF32S,
        Opcode::I64TruncSatF32U,
        Opcode::I64TruncSatF64S,
        Opcode::I64TruncSatF64U,
        Opcode::MemoryInit,
        Opcode::DataDrop,
        Opcode::MemoryCopy,
        Opcode::MemoryFill,
        Opcode::TableInit,
        Opcode::ElemDrop,
        Opcode::TableCopy,
        Opcode::TableGrow,
        Opcode::TableSize,
        Opcode::TableFill,
    ];
}

static BY_NAME: Lazy<HashMap<&'static str, Opcode>> =
    Lazy::new(|| Opcode::ALL.iter().map(|&op| (op.mnemonic(), op)).collect());

static BY_ID: Lazy<HashMap<u16, Opcode>> =
    Lazy::new(|| Opcode::ALL.iter().map(|&op| (op.id(), op)).collect());
