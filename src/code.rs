//! Packed instruction encoding
//!
//! Every lowered instruction is a single `u32` with four bit-fields:
//!
//! ```text
//!  31        26 25  23 22  20 19                    0
//! +------------+------+------+-----------------------+
//! | class (6)  | kind | extra|   immediate (20, s)   |
//! +------------+------+------+-----------------------+
//! ```
//!
//! - `class` selects one of the lowered execution classes (not the same
//!   numbering as the AST opcode ids - structured control flow is gone by
//!   the time a word exists, replaced by `Goto*` classes).
//! - `kind` is the value kind the class operates on (`i32.add` and `f64.add`
//!   share the `Binop` class and differ only in kind).
//! - `extra` is a class-dependent sub-mode: arithmetic selector, comparison
//!   predicate, load/store width, conversion source.
//! - `imm` is a signed 20-bit immediate: local byte offset, global index,
//!   constant-pool index, function/type index, or jump target. Values that
//!   do not fit are spilled to a typed constant pool and referenced by
//!   index instead.

/// Number of bits in the signed immediate field.
pub const IMM_BITS: u32 = 20;

/// Smallest encodable immediate.
pub const IMM_MIN: i32 = -(1 << (IMM_BITS - 1));

/// Largest encodable immediate.
pub const IMM_MAX: i32 = (1 << (IMM_BITS - 1)) - 1;

/// Whether `value` fits the signed immediate field.
pub fn imm_fits(value: i64) -> bool {
    value >= IMM_MIN as i64 && value <= IMM_MAX as i64
}

/// Value kind carried in the packed word (3 bits).
///
/// This mirrors the WebAssembly value types plus `Void` for classes that
/// produce or consume nothing of interest (flow control, void returns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Void = 0,
    I32 = 1,
    I64 = 2,
    F32 = 3,
    F64 = 4,
    V128 = 5,
    AnyRef = 6,
    FuncRef = 7,
}

impl ValueKind {
    pub fn from_bits(bits: u8) -> Option<ValueKind> {
        Some(match bits {
            0 => ValueKind::Void,
            1 => ValueKind::I32,
            2 => ValueKind::I64,
            3 => ValueKind::F32,
            4 => ValueKind::F64,
            5 => ValueKind::V128,
            6 => ValueKind::AnyRef,
            7 => ValueKind::FuncRef,
            _ => return None,
        })
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Width of one operand-stack slot of this kind, in bytes.
    ///
    /// Reference kinds live on the separate reference list and occupy no
    /// bytes in the numeric buffer.
    pub fn slot_width(self) -> usize {
        match self {
            ValueKind::Void | ValueKind::AnyRef | ValueKind::FuncRef => 0,
            ValueKind::I32 | ValueKind::F32 => 4,
            ValueKind::I64 | ValueKind::F64 => 8,
            ValueKind::V128 => 16,
        }
    }

    pub fn is_ref(self) -> bool {
        matches!(self, ValueKind::AnyRef | ValueKind::FuncRef)
    }
}

/// Lowered execution class (6 bits).
///
/// Roughly thirty classes cover the whole instruction set once types are
/// moved into the `kind` field and variants into `extra`. Structured
/// control flow (block/loop/if/br*) lowers to the `Goto*` family with
/// absolute word-index targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpClass {
    Nop = 0,
    Unreachable,
    Drop,
    Select,
    LocalGet,
    LocalSet,
    LocalTee,
    GlobalGet,
    GlobalSet,
    Load,
    Store,
    MemorySize,
    MemoryGrow,
    /// Wide literal: immediate is an index into the typed constant pool.
    Const,
    /// Narrow literal: immediate is the (sign-extended) value itself.
    ShortConst,
    Binop,
    BinBit,
    Unop,
    CmpEq,
    CmpOrd,
    Trunc,
    TruncSat,
    Convert,
    Recast,
    Goto,
    GotoIf,
    GotoIfNot,
    /// Branch table: immediate points at `[n, default, l0 .. ln-1]` in the
    /// i32 pool.
    GotoTable,
    Call,
    CallIndirect,
    Return,
    RefNull,
    RefIsNull,
    RefFunc,
}

impl OpClass {
    const ALL: [OpClass; 34] = [
        OpClass::Nop,
        OpClass::Unreachable,
        OpClass::Drop,
        OpClass::Select,
        OpClass::LocalGet,
        OpClass::LocalSet,
        OpClass::LocalTee,
        OpClass::GlobalGet,
        OpClass::GlobalSet,
        OpClass::Load,
        OpClass::Store,
        OpClass::MemorySize,
        OpClass::MemoryGrow,
        OpClass::Const,
        OpClass::ShortConst,
        OpClass::Binop,
        OpClass::BinBit,
        OpClass::Unop,
        OpClass::CmpEq,
        OpClass::CmpOrd,
        OpClass::Trunc,
        OpClass::TruncSat,
        OpClass::Convert,
        OpClass::Recast,
        OpClass::Goto,
        OpClass::GotoIf,
        OpClass::GotoIfNot,
        OpClass::GotoTable,
        OpClass::Call,
        OpClass::CallIndirect,
        OpClass::Return,
        OpClass::RefNull,
        OpClass::RefIsNull,
        OpClass::RefFunc,
    ];

    pub fn from_bits(bits: u8) -> Option<OpClass> {
        OpClass::ALL.get(bits as usize).copied()
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

macro_rules! extra_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn from_bits(bits: u8) -> Option<$name> {
                [$($name::$variant),+].get(bits as usize).copied()
            }

            pub fn bits(self) -> u8 {
                self as u8
            }
        }
    };
}

extra_enum! {
    /// `Binop` sub-mode for integer kinds.
    IntArith { Add, Sub, Mul, DivS, DivU, RemS, RemU }
}

extra_enum! {
    /// `Binop` sub-mode for float kinds.
    FloatArith { Add, Sub, Mul, Div, Min, Max, CopySign }
}

extra_enum! {
    /// `BinBit` sub-mode (integer kinds only).
    BitOp { And, Or, Xor, Shl, ShrS, ShrU, Rotl, Rotr }
}

extra_enum! {
    /// `Unop` sub-mode for integer kinds. The extension variants narrow to
    /// the named width and sign-extend back.
    IntUnop { Clz, Ctz, Popcnt, Extend8S, Extend16S, Extend32S }
}

extra_enum! {
    /// `Unop` sub-mode for float kinds.
    FloatUnop { Abs, Neg, Ceil, Floor, Trunc, Nearest, Sqrt }
}

extra_enum! {
    /// `CmpEq` predicate. `Eqz` compares against zero and pops one operand;
    /// floats never use it.
    EqOp { Eqz, Eq, Ne }
}

extra_enum! {
    /// `CmpOrd` predicate. Floats use the signed slots.
    OrdOp { LtS, LtU, GtS, GtU, LeS, LeU, GeS, GeU }
}

extra_enum! {
    /// `Load` width/sign variant. `Whole` loads the full kind width.
    LoadWidth { Whole, B8S, B8U, B16S, B16U, B32S, B32U }
}

extra_enum! {
    /// `Store` width variant.
    StoreWidth { Whole, B8, B16, B32 }
}

extra_enum! {
    /// `Trunc`/`TruncSat` source: float width and destination signedness.
    TruncSrc { F32S, F32U, F64S, F64U }
}

extra_enum! {
    /// `Convert` source: integer width and signedness.
    ConvertSrc { I32S, I32U, I64S, I64U }
}

extra_enum! {
    /// `Recast` sub-mode: width changes and bit reinterpretation. The kind
    /// field holds the destination kind.
    RecastOp { Wrap, ExtendS, ExtendU, Demote, Promote, Reinterpret }
}

/// One packed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word(u32);

impl Word {
    pub fn new(class: OpClass, kind: ValueKind, extra: u8, imm: i32) -> Word {
        debug_assert!(extra < 8, "extra field overflow: {}", extra);
        debug_assert!(
            imm >= IMM_MIN && imm <= IMM_MAX,
            "immediate out of range: {}",
            imm
        );
        Word(
            ((class.bits() as u32) << 26)
                | ((kind.bits() as u32) << 23)
                | ((extra as u32) << 20)
                | ((imm as u32) & 0x000F_FFFF),
        )
    }

    pub fn class_bits(self) -> u8 {
        ((self.0 >> 26) & 0x3F) as u8
    }

    pub fn kind_bits(self) -> u8 {
        ((self.0 >> 23) & 0x7) as u8
    }

    pub fn extra(self) -> u8 {
        ((self.0 >> 20) & 0x7) as u8
    }

    /// Sign-extended 20-bit immediate.
    pub fn imm(self) -> i32 {
        ((self.0 as i32) << 12) >> 12
    }

    /// The same word with a different immediate. Used by label backpatching.
    pub fn patched(self, imm: i32) -> Word {
        debug_assert!(imm >= IMM_MIN && imm <= IMM_MAX);
        Word((self.0 & 0xFFF0_0000) | ((imm as u32) & 0x000F_FFFF))
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// The compiled artifact for one function body or constant expression.
///
/// Immutable once built; functions cache theirs behind a `OnceCell`, which
/// is what makes sharing compiled code across invocations sound.
#[derive(Debug)]
pub struct CompiledCode {
    pub words: Vec<Word>,
    pub pool_i32: Vec<i32>,
    pub pool_i64: Vec<i64>,
    pub pool_f32: Vec<f32>,
    pub pool_f64: Vec<f64>,
    /// Bytes occupied by the parameters at the base of the frame.
    pub params_size: usize,
    /// Bytes occupied by parameters plus declared locals.
    pub locals_size: usize,
    /// Byte offset of each local within the frame, parameters first.
    pub local_offsets: Vec<u32>,
    /// Kind of the single return value (`Void` for none).
    pub result: ValueKind,
}
