//! Bytecode instructions (opcodes)

use serde::{Deserialize, Serialize};

/// Bytecode opcodes
///
/// Stack-based instruction set. Byte values follow catalogue order, so the
/// numbering is part of the binary format and must never be reshuffled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// Stop execution
    Halt = 0,

    // ==================== Integer arithmetic ====================
    /// Integer addition: push(a + b)
    IAdd = 1,
    /// Integer subtraction: push(a - b)
    ISub = 2,
    /// Integer multiplication: push(a * b)
    IMul = 3,
    /// Truncating integer division: push(a / b)
    IDiv = 4,

    // ==================== Float arithmetic ====================
    /// Float addition
    FAdd = 5,
    /// Float subtraction
    FSub = 6,
    /// Float multiplication
    FMul = 7,
    /// Float division
    FDiv = 8,

    // ==================== Logic ====================
    /// Logical OR of two booleans
    Or = 9,
    /// Logical AND of two booleans
    And = 10,
    /// Integer negation
    INeg = 11,
    /// Float negation
    FNeg = 12,
    /// Logical NOT
    Not = 13,

    // ==================== Conversions ====================
    /// Int to float
    I2F = 14,
    /// Float to int, truncating toward zero
    F2I = 15,
    /// Int to string
    I2S = 16,
    /// Float to string
    F2S = 17,
    /// Vector to string
    V2S = 18,
    /// Float to single-element vector
    F2V = 19,

    // ==================== Integer comparison ====================
    /// a == b
    IEq = 20,
    /// a != b
    INeq = 21,
    /// a < b
    ILt = 22,
    /// a <= b
    ILe = 23,
    /// a > b
    IGt = 24,
    /// a >= b
    IGe = 25,

    // ==================== Float comparison ====================
    /// a == b
    FEq = 26,
    /// a != b
    FNeq = 27,
    /// a < b
    FLt = 28,
    /// a <= b
    FLe = 29,
    /// a > b
    FGt = 30,
    /// a >= b
    FGe = 31,

    /// Nil test
    IsNil = 32,

    // ==================== Control flow ====================
    /// Unconditional relative branch
    Br = 33,
    /// Branch if true
    Brt = 34,
    /// Branch if false
    Brf = 35,

    // ==================== Constants ====================
    /// Push 32-bit integer immediate
    IConst = 36,
    /// Push 32-bit float immediate
    FConst = 37,
    /// Push string constant: strings\[idx\]
    SConst = 38,

    // ==================== Locals ====================
    /// Push int local: locals\[idx\]
    ILoad = 39,
    /// Push float local
    FLoad = 40,
    /// Push vector local
    VLoad = 41,
    /// Push string local
    SLoad = 42,
    /// Pop into locals\[idx\], untyped
    Store = 43,

    // ==================== Vectors ====================
    /// Allocate a vector of the popped length
    Vector = 44,
    /// Pop index and handle, push element
    LoadIndex = 45,
    /// Pop value, index and handle, write element
    StoreIndex = 46,

    // ==================== Misc ====================
    /// Push nil
    Nil = 47,
    /// Discard top of stack
    Pop = 48,

    // ==================== Calls ====================
    /// Call function by table index
    Call = 49,
    /// Return the top of stack to the caller
    RetV = 50,
    /// Return without a value
    Ret = 51,

    // ==================== Output ====================
    /// Print int
    IPrint = 52,
    /// Print float
    FPrint = 53,
    /// Print boolean
    BPrint = 54,
    /// Print string
    SPrint = 55,
    /// Print vector
    VPrint = 56,

    /// No operation
    Nop = 57,
}

/// Net stack effect of an instruction with a fixed arity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEffect {
    /// Cells consumed
    pub pops: u8,
    /// Cells produced
    pub pushes: u8,
}

impl StackEffect {
    const fn new(pops: u8, pushes: u8) -> Self {
        Self { pops, pushes }
    }

    /// Change in stack depth
    pub const fn delta(self) -> i32 {
        self.pushes as i32 - self.pops as i32
    }
}

/// How the operand byte of `POP` is treated.
///
/// The catalogue declares a 1-byte operand for `POP` while the instruction
/// never reads it. Loaders disagree on whether the byte is emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopEncoding {
    /// `POP` is a single byte
    #[default]
    Bare,
    /// `POP` is followed by one ignored padding byte
    Padded,
}

impl PopEncoding {
    /// Effective operand width of `POP`
    pub const fn width(self) -> usize {
        match self {
            Self::Bare => 0,
            Self::Padded => 1,
        }
    }
}

impl Opcode {
    /// Every opcode in byte order
    pub const ALL: [Opcode; 58] = [
        Self::Halt,
        Self::IAdd,
        Self::ISub,
        Self::IMul,
        Self::IDiv,
        Self::FAdd,
        Self::FSub,
        Self::FMul,
        Self::FDiv,
        Self::Or,
        Self::And,
        Self::INeg,
        Self::FNeg,
        Self::Not,
        Self::I2F,
        Self::F2I,
        Self::I2S,
        Self::F2S,
        Self::V2S,
        Self::F2V,
        Self::IEq,
        Self::INeq,
        Self::ILt,
        Self::ILe,
        Self::IGt,
        Self::IGe,
        Self::FEq,
        Self::FNeq,
        Self::FLt,
        Self::FLe,
        Self::FGt,
        Self::FGe,
        Self::IsNil,
        Self::Br,
        Self::Brt,
        Self::Brf,
        Self::IConst,
        Self::FConst,
        Self::SConst,
        Self::ILoad,
        Self::FLoad,
        Self::VLoad,
        Self::SLoad,
        Self::Store,
        Self::Vector,
        Self::LoadIndex,
        Self::StoreIndex,
        Self::Nil,
        Self::Pop,
        Self::Call,
        Self::RetV,
        Self::Ret,
        Self::IPrint,
        Self::FPrint,
        Self::BPrint,
        Self::SPrint,
        Self::VPrint,
        Self::Nop,
    ];

    /// Convert from raw byte
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Convert to raw byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Get the mnemonic of this opcode
    pub const fn name(self) -> &'static str {
        match self {
            Self::Halt => "HALT",
            Self::IAdd => "IADD",
            Self::ISub => "ISUB",
            Self::IMul => "IMUL",
            Self::IDiv => "IDIV",
            Self::FAdd => "FADD",
            Self::FSub => "FSUB",
            Self::FMul => "FMUL",
            Self::FDiv => "FDIV",
            Self::Or => "OR",
            Self::And => "AND",
            Self::INeg => "INEG",
            Self::FNeg => "FNEG",
            Self::Not => "NOT",
            Self::I2F => "I2F",
            Self::F2I => "F2I",
            Self::I2S => "I2S",
            Self::F2S => "F2S",
            Self::V2S => "V2S",
            Self::F2V => "F2V",
            Self::IEq => "IEQ",
            Self::INeq => "INEQ",
            Self::ILt => "ILT",
            Self::ILe => "ILE",
            Self::IGt => "IGT",
            Self::IGe => "IGE",
            Self::FEq => "FEQ",
            Self::FNeq => "FNEQ",
            Self::FLt => "FLT",
            Self::FLe => "FLE",
            Self::FGt => "FGT",
            Self::FGe => "FGE",
            Self::IsNil => "ISNIL",
            Self::Br => "BR",
            Self::Brt => "BRT",
            Self::Brf => "BRF",
            Self::IConst => "ICONST",
            Self::FConst => "FCONST",
            Self::SConst => "SCONST",
            Self::ILoad => "ILOAD",
            Self::FLoad => "FLOAD",
            Self::VLoad => "VLOAD",
            Self::SLoad => "SLOAD",
            Self::Store => "STORE",
            Self::Vector => "VECTOR",
            Self::LoadIndex => "LOAD_INDEX",
            Self::StoreIndex => "STORE_INDEX",
            Self::Nil => "NIL",
            Self::Pop => "POP",
            Self::Call => "CALL",
            Self::RetV => "RETV",
            Self::Ret => "RET",
            Self::IPrint => "IPRINT",
            Self::FPrint => "FPRINT",
            Self::BPrint => "BPRINT",
            Self::SPrint => "SPRINT",
            Self::VPrint => "VPRINT",
            Self::Nop => "NOP",
        }
    }

    /// Operand width in bytes as declared by the catalogue.
    ///
    /// `POP` declares one byte; use [`Opcode::operand_width`] for the width
    /// the decoder actually consumes.
    pub const fn declared_width(self) -> usize {
        match self {
            Self::Br | Self::Brt | Self::Brf => 2,
            Self::IConst | Self::FConst => 4,
            Self::SConst => 2,
            Self::ILoad | Self::FLoad | Self::VLoad | Self::SLoad | Self::Store => 2,
            Self::Call => 2,
            Self::Pop => 1,
            _ => 0,
        }
    }

    /// Operand width consumed by the decoder under the given `POP` encoding
    pub const fn operand_width(self, pop: PopEncoding) -> usize {
        match self {
            Self::Pop => pop.width(),
            _ => self.declared_width(),
        }
    }

    /// Fixed stack effect, or `None` for the call/return family whose
    /// effect depends on the callee.
    pub const fn stack_effect(self) -> Option<StackEffect> {
        let effect = match self {
            Self::IAdd | Self::ISub | Self::IMul | Self::IDiv => StackEffect::new(2, 1),
            Self::FAdd | Self::FSub | Self::FMul | Self::FDiv => StackEffect::new(2, 1),
            Self::Or | Self::And => StackEffect::new(2, 1),
            Self::INeg | Self::FNeg | Self::Not => StackEffect::new(1, 1),
            Self::I2F | Self::F2I | Self::I2S | Self::F2S | Self::V2S | Self::F2V => {
                StackEffect::new(1, 1)
            }
            Self::IEq | Self::INeq | Self::ILt | Self::ILe | Self::IGt | Self::IGe => {
                StackEffect::new(2, 1)
            }
            Self::FEq | Self::FNeq | Self::FLt | Self::FLe | Self::FGt | Self::FGe => {
                StackEffect::new(2, 1)
            }
            Self::IsNil => StackEffect::new(1, 1),
            Self::Br => StackEffect::new(0, 0),
            Self::Brt | Self::Brf => StackEffect::new(1, 0),
            Self::IConst | Self::FConst | Self::SConst => StackEffect::new(0, 1),
            Self::ILoad | Self::FLoad | Self::VLoad | Self::SLoad => StackEffect::new(0, 1),
            Self::Store => StackEffect::new(1, 0),
            Self::Vector => StackEffect::new(1, 1),
            Self::LoadIndex => StackEffect::new(2, 1),
            Self::StoreIndex => StackEffect::new(3, 0),
            Self::Nil => StackEffect::new(0, 1),
            Self::Pop => StackEffect::new(1, 0),
            Self::IPrint | Self::FPrint | Self::BPrint | Self::SPrint | Self::VPrint => {
                StackEffect::new(1, 0)
            }
            Self::Halt | Self::Nop => StackEffect::new(0, 0),
            Self::Call | Self::RetV | Self::Ret => return None,
        };
        Some(effect)
    }

    /// Is this a branch instruction
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::Br | Self::Brt | Self::Brf)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
