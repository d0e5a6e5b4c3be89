//! Bytecode operands
//!
//! All multi-byte operands are little-endian. Integers are two's-complement.

use serde::{Deserialize, Serialize};

use crate::error::{BytecodeError, Result};

/// Index into the string constant pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StringIndex(pub u16);

impl StringIndex {
    /// Create a new string index
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Get index value
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

/// Index into the locals of the current activation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct LocalIndex(pub u16);

impl LocalIndex {
    /// Create a new local index
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Get index value
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

/// Index into the function table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FunctionIndex(pub u16);

impl FunctionIndex {
    /// Create a new function index
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Get index value
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

/// Branch offset, relative to the address of the branching opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BranchOffset(pub i16);

impl BranchOffset {
    /// Create a new branch offset
    #[inline]
    pub const fn new(offset: i16) -> Self {
        Self(offset)
    }

    /// Get offset value
    #[inline]
    pub const fn offset(self) -> i16 {
        self.0
    }

    /// Resolve against the address of the branch opcode.
    ///
    /// Returns `None` when the target would be negative.
    #[inline]
    pub fn target(self, opcode_address: usize) -> Option<usize> {
        opcode_address.checked_add_signed(self.0 as isize)
    }

    /// Offset that reaches `to` from a branch opcode at `from`
    pub fn between(from: usize, to: usize) -> Option<Self> {
        let delta = to as i64 - from as i64;
        i16::try_from(delta).ok().map(Self)
    }
}

fn operand_bytes<const N: usize>(code: &[u8], address: usize) -> Result<[u8; N]> {
    code.get(address..address + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(BytecodeError::UnexpectedEnd { address, width: N })
}

/// Read a little-endian signed 16-bit operand
#[inline]
pub fn read_i16(code: &[u8], address: usize) -> Result<i16> {
    operand_bytes::<2>(code, address).map(i16::from_le_bytes)
}

/// Read an unsigned 16-bit operand (table indexes)
#[inline]
pub fn read_u16(code: &[u8], address: usize) -> Result<u16> {
    operand_bytes::<2>(code, address).map(u16::from_le_bytes)
}

/// Read a little-endian signed 32-bit operand
#[inline]
pub fn read_i32(code: &[u8], address: usize) -> Result<i32> {
    operand_bytes::<4>(code, address).map(i32::from_le_bytes)
}

/// Read a raw IEEE-754 single precision bit pattern
#[inline]
pub fn read_f32(code: &[u8], address: usize) -> Result<f32> {
    operand_bytes::<4>(code, address).map(f32::from_le_bytes)
}
