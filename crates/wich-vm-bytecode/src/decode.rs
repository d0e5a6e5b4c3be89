//! Instruction decoding
//!
//! Turns the byte at an address into an opcode plus its typed operand.
//! Shared by the interpreter, the tracer and the disassembler so that all
//! three agree on instruction boundaries.

use std::fmt;

use crate::error::{BytecodeError, Result};
use crate::instruction::{Opcode, PopEncoding};
use crate::operand::{
    BranchOffset, FunctionIndex, LocalIndex, StringIndex, read_f32, read_i16, read_i32, read_u16,
};

/// Decoded operand of a single instruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Ignored padding byte (padded `POP`)
    Padding(u8),
    /// 32-bit integer immediate
    Int(i32),
    /// 32-bit float immediate
    Float(f32),
    /// String pool index
    String(StringIndex),
    /// Local slot index
    Local(LocalIndex),
    /// Function table index
    Function(FunctionIndex),
    /// Relative branch offset
    Branch(BranchOffset),
}

impl Operand {
    /// Operand as a signed number, for listings
    pub fn as_listing(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Padding(b) => Some(b.to_string()),
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) => Some(format!("{:?}", v)),
            Self::String(i) => Some(i.index().to_string()),
            Self::Local(i) => Some(i.index().to_string()),
            Self::Function(i) => Some(i.index().to_string()),
            Self::Branch(o) => Some(o.offset().to_string()),
        }
    }
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoded {
    /// Address of the opcode byte
    pub address: usize,
    /// The opcode
    pub opcode: Opcode,
    /// The operand
    pub operand: Operand,
}

impl Decoded {
    /// Encoded length in bytes (opcode plus operand)
    #[inline]
    pub fn len(&self, pop: PopEncoding) -> usize {
        1 + self.opcode.operand_width(pop)
    }

    /// Address of the following instruction
    #[inline]
    pub fn next_address(&self, pop: PopEncoding) -> usize {
        self.address + self.len(pop)
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand.as_listing() {
            Some(operand) => write!(
                f,
                "{:04}:  {:<15}{:<10}",
                self.address,
                self.opcode.name(),
                operand
            ),
            None => write!(f, "{:04}:  {:<25}", self.address, self.opcode.name()),
        }
    }
}

/// Decode the instruction whose opcode byte sits at `address`
pub fn decode_at(code: &[u8], address: usize, pop: PopEncoding) -> Result<Decoded> {
    let byte = *code.get(address).ok_or(BytecodeError::UnexpectedEnd { address, width: 1 })?;
    let opcode = Opcode::from_byte(byte).ok_or(BytecodeError::InvalidOpcode {
        value: byte,
        address,
    })?;
    let at = address + 1;

    let operand = match opcode {
        Opcode::Br | Opcode::Brt | Opcode::Brf => {
            Operand::Branch(BranchOffset::new(read_i16(code, at)?))
        }
        Opcode::IConst => Operand::Int(read_i32(code, at)?),
        Opcode::FConst => Operand::Float(read_f32(code, at)?),
        Opcode::SConst => Operand::String(StringIndex::new(read_u16(code, at)?)),
        Opcode::ILoad | Opcode::FLoad | Opcode::VLoad | Opcode::SLoad | Opcode::Store => {
            Operand::Local(LocalIndex::new(read_u16(code, at)?))
        }
        Opcode::Call => Operand::Function(FunctionIndex::new(read_u16(code, at)?)),
        Opcode::Pop if pop == PopEncoding::Padded => {
            let pad = *code
                .get(at)
                .ok_or(BytecodeError::UnexpectedEnd { address: at, width: 1 })?;
            Operand::Padding(pad)
        }
        _ => Operand::None,
    };

    Ok(Decoded {
        address,
        opcode,
        operand,
    })
}

/// Iterator over the instructions of a code buffer
#[derive(Debug)]
pub struct Instructions<'a> {
    code: &'a [u8],
    address: usize,
    pop: PopEncoding,
    failed: bool,
}

impl<'a> Instructions<'a> {
    /// Walk `code` from the first byte
    pub fn new(code: &'a [u8], pop: PopEncoding) -> Self {
        Self {
            code,
            address: 0,
            pop,
            failed: false,
        }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Result<Decoded>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.address >= self.code.len() {
            return None;
        }
        match decode_at(self.code, self.address, self.pop) {
            Ok(decoded) => {
                self.address = decoded.next_address(self.pop);
                Some(Ok(decoded))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
