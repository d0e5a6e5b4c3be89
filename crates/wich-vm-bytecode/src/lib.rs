//! # Wich VM Bytecode
//!
//! This crate defines the bytecode consumed by the Wich stack machine.
//!
//! ## Design Principles
//!
//! - **Stack-based**: Instructions operate on an implicit operand stack
//! - **Fixed-width operands**: Each opcode carries 0, 1, 2 or 4 operand bytes
//! - **Little-endian**: Integer operands are two's-complement, floats are raw IEEE-754 bits
//! - **Immutable programs**: A [`Program`] never changes once built

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod assembler;
pub mod decode;
pub mod error;
pub mod function;
pub mod instruction;
pub mod operand;
pub mod program;

pub use assembler::{CodeBuilder, Label};
pub use decode::{Decoded, Operand, decode_at};
pub use error::BytecodeError;
pub use function::{FunctionDescriptor, ReturnType};
pub use instruction::{Opcode, PopEncoding, StackEffect};
pub use operand::{BranchOffset, FunctionIndex, LocalIndex, StringIndex};
pub use program::{Program, ProgramBuilder};

/// Default capacity of a program's function table
pub const MAX_FUNCTIONS: usize = 1000;

/// Number of string constants a 16-bit string index can address
pub const MAX_STRINGS: usize = u16::MAX as usize + 1;

/// Name of the function the VM calls implicitly before the first fetch
pub const ENTRY_FUNCTION: &str = "main";
