//! Bytecode errors

use thiserror::Error;

/// Errors raised while building or decoding bytecode
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BytecodeError {
    /// Opcode byte not present in the catalogue
    #[error("invalid opcode: {value} at ip={address}")]
    InvalidOpcode {
        /// Offending byte
        value: u8,
        /// Address of the byte
        address: usize,
    },

    /// Operand bytes run past the end of the code buffer
    #[error("unexpected end of bytecode: operand at {address} needs {width} bytes")]
    UnexpectedEnd {
        /// Address of the operand
        address: usize,
        /// Operand width in bytes
        width: usize,
    },

    /// The function table is full
    #[error("exceeded max functions {capacity}")]
    FunctionTableExhausted {
        /// Table capacity
        capacity: usize,
    },

    /// The string constant pool is full
    #[error("exceeded max strings {capacity}")]
    StringPoolExhausted {
        /// Pool capacity
        capacity: usize,
    },

    /// Unknown return-type tag in a function descriptor
    #[error("invalid return type tag: {0}")]
    InvalidTypeTag(u8),

    /// A label was referenced but never bound
    #[error("label {0} referenced but never bound")]
    UndefinedLabel(usize),

    /// A branch target does not fit in a signed 16-bit offset
    #[error("branch from {from} to {to} does not fit in 16 bits")]
    BranchOutOfRange {
        /// Address of the branch opcode
        from: usize,
        /// Target address
        to: usize,
    },
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
