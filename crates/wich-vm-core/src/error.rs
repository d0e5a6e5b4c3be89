//! VM error types
//!
//! Every fault the engine can raise. Faults are split in two classes:
//! recoverable ones (bounds violations) that [`crate::FaultMode::Lenient`]
//! skips, and fatal ones that always end the run.

use std::fmt;
use thiserror::Error;

use wich_vm_bytecode::BytecodeError;
use wich_vm_gc::HeapError;

use crate::value::ValueKind;

/// Which stack a bounds violation hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    /// The operand stack
    Operand,
    /// The call stack
    Call,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operand => f.write_str("operand"),
            Self::Call => f.write_str("call"),
        }
    }
}

/// VM execution errors
#[derive(Debug, Error)]
pub enum VmError {
    /// Stack index out of range
    #[error("{stack} stack index {index} out of range 0..{capacity} at ip={address}")]
    StackBounds {
        /// Stack that overflowed or underflowed
        stack: StackKind,
        /// Index the access would have used
        index: isize,
        /// Stack capacity
        capacity: usize,
        /// Faulting instruction
        address: usize,
    },

    /// Opcode byte not in the catalogue
    #[error("invalid opcode: {value} at ip={address}")]
    UnknownOpcode {
        /// Offending byte
        value: u8,
        /// Address of the byte
        address: usize,
    },

    /// Operand runs past the end of the code
    #[error("truncated {width}-byte operand at {address}")]
    TruncatedOperand {
        /// Operand address
        address: usize,
        /// Operand width
        width: usize,
    },

    /// Integer division by zero
    #[error("integer division by zero at ip={address}")]
    DivisionByZero {
        /// Faulting instruction
        address: usize,
    },

    /// A cell was consumed as the wrong type
    #[error("type mismatch at ip={address}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type the instruction consumes
        expected: ValueKind,
        /// Type that was on the stack
        found: ValueKind,
        /// Faulting instruction
        address: usize,
    },

    /// Local slot index beyond the frame
    #[error("local {index} out of range 0..{frame_size} at ip={address}")]
    InvalidLocal {
        /// Requested slot
        index: u16,
        /// Slots in the current frame
        frame_size: usize,
        /// Faulting instruction
        address: usize,
    },

    /// CALL operand does not name a function
    #[error("no function at index {index} (ip={address})")]
    InvalidFunction {
        /// Requested function index
        index: u16,
        /// Faulting instruction
        address: usize,
    },

    /// SCONST operand does not name a string
    #[error("no string constant at index {index} (ip={address})")]
    InvalidStringIndex {
        /// Requested string index
        index: u16,
        /// Faulting instruction
        address: usize,
    },

    /// Branch lands outside the code buffer
    #[error("branch target {target} outside code at ip={address}")]
    InvalidBranchTarget {
        /// Computed target
        target: isize,
        /// Branch instruction
        address: usize,
    },

    /// VECTOR popped a negative length
    #[error("invalid vector length {length} at ip={address}")]
    InvalidVectorLength {
        /// Popped length
        length: i32,
        /// Faulting instruction
        address: usize,
    },

    /// Vector element index out of range
    #[error("index {index} out of bounds 0..{len} at ip={address}")]
    VectorIndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Vector length
        len: usize,
        /// Faulting instruction
        address: usize,
    },

    /// Any other heap failure
    #[error("vector heap error at ip={address}: {source}")]
    Heap {
        /// Underlying heap error
        #[source]
        source: HeapError,
        /// Faulting instruction
        address: usize,
    },

    /// Bytecode error not covered by a dedicated variant
    #[error("bytecode error: {0}")]
    Bytecode(BytecodeError),

    /// No `main` function in the program
    #[error("no entry function `main`")]
    MissingEntry,

    /// The instruction budget ran out
    #[error("instruction budget exhausted after {executed} instructions")]
    BudgetExhausted {
        /// Instructions executed
        executed: u64,
    },

    /// Execution was interrupted (timeout/cancellation)
    #[error("execution interrupted")]
    Interrupted,

    /// The VM already stopped on a fatal fault
    #[error("vm cannot resume after a fatal fault")]
    NotRunnable,

    /// Writing output or diagnostics failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VmError {
    /// Bounds violations can be skipped in lenient mode; everything else is fatal
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StackBounds { .. } | Self::VectorIndexOutOfBounds { .. }
        )
    }

    /// Address of the faulting instruction, when there is one
    pub fn address(&self) -> Option<usize> {
        match self {
            Self::StackBounds { address, .. }
            | Self::UnknownOpcode { address, .. }
            | Self::TruncatedOperand { address, .. }
            | Self::DivisionByZero { address }
            | Self::TypeMismatch { address, .. }
            | Self::InvalidLocal { address, .. }
            | Self::InvalidFunction { address, .. }
            | Self::InvalidStringIndex { address, .. }
            | Self::InvalidBranchTarget { address, .. }
            | Self::InvalidVectorLength { address, .. }
            | Self::VectorIndexOutOfBounds { address, .. }
            | Self::Heap { address, .. } => Some(*address),
            _ => None,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: ValueKind, found: ValueKind, address: usize) -> Self {
        Self::TypeMismatch {
            expected,
            found,
            address,
        }
    }

    /// Attach an address to a heap error
    pub fn heap(source: HeapError, address: usize) -> Self {
        match source {
            HeapError::IndexOutOfBounds { index, len } => Self::VectorIndexOutOfBounds {
                index: index as i64,
                len,
                address,
            },
            source => Self::Heap { source, address },
        }
    }
}

impl From<BytecodeError> for VmError {
    fn from(e: BytecodeError) -> Self {
        match e {
            BytecodeError::InvalidOpcode { value, address } => {
                Self::UnknownOpcode { value, address }
            }
            BytecodeError::UnexpectedEnd { address, width } => {
                Self::TruncatedOperand { address, width }
            }
            other => Self::Bytecode(other),
        }
    }
}

/// Result type for VM operations
pub type VmResult<T> = std::result::Result<T, VmError>;
