//! Vector heap errors

use thiserror::Error;

use crate::heap::VectorHandle;

/// Errors reported by a [`crate::VectorHeap`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// Handle does not name a live vector
    #[error("invalid vector handle {0}")]
    InvalidHandle(VectorHandle),

    /// Element index outside `0..len`
    #[error("index {index} out of bounds 0..{len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Vector length
        len: usize,
    },

    /// Allocation would exceed the configured element budget
    #[error("vector heap exhausted: {requested} elements requested, {available} available")]
    HeapExhausted {
        /// Elements requested
        requested: usize,
        /// Elements still available
        available: usize,
    },
}

/// Result type for heap operations
pub type HeapResult<T> = std::result::Result<T, HeapError>;
