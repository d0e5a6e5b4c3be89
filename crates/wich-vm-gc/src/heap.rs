//! The contract between the VM and whoever owns vector storage

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::HeapResult;

/// Opaque reference to a heap-owned vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct VectorHandle(pub u32);

impl VectorHandle {
    /// Raw handle value
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Vector storage used by the VM.
///
/// The VM never frees vectors and makes no assumption about layout or
/// lifetime; it only forwards handles it was given by [`VectorHeap::allocate`].
pub trait VectorHeap: Send {
    /// Create a zero-filled vector of `len` elements
    fn allocate(&mut self, len: usize) -> HeapResult<VectorHandle>;

    /// Read element `index`
    fn get(&self, handle: VectorHandle, index: usize) -> HeapResult<f64>;

    /// Write element `index`
    fn set(&mut self, handle: VectorHandle, index: usize, value: f64) -> HeapResult<()>;

    /// Length fixed at creation
    fn length(&self, handle: VectorHandle) -> HeapResult<usize>;

    /// All elements, for printing and conversion
    fn elements(&self, handle: VectorHandle) -> HeapResult<&[f64]>;
}

/// Vector heap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Maximum number of live elements across all vectors (default: 16M)
    pub max_elements: usize,
    /// Initial slot capacity (default: 64)
    pub initial_slots: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            max_elements: 16 * 1024 * 1024,
            initial_slots: 64,
        }
    }
}

/// Heap statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Vectors currently live
    pub live_vectors: usize,
    /// Elements currently live
    pub live_elements: usize,
    /// Vectors ever allocated
    pub total_allocations: u64,
}
