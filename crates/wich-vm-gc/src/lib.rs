//! # Wich VM Vector Heap
//!
//! Owns the dynamically sized float arrays that Wich programs manipulate.
//!
//! ## Design
//!
//! - **Opaque handles**: The VM only ever sees [`VectorHandle`] values
//! - **Bounds-checked access**: Every element read/write is checked here, not in the VM
//! - **Pluggable**: The VM talks to any [`VectorHeap`]; [`VectorArena`] is the default

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod arena;
pub mod error;
pub mod heap;

pub use arena::VectorArena;
pub use error::{HeapError, HeapResult};
pub use heap::{HeapConfig, HeapStats, VectorHandle, VectorHeap};
