//! # Wich VM Core
//!
//! Execution engine for Wich bytecode.
//!
//! ## Design Principles
//!
//! - **Stack-based**: One operand stack shared by all frames, one call stack of activation records
//! - **Tagged cells**: Every stack slot knows its type; consumers check it
//! - **Explicit instances**: A [`Vm`] owns all of its state, so independent runs never interfere
//! - **Uniform faults**: Every unsafe access yields a [`VmError`]; [`FaultMode`] decides what
//!   aborts

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod format;
pub mod frame;
pub mod interpreter;
pub mod output;
pub mod stack;
pub mod trace;
pub mod value;

pub use config::{FaultMode, VmConfig};
pub use error::{StackKind, VmError, VmResult};
pub use frame::{ActivationRecord, CallStack};
pub use interpreter::{ExitReason, Registers, Vm};
pub use output::SharedOutput;
pub use stack::OperandStack;
pub use trace::{TraceConfig, TraceMode};
pub use value::{Value, ValueKind};

/// Default operand stack capacity
pub const MAX_OPND_STACK: usize = 1000;

/// Default call stack capacity
pub const MAX_CALL_STACK: usize = 1000;
