//! Function descriptors

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{BytecodeError, Result};

/// Declared return type of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReturnType {
    /// No value
    Void = 0,
    /// 32-bit integer
    Int = 1,
    /// Float
    Float = 2,
    /// Boolean
    Bool = 3,
    /// String
    String = 4,
    /// Vector
    Vector = 5,
}

impl ReturnType {
    /// Decode a wire tag
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Void),
            1 => Ok(Self::Int),
            2 => Ok(Self::Float),
            3 => Ok(Self::Bool),
            4 => Ok(Self::String),
            5 => Ok(Self::Vector),
            other => Err(BytecodeError::InvalidTypeTag(other)),
        }
    }

    /// Wire tag
    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Function metadata read by the call protocol.
///
/// Created once at load time and never mutated during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Function name
    pub name: Arc<str>,
    /// Declared return type
    pub return_type: ReturnType,
    /// Entry address (byte offset into the code buffer)
    pub address: u32,
    /// Number of arguments
    pub nargs: u16,
    /// Number of locals beyond the arguments
    pub nlocals: u16,
}

impl FunctionDescriptor {
    /// Number of slots an activation record of this function holds
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.nargs as usize + self.nlocals as usize
    }

    /// Entry address as a code offset
    #[inline]
    pub fn entry(&self) -> usize {
        self.address as usize
    }
}
