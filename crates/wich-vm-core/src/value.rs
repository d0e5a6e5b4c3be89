//! Operand stack cells
//!
//! The bytecode itself is untyped: the opcode that consumes a cell decides
//! how to read it. Cells here carry a tag anyway so a producer/consumer
//! disagreement surfaces as a fault instead of garbage.
//!
//! `Nil` stands for the all-zero cell. Zero-initialised locals hold it, and
//! numeric consumers read it as `0`, `0.0` or `false` the way a zeroed
//! untagged slot would read.

use std::fmt;
use std::sync::Arc;

use wich_vm_gc::VectorHandle;

/// Type tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Nil / zero cell
    Nil,
    /// 32-bit signed integer
    Int,
    /// Single precision float
    Float,
    /// Boolean
    Bool,
    /// String
    Str,
    /// Vector handle
    Vector,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nil => "nil",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "string",
            Self::Vector => "vector",
        })
    }
}

/// A stack or local cell
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Nil / zero cell
    #[default]
    Nil,
    /// 32-bit signed integer
    Int(i32),
    /// Single precision float
    Float(f32),
    /// Boolean
    Bool(bool),
    /// String (constant pool entry or runtime conversion result)
    Str(Arc<str>),
    /// Handle to a heap-owned vector
    Vector(VectorHandle),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::Str(s.into())
    }

    /// Type tag
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Nil => ValueKind::Nil,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
            Self::Str(_) => ValueKind::Str,
            Self::Vector(_) => ValueKind::Vector,
        }
    }

    /// Is this the nil cell
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Read as an integer; nil reads as 0
    #[inline]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Nil => Some(0),
            _ => None,
        }
    }

    /// Read as a float; nil reads as 0.0
    #[inline]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Nil => Some(0.0),
            _ => None,
        }
    }

    /// Read as a boolean; nil reads as false
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Nil => Some(false),
            _ => None,
        }
    }

    /// Read as a string
    #[inline]
    pub fn as_str(&self) -> Option<&Arc<str>> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read as a vector handle
    #[inline]
    pub fn as_vector(&self) -> Option<VectorHandle> {
        match self {
            Self::Vector(h) => Some(*h),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Vector(h) => write!(f, "{}", h),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
