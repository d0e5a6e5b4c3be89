//! Activation records and the call stack

use wich_vm_bytecode::{FunctionDescriptor, FunctionIndex};

use crate::error::{StackKind, VmError, VmResult};
use crate::value::Value;

/// Per-call storage for arguments, locals and the return address
#[derive(Debug, Clone)]
pub struct ActivationRecord {
    /// Function being executed
    pub function: FunctionIndex,
    /// Address execution resumes at in the caller
    pub return_address: usize,
    /// Arguments followed by locals; length is exactly `nargs + nlocals`
    pub locals: Vec<Value>,
    /// Operand stack depth once the arguments were consumed
    pub operand_base: usize,
    /// Caller's frame pointer register
    pub saved_fp: i32,
}

impl ActivationRecord {
    /// Build a record for `descriptor` from its arguments (in push order).
    ///
    /// Argument slots come first, the remaining `nlocals` slots start as nil.
    pub fn new(
        function: FunctionIndex,
        descriptor: &FunctionDescriptor,
        args: Vec<Value>,
        return_address: usize,
        operand_base: usize,
        saved_fp: i32,
    ) -> Self {
        let mut locals = args;
        locals.resize(descriptor.frame_size(), Value::Nil);
        Self {
            function,
            return_address,
            locals,
            operand_base,
            saved_fp,
        }
    }
}

/// Bounded stack of activation records
#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<ActivationRecord>,
    capacity: usize,
}

impl CallStack {
    /// Create a call stack that holds at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Number of active records
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// No active record
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Top index, `-1` when empty
    #[inline]
    pub fn top(&self) -> isize {
        self.frames.len() as isize - 1
    }

    /// Capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records from outermost to innermost
    #[inline]
    pub fn frames(&self) -> &[ActivationRecord] {
        &self.frames
    }

    /// The innermost record
    #[inline]
    pub fn current(&self) -> Option<&ActivationRecord> {
        self.frames.last()
    }

    /// The innermost record, mutably
    #[inline]
    pub fn current_mut(&mut self) -> Option<&mut ActivationRecord> {
        self.frames.last_mut()
    }

    fn bounds(&self, index: isize, address: usize) -> VmError {
        VmError::StackBounds {
            stack: StackKind::Call,
            index,
            capacity: self.capacity,
            address,
        }
    }

    /// Fail if another record would not fit
    pub fn check_room(&self, address: usize) -> VmResult<()> {
        if self.frames.len() >= self.capacity {
            return Err(self.bounds(self.frames.len() as isize, address));
        }
        Ok(())
    }

    /// Push a record
    pub fn push(&mut self, record: ActivationRecord, address: usize) -> VmResult<()> {
        self.check_room(address)?;
        self.frames.push(record);
        Ok(())
    }

    /// Pop the innermost record
    pub fn pop(&mut self, address: usize) -> VmResult<ActivationRecord> {
        self.frames.pop().ok_or_else(|| self.bounds(-1, address))
    }
}
