//! Bounded operand stack

use wich_vm_bytecode::StackEffect;

use crate::error::{StackKind, VmError, VmResult};
use crate::value::Value;

/// LIFO sequence of cells with a fixed capacity.
///
/// The top index is `len - 1`, so an empty stack reports `-1`.
#[derive(Debug, Clone)]
pub struct OperandStack {
    cells: Vec<Value>,
    capacity: usize,
}

impl OperandStack {
    /// Create a stack that holds at most `capacity` cells
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Number of cells
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Is the stack empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Top index, `-1` when empty
    #[inline]
    pub fn top(&self) -> isize {
        self.cells.len() as isize - 1
    }

    /// Cells from bottom to top
    #[inline]
    pub fn as_slice(&self) -> &[Value] {
        &self.cells
    }

    fn bounds(&self, index: isize, address: usize) -> VmError {
        VmError::StackBounds {
            stack: StackKind::Operand,
            index,
            capacity: self.capacity,
            address,
        }
    }

    /// Check that an instruction with the given effect fits, before it runs
    pub fn check_effect(&self, effect: StackEffect, address: usize) -> VmResult<()> {
        let pops = effect.pops as usize;
        if self.cells.len() < pops {
            return Err(self.bounds(self.top() - pops as isize + 1, address));
        }
        let after = self.cells.len() - pops + effect.pushes as usize;
        if after > self.capacity {
            return Err(self.bounds(after as isize - 1, address));
        }
        Ok(())
    }

    /// Push a cell
    #[inline]
    pub fn push(&mut self, value: Value, address: usize) -> VmResult<()> {
        if self.cells.len() >= self.capacity {
            return Err(self.bounds(self.cells.len() as isize, address));
        }
        self.cells.push(value);
        Ok(())
    }

    /// Pop the top cell
    #[inline]
    pub fn pop(&mut self, address: usize) -> VmResult<Value> {
        self.cells.pop().ok_or_else(|| self.bounds(-1, address))
    }

    /// Cell `depth` positions below the top (0 = top), without popping
    #[inline]
    pub fn peek(&self, depth: usize, address: usize) -> VmResult<&Value> {
        let top = self.top();
        self.cells
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.cells.get(i))
            .ok_or_else(|| self.bounds(top - depth as isize, address))
    }

    /// Pop `n` cells, returned in push order (bottom-most first)
    pub fn pop_n(&mut self, n: usize, address: usize) -> VmResult<Vec<Value>> {
        let start = self
            .cells
            .len()
            .checked_sub(n)
            .ok_or_else(|| self.bounds(self.top() - n as isize + 1, address))?;
        Ok(self.cells.split_off(start))
    }

    /// Drop `n` cells that were already inspected with [`OperandStack::peek`]
    pub fn discard(&mut self, n: usize) {
        let keep = self.cells.len().saturating_sub(n);
        self.cells.truncate(keep);
    }

    /// Replace the top `pops` cells with `value`, after [`Self::check_effect`] passed
    #[inline]
    pub(crate) fn replace(&mut self, pops: usize, value: Value) {
        self.discard(pops);
        self.cells.push(value);
    }

    /// Shrink the stack to `len` cells
    pub fn truncate(&mut self, len: usize) {
        self.cells.truncate(len);
    }
}
