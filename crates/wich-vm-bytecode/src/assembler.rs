//! Code emitter
//!
//! A small builder that writes correctly encoded instructions, with labels
//! for forward branches. It does not parse assembly text; loaders and tests
//! drive it directly.

use crate::error::{BytecodeError, Result};
use crate::instruction::{Opcode, PopEncoding};
use crate::operand::{BranchOffset, FunctionIndex, LocalIndex, StringIndex};

/// A branch target inside a [`CodeBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug)]
struct Fixup {
    branch_address: usize,
    label: Label,
}

/// Builder for a code buffer
#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    pop: PopEncoding,
}

impl CodeBuilder {
    /// Create an empty builder emitting bare `POP`
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty builder with the given `POP` encoding
    pub fn with_pop_encoding(pop: PopEncoding) -> Self {
        Self {
            pop,
            ..Self::default()
        }
    }

    /// Current address (where the next opcode will be written)
    #[inline]
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Emit an operand-less opcode.
    ///
    /// Emitting `POP` through this method honours the builder's encoding.
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.code.push(opcode.to_byte());
        if opcode == Opcode::Pop && self.pop == PopEncoding::Padded {
            self.code.push(0);
        }
        self
    }

    /// Emit a raw byte (used to produce deliberately malformed code)
    pub fn raw(&mut self, byte: u8) -> &mut Self {
        self.code.push(byte);
        self
    }

    /// `ICONST value`
    pub fn iconst(&mut self, value: i32) -> &mut Self {
        self.code.push(Opcode::IConst.to_byte());
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// `FCONST value`
    pub fn fconst(&mut self, value: f32) -> &mut Self {
        self.code.push(Opcode::FConst.to_byte());
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// `SCONST index`
    pub fn sconst(&mut self, index: StringIndex) -> &mut Self {
        self.with_u16(Opcode::SConst, index.index())
    }

    /// One of `ILOAD`/`FLOAD`/`VLOAD`/`SLOAD`/`STORE`
    pub fn local(&mut self, opcode: Opcode, index: u16) -> &mut Self {
        debug_assert!(matches!(
            opcode,
            Opcode::ILoad | Opcode::FLoad | Opcode::VLoad | Opcode::SLoad | Opcode::Store
        ));
        self.with_u16(opcode, LocalIndex::new(index).index())
    }

    /// `CALL index`
    pub fn call(&mut self, function: FunctionIndex) -> &mut Self {
        self.with_u16(Opcode::Call, function.index())
    }

    /// Branch with an explicit offset relative to the branch opcode
    pub fn branch_offset(&mut self, opcode: Opcode, offset: i16) -> &mut Self {
        debug_assert!(opcode.is_branch());
        self.code.push(opcode.to_byte());
        self.code.extend_from_slice(&BranchOffset::new(offset).offset().to_le_bytes());
        self
    }

    /// Branch to a label, resolved in [`CodeBuilder::finish`]
    pub fn branch(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        self.fixups.push(Fixup {
            branch_address: self.here(),
            label,
        });
        self.branch_offset(opcode, 0)
    }

    /// Create an unbound label
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current address
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.here());
        self
    }

    /// Resolve branches and return the code buffer
    pub fn finish(mut self) -> Result<Vec<u8>> {
        for fixup in &self.fixups {
            let target = self.labels[fixup.label.0]
                .ok_or(BytecodeError::UndefinedLabel(fixup.label.0))?;
            let offset = BranchOffset::between(fixup.branch_address, target).ok_or(
                BytecodeError::BranchOutOfRange {
                    from: fixup.branch_address,
                    to: target,
                },
            )?;
            let at = fixup.branch_address + 1;
            self.code[at..at + 2].copy_from_slice(&offset.offset().to_le_bytes());
        }
        Ok(self.code)
    }

    fn with_u16(&mut self, opcode: Opcode, value: u16) -> &mut Self {
        self.code.push(opcode.to_byte());
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }
}
