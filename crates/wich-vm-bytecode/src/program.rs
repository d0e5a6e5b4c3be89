//! Immutable program image
//!
//! A [`Program`] is what the loader hands to the VM: a code buffer, the
//! string constant pool and the function table. Nothing in the engine
//! mutates it, so one program can back any number of concurrent runs.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::decode::{Decoded, Instructions};
use crate::error::{BytecodeError, Result};
use crate::function::{FunctionDescriptor, ReturnType};
use crate::instruction::PopEncoding;
use crate::operand::{FunctionIndex, StringIndex};
use crate::{ENTRY_FUNCTION, MAX_FUNCTIONS, MAX_STRINGS};

/// A loaded program
#[derive(Debug, Clone)]
pub struct Program {
    code: Arc<[u8]>,
    strings: Vec<Arc<str>>,
    functions: Vec<FunctionDescriptor>,
    by_name: FxHashMap<Arc<str>, FunctionIndex>,
}

impl Program {
    /// Create a new program builder
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::new()
    }

    /// The code buffer
    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Size of the code buffer in bytes
    #[inline]
    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    /// String constant by index
    #[inline]
    pub fn string(&self, index: StringIndex) -> Option<&Arc<str>> {
        self.strings.get(index.index() as usize)
    }

    /// All string constants
    pub fn strings(&self) -> &[Arc<str>] {
        &self.strings
    }

    /// Function descriptor by index
    #[inline]
    pub fn function(&self, index: FunctionIndex) -> Option<&FunctionDescriptor> {
        self.functions.get(index.index() as usize)
    }

    /// All function descriptors
    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// Look up a function by name. The first definition of a name wins.
    pub fn function_by_name(&self, name: &str) -> Option<FunctionIndex> {
        self.by_name.get(name).copied()
    }

    /// Index of the entry function, `main`
    pub fn entry(&self) -> Option<FunctionIndex> {
        self.function_by_name(ENTRY_FUNCTION)
    }

    /// Decode the whole code buffer
    pub fn instructions(&self, pop: PopEncoding) -> Instructions<'_> {
        Instructions::new(&self.code, pop)
    }

    /// Render a listing of the code buffer, one instruction per line
    pub fn disassemble(&self, pop: PopEncoding) -> Result<String> {
        let mut out = String::new();
        for decoded in self.instructions(pop) {
            let decoded: Decoded = decoded?;
            if let Some(f) = self
                .functions
                .iter()
                .find(|f| f.entry() == decoded.address)
            {
                out.push_str(&format!("{}:\n", f.name));
            }
            out.push_str(decoded.to_string().trim_end());
            out.push('\n');
        }
        Ok(out)
    }
}

/// Builder used by loaders to assemble a [`Program`]
#[derive(Debug)]
pub struct ProgramBuilder {
    code: Vec<u8>,
    strings: Vec<Arc<str>>,
    functions: Vec<FunctionDescriptor>,
    by_name: FxHashMap<Arc<str>, FunctionIndex>,
    function_capacity: usize,
    string_capacity: usize,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    /// Create a builder with the default function table capacity
    pub fn new() -> Self {
        Self::with_function_capacity(MAX_FUNCTIONS)
    }

    /// Create a builder whose function table holds at most `capacity` entries
    pub fn with_function_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::new(),
            strings: Vec::new(),
            functions: Vec::new(),
            by_name: FxHashMap::default(),
            function_capacity: capacity.min(u16::MAX as usize + 1),
            string_capacity: MAX_STRINGS,
        }
    }

    /// Limit the string constant pool to `capacity` entries
    pub fn with_string_capacity(mut self, capacity: usize) -> Self {
        self.string_capacity = capacity.min(MAX_STRINGS);
        self
    }

    /// Set the code buffer
    pub fn code(mut self, code: impl Into<Vec<u8>>) -> Self {
        self.code = code.into();
        self
    }

    /// Append a string constant, returns its index.
    ///
    /// Fails with [`BytecodeError::StringPoolExhausted`] once the pool is full.
    pub fn add_string(&mut self, s: impl Into<Arc<str>>) -> Result<StringIndex> {
        if self.strings.len() >= self.string_capacity {
            return Err(BytecodeError::StringPoolExhausted {
                capacity: self.string_capacity,
            });
        }
        let idx = StringIndex::new(self.strings.len() as u16);
        self.strings.push(s.into());
        Ok(idx)
    }

    /// Define a function.
    ///
    /// Fails with [`BytecodeError::FunctionTableExhausted`] once the table is
    /// full; the table is left untouched in that case.
    pub fn define_function(
        &mut self,
        name: impl Into<Arc<str>>,
        return_type: ReturnType,
        address: u32,
        nargs: u16,
        nlocals: u16,
    ) -> Result<FunctionIndex> {
        if self.functions.len() >= self.function_capacity {
            return Err(BytecodeError::FunctionTableExhausted {
                capacity: self.function_capacity,
            });
        }
        let name = name.into();
        let idx = FunctionIndex::new(self.functions.len() as u16);
        self.by_name.entry(Arc::clone(&name)).or_insert(idx);
        self.functions.push(FunctionDescriptor {
            name,
            return_type,
            address,
            nargs,
            nlocals,
        });
        Ok(idx)
    }

    /// Define a function from a raw return-type tag
    pub fn define_function_tagged(
        &mut self,
        name: impl Into<Arc<str>>,
        return_tag: u8,
        address: u32,
        nargs: u16,
        nlocals: u16,
    ) -> Result<FunctionIndex> {
        let return_type = ReturnType::from_tag(return_tag)?;
        self.define_function(name, return_type, address, nargs, nlocals)
    }

    /// Number of functions defined so far
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Build the program
    pub fn build(self) -> Program {
        Program {
            code: self.code.into(),
            strings: self.strings,
            functions: self.functions,
            by_name: self.by_name,
        }
    }
}
