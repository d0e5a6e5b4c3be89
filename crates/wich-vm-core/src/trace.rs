//! Per-step diagnostics.
//!
//! When tracing is on, every executed instruction produces one line: the
//! decoded instruction followed by the call and operand stacks after it ran.
//! Lines go either straight to the diagnostic writer or into a ring buffer
//! kept for post-mortem inspection.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

use wich_vm_bytecode::{Decoded, Program};

use crate::frame::CallStack;
use crate::stack::OperandStack;

/// Configuration for trace capture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Trace even when `execute` is called with `trace = false`
    pub enabled: bool,
    /// Trace capture mode
    pub mode: TraceMode,
    /// Size of ring buffer for recent instructions
    pub ring_buffer_size: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: TraceMode::Stream,
            ring_buffer_size: 100,
        }
    }
}

/// Trace capture mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    /// Write every line to the diagnostic channel
    Stream,
    /// Keep only the last N lines in memory
    RingBuffer,
}

/// Ring buffer of recent trace lines
#[derive(Debug)]
pub struct TraceRingBuffer {
    entries: Vec<String>,
    capacity: usize,
    head: usize,
    full: bool,
}

impl TraceRingBuffer {
    /// Create new ring buffer with given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            full: false,
        }
    }

    /// Push new entry into ring buffer
    pub fn push(&mut self, entry: String) {
        if self.capacity == 0 {
            return;
        }
        if self.full {
            self.entries[self.head] = entry;
            self.head = (self.head + 1) % self.capacity;
        } else {
            self.entries.push(entry);
            if self.entries.len() == self.capacity {
                self.full = true;
            }
        }
    }

    /// Iterate over entries in chronological order (oldest first)
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        let (newer, older) = self.entries.split_at(if self.full { self.head } else { 0 });
        older.iter().chain(newer.iter())
    }

    /// Get number of entries currently stored
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render the call stack and operand stack.
///
/// `calls=[ main=[ 5 nil ] ]  opnds=[ 5 ] fp=-1 sp=0`
pub fn render_state(program: &Program, calls: &CallStack, stack: &OperandStack, fp: i32) -> String {
    let mut out = String::from("calls=[");
    for frame in calls.frames() {
        let name = program
            .function(frame.function)
            .map(|f| &*f.name)
            .unwrap_or("?");
        out.push(' ');
        out.push_str(name);
        out.push_str("=[");
        for local in &frame.locals {
            out.push(' ');
            out.push_str(&local.to_string());
        }
        out.push_str(" ]");
    }
    out.push_str(" ]  opnds=[");
    for cell in stack.as_slice() {
        out.push(' ');
        out.push_str(&cell.to_string());
    }
    out.push_str(&format!(" ] fp={} sp={}", fp, stack.top()));
    out
}

/// Writes trace lines to the diagnostic channel
pub struct Tracer {
    config: TraceConfig,
    sink: Box<dyn Write + Send>,
    ring_buffer: TraceRingBuffer,
    pending: Option<String>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("config", &self.config)
            .field("ring_buffer", &self.ring_buffer)
            .finish_non_exhaustive()
    }
}

impl Tracer {
    /// Create a tracer writing to stderr
    pub fn new(config: TraceConfig) -> Self {
        Self::with_sink(config, Box::new(io::stderr()))
    }

    /// Create a tracer writing to `sink`
    pub fn with_sink(config: TraceConfig, sink: Box<dyn Write + Send>) -> Self {
        Self {
            ring_buffer: TraceRingBuffer::new(config.ring_buffer_size),
            config,
            sink,
            pending: None,
        }
    }

    /// Replace the diagnostic writer
    pub fn set_sink(&mut self, sink: Box<dyn Write + Send>) {
        self.sink = sink;
    }

    /// Is tracing forced on by configuration
    pub fn forced(&self) -> bool {
        self.config.enabled
    }

    /// Start a line for an instruction about to execute
    pub fn instruction(&mut self, decoded: &Decoded) {
        self.pending = Some(decoded.to_string());
    }

    /// Finish the pending line with the machine state
    pub fn state(&mut self, state: String) -> io::Result<()> {
        let line = match self.pending.take() {
            Some(instr) => format!("{}{}", instr, state),
            None => state,
        };
        self.emit(line)
    }

    /// Report a fault on the diagnostic channel, regardless of mode
    pub fn fault(&mut self, message: &str) -> io::Result<()> {
        self.pending = None;
        self.ring_buffer.push(message.to_string());
        writeln!(self.sink, "{}", message)
    }

    fn emit(&mut self, line: String) -> io::Result<()> {
        if self.config.mode == TraceMode::Stream {
            writeln!(self.sink, "{}", line)?;
        }
        self.ring_buffer.push(line);
        Ok(())
    }

    /// Recent lines, oldest first
    pub fn recent(&self) -> Vec<String> {
        self.ring_buffer.iter().cloned().collect()
    }

    /// Flush the diagnostic writer
    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
