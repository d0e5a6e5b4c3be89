//! Bytecode interpreter
//!
//! A single-threaded fetch/decode/dispatch loop over a shared [`Program`].
//! Every opcode with a fixed stack effect is checked against the operand
//! stack before anything is mutated, so a bounds fault leaves the machine
//! exactly as it was before the instruction.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use wich_vm_bytecode::{Decoded, FunctionIndex, Opcode, Operand, Program, decode_at};
use wich_vm_gc::{VectorArena, VectorHandle, VectorHeap};

use crate::config::{FaultMode, VmConfig};
use crate::error::{StackKind, VmError, VmResult};
use crate::format;
use crate::frame::{ActivationRecord, CallStack};
use crate::stack::OperandStack;
use crate::trace::{Tracer, render_state};
use crate::value::{Value, ValueKind};

/// Machine registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// Address of the next instruction
    pub ip: usize,
    /// Frame pointer. Saved and restored across calls, never used for addressing.
    pub fp: i32,
}

impl Default for Registers {
    fn default() -> Self {
        Self { ip: 0, fp: -1 }
    }
}

/// Why a run ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Reached a `HALT` instruction
    Halt,
    /// Ran off the end of the code buffer
    EndOfCode,
    /// Returned from the entry function
    Returned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Ready,
    Running,
    Done(ExitReason),
    Faulted,
}

/// Result of a single instruction
enum InstructionResult {
    /// Continue with the following instruction
    Continue,
    /// Continue at an absolute address
    Jump(usize),
    /// Stop the run
    Exit(ExitReason),
}

/// The virtual machine
pub struct Vm {
    program: Arc<Program>,
    config: VmConfig,
    registers: Registers,
    stack: OperandStack,
    calls: CallStack,
    heap: Box<dyn VectorHeap>,
    output: Box<dyn Write + Send>,
    tracer: Tracer,
    faults: Vec<VmError>,
    fault_count: u64,
    executed: u64,
    interrupt_flag: Arc<AtomicBool>,
    state: RunState,
}

impl Vm {
    /// Create a VM ready to run `program`
    pub fn new(program: Arc<Program>, config: VmConfig) -> Self {
        Self {
            stack: OperandStack::new(config.operand_stack_capacity),
            calls: CallStack::new(config.call_stack_capacity),
            heap: Box::new(VectorArena::with_config(config.heap.clone())),
            output: Box::new(io::stdout()),
            tracer: Tracer::new(config.trace.clone()),
            registers: Registers::default(),
            faults: Vec::new(),
            fault_count: 0,
            executed: 0,
            interrupt_flag: Arc::new(AtomicBool::new(false)),
            state: RunState::Ready,
            program,
            config,
        }
    }

    /// Send program output to `output` instead of stdout
    pub fn with_output(mut self, output: impl Write + Send + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    /// Send trace and fault diagnostics to `sink` instead of stderr
    pub fn with_diagnostics(mut self, sink: impl Write + Send + 'static) -> Self {
        self.tracer.set_sink(Box::new(sink));
        self
    }

    /// Use a different vector heap
    pub fn with_heap(mut self, heap: impl VectorHeap + 'static) -> Self {
        self.heap = Box::new(heap);
        self
    }

    /// The program being run
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Current registers
    pub fn registers(&self) -> Registers {
        self.registers
    }

    /// Instruction pointer
    pub fn ip(&self) -> usize {
        self.registers.ip
    }

    /// Frame pointer
    pub fn fp(&self) -> i32 {
        self.registers.fp
    }

    /// Operand stack top index, `-1` when empty
    pub fn sp(&self) -> isize {
        self.stack.top()
    }

    /// Call stack top index, `-1` when empty
    pub fn callsp(&self) -> isize {
        self.calls.top()
    }

    /// The operand stack
    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    /// The call stack
    pub fn call_stack(&self) -> &CallStack {
        &self.calls
    }

    /// The vector heap
    pub fn heap(&self) -> &dyn VectorHeap {
        self.heap.as_ref()
    }

    /// The most recent faults skipped in lenient mode, oldest first.
    ///
    /// At most `VmConfig::fault_log_size` are kept; see [`Vm::fault_count`]
    /// for the total.
    pub fn faults(&self) -> &[VmError] {
        &self.faults
    }

    /// Faults skipped in lenient mode over the whole run
    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    /// Instructions executed so far
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Recently traced lines, oldest first
    pub fn recent_trace(&self) -> Vec<String> {
        self.tracer.recent()
    }

    /// Get the interrupt flag for external timeout/cancellation
    ///
    /// Call `flag.store(true, Ordering::Relaxed)` to interrupt execution.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt_flag)
    }

    /// Set a custom interrupt flag (for sharing across VMs)
    pub fn set_interrupt_flag(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt_flag = flag;
    }

    /// Request interruption
    pub fn interrupt(&self) {
        self.interrupt_flag.store(true, Ordering::Relaxed);
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt_flag.load(Ordering::Relaxed)
    }

    /// Run until `HALT`, the end of the code, a return from `main`, or a fault.
    ///
    /// With `trace` set (or `VmConfig::trace.enabled`), one diagnostic line is
    /// written per executed instruction. An interrupted run can be resumed by
    /// clearing the flag and calling `execute` again; any other fatal fault
    /// leaves the VM unrunnable.
    pub fn execute(&mut self, trace: bool) -> VmResult<ExitReason> {
        match self.state {
            RunState::Done(reason) => return Ok(reason),
            RunState::Faulted => return Err(VmError::NotRunnable),
            RunState::Running => {}
            RunState::Ready => {
                if let Err(e) = self.enter_main() {
                    self.state = RunState::Faulted;
                    return Err(e);
                }
                self.state = RunState::Running;
            }
        }

        let trace = trace || self.tracer.forced();
        let result = self.run(trace);

        self.state = match &result {
            Ok(reason) => RunState::Done(*reason),
            Err(VmError::Interrupted) => RunState::Running,
            Err(_) => RunState::Faulted,
        };

        match result {
            Ok(reason) => {
                if trace {
                    self.trace_final(reason)?;
                }
                self.output.flush()?;
                Ok(reason)
            }
            Err(e) => {
                tracing::debug!(target: "wich::vm", error = %e, "run aborted");
                if trace {
                    self.tracer.fault(&e.to_string())?;
                }
                self.output.flush()?;
                Err(e)
            }
        }
    }

    fn enter_main(&mut self) -> VmResult<()> {
        let index = self.program.entry().ok_or(VmError::MissingEntry)?;
        let descriptor = self
            .program
            .function(index)
            .ok_or(VmError::MissingEntry)?;
        let entry = descriptor.entry();
        let args = self.stack.pop_n(descriptor.nargs as usize, entry)?;
        tracing::debug!(target: "wich::vm", function = %descriptor.name, "call");
        let record = ActivationRecord::new(
            index,
            descriptor,
            args,
            0,
            self.stack.len(),
            self.registers.fp,
        );
        self.calls.push(record, entry)?;
        self.registers.ip = entry;
        Ok(())
    }

    fn run(&mut self, trace: bool) -> VmResult<ExitReason> {
        let program = Arc::clone(&self.program);
        let code = program.code();
        let pop = self.config.pop_encoding;

        loop {
            let ip = self.registers.ip;
            if ip >= code.len() {
                return Ok(ExitReason::EndOfCode);
            }
            if self.is_interrupted() {
                return Err(VmError::Interrupted);
            }
            if let Some(budget) = self.config.instruction_budget {
                if self.executed >= budget {
                    return Err(VmError::BudgetExhausted {
                        executed: self.executed,
                    });
                }
            }

            let decoded = decode_at(code, ip, pop)?;
            if decoded.opcode == Opcode::Halt {
                return Ok(ExitReason::Halt);
            }
            if trace {
                self.tracer.instruction(&decoded);
            }
            self.executed += 1;

            match self.step(&program, &decoded) {
                Ok(InstructionResult::Continue) => {
                    self.registers.ip = decoded.next_address(pop);
                }
                Ok(InstructionResult::Jump(target)) => self.registers.ip = target,
                Ok(InstructionResult::Exit(reason)) => {
                    if trace {
                        self.trace_state()?;
                    }
                    return Ok(reason);
                }
                Err(e) if self.skips(&e) => {
                    self.skip_fault(e)?;
                    self.registers.ip = decoded.next_address(pop);
                    continue;
                }
                Err(e) => return Err(e),
            }

            if trace {
                self.trace_state()?;
            }
        }
    }

    fn skips(&self, fault: &VmError) -> bool {
        fault.is_recoverable() && self.config.fault_mode == FaultMode::Lenient
    }

    fn skip_fault(&mut self, fault: VmError) -> VmResult<()> {
        tracing::warn!(target: "wich::vm", address = ?fault.address(), "{}", fault);
        self.tracer.fault(&fault.to_string())?;
        self.fault_count += 1;
        let limit = self.config.fault_log_size;
        if limit > 0 {
            if self.faults.len() >= limit {
                let excess = self.faults.len() + 1 - limit;
                self.faults.drain(..excess);
            }
            self.faults.push(fault);
        }
        Ok(())
    }

    fn trace_state(&mut self) -> io::Result<()> {
        let state = render_state(&self.program, &self.calls, &self.stack, self.registers.fp);
        self.tracer.state(state)
    }

    fn trace_final(&mut self, reason: ExitReason) -> io::Result<()> {
        if reason != ExitReason::Returned {
            let ip = self.registers.ip;
            if let Ok(decoded) = decode_at(self.program.code(), ip, self.config.pop_encoding) {
                self.tracer.instruction(&decoded);
            }
        }
        self.trace_state()?;
        self.tracer.flush()
    }

    fn step(&mut self, program: &Program, decoded: &Decoded) -> VmResult<InstructionResult> {
        let address = decoded.address;
        let opcode = decoded.opcode;

        if let Some(effect) = opcode.stack_effect() {
            self.stack.check_effect(effect, address)?;
        }

        match opcode {
            Opcode::Halt => return Ok(InstructionResult::Exit(ExitReason::Halt)),

            Opcode::IAdd => self.int_binary(address, |a, b| Ok(Value::Int(a.wrapping_add(b))))?,
            Opcode::ISub => self.int_binary(address, |a, b| Ok(Value::Int(a.wrapping_sub(b))))?,
            Opcode::IMul => self.int_binary(address, |a, b| Ok(Value::Int(a.wrapping_mul(b))))?,
            Opcode::IDiv => self.int_binary(address, |a, b| {
                if b == 0 {
                    return Err(VmError::DivisionByZero { address });
                }
                Ok(Value::Int(a.wrapping_div(b)))
            })?,
            Opcode::FAdd => self.float_binary(address, |a, b| Value::Float(a + b))?,
            Opcode::FSub => self.float_binary(address, |a, b| Value::Float(a - b))?,
            Opcode::FMul => self.float_binary(address, |a, b| Value::Float(a * b))?,
            Opcode::FDiv => self.float_binary(address, |a, b| Value::Float(a / b))?,

            Opcode::Or => {
                let b = self.bool_at(0, address)?;
                let a = self.bool_at(1, address)?;
                self.replace(2, Value::Bool(a || b));
            }
            Opcode::And => {
                let b = self.bool_at(0, address)?;
                let a = self.bool_at(1, address)?;
                self.replace(2, Value::Bool(a && b));
            }
            Opcode::INeg => {
                let a = self.int_at(0, address)?;
                self.replace(1, Value::Int(a.wrapping_neg()));
            }
            Opcode::FNeg => {
                let a = self.float_at(0, address)?;
                self.replace(1, Value::Float(-a));
            }
            Opcode::Not => {
                let a = self.bool_at(0, address)?;
                self.replace(1, Value::Bool(!a));
            }

            Opcode::I2F => {
                let a = self.int_at(0, address)?;
                self.replace(1, Value::Float(a as f32));
            }
            Opcode::F2I => {
                let a = self.float_at(0, address)?;
                self.replace(1, Value::Int(a as i32));
            }
            Opcode::I2S => {
                let a = self.int_at(0, address)?;
                self.replace(1, Value::string(format::int_to_string(a)));
            }
            Opcode::F2S => {
                let a = self.float_at(0, address)?;
                self.replace(1, Value::string(format::float_to_string(a as f64)));
            }
            Opcode::V2S => {
                let handle = self.vector_at(0, address)?;
                let text = self.render_vector(handle, address)?;
                self.replace(1, Value::string(text));
            }
            Opcode::F2V => {
                let a = self.float_at(0, address)?;
                let handle = self
                    .heap
                    .allocate(1)
                    .map_err(|e| VmError::heap(e, address))?;
                self.heap
                    .set(handle, 0, a as f64)
                    .map_err(|e| VmError::heap(e, address))?;
                self.replace(1, Value::Vector(handle));
            }

            Opcode::IEq => self.int_binary(address, |a, b| Ok(Value::Bool(a == b)))?,
            Opcode::INeq => self.int_binary(address, |a, b| Ok(Value::Bool(a != b)))?,
            Opcode::ILt => self.int_binary(address, |a, b| Ok(Value::Bool(a < b)))?,
            Opcode::ILe => self.int_binary(address, |a, b| Ok(Value::Bool(a <= b)))?,
            Opcode::IGt => self.int_binary(address, |a, b| Ok(Value::Bool(a > b)))?,
            Opcode::IGe => self.int_binary(address, |a, b| Ok(Value::Bool(a >= b)))?,
            Opcode::FEq => self.float_binary(address, |a, b| Value::Bool(a == b))?,
            Opcode::FNeq => self.float_binary(address, |a, b| Value::Bool(a != b))?,
            Opcode::FLt => self.float_binary(address, |a, b| Value::Bool(a < b))?,
            Opcode::FLe => self.float_binary(address, |a, b| Value::Bool(a <= b))?,
            Opcode::FGt => self.float_binary(address, |a, b| Value::Bool(a > b))?,
            Opcode::FGe => self.float_binary(address, |a, b| Value::Bool(a >= b))?,

            Opcode::IsNil => {
                let nil = self.stack.peek(0, address)?.is_nil();
                self.replace(1, Value::Bool(nil));
            }

            Opcode::Br => {
                return Ok(InstructionResult::Jump(self.branch_target(program, decoded)?));
            }
            Opcode::Brt | Opcode::Brf => {
                let condition = self.bool_at(0, address)?;
                if condition == (opcode == Opcode::Brt) {
                    let target = self.branch_target(program, decoded)?;
                    self.stack.discard(1);
                    return Ok(InstructionResult::Jump(target));
                }
                self.stack.discard(1);
            }

            Opcode::IConst => {
                let Operand::Int(v) = decoded.operand else {
                    return Err(self.bad_operand(decoded));
                };
                self.stack.push(Value::Int(v), address)?;
            }
            Opcode::FConst => {
                let Operand::Float(v) = decoded.operand else {
                    return Err(self.bad_operand(decoded));
                };
                self.stack.push(Value::Float(v), address)?;
            }
            Opcode::SConst => {
                let Operand::String(index) = decoded.operand else {
                    return Err(self.bad_operand(decoded));
                };
                let s = program
                    .string(index)
                    .ok_or(VmError::InvalidStringIndex {
                        index: index.index(),
                        address,
                    })?;
                self.stack.push(Value::Str(Arc::clone(s)), address)?;
            }

            Opcode::ILoad | Opcode::FLoad | Opcode::VLoad | Opcode::SLoad => {
                let cell = self.local(decoded)?.clone();
                let value = match opcode {
                    Opcode::ILoad => cell.as_int().map(Value::Int).ok_or_else(|| {
                        VmError::type_mismatch(ValueKind::Int, cell.kind(), address)
                    })?,
                    Opcode::FLoad => cell.as_float().map(Value::Float).ok_or_else(|| {
                        VmError::type_mismatch(ValueKind::Float, cell.kind(), address)
                    })?,
                    Opcode::VLoad => {
                        if !matches!(cell, Value::Vector(_) | Value::Nil) {
                            return Err(VmError::type_mismatch(
                                ValueKind::Vector,
                                cell.kind(),
                                address,
                            ));
                        }
                        cell
                    }
                    _ => {
                        if !matches!(cell, Value::Str(_) | Value::Nil) {
                            return Err(VmError::type_mismatch(
                                ValueKind::Str,
                                cell.kind(),
                                address,
                            ));
                        }
                        cell
                    }
                };
                self.stack.push(value, address)?;
            }
            Opcode::Store => {
                self.local(decoded)?;
                let value = self.stack.pop(address)?;
                *self.local_mut(decoded)? = value;
            }

            Opcode::Vector => {
                let length = self.int_at(0, address)?;
                if length < 0 {
                    return Err(VmError::InvalidVectorLength { length, address });
                }
                let handle = self
                    .heap
                    .allocate(length as usize)
                    .map_err(|e| VmError::heap(e, address))?;
                self.replace(1, Value::Vector(handle));
            }
            Opcode::LoadIndex => {
                let index = self.int_at(0, address)?;
                let handle = self.vector_at(1, address)?;
                let index = self.element_index(handle, index, address)?;
                let element = self
                    .heap
                    .get(handle, index)
                    .map_err(|e| VmError::heap(e, address))?;
                self.replace(2, Value::Float(element as f32));
            }
            Opcode::StoreIndex => {
                let value = self.float_at(0, address)?;
                let index = self.int_at(1, address)?;
                let handle = self.vector_at(2, address)?;
                let index = self.element_index(handle, index, address)?;
                self.heap
                    .set(handle, index, value as f64)
                    .map_err(|e| VmError::heap(e, address))?;
                self.stack.discard(3);
            }

            Opcode::Nil => self.stack.push(Value::Nil, address)?,
            Opcode::Pop => self.stack.discard(1),

            Opcode::Call => {
                let Operand::Function(index) = decoded.operand else {
                    return Err(self.bad_operand(decoded));
                };
                let return_address = decoded.next_address(self.config.pop_encoding);
                return self.call(program, index, return_address, address);
            }
            Opcode::Ret => return self.ret(address),
            Opcode::RetV => {
                let value = self.stack.peek(0, address)?.clone();
                self.stack.discard(1);
                let result = self.ret(address)?;
                self.stack.push(value, address)?;
                return Ok(result);
            }

            Opcode::IPrint => {
                let a = self.int_at(0, address)?;
                self.stack.discard(1);
                writeln!(self.output, "{}", format::int_to_string(a))?;
            }
            Opcode::FPrint => {
                let a = self.float_at(0, address)?;
                self.stack.discard(1);
                writeln!(self.output, "{}", format::float_to_print(a))?;
            }
            Opcode::BPrint => {
                let a = self.bool_at(0, address)?;
                self.stack.discard(1);
                writeln!(self.output, "{}", format::bool_to_string(a))?;
            }
            Opcode::SPrint => {
                let s = self.str_at(0, address)?;
                self.stack.discard(1);
                writeln!(self.output, "{}", s)?;
            }
            Opcode::VPrint => {
                let handle = self.vector_at(0, address)?;
                let text = self.render_vector(handle, address)?;
                self.stack.discard(1);
                writeln!(self.output, "{}", text)?;
            }

            Opcode::Nop => {}
        }

        Ok(InstructionResult::Continue)
    }

    fn call(
        &mut self,
        program: &Program,
        index: FunctionIndex,
        return_address: usize,
        address: usize,
    ) -> VmResult<InstructionResult> {
        let descriptor = program
            .function(index)
            .ok_or(VmError::InvalidFunction {
                index: index.index(),
                address,
            })?;
        self.calls.check_room(address)?;
        let args = self.stack.pop_n(descriptor.nargs as usize, address)?;

        tracing::debug!(
            target: "wich::vm",
            function = %descriptor.name,
            depth = self.calls.depth() + 1,
            "call"
        );

        let record = ActivationRecord::new(
            index,
            descriptor,
            args,
            return_address,
            self.stack.len(),
            self.registers.fp,
        );
        self.calls.push(record, address)?;
        Ok(InstructionResult::Jump(descriptor.entry()))
    }

    fn ret(&mut self, address: usize) -> VmResult<InstructionResult> {
        let record = self.calls.pop(address)?;
        self.stack.truncate(record.operand_base);
        self.registers.fp = record.saved_fp;

        tracing::debug!(
            target: "wich::vm",
            depth = self.calls.depth(),
            return_address = record.return_address,
            "return"
        );

        if self.calls.is_empty() {
            Ok(InstructionResult::Exit(ExitReason::Returned))
        } else {
            Ok(InstructionResult::Jump(record.return_address))
        }
    }

    /// Pop `pops` cells (already checked present) and push `value`
    #[inline]
    fn replace(&mut self, pops: usize, value: Value) {
        self.stack.replace(pops, value);
    }

    fn int_binary(
        &mut self,
        address: usize,
        op: impl FnOnce(i32, i32) -> VmResult<Value>,
    ) -> VmResult<()> {
        let b = self.int_at(0, address)?;
        let a = self.int_at(1, address)?;
        let value = op(a, b)?;
        self.replace(2, value);
        Ok(())
    }

    /// `a` is the cell below the top, `b` the top: `FSUB` is `a - b`, `FDIV` is `a / b`
    fn float_binary(&mut self, address: usize, op: impl FnOnce(f32, f32) -> Value) -> VmResult<()> {
        let b = self.float_at(0, address)?;
        let a = self.float_at(1, address)?;
        self.replace(2, op(a, b));
        Ok(())
    }

    fn int_at(&self, depth: usize, address: usize) -> VmResult<i32> {
        let cell = self.stack.peek(depth, address)?;
        cell.as_int()
            .ok_or_else(|| VmError::type_mismatch(ValueKind::Int, cell.kind(), address))
    }

    fn float_at(&self, depth: usize, address: usize) -> VmResult<f32> {
        let cell = self.stack.peek(depth, address)?;
        cell.as_float()
            .ok_or_else(|| VmError::type_mismatch(ValueKind::Float, cell.kind(), address))
    }

    fn bool_at(&self, depth: usize, address: usize) -> VmResult<bool> {
        let cell = self.stack.peek(depth, address)?;
        cell.as_bool()
            .ok_or_else(|| VmError::type_mismatch(ValueKind::Bool, cell.kind(), address))
    }

    fn str_at(&self, depth: usize, address: usize) -> VmResult<Arc<str>> {
        let cell = self.stack.peek(depth, address)?;
        cell.as_str()
            .cloned()
            .ok_or_else(|| VmError::type_mismatch(ValueKind::Str, cell.kind(), address))
    }

    fn vector_at(&self, depth: usize, address: usize) -> VmResult<VectorHandle> {
        let cell = self.stack.peek(depth, address)?;
        cell.as_vector()
            .ok_or_else(|| VmError::type_mismatch(ValueKind::Vector, cell.kind(), address))
    }

    fn element_index(&self, handle: VectorHandle, index: i32, address: usize) -> VmResult<usize> {
        if index < 0 {
            let len = self
                .heap
                .length(handle)
                .map_err(|e| VmError::heap(e, address))?;
            return Err(VmError::VectorIndexOutOfBounds {
                index: index as i64,
                len,
                address,
            });
        }
        Ok(index as usize)
    }

    fn render_vector(&self, handle: VectorHandle, address: usize) -> VmResult<String> {
        let elements = self
            .heap
            .elements(handle)
            .map_err(|e| VmError::heap(e, address))?;
        Ok(format::vector_to_string(elements))
    }

    fn branch_target(&self, program: &Program, decoded: &Decoded) -> VmResult<usize> {
        let Operand::Branch(offset) = decoded.operand else {
            return Err(self.bad_operand(decoded));
        };
        match offset.target(decoded.address) {
            Some(target) if target <= program.code_size() => Ok(target),
            _ => Err(VmError::InvalidBranchTarget {
                target: decoded.address as isize + offset.offset() as isize,
                address: decoded.address,
            }),
        }
    }

    fn local(&self, decoded: &Decoded) -> VmResult<&Value> {
        let (index, address) = self.local_index(decoded)?;
        let frame = self.frame(address)?;
        frame.locals.get(index as usize).ok_or(VmError::InvalidLocal {
            index,
            frame_size: frame.locals.len(),
            address,
        })
    }

    fn local_mut(&mut self, decoded: &Decoded) -> VmResult<&mut Value> {
        let (index, address) = self.local_index(decoded)?;
        let capacity = self.calls.capacity();
        let frame = self.calls.current_mut().ok_or(VmError::StackBounds {
            stack: StackKind::Call,
            index: -1,
            capacity,
            address,
        })?;
        let frame_size = frame.locals.len();
        frame
            .locals
            .get_mut(index as usize)
            .ok_or(VmError::InvalidLocal {
                index,
                frame_size,
                address,
            })
    }

    fn local_index(&self, decoded: &Decoded) -> VmResult<(u16, usize)> {
        match decoded.operand {
            Operand::Local(index) => Ok((index.index(), decoded.address)),
            _ => Err(self.bad_operand(decoded)),
        }
    }

    fn frame(&self, address: usize) -> VmResult<&ActivationRecord> {
        self.calls.current().ok_or(VmError::StackBounds {
            stack: StackKind::Call,
            index: -1,
            capacity: self.calls.capacity(),
            address,
        })
    }

    fn bad_operand(&self, decoded: &Decoded) -> VmError {
        VmError::TruncatedOperand {
            address: decoded.address + 1,
            width: decoded.opcode.operand_width(self.config.pop_encoding),
        }
    }
}
