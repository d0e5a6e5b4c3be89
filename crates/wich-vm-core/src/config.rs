//! VM configuration

use serde::{Deserialize, Serialize};

use wich_vm_bytecode::PopEncoding;
use wich_vm_gc::HeapConfig;

use crate::trace::TraceConfig;
use crate::{MAX_CALL_STACK, MAX_OPND_STACK};

/// What happens when an instruction faults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultMode {
    /// Every fault aborts the run
    #[default]
    Strict,
    /// Recoverable faults are reported and the faulting instruction is skipped
    Lenient,
}

/// VM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Operand stack capacity (default: 1000)
    pub operand_stack_capacity: usize,
    /// Call stack capacity (default: 1000)
    pub call_stack_capacity: usize,
    /// Fault handling discipline
    pub fault_mode: FaultMode,
    /// Skipped faults kept for inspection in lenient mode (default: 100)
    pub fault_log_size: usize,
    /// Encoding of `POP`
    pub pop_encoding: PopEncoding,
    /// Stop after this many instructions
    pub instruction_budget: Option<u64>,
    /// Diagnostic tracing
    pub trace: TraceConfig,
    /// Default vector heap
    pub heap: HeapConfig,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            operand_stack_capacity: MAX_OPND_STACK,
            call_stack_capacity: MAX_CALL_STACK,
            fault_mode: FaultMode::Strict,
            fault_log_size: 100,
            pop_encoding: PopEncoding::Bare,
            instruction_budget: None,
            trace: TraceConfig::default(),
            heap: HeapConfig::default(),
        }
    }
}

impl VmConfig {
    /// Lenient configuration for development runs
    pub fn lenient() -> Self {
        Self {
            fault_mode: FaultMode::Lenient,
            ..Self::default()
        }
    }
}
