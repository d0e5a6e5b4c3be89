//! Per-instruction diagnostics

use std::sync::Arc;

use wich_vm_bytecode::{CodeBuilder, FunctionIndex, Opcode, Program, ReturnType};
use wich_vm_core::{SharedOutput, TraceConfig, TraceMode, Vm, VmConfig};

fn store_and_print() -> Arc<Program> {
    let mut c = CodeBuilder::new();
    c.iconst(5)
        .local(Opcode::Store, 0)
        .local(Opcode::ILoad, 0)
        .op(Opcode::IPrint)
        .op(Opcode::Halt);
    let mut b = Program::builder().code(c.finish().unwrap());
    b.define_function("main", ReturnType::Void, 0, 0, 1).unwrap();
    Arc::new(b.build())
}

fn traced(
    program: Arc<Program>,
    config: VmConfig,
    trace: bool,
) -> (Vm, SharedOutput, SharedOutput) {
    let out = SharedOutput::new();
    let diagnostics = SharedOutput::new();
    let mut vm = Vm::new(program, config)
        .with_output(out.clone())
        .with_diagnostics(diagnostics.clone());
    vm.execute(trace).unwrap();
    (vm, out, diagnostics)
}

#[test]
fn test_stream_trace_lines() {
    let (_, out, diagnostics) = traced(store_and_print(), VmConfig::default(), true);
    assert_eq!(out.lines(), vec!["5"]);
    assert_eq!(
        diagnostics.lines(),
        vec![
            "0000:  ICONST         5         calls=[ main=[ nil ] ]  opnds=[ 5 ] fp=-1 sp=0",
            "0005:  STORE          0         calls=[ main=[ 5 ] ]  opnds=[ ] fp=-1 sp=-1",
            "0008:  ILOAD          0         calls=[ main=[ 5 ] ]  opnds=[ 5 ] fp=-1 sp=0",
            "0011:  IPRINT                   calls=[ main=[ 5 ] ]  opnds=[ ] fp=-1 sp=-1",
            "0012:  HALT                     calls=[ main=[ 5 ] ]  opnds=[ ] fp=-1 sp=-1",
        ]
    );
}

#[test]
fn test_no_trace_by_default() {
    let (_, _, diagnostics) = traced(store_and_print(), VmConfig::default(), false);
    assert_eq!(diagnostics.contents(), "");
}

#[test]
fn test_config_forces_trace() {
    let config = VmConfig {
        trace: TraceConfig {
            enabled: true,
            ..TraceConfig::default()
        },
        ..VmConfig::default()
    };
    let (_, _, diagnostics) = traced(store_and_print(), config, false);
    assert_eq!(diagnostics.lines().len(), 5);
}

#[test]
fn test_ring_buffer_keeps_recent_lines() {
    let config = VmConfig {
        trace: TraceConfig {
            enabled: true,
            mode: TraceMode::RingBuffer,
            ring_buffer_size: 2,
        },
        ..VmConfig::default()
    };
    let (vm, _, diagnostics) = traced(store_and_print(), config, false);
    assert_eq!(diagnostics.contents(), "");
    let recent = vm.recent_trace();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].starts_with("0011:  IPRINT"));
    assert!(recent[1].starts_with("0012:  HALT"));
}

#[test]
fn test_trace_shows_callee_frame() {
    let mut c = CodeBuilder::new();
    c.iconst(3)
        .iconst(4)
        .call(FunctionIndex::new(1))
        .op(Opcode::Halt);
    let f = c.here();
    c.op(Opcode::Ret);
    let mut b = Program::builder().code(c.finish().unwrap());
    b.define_function("main", ReturnType::Void, 0, 0, 0).unwrap();
    b.define_function("f", ReturnType::Void, f as u32, 2, 0)
        .unwrap();

    let (_, _, diagnostics) = traced(Arc::new(b.build()), VmConfig::default(), true);
    let lines = diagnostics.lines();
    assert_eq!(
        lines[2],
        "0010:  CALL           1         calls=[ main=[ ] f=[ 3 4 ] ]  opnds=[ ] fp=-1 sp=-1"
    );
    assert_eq!(
        lines[3],
        "0014:  RET                      calls=[ main=[ ] ]  opnds=[ ] fp=-1 sp=-1"
    );
}

#[test]
fn test_end_of_code_prints_state_only() {
    let mut c = CodeBuilder::new();
    c.iconst(1);
    let mut b = Program::builder().code(c.finish().unwrap());
    b.define_function("main", ReturnType::Void, 0, 0, 0).unwrap();
    let (_, _, diagnostics) = traced(Arc::new(b.build()), VmConfig::default(), true);
    assert_eq!(
        diagnostics.lines(),
        vec![
            "0000:  ICONST         1         calls=[ main=[ ] ]  opnds=[ 1 ] fp=-1 sp=0",
            "calls=[ main=[ ] ]  opnds=[ 1 ] fp=-1 sp=0",
        ]
    );
}
