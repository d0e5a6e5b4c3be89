//! CALL / RET / RETV behaviour across nested activation records

use std::io;
use std::sync::Arc;

use wich_vm_bytecode::{CodeBuilder, FunctionIndex, Opcode, Program, ReturnType};
use wich_vm_core::{ExitReason, SharedOutput, StackKind, Value, Vm, VmConfig, VmError};

const MAIN: FunctionIndex = FunctionIndex::new(0);
const F: FunctionIndex = FunctionIndex::new(1);

/// `main` at address 0 with no locals, plus one callee
fn with_callee(code: CodeBuilder, main_locals: u16, callee: (usize, u16, u16)) -> Arc<Program> {
    let mut b = Program::builder().code(code.finish().unwrap());
    assert_eq!(
        b.define_function("main", ReturnType::Void, 0, 0, main_locals)
            .unwrap(),
        MAIN
    );
    let (address, nargs, nlocals) = callee;
    assert_eq!(
        b.define_function("f", ReturnType::Int, address as u32, nargs, nlocals)
            .unwrap(),
        F
    );
    Arc::new(b.build())
}

fn machine(program: Arc<Program>) -> (Vm, SharedOutput) {
    let out = SharedOutput::new();
    let vm = Vm::new(program, VmConfig::default())
        .with_output(out.clone())
        .with_diagnostics(io::sink());
    (vm, out)
}

#[test]
fn test_arguments_land_in_push_order() {
    let mut c = CodeBuilder::new();
    c.iconst(3).iconst(4).call(F).op(Opcode::Halt);
    let f = c.here();
    c.op(Opcode::Halt);
    let (mut vm, _) = machine(with_callee(c, 0, (f, 2, 1)));

    assert_eq!(vm.execute(false).unwrap(), ExitReason::Halt);
    assert_eq!(vm.ip(), f);
    assert_eq!(vm.callsp(), 1);
    let frame = vm.call_stack().current().unwrap();
    assert_eq!(frame.function, F);
    assert_eq!(frame.locals, vec![Value::Int(3), Value::Int(4), Value::Nil]);
    assert_eq!(frame.return_address, 13);
    assert_eq!(frame.operand_base, 0);
    assert!(vm.stack().is_empty());
}

#[test]
fn test_retv_delivers_value_to_caller() {
    let mut c = CodeBuilder::new();
    c.iconst(3).iconst(4).call(F).op(Opcode::IPrint).op(Opcode::Halt);
    let f = c.here();
    c.local(Opcode::ILoad, 0)
        .local(Opcode::ILoad, 1)
        .op(Opcode::ISub)
        .op(Opcode::RetV);
    let (mut vm, out) = machine(with_callee(c, 0, (f, 2, 0)));

    assert_eq!(vm.execute(false).unwrap(), ExitReason::Halt);
    assert_eq!(out.lines(), vec!["-1"]);
    assert!(vm.stack().is_empty());
    assert_eq!(vm.callsp(), 0);
    assert_eq!(vm.fp(), -1);
}

#[test]
fn test_call_results_compose() {
    // print sq(2) + sq(3)
    let mut c = CodeBuilder::new();
    c.iconst(2)
        .call(F)
        .iconst(3)
        .call(F)
        .op(Opcode::IAdd)
        .op(Opcode::IPrint)
        .op(Opcode::Halt);
    let f = c.here();
    c.local(Opcode::ILoad, 0)
        .local(Opcode::ILoad, 0)
        .op(Opcode::IMul)
        .op(Opcode::RetV);
    let (mut vm, out) = machine(with_callee(c, 0, (f, 1, 0)));

    vm.execute(false).unwrap();
    assert_eq!(out.lines(), vec!["13"]);
}

#[test]
fn test_recursive_factorial() {
    let mut c = CodeBuilder::new();
    c.iconst(5).call(F).op(Opcode::IPrint).op(Opcode::Halt);
    let f = c.here();
    let recurse = c.label();
    c.local(Opcode::ILoad, 0).iconst(2).op(Opcode::ILt);
    c.branch(Opcode::Brf, recurse);
    c.iconst(1).op(Opcode::RetV);
    c.bind(recurse);
    c.local(Opcode::ILoad, 0)
        .local(Opcode::ILoad, 0)
        .iconst(1)
        .op(Opcode::ISub)
        .call(F)
        .op(Opcode::IMul)
        .op(Opcode::RetV);
    let (mut vm, out) = machine(with_callee(c, 0, (f, 1, 0)));

    vm.execute(false).unwrap();
    assert_eq!(out.lines(), vec!["120"]);
    assert!(vm.stack().is_empty());
}

#[test]
fn test_ret_discards_callee_operands() {
    let mut c = CodeBuilder::new();
    c.iconst(9).call(F).op(Opcode::IPrint).op(Opcode::Halt);
    let f = c.here();
    c.iconst(1).iconst(2).op(Opcode::Ret);
    let (mut vm, out) = machine(with_callee(c, 0, (f, 0, 0)));

    vm.execute(false).unwrap();
    assert_eq!(out.lines(), vec!["9"]);
    assert!(vm.stack().is_empty());
}

#[test]
fn test_callee_locals_are_fresh_per_call() {
    // f stores its argument into a local and prints the local it did not write
    let mut c = CodeBuilder::new();
    c.iconst(1).call(F).iconst(2).call(F).op(Opcode::Halt);
    let f = c.here();
    c.local(Opcode::ILoad, 0)
        .local(Opcode::Store, 1)
        .local(Opcode::ILoad, 2)
        .op(Opcode::IPrint)
        .local(Opcode::ILoad, 1)
        .local(Opcode::Store, 2)
        .op(Opcode::Ret);
    let (mut vm, out) = machine(with_callee(c, 0, (f, 1, 2)));

    vm.execute(false).unwrap();
    assert_eq!(out.lines(), vec!["0", "0"]);
}

#[test]
fn test_return_from_main_ends_run() {
    let mut c = CodeBuilder::new();
    c.iconst(1).op(Opcode::Ret).iconst(2).op(Opcode::IPrint);
    let program = with_callee(c, 0, (0, 0, 0));
    let (mut vm, out) = machine(program);

    assert_eq!(vm.execute(false).unwrap(), ExitReason::Returned);
    assert!(vm.stack().is_empty());
    assert_eq!(vm.callsp(), -1);
    assert_eq!(out.contents(), "");
}

#[test]
fn test_retv_from_main_leaves_result() {
    let mut c = CodeBuilder::new();
    c.iconst(7).op(Opcode::RetV);
    let (mut vm, _) = machine(with_callee(c, 0, (0, 0, 0)));

    assert_eq!(vm.execute(false).unwrap(), ExitReason::Returned);
    assert_eq!(vm.stack().as_slice(), &[Value::Int(7)]);
    assert_eq!(vm.callsp(), -1);
}

#[test]
fn test_main_entry_need_not_be_zero() {
    let mut c = CodeBuilder::new();
    c.iconst(1).op(Opcode::IPrint).op(Opcode::Halt);
    let entry = c.here();
    c.iconst(2).op(Opcode::IPrint).op(Opcode::Halt);
    let mut b = Program::builder().code(c.finish().unwrap());
    b.define_function("helper", ReturnType::Void, 0, 0, 0).unwrap();
    b.define_function("main", ReturnType::Void, entry as u32, 0, 0)
        .unwrap();
    let (mut vm, out) = machine(Arc::new(b.build()));

    vm.execute(false).unwrap();
    assert_eq!(out.lines(), vec!["2"]);
}

#[test]
fn test_main_with_parameters_faults_on_empty_stack() {
    let mut c = CodeBuilder::new();
    c.local(Opcode::ILoad, 0).op(Opcode::IPrint).op(Opcode::Halt);
    let mut b = Program::builder().code(c.finish().unwrap());
    b.define_function("main", ReturnType::Void, 0, 1, 0).unwrap();
    let (mut vm, out) = machine(Arc::new(b.build()));

    assert!(matches!(
        vm.execute(false),
        Err(VmError::StackBounds {
            stack: StackKind::Operand,
            index: -1,
            address: 0,
            ..
        })
    ));
    assert_eq!(vm.callsp(), -1);
    assert_eq!(out.contents(), "");
    assert!(matches!(vm.execute(false), Err(VmError::NotRunnable)));
}
