//! Opcode semantics, run end to end through `Vm::execute`

use std::io;
use std::sync::Arc;

use wich_vm_bytecode::{CodeBuilder, Opcode, PopEncoding, Program, ReturnType};
use wich_vm_core::{ExitReason, SharedOutput, Value, Vm, VmConfig};

fn main_only(code: Vec<u8>, nlocals: u16) -> Arc<Program> {
    let mut builder = Program::builder().code(code);
    builder
        .define_function("main", ReturnType::Void, 0, 0, nlocals)
        .unwrap();
    Arc::new(builder.build())
}

fn run_with(program: Arc<Program>, config: VmConfig) -> (Vm, SharedOutput) {
    let out = SharedOutput::new();
    let mut vm = Vm::new(program, config)
        .with_output(out.clone())
        .with_diagnostics(io::sink());
    vm.execute(false).unwrap();
    (vm, out)
}

fn run(code: CodeBuilder, nlocals: u16) -> (Vm, SharedOutput) {
    run_with(main_only(code.finish().unwrap(), nlocals), VmConfig::default())
}

/// Push `b` as a boolean produced by IEQ
fn push_bool(c: &mut CodeBuilder, b: bool) {
    c.iconst(0).iconst(if b { 0 } else { 1 }).op(Opcode::IEq);
}

#[test]
fn test_end_to_end_store_load_print() {
    let mut c = CodeBuilder::new();
    c.iconst(5)
        .local(Opcode::Store, 0)
        .local(Opcode::ILoad, 0)
        .op(Opcode::IPrint)
        .op(Opcode::Halt);
    let (vm, out) = run(c, 1);
    assert_eq!(out.lines(), vec!["5"]);
    assert_eq!(vm.stack().len(), 0);
    assert_eq!(vm.sp(), -1);
}

#[test]
fn test_iadd_pairs() {
    let pairs = [
        (2, 3),
        (-7, 7),
        (i32::MAX, 1),
        (i32::MIN, -1),
        (123_456, -654_321),
    ];
    for (a, b) in pairs {
        let mut c = CodeBuilder::new();
        c.iconst(a).iconst(b).op(Opcode::IAdd).op(Opcode::Halt);
        let (vm, _) = run(c, 0);
        assert_eq!(vm.stack().as_slice(), &[Value::Int(a.wrapping_add(b))]);
    }
}

#[test]
fn test_integer_arithmetic() {
    let cases = [
        (Opcode::ISub, 10, 4, 6),
        (Opcode::IMul, -6, 7, -42),
        (Opcode::IDiv, 7, -2, -3),
        (Opcode::IDiv, i32::MIN, -1, i32::MIN),
        (Opcode::IMul, i32::MAX, 2, -2),
    ];
    for (op, a, b, expected) in cases {
        let mut c = CodeBuilder::new();
        c.iconst(a).iconst(b).op(op).op(Opcode::Halt);
        let (vm, _) = run(c, 0);
        assert_eq!(vm.stack().as_slice(), &[Value::Int(expected)], "{op}");
    }
}

#[test]
fn test_float_arithmetic() {
    let cases = [
        (Opcode::FAdd, 1.5, 2.25, 3.75),
        (Opcode::FSub, 1.0, 0.25, 0.75),
        (Opcode::FMul, -2.0, 4.5, -9.0),
        (Opcode::FDiv, 1.0, 4.0, 0.25),
    ];
    for (op, a, b, expected) in cases {
        let mut c = CodeBuilder::new();
        c.fconst(a).fconst(b).op(op).op(Opcode::Halt);
        let (vm, _) = run(c, 0);
        assert_eq!(vm.stack().as_slice(), &[Value::Float(expected)], "{op}");
    }
}

#[test]
fn test_fconst_decodes_bit_pattern() {
    let mut c = CodeBuilder::new();
    c.fconst(-0.1).op(Opcode::Halt);
    let (vm, _) = run(c, 0);
    assert_eq!(vm.stack().as_slice(), &[Value::Float(-0.1)]);
}

#[test]
fn test_unary_and_logic() {
    let mut c = CodeBuilder::new();
    c.iconst(9).op(Opcode::INeg);
    c.fconst(2.5).op(Opcode::FNeg);
    push_bool(&mut c, true);
    c.op(Opcode::Not);
    push_bool(&mut c, true);
    push_bool(&mut c, false);
    c.op(Opcode::Or);
    push_bool(&mut c, true);
    push_bool(&mut c, false);
    c.op(Opcode::And);
    c.op(Opcode::Halt);
    let (vm, _) = run(c, 0);
    assert_eq!(
        vm.stack().as_slice(),
        &[
            Value::Int(-9),
            Value::Float(-2.5),
            Value::Bool(false),
            Value::Bool(true),
            Value::Bool(false),
        ]
    );
}

#[test]
fn test_comparisons() {
    let mut c = CodeBuilder::new();
    c.iconst(1).iconst(2).op(Opcode::ILt);
    c.iconst(2).iconst(2).op(Opcode::ILe);
    c.iconst(1).iconst(2).op(Opcode::IGt);
    c.iconst(3).iconst(2).op(Opcode::IGe);
    c.iconst(4).iconst(4).op(Opcode::IEq);
    c.iconst(4).iconst(4).op(Opcode::INeq);
    c.fconst(1.0).fconst(2.0).op(Opcode::FLt);
    c.fconst(2.0).fconst(1.0).op(Opcode::FLe);
    c.fconst(2.0).fconst(1.0).op(Opcode::FGt);
    c.fconst(1.0).fconst(1.0).op(Opcode::FGe);
    c.fconst(0.5).fconst(0.5).op(Opcode::FEq);
    c.fconst(0.5).fconst(0.5).op(Opcode::FNeq);
    c.op(Opcode::Halt);
    let (vm, _) = run(c, 0);
    let expected: Vec<Value> = [
        true, true, false, true, true, false, true, false, true, true, true, false,
    ]
    .into_iter()
    .map(Value::Bool)
    .collect();
    assert_eq!(vm.stack().as_slice(), expected.as_slice());
}

#[test]
fn test_stack_depth_law() {
    let binary = [
        Opcode::IAdd,
        Opcode::ISub,
        Opcode::IMul,
        Opcode::IDiv,
        Opcode::IEq,
        Opcode::INeq,
        Opcode::ILt,
        Opcode::ILe,
        Opcode::IGt,
        Opcode::IGe,
    ];
    for op in binary {
        let mut c = CodeBuilder::new();
        c.iconst(6).iconst(3).op(op).op(Opcode::Halt);
        let (vm, _) = run(c, 0);
        assert_eq!(vm.stack().len(), 1, "{op}");
    }

    let unary = [Opcode::INeg, Opcode::I2F, Opcode::I2S, Opcode::IsNil];
    for op in unary {
        let mut c = CodeBuilder::new();
        c.iconst(6).op(op).op(Opcode::Halt);
        let (vm, _) = run(c, 0);
        assert_eq!(vm.stack().len(), 1, "{op}");
    }

    let mut b = Program::builder();
    let s = b.add_string("x").unwrap();
    let mut c = CodeBuilder::new();
    c.iconst(1).fconst(1.0).sconst(s).op(Opcode::Nil).op(Opcode::Halt);
    let mut b = b.code(c.finish().unwrap());
    b.define_function("main", ReturnType::Void, 0, 0, 0).unwrap();
    let (vm, _) = run_with(Arc::new(b.build()), VmConfig::default());
    assert_eq!(vm.stack().len(), 4);
}

#[test]
fn test_brf_false_branches_to_offset() {
    // 0: ICONST 0   5: ICONST 1   10: IEQ   11: BRF +9 -> 20
    // 14: ICONST 111   19: IPRINT   20: ICONST 222   25: IPRINT   26: HALT
    let mut c = CodeBuilder::new();
    c.iconst(0).iconst(1).op(Opcode::IEq);
    assert_eq!(c.here(), 11);
    c.branch_offset(Opcode::Brf, 9);
    c.iconst(111).op(Opcode::IPrint);
    assert_eq!(c.here(), 20);
    c.iconst(222).op(Opcode::IPrint).op(Opcode::Halt);
    let (vm, out) = run(c, 0);
    assert_eq!(out.lines(), vec!["222"]);
    assert_eq!(vm.ip(), 26);
}

#[test]
fn test_brf_true_falls_through() {
    let mut c = CodeBuilder::new();
    c.iconst(1).iconst(1).op(Opcode::IEq);
    c.branch_offset(Opcode::Brf, 9);
    c.iconst(111).op(Opcode::IPrint);
    c.iconst(222).op(Opcode::IPrint).op(Opcode::Halt);
    let (_, out) = run(c, 0);
    assert_eq!(out.lines(), vec!["111", "222"]);
}

#[test]
fn test_brt_and_br() {
    let mut c = CodeBuilder::new();
    let skip = c.label();
    let end = c.label();
    push_bool(&mut c, true);
    c.branch(Opcode::Brt, skip);
    c.iconst(1).op(Opcode::IPrint);
    c.bind(skip);
    c.iconst(2).op(Opcode::IPrint);
    c.branch(Opcode::Br, end);
    c.iconst(3).op(Opcode::IPrint);
    c.bind(end);
    c.op(Opcode::Halt);
    let (vm, out) = run(c, 0);
    assert_eq!(out.lines(), vec!["2"]);
    assert!(vm.stack().is_empty());
}

#[test]
fn test_countdown_loop() {
    let mut c = CodeBuilder::new();
    let top = c.label();
    let end = c.label();
    c.iconst(3).local(Opcode::Store, 0);
    c.bind(top);
    c.local(Opcode::ILoad, 0).iconst(0).op(Opcode::IGt);
    c.branch(Opcode::Brf, end);
    c.local(Opcode::ILoad, 0).op(Opcode::IPrint);
    c.local(Opcode::ILoad, 0)
        .iconst(1)
        .op(Opcode::ISub)
        .local(Opcode::Store, 0);
    c.branch(Opcode::Br, top);
    c.bind(end);
    c.op(Opcode::Halt);
    let (vm, out) = run(c, 1);
    assert_eq!(out.lines(), vec!["3", "2", "1"]);
    assert!(vm.stack().is_empty());
}

#[test]
fn test_vector_round_trip() {
    let mut c = CodeBuilder::new();
    c.iconst(3).op(Opcode::Vector).local(Opcode::Store, 0);
    for (i, v) in [1.0f32, 2.0, 3.0].into_iter().enumerate() {
        c.local(Opcode::VLoad, 0)
            .iconst(i as i32)
            .fconst(v)
            .op(Opcode::StoreIndex);
    }
    for i in 0..3 {
        c.local(Opcode::VLoad, 0)
            .iconst(i)
            .op(Opcode::LoadIndex);
    }
    c.op(Opcode::Halt);
    let (vm, _) = run(c, 1);
    assert_eq!(
        vm.stack().as_slice(),
        &[Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)]
    );
}

#[test]
fn test_new_vector_is_zeroed() {
    let mut c = CodeBuilder::new();
    c.iconst(2).op(Opcode::Vector).op(Opcode::VPrint).op(Opcode::Halt);
    let (_, out) = run(c, 0);
    assert_eq!(out.lines(), vec!["[0.00, 0.00]"]);
}

#[test]
fn test_print_opcodes() {
    let mut b = Program::builder();
    let hello = b.add_string("hello").unwrap();
    let mut c = CodeBuilder::new();
    c.iconst(-7).op(Opcode::IPrint);
    c.fconst(2.5).op(Opcode::FPrint);
    push_bool(&mut c, true);
    c.op(Opcode::BPrint);
    push_bool(&mut c, false);
    c.op(Opcode::BPrint);
    c.sconst(hello).op(Opcode::SPrint);
    c.fconst(1.5).op(Opcode::F2V).op(Opcode::VPrint);
    c.op(Opcode::Halt);
    let mut b = b.code(c.finish().unwrap());
    b.define_function("main", ReturnType::Void, 0, 0, 0).unwrap();
    let (vm, out) = run_with(Arc::new(b.build()), VmConfig::default());
    assert_eq!(
        out.lines(),
        vec!["-7", "2.500000", "true", "false", "hello", "[1.50]"]
    );
    assert!(vm.stack().is_empty());
}

#[test]
fn test_conversions() {
    let mut c = CodeBuilder::new();
    c.iconst(3).op(Opcode::I2F);
    c.fconst(-2.7).op(Opcode::F2I);
    c.fconst(f32::NAN).op(Opcode::F2I);
    c.iconst(42).op(Opcode::I2S);
    c.fconst(3.14159).op(Opcode::F2S);
    c.iconst(2).op(Opcode::Vector).op(Opcode::V2S);
    c.op(Opcode::Halt);
    let (vm, _) = run(c, 0);
    assert_eq!(
        vm.stack().as_slice(),
        &[
            Value::Float(3.0),
            Value::Int(-2),
            Value::Int(0),
            Value::string("42"),
            Value::string("3.14"),
            Value::string("[0.00, 0.00]"),
        ]
    );
}

#[test]
fn test_nil_and_isnil() {
    let mut c = CodeBuilder::new();
    c.op(Opcode::Nil).op(Opcode::IsNil);
    c.iconst(0).op(Opcode::IsNil);
    c.local(Opcode::VLoad, 0).op(Opcode::IsNil);
    c.local(Opcode::ILoad, 1);
    c.op(Opcode::Halt);
    let (vm, _) = run(c, 2);
    assert_eq!(
        vm.stack().as_slice(),
        &[
            Value::Bool(true),
            Value::Bool(false),
            Value::Bool(true),
            Value::Int(0),
        ]
    );
}

#[test]
fn test_sload_and_strings_in_locals() {
    let mut b = Program::builder();
    let s = b.add_string("kept").unwrap();
    let mut c = CodeBuilder::new();
    c.sconst(s)
        .local(Opcode::Store, 0)
        .local(Opcode::SLoad, 0)
        .op(Opcode::SPrint)
        .op(Opcode::Halt);
    let mut b = b.code(c.finish().unwrap());
    b.define_function("main", ReturnType::Void, 0, 0, 1).unwrap();
    let (vm, out) = run_with(Arc::new(b.build()), VmConfig::default());
    assert_eq!(out.contents(), "kept\n");
    assert_eq!(
        vm.call_stack().current().unwrap().locals,
        vec![Value::string("kept")]
    );
}

#[test]
fn test_bare_pop() {
    let mut c = CodeBuilder::new();
    c.iconst(1).op(Opcode::Pop).iconst(2).op(Opcode::Halt);
    let (vm, _) = run(c, 0);
    assert_eq!(vm.stack().as_slice(), &[Value::Int(2)]);
}

#[test]
fn test_padded_pop() {
    let mut c = CodeBuilder::with_pop_encoding(PopEncoding::Padded);
    c.iconst(1).op(Opcode::Pop).iconst(2).op(Opcode::Halt);
    let code = c.finish().unwrap();
    assert_eq!(code.len(), 1 + 5 + 2 + 5);
    let config = VmConfig {
        pop_encoding: PopEncoding::Padded,
        ..VmConfig::default()
    };
    let (vm, _) = run_with(main_only(code, 0), config);
    assert_eq!(vm.stack().as_slice(), &[Value::Int(2)]);
}

#[test]
fn test_nop_and_end_of_code() {
    let mut c = CodeBuilder::new();
    c.op(Opcode::Nop).iconst(1).op(Opcode::Nop);
    let program = main_only(c.finish().unwrap(), 0);
    let mut vm = Vm::new(program, VmConfig::default()).with_output(io::sink());
    assert_eq!(vm.execute(false).unwrap(), ExitReason::EndOfCode);
    assert_eq!(vm.stack().as_slice(), &[Value::Int(1)]);
    assert_eq!(vm.executed(), 3);
}

#[test]
fn test_halt_reason() {
    let program = main_only(vec![Opcode::Halt.to_byte()], 0);
    let mut vm = Vm::new(program, VmConfig::default()).with_output(io::sink());
    assert_eq!(vm.execute(false).unwrap(), ExitReason::Halt);
    assert_eq!(vm.executed(), 0);
}
