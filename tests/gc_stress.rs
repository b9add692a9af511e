//! Collector stress: allocation churn must stay bounded by the live
//! set, and object graphs with aliasing survive compaction intact.

use sable::{
    make_program_with, Argument, Expression, Function, Machine, MachineConfig, Opcode, TypeCode,
};
use sable_spec::NULL_HEAP_ADDRESS_OFFSET;

#[test]
fn thousand_short_lived_strings_stay_bounded() {
    // i := 0; while i < 1000 { s = sprintf("x%d", i); i = i + 1 }
    // The heap is far smaller than 1000 string objects; only
    // collection keeps the loop running.
    let cfg = MachineConfig::new(2048, 4096, 8192, 8).unwrap();
    let mut prog = make_program_with(&cfg);
    let main = prog.add_package("main");
    let entry = prog.add_function(main, Function::new("main", main));

    let i = prog.declare_local(entry, Argument::new("i", TypeCode::I32));
    let s = prog.declare_local(entry, Argument::new("s", TypeCode::Str));
    let cond = prog.declare_local(entry, Argument::new("cond", TypeCode::Bool));
    let zero = prog.i32_literal_arg(0);
    let one = prog.i32_literal_arg(1);
    let thousand = prog.i32_literal_arg(1000);
    let fmt = prog.str_literal_arg("x%d");

    // 0: i = 0
    prog.add_expression(
        entry,
        Expression::native(Opcode::Identity)
            .with_inputs(vec![zero])
            .with_outputs(vec![i]),
    );
    // 1: cond = i < 1000
    prog.add_expression(
        entry,
        Expression::native(Opcode::Lt)
            .with_inputs(vec![i, thousand])
            .with_outputs(vec![cond]),
    );
    // 2: if cond goto 3 else goto 6
    prog.add_expression(
        entry,
        Expression::native(Opcode::Jmp)
            .with_inputs(vec![cond])
            .with_jumps(1, 4),
    );
    // 3: s = sprintf("x%d", i)
    prog.add_expression(
        entry,
        Expression::native(Opcode::Sprintf)
            .with_inputs(vec![fmt, i])
            .with_outputs(vec![s]),
    );
    // 4: i = i + 1
    prog.add_expression(
        entry,
        Expression::native(Opcode::Add)
            .with_inputs(vec![i, one])
            .with_outputs(vec![i]),
    );
    // 5: goto 1
    prog.add_expression(entry, Expression::native(Opcode::Jmp).with_jumps(-4, -4));

    let mut m = Machine::new(prog, cfg).with_captured_output();
    m.run().unwrap();

    // the heap never needed to grow past its cap, and a final sweep
    // with no live frames reclaims everything
    assert!(m.program.heap_size <= 8192);
    sable_runtime::gc::collect(&mut m.program);
    assert_eq!(m.program.heap_pointer, NULL_HEAP_ADDRESS_OFFSET);
}

#[test]
fn collection_during_append_keeps_the_slice_alive() {
    // grow a slice through enough reallocations to force collections
    // in a tiny heap; every element must survive the moves
    let cfg = MachineConfig::new(2048, 512, 1024, 8).unwrap();
    let mut prog = make_program_with(&cfg);
    let main = prog.add_package("main");
    let entry = prog.add_function(main, Function::new("main", main));
    let s = prog.declare_local(entry, Argument::slice_of("s", TypeCode::I32));

    let n = 40;
    for v in 0..n {
        let lit = prog.i32_literal_arg(v);
        prog.add_expression(
            entry,
            Expression::native(Opcode::Append)
                .with_inputs(vec![s, lit])
                .with_outputs(vec![s]),
        );
    }

    let mut m = Machine::new(prog, cfg).with_captured_output();
    m.boot().unwrap();
    for _ in 0..n {
        m.step().unwrap();
    }

    let obj = sable_runtime::read_arg_value(&m.program, 0, s)
        .unwrap()
        .as_ref_offset()
        .unwrap() as usize;
    assert_eq!(
        sable_runtime::heap::slice_len(&m.program.memory, obj).unwrap(),
        n as usize
    );
    for v in 0..n {
        let off = sable_runtime::heap::slice_elem_offset(&m.program.memory, obj, v as usize, 4)
            .unwrap();
        assert_eq!(
            sable_runtime::memory::read_i32(&m.program.memory, off).unwrap(),
            v
        );
    }
}

#[test]
fn aliased_strings_survive_collection() {
    // a = sprintf(...); b = a; churn; both still read the same object
    let cfg = MachineConfig::new(2048, 1024, 2048, 8).unwrap();
    let mut prog = make_program_with(&cfg);
    let main = prog.add_package("main");
    let entry = prog.add_function(main, Function::new("main", main));

    let a = prog.declare_local(entry, Argument::new("a", TypeCode::Str));
    let b = prog.declare_local(entry, Argument::new("b", TypeCode::Str));
    let junk = prog.declare_local(entry, Argument::new("junk", TypeCode::Str));
    let fmt = prog.str_literal_arg("kept:%d");
    let seven = prog.i32_literal_arg(7);
    let churn_fmt = prog.str_literal_arg("junk junk junk junk %d");

    prog.add_expression(
        entry,
        Expression::native(Opcode::Sprintf)
            .with_inputs(vec![fmt, seven])
            .with_outputs(vec![a]),
    );
    prog.add_expression(
        entry,
        Expression::native(Opcode::Identity)
            .with_inputs(vec![a])
            .with_outputs(vec![b]),
    );
    for _ in 0..60 {
        prog.add_expression(
            entry,
            Expression::native(Opcode::Sprintf)
                .with_inputs(vec![churn_fmt, seven])
                .with_outputs(vec![junk]),
        );
    }

    let mut m = Machine::new(prog, cfg).with_captured_output();
    m.boot().unwrap();
    for _ in 0..62 {
        m.step().unwrap();
    }

    use sable_runtime::{final_offset, memory, read_arg_value, Value};
    assert_eq!(
        read_arg_value(&m.program, 0, a).unwrap(),
        Value::Str("kept:7".to_string())
    );
    assert_eq!(
        read_arg_value(&m.program, 0, b).unwrap(),
        Value::Str("kept:7".to_string())
    );
    // still one object, referenced twice
    let a_cell = final_offset(&m.program, 0, a).unwrap();
    let b_cell = final_offset(&m.program, 0, b).unwrap();
    assert_eq!(
        memory::read_u32(&m.program.memory, a_cell).unwrap(),
        memory::read_u32(&m.program.memory, b_cell).unwrap()
    );
}
