//! Round-trip tests over structurally rich programs.

use sable_codec::{deserialize, digest, serialize};
use sable_spec::{
    register_core_packages, Argument, CallFrame, Expression, Function, MachineConfig, Opcode,
    Operator, Program, ScopeOp, TypeCode,
};

fn rich_program() -> Program {
    let config = MachineConfig::new(4096, 8192, 32768, 32).unwrap();
    let mut prog = Program::new(&config);
    prog.path = "demo/main.sbl".to_string();
    register_core_packages(&mut prog);

    let util = prog.add_package("util");
    let main = prog.add_package("main");
    prog.add_import(main, util);
    prog.add_import(util, main); // cycles are legal

    let point = prog.add_struct(util, "Point");
    prog.add_field(point, Argument::new("x", TypeCode::I32)).unwrap();
    prog.add_field(point, Argument::new("y", TypeCode::I32)).unwrap();

    let helper = prog.add_function(util, Function::new("helper", util));
    let a = prog.declare_input(helper, Argument::new("a", TypeCode::I32));
    let r = prog.declare_output(helper, Argument::new("r", TypeCode::I32));
    prog.add_expression(
        helper,
        Expression::native(Opcode::Add)
            .with_inputs(vec![a, a])
            .with_outputs(vec![r]),
    );

    let entry = prog.add_function(main, Function::new("main", main));
    let x = prog.declare_local(entry, Argument::new("x", TypeCode::I32));
    let s = prog.declare_local(entry, Argument::slice_of("s", TypeCode::Str));
    let five = prog.i32_literal_arg(5);
    let hello = prog.str_literal_arg("hello");

    let mut open = Expression::call(helper)
        .with_inputs(vec![five])
        .with_outputs(vec![x]);
    open.scope_op = ScopeOp::Open;
    open.label = "top".to_string();
    prog.add_expression(entry, open);
    prog.add_expression(
        entry,
        Expression::native(Opcode::Append)
            .with_inputs(vec![s, hello])
            .with_outputs(vec![s]),
    );
    let mut close = Expression::native(Opcode::Jmp).with_jumps(1, 1);
    close.scope_op = ScopeOp::Close;
    prog.add_expression(entry, close);

    prog
}

#[test]
fn rich_program_round_trips_byte_identically() {
    let prog = rich_program();
    let image = serialize(&prog);
    let thawed = deserialize(&image).unwrap();
    let image2 = serialize(&thawed);
    assert_eq!(image, image2, "serialize ∘ deserialize must be the identity");
    assert_eq!(digest(&image), digest(&image2));
}

#[test]
fn structure_survives_the_round_trip() {
    let prog = rich_program();
    let thawed = deserialize(&serialize(&prog)).unwrap();

    assert_eq!(thawed.packages.len(), prog.packages.len());
    assert_eq!(thawed.args.len(), prog.args.len());

    let util = thawed.get_package("util").unwrap();
    let main = thawed.get_package("main").unwrap();
    assert_eq!(thawed.package(main).imports, vec![util]);
    assert_eq!(thawed.package(util).imports, vec![main]);

    let point = thawed.get_struct("Point", util).unwrap();
    assert_eq!(thawed.strct(point).size, 8);

    let helper = thawed.get_function("helper", util).unwrap();
    let f = thawed.function(helper);
    assert!(!f.is_native);
    assert_eq!(f.length, 1);
    assert_eq!(f.size, 8);

    let entry = thawed.get_function("main", main).unwrap();
    let m = thawed.function(entry);
    assert_eq!(m.expressions.len(), 3);
    assert_eq!(m.expressions[0].operator, Some(Operator::Defined(helper)));
    assert_eq!(m.expressions[0].scope_op, ScopeOp::Open);
    assert_eq!(m.expressions[0].label, "top");
    assert_eq!(m.expressions[2].scope_op, ScopeOp::Close);
    // the slice local is a collector root
    assert_eq!(m.list_of_pointers.len(), 1);

    // native table survived
    let core = thawed.get_package("core").unwrap();
    let add = thawed.get_function("add", core).unwrap();
    assert_eq!(thawed.function(add).opcode, Some(Opcode::Add));
}

#[test]
fn memory_and_frames_are_verbatim() {
    let mut prog = rich_program();
    // scribble recognizable bytes into each segment
    prog.memory[10] = 0xAB;
    let data_off = prog.stack_size + 1;
    prog.memory[data_off] = 0xCD;
    let heap_off = prog.heap_start + 100;
    prog.memory[heap_off] = 0xEF;
    prog.heap_pointer = 200;
    prog.stack_pointer = 64;

    let main = prog.get_package("main").unwrap();
    let entry = prog.get_function("main", main).unwrap();
    prog.call_stack.push(CallFrame {
        operator: entry,
        line: 1,
        frame_pointer: 0,
    });

    let thawed = deserialize(&serialize(&prog)).unwrap();
    assert_eq!(thawed.memory, prog.memory);
    assert_eq!(thawed.stack_pointer, 64);
    assert_eq!(thawed.heap_pointer, 200);
    assert_eq!(thawed.call_stack.len(), 1);
    assert_eq!(thawed.call_stack[0].operator, entry);
    assert_eq!(thawed.call_stack[0].line, 1);
}

#[test]
fn literal_objects_survive_in_the_data_segment() {
    let prog = rich_program();
    let thawed = deserialize(&serialize(&prog)).unwrap();
    // find the "hello" literal argument and read its object back
    let lit = prog
        .args
        .iter()
        .position(|a| {
            a.type_code == TypeCode::Str && a.name.is_empty() && a.offset >= prog.stack_size
        })
        .unwrap();
    let off = thawed.args[lit].offset;
    let len = u32::from_le_bytes(
        thawed.memory[off + 9..off + 13].try_into().unwrap(),
    ) as usize;
    assert_eq!(&thawed.memory[off + 13..off + 13 + len], b"hello");
}
