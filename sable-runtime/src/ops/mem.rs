//! Slice and length opcodes: `core.len`, `core.append`, `core.resize`,
//! `core.copy`.
//!
//! Element width comes from the operand descriptor, never from the
//! object; slice headers carry only capacity and length.

use crate::error::{Result, RuntimeError};
use crate::execute::OpCtx;
use crate::heap;
use crate::memory;
use crate::value::Value;
use sable_spec::TypeCode;

/// `core.len(container) -> i32`
pub fn len(ctx: &mut OpCtx) -> Result<()> {
    let arg = ctx.input_arg(0)?;
    let length: usize = if arg.tags.array {
        arg.lengths.first().copied().unwrap_or(0)
    } else if arg.tags.slice {
        let obj = ctx.read(0)?.as_ref_offset()? as usize;
        if obj == 0 {
            0
        } else {
            heap::slice_len(&ctx.prog.memory, obj)?
        }
    } else if arg.type_code == TypeCode::Str {
        ctx.read(0)?.as_str()?.len()
    } else {
        return Err(RuntimeError::TypeMismatch {
            expected: "slice, array, or str",
            found: arg.type_code.name(),
        });
    };
    ctx.write(0, Value::I32(length as i32))
}

/// `core.append(slice, elem) -> slice`
pub fn append(ctx: &mut OpCtx) -> Result<()> {
    let elem_size = ctx.input_arg(0)?.size;
    let elem = ctx.read_raw(1)?;
    if elem.len() != elem_size {
        return Err(RuntimeError::TypeMismatch {
            expected: "slice element",
            found: ctx.input_arg(1)?.type_code.name(),
        });
    }
    let cell = ctx.input_offset(0)?;
    let obj = heap::slice_append(ctx.prog, ctx.config, cell, &elem, elem_size)?;
    let out = ctx.output_offset(0)?;
    memory::write_u32(&mut ctx.prog.memory, out, obj as u32)
}

/// `core.resize(slice, n) -> slice`
pub fn resize(ctx: &mut OpCtx) -> Result<()> {
    let elem_size = ctx.input_arg(0)?.size;
    let new_len = ctx.read(1)?.as_i64()?;
    if new_len < 0 {
        return Err(RuntimeError::IndexOutOfBounds {
            index: new_len,
            length: 0,
        });
    }
    let cell = ctx.input_offset(0)?;
    let obj = heap::slice_resize(ctx.prog, ctx.config, cell, new_len as usize, elem_size)?;
    let out = ctx.output_offset(0)?;
    memory::write_u32(&mut ctx.prog.memory, out, obj as u32)
}

/// `core.copy(dst, src) -> i32`
pub fn copy(ctx: &mut OpCtx) -> Result<()> {
    let elem_size = ctx.input_arg(0)?.size;
    let dst = ctx.read(0)?.as_ref_offset()? as usize;
    let src = ctx.read(1)?.as_ref_offset()? as usize;
    let copied = heap::slice_copy(&mut ctx.prog.memory, dst, src, elem_size)?;
    ctx.write(0, Value::I32(copied as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::read_arg_value;
    use crate::machine::Machine;
    use crate::offset::final_offset;
    use sable_spec::{Argument, Expression, Function, MachineConfig, Opcode, Program};

    fn machine_with_main() -> (Machine, sable_spec::FunRef) {
        let config = MachineConfig::new(1024, 4096, 16384, 8).unwrap();
        let mut prog = Program::new(&config);
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("main", pkg));
        (Machine::new(prog, config).with_captured_output(), fun)
    }

    #[test]
    fn test_append_then_index() {
        let (mut m, fun) = machine_with_main();
        let s = m.program.declare_local(fun, Argument::slice_of("s", TypeCode::I32));
        for v in [1, 2, 3, 4] {
            let lit = m.program.i32_literal_arg(v);
            m.program.add_expression(
                fun,
                Expression::native(Opcode::Append)
                    .with_inputs(vec![s, lit])
                    .with_outputs(vec![s]),
            );
        }
        m.boot().unwrap();
        for _ in 0..4 {
            m.step().unwrap();
        }

        let idx = m.program.i32_literal_arg(3);
        let elem = {
            let derived = m.program.arg(s).indexed(idx);
            m.program.alloc_arg(derived)
        };
        assert_eq!(
            read_arg_value(&m.program, 0, elem).unwrap(),
            Value::I32(4)
        );

        let obj = read_arg_value(&m.program, 0, s)
            .unwrap()
            .as_ref_offset()
            .unwrap() as usize;
        assert_eq!(heap::slice_len(&m.program.memory, obj).unwrap(), 4);
        assert_eq!(heap::slice_cap(&m.program.memory, obj).unwrap(), 4);
    }

    #[test]
    fn test_len_of_slice_and_nil() {
        let (mut m, fun) = machine_with_main();
        let s = m.program.declare_local(fun, Argument::slice_of("s", TypeCode::I64));
        let n = m.program.declare_local(fun, Argument::new("n", TypeCode::I32));
        m.program.add_expression(
            fun,
            Expression::native(Opcode::Len)
                .with_inputs(vec![s])
                .with_outputs(vec![n]),
        );
        m.boot().unwrap();
        m.step().unwrap();
        assert_eq!(read_arg_value(&m.program, 0, n).unwrap(), Value::I32(0));
    }

    #[test]
    fn test_resize_then_copy() {
        let (mut m, fun) = machine_with_main();
        let src = m.program.declare_local(fun, Argument::slice_of("src", TypeCode::I32));
        let dst = m.program.declare_local(fun, Argument::slice_of("dst", TypeCode::I32));
        let count = m.program.declare_local(fun, Argument::new("n", TypeCode::I32));

        for v in [7, 8] {
            let lit = m.program.i32_literal_arg(v);
            m.program.add_expression(
                fun,
                Expression::native(Opcode::Append)
                    .with_inputs(vec![src, lit])
                    .with_outputs(vec![src]),
            );
        }
        let two = m.program.i32_literal_arg(2);
        m.program.add_expression(
            fun,
            Expression::native(Opcode::Resize)
                .with_inputs(vec![dst, two])
                .with_outputs(vec![dst]),
        );
        m.program.add_expression(
            fun,
            Expression::native(Opcode::Copy)
                .with_inputs(vec![dst, src])
                .with_outputs(vec![count]),
        );

        m.boot().unwrap();
        for _ in 0..4 {
            m.step().unwrap();
        }
        assert_eq!(read_arg_value(&m.program, 0, count).unwrap(), Value::I32(2));

        let idx = m.program.i32_literal_arg(1);
        let elem = {
            let derived = m.program.arg(dst).indexed(idx);
            m.program.alloc_arg(derived)
        };
        let off = final_offset(&m.program, 0, elem).unwrap();
        assert_eq!(memory::read_i32(&m.program.memory, off).unwrap(), 8);
    }
}
