//! `core.cast`: numeric conversion driven by the output operand's
//! declared type.

use crate::error::Result;
use crate::execute::{site_of, OpCtx};

pub fn cast(ctx: &mut OpCtx) -> Result<()> {
    let value = ctx.read(0)?;
    let target = {
        let arg = ctx.output_arg(0)?;
        site_of(ctx.prog, arg).type_code
    };
    let converted = value.cast_to(target)?;
    ctx.write(0, converted)
}

#[cfg(test)]
mod tests {
    use crate::execute::read_arg_value;
    use crate::machine::Machine;
    use crate::value::Value;
    use sable_spec::{
        Argument, Expression, Function, MachineConfig, Opcode, Program, TypeCode,
    };

    #[test]
    fn test_cast_i64_to_i32() {
        let config = MachineConfig::new(1024, 4096, 16384, 8).unwrap();
        let mut prog = Program::new(&config);
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("main", pkg));
        let out = prog.declare_local(fun, Argument::new("x", TypeCode::I32));
        let big = prog.i64_literal_arg(1 << 40 | 99);
        prog.add_expression(
            fun,
            Expression::native(Opcode::Cast)
                .with_inputs(vec![big])
                .with_outputs(vec![out]),
        );

        let mut m = Machine::new(prog, config).with_captured_output();
        m.boot().unwrap();
        m.step().unwrap();
        assert_eq!(read_arg_value(&m.program, 0, out).unwrap(), Value::I32(99));
    }
}
