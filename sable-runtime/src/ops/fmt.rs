//! `fmt.printf` / `fmt.sprintf`: the `%`-directive formatter.
//!
//! Recognized directives: `%s`, `%d` (any integer width), `%f`
//! (f32 with 7 decimals, f64 with 16), `%v` (any value). `\n` and `\%`
//! escapes are honored in the format string and in `%s` arguments.
//! A directive with no remaining argument renders `%!x(MISSING)`;
//! unconsumed arguments append `%!(EXTRA type=value, …)`.

use crate::error::Result;
use crate::execute::OpCtx;
use crate::value::Value;

fn unescape(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'%' => {
                    out.push(b'%');
                    i += 2;
                    continue;
                }
                b'n' => {
                    out.push(b'\n');
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn format_value(directive: u8, value: &Value) -> Vec<u8> {
    match directive {
        b's' => match value {
            Value::Str(s) => unescape(s),
            other => other.to_string().into_bytes(),
        },
        b'd' => match value {
            Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
            | Value::UI8(_)
            | Value::UI16(_)
            | Value::UI32(_)
            | Value::UI64(_) => value.to_string().into_bytes(),
            _ => Vec::new(),
        },
        b'f' => match value {
            Value::F32(v) => format!("{:.7}", v).into_bytes(),
            Value::F64(v) => format!("{:.16}", v).into_bytes(),
            _ => Vec::new(),
        },
        b'v' => value.to_string().into_bytes(),
        _ => Vec::new(),
    }
}

/// Render the directive stream against the expression's inputs.
/// Input 0 is the format string; inputs 1.. feed the directives.
fn build_string(ctx: &OpCtx) -> Result<Vec<u8>> {
    let fmt = ctx.read(0)?.as_str()?.to_string();
    let bytes = fmt.as_bytes();
    let n_inputs = ctx.n_inputs();

    let mut out = Vec::with_capacity(bytes.len());
    let mut consumed = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let ch = bytes[i];
        let next = bytes.get(i + 1).copied().unwrap_or(0);
        if ch == b'\\' {
            match next {
                b'%' => {
                    out.push(b'%');
                    i += 2;
                    continue;
                }
                b'n' => {
                    out.push(b'\n');
                    i += 2;
                    continue;
                }
                _ => {
                    out.push(ch);
                    i += 1;
                    continue;
                }
            }
        }
        if ch == b'%' {
            if consumed + 1 == n_inputs {
                out.extend_from_slice(format!("%!{}(MISSING)", next as char).as_bytes());
                i += 2;
                continue;
            }
            let value = ctx.read(consumed + 1)?;
            out.extend_from_slice(&format_value(next, &value));
            consumed += 1;
            i += 2;
            continue;
        }
        out.push(ch);
        i += 1;
    }

    if consumed != n_inputs.saturating_sub(1) {
        out.extend_from_slice(b"%!(EXTRA ");
        let extra = consumed + 1..n_inputs;
        let last = n_inputs - 1;
        for idx in extra {
            let arg = ctx.input_arg(idx)?;
            let type_name = match arg.custom_type {
                Some(sref) => ctx.prog.strct(sref).name.clone(),
                None => arg.type_code.name().to_string(),
            };
            let value = ctx.read(idx)?;
            out.extend_from_slice(type_name.as_bytes());
            out.push(b'=');
            out.extend_from_slice(value.to_string().as_bytes());
            if idx != last {
                out.extend_from_slice(b", ");
            }
        }
        out.push(b')');
    }

    Ok(out)
}

pub fn printf(ctx: &mut OpCtx) -> Result<()> {
    let bytes = build_string(ctx)?;
    ctx.io.write(&bytes)?;
    Ok(())
}

pub fn sprintf(ctx: &mut OpCtx) -> Result<()> {
    let bytes = build_string(ctx)?;
    let s = String::from_utf8_lossy(&bytes).into_owned();
    ctx.write(0, Value::Str(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;
    use sable_spec::{Argument, Expression, Function, MachineConfig, Opcode, Program, TypeCode};

    fn run_printf(build: impl FnOnce(&mut Program) -> Vec<sable_spec::ArgId>) -> String {
        let config = MachineConfig::new(1024, 4096, 16384, 8).unwrap();
        let mut prog = Program::new(&config);
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("main", pkg));
        let inputs = build(&mut prog);
        prog.add_expression(fun, Expression::native(Opcode::Printf).with_inputs(inputs));
        let mut m = Machine::new(prog, config).with_captured_output();
        m.run().unwrap();
        m.output()
    }

    #[test]
    fn test_d_directive() {
        let out = run_printf(|prog| {
            let f = prog.str_literal_arg("%d");
            let v = prog.i32_literal_arg(42);
            vec![f, v]
        });
        assert_eq!(out, "42");
    }

    #[test]
    fn test_newline_escape_and_literal_text() {
        let out = run_printf(|prog| {
            let f = prog.str_literal_arg("a\\nb \\% %d!");
            let v = prog.i64_literal_arg(-3);
            vec![f, v]
        });
        assert_eq!(out, "a\nb % -3!");
    }

    #[test]
    fn test_f_directive_widths() {
        let out = run_printf(|prog| {
            let f = prog.str_literal_arg("%f|%f");
            let a = prog.f32_literal_arg(1.5);
            let b = prog.f64_literal_arg(0.25);
            vec![f, a, b]
        });
        assert_eq!(out, "1.5000000|0.2500000000000000");
    }

    #[test]
    fn test_s_and_v_directives() {
        let out = run_printf(|prog| {
            let f = prog.str_literal_arg("%s=%v");
            let s = prog.str_literal_arg("flag");
            let b = prog.bool_literal_arg(true);
            vec![f, s, b]
        });
        assert_eq!(out, "flag=true");
    }

    #[test]
    fn test_missing_argument() {
        let out = run_printf(|prog| {
            let f = prog.str_literal_arg("%d %d");
            let v = prog.i32_literal_arg(1);
            vec![f, v]
        });
        assert_eq!(out, "1 %!d(MISSING)");
    }

    #[test]
    fn test_extra_arguments() {
        let out = run_printf(|prog| {
            let f = prog.str_literal_arg("%d");
            let a = prog.i32_literal_arg(1);
            let b = prog.i32_literal_arg(2);
            let c = prog.str_literal_arg("tail");
            vec![f, a, b, c]
        });
        assert_eq!(out, "1%!(EXTRA i32=2, str=tail)");
    }

    #[test]
    fn test_sprintf_writes_string() {
        let config = MachineConfig::new(1024, 4096, 16384, 8).unwrap();
        let mut prog = Program::new(&config);
        let pkg = prog.add_package("main");
        let fun = prog.add_function(pkg, Function::new("main", pkg));
        let out = prog.declare_local(fun, Argument::new("s", TypeCode::Str));
        let f = prog.str_literal_arg("v=%d");
        let v = prog.i32_literal_arg(9);
        prog.add_expression(
            fun,
            Expression::native(Opcode::Sprintf)
                .with_inputs(vec![f, v])
                .with_outputs(vec![out]),
        );
        let mut m = Machine::new(prog, config).with_captured_output();
        m.boot().unwrap();
        m.step().unwrap();
        assert_eq!(
            crate::execute::read_arg_value(&m.program, 0, out).unwrap(),
            Value::Str("v=9".to_string())
        );
    }
}
