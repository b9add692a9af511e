//! Comparison and boolean-logic opcodes.

use crate::error::{Result, RuntimeError};
use crate::execute::OpCtx;
use crate::value::Value;
use sable_spec::Opcode;

/// Apply a comparison opcode; the result is always a bool.
pub fn apply_compare(op: Opcode, a: Value, b: Value) -> Result<Value> {
    macro_rules! ord_arm {
        ($x:expr, $y:expr) => {
            match op {
                Opcode::Eq => Ok(Value::Bool($x == $y)),
                Opcode::Ne => Ok(Value::Bool($x != $y)),
                Opcode::Lt => Ok(Value::Bool($x < $y)),
                Opcode::Gt => Ok(Value::Bool($x > $y)),
                Opcode::LtEq => Ok(Value::Bool($x <= $y)),
                Opcode::GtEq => Ok(Value::Bool($x >= $y)),
                _ => Err(RuntimeError::TypeMismatch {
                    expected: "comparison opcode",
                    found: op.qualified_name(),
                }),
            }
        };
    }

    match (a, b) {
        (Value::I8(x), Value::I8(y)) => ord_arm!(x, y),
        (Value::I16(x), Value::I16(y)) => ord_arm!(x, y),
        (Value::I32(x), Value::I32(y)) => ord_arm!(x, y),
        (Value::I64(x), Value::I64(y)) => ord_arm!(x, y),
        (Value::UI8(x), Value::UI8(y)) => ord_arm!(x, y),
        (Value::UI16(x), Value::UI16(y)) => ord_arm!(x, y),
        (Value::UI32(x), Value::UI32(y)) => ord_arm!(x, y),
        (Value::UI64(x), Value::UI64(y)) => ord_arm!(x, y),
        (Value::F32(x), Value::F32(y)) => ord_arm!(x, y),
        (Value::F64(x), Value::F64(y)) => ord_arm!(x, y),
        (Value::Str(x), Value::Str(y)) => ord_arm!(x, y),
        (Value::Bool(x), Value::Bool(y)) => match op {
            Opcode::Eq => Ok(Value::Bool(x == y)),
            Opcode::Ne => Ok(Value::Bool(x != y)),
            _ => Err(RuntimeError::TypeMismatch {
                expected: "bool equality",
                found: op.qualified_name(),
            }),
        },
        (a, b) => Err(RuntimeError::TypeMismatch {
            expected: a.type_code().name(),
            found: b.type_code().name(),
        }),
    }
}

pub fn compare(ctx: &mut OpCtx, op: Opcode) -> Result<()> {
    let a = ctx.read(0)?;
    let b = ctx.read(1)?;
    let result = apply_compare(op, a, b)?;
    ctx.write(0, result)
}

pub fn logic(ctx: &mut OpCtx, op: Opcode) -> Result<()> {
    let result = match op {
        Opcode::Not => Value::Bool(!ctx.read(0)?.as_bool()?),
        Opcode::And => Value::Bool(ctx.read(0)?.as_bool()? && ctx.read(1)?.as_bool()?),
        Opcode::Or => Value::Bool(ctx.read(0)?.as_bool()? || ctx.read(1)?.as_bool()?),
        other => {
            return Err(RuntimeError::TypeMismatch {
                expected: "logic opcode",
                found: other.qualified_name(),
            })
        }
    };
    ctx.write(0, result)
}
