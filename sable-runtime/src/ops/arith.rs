//! Arithmetic, bitwise, and shift opcodes.
//!
//! One generic implementation dispatches over the primitive type of the
//! inputs; the per-type arms are generated from the single enumeration
//! below rather than hand-unrolled per opcode.

use crate::error::{Result, RuntimeError};
use crate::execute::OpCtx;
use crate::value::Value;
use sable_spec::Opcode;

/// Apply a binary numeric opcode to two values of the same type.
pub fn apply_binary(op: Opcode, a: Value, b: Value) -> Result<Value> {
    macro_rules! int_arm {
        ($variant:ident, $x:expr, $y:expr) => {
            match op {
                Opcode::Add => Ok(Value::$variant($x.wrapping_add($y))),
                Opcode::Sub => Ok(Value::$variant($x.wrapping_sub($y))),
                Opcode::Mul => Ok(Value::$variant($x.wrapping_mul($y))),
                Opcode::Div => {
                    if $y == 0 {
                        Err(RuntimeError::DivisionByZero)
                    } else {
                        Ok(Value::$variant($x.wrapping_div($y)))
                    }
                }
                Opcode::Mod => {
                    if $y == 0 {
                        Err(RuntimeError::DivisionByZero)
                    } else {
                        Ok(Value::$variant($x.wrapping_rem($y)))
                    }
                }
                Opcode::BitAnd => Ok(Value::$variant($x & $y)),
                Opcode::BitOr => Ok(Value::$variant($x | $y)),
                Opcode::BitXor => Ok(Value::$variant($x ^ $y)),
                Opcode::Shl => Ok(Value::$variant($x.wrapping_shl($y as u32))),
                Opcode::Shr => Ok(Value::$variant($x.wrapping_shr($y as u32))),
                _ => Err(type_error(op)),
            }
        };
    }
    macro_rules! float_arm {
        ($variant:ident, $x:expr, $y:expr) => {
            match op {
                Opcode::Add => Ok(Value::$variant($x + $y)),
                Opcode::Sub => Ok(Value::$variant($x - $y)),
                Opcode::Mul => Ok(Value::$variant($x * $y)),
                Opcode::Div => Ok(Value::$variant($x / $y)),
                Opcode::Mod => Ok(Value::$variant($x % $y)),
                _ => Err(type_error(op)),
            }
        };
    }

    match (a, b) {
        (Value::I8(x), Value::I8(y)) => int_arm!(I8, x, y),
        (Value::I16(x), Value::I16(y)) => int_arm!(I16, x, y),
        (Value::I32(x), Value::I32(y)) => int_arm!(I32, x, y),
        (Value::I64(x), Value::I64(y)) => int_arm!(I64, x, y),
        (Value::UI8(x), Value::UI8(y)) => int_arm!(UI8, x, y),
        (Value::UI16(x), Value::UI16(y)) => int_arm!(UI16, x, y),
        (Value::UI32(x), Value::UI32(y)) => int_arm!(UI32, x, y),
        (Value::UI64(x), Value::UI64(y)) => int_arm!(UI64, x, y),
        (Value::F32(x), Value::F32(y)) => float_arm!(F32, x, y),
        (Value::F64(x), Value::F64(y)) => float_arm!(F64, x, y),
        (Value::Str(x), Value::Str(y)) if op == Opcode::Add => Ok(Value::Str(x + &y)),
        (a, b) => Err(RuntimeError::TypeMismatch {
            expected: a.type_code().name(),
            found: b.type_code().name(),
        }),
    }
}

/// Apply a unary numeric opcode.
pub fn apply_unary(op: Opcode, a: Value) -> Result<Value> {
    match (op, a) {
        (Opcode::Neg, Value::I8(x)) => Ok(Value::I8(x.wrapping_neg())),
        (Opcode::Neg, Value::I16(x)) => Ok(Value::I16(x.wrapping_neg())),
        (Opcode::Neg, Value::I32(x)) => Ok(Value::I32(x.wrapping_neg())),
        (Opcode::Neg, Value::I64(x)) => Ok(Value::I64(x.wrapping_neg())),
        (Opcode::Neg, Value::F32(x)) => Ok(Value::F32(-x)),
        (Opcode::Neg, Value::F64(x)) => Ok(Value::F64(-x)),
        (_, a) => Err(RuntimeError::TypeMismatch {
            expected: "signed numeric",
            found: a.type_code().name(),
        }),
    }
}

fn type_error(op: Opcode) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: "numeric operands",
        found: op.qualified_name(),
    }
}

pub fn binary(ctx: &mut OpCtx, op: Opcode) -> Result<()> {
    let a = ctx.read(0)?;
    let b = ctx.read(1)?;
    let result = apply_binary(op, a, b)?;
    ctx.write(0, result)
}

pub fn unary(ctx: &mut OpCtx, op: Opcode) -> Result<()> {
    let a = ctx.read(0)?;
    let result = apply_unary(op, a)?;
    ctx.write(0, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(
            apply_binary(Opcode::Add, Value::I32(3), Value::I32(4)).unwrap(),
            Value::I32(7)
        );
        assert_eq!(
            apply_binary(Opcode::Mul, Value::UI8(16), Value::UI8(16)).unwrap(),
            Value::UI8(0) // wraps
        );
        assert_eq!(
            apply_binary(Opcode::Mod, Value::I64(7), Value::I64(3)).unwrap(),
            Value::I64(1)
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            apply_binary(Opcode::Div, Value::I32(1), Value::I32(0)),
            Err(RuntimeError::DivisionByZero)
        ));
        assert!(matches!(
            apply_binary(Opcode::Mod, Value::UI64(1), Value::UI64(0)),
            Err(RuntimeError::DivisionByZero)
        ));
        // float division yields infinities instead
        assert_eq!(
            apply_binary(Opcode::Div, Value::F64(1.0), Value::F64(0.0)).unwrap(),
            Value::F64(f64::INFINITY)
        );
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert_eq!(
            apply_binary(Opcode::BitXor, Value::UI32(0b1100), Value::UI32(0b1010)).unwrap(),
            Value::UI32(0b0110)
        );
        assert_eq!(
            apply_binary(Opcode::Shl, Value::I32(1), Value::I32(4)).unwrap(),
            Value::I32(16)
        );
    }

    #[test]
    fn test_str_concat() {
        assert_eq!(
            apply_binary(Opcode::Add, Value::Str("ab".into()), Value::Str("cd".into())).unwrap(),
            Value::Str("abcd".into())
        );
        assert!(apply_binary(Opcode::Sub, Value::Str("a".into()), Value::Str("b".into())).is_err());
    }

    #[test]
    fn test_mixed_types_rejected() {
        assert!(matches!(
            apply_binary(Opcode::Add, Value::I32(1), Value::I64(2)),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_negation() {
        assert_eq!(apply_unary(Opcode::Neg, Value::I32(5)).unwrap(), Value::I32(-5));
        assert_eq!(apply_unary(Opcode::Neg, Value::F64(2.5)).unwrap(), Value::F64(-2.5));
        assert!(apply_unary(Opcode::Neg, Value::UI8(1)).is_err());
    }
}
