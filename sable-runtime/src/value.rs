//! Typed value wrappers.
//!
//! Native opcode handlers never touch raw memory; the dispatcher reads
//! each input operand into a [`Value`], the handler computes over the
//! wrappers, and the outputs are written back through the canonical
//! offset computation.

use crate::error::{Result, RuntimeError};
use crate::memory;
use sable_spec::TypeCode;
use std::fmt;

/// One operand value, tagged with its primitive type.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    UI8(u8),
    UI16(u16),
    UI32(u32),
    UI64(u64),
    F32(f32),
    F64(f64),
    /// Resolved string contents.
    Str(String),
    /// Absolute memory offset of an object header (slices, pointers,
    /// affordance handles); zero is nil.
    Ref(u32),
    /// Opaque bytes (struct instances copied by value).
    Bytes(Vec<u8>),
}

impl Value {
    pub fn type_code(&self) -> TypeCode {
        match self {
            Value::Bool(_) => TypeCode::Bool,
            Value::I8(_) => TypeCode::I8,
            Value::I16(_) => TypeCode::I16,
            Value::I32(_) => TypeCode::I32,
            Value::I64(_) => TypeCode::I64,
            Value::UI8(_) => TypeCode::UI8,
            Value::UI16(_) => TypeCode::UI16,
            Value::UI32(_) => TypeCode::UI32,
            Value::UI64(_) => TypeCode::UI64,
            Value::F32(_) => TypeCode::F32,
            Value::F64(_) => TypeCode::F64,
            Value::Str(_) => TypeCode::Str,
            Value::Ref(_) => TypeCode::Pointer,
            Value::Bytes(_) => TypeCode::Custom,
        }
    }

    /// Decode a scalar of the given type from memory.
    pub fn decode(mem: &[u8], offset: usize, type_code: TypeCode) -> Result<Value> {
        Ok(match type_code {
            TypeCode::Bool => Value::Bool(memory::read_bool(mem, offset)?),
            TypeCode::I8 => Value::I8(memory::read_i8(mem, offset)?),
            TypeCode::I16 => Value::I16(memory::read_i16(mem, offset)?),
            TypeCode::I32 => Value::I32(memory::read_i32(mem, offset)?),
            TypeCode::I64 => Value::I64(memory::read_i64(mem, offset)?),
            TypeCode::UI8 => Value::UI8(memory::read_u8(mem, offset)?),
            TypeCode::UI16 => Value::UI16(memory::read_u16(mem, offset)?),
            TypeCode::UI32 => Value::UI32(memory::read_u32(mem, offset)?),
            TypeCode::UI64 => Value::UI64(memory::read_u64(mem, offset)?),
            TypeCode::F32 => Value::F32(memory::read_f32(mem, offset)?),
            TypeCode::F64 => Value::F64(memory::read_f64(mem, offset)?),
            TypeCode::Slice | TypeCode::Pointer | TypeCode::Aff | TypeCode::Func => {
                Value::Ref(memory::read_u32(mem, offset)?)
            }
            other => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "scalar",
                    found: other.name(),
                })
            }
        })
    }

    /// Encode this value into memory at `offset`. `Str` cannot be
    /// encoded here; it allocates and is handled by the dispatcher.
    pub fn encode(&self, mem: &mut [u8], offset: usize) -> Result<()> {
        match self {
            Value::Bool(v) => memory::write_bool(mem, offset, *v),
            Value::I8(v) => memory::write_i8(mem, offset, *v),
            Value::I16(v) => memory::write_i16(mem, offset, *v),
            Value::I32(v) => memory::write_i32(mem, offset, *v),
            Value::I64(v) => memory::write_i64(mem, offset, *v),
            Value::UI8(v) => memory::write_u8(mem, offset, *v),
            Value::UI16(v) => memory::write_u16(mem, offset, *v),
            Value::UI32(v) => memory::write_u32(mem, offset, *v),
            Value::UI64(v) => memory::write_u64(mem, offset, *v),
            Value::F32(v) => memory::write_f32(mem, offset, *v),
            Value::F64(v) => memory::write_f64(mem, offset, *v),
            Value::Ref(v) => memory::write_u32(mem, offset, *v),
            Value::Bytes(b) => memory::write_bytes(mem, offset, b),
            Value::Str(_) => Err(RuntimeError::TypeMismatch {
                expected: "scalar",
                found: "str",
            }),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(v) => Ok(v),
            other => Err(mismatch("str", other)),
        }
    }

    pub fn as_ref_offset(&self) -> Result<u32> {
        match self {
            Value::Ref(v) => Ok(*v),
            other => Err(mismatch("reference", other)),
        }
    }

    /// Integer widening for indexing and conversions.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::I8(v) => Ok(*v as i64),
            Value::I16(v) => Ok(*v as i64),
            Value::I32(v) => Ok(*v as i64),
            Value::I64(v) => Ok(*v),
            Value::UI8(v) => Ok(*v as i64),
            Value::UI16(v) => Ok(*v as i64),
            Value::UI32(v) => Ok(*v as i64),
            Value::UI64(v) => Ok(*v as i64),
            other => Err(mismatch("integer", other)),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::F32(v) => Ok(*v as f64),
            Value::F64(v) => Ok(*v),
            other => Err(mismatch("float", other)),
        }
    }

    /// Numeric conversion to the target primitive type (`core.cast`).
    pub fn cast_to(&self, target: TypeCode) -> Result<Value> {
        let wide: f64 = match self {
            Value::F32(v) => *v as f64,
            Value::F64(v) => *v,
            other => other.as_i64()? as f64,
        };
        // integer path avoids the float detour when both sides are integral
        let int: i64 = match self {
            Value::F32(v) => *v as i64,
            Value::F64(v) => *v as i64,
            other => other.as_i64()?,
        };
        Ok(match target {
            TypeCode::I8 => Value::I8(int as i8),
            TypeCode::I16 => Value::I16(int as i16),
            TypeCode::I32 => Value::I32(int as i32),
            TypeCode::I64 => Value::I64(int),
            TypeCode::UI8 => Value::UI8(int as u8),
            TypeCode::UI16 => Value::UI16(int as u16),
            TypeCode::UI32 => Value::UI32(int as u32),
            TypeCode::UI64 => Value::UI64(int as u64),
            TypeCode::F32 => Value::F32(wide as f32),
            TypeCode::F64 => Value::F64(wide),
            other => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "numeric target",
                    found: other.name(),
                })
            }
        })
    }
}

fn mismatch(expected: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected,
        found: found.type_code().name(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::UI8(v) => write!(f, "{}", v),
            Value::UI16(v) => write!(f, "{}", v),
            Value::UI32(v) => write!(f, "{}", v),
            Value::UI64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::Ref(v) => write!(f, "{:#x}", v),
            Value::Bytes(b) => write!(f, "{} bytes", b.len()),
        }
    }
}
