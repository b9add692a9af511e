//! Final-offset computation, the interpreter's single hot path.
//!
//! Given a frame pointer and an operand descriptor, produce the byte
//! address of the operand's value: start from the stored offset
//! (frame-relative when it falls inside the stack segment, absolute
//! otherwise) and consume the dereference chain in order. Pointer and
//! slice links indirect through object headers; array and field links
//! stay in place.
//!
//! The computation is deterministic: the same operand against the same
//! memory always yields the same offset.

use crate::error::{Result, RuntimeError};
use crate::memory;
use sable_spec::{ArgId, Argument, DerefOp, Program, TypeCode};
use sable_spec::{OBJECT_HEADER_SIZE, SLICE_HEADER_SIZE};

/// Resolve the byte address of `id`'s value for a frame based at `fp`.
pub fn final_offset(prog: &Program, fp: usize, id: ArgId) -> Result<usize> {
    let arg = prog.arg(id);
    let mut base = arg.offset;
    if base < prog.stack_size {
        base += fp;
    }
    walk(prog, fp, arg, base)
}

/// Consume one descriptor's dereference chain starting at `base`.
fn walk(prog: &Program, fp: usize, arg: &Argument, mut base: usize) -> Result<usize> {
    let mut index_cursor = 0;
    let mut field_cursor = 0;
    let mut dim = 0;

    for &op in &arg.deref_operations {
        match op {
            DerefOp::Pointer => {
                let target = memory::read_u32(&prog.memory, base)? as usize;
                if target == 0 {
                    return Err(RuntimeError::NilDereference);
                }
                base = target + OBJECT_HEADER_SIZE;
            }
            DerefOp::Field => {
                let field_id = *arg.fields.get(field_cursor).ok_or(
                    RuntimeError::MissingOperand {
                        op: "field selector",
                        index: field_cursor,
                    },
                )?;
                field_cursor += 1;
                let field = prog.arg(field_id);
                base += field.offset;
                base = walk(prog, fp, field, base)?;
            }
            DerefOp::ArrayIndex => {
                let index = next_index(prog, fp, arg, &mut index_cursor)?;
                let length = *arg.lengths.get(dim).unwrap_or(&0);
                if index < 0 || index as usize >= length {
                    return Err(RuntimeError::IndexOutOfBounds { index, length });
                }
                let stride: usize =
                    arg.size * arg.lengths[dim + 1..].iter().product::<usize>();
                base += index as usize * stride;
                dim += 1;
            }
            DerefOp::Slice => {
                let index = next_index(prog, fp, arg, &mut index_cursor)?;
                let target = memory::read_u32(&prog.memory, base)? as usize;
                if target == 0 {
                    return Err(RuntimeError::NilDereference);
                }
                let length = memory::read_u32(
                    &prog.memory,
                    target + OBJECT_HEADER_SIZE + 4,
                )? as usize;
                if index < 0 || index as usize >= length {
                    return Err(RuntimeError::IndexOutOfBounds { index, length });
                }
                base = target
                    + OBJECT_HEADER_SIZE
                    + SLICE_HEADER_SIZE
                    + index as usize * arg.size;
            }
        }
    }
    Ok(base)
}

/// Evaluate the next indexing sub-operand as an integer.
fn next_index(
    prog: &Program,
    fp: usize,
    arg: &Argument,
    cursor: &mut usize,
) -> Result<i64> {
    let id = *arg.indexes.get(*cursor).ok_or(RuntimeError::MissingOperand {
        op: "index",
        index: *cursor,
    })?;
    *cursor += 1;
    let index_arg = prog.arg(id);
    let offset = final_offset(prog, fp, id)?;
    match index_arg.type_code {
        TypeCode::I8 => Ok(memory::read_i8(&prog.memory, offset)? as i64),
        TypeCode::I16 => Ok(memory::read_i16(&prog.memory, offset)? as i64),
        TypeCode::I32 => Ok(memory::read_i32(&prog.memory, offset)? as i64),
        TypeCode::I64 => Ok(memory::read_i64(&prog.memory, offset)?),
        TypeCode::UI8 => Ok(memory::read_u8(&prog.memory, offset)? as i64),
        TypeCode::UI16 => Ok(memory::read_u16(&prog.memory, offset)? as i64),
        TypeCode::UI32 => Ok(memory::read_u32(&prog.memory, offset)? as i64),
        TypeCode::UI64 => Ok(memory::read_u64(&prog.memory, offset)? as i64),
        other => Err(RuntimeError::TypeMismatch {
            expected: "integer index",
            found: other.name(),
        }),
    }
}
