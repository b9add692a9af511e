//! Mark-compact garbage collector.
//!
//! Stop-the-world, triggered on allocation failure. Roots are the
//! declared heap-reference operands of every active call frame
//! (resolved against that frame's pointer) plus heap-referencing
//! globals. Object shapes come from the root operand's specifier chain
//! and struct layout, so embedded references (struct fields, slice
//! elements) are traced without any per-object type information.
//!
//! Phases: mark from roots (the mark bit stops cycles), assign
//! forwarding offsets in a linear scan, rewrite every reachable
//! reference through the forwarding headers, then slide marked objects
//! down and zero the reclaimed tail. Data-segment objects sit below
//! `heap_start` and are neither marked nor moved.

use crate::heap::{MARK_OFFSET, SIZE_OFFSET};
use crate::memory;
use sable_spec::{Argument, DeclSpecifier, Program, StructRef, TypeCode};
use sable_spec::{NULL_HEAP_ADDRESS_OFFSET, OBJECT_HEADER_SIZE, POINTER_SIZE, SLICE_HEADER_SIZE};
use std::collections::HashSet;

/// What a 4-byte reference points at, for tracing.
#[derive(Clone, Debug)]
enum Shape {
    /// String object; no embedded references.
    Str,
    /// Payload with no embedded references.
    Blob,
    /// Slice object; `Some` when the elements are themselves references.
    Slice(Option<Box<Shape>>),
    /// Struct object; fields are traced by layout.
    Struct(StructRef),
}

/// Run a full collection.
pub fn collect(prog: &mut Program) {
    let roots = collect_roots(prog);

    let mut marked = 0usize;
    for &(cell, ref shape) in &roots {
        mark_cell(prog, cell, shape, &mut marked);
    }

    let live = assign_forwarding(prog);

    let mut visited = HashSet::new();
    for &(cell, ref shape) in &roots {
        rewrite_cell(prog, cell, shape, &mut visited);
    }

    let old_pointer = prog.heap_pointer;
    compact(prog, live);
    tracing::debug!(
        marked,
        reclaimed = old_pointer - prog.heap_pointer,
        heap_pointer = prog.heap_pointer,
        "gc"
    );
}

/// Root cells: absolute offsets of every declared heap-reference
/// operand, with the shape its value points at.
fn collect_roots(prog: &Program) -> Vec<(usize, Shape)> {
    let mut roots = Vec::new();

    for frame in &prog.call_stack {
        let fun = prog.function(frame.operator);
        for &id in &fun.list_of_pointers {
            let arg = prog.arg(id);
            let mut cell = arg.offset;
            if cell < prog.stack_size {
                cell += frame.frame_pointer;
            }
            roots.push((cell, shape_of(prog, arg)));
        }
    }

    for pkg in &prog.packages {
        for &id in &pkg.globals {
            let arg = prog.arg(id);
            if arg.is_heap_reference() {
                roots.push((arg.offset, shape_of(prog, arg)));
            }
        }
    }

    roots
}

/// Derive the pointed-at shape from an operand's declared type.
fn shape_of(prog: &Program, arg: &Argument) -> Shape {
    shape_from(prog, &arg.decl_specifiers, arg.type_code, arg.custom_type)
}

fn shape_from(
    prog: &Program,
    specs: &[DeclSpecifier],
    type_code: TypeCode,
    custom: Option<StructRef>,
) -> Shape {
    match specs.first() {
        Some(DeclSpecifier::Slice) => {
            let rest = &specs[1..];
            let elem_is_ref = matches!(
                rest.first(),
                Some(DeclSpecifier::Slice) | Some(DeclSpecifier::Pointer)
            ) || (rest.len() <= 1 && type_code.is_indirect());
            let elem = if elem_is_ref {
                Some(Box::new(shape_from(prog, rest, type_code, custom)))
            } else {
                None
            };
            Shape::Slice(elem)
        }
        Some(DeclSpecifier::Pointer) => match custom {
            Some(sref) => Shape::Struct(sref),
            None => Shape::Blob,
        },
        _ => {
            if type_code == TypeCode::Str || type_code == TypeCode::Aff {
                Shape::Str
            } else if let Some(sref) = custom {
                Shape::Struct(sref)
            } else {
                Shape::Blob
            }
        }
    }
}

/// Reference-holding fields of a struct, with their payload offsets.
fn struct_ref_fields(prog: &Program, sref: StructRef) -> Vec<(usize, Shape)> {
    let strct = prog.strct(sref);
    let mut out = Vec::new();
    for &f in &strct.fields {
        let field = prog.arg(f);
        if field.is_heap_reference() {
            out.push((field.offset, shape_of(prog, field)));
        }
    }
    out
}

fn mark_cell(prog: &mut Program, cell: usize, shape: &Shape, marked: &mut usize) {
    let Ok(target) = memory::read_u32(&prog.memory, cell) else {
        return;
    };
    mark_object(prog, target as usize, shape, marked);
}

fn mark_object(prog: &mut Program, obj: usize, shape: &Shape, marked: &mut usize) {
    if obj < prog.heap_start {
        // nil, or a permanent data-segment object
        return;
    }
    match memory::read_u8(&prog.memory, obj + MARK_OFFSET) {
        Ok(0) => {}
        _ => return, // already marked (cycle or alias)
    }
    let _ = memory::write_u8(&mut prog.memory, obj + MARK_OFFSET, 1);
    *marked += 1;

    match shape {
        Shape::Str | Shape::Blob => {}
        Shape::Slice(Some(elem)) => {
            let Ok(len) = memory::read_u32(&prog.memory, obj + OBJECT_HEADER_SIZE + 4) else {
                return;
            };
            for i in 0..len as usize {
                let cell = obj + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE + i * POINTER_SIZE;
                let elem_shape = (**elem).clone();
                mark_cell(prog, cell, &elem_shape, marked);
            }
        }
        Shape::Slice(None) => {}
        Shape::Struct(sref) => {
            for (offset, field_shape) in struct_ref_fields(prog, *sref) {
                mark_cell(prog, obj + OBJECT_HEADER_SIZE + offset, &field_shape, marked);
            }
        }
    }
}

/// Linear scan: give every marked object its post-compaction address.
/// Returns `(old, new, size)` triples in heap order.
fn assign_forwarding(prog: &mut Program) -> Vec<(usize, usize, usize)> {
    let mut live = Vec::new();
    let mut next = NULL_HEAP_ADDRESS_OFFSET;
    let mut cur = prog.heap_start + NULL_HEAP_ADDRESS_OFFSET;
    let end = prog.heap_start + prog.heap_pointer;

    while cur < end {
        let Ok(size) = memory::read_u32(&prog.memory, cur + SIZE_OFFSET) else {
            break;
        };
        let size = size as usize;
        if size == 0 {
            break; // corrupt header; stop scanning
        }
        let is_marked = memory::read_u8(&prog.memory, cur + MARK_OFFSET).unwrap_or(0) != 0;
        if is_marked {
            let new_abs = prog.heap_start + next;
            let _ = memory::write_u32(&mut prog.memory, cur, new_abs as u32);
            live.push((cur, new_abs, size));
            next += size;
        }
        cur += size;
    }
    live
}

fn forwarding_of(prog: &Program, obj: usize) -> usize {
    memory::read_u32(&prog.memory, obj).map(|v| v as usize).unwrap_or(obj)
}

/// Rewrite the reference in `cell` to the target's forwarding address,
/// then descend into the (still unmoved) target once.
fn rewrite_cell(prog: &mut Program, cell: usize, shape: &Shape, visited: &mut HashSet<usize>) {
    let Ok(old) = memory::read_u32(&prog.memory, cell) else {
        return;
    };
    let old = old as usize;
    if old < prog.heap_start {
        return;
    }
    let new = forwarding_of(prog, old);
    let _ = memory::write_u32(&mut prog.memory, cell, new as u32);
    if !visited.insert(old) {
        return;
    }

    match shape {
        Shape::Str | Shape::Blob | Shape::Slice(None) => {}
        Shape::Slice(Some(elem)) => {
            let Ok(len) = memory::read_u32(&prog.memory, old + OBJECT_HEADER_SIZE + 4) else {
                return;
            };
            for i in 0..len as usize {
                let elem_cell = old + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE + i * POINTER_SIZE;
                let elem_shape = (**elem).clone();
                rewrite_cell(prog, elem_cell, &elem_shape, visited);
            }
        }
        Shape::Struct(sref) => {
            for (offset, field_shape) in struct_ref_fields(prog, *sref) {
                rewrite_cell(prog, old + OBJECT_HEADER_SIZE + offset, &field_shape, visited);
            }
        }
    }
}

/// Slide marked objects down to their forwarding addresses, clear the
/// headers' mark and forwarding fields, and zero the reclaimed tail.
fn compact(prog: &mut Program, live: Vec<(usize, usize, usize)>) {
    let mut next = NULL_HEAP_ADDRESS_OFFSET;
    for (old, new_abs, size) in live {
        if old != new_abs {
            prog.memory.copy_within(old..old + size, new_abs);
        }
        let _ = memory::write_u32(&mut prog.memory, new_abs, 0);
        let _ = memory::write_u8(&mut prog.memory, new_abs + MARK_OFFSET, 0);
        next = (new_abs - prog.heap_start) + size;
    }
    let old_end = prog.heap_start + prog.heap_pointer;
    let new_end = prog.heap_start + next;
    prog.memory[new_end..old_end].fill(0);
    prog.heap_pointer = next;
}
