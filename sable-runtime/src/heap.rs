//! Heap allocation and the object model.
//!
//! Objects are bump-allocated and carry a 9-byte header:
//! `[forwarding: u32][mark: u8][size: u32]`, `size` including the
//! header. Strings are `[len: u32][bytes]` payloads; slices are
//! `[cap: u32][len: u32][elements]` payloads. Stack and data cells
//! refer to objects by the absolute offset of the header; zero is nil.
//!
//! When a request does not fit, the collector runs; if it still does
//! not fit the heap doubles up to the configured cap, and past the cap
//! allocation fails with heap exhaustion.

use crate::error::{Result, RuntimeError};
use crate::gc;
use crate::memory;
use sable_spec::{MachineConfig, Program};
use sable_spec::{OBJECT_HEADER_SIZE, SLICE_HEADER_SIZE, STR_HEADER_SIZE};

/// Offset of the mark byte within an object header.
pub const MARK_OFFSET: usize = 4;
/// Offset of the size word within an object header.
pub const SIZE_OFFSET: usize = 5;

/// Total size (header included) of the object at `obj`.
pub fn object_size(mem: &[u8], obj: usize) -> Result<usize> {
    Ok(memory::read_u32(mem, obj + SIZE_OFFSET)? as usize)
}

/// Allocate `payload` bytes; returns the absolute offset of the header.
pub fn allocate(prog: &mut Program, config: &MachineConfig, payload: usize) -> Result<usize> {
    let total = payload + OBJECT_HEADER_SIZE;

    if prog.heap_pointer + total > prog.heap_size {
        gc::collect(prog);
    }
    if prog.heap_pointer + total > prog.heap_size {
        grow(prog, config, total)?;
    }

    let obj = prog.heap_start + prog.heap_pointer;
    prog.heap_pointer += total;
    memory::write_u32(&mut prog.memory, obj, 0)?; // forwarding
    memory::write_u8(&mut prog.memory, obj + MARK_OFFSET, 0)?;
    memory::write_u32(&mut prog.memory, obj + SIZE_OFFSET, total as u32)?;
    Ok(obj)
}

/// Double the heap until `needed` more bytes fit, up to the cap.
fn grow(prog: &mut Program, config: &MachineConfig, needed: usize) -> Result<()> {
    let mut new_size = prog.heap_size.max(1);
    while prog.heap_pointer + needed > new_size {
        new_size *= 2;
        if new_size > config.max_heap_size {
            return Err(RuntimeError::HeapExhausted {
                requested: needed,
                cap: config.max_heap_size,
            });
        }
    }
    tracing::debug!(from = prog.heap_size, to = new_size, "heap grow");
    prog.heap_size = new_size;
    prog.memory
        .resize(prog.heap_start + prog.heap_size, 0);
    Ok(())
}

// ----------------------------------------------------------------------
// Strings

/// Allocate a string object; returns the header offset.
pub fn write_str_object(prog: &mut Program, config: &MachineConfig, s: &str) -> Result<usize> {
    let obj = allocate(prog, config, STR_HEADER_SIZE + s.len())?;
    memory::write_u32(&mut prog.memory, obj + OBJECT_HEADER_SIZE, s.len() as u32)?;
    memory::write_bytes(&mut prog.memory, obj + OBJECT_HEADER_SIZE + STR_HEADER_SIZE, s.as_bytes())?;
    Ok(obj)
}

/// Read the string object at `obj`; nil reads as the empty string.
pub fn read_str(mem: &[u8], obj: u32) -> Result<String> {
    if obj == 0 {
        return Ok(String::new());
    }
    let obj = obj as usize;
    let len = memory::read_u32(mem, obj + OBJECT_HEADER_SIZE)? as usize;
    let bytes = memory::read_bytes(mem, obj + OBJECT_HEADER_SIZE + STR_HEADER_SIZE, len)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ----------------------------------------------------------------------
// Slices

/// Allocate a slice object with the given capacity and length zero.
pub fn new_slice(
    prog: &mut Program,
    config: &MachineConfig,
    cap: usize,
    elem_size: usize,
) -> Result<usize> {
    let obj = allocate(prog, config, SLICE_HEADER_SIZE + cap * elem_size)?;
    memory::write_u32(&mut prog.memory, obj + OBJECT_HEADER_SIZE, cap as u32)?;
    memory::write_u32(&mut prog.memory, obj + OBJECT_HEADER_SIZE + 4, 0)?;
    Ok(obj)
}

pub fn slice_cap(mem: &[u8], obj: usize) -> Result<usize> {
    Ok(memory::read_u32(mem, obj + OBJECT_HEADER_SIZE)? as usize)
}

pub fn slice_len(mem: &[u8], obj: usize) -> Result<usize> {
    Ok(memory::read_u32(mem, obj + OBJECT_HEADER_SIZE + 4)? as usize)
}

pub fn slice_set_len(mem: &mut [u8], obj: usize, len: usize) -> Result<()> {
    memory::write_u32(mem, obj + OBJECT_HEADER_SIZE + 4, len as u32)
}

/// Absolute offset of element `i`, bounds-checked against the length.
pub fn slice_elem_offset(mem: &[u8], obj: usize, index: usize, elem_size: usize) -> Result<usize> {
    let len = slice_len(mem, obj)?;
    if index >= len {
        return Err(RuntimeError::IndexOutOfBounds {
            index: index as i64,
            length: len,
        });
    }
    Ok(obj + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE + index * elem_size)
}

/// Append one element to the slice referenced by the cell at
/// `cell_off`. The cell is re-read after any allocation because a
/// collection may have moved the object; the cell itself is a root and
/// gets rewritten. Returns the (possibly new) object offset.
pub fn slice_append(
    prog: &mut Program,
    config: &MachineConfig,
    cell_off: usize,
    elem: &[u8],
    elem_size: usize,
) -> Result<usize> {
    let obj = memory::read_u32(&prog.memory, cell_off)? as usize;
    let (len, cap) = if obj == 0 {
        (0, 0)
    } else {
        (slice_len(&prog.memory, obj)?, slice_cap(&prog.memory, obj)?)
    };

    let target = if len < cap {
        obj
    } else {
        let new_cap = if cap == 0 { 1 } else { cap * 2 };
        let new_obj = new_slice(prog, config, new_cap, elem_size)?;
        let old = memory::read_u32(&prog.memory, cell_off)? as usize;
        if old != 0 {
            memory::copy(
                &mut prog.memory,
                old + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE,
                new_obj + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE,
                len * elem_size,
            )?;
        }
        new_obj
    };

    slice_set_len(&mut prog.memory, target, len + 1)?;
    let elem_off = target + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE + len * elem_size;
    memory::write_bytes(&mut prog.memory, elem_off, elem)?;
    Ok(target)
}

/// Set the length of the slice referenced by the cell at `cell_off`,
/// reallocating when the capacity is exceeded. Returns the (possibly
/// new) object offset.
pub fn slice_resize(
    prog: &mut Program,
    config: &MachineConfig,
    cell_off: usize,
    new_len: usize,
    elem_size: usize,
) -> Result<usize> {
    let obj = memory::read_u32(&prog.memory, cell_off)? as usize;
    let (len, cap) = if obj == 0 {
        (0, 0)
    } else {
        (slice_len(&prog.memory, obj)?, slice_cap(&prog.memory, obj)?)
    };

    let target = if new_len <= cap {
        obj
    } else {
        let new_obj = new_slice(prog, config, new_len, elem_size)?;
        let old = memory::read_u32(&prog.memory, cell_off)? as usize;
        if old != 0 {
            memory::copy(
                &mut prog.memory,
                old + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE,
                new_obj + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE,
                len * elem_size,
            )?;
        }
        new_obj
    };
    if target != 0 {
        slice_set_len(&mut prog.memory, target, new_len)?;
    }
    Ok(target)
}

/// Copy `min(dst.len, src.len)` elements from `src` into `dst`;
/// returns the copied count.
pub fn slice_copy(mem: &mut [u8], dst: usize, src: usize, elem_size: usize) -> Result<usize> {
    if dst == 0 || src == 0 {
        return Ok(0);
    }
    let count = slice_len(mem, dst)?.min(slice_len(mem, src)?);
    memory::copy(
        mem,
        src + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE,
        dst + OBJECT_HEADER_SIZE + SLICE_HEADER_SIZE,
        count * elem_size,
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_spec::NULL_HEAP_ADDRESS_OFFSET;

    fn setup() -> (Program, MachineConfig) {
        let config = MachineConfig::new(256, 512, 2048, 8).unwrap();
        (Program::new(&config), config)
    }

    #[test]
    fn test_allocate_writes_header_and_bumps() {
        let (mut prog, config) = setup();
        let obj = allocate(&mut prog, &config, 7).unwrap();
        assert_eq!(obj, prog.heap_start + NULL_HEAP_ADDRESS_OFFSET);
        assert_eq!(object_size(&prog.memory, obj).unwrap(), 7 + OBJECT_HEADER_SIZE);
        assert_eq!(
            prog.heap_pointer,
            NULL_HEAP_ADDRESS_OFFSET + 7 + OBJECT_HEADER_SIZE
        );

        let next = allocate(&mut prog, &config, 3).unwrap();
        assert_eq!(next, obj + 7 + OBJECT_HEADER_SIZE);
    }

    #[test]
    fn test_heap_growth_doubles_to_cap() {
        let (mut prog, config) = setup();
        // nothing is rooted, but nothing is collectable either until
        // objects exist; a single oversized request forces growth
        let obj = allocate(&mut prog, &config, 900).unwrap();
        assert!(prog.heap_size > 512);
        assert!(prog.heap_size <= config.max_heap_size);
        assert_eq!(object_size(&prog.memory, obj).unwrap(), 909);
    }

    #[test]
    fn test_heap_exhaustion_past_cap() {
        let (mut prog, config) = setup();
        let err = allocate(&mut prog, &config, 4096).unwrap_err();
        assert!(matches!(err, RuntimeError::HeapExhausted { .. }));
    }

    #[test]
    fn test_str_object_round_trip() {
        let (mut prog, config) = setup();
        let obj = write_str_object(&mut prog, &config, "hello").unwrap();
        assert_eq!(read_str(&prog.memory, obj as u32).unwrap(), "hello");
        assert_eq!(read_str(&prog.memory, 0).unwrap(), "");
    }

    #[test]
    fn test_slice_append_grows_capacity() {
        let (mut prog, config) = setup();
        // a data cell holding the slice reference
        let cell = prog.reserve_data(4);

        let mut obj = 0usize;
        for v in [1i32, 2, 3, 4] {
            obj = slice_append(&mut prog, &config, cell, &v.to_le_bytes(), 4).unwrap();
            memory::write_u32(&mut prog.memory, cell, obj as u32).unwrap();
        }
        assert_eq!(slice_len(&prog.memory, obj).unwrap(), 4);
        // capacities double 1, 2, 4
        assert_eq!(slice_cap(&prog.memory, obj).unwrap(), 4);
        let e2 = slice_elem_offset(&prog.memory, obj, 2, 4).unwrap();
        assert_eq!(memory::read_i32(&prog.memory, e2).unwrap(), 3);
    }

    #[test]
    fn test_slice_elem_bounds() {
        let (mut prog, config) = setup();
        let cell = prog.reserve_data(4);
        let obj = slice_append(&mut prog, &config, cell, &1i32.to_le_bytes(), 4).unwrap();
        assert!(matches!(
            slice_elem_offset(&prog.memory, obj, 1, 4),
            Err(RuntimeError::IndexOutOfBounds { index: 1, length: 1 })
        ));
    }

    #[test]
    fn test_slice_resize_and_copy() {
        let (mut prog, config) = setup();
        let src_cell = prog.reserve_data(4);
        let dst_cell = prog.reserve_data(4);

        let mut src = 0usize;
        for v in [10i32, 20] {
            src = slice_append(&mut prog, &config, src_cell, &v.to_le_bytes(), 4).unwrap();
            memory::write_u32(&mut prog.memory, src_cell, src as u32).unwrap();
        }
        let dst = slice_resize(&mut prog, &config, dst_cell, 2, 4).unwrap();
        memory::write_u32(&mut prog.memory, dst_cell, dst as u32).unwrap();

        let copied = slice_copy(&mut prog.memory, dst, src, 4).unwrap();
        assert_eq!(copied, 2);
        let e1 = slice_elem_offset(&prog.memory, dst, 1, 4).unwrap();
        assert_eq!(memory::read_i32(&prog.memory, e1).unwrap(), 20);
    }
}
