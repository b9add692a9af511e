//! Scalar access to the flat memory buffer.
//!
//! All values are little-endian; booleans are a single byte. This is
//! the same encoding the image codec uses, which is what lets memory be
//! snapshotted verbatim.

use crate::error::{Result, RuntimeError};

#[inline]
fn slice_at(mem: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    mem.get(offset..offset + len)
        .ok_or(RuntimeError::OutOfBounds { offset })
}

#[inline]
fn slice_at_mut(mem: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8]> {
    mem.get_mut(offset..offset + len)
        .ok_or(RuntimeError::OutOfBounds { offset })
}

pub fn read_bytes(mem: &[u8], offset: usize, len: usize) -> Result<Vec<u8>> {
    Ok(slice_at(mem, offset, len)?.to_vec())
}

pub fn write_bytes(mem: &mut [u8], offset: usize, bytes: &[u8]) -> Result<()> {
    slice_at_mut(mem, offset, bytes.len())?.copy_from_slice(bytes);
    Ok(())
}

/// Copy between two regions of the same buffer (may overlap).
pub fn copy(mem: &mut [u8], src: usize, dst: usize, len: usize) -> Result<()> {
    if src + len > mem.len() {
        return Err(RuntimeError::OutOfBounds { offset: src });
    }
    if dst + len > mem.len() {
        return Err(RuntimeError::OutOfBounds { offset: dst });
    }
    mem.copy_within(src..src + len, dst);
    Ok(())
}

macro_rules! scalar_access {
    ($read:ident, $write:ident, $ty:ty) => {
        pub fn $read(mem: &[u8], offset: usize) -> Result<$ty> {
            let bytes = slice_at(mem, offset, std::mem::size_of::<$ty>())?;
            Ok(<$ty>::from_le_bytes(bytes.try_into().expect("sized slice")))
        }

        pub fn $write(mem: &mut [u8], offset: usize, value: $ty) -> Result<()> {
            write_bytes(mem, offset, &value.to_le_bytes())
        }
    };
}

scalar_access!(read_i8, write_i8, i8);
scalar_access!(read_i16, write_i16, i16);
scalar_access!(read_i32, write_i32, i32);
scalar_access!(read_i64, write_i64, i64);
scalar_access!(read_u8, write_u8, u8);
scalar_access!(read_u16, write_u16, u16);
scalar_access!(read_u32, write_u32, u32);
scalar_access!(read_u64, write_u64, u64);
scalar_access!(read_f32, write_f32, f32);
scalar_access!(read_f64, write_f64, f64);

pub fn read_bool(mem: &[u8], offset: usize) -> Result<bool> {
    Ok(read_u8(mem, offset)? != 0)
}

pub fn write_bool(mem: &mut [u8], offset: usize, value: bool) -> Result<()> {
    write_u8(mem, offset, value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trips() {
        let mut mem = vec![0u8; 64];
        write_i32(&mut mem, 0, -7).unwrap();
        assert_eq!(read_i32(&mem, 0).unwrap(), -7);
        write_u64(&mut mem, 8, u64::MAX).unwrap();
        assert_eq!(read_u64(&mem, 8).unwrap(), u64::MAX);
        write_f64(&mut mem, 16, 2.5).unwrap();
        assert_eq!(read_f64(&mem, 16).unwrap(), 2.5);
        write_bool(&mut mem, 24, true).unwrap();
        assert!(read_bool(&mem, 24).unwrap());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut mem = vec![0u8; 8];
        write_u32(&mut mem, 0, 0x12345678).unwrap();
        assert_eq!(&mem[..4], &[0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut mem = vec![0u8; 4];
        assert!(matches!(
            read_u32(&mem, 1),
            Err(RuntimeError::OutOfBounds { offset: 1 })
        ));
        assert!(write_u64(&mut mem, 0, 1).is_err());
    }

    #[test]
    fn test_overlapping_copy() {
        let mut mem = vec![1, 2, 3, 4, 0, 0];
        copy(&mut mem, 0, 2, 4).unwrap();
        assert_eq!(mem, vec![1, 2, 1, 2, 3, 4]);
        assert!(copy(&mut mem, 4, 0, 4).is_err());
    }
}
