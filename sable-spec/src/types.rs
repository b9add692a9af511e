//! # Primitive Type System
//!
//! Every operand carries a fixed primitive type code plus a declaration
//! specifier chain that composes compound types. `[5][]*Point` is the
//! chain `[Array, Slice, Pointer, Struct]`, read left to right the way
//! the source text reads.
//!
//! Sizes are computed once at build time and stored on the operand;
//! the interpreter never walks types at runtime.

use crate::POINTER_SIZE;
use serde::{Deserialize, Serialize};

/// Primitive type code (fixed integer values, stable across images).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    Bool = 0,
    I8 = 1,
    I16 = 2,
    I32 = 3,
    I64 = 4,
    UI8 = 5,
    UI16 = 6,
    UI32 = 7,
    UI64 = 8,
    F32 = 9,
    F64 = 10,
    /// Heap-indirected byte string.
    Str = 11,
    /// Affordance handle.
    Aff = 12,
    /// User-defined struct; the operand's `custom_type` names it.
    Custom = 13,
    Undefined = 14,
    /// First-class function value.
    Func = 15,
    /// Unresolved identifier (builder scratch, invalid at run time).
    Identifier = 16,
    Slice = 17,
    Array = 18,
    Pointer = 19,
}

impl Default for TypeCode {
    fn default() -> Self {
        TypeCode::Undefined
    }
}

impl TypeCode {
    /// Scalar width in bytes. `Custom` has no intrinsic width (the
    /// struct's packed size governs); `Identifier`/`Undefined` occupy
    /// nothing.
    pub const fn size(self) -> usize {
        match self {
            TypeCode::Bool | TypeCode::I8 | TypeCode::UI8 => 1,
            TypeCode::I16 | TypeCode::UI16 => 2,
            TypeCode::I32 | TypeCode::UI32 | TypeCode::F32 => 4,
            TypeCode::I64 | TypeCode::UI64 | TypeCode::F64 => 8,
            TypeCode::Str
            | TypeCode::Aff
            | TypeCode::Func
            | TypeCode::Slice
            | TypeCode::Pointer => POINTER_SIZE,
            TypeCode::Custom | TypeCode::Undefined | TypeCode::Identifier | TypeCode::Array => 0,
        }
    }

    /// Display name, as written in source and in `%!(EXTRA …)` output.
    pub const fn name(self) -> &'static str {
        match self {
            TypeCode::Bool => "bool",
            TypeCode::I8 => "i8",
            TypeCode::I16 => "i16",
            TypeCode::I32 => "i32",
            TypeCode::I64 => "i64",
            TypeCode::UI8 => "ui8",
            TypeCode::UI16 => "ui16",
            TypeCode::UI32 => "ui32",
            TypeCode::UI64 => "ui64",
            TypeCode::F32 => "f32",
            TypeCode::F64 => "f64",
            TypeCode::Str => "str",
            TypeCode::Aff => "aff",
            TypeCode::Custom => "custom",
            TypeCode::Undefined => "undefined",
            TypeCode::Func => "func",
            TypeCode::Identifier => "ident",
            TypeCode::Slice => "slice",
            TypeCode::Array => "array",
            TypeCode::Pointer => "ptr",
        }
    }

    /// Try to convert from the stable integer value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TypeCode::Bool),
            1 => Some(TypeCode::I8),
            2 => Some(TypeCode::I16),
            3 => Some(TypeCode::I32),
            4 => Some(TypeCode::I64),
            5 => Some(TypeCode::UI8),
            6 => Some(TypeCode::UI16),
            7 => Some(TypeCode::UI32),
            8 => Some(TypeCode::UI64),
            9 => Some(TypeCode::F32),
            10 => Some(TypeCode::F64),
            11 => Some(TypeCode::Str),
            12 => Some(TypeCode::Aff),
            13 => Some(TypeCode::Custom),
            14 => Some(TypeCode::Undefined),
            15 => Some(TypeCode::Func),
            16 => Some(TypeCode::Identifier),
            17 => Some(TypeCode::Slice),
            18 => Some(TypeCode::Array),
            19 => Some(TypeCode::Pointer),
            _ => None,
        }
    }

    /// Whether a value of this code is an integer (signed or unsigned).
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            TypeCode::I8
                | TypeCode::I16
                | TypeCode::I32
                | TypeCode::I64
                | TypeCode::UI8
                | TypeCode::UI16
                | TypeCode::UI32
                | TypeCode::UI64
        )
    }

    /// Whether values of this code live behind a 4-byte reference.
    pub const fn is_indirect(self) -> bool {
        matches!(
            self,
            TypeCode::Str | TypeCode::Aff | TypeCode::Slice | TypeCode::Pointer
        )
    }
}

/// Declaration specifier: one link of a compound type chain.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclSpecifier {
    Basic = 0,
    Array = 1,
    Slice = 2,
    Pointer = 3,
    Struct = 4,
}

impl DeclSpecifier {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DeclSpecifier::Basic),
            1 => Some(DeclSpecifier::Array),
            2 => Some(DeclSpecifier::Slice),
            3 => Some(DeclSpecifier::Pointer),
            4 => Some(DeclSpecifier::Struct),
            _ => None,
        }
    }
}

/// Dereference operation, consumed in order while computing an operand's
/// runtime offset.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerefOp {
    /// Index into an in-place array; consumes one entry of `indexes`.
    ArrayIndex = 0,
    /// Select a struct field; consumes one entry of `fields`.
    Field = 1,
    /// Follow a 4-byte reference to a heap/data object's payload.
    Pointer = 2,
    /// Index into a heap slice; consumes one entry of `indexes` and
    /// range-checks against the slice header.
    Slice = 3,
}

impl DerefOp {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DerefOp::ArrayIndex),
            1 => Some(DerefOp::Field),
            2 => Some(DerefOp::Pointer),
            3 => Some(DerefOp::Slice),
            _ => None,
        }
    }
}

/// Calling convention for one operand.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassBy {
    #[default]
    Value = 0,
    Reference = 1,
}

impl PassBy {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PassBy::Value),
            1 => Some(PassBy::Reference),
            _ => None,
        }
    }
}

/// Total size of an array type: element size times every dimension.
pub fn array_total_size(elem_size: usize, lengths: &[usize]) -> usize {
    lengths.iter().product::<usize>() * elem_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(TypeCode::Bool.size(), 1);
        assert_eq!(TypeCode::I16.size(), 2);
        assert_eq!(TypeCode::I32.size(), 4);
        assert_eq!(TypeCode::UI64.size(), 8);
        assert_eq!(TypeCode::F32.size(), 4);
        assert_eq!(TypeCode::F64.size(), 8);
    }

    #[test]
    fn test_indirect_types_are_pointer_sized() {
        for tc in [TypeCode::Str, TypeCode::Aff, TypeCode::Slice, TypeCode::Pointer] {
            assert_eq!(tc.size(), POINTER_SIZE);
            assert!(tc.is_indirect());
        }
        assert!(!TypeCode::I32.is_indirect());
    }

    #[test]
    fn test_type_code_round_trip() {
        for v in 0..=19u8 {
            let tc = TypeCode::from_u8(v).unwrap();
            assert_eq!(tc as u8, v);
        }
        assert!(TypeCode::from_u8(20).is_none());
    }

    #[test]
    fn test_array_total_size() {
        // [5][]*Point: outer dimension 5 of pointer-sized elements
        assert_eq!(array_total_size(POINTER_SIZE, &[5]), 20);
        assert_eq!(array_total_size(4, &[2, 3]), 24);
        assert_eq!(array_total_size(4, &[]), 4);
    }

    #[test]
    fn test_deref_op_round_trip() {
        for v in 0..=3u8 {
            assert_eq!(DerefOp::from_u8(v).unwrap() as u8, v);
        }
        assert!(DerefOp::from_u8(4).is_none());
    }
}
