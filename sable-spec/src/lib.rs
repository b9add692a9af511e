//! # Sable Program Model
//!
//! Data model for a small statically-typed language executed by a
//! stack-based virtual machine over a flat, byte-addressed memory.
//!
//! ## Key pieces
//! - Closed primitive type system with pre-computed sizes and offsets
//! - Packages, structs, functions, and expressions, all index-linked
//! - Operand descriptors carrying the full dereference chain
//! - Fixed native opcode table keyed by `"package.function"` names
//! - Pre-run validation of structural invariants

pub mod ast;
pub mod config;
pub mod error;
pub mod opcode;
pub mod types;
pub mod validation;

pub use ast::{
    ArgId, ArgTags, Argument, CallFrame, Expression, ExprTags, FunRef, Function, Operator,
    Package, PkgId, Program, ScopeOp, Struct, StructRef,
};
pub use config::MachineConfig;
pub use error::SpecError;
pub use opcode::{register_core_packages, Opcode};
pub use types::{DeclSpecifier, DerefOp, PassBy, TypeCode};

/// Engine version stamped into every program.
pub const VERSION: &str = "0.3.0";

/// Magic number for serialized images: "SBLE" = 0x53424C45
pub const IMAGE_MAGIC: u32 = 0x5342_4C45;

/// Image format version; readers reject mismatches.
pub const IMAGE_VERSION: u32 = 0x0003_0000;

/// Width of an in-memory reference (heap or data offset), in bytes.
pub const POINTER_SIZE: usize = 4;

/// Heap object header: `[forwarding: u32][mark: u8][size: u32]`.
/// `size` includes the header itself.
pub const OBJECT_HEADER_SIZE: usize = 9;

/// Slice payload header: `[capacity: u32][length: u32]`.
pub const SLICE_HEADER_SIZE: usize = 8;

/// String payload header: `[length: u32]`.
pub const STR_HEADER_SIZE: usize = 4;

/// Bytes reserved at the heap base so a heap-relative offset of zero
/// never addresses a live object. Absolute offset 0 is the nil reference.
pub const NULL_HEAP_ADDRESS_OFFSET: usize = 4;
