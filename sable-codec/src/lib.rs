//! # Sable Program Images
//!
//! Bit-exact binary encoding of a whole program plus its live memory:
//! fixed-width little-endian records in length-prefixed tables, with
//! index references instead of pointers so cyclic structure survives,
//! and the memory buffer embedded verbatim. A frozen mid-execution
//! program thaws into a value that resumes where it stopped.
//!
//! The first eight bytes are the magic number and the format version;
//! readers reject mismatched versions.

mod decode;
mod encode;
pub mod error;

pub use decode::deserialize;
pub use encode::serialize;
pub use error::{CodecError, Result};

/// Image magic, re-exported from the program model.
pub const MAGIC: u32 = sable_spec::IMAGE_MAGIC;

/// Image format version, re-exported from the program model.
pub const VERSION: u32 = sable_spec::IMAGE_VERSION;

/// Sentinel for absent optional indexes.
pub(crate) const NONE: u32 = u32::MAX;

/// Content digest of an image (SHA-256).
pub fn digest(image: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(image);
    hasher.finalize().into()
}
