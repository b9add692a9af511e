//! Image decoding errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bad magic: {found:#010x}")]
    BadMagic { found: u32 },

    #[error("image version mismatch: found {found:#010x}, expected {expected:#010x}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("truncated image at offset {offset}")]
    Truncated { offset: usize },

    #[error("malformed {record} record: {reason}")]
    MalformedRecord {
        record: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, CodecError>;
