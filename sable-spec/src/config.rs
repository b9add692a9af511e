//! # Machine Configuration
//!
//! Segment sizes and limits for a program's memory. Programs allocate
//! their full stack up front; the heap starts at `init_heap_size` and
//! doubles on demand until `max_heap_size`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Memory and call-stack limits for one program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Fixed stack segment size in bytes.
    pub stack_size: usize,
    /// Initial heap segment size in bytes.
    pub init_heap_size: usize,
    /// Hard cap for heap growth; allocation past this fails.
    pub max_heap_size: usize,
    /// Maximum number of simultaneously active call frames.
    pub call_stack_capacity: usize,
}

impl MachineConfig {
    /// Default: 1 MiB stack, 2 MiB initial heap, 64 MiB heap cap,
    /// 1000 frames.
    pub const DEFAULT: Self = Self {
        stack_size: 1 << 20,
        init_heap_size: 2 << 20,
        max_heap_size: 64 << 20,
        call_stack_capacity: 1000,
    };

    /// Create a configuration with validation.
    pub fn new(
        stack_size: usize,
        init_heap_size: usize,
        max_heap_size: usize,
        call_stack_capacity: usize,
    ) -> Result<Self, ConfigError> {
        if stack_size == 0 {
            return Err(ConfigError::ZeroStack);
        }
        if init_heap_size < crate::NULL_HEAP_ADDRESS_OFFSET + crate::OBJECT_HEADER_SIZE {
            return Err(ConfigError::HeapTooSmall);
        }
        if max_heap_size < init_heap_size {
            return Err(ConfigError::HeapCapBelowInitial);
        }
        if call_stack_capacity == 0 {
            return Err(ConfigError::ZeroCallStack);
        }
        Ok(Self {
            stack_size,
            init_heap_size,
            max_heap_size,
            call_stack_capacity,
        })
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    ZeroStack,
    HeapTooSmall,
    HeapCapBelowInitial,
    ZeroCallStack,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroStack => write!(f, "stack size must be non-zero"),
            ConfigError::HeapTooSmall => {
                write!(f, "initial heap cannot hold the reserved nil region")
            }
            ConfigError::HeapCapBelowInitial => {
                write!(f, "max heap size is below the initial heap size")
            }
            ConfigError::ZeroCallStack => write!(f, "call stack capacity must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}
