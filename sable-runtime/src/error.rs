//! Runtime error types.
//!
//! Runtime panics (out-of-bounds, nil dereference, division by zero,
//! stack overflow, heap exhaustion) unwind the interpreter loop and
//! poison the program value. OS-boundary failures are *not* errors;
//! they surface in-language as status codes.

use sable_codec::CodecError;
use sable_spec::SpecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("memory access out of bounds at offset {offset:#x}")]
    OutOfBounds { offset: usize },

    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("nil dereference")]
    NilDereference,

    #[error("division by zero")]
    DivisionByZero,

    #[error("stack overflow: frame exceeds stack of {stack_size} bytes")]
    StackOverflow { stack_size: usize },

    #[error("call stack overflow: capacity {capacity} frames")]
    CallStackOverflow { capacity: usize },

    #[error("heap exhausted: {requested} bytes requested, cap {cap}")]
    HeapExhausted { requested: usize, cap: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("operand {index} missing for {op}")]
    MissingOperand { op: &'static str, index: usize },

    #[error("panic: {message}")]
    Panic { message: String },

    #[error("no entry point: main.main is not defined")]
    NoEntryPoint,

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{file}:{line}: {source}")]
    At {
        file: String,
        line: usize,
        #[source]
        source: Box<RuntimeError>,
    },
}

impl RuntimeError {
    /// Attach a source location, once.
    pub fn at(self, file: &str, line: usize) -> Self {
        match self {
            err @ RuntimeError::At { .. } => err,
            err => RuntimeError::At {
                file: file.to_string(),
                line,
                source: Box::new(err),
            },
        }
    }

    /// The innermost error, past any location wrapper.
    pub fn root(&self) -> &RuntimeError {
        match self {
            RuntimeError::At { source, .. } => source.root(),
            err => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
