//! Spec-level error types: lookup failures, structural violations, and
//! the compile error surfaced by front-ends.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("package '{0}' not found")]
    PackageNotFound(String),

    #[error("function '{function}' not found in package '{package}'")]
    FunctionNotFound { package: String, function: String },

    #[error("struct '{strct}' not found in package '{package}'")]
    StructNotFound { package: String, strct: String },

    #[error("global '{0}' not found")]
    GlobalNotFound(String),

    #[error("field '{field}' not found in struct '{strct}'")]
    FieldNotFound { strct: String, field: String },

    #[error("duplicate field '{field}' in struct '{strct}'")]
    DuplicateField { strct: String, field: String },

    #[error("no current package selected")]
    NoCurrentPackage,

    #[error("operand '{0}' has an undefined type")]
    UndefinedType(String),

    #[error("malformed program: {reason}")]
    MalformedProgram { reason: String },

    #[error("{file}:{line}: {message}")]
    Compile {
        file: String,
        line: usize,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display() {
        let err = SpecError::Compile {
            file: "main.sbl".to_string(),
            line: 7,
            message: "expected ')'".to_string(),
        };
        assert_eq!(err.to_string(), "main.sbl:7: expected ')'");
    }

    #[test]
    fn test_lookup_error_display() {
        let err = SpecError::FunctionNotFound {
            package: "main".to_string(),
            function: "fact".to_string(),
        };
        assert_eq!(err.to_string(), "function 'fact' not found in package 'main'");
    }

    #[test]
    fn test_malformed_display() {
        let err = SpecError::MalformedProgram {
            reason: "jump exits function".to_string(),
        };
        assert!(err.to_string().contains("jump exits function"));
    }
}
