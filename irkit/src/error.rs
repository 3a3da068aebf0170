//! Error handling for IR construction
//!
//! Input errors are detected here before any backend call is made.
//! Backend failures (null handles, failed verification) are reported as
//! soon as the backend returns; none of them is retried.

use thiserror::Error;

/// Every way an IR construction step can fail
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    #[error("backend returned a null handle from {operation}")]
    BackendAllocationFailed { operation: &'static str },

    #[error("parameter type at index {index} is missing or belongs to another context")]
    InvalidParameterType { index: usize },

    #[error("function type has {count} parameters, more than the backend can address")]
    TooManyParameters { count: usize },

    #[error("argument index {index} is out of range for a function of arity {arity}")]
    ArgumentIndexOutOfRange { index: u32, arity: u32 },

    #[error("{operation} called before the builder was positioned in a block")]
    NoInsertionPoint { operation: &'static str },

    #[error("{operation} received an operand created in a different context")]
    CrossContextOperand { operation: &'static str },

    #[error("{operation} expected {expected}, found {found}")]
    OperandTypeMismatch {
        operation: &'static str,
        expected: String,
        found: String,
    },

    #[error("branch condition must be i1, found {found}")]
    ConditionMustBeBoolean { found: String },

    #[error("return expected {expected}, found {found}")]
    ReturnTypeMismatch { expected: String, found: String },

    #[error("function '{function}' failed verification{}", render_diagnostics(.diagnostics))]
    FunctionVerificationFailed {
        function: String,
        diagnostics: Option<String>,
    },

    #[error("module '{module}' failed verification{}", render_diagnostics(.diagnostics))]
    ModuleVerificationFailed {
        module: String,
        diagnostics: Option<String>,
    },

    #[error("expected an integer type, found {found}")]
    NotAnIntegerType { found: String },

    #[error("expected float or double, found {found}")]
    NotAFloatType { found: String },

    #[error("name {name:?} contains an interior NUL byte")]
    InvalidName { name: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

fn render_diagnostics(diagnostics: &Option<String>) -> String {
    match diagnostics {
        Some(text) => format!(":\n{}", text),
        None => String::new(),
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, IrError>;
