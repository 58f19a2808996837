use thiserror::Error;

/// Typed errors produced while evaluating a script bar by bar.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Operation '{operation}' expected {expected}, got {got}")]
    TypeMismatch {
        operation: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("Undefined function '{name}'")]
    UndefinedFunction { name: String },
    #[error("Function '{name}' expected at least {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Function '{function}' is missing argument '{argument}'")]
    MissingArgument {
        function: String,
        argument: &'static str,
    },
    #[error("Invalid argument '{argument}' for '{function}': {message}")]
    InvalidArgument {
        function: String,
        argument: &'static str,
        message: String,
    },
    #[error("Cannot assign to built-in series '{name}'")]
    ReadOnlyVariable { name: String },
    #[error("'{name}' is not a numeric series and has no history")]
    NotSeries { name: String },
    #[error("Member access '.{name}' is only supported on names")]
    UnsupportedMember { name: String },
}
