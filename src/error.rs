use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::interpreter::RuntimeError;
use crate::lexer::LexError;
use crate::parser::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Runtime,
}

/// Any failure a script can produce, tagged with the stage that raised it.
///
/// Lexical and syntax errors render as `[line:col] message`; runtime errors
/// carry no location and render as `Runtime error: message`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    #[error("[{line}:{column}] {message}")]
    Lexical {
        message: String,
        line: usize,
        column: usize,
    },
    #[error("[{line}:{column}] {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl ScriptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::Lexical { .. } => ErrorKind::Lexical,
            ScriptError::Syntax { .. } => ErrorKind::Syntax,
            ScriptError::Runtime(_) => ErrorKind::Runtime,
        }
    }

    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            ScriptError::Lexical { line, column, .. }
            | ScriptError::Syntax { line, column, .. } => Some((*line, *column)),
            ScriptError::Runtime(_) => None,
        }
    }
}

impl From<LexError> for ScriptError {
    fn from(error: LexError) -> Self {
        let (line, column) = error.location();
        ScriptError::Lexical {
            message: error.to_string(),
            line,
            column,
        }
    }
}

impl From<ParseError> for ScriptError {
    fn from(error: ParseError) -> Self {
        ScriptError::Syntax {
            message: error.message,
            line: error.line,
            column: error.column,
        }
    }
}

/// Failures of script-list bookkeeping and script file access.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("No script at index {index} (there are {len})")]
    NoSuchScript { index: usize, len: usize },
    #[error("Script '{name}' has no file to save to")]
    NoPath { name: String },
    #[error("Failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
