use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}'")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal")]
    UnterminatedString { line: usize, column: usize },
    #[error("Invalid number literal '{literal}'")]
    InvalidNumber {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Invalid color literal '{literal}', expected #RRGGBB or #RRGGBBAA")]
    InvalidColor {
        literal: String,
        line: usize,
        column: usize,
    },
}

impl LexError {
    pub fn location(&self) -> (usize, usize) {
        match self {
            LexError::UnexpectedCharacter { line, column, .. }
            | LexError::UnterminatedString { line, column }
            | LexError::InvalidNumber { line, column, .. }
            | LexError::InvalidColor { line, column, .. } => (*line, *column),
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;
