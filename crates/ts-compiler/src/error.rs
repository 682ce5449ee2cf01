//! Compile-time errors. Every variant carries the file and line at which it
//! was raised (§7: compile-time errors are fatal, with no partial
//! compilation retained).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("{file}:{line}: unterminated block comment")]
    UnterminatedComment { file: String, line: usize },

    #[error("{file}:{line}: unterminated string literal")]
    UnterminatedString { file: String, line: usize },

    #[error("{file}:{line}: token exceeds the {max}-character buffer")]
    TokenTooLong { file: String, line: usize, max: usize },

    #[error("{file}:{line}: unexpected character {ch:?}")]
    UnexpectedChar { file: String, line: usize, ch: char },

    #[error("{file}:{line}: expected {expected}, found {found}")]
    UnexpectedToken { file: String, line: usize, expected: String, found: String },

    #[error("{file}:{line}: invalid name {name:?}: {reason}")]
    InvalidName { file: String, line: usize, name: String, reason: &'static str },

    #[error("{file}:{line}: object {class:?} is defined more than once")]
    DuplicateObject { file: String, line: usize, class: String },

    #[error("{file}:{line}: the Application object must declare a main state")]
    MissingApplicationMain { file: String, line: usize },

    #[error("{file}:{line}: timeout() may only be used inside a state")]
    TimeoutOutsideState { file: String, line: usize },

    #[error("{file}:{line}: duplicate case label in switch")]
    DuplicateCase { file: String, line: usize },

    #[error("{file}:{line}: duplicate default label in switch")]
    DuplicateDefault { file: String, line: usize },

    #[error("{file}:{line}: non-empty case must end in break or return")]
    CaseFallsThrough { file: String, line: usize },

    #[error("{file}:{line}: unknown symbol {name:?}")]
    UnknownSymbol { file: String, line: usize, name: String },

    #[error("{file}:{line}: cannot assign to {name:?}: {reason}")]
    AssignToImmutable { file: String, line: usize, name: String, reason: &'static str },

    #[error(transparent)]
    Core(#[from] ts_core::CoreError),
}

pub type CompileResult<T> = Result<T, CompileError>;
