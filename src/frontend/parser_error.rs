use thiserror::Error;

use crate::frontend::token::Span;

/// A syntax error with source location.
///
/// `line` and `col` are 1-based positions taken from the offending token.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{col}: {message}")]
pub struct ParserError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl ParserError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        ParserError {
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }
}
