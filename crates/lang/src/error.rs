//! Parse errors with character offsets

use std::fmt;

/// Lexical or grammatical error in expression or instruction text.
///
/// The position is a character offset into the source line handed to the
/// parser that produced the error. Every parser also records its errors in
/// the shared [`agerun_core::Log`] before returning one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}
