//! Shared error sink for parsers and evaluators
//!
//! Every parser and evaluator borrows a `Log` handle injected at
//! construction and reports failures as `(message, position)` records.
//! Nothing in the runtime aborts on these; an embedder that wants strict
//! behavior reads the log and converts the first record into its own error.
//!
//! The handle is an explicit value, not process-global state: cloning a
//! `Log` shares the same record buffer, and the whole thing is
//! single-threaded by design (`Rc`, not `Arc`).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One reported error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    /// Character offset into the source text, when the reporter had one.
    pub position: Option<usize>,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} at position {}", self.message, pos),
            None => f.write_str(&self.message),
        }
    }
}

/// Cloneable handle to a shared record buffer.
#[derive(Debug, Clone, Default)]
pub struct Log {
    records: Rc<RefCell<Vec<LogRecord>>>,
}

impl Log {
    pub fn new() -> Self {
        Log::default()
    }

    /// Record an error with no source position.
    pub fn error(&self, message: impl Into<String>) {
        self.push(LogRecord {
            message: message.into(),
            position: None,
        });
    }

    /// Record an error at a character offset in the source being parsed.
    pub fn error_at(&self, message: impl Into<String>, position: usize) {
        self.push(LogRecord {
            message: message.into(),
            position: Some(position),
        });
    }

    fn push(&self, record: LogRecord) {
        tracing::warn!(position = ?record.position, "{}", record.message);
        self.records.borrow_mut().push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// The first recorded error, if any.
    pub fn first(&self) -> Option<LogRecord> {
        self.records.borrow().first().cloned()
    }

    /// Drain all records, leaving the log empty.
    pub fn take_all(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.records.borrow_mut())
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}
