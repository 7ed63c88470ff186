//! Expression AST
//!
//! Expressions are the value-producing half of the language: literals,
//! accessor paths rooted at `memory`/`message`/`context`, and binary
//! operations. Instruction arguments are parsed into these nodes once and
//! cached, so evaluation never re-tokenizes source text.

use std::fmt;

/// Root of an accessor path.
///
/// `memory` is the agent's mutable state, `message` the value currently
/// being processed, `context` the optional immutable map fixed at agent
/// creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBase {
    Memory,
    Message,
    Context,
}

impl MemoryBase {
    pub fn keyword(self) -> &'static str {
        match self {
            MemoryBase::Memory => "memory",
            MemoryBase::Message => "message",
            MemoryBase::Context => "context",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "memory" => Some(MemoryBase::Memory),
            "message" => Some(MemoryBase::Message),
            "context" => Some(MemoryBase::Context),
            _ => None,
        }
    }
}

/// Binary operators in precedence order: `* /` bind tightest, then `+ -`,
/// then `< <= > >=`, then `= <>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }

    /// True for `= <> < <= > >=`, whose results are integer 0/1.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::Less
                | BinaryOperator::LessEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterEqual
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionAst {
    LiteralInt(i64),
    LiteralDouble(f64),
    LiteralString(String),
    /// `base(.identifier)*` accessor. An empty path names the base value
    /// itself (e.g. bare `message`).
    MemoryAccess {
        base: MemoryBase,
        path: Vec<String>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<ExpressionAst>,
        right: Box<ExpressionAst>,
    },
}
