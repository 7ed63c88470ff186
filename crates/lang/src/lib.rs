//! AgeRun language front end
//!
//! Source text enters as single instruction lines and leaves as typed ASTs:
//! - Expressions: recursive-descent parser over the
//!   literal/accessor/binary-op grammar, plus a stateless evaluator.
//! - Instructions: a facade routing each line to one of nine specialized
//!   sub-parsers, with arguments cached as pre-parsed expression ASTs.
//! - Templates: the `{name}` placeholder engine behind `parse` and `build`.
//!
//! Every parser borrows a shared [`agerun_core::Log`] and reports errors as
//! `(message, character offset)` records.

pub mod ast;
pub mod error;
pub mod eval;
pub mod instruction;
pub mod instruction_parser;
pub mod parser;
pub mod template;

pub use ast::{BinaryOperator, ExpressionAst, MemoryBase};
pub use error::ParseError;
pub use eval::{EvalScope, Evaluated, apply_binary, evaluate};
pub use instruction::{Argument, FunctionCall, InstructionAst, MemoryPath};
pub use instruction_parser::InstructionParser;
pub use parser::ExpressionParser;
pub use template::{build_with_template, parse_with_template};
