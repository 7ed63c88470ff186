//! Instruction AST
//!
//! One node per source line. Function-form instructions carry their
//! arguments both as raw text and as cached expression ASTs, so evaluators
//! never re-parse; the `if` evaluator in particular picks which cached
//! branch AST to evaluate, it does not pre-evaluate both.

use crate::ast::ExpressionAst;
use std::fmt;

/// Assignment target under the `memory` root, e.g. `memory.a.b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPath {
    segments: Vec<String>,
}

impl MemoryPath {
    /// Build from the segments after `memory`. At least one segment is
    /// required; bare `memory` is not assignable.
    pub fn from_segments(segments: Vec<String>) -> Option<Self> {
        if segments.is_empty() || segments.iter().any(String::is_empty) {
            None
        } else {
            Some(MemoryPath { segments })
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Dotted key path without the `memory` prefix, as used by map access.
    pub fn key_path(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for MemoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memory.{}", self.segments.join("."))
    }
}

/// One function argument: source text plus its cached expression AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub text: String,
    pub ast: ExpressionAst,
}

/// Shared shape of the eight function-form instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub args: Vec<Argument>,
    /// Present when the source used `memory.path := f(...)`.
    pub result_path: Option<MemoryPath>,
}

impl FunctionCall {
    pub fn arg(&self, index: usize) -> &ExpressionAst {
        &self.args[index].ast
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }
}

/// The nine instruction kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionAst {
    /// `memory.path := expression`
    Assignment {
        target: MemoryPath,
        expression: ExpressionAst,
    },
    /// `send(target, message)`
    Send(FunctionCall),
    /// `if(condition, then_value, else_value)`
    If(FunctionCall),
    /// `create(method_name, version[, context])`
    Create(FunctionCall),
    /// `exit(agent_id)`
    Exit(FunctionCall),
    /// `parse(template, input)`
    Parse(FunctionCall),
    /// `build(template, values)`
    Build(FunctionCall),
    /// `method(name, body, version)`
    Method(FunctionCall),
    /// `destroy(method_name, version)`
    DestroyMethod(FunctionCall),
}

impl InstructionAst {
    /// The result target, for any form that can be assigned.
    pub fn result_path(&self) -> Option<&MemoryPath> {
        match self {
            InstructionAst::Assignment { target, .. } => Some(target),
            InstructionAst::Send(call)
            | InstructionAst::If(call)
            | InstructionAst::Create(call)
            | InstructionAst::Exit(call)
            | InstructionAst::Parse(call)
            | InstructionAst::Build(call)
            | InstructionAst::Method(call)
            | InstructionAst::DestroyMethod(call) => call.result_path.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_path_requires_segments() {
        assert!(MemoryPath::from_segments(vec![]).is_none());
        assert!(MemoryPath::from_segments(vec!["".to_string()]).is_none());
        let path = MemoryPath::from_segments(vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(path.key_path(), "a.b");
        assert_eq!(path.to_string(), "memory.a.b");
    }
}
