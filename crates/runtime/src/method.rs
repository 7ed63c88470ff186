//! Methods: named, versioned, compiled instruction sequences
//!
//! A method is compiled from line-oriented source when it is registered and
//! is immutable afterwards. The source text is retained so methods can be
//! persisted and recompiled on load.

use agerun_core::Version;
use agerun_lang::{InstructionAst, InstructionParser, ParseError};
use std::fmt;

/// A registered agent behavior.
#[derive(Debug)]
pub struct Method {
    name: String,
    version: Version,
    source: String,
    instructions: Vec<InstructionAst>,
}

impl Method {
    /// Compile line-oriented source into a method. Blank lines and lines
    /// starting with `#` are skipped; every other line must parse as
    /// exactly one instruction.
    pub fn compile(
        parser: &InstructionParser,
        name: impl Into<String>,
        version: Version,
        source: impl Into<String>,
    ) -> Result<Method, CompileError> {
        let name = name.into();
        let source = source.into();
        let mut instructions = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parser.parse(line) {
                Ok(instruction) => instructions.push(instruction),
                Err(error) => {
                    return Err(CompileError {
                        line: index + 1,
                        error,
                    });
                }
            }
        }
        Ok(Method {
            name,
            version,
            source,
            instructions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Original source text, retained for persistence.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn instructions(&self) -> &[InstructionAst] {
        &self.instructions
    }
}

/// A line of method source failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    /// 1-indexed source line.
    pub line: usize,
    pub error: ParseError,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
