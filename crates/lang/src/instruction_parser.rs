//! Instruction parsing: a facade over nine specialized sub-parsers
//!
//! Each instruction kind has its own parser type; the facade routes a source
//! line by peeling an optional `memory.path :=` prefix and inspecting the
//! first significant token. All parsers are reusable across lines and report
//! errors through the shared log with character offsets into the full line.
//!
//! The grammar shared by the eight function forms is handled once here:
//! the `name(args...)` envelope, and comma-separated arguments in which
//! quotes and parentheses nest. Every argument is re-parsed into an
//! expression AST and cached on the instruction node.

use crate::ast::ExpressionAst;
use crate::error::ParseError;
use crate::instruction::{Argument, FunctionCall, InstructionAst, MemoryPath};
use crate::parser::ExpressionParser;
use agerun_core::Log;

/// Facade: owns one instance of each specialized parser.
pub struct InstructionParser {
    log: Log,
    assignment: AssignmentInstructionParser,
    send: SendInstructionParser,
    condition: ConditionInstructionParser,
    create: CreateInstructionParser,
    exit: ExitInstructionParser,
    parse_input: ParseInstructionParser,
    build: BuildInstructionParser,
    method: MethodInstructionParser,
    destroy_method: DestroyMethodInstructionParser,
}

impl InstructionParser {
    pub fn new(log: Log) -> Self {
        InstructionParser {
            assignment: AssignmentInstructionParser::new(log.clone()),
            send: SendInstructionParser::new(log.clone()),
            condition: ConditionInstructionParser::new(log.clone()),
            create: CreateInstructionParser::new(log.clone()),
            exit: ExitInstructionParser::new(log.clone()),
            parse_input: ParseInstructionParser::new(log.clone()),
            build: BuildInstructionParser::new(log.clone()),
            method: MethodInstructionParser::new(log.clone()),
            destroy_method: DestroyMethodInstructionParser::new(log.clone()),
            log,
        }
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    /// Parse one source line as exactly one instruction.
    pub fn parse(&self, line: &str) -> Result<InstructionAst, ParseError> {
        let head = skip_ws(line, 0);
        if head >= line.len() {
            return Err(fail(&self.log, "empty instruction", head));
        }

        if let Some(assign_idx) = find_assign(line) {
            // `memory.path := f(...)` hands the target to the function
            // parser as a result path; any other right-hand side is a plain
            // assignment.
            let rhs = skip_ws(line, assign_idx + 2);
            if let Some((keyword, keyword_pos)) = head_keyword(line, rhs) {
                if is_function_keyword(keyword) && next_is_open_paren(line, keyword_pos + keyword.len()) {
                    let target = parse_memory_target(&line[..assign_idx], &self.log)?;
                    return self.dispatch(keyword, line, keyword_pos, Some(target));
                }
            }
            return self.assignment.parse(line);
        }

        let Some((keyword, keyword_pos)) = head_keyword(line, 0) else {
            return Err(fail(&self.log, "expected instruction", head));
        };
        if keyword == "memory" {
            // Assignment head without `:=`; let the assignment parser
            // produce the precise error.
            return self.assignment.parse(line);
        }
        if is_function_keyword(keyword) {
            return self.dispatch(keyword, line, keyword_pos, None);
        }
        Err(fail(
            &self.log,
            format!("unknown instruction '{}'", keyword),
            keyword_pos,
        ))
    }

    fn dispatch(
        &self,
        keyword: &str,
        line: &str,
        start: usize,
        result_path: Option<MemoryPath>,
    ) -> Result<InstructionAst, ParseError> {
        match keyword {
            "send" => self.send.parse(line, start, result_path),
            "if" => self.condition.parse(line, start, result_path),
            "create" => self.create.parse(line, start, result_path),
            "exit" => self.exit.parse(line, start, result_path),
            "parse" => self.parse_input.parse(line, start, result_path),
            "build" => self.build.parse(line, start, result_path),
            "method" => self.method.parse(line, start, result_path),
            "destroy" => self.destroy_method.parse(line, start, result_path),
            _ => Err(fail(
                &self.log,
                format!("unknown instruction '{}'", keyword),
                start,
            )),
        }
    }
}

fn is_function_keyword(word: &str) -> bool {
    matches!(
        word,
        "send" | "if" | "create" | "exit" | "parse" | "build" | "method" | "destroy"
    )
}

macro_rules! function_parser {
    ($(#[$doc:meta])* $name:ident, $keyword:literal, $min:literal..=$max:literal, $variant:ident) => {
        $(#[$doc])*
        pub struct $name {
            log: Log,
        }

        impl $name {
            pub fn new(log: Log) -> Self {
                $name { log }
            }

            pub fn parse(
                &self,
                line: &str,
                start: usize,
                result_path: Option<MemoryPath>,
            ) -> Result<InstructionAst, ParseError> {
                let call = parse_call(line, start, $keyword, $min..=$max, result_path, &self.log)?;
                Ok(InstructionAst::$variant(call))
            }
        }
    };
}

function_parser!(
    /// `send(target, message)`
    SendInstructionParser, "send", 2..=2, Send
);
function_parser!(
    /// `if(condition, then_value, else_value)`
    ConditionInstructionParser, "if", 3..=3, If
);
function_parser!(
    /// `create(method_name, version[, context])`
    CreateInstructionParser, "create", 2..=3, Create
);
function_parser!(
    /// `exit(agent_id)`
    ExitInstructionParser, "exit", 1..=1, Exit
);
function_parser!(
    /// `parse(template, input)`
    ParseInstructionParser, "parse", 2..=2, Parse
);
function_parser!(
    /// `build(template, values)`
    BuildInstructionParser, "build", 2..=2, Build
);
function_parser!(
    /// `method(name, body, version)`
    MethodInstructionParser, "method", 3..=3, Method
);
function_parser!(
    /// `destroy(method_name, version)`
    DestroyMethodInstructionParser, "destroy", 2..=2, DestroyMethod
);

/// `memory.path := expression`
pub struct AssignmentInstructionParser {
    log: Log,
}

impl AssignmentInstructionParser {
    pub fn new(log: Log) -> Self {
        AssignmentInstructionParser { log }
    }

    pub fn parse(&self, line: &str) -> Result<InstructionAst, ParseError> {
        let Some(assign_idx) = find_assign(line) else {
            let pos = skip_ws(line, 0);
            return Err(fail(&self.log, "expected ':=' in assignment", pos));
        };
        let target = parse_memory_target(&line[..assign_idx], &self.log)?;
        let rhs_start = skip_ws(line, assign_idx + 2);
        if rhs_start >= line.len() {
            return Err(fail(&self.log, "expected expression after ':='", rhs_start));
        }
        let expression = ExpressionParser::with_offset(
            &line[rhs_start..],
            self.log.clone(),
            rhs_start,
        )
        .parse_expression()?;
        Ok(InstructionAst::Assignment { target, expression })
    }
}

/// Skip ASCII/Unicode whitespace starting at a byte offset.
fn skip_ws(s: &str, pos: usize) -> usize {
    let rest = &s[pos..];
    pos + (rest.len() - rest.trim_start().len())
}

/// Byte index of a top-level `:=`, ignoring any inside string literals.
fn find_assign(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_quotes = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quotes => i += 1, // skip escaped char
            b'"' => in_quotes = !in_quotes,
            b':' if !in_quotes && bytes.get(i + 1) == Some(&b'=') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// First identifier at or after `pos`, with its byte offset.
fn head_keyword(line: &str, pos: usize) -> Option<(&str, usize)> {
    let start = skip_ws(line, pos);
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some((&rest[..end], start))
    }
}

fn next_is_open_paren(line: &str, pos: usize) -> bool {
    let at = skip_ws(line, pos);
    line.as_bytes().get(at) == Some(&b'(')
}

/// Parse the assignment target to the left of `:=`: `memory(.identifier)+`.
fn parse_memory_target(text: &str, log: &Log) -> Result<MemoryPath, ParseError> {
    let start = skip_ws(text, 0);
    let rest = text[start..].trim_end();
    let mut components = rest.split('.');
    let head = components.next().unwrap_or("");
    if head != "memory" {
        return Err(fail(log, "assignment target must start with 'memory'", start));
    }
    let segments: Vec<String> = components.map(str::to_string).collect();
    for segment in &segments {
        let valid = !segment.is_empty()
            && segment.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(fail(log, "invalid assignment target path", start));
        }
    }
    MemoryPath::from_segments(segments)
        .ok_or_else(|| fail(log, "cannot assign to bare 'memory'", start))
}

/// Parse the `keyword(args...)` envelope shared by all function forms, with
/// the allowed argument-count range, and cache an expression AST per
/// argument.
fn parse_call(
    line: &str,
    start: usize,
    keyword: &str,
    arity: std::ops::RangeInclusive<usize>,
    result_path: Option<MemoryPath>,
    log: &Log,
) -> Result<FunctionCall, ParseError> {
    let mut pos = skip_ws(line, start);
    if !line[pos..].starts_with(keyword) {
        return Err(fail(log, format!("expected '{}'", keyword), pos));
    }
    pos += keyword.len();
    pos = skip_ws(line, pos);
    if line.as_bytes().get(pos) != Some(&b'(') {
        return Err(fail(log, format!("expected '(' after '{}'", keyword), pos));
    }
    let open_paren = pos;
    let (raw_args, after_close) = split_arguments(line, pos + 1, log)?;
    let trailing = skip_ws(line, after_close);
    if trailing < line.len() {
        return Err(fail(log, "unexpected characters after instruction", trailing));
    }
    if !arity.contains(&raw_args.len()) {
        return Err(fail(
            log,
            format!(
                "'{}' takes {} to {} arguments, got {}",
                keyword,
                arity.start(),
                arity.end(),
                raw_args.len()
            ),
            open_paren,
        ));
    }

    let mut args = Vec::with_capacity(raw_args.len());
    for (text, offset) in raw_args {
        let ast = parse_argument(&text, offset, log)?;
        args.push(Argument { text, ast });
    }
    Ok(FunctionCall { args, result_path })
}

fn parse_argument(text: &str, offset: usize, log: &Log) -> Result<ExpressionAst, ParseError> {
    ExpressionParser::with_offset(text, log.clone(), offset).parse_expression()
}

/// Split top-level comma-separated arguments starting just after `(`.
/// Quotes and parentheses nest; each argument is trimmed. Returns the
/// arguments with their byte offsets and the position after `)`.
fn split_arguments(
    line: &str,
    args_start: usize,
    log: &Log,
) -> Result<(Vec<(String, usize)>, usize), ParseError> {
    let bytes = line.as_bytes();
    let mut pieces: Vec<(usize, usize)> = Vec::new(); // [start, end) of raw pieces
    let mut piece_start = args_start;
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut i = args_start;
    let close = loop {
        if i >= bytes.len() {
            return Err(fail(log, "expected ')' to close argument list", i));
        }
        match bytes[i] {
            b'\\' if in_quotes => i += 1,
            b'"' => in_quotes = !in_quotes,
            b'(' if !in_quotes => depth += 1,
            b')' if !in_quotes => {
                if depth == 0 {
                    pieces.push((piece_start, i));
                    break i;
                }
                depth -= 1;
            }
            b',' if !in_quotes && depth == 0 => {
                pieces.push((piece_start, i));
                piece_start = i + 1;
            }
            _ => {}
        }
        i += 1;
    };

    let mut args = Vec::new();
    for (raw_start, raw_end) in &pieces {
        let raw = &line[*raw_start..*raw_end];
        let leading = raw.len() - raw.trim_start().len();
        let trimmed = raw.trim();
        args.push((trimmed.to_string(), raw_start + leading));
    }
    // `f()` scans one empty piece; that is zero arguments.
    if args.len() == 1 && args[0].0.is_empty() {
        args.clear();
    }
    if args.iter().any(|(text, _)| text.is_empty()) {
        return Err(fail(log, "empty argument", args_start));
    }
    Ok((args, close + 1))
}

fn fail(log: &Log, message: impl Into<String>, position: usize) -> ParseError {
    let message = message.into();
    log.error_at(message.clone(), position);
    ParseError { message, position }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, MemoryBase};

    fn parser() -> InstructionParser {
        InstructionParser::new(Log::new())
    }

    #[test]
    fn test_assignment() {
        let ast = parser().parse("memory.r := message.a + message.b").unwrap();
        match ast {
            InstructionAst::Assignment { target, expression } => {
                assert_eq!(target.key_path(), "r");
                assert!(matches!(
                    expression,
                    ExpressionAst::BinaryOp {
                        op: BinaryOperator::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_requires_memory_root() {
        assert!(parser().parse("message.x := 1").is_err());
        assert!(parser().parse("memory := 1").is_err());
    }

    #[test]
    fn test_send_two_arguments() {
        let ast = parser().parse(r#"send(0, message)"#).unwrap();
        match ast {
            InstructionAst::Send(call) => {
                assert_eq!(call.arg_count(), 2);
                assert!(call.result_path.is_none());
                assert_eq!(call.arg(0), &ExpressionAst::LiteralInt(0));
                assert_eq!(
                    call.arg(1),
                    &ExpressionAst::MemoryAccess {
                        base: MemoryBase::Message,
                        path: vec![],
                    }
                );
            }
            other => panic!("expected send, got {:?}", other),
        }
    }

    #[test]
    fn test_send_with_result_assignment() {
        let ast = parser()
            .parse("memory.ok := send(message.sender, memory.r)")
            .unwrap();
        match ast {
            InstructionAst::Send(call) => {
                assert_eq!(
                    call.result_path.as_ref().map(|p| p.key_path()),
                    Some("ok".to_string())
                );
            }
            other => panic!("expected send, got {:?}", other),
        }
    }

    #[test]
    fn test_send_arity_enforced() {
        assert!(parser().parse("send(1)").is_err());
        assert!(parser().parse("send(1, 2, 3)").is_err());
    }

    #[test]
    fn test_if_three_arguments_with_nesting() {
        let ast = parser()
            .parse(r#"memory.grade := if(message.value >= 90, "A", "B")"#)
            .unwrap();
        match ast {
            InstructionAst::If(call) => {
                assert_eq!(call.arg_count(), 3);
                assert_eq!(
                    call.arg(1),
                    &ExpressionAst::LiteralString("A".to_string())
                );
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_arguments_nest_parens_and_quotes() {
        // The comma inside the quoted string and the parenthesized
        // expression must not split arguments.
        let ast = parser()
            .parse(r#"send(memory.id, "a, b" + (1 + 2))"#)
            .unwrap();
        match ast {
            InstructionAst::Send(call) => assert_eq!(call.arg_count(), 2),
            other => panic!("expected send, got {:?}", other),
        }
    }

    #[test]
    fn test_create_optional_context() {
        assert!(matches!(
            parser().parse(r#"create("echo", "1.0.0")"#),
            Ok(InstructionAst::Create(_))
        ));
        let ast = parser()
            .parse(r#"memory.id := create("router", "latest", memory.cfg)"#)
            .unwrap();
        match ast {
            InstructionAst::Create(call) => assert_eq!(call.arg_count(), 3),
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_exit_single_argument() {
        assert!(matches!(
            parser().parse("exit(memory.worker)"),
            Ok(InstructionAst::Exit(_))
        ));
        assert!(parser().parse("exit()").is_err());
    }

    #[test]
    fn test_parse_build_method_destroy() {
        assert!(matches!(
            parser().parse(r#"memory.parts := parse("{a}-{b}", message)"#),
            Ok(InstructionAst::Parse(_))
        ));
        assert!(matches!(
            parser().parse(r#"memory.text := build("v={x}", memory.vals)"#),
            Ok(InstructionAst::Build(_))
        ));
        assert!(matches!(
            parser().parse(r#"method(message.name, message.body, message.version)"#),
            Ok(InstructionAst::Method(_))
        ));
        assert!(matches!(
            parser().parse(r#"destroy("doubler", "1.0.0")"#),
            Ok(InstructionAst::DestroyMethod(_))
        ));
    }

    #[test]
    fn test_unknown_instruction() {
        let err = parser().parse("jump(1)").unwrap_err();
        assert_eq!(err.message, "unknown instruction 'jump'");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_trailing_characters_rejected() {
        assert!(parser().parse("send(1, 2) extra").is_err());
    }

    #[test]
    fn test_argument_errors_point_into_line() {
        let line = r#"send(1, memory.)"#;
        let err = parser().parse(line).unwrap_err();
        // Error position lands inside the second argument.
        assert!(err.position >= 8, "position {} in {:?}", err.position, line);
    }

    #[test]
    fn test_assignment_inside_string_is_not_split() {
        let ast = parser()
            .parse(r#"send(1, "path := value")"#)
            .unwrap();
        assert!(matches!(ast, InstructionAst::Send(_)));
    }

    #[test]
    fn test_parsers_are_reusable() {
        let p = parser();
        assert!(p.parse("send(1, 2)").is_ok());
        assert!(p.parse("send(oops").is_err());
        assert!(p.parse("send(3, 4)").is_ok());
    }
}
