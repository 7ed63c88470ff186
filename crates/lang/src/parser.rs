//! Recursive-descent expression parser
//!
//! Grammar:
//! ```text
//! expr       := equality
//! equality   := relational ( ('=' | '<>') relational )*
//! relational := additive ( ('<'|'<='|'>'|'>=') additive )*
//! additive   := term ( ('+' | '-') term )*
//! term       := primary ( ('*' | '/') primary )*
//! primary    := literal | mem_access | '(' expr ')'
//! literal    := signed_integer | signed_double | '"' chars '"'
//! mem_access := ('memory'|'message'|'context') ( '.' identifier )*
//! ```
//!
//! A `-` directly before digits at primary position is a sign, not an
//! operator. String literals support `\"` and `\\` escapes. The parser is
//! bound to one input string at construction and reports the first error
//! with a character offset; [`ExpressionParser::parse_expression`] rejects
//! trailing non-whitespace.

use crate::ast::{BinaryOperator, ExpressionAst, MemoryBase};
use crate::error::ParseError;
use agerun_core::Log;

pub struct ExpressionParser<'a> {
    input: &'a str,
    pos: usize,
    /// Added to every reported position, so errors in instruction arguments
    /// point into the full instruction line.
    offset: usize,
    log: Log,
}

impl<'a> ExpressionParser<'a> {
    pub fn new(input: &'a str, log: Log) -> Self {
        ExpressionParser {
            input,
            pos: 0,
            offset: 0,
            log,
        }
    }

    /// Parser whose reported positions are shifted by `offset`.
    pub fn with_offset(input: &'a str, log: Log, offset: usize) -> Self {
        ExpressionParser {
            input,
            pos: 0,
            offset,
            log,
        }
    }

    /// Current position, in the caller's coordinates.
    pub fn position(&self) -> usize {
        self.offset + self.pos
    }

    /// Parse the whole input as one expression. Trailing non-whitespace is
    /// an error.
    pub fn parse_expression(&mut self) -> Result<ExpressionAst, ParseError> {
        let expr = self.parse_equality()?;
        self.skip_whitespace();
        if self.current().is_some() {
            return Err(self.fail("unexpected characters after expression"));
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<ExpressionAst, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            self.skip_whitespace();
            // '=' here can only be equality: ':=' never reaches the
            // expression parser, and '<=' / '>=' are consumed below.
            if self.consume('=') {
                let right = self.parse_relational()?;
                left = binary(BinaryOperator::Equal, left, right);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_relational(&mut self) -> Result<ExpressionAst, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            self.skip_whitespace();
            let op = if self.consume('<') {
                if self.consume('=') {
                    BinaryOperator::LessEqual
                } else if self.consume('>') {
                    BinaryOperator::NotEqual
                } else {
                    BinaryOperator::Less
                }
            } else if self.consume('>') {
                if self.consume('=') {
                    BinaryOperator::GreaterEqual
                } else {
                    BinaryOperator::Greater
                }
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<ExpressionAst, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_whitespace();
            let op = if self.consume('+') {
                BinaryOperator::Add
            } else if self.consume('-') {
                BinaryOperator::Subtract
            } else {
                return Ok(left);
            };
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
    }

    fn parse_term(&mut self) -> Result<ExpressionAst, ParseError> {
        let mut left = self.parse_primary()?;
        loop {
            self.skip_whitespace();
            let op = if self.consume('*') {
                BinaryOperator::Multiply
            } else if self.consume('/') {
                BinaryOperator::Divide
            } else {
                return Ok(left);
            };
            let right = self.parse_primary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_primary(&mut self) -> Result<ExpressionAst, ParseError> {
        self.skip_whitespace();
        match self.current() {
            Some('(') => {
                self.advance();
                let expr = self.parse_equality()?;
                self.skip_whitespace();
                if !self.consume(')') {
                    return Err(self.fail("expected ')' after expression"));
                }
                Ok(expr)
            }
            Some('"') => self.parse_string_literal(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number_literal(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.parse_memory_access(),
            _ => Err(self.fail("expected literal, accessor, or '('")),
        }
    }

    fn parse_string_literal(&mut self) -> Result<ExpressionAst, ParseError> {
        self.advance(); // opening quote
        let mut content = String::new();
        loop {
            match self.current() {
                None => return Err(self.fail("unterminated string literal")),
                Some('"') => {
                    self.advance();
                    return Ok(ExpressionAst::LiteralString(content));
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('"') => {
                            content.push('"');
                            self.advance();
                        }
                        Some('\\') => {
                            content.push('\\');
                            self.advance();
                        }
                        _ => return Err(self.fail("invalid escape in string literal")),
                    }
                }
                Some(c) => {
                    content.push(c);
                    self.advance();
                }
            }
        }
    }

    fn parse_number_literal(&mut self) -> Result<ExpressionAst, ParseError> {
        let start = self.pos;
        if self.current() == Some('-') {
            self.advance();
            if !matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                return Err(self.fail("expected digits after '-'"));
            }
        }
        while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut has_dot = false;
        if self.current() == Some('.')
            && matches!(self.peek_next(), Some(c) if c.is_ascii_digit())
        {
            has_dot = true;
            self.advance();
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = &self.input[start..self.pos];
        if has_dot {
            match text.parse::<f64>() {
                Ok(value) => Ok(ExpressionAst::LiteralDouble(value)),
                Err(_) => Err(self.fail_at("invalid double literal", start)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(ExpressionAst::LiteralInt(value)),
                Err(_) => Err(self.fail_at("invalid integer literal", start)),
            }
        }
    }

    fn parse_memory_access(&mut self) -> Result<ExpressionAst, ParseError> {
        let start = self.pos;
        let word = self.take_identifier();
        let Some(base) = MemoryBase::from_keyword(word) else {
            return Err(self.fail_at("expected memory, message, or context", start));
        };
        let mut path = Vec::new();
        while self.consume('.') {
            if !matches!(self.current(), Some(c) if c.is_ascii_alphabetic() || c == '_') {
                return Err(self.fail("expected identifier after '.'"));
            }
            path.push(self.take_identifier().to_string());
        }
        Ok(ExpressionAst::MemoryAccess { base, path })
    }

    fn take_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.current(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += c.len_utf8();
        }
    }

    fn consume(&mut self, expected: char) -> bool {
        if self.current() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn fail(&self, message: &str) -> ParseError {
        self.fail_at(message, self.pos)
    }

    fn fail_at(&self, message: &str, pos: usize) -> ParseError {
        let err = ParseError::new(message, self.offset + pos);
        self.log.error_at(message, self.offset + pos);
        err
    }
}

fn binary(op: BinaryOperator, left: ExpressionAst, right: ExpressionAst) -> ExpressionAst {
    ExpressionAst::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<ExpressionAst, ParseError> {
        ExpressionParser::new(input, Log::new()).parse_expression()
    }

    #[test]
    fn test_integer_literal() {
        assert_eq!(parse("42"), Ok(ExpressionAst::LiteralInt(42)));
        assert_eq!(parse("-7"), Ok(ExpressionAst::LiteralInt(-7)));
    }

    #[test]
    fn test_double_literal() {
        assert_eq!(parse("2.5"), Ok(ExpressionAst::LiteralDouble(2.5)));
        assert_eq!(parse("-0.25"), Ok(ExpressionAst::LiteralDouble(-0.25)));
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(
            parse(r#""say \"hi\" \\ back""#),
            Ok(ExpressionAst::LiteralString(r#"say "hi" \ back"#.to_string()))
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = parse(r#""open"#).unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn test_memory_access_path() {
        assert_eq!(
            parse("memory.a.b"),
            Ok(ExpressionAst::MemoryAccess {
                base: MemoryBase::Memory,
                path: vec!["a".to_string(), "b".to_string()],
            })
        );
        assert_eq!(
            parse("message"),
            Ok(ExpressionAst::MemoryAccess {
                base: MemoryBase::Message,
                path: vec![],
            })
        );
    }

    #[test]
    fn test_unknown_base_rejected() {
        assert!(parse("mailbox.x").is_err());
    }

    #[test]
    fn test_precedence_mul_over_add() {
        // 2 + 3 * 4 parses as 2 + (3 * 4)
        let ast = parse("2 + 3 * 4").unwrap();
        match ast {
            ExpressionAst::BinaryOp { op, left, right } => {
                assert_eq!(op, BinaryOperator::Add);
                assert_eq!(*left, ExpressionAst::LiteralInt(2));
                assert!(matches!(
                    *right,
                    ExpressionAst::BinaryOp {
                        op: BinaryOperator::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("expected binary op, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_grouping() {
        let ast = parse("(2 + 3) * 4").unwrap();
        match ast {
            ExpressionAst::BinaryOp { op, left, .. } => {
                assert_eq!(op, BinaryOperator::Multiply);
                assert!(matches!(
                    *left,
                    ExpressionAst::BinaryOp {
                        op: BinaryOperator::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected binary op, got {:?}", other),
        }
    }

    #[test]
    fn test_subtraction_vs_negative_literal() {
        // '-' between operands is subtraction even without spaces.
        let ast = parse("5-3").unwrap();
        assert!(matches!(
            ast,
            ExpressionAst::BinaryOp {
                op: BinaryOperator::Subtract,
                ..
            }
        ));
    }

    #[test]
    fn test_comparison_operators() {
        for (src, op) in [
            ("1 = 2", BinaryOperator::Equal),
            ("1 <> 2", BinaryOperator::NotEqual),
            ("1 < 2", BinaryOperator::Less),
            ("1 <= 2", BinaryOperator::LessEqual),
            ("1 > 2", BinaryOperator::Greater),
            ("1 >= 2", BinaryOperator::GreaterEqual),
        ] {
            let ast = parse(src).unwrap();
            match ast {
                ExpressionAst::BinaryOp { op: parsed, .. } => assert_eq!(parsed, op, "{}", src),
                other => panic!("expected binary op for {}, got {:?}", src, other),
            }
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let err = parse("1 + 2 x").unwrap_err();
        assert_eq!(err.message, "unexpected characters after expression");
        assert_eq!(err.position, 6);
    }

    #[test]
    fn test_error_recorded_in_log() {
        let log = Log::new();
        let result = ExpressionParser::new("(1 + ", log.clone()).parse_expression();
        assert!(result.is_err());
        assert!(!log.is_empty());
    }

    #[test]
    fn test_determinism_across_fresh_parsers() {
        let input = "memory.count + 2 * (3 - 1)";
        let a = ExpressionParser::new(input, Log::new()).parse_expression();
        let b = ExpressionParser::new(input, Log::new()).parse_expression();
        assert_eq!(a, b);
    }

    #[test]
    fn test_offset_shifts_positions() {
        let log = Log::new();
        let err = ExpressionParser::with_offset("1 +", log, 10)
            .parse_expression()
            .unwrap_err();
        assert_eq!(err.position, 13);
    }
}
