//! Expression evaluation
//!
//! The evaluator is stateless: it walks an AST against borrowed maps and
//! produces either a borrowed reference into those maps (accessor hits) or
//! a fresh owned value (literals, operator results). Callers that intend to
//! store a result deep-copy it with [`Evaluated::into_owned`].
//!
//! Failures degrade instead of aborting: a missing accessor path evaluates
//! to `None`, and an operator given `None` or a type mix it has no rule for
//! produces integer 0 and logs.

use crate::ast::{BinaryOperator, ExpressionAst, MemoryBase};
use agerun_core::{Log, MapValue, Value};

/// Result of evaluating one expression node.
///
/// `Borrowed` is a reference into the scope's maps; `Owned` is a fresh
/// value. The split encodes the ownership rule that accessor results belong
/// to the agent until a caller explicitly copies them.
#[derive(Debug, PartialEq)]
pub enum Evaluated<'a> {
    Owned(Value),
    Borrowed(&'a Value),
}

impl Evaluated<'_> {
    pub fn as_value(&self) -> &Value {
        match self {
            Evaluated::Owned(v) => v,
            Evaluated::Borrowed(v) => v,
        }
    }

    /// Take ownership, deep-copying when the result was borrowed.
    pub fn into_owned(self) -> Value {
        match self {
            Evaluated::Owned(v) => v,
            Evaluated::Borrowed(v) => v.clone(),
        }
    }
}

/// Borrowed evaluation roots for one instruction.
#[derive(Debug, Clone, Copy)]
pub struct EvalScope<'a> {
    pub memory: &'a MapValue,
    pub message: Option<&'a Value>,
    pub context: Option<&'a MapValue>,
}

/// Evaluate an expression against a scope. `None` means an accessor missed
/// (absent key, non-map traversal, or absent message/context root).
pub fn evaluate<'a>(
    node: &ExpressionAst,
    scope: &EvalScope<'a>,
    log: &Log,
) -> Option<Evaluated<'a>> {
    match node {
        ExpressionAst::LiteralInt(n) => Some(Evaluated::Owned(Value::Integer(*n))),
        ExpressionAst::LiteralDouble(d) => Some(Evaluated::Owned(Value::Double(*d))),
        ExpressionAst::LiteralString(s) => Some(Evaluated::Owned(Value::String(s.clone()))),
        ExpressionAst::MemoryAccess { base, path } => evaluate_access(*base, path, scope),
        ExpressionAst::BinaryOp { op, left, right } => {
            let lhs = evaluate(left, scope, log);
            let rhs = evaluate(right, scope, log);
            Some(Evaluated::Owned(apply_binary(
                *op,
                lhs.as_ref().map(Evaluated::as_value),
                rhs.as_ref().map(Evaluated::as_value),
                log,
            )))
        }
    }
}

fn evaluate_access<'a>(
    base: MemoryBase,
    path: &[String],
    scope: &EvalScope<'a>,
) -> Option<Evaluated<'a>> {
    match base {
        MemoryBase::Memory => {
            if path.is_empty() {
                // Bare `memory` names the whole map; the scope only holds it
                // as a map, so this is the one place a copy is made.
                return Some(Evaluated::Owned(Value::Map(scope.memory.clone())));
            }
            walk(scope.memory, path).map(Evaluated::Borrowed)
        }
        MemoryBase::Message => {
            let message = scope.message?;
            if path.is_empty() {
                return Some(Evaluated::Borrowed(message));
            }
            walk(message.as_map()?, path).map(Evaluated::Borrowed)
        }
        MemoryBase::Context => {
            let context = scope.context?;
            if path.is_empty() {
                return Some(Evaluated::Owned(Value::Map(context.clone())));
            }
            walk(context, path).map(Evaluated::Borrowed)
        }
    }
}

fn walk<'a>(map: &'a MapValue, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(first)?;
    for component in rest {
        current = current.as_map()?.get(component)?;
    }
    Some(current)
}

/// Apply one binary operator to already-evaluated operands.
///
/// | lhs, rhs       | `+`            | `-` `*` `/`          | comparisons       |
/// |----------------|----------------|----------------------|-------------------|
/// | int, int       | int            | int, `/0` = 0        | int 0/1           |
/// | double / mixed | double         | double, `/0` = 0.0   | int 0/1           |
/// | string, string | concatenation  | invalid, int 0       | lexicographic 0/1 |
/// | other mixes    | invalid, int 0 | invalid, int 0       | invalid, int 0    |
pub fn apply_binary(
    op: BinaryOperator,
    lhs: Option<&Value>,
    rhs: Option<&Value>,
    log: &Log,
) -> Value {
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return Value::Integer(0);
    };
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => integer_op(op, *a, *b),
        (Value::Double(_) | Value::Integer(_), Value::Double(_) | Value::Integer(_)) => {
            double_op(op, numeric(lhs), numeric(rhs))
        }
        (Value::String(a), Value::String(b)) => string_op(op, a, b, log),
        _ => {
            log.error(format!(
                "cannot apply '{}' to {} and {}",
                op,
                lhs.kind(),
                rhs.kind()
            ));
            Value::Integer(0)
        }
    }
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Integer(n) => *n as f64,
        Value::Double(d) => *d,
        _ => 0.0,
    }
}

fn integer_op(op: BinaryOperator, a: i64, b: i64) -> Value {
    let result = match op {
        BinaryOperator::Add => a.wrapping_add(b),
        BinaryOperator::Subtract => a.wrapping_sub(b),
        BinaryOperator::Multiply => a.wrapping_mul(b),
        BinaryOperator::Divide => {
            if b == 0 {
                0
            } else {
                a.wrapping_div(b)
            }
        }
        BinaryOperator::Equal => (a == b) as i64,
        BinaryOperator::NotEqual => (a != b) as i64,
        BinaryOperator::Less => (a < b) as i64,
        BinaryOperator::LessEqual => (a <= b) as i64,
        BinaryOperator::Greater => (a > b) as i64,
        BinaryOperator::GreaterEqual => (a >= b) as i64,
    };
    Value::Integer(result)
}

fn double_op(op: BinaryOperator, a: f64, b: f64) -> Value {
    match op {
        BinaryOperator::Add => Value::Double(a + b),
        BinaryOperator::Subtract => Value::Double(a - b),
        BinaryOperator::Multiply => Value::Double(a * b),
        BinaryOperator::Divide => {
            if b == 0.0 {
                Value::Double(0.0)
            } else {
                Value::Double(a / b)
            }
        }
        BinaryOperator::Equal => Value::Integer((a == b) as i64),
        BinaryOperator::NotEqual => Value::Integer((a != b) as i64),
        BinaryOperator::Less => Value::Integer((a < b) as i64),
        BinaryOperator::LessEqual => Value::Integer((a <= b) as i64),
        BinaryOperator::Greater => Value::Integer((a > b) as i64),
        BinaryOperator::GreaterEqual => Value::Integer((a >= b) as i64),
    }
}

fn string_op(op: BinaryOperator, a: &str, b: &str, log: &Log) -> Value {
    match op {
        BinaryOperator::Add => Value::String(format!("{}{}", a, b)),
        BinaryOperator::Subtract | BinaryOperator::Multiply | BinaryOperator::Divide => {
            log.error(format!("cannot apply '{}' to strings", op));
            Value::Integer(0)
        }
        BinaryOperator::Equal => Value::Integer((a == b) as i64),
        BinaryOperator::NotEqual => Value::Integer((a != b) as i64),
        BinaryOperator::Less => Value::Integer((a < b) as i64),
        BinaryOperator::LessEqual => Value::Integer((a <= b) as i64),
        BinaryOperator::Greater => Value::Integer((a > b) as i64),
        BinaryOperator::GreaterEqual => Value::Integer((a >= b) as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ExpressionParser;

    fn eval_str(input: &str, scope: &EvalScope<'_>) -> Option<Value> {
        let log = Log::new();
        let ast = ExpressionParser::new(input, log.clone())
            .parse_expression()
            .unwrap();
        evaluate(&ast, scope, &log).map(Evaluated::into_owned)
    }

    fn empty_scope(memory: &MapValue) -> EvalScope<'_> {
        EvalScope {
            memory,
            message: None,
            context: None,
        }
    }

    #[test]
    fn test_precedence_values() {
        let memory = MapValue::new();
        let scope = empty_scope(&memory);
        assert_eq!(eval_str("2 + 3 * 4", &scope), Some(Value::Integer(14)));
        assert_eq!(eval_str("(2 + 3) * 4", &scope), Some(Value::Integer(20)));
    }

    #[test]
    fn test_integer_division_by_zero() {
        let memory = MapValue::new();
        let scope = empty_scope(&memory);
        assert_eq!(eval_str("7 / 0", &scope), Some(Value::Integer(0)));
    }

    #[test]
    fn test_mixed_promotes_to_double() {
        let memory = MapValue::new();
        let scope = empty_scope(&memory);
        assert_eq!(eval_str("1 + 2.5", &scope), Some(Value::Double(3.5)));
        assert_eq!(eval_str("5.0 / 0", &scope), Some(Value::Double(0.0)));
    }

    #[test]
    fn test_comparisons_yield_integer_booleans() {
        let memory = MapValue::new();
        let scope = empty_scope(&memory);
        assert_eq!(eval_str("3 < 4", &scope), Some(Value::Integer(1)));
        assert_eq!(eval_str("3 >= 4", &scope), Some(Value::Integer(0)));
        assert_eq!(eval_str("2.0 = 2", &scope), Some(Value::Integer(1)));
    }

    #[test]
    fn test_string_concat_and_compare() {
        let memory = MapValue::new();
        let scope = empty_scope(&memory);
        assert_eq!(
            eval_str(r#""foo" + "bar""#, &scope),
            Some(Value::String("foobar".to_string()))
        );
        assert_eq!(eval_str(r#""abc" < "abd""#, &scope), Some(Value::Integer(1)));
        assert_eq!(eval_str(r#""x" = "x""#, &scope), Some(Value::Integer(1)));
    }

    #[test]
    fn test_string_arithmetic_is_invalid() {
        let memory = MapValue::new();
        let scope = empty_scope(&memory);
        assert_eq!(eval_str(r#""a" * "b""#, &scope), Some(Value::Integer(0)));
        assert_eq!(eval_str(r#""a" - 1"#, &scope), Some(Value::Integer(0)));
    }

    #[test]
    fn test_memory_access_hit_is_borrowed() {
        let mut memory = MapValue::new();
        memory.set_path("a.b", Value::Integer(5)).unwrap();
        let scope = empty_scope(&memory);
        let log = Log::new();
        let ast = ExpressionParser::new("memory.a.b", log.clone())
            .parse_expression()
            .unwrap();
        match evaluate(&ast, &scope, &log) {
            Some(Evaluated::Borrowed(v)) => assert_eq!(v, &Value::Integer(5)),
            other => panic!("expected borrowed hit, got {:?}", other),
        }
    }

    #[test]
    fn test_memory_access_miss_degrades_to_zero() {
        let memory = MapValue::new();
        let scope = empty_scope(&memory);
        let log = Log::new();
        let ast = ExpressionParser::new("memory.x.y.z", log.clone())
            .parse_expression()
            .unwrap();
        assert_eq!(evaluate(&ast, &scope, &log), None);
        // Arithmetic over the miss yields a typed zero, not a crash.
        assert_eq!(eval_str("memory.x.y.z + 1", &scope), Some(Value::Integer(0)));
    }

    #[test]
    fn test_message_whole_value() {
        let memory = MapValue::new();
        let message = Value::String("hello".to_string());
        let scope = EvalScope {
            memory: &memory,
            message: Some(&message),
            context: None,
        };
        assert_eq!(
            eval_str("message", &scope),
            Some(Value::String("hello".to_string()))
        );
    }

    #[test]
    fn test_message_path_into_map() {
        let memory = MapValue::new();
        let mut payload = MapValue::new();
        payload.insert("a", Value::Integer(5));
        payload.insert("b", Value::Integer(3));
        let message = Value::Map(payload);
        let scope = EvalScope {
            memory: &memory,
            message: Some(&message),
            context: None,
        };
        assert_eq!(
            eval_str("message.a + message.b", &scope),
            Some(Value::Integer(8))
        );
    }

    #[test]
    fn test_context_absent_is_a_miss() {
        let memory = MapValue::new();
        let scope = empty_scope(&memory);
        assert_eq!(eval_str("context.echo_id", &scope), None);
        assert_eq!(eval_str("context.echo_id + 0", &scope), Some(Value::Integer(0)));
    }

    #[test]
    fn test_non_map_traversal_is_a_miss() {
        let mut memory = MapValue::new();
        memory.insert("n", Value::Integer(1));
        let scope = empty_scope(&memory);
        assert_eq!(eval_str("memory.n.deeper", &scope), None);
    }
}
