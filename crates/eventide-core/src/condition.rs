//! The rule condition grammar: `<field-path> <op> <literal>`.
//!
//! Parsing and evaluation are kept as separate steps (per the tagged-variant design) so a
//! malformed condition string becomes `Condition::CatchAll` rather than a thrown error deep
//! inside evaluation — the evaluator as a whole never panics and never returns an `Err`.

use serde_json::Value;

/// Operators, longest-first so `!=`/`==`/`>=`/`<=` win over a bare `<`/`>` at the same
/// position in the source string.
const OPERATORS: &[&str] = &["!=", "==", ">=", "<=", ">", "<"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Ne,
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Op {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "!=" => Some(Op::Ne),
            "==" => Some(Op::Eq),
            ">=" => Some(Op::Ge),
            "<=" => Some(Op::Le),
            ">" => Some(Op::Gt),
            "<" => Some(Op::Lt),
            _ => None,
        }
    }
}

/// A parsed literal from the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Bool(bool),
    Integer(i64),
    Decimal(f64),
}

impl Literal {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if trimmed.len() >= 2 {
            let bytes = trimmed.as_bytes();
            let first = bytes[0];
            let last = bytes[bytes.len() - 1];
            if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
                return Literal::String(trimmed[1..trimmed.len() - 1].to_string());
            }
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return Literal::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Literal::Bool(false);
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return Literal::Integer(i);
        }
        if let Ok(d) = trimmed.parse::<f64>() {
            return Literal::Decimal(d);
        }

        Literal::String(trimmed.to_string())
    }

    fn to_comparable_string(&self) -> String {
        match self {
            Literal::String(s) => s.clone(),
            Literal::Bool(b) => b.to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Decimal(d) => d.to_string(),
        }
    }

    fn to_decimal(&self) -> Option<f64> {
        match self {
            Literal::Integer(i) => Some(*i as f64),
            Literal::Decimal(d) => Some(*d),
            Literal::String(s) => s.trim().parse::<f64>().ok(),
            Literal::Bool(_) => None,
        }
    }
}

/// A parsed condition: either the always-true catch-all or a single comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    CatchAll,
    Compare { field_path: String, op: Op, literal: Literal },
}

impl Condition {
    /// Parse a condition string. Never fails: anything that doesn't conform to the grammar
    /// degrades to `CatchAll`, which always matches — per the fail-safe posture documented
    /// for the evaluator as a whole.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Condition::CatchAll;
        }

        let split = find_operator(trimmed);
        let Some((op_pos, op_len, op)) = split else {
            return Condition::CatchAll;
        };

        let field_path_raw = trimmed[..op_pos].trim();
        let literal_raw = trimmed[op_pos + op_len..].trim();

        if field_path_raw.is_empty() || literal_raw.is_empty() {
            return Condition::CatchAll;
        }

        let field_path = field_path_raw
            .strip_prefix("payload.")
            .unwrap_or(field_path_raw)
            .to_string();

        Condition::Compare {
            field_path,
            op,
            literal: Literal::parse(literal_raw),
        }
    }

    /// Evaluate against a payload. Always returns a `bool`; any resolution or comparison
    /// failure is absorbed as `false` rather than propagated.
    pub fn evaluate(&self, payload: &Value) -> bool {
        match self {
            Condition::CatchAll => true,
            Condition::Compare { field_path, op, literal } => {
                let resolved = resolve_field_path(payload, field_path);
                let Some(actual) = resolved else { return false };
                compare(&actual, *op, literal)
            }
        }
    }
}

/// Find the leftmost operator occurrence, preferring the longest match at that position.
fn find_operator(source: &str) -> Option<(usize, usize, Op)> {
    let bytes = source.as_bytes();
    for start in 0..bytes.len() {
        for token in OPERATORS {
            if source[start..].starts_with(token) {
                return Some((start, token.len(), Op::from_token(token).expect("known token")));
            }
        }
    }
    None
}

/// Walk a payload object segment-by-segment. Any non-object intermediate value or absent
/// segment resolves to `None`, which the caller treats as `false`.
fn resolve_field_path<'a>(payload: &'a Value, field_path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in field_path.split('.') {
        if segment.is_empty() {
            continue;
        }
        let object = current.as_object()?;
        current = object.get(segment)?;
    }
    Some(current)
}

fn compare(actual: &Value, op: Op, literal: &Literal) -> bool {
    match op {
        Op::Eq | Op::Ne => {
            let actual_str = value_to_comparable_string(actual);
            let expected_str = literal.to_comparable_string();
            let equal = actual_str == expected_str;
            if matches!(op, Op::Eq) {
                equal
            } else {
                !equal
            }
        }
        Op::Gt | Op::Ge | Op::Lt | Op::Le => {
            let (Some(actual_num), Some(expected_num)) = (value_to_decimal(actual), literal.to_decimal()) else {
                return false;
            };
            match op {
                Op::Gt => actual_num > expected_num,
                Op::Ge => actual_num >= expected_num,
                Op::Lt => actual_num < expected_num,
                Op::Le => actual_num <= expected_num,
                Op::Eq | Op::Ne => unreachable!(),
            }
        }
    }
}

fn value_to_comparable_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_to_decimal(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_condition_is_catch_all() {
        assert_eq!(Condition::parse(""), Condition::CatchAll);
        assert_eq!(Condition::parse("   "), Condition::CatchAll);
    }

    #[test]
    fn catch_all_always_evaluates_true() {
        assert!(Condition::CatchAll.evaluate(&json!({})));
    }

    #[test]
    fn equality_on_string_literal_strips_payload_prefix() {
        let condition = Condition::parse("payload.plan == 'enterprise'");
        assert!(condition.evaluate(&json!({"plan": "enterprise"})));
        assert!(!condition.evaluate(&json!({"plan": "standard"})));
    }

    #[test]
    fn not_equal_operator_is_tested_before_equal() {
        let condition = Condition::parse("plan != 'standard'");
        assert!(condition.evaluate(&json!({"plan": "enterprise"})));
        assert!(!condition.evaluate(&json!({"plan": "standard"})));
    }

    #[test]
    fn numeric_comparison_parses_both_sides_as_decimal() {
        let condition = Condition::parse("amount >= 100");
        assert!(condition.evaluate(&json!({"amount": 150})));
        assert!(!condition.evaluate(&json!({"amount": 50})));
    }

    #[test]
    fn greater_than_is_not_shadowed_by_greater_or_equal() {
        let condition = Condition::parse("amount > 100");
        assert!(!condition.evaluate(&json!({"amount": 100})));
        assert!(condition.evaluate(&json!({"amount": 101})));
    }

    #[test]
    fn nested_field_path_walks_payload() {
        let condition = Condition::parse("customer.tier == 'gold'");
        assert!(condition.evaluate(&json!({"customer": {"tier": "gold"}})));
    }

    #[test]
    fn missing_field_resolves_to_false() {
        let condition = Condition::parse("missing == 'x'");
        assert!(!condition.evaluate(&json!({"plan": "enterprise"})));
    }

    #[test]
    fn non_object_intermediate_resolves_to_false() {
        let condition = Condition::parse("plan.tier == 'gold'");
        assert!(!condition.evaluate(&json!({"plan": "enterprise"})));
    }

    #[test]
    fn malformed_condition_never_panics_and_degrades_to_catch_all() {
        let condition = Condition::parse("this is not a valid condition");
        assert!(condition.evaluate(&json!({})));
    }

    #[test]
    fn boolean_literal_is_case_insensitive() {
        let condition = Condition::parse("active == TRUE");
        assert!(condition.evaluate(&json!({"active": true})));
    }

    #[test]
    fn invalid_decimal_comparison_fails_safe() {
        let condition = Condition::parse("plan > 10");
        assert!(!condition.evaluate(&json!({"plan": "enterprise"})));
    }
}
