//! Generic primitive validation and coercion
//!
//! The path for every FHIR primitive that is neither date-like nor one of
//! string/markdown/code: uri, id, oid, uuid, canonical, base64Binary, the
//! numeric types, and boolean. Runs the element regex (behind the F5110
//! gate), maxLength, then type coercion. A failed numeric conversion
//! propagates the input unchanged so a downgraded regex fault stays
//! observable.

use crate::ast::Span;
use crate::codes::DiagnosticCode;
use crate::engine::EvalContext;
use crate::error::Result;
use crate::validate::{check_max_length, check_regex};
use fulmen_navigator::ElementInfo;
use serde_json::{Number, Value};

enum TypeClass {
    Boolean,
    Integer,
    Decimal,
    Other,
}

fn classify(type_code: &str) -> TypeClass {
    match type_code {
        "boolean" => TypeClass::Boolean,
        "integer" | "integer64" | "positiveInt" | "unsignedInt" => TypeClass::Integer,
        "decimal" => TypeClass::Decimal,
        _ => TypeClass::Other,
    }
}

pub fn validate_system(
    span: Span,
    input: &Value,
    type_code: &str,
    element: &ElementInfo,
    ctx: &EvalContext,
) -> Result<Value> {
    if ctx.policy().should_validate(DiagnosticCode::F5110) {
        if let Value::String(raw) = input {
            check_regex(span, raw, type_code, element, ctx)?;
        }
    }
    if let Value::String(raw) = input {
        check_max_length(span, raw, element, ctx)?;
    }

    Ok(match classify(type_code) {
        TypeClass::Boolean => Value::Bool(coerce_boolean(input)),
        TypeClass::Integer => coerce_integer(input),
        TypeClass::Decimal => coerce_decimal(input),
        TypeClass::Other => input.clone(),
    })
}

fn coerce_boolean(input: &Value) -> bool {
    match input {
        Value::Bool(b) => *b,
        Value::String(s) => !matches!(s.as_str(), "false" | "FALSE"),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

fn coerce_integer(input: &Value) -> Value {
    match input {
        Value::Number(_) => input.clone(),
        Value::Bool(b) => Value::Number(Number::from(*b as i64)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Value::Number(Number::from(f as i64))
            }
            Ok(f) => Number::from_f64(f).map(Value::Number).unwrap_or_else(|| input.clone()),
            Err(_) => input.clone(),
        },
        _ => input.clone(),
    }
}

fn coerce_decimal(input: &Value) -> Value {
    match input {
        Value::Number(_) => input.clone(),
        Value::Bool(b) => Value::Number(Number::from(*b as i64)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) => Number::from_f64(f).map(Value::Number).unwrap_or_else(|| input.clone()),
            Err(_) => input.clone(),
        },
        _ => input.clone(),
    }
}
