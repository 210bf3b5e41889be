//! FHIR system-primitive validation
//!
//! The dispatcher routes a raw value to the date canonicalizer, the
//! string-content validator, or the generic regex/length/coercion path
//! according to the element's FHIR type code. All faults flow through the
//! policy gate, so a downgraded fault leaves the original value observable.

pub mod datetime;
pub mod stringlike;
pub mod system;

use crate::ast::Span;
use crate::codes::DiagnosticCode;
use crate::engine::EvalContext;
use crate::error::{report_value, Diagnostic, Result};
use datetime::DateKind;
use fulmen_navigator::ElementInfo;
use serde_json::Value;

/// Validate and canonicalize one raw value against an element definition.
///
/// Arrays validate elementwise. Absent-like inputs (`null`, the empty
/// string, the number zero) pass through untouched; `false` is validated.
pub fn validate_primitive(
    span: Span,
    input: &Value,
    element: &ElementInfo,
    ctx: &EvalContext,
) -> Result<Value> {
    if let Value::Array(items) = input {
        let validated: Result<Vec<Value>> = items
            .iter()
            .map(|item| validate_primitive(span, item, element, ctx))
            .collect();
        return Ok(Value::Array(validated?));
    }

    if is_absent(input) {
        return Ok(input.clone());
    }

    let Some(type_code) = element.fhir_type_code.as_deref() else {
        ctx.policy().check(
            Diagnostic::new(DiagnosticCode::F3007, span)
                .with_element(element.type_id(), element.path()),
        )?;
        return Ok(input.clone());
    };

    if ctx.policy().should_validate(DiagnosticCode::F5101)
        && !matches!(input, Value::String(_) | Value::Number(_) | Value::Bool(_))
    {
        ctx.policy().check(
            Diagnostic::new(DiagnosticCode::F5101, span)
                .with_value(input.clone())
                .with_fhir_type(type_code),
        )?;
        return Ok(input.clone());
    }

    match (DateKind::from_code(type_code), input) {
        (Some(kind), Value::String(raw)) => datetime::canonicalize(span, raw, kind, element, ctx),
        _ if matches!(type_code, "string" | "markdown" | "code") => {
            stringlike::validate_string_like(span, input, type_code, element, ctx)
        }
        _ => system::validate_system(span, input, type_code, element, ctx),
    }
}

/// Absent-value convention: null, `""`, and `0` count as no value;
/// `false` does not.
pub(crate) fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Shared regex check used by the generic path.
pub(crate) fn check_regex(
    span: Span,
    raw: &str,
    type_code: &str,
    element: &ElementInfo,
    ctx: &EvalContext,
) -> Result<()> {
    let Some(source) = element.regex_str.as_deref() else {
        return Ok(());
    };
    let tester = ctx.compiled_regex(source)?;
    if !tester.is_match(raw) {
        ctx.policy().check(
            Diagnostic::new(DiagnosticCode::F5110, span)
                .with_value(report_value(raw))
                .with_regex(source)
                .with_fhir_type(type_code)
                .with_element(element.type_id(), element.path()),
        )?;
    }
    Ok(())
}

/// Shared maxLength check; enforced independently of the F5110 gate.
pub(crate) fn check_max_length(
    span: Span,
    raw: &str,
    element: &ElementInfo,
    ctx: &EvalContext,
) -> Result<()> {
    let Some(max_length) = element.max_length else {
        return Ok(());
    };
    let actual = raw.chars().count();
    if actual > max_length {
        ctx.policy().check(
            Diagnostic::new(DiagnosticCode::F5114, span)
                .with_value(report_value(raw))
                .with_lengths(max_length, actual)
                .with_element(element.type_id(), element.path()),
        )?;
    }
    Ok(())
}
