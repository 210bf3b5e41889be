//! string, markdown, and code content validation
//!
//! `code` values are single tokens or space-separated token sequences: no
//! leading or trailing whitespace, and only a single ASCII space or NBSP
//! between words. `string`/`markdown` admit TAB, LF, CR, and anything at or
//! above 0x20 outside the C1 control range, with at least one
//! non-whitespace code point. maxLength is enforced independently of the
//! content gate.

use crate::ast::Span;
use crate::codes::DiagnosticCode;
use crate::engine::EvalContext;
use crate::error::{report_value, Diagnostic, Result};
use crate::validate::check_max_length;
use fulmen_navigator::ElementInfo;
use serde_json::Value;

const NBSP: char = '\u{A0}';

pub fn validate_string_like(
    span: Span,
    input: &Value,
    type_code: &str,
    element: &ElementInfo,
    ctx: &EvalContext,
) -> Result<Value> {
    let text = match input {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return Ok(input.clone()),
    };

    check_max_length(span, &text, element, ctx)?;

    if !ctx.policy().should_validate(DiagnosticCode::F5110) {
        return Ok(input.clone());
    }

    let fault = match type_code {
        "code" => code_fault(&text).then_some(DiagnosticCode::F5113),
        _ => string_fault(&text).then_some(DiagnosticCode::F5112),
    };
    if let Some(code) = fault {
        ctx.policy().check(
            Diagnostic::new(code, span)
                .with_value(report_value(&text))
                .with_fhir_type(type_code)
                .with_element(element.type_id(), element.path()),
        )?;
    }

    Ok(Value::String(text))
}

/// True when the value violates the `code` whitespace rules.
fn code_fault(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    let mut chars = text.chars().peekable();
    let mut first = true;
    let mut previous_ws = false;
    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            if c != ' ' && c != NBSP {
                return true;
            }
            // no leading, trailing, or doubled separators
            if first || previous_ws || chars.peek().is_none() {
                return true;
            }
            previous_ws = true;
        } else {
            previous_ws = false;
        }
        first = false;
    }
    false
}

/// True when the value violates the `string`/`markdown` content rules.
fn string_fault(text: &str) -> bool {
    let mut has_content = false;
    for c in text.chars() {
        let cp = c as u32;
        match cp {
            0x09 | 0x0A | 0x0D => {}
            0x80..=0x9F => return true,
            _ if cp < 0x20 => return true,
            _ => {}
        }
        if !c.is_whitespace() {
            has_content = true;
        }
    }
    !has_content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_whitespace_rules() {
        assert!(!code_fault("hello"));
        assert!(!code_fault("hello world"));
        assert!(!code_fault("hello\u{A0}world"));
        assert!(code_fault(""));
        assert!(code_fault(" hello"));
        assert!(code_fault("hello "));
        assert!(code_fault("hello  world"));
        assert!(code_fault("hello\tworld"));
        assert!(code_fault("hello\nworld"));
    }

    #[test]
    fn string_content_rules() {
        assert!(!string_fault("plain text"));
        assert!(!string_fault("tabs\tand\nnewlines\r"));
        assert!(string_fault("\u{0001}"));
        assert!(string_fault("c1 control \u{0085} here"));
        assert!(string_fault("   "));
        assert!(string_fault("\t\n"));
    }
}
