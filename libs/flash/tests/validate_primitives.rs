//! Unit tests for the primitive validation dispatcher and its validators.

mod test_support;

use fulmen_flash::ast::Span;
use fulmen_flash::{validate_primitive, DiagnosticCode, EvalContext, PolicyConfig};
use fulmen_navigator::{ElementKind, ElementMax};
use serde_json::{json, Value};
use test_support::element;

fn ctx() -> EvalContext {
    EvalContext::new(PolicyConfig::default(), None)
}

fn lenient_ctx() -> EvalContext {
    EvalContext::new(PolicyConfig::lenient(), None)
}

fn date_element(code: &str) -> fulmen_navigator::ElementInfo {
    element(
        "Patient::birthDate",
        &["birthDate"],
        ElementKind::PrimitiveType,
        Some(code),
        0,
        ElementMax::Count(1),
    )
}

fn string_element(code: &str) -> fulmen_navigator::ElementInfo {
    element(
        "Patient::name.family",
        &["family"],
        ElementKind::PrimitiveType,
        Some(code),
        0,
        ElementMax::Count(1),
    )
}

fn expect_fault(result: fulmen_flash::Result<Value>, code: DiagnosticCode) {
    match result {
        Err(e) => assert_eq!(e.code(), Some(code)),
        Ok(v) => panic!("expected {code}, got {v}"),
    }
}

#[test]
fn datetime_shapes_accept_and_round_trip() {
    let ctx = ctx();
    let el = date_element("dateTime");
    let shapes = [
        "2024",
        "2024-01",
        "2024-01-02",
        "2024-01-02T03:04Z",
        "2024-01-02T03:04:05Z",
        "2024-01-02T03:04:05.1Z",
        "2024-01-02T03:04:05.123456789Z",
        "2024-01-02T03:04:05+02:00",
        "2024-01-02T03:04:05.250-05:00",
    ];
    for shape in shapes {
        let out = validate_primitive(Span::default(), &json!(shape), &el, &ctx).unwrap();
        assert_eq!(out, json!(shape), "shape {shape}");
        // idempotent: validating the canonical output returns it unchanged
        let again = validate_primitive(Span::default(), &out, &el, &ctx).unwrap();
        assert_eq!(again, out);
    }
}

#[test]
fn datetime_without_zone_is_rejected_by_default() {
    let result = validate_primitive(
        Span::default(),
        &json!("2024-01-02T03:04:05"),
        &date_element("dateTime"),
        &ctx(),
    );
    expect_fault(result, DiagnosticCode::F5111);
}

#[test]
fn lenient_policy_returns_the_original_and_records() {
    let ctx = lenient_ctx();
    let out = validate_primitive(
        Span::default(),
        &json!("2024-01-02T03:04:05"),
        &date_element("dateTime"),
        &ctx,
    )
    .unwrap();
    assert_eq!(out, json!("2024-01-02T03:04:05"));
    let collected = ctx.policy().collected();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].code, DiagnosticCode::F5111);
}

#[test]
fn instant_requires_a_timezone() {
    expect_fault(
        validate_primitive(
            Span::default(),
            &json!("2024-01-02T03:04:05"),
            &date_element("instant"),
            &ctx(),
        ),
        DiagnosticCode::F5111,
    );
    let ok = validate_primitive(
        Span::default(),
        &json!("2024-01-02T03:04:05Z"),
        &date_element("instant"),
        &ctx(),
    )
    .unwrap();
    assert_eq!(ok, json!("2024-01-02T03:04:05Z"));
}

#[test]
fn date_truncates_a_datetime_input() {
    let out = validate_primitive(
        Span::default(),
        &json!("2024-01-02T03:04:05+02:00"),
        &date_element("date"),
        &ctx(),
    )
    .unwrap();
    assert_eq!(out, json!("2024-01-02"));
}

#[test]
fn code_whitespace_faults() {
    let el = string_element("code");
    expect_fault(
        validate_primitive(Span::default(), &json!(" hello"), &el, &ctx()),
        DiagnosticCode::F5113,
    );
    expect_fault(
        validate_primitive(Span::default(), &json!("hello  world"), &el, &ctx()),
        DiagnosticCode::F5113,
    );
    let ok = validate_primitive(Span::default(), &json!("hello world"), &el, &ctx()).unwrap();
    assert_eq!(ok, json!("hello world"));
}

#[test]
fn string_control_characters_fault() {
    let el = string_element("string");
    expect_fault(
        validate_primitive(Span::default(), &json!("bad\u{0001}char"), &el, &ctx()),
        DiagnosticCode::F5112,
    );
    let ok =
        validate_primitive(Span::default(), &json!("fine\ttext\n"), &el, &ctx()).unwrap();
    assert_eq!(ok, json!("fine\ttext\n"));
}

#[test]
fn max_length_is_independent_of_the_validation_gate() {
    let mut el = string_element("string");
    el.max_length = Some(3);
    // validation_level 0 turns the F5110-gated checks off entirely
    let gated_off = EvalContext::new(
        PolicyConfig {
            validation_level: 0,
            ..PolicyConfig::default()
        },
        None,
    );
    expect_fault(
        validate_primitive(Span::default(), &json!("abcdef"), &el, &gated_off),
        DiagnosticCode::F5114,
    );
}

#[test]
fn inhibited_gate_returns_raw_strings() {
    let gated_off = EvalContext::new(
        PolicyConfig {
            validation_level: 0,
            ..PolicyConfig::default()
        },
        None,
    );
    // would fail F5113 under the default policy
    let out = validate_primitive(
        Span::default(),
        &json!(" hello"),
        &string_element("code"),
        &gated_off,
    )
    .unwrap();
    assert_eq!(out, json!(" hello"));
}

#[test]
fn regex_mismatch_faults_and_downgrades() {
    let mut el = string_element("id");
    el.kind = ElementKind::System;
    el.regex_str = Some("[A-Za-z0-9\\-.]{1,64}".to_string());
    expect_fault(
        validate_primitive(Span::default(), &json!("white space"), &el, &ctx()),
        DiagnosticCode::F5110,
    );
    // downgraded: the original value propagates unchanged
    let lenient = lenient_ctx();
    let out = validate_primitive(Span::default(), &json!("white space"), &el, &lenient).unwrap();
    assert_eq!(out, json!("white space"));
    assert_eq!(lenient.policy().collected().len(), 1);
}

#[test]
fn numeric_and_boolean_coercions() {
    let int_el = element(
        "Observation::count",
        &["count"],
        ElementKind::PrimitiveType,
        Some("integer"),
        0,
        ElementMax::Count(1),
    );
    assert_eq!(
        validate_primitive(Span::default(), &json!("42"), &int_el, &ctx()).unwrap(),
        json!(42)
    );

    let bool_el = element(
        "Patient::active",
        &["active"],
        ElementKind::PrimitiveType,
        Some("boolean"),
        0,
        ElementMax::Count(1),
    );
    assert_eq!(
        validate_primitive(Span::default(), &json!("false"), &bool_el, &ctx()).unwrap(),
        json!(false)
    );
    assert_eq!(
        validate_primitive(Span::default(), &json!("yes"), &bool_el, &ctx()).unwrap(),
        json!(true)
    );
}

#[test]
fn arrays_validate_elementwise() {
    let el = date_element("date");
    let out = validate_primitive(
        Span::default(),
        &json!(["2024", "2025-06"]),
        &el,
        &ctx(),
    )
    .unwrap();
    assert_eq!(out, json!(["2024", "2025-06"]));
}

#[test]
fn absent_like_inputs_pass_through() {
    let el = string_element("string");
    for input in [Value::Null, json!(""), json!(0)] {
        let out = validate_primitive(Span::default(), &input, &el, &ctx()).unwrap();
        assert_eq!(out, input);
    }
}

#[test]
fn non_primitive_input_is_rejected() {
    expect_fault(
        validate_primitive(
            Span::default(),
            &json!({"not": "primitive"}),
            &string_element("string"),
            &ctx(),
        ),
        DiagnosticCode::F5101,
    );
}

#[test]
fn missing_type_code_is_a_structural_fault() {
    let el = element(
        "Patient::broken",
        &["broken"],
        ElementKind::PrimitiveType,
        None,
        0,
        ElementMax::Count(1),
    );
    expect_fault(
        validate_primitive(Span::default(), &json!("x"), &el, &ctx()),
        DiagnosticCode::F3007,
    );
}
