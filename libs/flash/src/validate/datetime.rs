//! Date, dateTime, and instant canonicalization
//!
//! Strict shape validation plus canonical re-formatting that preserves the
//! input's precision (year, month, day, minutes, seconds, 1-9 fraction
//! digits) and its timezone offset, with a zero offset rendered as `Z`.
//! Anything that fails to parse, violates the type's shape rules, or does
//! not survive the round-trip unchanged is an `F5111` fault.

use crate::ast::Span;
use crate::codes::DiagnosticCode;
use crate::engine::EvalContext;
use crate::error::{report_value, Diagnostic, Result};
use chrono::{NaiveDate, NaiveTime};
use fulmen_navigator::ElementInfo;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Date,
    DateTime,
    Instant,
}

impl DateKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "date" => Some(DateKind::Date),
            "dateTime" => Some(DateKind::DateTime),
            "instant" => Some(DateKind::Instant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DateKind::Date => "date",
            DateKind::DateTime => "dateTime",
            DateKind::Instant => "instant",
        }
    }
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}$").unwrap())
}

fn year_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap())
}

fn full_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(\d{4})-(\d{2})-(\d{2})(?:T(\d{2}):(\d{2})(?::(\d{2})(?:\.(\d+))?)?(Z|[+-]\d{2}:\d{2})?)?$",
        )
        .unwrap()
    })
}

/// Validate and canonicalize a date-like string.
///
/// When the `F5110` validation gate is off, the input is returned unchanged.
/// A downgraded `F5111` also returns the original string so the fault stays
/// observable downstream.
pub fn canonicalize(
    span: Span,
    raw: &str,
    kind: DateKind,
    element: &ElementInfo,
    ctx: &EvalContext,
) -> Result<Value> {
    if !ctx.policy().should_validate(DiagnosticCode::F5110) {
        return Ok(Value::String(raw.to_string()));
    }
    match canonical_form(raw, kind) {
        Some(canonical) => Ok(Value::String(canonical)),
        None => {
            ctx.policy().check(
                Diagnostic::new(DiagnosticCode::F5111, span)
                    .with_value(report_value(raw))
                    .with_fhir_type(kind.as_str())
                    .with_element(element.type_id(), element.path()),
            )?;
            Ok(Value::String(raw.to_string()))
        }
    }
}

/// The canonical rendition of `raw` for `kind`, or `None` when the value is
/// rejected.
fn canonical_form(raw: &str, kind: DateKind) -> Option<String> {
    if year_re().is_match(raw) {
        // an instant always carries a timezone, so partial shapes are out
        if kind == DateKind::Instant {
            return None;
        }
        return Some(raw.to_string());
    }

    if let Some(caps) = year_month_re().captures(raw) {
        if kind == DateKind::Instant {
            return None;
        }
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)?;
        return Some(raw.to_string());
    }

    let caps = full_re().captures(raw)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?;

    let Some(hour_match) = caps.get(4) else {
        // date-only shape
        if kind == DateKind::Instant {
            return None;
        }
        return Some(format!("{year:04}-{month:02}-{day:02}"));
    };

    if hour_match.as_str() == "24" {
        return None;
    }
    let hour: u32 = hour_match.as_str().parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;
    let second: Option<u32> = match caps.get(6) {
        Some(s) => Some(s.as_str().parse().ok()?),
        None => None,
    };
    let fraction = caps.get(7).map(|m| m.as_str());
    if let Some(frac) = fraction {
        if frac.is_empty() || frac.len() > 9 {
            return None;
        }
    }
    NaiveTime::from_hms_nano_opt(hour, minute, second.unwrap_or(0), frac_nanos(fraction))?;

    // a datetime input truncates lawfully to a date; skip the round-trip
    if kind == DateKind::Date {
        return Some(format!("{year:04}-{month:02}-{day:02}"));
    }

    // a time part without a timezone never canonicalizes
    let offset = parse_offset(caps.get(8)?.as_str())?;

    let mut canonical = format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}");
    if let Some(second) = second {
        canonical.push_str(&format!(":{second:02}"));
        if let Some(frac) = fraction {
            canonical.push('.');
            canonical.push_str(frac);
        }
    }
    canonical.push_str(&render_offset(offset));

    if canonical == raw {
        Some(canonical)
    } else {
        None
    }
}

fn frac_nanos(fraction: Option<&str>) -> u32 {
    let Some(frac) = fraction else { return 0 };
    let padded = format!("{frac:0<9}");
    padded[..9].parse().unwrap_or(0)
}

/// Offset in minutes east of UTC.
fn parse_offset(tz: &str) -> Option<i32> {
    if tz == "Z" {
        return Some(0);
    }
    let sign = match tz.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = tz.get(1..3)?.parse().ok()?;
    let minutes: i32 = tz.get(4..6)?.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

fn render_offset(offset_minutes: i32) -> String {
    if offset_minutes == 0 {
        return "Z".to_string();
    }
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let abs = offset_minutes.abs();
    format!("{sign}{:02}:{:02}", abs / 60, abs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_datetime_shape() {
        let cases = [
            "2024",
            "2024-01",
            "2024-01-02",
            "2024-01-02T03:04Z",
            "2024-01-02T03:04:05Z",
            "2024-01-02T03:04:05.1Z",
            "2024-01-02T03:04:05.123456789Z",
            "2024-01-02T03:04:05+02:00",
            "2024-01-02T03:04:05.500-05:30",
        ];
        for case in cases {
            assert_eq!(
                canonical_form(case, DateKind::DateTime).as_deref(),
                Some(case),
                "shape {case}"
            );
        }
    }

    #[test]
    fn rejects_malformed_values() {
        let cases = [
            "2024-13",
            "2024-02-30",
            "2024-01-02T24:00:00Z",
            "2024-01-02T03:60:00Z",
            "2024-01-02T03:04:05",
            "2024-01-02T03:04:05.1234567890Z",
            "2024-01-02T03:04:05+00:00",
            "20240102",
            "not-a-date",
        ];
        for case in cases {
            assert_eq!(canonical_form(case, DateKind::DateTime), None, "shape {case}");
        }
    }

    #[test]
    fn date_truncates_from_datetime() {
        assert_eq!(
            canonical_form("2024-01-02T03:04:05+02:00", DateKind::Date).as_deref(),
            Some("2024-01-02")
        );
        assert_eq!(canonical_form("2024", DateKind::Date).as_deref(), Some("2024"));
    }

    #[test]
    fn instant_requires_full_shape_with_zone() {
        assert_eq!(canonical_form("2024", DateKind::Instant), None);
        assert_eq!(canonical_form("2024-01-02", DateKind::Instant), None);
        assert_eq!(
            canonical_form("2024-01-02T03:04:05Z", DateKind::Instant).as_deref(),
            Some("2024-01-02T03:04:05Z")
        );
    }

    #[test]
    fn canonical_output_round_trips() {
        for (input, kind) in [
            ("2024-01-02T03:04:05+02:00", DateKind::DateTime),
            ("2024-06-30T23:59:59.999Z", DateKind::Instant),
            ("1999-12", DateKind::Date),
        ] {
            let canonical = canonical_form(input, kind).unwrap();
            assert_eq!(canonical_form(&canonical, kind).as_deref(), Some(canonical.as_str()));
        }
    }
}
