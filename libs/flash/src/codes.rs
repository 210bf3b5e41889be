//! Diagnostic codes, severities, and message templates
//!
//! Codes are grouped by prefix: `S` for syntax/tree-shape faults raised by
//! the post-processor, `F1xxx` for compile-time flash faults, `F3xxx` for
//! evaluation-time structural faults, and `F5xxx` for policy-governed
//! runtime validations.
//!
//! Message templates live in a compile-time perfect hash map for zero-cost
//! lookup by code string.

use phf::phf_map;
use serde::{Deserialize, Serialize};

/// Severity bands. Each band owns a half-open ten-wide numeric interval;
/// policy thresholds compare against the band's lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Invalid,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

/// Reserved ceiling above the highest band.
pub const SEVERITY_CEILING: u8 = 70;

impl Severity {
    /// The numeric lower bound of the band.
    pub fn level(self) -> u8 {
        match self {
            Severity::Fatal => 0,
            Severity::Invalid => 10,
            Severity::Error => 20,
            Severity::Warning => 30,
            Severity::Notice => 40,
            Severity::Info => 50,
            Severity::Debug => 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Unknown operator token.
    S0201,
    /// Unknown expression type.
    S0206,
    /// Unexpected end of expression.
    S0207,
    /// Predicate after a grouping expression.
    S0209,
    /// Duplicate grouping expression on a step.
    S0210,
    /// Numeric or value literal used as a path step.
    S0213,
    /// Context binding after predicates/stages.
    S0215,
    /// Context binding after an order-by clause.
    S0216,
    /// Parent reference cannot be derived.
    S0217,
    /// Invalid `InstanceOf:` identifier.
    F1026,
    /// Element definition is missing its FHIR type code.
    F3007,
    /// Missing seed for deterministic resource id generation.
    F3015,
    /// Non-primitive input for a primitive element.
    F5101,
    /// Element regex mismatch.
    F5110,
    /// Date/dateTime/instant parse, shape, or round-trip failure.
    F5111,
    /// Invalid string/markdown content.
    F5112,
    /// Invalid code content.
    F5113,
    /// Maximum length exceeded.
    F5114,
    /// Mandatory child element missing.
    F5130,
}

static MESSAGES: phf::Map<&'static str, &'static str> = phf_map! {
    "S0201" => "Syntax error: unknown operator",
    "S0206" => "Unknown expression type",
    "S0207" => "Unexpected end of expression",
    "S0209" => "A predicate cannot follow a grouping expression in a step",
    "S0210" => "Each step can only have one grouping expression",
    "S0213" => "A literal value cannot be used as a step within a path expression",
    "S0215" => "A context variable binding must precede any predicates on a step",
    "S0216" => "A context variable binding must precede the 'order-by' clause on a step",
    "S0217" => "The object representing the 'parent' cannot be derived from this expression",
    "F1026" => "Invalid InstanceOf declaration: not a valid type identifier",
    "F3007" => "Element definition is missing a FHIR type code",
    "F3015" => "A seed value is required to generate a deterministic resource id",
    "F5101" => "Value for a primitive element must be a string, number or boolean",
    "F5110" => "Value does not match the pattern required for this element",
    "F5111" => "Invalid date, dateTime or instant value",
    "F5112" => "Invalid string content",
    "F5113" => "Invalid code content",
    "F5114" => "Value exceeds the maximum length for this element",
    "F5130" => "Mandatory element is missing",
};

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::S0201 => "S0201",
            DiagnosticCode::S0206 => "S0206",
            DiagnosticCode::S0207 => "S0207",
            DiagnosticCode::S0209 => "S0209",
            DiagnosticCode::S0210 => "S0210",
            DiagnosticCode::S0213 => "S0213",
            DiagnosticCode::S0215 => "S0215",
            DiagnosticCode::S0216 => "S0216",
            DiagnosticCode::S0217 => "S0217",
            DiagnosticCode::F1026 => "F1026",
            DiagnosticCode::F3007 => "F3007",
            DiagnosticCode::F3015 => "F3015",
            DiagnosticCode::F5101 => "F5101",
            DiagnosticCode::F5110 => "F5110",
            DiagnosticCode::F5111 => "F5111",
            DiagnosticCode::F5112 => "F5112",
            DiagnosticCode::F5113 => "F5113",
            DiagnosticCode::F5114 => "F5114",
            DiagnosticCode::F5130 => "F5130",
        }
    }

    /// The base message for the code. Detail fields are appended by
    /// [`crate::error::Diagnostic`]'s `Display`.
    pub fn message(&self) -> &'static str {
        MESSAGES.get(self.as_str()).copied().unwrap_or("Unknown diagnostic")
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::S0201
            | DiagnosticCode::S0206
            | DiagnosticCode::S0207
            | DiagnosticCode::S0209
            | DiagnosticCode::S0210
            | DiagnosticCode::S0213
            | DiagnosticCode::S0215
            | DiagnosticCode::S0216
            | DiagnosticCode::S0217 => Severity::Fatal,
            DiagnosticCode::F1026 | DiagnosticCode::F3007 | DiagnosticCode::F3015 => {
                Severity::Invalid
            }
            DiagnosticCode::F5101
            | DiagnosticCode::F5110
            | DiagnosticCode::F5111
            | DiagnosticCode::F5112
            | DiagnosticCode::F5113
            | DiagnosticCode::F5114
            | DiagnosticCode::F5130 => Severity::Error,
        }
    }

    /// True for syntax/shape codes that bypass the severity policy.
    pub fn is_syntax(&self) -> bool {
        self.as_str().starts_with('S')
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_has_a_message() {
        let codes = [
            DiagnosticCode::S0201,
            DiagnosticCode::S0206,
            DiagnosticCode::S0207,
            DiagnosticCode::S0209,
            DiagnosticCode::S0210,
            DiagnosticCode::S0213,
            DiagnosticCode::S0215,
            DiagnosticCode::S0216,
            DiagnosticCode::S0217,
            DiagnosticCode::F1026,
            DiagnosticCode::F3007,
            DiagnosticCode::F3015,
            DiagnosticCode::F5101,
            DiagnosticCode::F5110,
            DiagnosticCode::F5111,
            DiagnosticCode::F5112,
            DiagnosticCode::F5113,
            DiagnosticCode::F5114,
            DiagnosticCode::F5130,
        ];
        for code in codes {
            assert!(MESSAGES.contains_key(code.as_str()), "{code} missing");
        }
    }

    #[test]
    fn severity_bands() {
        assert_eq!(DiagnosticCode::S0207.severity().level(), 0);
        assert_eq!(DiagnosticCode::F1026.severity().level(), 10);
        assert_eq!(DiagnosticCode::F5110.severity().level(), 20);
        assert!(DiagnosticCode::S0213.is_syntax());
        assert!(!DiagnosticCode::F5130.is_syntax());
    }
}
