//! Diagnostics and error types
//!
//! A [`Diagnostic`] is the structured record every fault travels as, whether
//! it ends up thrown, logged, or collected (see [`crate::policy`]). The
//! crate [`Error`] wraps a diagnostic or a navigator fault.

use crate::ast::Span;
use crate::codes::DiagnosticCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Structured diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub position: usize,
    pub start: usize,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, span: Span) -> Self {
        Self {
            code,
            position: span.position,
            start: span.start,
            line: span.line,
            instance_of: None,
            fhir_element: None,
            fhir_parent: None,
            fhir_type: None,
            value: None,
            value_type: None,
            regex: None,
            max_length: None,
            actual_length: None,
            token: None,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.position, self.start, self.line)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.value_type = Some(json_type_name(&value).to_string());
        self.value = Some(value);
        self
    }

    pub fn with_fhir_type(mut self, fhir_type: impl Into<String>) -> Self {
        self.fhir_type = Some(fhir_type.into());
        self
    }

    pub fn with_instance_of(mut self, instance_of: impl Into<String>) -> Self {
        self.instance_of = Some(instance_of.into());
        self
    }

    pub fn with_element(
        mut self,
        fhir_parent: impl Into<String>,
        fhir_element: impl Into<String>,
    ) -> Self {
        self.fhir_parent = Some(fhir_parent.into());
        self.fhir_element = Some(fhir_element.into());
        self
    }

    pub fn with_regex(mut self, regex: impl Into<String>) -> Self {
        self.regex = Some(regex.into());
        self
    }

    pub fn with_lengths(mut self, max_length: usize, actual_length: usize) -> Self {
        self.max_length = Some(max_length);
        self.actual_length = Some(actual_length);
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.code.message())?;
        if let Some(token) = &self.token {
            write!(f, " '{token}'")?;
        }
        if let Some(value) = &self.value {
            write!(f, " (value: {value})")?;
        }
        if let (Some(parent), Some(element)) = (&self.fhir_parent, &self.fhir_element) {
            write!(f, " ({parent} -> {element})")?;
        }
        if self.line > 0 {
            write!(f, " at line {}", self.line)?;
        }
        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truncate a value for inclusion in a diagnostic report.
pub(crate) fn report_value(raw: &str) -> String {
    const LIMIT: usize = 100;
    let total = raw.chars().count();
    if total <= LIMIT {
        return raw.to_string();
    }
    let head: String = raw.chars().take(LIMIT).collect();
    format!("{head}... ({total} chars total)")
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Diagnostic(Box<Diagnostic>),

    #[error("navigator error: {0}")]
    Navigator(#[from] fulmen_navigator::Error),

    #[error("a structure navigator is required to evaluate flash expressions")]
    NavigatorRequired,
}

impl From<Diagnostic> for Error {
    fn from(diagnostic: Diagnostic) -> Self {
        Error::Diagnostic(Box::new(diagnostic))
    }
}

impl Error {
    /// The underlying diagnostic, when this error carries one.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Error::Diagnostic(d) => Some(d),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<DiagnosticCode> {
        self.diagnostic().map(|d| d.code)
    }
}
