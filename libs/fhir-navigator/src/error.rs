//! Error types for structure navigation

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("StructureDefinition not found: {0}")]
    StructureDefinitionNotFound(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid element metadata for {key}: {detail}")]
    InvalidElementMetadata { key: String, detail: String },

    #[error("Invalid regex '{pattern}': {detail}")]
    InvalidRegex { pattern: String, detail: String },
}

pub type Result<T> = std::result::Result<T, Error>;
