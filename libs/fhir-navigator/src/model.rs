//! Resolved FHIR element metadata
//!
//! These are the navigator-produced records the engine consumes: one
//! `ElementInfo` per element definition, already merged across the snapshot
//! (type narrowing, slicing, constraints), keyed by `"typeId::dotted.path"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The structural class of an element's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    /// A system primitive (the JSON-level value space: string, number, boolean).
    System,
    /// A FHIR primitive type (string, code, dateTime, ...) which may carry
    /// sibling extensions under `"_" + name`.
    PrimitiveType,
    /// A FHIR complex datatype (HumanName, CodeableConcept, ...).
    ComplexType,
    /// A resource (contained or root).
    Resource,
}

/// Maximum cardinality: a count or `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementMax {
    Count(u32),
    Star,
}

impl Serialize for ElementMax {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ElementMax::Count(n) => serializer.serialize_str(&n.to_string()),
            ElementMax::Star => serializer.serialize_str("*"),
        }
    }
}

impl<'de> Deserialize<'de> for ElementMax {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "*" {
            return Ok(ElementMax::Star);
        }
        raw.parse::<u32>()
            .map(ElementMax::Count)
            .map_err(|_| serde::de::Error::custom(format!("invalid max cardinality: {raw}")))
    }
}

/// One candidate type of a (possibly polymorphic) element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub code: String,
    pub kind: ElementKind,
}

/// Resolved metadata for one element definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    /// `"typeId::dotted.path"`, slices rendered as `name[sliceName]`.
    pub key: String,
    /// The JSON property name(s). Polymorphic elements not narrowed to a
    /// single type list one name per candidate (e.g. `valueString`,
    /// `valueQuantity`).
    pub names: Vec<String>,
    pub kind: ElementKind,
    /// The FHIR type code governing primitive validation (e.g. `dateTime`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_type_code: Option<String>,
    /// All admissible types for this element.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_types: Vec<TypeRef>,
    /// Regex constraint from the element definition, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_str: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    pub min: u32,
    pub max: ElementMax,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_name: Option<String>,
    /// The path of the base element definition (e.g. `Observation.value[x]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    /// `pattern[x]` value the element's content must include.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_value: Option<Value>,
    /// `fixed[x]` value the element's content must equal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_value: Option<Value>,
    /// True when the underlying definition is a choice element (`value[x]`),
    /// even after narrowing to a single type.
    #[serde(default)]
    pub polymorphic: bool,
}

impl ElementInfo {
    /// Whether the element admits more than one repetition.
    pub fn is_array(&self) -> bool {
        self.max != ElementMax::Count(1)
    }

    pub fn is_mandatory(&self) -> bool {
        self.min > 0
    }

    /// The dotted path portion of the key (after `::`).
    pub fn path(&self) -> &str {
        match self.key.split_once("::") {
            Some((_, path)) => path,
            None => "",
        }
    }

    /// The type id portion of the key (before `::`).
    pub fn type_id(&self) -> &str {
        match self.key.split_once("::") {
            Some((type_id, _)) => type_id,
            None => &self.key,
        }
    }
}

/// Resolved summary of a StructureDefinition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureInfo {
    /// The id used in `InstanceOf:` declarations.
    pub type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The resource or datatype name (`resourceType` value for resources).
    pub name: String,
    pub kind: ElementKind,
}
