//! Mandatory-children validation
//!
//! After a block assembles, every child with `min > 0` must have produced a
//! key on the result object. Primitive-type and polymorphic entries are
//! also satisfied by a sibling-extension key (`"_" + name`).

use crate::ast::Span;
use crate::codes::DiagnosticCode;
use crate::engine::EvalContext;
use crate::error::{Diagnostic, Result};
use fulmen_navigator::{ElementInfo, ElementKind};
use serde_json::{Map, Value};

/// One entry on the mandatory-children worklist of a block.
#[derive(Debug, Clone)]
pub struct MandatoryChild {
    pub names: Vec<String>,
    pub kind: ElementKind,
    pub path_ref_key: String,
    pub polymorphic: bool,
}

impl From<&ElementInfo> for MandatoryChild {
    fn from(element: &ElementInfo) -> Self {
        Self {
            names: element.names.clone(),
            kind: element.kind,
            path_ref_key: element.key.clone(),
            polymorphic: element.polymorphic,
        }
    }
}

impl MandatoryChild {
    fn satisfied_by(&self, result: &Map<String, Value>) -> bool {
        if self.names.iter().any(|name| result.contains_key(name)) {
            return true;
        }
        if self.kind == ElementKind::PrimitiveType || self.polymorphic {
            return self
                .names
                .iter()
                .any(|name| result.contains_key(&format!("_{name}")));
        }
        false
    }
}

/// Assert required-child presence on an assembled block result.
///
/// `parent_key` is the element reference key of the assembled element
/// (`"Patient"` at the block root); it normalizes into the diagnostic's
/// `fhirParent` by replacing `::` with `/`.
pub fn validate_mandatory_children(
    result: &Map<String, Value>,
    mandatory: &[MandatoryChild],
    parent_key: &str,
    instance_of: &str,
    span: Span,
    ctx: &EvalContext,
) -> Result<()> {
    for entry in mandatory {
        if entry.satisfied_by(result) {
            continue;
        }
        let fhir_parent = parent_key.replace("::", "/");
        let fhir_element = entry
            .path_ref_key
            .split_once("::")
            .map(|(_, path)| path)
            .unwrap_or(entry.path_ref_key.as_str());
        ctx.policy().check(
            Diagnostic::new(DiagnosticCode::F5130, span)
                .with_element(fhir_parent, fhir_element)
                .with_instance_of(instance_of),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn child(names: &[&str], kind: ElementKind, polymorphic: bool) -> MandatoryChild {
        MandatoryChild {
            names: names.iter().map(|n| n.to_string()).collect(),
            kind,
            path_ref_key: "Patient::id".to_string(),
            polymorphic,
        }
    }

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn satisfied_by_name() {
        let entry = child(&["id"], ElementKind::System, false);
        assert!(entry.satisfied_by(&obj(json!({"id": "x"}))));
        assert!(!entry.satisfied_by(&obj(json!({"other": 1}))));
    }

    #[test]
    fn primitive_satisfied_by_sibling_key() {
        let entry = child(&["birthDate"], ElementKind::PrimitiveType, false);
        assert!(entry.satisfied_by(&obj(json!({"_birthDate": {"extension": []}}))));
    }

    #[test]
    fn system_not_satisfied_by_sibling_key() {
        let entry = child(&["id"], ElementKind::System, false);
        assert!(!entry.satisfied_by(&obj(json!({"_id": {}}))));
    }

    #[test]
    fn polymorphic_satisfied_by_any_name() {
        let entry = child(
            &["valueString", "valueQuantity"],
            ElementKind::ComplexType,
            true,
        );
        assert!(entry.satisfied_by(&obj(json!({"valueQuantity": {}}))));
        assert!(entry.satisfied_by(&obj(json!({"_valueString": {}}))));
    }
}
