//! FHIR reference collection
//!
//! While lowering, every `InstanceOf:` declaration and every flash rule
//! target is recorded so the element definitions can be resolved once per
//! compilation. Collision policy is append: the same key may be referenced
//! from several source positions.

use crate::ast::{FlashPathStep, Span};
use serde::Serialize;
use std::collections::HashMap;

/// One recorded flash-rule target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRef {
    pub instance_of: String,
    /// Dotted path with slice decorations (`name[sliceName]`).
    pub full_path: String,
    pub steps: Vec<FlashPathStep>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTables {
    /// `typeId` -> positions of each `InstanceOf:` occurrence.
    pub structure_definition_refs: HashMap<String, Vec<Span>>,
    /// `"typeId::dotted.path"` -> recorded rule targets.
    pub element_definition_refs: HashMap<String, Vec<ElementRef>>,
}

impl ReferenceTables {
    /// Render the element reference key for a path stack.
    pub fn element_key(instance_of: &str, steps: &[FlashPathStep]) -> String {
        let path: Vec<String> = steps.iter().map(FlashPathStep::render).collect();
        format!("{}::{}", instance_of, path.join("."))
    }

    pub fn record_structure(&mut self, type_id: &str, span: Span) {
        self.structure_definition_refs
            .entry(type_id.to_string())
            .or_default()
            .push(span);
    }

    pub fn record_element(&mut self, key: &str, entry: ElementRef) {
        self.element_definition_refs
            .entry(key.to_string())
            .or_default()
            .push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.structure_definition_refs.is_empty() && self.element_definition_refs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_key_renders_slices() {
        let steps = vec![
            FlashPathStep::new("name", Span::default()),
            FlashPathStep::sliced("given", "first", Span::default()),
        ];
        assert_eq!(
            ReferenceTables::element_key("Patient", &steps),
            "Patient::name.given[first]"
        );
    }

    #[test]
    fn collisions_append() {
        let mut tables = ReferenceTables::default();
        tables.record_structure("Patient", Span::new(1, 0, 1));
        tables.record_structure("Patient", Span::new(9, 8, 2));
        assert_eq!(tables.structure_definition_refs["Patient"].len(), 2);
    }
}
