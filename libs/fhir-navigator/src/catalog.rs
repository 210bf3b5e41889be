//! In-memory navigator
//!
//! A concrete [`StructureNavigator`] backed by pre-resolved metadata.
//! Embedders load it from whatever conformance source they have (package
//! snapshots, a database); tests register structures by hand.

use crate::cache::RegexCache;
use crate::error::{Error, Result};
use crate::model::{ElementInfo, StructureInfo};
use crate::StructureNavigator;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct CatalogNavigator {
    structures: HashMap<String, StructureInfo>,
    elements: HashMap<String, ElementInfo>,
    /// parent key (element key or bare type id) -> child keys, in definition order
    children: HashMap<String, Vec<String>>,
    regex_cache: RegexCache,
}

impl CatalogNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_structure(&mut self, structure: StructureInfo) -> &mut Self {
        self.structures.insert(structure.type_id.clone(), structure);
        self
    }

    /// Register an element under its key and link it to its parent.
    ///
    /// The parent key is derived from the element key: the last dotted
    /// segment is stripped, and a path-less remainder collapses to the bare
    /// type id.
    pub fn add_element(&mut self, element: ElementInfo) -> &mut Self {
        let key = element.key.clone();
        self.children
            .entry(parent_key(&key))
            .or_default()
            .push(key.clone());
        self.elements.insert(key, element);
        self
    }
}

/// Strip the last dotted segment of `"typeId::a.b.c"`; `"typeId::a"`
/// collapses to `"typeId"`. Slice brackets may contain dots and are skipped.
fn parent_key(key: &str) -> String {
    let Some((type_id, path)) = key.split_once("::") else {
        return key.to_string();
    };
    let mut depth = 0usize;
    let mut last_dot = None;
    for (i, c) in path.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => last_dot = Some(i),
            _ => {}
        }
    }
    match last_dot {
        Some(i) => format!("{}::{}", type_id, &path[..i]),
        None => type_id.to_string(),
    }
}

impl StructureNavigator for CatalogNavigator {
    fn resolve_structure(&self, type_id: &str) -> Result<StructureInfo> {
        self.structures
            .get(type_id)
            .cloned()
            .ok_or_else(|| Error::StructureDefinitionNotFound(type_id.to_string()))
    }

    fn resolve_element(&self, key: &str) -> Result<ElementInfo> {
        self.elements
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ElementNotFound(key.to_string()))
    }

    fn children_of(&self, key: &str) -> Result<Vec<ElementInfo>> {
        let Some(child_keys) = self.children.get(key) else {
            return Ok(Vec::new());
        };
        child_keys
            .iter()
            .map(|k| {
                self.elements
                    .get(k)
                    .cloned()
                    .ok_or_else(|| Error::ElementNotFound(k.clone()))
            })
            .collect()
    }

    fn compiled_regex(&self, source: &str) -> Result<Arc<Regex>> {
        self.regex_cache.get_or_compile(source)
    }
}
