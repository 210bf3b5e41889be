//! FHIR structure navigation for the FLASH engine
//!
//! Provides a trait-based interface for resolving StructureDefinition and
//! element metadata during FLASH compilation and evaluation, plus an
//! in-memory catalog implementation for embedders and tests.

pub mod cache;
pub mod catalog;
pub mod error;
pub mod model;

use std::sync::Arc;

pub use cache::RegexCache;
pub use catalog::CatalogNavigator;
pub use error::{Error, Result};
pub use model::{ElementInfo, ElementKind, ElementMax, StructureInfo, TypeRef};

/// Resolves FHIR conformance metadata for the engine.
///
/// Element keys follow the `"typeId::dotted.path"` convention, with slice
/// decorations rendered as `name[sliceName]` inside the dotted path. The
/// children of a structure root are addressed by the bare type id.
pub trait StructureNavigator: Send + Sync {
    /// Resolve a StructureDefinition by its type id (or canonical URL).
    fn resolve_structure(&self, type_id: &str) -> Result<StructureInfo>;

    /// Resolve one element definition by its `"typeId::dotted.path"` key.
    fn resolve_element(&self, key: &str) -> Result<ElementInfo>;

    /// The child element definitions of an element (or of a structure root
    /// when `key` is a bare type id), in definition order.
    fn children_of(&self, key: &str) -> Result<Vec<ElementInfo>>;

    /// A compiled, full-match tester for an element regex source.
    ///
    /// Implementations cache compilations; the same source always yields an
    /// equivalent tester.
    fn compiled_regex(&self, source: &str) -> Result<Arc<regex::Regex>>;
}
