//! Flash rule results
//!
//! The tagged container a flash rule evaluates to. Keeping it a distinct
//! type (rather than a marked JSON object) means ordinary value traversal
//! never observes the tag.

use fulmen_navigator::ElementKind;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashRuleResult {
    /// The JSON key the value belongs under (slices as `name:sliceName`).
    pub key: String,
    pub kind: ElementKind,
    pub value: Value,
}

impl FlashRuleResult {
    pub fn new(key: impl Into<String>, kind: ElementKind, value: Value) -> Self {
        Self {
            key: key.into(),
            kind,
            value,
        }
    }

    /// Fan an evaluation result out to per-value results: arrays map
    /// elementwise, scalars yield a single result.
    pub fn from_value(key: &str, kind: ElementKind, value: Value) -> Vec<FlashRuleResult> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| FlashRuleResult::new(key, kind, item))
                .collect(),
            scalar => vec![FlashRuleResult::new(key, kind, scalar)],
        }
    }

    /// The JSON key with any slice decoration stripped.
    pub fn base_key(&self) -> &str {
        self.key.split(':').next().unwrap_or(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arrays_fan_out() {
        let results =
            FlashRuleResult::from_value("given", ElementKind::PrimitiveType, json!(["a", "b"]));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].value, json!("a"));
        assert_eq!(results[1].value, json!("b"));
    }

    #[test]
    fn scalars_stay_single() {
        let results = FlashRuleResult::from_value("family", ElementKind::PrimitiveType, json!("x"));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn base_key_strips_slice() {
        let r = FlashRuleResult::new("category:vs", ElementKind::ComplexType, json!({}));
        assert_eq!(r.base_key(), "category");
    }
}
