//! Child-value assembly
//!
//! For one child element definition, gathers every value the block produced
//! for it - parent pattern content, the rule's inline expression result, and
//! accumulated sub-rule results, in that order - then collapses them per the
//! element's cardinality and kind. A mandatory child that ends up empty
//! triggers a virtual-rule evaluation so profile defaults can materialize.

use crate::assemble::rule_result::FlashRuleResult;
use crate::ast::{FlashPathStep, Span};
use crate::engine::{EvalContext, EvalOutput, Evaluator};
use crate::error::Result;
use crate::ir::{FlashRuleMeta, Node, NodeKind};
use crate::validate::validate_primitive;
use fulmen_navigator::{ElementInfo, ElementKind};
use serde_json::{Map, Value};

/// The flash-rule scope a child is being assembled under.
#[derive(Debug, Clone)]
pub struct RuleScope {
    /// Root `InstanceOf:` type id of the enclosing block.
    pub instance_of: String,
    /// Element reference key of the parent (`"Patient"` for the block root,
    /// `"Patient::name"` below it).
    pub parent_key: String,
    pub span: Span,
}

pub struct ChildValueProcessor<'a> {
    ctx: &'a EvalContext,
    evaluator: &'a dyn Evaluator,
}

impl<'a> ChildValueProcessor<'a> {
    pub fn new(ctx: &'a EvalContext, evaluator: &'a dyn Evaluator) -> Self {
        Self { ctx, evaluator }
    }

    /// All `{key, kind, value}` entries this child contributes to the parent
    /// object.
    pub async fn process(
        &self,
        child: &ElementInfo,
        inline: Option<&Value>,
        sub_results: &[FlashRuleResult],
        parent_pattern: Option<&Value>,
        scope: &RuleScope,
    ) -> Result<Vec<FlashRuleResult>> {
        let mut entries = Vec::new();
        let names = entry_names(child);
        let multi_poly = child.polymorphic && child.names.len() > 1;

        for name in &names {
            let mut values: Vec<Value> = Vec::new();
            let mut spread = false;

            // (1) parent pattern content at this key
            if let Some(Value::Object(pattern)) = parent_pattern {
                if let Some(pv) = pattern.get(name) {
                    let sibling = sibling_object(pattern, name);
                    spread |= self.push_source_value(&mut values, pv, sibling, child, scope)?;
                }
            }

            // (2) the inline expression result
            if let Some(Value::Object(obj)) = inline {
                if let Some(iv) = obj.get(name) {
                    let sibling = sibling_object(obj, name);
                    spread |= self.push_source_value(&mut values, iv, sibling, child, scope)?;
                }
            }

            // (3) accumulated sub-rule results, flattened
            for result in sub_results.iter().filter(|r| r.key == *name) {
                match &result.value {
                    Value::Array(items) => {
                        spread = true;
                        values.extend(items.iter().cloned());
                    }
                    scalar => values.push(scalar.clone()),
                }
            }

            let mut collapsed = collapse(values, spread, child);

            // virtual rule for an empty mandatory child
            if collapsed.is_empty() && child.is_mandatory() && !multi_poly {
                if let Some(value) = self.evaluate_virtual_rule(child, scope).await {
                    collapsed.push(value);
                }
            }

            entries.extend(
                collapsed
                    .into_iter()
                    .map(|value| FlashRuleResult::new(name.clone(), child.kind, value)),
            );
        }

        Ok(entries)
    }

    /// Add one pattern/inline value, spreading arrays for repeating
    /// elements and wrapping primitives into carriers. Returns whether the
    /// value was spread from an array.
    fn push_source_value(
        &self,
        values: &mut Vec<Value>,
        value: &Value,
        sibling: Option<&Value>,
        child: &ElementInfo,
        scope: &RuleScope,
    ) -> Result<bool> {
        match value {
            Value::Array(items) if child.is_array() => {
                for (index, item) in items.iter().enumerate() {
                    let aligned = match sibling {
                        Some(Value::Array(sibs)) => sibs.get(index),
                        _ => None,
                    };
                    values.push(self.materialize(item, aligned, child, scope)?);
                }
                Ok(true)
            }
            scalar => {
                let aligned = sibling.filter(|s| !s.is_array());
                values.push(self.materialize(scalar, aligned, child, scope)?);
                Ok(false)
            }
        }
    }

    /// Validate and wrap one raw value for its kind.
    fn materialize(
        &self,
        value: &Value,
        sibling: Option<&Value>,
        child: &ElementInfo,
        scope: &RuleScope,
    ) -> Result<Value> {
        match child.kind {
            ElementKind::PrimitiveType => {
                let validated = validate_primitive(scope.span, value, child, self.ctx)?;
                let mut carrier = Map::new();
                carrier.insert("value".to_string(), validated);
                if let Some(Value::Object(ext)) = sibling {
                    for (k, v) in ext {
                        carrier.insert(k.clone(), v.clone());
                    }
                }
                Ok(Value::Object(carrier))
            }
            ElementKind::System => validate_primitive(scope.span, value, child, self.ctx),
            ElementKind::ComplexType | ElementKind::Resource => Ok(value.clone()),
        }
    }

    /// Evaluate a synthesized empty rule; any fault means "no value".
    async fn evaluate_virtual_rule(&self, child: &ElementInfo, scope: &RuleScope) -> Option<Value> {
        let node = virtual_rule_node(child, scope);
        match self.evaluator.evaluate(&node, &Value::Null, self.ctx).await {
            Ok(EvalOutput::Rules(results)) => results.into_iter().next().map(|r| r.value),
            Ok(_) | Err(_) => None,
        }
    }
}

/// The JSON keys this child assembles under.
fn entry_names(child: &ElementInfo) -> Vec<String> {
    if child.names.len() == 1 {
        let name = &child.names[0];
        if !child.polymorphic {
            if let Some(slice) = &child.slice_name {
                return vec![format!("{name}:{slice}")];
            }
        }
        return vec![name.clone()];
    }
    child.names.clone()
}

/// The `"_" + name` sibling, when it is an object with own properties.
fn sibling_object<'v>(obj: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    let sibling = obj.get(&format!("_{name}"))?;
    match sibling {
        Value::Object(o) if !o.is_empty() => Some(sibling),
        Value::Array(_) => Some(sibling),
        _ => None,
    }
}

/// Apply the cardinality/kind collapse rules.
///
/// Scalars: system values keep the last, object values merge (later wins).
/// Repeating elements preserve every value, except that sibling rules
/// addressing the same complex element merge into one instance unless an
/// explicit array was spread.
fn collapse(values: Vec<Value>, spread: bool, child: &ElementInfo) -> Vec<Value> {
    if !child.is_array() {
        return match child.kind {
            ElementKind::System => values.into_iter().last().into_iter().collect(),
            _ => merge_objects(values),
        };
    }
    match child.kind {
        ElementKind::ComplexType | ElementKind::Resource if !spread => merge_objects(values),
        _ => values,
    }
}

/// Merge object values into one, later wins on key conflict; an empty merge
/// drops the value entirely.
fn merge_objects(values: Vec<Value>) -> Vec<Value> {
    let mut merged = Map::new();
    for value in values {
        if let Value::Object(obj) = value {
            merged.extend(obj);
        }
    }
    if merged.is_empty() {
        Vec::new()
    } else {
        vec![Value::Object(merged)]
    }
}

/// Synthesize the virtual flash rule the evaluator runs for a mandatory
/// child with no authored value.
fn virtual_rule_node(child: &ElementInfo, scope: &RuleScope) -> Node {
    let base_name = child
        .path()
        .rsplit('.')
        .next()
        .unwrap_or(child.path())
        .split('[')
        .next()
        .unwrap_or_default()
        .to_string();
    let mut step = FlashPathStep::new(base_name, scope.span);
    step.slice = child.slice_name.clone();
    Node::new(
        NodeKind::FlashRule {
            meta: Box::new(FlashRuleMeta {
                step,
                instance_of: Some(scope.instance_of.clone()),
                path_ref_key: Some(child.key.clone()),
                is_virtual: true,
            }),
            inline: None,
            expressions: Vec::new(),
        },
        scope.span,
    )
}

/// Place assembled entries on the parent object.
///
/// Primitive carriers split into `name` and `"_" + name`, with null
/// alignment for repeating elements; slice decorations collapse onto the
/// base key.
pub fn apply_entries(
    target: &mut Map<String, Value>,
    child: &ElementInfo,
    entries: &[FlashRuleResult],
) {
    for entry in entries {
        let base = entry.base_key().to_string();
        match child.kind {
            ElementKind::PrimitiveType => {
                let (value, extension) = split_carrier(&entry.value);
                if child.is_array() {
                    let values = array_entry(target, &base);
                    values.push(value);
                    let filled = values.len();
                    let siblings = array_entry(target, &format!("_{base}"));
                    while siblings.len() < filled - 1 {
                        siblings.push(Value::Null);
                    }
                    siblings.push(extension.unwrap_or(Value::Null));
                } else {
                    target.insert(base.clone(), value);
                    match extension {
                        Some(ext) => {
                            target.insert(format!("_{base}"), ext);
                        }
                        None => {
                            target.shift_remove(&format!("_{base}"));
                        }
                    }
                }
            }
            _ => {
                if child.is_array() {
                    array_entry(target, &base).push(entry.value.clone());
                } else {
                    target.insert(base, entry.value.clone());
                }
            }
        }
    }

    // drop a sibling array that carries no extensions at all
    for entry in entries {
        let base = entry.base_key();
        let sibling_key = format!("_{base}");
        let empty = matches!(
            target.get(&sibling_key),
            Some(Value::Array(sibs)) if sibs.iter().all(Value::is_null)
        );
        if empty {
            target.shift_remove(&sibling_key);
        }
    }
}

fn split_carrier(value: &Value) -> (Value, Option<Value>) {
    let Value::Object(carrier) = value else {
        return (value.clone(), None);
    };
    let primitive = carrier.get("value").cloned().unwrap_or(Value::Null);
    let mut extension = Map::new();
    for (k, v) in carrier {
        if k != "value" {
            extension.insert(k.clone(), v.clone());
        }
    }
    if extension.is_empty() {
        (primitive, None)
    } else {
        (primitive, Some(Value::Object(extension)))
    }
}

fn array_entry<'t>(target: &'t mut Map<String, Value>, key: &str) -> &'t mut Vec<Value> {
    let slot = target
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(vec![slot.take()]);
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!(),
    }
}
