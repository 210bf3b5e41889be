//! Shared fixtures: raw-AST builders, a small Patient catalog, and a stub
//! evaluator for virtual-rule callbacks.
#![allow(dead_code)]

use async_trait::async_trait;
use fulmen_flash::ast::{
    BinaryOp, Expr, ExprKind, FlashBlockExpr, FlashPath, FlashPathStep, FlashRuleExpr,
    InstanceOfDecl, Span,
};
use fulmen_flash::ir::NodeKind;
use fulmen_flash::{EvalContext, EvalOutput, Evaluator, FlashRuleResult, Node, Result};
use fulmen_navigator::{
    CatalogNavigator, ElementInfo, ElementKind, ElementMax, StructureInfo, StructureNavigator,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub fn sp() -> Span {
    Span::default()
}

pub fn name(n: &str) -> Expr {
    Expr::name(n, sp())
}

pub fn num(n: f64) -> Expr {
    Expr::number(n, sp())
}

pub fn string(s: &str) -> Expr {
    Expr::string(s, sp())
}

pub fn var(n: &str) -> Expr {
    Expr::variable(n, sp())
}

pub fn dot(lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(BinaryOp::Path, lhs, rhs, sp())
}

pub fn filter(lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(BinaryOp::Filter, lhs, rhs, sp())
}

pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(BinaryOp::Equal, lhs, rhs, sp())
}

pub fn parent() -> Expr {
    Expr::new(ExprKind::Parent, sp())
}

pub fn block(exprs: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Block(exprs), sp())
}

pub fn flash_path(steps: &[&str]) -> FlashPath {
    FlashPath {
        steps: steps.iter().map(|s| FlashPathStep::new(*s, sp())).collect(),
        span: sp(),
    }
}

pub fn flash_rule(path: &[&str], inline: Option<Expr>, sub_rules: Vec<Expr>) -> Expr {
    Expr::new(
        ExprKind::FlashRule(FlashRuleExpr {
            path: flash_path(path),
            context: None,
            inline: inline.map(Box::new),
            expressions: sub_rules,
        }),
        sp(),
    )
}

pub fn flash_block(instance_of: &str, instance_expr: Option<Expr>, rules: Vec<Expr>) -> Expr {
    Expr::new(
        ExprKind::FlashBlock(FlashBlockExpr {
            instance_of: Some(InstanceOfDecl {
                value: instance_of.to_string(),
                span: sp(),
            }),
            instance_expr: instance_expr.map(Box::new),
            expressions: rules,
        }),
        sp(),
    )
}

pub fn element(
    key: &str,
    names: &[&str],
    kind: ElementKind,
    type_code: Option<&str>,
    min: u32,
    max: ElementMax,
) -> ElementInfo {
    ElementInfo {
        key: key.to_string(),
        names: names.iter().map(|n| n.to_string()).collect(),
        kind,
        fhir_type_code: type_code.map(|c| c.to_string()),
        candidate_types: vec![],
        regex_str: None,
        max_length: None,
        min,
        max,
        slice_name: None,
        base_path: None,
        pattern_value: None,
        fixed_value: None,
        polymorphic: false,
    }
}

/// A minimal Patient catalog: id, name (HumanName with family/given),
/// birthDate, active.
pub fn patient_catalog(id_min: u32) -> Arc<dyn StructureNavigator> {
    let mut catalog = CatalogNavigator::new();
    catalog.add_structure(StructureInfo {
        type_id: "Patient".to_string(),
        url: Some("http://hl7.org/fhir/StructureDefinition/Patient".to_string()),
        name: "Patient".to_string(),
        kind: ElementKind::Resource,
    });
    catalog.add_element(element(
        "Patient::id",
        &["id"],
        ElementKind::System,
        Some("id"),
        id_min,
        ElementMax::Count(1),
    ));
    catalog.add_element(element(
        "Patient::name",
        &["name"],
        ElementKind::ComplexType,
        Some("HumanName"),
        0,
        ElementMax::Star,
    ));
    catalog.add_element(element(
        "Patient::name.family",
        &["family"],
        ElementKind::PrimitiveType,
        Some("string"),
        0,
        ElementMax::Count(1),
    ));
    catalog.add_element(element(
        "Patient::name.given",
        &["given"],
        ElementKind::PrimitiveType,
        Some("string"),
        0,
        ElementMax::Star,
    ));
    catalog.add_element(element(
        "Patient::birthDate",
        &["birthDate"],
        ElementKind::PrimitiveType,
        Some("date"),
        0,
        ElementMax::Count(1),
    ));
    catalog.add_element(element(
        "Patient::active",
        &["active"],
        ElementKind::PrimitiveType,
        Some("boolean"),
        0,
        ElementMax::Count(1),
    ));
    Arc::new(catalog)
}

/// Evaluator stub: serves virtual rules from a preset table, ignores
/// everything else.
#[derive(Default)]
pub struct StubEvaluator {
    pub virtual_values: HashMap<String, (ElementKind, Value)>,
}

#[async_trait]
impl Evaluator for StubEvaluator {
    async fn evaluate(&self, node: &Node, _input: &Value, _ctx: &EvalContext) -> Result<EvalOutput> {
        if let NodeKind::FlashRule { meta, .. } = &node.kind {
            if meta.is_virtual {
                if let Some(key) = &meta.path_ref_key {
                    if let Some((kind, value)) = self.virtual_values.get(key) {
                        return Ok(EvalOutput::Rules(vec![FlashRuleResult::new(
                            meta.step.name.clone(),
                            *kind,
                            value.clone(),
                        )]));
                    }
                }
            }
        }
        Ok(EvalOutput::Nothing)
    }
}
