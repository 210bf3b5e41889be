//! Unit tests for flash lowering: pre-pass rewrites, reference collection,
//! and path-key assignment.

mod test_support;

use fulmen_flash::ast::{Expr, ExprKind, FlashRuleExpr};
use fulmen_flash::ir::NodeKind;
use fulmen_flash::{process, DiagnosticCode, Node};
use test_support::*;

fn lower(expr: Expr) -> fulmen_flash::ProcessedExpr {
    process(expr, false).unwrap()
}

fn rule_nodes(root: &Node) -> Vec<Node> {
    let mut rules = Vec::new();
    root.for_each_descendant(&mut |n| {
        if matches!(n.kind, NodeKind::FlashRule { .. }) {
            rules.push(n.clone());
        }
    });
    rules
}

#[test]
fn block_lowers_with_instance_of_and_reference() {
    let processed = lower(flash_block(
        "Patient",
        None,
        vec![flash_rule(&["active"], Some(string("true")), vec![])],
    ));
    assert!(processed.contains_flash);
    let NodeKind::FlashBlock { instance_of, expressions } = &processed.root.kind else {
        panic!("expected a flash block");
    };
    assert_eq!(instance_of.as_deref(), Some("Patient"));
    assert_eq!(expressions.len(), 1);
    assert_eq!(
        processed.tables.structure_definition_refs["Patient"].len(),
        1
    );
}

#[test]
fn instance_expression_synthesizes_an_id_rule() {
    let processed = lower(flash_block(
        "Patient",
        Some(string("p-1")),
        vec![flash_rule(&["active"], Some(string("true")), vec![])],
    ));
    let NodeKind::FlashBlock { expressions, .. } = &processed.root.kind else {
        panic!("expected a flash block");
    };
    assert_eq!(expressions.len(), 2);
    let NodeKind::FlashRule { meta, inline, .. } = &expressions[0].kind else {
        panic!("expected the synthesized id rule first");
    };
    assert_eq!(meta.step.name, "id");
    assert_eq!(meta.path_ref_key.as_deref(), Some("Patient::id"));
    assert!(inline.is_some());
}

#[test]
fn multi_step_paths_unchain_into_nested_rules() {
    let processed = lower(flash_block(
        "Patient",
        None,
        vec![flash_rule(&["name", "given"], Some(string("Ann")), vec![])],
    ));
    let NodeKind::FlashBlock { expressions, .. } = &processed.root.kind else {
        panic!("expected a flash block");
    };
    let NodeKind::FlashRule { meta, inline, expressions: sub } = &expressions[0].kind else {
        panic!("expected the outer name rule");
    };
    assert_eq!(meta.step.name, "name");
    assert_eq!(meta.path_ref_key.as_deref(), Some("Patient::name"));
    assert!(inline.is_none());
    assert_eq!(sub.len(), 1);

    let NodeKind::FlashRule { meta: inner_meta, inline: inner_inline, .. } = &sub[0].kind else {
        panic!("expected the inner given rule");
    };
    assert_eq!(inner_meta.step.name, "given");
    assert_eq!(
        inner_meta.path_ref_key.as_deref(),
        Some("Patient::name.given")
    );
    assert!(inner_inline.is_some());
}

#[test]
fn every_rule_key_is_registered() {
    let processed = lower(flash_block(
        "Patient",
        Some(string("p-1")),
        vec![
            flash_rule(&["name", "given"], Some(string("Ann")), vec![]),
            flash_rule(&["name", "family"], Some(string("Lee")), vec![]),
        ],
    ));
    for rule in rule_nodes(&processed.root) {
        let NodeKind::FlashRule { meta, .. } = &rule.kind else {
            unreachable!()
        };
        let key = meta.path_ref_key.as_ref().expect("rule should carry a key");
        assert!(
            processed.tables.element_definition_refs.contains_key(key),
            "key {key} missing from the reference table"
        );
    }
    // collision policy is append: 'name' was referenced twice
    assert_eq!(processed.tables.element_definition_refs["Patient::name"].len(), 2);
}

#[test]
fn slices_render_into_the_reference_key() {
    let mut rule = flash_rule(&["category"], None, vec![]);
    if let ExprKind::FlashRule(FlashRuleExpr { path, .. }) = &mut rule.kind {
        path.steps[0].slice = Some("vs".to_string());
    }
    let processed = lower(flash_block("Observation", None, vec![rule]));
    assert!(processed
        .tables
        .element_definition_refs
        .contains_key("Observation::category[vs]"));
}

#[test]
fn context_wraps_into_block_sided_path() {
    let mut rule = flash_rule(&["telecom"], None, vec![]);
    if let ExprKind::FlashRule(inner) = &mut rule.kind {
        inner.context = Some(Box::new(name("contacts")));
    }
    let processed = lower(flash_block("Patient", None, vec![rule]));
    let NodeKind::FlashBlock { expressions, .. } = &processed.root.kind else {
        panic!("expected a flash block");
    };
    let NodeKind::Path { steps } = &expressions[0].kind else {
        panic!("expected the contextualized rule to lower into a path");
    };
    assert_eq!(steps.len(), 2);
    assert!(matches!(steps[0].kind, NodeKind::Block(_)));
    let NodeKind::Block(rhs) = &steps[1].kind else {
        panic!("expected the rule side to be a block");
    };
    assert!(matches!(rhs[0].kind, NodeKind::FlashRule { .. }));
}

#[test]
fn empty_rule_still_lowers() {
    let processed = lower(flash_block(
        "Patient",
        None,
        vec![flash_rule(&["active"], None, vec![])],
    ));
    let NodeKind::FlashBlock { expressions, .. } = &processed.root.kind else {
        panic!("expected a flash block");
    };
    let NodeKind::FlashRule { inline, expressions: sub, .. } = &expressions[0].kind else {
        panic!("expected a rule");
    };
    assert!(inline.is_none());
    assert!(sub.is_empty());
}

#[test]
fn nested_blocks_reset_the_path_stack() {
    let inner_block = flash_block(
        "HumanName",
        None,
        vec![flash_rule(&["family"], Some(string("Lee")), vec![])],
    );
    let processed = lower(flash_block(
        "Patient",
        None,
        vec![flash_rule(&["name"], Some(inner_block), vec![])],
    ));
    // inner family rule is keyed by the inner block's type, not Patient
    assert!(processed
        .tables
        .element_definition_refs
        .contains_key("HumanName::family"));
    assert!(processed
        .tables
        .element_definition_refs
        .contains_key("Patient::name"));
    assert!(!processed
        .tables
        .element_definition_refs
        .contains_key("Patient::name.family"));
}

#[test]
fn invalid_instance_of_is_rejected() {
    let bad = flash_block("not a type!", None, vec![]);
    match process(bad, false) {
        Err(e) => assert_eq!(e.code(), Some(DiagnosticCode::F1026)),
        Ok(_) => panic!("expected F1026"),
    }
}

#[test]
fn invalid_instance_of_is_collected_in_recover_mode() {
    let bad = flash_block(
        "not a type!",
        None,
        vec![flash_rule(&["active"], None, vec![])],
    );
    let processed = process(bad, true).unwrap();
    assert_eq!(processed.errors.len(), 1);
    assert_eq!(processed.errors[0].code, DiagnosticCode::F1026);
    // the block is still lowered so the evaluator can walk it
    assert!(matches!(processed.root.kind, NodeKind::FlashBlock { .. }));
}

#[test]
fn canonical_urls_are_valid_instance_identifiers() {
    let processed = lower(flash_block(
        "http://example.org/StructureDefinition/MyPatient",
        None,
        vec![],
    ));
    assert!(processed
        .tables
        .structure_definition_refs
        .contains_key("http://example.org/StructureDefinition/MyPatient"));
}
