//! AST post-processing
//!
//! Lowers the raw parse tree into the evaluator-ready tree: the flash
//! pre-pass normalizes blocks and rules, then the main pass eliminates the
//! path-forming operators (`.`, `[`, `@`, `#`), folds their effects into
//! path steps and stages, binds ancestor references, and collects the FHIR
//! reference tables.
//!
//! Shape faults are the `S` diagnostic codes. In strict mode the first one
//! aborts processing; in recover mode they are collected and an error
//! sentinel takes the node's place so the evaluator can still walk the tree.

pub mod ancestry;
pub mod prepass;
pub mod refs;

use crate::ast::{BinaryOp, Expr, ExprKind, FlashPathStep, Span};
use crate::codes::DiagnosticCode;
use crate::error::{Diagnostic, Result};
use crate::ir::{FlashRuleMeta, GroupBy, Node, NodeKind, Slot, SortTerm, Stage};
use ancestry::{push_ancestry, resolve_ancestry, seek_parent, AncestryTracker};
use refs::{ElementRef, ReferenceTables};
use regex::Regex;
use std::sync::OnceLock;

/// Post-processing output: the lowered root plus everything resolved during
/// the pass. The tables and labels are read-only for the compiled
/// expression's lifetime.
#[derive(Debug)]
pub struct ProcessedExpr {
    pub root: Node,
    pub contains_flash: bool,
    pub tables: ReferenceTables,
    /// Final ancestor labels, indexed by slot index.
    pub ancestry_labels: Vec<String>,
    /// Collected shape faults (recover mode only).
    pub errors: Vec<Diagnostic>,
}

/// Lower a raw expression. With `recover` set, shape faults are collected
/// into [`ProcessedExpr::errors`] instead of raised.
pub fn process(expr: Expr, recover: bool) -> Result<ProcessedExpr> {
    let expr = prepass::pre_process(expr);
    let mut processor = PostProcessor::new(recover);
    let root = processor.process_node(expr)?;
    Ok(ProcessedExpr {
        root,
        contains_flash: processor.contains_flash,
        tables: processor.tables,
        ancestry_labels: processor.tracker.into_labels(),
        errors: processor.errors,
    })
}

struct PostProcessor {
    recover: bool,
    errors: Vec<Diagnostic>,
    tracker: AncestryTracker,
    tables: ReferenceTables,
    contains_flash: bool,
    flash_path_stack: Vec<FlashPathStep>,
    current_instance_of: Option<String>,
}

impl PostProcessor {
    fn new(recover: bool) -> Self {
        Self {
            recover,
            errors: Vec::new(),
            tracker: AncestryTracker::new(),
            tables: ReferenceTables::default(),
            contains_flash: false,
            flash_path_stack: Vec::new(),
            current_instance_of: None,
        }
    }

    /// Abort on a shape fault, or substitute a sentinel in recover mode.
    fn fail(&mut self, diagnostic: Diagnostic) -> Result<Node> {
        if self.recover {
            let span = diagnostic.span();
            self.errors.push(diagnostic.clone());
            Ok(Node::new(NodeKind::Error(Box::new(diagnostic)), span))
        } else {
            Err(diagnostic.into())
        }
    }

    /// Record a fault without replacing the node being built.
    fn report(&mut self, diagnostic: Diagnostic) -> Result<()> {
        if self.recover {
            self.errors.push(diagnostic);
            Ok(())
        } else {
            Err(diagnostic.into())
        }
    }

    fn process_node(&mut self, expr: Expr) -> Result<Node> {
        let Expr {
            kind,
            span,
            keep_array,
        } = expr;

        let mut result = match kind {
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::Path => self.process_path(*lhs, *rhs, span)?,
                BinaryOp::Filter => self.process_filter(*lhs, *rhs, span)?,
                BinaryOp::Focus => self.process_focus(*lhs, *rhs, span, keep_array)?,
                BinaryOp::IndexBind => self.process_index_bind(*lhs, *rhs, span)?,
                BinaryOp::Bind => {
                    let lhs = self.process_node(*lhs)?;
                    let rhs = self.process_node(*rhs)?;
                    let mut node = Node::new(
                        NodeKind::Bind {
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    );
                    if let NodeKind::Bind { rhs, .. } = &node.kind {
                        let slots = collect_slots(rhs);
                        node.seeking_parent.extend(slots);
                    }
                    node
                }
                BinaryOp::Apply => {
                    let lhs = self.process_node(*lhs)?;
                    let rhs = self.process_node(*rhs)?;
                    let keep = lhs.keep_array || rhs.keep_array;
                    let mut node = Node::new(
                        NodeKind::Apply {
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    );
                    node.keep_array = keep;
                    node
                }
                _ => {
                    let lhs = self.process_node(*lhs)?;
                    let rhs = self.process_node(*rhs)?;
                    let mut node = Node::new(
                        NodeKind::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    );
                    if let NodeKind::Binary { lhs, rhs, .. } = &node.kind {
                        let mut slots = collect_slots(lhs);
                        slots.extend(collect_slots(rhs));
                        node.seeking_parent.extend(slots);
                    }
                    node
                }
            },
            ExprKind::Sort { lhs, terms } => self.process_sort(*lhs, terms, span)?,
            ExprKind::Group { lhs, pairs } => self.process_group(*lhs, pairs, span)?,

            ExprKind::Neg(inner) => {
                let inner = self.process_node(*inner)?;
                if let NodeKind::Num(n) = inner.kind {
                    Node::new(NodeKind::Num(-n), span)
                } else {
                    let mut node = Node::new(NodeKind::Neg(Box::new(inner)), span);
                    if let NodeKind::Neg(inner) = &node.kind {
                        let slots = collect_slots(inner);
                        node.seeking_parent.extend(slots);
                    }
                    node
                }
            }
            ExprKind::ArrayCtor(exprs) => {
                let mut node = Node::new(NodeKind::ArrayCtor(Vec::new()), span);
                let mut out = Vec::with_capacity(exprs.len());
                for item in exprs {
                    let item = self.process_node(item)?;
                    push_ancestry(&mut node, &item);
                    out.push(item);
                }
                node.kind = NodeKind::ArrayCtor(out);
                node
            }
            ExprKind::ObjectCtor(pairs) => {
                let mut node = Node::new(NodeKind::ObjectCtor(Vec::new()), span);
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let k = self.process_node(k)?;
                    push_ancestry(&mut node, &k);
                    let v = self.process_node(v)?;
                    push_ancestry(&mut node, &v);
                    out.push((k, v));
                }
                node.kind = NodeKind::ObjectCtor(out);
                node
            }
            ExprKind::Block(exprs) => {
                let mut node = Node::new(NodeKind::Block(Vec::new()), span);
                let mut cons = false;
                let mut out = Vec::with_capacity(exprs.len());
                for item in exprs {
                    let item = self.process_node(item)?;
                    push_ancestry(&mut node, &item);
                    if item.cons_array || first_step_cons_array(&item) {
                        cons = true;
                    }
                    out.push(item);
                }
                node.kind = NodeKind::Block(out);
                node.cons_array = cons;
                node
            }
            ExprKind::Function {
                procedure,
                args,
                is_partial,
            } => {
                let procedure = self.process_node(*procedure)?;
                let mut node = Node::new(
                    NodeKind::Function {
                        procedure: Box::new(procedure),
                        args: Vec::new(),
                        is_partial,
                    },
                    span,
                );
                let mut out = Vec::with_capacity(args.len());
                for arg in args {
                    let arg = self.process_node(arg)?;
                    push_ancestry(&mut node, &arg);
                    out.push(arg);
                }
                if let NodeKind::Function { args, .. } = &mut node.kind {
                    *args = out;
                }
                node
            }
            ExprKind::Lambda {
                params,
                signature,
                body,
            } => {
                let body = self.process_node(*body)?;
                let body = tail_call_optimize(body);
                Node::new(
                    NodeKind::Lambda {
                        params,
                        signature,
                        body: Box::new(body),
                        thunk: false,
                    },
                    span,
                )
            }
            ExprKind::Condition {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.process_node(*condition)?;
                let then_branch = self.process_node(*then_branch)?;
                let else_branch = match else_branch {
                    Some(e) => Some(self.process_node(*e)?),
                    None => None,
                };
                let mut slots = collect_slots(&condition);
                slots.extend(collect_slots(&then_branch));
                if let Some(e) = &else_branch {
                    slots.extend(collect_slots(e));
                }
                let mut node = Node::new(
                    NodeKind::Condition {
                        condition: Box::new(condition),
                        then_branch: Box::new(then_branch),
                        else_branch: else_branch.map(Box::new),
                    },
                    span,
                );
                node.seeking_parent.extend(slots);
                node
            }
            ExprKind::Coalesce { lhs, rhs } => {
                self.process_pairwise(*lhs, *rhs, span, |lhs, rhs| NodeKind::Coalesce {
                    lhs,
                    rhs,
                })?
            }
            ExprKind::Elvis { lhs, rhs } => {
                self.process_pairwise(*lhs, *rhs, span, |lhs, rhs| NodeKind::Elvis { lhs, rhs })?
            }
            ExprKind::Transform {
                pattern,
                update,
                delete,
            } => {
                let pattern = self.process_node(*pattern)?;
                let update = self.process_node(*update)?;
                let delete = match delete {
                    Some(d) => Some(self.process_node(*d)?),
                    None => None,
                };
                let mut slots = collect_slots(&pattern);
                slots.extend(collect_slots(&update));
                if let Some(d) = &delete {
                    slots.extend(collect_slots(d));
                }
                let mut node = Node::new(
                    NodeKind::Transform {
                        pattern: Box::new(pattern),
                        update: Box::new(update),
                        delete: delete.map(Box::new),
                    },
                    span,
                );
                node.seeking_parent.extend(slots);
                node
            }

            ExprKind::Name(name) => {
                let mut step = Node::new(NodeKind::Name(name), span);
                step.keep_array = keep_array;
                let mut path = Node::new(NodeKind::Path { steps: vec![step] }, span);
                if keep_array {
                    path.keep_singleton_array = true;
                }
                path
            }
            ExprKind::Parent => {
                let slot = self.tracker.allocate();
                Node::new(NodeKind::Parent(slot), span)
            }
            ExprKind::Str(s) => Node::new(NodeKind::Str(s), span),
            ExprKind::Num(n) => Node::new(NodeKind::Num(n), span),
            ExprKind::Bool(b) => Node::new(NodeKind::Bool(b), span),
            ExprKind::Null => Node::new(NodeKind::Null, span),
            ExprKind::Var(name) => Node::new(NodeKind::Var(name), span),
            ExprKind::Regex(source) => Node::new(NodeKind::Regex(source), span),
            ExprKind::Wildcard => Node::new(NodeKind::Wildcard, span),
            ExprKind::Descendant => Node::new(NodeKind::Descendant, span),

            ExprKind::Operator(op) => match op.as_str() {
                // might have been used as a name rather than an operator
                "and" | "or" | "in" => {
                    let mut renamed = Expr::name(op, span);
                    renamed.keep_array = keep_array;
                    return self.process_node(renamed);
                }
                "?" => Node::new(NodeKind::PartialArg, span),
                _ => {
                    return self
                        .fail(Diagnostic::new(DiagnosticCode::S0201, span).with_token(op))
                }
            },

            ExprKind::Error { error, expr } => match expr {
                Some(inner) => self.process_node(*inner)?,
                None => Node::new(NodeKind::Error(error), span),
            },
            ExprKind::End => {
                return self.fail(Diagnostic::new(DiagnosticCode::S0207, span));
            }

            ExprKind::FlashBlock(block) => self.process_flash_block(block, span)?,
            ExprKind::FlashRule(rule) => self.process_flash_rule(rule, span)?,
        };

        if keep_array {
            result.keep_array = true;
        }
        Ok(result)
    }

    fn process_pairwise(
        &mut self,
        lhs: Expr,
        rhs: Expr,
        span: Span,
        build: impl FnOnce(Box<Node>, Box<Node>) -> NodeKind,
    ) -> Result<Node> {
        let lhs = self.process_node(lhs)?;
        let rhs = self.process_node(rhs)?;
        let mut slots = collect_slots(&lhs);
        slots.extend(collect_slots(&rhs));
        let mut node = Node::new(build(Box::new(lhs), Box::new(rhs)), span);
        node.seeking_parent.extend(slots);
        Ok(node)
    }

    /// Lower `lhs . rhs` into a path with appended steps.
    fn process_path(&mut self, lhs: Expr, rhs: Expr, span: Span) -> Result<Node> {
        let lstep = self.process_node(lhs)?;
        let lhs_slot = match &lstep.kind {
            NodeKind::Parent(slot) => Some(slot.clone()),
            _ => None,
        };
        let mut result = if lstep.is_path() {
            lstep
        } else {
            Node::new(NodeKind::Path { steps: vec![lstep] }, span)
        };
        if let Some(slot) = lhs_slot {
            result.seeking_parent = vec![slot];
        }

        let mut rest = self.process_node(rhs)?;

        // next function in a chain of calls - overrides a thenable
        if let Some(name) = chained_function_name(&rest) {
            if let NodeKind::Path { steps } = &mut result.kind {
                if let Some(last) = steps.last_mut() {
                    if matches!(last.kind, NodeKind::Function { .. }) {
                        last.next_function = Some(name);
                    }
                }
            }
        }

        if let NodeKind::Path { steps } = &mut result.kind {
            if rest.is_path() {
                if let NodeKind::Path { steps: rest_steps } = rest.kind {
                    steps.extend(rest_steps);
                }
            } else {
                if !rest.predicates.is_empty() {
                    rest.stages = std::mem::take(&mut rest.predicates);
                }
                steps.push(rest);
            }
        }

        // steps may not be literal numbers or values; literal strings act as names
        let mut keep_singleton = false;
        let mut bad_step: Option<Diagnostic> = None;
        if let NodeKind::Path { steps } = &mut result.kind {
            for step in steps.iter_mut() {
                match &step.kind {
                    NodeKind::Num(n) => {
                        bad_step = Some(
                            Diagnostic::new(DiagnosticCode::S0213, step.span)
                                .with_value(serde_json::json!(n)),
                        );
                        break;
                    }
                    NodeKind::Bool(b) => {
                        bad_step = Some(
                            Diagnostic::new(DiagnosticCode::S0213, step.span)
                                .with_value(serde_json::json!(b)),
                        );
                        break;
                    }
                    NodeKind::Null => {
                        bad_step = Some(
                            Diagnostic::new(DiagnosticCode::S0213, step.span)
                                .with_value(serde_json::Value::Null),
                        );
                        break;
                    }
                    NodeKind::Str(s) => {
                        step.kind = NodeKind::Name(s.clone());
                    }
                    _ => {}
                }
                if step.keep_array {
                    keep_singleton = true;
                }
            }
            if bad_step.is_none() {
                if let Some(first) = steps.first_mut() {
                    if first.is_array_constructor() {
                        first.cons_array = true;
                    }
                }
                if let Some(last) = steps.last_mut() {
                    if last.is_array_constructor() {
                        last.cons_array = true;
                    }
                }
            }
        }
        if let Some(diagnostic) = bad_step {
            return self.fail(diagnostic);
        }
        if keep_singleton {
            result.keep_singleton_array = true;
        }

        if let Err(diagnostic) = resolve_ancestry(&mut result, &mut self.tracker) {
            return self.fail(diagnostic);
        }
        Ok(result)
    }

    /// Lower `lhs[rhs]` into a filter stage on the target step.
    fn process_filter(&mut self, lhs: Expr, rhs: Expr, span: Span) -> Result<Node> {
        let mut result = self.process_node(lhs)?;
        let mut predicate = self.process_node(rhs)?;

        let into_stages = result.is_path();
        let step: &mut Node = last_step_or_self(&mut result);

        if step.group.is_some() {
            return self.fail(Diagnostic::new(DiagnosticCode::S0209, span));
        }

        if !predicate.seeking_parent.is_empty() {
            let pending = std::mem::take(&mut predicate.seeking_parent);
            let mut propagated = Vec::with_capacity(pending.len());
            for mut slot in pending {
                if slot.level == 1 {
                    match seek_parent(step, slot, &mut self.tracker) {
                        Ok(bound) => propagated.push(bound),
                        Err(diagnostic) => return self.fail(diagnostic),
                    }
                } else {
                    slot.level -= 1;
                    propagated.push(slot);
                }
            }
            if let NodeKind::Parent(slot) = &predicate.kind {
                propagated.push(slot.clone());
            }
            step.seeking_parent.extend(propagated);
        }

        let stage = Stage::Filter {
            expr: Box::new(predicate),
            span,
        };
        if into_stages {
            step.stages.push(stage);
        } else {
            step.predicates.push(stage);
        }
        Ok(result)
    }

    /// Attach a group-by clause; a second one on the same node is `S0210`.
    fn process_group(&mut self, lhs: Expr, pairs: Vec<(Expr, Expr)>, span: Span) -> Result<Node> {
        let mut result = self.process_node(lhs)?;
        if result.group.is_some() {
            return self.fail(Diagnostic::new(DiagnosticCode::S0210, span));
        }
        let mut processed = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            let k = self.process_node(k)?;
            let v = self.process_node(v)?;
            processed.push((k, v));
        }
        result.group = Some(GroupBy {
            pairs: processed,
            span,
        });
        Ok(result)
    }

    /// Append an order-by step carrying its terms.
    fn process_sort(
        &mut self,
        lhs: Expr,
        terms: Vec<crate::ast::SortTermExpr>,
        span: Span,
    ) -> Result<Node> {
        let lhs = self.process_node(lhs)?;
        let mut result = if lhs.is_path() {
            lhs
        } else {
            Node::new(NodeKind::Path { steps: vec![lhs] }, span)
        };

        let mut sort_step = Node::new(NodeKind::Sort { terms: Vec::new() }, span);
        let mut processed = Vec::with_capacity(terms.len());
        for term in terms {
            let expression = self.process_node(term.expression)?;
            push_ancestry(&mut sort_step, &expression);
            processed.push(SortTerm {
                descending: term.descending,
                expression,
            });
        }
        sort_step.kind = NodeKind::Sort { terms: processed };

        if let NodeKind::Path { steps } = &mut result.kind {
            steps.push(sort_step);
        }
        if let Err(diagnostic) = resolve_ancestry(&mut result, &mut self.tracker) {
            return self.fail(diagnostic);
        }
        Ok(result)
    }

    /// Bind the focus variable (`@ $var`) onto the target step.
    ///
    /// `keep_array` is the flag of the `@` binary node itself.
    fn process_focus(&mut self, lhs: Expr, rhs: Expr, span: Span, keep: bool) -> Result<Node> {
        let binding = match binding_name(rhs) {
            Some(name) => name,
            None => return self.fail(Diagnostic::new(DiagnosticCode::S0201, span).with_token("@")),
        };
        let mut result = self.process_node(lhs)?;
        let step: &mut Node = last_step_or_self(&mut result);

        // at this point the only stages can be predicates
        if !step.stages.is_empty() || !step.predicates.is_empty() {
            return self.fail(Diagnostic::new(DiagnosticCode::S0215, span));
        }
        if matches!(step.kind, NodeKind::Sort { .. }) {
            return self.fail(Diagnostic::new(DiagnosticCode::S0216, span));
        }
        if keep {
            step.keep_array = true;
        }
        step.focus = Some(binding);
        step.tuple = true;
        Ok(result)
    }

    /// Bind the index variable (`# $var`) onto the target step or its stages.
    fn process_index_bind(&mut self, lhs: Expr, rhs: Expr, span: Span) -> Result<Node> {
        let binding = match binding_name(rhs) {
            Some(name) => name,
            None => return self.fail(Diagnostic::new(DiagnosticCode::S0201, span).with_token("#")),
        };
        let processed = self.process_node(lhs)?;
        let mut result = if processed.is_path() {
            processed
        } else {
            let mut step = processed;
            if !step.predicates.is_empty() {
                step.stages = std::mem::take(&mut step.predicates);
            }
            Node::new(NodeKind::Path { steps: vec![step] }, span)
        };

        if let NodeKind::Path { steps } = &mut result.kind {
            if let Some(step) = steps.last_mut() {
                if step.stages.is_empty() {
                    step.index_var = Some(binding);
                } else {
                    step.stages.push(Stage::Index { binding, span });
                }
                step.tuple = true;
            }
        }
        Ok(result)
    }

    fn process_flash_block(
        &mut self,
        block: crate::ast::FlashBlockExpr,
        span: Span,
    ) -> Result<Node> {
        self.contains_flash = true;

        let saved_stack = std::mem::take(&mut self.flash_path_stack);
        let saved_instance = self.current_instance_of.take();

        let instance_of = match block.instance_of {
            Some(decl) => {
                if valid_instance_of(&decl.value) {
                    self.tables.record_structure(&decl.value, decl.span);
                } else {
                    self.report(
                        Diagnostic::new(DiagnosticCode::F1026, decl.span)
                            .with_token(decl.value.clone()),
                    )?;
                }
                Some(decl.value)
            }
            None => {
                self.report(Diagnostic::new(DiagnosticCode::F1026, span))?;
                None
            }
        };
        self.current_instance_of = instance_of.clone();

        let mut node = Node::new(
            NodeKind::FlashBlock {
                instance_of: instance_of.clone(),
                expressions: Vec::new(),
            },
            span,
        );
        let mut out = Vec::with_capacity(block.expressions.len());
        let mut failure = None;
        for item in block.expressions {
            match self.process_node(item) {
                Ok(item) => {
                    push_ancestry(&mut node, &item);
                    out.push(item);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.flash_path_stack = saved_stack;
        self.current_instance_of = saved_instance;

        if let Some(e) = failure {
            return Err(e);
        }
        if let NodeKind::FlashBlock { expressions, .. } = &mut node.kind {
            *expressions = out;
        }
        Ok(node)
    }

    fn process_flash_rule(&mut self, rule: crate::ast::FlashRuleExpr, span: Span) -> Result<Node> {
        self.contains_flash = true;

        // the pre-pass guarantees a single-step path
        let step = rule.path.steps.into_iter().next();
        if let Some(step) = &step {
            self.flash_path_stack.push(step.clone());
        }

        let mut node = Node::new(
            NodeKind::FlashRule {
                meta: Box::new(FlashRuleMeta {
                    step: step.clone().unwrap_or_else(|| FlashPathStep::new("", span)),
                    instance_of: self.current_instance_of.clone(),
                    path_ref_key: None,
                    is_virtual: false,
                }),
                inline: None,
                expressions: Vec::new(),
            },
            span,
        );

        let mut failure = None;
        let mut inline_out = None;
        if let Some(inline) = rule.inline {
            match self.process_node(*inline) {
                Ok(inline) => {
                    push_ancestry(&mut node, &inline);
                    inline_out = Some(Box::new(inline));
                }
                Err(e) => failure = Some(e),
            }
        }
        let mut out = Vec::with_capacity(rule.expressions.len());
        if failure.is_none() {
            for item in rule.expressions {
                match self.process_node(item) {
                    Ok(item) => {
                        push_ancestry(&mut node, &item);
                        out.push(item);
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        // materialize the absolute path while the stack still holds our step
        let path_ref_key = match (&self.current_instance_of, &step) {
            (Some(instance_of), Some(_)) => {
                let key = ReferenceTables::element_key(instance_of, &self.flash_path_stack);
                let full_path: Vec<String> = self
                    .flash_path_stack
                    .iter()
                    .map(FlashPathStep::render)
                    .collect();
                self.tables.record_element(
                    &key,
                    ElementRef {
                        instance_of: instance_of.clone(),
                        full_path: full_path.join("."),
                        steps: self.flash_path_stack.clone(),
                    },
                );
                Some(key)
            }
            _ => None,
        };

        if step.is_some() {
            self.flash_path_stack.pop();
        }
        if let Some(e) = failure {
            return Err(e);
        }

        if let NodeKind::FlashRule {
            meta,
            inline,
            expressions,
        } = &mut node.kind
        {
            meta.path_ref_key = path_ref_key;
            *inline = inline_out;
            *expressions = out;
        }
        Ok(node)
    }
}

/// Slots a processed child would contribute via `push_ancestry`.
fn collect_slots(value: &Node) -> Vec<Slot> {
    let mut slots = value.seeking_parent.clone();
    if let NodeKind::Parent(slot) = &value.kind {
        slots.push(slot.clone());
    }
    slots
}

fn first_step_cons_array(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Path { steps } => steps.first().map(|s| s.cons_array).unwrap_or(false),
        _ => false,
    }
}

/// `f().g()` - the name of the next call in the chain, when `rest` is a
/// function whose procedure is a one-step name path.
fn chained_function_name(rest: &Node) -> Option<String> {
    let NodeKind::Function { procedure, .. } = &rest.kind else {
        return None;
    };
    let NodeKind::Path { steps } = &procedure.kind else {
        return None;
    };
    if steps.len() != 1 {
        return None;
    }
    match &steps[0].kind {
        NodeKind::Name(name) => Some(name.clone()),
        _ => None,
    }
}

/// The last step of a path, or the node itself when it is not a path.
fn last_step_or_self(node: &mut Node) -> &mut Node {
    let has_last = matches!(&node.kind, NodeKind::Path { steps } if !steps.is_empty());
    if has_last {
        match &mut node.kind {
            NodeKind::Path { steps } => {
                let last = steps.len() - 1;
                &mut steps[last]
            }
            _ => unreachable!(),
        }
    } else {
        node
    }
}

fn binding_name(rhs: Expr) -> Option<String> {
    match rhs.kind {
        ExprKind::Var(name) | ExprKind::Name(name) => Some(name),
        _ => None,
    }
}

/// Rewrite terminal calls in a lambda body into trampoline thunks.
fn tail_call_optimize(mut node: Node) -> Node {
    let kind = std::mem::replace(&mut node.kind, NodeKind::Null);
    match kind {
        call @ NodeKind::Function { .. } if node.predicates.is_empty() => {
            node.kind = call;
            let span = node.span;
            Node::new(
                NodeKind::Lambda {
                    params: Vec::new(),
                    signature: None,
                    body: Box::new(node),
                    thunk: true,
                },
                span,
            )
        }
        NodeKind::Condition {
            condition,
            then_branch,
            else_branch,
        } => {
            node.kind = NodeKind::Condition {
                condition,
                then_branch: Box::new(tail_call_optimize(*then_branch)),
                else_branch: else_branch.map(|e| Box::new(tail_call_optimize(*e))),
            };
            node
        }
        NodeKind::Block(mut expressions) => {
            if let Some(last) = expressions.pop() {
                expressions.push(tail_call_optimize(last));
            }
            node.kind = NodeKind::Block(expressions);
            node
        }
        other => {
            node.kind = other;
            node
        }
    }
}

/// An `InstanceOf:` identifier is a FHIR name/id or a canonical URL.
fn valid_instance_of(value: &str) -> bool {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return false;
    }
    if value.contains("://") {
        return true;
    }
    let re = NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9\-.]*$").unwrap());
    re.is_match(value)
}
