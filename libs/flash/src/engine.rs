//! Engine orchestration
//!
//! Wires the pieces together: compile (post-process) a raw parse tree, then
//! run it through the external evaluator with a per-evaluation context
//! carrying the policy view, diagnostics bag, and navigator handle.
//!
//! The evaluator itself is an external collaborator: it executes the lowered
//! tree and calls back into this crate's validation and assembly services as
//! it produces flash results.

use crate::assemble::FlashRuleResult;
use crate::ast::Expr;
use crate::error::{Diagnostic, Error, Result};
use crate::ir::Node;
use crate::policy::{Policy, PolicyConfig};
use crate::postprocess::{self, refs::ReferenceTables};
use async_trait::async_trait;
use fulmen_navigator::StructureNavigator;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Compile-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Collect shape faults and substitute error sentinels instead of
    /// aborting on the first one.
    pub recover: bool,
}

/// A post-processed expression, immutable after compilation.
#[derive(Debug)]
pub struct CompiledExpression {
    root: Node,
    contains_flash: bool,
    tables: ReferenceTables,
    ancestry_labels: Vec<String>,
    errors: Vec<Diagnostic>,
}

impl CompiledExpression {
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn contains_flash(&self) -> bool {
        self.contains_flash
    }

    pub fn reference_tables(&self) -> &ReferenceTables {
        &self.tables
    }

    /// Final ancestor labels, indexed by slot index.
    pub fn ancestry_labels(&self) -> &[String] {
        &self.ancestry_labels
    }

    /// Shape faults collected under `recover`.
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}

/// The result of one evaluator invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutput {
    Value(Value),
    /// Output of a flash rule: tagged per-value results.
    Rules(Vec<FlashRuleResult>),
    /// No value produced (distinct from JSON null).
    Nothing,
}

/// The external evaluator executing a post-processed tree.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, node: &Node, input: &Value, ctx: &EvalContext) -> Result<EvalOutput>;
}

/// Per-evaluation state: policy view, diagnostics bag, navigator handle.
pub struct EvalContext {
    policy: Policy,
    navigator: Option<Arc<dyn StructureNavigator>>,
}

impl EvalContext {
    pub fn new(config: PolicyConfig, navigator: Option<Arc<dyn StructureNavigator>>) -> Self {
        Self {
            policy: Policy::new(config),
            navigator,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn navigator(&self) -> Option<&Arc<dyn StructureNavigator>> {
        self.navigator.as_ref()
    }

    /// Get-or-compile a full-match tester, through the navigator's cache
    /// when one is attached.
    pub fn compiled_regex(&self, source: &str) -> Result<Arc<regex::Regex>> {
        match &self.navigator {
            Some(nav) => Ok(nav.compiled_regex(source)?),
            None => regex::Regex::new(&format!("^(?:{source})$"))
                .map(Arc::new)
                .map_err(|e| {
                    Error::Navigator(fulmen_navigator::Error::InvalidRegex {
                        pattern: source.to_string(),
                        detail: e.to_string(),
                    })
                }),
        }
    }
}

/// Verbose evaluation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct VerboseOutcome {
    pub ok: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub diagnostics: Vec<Diagnostic>,
}

impl VerboseOutcome {
    fn from_parts(result: Option<Value>, diagnostics: Vec<Diagnostic>) -> Self {
        let min_severity = diagnostics
            .iter()
            .map(|d| d.code.severity().level())
            .min();
        let (ok, status) = match min_severity {
            None => (true, 200),
            Some(s) if s < 30 => (false, 422),
            Some(s) if s < 50 => (s >= 40, 206),
            Some(_) => (true, 200),
        };
        Self {
            ok,
            status,
            result,
            diagnostics,
        }
    }
}

/// The FLASH engine: compiles raw parse trees and drives the evaluator.
pub struct Engine {
    evaluator: Arc<dyn Evaluator>,
    navigator: Option<Arc<dyn StructureNavigator>>,
}

impl Engine {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            navigator: None,
        }
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn StructureNavigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn navigator(&self) -> Option<&Arc<dyn StructureNavigator>> {
        self.navigator.as_ref()
    }

    /// Post-process a raw parse tree into an evaluator-ready expression.
    pub fn compile(&self, expr: Expr, options: CompileOptions) -> Result<CompiledExpression> {
        let processed = postprocess::process(expr, options.recover)?;
        if processed.contains_flash && self.navigator.is_none() {
            return Err(Error::NavigatorRequired);
        }
        Ok(CompiledExpression {
            root: processed.root,
            contains_flash: processed.contains_flash,
            tables: processed.tables,
            ancestry_labels: processed.ancestry_labels,
            errors: processed.errors,
        })
    }

    /// Evaluate, returning the result or the first enforced diagnostic.
    pub async fn evaluate(
        &self,
        compiled: &CompiledExpression,
        input: &Value,
        config: PolicyConfig,
    ) -> Result<Value> {
        let ctx = EvalContext::new(config, self.navigator.clone());
        let output = self.evaluator.evaluate(&compiled.root, input, &ctx).await?;
        Ok(flatten_output(output))
    }

    /// Evaluate, returning result and diagnostics instead of throwing
    /// policy-governed faults.
    pub async fn evaluate_verbose(
        &self,
        compiled: &CompiledExpression,
        input: &Value,
        config: PolicyConfig,
    ) -> Result<VerboseOutcome> {
        let ctx = EvalContext::new(config, self.navigator.clone());
        match self.evaluator.evaluate(&compiled.root, input, &ctx).await {
            Ok(output) => {
                let diagnostics = ctx.policy().take_collected();
                Ok(VerboseOutcome::from_parts(
                    Some(flatten_output(output)),
                    diagnostics,
                ))
            }
            Err(Error::Diagnostic(thrown)) => {
                let mut diagnostics = ctx.policy().take_collected();
                if !diagnostics.iter().any(|d| *d == *thrown) {
                    diagnostics.push(*thrown);
                }
                Ok(VerboseOutcome::from_parts(None, diagnostics))
            }
            Err(other) => Err(other),
        }
    }
}

fn flatten_output(output: EvalOutput) -> Value {
    match output {
        EvalOutput::Value(v) => v,
        EvalOutput::Rules(rules) => {
            Value::Array(rules.into_iter().map(|r| r.value).collect())
        }
        EvalOutput::Nothing => Value::Null,
    }
}
