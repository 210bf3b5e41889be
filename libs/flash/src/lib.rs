//! FLASH expression engine core
//!
//! FLASH layers FHIR-resource construction over a JSONata-style expression
//! language: a block opens with `InstanceOf: <typeId>` and its `* path =
//! expr` rules build a validated resource under the guidance of a
//! StructureDefinition catalog.
//!
//! This crate is the engine core around an external tokenizer/parser and
//! evaluator:
//!
//! ```text
//! Expression String
//!      |
//!   Parser (external) -> raw AST (ast::Expr)
//!      |
//! Post-processing -> lowered tree (ir::Node) + reference tables
//!      |
//! Evaluator (external), calling back into:
//!      validate::*   - FHIR primitive validation & canonicalization
//!      assemble::*   - flash child-value assembly & mandatory checks
//!      policy::*     - severity-threshold diagnostics
//! ```

pub mod assemble;
pub mod ast;
pub mod codes;
pub mod engine;
pub mod error;
pub mod ir;
pub mod policy;
pub mod postprocess;
pub mod validate;

// Re-export main types
pub use assemble::{
    apply_entries, validate_mandatory_children, ChildValueProcessor, FlashRuleResult,
    MandatoryChild, RuleScope,
};
pub use ast::{BinaryOp, Expr, ExprKind, Span};
pub use codes::{DiagnosticCode, Severity};
pub use engine::{
    CompileOptions, CompiledExpression, Engine, EvalContext, EvalOutput, Evaluator, VerboseOutcome,
};
pub use error::{Diagnostic, Error, Result};
pub use ir::{Node, NodeKind, Slot, Stage};
pub use policy::{Policy, PolicyConfig};
pub use postprocess::{process, ProcessedExpr};
pub use validate::validate_primitive;
