//! Lowered expression tree
//!
//! The evaluator-ready representation produced by post-processing. Dot and
//! bracket operators are gone: navigation is a [`NodeKind::Path`] over
//! ordered steps, and each step carries its stages. Flash constructs are
//! dedicated variants carrying their resolved metadata, and unresolved
//! parent references travel as numbered [`Slot`]s.

use crate::ast::{BinaryOp, FlashPathStep, Span};
use crate::error::Diagnostic;

/// A numbered ancestor reference. `level` counts how many path boundaries
/// remain before the slot binds to a step; `index` addresses the label table
/// owned by the ancestry tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub label: String,
    pub level: usize,
    pub index: usize,
}

/// A post-name operation on a step, consulted in append order.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Filter { expr: Box<Node>, span: Span },
    Index { binding: String, span: Span },
}

/// One term of an order-by step.
#[derive(Debug, Clone, PartialEq)]
pub struct SortTerm {
    pub descending: bool,
    pub expression: Node,
}

/// A group-by clause attached to a step or path.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub pairs: Vec<(Node, Node)>,
    pub span: Span,
}

/// Resolved metadata of a lowered flash rule.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashRuleMeta {
    /// The rule's single path step (multi-step rules are unchained before
    /// lowering).
    pub step: FlashPathStep,
    /// The `InstanceOf:` type id of the enclosing block.
    pub instance_of: Option<String>,
    /// Key into the element-definition reference table.
    pub path_ref_key: Option<String>,
    /// True for evaluator-synthesized rules computing mandatory defaults.
    pub is_virtual: bool,
}

/// A lowered node: a kind plus the annotations the evaluator consults.
///
/// The annotation fields mirror the step/stage model: most are only
/// meaningful when the node is used as a path step (`stages`, `group`,
/// `focus`, `index_var`, `tuple`, `ancestor`), a path (`keep_singleton_array`,
/// `seeking_parent`), or an array constructor (`cons_array`).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub keep_array: bool,
    pub cons_array: bool,
    pub keep_singleton_array: bool,
    pub tuple: bool,
    pub focus: Option<String>,
    pub index_var: Option<String>,
    pub stages: Vec<Stage>,
    /// Filter stages accumulated before the node joined a path.
    pub predicates: Vec<Stage>,
    pub group: Option<GroupBy>,
    pub ancestor: Option<Slot>,
    pub seeking_parent: Vec<Slot>,
    /// Next-in-chain hint when a function step is followed by another call.
    pub next_function: Option<String>,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            keep_array: false,
            cons_array: false,
            keep_singleton_array: false,
            tuple: false,
            focus: None,
            index_var: None,
            stages: Vec::new(),
            predicates: Vec::new(),
            group: None,
            ancestor: None,
            seeking_parent: Vec::new(),
            next_function: None,
        }
    }

    pub fn is_path(&self) -> bool {
        matches!(self.kind, NodeKind::Path { .. })
    }

    /// The node's type tag, as reported in diagnostics.
    pub fn tag(&self) -> &'static str {
        match &self.kind {
            NodeKind::Str(_) => "string",
            NodeKind::Num(_) => "number",
            NodeKind::Bool(_) | NodeKind::Null => "value",
            NodeKind::Name(_) => "name",
            NodeKind::Var(_) => "variable",
            NodeKind::Regex(_) => "regex",
            NodeKind::Wildcard => "wildcard",
            NodeKind::Descendant => "descendant",
            NodeKind::Parent(_) => "parent",
            NodeKind::PartialArg => "operator",
            NodeKind::Path { .. } => "path",
            NodeKind::Sort { .. } => "sort",
            NodeKind::Binary { .. } => "binary",
            NodeKind::Bind { .. } => "bind",
            NodeKind::Apply { .. } => "apply",
            NodeKind::Neg(_) => "unary",
            NodeKind::ArrayCtor(_) => "unary",
            NodeKind::ObjectCtor(_) => "unary",
            NodeKind::Block(_) => "block",
            NodeKind::Function { .. } => "function",
            NodeKind::Lambda { .. } => "lambda",
            NodeKind::Condition { .. } => "condition",
            NodeKind::Coalesce { .. } => "coalesce",
            NodeKind::Elvis { .. } => "elvis",
            NodeKind::Transform { .. } => "transform",
            NodeKind::Error(_) => "error",
            NodeKind::FlashBlock { .. } => "flashblock",
            NodeKind::FlashRule { .. } => "flashrule",
        }
    }

    /// Array-constructor steps get `cons_array` treatment; flash blocks and
    /// rules lower from array constructors and count as well.
    pub fn is_array_constructor(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::ArrayCtor(_) | NodeKind::FlashBlock { .. } | NodeKind::FlashRule { .. }
        )
    }

    /// Visit this node and every descendant, including stage and group
    /// sub-expressions.
    pub fn for_each_descendant(&self, f: &mut dyn FnMut(&Node)) {
        f(self);
        for stage in self.stages.iter().chain(self.predicates.iter()) {
            if let Stage::Filter { expr, .. } = stage {
                expr.for_each_descendant(f);
            }
        }
        if let Some(group) = &self.group {
            for (k, v) in &group.pairs {
                k.for_each_descendant(f);
                v.for_each_descendant(f);
            }
        }
        match &self.kind {
            NodeKind::Path { steps } => {
                for step in steps {
                    step.for_each_descendant(f);
                }
            }
            NodeKind::Sort { terms } => {
                for term in terms {
                    term.expression.for_each_descendant(f);
                }
            }
            NodeKind::Binary { lhs, rhs, .. }
            | NodeKind::Bind { lhs, rhs }
            | NodeKind::Apply { lhs, rhs }
            | NodeKind::Coalesce { lhs, rhs }
            | NodeKind::Elvis { lhs, rhs } => {
                lhs.for_each_descendant(f);
                rhs.for_each_descendant(f);
            }
            NodeKind::Neg(inner) => inner.for_each_descendant(f),
            NodeKind::ArrayCtor(exprs) | NodeKind::Block(exprs) => {
                for e in exprs {
                    e.for_each_descendant(f);
                }
            }
            NodeKind::ObjectCtor(pairs) => {
                for (k, v) in pairs {
                    k.for_each_descendant(f);
                    v.for_each_descendant(f);
                }
            }
            NodeKind::Function {
                procedure, args, ..
            } => {
                procedure.for_each_descendant(f);
                for a in args {
                    a.for_each_descendant(f);
                }
            }
            NodeKind::Lambda { body, .. } => body.for_each_descendant(f),
            NodeKind::Condition {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.for_each_descendant(f);
                then_branch.for_each_descendant(f);
                if let Some(e) = else_branch {
                    e.for_each_descendant(f);
                }
            }
            NodeKind::Transform {
                pattern,
                update,
                delete,
            } => {
                pattern.for_each_descendant(f);
                update.for_each_descendant(f);
                if let Some(d) = delete {
                    d.for_each_descendant(f);
                }
            }
            NodeKind::FlashBlock { expressions, .. } => {
                for e in expressions {
                    e.for_each_descendant(f);
                }
            }
            NodeKind::FlashRule {
                inline,
                expressions,
                ..
            } => {
                if let Some(i) = inline {
                    i.for_each_descendant(f);
                }
                for e in expressions {
                    e.for_each_descendant(f);
                }
            }
            NodeKind::Str(_)
            | NodeKind::Num(_)
            | NodeKind::Bool(_)
            | NodeKind::Null
            | NodeKind::Name(_)
            | NodeKind::Var(_)
            | NodeKind::Regex(_)
            | NodeKind::Wildcard
            | NodeKind::Descendant
            | NodeKind::Parent(_)
            | NodeKind::PartialArg
            | NodeKind::Error(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Literals
    Str(String),
    Num(f64),
    Bool(bool),
    Null,

    // Terms
    Name(String),
    Var(String),
    Regex(String),
    Wildcard,
    Descendant,
    /// An unbound ancestor reference carrying its slot.
    Parent(Slot),
    /// The surviving `?` placeholder of a partial application.
    PartialArg,

    // Structure
    Path {
        steps: Vec<Node>,
    },
    /// An order-by step inside a path.
    Sort {
        terms: Vec<SortTerm>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Bind {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Apply {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Neg(Box<Node>),
    ArrayCtor(Vec<Node>),
    ObjectCtor(Vec<(Node, Node)>),
    Block(Vec<Node>),
    Function {
        procedure: Box<Node>,
        args: Vec<Node>,
        is_partial: bool,
    },
    Lambda {
        params: Vec<String>,
        signature: Option<String>,
        body: Box<Node>,
        /// True for trampoline thunks introduced by tail-call optimization.
        thunk: bool,
    },
    Condition {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    Coalesce {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Elvis {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Transform {
        pattern: Box<Node>,
        update: Box<Node>,
        delete: Option<Box<Node>>,
    },
    /// Recover-mode sentinel substituted for an unprocessable node.
    Error(Box<Diagnostic>),

    // Flash
    FlashBlock {
        instance_of: Option<String>,
        expressions: Vec<Node>,
    },
    FlashRule {
        meta: Box<FlashRuleMeta>,
        /// The rule's inline (`= expr`) expression, evaluated before the
        /// sub-rules.
        inline: Option<Box<Node>>,
        expressions: Vec<Node>,
    },
}
