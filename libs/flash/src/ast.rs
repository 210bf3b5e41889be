//! Raw abstract syntax tree
//!
//! The contract with the external tokenizer/parser: a grammar-shaped tree
//! with no semantic analysis. Post-processing (see [`crate::postprocess`])
//! lowers this into the evaluator-ready tree in [`crate::ir`].
//!
//! Every node carries the source position triple. `keep_array` records a
//! trailing `[]` on the expression; the lowering turns it into singleton
//! preservation on paths.

use crate::error::Diagnostic;

/// Source position triple: offset past the token, token start offset, line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub position: usize,
    pub start: usize,
    pub line: usize,
}

impl Span {
    pub fn new(position: usize, start: usize, line: usize) -> Self {
        Self {
            position,
            start,
            line,
        }
    }
}

/// A raw parse-tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub keep_array: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            keep_array: false,
        }
    }

    pub fn name(value: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Name(value.into()), span)
    }

    pub fn string(value: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Str(value.into()), span)
    }

    pub fn number(value: f64, span: Span) -> Self {
        Self::new(ExprKind::Num(value), span)
    }

    pub fn variable(name: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Var(name.into()), span)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, span: Span) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        )
    }
}

/// Binary operators as the parser emits them. The path-forming ones (`.`,
/// `[`, `@`, `#`) are eliminated by post-processing; the rest survive into
/// the lowered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Path-forming
    Path,      // .
    Filter,    // [
    Focus,     // @
    IndexBind, // #
    Bind,      // :=
    Apply,     // ~>

    // Value-level
    Add,                // +
    Subtract,           // -
    Multiply,           // *
    Divide,             // /
    Modulo,             // %
    Equal,              // =
    NotEqual,           // !=
    LessThan,           // <
    LessThanOrEqual,    // <=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    Concat,             // &
    And,                // and
    Or,                 // or
    In,                 // in
    Range,              // ..
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Path => ".",
            BinaryOp::Filter => "[",
            BinaryOp::Focus => "@",
            BinaryOp::IndexBind => "#",
            BinaryOp::Bind => ":=",
            BinaryOp::Apply => "~>",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Concat => "&",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
            BinaryOp::Range => "..",
        }
    }
}

/// One `expr` / `expr%` term of an order-by clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SortTermExpr {
    pub descending: bool,
    pub expression: Expr,
}

/// The `InstanceOf:` header of a flash block.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceOfDecl {
    pub value: String,
    pub span: Span,
}

/// One segment of a flash path, optionally sliced (`name[sliceName]`).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlashPathStep {
    pub name: String,
    pub slice: Option<String>,
    pub span: Span,
}

impl FlashPathStep {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            slice: None,
            span,
        }
    }

    pub fn sliced(name: impl Into<String>, slice: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            slice: Some(slice.into()),
            span,
        }
    }

    /// Render as it appears in an element reference key.
    pub fn render(&self) -> String {
        match &self.slice {
            Some(slice) => format!("{}[{}]", self.name, slice),
            None => self.name.clone(),
        }
    }
}

/// The dotted element path of a flash rule.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashPath {
    pub steps: Vec<FlashPathStep>,
    pub span: Span,
}

/// A flash block: `InstanceOf:` header, optional `Instance:` expression,
/// and the contained rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashBlockExpr {
    pub instance_of: Option<InstanceOfDecl>,
    pub instance_expr: Option<Box<Expr>>,
    pub expressions: Vec<Expr>,
}

/// A flash rule: `* path = inline { sub-rules }`, optionally with a
/// `(context)` prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashRuleExpr {
    pub path: FlashPath,
    pub context: Option<Box<Expr>>,
    pub inline: Option<Box<Expr>>,
    pub expressions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // Literals
    Str(String),
    Num(f64),
    Bool(bool),
    Null,

    // Terms
    Name(String),
    /// `$name`; the empty string is the context variable `$`.
    Var(String),
    Regex(String),
    Wildcard,
    Descendant,
    Parent,
    /// An operator token in operand position (`and`, `or`, `in` used as a
    /// name; `?` as the partial-application placeholder).
    Operator(String),

    // Operators
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Order-by: `lhs ^ (terms)`.
    Sort {
        lhs: Box<Expr>,
        terms: Vec<SortTermExpr>,
    },
    /// Group-by: `lhs { key: value, ... }`.
    Group {
        lhs: Box<Expr>,
        pairs: Vec<(Expr, Expr)>,
    },
    /// Unary minus.
    Neg(Box<Expr>),
    /// Array constructor `[ ... ]`.
    ArrayCtor(Vec<Expr>),
    /// Object constructor `{ ... }` in operand position.
    ObjectCtor(Vec<(Expr, Expr)>),
    /// Parenthesized expression sequence `( e1; e2; ... )`.
    Block(Vec<Expr>),
    Function {
        procedure: Box<Expr>,
        args: Vec<Expr>,
        is_partial: bool,
    },
    Lambda {
        params: Vec<String>,
        signature: Option<String>,
        body: Box<Expr>,
    },
    Condition {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    /// `lhs ?? rhs`
    Coalesce {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `lhs ?: rhs`
    Elvis {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Object transform `| pattern | update [, delete] |`.
    Transform {
        pattern: Box<Expr>,
        update: Box<Expr>,
        delete: Option<Box<Expr>>,
    },
    /// Parser error-recovery node, possibly wrapping a partial expression.
    Error {
        error: Box<Diagnostic>,
        expr: Option<Box<Expr>>,
    },
    /// End of input reached where an operand was expected.
    End,

    // Flash constructs
    FlashBlock(FlashBlockExpr),
    FlashRule(FlashRuleExpr),
}
