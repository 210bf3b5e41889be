//! Flash pre-pass
//!
//! Pure rewriting ahead of the main lowering:
//! - a block's `Instance:` expression becomes a synthesized top-of-block
//!   rule targeting the single step `id`;
//! - a rule with a multi-step path is unchained into nested single-step
//!   rules, the innermost keeping the inline expression and sub-rules, the
//!   outermost keeping the context;
//! - a rule with a context is rewritten into `(context).(rule)`, both sides
//!   wrapped in blocks so parent-seeking inherits the right scope.

use crate::ast::{
    BinaryOp, Expr, ExprKind, FlashBlockExpr, FlashPath, FlashPathStep, FlashRuleExpr, SortTermExpr,
};

pub(crate) fn pre_process(expr: Expr) -> Expr {
    let Expr {
        kind,
        span,
        keep_array,
    } = expr;

    let kind = match kind {
        ExprKind::FlashBlock(block) => return pre_process_block(block, span, keep_array),
        ExprKind::FlashRule(rule) => return pre_process_rule(rule, span, keep_array),

        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op,
            lhs: boxed(lhs),
            rhs: boxed(rhs),
        },
        ExprKind::Sort { lhs, terms } => ExprKind::Sort {
            lhs: boxed(lhs),
            terms: terms
                .into_iter()
                .map(|t| SortTermExpr {
                    descending: t.descending,
                    expression: pre_process(t.expression),
                })
                .collect(),
        },
        ExprKind::Group { lhs, pairs } => ExprKind::Group {
            lhs: boxed(lhs),
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (pre_process(k), pre_process(v)))
                .collect(),
        },
        ExprKind::Neg(inner) => ExprKind::Neg(boxed(inner)),
        ExprKind::ArrayCtor(exprs) => {
            ExprKind::ArrayCtor(exprs.into_iter().map(pre_process).collect())
        }
        ExprKind::ObjectCtor(pairs) => ExprKind::ObjectCtor(
            pairs
                .into_iter()
                .map(|(k, v)| (pre_process(k), pre_process(v)))
                .collect(),
        ),
        ExprKind::Block(exprs) => ExprKind::Block(exprs.into_iter().map(pre_process).collect()),
        ExprKind::Function {
            procedure,
            args,
            is_partial,
        } => ExprKind::Function {
            procedure: boxed(procedure),
            args: args.into_iter().map(pre_process).collect(),
            is_partial,
        },
        ExprKind::Lambda {
            params,
            signature,
            body,
        } => ExprKind::Lambda {
            params,
            signature,
            body: boxed(body),
        },
        ExprKind::Condition {
            condition,
            then_branch,
            else_branch,
        } => ExprKind::Condition {
            condition: boxed(condition),
            then_branch: boxed(then_branch),
            else_branch: else_branch.map(boxed),
        },
        ExprKind::Coalesce { lhs, rhs } => ExprKind::Coalesce {
            lhs: boxed(lhs),
            rhs: boxed(rhs),
        },
        ExprKind::Elvis { lhs, rhs } => ExprKind::Elvis {
            lhs: boxed(lhs),
            rhs: boxed(rhs),
        },
        ExprKind::Transform {
            pattern,
            update,
            delete,
        } => ExprKind::Transform {
            pattern: boxed(pattern),
            update: boxed(update),
            delete: delete.map(boxed),
        },
        ExprKind::Error { error, expr } => ExprKind::Error {
            error,
            expr: expr.map(boxed),
        },

        leaf @ (ExprKind::Str(_)
        | ExprKind::Num(_)
        | ExprKind::Bool(_)
        | ExprKind::Null
        | ExprKind::Name(_)
        | ExprKind::Var(_)
        | ExprKind::Regex(_)
        | ExprKind::Wildcard
        | ExprKind::Descendant
        | ExprKind::Parent
        | ExprKind::Operator(_)
        | ExprKind::End) => leaf,
    };

    Expr {
        kind,
        span,
        keep_array,
    }
}

fn boxed(expr: Box<Expr>) -> Box<Expr> {
    Box::new(pre_process(*expr))
}

fn pre_process_block(
    block: FlashBlockExpr,
    span: crate::ast::Span,
    keep_array: bool,
) -> Expr {
    let mut expressions = Vec::with_capacity(block.expressions.len() + 1);

    // `Instance: <expr>` becomes the top-of-block rule `* id = <expr>`.
    if let Some(instance_expr) = block.instance_expr {
        let rule_span = instance_expr.span;
        let rule = FlashRuleExpr {
            path: FlashPath {
                steps: vec![FlashPathStep::new("id", rule_span)],
                span: rule_span,
            },
            context: None,
            inline: Some(Box::new(pre_process(*instance_expr))),
            expressions: Vec::new(),
        };
        expressions.push(Expr::new(ExprKind::FlashRule(rule), rule_span));
    }

    expressions.extend(block.expressions.into_iter().map(pre_process));

    Expr {
        kind: ExprKind::FlashBlock(FlashBlockExpr {
            instance_of: block.instance_of,
            instance_expr: None,
            expressions,
        }),
        span,
        keep_array,
    }
}

fn pre_process_rule(rule: FlashRuleExpr, span: crate::ast::Span, keep_array: bool) -> Expr {
    let FlashRuleExpr {
        path,
        context,
        inline,
        expressions,
    } = rule;

    let context = context.map(boxed);
    let inline = inline.map(boxed);
    let expressions: Vec<Expr> = expressions.into_iter().map(pre_process).collect();

    let mut steps = path.steps;
    let last = match steps.pop() {
        Some(step) => step,
        None => {
            // degenerate rule with an empty path; keep it inert
            let kind = ExprKind::FlashRule(FlashRuleExpr {
                path: FlashPath { steps, span: path.span },
                context,
                inline,
                expressions,
            });
            return Expr {
                kind,
                span,
                keep_array,
            };
        }
    };

    // Innermost rule keeps the inline expression and sub-rules.
    let mut result = Expr::new(
        ExprKind::FlashRule(FlashRuleExpr {
            path: FlashPath {
                span: last.span,
                steps: vec![last.clone()],
            },
            context: None,
            inline,
            expressions,
        }),
        last.span,
    );

    // Wrap outward, one rule per remaining step.
    while let Some(step) = steps.pop() {
        result = Expr::new(
            ExprKind::FlashRule(FlashRuleExpr {
                path: FlashPath {
                    span: step.span,
                    steps: vec![step.clone()],
                },
                context: None,
                inline: None,
                expressions: vec![result],
            }),
            step.span,
        );
    }

    result.span = span;
    result.keep_array = keep_array;

    // `(context).(rule)`, both sides block-wrapped for parent scoping.
    if let Some(context) = context {
        let ctx_span = context.span;
        let lhs = Expr::new(ExprKind::Block(vec![*context]), ctx_span);
        let rhs_span = result.span;
        let rhs = Expr::new(ExprKind::Block(vec![result]), rhs_span);
        return Expr::binary(BinaryOp::Path, lhs, rhs, span);
    }

    result
}
