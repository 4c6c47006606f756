use tine_diagnostic::CompileError;
use tine_ir::{NodeId, NodeKind};

use super::{rewrite_post_order, Optimization, Phase};
use crate::{FunctionContext, Unit};

/// Removes branches behind constant conditions.
pub struct DeadCodeElimination;

impl Optimization for DeadCodeElimination {
    fn id(&self) -> &'static str {
        "dead_code"
    }

    fn run(
        &self,
        unit: &mut Unit,
        root: NodeId,
        _cx: FunctionContext,
        _phase: Phase,
    ) -> Result<usize, CompileError> {
        rewrite_post_order(unit, root, &mut |unit, node| {
            let ast = &unit.fe.ast;
            let keep = match *ast.kind(node) {
                NodeKind::If {
                    cond,
                    then_branch,
                    else_branch,
                } => match ast.literal(cond) {
                    Some(c) if c.is_truthy() => Some(Some(then_branch)),
                    Some(_) => Some(else_branch),
                    None => None,
                },
                NodeKind::While { cond, .. } => match ast.literal(cond) {
                    Some(c) if !c.is_truthy() => Some(None),
                    _ => None,
                },
                NodeKind::Ternary {
                    cond,
                    then_expr,
                    else_expr,
                } => ast
                    .literal(cond)
                    .map(|c| Some(if c.is_truthy() { then_expr } else { else_expr })),
                _ => None,
            };
            let Some(keep) = keep else {
                return Ok(false);
            };
            let loc = ast.loc(node);
            match keep {
                Some(branch) => unit.fe.ast.replace_with(node, branch),
                None => unit.fe.ast.replace(node, NodeKind::Noop),
            }
            unit.note("removed unreachable branch", loc);
            Ok(true)
        })
    }
}
