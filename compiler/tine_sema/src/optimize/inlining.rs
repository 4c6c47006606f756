use tine_diagnostic::CompileError;
use tine_ir::{Ast, CallTarget, FunctionId, FunctionKind, InlineBody, NodeId, NodeKind};
use tine_parse::parse_inline;
use tracing::debug;

use super::{rewrite_post_order, Optimization, Phase};
use crate::{FunctionContext, Unit};

/// Nested inline expansions allowed below one call site.
const MAX_INLINE_DEPTH: usize = 8;

/// Splices the bodies of `inline` functions into their call sites.
///
/// The callee is re-parsed with each parameter bound to a local that is
/// initialised from the argument, so every argument is still evaluated
/// exactly once and in order. The spliced body then runs through the
/// front passes in a scope of its own.
pub struct FunctionInlining;

impl Optimization for FunctionInlining {
    fn id(&self) -> &'static str {
        "inlining"
    }

    fn run(
        &self,
        unit: &mut Unit,
        root: NodeId,
        _cx: FunctionContext,
        phase: Phase,
    ) -> Result<usize, CompileError> {
        if phase == Phase::PreSymbol {
            return Ok(0);
        }
        rewrite_post_order(unit, root, &mut |unit, node| {
            let NodeKind::Call(call) = unit.fe.ast.kind(node) else {
                return Ok(false);
            };
            let Some(CallTarget::Function(callee)) = call.target else {
                return Ok(false);
            };
            let args = call.args.clone();
            if !can_inline(unit, callee) {
                return Ok(false);
            }
            inline_call(unit, node, callee, &args)
        })
    }
}

fn can_inline(unit: &Unit, callee: FunctionId) -> bool {
    let data = unit.functions.get(callee);
    data.is_inline
        && data.kind == FunctionKind::Free
        && data.decl().is_some_and(|d| d.body.is_some())
        && data
            .params
            .iter()
            .all(|p| !p.is_ref() && unit.fe.types.scalar(*p).is_some())
        && !unit.inline_stack.contains(&callee)
        && unit.inline_stack.len() < MAX_INLINE_DEPTH
}

fn inline_call(
    unit: &mut Unit,
    node: NodeId,
    callee: FunctionId,
    args: &[NodeId],
) -> Result<bool, CompileError> {
    let data = unit.functions.get(callee);
    let Some(decl) = data.decl().cloned() else {
        return Ok(false);
    };
    let ret = data.ret;
    let loc = unit.fe.ast.loc(node);
    let name = data.id.display(&unit.fe.interner);

    let body = parse_inline(&mut unit.fe, &decl, args)?;
    if has_static(&unit.fe.ast, body) {
        debug!(%name, "not inlined: body has static storage");
        return Ok(false);
    }
    let scope = unit.open_detached_scope(callee);
    let cx = FunctionContext {
        func: Some(callee),
        owner: None,
        ret,
    };
    unit.inline_stack.push(callee);
    let result = unit.run_front_passes(body, scope, cx);
    unit.inline_stack.pop();
    result?;

    unit.fe
        .ast
        .replace(node, NodeKind::Inline(InlineBody { callee, body }));
    unit.note(format!("inlined call to `{name}`"), loc);
    Ok(true)
}

fn has_static(ast: &Ast, node: NodeId) -> bool {
    match ast.kind(node) {
        NodeKind::VariableDef(def) if def.symbol.ty.is_static() => true,
        _ => ast.children(node).into_iter().any(|c| has_static(ast, c)),
    }
}
