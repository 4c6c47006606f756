//! Tree optimizations.
//!
//! Each optimization runs twice per tree: once before symbols are bound
//! ([`Phase::PreSymbol`]), where only literal structure is known, and once
//! after the type check ([`Phase::PostSymbol`]). Which optimizations run
//! is chosen per compile by id; an unknown id is reported as a warning and
//! skipped.

mod binary_op;
mod dead_code;
mod folding;
mod inlining;

use std::sync::Arc;

use tine_diagnostic::{CompileError, Diagnostic, DiagnosticQueue, ErrorCode};
use tine_ir::NodeId;
use tine_stack::ensure_sufficient_stack;

pub use binary_op::BinaryOpOptimization;
pub use dead_code::DeadCodeElimination;
pub use folding::ConstantFolding;
pub use inlining::FunctionInlining;

use crate::{FunctionContext, Unit};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Phase {
    PreSymbol,
    PostSymbol,
}

pub trait Optimization: Send + Sync {
    /// Id used to enable the optimization, e.g. `constant_folding`.
    fn id(&self) -> &'static str;

    /// Rewrite the tree under `root`; returns the number of rewrites.
    fn run(
        &self,
        unit: &mut Unit,
        root: NodeId,
        cx: FunctionContext,
        phase: Phase,
    ) -> Result<usize, CompileError>;
}

/// Every optimization the compiler ships, in the order they run.
pub fn builtin_optimizations() -> Vec<Arc<dyn Optimization>> {
    vec![
        Arc::new(ConstantFolding),
        Arc::new(BinaryOpOptimization),
        Arc::new(DeadCodeElimination),
        Arc::new(FunctionInlining),
    ]
}

/// Ids of [`builtin_optimizations`].
pub fn builtin_ids() -> Vec<&'static str> {
    builtin_optimizations().iter().map(|o| o.id()).collect()
}

/// Select optimizations by id, keeping builtin order. Unknown ids produce
/// an `E2102` warning.
pub fn select_optimizations(
    ids: &[String],
    diagnostics: &mut DiagnosticQueue,
) -> Vec<Arc<dyn Optimization>> {
    let available = builtin_optimizations();
    for id in ids {
        if !available.iter().any(|o| o.id() == id) {
            diagnostics.push(
                Diagnostic::warning(ErrorCode::E2102)
                    .with_message(format!("unknown optimization `{id}` ignored")),
            );
        }
    }
    available
        .into_iter()
        .filter(|o| ids.iter().any(|id| id == o.id()))
        .collect()
}

/// Offer every node under `node` to `rewrite`, children first. Returns
/// how many calls reported a rewrite.
pub(crate) fn rewrite_post_order(
    unit: &mut Unit,
    node: NodeId,
    rewrite: &mut dyn FnMut(&mut Unit, NodeId) -> Result<bool, CompileError>,
) -> Result<usize, CompileError> {
    ensure_sufficient_stack(|| {
        let mut count = 0;
        for child in unit.fe.ast.children(node) {
            count += rewrite_post_order(unit, child, rewrite)?;
        }
        if rewrite(unit, node)? {
            count += 1;
        }
        Ok(count)
    })
}

#[cfg(test)]
mod tests;
