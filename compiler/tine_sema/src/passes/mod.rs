//! The front passes every parsed tree goes through, in [`Pass`](crate::Pass)
//! order. Optimizations live in [`crate::optimize`].

pub(crate) mod allocation;
pub(crate) mod complex_types;
pub(crate) mod initialisation;
pub(crate) mod resolve;
pub(crate) mod typecheck;

use tine_ir::{Ast, NativeType, NodeId, NodeKind};

/// Result type of arithmetic between two scalars: the higher promotion
/// rank, with `bool` computed as `int`.
pub(crate) fn arithmetic_type(a: NativeType, b: NativeType) -> NativeType {
    let widen = |n: NativeType| {
        if n == NativeType::Bool {
            NativeType::Integer
        } else {
            n
        }
    };
    let (a, b) = (widen(a), widen(b));
    if a.promotion_rank() >= b.promotion_rank() {
        a
    } else {
        b
    }
}

/// Common type of two values meeting in one place (ternary branches).
pub(crate) fn common_type(a: NativeType, b: NativeType) -> NativeType {
    if a == b {
        a
    } else {
        arithmetic_type(a, b)
    }
}

pub(crate) fn is_integer_like(n: NativeType) -> bool {
    matches!(n, NativeType::Integer | NativeType::Bool)
}

/// Expressions that denote storage.
pub(crate) fn is_lvalue(ast: &Ast, node: NodeId) -> bool {
    matches!(
        ast.kind(node),
        NodeKind::VariableRef { .. } | NodeKind::MemberAccess { .. } | NodeKind::Subscript { .. }
    )
}

#[cfg(test)]
mod tests;
