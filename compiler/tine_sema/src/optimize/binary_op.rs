use tine_diagnostic::CompileError;
use tine_ir::{BinaryOp, NativeType, NodeId, NodeKind, TypeInfo, Value};

use super::{rewrite_post_order, Optimization, Phase};
use crate::{FunctionContext, Unit};

/// Algebraic identities and short-circuit simplification.
///
/// Identities (`x + 0`, `x * 1`, `x * 0`, ...) are only applied to `int`
/// expressions after the type check: for floats they would change the sign
/// of zero or hide a NaN. `&&` and `||` with a constant operand are reduced
/// in both phases; a dropped operand must be free of side effects.
pub struct BinaryOpOptimization;

impl Optimization for BinaryOpOptimization {
    fn id(&self) -> &'static str {
        "binary_op"
    }

    fn run(
        &self,
        unit: &mut Unit,
        root: NodeId,
        _cx: FunctionContext,
        phase: Phase,
    ) -> Result<usize, CompileError> {
        rewrite_post_order(unit, root, &mut |unit, node| {
            let NodeKind::BinaryOp { op, lhs, rhs } = *unit.fe.ast.kind(node) else {
                return Ok(false);
            };
            let rewrite = if op.is_logical() {
                logical(unit, op, lhs, rhs)
            } else if phase == Phase::PostSymbol && is_int(unit, node) {
                identity(unit, op, lhs, rhs)
            } else {
                None
            };
            let Some(rewrite) = rewrite else {
                return Ok(false);
            };
            let loc = unit.fe.ast.loc(node);
            match rewrite {
                Rewrite::Operand(operand) => unit.fe.ast.replace_with(node, operand),
                Rewrite::Truth(operand) => {
                    if unit.fe.ast.ty(operand).native_type() == Some(NativeType::Bool) {
                        unit.fe.ast.replace_with(node, operand);
                    } else {
                        unit.fe.ast.replace(
                            node,
                            NodeKind::Cast {
                                operand,
                                target: TypeInfo::bool(),
                                implicit: true,
                            },
                        );
                        unit.fe.ast.set_ty(node, TypeInfo::bool());
                    }
                }
                Rewrite::Constant(value) => {
                    unit.fe.ast.replace(node, NodeKind::Literal(value));
                    unit.fe
                        .ast
                        .set_ty(node, TypeInfo::native(value.native_type()));
                }
            }
            unit.note(format!("simplified `{op}` expression"), loc);
            Ok(true)
        })
    }
}

enum Rewrite {
    /// Replace the expression with one operand.
    Operand(NodeId),
    /// Replace the expression with an operand's truth value.
    Truth(NodeId),
    Constant(Value),
}

fn is_int(unit: &Unit, node: NodeId) -> bool {
    unit.fe.ast.ty(node).native_type() == Some(NativeType::Integer)
}

fn int_literal(unit: &Unit, node: NodeId) -> Option<i32> {
    match unit.fe.ast.literal(node)? {
        Value::Int(v) => Some(v),
        _ => None,
    }
}

fn identity(unit: &Unit, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Option<Rewrite> {
    let (l, r) = (int_literal(unit, lhs), int_literal(unit, rhs));
    let pure = |n: NodeId| unit.fe.ast.is_pure(n);
    match (op, l, r) {
        (BinaryOp::Add | BinaryOp::Sub, _, Some(0))
        | (BinaryOp::Mul | BinaryOp::Div, _, Some(1)) => Some(Rewrite::Operand(lhs)),
        (BinaryOp::Add, Some(0), _) | (BinaryOp::Mul, Some(1), _) => Some(Rewrite::Operand(rhs)),
        (BinaryOp::Mul, _, Some(0)) if pure(lhs) => Some(Rewrite::Constant(Value::Int(0))),
        (BinaryOp::Mul, Some(0), _) if pure(rhs) => Some(Rewrite::Constant(Value::Int(0))),
        _ => None,
    }
}

fn logical(unit: &Unit, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Option<Rewrite> {
    let ast = &unit.fe.ast;
    let truth = |n: NodeId| ast.literal(n).map(Value::is_truthy);
    let is_and = op == BinaryOp::And;
    // The left operand always runs first; a constant there decides alone
    // or hands over to the right operand.
    if let Some(l) = truth(lhs) {
        return Some(if l == is_and {
            Rewrite::Truth(rhs)
        } else {
            Rewrite::Constant(Value::Bool(l))
        });
    }
    let r = truth(rhs)?;
    if r == is_and {
        Some(Rewrite::Truth(lhs))
    } else if ast.is_pure(lhs) {
        Some(Rewrite::Constant(Value::Bool(r)))
    } else {
        None
    }
}
