//! Constant expression evaluation over parsed nodes.
//!
//! Used for template arguments and `const` globals at parse time, and by
//! the constant folding passes later on. Arithmetic goes through
//! [`Value::binary`] / [`Value::unary`], the same definitions the execution
//! engine uses.

use tine_ir::{Ast, NamespacedIdentifier, NodeId, NodeKind, Value};

/// Bring two scalars to their common type (the higher promotion rank).
pub fn promote(lhs: Value, rhs: Value) -> Option<(Value, Value)> {
    let (l, r) = (lhs.native_type(), rhs.native_type());
    if l == r {
        return Some((lhs, rhs));
    }
    if !l.is_arithmetic() || !r.is_arithmetic() {
        return None;
    }
    let common = if l.promotion_rank() >= r.promotion_rank() {
        l
    } else {
        r
    };
    Some((lhs.cast(common)?, rhs.cast(common)?))
}

/// Evaluate `node` if it is a constant expression.
///
/// `lookup` supplies the value of named constants. Anything with a side
/// effect, a call or a failing operation (division by zero) is not
/// constant and yields `None`.
pub fn evaluate_constant(
    ast: &Ast,
    node: NodeId,
    lookup: &dyn Fn(&NamespacedIdentifier) -> Option<Value>,
) -> Option<Value> {
    match ast.kind(node) {
        NodeKind::Literal(value) => Some(*value),
        NodeKind::VariableRef { id, .. } => lookup(id),
        NodeKind::UnaryOp { op, operand } => {
            if op.is_increment() {
                return None;
            }
            Value::unary(*op, evaluate_constant(ast, *operand, lookup)?).ok()
        }
        NodeKind::BinaryOp { op, lhs, rhs } => {
            let lhs = evaluate_constant(ast, *lhs, lookup)?;
            let rhs = evaluate_constant(ast, *rhs, lookup)?;
            let (lhs, rhs) = promote(lhs, rhs)?;
            Value::binary(*op, lhs, rhs).ok()
        }
        NodeKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            if evaluate_constant(ast, *cond, lookup)?.is_truthy() {
                evaluate_constant(ast, *then_expr, lookup)
            } else {
                evaluate_constant(ast, *else_expr, lookup)
            }
        }
        NodeKind::Cast {
            operand, target, ..
        } => evaluate_constant(ast, *operand, lookup)?.cast(target.native_type()?),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tine_ir::{BinaryOp, CodeLocation, UnaryOp};

    fn lit(ast: &mut Ast, v: Value) -> NodeId {
        ast.push(NodeKind::Literal(v), CodeLocation::SYNTHETIC)
    }

    #[test]
    fn mixed_operands_are_promoted() {
        let mut ast = Ast::new();
        let lhs = lit(&mut ast, Value::Int(3));
        let rhs = lit(&mut ast, Value::Double(0.5));
        let sum = ast.push(
            NodeKind::BinaryOp {
                op: BinaryOp::Add,
                lhs,
                rhs,
            },
            CodeLocation::SYNTHETIC,
        );
        assert_eq!(evaluate_constant(&ast, sum, &|_| None), Some(Value::Double(3.5)));
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        let mut ast = Ast::new();
        let lhs = lit(&mut ast, Value::Int(1));
        let rhs = lit(&mut ast, Value::Int(0));
        let div = ast.push(
            NodeKind::BinaryOp {
                op: BinaryOp::Div,
                lhs,
                rhs,
            },
            CodeLocation::SYNTHETIC,
        );
        assert_eq!(evaluate_constant(&ast, div, &|_| None), None);
    }

    #[test]
    fn increments_are_not_constant() {
        let mut ast = Ast::new();
        let operand = lit(&mut ast, Value::Int(1));
        let inc = ast.push(
            NodeKind::UnaryOp {
                op: UnaryOp::PreInc,
                operand,
            },
            CodeLocation::SYNTHETIC,
        );
        assert_eq!(evaluate_constant(&ast, inc, &|_| None), None);
    }
}
