use tine_diagnostic::CompileError;
use tine_ir::{CallTarget, NodeId, NodeKind, TypeInfo, Value};
use tine_parse::promote;

use super::{rewrite_post_order, Optimization, Phase};
use crate::symbols::Storage;
use crate::{FunctionContext, Unit};

/// Evaluates operators, casts, named constants and pure host calls whose
/// operands are all literals.
///
/// Evaluation goes through the same [`Value`] arithmetic the engine runs,
/// and a division by zero is left in place to fail at runtime.
pub struct ConstantFolding;

impl Optimization for ConstantFolding {
    fn id(&self) -> &'static str {
        "constant_folding"
    }

    fn run(
        &self,
        unit: &mut Unit,
        root: NodeId,
        _cx: FunctionContext,
        phase: Phase,
    ) -> Result<usize, CompileError> {
        rewrite_post_order(unit, root, &mut |unit, node| {
            let Some(value) = evaluate(unit, node, phase) else {
                return Ok(false);
            };
            // After the type check the node's type is authoritative.
            let value = match (phase, unit.fe.types.scalar(unit.fe.ast.ty(node))) {
                (Phase::PostSymbol, Some(ty)) => match value.cast(ty) {
                    Some(value) => value,
                    None => return Ok(false),
                },
                _ => value,
            };
            let loc = unit.fe.ast.loc(node);
            unit.fe.ast.replace(node, NodeKind::Literal(value));
            unit.fe
                .ast
                .set_ty(node, TypeInfo::native(value.native_type()));
            unit.note(format!("folded constant expression to `{value}`"), loc);
            Ok(true)
        })
    }
}

fn evaluate(unit: &Unit, node: NodeId, phase: Phase) -> Option<Value> {
    let ast = &unit.fe.ast;
    match ast.kind(node) {
        NodeKind::BinaryOp { op, lhs, rhs } => {
            let (lhs, rhs) = promote(ast.literal(*lhs)?, ast.literal(*rhs)?)?;
            Value::binary(*op, lhs, rhs).ok()
        }
        NodeKind::UnaryOp { op, operand } if !op.is_increment() => {
            Value::unary(*op, ast.literal(*operand)?).ok()
        }
        NodeKind::Cast {
            operand, target, ..
        } => ast.literal(*operand)?.cast(unit.fe.types.scalar(*target)?),
        NodeKind::VariableRef {
            resolved: Some(symbol),
            ..
        } if phase == Phase::PostSymbol => match unit.symbols.get(*symbol).storage {
            Storage::Constant(value) => Some(value),
            _ => None,
        },
        NodeKind::Call(call) if phase == Phase::PostSymbol => {
            let Some(CallTarget::Function(func)) = call.target else {
                return None;
            };
            let inliner = unit.functions.get(func).inliner?;
            let args: Option<Vec<Value>> = call.args.iter().map(|a| ast.literal(*a)).collect();
            inliner(&args?)
        }
        _ => None,
    }
}
