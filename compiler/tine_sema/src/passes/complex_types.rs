//! ComplexTypeParsing: give struct declarations their members and layout.
//!
//! Struct definitions only appear at class level, and always before their
//! first use, so finalising them in statement order is bottom-up.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{ComplexTypeDef, MemberDecl, NamespacedIdentifier, NodeId, NodeKind, Value};
use tine_parse::evaluate_constant;
use tine_types::{Member, StructType};
use tracing::debug;

use crate::Unit;

pub(crate) fn run(unit: &mut Unit, root: NodeId) -> Result<(), CompileError> {
    let NodeKind::Block(block) = unit.fe.ast.kind(root) else {
        return Ok(());
    };
    let defs: Vec<NodeId> = block
        .stmts
        .iter()
        .copied()
        .filter(|s| matches!(unit.fe.ast.kind(*s), NodeKind::ComplexTypeDef(_)))
        .collect();
    for node in defs {
        define(unit, node)?;
    }
    Ok(())
}

fn define(unit: &mut Unit, node: NodeId) -> Result<(), CompileError> {
    let NodeKind::ComplexTypeDef(def) = unit.fe.ast.kind(node).clone() else {
        return Ok(());
    };
    let loc = unit.fe.ast.loc(node);
    let ComplexTypeDef {
        ty, members, bases, ..
    } = def;
    if unit
        .fe
        .types
        .as_struct(ty)
        .is_some_and(StructType::is_finalised)
    {
        return Ok(());
    }

    let namespace = unit
        .fe
        .types
        .as_struct(ty)
        .and_then(|s| s.id.parent())
        .unwrap_or_default();
    for base in bases {
        unit.fe.types.add_base(ty, base).map_err(|e| e.or_at(loc))?;
    }
    for decl in &members {
        let member = member(unit, decl, &namespace)?;
        unit.fe
            .types
            .add_member(ty, member)
            .map_err(|e| e.or_at(decl.loc))?;
    }
    let layout = unit.fe.types.finalise(ty).map_err(|e| e.or_at(loc))?;
    debug!(
        name = %unit.fe.types.display(tine_ir::TypeInfo::complex(ty), &unit.fe.interner),
        size = layout.size,
        "struct finalised"
    );
    Ok(())
}

fn member(
    unit: &Unit,
    decl: &MemberDecl,
    namespace: &NamespacedIdentifier,
) -> Result<Member, CompileError> {
    let name = unit.fe.interner.lookup(decl.name);
    if decl.ty.is_unresolved() {
        return Err(CompileError::type_error(
            ErrorCode::E2011,
            format!("cannot deduce the type of member `{name}`"),
            decl.loc,
        ));
    }
    if decl.ty.is_ref() {
        return Err(CompileError::type_error(
            ErrorCode::E2012,
            format!("reference member `{name}` is not supported"),
            decl.loc,
        ));
    }
    let mut member = Member::new(decl.name, decl.ty.base());
    member.visibility = decl.visibility;
    member.doc.clone_from(&decl.doc);
    if let Some(default) = decl.default {
        member.default = Some(default_value(unit, decl, default, namespace)?);
    }
    Ok(member)
}

/// Member defaults are constants stored in the member's own type.
fn default_value(
    unit: &Unit,
    decl: &MemberDecl,
    node: NodeId,
    namespace: &NamespacedIdentifier,
) -> Result<Value, CompileError> {
    let name = unit.fe.interner.lookup(decl.name);
    let Some(scalar) = unit.fe.types.scalar(decl.ty) else {
        return Err(CompileError::type_error(
            ErrorCode::E2012,
            format!("default value for complex member `{name}` is not supported"),
            decl.loc,
        ));
    };
    let value =
        evaluate_constant(&unit.fe.ast, node, &|id| unit.constant(namespace, id)).ok_or_else(|| {
            CompileError::type_error(
                ErrorCode::E2012,
                format!("default value of `{name}` must be a constant expression"),
                unit.fe.ast.loc(node),
            )
        })?;
    value.cast(scalar).ok_or_else(|| {
        CompileError::type_error(
            ErrorCode::E2003,
            format!("default value of `{name}` does not convert to {}", scalar.name()),
            unit.fe.ast.loc(node),
        )
    })
}
