use super::*;
use pretty_assertions::assert_eq;

fn lit(ast: &mut Ast, v: i32) -> NodeId {
    ast.push(NodeKind::Literal(Value::Int(v)), CodeLocation::new(0))
}

#[test]
fn children_in_evaluation_order() {
    let mut ast = Ast::new();
    let a = lit(&mut ast, 1);
    let b = lit(&mut ast, 2);
    let add = ast.push(
        NodeKind::BinaryOp {
            op: BinaryOp::Add,
            lhs: a,
            rhs: b,
        },
        CodeLocation::new(0),
    );
    let ret = ast.push(
        NodeKind::Return {
            value: Some(add),
            target: ReturnTarget::Function,
        },
        CodeLocation::new(0),
    );
    assert_eq!(ast.children(add).to_vec(), vec![a, b]);
    assert_eq!(ast.children(ret).to_vec(), vec![add]);
    assert!(ast.children(a).is_empty());
}

#[test]
fn replace_keeps_id_and_location() {
    let mut ast = Ast::new();
    let a = ast.push(NodeKind::Literal(Value::Int(1)), CodeLocation::new(12));
    ast.replace(a, NodeKind::Noop);
    assert!(matches!(ast.kind(a), NodeKind::Noop));
    assert_eq!(ast.loc(a), CodeLocation::new(12));
}

#[test]
fn new_nodes_are_untyped() {
    let mut ast = Ast::new();
    let a = lit(&mut ast, 1);
    assert!(ast.ty(a).is_unresolved());
    ast.set_ty(a, TypeInfo::int());
    assert_eq!(ast.ty(a), TypeInfo::int());
}

#[test]
fn purity() {
    let mut ast = Ast::new();
    let a = lit(&mut ast, 1);
    let b = lit(&mut ast, 0);
    let div = ast.push(
        NodeKind::BinaryOp {
            op: BinaryOp::Div,
            lhs: a,
            rhs: b,
        },
        CodeLocation::new(0),
    );
    let add = ast.push(
        NodeKind::BinaryOp {
            op: BinaryOp::Add,
            lhs: a,
            rhs: b,
        },
        CodeLocation::new(0),
    );
    assert!(ast.is_pure(add));
    assert!(!ast.is_pure(div));
}
