use pretty_assertions::assert_eq;
use tine_diagnostic::ErrorCode;
use tine_ir::{CodeLocation, NativeType, NodeKind, TypeInfo, Value};
use tine_types::{DYN_DATA_OFFSET, DYN_LENGTH_OFFSET};

use super::*;
use crate::test_support::{analysed_plain, analysis_error, body, global, returned};
use crate::Storage;

#[test]
fn arithmetic_takes_the_higher_rank() {
    use NativeType::{Bool, Double, Float, Integer};
    assert_eq!(arithmetic_type(Integer, Float), Float);
    assert_eq!(arithmetic_type(Double, Float), Double);
    assert_eq!(arithmetic_type(Bool, Bool), Integer);
    assert_eq!(arithmetic_type(Bool, Float), Float);
    assert_eq!(common_type(Bool, Bool), Bool);
    assert_eq!(common_type(Bool, Integer), Integer);
}

#[test]
fn only_references_to_storage_are_lvalues() {
    let mut ast = Ast::new();
    let literal = ast.push(NodeKind::Literal(Value::Int(1)), CodeLocation::SYNTHETIC);
    let this = ast.push(NodeKind::This, CodeLocation::SYNTHETIC);
    assert!(!is_lvalue(&ast, literal));
    assert!(!is_lvalue(&ast, this));
    assert!(is_integer_like(NativeType::Bool));
    assert!(!is_integer_like(NativeType::Double));
}

#[test]
fn locals_are_visible_only_after_their_declaration() {
    let err = analysis_error("int f() { int a = b; int b = 1; return a; }");
    assert_eq!(err.code, ErrorCode::E2001);
}

#[test]
fn static_locals_live_with_the_globals() {
    let unit = analysed_plain("int g;\nint count() { static int n = 3; n = n + 1; return n; }");
    assert_eq!(
        unit.symbols.get(global(&unit, "g")).storage,
        Storage::Global { offset: 0 }
    );
    let NodeKind::VariableDef(def) = unit.fe.ast.kind(body(&unit, "count")[0]) else {
        panic!("expected the static definition");
    };
    let storage = unit.symbols.get(def.resolved.expect("bound")).storage;
    assert_eq!(storage, Storage::Global { offset: 4 });
    assert_eq!(unit.globals.statics(), &[(4, Value::Int(3))]);
}

#[test]
fn static_initializers_must_be_constant() {
    let err = analysis_error("int f(int a) { static int n = a; return n; }");
    assert_eq!(err.code, ErrorCode::E2012);
}

#[test]
fn auto_needs_an_initializer() {
    let err = analysis_error("void f() { auto x; }");
    assert_eq!(err.code, ErrorCode::E2011);
}

#[test]
fn auto_takes_the_initializer_type() {
    let unit = analysed_plain("double f(double d) { auto x = d * 2; return x; }");
    let NodeKind::VariableDef(def) = unit.fe.ast.kind(body(&unit, "f")[0]) else {
        panic!("expected a definition");
    };
    assert_eq!(
        unit.symbols.get(def.resolved.expect("bound")).ty(),
        TypeInfo::double()
    );
}

#[test]
fn constructors_forbid_initializer_lists() {
    let err = analysis_error("struct C { int a; C() { a = 1; } };\nC c = {1};");
    assert_eq!(err.code, ErrorCode::E2012);
}

#[test]
fn nested_lists_fill_nested_members() {
    let unit = analysed_plain(
        "struct V { float x; float y; };\nstruct L { V from; V to; };\nL l = {{1.0, 2.0}, {3.0}};",
    );
    let init = crate::test_support::complex_init(&unit);
    let offsets: Vec<_> = init.fields.iter().map(|f| f.offset).collect();
    assert_eq!(offsets, vec![0, 4, 8]);
    assert!(init.fields.iter().all(|f| f.ty == NativeType::Float));
}

#[test]
fn duplicate_members_are_layout_errors() {
    let err = analysis_error("struct S { int a; float a; };");
    assert_eq!(err.kind, tine_diagnostic::ErrorKind::Layout);
}

#[test]
fn bitwise_operators_need_integers() {
    let err = analysis_error("int f(float a) { return a & 1; }");
    assert_eq!(err.code, ErrorCode::E2003);
}

#[test]
fn void_functions_cannot_return_values() {
    let err = analysis_error("void f() { return 1; }");
    assert_eq!(err.code, ErrorCode::E2003);
}

#[test]
fn const_arguments_do_not_bind_to_mutable_references() {
    let err = analysis_error(
        "void bump(int& v) { v = v + 1; }\nconst int k = 1;\nint x;\nvoid f() { bump(x); bump(k); }",
    );
    assert_eq!(err.code, ErrorCode::E2004);
}

#[test]
fn dyn_assignment_from_a_span_becomes_a_view() {
    let unit = analysed_plain(
        "span<float, 8> buffer;\nvoid f() { dyn<float> view = buffer; view = buffer; }",
    );
    let stmts = body(&unit, "f");
    let NodeKind::VariableDef(def) = unit.fe.ast.kind(stmts[0]) else {
        panic!("expected the declaration first");
    };
    // The declaration keeps its initializer; the assignment itself is
    // rewritten into the view.
    for init in [def.init.expect("initialized"), stmts[1]] {
        let NodeKind::ComplexInit(view) = unit.fe.ast.kind(init) else {
            panic!("expected a dyn view, got {:?}", unit.fe.ast.kind(init));
        };
        let parts: Vec<_> = view.fields.iter().map(|f| (f.offset, f.ty)).collect();
        assert_eq!(
            parts,
            vec![
                (DYN_LENGTH_OFFSET, NativeType::Integer),
                (DYN_DATA_OFFSET, NativeType::Pointer),
            ]
        );
        assert_eq!(unit.fe.ast.literal(view.fields[0].value), Some(Value::Int(8)));
    }
}

#[test]
fn ternary_branches_meet_in_a_common_type() {
    let unit = analysed_plain("double f(bool c, int a, double b) { return c ? a : b; }");
    let value = returned(&unit, "f", 0);
    assert_eq!(unit.fe.ast.ty(value), TypeInfo::double());
    let NodeKind::Ternary { then_expr, .. } = unit.fe.ast.kind(value) else {
        panic!("expected a ternary");
    };
    assert!(matches!(
        unit.fe.ast.kind(*then_expr),
        NodeKind::Cast { implicit: true, .. }
    ));
}
