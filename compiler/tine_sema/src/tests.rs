use pretty_assertions::assert_eq;
use tine_diagnostic::{ErrorCode, Severity};
use tine_ir::{CallTarget, MemberRef, NativeType, NodeKind, TemplateArg, TypeInfo, Value};

use crate::test_support::{
    analysed, analysed_plain, analysis_error, body, complex_init, function, global, plain_unit,
    returned,
};
use crate::{AbortFlag, Storage};

#[test]
fn globals_get_aligned_slots_in_declaration_order() {
    let unit = analysed("int a;\ndouble b;\nbool c;");
    let offsets: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| unit.symbols.get(global(&unit, name)).storage)
        .collect();
    assert_eq!(
        offsets,
        vec![
            Storage::Global { offset: 0 },
            Storage::Global { offset: 8 },
            Storage::Global { offset: 16 },
        ]
    );
    assert_eq!(unit.globals.size(), 20);
    assert_eq!(unit.globals.alignment(), 8);
}

#[test]
fn const_scalars_fold_into_their_users() {
    let unit = analysed("const int N = 4;\nint f() { return N * 2; }");
    assert_eq!(
        unit.symbols.get(global(&unit, "N")).storage,
        Storage::Constant(Value::Int(4))
    );
    let value = returned(&unit, "f", 0);
    assert_eq!(unit.fe.ast.literal(value), Some(Value::Int(8)));
}

#[test]
fn parameters_shadow_globals() {
    let unit = analysed_plain("int x;\nint f(int x) { return x; }");
    let NodeKind::VariableRef {
        resolved: Some(symbol),
        ..
    } = unit.fe.ast.kind(returned(&unit, "f", 0))
    else {
        panic!("expected a resolved variable reference");
    };
    assert_eq!(unit.symbols.get(*symbol).storage, Storage::Param { index: 0 });
}

#[test]
fn bare_member_names_go_through_this() {
    let unit = analysed_plain("struct S { int a; int b; int get() { return b; } };");
    let NodeKind::MemberAccess {
        object, resolved, ..
    } = unit.fe.ast.kind(returned(&unit, "S::get", 0))
    else {
        panic!("expected a member access");
    };
    assert!(matches!(unit.fe.ast.kind(*object), NodeKind::This));
    assert_eq!(
        *resolved,
        Some(MemberRef {
            offset: 4,
            ty: TypeInfo::int(),
        })
    );
}

#[test]
fn unknown_names_are_type_errors() {
    let err = analysis_error("int f() { return y; }");
    assert_eq!(err.code, ErrorCode::E2001);
}

#[test]
fn constants_cannot_be_assigned() {
    let err = analysis_error("const int k = 1;\nvoid f() { k = 2; }");
    assert_eq!(err.code, ErrorCode::E2004);
}

#[test]
fn only_storage_can_be_assigned() {
    let err = analysis_error("void f(int a) { 3 = a; }");
    assert_eq!(err.code, ErrorCode::E2005);
}

#[test]
fn code_after_return_is_rejected() {
    let err = analysis_error("int f() { return 1; f(); }");
    assert_eq!(err.code, ErrorCode::E4001);
}

#[test]
fn widening_inserts_an_implicit_cast() {
    let unit = analysed_plain("float f(int a) { return a; }\ndouble g() { return 1; }");
    let NodeKind::Cast {
        target, implicit, ..
    } = unit.fe.ast.kind(returned(&unit, "f", 0))
    else {
        panic!("expected a cast");
    };
    assert_eq!((*target, *implicit), (TypeInfo::float(), true));
    assert_eq!(
        unit.fe.ast.literal(returned(&unit, "g", 0)),
        Some(Value::Double(1.0))
    );
    assert!(unit.diagnostics.iter().all(|d| d.severity != Severity::Warning));
}

#[test]
fn narrowing_warns_but_compiles() {
    let unit = analysed_plain("int f(double d) { return d; }");
    let warnings: Vec<_> = unit
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .map(|d| d.code)
        .collect();
    assert_eq!(warnings, vec![Some(ErrorCode::E2101)]);
}

#[test]
fn overloads_pick_the_cheapest_conversion() {
    let unit = analysed_plain(
        "int f(int a) { return 1; }\nint f(double a) { return 2; }\nint g() { return f(1.5); }",
    );
    let NodeKind::Call(call) = unit.fe.ast.kind(returned(&unit, "g", 0)) else {
        panic!("expected a call");
    };
    let Some(CallTarget::Function(target)) = call.target else {
        panic!("call was not resolved to a free function");
    };
    assert_eq!(unit.functions.get(target).params.as_slice(), &[TypeInfo::double()]);
}

#[test]
fn ambiguous_overloads_are_rejected() {
    let err = analysis_error(
        "void f(int a, float b) { }\nvoid f(float a, int b) { }\nvoid g() { f(1, 2); }",
    );
    assert_eq!(err.code, ErrorCode::E2002);
}

#[test]
fn templates_are_instantiated_once_per_argument_set() {
    let unit = analysed_plain(
        "template <typename T> T twice(T x) { return x * 2; }\n\
         int f() { return twice(3) + twice(4); }\n\
         float g(float v) { return twice(v); }",
    );
    let name = unit.fe.interner.get("twice").expect("interned");
    let int = unit
        .functions
        .instance(name, &[TemplateArg::Type(TypeInfo::int())]);
    let float = unit
        .functions
        .instance(name, &[TemplateArg::Type(TypeInfo::float())]);
    assert!(int.is_some() && float.is_some());
    assert_ne!(int, float);
    let instances = unit
        .functions
        .ids()
        .filter(|f| unit.functions.get(*f).instance_of.is_some())
        .count();
    assert_eq!(instances, 2);
    let Some(float) = float else { unreachable!() };
    assert!(unit.functions.get(float).parsed().is_some());
}

#[test]
fn ranged_for_binds_element_references() {
    let unit = analysed_plain(
        "void f() {\n  span<float, 4> d;\n  for (auto& e : d) { e = 1.0; }\n}",
    );
    let NodeKind::RangedFor(range) = unit.fe.ast.kind(body(&unit, "f")[1]) else {
        panic!("expected a ranged for");
    };
    let iterator = range.resolved.expect("iterator symbol");
    let ty = unit.symbols.get(iterator).ty();
    assert!(ty.is_ref());
    assert_eq!(ty.native_type(), Some(NativeType::Float));
}

#[test]
fn initializer_lists_fill_defaults_then_members() {
    let unit = analysed_plain("struct P { int x; float y = 2.0; };\nP p = {1};");
    let root = unit
        .symbols
        .iter()
        .find(|(_, e)| e.symbol.id.display(&unit.fe.interner) == "p")
        .map(|(id, _)| id)
        .expect("p declared");
    assert!(matches!(
        unit.symbols.get(root).storage,
        Storage::Global { offset: 0 }
    ));
    let init = complex_init(&unit);
    let fields: Vec<_> = init.fields.iter().map(|f| (f.offset, f.ty)).collect();
    assert_eq!(fields, vec![(4, NativeType::Float), (0, NativeType::Integer)]);
    assert!(init.ctors.is_empty());
}

#[test]
fn too_many_initializers_are_rejected() {
    let err = analysis_error("span<int, 2> a = {1, 2, 3};");
    assert_eq!(err.code, ErrorCode::E2003);
}

#[test]
fn constructor_calls_resolve_by_arguments() {
    let unit = analysed_plain(
        "struct C { int a; C(int x) { a = x; } C(float x) { a = 2; } };\nC c(1.5f);",
    );
    let init = complex_init(&unit);
    assert_eq!(init.ctors.len(), 1);
    let ctor = unit.functions.get(init.ctors[0].func);
    assert_eq!(ctor.params.as_slice(), &[TypeInfo::float()]);
}

#[test]
fn private_members_are_hidden_outside_their_struct() {
    let err = analysis_error(
        "struct S { private: int secret; public: int open; };\nS s;\nint f() { return s.secret; }",
    );
    assert_eq!(err.code, ErrorCode::E2009);
}

#[test]
fn inline_functions_are_expanded_at_the_call() {
    let unit = analysed("inline int sq(int v) { return v * v; }\nint f(int a) { return sq(a); }");
    let NodeKind::Inline(inline) = unit.fe.ast.kind(returned(&unit, "f", 0)) else {
        panic!("expected an inlined call");
    };
    assert_eq!(inline.callee, function(&unit, "sq"));
    assert_eq!(unit.fe.ast.ty(returned(&unit, "f", 0)), TypeInfo::int());
}

#[test]
fn plain_functions_stay_calls() {
    let unit = analysed("int sq(int v) { return v * v; }\nint f(int a) { return sq(a); }");
    let NodeKind::Call(call) = unit.fe.ast.kind(returned(&unit, "f", 0)) else {
        panic!("expected a call");
    };
    assert_eq!(call.target, Some(CallTarget::Function(function(&unit, "sq"))));
}

#[test]
fn an_aborted_compile_stops_at_the_next_pass() {
    let flag = AbortFlag::new();
    flag.abort();
    let mut unit = plain_unit("int f() { return 1; }").with_abort(flag);
    let err = unit.analyse().unwrap_err();
    assert_eq!(err, tine_diagnostic::CompileError::aborted());
}

#[test]
fn a_prototype_and_its_definition_are_one_function() {
    let unit = analysed_plain(
        "int g(int);\nint f() { return g(1); }\nint g(int a) { return a + 1; }",
    );
    let g = function(&unit, "g");
    let id = tine_ir::NamespacedIdentifier::new(unit.fe.interner.get("g").unwrap());
    assert_eq!(unit.functions.class(&id), &[g]);
    assert!(unit.functions.get(g).parsed().is_some());
    let NodeKind::Call(call) = unit.fe.ast.kind(returned(&unit, "f", 0)) else {
        panic!("expected a call");
    };
    assert_eq!(call.target, Some(CallTarget::Function(g)));
}

#[test]
fn a_prototype_alone_stays_undefined() {
    let unit = analysed_plain("int g(int a);\nint f() { return g(1); }");
    let g = function(&unit, "g");
    assert!(unit.functions.get(g).parsed().is_none());
    assert!(unit.functions.unparsed().is_empty());
}

#[test]
fn conflicting_redeclarations_are_rejected() {
    let err = analysis_error("int g(int a) { return 1; }\nint g(int b) { return 2; }");
    assert_eq!(err.code, ErrorCode::E2006);
    let err = analysis_error("int g(int);\ndouble g(int a) { return 1.0; }");
    assert_eq!(err.code, ErrorCode::E2006);
}

#[test]
fn names_inside_a_namespace_resolve_there_first() {
    let unit = analysed_plain(
        "int k = 1;\n\
         namespace ns { int k = 4; int get() { return k; } int call() { return get(); } }\n\
         int f() { return ns::k + k; }",
    );
    let (outer, inner) = (global(&unit, "k"), global(&unit, "ns::k"));
    assert_ne!(outer, inner);

    let NodeKind::VariableRef { resolved, .. } = unit.fe.ast.kind(returned(&unit, "ns::get", 0))
    else {
        panic!("expected a variable reference");
    };
    assert_eq!(*resolved, Some(inner));

    let NodeKind::Call(call) = unit.fe.ast.kind(returned(&unit, "ns::call", 0)) else {
        panic!("expected a call");
    };
    assert_eq!(call.target, Some(CallTarget::Function(function(&unit, "ns::get"))));

    let NodeKind::BinaryOp { lhs, rhs, .. } = unit.fe.ast.kind(returned(&unit, "f", 0)) else {
        panic!("expected a sum");
    };
    let resolved = |node| match unit.fe.ast.kind(node) {
        NodeKind::VariableRef { resolved, .. } => *resolved,
        other => panic!("expected a variable reference, got {other:?}"),
    };
    assert_eq!(resolved(*lhs), Some(inner));
    assert_eq!(resolved(*rhs), Some(outer));
}

#[test]
fn namespace_members_stay_hidden_outside() {
    let err = analysis_error("namespace ns { int k; }\nint f() { return k; }");
    assert_eq!(err.code, ErrorCode::E2001);
    let err = analysis_error("namespace ns { int k; }\nnamespace ns { int k; }");
    assert_eq!(err.code, ErrorCode::E2006);
}

#[test]
fn class_level_initializers_see_their_namespace() {
    let unit = analysed("namespace ns { const int k = 4; const int j = k + 1; double d = k; }");
    assert_eq!(
        unit.symbols.get(global(&unit, "ns::j")).storage,
        Storage::Constant(Value::Int(5))
    );
    assert!(matches!(
        unit.symbols.get(global(&unit, "ns::d")).storage,
        Storage::Global { .. }
    ));
}

#[test]
fn enumerators_are_folded_constants() {
    let unit = analysed(
        "enum class Shape { Sine, Saw = 3 };\n\
         enum Mode { Off, On };\n\
         int f() { return Shape::Saw + On + Mode::On; }",
    );
    assert_eq!(
        unit.symbols.get(global(&unit, "Shape::Saw")).storage,
        Storage::Constant(Value::Int(3))
    );
    let value = returned(&unit, "f", 0);
    assert_eq!(unit.fe.ast.literal(value), Some(Value::Int(5)));

    let err = analysis_error("enum class Shape { Sine };\nint f() { return Sine; }");
    assert_eq!(err.code, ErrorCode::E2001);
}
