use pretty_assertions::assert_eq;
use tine_diagnostic::ErrorCode;
use tine_ir::{
    BinaryOp, FunctionDecl, NodeId, NodeKind, ReturnTarget, TemplateArg, TypeInfo, Value,
};
use tine_lexer::SourceMap;

use super::*;

fn frontend(src: &str) -> Frontend {
    Frontend::new(src, SourceMap::identity(src.len() as u32))
}

fn items(fe: &mut Frontend) -> Vec<NodeId> {
    let unit = parse_unit(fe).unwrap();
    match fe.ast.kind(unit) {
        NodeKind::Block(b) => b.stmts.clone(),
        other => panic!("unit is not a block: {other:?}"),
    }
}

fn function(fe: &Frontend, node: NodeId) -> FunctionDecl {
    match fe.ast.kind(node) {
        NodeKind::FunctionDef(def) => def.decl.clone(),
        other => panic!("expected a function, got {other:?}"),
    }
}

fn stmts(fe: &Frontend, block: NodeId) -> Vec<NodeId> {
    match fe.ast.kind(block) {
        NodeKind::Block(b) => b.stmts.clone(),
        other => panic!("expected a block, got {other:?}"),
    }
}

/// Parse `src` and return the body of its only (last) function.
fn body_of(src: &str) -> (Frontend, NodeId) {
    let mut fe = frontend(src);
    let unit = items(&mut fe);
    let decl = function(&fe, *unit.last().unwrap());
    let body = parse_body(&mut fe, &decl).unwrap();
    (fe, body)
}

#[test]
fn function_signature_and_deferred_body() {
    let mut fe = frontend("int test(int input) { return input * 2; }");
    let unit = items(&mut fe);
    assert_eq!(unit.len(), 1);

    let decl = function(&fe, unit[0]);
    assert_eq!(fe.interner.lookup(decl.id.id()), "test");
    assert_eq!(decl.ret, TypeInfo::int());
    assert_eq!(decl.params.len(), 1);
    assert_eq!(fe.interner.lookup(decl.params[0].name), "input");
    assert_eq!(fe.source()[decl.body.unwrap().start as usize..decl.body.unwrap().end as usize].trim(), "return input * 2;");

    let body = parse_body(&mut fe, &decl).unwrap();
    let body = stmts(&fe, body);
    assert_eq!(body.len(), 1);
    let NodeKind::Return { value: Some(value), target } = fe.ast.kind(body[0]) else {
        panic!("expected return");
    };
    assert_eq!(*target, ReturnTarget::Function);
    assert!(matches!(
        fe.ast.kind(*value),
        NodeKind::BinaryOp { op: BinaryOp::Mul, .. }
    ));
}

#[test]
fn struct_with_default_and_method() {
    let mut fe = frontend(
        "struct X { int v = 5; int get() { return v; } };\nX x;\nint test(int i) { return x.get() + i; }",
    );
    let unit = items(&mut fe);
    assert_eq!(unit.len(), 3);

    let NodeKind::ComplexTypeDef(def) = fe.ast.kind(unit[0]) else {
        panic!("expected struct");
    };
    assert_eq!(def.members.len(), 1);
    assert_eq!(fe.interner.lookup(def.members[0].name), "v");
    assert!(def.members[0].default.is_some());
    assert_eq!(def.methods.len(), 1);

    let get = function(&fe, def.methods[0]);
    assert_eq!(get.kind, tine_ir::FunctionKind::Method);
    assert_eq!(get.owner, Some(def.ty));

    let NodeKind::VariableDef(x) = fe.ast.kind(unit[1]) else {
        panic!("expected variable");
    };
    assert_eq!(x.symbol.ty, TypeInfo::complex(def.ty));
}

#[test]
fn constructor_and_destructor_are_recognised() {
    let mut fe = frontend(
        "struct C { int a; C(int x) { a = x; } ~C() { } C make() { return C(1); } };",
    );
    let unit = items(&mut fe);
    let NodeKind::ComplexTypeDef(def) = fe.ast.kind(unit[0]) else {
        panic!("expected struct");
    };
    let kinds: Vec<_> = def.methods.iter().map(|m| function(&fe, *m).kind).collect();
    assert_eq!(
        kinds,
        vec![
            tine_ir::FunctionKind::Constructor,
            tine_ir::FunctionKind::Destructor,
            tine_ir::FunctionKind::Method,
        ]
    );
}

#[test]
fn declaration_versus_expression_statement() {
    let (fe, body) = body_of("int f() { int a = 1; a = a + 2; a; return a; }");
    let body = stmts(&fe, body);
    assert_eq!(body.len(), 4);
    assert!(matches!(fe.ast.kind(body[0]), NodeKind::VariableDef(_)));
    assert!(matches!(fe.ast.kind(body[1]), NodeKind::Assignment { .. }));
    assert!(matches!(fe.ast.kind(body[2]), NodeKind::VariableRef { .. }));
    assert!(matches!(fe.ast.kind(body[3]), NodeKind::Return { .. }));
}

#[test]
fn c_style_for_is_lowered_to_while() {
    let (fe, body) = body_of("void f() { for (int i = 0; i < 4; i++) { } }");
    let body = stmts(&fe, body);
    let lowered = stmts(&fe, body[0]);
    assert_eq!(lowered.len(), 2);
    assert!(matches!(fe.ast.kind(lowered[0]), NodeKind::VariableDef(_)));
    let NodeKind::While { post, .. } = fe.ast.kind(lowered[1]) else {
        panic!("expected while");
    };
    assert!(post.is_some());
}

#[test]
fn ranged_for_iterator_lives_in_line_namespace() {
    let (fe, body) = body_of("void f() {\n  span<float, 4> d;\n  for (auto& e : d) { }\n}");
    let body = stmts(&fe, body);
    let NodeKind::RangedFor(ranged) = fe.ast.kind(body[1]) else {
        panic!("expected ranged for");
    };
    assert!(ranged.by_ref);
    let path: Vec<&str> = ranged
        .iterator
        .id
        .components()
        .iter()
        .map(|n| fe.interner.lookup(*n))
        .collect();
    assert_eq!(path, vec!["f", "for@3", "e"]);
    assert!(!ranged.iterator.ty.is_ref());
}

#[test]
fn casts_and_functional_casts() {
    let (fe, body) = body_of("float f(int a) { return (float)a + float(a); }");
    let body = stmts(&fe, body);
    let NodeKind::Return { value: Some(sum), .. } = fe.ast.kind(body[0]) else {
        panic!("expected return");
    };
    let NodeKind::BinaryOp { lhs, rhs, .. } = fe.ast.kind(*sum) else {
        panic!("expected addition");
    };
    for side in [*lhs, *rhs] {
        assert!(matches!(
            fe.ast.kind(side),
            NodeKind::Cast { target, implicit: false, .. } if *target == TypeInfo::float()
        ));
    }
}

#[test]
fn nested_template_arguments_split_shift() {
    let mut fe = frontend("span<span<int, 2>, 3> grid;");
    let unit = items(&mut fe);
    let NodeKind::VariableDef(def) = fe.ast.kind(unit[0]) else {
        panic!("expected variable");
    };
    let (element, len) = fe.types.container(def.symbol.ty).unwrap();
    assert_eq!(len, Some(3));
    assert_eq!(fe.types.container(element).unwrap().1, Some(2));
}

#[test]
fn const_globals_are_template_arguments() {
    let mut fe = frontend("const int N = 2 * 2;\nspan<int, N + 1> a;");
    let unit = items(&mut fe);
    assert_eq!(fe.constants.get(&fe.interner.intern("N")), Some(&Value::Int(4)));
    let NodeKind::VariableDef(def) = fe.ast.kind(unit[1]) else {
        panic!("expected variable");
    };
    assert_eq!(fe.types.container(def.symbol.ty).unwrap().1, Some(5));
}

#[test]
fn struct_template_instances_precede_their_user() {
    let mut fe = frontend("template <int N> struct Buf { span<float, N> data; };\nBuf<4> b;\nBuf<4> c;");
    let unit = items(&mut fe);
    assert_eq!(unit.len(), 3);
    assert!(matches!(fe.ast.kind(unit[0]), NodeKind::ComplexTypeDef(_)));
    let name = fe.interner.intern("Buf");
    let id = fe
        .types
        .find_struct(&tine_ir::NamespacedIdentifier::new(name), &[TemplateArg::Int(4)])
        .unwrap();
    for var in &unit[1..] {
        let NodeKind::VariableDef(def) = fe.ast.kind(*var) else {
            panic!("expected variable");
        };
        assert_eq!(def.symbol.ty, TypeInfo::complex(id));
    }
}

#[test]
fn function_template_signature_binds_type() {
    let mut fe = frontend("template <typename T> T twice(T x) { return x * 2; }");
    items(&mut fe);
    let name = fe.interner.intern("twice");
    let template = fe.function_templates[&name][0].clone();
    let decl = instantiate_function(&mut fe, &template, &[TemplateArg::Type(TypeInfo::float())]).unwrap();
    assert_eq!(decl.ret, TypeInfo::float());
    assert_eq!(decl.params[0].ty, TypeInfo::float());
    assert_eq!(decl.bindings.len(), 1);

    let err = instantiate_function(&mut fe, &template, &[TemplateArg::Int(3)]).unwrap_err();
    assert_eq!(err.code, ErrorCode::E1007);
}

#[test]
fn template_call_versus_comparison() {
    let (fe, body) = body_of(
        "template <typename T> T id(T x) { return x; }\nbool f(int a, int b) { return a < b; }",
    );
    let body = stmts(&fe, body);
    let NodeKind::Return { value: Some(value), .. } = fe.ast.kind(body[0]) else {
        panic!("expected return");
    };
    assert!(matches!(
        fe.ast.kind(*value),
        NodeKind::BinaryOp { op: BinaryOp::Lt, .. }
    ));

    let (fe, body) = body_of(
        "template <typename T> T id(T x) { return x; }\nfloat f(float a) { return id<float>(a); }",
    );
    let body = stmts(&fe, body);
    let NodeKind::Return { value: Some(value), .. } = fe.ast.kind(body[0]) else {
        panic!("expected return");
    };
    let NodeKind::Call(call) = fe.ast.kind(*value) else {
        panic!("expected call");
    };
    assert_eq!(call.template_args, vec![TemplateArg::Type(TypeInfo::float())]);
}

#[test]
fn missing_return_is_synthesized_in_void_functions() {
    let (fe, body) = body_of("void f(int a) { if (a) { a = 1; } }");
    let body = stmts(&fe, body);
    assert_eq!(body.len(), 2);
    assert!(matches!(
        fe.ast.kind(body[1]),
        NodeKind::Return { value: None, .. }
    ));
}

#[test]
fn if_else_branches_get_returns_each() {
    let (fe, body) = body_of("void f(int a) { if (a) a = 1; else { a = 2; } }");
    let body = stmts(&fe, body);
    assert_eq!(body.len(), 1);
    let NodeKind::If { then_branch, else_branch: Some(else_branch), .. } = fe.ast.kind(body[0]) else {
        panic!("expected if/else");
    };
    for branch in [*then_branch, *else_branch] {
        let inner = stmts(&fe, branch);
        assert!(matches!(
            fe.ast.kind(*inner.last().unwrap()),
            NodeKind::Return { .. }
        ));
    }
}

#[test]
fn code_after_a_return_is_left_alone() {
    let (fe, body) = body_of("int f(int a) { return a; a = 2; }");
    let body = stmts(&fe, body);
    assert_eq!(body.len(), 2);
    assert!(matches!(fe.ast.kind(body[1]), NodeKind::Assignment { .. }));
}

#[test]
fn non_void_path_without_return_is_an_error() {
    let mut fe = frontend("int f(int a) { if (a) return 1; }");
    let unit = items(&mut fe);
    let decl = function(&fe, unit[0]);
    let err = parse_body(&mut fe, &decl).unwrap_err();
    assert_eq!(err.code, ErrorCode::E1005);
    assert_eq!(err.message, "Not all paths return a value");

    let (_, body) = body_of("int g(int a) { if (a) return 1; else return 2; }");
    assert!(body.is_valid());
}

#[test]
fn inline_body_binds_arguments_and_returns_inline() {
    let mut fe = frontend("inline int sq(int v) { return v * v; }");
    let unit = items(&mut fe);
    let decl = function(&fe, unit[0]);
    assert!(decl.is_inline);
    let arg = fe
        .ast
        .push(NodeKind::Literal(Value::Int(3)), tine_ir::CodeLocation::SYNTHETIC);
    let body = parse_inline(&mut fe, &decl, &[arg]).unwrap();
    let body = stmts(&fe, body);
    let NodeKind::VariableDef(param) = fe.ast.kind(body[0]) else {
        panic!("expected parameter local");
    };
    assert_eq!(param.init, Some(arg));
    assert!(matches!(
        fe.ast.kind(body[1]),
        NodeKind::Return { target: ReturnTarget::Inline, .. }
    ));
}

#[test]
fn errors_name_expected_and_found_tokens() {
    let mut fe = frontend("int f() { return 1 }");
    let unit = items(&mut fe);
    let decl = function(&fe, unit[0]);
    let err = parse_body(&mut fe, &decl).unwrap_err();
    assert_eq!(err.code, ErrorCode::E1001);
    assert_eq!(err.message, "expected `;`, found `}`");

    let mut fe = frontend("int = 3;");
    let err = parse_unit(&mut fe).unwrap_err();
    assert_eq!(err.code, ErrorCode::E1004);
}

#[test]
fn deep_nesting_is_reported_not_overflowed() {
    let depth = 400;
    let src = format!(
        "int f() {{ return {}1{}; }}",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    let mut fe = frontend(&src);
    let unit = items(&mut fe);
    let decl = function(&fe, unit[0]);
    let err = parse_body(&mut fe, &decl).unwrap_err();
    assert_eq!(err.code, ErrorCode::E1006);
    assert!(err.message.starts_with("expression nesting too deep"));
}

#[test]
fn inline_on_a_variable_is_rejected() {
    let mut fe = frontend("inline int a = 1;");
    let err = parse_unit(&mut fe).unwrap_err();
    assert_eq!(err.code, ErrorCode::E1008);
}

#[test]
fn host_index_types_need_a_positive_limit() {
    let mut fe = frontend("index::wrapped<4> i;\nindex::wrapped<0> j;");
    fe.register_index_type("index::wrapped", tine_ir::IndexPolicy::Wrapped);
    let err = parse_unit(&mut fe).unwrap_err();
    assert_eq!(err.code, ErrorCode::E1007);

    let mut fe = frontend("index::clamped<8> i;");
    fe.register_index_type("index::clamped", tine_ir::IndexPolicy::Clamped);
    let unit = items(&mut fe);
    let NodeKind::VariableDef(def) = fe.ast.kind(unit[0]) else {
        panic!("expected variable");
    };
    assert_eq!(fe.types.index_policy(def.symbol.ty), Some(tine_ir::IndexPolicy::Clamped));
    assert_eq!(fe.types.index_limit(def.symbol.ty), Some(8));
}

#[test]
fn prototypes_have_no_body() {
    let mut fe = frontend("int g(int a);\nfloat h(int, double);\nint f() { return g(1); }");
    let unit = items(&mut fe);
    assert_eq!(unit.len(), 3);

    let g = function(&fe, unit[0]);
    assert!(g.body.is_none());
    assert_eq!(fe.interner.lookup(g.params[0].name), "a");

    let h = function(&fe, unit[1]);
    assert!(h.body.is_none());
    assert_eq!(h.params.len(), 2);
    assert_ne!(h.params[0].name, h.params[1].name);
    assert_eq!(h.params[1].ty, TypeInfo::double());

    assert!(function(&fe, unit[2]).body.is_some());
}

fn variable(fe: &Frontend, node: NodeId) -> tine_ir::VariableDef {
    match fe.ast.kind(node) {
        NodeKind::VariableDef(def) => def.clone(),
        other => panic!("expected a variable, got {other:?}"),
    }
}

#[test]
fn namespace_members_are_qualified() {
    let mut fe = frontend(
        "namespace ns { int k = 4; int get() { return k; } namespace inner { const int N = 3; } }\n\
         span<int, ns::inner::N> data;",
    );
    let unit = items(&mut fe);
    assert_eq!(unit.len(), 4);

    assert_eq!(variable(&fe, unit[0]).symbol.id.display(&fe.interner), "ns::k");
    let get = function(&fe, unit[1]);
    assert_eq!(get.id.display(&fe.interner), "ns::get");
    assert_eq!(variable(&fe, unit[2]).symbol.id.display(&fe.interner), "ns::inner::N");
    let data = variable(&fe, unit[3]);
    assert_eq!(fe.types.container(data.symbol.ty).unwrap().1, Some(3));

    // Inside `ns::get`, `k` is still a plain reference.
    let body = parse_body(&mut fe, &get).unwrap();
    let body = stmts(&fe, body);
    let NodeKind::Return { value: Some(value), .. } = fe.ast.kind(body[0]) else {
        panic!("expected return");
    };
    let NodeKind::VariableRef { id, .. } = fe.ast.kind(*value) else {
        panic!("expected a variable reference");
    };
    assert!(id.is_plain());
}

#[test]
fn namespaced_types_resolve_from_inside_and_outside() {
    let mut fe = frontend(
        "namespace dsp { struct Gain { float g = 1.0f; }; using Sample = float; Gain unity; }\n\
         dsp::Gain master;\n\
         dsp::Sample level;",
    );
    let unit = items(&mut fe);
    let unity = variable(&fe, unit[1]);
    let master = variable(&fe, unit[2]);
    assert_eq!(unity.symbol.ty, master.symbol.ty);
    assert_eq!(fe.types.display(master.symbol.ty, &fe.interner), "dsp::Gain");
    assert_eq!(variable(&fe, unit[3]).symbol.ty, TypeInfo::float());

    // Unqualified, the struct is unknown outside its namespace.
    let mut fe = frontend("namespace dsp { struct Gain { float g; }; }\nGain g;");
    assert_eq!(parse_unit(&mut fe).unwrap_err().code, ErrorCode::E1003);
}

#[test]
fn enum_items_become_constants() {
    let mut fe = frontend("enum Mode { Off, Slow = 4, Fast };\nMode m = Mode::Fast;");
    let unit = items(&mut fe);
    // Each enumerator is declared twice: under the enum and unscoped.
    assert_eq!(unit.len(), 7);

    let fast = variable(&fe, unit[4]);
    assert_eq!(fast.symbol.id.display(&fe.interner), "Mode::Fast");
    assert!(fast.symbol.ty.is_const());
    assert_eq!(variable(&fe, unit[5]).symbol.id.display(&fe.interner), "Fast");

    let key = |fe: &mut Frontend, text: &str| fe.path(text).key(&mut fe.interner);
    let off = key(&mut fe, "Mode::Off");
    let slow = key(&mut fe, "Slow");
    let fast = key(&mut fe, "Mode::Fast");
    assert_eq!(fe.constants.get(&off), Some(&Value::Int(0)));
    assert_eq!(fe.constants.get(&slow), Some(&Value::Int(4)));
    assert_eq!(fe.constants.get(&fast), Some(&Value::Int(5)));

    // The enum name is an alias of `int`.
    assert_eq!(variable(&fe, unit[6]).symbol.ty, TypeInfo::int());
}

#[test]
fn enum_class_items_stay_scoped() {
    let mut fe = frontend("namespace fx { enum class Shape { Sine, Saw, }; }");
    let unit = items(&mut fe);
    let names: Vec<String> = unit
        .iter()
        .map(|n| variable(&fe, *n).symbol.id.display(&fe.interner))
        .collect();
    assert_eq!(names, vec!["fx::Shape::Sine", "fx::Shape::Saw"]);

    let mut fe = frontend("enum Big { Last = 2147483647, Over };");
    assert_eq!(parse_unit(&mut fe).unwrap_err().code, ErrorCode::E1008);
}

#[test]
fn templates_inside_a_namespace_are_rejected() {
    let mut fe = frontend("namespace ns { template <int N> int f() { return N; } }");
    assert_eq!(parse_unit(&mut fe).unwrap_err().code, ErrorCode::E1008);

    let mut fe = frontend("namespace ns { int k;");
    let err = parse_unit(&mut fe).unwrap_err();
    assert_eq!(err.code, ErrorCode::E1001);
    assert_eq!(err.message, "expected `}`, found end of input");
}
