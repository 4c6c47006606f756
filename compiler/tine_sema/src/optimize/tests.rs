use pretty_assertions::assert_eq;
use tine_diagnostic::{DiagnosticQueue, ErrorCode, Severity};
use tine_ir::{BinaryOp, NodeKind, TypeInfo, Value};

use super::*;
use crate::test_support::{body, plain_unit, returned};

/// Analyse `src` with only the optimizations named in `ids`.
fn optimized(src: &str, ids: &[&str]) -> Unit {
    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    let mut queue = DiagnosticQueue::new(src);
    let selected = select_optimizations(&ids, &mut queue);
    let mut unit = plain_unit(src).with_optimizations(selected).with_debug(true);
    if let Err(e) = unit.analyse() {
        panic!("analysis of {src:?} failed: {e:?}");
    }
    unit
}

#[test]
fn selection_keeps_builtin_order_and_warns_on_unknown_ids() {
    let mut queue = DiagnosticQueue::new("");
    let ids = ["dead_code", "unroll", "constant_folding"].map(String::from);
    let selected = select_optimizations(&ids, &mut queue);
    let names: Vec<_> = selected.iter().map(|o| o.id()).collect();
    assert_eq!(names, vec!["constant_folding", "dead_code"]);
    let warnings: Vec<_> = queue
        .iter()
        .map(|d| (d.severity, d.code, d.message.clone()))
        .collect();
    assert_eq!(
        warnings,
        vec![(
            Severity::Warning,
            Some(ErrorCode::E2102),
            "unknown optimization `unroll` ignored".to_string()
        )]
    );
    assert_eq!(
        builtin_ids(),
        vec!["constant_folding", "binary_op", "dead_code", "inlining"]
    );
}

#[test]
fn constant_expressions_fold_to_literals() {
    let unit = optimized(
        "int f() { return 2 + 3 * 4; }\nfloat g() { return (float)3; }",
        &["constant_folding"],
    );
    assert_eq!(
        unit.fe.ast.literal(returned(&unit, "f", 0)),
        Some(Value::Int(14))
    );
    assert_eq!(
        unit.fe.ast.literal(returned(&unit, "g", 0)),
        Some(Value::Float(3.0))
    );
    assert!(unit
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Info && d.message == "folded constant expression to `14`"));
}

#[test]
fn division_by_zero_is_left_for_run_time() {
    let unit = optimized("int f() { return 1 / 0; }", &["constant_folding"]);
    assert!(matches!(
        unit.fe.ast.kind(returned(&unit, "f", 0)),
        NodeKind::BinaryOp {
            op: BinaryOp::Div,
            ..
        }
    ));
}

#[test]
fn integer_identities_drop_the_neutral_operand() {
    let unit = optimized(
        "int f(int a) { return a * 1; }\nint g(int a) { return 0 + a; }\nint h(int a) { return 0 * a; }",
        &["binary_op"],
    );
    assert!(matches!(
        unit.fe.ast.kind(returned(&unit, "f", 0)),
        NodeKind::VariableRef { .. }
    ));
    assert!(matches!(
        unit.fe.ast.kind(returned(&unit, "g", 0)),
        NodeKind::VariableRef { .. }
    ));
    assert_eq!(
        unit.fe.ast.literal(returned(&unit, "h", 0)),
        Some(Value::Int(0))
    );
}

#[test]
fn float_identities_are_kept() {
    let unit = optimized("float f(float a) { return a + 0; }", &["binary_op"]);
    assert!(matches!(
        unit.fe.ast.kind(returned(&unit, "f", 0)),
        NodeKind::BinaryOp { op: BinaryOp::Add, .. }
    ));
}

#[test]
fn short_circuit_with_a_literal_side() {
    let unit = optimized(
        "bool f(bool a) { return false && a; }\nbool g(int a) { return true && a; }",
        &["binary_op"],
    );
    assert_eq!(
        unit.fe.ast.literal(returned(&unit, "f", 0)),
        Some(Value::Bool(false))
    );
    let kept = returned(&unit, "g", 0);
    assert!(matches!(unit.fe.ast.kind(kept), NodeKind::Cast { .. }));
    assert_eq!(unit.fe.ast.ty(kept), TypeInfo::bool());
}

#[test]
fn constant_conditions_drop_dead_branches() {
    let unit = optimized(
        "int f() { if (false) { return 1; } return 2; }\n\
         int g(int a) { if (true) { a = 1; } else { a = 2; } return a; }\n\
         void h() { while (false) { } }",
        &["dead_code"],
    );
    assert!(matches!(unit.fe.ast.kind(body(&unit, "f")[0]), NodeKind::Noop));
    let NodeKind::Block(kept) = unit.fe.ast.kind(body(&unit, "g")[0]) else {
        panic!("expected the then branch");
    };
    assert_eq!(kept.stmts.len(), 1);
    assert!(matches!(unit.fe.ast.kind(body(&unit, "h")[0]), NodeKind::Noop));
}

#[test]
fn nothing_runs_when_nothing_is_selected() {
    let unit = optimized("int f() { return 2 + 3; }", &[]);
    assert!(matches!(
        unit.fe.ast.kind(returned(&unit, "f", 0)),
        NodeKind::BinaryOp { .. }
    ));
    assert!(unit.diagnostics.iter().next().is_none());
}
