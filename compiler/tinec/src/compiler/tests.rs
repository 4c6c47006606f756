use pretty_assertions::assert_eq;
use tine_diagnostic::{ErrorCode, Severity};
use tine_ir::Value;
use tine_sema::AbortFlag;

use super::Session;
use crate::{CompileOptions, Instance};

fn codes(result: &super::CompileResult) -> Vec<(Severity, Option<ErrorCode>)> {
    result
        .diagnostics
        .iter()
        .map(|d| (d.severity, d.code))
        .collect()
}

#[test]
fn compiles_with_defaults() {
    let result = Session::default().compile("int test(int input){ return input * 2; }");
    assert!(result.compiled_ok, "{}", result.report());
    assert!(result.diagnostics.is_empty());
    let artifact = result.artifact.unwrap();
    let exports: Vec<String> = artifact.exports().iter().map(ToString::to_string).collect();
    assert_eq!(exports, vec!["int test(int)".to_string()]);
}

#[test]
fn first_error_stops_the_pipeline() {
    let src = "float g(double d) { return d; }\nint f() {\n  return 1 +;\n}";
    let result = Session::default().compile(src);
    assert!(!result.compiled_ok);
    assert!(result.artifact.is_none());
    let error = result.first_error().unwrap();
    assert_eq!(error.line, 3);
    assert_eq!(result.errors().count(), 1);
    // The narrowing warning from `g` comes first.
    assert_eq!(
        codes(&result),
        vec![
            (Severity::Warning, Some(ErrorCode::E2101)),
            (Severity::Error, error.code),
        ]
    );
}

#[test]
fn external_definitions_reach_the_source() {
    let options = CompileOptions::default().define("GAIN", "3");
    let result = Session::new(options).compile("int f(int a) { return a * GAIN; }");
    let mut instance = Instance::new(result.artifact.unwrap()).unwrap();
    assert_eq!(instance.call("f", &[Value::Int(2)]).unwrap(), Some(Value::Int(6)));
}

#[test]
fn macro_errors_point_at_the_original_line() {
    let src = "#define BAD(x) (x +)\nint f() {\n  return BAD(1);\n}";
    let result = Session::default().compile(src);
    assert!(!result.compiled_ok);
    assert_eq!(result.first_error().unwrap().line, 3);
}

#[test]
fn preprocessor_errors_are_reported() {
    let result = Session::default().compile("#if 1\nint f() { return 1; }\n");
    assert!(!result.compiled_ok);
    assert_eq!(result.first_error().unwrap().code, Some(ErrorCode::E0104));
}

#[test]
fn unknown_optimizations_are_warnings() {
    let options = CompileOptions::default().with_optimizations(["constant_folding", "loop_unroll"]);
    let result = Session::new(options).compile("int f() { return 1 + 2; }");
    assert!(result.compiled_ok);
    assert_eq!(codes(&result), vec![(Severity::Warning, Some(ErrorCode::E2102))]);
}

#[test]
fn debug_mode_reports_optimization_notes() {
    let src = "int f() { return 1 + 2; }";
    let quiet = Session::default().compile(src);
    assert!(quiet.diagnostics.is_empty());
    let noisy = Session::new(CompileOptions::default().with_debug(true)).compile(src);
    assert!(noisy.compiled_ok);
    assert!(noisy
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Info));
}

#[test]
fn aborted_compiles_fail() {
    let abort = AbortFlag::new();
    abort.abort();
    let result = Session::new(CompileOptions::default().with_abort(abort))
        .compile("int f() { return 1; }");
    assert!(!result.compiled_ok);
    assert!(result.artifact.is_none());
    assert_eq!(result.first_error().unwrap().code, Some(ErrorCode::E9002));
}

#[test]
fn host_functions_need_their_library() {
    let src = "float f(float x) { return Math::abs(x); }";
    assert!(Session::default().compile(src).compiled_ok);
    let bare = Session::new(CompileOptions::default().without_libraries()).compile(src);
    assert!(!bare.compiled_ok);
}
