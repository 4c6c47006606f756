use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use tine_diagnostic::ErrorCode;
use tine_ir::Value;

use super::{CallError, Instance};
use crate::test_support::{compiled, compiled_debug, compiled_optimized, instance};
use crate::Artifact;

fn call(src: &str, name: &str, args: &[Value]) -> Result<Option<Value>, CallError> {
    instance(src).call(name, args)
}

fn int(src: &str, name: &str, args: &[i32]) -> i32 {
    let args: Vec<Value> = args.iter().map(|&a| Value::Int(a)).collect();
    match call(src, name, &args) {
        Ok(Some(Value::Int(v))) => v,
        other => panic!("`{name}({args:?})` gave {other:?}"),
    }
}

fn runtime_code(result: Result<Option<Value>, CallError>) -> ErrorCode {
    match result {
        Err(CallError::Runtime { error, .. }) => error.code,
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[test]
fn doubles_its_input() {
    assert_eq!(int("int test(int input){ return input * 2; }", "test", &[21]), 42);
}

#[test]
fn method_on_a_global_struct() {
    let src = "struct X { int v = 5; int get(){ return v; } };\nX x;\n\
               int test(int i){ return x.get() + i; }";
    assert_eq!(int(src, "test", &[10]), 15);
}

#[test]
fn sums_a_span_by_reference() {
    let src = "span<float,4> d = {1.0,2.0,3.0,4.0};\n\
               float test(){ float s=0.0; for(auto& e: d) s += e; return s; }";
    for artifact in [compiled(src), compiled_optimized(src)] {
        let mut instance = Instance::new(Arc::new(artifact)).unwrap();
        assert_eq!(instance.call("test", &[]).unwrap(), Some(Value::Float(10.0)));
    }
}

// ── Control flow and calls ──────────────────────────────────────────

#[test]
fn recursion() {
    let src = "int fib(int n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }";
    assert_eq!(int(src, "fib", &[15]), 610);
}

#[test]
fn loops_with_break_and_continue() {
    let src = "int f(int n) {\n\
                 int s = 0;\n\
                 int i = 0;\n\
                 while (true) {\n\
                   i++;\n\
                   if (i > n) break;\n\
                   if (i % 2 == 0) continue;\n\
                   s += i;\n\
                 }\n\
                 return s;\n\
               }";
    assert_eq!(int(src, "f", &[5]), 9);
    let counted = "int f(int n) { int s = 0; for (int i = 0; i < n; i++) { s = s + i; } return s; }";
    assert_eq!(int(counted, "f", &[5]), 10);
}

#[test]
fn ternary_converts_both_arms() {
    let src = "double f(int a) { return a > 0 ? a * 1.5 : -1.0; }";
    let mut instance = instance(src);
    assert_eq!(instance.call("f", &[Value::Int(2)]).unwrap(), Some(Value::Double(3.0)));
    assert_eq!(instance.call("f", &[Value::Int(-1)]).unwrap(), Some(Value::Double(-1.0)));
}

#[test]
fn logical_operators_short_circuit() {
    let src = "int g;\nbool side() { g = g + 1; return true; }\nbool f(bool a) { return a || side(); }";
    let mut instance = instance(src);
    assert_eq!(instance.call("f", &[Value::Bool(true)]).unwrap(), Some(Value::Bool(true)));
    assert_eq!(instance.read_global("g"), Some(Value::Int(0)));
    assert_eq!(instance.call("f", &[Value::Bool(false)]).unwrap(), Some(Value::Bool(true)));
    assert_eq!(instance.read_global("g"), Some(Value::Int(1)));
}

#[test]
fn references_write_through() {
    let src = "void bump(int& v) { v = v + 1; }\nint f(int a) { bump(a); bump(a); return a; }";
    assert_eq!(int(src, "f", &[1]), 3);
}

#[test]
fn memory_backed_registers_hold_their_values() {
    let mut src = String::from("int f() {\n");
    for i in 0..18 {
        src.push_str(&format!("  int v{i} = {i};\n"));
    }
    src.push_str("  return v0");
    for i in 1..18 {
        src.push_str(&format!(" + v{i}"));
    }
    src.push_str(";\n}");
    assert_eq!(int(&src, "f", &[]), 153);
}

// ── State ───────────────────────────────────────────────────────────

#[test]
fn globals_persist_per_instance() {
    let src = "int counter;\nint tick() { counter++; return counter; }";
    let artifact = Arc::new(compiled(src));
    let mut first = Instance::new(Arc::clone(&artifact)).unwrap();
    let mut second = Instance::new(artifact).unwrap();
    for expected in 1..=3 {
        assert_eq!(first.call("tick", &[]).unwrap(), Some(Value::Int(expected)));
    }
    assert_eq!(first.read_global("counter"), Some(Value::Int(3)));
    assert_eq!(second.call("tick", &[]).unwrap(), Some(Value::Int(1)));
}

#[test]
fn statics_start_from_their_initializer() {
    let src = "int next() { static int n = 10; n = n + 1; return n; }";
    let mut instance = instance(src);
    assert_eq!(instance.call("next", &[]).unwrap(), Some(Value::Int(11)));
    assert_eq!(instance.call("next", &[]).unwrap(), Some(Value::Int(12)));
}

#[test]
fn constructors_and_destructors_run() {
    let src = "int log;\n\
               struct C { int a; C(int x) { a = x; log = log + x; } ~C() { log = log + 100; } };\n\
               int f() { C c(3); return c.a; }";
    let mut instance = instance(src);
    assert_eq!(instance.call("f", &[]).unwrap(), Some(Value::Int(3)));
    assert_eq!(instance.read_global("log"), Some(Value::Int(103)));
}

#[test]
fn write_global_is_visible_to_code() {
    let src = "float gain = 1.0f;\nfloat apply(float x) { return x * gain; }";
    let mut instance = instance(src);
    assert!(instance.write_global("gain", Value::Float(0.5)));
    assert_eq!(instance.call("apply", &[Value::Float(4.0)]).unwrap(), Some(Value::Float(2.0)));
    assert!(!instance.write_global("missing", Value::Int(1)));
}

#[test]
fn dyn_views_a_span() {
    let src = "span<int, 3> a = {1, 2, 3};\n\
               int f() { dyn<int> d = a; int s = 0; for (auto x : d) s += x; return s + d.size(); }";
    assert_eq!(int(src, "f", &[]), 9);
}

// ── Index policies ──────────────────────────────────────────────────

const CHECKED: &str = "int f(int i) { span<int, 4> a = {1, 2, 3, 4}; return a[i]; }";

fn with_index(policy: &str) -> String {
    format!("int f(int i) {{ span<int, 4> a = {{1, 2, 3, 4}}; index::{policy}<4> k = i; return a[k]; }}")
}

#[test]
fn checked_subscripts_reject_out_of_range() {
    assert_eq!(int(CHECKED, "f", &[2]), 3);
    assert_eq!(runtime_code(call(CHECKED, "f", &[Value::Int(4)])), ErrorCode::E6001);
    assert_eq!(runtime_code(call(CHECKED, "f", &[Value::Int(-1)])), ErrorCode::E6001);
}

#[test]
fn wrapped_and_clamped_subscripts() {
    let wrapped = with_index("wrapped");
    assert_eq!(int(&wrapped, "f", &[5]), 2);
    assert_eq!(int(&wrapped, "f", &[-1]), 4);
    let clamped = with_index("clamped");
    assert_eq!(int(&clamped, "f", &[9]), 4);
    assert_eq!(int(&clamped, "f", &[-3]), 1);
}

#[test]
fn unchecked_subscripts_stay_inside_the_image() {
    let unchecked = with_index("unsafe");
    assert_eq!(int(&unchecked, "f", &[1]), 2);
    let far = call(&unchecked, "f", &[Value::Int(100_000_000)]);
    assert_eq!(runtime_code(far), ErrorCode::E6004);
}

// ── Errors ──────────────────────────────────────────────────────────

#[test]
fn division_by_zero_reports_the_line() {
    let src = "int f(int a, int b) {\n  return a / b;\n}";
    match call(src, "f", &[Value::Int(1), Value::Int(0)]) {
        Err(CallError::Runtime { error, line }) => {
            assert_eq!(error.code, ErrorCode::E6002);
            assert_eq!(line, 2);
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn unbounded_recursion_overflows() {
    let src = "int down(int n) { return down(n + 1); }";
    assert_eq!(runtime_code(call(src, "down", &[Value::Int(0)])), ErrorCode::E6003);
}

#[test]
fn undefined_functions_fail_when_called() {
    let src = "int g(int a);\nint f() { return g(1); }";
    assert_eq!(runtime_code(call(src, "f", &[])), ErrorCode::E6006);
}

#[test]
fn host_calls_check_the_signature() {
    let src = "int test(int input){ return input * 2; }";
    let mut instance = instance(src);
    let missing = instance.call("nope", &[]).unwrap_err();
    assert_eq!(missing.code(), ErrorCode::E6006);
    let arity = instance.call("test", &[]).unwrap_err();
    assert_eq!(arity.code(), ErrorCode::E6005);
    let pointer = instance.call("test", &[Value::Pointer(16)]).unwrap_err();
    assert_eq!(pointer.code(), ErrorCode::E6005);
    // Implicitly convertible arguments are accepted.
    assert_eq!(instance.call("test", &[Value::Double(21.0)]).unwrap(), Some(Value::Int(42)));
}

#[test]
fn exact_overloads_win() {
    let src = "int f(int a) { return 1; }\nint f(double a) { return 2; }";
    let mut instance = instance(src);
    assert_eq!(instance.call("f", &[Value::Int(0)]).unwrap(), Some(Value::Int(1)));
    assert_eq!(instance.call("f", &[Value::Double(0.0)]).unwrap(), Some(Value::Int(2)));
}

#[test]
fn runtime_errors_become_diagnostics() {
    let err = call(CHECKED, "f", &[Value::Int(7)]).unwrap_err();
    let diag = err.to_diagnostic();
    assert_eq!(diag.code, Some(ErrorCode::E6001));
    assert_eq!(diag.line, 1);
}

// ── Host integration ────────────────────────────────────────────────

#[test]
fn hook_sees_every_statement() {
    let artifact = compiled_debug("int f(int a) {\n  int b = a;\n  return b;\n}");
    let mut instance = Instance::new(Arc::new(artifact)).unwrap();
    let lines = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&lines);
    instance.set_hook(move |line| seen.lock().unwrap().push(line));
    assert_eq!(instance.call("f", &[Value::Int(4)]).unwrap(), Some(Value::Int(4)));
    assert_eq!(*lines.lock().unwrap(), vec![2, 3]);
}

#[test]
fn destroy_runs_the_finalizer() {
    let src = "int log;\nstruct C { ~C() { log = log + 1; } };\nC c;";
    assert!(instance(src).destroy().is_ok());
}

#[test]
fn artifacts_are_shared_between_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    fn assert_send<T: Send>() {}
    assert_send_sync::<Artifact>();
    assert_send::<Instance>();

    let artifact = Arc::new(compiled("int sq(int v) { return v * v; }"));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let artifact = Arc::clone(&artifact);
            std::thread::spawn(move || {
                let mut instance = Instance::new(artifact).unwrap();
                instance.call("sq", &[Value::Int(i)]).unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results,
        vec![Some(Value::Int(0)), Some(Value::Int(1)), Some(Value::Int(4)), Some(Value::Int(9))]
    );
}
