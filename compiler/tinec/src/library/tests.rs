use pretty_assertions::assert_eq;
use tine_ir::Value;

use crate::{CompileOptions, Instance, Session};

fn run(options: CompileOptions, src: &str, args: &[Value]) -> Option<Value> {
    let result = Session::new(options).compile(src);
    assert!(result.compiled_ok, "{}", result.report());
    let mut instance = Instance::new(result.artifact.unwrap()).unwrap();
    instance.call("f", args).unwrap()
}

fn both(src: &str, args: &[Value]) -> Option<Value> {
    let plain = run(CompileOptions::default().without_optimizations(), src, args);
    let folded = run(CompileOptions::default(), src, args);
    assert_eq!(plain, folded, "{src}");
    plain
}

#[test]
fn float_and_double_overloads() {
    assert_eq!(
        both("float f(float x) { return Math::abs(x); }", &[Value::Float(-2.5)]),
        Some(Value::Float(2.5))
    );
    assert_eq!(
        both("double f(double x) { return Math::sqrt(x); }", &[Value::Double(9.0)]),
        Some(Value::Double(3.0))
    );
    assert_eq!(
        both("double f() { return Math::pow(2.0, 10.0); }", &[]),
        Some(Value::Double(1024.0))
    );
}

#[test]
fn range_clamps() {
    let src = "float f(float x) { return Math::range(x, 0.0f, 1.0f); }";
    assert_eq!(both(src, &[Value::Float(3.0)]), Some(Value::Float(1.0)));
    assert_eq!(both(src, &[Value::Float(-3.0)]), Some(Value::Float(0.0)));
    assert_eq!(both(src, &[Value::Float(0.25)]), Some(Value::Float(0.25)));
}

#[test]
fn integer_overloads() {
    assert_eq!(
        both("int f(int a) { return Math::max(Math::abs(a), 3); }", &[Value::Int(-7)]),
        Some(Value::Int(7))
    );
    assert_eq!(
        both("int f() { return Math::min(4, -2); }", &[]),
        Some(Value::Int(-2))
    );
}

#[test]
fn rounding() {
    let src = "double f(double x) { return Math::floor(x) + Math::ceil(x); }";
    assert_eq!(both(src, &[Value::Double(1.5)]), Some(Value::Double(3.0)));
}

#[test]
fn literal_calls_fold_away() {
    let src = "float f() { return Math::sin(0.0f) + Math::exp(0.0f); }";
    let result = Session::default().compile(src);
    let listing = result.artifact.unwrap().disassemble("f").unwrap();
    assert!(!listing.contains("call"), "{listing}");
}

#[test]
fn index_types_are_registered() {
    let src = "int f(int i) { span<int, 3> a = {1, 2, 3}; index::wrapped<3> k = i; return a[k]; }";
    assert_eq!(both(src, &[Value::Int(4)]), Some(Value::Int(2)));
}
