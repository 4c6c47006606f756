use pretty_assertions::assert_eq;
use tine_ir::{NativeType, Value};

use super::{TestCase, TestCaseError, TestOutcome};

const DOUBLER: &str = "/*\n\
BEGIN_TEST_DATA\n\
  f: test\n\
  ret: int\n\
  args: int\n\
  input: 12\n\
  output: 24\n\
END_TEST_DATA\n\
*/\n\
int test(int input) { return input * 2; }\n";

#[test]
fn parses_the_metadata_block() {
    let case = TestCase::parse(DOUBLER).unwrap();
    assert_eq!(case.function, "test");
    assert_eq!(case.ret, Some(NativeType::Integer));
    assert_eq!(case.input, vec![Value::Int(12)]);
    assert_eq!(case.output, Some(Value::Int(24)));
    assert_eq!(case.error, None);
    assert_eq!(case.compile_flags, None);
    assert_eq!(case.run(), TestOutcome::Passed);
}

#[test]
fn several_arguments() {
    let src = "// BEGIN_TEST_DATA\n\
               //   f: mix\n\
               //   ret: float\n\
               //   args: float, int\n\
               //   input: 0.5 4\n\
               //   output: 2.0\n\
               // END_TEST_DATA\n\
               float mix(float a, int b) { return a * b; }\n";
    let case = TestCase::parse(src).unwrap();
    assert_eq!(case.input, vec![Value::Float(0.5), Value::Int(4)]);
    assert_eq!(case.run(), TestOutcome::Passed);
}

#[test]
fn wrong_output_fails() {
    let src = DOUBLER.replace("output: 24", "output: 25");
    let case = TestCase::parse(&src).unwrap();
    assert!(matches!(case.run(), TestOutcome::Failed(_)));
}

#[test]
fn expected_compile_errors() {
    let src = "/* BEGIN_TEST_DATA\n\
               f: test\n\
               ret: int\n\
               args: int\n\
               input: 1\n\
               error: \"Line 8: DeadCodeError: unreachable code after `return`\"\n\
               END_TEST_DATA */\n\
               int test(int a) { return a; a = 2; }\n";
    let case = TestCase::parse(src).unwrap();
    assert_eq!(case.output, None);
    assert_eq!(case.run(), TestOutcome::Passed);

    let other = src.replace("Line 8", "Line 2");
    let outcome = TestCase::parse(&other).unwrap().run();
    assert!(matches!(outcome, TestOutcome::Failed(_)), "{outcome:?}");
}

#[test]
fn expected_runtime_errors() {
    let src = "/* BEGIN_TEST_DATA\n\
               f: test\n\
               ret: int\n\
               args: int\n\
               input: 0\n\
               error: \"Line 8: RuntimeError: integer division by zero\"\n\
               END_TEST_DATA */\n\
               int test(int a) { return 10 / a; }\n";
    assert_eq!(TestCase::parse(src).unwrap().run(), TestOutcome::Passed);
}

#[test]
fn compile_flags_select_optimizations() {
    let src = DOUBLER.replace("output: 24", "output: 24\n  compile_flags: constant_folding");
    let case = TestCase::parse(&src).unwrap();
    assert_eq!(case.compile_flags, Some(vec!["constant_folding".to_string()]));
    assert_eq!(case.run(), TestOutcome::Passed);
}

#[test]
fn malformed_files() {
    assert_eq!(
        TestCase::parse("int f() { return 1; }"),
        Err(TestCaseError::MissingMetadata)
    );
    assert_eq!(
        TestCase::parse(&DOUBLER.replace("input: 12", "input: 12 13")),
        Err(TestCaseError::InputMismatch {
            expected: 1,
            found: 2
        })
    );
    assert_eq!(
        TestCase::parse(&DOUBLER.replace("ret: int", "ret: block")),
        Err(TestCaseError::UnknownType("block".to_string()))
    );
    assert_eq!(
        TestCase::parse(&DOUBLER.replace("output: 24\n", "")),
        Err(TestCaseError::MissingKey("output"))
    );
    assert!(matches!(
        TestCase::parse(&DOUBLER.replace("input: 12", "input: twelve")),
        Err(TestCaseError::BadValue { .. })
    ));
}
