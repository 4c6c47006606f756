//! Self-describing test-case files.
//!
//! A `.tine` file carries its expectations in a comment block:
//!
//! ```text
//! /*
//! BEGIN_TEST_DATA
//!   f: test
//!   ret: int
//!   args: int
//!   input: 12
//!   output: 24
//!   error: "Line 3: ..."
//!   compile_flags: constant_folding inlining
//! END_TEST_DATA
//! */
//! ```
//!
//! `error` expects a compile or runtime failure with exactly that
//! message; otherwise `f` is called with `input` and must return
//! `output`. Without `compile_flags` a case is checked twice, with no
//! optimizations and with all of them.

mod runner;

use std::fmt;

use thiserror::Error;
use tine_ir::{NativeType, Value};
use tine_sema::optimize::builtin_ids;

use crate::{CompileOptions, Diagnostic, Instance, Session};

pub use runner::{discover, TestResult, TestRunner, TestRunnerConfig, TestSummary};

const BEGIN: &str = "BEGIN_TEST_DATA";
const END: &str = "END_TEST_DATA";

/// Why a test-case file could not be read.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TestCaseError {
    #[error("no {BEGIN} ... {END} block")]
    MissingMetadata,
    #[error("{0}: illegal line")]
    IllegalLine(String),
    #[error("missing key `{0}`")]
    MissingKey(&'static str),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("{expected} arguments declared but {found} inputs given")]
    InputMismatch { expected: usize, found: usize },
    #[error("`{text}` is not a valid {ty}")]
    BadValue { text: String, ty: &'static str },
}

/// A parsed test-case file.
#[derive(Clone, Debug, PartialEq)]
pub struct TestCase {
    pub source: String,
    pub function: String,
    /// `None` for `void`.
    pub ret: Option<NativeType>,
    pub input: Vec<Value>,
    pub output: Option<Value>,
    pub error: Option<String>,
    /// Optimization ids to compile with; `None` checks both extremes.
    pub compile_flags: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed(String),
    /// The file itself is malformed.
    Invalid(String),
}

impl TestOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Passed => f.write_str("ok"),
            TestOutcome::Failed(why) => write!(f, "FAILED: {why}"),
            TestOutcome::Invalid(why) => write!(f, "INVALID: {why}"),
        }
    }
}

fn type_of(name: &str) -> Result<Option<NativeType>, TestCaseError> {
    Ok(Some(match name {
        "void" => return Ok(None),
        "int" => NativeType::Integer,
        "float" => NativeType::Float,
        "double" => NativeType::Double,
        "bool" => NativeType::Bool,
        other => return Err(TestCaseError::UnknownType(other.to_string())),
    }))
}

fn parse_value(text: &str, ty: NativeType) -> Result<Value, TestCaseError> {
    Value::parse(text, ty).ok_or_else(|| TestCaseError::BadValue {
        text: text.to_string(),
        ty: ty.name(),
    })
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// `Line N: message`, the form `error:` is written in.
fn describe(diag: &Diagnostic) -> String {
    format!("Line {}: {}", diag.line, diag.message)
}

impl TestCase {
    pub fn parse(source: &str) -> Result<TestCase, TestCaseError> {
        let start = source.find(BEGIN).ok_or(TestCaseError::MissingMetadata)? + BEGIN.len();
        let len = source[start..]
            .find(END)
            .ok_or(TestCaseError::MissingMetadata)?;

        let mut function = None;
        let mut ret = None;
        let mut args = "";
        let mut input = "";
        let mut output = None;
        let mut error = None;
        let mut compile_flags = None;
        for line in source[start..start + len].lines() {
            // Metadata may sit in a `//` comment as well as a block comment.
            let line = line.trim().trim_start_matches(['/', '*']).trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| TestCaseError::IllegalLine(line.to_string()))?;
            let value = value.trim();
            match key.trim() {
                "f" => function = Some(value.to_string()),
                "ret" => ret = Some(type_of(value)?),
                "args" => args = value,
                "input" => input = value,
                "output" => output = Some(unquote(value)),
                "error" => error = Some(unquote(value).to_string()),
                "compile_flags" => {
                    compile_flags = Some(words(value).map(String::from).collect());
                }
                _ => return Err(TestCaseError::IllegalLine(line.to_string())),
            }
        }

        let function = function.ok_or(TestCaseError::MissingKey("f"))?;
        let ret = ret.ok_or(TestCaseError::MissingKey("ret"))?;

        let mut arg_types = Vec::new();
        for name in words(args) {
            arg_types.push(type_of(name)?.ok_or_else(|| TestCaseError::UnknownType(name.into()))?);
        }
        let inputs: Vec<&str> = words(input).collect();
        if inputs.len() != arg_types.len() {
            return Err(TestCaseError::InputMismatch {
                expected: arg_types.len(),
                found: inputs.len(),
            });
        }
        let input = inputs
            .into_iter()
            .zip(&arg_types)
            .map(|(text, ty)| parse_value(text, *ty))
            .collect::<Result<_, _>>()?;

        let output = match (error.is_some(), ret, output) {
            (false, Some(ty), Some(text)) => Some(parse_value(text, ty)?),
            (false, Some(_), None) => return Err(TestCaseError::MissingKey("output")),
            _ => None,
        };

        Ok(TestCase {
            source: source.to_string(),
            function,
            ret,
            input,
            output,
            error,
            compile_flags,
        })
    }

    /// The optimization sets this case is compiled with.
    fn flag_sets(&self) -> Vec<Vec<String>> {
        match &self.compile_flags {
            Some(flags) => vec![flags.clone()],
            None => vec![
                Vec::new(),
                builtin_ids().into_iter().map(String::from).collect(),
            ],
        }
    }

    pub fn run(&self) -> TestOutcome {
        for flags in self.flag_sets() {
            if let Err(why) = self.run_with(&flags) {
                return TestOutcome::Failed(format!("[{}] {why}", flags.join(" ")));
            }
        }
        TestOutcome::Passed
    }

    fn run_with(&self, flags: &[String]) -> Result<(), String> {
        let options = CompileOptions::default().with_optimizations(flags.iter().cloned());
        let result = Session::new(options).compile(&self.source);

        let Some(artifact) = result.artifact.clone() else {
            let actual = result
                .first_error()
                .map_or_else(|| "no diagnostic".to_string(), describe);
            return match &self.error {
                Some(expected) if *expected == actual => Ok(()),
                Some(expected) => Err(format!("expected error `{expected}`, got `{actual}`")),
                None => Err(format!("compile failed: {actual}")),
            };
        };

        let called = Instance::new(artifact).and_then(|mut instance| {
            let value = instance.call(&self.function, &self.input)?;
            instance.destroy()?;
            Ok(value)
        });
        match (called, &self.error) {
            (Err(e), Some(expected)) => {
                let actual = describe(&e.to_diagnostic());
                if *expected == actual {
                    Ok(())
                } else {
                    Err(format!("expected error `{expected}`, got `{actual}`"))
                }
            }
            (Err(e), None) => Err(format!("call failed: {}", describe(&e.to_diagnostic()))),
            (Ok(value), Some(expected)) => Err(format!(
                "expected error `{expected}`, but the call returned {}",
                value.map_or_else(|| "nothing".to_string(), |v| v.to_string())
            )),
            (Ok(value), None) => {
                if same(value, self.output) {
                    Ok(())
                } else {
                    Err(format!("expected {:?}, got {value:?}", self.output))
                }
            }
        }
    }
}

/// Floats compare with a small relative tolerance, everything else exactly.
fn same(actual: Option<Value>, expected: Option<Value>) -> bool {
    match (actual, expected) {
        (Some(Value::Float(a)), Some(Value::Float(b))) => close(f64::from(a), f64::from(b), 1e-5),
        (Some(Value::Double(a)), Some(Value::Double(b))) => close(a, b, 1e-9),
        (a, b) => a == b,
    }
}

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    a == b || (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests;
