//! The Tine compiler driver.
//!
//! ```text
//! source ──► Preprocessor ──► Frontend ──► Unit::analyse ──► codegen::compile
//!                │                            │                   │
//!                ▼                            ▼                   ▼
//!           Preprocessed                front passes           Artifact
//! ```
//!
//! A [`Session`] holds [`CompileOptions`] and the host libraries and turns
//! source text into a [`CompileResult`]. Every compile builds its own unit,
//! so sessions can compile on any number of threads at once. Compiled code
//! runs in an [`Instance`], one per voice or thread.
//!
//! # Debugging
//!
//! - `TINE_LOG=debug` (or `RUST_LOG`): hierarchical pass tracing, see
//!   [`init_tracing`].
//! - `TINE_LOG=tine_codegen=trace`: follow register allocation.

use std::sync::Once;

pub mod compiler;
pub mod library;
pub mod options;
pub mod testcase;

pub use compiler::{CompileResult, Session};
pub use library::{default_libraries, IndexLibrary, MathLibrary};
pub use options::CompileOptions;
pub use testcase::{
    TestCase, TestCaseError, TestOutcome, TestResult, TestRunner, TestRunnerConfig, TestSummary,
};
pub use tine_codegen::{Artifact, CallError, Export, Instance};
pub use tine_diagnostic::{Diagnostic, ErrorCode, Severity};
pub use tine_ir::{NativeType, Value};
pub use tine_sema::AbortFlag;

static TRACING_INIT: Once = Once::new();

/// Install the tracing subscriber.
///
/// Safe to call more than once. Nothing is installed unless `TINE_LOG` or
/// `RUST_LOG` holds a filter, e.g. `TINE_LOG=tine_sema=debug`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        let filter =
            EnvFilter::try_from_env("TINE_LOG").or_else(|_| EnvFilter::try_from_default_env());
        if let Ok(filter) = filter {
            let tree = tracing_tree::HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true)
                .with_writer(std::io::stderr);
            // A host may already have installed its own subscriber.
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tree)
                .try_init();
        }
    });
}
