//! Diagnostics for the Tine compiler.
//!
//! - [`ErrorCode`]: stable E#### identifiers, first digit = phase
//! - [`CompileError`]: the fatal error taxonomy threaded through every pass
//! - [`Diagnostic`] / [`Severity`]: one entry of the ordered output stream
//! - [`DiagnosticQueue`]: collects diagnostics in pass-execution order
//!
//! # Design
//!
//! Passes return `Result<_, CompileError>`. The first error stops the
//! pipeline; the driver converts it into an `Error` diagnostic and appends it
//! after every warning and info already queued, so the stream stays in the
//! order things happened.

mod diagnostic;
mod error;
mod error_code;
mod queue;

pub use diagnostic::{Diagnostic, Severity};
pub use error::{CompileError, ErrorKind};
pub use error_code::ErrorCode;
pub use queue::DiagnosticQueue;
