//! The fatal error taxonomy.

use std::fmt;

use thiserror::Error;
use tine_ir::CodeLocation;

use crate::{Diagnostic, ErrorCode};

/// Error category. Every category aborts the current compile; `Runtime`
/// only ever comes out of executing compiled code.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorKind {
    Syntax,
    Type,
    Layout,
    DeadCode,
    Runtime,
    Aborted,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Layout => "LayoutError",
            ErrorKind::DeadCode => "DeadCodeError",
            ErrorKind::Runtime => "RuntimeError",
            ErrorKind::Aborted => "Aborted",
            ErrorKind::Internal => "InternalError",
        })
    }
}

/// A fatal compile (or runtime) error with its location.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("{kind}: {message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
    pub loc: CodeLocation,
}

impl CompileError {
    pub fn new(
        kind: ErrorKind,
        code: ErrorCode,
        message: impl Into<String>,
        loc: CodeLocation,
    ) -> Self {
        CompileError {
            kind,
            code,
            message: message.into(),
            loc,
        }
    }

    pub fn syntax(code: ErrorCode, message: impl Into<String>, loc: CodeLocation) -> Self {
        Self::new(ErrorKind::Syntax, code, message, loc)
    }

    pub fn type_error(code: ErrorCode, message: impl Into<String>, loc: CodeLocation) -> Self {
        Self::new(ErrorKind::Type, code, message, loc)
    }

    pub fn layout(code: ErrorCode, message: impl Into<String>, loc: CodeLocation) -> Self {
        Self::new(ErrorKind::Layout, code, message, loc)
    }

    pub fn dead_code(message: impl Into<String>, loc: CodeLocation) -> Self {
        Self::new(ErrorKind::DeadCode, ErrorCode::E4001, message, loc)
    }

    pub fn runtime(code: ErrorCode, message: impl Into<String>, loc: CodeLocation) -> Self {
        Self::new(ErrorKind::Runtime, code, message, loc)
    }

    pub fn aborted() -> Self {
        Self::new(
            ErrorKind::Aborted,
            ErrorCode::E9002,
            "compilation aborted",
            CodeLocation::SYNTHETIC,
        )
    }

    pub fn internal(message: impl Into<String>, loc: CodeLocation) -> Self {
        Self::new(ErrorKind::Internal, ErrorCode::E9001, message, loc)
    }

    /// Attach a location if the error has none yet.
    #[must_use]
    pub fn or_at(mut self, loc: CodeLocation) -> Self {
        if self.loc.is_synthetic() {
            self.loc = loc;
        }
        self
    }

    /// The error as an `Error` diagnostic; the line is resolved on push.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code)
            .with_message(format!("{}: {}", self.kind, self.message))
            .at(self.loc)
    }
}

#[cfg(test)]
mod tests;
