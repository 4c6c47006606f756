//! One entry of the diagnostic stream.

use std::fmt;

use tine_ir::CodeLocation;

use crate::ErrorCode;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A `(severity, line, message)` triple plus its code and raw location.
///
/// `line` is filled in by the [`DiagnosticQueue`](crate::DiagnosticQueue)
/// from the original source when the diagnostic is pushed.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<ErrorCode>,
    pub message: String,
    pub loc: CodeLocation,
    pub line: u32,
}

impl Diagnostic {
    pub fn error(code: ErrorCode) -> Self {
        Diagnostic::new(Severity::Error, Some(code))
    }

    pub fn warning(code: ErrorCode) -> Self {
        Diagnostic::new(Severity::Warning, Some(code))
    }

    pub fn info() -> Self {
        Diagnostic::new(Severity::Info, None)
    }

    fn new(severity: Severity, code: Option<ErrorCode>) -> Self {
        Diagnostic {
            severity,
            code,
            message: String::new(),
            loc: CodeLocation::SYNTHETIC,
            line: 0,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn at(mut self, loc: CodeLocation) -> Self {
        self.loc = loc;
        self
    }

    #[must_use]
    pub fn on_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}[{code}]", self.severity)?,
            None => write!(f, "{}", self.severity)?,
        }
        if self.line > 0 {
            write!(f, " line {}", self.line)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests;
