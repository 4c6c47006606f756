//! Ordered diagnostic stream.
//!
//! Diagnostics are kept in push order, which is pass-execution order.
//! Lines are resolved against the *original* source at push time so that
//! messages about macro-expanded code still point at the macro's line.

use tine_ir::LineIndex;

use crate::{CompileError, Diagnostic, Severity};

#[derive(Clone, Debug, Default)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    lines: LineIndex,
    error_count: usize,
}

impl DiagnosticQueue {
    /// Create a queue resolving lines against `original_source`.
    pub fn new(original_source: &str) -> Self {
        DiagnosticQueue {
            diagnostics: Vec::new(),
            lines: LineIndex::new(original_source),
            error_count: 0,
        }
    }

    pub fn push(&mut self, mut diag: Diagnostic) {
        if diag.line == 0 {
            diag.line = self.lines.line(diag.loc);
        }
        if diag.severity == Severity::Error {
            self.error_count += 1;
        }
        self.diagnostics.push(diag);
    }

    pub fn push_error(&mut self, err: &CompileError) {
        self.push(err.to_diagnostic());
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.lines
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests;
