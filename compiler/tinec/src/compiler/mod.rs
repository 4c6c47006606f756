//! Compile sessions.
//!
//! A [`Session`] runs the whole pipeline for one source text:
//!
//! 1. preprocess with the session's external definitions
//! 2. register host libraries on a fresh frontend
//! 3. [`Unit::analyse`]: parsing and the front passes
//! 4. [`tine_codegen::compile`]: register allocation, code generation
//!
//! The first error stops the pipeline. It is appended after whatever
//! warnings and notes were already reported, and no artifact is produced.

use std::sync::Arc;

use tine_codegen::Artifact;
use tine_diagnostic::{CompileError, Diagnostic, DiagnosticQueue};
use tine_lexer::{Preprocessed, Preprocessor};
use tine_parse::Frontend;
use tine_sema::{register_libraries, select_optimizations, Unit};
use tracing::debug;

use crate::CompileOptions;

/// Outcome of [`Session::compile`].
#[derive(Debug)]
pub struct CompileResult {
    pub compiled_ok: bool,
    /// Every diagnostic in pass-execution order.
    pub diagnostics: Vec<Diagnostic>,
    /// Shared so that any number of instances can run it.
    pub artifact: Option<Arc<Artifact>>,
}

impl CompileResult {
    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        CompileResult {
            compiled_ok: false,
            diagnostics,
            artifact: None,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.errors().next()
    }

    /// Diagnostics one per line, as the CLI prints them.
    pub fn report(&self) -> String {
        let lines: Vec<String> = self.diagnostics.iter().map(ToString::to_string).collect();
        lines.join("\n")
    }
}

/// Compiles source text with a fixed set of options.
#[derive(Clone, Debug, Default)]
pub struct Session {
    options: CompileOptions,
}

impl Session {
    pub fn new(options: CompileOptions) -> Self {
        Session { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    fn preprocessor(&self) -> Preprocessor {
        let mut pre = Preprocessor::new();
        for (name, body) in &self.options.definitions {
            pre.add_external_definition(name.clone(), body.clone());
        }
        pre
    }

    /// Only the preprocessing step; used by `tine preprocess`.
    pub fn preprocess(&self, source: &str) -> Result<Preprocessed, CompileError> {
        self.preprocessor().process(source)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
    pub fn compile(&self, source: &str) -> CompileResult {
        let mut diagnostics = DiagnosticQueue::new(source);

        let processed = match self.preprocess(source) {
            Ok(processed) => processed,
            Err(e) => {
                diagnostics.push_error(&e);
                return CompileResult::failed(diagnostics.into_vec());
            }
        };
        for warning in processed.warnings {
            diagnostics.push(warning);
        }

        let optimizations = select_optimizations(&self.options.optimizations, &mut diagnostics);
        debug!(
            optimizations = optimizations.len(),
            libraries = self.options.libraries.len(),
            "starting compile"
        );

        let fe = Frontend::new(processed.text, processed.map);
        let mut unit = Unit::new(fe, diagnostics)
            .with_optimizations(optimizations)
            .with_debug(self.options.debug);
        if let Some(abort) = &self.options.abort {
            unit = unit.with_abort(abort.clone());
        }
        register_libraries(&mut unit.fe, &mut unit.functions, &self.options.libraries);

        let artifact = unit
            .analyse()
            .and_then(|root| tine_codegen::compile(&mut unit, root));
        match artifact {
            Ok(artifact) => {
                debug!(exports = artifact.exports().len(), "compile finished");
                CompileResult {
                    compiled_ok: true,
                    diagnostics: unit.diagnostics.into_vec(),
                    artifact: Some(Arc::new(artifact)),
                }
            }
            Err(e) => {
                debug!(error = %e, "compile failed");
                unit.diagnostics.push_error(&e);
                CompileResult::failed(unit.diagnostics.into_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests;
