//! Per-compile configuration.

use std::fmt;
use std::sync::Arc;

use tine_sema::{optimize::builtin_ids, AbortFlag, HostLibrary};

use crate::library::default_libraries;

/// What a [`Session`](crate::Session) compiles with.
///
/// The default enables every builtin optimization and registers the
/// builtin `Math` and `index` libraries.
#[derive(Clone)]
pub struct CompileOptions {
    /// Optimization ids in any order; unknown ids are warned about and skipped.
    pub optimizations: Vec<String>,
    /// Emit statement hooks and report optimization notes.
    pub debug: bool,
    /// `(name, body)` pairs seen as `#define name body` before the source.
    pub definitions: Vec<(String, String)>,
    pub abort: Option<AbortFlag>,
    pub libraries: Vec<Arc<dyn HostLibrary>>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            optimizations: builtin_ids().into_iter().map(String::from).collect(),
            debug: false,
            definitions: Vec::new(),
            abort: None,
            libraries: default_libraries(),
        }
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let libraries: Vec<&str> = self.libraries.iter().map(|l| l.name()).collect();
        f.debug_struct("CompileOptions")
            .field("optimizations", &self.optimizations)
            .field("debug", &self.debug)
            .field("definitions", &self.definitions)
            .field("abort", &self.abort.is_some())
            .field("libraries", &libraries)
            .finish()
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        CompileOptions::default()
    }

    #[must_use]
    pub fn with_optimizations<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optimizations = ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn without_optimizations(mut self) -> Self {
        self.optimizations.clear();
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn define(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.definitions.push((name.into(), body.into()));
        self
    }

    #[must_use]
    pub fn with_abort(mut self, abort: AbortFlag) -> Self {
        self.abort = Some(abort);
        self
    }

    #[must_use]
    pub fn with_library(mut self, library: Arc<dyn HostLibrary>) -> Self {
        self.libraries.push(library);
        self
    }

    /// Drop every host library, the builtin ones included.
    #[must_use]
    pub fn without_libraries(mut self) -> Self {
        self.libraries.clear();
        self
    }
}
