//! Pass ordering and re-entry.
//!
//! Passes always run in [`Pass`] order. A pass may start a nested run of
//! earlier passes over a sub-tree (an inlined body, a struct instance
//! created while parsing a function); the [`PassManager`] keeps those runs
//! on a stack so the enclosing pass resumes undisturbed.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tine_diagnostic::CompileError;
use tracing::trace;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Pass {
    Parsing,
    ComplexTypeParsing,
    PreSymbolOptimization,
    DataAllocation,
    DataInitialisation,
    ResolvingSymbols,
    TypeCheck,
    PostSymbolOptimization,
    FunctionTemplateParsing,
    FunctionParsing,
    FunctionCompilation,
    RegisterAllocation,
    CodeGeneration,
}

impl Pass {
    /// Passes every parsed tree goes through before code generation.
    pub const FRONT: [Pass; 7] = [
        Pass::ComplexTypeParsing,
        Pass::PreSymbolOptimization,
        Pass::DataAllocation,
        Pass::DataInitialisation,
        Pass::ResolvingSymbols,
        Pass::TypeCheck,
        Pass::PostSymbolOptimization,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Pass::Parsing => "Parsing",
            Pass::ComplexTypeParsing => "ComplexTypeParsing",
            Pass::PreSymbolOptimization => "PreSymbolOptimization",
            Pass::DataAllocation => "DataAllocation",
            Pass::DataInitialisation => "DataInitialisation",
            Pass::ResolvingSymbols => "ResolvingSymbols",
            Pass::TypeCheck => "TypeCheck",
            Pass::PostSymbolOptimization => "PostSymbolOptimization",
            Pass::FunctionTemplateParsing => "FunctionTemplateParsing",
            Pass::FunctionParsing => "FunctionParsing",
            Pass::FunctionCompilation => "FunctionCompilation",
            Pass::RegisterAllocation => "RegisterAllocation",
            Pass::CodeGeneration => "CodeGeneration",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cancellation flag shared between the host and a compile.
///
/// Polled only when a pass starts; a running pass always finishes.
#[derive(Clone, Debug, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        AbortFlag::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Stack of running passes.
#[derive(Debug, Default)]
pub struct PassManager {
    stack: Vec<Pass>,
    abort: AbortFlag,
    started: usize,
}

impl PassManager {
    pub fn new(abort: AbortFlag) -> Self {
        PassManager {
            stack: Vec::new(),
            abort,
            started: 0,
        }
    }

    /// Start `pass` on top of the running ones.
    pub fn enter(&mut self, pass: Pass) -> Result<(), CompileError> {
        if self.abort.is_aborted() {
            return Err(CompileError::aborted());
        }
        trace!(%pass, depth = self.stack.len(), "enter pass");
        self.stack.push(pass);
        self.started += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.stack.pop();
    }

    /// Innermost running pass.
    pub fn current(&self) -> Option<Pass> {
        self.stack.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of pass runs started so far, nested runs included.
    pub fn started(&self) -> usize {
        self.started
    }

    pub fn abort_flag(&self) -> &AbortFlag {
        &self.abort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_runs_restore_the_enclosing_pass() {
        let mut passes = PassManager::default();
        passes.enter(Pass::PostSymbolOptimization).unwrap();
        passes.enter(Pass::ResolvingSymbols).unwrap();
        assert_eq!(passes.current(), Some(Pass::ResolvingSymbols));
        passes.leave();
        assert_eq!(passes.current(), Some(Pass::PostSymbolOptimization));
        assert_eq!(passes.started(), 2);
    }

    #[test]
    fn abort_is_seen_at_the_next_pass() {
        let flag = AbortFlag::new();
        let mut passes = PassManager::new(flag.clone());
        passes.enter(Pass::Parsing).unwrap();
        flag.abort();
        let err = passes.enter(Pass::ComplexTypeParsing).unwrap_err();
        assert_eq!(err, CompileError::aborted());
        assert_eq!(passes.depth(), 1);
    }

    #[test]
    fn passes_are_ordered() {
        assert!(Pass::Parsing < Pass::TypeCheck);
        assert!(Pass::FRONT.windows(2).all(|w| w[0] < w[1]));
        assert!(Pass::RegisterAllocation < Pass::CodeGeneration);
    }
}
