//! Helpers shared by the crate's tests.

use std::sync::Arc;

use tine_diagnostic::DiagnosticQueue;
use tine_ir::{FunctionId, IndexPolicy, NodeId};
use tine_lexer::SourceMap;
use tine_parse::Frontend;
use tine_sema::{builtin_optimizations, Unit};

use crate::{compile, Artifact, Instance};

fn unit(src: &str, optimize: bool, debug: bool) -> Unit {
    let mut fe = Frontend::new(src, SourceMap::identity(src.len() as u32));
    fe.register_index_type("index::wrapped", IndexPolicy::Wrapped);
    fe.register_index_type("index::clamped", IndexPolicy::Clamped);
    fe.register_index_type("index::unsafe", IndexPolicy::Unchecked);
    let unit = Unit::new(fe, DiagnosticQueue::new(src)).with_debug(debug);
    if optimize {
        unit.with_optimizations(builtin_optimizations())
    } else {
        unit
    }
}

/// An analysed, unoptimized unit and its root block.
pub(crate) fn analysed(src: &str) -> (Unit, NodeId) {
    let mut unit = unit(src, false, false);
    match unit.analyse() {
        Ok(root) => (unit, root),
        Err(e) => panic!("analysis of {src:?} failed: {e:?}"),
    }
}

fn build(src: &str, optimize: bool, debug: bool) -> Artifact {
    let mut unit = unit(src, optimize, debug);
    let root = unit
        .analyse()
        .unwrap_or_else(|e| panic!("analysis of {src:?} failed: {e:?}"));
    compile(&mut unit, root).unwrap_or_else(|e| panic!("compiling {src:?} failed: {e:?}"))
}

pub(crate) fn compiled(src: &str) -> Artifact {
    build(src, false, false)
}

pub(crate) fn compiled_optimized(src: &str) -> Artifact {
    build(src, true, false)
}

pub(crate) fn compiled_debug(src: &str) -> Artifact {
    build(src, false, true)
}

pub(crate) fn instance(src: &str) -> Instance {
    Instance::new(Arc::new(compiled(src)))
        .unwrap_or_else(|e| panic!("initializing {src:?} failed: {e:?}"))
}

/// The function whose displayed name is `name` (`f`, `S::get`).
pub(crate) fn function(unit: &Unit, name: &str) -> FunctionId {
    unit.functions
        .ids()
        .find(|f| unit.functions.get(*f).id.display(&unit.fe.interner) == name)
        .unwrap_or_else(|| panic!("no function `{name}`"))
}
