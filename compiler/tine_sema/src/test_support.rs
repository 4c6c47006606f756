//! Helpers shared by the crate's tests.

use tine_diagnostic::{CompileError, DiagnosticQueue};
use tine_ir::{ComplexInit, FunctionId, NodeId, NodeKind, SymbolId};
use tine_lexer::SourceMap;
use tine_parse::Frontend;

use crate::{builtin_optimizations, Unit};

/// A unit over `src` without optimizations.
pub(crate) fn plain_unit(src: &str) -> Unit {
    let fe = Frontend::new(src, SourceMap::identity(src.len() as u32));
    Unit::new(fe, DiagnosticQueue::new(src))
}

/// A unit over `src` with every builtin optimization enabled.
pub(crate) fn unit(src: &str) -> Unit {
    plain_unit(src).with_optimizations(builtin_optimizations())
}

pub(crate) fn analysed(src: &str) -> Unit {
    let mut unit = unit(src);
    if let Err(e) = unit.analyse() {
        panic!("analysis of {src:?} failed: {e:?}");
    }
    unit
}

pub(crate) fn analysed_plain(src: &str) -> Unit {
    let mut unit = plain_unit(src);
    if let Err(e) = unit.analyse() {
        panic!("analysis of {src:?} failed: {e:?}");
    }
    unit
}

pub(crate) fn analysis_error(src: &str) -> CompileError {
    match unit(src).analyse() {
        Ok(_) => panic!("analysis of {src:?} should fail"),
        Err(e) => e,
    }
}

/// The function whose displayed name is `name` (`f`, `S::get`).
pub(crate) fn function(unit: &Unit, name: &str) -> FunctionId {
    unit.functions
        .ids()
        .find(|f| unit.functions.get(*f).id.display(&unit.fe.interner) == name)
        .unwrap_or_else(|| panic!("no function `{name}`"))
}

/// Statements of a function's parsed body.
pub(crate) fn body(unit: &Unit, name: &str) -> Vec<NodeId> {
    let (node, _) = unit
        .functions
        .get(function(unit, name))
        .parsed()
        .unwrap_or_else(|| panic!("`{name}` has no body"));
    match unit.fe.ast.kind(node) {
        NodeKind::Block(block) => block.stmts.clone(),
        other => panic!("body is not a block: {other:?}"),
    }
}

/// Value of the `return` statement at `index` in `name`'s body.
pub(crate) fn returned(unit: &Unit, name: &str, index: usize) -> NodeId {
    match unit.fe.ast.kind(body(unit, name)[index]) {
        NodeKind::Return {
            value: Some(value), ..
        } => *value,
        other => panic!("expected a return with a value, got {other:?}"),
    }
}

pub(crate) fn global(unit: &Unit, name: &str) -> SymbolId {
    let name = unit.fe.interner.get(name).unwrap_or_else(|| panic!("`{name}` never interned"));
    unit.scopes
        .get(unit.root_scope)
        .and_then(|s| s.get(name))
        .unwrap_or_else(|| panic!("no global `{name:?}`"))
}

/// The first complex initializer in the tree.
pub(crate) fn complex_init(unit: &Unit) -> ComplexInit {
    (0..unit.fe.ast.len())
        .map(NodeId::from_usize)
        .find_map(|id| match unit.fe.ast.kind(id) {
            NodeKind::ComplexInit(init) => Some(init.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no complex initializer"))
}
