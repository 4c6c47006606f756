//! Drives the back passes over an analysed unit and packages the result.
//!
//! Every user function goes through FunctionCompilation, which nests
//! RegisterAllocation (frame planning) and CodeGeneration (emission). The
//! function's scopes are released right after, so a large unit never holds
//! more than one function's scope tree. `__init` and `__destroy` are
//! generated last, from the class-level declarations of the root block.

use tine_diagnostic::CompileError;
use tine_ir::{FunctionKind, NativeType, NodeId};
use tine_sema::{FunctionBody, Pass, Storage, Unit};
use tracing::debug;

use crate::artifact::{Artifact, Body, Export, GlobalVariable};
use crate::emit;
use crate::frame::{self, FramePlan};
use crate::pool::RegisterPool;

/// Compile an analysed unit whose root block is `root`.
#[tracing::instrument(level = "debug", skip_all)]
pub fn compile(unit: &mut Unit, root: NodeId) -> Result<Artifact, CompileError> {
    let mut pool = RegisterPool::new();
    let mut functions = Vec::with_capacity(unit.functions.len());
    let mut stats = Vec::new();

    let ids: Vec<_> = unit.functions.ids().collect();
    for func in ids {
        let data = unit.functions.get(func);
        let native = match data.body {
            FunctionBody::Native(native) => Some(native),
            FunctionBody::Source { .. } => None,
        };
        let body = match (native, data.parsed()) {
            (Some(native), _) => Body::Native(native),
            (None, Some((node, scope))) => {
                let (code, function_stats) =
                    unit.with_pass(Pass::FunctionCompilation, |unit| {
                        let plan = unit.with_pass(Pass::RegisterAllocation, |unit| {
                            frame::plan(unit, Some(func), node, Some(scope))
                        })?;
                        unit.with_pass(Pass::CodeGeneration, |unit| {
                            emit::function(unit, &mut pool, &plan, func, node)
                        })
                    })?;
                unit.release_function_scopes(scope);
                stats.push(function_stats);
                Body::Code(code)
            }
            // Declared without a body.
            (None, None) => Body::Undefined(data.id.display(&unit.fe.interner)),
        };
        functions.push(body);
    }

    let (init, init_stats) = unit.with_pass(Pass::FunctionCompilation, |unit| {
        let plan = unit.with_pass(Pass::RegisterAllocation, |unit| {
            frame::plan(unit, None, root, None)
        })?;
        unit.with_pass(Pass::CodeGeneration, |unit| {
            emit::initializer(unit, &mut pool, &plan, root)
        })
    })?;
    stats.push(init_stats);
    let (destroy, destroy_stats) = unit.with_pass(Pass::CodeGeneration, |unit| {
        emit::finalizer(unit, &mut pool, &FramePlan::default(), root)
    })?;
    stats.push(destroy_stats);

    let artifact = Artifact {
        exports: exports(unit, &functions),
        variables: variables(unit)?,
        functions,
        init,
        destroy,
        globals_size: unit.globals.size(),
        statics: unit.globals.statics().to_vec(),
        lines: unit.diagnostics.line_index().clone(),
        stats,
    };
    debug!(
        functions = artifact.functions.len(),
        exports = artifact.exports.len(),
        globals = artifact.globals_size,
        "compiled unit"
    );
    Ok(artifact)
}

/// Free, non-template user functions with a body.
fn exports(unit: &Unit, functions: &[Body]) -> Vec<Export> {
    let types = &unit.fe.types;
    unit.functions
        .ids()
        .filter_map(|func| {
            let data = unit.functions.get(func);
            let defined = matches!(functions.get(func.index()), Some(Body::Code(_)));
            if !defined
                || data.kind != FunctionKind::Free
                || data.owner.is_some()
                || data.instance_of.is_some()
            {
                return None;
            }
            let params = data
                .params
                .iter()
                .map(|&p| {
                    if p.is_ref() {
                        NativeType::Pointer
                    } else {
                        types.scalar(p).unwrap_or(NativeType::Pointer)
                    }
                })
                .collect();
            let ret = types.scalar(data.ret);
            Some(Export {
                name: data.id.display(&unit.fe.interner),
                func,
                params,
                ret,
            })
        })
        .collect()
}

/// Unit-level variables, in declaration order.
fn variables(unit: &Unit) -> Result<Vec<GlobalVariable>, CompileError> {
    let Some(scope) = unit.scopes.get(unit.root_scope) else {
        return Ok(Vec::new());
    };
    let mut variables = Vec::new();
    for &symbol in scope.symbols() {
        let entry = unit.symbols.get(symbol);
        let Storage::Global { offset } = entry.storage else {
            continue;
        };
        let ty = entry.ty();
        variables.push(GlobalVariable {
            name: entry.symbol.id.display(&unit.fe.interner),
            ty: unit.fe.types.display(ty, &unit.fe.interner),
            scalar: unit.fe.types.scalar(ty),
            offset,
            size: unit.fe.types.layout(ty.base())?.size,
        });
    }
    Ok(variables)
}
