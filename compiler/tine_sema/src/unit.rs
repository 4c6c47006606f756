//! Per-compile semantic state.

use std::sync::Arc;

use tine_diagnostic::{CompileError, Diagnostic, DiagnosticQueue, ErrorCode};
use tine_ir::{
    Block, CodeLocation, ComplexTypeId, FunctionId, Name, NamespacedIdentifier, NodeId,
    NodeKind, ScopeId, Symbol, SymbolId, TypeInfo, Value,
};
use tine_parse::{parse_body, parse_unit, Frontend};
use tine_types::Layout;
use tracing::{debug, info};

use crate::functions::{FunctionBody, FunctionData, FunctionRegistry};
use crate::optimize::{Optimization, Phase};
use crate::pass::{AbortFlag, Pass, PassManager};
use crate::passes;
use crate::scope::{ScopeArena, ScopeKind};
use crate::symbols::{Storage, SymbolEntry, SymbolTable};

/// What the tree being processed belongs to.
#[derive(Copy, Clone, Debug)]
pub struct FunctionContext {
    /// `None` for the class level.
    pub func: Option<FunctionId>,
    /// Struct whose members are in scope (`this`).
    pub owner: Option<ComplexTypeId>,
    /// Type `return` statements must produce.
    pub ret: TypeInfo,
}

impl FunctionContext {
    pub fn root() -> Self {
        FunctionContext {
            func: None,
            owner: None,
            ret: TypeInfo::void(),
        }
    }

    pub fn of(id: FunctionId, data: &FunctionData) -> Self {
        FunctionContext {
            func: Some(id),
            owner: data.owner,
            ret: data.ret,
        }
    }
}

/// Layout of the instance's global data: unit globals and `static` locals.
#[derive(Clone, Debug, Default)]
pub struct GlobalData {
    size: u32,
    alignment: u32,
    /// Constant initial values written into a fresh image.
    statics: Vec<(u32, Value)>,
}

impl GlobalData {
    /// Reserve space for a value; fails once the data outgrows
    /// [`tine_types::MAX_SIZE`].
    pub fn allocate(&mut self, layout: Layout, loc: CodeLocation) -> Result<u32, CompileError> {
        let (offset, end) = layout.place(self.size).ok_or_else(|| {
            CompileError::layout(ErrorCode::E3005, "global data is too large", loc)
        })?;
        self.size = end;
        self.alignment = self.alignment.max(layout.alignment);
        Ok(offset)
    }

    pub fn push_static(&mut self, offset: u32, value: Value) {
        self.statics.push((offset, value));
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn alignment(&self) -> u32 {
        self.alignment.max(1)
    }

    pub fn statics(&self) -> &[(u32, Value)] {
        &self.statics
    }
}

/// Everything one compile knows after parsing: the frontend arenas plus
/// scopes, symbols and functions.
pub struct Unit {
    pub fe: Frontend,
    pub functions: FunctionRegistry,
    pub scopes: ScopeArena,
    pub symbols: SymbolTable,
    pub diagnostics: DiagnosticQueue,
    pub passes: PassManager,
    pub root_scope: ScopeId,
    pub globals: GlobalData,
    pub debug: bool,
    optimizations: Vec<Arc<dyn Optimization>>,
    /// Functions whose bodies are being inlined, innermost last.
    pub(crate) inline_stack: Vec<FunctionId>,
    /// Scopes of inlined bodies, released with the enclosing function.
    detached_scopes: Vec<ScopeId>,
}

impl Unit {
    pub fn new(fe: Frontend, diagnostics: DiagnosticQueue) -> Self {
        let mut scopes = ScopeArena::new();
        let root_scope = scopes.push(ScopeKind::Global, None);
        Unit {
            fe,
            functions: FunctionRegistry::new(),
            scopes,
            symbols: SymbolTable::new(),
            diagnostics,
            passes: PassManager::default(),
            root_scope,
            globals: GlobalData::default(),
            debug: false,
            optimizations: Vec::new(),
            inline_stack: Vec::new(),
            detached_scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_abort(mut self, abort: AbortFlag) -> Self {
        self.passes = PassManager::new(abort);
        self
    }

    #[must_use]
    pub fn with_optimizations(mut self, optimizations: Vec<Arc<dyn Optimization>>) -> Self {
        self.optimizations = optimizations;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn optimizations(&self) -> &[Arc<dyn Optimization>] {
        &self.optimizations
    }

    /// Run `f` as `pass`, on top of whatever pass is running.
    pub fn with_pass<R>(
        &mut self,
        pass: Pass,
        f: impl FnOnce(&mut Self) -> Result<R, CompileError>,
    ) -> Result<R, CompileError> {
        self.passes.enter(pass)?;
        let result = f(self);
        self.passes.leave();
        result
    }

    /// Namespace the body of `func` is written in; the root for the class
    /// level.
    pub fn namespace_of(&self, func: Option<FunctionId>) -> NamespacedIdentifier {
        func.and_then(|f| self.functions.get(f).id.parent()).unwrap_or_default()
    }

    /// Global-scope keys `id` may stand for inside `namespace`, innermost
    /// namespace first.
    fn global_keys<'a>(
        &'a self,
        namespace: &'a NamespacedIdentifier,
        id: &'a NamespacedIdentifier,
    ) -> impl Iterator<Item = Name> + 'a {
        namespace
            .ancestors()
            .filter_map(move |ns| ns.join(id).find_key(&self.fe.interner))
    }

    /// The visible global or function symbol `id` names inside `namespace`.
    pub fn find_global(
        &self,
        namespace: &NamespacedIdentifier,
        id: &NamespacedIdentifier,
    ) -> Option<SymbolId> {
        let global = self.scopes.get(self.root_scope)?;
        self.global_keys(namespace, id)
            .find_map(|key| global.get(key).filter(|s| self.symbols.get(*s).visible))
    }

    /// Parse-time value of the constant `id` names inside `namespace`.
    pub fn constant(
        &self,
        namespace: &NamespacedIdentifier,
        id: &NamespacedIdentifier,
    ) -> Option<Value> {
        self.global_keys(namespace, id)
            .find_map(|key| self.fe.constants.get(&key).copied())
    }

    pub fn warn(&mut self, code: ErrorCode, message: impl Into<String>, loc: CodeLocation) {
        self.diagnostics
            .push(Diagnostic::warning(code).with_message(message).at(loc));
    }

    /// Optimization log entry; only reported in debug mode.
    pub fn note(&mut self, message: impl Into<String>, loc: CodeLocation) {
        let message = message.into();
        debug!(%message, "optimization");
        if self.debug {
            self.diagnostics
                .push(Diagnostic::info().with_message(message).at(loc));
        }
    }

    /// Open the scope of a function body and declare its parameters.
    pub fn open_function_scope(&mut self, func: FunctionId) -> Result<ScopeId, CompileError> {
        let data = self.functions.get(func);
        let owner = data.owner;
        let loc = data.loc;
        let params: Vec<_> = data
            .param_names
            .iter()
            .copied()
            .zip(data.params.iter().copied())
            .collect();
        let scope = self.scopes.push_function(self.root_scope, func, owner);
        for (index, (name, ty)) in params.into_iter().enumerate() {
            let entry = SymbolEntry {
                symbol: Symbol::variable(NamespacedIdentifier::new(name), ty),
                scope,
                storage: Storage::Param {
                    index: index as u16,
                },
                visible: true,
                loc,
            };
            let id = self.symbols.push(entry);
            if self.scopes.declare(scope, name, id).is_some() {
                return Err(CompileError::type_error(
                    ErrorCode::E2006,
                    format!("duplicate parameter `{}`", self.fe.interner.lookup(name)),
                    loc,
                ));
            }
        }
        Ok(scope)
    }

    /// Open an isolated scope for an inlined body of `func`.
    pub(crate) fn open_detached_scope(&mut self, func: FunctionId) -> ScopeId {
        let scope = self.scopes.push_function(self.root_scope, func, None);
        self.detached_scopes.push(scope);
        scope
    }

    /// Release a compiled function's scopes, including inlined bodies.
    pub fn release_function_scopes(&mut self, scope: ScopeId) {
        self.scopes.release(scope);
        for detached in std::mem::take(&mut self.detached_scopes) {
            self.scopes.release(detached);
        }
    }

    /// Parse the unit and run the front passes over the class level and
    /// every function body, including functions that only appear along the
    /// way (template instances, methods of struct instances).
    ///
    /// Returns the root block; its statements are the class-level
    /// declarations, executed by `__init`.
    pub fn analyse(&mut self) -> Result<NodeId, CompileError> {
        let root = self.with_pass(Pass::Parsing, |unit| parse_unit(&mut unit.fe))?;
        self.run_front_passes(root, self.root_scope, FunctionContext::root())?;
        loop {
            self.struct_instances()?;
            let pending = self.functions.unparsed();
            if pending.is_empty() {
                break;
            }
            for func in pending {
                self.with_pass(Pass::FunctionParsing, |unit| unit.parse_function(func))?;
            }
        }
        Ok(root)
    }

    /// Struct template instances created while parsing function bodies go
    /// through the class-level passes before anything uses them.
    fn struct_instances(&mut self) -> Result<(), CompileError> {
        while !self.fe.instantiated.is_empty() {
            let stmts = std::mem::take(&mut self.fe.instantiated);
            let block = self.fe.ast.push(
                NodeKind::Block(Block {
                    stmts,
                    scope: Some(self.root_scope),
                }),
                CodeLocation::SYNTHETIC,
            );
            self.run_front_passes(block, self.root_scope, FunctionContext::root())?;
        }
        Ok(())
    }

    fn parse_function(&mut self, func: FunctionId) -> Result<(), CompileError> {
        let data = self.functions.get(func);
        let Some(decl) = data.decl().cloned() else {
            return Ok(());
        };
        let cx = FunctionContext::of(func, data);
        debug!(name = %decl.id.display(&self.fe.interner), "parsing function body");
        let scope = self.open_function_scope(func)?;
        let body = parse_body(&mut self.fe, &decl)?;
        if let FunctionBody::Source {
            node, scope: home, ..
        } = &mut self.functions.get_mut(func).body
        {
            *node = Some(body);
            *home = Some(scope);
        }
        self.struct_instances()?;
        self.run_front_passes(body, scope, cx)
    }

    /// Run the passes every tree goes through: ComplexTypeParsing up to
    /// PostSymbolOptimization.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub fn run_front_passes(
        &mut self,
        root: NodeId,
        scope: ScopeId,
        cx: FunctionContext,
    ) -> Result<(), CompileError> {
        for pass in Pass::FRONT {
            self.with_pass(pass, |unit| match pass {
                Pass::ComplexTypeParsing => passes::complex_types::run(unit, root),
                Pass::PreSymbolOptimization => unit.optimize(root, cx, Phase::PreSymbol),
                Pass::DataAllocation => passes::allocation::run(unit, root, scope),
                Pass::DataInitialisation => passes::initialisation::run(unit, root),
                Pass::ResolvingSymbols => passes::resolve::run(unit, root, scope, cx),
                Pass::TypeCheck => passes::typecheck::run(unit, root, cx),
                Pass::PostSymbolOptimization => unit.optimize(root, cx, Phase::PostSymbol),
                _ => Ok(()),
            })?;
        }
        Ok(())
    }

    fn optimize(
        &mut self,
        root: NodeId,
        cx: FunctionContext,
        phase: Phase,
    ) -> Result<(), CompileError> {
        let optimizations = self.optimizations.clone();
        for optimization in optimizations {
            let changed = optimization.run(self, root, cx, phase)?;
            if changed > 0 {
                info!(id = optimization.id(), changed, ?phase, "optimization applied");
            }
        }
        Ok(())
    }
}
