//! DataAllocation: open scopes, declare symbols and decide where each one
//! lives.
//!
//! - class-level variables and `static` locals get a slot in the global
//!   data of the instance
//! - `const` scalars with a constant initializer become constants and get
//!   no storage at all
//! - other locals are left to register allocation
//!
//! Function definitions are registered here as well: free functions under
//! their name, member functions with their struct.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    CodeLocation, FunctionDecl, FunctionDef, FunctionId, FunctionKind, NamespacedIdentifier, NodeId,
    NodeKind, ScopeId, StorageClass, Symbol, TypeFlags, TypeInfo, Value, VariableDef,
};
use tine_parse::evaluate_constant;
use tine_stack::ensure_sufficient_stack;
use tracing::trace;

use crate::functions::FunctionData;
use crate::scope::ScopeKind;
use crate::symbols::{Storage, SymbolEntry};
use crate::Unit;

pub(crate) fn run(unit: &mut Unit, root: NodeId, scope: ScopeId) -> Result<(), CompileError> {
    if let NodeKind::Block(block) = unit.fe.ast.kind_mut(root) {
        block.scope.get_or_insert(scope);
    }
    let mut allocator = Allocator { unit };
    allocator.visit(root, scope)
}

struct Allocator<'u> {
    unit: &'u mut Unit,
}

impl Allocator<'_> {
    fn visit(&mut self, node: NodeId, scope: ScopeId) -> Result<(), CompileError> {
        ensure_sufficient_stack(|| self.visit_inner(node, scope))
    }

    fn visit_inner(&mut self, node: NodeId, scope: ScopeId) -> Result<(), CompileError> {
        match self.unit.fe.ast.kind(node) {
            NodeKind::Block(block) => {
                let stmts = block.stmts.clone();
                let inner = match block.scope {
                    Some(inner) => inner,
                    None => {
                        let inner = self.unit.scopes.push(ScopeKind::Block, Some(scope));
                        if let NodeKind::Block(block) = self.unit.fe.ast.kind_mut(node) {
                            block.scope = Some(inner);
                        }
                        inner
                    }
                };
                for stmt in stmts {
                    self.visit(stmt, inner)?;
                }
                Ok(())
            }
            NodeKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                let (then_branch, else_branch) = (*then_branch, *else_branch);
                self.visit(then_branch, scope)?;
                match else_branch {
                    Some(e) => self.visit(e, scope),
                    None => Ok(()),
                }
            }
            NodeKind::While { body, .. } => {
                let body = *body;
                self.visit(body, scope)
            }
            NodeKind::RangedFor(_) => self.ranged_for(node, scope),
            NodeKind::VariableDef(_) => self.variable(node, scope),
            NodeKind::FunctionDef(_) => self.function(node),
            NodeKind::ComplexTypeDef(def) => {
                for method in def.methods.clone() {
                    self.function(method)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn ranged_for(&mut self, node: NodeId, scope: ScopeId) -> Result<(), CompileError> {
        let NodeKind::RangedFor(f) = self.unit.fe.ast.kind(node) else {
            return Ok(());
        };
        if f.scope.is_some() {
            let (body, inner) = (f.body, f.scope.unwrap_or(scope));
            return self.visit(body, inner);
        }
        let (iterator, by_ref, body) = (f.iterator.clone(), f.by_ref, f.body);
        let inner = self.unit.scopes.push(ScopeKind::Block, Some(scope));
        let mut ty = iterator.ty;
        if by_ref {
            ty = ty.as_reference();
        }
        let name = iterator.id.id();
        let loc = self.unit.fe.ast.loc(node);
        let symbol = self.unit.symbols.push(SymbolEntry {
            symbol: Symbol::variable(iterator.id, ty),
            scope: inner,
            storage: Storage::Local,
            visible: true,
            loc,
        });
        self.unit.scopes.declare(inner, name, symbol);
        if let NodeKind::RangedFor(f) = self.unit.fe.ast.kind_mut(node) {
            f.scope = Some(inner);
            f.resolved = Some(symbol);
        }
        self.visit(body, inner)
    }

    fn variable(&mut self, node: NodeId, scope: ScopeId) -> Result<(), CompileError> {
        let NodeKind::VariableDef(def) = self.unit.fe.ast.kind(node).clone() else {
            return Ok(());
        };
        if def.resolved.is_some() {
            return Ok(());
        }
        let loc = self.unit.fe.ast.loc(node);
        let name = def.symbol.id.key(&mut self.unit.fe.interner);
        let text = self.unit.fe.interner.lookup(name).to_string();
        let (is_global, func) = self
            .unit
            .scopes
            .get(scope)
            .map_or((false, None), |s| (s.kind == ScopeKind::Global, s.function));
        // Class-level names carry their namespace; bodies inherit the
        // function's.
        let namespace = if is_global {
            def.symbol.id.parent().unwrap_or_default()
        } else {
            self.unit.namespace_of(func)
        };
        let mut ty = def.symbol.ty;

        let constant = if ty.is_const() && !ty.is_ref() {
            self.constant_value(&def, scope, &namespace)
        } else {
            None
        };
        if let (Some(value), true) = (constant, ty.is_unresolved()) {
            ty = TypeInfo::native(value.native_type()).with_flags(ty.flags);
            ty = ty.without_flags(TypeFlags::UNRESOLVED);
        }

        let storage = if let Some(value) = constant {
            Storage::Constant(value)
        } else if is_global || ty.is_static() {
            self.global_storage(&def, ty, &text, is_global, &namespace, loc)?
        } else {
            Storage::Local
        };

        let mut symbol = def.symbol.clone();
        symbol.ty = ty;
        if matches!(storage, Storage::Constant(_)) {
            symbol.storage = StorageClass::Constant;
        }
        let id = self.unit.symbols.push(SymbolEntry {
            symbol,
            scope,
            storage,
            visible: is_global,
            loc,
        });
        if self.unit.scopes.declare(scope, name, id).is_some() {
            return Err(CompileError::type_error(
                ErrorCode::E2006,
                format!("`{text}` is already declared in this scope"),
                loc,
            ));
        }
        trace!(name = %text, ?storage, "declared variable");
        if let NodeKind::VariableDef(def) = self.unit.fe.ast.kind_mut(node) {
            def.resolved = Some(id);
            def.symbol.ty = ty;
        }
        Ok(())
    }

    /// Value of a `const` scalar whose initializer is a constant expression.
    fn constant_value(
        &self,
        def: &VariableDef,
        scope: ScopeId,
        namespace: &NamespacedIdentifier,
    ) -> Option<Value> {
        let init = def.init?;
        let ty = def.symbol.ty;
        let target = if ty.is_unresolved() {
            None
        } else {
            Some(self.unit.fe.types.scalar(ty)?)
        };
        let unit = &*self.unit;
        let value = evaluate_constant(&unit.fe.ast, init, &|id| {
            let local = if id.is_plain() {
                unit.scopes
                    .ancestors(scope)
                    .take_while(|(_, s)| s.kind != ScopeKind::Global)
                    .find_map(|(_, s)| s.get(id.id()))
            } else {
                None
            };
            let symbol = local.or_else(|| unit.find_global(namespace, id))?;
            match unit.symbols.get(symbol).storage {
                Storage::Constant(v) => Some(v),
                _ => None,
            }
        })?;
        match target {
            Some(target) => value.cast(target),
            None => Some(value),
        }
    }

    /// Slot in the global data; `static` locals get their initial value
    /// written into the image.
    fn global_storage(
        &mut self,
        def: &VariableDef,
        ty: TypeInfo,
        name: &str,
        is_global: bool,
        namespace: &NamespacedIdentifier,
        loc: CodeLocation,
    ) -> Result<Storage, CompileError> {
        if ty.is_unresolved() {
            return Err(CompileError::type_error(
                ErrorCode::E2011,
                format!("cannot deduce the type of `{name}`; give it an explicit type"),
                loc,
            ));
        }
        if ty.is_ref() {
            return Err(CompileError::type_error(
                ErrorCode::E2012,
                format!("`{name}` cannot be a reference at this level"),
                loc,
            ));
        }
        let layout = self.unit.fe.types.layout(ty).map_err(|e| e.or_at(loc))?;
        let offset = self.unit.globals.allocate(layout, loc)?;
        if is_global {
            return Ok(Storage::Global { offset });
        }

        let types = &self.unit.fe.types;
        match types.scalar(ty) {
            Some(scalar) => {
                let value = match def.init {
                    None => Value::zero(scalar),
                    Some(init) => self
                        .constant_initializer(init, namespace)
                        .and_then(|v| v.cast(scalar)),
                };
                let Some(value) = value else {
                    return Err(CompileError::type_error(
                        ErrorCode::E2012,
                        format!("initializer of static `{name}` must be a constant"),
                        loc,
                    ));
                };
                self.unit.globals.push_static(offset, value);
            }
            None => {
                if def.init.is_some()
                    || def.ctor_args.is_some()
                    || !types.construction_calls(ty).is_empty()
                {
                    return Err(CompileError::type_error(
                        ErrorCode::E2012,
                        format!("static `{name}` can only be default initialised"),
                        loc,
                    ));
                }
                for (at, value) in types.default_initializer(ty) {
                    self.unit.globals.push_static(offset + at, value);
                }
            }
        }
        Ok(Storage::Global { offset })
    }

    fn constant_initializer(
        &self,
        init: NodeId,
        namespace: &NamespacedIdentifier,
    ) -> Option<Value> {
        let unit = &*self.unit;
        evaluate_constant(&unit.fe.ast, init, &|id| unit.constant(namespace, id))
    }

    fn function(&mut self, node: NodeId) -> Result<(), CompileError> {
        let NodeKind::FunctionDef(FunctionDef { decl, func }) = self.unit.fe.ast.kind(node).clone()
        else {
            return Ok(());
        };
        if func.is_some() {
            return Ok(());
        }
        let loc = decl.loc;
        let name = decl.id.display(&self.unit.fe.interner);
        if decl.ret.is_unresolved() || decl.params.iter().any(|p| p.ty.is_unresolved()) {
            return Err(CompileError::type_error(
                ErrorCode::E2011,
                format!("`auto` is not allowed in the signature of `{name}`"),
                loc,
            ));
        }
        if decl.ret.complex_id().is_some() && self.unit.fe.types.scalar(decl.ret).is_none() {
            return Err(CompileError::type_error(
                ErrorCode::E2012,
                format!("`{name}` cannot return a complex type by value"),
                loc,
            ));
        }
        let same = self.unit.functions.class(&decl.id).iter().copied().find(|other| {
            let other = self.unit.functions.get(*other);
            other.params.len() == decl.params.len()
                && other
                    .params
                    .iter()
                    .zip(&decl.params)
                    .all(|(a, b)| a.same_base(b.ty))
        });
        if let Some(existing) = same {
            return self.redeclare(node, existing, decl, &name);
        }

        let id = self.unit.functions.add(FunctionData::from_decl(decl.clone()));
        let owner = decl.owner;
        match (decl.kind, owner) {
            (FunctionKind::Method, Some(owner)) => {
                self.unit.fe.types.add_method(owner, decl.id.id(), id)?;
            }
            (FunctionKind::Constructor, Some(owner)) => {
                self.unit
                    .fe
                    .types
                    .add_constructor(owner, id, decl.params.is_empty())?;
            }
            (FunctionKind::Destructor, Some(owner)) => {
                self.unit
                    .fe
                    .types
                    .set_destructor(owner, id)
                    .map_err(|e| e.or_at(loc))?;
            }
            _ => self.function_symbol(&decl, loc)?,
        }
        trace!(%name, ?id, "registered function");
        if let NodeKind::FunctionDef(def) = self.unit.fe.ast.kind_mut(node) {
            def.func = Some(id);
        }
        Ok(())
    }

    /// A second declaration with the parameter types of `existing`: a
    /// prototype and its definition share one function, in either order.
    fn redeclare(
        &mut self,
        node: NodeId,
        existing: FunctionId,
        decl: FunctionDecl,
        name: &str,
    ) -> Result<(), CompileError> {
        let loc = decl.loc;
        let (defined, ret) = {
            let data = self.unit.functions.get(existing);
            (data.decl().is_none_or(|d| d.body.is_some()), data.ret)
        };
        if defined && decl.body.is_some() {
            return Err(CompileError::type_error(
                ErrorCode::E2006,
                format!("`{name}` is already defined with these parameter types"),
                loc,
            ));
        }
        if !ret.same_base(decl.ret) {
            return Err(CompileError::type_error(
                ErrorCode::E2006,
                format!("`{name}` is redeclared with a different return type"),
                loc,
            ));
        }
        if decl.body.is_some() {
            trace!(%name, ?existing, "defining declared function");
            *self.unit.functions.get_mut(existing) = FunctionData::from_decl(decl);
        }
        if let NodeKind::FunctionDef(def) = self.unit.fe.ast.kind_mut(node) {
            def.func = Some(existing);
        }
        Ok(())
    }

    /// One symbol per free function name, shared by its overloads.
    fn function_symbol(
        &mut self,
        decl: &FunctionDecl,
        loc: CodeLocation,
    ) -> Result<(), CompileError> {
        let root = self.unit.root_scope;
        let name = decl.id.key(&mut self.unit.fe.interner);
        if let Some(existing) = self.unit.scopes.get(root).and_then(|s| s.get(name)) {
            if self.unit.symbols.get(existing).storage == Storage::Function {
                return Ok(());
            }
            return Err(CompileError::type_error(
                ErrorCode::E2006,
                format!(
                    "`{}` is already declared as a variable",
                    self.unit.fe.interner.lookup(name)
                ),
                loc,
            ));
        }
        let symbol = Symbol {
            id: decl.id.clone(),
            ty: decl.ret,
            storage: StorageClass::Function,
        };
        let id = self.unit.symbols.push(SymbolEntry {
            symbol,
            scope: root,
            storage: Storage::Function,
            visible: true,
            loc,
        });
        self.unit.scopes.declare(root, name, id);
        Ok(())
    }
}
