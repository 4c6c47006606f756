//! Lexical scopes.
//!
//! Scopes live in one arena per compile and are addressed by [`ScopeId`].
//! A scope's parent link is a plain id: it never keeps the parent alive,
//! and the arena is the only owner. Function and block scopes are released
//! once code generation has visited them; the global scope lives as long
//! as the unit, backing variable introspection on the compiled artifact.

use rustc_hash::FxHashMap;
use tine_ir::{ComplexTypeId, FunctionId, Name, ScopeId, SymbolId};

use crate::symbols::SymbolTable;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ScopeKind {
    /// The compiled unit's root aggregate: globals and functions.
    Global,
    /// Body of a struct's member functions (`this` is available).
    Class,
    /// A function body's outermost scope, holding the parameters.
    Function,
    Block,
}

#[derive(Clone, Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Function whose body this scope belongs to.
    pub function: Option<FunctionId>,
    /// Struct whose members are visible without `this.`.
    pub owner: Option<ComplexTypeId>,
    names: FxHashMap<Name, SymbolId>,
    symbols: Vec<SymbolId>,
}

impl Scope {
    /// Symbols in declaration order.
    pub fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }

    pub fn get(&self, name: Name) -> Option<SymbolId> {
        self.names.get(&name).copied()
    }
}

/// Arena of boxed scopes keyed by stable id.
#[derive(Clone, Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Option<Box<Scope>>>,
}

impl ScopeArena {
    pub fn new() -> Self {
        ScopeArena::default()
    }

    pub fn push(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let (function, owner) = parent
            .and_then(|p| self.get(p))
            .map_or((None, None), |p| (p.function, p.owner));
        let id = ScopeId::from_usize(self.scopes.len());
        self.scopes.push(Some(Box::new(Scope {
            kind,
            parent,
            function,
            owner,
            names: FxHashMap::default(),
            symbols: Vec::new(),
        })));
        id
    }

    /// Open the outermost scope of a function body.
    pub fn push_function(
        &mut self,
        parent: ScopeId,
        function: FunctionId,
        owner: Option<ComplexTypeId>,
    ) -> ScopeId {
        let kind = if owner.is_some() {
            ScopeKind::Class
        } else {
            ScopeKind::Function
        };
        let id = self.push(kind, Some(parent));
        if let Some(scope) = self.get_mut(id) {
            scope.function = Some(function);
            scope.owner = owner;
        }
        id
    }

    /// `None` once the scope has been released.
    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.index()).and_then(|s| s.as_deref())
    }

    pub fn get_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.scopes.get_mut(id.index()).and_then(|s| s.as_deref_mut())
    }

    /// Record `symbol` under `name`. Returns the symbol already declared
    /// under that name in the same scope, if any.
    pub fn declare(&mut self, scope: ScopeId, name: Name, symbol: SymbolId) -> Option<SymbolId> {
        let scope = self.get_mut(scope)?;
        if let Some(existing) = scope.names.get(&name) {
            return Some(*existing);
        }
        scope.names.insert(name, symbol);
        scope.symbols.push(symbol);
        None
    }

    /// Innermost-first chain starting at `from`.
    pub fn ancestors(&self, from: ScopeId) -> impl Iterator<Item = (ScopeId, &Scope)> {
        let mut next = Some(from);
        std::iter::from_fn(move || {
            let id = next?;
            let scope = self.get(id)?;
            next = scope.parent;
            Some((id, scope))
        })
    }

    /// First visible symbol named `name`, walking outwards from `from`.
    pub fn lookup(&self, symbols: &SymbolTable, from: ScopeId, name: Name) -> Option<SymbolId> {
        self.ancestors(from)
            .find_map(|(_, scope)| scope.get(name).filter(|s| symbols.get(*s).visible))
    }

    /// Release a function or block scope and every scope nested in it.
    /// Global scopes are never released.
    pub fn release(&mut self, id: ScopeId) {
        if self.get(id).is_some_and(|s| s.kind == ScopeKind::Global) {
            return;
        }
        let nested: Vec<ScopeId> = (0..self.scopes.len())
            .map(ScopeId::from_usize)
            .filter(|s| self.ancestors(*s).skip(1).any(|(p, _)| p == id))
            .collect();
        for scope in nested.into_iter().chain(std::iter::once(id)) {
            if let Some(slot) = self.scopes.get_mut(scope.index()) {
                *slot = None;
            }
        }
    }

    /// Number of scopes still alive.
    pub fn live_count(&self) -> usize {
        self.scopes.iter().filter(|s| s.is_some()).count()
    }
}
