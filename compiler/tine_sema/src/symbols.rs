//! The symbol table.

use tine_ir::{CodeLocation, ScopeId, Symbol, SymbolId, TypeInfo, Value};

/// Where a symbol's value lives.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Storage {
    /// Not allocated yet.
    Unassigned,
    /// Byte offset in the instance's global data (unit globals and
    /// `static` locals).
    Global { offset: u32 },
    /// Function local; its home (register or frame slot) is chosen by
    /// register allocation.
    Local,
    /// Function parameter by position.
    Param { index: u16 },
    /// Compile-time constant; never stored.
    Constant(Value),
    /// A function class name.
    Function,
}

#[derive(Clone, Debug)]
pub struct SymbolEntry {
    pub symbol: Symbol,
    pub scope: ScopeId,
    pub storage: Storage,
    /// Locals become visible when resolution reaches their definition.
    pub visible: bool,
    pub loc: CodeLocation,
}

impl SymbolEntry {
    pub fn ty(&self) -> TypeInfo {
        self.symbol.ty
    }

    pub fn is_global(&self) -> bool {
        matches!(self.storage, Storage::Global { .. })
    }
}

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn push(&mut self, entry: SymbolEntry) -> SymbolId {
        let id = SymbolId::from_usize(self.entries.len());
        self.entries.push(entry);
        id
    }

    #[inline]
    pub fn get(&self, id: SymbolId) -> &SymbolEntry {
        &self.entries[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolEntry {
        &mut self.entries[id.index()]
    }

    /// Fill in the type of an `auto` symbol.
    pub fn resolve_type(&mut self, id: SymbolId, ty: TypeInfo) {
        let entry = self.get_mut(id);
        let flags = entry.symbol.ty.flags;
        entry.symbol.ty = ty.with_flags(flags).without_flags(tine_ir::TypeFlags::UNRESOLVED);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &SymbolEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (SymbolId::from_usize(i), e))
    }
}
