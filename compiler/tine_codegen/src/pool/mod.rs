//! The register pool.
//!
//! One pool per compiled unit. Each live value is one [`AssemblyRegister`]
//! owning one physical slot, in exactly one [`RegisterState`]:
//!
//! ```text
//! UnloadedMemoryLocation -> LoadedMemoryLocation -> ActiveRegister
//!     -> DirtyGlobalRegister -> ReusableRegister -> InactiveRegister
//! ```
//!
//! Allocation recycles: the first reusable register of the bank wins, then
//! an inactive one, and only then is a new slot created. Before a slot past
//! the machine registers is created, a clean cached global is evicted.
//! There is no spilling; slots past the machine registers are simply
//! memory-backed.
//!
//! Only global data is cached. A cached global is pinned while an
//! expression reads it, so eviction and cache drops never pull a value
//! from under its reader: a pinned register that loses its binding turns
//! into a temporary owned by the reader.

use rustc_hash::FxHashMap;
use tine_diagnostic::{CompileError, ErrorCode, ErrorKind};
use tine_ir::{CodeLocation, NativeType, SymbolId, Value};
use tracing::trace;

use crate::inst::{Bank, Reg};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RegisterState {
    /// Bound to a global whose load has not been emitted yet.
    UnloadedMemoryLocation,
    /// Holds a global's current value.
    LoadedMemoryLocation,
    ActiveRegister,
    /// Holds a global written since it was loaded; must be stored back.
    DirtyGlobalRegister,
    /// Released inside the current function.
    ReusableRegister,
    /// Free between functions.
    InactiveRegister,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Binding {
    Temp,
    /// A literal materialized because the instruction needs a register.
    Immediate(Value),
    Symbol(SymbolId),
    Global { offset: u32 },
}

/// Handle of a pool register.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RegId(u32);

impl RegId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct AssemblyRegister {
    pub reg: Reg,
    pub ty: NativeType,
    pub state: RegisterState,
    pub binding: Binding,
    pins: u32,
}

impl AssemblyRegister {
    fn is_free(&self) -> bool {
        matches!(
            self.state,
            RegisterState::ReusableRegister | RegisterState::InactiveRegister
        )
    }

    fn is_cached_global(&self) -> bool {
        matches!(self.binding, Binding::Global { .. })
            && matches!(
                self.state,
                RegisterState::LoadedMemoryLocation | RegisterState::DirtyGlobalRegister
            )
    }
}

/// What one function used.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionStats {
    pub name: String,
    pub instructions: usize,
    pub gp_slots: u16,
    pub fp_slots: u16,
    /// Global loads emitted.
    pub loads: u32,
    /// Dirty globals stored back.
    pub stores: u32,
    /// Literals materialized into registers.
    pub materialized: u32,
}

impl FunctionStats {
    pub fn memory_backed(&self) -> u32 {
        u32::from(self.gp_slots.saturating_sub(Bank::Gp.native_slots()))
            + u32::from(self.fp_slots.saturating_sub(Bank::Fp.native_slots()))
    }
}

/// A dirty global to store back: `st ty [g+offset], reg`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Flush {
    pub offset: u32,
    pub ty: NativeType,
    pub reg: Reg,
}

#[derive(Debug, Default)]
pub struct RegisterPool {
    registers: Vec<AssemblyRegister>,
    /// Global offset -> register caching it.
    globals: FxHashMap<u32, RegId>,
    symbols: FxHashMap<SymbolId, RegId>,
    /// Slots created so far per bank.
    gp_count: u16,
    fp_count: u16,
    stats: FunctionStats,
}

impl RegisterPool {
    pub fn new() -> Self {
        RegisterPool::default()
    }

    #[inline]
    pub fn get(&self, id: RegId) -> &AssemblyRegister {
        &self.registers[id.index()]
    }

    #[inline]
    pub fn reg(&self, id: RegId) -> Reg {
        self.registers[id.index()].reg
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn count(&self, state: RegisterState) -> usize {
        self.registers.iter().filter(|r| r.state == state).count()
    }

    /// Registers a new value could take without creating a slot.
    pub fn free_registers(&self) -> usize {
        self.registers.iter().filter(|r| r.is_free()).count()
    }

    // ── Function lifetime ───────────────────────────────────────────

    pub fn begin_function(&mut self, name: &str) {
        self.stats = FunctionStats {
            name: name.to_string(),
            ..FunctionStats::default()
        };
    }

    /// Close the function: every register must be released and every
    /// dirty global stored. All registers become inactive.
    pub fn end_function(&mut self) -> Result<FunctionStats, CompileError> {
        let leaked: Vec<String> = self
            .registers
            .iter()
            .filter(|r| {
                matches!(
                    r.state,
                    RegisterState::ActiveRegister
                        | RegisterState::DirtyGlobalRegister
                        | RegisterState::UnloadedMemoryLocation
                )
            })
            .map(|r| format!("{} ({:?}, {:?})", r.reg, r.state, r.binding))
            .collect();
        if !leaked.is_empty() {
            return Err(CompileError::new(
                ErrorKind::Internal,
                ErrorCode::E5001,
                format!(
                    "registers left active after `{}`: {}",
                    self.stats.name,
                    leaked.join(", ")
                ),
                CodeLocation::SYNTHETIC,
            ));
        }
        for register in &mut self.registers {
            register.state = RegisterState::InactiveRegister;
            register.binding = Binding::Temp;
            register.pins = 0;
        }
        self.globals.clear();
        self.symbols.clear();
        Ok(std::mem::take(&mut self.stats))
    }

    // ── Allocation ──────────────────────────────────────────────────

    fn allocate(
        &mut self,
        ty: NativeType,
        binding: Binding,
        state: RegisterState,
    ) -> Result<RegId, CompileError> {
        let bank = Bank::of(ty);
        let free = self
            .first_in(bank, RegisterState::ReusableRegister)
            .or_else(|| self.first_in(bank, RegisterState::InactiveRegister));
        let found = match free {
            Some(id) => Some(id),
            None => self.evict(bank),
        };
        let id = match found {
            Some(id) => id,
            None => {
                let count = match bank {
                    Bank::Gp => &mut self.gp_count,
                    Bank::Fp => &mut self.fp_count,
                };
                let reg = Reg::new(bank, *count);
                *count = count.checked_add(1).filter(|&n| n < u16::MAX).ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::Internal,
                        ErrorCode::E5002,
                        format!("out of {bank:?} register slots in `{}`", self.stats.name),
                        CodeLocation::SYNTHETIC,
                    )
                })?;
                self.registers.push(AssemblyRegister {
                    reg,
                    ty,
                    state,
                    binding,
                    pins: 0,
                });
                RegId(self.registers.len() as u32 - 1)
            }
        };
        let register = &mut self.registers[id.index()];
        register.ty = ty;
        register.state = state;
        register.binding = binding;
        register.pins = 0;
        let reg = register.reg;
        let used = match bank {
            Bank::Gp => &mut self.stats.gp_slots,
            Bank::Fp => &mut self.stats.fp_slots,
        };
        *used = (*used).max(reg.slot + 1);
        trace!(%reg, ?binding, "allocate register");
        Ok(id)
    }

    fn first_in(&self, bank: Bank, state: RegisterState) -> Option<RegId> {
        self.registers
            .iter()
            .position(|r| r.reg.bank == bank && r.state == state)
            .map(|i| RegId(i as u32))
    }

    /// Take a clean, unpinned cached global when the bank's machine
    /// registers are exhausted.
    fn evict(&mut self, bank: Bank) -> Option<RegId> {
        let count = match bank {
            Bank::Gp => self.gp_count,
            Bank::Fp => self.fp_count,
        };
        if count < bank.native_slots() {
            return None;
        }
        let index = self.registers.iter().position(|r| {
            r.reg.bank == bank
                && r.pins == 0
                && r.state == RegisterState::LoadedMemoryLocation
                && matches!(r.binding, Binding::Global { .. })
        })?;
        if let Binding::Global { offset } = self.registers[index].binding {
            self.globals.remove(&offset);
        }
        Some(RegId(index as u32))
    }

    /// A temporary, released by [`RegisterPool::release`] at its last use.
    pub fn temp(&mut self, ty: NativeType) -> Result<RegId, CompileError> {
        self.allocate(ty, Binding::Temp, RegisterState::ActiveRegister)
    }

    /// A temporary holding a literal the instruction cannot encode.
    pub fn materialize(&mut self, value: Value) -> Result<RegId, CompileError> {
        self.stats.materialized += 1;
        self.allocate(
            value.native_type(),
            Binding::Immediate(value),
            RegisterState::ActiveRegister,
        )
    }

    /// The home register of a scalar local for its whole lifetime.
    pub fn bind_symbol(
        &mut self,
        symbol: SymbolId,
        ty: NativeType,
    ) -> Result<RegId, CompileError> {
        let id = self.allocate(ty, Binding::Symbol(symbol), RegisterState::ActiveRegister)?;
        self.symbols.insert(symbol, id);
        Ok(id)
    }

    pub fn symbol(&self, symbol: SymbolId) -> Option<RegId> {
        self.symbols.get(&symbol).copied()
    }

    /// The local went out of scope.
    pub fn release_symbol(&mut self, symbol: SymbolId) {
        if let Some(id) = self.symbols.remove(&symbol) {
            let register = &mut self.registers[id.index()];
            register.state = RegisterState::ReusableRegister;
            register.binding = Binding::Temp;
        }
    }

    /// A value's last use. Temporaries become reusable; a cached global is
    /// unpinned and stays cached; symbol homes are untouched.
    pub fn release(&mut self, id: RegId) {
        let register = &mut self.registers[id.index()];
        match register.binding {
            // A detached global may still have other readers.
            Binding::Temp | Binding::Immediate(_) if register.pins > 1 => register.pins -= 1,
            Binding::Temp | Binding::Immediate(_) => {
                register.state = RegisterState::ReusableRegister;
                register.binding = Binding::Temp;
                register.pins = 0;
            }
            Binding::Global { .. } => register.pins = register.pins.saturating_sub(1),
            Binding::Symbol(_) => {}
        }
    }

    // ── Global cache ────────────────────────────────────────────────

    /// Register holding the global at `offset`, pinned for the reader.
    ///
    /// Returns `true` if the caller must emit the load and then call
    /// [`RegisterPool::loaded`].
    pub fn global_read(
        &mut self,
        offset: u32,
        ty: NativeType,
    ) -> Result<(RegId, bool), CompileError> {
        if let Some(&id) = self.globals.get(&offset) {
            let register = &mut self.registers[id.index()];
            if register.ty == ty && register.is_cached_global() {
                register.pins += 1;
                return Ok((id, false));
            }
        }
        self.forget_global(offset);
        let id = self.allocate(
            ty,
            Binding::Global { offset },
            RegisterState::UnloadedMemoryLocation,
        )?;
        self.registers[id.index()].pins = 1;
        self.globals.insert(offset, id);
        Ok((id, true))
    }

    pub fn loaded(&mut self, id: RegId) {
        self.stats.loads += 1;
        self.registers[id.index()].state = RegisterState::LoadedMemoryLocation;
    }

    /// Register to write the global at `offset` into; follow the write with
    /// [`RegisterPool::mark_dirty`].
    pub fn global_write(&mut self, offset: u32, ty: NativeType) -> Result<RegId, CompileError> {
        if let Some(&id) = self.globals.get(&offset) {
            let register = &self.registers[id.index()];
            if register.pins == 0 && register.ty == ty && register.is_cached_global() {
                self.registers[id.index()].state = RegisterState::ActiveRegister;
                return Ok(id);
            }
        }
        self.forget_global(offset);
        let id = self.allocate(
            ty,
            Binding::Global { offset },
            RegisterState::ActiveRegister,
        )?;
        self.globals.insert(offset, id);
        Ok(id)
    }

    pub fn mark_dirty(&mut self, id: RegId) {
        self.registers[id.index()].state = RegisterState::DirtyGlobalRegister;
    }

    /// Drop the cache entry of `offset`. A pinned register keeps its value
    /// as a temporary of its reader.
    fn forget_global(&mut self, offset: u32) {
        let Some(id) = self.globals.remove(&offset) else {
            return;
        };
        let register = &mut self.registers[id.index()];
        if register.pins > 0 {
            register.binding = Binding::Temp;
            register.state = RegisterState::ActiveRegister;
        } else {
            register.binding = Binding::Temp;
            register.state = RegisterState::ReusableRegister;
        }
    }

    /// Dirty globals to store back, now clean.
    pub fn take_dirty(&mut self) -> Vec<Flush> {
        let mut out = Vec::new();
        for register in &mut self.registers {
            if register.state != RegisterState::DirtyGlobalRegister {
                continue;
            }
            if let Binding::Global { offset } = register.binding {
                out.push(Flush {
                    offset,
                    ty: register.ty,
                    reg: register.reg,
                });
                register.state = RegisterState::LoadedMemoryLocation;
            }
        }
        out.sort_by_key(|f| f.offset);
        self.stats.stores += out.len() as u32;
        out
    }

    pub fn has_dirty(&self) -> bool {
        self.registers
            .iter()
            .any(|r| r.state == RegisterState::DirtyGlobalRegister)
    }

    /// Forget every cached global. Flush first; dirty values would be lost.
    pub fn drop_cache(&mut self) {
        debug_assert!(!self.has_dirty(), "cache dropped with dirty globals");
        let offsets: Vec<u32> = self.globals.keys().copied().collect();
        for offset in offsets {
            self.forget_global(offset);
        }
    }

    pub fn cached_globals(&self) -> usize {
        self.globals.len()
    }
}
