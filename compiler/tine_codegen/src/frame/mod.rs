//! Frame planning: the RegisterAllocation pass.
//!
//! Decides where every parameter and local of one function lives before a
//! single instruction is emitted:
//!
//! - scalars live in a register, unless their address is taken (bound to a
//!   reference or passed to a reference parameter), then in the frame
//! - references live in a register holding the referent's address
//! - complex values live in the frame
//!
//! # Frame layout
//!
//! ```text
//! fp + 0                     incoming slots, 8 bytes each: `this` first
//!                            for methods, then the arguments in order
//! fp + 8 * incoming          locals, each at its natural alignment
//! spill_offset               memory-backed register slots, 8 bytes each
//! frame_size                 rounded up to 16
//! ```
//!
//! Complex and reference arguments arrive as addresses. A complex parameter
//! taken by value is copied into its own local slot by the prologue.

use rustc_hash::{FxHashMap, FxHashSet};
use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    CallTarget, CodeLocation, FunctionId, FunctionKind, NativeType, NodeId, NodeKind, ScopeId,
    SymbolId, TypeInfo,
};
use tine_sema::{Storage, Unit};
use tine_types::align_up;
use tracing::trace;

/// Bytes per incoming argument slot.
pub const ARG_SLOT: u32 = 8;

/// Where a symbol lives for the whole function.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Slot {
    /// A register holds the value.
    Register,
    /// The value is stored at this frame offset.
    Frame(u32),
    /// A register holds the address of the value.
    Pointer,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ParamSlot {
    pub symbol: SymbolId,
    pub ty: TypeInfo,
    /// Frame offset of the incoming argument.
    pub incoming: u32,
    pub slot: Slot,
}

impl ParamSlot {
    /// Complex values taken by value are copied out of the caller.
    pub fn is_copied(&self) -> bool {
        matches!(self.slot, Slot::Frame(at) if at != self.incoming)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FramePlan {
    /// `this` arrives in the first incoming slot.
    pub this_param: bool,
    pub params: Vec<ParamSlot>,
    slots: FxHashMap<SymbolId, Slot>,
    /// End of the locals area.
    pub locals_end: u32,
}

impl FramePlan {
    pub fn slot(&self, symbol: SymbolId) -> Option<Slot> {
        self.slots.get(&symbol).copied()
    }

    /// Number of incoming slots, `this` included.
    pub fn incoming(&self) -> u16 {
        (self.params.len() + usize::from(self.this_param)) as u16
    }

    /// `(spill_offset, frame_size)` once the register slot counts are known.
    pub fn finish(&self, memory_backed_slots: u32) -> (u32, u32) {
        let spill = align_up(self.locals_end, 8);
        (spill, align_up(spill + memory_backed_slots * 8, 16))
    }
}

/// Plan the frame of `func`, or of the unit initializer when `func` is
/// `None` and `body` is the root block.
pub fn plan(
    unit: &Unit,
    func: Option<FunctionId>,
    body: NodeId,
    scope: Option<ScopeId>,
) -> Result<FramePlan, CompileError> {
    let mut planner = Planner {
        unit,
        taken: FxHashSet::default(),
        plan: FramePlan::default(),
        next: 0,
    };
    planner.collect_taken(body);

    if let Some(func) = func {
        let data = unit.functions.get(func);
        planner.plan.this_param = matches!(
            data.kind,
            FunctionKind::Method | FunctionKind::Constructor | FunctionKind::Destructor
        );
        planner.params(scope)?;
    }
    planner.next = u32::from(planner.plan.incoming()) * ARG_SLOT;
    planner.copied_params()?;
    planner.locals(body)?;
    planner.plan.locals_end = planner.next;
    trace!(
        incoming = planner.plan.incoming(),
        locals_end = planner.plan.locals_end,
        homes = planner.plan.slots.len(),
        "planned frame"
    );
    Ok(planner.plan)
}

struct Planner<'a> {
    unit: &'a Unit,
    /// Scalar locals and parameters whose address escapes into a reference.
    taken: FxHashSet<SymbolId>,
    plan: FramePlan,
    next: u32,
}

impl Planner<'_> {
    fn symbol_type(&self, symbol: SymbolId) -> TypeInfo {
        self.unit.symbols.get(symbol).ty()
    }

    fn scalar(&self, ty: TypeInfo) -> Option<NativeType> {
        self.unit.fe.types.scalar(ty)
    }

    fn allocate(&mut self, ty: TypeInfo) -> Result<u32, CompileError> {
        let layout = self.unit.fe.types.layout(ty.base())?;
        let (at, end) = layout.place(self.next).ok_or_else(|| {
            CompileError::layout(
                ErrorCode::E3005,
                "stack frame is too large",
                CodeLocation::SYNTHETIC,
            )
        })?;
        self.next = end;
        Ok(at)
    }

    // ── Address-taken analysis ─────────────────────────────────

    fn collect_taken(&mut self, body: NodeId) {
        let unit = self.unit;
        let ast = &unit.fe.ast;
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            match ast.kind(node) {
                NodeKind::VariableDef(def) => {
                    if let (Some(symbol), Some(init)) = (def.resolved, def.init) {
                        if self.symbol_type(symbol).is_ref() {
                            self.mark(init);
                        }
                    }
                }
                NodeKind::Call(call) => {
                    let callee = match call.target {
                        Some(CallTarget::Function(f) | CallTarget::Method { func: f, .. }) => f,
                        _ => FunctionId::INVALID,
                    };
                    self.mark_args(callee, &call.args);
                }
                NodeKind::ComplexInit(init) => {
                    for ctor in &init.ctors {
                        self.mark_args(ctor.func, &ctor.args);
                    }
                }
                _ => {}
            }
            let children = ast.children(node);
            stack.extend(children.into_iter().rev());
        }
    }

    fn mark_args(&mut self, callee: FunctionId, args: &[NodeId]) {
        if !callee.is_valid() {
            return;
        }
        let unit = self.unit;
        let params = &unit.functions.get(callee).params;
        for (param, arg) in params.iter().zip(args) {
            if param.is_ref() {
                self.mark(*arg);
            }
        }
    }

    fn mark(&mut self, node: NodeId) {
        if let NodeKind::VariableRef {
            resolved: Some(symbol),
            ..
        } = self.unit.fe.ast.kind(node)
        {
            let entry = self.unit.symbols.get(*symbol);
            let local = matches!(entry.storage, Storage::Local | Storage::Param { .. });
            if local && !entry.ty().is_ref() && self.scalar(entry.ty()).is_some() {
                self.taken.insert(*symbol);
            }
        }
    }

    // ── Parameters ──────────────────────────────────────────────

    fn params(&mut self, scope: Option<ScopeId>) -> Result<(), CompileError> {
        let unit = self.unit;
        let Some(scope) = scope.and_then(|s| unit.scopes.get(s)) else {
            return Ok(());
        };
        let mut params: Vec<(u16, SymbolId)> = scope
            .symbols()
            .iter()
            .filter_map(|&s| match unit.symbols.get(s).storage {
                Storage::Param { index } => Some((index, s)),
                _ => None,
            })
            .collect();
        params.sort_unstable();
        let this = u32::from(self.plan.this_param);
        for (index, symbol) in params {
            let ty = self.symbol_type(symbol);
            let incoming = (u32::from(index) + this) * ARG_SLOT;
            let slot = if ty.is_ref() {
                Slot::Pointer
            } else if self.scalar(ty).is_none() {
                // Copied once the incoming area is laid out.
                Slot::Frame(u32::MAX)
            } else if self.taken.contains(&symbol) {
                Slot::Frame(incoming)
            } else {
                Slot::Register
            };
            self.plan.params.push(ParamSlot {
                symbol,
                ty,
                incoming,
                slot,
            });
        }
        Ok(())
    }

    fn copied_params(&mut self) -> Result<(), CompileError> {
        for i in 0..self.plan.params.len() {
            let param = self.plan.params[i];
            let slot = if param.slot == Slot::Frame(u32::MAX) {
                Slot::Frame(self.allocate(param.ty)?)
            } else {
                param.slot
            };
            self.plan.params[i].slot = slot;
            self.plan.slots.insert(param.symbol, slot);
        }
        Ok(())
    }

    // ── Locals ──────────────────────────────────────────────────

    fn locals(&mut self, body: NodeId) -> Result<(), CompileError> {
        let unit = self.unit;
        let ast = &unit.fe.ast;
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            match ast.kind(node) {
                NodeKind::VariableDef(def) => {
                    if let Some(symbol) = def.resolved {
                        self.local(symbol)?;
                    }
                }
                NodeKind::RangedFor(f) => {
                    if let Some(symbol) = f.resolved {
                        self.local(symbol)?;
                    }
                }
                // Bodies of other functions are planned on their own.
                NodeKind::FunctionDef(_) | NodeKind::ComplexTypeDef(_) => continue,
                _ => {}
            }
            let children = ast.children(node);
            stack.extend(children.into_iter().rev());
        }
        Ok(())
    }

    fn local(&mut self, symbol: SymbolId) -> Result<(), CompileError> {
        let entry = self.unit.symbols.get(symbol);
        if entry.storage != Storage::Local || self.plan.slots.contains_key(&symbol) {
            return Ok(());
        }
        let ty = entry.ty();
        let slot = if ty.is_ref() {
            Slot::Pointer
        } else if self.scalar(ty).is_some() && !self.taken.contains(&symbol) {
            Slot::Register
        } else {
            Slot::Frame(self.allocate(ty)?)
        };
        self.plan.slots.insert(symbol, slot);
        Ok(())
    }
}
