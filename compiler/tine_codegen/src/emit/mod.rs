//! Code generation: the CodeGeneration pass.
//!
//! Lowers one analysed function body into [`Code`]. The emitter walks the
//! tree once, asking the [`RegisterPool`] for every register it needs and
//! writing instructions as it goes; there is no intermediate IR.
//!
//! # Global cache coherence
//!
//! Scalar globals are cached in registers between control-flow boundaries.
//! A dirty cached global is written back before anything that could observe
//! memory: jumps, branches, labels, calls, returns and any load through a
//! pointer. After a store through a pointer the whole cache is dropped,
//! since the pointer may alias any global.
//!
//! # Submodules
//!
//! - `expr`: expressions, places and addresses
//! - `stmt`: statements, blocks and control flow

mod expr;
mod stmt;

use rustc_hash::FxHashMap;
use tine_diagnostic::CompileError;
use tine_ir::{
    CodeLocation, FunctionId, NativeType, NodeId, NodeKind, SymbolId, TypeInfo, Value,
};
use tine_sema::{Storage, Unit};
use tracing::debug;

use crate::frame::{FramePlan, Slot};
use crate::inst::{Address, Base, Code, Inst, Label, Operand, Reg};
use crate::pool::{FunctionStats, RegId, RegisterPool};

/// Name of the generated unit initializer.
pub const INIT_NAME: &str = "__init";
/// Name of the generated unit finalizer.
pub const DESTROY_NAME: &str = "__destroy";

/// A scalar value produced by an expression.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Val {
    Imm(Value),
    Reg { id: RegId, ty: NativeType },
}

impl Val {
    fn ty(self) -> NativeType {
        match self {
            Val::Imm(v) => v.native_type(),
            Val::Reg { ty, .. } => ty,
        }
    }
}

/// An assignable scalar location.
#[derive(Copy, Clone, Debug)]
enum Place {
    /// A symbol homed in a register.
    Register { id: RegId, ty: NativeType },
    /// A global at a fixed offset, read and written through the cache.
    Global { offset: u32, ty: NativeType },
    /// Anything else addressable. `base` holds the address register, if any.
    Memory {
        addr: Address,
        ty: NativeType,
        base: Option<RegId>,
    },
}

impl Place {
    fn ty(&self) -> NativeType {
        match self {
            Place::Register { ty, .. } | Place::Global { ty, .. } | Place::Memory { ty, .. } => *ty,
        }
    }
}

/// A memory address plus the register it is based on.
#[derive(Copy, Clone, Debug)]
struct Addr {
    addr: Address,
    base: Option<RegId>,
}

impl Addr {
    fn fixed(addr: Address) -> Self {
        Addr { addr, base: None }
    }

    fn plus(self, offset: u32) -> Self {
        Addr {
            addr: self.addr.plus(offset),
            base: self.base,
        }
    }
}

/// Where a symbol currently lives.
#[derive(Copy, Clone, Debug)]
enum Home {
    Register(RegId),
    Frame(u32),
    Pointer(RegId),
}

/// A frame value destroyed when its block exits.
#[derive(Copy, Clone, Debug)]
struct Cleanup {
    addr: Address,
    ty: TypeInfo,
}

#[derive(Default)]
struct BlockFrame {
    cleanups: Vec<Cleanup>,
    symbols: Vec<SymbolId>,
}

#[derive(Copy, Clone)]
struct LoopTarget {
    exit: Label,
    next: Label,
    depth: usize,
}

#[derive(Copy, Clone)]
struct InlineTarget {
    result: Option<(NativeType, RegId)>,
    end: Label,
    depth: usize,
}

pub(crate) struct Emitter<'a> {
    unit: &'a Unit,
    pool: &'a mut RegisterPool,
    plan: &'a FramePlan,
    code: Code,
    homes: FxHashMap<SymbolId, Home>,
    this: Option<RegId>,
    params: Vec<SymbolId>,
    ret: Option<NativeType>,
    loc: CodeLocation,
    blocks: Vec<BlockFrame>,
    loops: Vec<LoopTarget>,
    inlines: Vec<InlineTarget>,
    reachable: bool,
}

/// Generate code for a user function.
pub fn function(
    unit: &Unit,
    pool: &mut RegisterPool,
    plan: &FramePlan,
    func: FunctionId,
    body: NodeId,
) -> Result<(Code, FunctionStats), CompileError> {
    let data = unit.functions.get(func);
    let name = data.id.display(&unit.fe.interner);
    let mut e = Emitter::new(unit, pool, plan, name);
    e.ret = unit.fe.types.scalar(data.ret);
    e.loc = data.loc;
    e.prologue()?;
    e.stmt(body)?;
    e.finish()
}

/// Generate `__init`: the unit's global initializers in source order.
pub fn initializer(
    unit: &Unit,
    pool: &mut RegisterPool,
    plan: &FramePlan,
    root: NodeId,
) -> Result<(Code, FunctionStats), CompileError> {
    let mut e = Emitter::new(unit, pool, plan, INIT_NAME.to_string());
    e.blocks.push(BlockFrame::default());
    for def in global_defs(unit, root) {
        e.global_init(def)?;
    }
    e.blocks.pop();
    e.finish()
}

/// Generate `__destroy`: destructors of globals, last declared first.
pub fn finalizer(
    unit: &Unit,
    pool: &mut RegisterPool,
    plan: &FramePlan,
    root: NodeId,
) -> Result<(Code, FunctionStats), CompileError> {
    let mut e = Emitter::new(unit, pool, plan, DESTROY_NAME.to_string());
    for def in global_defs(unit, root).into_iter().rev() {
        let NodeKind::VariableDef(var) = unit.fe.ast.kind(def) else {
            continue;
        };
        let Some(symbol) = var.resolved else {
            continue;
        };
        let entry = unit.symbols.get(symbol);
        if let Storage::Global { offset } = entry.storage {
            e.loc = unit.fe.ast.loc(def);
            e.destroy(Address::global(offset), entry.ty())?;
        }
    }
    e.finish()
}

/// Global variable definitions of the root block, in source order.
fn global_defs(unit: &Unit, root: NodeId) -> Vec<NodeId> {
    let NodeKind::Block(block) = unit.fe.ast.kind(root) else {
        return Vec::new();
    };
    block
        .stmts
        .iter()
        .copied()
        .filter(|&s| match unit.fe.ast.kind(s) {
            NodeKind::VariableDef(def) => def
                .resolved
                .is_some_and(|sym| unit.symbols.get(sym).is_global()),
            _ => false,
        })
        .collect()
}

impl<'a> Emitter<'a> {
    fn new(
        unit: &'a Unit,
        pool: &'a mut RegisterPool,
        plan: &'a FramePlan,
        name: String,
    ) -> Self {
        pool.begin_function(&name);
        let code = Code {
            name,
            params: plan.incoming(),
            ..Code::default()
        };
        Emitter {
            unit,
            pool,
            plan,
            code,
            homes: FxHashMap::default(),
            this: None,
            params: Vec::new(),
            ret: None,
            loc: CodeLocation::SYNTHETIC,
            blocks: Vec::new(),
            loops: Vec::new(),
            inlines: Vec::new(),
            reachable: true,
        }
    }

    // ── Prologue and epilogue ───────────────────────────────────

    fn prologue(&mut self) -> Result<(), CompileError> {
        let plan = self.plan;
        if plan.this_param {
            let this = self.pool.temp(NativeType::Pointer)?;
            self.load_into(NativeType::Pointer, this, Address::frame(0));
            self.this = Some(this);
        }
        for param in &plan.params {
            let home = match param.slot {
                Slot::Register => {
                    let ty = self.scalar(param.ty)?;
                    let id = self.pool.bind_symbol(param.symbol, ty)?;
                    self.load_into(ty, id, Address::frame(param.incoming));
                    Home::Register(id)
                }
                Slot::Pointer => {
                    let id = self.pool.bind_symbol(param.symbol, NativeType::Pointer)?;
                    self.load_into(NativeType::Pointer, id, Address::frame(param.incoming));
                    Home::Pointer(id)
                }
                Slot::Frame(at) if param.is_copied() => {
                    let src = self.pool.temp(NativeType::Pointer)?;
                    self.load_into(NativeType::Pointer, src, Address::frame(param.incoming));
                    let size = self.unit.fe.types.layout(param.ty.base())?.size;
                    self.copy(Address::frame(at), Address::reg(self.reg(src)), size);
                    self.pool.release(src);
                    Home::Frame(at)
                }
                Slot::Frame(at) => Home::Frame(at),
            };
            self.homes.insert(param.symbol, home);
            self.params.push(param.symbol);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<(Code, FunctionStats), CompileError> {
        if self.reachable {
            let value = self
                .ret
                .and_then(|ty| Value::zero(ty).map(|v| (ty, Operand::Imm(v))));
            self.flush();
            self.push(Inst::Ret { value });
        }
        for symbol in std::mem::take(&mut self.params) {
            self.pool.release_symbol(symbol);
        }
        if let Some(this) = self.this.take() {
            self.pool.release(this);
        }
        self.pool.drop_cache();
        let mut stats = self.pool.end_function()?;
        stats.instructions = self.code.len();
        self.code.gp_slots = stats.gp_slots;
        self.code.fp_slots = stats.fp_slots;
        let (spill, frame) = self.plan.finish(self.code.memory_backed_slots());
        self.code.spill_offset = spill;
        self.code.frame_size = frame;
        debug!(
            name = %self.code.name,
            instructions = stats.instructions,
            gp = stats.gp_slots,
            fp = stats.fp_slots,
            frame = frame,
            "generated function"
        );
        Ok((self.code, stats))
    }

    // ── Instruction output ──────────────────────────────────────

    fn push(&mut self, inst: Inst) {
        self.code.insts.push(inst);
        self.code.locs.push(self.loc);
    }

    fn reg(&self, id: RegId) -> Reg {
        self.pool.reg(id)
    }

    fn operand(&self, value: Val) -> Operand {
        match value {
            Val::Imm(v) => Operand::Imm(v),
            Val::Reg { id, .. } => Operand::Reg(self.reg(id)),
        }
    }

    fn release(&mut self, value: Val) {
        if let Val::Reg { id, .. } = value {
            self.pool.release(id);
        }
    }

    /// A register holding `value`; immediates are materialized.
    fn to_reg(&mut self, value: Val) -> Result<(RegId, NativeType), CompileError> {
        match value {
            Val::Reg { id, ty } => Ok((id, ty)),
            Val::Imm(v) => {
                let id = self.pool.materialize(v)?;
                let ty = v.native_type();
                self.push(Inst::Move {
                    ty,
                    dst: self.reg(id),
                    src: Operand::Imm(v),
                });
                Ok((id, ty))
            }
        }
    }

    fn scalar(&self, ty: TypeInfo) -> Result<NativeType, CompileError> {
        self.unit.fe.types.scalar(ty).ok_or_else(|| {
            CompileError::internal(
                format!(
                    "`{}` is not held in a register",
                    self.unit.fe.types.display(ty, &self.unit.fe.interner)
                ),
                self.loc,
            )
        })
    }

    // ── Memory access ───────────────────────────────────────────

    /// Write back every dirty cached global.
    fn flush(&mut self) {
        for f in self.pool.take_dirty() {
            self.push(Inst::Store {
                ty: f.ty,
                addr: Address::global(f.offset),
                src: Operand::Reg(f.reg),
            });
        }
    }

    /// Flush and forget the cache around a control-flow boundary.
    fn boundary(&mut self) {
        self.flush();
        self.pool.drop_cache();
    }

    fn load_into(&mut self, ty: NativeType, dst: RegId, addr: Address) {
        if addr.is_indirect() {
            self.flush();
        }
        self.push(Inst::Load {
            ty,
            dst: self.reg(dst),
            addr,
        });
    }

    fn load(&mut self, ty: NativeType, addr: Address) -> Result<RegId, CompileError> {
        let dst = self.pool.temp(ty)?;
        self.load_into(ty, dst, addr);
        Ok(dst)
    }

    fn store(&mut self, ty: NativeType, addr: Address, src: Operand) {
        let indirect = addr.is_indirect();
        if indirect {
            self.flush();
        }
        self.push(Inst::Store { ty, addr, src });
        if indirect {
            self.pool.drop_cache();
        }
    }

    fn copy(&mut self, dst: Address, src: Address, size: u32) {
        if size == 0 {
            return;
        }
        if dst.is_indirect() || src.is_indirect() {
            self.flush();
        }
        self.push(Inst::Copy { dst, src, size });
        if dst.is_indirect() {
            self.pool.drop_cache();
        }
    }

    fn zero(&mut self, dst: Address, size: u32) {
        if size == 0 {
            return;
        }
        if dst.is_indirect() {
            self.flush();
        }
        self.push(Inst::Zero { dst, size });
        if dst.is_indirect() {
            self.pool.drop_cache();
        }
    }

    /// The address as a pointer value.
    fn pointer(&mut self, addr: Addr) -> Result<Val, CompileError> {
        if let (Base::Reg(_), 0, Some(id)) = (addr.addr.base, addr.addr.offset, addr.base) {
            return Ok(Val::Reg {
                id,
                ty: NativeType::Pointer,
            });
        }
        if let Some(base) = addr.base {
            self.pool.release(base);
        }
        let dst = self.pool.temp(NativeType::Pointer)?;
        self.push(Inst::Lea {
            dst: self.reg(dst),
            addr: addr.addr,
        });
        Ok(Val::Reg {
            id: dst,
            ty: NativeType::Pointer,
        })
    }

    fn release_addr(&mut self, addr: Addr) {
        if let Some(base) = addr.base {
            self.pool.release(base);
        }
    }

    // ── Labels ──────────────────────────────────────────────────

    fn new_label(&mut self) -> Label {
        let label = Label(self.code.labels.len() as u32);
        self.code.labels.push(u32::MAX);
        label
    }

    fn bind(&mut self, label: Label) {
        self.boundary();
        self.code.labels[label.index()] = self.code.insts.len() as u32;
        self.reachable = true;
    }

    fn jump(&mut self, target: Label) {
        self.boundary();
        self.push(Inst::Jump(target));
        self.reachable = false;
    }

    /// Jump to `target` when `cond` is `when`; consumes `cond`.
    fn branch(&mut self, cond: Val, when: bool, target: Label) {
        match cond {
            Val::Imm(v) => {
                if v.is_truthy() == when {
                    self.jump(target);
                }
            }
            Val::Reg { id, .. } => {
                self.branch_on(id, when, target);
                self.pool.release(id);
            }
        }
    }

    /// Jump to `target` when the register holds `when`.
    fn branch_on(&mut self, cond: RegId, when: bool, target: Label) {
        self.flush();
        self.push(Inst::Branch {
            cond: self.reg(cond),
            when,
            target,
        });
        self.pool.drop_cache();
    }
}

#[cfg(test)]
mod tests;
