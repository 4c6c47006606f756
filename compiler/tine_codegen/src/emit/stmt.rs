//! Statements, blocks and control flow.

use tine_diagnostic::CompileError;
use tine_ir::{
    BinaryOp, IndexPolicy, NativeType, NodeId, NodeKind, RangedFor, ReturnTarget, Value,
    VariableDef,
};
use tine_sema::Storage;
use tine_stack::ensure_sufficient_stack;
use tine_types::{DYN_DATA_OFFSET, DYN_LENGTH_OFFSET};

use super::{BlockFrame, Cleanup, Emitter, Home, LoopTarget, Place, Val};
use crate::frame::Slot;
use crate::inst::{Address, Inst, Operand};

impl Emitter<'_> {
    pub(super) fn stmt(&mut self, node: NodeId) -> Result<(), CompileError> {
        ensure_sufficient_stack(|| self.stmt_inner(node))
    }

    fn stmt_inner(&mut self, node: NodeId) -> Result<(), CompileError> {
        let unit = self.unit;
        let ast = &unit.fe.ast;
        let kind = ast.kind(node);
        let loc = ast.loc(node);
        if !loc.is_synthetic() {
            self.loc = loc;
            let quiet = matches!(
                kind,
                NodeKind::Block(_)
                    | NodeKind::Noop
                    | NodeKind::FunctionDef(_)
                    | NodeKind::ComplexTypeDef(_)
            );
            if unit.debug && !quiet {
                let line = unit.diagnostics.line_index().line(loc);
                self.push(Inst::Hook { line });
            }
        }
        match kind {
            NodeKind::Block(block) => self.block(&block.stmts),
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.if_else(*cond, *then_branch, *else_branch),
            NodeKind::While { cond, body, post } => self.while_loop(*cond, *body, *post),
            NodeKind::RangedFor(f) => self.ranged_for(f),
            NodeKind::Return { value, target } => self.ret(*value, *target),
            NodeKind::Break => self.leave_loop(true),
            NodeKind::Continue => self.leave_loop(false),
            NodeKind::VariableDef(def) => self.variable(def),
            NodeKind::UnaryOp { op, operand } if op.is_increment() => {
                self.increment(*op, *operand, false).map(|_| ())
            }
            NodeKind::Noop | NodeKind::FunctionDef(_) | NodeKind::ComplexTypeDef(_) => Ok(()),
            _ => {
                if let Some(v) = self.value(node)? {
                    self.release(v);
                }
                Ok(())
            }
        }
    }

    // ── Blocks ──────────────────────────────────────────────────

    fn block(&mut self, stmts: &[NodeId]) -> Result<(), CompileError> {
        self.blocks.push(BlockFrame::default());
        for &stmt in stmts {
            self.stmt(stmt)?;
        }
        self.close_block()
    }

    /// Destroy the block's values if control reaches its end, then free
    /// its locals.
    fn close_block(&mut self) -> Result<(), CompileError> {
        let Some(frame) = self.blocks.pop() else {
            return Ok(());
        };
        if self.reachable {
            for cleanup in frame.cleanups.iter().rev() {
                self.destroy(cleanup.addr, cleanup.ty)?;
            }
        }
        for symbol in frame.symbols {
            self.pool.release_symbol(symbol);
            self.homes.remove(&symbol);
        }
        Ok(())
    }

    /// Destructors of every block above `depth`, innermost first, for a
    /// jump out of them.
    fn unwind(&mut self, depth: usize) -> Result<(), CompileError> {
        let pending: Vec<Cleanup> = self.blocks[depth..]
            .iter()
            .rev()
            .flat_map(|b| b.cleanups.iter().rev().copied())
            .collect();
        for cleanup in pending {
            self.destroy(cleanup.addr, cleanup.ty)?;
        }
        Ok(())
    }

    fn declare(&mut self, symbol: tine_ir::SymbolId, home: Home) {
        self.homes.insert(symbol, home);
        match self.blocks.last_mut() {
            Some(block) => block.symbols.push(symbol),
            None => self.params.push(symbol),
        }
    }

    // ── Control flow ────────────────────────────────────────────

    fn if_else(
        &mut self,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    ) -> Result<(), CompileError> {
        let end = self.new_label();
        let otherwise = match else_branch {
            Some(_) => self.new_label(),
            None => end,
        };
        let c = self.expr(cond)?;
        self.branch(c, false, otherwise);
        self.stmt(then_branch)?;
        if let Some(else_branch) = else_branch {
            if self.reachable {
                self.jump(end);
            }
            self.bind(otherwise);
            self.stmt(else_branch)?;
        }
        self.bind(end);
        Ok(())
    }

    fn while_loop(
        &mut self,
        cond: NodeId,
        body: NodeId,
        post: Option<NodeId>,
    ) -> Result<(), CompileError> {
        let top = self.new_label();
        let exit = self.new_label();
        let next = match post {
            Some(_) => self.new_label(),
            None => top,
        };
        self.bind(top);
        let c = self.expr(cond)?;
        self.branch(c, false, exit);
        self.loops.push(LoopTarget {
            exit,
            next,
            depth: self.blocks.len(),
        });
        self.stmt(body)?;
        self.loops.pop();
        if let Some(post) = post {
            self.bind(next);
            self.stmt(post)?;
        }
        if self.reachable {
            self.jump(top);
        }
        self.bind(exit);
        Ok(())
    }

    fn ranged_for(&mut self, f: &RangedFor) -> Result<(), CompileError> {
        let unit = self.unit;
        let types = &unit.fe.types;
        let Some((element, len)) = types.container(unit.fe.ast.ty(f.range)) else {
            return Err(self.internal("ranged for over a non-container"));
        };
        let Some(symbol) = f.resolved else {
            return Err(self.internal("ranged for without an iterator"));
        };
        let stride = types.layout(element)?.stride();
        let size = types.layout(element)?.size;

        let base = self.address(f.range)?;
        let (data, count) = match len {
            Some(len) => (self.pointer(base)?, Val::Imm(Value::Int(len as i32))),
            None => {
                let data = self.load(NativeType::Pointer, base.addr.plus(DYN_DATA_OFFSET))?;
                let count = self.load(NativeType::Integer, base.addr.plus(DYN_LENGTH_OFFSET))?;
                self.release_addr(base);
                (
                    Val::Reg {
                        id: data,
                        ty: NativeType::Pointer,
                    },
                    Val::Reg {
                        id: count,
                        ty: NativeType::Integer,
                    },
                )
            }
        };
        let Val::Reg { id: data, .. } = data else {
            return Err(self.internal("container base is not a register"));
        };
        let counter = self.pool.temp(NativeType::Integer)?;
        self.push(Inst::Move {
            ty: NativeType::Integer,
            dst: self.reg(counter),
            src: Operand::Imm(Value::Int(0)),
        });

        self.blocks.push(BlockFrame::default());
        let home = match self.plan.slot(symbol) {
            Some(Slot::Pointer) => {
                Home::Pointer(self.pool.bind_symbol(symbol, NativeType::Pointer)?)
            }
            Some(Slot::Register) => {
                let ty = self.scalar(element)?;
                Home::Register(self.pool.bind_symbol(symbol, ty)?)
            }
            Some(Slot::Frame(at)) => Home::Frame(at),
            None => return Err(self.internal("iterator has no slot")),
        };
        self.declare(symbol, home);

        let top = self.new_label();
        let next = self.new_label();
        let exit = self.new_label();
        self.bind(top);
        let more = self.pool.temp(NativeType::Bool)?;
        self.push(Inst::Binary {
            op: BinaryOp::Lt,
            ty: NativeType::Integer,
            dst: self.reg(more),
            lhs: self.reg(counter),
            rhs: self.operand(count),
        });
        self.branch(
            Val::Reg {
                id: more,
                ty: NativeType::Bool,
            },
            false,
            exit,
        );

        let at = match home {
            Home::Pointer(id) => id,
            _ => self.pool.temp(NativeType::Pointer)?,
        };
        self.push(Inst::ElementAddr {
            dst: self.reg(at),
            base: self.reg(data),
            index: Operand::Reg(self.reg(counter)),
            len: self.operand(count),
            stride,
            policy: IndexPolicy::Unchecked,
        });
        let element_addr = Address::reg(self.reg(at));
        match home {
            Home::Pointer(_) => {}
            Home::Register(id) => {
                let ty = self.scalar(element)?;
                self.load_into(ty, id, element_addr);
                self.pool.release(at);
            }
            Home::Frame(slot) => {
                match types.scalar(element) {
                    Some(ty) => {
                        let v = self.load(ty, element_addr)?;
                        self.store(ty, Address::frame(slot), Operand::Reg(self.reg(v)));
                        self.pool.release(v);
                    }
                    None => self.copy(Address::frame(slot), element_addr, size),
                }
                self.pool.release(at);
            }
        }

        self.loops.push(LoopTarget {
            exit,
            next,
            depth: self.blocks.len(),
        });
        self.stmt(f.body)?;
        self.loops.pop();
        self.bind(next);
        self.push(Inst::Binary {
            op: BinaryOp::Add,
            ty: NativeType::Integer,
            dst: self.reg(counter),
            lhs: self.reg(counter),
            rhs: Operand::Imm(Value::Int(1)),
        });
        self.jump(top);
        self.bind(exit);
        self.close_block()?;
        self.pool.release(counter);
        self.pool.release(data);
        self.release(count);
        Ok(())
    }

    fn ret(&mut self, value: Option<NodeId>, target: ReturnTarget) -> Result<(), CompileError> {
        match target {
            ReturnTarget::Function => {
                let v = match value {
                    Some(value) => Some(self.expr(value)?),
                    None => None,
                };
                self.unwind(0)?;
                let value = v.map(|v| (v.ty(), self.operand(v)));
                self.flush();
                self.push(Inst::Ret { value });
                if let Some(v) = v {
                    self.release(v);
                }
                self.reachable = false;
            }
            ReturnTarget::Inline => {
                let Some(target) = self.inlines.last().copied() else {
                    return Err(self.internal("inline return outside an inlined body"));
                };
                if let Some(value) = value {
                    let v = self.expr(value)?;
                    if let Some((ty, dst)) = target.result {
                        let v = self.convert(v, v.ty(), ty)?;
                        self.move_into(ty, dst, v);
                        self.release(v);
                    } else {
                        self.release(v);
                    }
                }
                self.unwind(target.depth)?;
                self.jump(target.end);
            }
        }
        Ok(())
    }

    fn leave_loop(&mut self, exit: bool) -> Result<(), CompileError> {
        let Some(target) = self.loops.last().copied() else {
            return Err(self.internal("jump outside a loop"));
        };
        self.unwind(target.depth)?;
        self.jump(if exit { target.exit } else { target.next });
        Ok(())
    }

    // ── Variables ───────────────────────────────────────────────

    fn variable(&mut self, def: &VariableDef) -> Result<(), CompileError> {
        let unit = self.unit;
        let Some(symbol) = def.resolved else {
            return Ok(());
        };
        let entry = unit.symbols.get(symbol);
        // Globals, statics and constants never live in the frame.
        if entry.storage != Storage::Local {
            return Ok(());
        }
        let ty = entry.ty();
        let Some(slot) = self.plan.slot(symbol) else {
            return Err(self.internal(format!("{symbol:?} has no slot")));
        };
        match slot {
            Slot::Pointer => {
                let Some(init) = def.init else {
                    return Err(self.internal("reference without a referent"));
                };
                let addr = self.address(init)?;
                let p = self.pointer(addr)?;
                let id = self.pool.bind_symbol(symbol, NativeType::Pointer)?;
                self.move_into(NativeType::Pointer, id, p);
                self.release(p);
                self.declare(symbol, Home::Pointer(id));
            }
            Slot::Register => {
                let scalar = self.scalar(ty)?;
                let v = self.initial(def.init, scalar)?;
                let id = self.pool.bind_symbol(symbol, scalar)?;
                self.move_into(scalar, id, v);
                self.release(v);
                self.declare(symbol, Home::Register(id));
            }
            Slot::Frame(at) => {
                // A complex initializer targets the symbol, so the home
                // must exist first.
                self.declare(symbol, Home::Frame(at));
                let addr = Address::frame(at);
                if let Some(scalar) = unit.fe.types.scalar(ty) {
                    let v = self.initial(def.init, scalar)?;
                    let src = self.operand(v);
                    self.store(scalar, addr, src);
                    self.release(v);
                } else {
                    self.complex_local(def.init, addr, ty)?;
                    if unit.fe.types.needs_destruction(ty) {
                        if let Some(block) = self.blocks.last_mut() {
                            block.cleanups.push(Cleanup { addr, ty });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Initial value of a scalar: the initializer, or zero.
    fn initial(&mut self, init: Option<NodeId>, ty: NativeType) -> Result<Val, CompileError> {
        match init {
            Some(init) => self.expr(init),
            None => Value::zero(ty)
                .map(Val::Imm)
                .ok_or_else(|| self.internal(format!("{} has no zero value", ty.name()))),
        }
    }

    /// Zero, complex initializer or copy into `addr`.
    fn complex_local(
        &mut self,
        init: Option<NodeId>,
        addr: Address,
        ty: tine_ir::TypeInfo,
    ) -> Result<(), CompileError> {
        let size = self.unit.fe.types.layout(ty.base())?.size;
        match init {
            None => self.zero(addr, size),
            Some(init) if matches!(self.unit.fe.ast.kind(init), NodeKind::ComplexInit(_)) => {
                if let Some(v) = self.value(init)? {
                    self.release(v);
                }
            }
            Some(init) => {
                let src = self.address(init)?;
                self.copy(addr, src.addr, size);
                self.release_addr(src);
            }
        }
        Ok(())
    }

    /// One global definition of `__init`. Uninitialized globals keep the
    /// zeroed image.
    pub(super) fn global_init(&mut self, def: NodeId) -> Result<(), CompileError> {
        let unit = self.unit;
        let NodeKind::VariableDef(var) = unit.fe.ast.kind(def) else {
            return Ok(());
        };
        let Some(symbol) = var.resolved else {
            return Ok(());
        };
        let entry = unit.symbols.get(symbol);
        let Storage::Global { offset } = entry.storage else {
            return Ok(());
        };
        let Some(init) = var.init else {
            return Ok(());
        };
        self.loc = unit.fe.ast.loc(def);
        let ty = entry.ty();
        match unit.fe.types.scalar(ty) {
            Some(scalar) => {
                let v = self.expr(init)?;
                self.write(&Place::Global { offset, ty: scalar }, v)?;
                self.release(v);
                Ok(())
            }
            None => self.complex_local(Some(init), Address::global(offset), ty),
        }
    }
}
