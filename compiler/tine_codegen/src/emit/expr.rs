//! Expressions, places and addresses.

use smallvec::SmallVec;
use tine_diagnostic::CompileError;
use tine_ir::{
    AssignOp, BinaryOp, Call, CallTarget, ComplexInit, FunctionId, IndexPolicy, NativeType,
    NodeId, NodeKind, SymbolId, TypeInfo, UnaryOp, Value,
};
use tine_sema::Storage;
use tine_stack::ensure_sufficient_stack;
use tine_types::{DYN_DATA_OFFSET, DYN_LENGTH_OFFSET};

use super::{Addr, Emitter, Home, InlineTarget, Place, Val};
use crate::inst::{Address, Base, Inst, Operand};
use crate::pool::RegId;

impl Emitter<'_> {
    pub(super) fn internal(&self, message: impl Into<String>) -> CompileError {
        CompileError::internal(message, self.loc)
    }

    /// A scalar expression.
    pub(super) fn expr(&mut self, node: NodeId) -> Result<Val, CompileError> {
        match self.value(node)? {
            Some(v) => Ok(v),
            None => Err(self.internal("expression has no value")),
        }
    }

    /// Any expression; `None` for void calls and complex initializers.
    pub(super) fn value(&mut self, node: NodeId) -> Result<Option<Val>, CompileError> {
        ensure_sufficient_stack(|| self.value_inner(node))
    }

    fn value_inner(&mut self, node: NodeId) -> Result<Option<Val>, CompileError> {
        let unit = self.unit;
        let ast = &unit.fe.ast;
        let loc = ast.loc(node);
        if !loc.is_synthetic() {
            self.loc = loc;
        }
        let ty = ast.ty(node);
        if let NodeKind::VariableRef {
            resolved: Some(symbol),
            ..
        } = ast.kind(node)
        {
            if let Storage::Constant(v) = unit.symbols.get(*symbol).storage {
                return Ok(Some(Val::Imm(v)));
            }
        }
        let value = match ast.kind(node) {
            NodeKind::Literal(v) => Val::Imm(*v),
            NodeKind::VariableRef { .. }
            | NodeKind::MemberAccess { .. }
            | NodeKind::Subscript { .. } => {
                let place = self.place(node)?;
                let v = self.read(&place)?;
                self.release_place(place);
                v
            }
            NodeKind::BinaryOp { op, lhs, rhs } => self.binary(*op, *lhs, *rhs, ty)?,
            NodeKind::UnaryOp { op, operand } if op.is_increment() => {
                self.increment(*op, *operand, true)?
            }
            NodeKind::UnaryOp { op, operand } => self.unary(*op, *operand)?,
            NodeKind::Assignment { op, target, value } => {
                return self.assign(*op, *target, *value)
            }
            NodeKind::Call(call) => return self.call(call),
            NodeKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => self.ternary(*cond, *then_expr, *else_expr, ty)?,
            NodeKind::Cast { operand, .. } => self.cast(*operand, ty)?,
            NodeKind::AddressOf(operand) => {
                let addr = self.address(*operand)?;
                self.pointer(addr)?
            }
            NodeKind::Inline(inline) => return self.inline(inline.body, ty),
            NodeKind::ComplexInit(init) => {
                self.complex_init(init)?;
                return Ok(None);
            }
            other => return Err(self.internal(format!("cannot evaluate {other:?}"))),
        };
        Ok(Some(value))
    }

    pub(super) fn move_into(&mut self, ty: NativeType, dst: RegId, value: Val) {
        if matches!(value, Val::Reg { id, .. } if id == dst) {
            return;
        }
        self.push(Inst::Move {
            ty,
            dst: self.reg(dst),
            src: self.operand(value),
        });
    }

    /// Convert between scalar types; immediates fold.
    pub(super) fn convert(
        &mut self,
        value: Val,
        from: NativeType,
        to: NativeType,
    ) -> Result<Val, CompileError> {
        if from == to {
            return Ok(value);
        }
        if let Val::Imm(v) = value {
            if let Some(converted) = v.cast(to) {
                return Ok(Val::Imm(converted));
            }
        }
        let (src, from) = self.to_reg(value)?;
        let src_reg = self.reg(src);
        self.pool.release(src);
        let dst = self.pool.temp(to)?;
        self.push(Inst::Convert {
            from,
            to,
            dst: self.reg(dst),
            src: src_reg,
        });
        Ok(Val::Reg { id: dst, ty: to })
    }

    // ── Places ──────────────────────────────────────────────────

    fn home(&self, symbol: SymbolId) -> Result<Home, CompileError> {
        self.homes
            .get(&symbol)
            .copied()
            .ok_or_else(|| self.internal(format!("{symbol:?} has no home")))
    }

    fn place(&mut self, node: NodeId) -> Result<Place, CompileError> {
        let unit = self.unit;
        let ast = &unit.fe.ast;
        let ty = self.scalar(ast.ty(node))?;
        match ast.kind(node) {
            NodeKind::VariableRef {
                resolved: Some(symbol),
                ..
            } => match unit.symbols.get(*symbol).storage {
                Storage::Global { offset } => Ok(Place::Global { offset, ty }),
                Storage::Local | Storage::Param { .. } => Ok(match self.home(*symbol)? {
                    Home::Register(id) => Place::Register { id, ty },
                    Home::Frame(at) => Place::Memory {
                        addr: Address::frame(at),
                        ty,
                        base: None,
                    },
                    Home::Pointer(id) => Place::Memory {
                        addr: Address::reg(self.reg(id)),
                        ty,
                        base: Some(id),
                    },
                }),
                other => Err(self.internal(format!("{other:?} is not assignable"))),
            },
            _ => {
                let Addr { addr, base } = self.address(node)?;
                Ok(match addr.base {
                    Base::Globals => Place::Global {
                        offset: addr.offset,
                        ty,
                    },
                    _ => Place::Memory { addr, ty, base },
                })
            }
        }
    }

    fn read(&mut self, place: &Place) -> Result<Val, CompileError> {
        Ok(match *place {
            Place::Register { id, ty } => Val::Reg { id, ty },
            Place::Global { offset, ty } => {
                let (id, load) = self.pool.global_read(offset, ty)?;
                if load {
                    self.push(Inst::Load {
                        ty,
                        dst: self.reg(id),
                        addr: Address::global(offset),
                    });
                    self.pool.loaded(id);
                }
                Val::Reg { id, ty }
            }
            Place::Memory { addr, ty, .. } => Val::Reg {
                id: self.load(ty, addr)?,
                ty,
            },
        })
    }

    /// Store `value` into `place`. The caller still owns `value`.
    pub(super) fn write(&mut self, place: &Place, value: Val) -> Result<(), CompileError> {
        match *place {
            Place::Register { id, ty } => self.move_into(ty, id, value),
            Place::Global { offset, ty } => {
                let dst = self.pool.global_write(offset, ty)?;
                self.push(Inst::Move {
                    ty,
                    dst: self.reg(dst),
                    src: self.operand(value),
                });
                self.pool.mark_dirty(dst);
            }
            Place::Memory { addr, ty, .. } => {
                let src = self.operand(value);
                self.store(ty, addr, src);
            }
        }
        Ok(())
    }

    fn release_place(&mut self, place: Place) {
        if let Place::Memory { base: Some(id), .. } = place {
            self.pool.release(id);
        }
    }

    // ── Addresses ───────────────────────────────────────────────

    /// Address of an lvalue or of `this`.
    pub(super) fn address(&mut self, node: NodeId) -> Result<Addr, CompileError> {
        let unit = self.unit;
        let ast = &unit.fe.ast;
        match ast.kind(node) {
            NodeKind::VariableRef {
                resolved: Some(symbol),
                ..
            } => match unit.symbols.get(*symbol).storage {
                Storage::Global { offset } => Ok(Addr::fixed(Address::global(offset))),
                Storage::Local | Storage::Param { .. } => match self.home(*symbol)? {
                    Home::Frame(at) => Ok(Addr::fixed(Address::frame(at))),
                    Home::Pointer(id) => Ok(Addr {
                        addr: Address::reg(self.reg(id)),
                        base: Some(id),
                    }),
                    Home::Register(_) => {
                        Err(self.internal(format!("{symbol:?} lives in a register")))
                    }
                },
                other => Err(self.internal(format!("{other:?} has no address"))),
            },
            // `this` outlives every use; it is never handed out for release.
            NodeKind::This => match self.this {
                Some(this) => Ok(Addr::fixed(Address::reg(self.reg(this)))),
                None => Err(self.internal("`this` outside a method")),
            },
            NodeKind::MemberAccess {
                object,
                resolved: Some(member),
                ..
            } => Ok(self.address(*object)?.plus(member.offset)),
            NodeKind::Subscript {
                object,
                index,
                policy,
            } => self.element(*object, *index, policy.unwrap_or(IndexPolicy::Checked)),
            NodeKind::Cast { operand, .. } => {
                let from = ast.ty(*operand).complex_id();
                let to = ast.ty(node).complex_id();
                let offset = match (from, to) {
                    (Some(from), Some(to)) => unit.fe.types.base_offset(from, to).unwrap_or(0),
                    _ => 0,
                };
                Ok(self.address(*operand)?.plus(offset))
            }
            other => Err(self.internal(format!("{other:?} is not addressable"))),
        }
    }

    fn element(
        &mut self,
        object: NodeId,
        index: NodeId,
        policy: IndexPolicy,
    ) -> Result<Addr, CompileError> {
        let unit = self.unit;
        let types = &unit.fe.types;
        let Some((element, len)) = types.container(unit.fe.ast.ty(object)) else {
            return Err(self.internal("subscript of a non-container"));
        };
        let stride = types.layout(element)?.stride();
        let base = self.address(object)?;
        let idx = self.expr(index)?;

        let (data, count) = match len {
            Some(len) => {
                let len = len as i32;
                let folded = match idx {
                    Val::Imm(v) => v.as_i32().and_then(|i| policy.apply(i, len)),
                    Val::Reg { .. } => None,
                };
                if let Some(k) = folded {
                    return Ok(base.plus(k as u32 * stride));
                }
                (self.pointer(base)?, Val::Imm(Value::Int(len)))
            }
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
        let base_reg = self.reg(data);
        let index_op = self.operand(idx);
        let len_op = self.operand(count);
        self.pool.release(data);
        self.release(idx);
        self.release(count);
        let dst = self.pool.temp(NativeType::Pointer)?;
        self.push(Inst::ElementAddr {
            dst: self.reg(dst),
            base: base_reg,
            index: index_op,
            len: len_op,
            stride,
            policy,
        });
        Ok(Addr {
            addr: Address::reg(self.reg(dst)),
            base: Some(dst),
        })
    }

    fn container_size(&mut self, object: NodeId) -> Result<Val, CompileError> {
        let ty = self.unit.fe.ast.ty(object);
        match self.unit.fe.types.container(ty) {
            Some((_, Some(len))) => Ok(Val::Imm(Value::Int(len as i32))),
            Some((_, None)) => {
                let base = self.address(object)?;
                let id = self.load(NativeType::Integer, base.addr.plus(DYN_LENGTH_OFFSET))?;
                self.release_addr(base);
                Ok(Val::Reg {
                    id,
                    ty: NativeType::Integer,
                })
            }
            None => Err(self.internal("size() of a non-container")),
        }
    }

    // ── Operators ───────────────────────────────────────────────

    fn binary(
        &mut self,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
        ty: TypeInfo,
    ) -> Result<Val, CompileError> {
        if op.is_logical() {
            return self.logical(op, lhs, rhs);
        }
        let operand_ty = self.scalar(self.unit.fe.ast.ty(lhs))?;
        let result_ty = self.scalar(ty)?;
        let mut l = self.expr(lhs)?;
        let mut r = self.expr(rhs)?;
        let mut op = op;
        if let (Val::Imm(_), Val::Reg { .. }) = (l, r) {
            if let Some(mirrored) = mirrored(op) {
                std::mem::swap(&mut l, &mut r);
                op = mirrored;
            }
        }
        self.arith(op, operand_ty, result_ty, l, r)
    }

    /// `dst = l op r` with `l` in a register.
    fn arith(
        &mut self,
        op: BinaryOp,
        operand_ty: NativeType,
        result_ty: NativeType,
        l: Val,
        r: Val,
    ) -> Result<Val, CompileError> {
        let (lid, _) = self.to_reg(l)?;
        // Integer division takes its divisor from a register.
        let r = match r {
            Val::Imm(_)
                if matches!(op, BinaryOp::Div | BinaryOp::Mod) && !operand_ty.is_floating() =>
            {
                let (id, ty) = self.to_reg(r)?;
                Val::Reg { id, ty }
            }
            _ => r,
        };
        let lhs = self.reg(lid);
        let rhs = self.operand(r);
        self.pool.release(lid);
        self.release(r);
        let dst = self.pool.temp(result_ty)?;
        self.push(Inst::Binary {
            op,
            ty: operand_ty,
            dst: self.reg(dst),
            lhs,
            rhs,
        });
        Ok(Val::Reg {
            id: dst,
            ty: result_ty,
        })
    }

    /// `&&` and `||` evaluate the right side only when needed.
    fn logical(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Result<Val, CompileError> {
        let dst = self.pool.temp(NativeType::Bool)?;
        let end = self.new_label();
        let l = self.expr(lhs)?;
        self.move_into(NativeType::Bool, dst, l);
        self.release(l);
        self.branch_on(dst, op == BinaryOp::Or, end);
        let r = self.expr(rhs)?;
        self.move_into(NativeType::Bool, dst, r);
        self.release(r);
        self.bind(end);
        Ok(Val::Reg {
            id: dst,
            ty: NativeType::Bool,
        })
    }

    fn unary(&mut self, op: UnaryOp, operand: NodeId) -> Result<Val, CompileError> {
        let v = self.expr(operand)?;
        if let Val::Imm(x) = v {
            if let Ok(folded) = Value::unary(op, x) {
                return Ok(Val::Imm(folded));
            }
        }
        let (src, ty) = self.to_reg(v)?;
        let src_reg = self.reg(src);
        self.pool.release(src);
        let result_ty = if op == UnaryOp::Not {
            NativeType::Bool
        } else {
            ty
        };
        let dst = self.pool.temp(result_ty)?;
        self.push(Inst::Unary {
            op,
            ty,
            dst: self.reg(dst),
            src: src_reg,
        });
        Ok(Val::Reg {
            id: dst,
            ty: result_ty,
        })
    }

    /// `++`/`--` as read, add, write. With `want` the result is the new
    /// value for prefix and the old one for postfix operators.
    pub(super) fn increment(
        &mut self,
        op: UnaryOp,
        operand: NodeId,
        want: bool,
    ) -> Result<Val, CompileError> {
        let Some(step) = op.step() else {
            return Err(self.internal(format!("{op:?} is not an increment")));
        };
        let place = self.place(operand)?;
        let ty = place.ty();
        let one = Value::Int(1)
            .cast(ty)
            .ok_or_else(|| self.internal("increment of a non-arithmetic value"))?;
        let cur = self.read(&place)?;
        let (cur, _) = self.to_reg(cur)?;
        let next = self.pool.temp(ty)?;
        self.push(Inst::Binary {
            op: step,
            ty,
            dst: self.reg(next),
            lhs: self.reg(cur),
            rhs: Operand::Imm(one),
        });
        let in_register = matches!(place, Place::Register { .. });
        let old = if want && op.is_postfix() && in_register {
            let old = self.pool.temp(ty)?;
            self.move_into(ty, old, Val::Reg { id: cur, ty });
            Some(old)
        } else if want && op.is_postfix() {
            Some(cur)
        } else {
            None
        };
        let next = Val::Reg { id: next, ty };
        self.write(&place, next)?;
        self.release_place(place);

        let result = match old {
            Some(old) => {
                self.release(next);
                if old != cur {
                    self.pool.release(cur);
                }
                Val::Reg { id: old, ty }
            }
            None => {
                self.pool.release(cur);
                match place {
                    Place::Register { id, ty } => {
                        self.release(next);
                        Val::Reg { id, ty }
                    }
                    _ => next,
                }
            }
        };
        if !want {
            self.release(result);
        }
        Ok(result)
    }

    fn cast(&mut self, operand: NodeId, ty: TypeInfo) -> Result<Val, CompileError> {
        let to = self.scalar(ty)?;
        let from = self.scalar(self.unit.fe.ast.ty(operand))?;
        let v = self.expr(operand)?;
        self.convert(v, from, to)
    }

    fn ternary(
        &mut self,
        cond: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
        ty: TypeInfo,
    ) -> Result<Val, CompileError> {
        let ty = self.scalar(ty)?;
        let dst = self.pool.temp(ty)?;
        let otherwise = self.new_label();
        let end = self.new_label();
        let c = self.expr(cond)?;
        self.branch(c, false, otherwise);
        let v = self.expr(then_expr)?;
        self.move_into(ty, dst, v);
        self.release(v);
        self.jump(end);
        self.bind(otherwise);
        let v = self.expr(else_expr)?;
        self.move_into(ty, dst, v);
        self.release(v);
        self.bind(end);
        Ok(Val::Reg { id: dst, ty })
    }

    // ── Assignment ──────────────────────────────────────────────

    pub(super) fn assign(
        &mut self,
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    ) -> Result<Option<Val>, CompileError> {
        let unit = self.unit;
        let target_ty = unit.fe.ast.ty(target);
        if unit.fe.types.scalar(target_ty).is_none() {
            let size = unit.fe.types.layout(target_ty.base())?.size;
            let dst = self.address(target)?;
            let src = self.address(value)?;
            self.copy(dst.addr, src.addr, size);
            self.release_addr(src);
            self.release_addr(dst);
            return Ok(None);
        }

        let place = self.place(target)?;
        let ty = place.ty();
        let result = match op.binary() {
            None => {
                let v = self.expr(value)?;
                self.write(&place, v)?;
                v
            }
            Some(binary) => {
                let common = self.scalar(unit.fe.ast.ty(value))?;
                let rhs = self.expr(value)?;
                let cur = self.read(&place)?;
                let cur = self.convert(cur, ty, common)?;
                let result_ty = if binary.is_comparison() {
                    NativeType::Bool
                } else {
                    common
                };
                let combined = self.arith(binary, common, result_ty, cur, rhs)?;
                let v = self.convert(combined, result_ty, ty)?;
                self.write(&place, v)?;
                v
            }
        };
        let out = match place {
            Place::Register { id, ty } => {
                self.release(result);
                Val::Reg { id, ty }
            }
            _ => result,
        };
        self.release_place(place);
        Ok(Some(out))
    }

    // ── Calls ───────────────────────────────────────────────────

    fn call(&mut self, call: &Call) -> Result<Option<Val>, CompileError> {
        match call.target {
            Some(CallTarget::ContainerSize) => {
                let object = call
                    .object
                    .ok_or_else(|| self.internal("size() without an object"))?;
                self.container_size(object).map(Some)
            }
            Some(CallTarget::Function(func)) => self.invoke(func, None, &call.args),
            Some(CallTarget::Method { func, base_offset }) => {
                let object = call
                    .object
                    .ok_or_else(|| self.internal("method call without an object"))?;
                let this = self.address(object)?.plus(base_offset);
                self.invoke(func, Some(this), &call.args)
            }
            None => Err(self.internal("call left unresolved")),
        }
    }

    /// Call `func`. Complex and reference parameters are passed by address.
    pub(super) fn invoke(
        &mut self,
        func: FunctionId,
        this: Option<Addr>,
        args: &[NodeId],
    ) -> Result<Option<Val>, CompileError> {
        let unit = self.unit;
        let data = unit.functions.get(func);
        let mut operands: SmallVec<[(NativeType, Operand); 4]> = SmallVec::new();
        let mut held: SmallVec<[Val; 4]> = SmallVec::new();
        if let Some(this) = this {
            let p = self.pointer(this)?;
            operands.push((NativeType::Pointer, self.operand(p)));
            held.push(p);
        }
        for (param, &arg) in data.params.iter().zip(args) {
            let by_address = param.is_ref() || unit.fe.types.scalar(*param).is_none();
            let (ty, v) = if by_address {
                let addr = self.address(arg)?;
                (NativeType::Pointer, self.pointer(addr)?)
            } else {
                (self.scalar(*param)?, self.expr(arg)?)
            };
            operands.push((ty, self.operand(v)));
            held.push(v);
        }

        self.flush();
        for v in held {
            self.release(v);
        }
        self.pool.drop_cache();
        let ret = match unit.fe.types.scalar(data.ret) {
            Some(ty) if !data.ret.is_void() => Some((ty, self.pool.temp(ty)?)),
            _ => None,
        };
        self.push(Inst::Call {
            func,
            args: operands,
            ret: ret.map(|(ty, id)| (ty, self.reg(id))),
        });
        Ok(ret.map(|(ty, id)| Val::Reg { id, ty }))
    }

    // ── Complex values ──────────────────────────────────────────

    /// Zero fill, field stores, then constructor calls.
    pub(super) fn complex_init(&mut self, init: &ComplexInit) -> Result<(), CompileError> {
        let unit = self.unit;
        let ty = unit.fe.ast.ty(init.target);
        let size = unit.fe.types.layout(ty.base())?.size;
        let target = self.address(init.target)?;
        self.zero(target.addr, size);
        for field in &init.fields {
            let v = self.expr(field.value)?;
            let addr = target.addr.plus(field.offset);
            let place = match addr.base {
                Base::Globals => Place::Global {
                    offset: addr.offset,
                    ty: field.ty,
                },
                _ => Place::Memory {
                    addr,
                    ty: field.ty,
                    base: None,
                },
            };
            self.write(&place, v)?;
            self.release(v);
        }
        for ctor in &init.ctors {
            // The target register outlives every constructor call.
            let this = Addr::fixed(target.addr.plus(ctor.offset));
            if let Some(v) = self.invoke(ctor.func, Some(this), &ctor.args)? {
                self.release(v);
            }
        }
        self.release_addr(target);
        Ok(())
    }

    /// Run the destructors of the value at `addr`.
    pub(super) fn destroy(&mut self, addr: Address, ty: TypeInfo) -> Result<(), CompileError> {
        for (offset, dtor) in self.unit.fe.types.destructor_calls(ty) {
            if let Some(v) = self.invoke(dtor, Some(Addr::fixed(addr.plus(offset))), &[])? {
                self.release(v);
            }
        }
        Ok(())
    }

    fn inline(&mut self, body: NodeId, ty: TypeInfo) -> Result<Option<Val>, CompileError> {
        let result = match self.unit.fe.types.scalar(ty) {
            Some(scalar) if !ty.is_void() => Some((scalar, self.pool.temp(scalar)?)),
            _ => None,
        };
        let end = self.new_label();
        self.inlines.push(InlineTarget {
            result,
            end,
            depth: self.blocks.len(),
        });
        self.stmt(body)?;
        self.inlines.pop();
        self.bind(end);
        Ok(result.map(|(ty, id)| Val::Reg { id, ty }))
    }
}

/// The operator with its operands swapped, if one exists.
fn mirrored(op: BinaryOp) -> Option<BinaryOp> {
    match op {
        _ if op.is_commutative() => Some(op),
        BinaryOp::Lt => Some(BinaryOp::Gt),
        BinaryOp::LtEq => Some(BinaryOp::GtEq),
        BinaryOp::Gt => Some(BinaryOp::Lt),
        BinaryOp::GtEq => Some(BinaryOp::LtEq),
        _ => None,
    }
}
