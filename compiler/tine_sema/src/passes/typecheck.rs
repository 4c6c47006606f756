//! TypeCheck: validate assignments, calls and returns, and make every
//! implicit conversion an explicit [`NodeKind::Cast`].
//!
//! A conversion is inserted by turning the converted node itself into a
//! cast of a copy, so parents never need to be patched. Literal operands
//! are converted in place instead.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    AssignOp, CallTarget, CodeLocation, ComplexInit, FieldInit, FunctionId, NativeType, NodeId,
    NodeKind, TypeInfo, UnaryOp, Value, VariableDef,
};
use tine_stack::ensure_sufficient_stack;
use tine_types::{DYN_DATA_OFFSET, DYN_LENGTH_OFFSET};

use super::{arithmetic_type, common_type, is_integer_like, is_lvalue};
use crate::symbols::Storage;
use crate::{FunctionContext, Unit};

pub(crate) fn run(unit: &mut Unit, root: NodeId, cx: FunctionContext) -> Result<(), CompileError> {
    Checker { unit, cx }.visit(root)
}

struct Checker<'u> {
    unit: &'u mut Unit,
    cx: FunctionContext,
}

impl Checker<'_> {
    fn visit(&mut self, node: NodeId) -> Result<(), CompileError> {
        ensure_sufficient_stack(|| self.visit_inner(node))
    }

    fn display(&self, ty: TypeInfo) -> String {
        self.unit.fe.types.display(ty, &self.unit.fe.interner)
    }

    fn ty(&self, node: NodeId) -> TypeInfo {
        self.unit.fe.ast.ty(node)
    }

    fn scalar(&self, node: NodeId) -> Option<NativeType> {
        self.unit.fe.types.scalar(self.ty(node))
    }

    #[allow(clippy::too_many_lines)]
    fn visit_inner(&mut self, node: NodeId) -> Result<(), CompileError> {
        let loc = self.unit.fe.ast.loc(node);
        match self.unit.fe.ast.kind(node).clone() {
            NodeKind::Block(block) => {
                let mut jumped: Option<&'static str> = None;
                for stmt in block.stmts {
                    let kind = self.unit.fe.ast.kind(stmt);
                    if let Some(jump) = jumped {
                        if !matches!(kind, NodeKind::Noop) {
                            return Err(CompileError::dead_code(
                                format!("unreachable code after `{jump}`"),
                                self.unit.fe.ast.loc(stmt),
                            ));
                        }
                    }
                    jumped = match kind {
                        NodeKind::Return { .. } => Some("return"),
                        NodeKind::Break => Some("break"),
                        NodeKind::Continue => Some("continue"),
                        _ => jumped,
                    };
                    self.visit(stmt)?;
                }
                Ok(())
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.condition(cond)?;
                self.visit(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.visit(else_branch)?;
                }
                Ok(())
            }
            NodeKind::While { cond, body, post } => {
                self.condition(cond)?;
                self.visit(body)?;
                if let Some(post) = post {
                    self.visit(post)?;
                }
                Ok(())
            }
            NodeKind::RangedFor(f) => {
                self.visit(f.range)?;
                self.visit(f.body)
            }
            NodeKind::Return { value, .. } => {
                let ret = self.cx.ret;
                match value {
                    Some(_) if ret.is_void() => Err(CompileError::type_error(
                        ErrorCode::E2003,
                        "a void function cannot return a value",
                        loc,
                    )),
                    Some(value) => {
                        self.visit(value)?;
                        self.coerce(value, ret)
                    }
                    None if !ret.is_void() => Err(CompileError::type_error(
                        ErrorCode::E2003,
                        format!("missing return value of type `{}`", self.display(ret)),
                        loc,
                    )),
                    None => Ok(()),
                }
            }
            NodeKind::VariableDef(def) => self.variable(node, &def, loc),
            NodeKind::BinaryOp { op, lhs, rhs } => {
                self.visit(lhs)?;
                self.visit(rhs)?;
                let (Some(a), Some(b)) = (self.scalar(lhs), self.scalar(rhs)) else {
                    return Ok(());
                };
                let operand = if op.is_logical() {
                    NativeType::Bool
                } else if op.is_comparison() {
                    common_type(a, b)
                } else if op.is_bitwise() {
                    NativeType::Integer
                } else {
                    arithmetic_type(a, b)
                };
                self.coerce(lhs, TypeInfo::native(operand))?;
                self.coerce(rhs, TypeInfo::native(operand))
            }
            NodeKind::UnaryOp { op, operand } => {
                self.visit(operand)?;
                match op {
                    UnaryOp::Neg => {
                        let to = self.ty(node);
                        self.coerce(operand, to)
                    }
                    UnaryOp::Not => self.coerce(operand, TypeInfo::bool()),
                    UnaryOp::BitNot => self.coerce(operand, TypeInfo::int()),
                    _ => self.assignable(operand, loc),
                }
            }
            NodeKind::Assignment { op, target, value } => {
                self.visit(target)?;
                self.visit(value)?;
                self.assignment(node, op, target, value, loc)
            }
            NodeKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.condition(cond)?;
                self.visit(then_expr)?;
                self.visit(else_expr)?;
                let to = self.ty(node);
                self.coerce(then_expr, to)?;
                self.coerce(else_expr, to)
            }
            NodeKind::Cast { operand, .. } | NodeKind::AddressOf(operand) => self.visit(operand),
            NodeKind::MemberAccess { object, .. } => self.visit(object),
            NodeKind::Subscript { object, index, .. } => {
                self.visit(object)?;
                self.visit(index)
            }
            NodeKind::Call(call) => {
                if let Some(object) = call.object {
                    self.visit(object)?;
                }
                for arg in &call.args {
                    self.visit(*arg)?;
                }
                match call.target {
                    Some(CallTarget::Function(func) | CallTarget::Method { func, .. }) => {
                        self.arguments(func, &call.args)
                    }
                    _ => Ok(()),
                }
            }
            NodeKind::ComplexInit(init) => {
                for field in &init.fields {
                    self.visit(field.value)?;
                    self.coerce(field.value, TypeInfo::native(field.ty))?;
                }
                for ctor in &init.ctors {
                    for arg in &ctor.args {
                        self.visit(*arg)?;
                    }
                    self.arguments(ctor.func, &ctor.args)?;
                }
                Ok(())
            }
            // Inlined bodies are checked against their callee's signature
            // when they are spliced in.
            NodeKind::Inline(_)
            | NodeKind::Literal(_)
            | NodeKind::VariableRef { .. }
            | NodeKind::This
            | NodeKind::InitializerList(_)
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Noop
            | NodeKind::FunctionDef(_)
            | NodeKind::ComplexTypeDef(_) => Ok(()),
        }
    }

    fn condition(&mut self, cond: NodeId) -> Result<(), CompileError> {
        self.visit(cond)?;
        self.coerce(cond, TypeInfo::bool())
    }

    /// Convert `node` to `to`, inserting a cast if the scalar types differ.
    fn coerce(&mut self, node: NodeId, to: TypeInfo) -> Result<(), CompileError> {
        let from = self.ty(node);
        let loc = self.unit.fe.ast.loc(node);
        if from.is_void() {
            return Err(CompileError::type_error(
                ErrorCode::E2003,
                "a void expression has no value",
                loc,
            ));
        }
        let types = &self.unit.fe.types;
        let (Some(f), Some(t)) = (types.scalar(from), types.scalar(to)) else {
            if from.same_base(to) {
                return Ok(());
            }
            return Err(CompileError::type_error(
                ErrorCode::E2003,
                format!(
                    "cannot convert `{}` to `{}`",
                    self.display(from),
                    self.display(to)
                ),
                loc,
            ));
        };
        if f == t {
            return Ok(());
        }
        if f == NativeType::Pointer || t == NativeType::Pointer {
            return Err(CompileError::type_error(
                ErrorCode::E2003,
                "addresses do not convert to numbers",
                loc,
            ));
        }
        let target = TypeInfo::native(t);
        if let Some(value) = self.unit.fe.ast.literal(node).and_then(|v| v.cast(t)) {
            self.unit.fe.ast.replace(node, NodeKind::Literal(value));
            self.unit.fe.ast.set_ty(node, target);
            return Ok(());
        }
        if t != NativeType::Bool && t.promotion_rank() < f.promotion_rank() {
            self.unit.warn(
                ErrorCode::E2101,
                format!(
                    "implicit conversion from `{}` to `{}` may lose precision",
                    f.name(),
                    t.name()
                ),
                loc,
            );
        }
        let moved = self.unit.fe.ast.get(node).clone();
        let inner = self.unit.fe.ast.push_typed(moved.kind, loc, moved.ty);
        self.unit.fe.ast.replace(
            node,
            NodeKind::Cast {
                operand: inner,
                target,
                implicit: true,
            },
        );
        self.unit.fe.ast.set_ty(node, target);
        Ok(())
    }

    /// `target` must be writable storage.
    fn assignable(&self, target: NodeId, loc: CodeLocation) -> Result<(), CompileError> {
        if !is_lvalue(&self.unit.fe.ast, target) {
            return Err(CompileError::type_error(
                ErrorCode::E2005,
                "expression is not assignable",
                loc,
            ));
        }
        if self.ty(target).is_const() {
            return Err(CompileError::type_error(
                ErrorCode::E2004,
                "cannot assign to a constant",
                loc,
            ));
        }
        Ok(())
    }

    fn assignment(
        &mut self,
        node: NodeId,
        op: AssignOp,
        target: NodeId,
        value: NodeId,
        loc: CodeLocation,
    ) -> Result<(), CompileError> {
        self.assignable(target, loc)?;
        let target_ty = self.ty(target);
        let Some(t) = self.unit.fe.types.scalar(target_ty) else {
            if op != AssignOp::Assign {
                return Err(CompileError::type_error(
                    ErrorCode::E2003,
                    format!(
                        "compound assignment to `{}` is not supported",
                        self.display(target_ty)
                    ),
                    loc,
                ));
            }
            if let Some(init) = self.dyn_view(target, target_ty, value, loc)? {
                self.unit.fe.ast.replace_with(node, init);
                return Ok(());
            }
            return self.coerce(value, target_ty);
        };
        match op.binary() {
            None => self.coerce(value, target_ty.base()),
            Some(binary) => {
                let Some(v) = self.scalar(value) else {
                    return self.coerce(value, target_ty.base());
                };
                let common = if binary.is_bitwise() {
                    if !(is_integer_like(t) && is_integer_like(v)) {
                        return Err(CompileError::type_error(
                            ErrorCode::E2003,
                            format!("operator `{binary}=` needs integer operands"),
                            loc,
                        ));
                    }
                    NativeType::Integer
                } else {
                    arithmetic_type(t, v)
                };
                self.coerce(value, TypeInfo::native(common))
            }
        }
    }

    /// Lower `dyn = span` into stores of the span's length and address.
    fn dyn_view(
        &mut self,
        target: NodeId,
        target_ty: TypeInfo,
        value: NodeId,
        loc: CodeLocation,
    ) -> Result<Option<NodeId>, CompileError> {
        let value_ty = self.ty(value);
        let types = &self.unit.fe.types;
        if !types.is_dyn(target_ty) {
            return Ok(None);
        }
        let (Some((target_element, None)), Some((element, Some(len)))) =
            (types.container(target_ty), types.container(value_ty))
        else {
            return Ok(None);
        };
        if !target_element.same_base(element) {
            return Ok(None);
        }
        if !is_lvalue(&self.unit.fe.ast, value) {
            return Err(CompileError::type_error(
                ErrorCode::E2005,
                "a dyn view needs addressable storage",
                loc,
            ));
        }
        let ast = &mut self.unit.fe.ast;
        let len = ast.push_typed(
            NodeKind::Literal(Value::Int(i32::try_from(len).unwrap_or(i32::MAX))),
            loc,
            TypeInfo::int(),
        );
        let address = ast.push_typed(
            NodeKind::AddressOf(value),
            loc,
            TypeInfo::native(NativeType::Pointer),
        );
        let init = ComplexInit {
            target,
            fields: vec![
                FieldInit {
                    offset: DYN_LENGTH_OFFSET,
                    ty: NativeType::Integer,
                    value: len,
                },
                FieldInit {
                    offset: DYN_DATA_OFFSET,
                    ty: NativeType::Pointer,
                    value: address,
                },
            ],
            ctors: Vec::new(),
        };
        Ok(Some(ast.push_typed(
            NodeKind::ComplexInit(init),
            loc,
            target_ty.base(),
        )))
    }

    fn variable(
        &mut self,
        node: NodeId,
        def: &VariableDef,
        loc: CodeLocation,
    ) -> Result<(), CompileError> {
        if let Some(init) = def.init {
            self.visit(init)?;
        }
        let (Some(symbol), Some(init)) = (def.resolved, def.init) else {
            return Ok(());
        };
        let entry = self.unit.symbols.get(symbol);
        let ty = entry.ty();
        if ty.is_static() || matches!(entry.storage, Storage::Constant(_)) {
            return Ok(());
        }
        if ty.is_ref() {
            let init_ty = self.ty(init);
            if !is_lvalue(&self.unit.fe.ast, init) {
                return Err(CompileError::type_error(
                    ErrorCode::E2005,
                    "a reference must bind to a variable",
                    loc,
                ));
            }
            if !init_ty.same_base(ty) {
                return Err(CompileError::type_error(
                    ErrorCode::E2003,
                    format!(
                        "a reference to `{}` cannot bind `{}`",
                        self.display(ty),
                        self.display(init_ty)
                    ),
                    loc,
                ));
            }
            if init_ty.is_const() && !ty.is_const() {
                return Err(CompileError::type_error(
                    ErrorCode::E2004,
                    "a mutable reference cannot bind a constant",
                    loc,
                ));
            }
            return Ok(());
        }
        if matches!(self.unit.fe.ast.kind(init), NodeKind::ComplexInit(_)) {
            return Ok(());
        }
        if self.unit.fe.types.is_dyn(ty) {
            let id = def.symbol.id.clone();
            let target = self.unit.fe.ast.push_typed(
                NodeKind::VariableRef {
                    id,
                    resolved: Some(symbol),
                },
                loc,
                ty,
            );
            if let Some(view) = self.dyn_view(target, ty, init, loc)? {
                if let NodeKind::VariableDef(def) = self.unit.fe.ast.kind_mut(node) {
                    def.init = Some(view);
                }
                return Ok(());
            }
        }
        self.coerce(init, ty.base())
    }

    /// Convert call arguments to the parameter types of `func`.
    fn arguments(&mut self, func: FunctionId, args: &[NodeId]) -> Result<(), CompileError> {
        if !func.is_valid() {
            return Ok(());
        }
        let params = self.unit.functions.get(func).params.clone();
        for (param, arg) in params.iter().zip(args) {
            let loc = self.unit.fe.ast.loc(*arg);
            let is_scalar = self.unit.fe.types.scalar(*param).is_some();
            if !is_scalar || param.is_ref() {
                // Passed by address.
                let ast = &self.unit.fe.ast;
                if !is_lvalue(ast, *arg) && !matches!(ast.kind(*arg), NodeKind::This) {
                    return Err(CompileError::type_error(
                        ErrorCode::E2005,
                        "argument must be a variable",
                        loc,
                    ));
                }
                if param.is_ref() && !param.is_const() && self.ty(*arg).is_const() {
                    return Err(CompileError::type_error(
                        ErrorCode::E2004,
                        "a constant cannot be passed by mutable reference",
                        loc,
                    ));
                }
                if is_scalar && !self.ty(*arg).same_base(*param) {
                    return Err(CompileError::type_error(
                        ErrorCode::E2003,
                        format!(
                            "reference parameter of type `{}` cannot bind `{}`",
                            self.display(*param),
                            self.display(self.ty(*arg))
                        ),
                        loc,
                    ));
                }
                continue;
            }
            self.coerce(*arg, param.base())?;
        }
        Ok(())
    }
}
