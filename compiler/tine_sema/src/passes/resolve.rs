//! ResolvingSymbols: bind every name and compute every expression type.
//!
//! Names resolve innermost scope first, then members of the struct whose
//! method is being compiled (rewritten as `this.member`), then globals.
//! Calls are bound to one overload here; implicit conversions are left to
//! the type check. Running the pass twice over a tree is harmless, which
//! matters for call arguments spliced into inlined bodies.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    Call, CallTarget, CodeLocation, ComplexTypeId, CtorCall, FunctionId, FunctionKind,
    MemberRef, Name, NamespacedIdentifier, NativeType, NodeId, NodeKind, ScopeId, StringInterner,
    SymbolId, TemplateArg, TypeFlags, TypeInfo, UnaryOp, VariableDef, Visibility,
};
use tine_parse::{instantiate_function, TemplateDecl, TemplateParamKind};
use tine_stack::ensure_sufficient_stack;
use tracing::debug;

use super::{arithmetic_type, common_type, is_integer_like};
use crate::functions::FunctionData;
use crate::scope::ScopeKind;
use crate::symbols::Storage;
use crate::{FunctionContext, Pass, Unit};

pub(crate) fn run(
    unit: &mut Unit,
    root: NodeId,
    scope: ScopeId,
    cx: FunctionContext,
) -> Result<(), CompileError> {
    let namespace = unit.namespace_of(cx.func);
    Resolver {
        unit,
        cx,
        namespace,
    }
    .visit(root, scope)
    .map(|_| ())
}

/// What a plain name refers to.
enum Binding {
    Symbol(SymbolId),
    Member(ComplexTypeId, MemberRef),
}

struct Resolver<'u> {
    unit: &'u mut Unit,
    cx: FunctionContext,
    /// Where unqualified and relative global names are looked up first.
    namespace: NamespacedIdentifier,
}

impl Resolver<'_> {
    fn visit(&mut self, node: NodeId, scope: ScopeId) -> Result<TypeInfo, CompileError> {
        let ty = ensure_sufficient_stack(|| self.visit_inner(node, scope))?;
        self.unit.fe.ast.set_ty(node, ty);
        Ok(ty)
    }

    fn display(&self, ty: TypeInfo) -> String {
        self.unit.fe.types.display(ty, &self.unit.fe.interner)
    }

    fn name(&self, name: Name) -> &str {
        self.unit.fe.interner.lookup(name)
    }

    #[allow(clippy::too_many_lines)]
    fn visit_inner(&mut self, node: NodeId, scope: ScopeId) -> Result<TypeInfo, CompileError> {
        let loc = self.unit.fe.ast.loc(node);
        let current = self.unit.fe.ast.ty(node);
        match self.unit.fe.ast.kind(node).clone() {
            NodeKind::Block(block) => {
                let inner = block.scope.unwrap_or(scope);
                for stmt in block.stmts {
                    self.visit(stmt, inner)?;
                }
                Ok(TypeInfo::void())
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit(cond, scope)?;
                self.visit(then_branch, scope)?;
                if let Some(else_branch) = else_branch {
                    self.visit(else_branch, scope)?;
                }
                Ok(TypeInfo::void())
            }
            NodeKind::While { cond, body, post } => {
                self.visit(cond, scope)?;
                self.visit(body, scope)?;
                if let Some(post) = post {
                    self.visit(post, scope)?;
                }
                Ok(TypeInfo::void())
            }
            NodeKind::RangedFor(f) => {
                let range = self.visit(f.range, scope)?;
                let Some((element, _)) = self.unit.fe.types.container(range) else {
                    return Err(CompileError::type_error(
                        ErrorCode::E2003,
                        format!("cannot iterate over `{}`", self.display(range)),
                        loc,
                    ));
                };
                if let Some(iterator) = f.resolved {
                    let declared = self.unit.symbols.get(iterator).ty();
                    if declared.is_unresolved() {
                        self.unit.symbols.resolve_type(iterator, element.base());
                    } else if f.by_ref && !declared.same_base(element) {
                        return Err(CompileError::type_error(
                            ErrorCode::E2003,
                            format!(
                                "a reference to `{}` cannot bind elements of type `{}`",
                                self.display(declared),
                                self.display(element)
                            ),
                            loc,
                        ));
                    } else if self.unit.fe.types.scalar(declared).is_none()
                        && !declared.same_base(element)
                    {
                        return Err(CompileError::type_error(
                            ErrorCode::E2003,
                            format!(
                                "elements of type `{}` are not `{}`",
                                self.display(element),
                                self.display(declared)
                            ),
                            loc,
                        ));
                    }
                    self.unit.symbols.get_mut(iterator).visible = true;
                }
                self.visit(f.body, f.scope.unwrap_or(scope))?;
                Ok(TypeInfo::void())
            }
            NodeKind::Return { value, .. } => {
                if let Some(value) = value {
                    self.visit(value, scope)?;
                }
                Ok(TypeInfo::void())
            }
            NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Noop
            | NodeKind::FunctionDef(_)
            | NodeKind::ComplexTypeDef(_) => Ok(TypeInfo::void()),
            NodeKind::VariableDef(def) => self.variable(node, def, scope, loc),
            NodeKind::Literal(value) => Ok(TypeInfo::native(value.native_type())),
            NodeKind::VariableRef { id, resolved } => {
                if let Some(symbol) = resolved {
                    return Ok(self.symbol_type(symbol));
                }
                let name = id.id();
                match self.lookup(&id, scope, loc)? {
                    Some(Binding::Symbol(symbol)) => {
                        if self.unit.symbols.get(symbol).storage == Storage::Function {
                            return Err(CompileError::type_error(
                                ErrorCode::E2003,
                                format!("function `{}` used as a value", self.name(name)),
                                loc,
                            ));
                        }
                        self.unit.fe.ast.replace(
                            node,
                            NodeKind::VariableRef {
                                id,
                                resolved: Some(symbol),
                            },
                        );
                        Ok(self.symbol_type(symbol))
                    }
                    Some(Binding::Member(owner, member)) => {
                        let this = self.this_node(owner, loc);
                        self.unit.fe.ast.replace(
                            node,
                            NodeKind::MemberAccess {
                                object: this,
                                member: name,
                                resolved: Some(member),
                            },
                        );
                        Ok(member.ty)
                    }
                    None => Err(CompileError::type_error(
                        ErrorCode::E2001,
                        format!(
                            "unknown identifier `{}`",
                            id.display(&self.unit.fe.interner)
                        ),
                        loc,
                    )),
                }
            }
            NodeKind::This if current.complex_id().is_some() => Ok(current),
            NodeKind::This => match self.cx.owner {
                Some(owner) => Ok(TypeInfo::complex(owner).as_reference()),
                None => Err(CompileError::type_error(
                    ErrorCode::E2001,
                    "`this` used outside a member function",
                    loc,
                )),
            },
            NodeKind::BinaryOp { op, lhs, rhs } => {
                let l = self.visit(lhs, scope)?;
                let r = self.visit(rhs, scope)?;
                let types = &self.unit.fe.types;
                let (Some(a), Some(b)) = (types.scalar(l), types.scalar(r)) else {
                    return Err(CompileError::type_error(
                        ErrorCode::E2003,
                        format!(
                            "operator `{op}` cannot be applied to `{}` and `{}`",
                            self.display(l),
                            self.display(r)
                        ),
                        loc,
                    ));
                };
                if op.is_logical() || op.is_comparison() {
                    Ok(TypeInfo::bool())
                } else if op.is_bitwise() {
                    if is_integer_like(a) && is_integer_like(b) {
                        Ok(TypeInfo::int())
                    } else {
                        Err(CompileError::type_error(
                            ErrorCode::E2003,
                            format!("operator `{op}` needs integer operands"),
                            loc,
                        ))
                    }
                } else if a.is_arithmetic() && b.is_arithmetic() {
                    Ok(TypeInfo::native(arithmetic_type(a, b)))
                } else {
                    Err(CompileError::type_error(
                        ErrorCode::E2003,
                        format!("operator `{op}` cannot be applied to these operands"),
                        loc,
                    ))
                }
            }
            NodeKind::UnaryOp { op, operand } => {
                let ty = self.visit(operand, scope)?;
                let Some(scalar) = self.unit.fe.types.scalar(ty).filter(|n| n.is_arithmetic())
                else {
                    return Err(CompileError::type_error(
                        ErrorCode::E2003,
                        format!("unary operator cannot be applied to `{}`", self.display(ty)),
                        loc,
                    ));
                };
                match op {
                    UnaryOp::Neg => Ok(TypeInfo::native(arithmetic_type(scalar, scalar))),
                    UnaryOp::Not => Ok(TypeInfo::bool()),
                    UnaryOp::BitNot if is_integer_like(scalar) => Ok(TypeInfo::int()),
                    UnaryOp::BitNot => Err(CompileError::type_error(
                        ErrorCode::E2003,
                        "operator `~` needs an integer operand",
                        loc,
                    )),
                    _ => Ok(ty.without_flags(TypeFlags::REF)),
                }
            }
            NodeKind::Assignment { target, value, .. } => {
                let ty = self.visit(target, scope)?;
                self.visit(value, scope)?;
                Ok(ty.without_flags(TypeFlags::REF))
            }
            NodeKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.visit(cond, scope)?;
                let a = self.visit(then_expr, scope)?;
                let b = self.visit(else_expr, scope)?;
                let types = &self.unit.fe.types;
                match (types.scalar(a), types.scalar(b)) {
                    (Some(x), Some(y)) => Ok(TypeInfo::native(common_type(x, y))),
                    _ => Err(CompileError::type_error(
                        ErrorCode::E2012,
                        "conditional expressions must produce scalars",
                        loc,
                    )),
                }
            }
            NodeKind::Cast {
                operand, target, ..
            } => {
                let from = self.visit(operand, scope)?;
                let types = &self.unit.fe.types;
                let scalar = |t: TypeInfo| types.scalar(t).filter(|n| n.is_arithmetic());
                if scalar(from).is_some() && scalar(target).is_some() {
                    Ok(target.base())
                } else {
                    Err(CompileError::type_error(
                        ErrorCode::E2010,
                        format!(
                            "cannot convert `{}` to `{}`",
                            self.display(from),
                            self.display(target)
                        ),
                        loc,
                    ))
                }
            }
            NodeKind::MemberAccess {
                object,
                member,
                resolved,
            } => {
                let object_ty = self.visit(object, scope)?;
                if let Some(resolved) = resolved {
                    return Ok(if object_ty.is_const() {
                        resolved.ty.as_const()
                    } else {
                        resolved.ty
                    });
                }
                let lookup = match object_ty.complex_id() {
                    Some(id) if self.unit.fe.types.as_struct(id).is_some() => self
                        .unit
                        .fe
                        .types
                        .find_member(id, member)
                        .map_err(|e| e.or_at(loc))?,
                    _ => None,
                };
                let Some(lookup) = lookup else {
                    return Err(CompileError::type_error(
                        ErrorCode::E2007,
                        format!(
                            "`{}` has no member `{}`",
                            self.display(object_ty),
                            self.name(member)
                        ),
                        loc,
                    ));
                };
                self.check_access(lookup.visibility, lookup.owner, member, loc)?;
                let resolved = MemberRef {
                    offset: lookup.offset,
                    ty: lookup.ty,
                };
                self.unit.fe.ast.replace(
                    node,
                    NodeKind::MemberAccess {
                        object,
                        member,
                        resolved: Some(resolved),
                    },
                );
                Ok(if object_ty.is_const() {
                    lookup.ty.as_const()
                } else {
                    lookup.ty
                })
            }
            NodeKind::Subscript { object, index, .. } => {
                let object_ty = self.visit(object, scope)?;
                let index_ty = self.visit(index, scope)?;
                let types = &self.unit.fe.types;
                let Some((element, len)) = types.container(object_ty) else {
                    return Err(CompileError::type_error(
                        ErrorCode::E2003,
                        format!("`{}` cannot be indexed", self.display(object_ty)),
                        loc,
                    ));
                };
                let Some(policy) = types.index_policy(index_ty) else {
                    return Err(CompileError::type_error(
                        ErrorCode::E2003,
                        format!("`{}` is not an index type", self.display(index_ty)),
                        loc,
                    ));
                };
                if let (Some(limit), Some(len)) = (types.index_limit(index_ty), len) {
                    if i64::from(limit) > i64::from(len) {
                        return Err(CompileError::type_error(
                            ErrorCode::E2003,
                            format!("index range {limit} exceeds the container length {len}"),
                            loc,
                        ));
                    }
                }
                self.unit.fe.ast.replace(
                    node,
                    NodeKind::Subscript {
                        object,
                        index,
                        policy: Some(policy),
                    },
                );
                Ok(if object_ty.is_const() {
                    element.as_const()
                } else {
                    element
                })
            }
            NodeKind::InitializerList(_) => Err(CompileError::type_error(
                ErrorCode::E2012,
                "an initializer list is not allowed here",
                loc,
            )),
            NodeKind::ComplexInit(mut init) => {
                self.visit(init.target, scope)?;
                for field in &init.fields {
                    self.visit(field.value, scope)?;
                }
                for ctor in &mut init.ctors {
                    let mut args = Vec::with_capacity(ctor.args.len());
                    for arg in &ctor.args {
                        args.push(self.visit(*arg, scope)?);
                    }
                    if !ctor.func.is_valid() {
                        ctor.func = self.constructor(current, ctor, &args, loc)?;
                    }
                }
                self.unit.fe.ast.replace(node, NodeKind::ComplexInit(init));
                Ok(current)
            }
            NodeKind::Inline(inline) => {
                self.visit(inline.body, scope)?;
                Ok(current)
            }
            NodeKind::AddressOf(operand) => {
                self.visit(operand, scope)?;
                Ok(TypeInfo::native(NativeType::Pointer))
            }
            NodeKind::Call(call) => self.call(node, call, scope, loc),
        }
    }

    fn symbol_type(&self, symbol: SymbolId) -> TypeInfo {
        self.unit
            .symbols
            .get(symbol)
            .ty()
            .without_flags(TypeFlags::REF | TypeFlags::STATIC)
    }

    fn this_node(&mut self, owner: ComplexTypeId, loc: CodeLocation) -> NodeId {
        let ty = TypeInfo::complex(owner).as_reference();
        self.unit.fe.ast.push_typed(NodeKind::This, loc, ty)
    }

    fn check_access(
        &self,
        visibility: Visibility,
        owner: ComplexTypeId,
        name: Name,
        loc: CodeLocation,
    ) -> Result<(), CompileError> {
        if visibility == Visibility::Private && self.cx.owner != Some(owner) {
            return Err(CompileError::type_error(
                ErrorCode::E2009,
                format!("`{}` is private", self.name(name)),
                loc,
            ));
        }
        Ok(())
    }

    /// Innermost local, then a member of the current struct, then a global
    /// from the innermost enclosing namespace outwards. Qualified names
    /// only ever bind globals.
    fn lookup(
        &self,
        id: &NamespacedIdentifier,
        scope: ScopeId,
        loc: CodeLocation,
    ) -> Result<Option<Binding>, CompileError> {
        if !id.is_plain() {
            return Ok(self
                .unit
                .find_global(&self.namespace, id)
                .map(Binding::Symbol));
        }
        let name = id.id();
        let symbols = &self.unit.symbols;
        for (_, s) in self.unit.scopes.ancestors(scope) {
            if s.kind == ScopeKind::Global {
                break;
            }
            if let Some(symbol) = s.get(name).filter(|id| symbols.get(*id).visible) {
                return Ok(Some(Binding::Symbol(symbol)));
            }
        }
        if let Some(owner) = self.cx.owner {
            let member = self
                .unit
                .fe
                .types
                .find_member(owner, name)
                .map_err(|e| e.or_at(loc))?;
            if let Some(member) = member {
                self.check_access(member.visibility, member.owner, name, loc)?;
                return Ok(Some(Binding::Member(
                    owner,
                    MemberRef {
                        offset: member.offset,
                        ty: member.ty,
                    },
                )));
            }
        }
        Ok(self
            .unit
            .find_global(&self.namespace, id)
            .map(Binding::Symbol))
    }

    fn variable(
        &mut self,
        node: NodeId,
        mut def: VariableDef,
        scope: ScopeId,
        loc: CodeLocation,
    ) -> Result<TypeInfo, CompileError> {
        // A class-level initializer sees the names of its own namespace.
        let inner = match def.symbol.id.parent() {
            Some(ns) if self.cx.func.is_none() => ns,
            _ => self.namespace.clone(),
        };
        let outer = std::mem::replace(&mut self.namespace, inner);
        let init = self.initializers(&def, scope);
        self.namespace = outer;
        let init = init?;
        let Some(symbol) = def.resolved else {
            return Ok(TypeInfo::void());
        };
        let declared = self.unit.symbols.get(symbol).ty();
        if declared.is_unresolved() {
            let Some(init) = init.filter(|t| !t.is_void()) else {
                return Err(CompileError::type_error(
                    ErrorCode::E2011,
                    format!(
                        "cannot deduce the type of `{}`",
                        self.name(def.symbol.id.id())
                    ),
                    loc,
                ));
            };
            self.unit.symbols.resolve_type(symbol, init.base());
            def.symbol.ty = self.unit.symbols.get(symbol).ty();
            self.unit.fe.ast.replace(node, NodeKind::VariableDef(def));
        }
        self.unit.symbols.get_mut(symbol).visible = true;
        Ok(TypeInfo::void())
    }

    fn initializers(
        &mut self,
        def: &VariableDef,
        scope: ScopeId,
    ) -> Result<Option<TypeInfo>, CompileError> {
        let init = match def.init {
            Some(init) => Some(self.visit(init, scope)?),
            None => None,
        };
        for arg in def.ctor_args.clone().unwrap_or_default() {
            self.visit(arg, scope)?;
        }
        Ok(init)
    }

    fn constructor(
        &self,
        ty: TypeInfo,
        ctor: &CtorCall,
        args: &[TypeInfo],
        loc: CodeLocation,
    ) -> Result<FunctionId, CompileError> {
        let candidates = ty
            .complex_id()
            .and_then(|id| self.unit.fe.types.as_struct(id))
            .map(|s| s.constructors.clone())
            .unwrap_or_default();
        if candidates.is_empty() {
            return Err(CompileError::type_error(
                ErrorCode::E2002,
                format!(
                    "`{}` has no constructor taking {} argument(s)",
                    self.display(ty),
                    ctor.args.len()
                ),
                loc,
            ));
        }
        self.unit.functions.resolve(
            &self.unit.fe.types,
            &self.unit.fe.interner,
            &candidates,
            args,
            loc,
        )
    }

    fn call(
        &mut self,
        node: NodeId,
        mut call: Call,
        scope: ScopeId,
        loc: CodeLocation,
    ) -> Result<TypeInfo, CompileError> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.visit(*arg, scope)?);
        }
        if let Some(object) = call.object {
            let object_ty = self.visit(object, scope)?;
            if call.target.is_none() {
                self.method_call(&mut call, object_ty, &args, loc)?;
            }
        } else if call.target.is_none() {
            self.free_call(&mut call, &args, loc)?;
        }
        let ty = match call.target {
            Some(CallTarget::ContainerSize) => TypeInfo::int(),
            Some(CallTarget::Function(func) | CallTarget::Method { func, .. }) => {
                self.unit.functions.get(func).ret.base()
            }
            None => return Err(CompileError::internal("call left unresolved", loc)),
        };
        self.unit.fe.ast.replace(node, NodeKind::Call(call));
        Ok(ty)
    }

    fn method_call(
        &mut self,
        call: &mut Call,
        object_ty: TypeInfo,
        args: &[TypeInfo],
        loc: CodeLocation,
    ) -> Result<(), CompileError> {
        let name = call.callee.id();
        let types = &self.unit.fe.types;
        if call.callee.is_plain()
            && self.name(name) == "size"
            && args.is_empty()
            && types.container(object_ty).is_some()
        {
            call.target = Some(CallTarget::ContainerSize);
            return Ok(());
        }
        let lookup = match object_ty.complex_id() {
            Some(id) if types.as_struct(id).is_some() => {
                types.find_methods(id, name).map_err(|e| e.or_at(loc))?
            }
            _ => None,
        };
        let Some(lookup) = lookup else {
            return Err(CompileError::type_error(
                ErrorCode::E2007,
                format!(
                    "`{}` has no method `{}`",
                    self.display(object_ty),
                    self.name(name)
                ),
                loc,
            ));
        };
        let func = self.unit.functions.resolve(
            &self.unit.fe.types,
            &self.unit.fe.interner,
            &lookup.overloads,
            args,
            loc,
        )?;
        let visibility = self
            .unit
            .functions
            .get(func)
            .decl()
            .map_or(Visibility::Public, |d| d.visibility);
        self.check_access(visibility, lookup.owner, name, loc)?;
        call.target = Some(CallTarget::Method {
            func,
            base_offset: lookup.base_offset,
        });
        Ok(())
    }

    fn free_call(
        &mut self,
        call: &mut Call,
        args: &[TypeInfo],
        loc: CodeLocation,
    ) -> Result<(), CompileError> {
        let name = call.callee.id();
        if call.callee.is_plain() && call.template_args.is_empty() {
            if let Some(owner) = self.cx.owner {
                let own = self
                    .unit
                    .fe
                    .types
                    .find_methods(owner, name)
                    .map_err(|e| e.or_at(loc))?;
                if own.is_some() {
                    call.object = Some(self.this_node(owner, loc));
                    return self.method_call(call, TypeInfo::complex(owner), args, loc);
                }
            }
        }

        let functions = &self.unit.functions;
        let callee = self
            .namespace
            .ancestors()
            .map(|ns| ns.join(&call.callee))
            .find(|id| !functions.class(id).is_empty())
            .unwrap_or_else(|| call.callee.clone());
        let class: Vec<FunctionId> = functions
            .class(&callee)
            .iter()
            .copied()
            .filter(|f| functions.get(*f).instance_of.is_none())
            .collect();
        if class.iter().any(|f| {
            matches!(
                functions.get(*f).kind,
                FunctionKind::Constructor | FunctionKind::Destructor
            )
        }) {
            return Err(CompileError::type_error(
                ErrorCode::E2012,
                "constructors and destructors cannot be called directly",
                loc,
            ));
        }
        let is_template =
            call.callee.is_plain() && self.unit.fe.function_templates.contains_key(&name);
        let func = if !call.template_args.is_empty() || (class.is_empty() && is_template) {
            self.template_call(name, &call.template_args, args, loc)?
        } else if class.is_empty() {
            return Err(CompileError::type_error(
                ErrorCode::E2001,
                format!(
                    "unknown function `{}`",
                    call.callee.display(&self.unit.fe.interner)
                ),
                loc,
            ));
        } else {
            self.unit.functions.resolve(
                &self.unit.fe.types,
                &self.unit.fe.interner,
                &class,
                args,
                loc,
            )?
        };
        call.target = Some(CallTarget::Function(func));
        Ok(())
    }

    /// Pick a template of `name` that accepts the call, instantiating it
    /// on first use.
    fn template_call(
        &mut self,
        name: Name,
        explicit: &[TemplateArg],
        args: &[TypeInfo],
        loc: CodeLocation,
    ) -> Result<FunctionId, CompileError> {
        let templates = self
            .unit
            .fe
            .function_templates
            .get(&name)
            .cloned()
            .unwrap_or_default();
        let mut last_error = None;
        for template in &templates {
            let bound = if explicit.is_empty() {
                deduce(template, args, &self.unit.fe.interner, loc)
            } else {
                Ok(explicit.to_vec())
            };
            let attempt = bound
                .and_then(|bound| self.instance(template, &bound, loc))
                .and_then(|func| {
                    self.unit.functions.resolve(
                        &self.unit.fe.types,
                        &self.unit.fe.interner,
                        &[func],
                        args,
                        loc,
                    )
                });
            match attempt {
                Ok(func) => return Ok(func),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            CompileError::type_error(
                ErrorCode::E2001,
                format!("unknown function template `{}`", self.name(name)),
                loc,
            )
        }))
    }

    fn instance(
        &mut self,
        template: &TemplateDecl,
        args: &[TemplateArg],
        loc: CodeLocation,
    ) -> Result<FunctionId, CompileError> {
        if let Some(existing) = self.unit.functions.instance(template.name, args) {
            return Ok(existing);
        }
        let decl = self
            .unit
            .with_pass(Pass::FunctionTemplateParsing, |unit| {
                instantiate_function(&mut unit.fe, template, args)
            })
            .map_err(|e| e.or_at(loc))?;
        if decl.ret.is_unresolved() || decl.params.iter().any(|p| p.ty.is_unresolved()) {
            return Err(CompileError::type_error(
                ErrorCode::E2011,
                "`auto` is not allowed in a function signature",
                decl.loc,
            ));
        }
        debug!(
            name = self.name(template.name),
            args = args.len(),
            "instantiating function template"
        );
        let mut data = FunctionData::from_decl(decl);
        data.instance_of = Some((template.name, args.to_vec()));
        Ok(self.unit.functions.add(data))
    }
}

/// Positional deduction: type parameter `i` takes the type of argument `i`.
fn deduce(
    template: &TemplateDecl,
    args: &[TypeInfo],
    interner: &StringInterner,
    loc: CodeLocation,
) -> Result<Vec<TemplateArg>, CompileError> {
    template
        .params
        .iter()
        .enumerate()
        .map(|(i, param)| match (param.kind, args.get(i)) {
            (TemplateParamKind::Type, Some(ty)) => Ok(TemplateArg::Type(ty.base())),
            _ => Err(CompileError::type_error(
                ErrorCode::E2011,
                format!(
                    "cannot deduce template argument `{}`",
                    interner.lookup(param.name)
                ),
                loc,
            )),
        })
        .collect()
}
