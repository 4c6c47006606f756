//! DataInitialisation: lower initializers of complex values into explicit
//! construction.
//!
//! A complex variable defined with an initializer list, constructor
//! arguments, or a type that needs construction gets a
//! [`ComplexInit`](tine_ir::ComplexInit) as its initializer: zero fill,
//! default member values, the listed values, then constructors. Scalar
//! `{x}` and `(x)` initializers are unwrapped.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    CodeLocation, ComplexInit, CtorCall, FieldInit, FunctionId, NamespacedIdentifier, NodeId,
    NodeKind, SymbolId, TypeInfo, Value,
};
use tine_stack::ensure_sufficient_stack;
use tine_types::{ComplexType, Layout};

use crate::symbols::Storage;
use crate::Unit;

pub(crate) fn run(unit: &mut Unit, root: NodeId) -> Result<(), CompileError> {
    Initialiser { unit }.visit(root)
}

struct Initialiser<'u> {
    unit: &'u mut Unit,
}

impl Initialiser<'_> {
    fn visit(&mut self, node: NodeId) -> Result<(), CompileError> {
        ensure_sufficient_stack(|| self.visit_inner(node))
    }

    fn visit_inner(&mut self, node: NodeId) -> Result<(), CompileError> {
        match self.unit.fe.ast.kind(node) {
            NodeKind::VariableDef(_) => self.variable(node),
            NodeKind::Block(_)
            | NodeKind::If { .. }
            | NodeKind::While { .. }
            | NodeKind::RangedFor(_) => {
                for child in self.unit.fe.ast.children(node) {
                    self.visit(child)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn variable(&mut self, node: NodeId) -> Result<(), CompileError> {
        let NodeKind::VariableDef(def) = self.unit.fe.ast.kind(node).clone() else {
            return Ok(());
        };
        let Some(symbol) = def.resolved else {
            return Ok(());
        };
        let entry = self.unit.symbols.get(symbol);
        let ty = entry.ty();
        if ty.is_static() || matches!(entry.storage, Storage::Constant(_)) {
            return Ok(());
        }
        let loc = self.unit.fe.ast.loc(node);
        let name = def.symbol.id.display(&self.unit.fe.interner);
        let list = def.init.and_then(|i| match self.unit.fe.ast.kind(i) {
            NodeKind::InitializerList(items) => Some(items.clone()),
            _ => None,
        });

        let init = if ty.is_unresolved() || ty.is_ref() || self.unit.fe.types.scalar(ty).is_some()
        {
            match (list, def.ctor_args.clone()) {
                (Some(items), _) => Some(self.scalar_list(ty, &items, &name, loc)?),
                (None, Some(args)) => match args.as_slice() {
                    [single] => Some(*single),
                    _ => {
                        return Err(CompileError::type_error(
                            ErrorCode::E2003,
                            format!("`{name}` takes exactly one initializer"),
                            loc,
                        ))
                    }
                },
                (None, None) => def.init,
            }
        } else {
            let target = self.target(symbol, ty, &def.symbol.id, loc);
            match (list, def.ctor_args.clone()) {
                (Some(items), _) => Some(self.list_init(target, ty, &items, loc)?),
                (None, Some(args)) => Some(self.ctor_init(target, ty, args, loc)?),
                (None, None) if self.unit.fe.types.needs_construction(ty) => {
                    Some(self.default_init(target, ty, loc))
                }
                (None, None) => def.init,
            }
        };

        if let NodeKind::VariableDef(def) = self.unit.fe.ast.kind_mut(node) {
            def.init = init;
            def.ctor_args = None;
        }
        Ok(())
    }

    fn scalar_list(
        &mut self,
        ty: TypeInfo,
        items: &[NodeId],
        name: &str,
        loc: CodeLocation,
    ) -> Result<NodeId, CompileError> {
        match items {
            [single] => Ok(*single),
            [] => {
                let zero = self
                    .unit
                    .fe
                    .types
                    .scalar(ty)
                    .and_then(Value::zero)
                    .ok_or_else(|| {
                        CompileError::type_error(
                            ErrorCode::E2011,
                            format!("cannot deduce the type of `{name}` from `{{}}`"),
                            loc,
                        )
                    })?;
                Ok(self.literal(zero, loc))
            }
            _ => Err(CompileError::type_error(
                ErrorCode::E2003,
                format!("too many initializers for `{name}`"),
                loc,
            )),
        }
    }

    fn target(
        &mut self,
        symbol: SymbolId,
        ty: TypeInfo,
        id: &NamespacedIdentifier,
        loc: CodeLocation,
    ) -> NodeId {
        let kind = NodeKind::VariableRef {
            id: NamespacedIdentifier::new(id.id()),
            resolved: Some(symbol),
        };
        self.unit.fe.ast.push_typed(kind, loc, ty)
    }

    fn literal(&mut self, value: Value, loc: CodeLocation) -> NodeId {
        let ty = TypeInfo::native(value.native_type());
        self.unit.fe.ast.push_typed(NodeKind::Literal(value), loc, ty)
    }

    fn defaults(&mut self, ty: TypeInfo, loc: CodeLocation) -> Vec<FieldInit> {
        let defaults = self.unit.fe.types.default_initializer(ty);
        defaults
            .into_iter()
            .map(|(offset, value)| FieldInit {
                offset,
                ty: value.native_type(),
                value: self.literal(value, loc),
            })
            .collect()
    }

    fn constructors(&self, ty: TypeInfo) -> Vec<CtorCall> {
        self.unit
            .fe
            .types
            .construction_calls(ty)
            .into_iter()
            .map(|(offset, func)| CtorCall {
                func,
                offset,
                args: Vec::new(),
            })
            .collect()
    }

    fn finish(&mut self, target: NodeId, ty: TypeInfo, init: ComplexInit, loc: CodeLocation) -> NodeId {
        debug_assert_eq!(init.target, target);
        self.unit
            .fe
            .ast
            .push_typed(NodeKind::ComplexInit(init), loc, ty)
    }

    fn default_init(&mut self, target: NodeId, ty: TypeInfo, loc: CodeLocation) -> NodeId {
        let init = ComplexInit {
            target,
            fields: self.defaults(ty, loc),
            ctors: self.constructors(ty),
        };
        self.finish(target, ty, init, loc)
    }

    fn list_init(
        &mut self,
        target: NodeId,
        ty: TypeInfo,
        items: &[NodeId],
        loc: CodeLocation,
    ) -> Result<NodeId, CompileError> {
        let has_constructor = ty
            .complex_id()
            .and_then(|id| self.unit.fe.types.as_struct(id))
            .is_some_and(|s| !s.constructors.is_empty());
        if has_constructor {
            return Err(CompileError::type_error(
                ErrorCode::E2012,
                format!(
                    "`{}` has a constructor; initialise it with `(...)`",
                    self.unit.fe.types.display(ty, &self.unit.fe.interner)
                ),
                loc,
            ));
        }
        let mut fields = self.defaults(ty, loc);
        self.flatten(ty, 0, items, &mut fields, loc)?;
        let init = ComplexInit {
            target,
            fields,
            ctors: self.constructors(ty),
        };
        Ok(self.finish(target, ty, init, loc))
    }

    /// Map list items onto the scalar slots of `ty` starting at `at`.
    fn flatten(
        &mut self,
        ty: TypeInfo,
        at: u32,
        items: &[NodeId],
        fields: &mut Vec<FieldInit>,
        loc: CodeLocation,
    ) -> Result<(), CompileError> {
        let slots = self.slots(ty, loc)?;
        if items.len() > slots.len() {
            return Err(CompileError::type_error(
                ErrorCode::E2003,
                format!(
                    "too many initializers for `{}` ({} given, {} expected)",
                    self.unit.fe.types.display(ty, &self.unit.fe.interner),
                    items.len(),
                    slots.len()
                ),
                loc,
            ));
        }
        for ((offset, slot), item) in slots.into_iter().zip(items) {
            let nested = match self.unit.fe.ast.kind(*item) {
                NodeKind::InitializerList(inner) => Some(inner.clone()),
                _ => None,
            };
            let item_loc = self.unit.fe.ast.loc(*item);
            match (nested, self.unit.fe.types.scalar(slot)) {
                (Some(inner), None) => {
                    ensure_sufficient_stack(|| {
                        self.flatten(slot, at + offset, &inner, fields, item_loc)
                    })?;
                }
                (None, Some(scalar)) => fields.push(FieldInit {
                    offset: at + offset,
                    ty: scalar,
                    value: *item,
                }),
                (Some(_), Some(_)) => {
                    return Err(CompileError::type_error(
                        ErrorCode::E2003,
                        "a scalar element cannot take a nested initializer list",
                        item_loc,
                    ))
                }
                (None, None) => {
                    return Err(CompileError::type_error(
                        ErrorCode::E2012,
                        "nested objects must be initialised with a `{...}` list",
                        item_loc,
                    ))
                }
            }
        }
        Ok(())
    }

    /// Directly initialisable sub-objects of `ty` as `(offset, type)`: span
    /// elements, or base members followed by own members.
    fn slots(&self, ty: TypeInfo, loc: CodeLocation) -> Result<Vec<(u32, TypeInfo)>, CompileError> {
        let types = &self.unit.fe.types;
        let Some(id) = ty.complex_id() else {
            return Ok(Vec::new());
        };
        match types.get(id) {
            ComplexType::Span { element, len } => {
                types.layout(ty).map_err(|e| e.or_at(loc))?;
                let stride = types.layout(*element).map_or(0, Layout::stride);
                Ok((0..*len).map(|i| (i * stride, *element)).collect())
            }
            ComplexType::Dyn { .. } => Err(CompileError::type_error(
                ErrorCode::E2003,
                "a dyn view cannot be initialised from a list",
                loc,
            )),
            ComplexType::Struct(s) => {
                let mut out = Vec::new();
                for base in &s.bases {
                    for (offset, slot) in self.slots(TypeInfo::complex(base.ty), loc)? {
                        out.push((base.offset + offset, slot));
                    }
                }
                out.extend(s.members.iter().map(|m| (m.offset, m.ty)));
                Ok(out)
            }
        }
    }

    /// `X x(args)`: defaults and member constructors, then the matching
    /// constructor of `X` (resolved with the call overloads).
    fn ctor_init(
        &mut self,
        target: NodeId,
        ty: TypeInfo,
        args: Vec<NodeId>,
        loc: CodeLocation,
    ) -> Result<NodeId, CompileError> {
        let Some(own) = ty.complex_id().and_then(|id| self.unit.fe.types.as_struct(id)) else {
            return Err(CompileError::type_error(
                ErrorCode::E2003,
                format!(
                    "`{}` has no constructors",
                    self.unit.fe.types.display(ty, &self.unit.fe.interner)
                ),
                loc,
            ));
        };
        let own_default = own.default_constructor;
        let mut ctors = self.constructors(ty);
        if args.is_empty() {
            let init = ComplexInit {
                target,
                fields: self.defaults(ty, loc),
                ctors,
            };
            return Ok(self.finish(target, ty, init, loc));
        }
        ctors.retain(|c| !(c.offset == 0 && Some(c.func) == own_default));
        ctors.push(CtorCall {
            func: FunctionId::INVALID,
            offset: 0,
            args,
        });
        let init = ComplexInit {
            target,
            fields: self.defaults(ty, loc),
            ctors,
        };
        Ok(self.finish(target, ty, init, loc))
    }
}
