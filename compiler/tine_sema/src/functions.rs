//! Function registry and overload resolution.
//!
//! Every overload is one [`FunctionData`] addressed by [`FunctionId`]. A
//! *function class* is the set of overloads sharing a namespaced name;
//! calls resolve against the class. Host functions and user functions are
//! the same kind of entry and differ only in their body.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{
    CodeLocation, ComplexTypeId, FunctionDecl, FunctionId, FunctionKind, Name,
    NamespacedIdentifier, NativeType, NodeId, ScopeId, StringInterner, TemplateArg, TypeInfo,
    Value,
};
use tine_types::TypePool;

/// A host function implemented in Rust.
pub type NativeFn = fn(&[Value]) -> Value;

/// Call-site inliner of a host function: folds a call whose arguments are
/// all constants, or declines with `None`.
pub type ConstInliner = fn(&[Value]) -> Option<Value>;

#[derive(Clone)]
pub enum FunctionBody {
    /// User function; `node` is the parsed body once FunctionParsing ran.
    Source {
        decl: Box<FunctionDecl>,
        node: Option<NodeId>,
        scope: Option<ScopeId>,
    },
    Native(NativeFn),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Source { node, scope, .. } => f
                .debug_struct("Source")
                .field("node", node)
                .field("scope", scope)
                .finish_non_exhaustive(),
            FunctionBody::Native(_) => f.write_str("Native"),
        }
    }
}

/// One overload.
#[derive(Clone, Debug)]
pub struct FunctionData {
    pub id: NamespacedIdentifier,
    pub params: SmallVec<[TypeInfo; 4]>,
    pub param_names: SmallVec<[Name; 4]>,
    pub ret: TypeInfo,
    pub kind: FunctionKind,
    pub owner: Option<ComplexTypeId>,
    pub is_inline: bool,
    pub body: FunctionBody,
    pub inliner: Option<ConstInliner>,
    /// `(template name, arguments)` of a template instance.
    pub instance_of: Option<(Name, Vec<TemplateArg>)>,
    pub loc: CodeLocation,
}

impl FunctionData {
    pub fn from_decl(decl: FunctionDecl) -> Self {
        FunctionData {
            id: decl.id.clone(),
            params: decl.params.iter().map(|p| p.ty).collect(),
            param_names: decl.params.iter().map(|p| p.name).collect(),
            ret: decl.ret,
            kind: decl.kind,
            owner: decl.owner,
            is_inline: decl.is_inline,
            loc: decl.loc,
            body: FunctionBody::Source {
                decl: Box::new(decl),
                node: None,
                scope: None,
            },
            inliner: None,
            instance_of: None,
        }
    }

    pub fn native(
        id: NamespacedIdentifier,
        params: &[TypeInfo],
        ret: TypeInfo,
        native: NativeFn,
    ) -> Self {
        FunctionData {
            id,
            params: params.iter().copied().collect(),
            param_names: SmallVec::new(),
            ret,
            kind: FunctionKind::Free,
            owner: None,
            is_inline: false,
            body: FunctionBody::Native(native),
            inliner: None,
            instance_of: None,
            loc: CodeLocation::SYNTHETIC,
        }
    }

    pub fn decl(&self) -> Option<&FunctionDecl> {
        match &self.body {
            FunctionBody::Source { decl, .. } => Some(decl),
            FunctionBody::Native(_) => None,
        }
    }

    /// Parsed body node and its outermost scope.
    pub fn parsed(&self) -> Option<(NodeId, ScopeId)> {
        match &self.body {
            FunctionBody::Source {
                node: Some(node),
                scope: Some(scope),
                ..
            } => Some((*node, *scope)),
            _ => None,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }
}

/// Cost of converting an argument of one type to a parameter type.
///
/// `None` when no implicit conversion exists. Lower is better: an exact
/// match costs nothing, a widening costs 1, a narrowing costs 2.
pub fn conversion_cost(types: &TypePool, from: TypeInfo, to: TypeInfo) -> Option<u32> {
    if from.same_base(to) {
        return Some(0);
    }
    match (types.scalar(from), types.scalar(to)) {
        (Some(f), Some(t)) if f.is_arithmetic() && t.is_arithmetic() => {
            if to.complex_id().is_some() || from.complex_id().is_some() {
                // Index types convert to and from int.
                return (f == NativeType::Integer && t == NativeType::Integer).then_some(1);
            }
            if t.promotion_rank() >= f.promotion_rank() {
                Some(1)
            } else {
                Some(2)
            }
        }
        _ => {
            // Structs convert to a base sub-object.
            let (Some(f), Some(t)) = (from.complex_id(), to.complex_id()) else {
                return None;
            };
            types.base_offset(f, t).map(|_| 1)
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FunctionRegistry {
    functions: Vec<FunctionData>,
    classes: FxHashMap<NamespacedIdentifier, Vec<FunctionId>>,
    instances: FxHashMap<(Name, Vec<TemplateArg>), FunctionId>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    pub fn add(&mut self, data: FunctionData) -> FunctionId {
        let id = FunctionId::from_usize(self.functions.len());
        if let Some((name, args)) = &data.instance_of {
            self.instances.insert((*name, args.clone()), id);
        }
        self.classes.entry(data.id.clone()).or_default().push(id);
        self.functions.push(data);
        id
    }

    #[inline]
    pub fn get(&self, id: FunctionId) -> &FunctionData {
        &self.functions[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: FunctionId) -> &mut FunctionData {
        &mut self.functions[id.index()]
    }

    /// Overloads sharing `id`.
    pub fn class(&self, id: &NamespacedIdentifier) -> &[FunctionId] {
        self.classes.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn instance(&self, name: Name, args: &[TemplateArg]) -> Option<FunctionId> {
        self.instances.get(&(name, args.to_vec())).copied()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FunctionId> {
        (0..self.functions.len()).map(FunctionId::from_usize)
    }

    /// User functions with a body that has not been parsed yet.
    pub fn unparsed(&self) -> Vec<FunctionId> {
        self.ids()
            .filter(|id| {
                matches!(
                    &self.get(*id).body,
                    FunctionBody::Source { node: None, decl, .. } if decl.body.is_some()
                )
            })
            .collect()
    }

    /// Pick the overload of `candidates` that best matches `args`.
    ///
    /// Every argument must convert implicitly; the lowest total cost wins
    /// and a tie between the best candidates is ambiguous.
    pub fn resolve(
        &self,
        types: &TypePool,
        interner: &StringInterner,
        candidates: &[FunctionId],
        args: &[TypeInfo],
        loc: CodeLocation,
    ) -> Result<FunctionId, CompileError> {
        let mut best: Option<(u32, FunctionId)> = None;
        let mut tied = false;
        for &candidate in candidates {
            let data = self.get(candidate);
            if data.params.len() != args.len() {
                continue;
            }
            let cost: Option<u32> = data
                .params
                .iter()
                .zip(args)
                .map(|(param, arg)| conversion_cost(types, *arg, *param))
                .sum();
            let Some(cost) = cost else {
                continue;
            };
            match best {
                Some((best_cost, _)) if cost > best_cost => {}
                Some((best_cost, _)) if cost == best_cost => tied = true,
                _ => {
                    best = Some((cost, candidate));
                    tied = false;
                }
            }
        }
        match best {
            Some((_, id)) if !tied => Ok(id),
            Some(_) => Err(CompileError::type_error(
                ErrorCode::E2002,
                "ambiguous call: several overloads match equally well",
                loc,
            )),
            None => {
                let name = candidates
                    .first()
                    .map(|c| self.get(*c).id.display(interner))
                    .unwrap_or_default();
                let args: Vec<String> = args.iter().map(|a| types.display(*a, interner)).collect();
                Err(CompileError::type_error(
                    ErrorCode::E2002,
                    format!("no overload of `{name}` takes ({})", args.join(", ")),
                    loc,
                ))
            }
        }
    }
}
