//! AST arena.
//!
//! One [`Ast`] per compile session owns every node; nodes refer to each
//! other by [`NodeId`]. Parsing creates nodes, optimization passes rewrite
//! them in place ([`Ast::replace`]), register allocation and code generation
//! only read them.
//!
//! # Node set
//!
//! The set is closed. Besides the statement and expression forms written in
//! source, three lowering forms exist:
//!
//! - [`NodeKind::ComplexInit`]: an initializer list lowered to explicit
//!   field stores and constructor calls (DataInitialisation).
//! - [`NodeKind::Inline`]: an inlined callee body spliced at a call site.
//! - [`NodeKind::Cast`] with `implicit: true`: a conversion inserted by the
//!   type checker.

use smallvec::SmallVec;

use crate::{
    AssignOp, BinaryOp, CodeLocation, ComplexTypeId, FunctionId, Name, NamespacedIdentifier,
    NativeType, NodeId, ScopeId, SourceRange, Symbol, SymbolId, TemplateArg, TypeInfo, UnaryOp,
    Value, Visibility, IndexPolicy,
};

/// A node: its kind, where it came from, and its type once checked.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub loc: CodeLocation,
    /// Unresolved until ResolvingSymbols/TypeCheck fill it in.
    pub ty: TypeInfo,
}

/// Where a `return` transfers control to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ReturnTarget {
    Function,
    /// End of the innermost [`NodeKind::Inline`] body.
    Inline,
}

#[derive(Clone, Debug, Default)]
pub struct Block {
    pub stmts: Vec<NodeId>,
    pub scope: Option<ScopeId>,
}

/// `for (auto& it : range) body`
#[derive(Clone, Debug)]
pub struct RangedFor {
    /// Declared in a synthetic namespace keyed by the loop's source line.
    pub iterator: Symbol,
    pub by_ref: bool,
    pub range: NodeId,
    pub body: NodeId,
    pub resolved: Option<SymbolId>,
    pub scope: Option<ScopeId>,
}

#[derive(Clone, Debug)]
pub struct VariableDef {
    pub symbol: Symbol,
    pub init: Option<NodeId>,
    /// `Type name(args);`
    pub ctor_args: Option<Vec<NodeId>>,
    pub resolved: Option<SymbolId>,
}

#[derive(Clone, Debug)]
pub struct MemberDecl {
    pub name: Name,
    pub ty: TypeInfo,
    pub default: Option<NodeId>,
    pub visibility: Visibility,
    pub doc: Option<String>,
    pub loc: CodeLocation,
}

#[derive(Clone, Debug)]
pub struct ComplexTypeDef {
    pub ty: ComplexTypeId,
    pub members: Vec<MemberDecl>,
    pub bases: Vec<ComplexTypeId>,
    /// [`NodeKind::FunctionDef`] nodes.
    pub methods: Vec<NodeId>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FunctionKind {
    Free,
    Method,
    Constructor,
    Destructor,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Param {
    pub name: Name,
    pub ty: TypeInfo,
}

/// Signature plus body range of a user function.
#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub id: NamespacedIdentifier,
    pub params: Vec<Param>,
    pub ret: TypeInfo,
    /// Body text (between the braces) in the processed source.
    pub body: Option<SourceRange>,
    pub kind: FunctionKind,
    pub owner: Option<ComplexTypeId>,
    pub is_inline: bool,
    pub visibility: Visibility,
    /// Template parameters bound while parsing the signature; the body is
    /// parsed with the same bindings.
    pub bindings: Vec<(Name, TemplateArg)>,
    pub loc: CodeLocation,
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub decl: FunctionDecl,
    pub func: Option<FunctionId>,
}

/// What a call resolved to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CallTarget {
    Function(FunctionId),
    /// Member function; `this` is the object address plus `base_offset`.
    Method { func: FunctionId, base_offset: u32 },
    /// `.size()` of a span or dyn.
    ContainerSize,
}

#[derive(Clone, Debug)]
pub struct Call {
    pub callee: NamespacedIdentifier,
    /// Receiver of `obj.method()`, or a library namespace object.
    pub object: Option<NodeId>,
    pub template_args: Vec<TemplateArg>,
    pub args: Vec<NodeId>,
    pub target: Option<CallTarget>,
}

/// A resolved struct member: byte offset from the object start.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct MemberRef {
    pub offset: u32,
    pub ty: TypeInfo,
}

/// One scalar store of a lowered initializer.
#[derive(Copy, Clone, Debug)]
pub struct FieldInit {
    pub offset: u32,
    pub ty: NativeType,
    pub value: NodeId,
}

/// A constructor run on a sub-object at `offset`.
#[derive(Clone, Debug)]
pub struct CtorCall {
    pub func: FunctionId,
    pub offset: u32,
    pub args: Vec<NodeId>,
}

/// Explicit construction of a complex object: zero fill, field stores in
/// order, then constructors in order.
#[derive(Clone, Debug)]
pub struct ComplexInit {
    /// Place expression naming the object.
    pub target: NodeId,
    pub fields: Vec<FieldInit>,
    pub ctors: Vec<CtorCall>,
}

/// An inlined call. The result (if any) has the node's type.
#[derive(Clone, Debug)]
pub struct InlineBody {
    pub callee: FunctionId,
    pub body: NodeId,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Block(Block),
    If {
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    /// `post` runs after the body and on `continue` (lowered `for`).
    While {
        cond: NodeId,
        body: NodeId,
        post: Option<NodeId>,
    },
    RangedFor(RangedFor),
    Return {
        value: Option<NodeId>,
        target: ReturnTarget,
    },
    Break,
    Continue,
    VariableDef(VariableDef),
    ComplexTypeDef(ComplexTypeDef),
    FunctionDef(FunctionDef),
    Assignment {
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    },
    BinaryOp {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    UnaryOp {
        op: UnaryOp,
        operand: NodeId,
    },
    Call(Call),
    MemberAccess {
        object: NodeId,
        member: Name,
        resolved: Option<MemberRef>,
    },
    Subscript {
        object: NodeId,
        index: NodeId,
        policy: Option<IndexPolicy>,
    },
    Literal(Value),
    Ternary {
        cond: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
    VariableRef {
        id: NamespacedIdentifier,
        resolved: Option<SymbolId>,
    },
    This,
    Cast {
        operand: NodeId,
        target: TypeInfo,
        implicit: bool,
    },
    /// Address of a complex lvalue (dyn views over spans).
    AddressOf(NodeId),
    InitializerList(Vec<NodeId>),
    ComplexInit(ComplexInit),
    Inline(InlineBody),
    Noop,
}

impl NodeKind {
    /// Statement forms that end the current block's control flow.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            NodeKind::Return { .. } | NodeKind::Break | NodeKind::Continue
        )
    }
}

/// The node arena.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn push(&mut self, kind: NodeKind, loc: CodeLocation) -> NodeId {
        let id = NodeId::from_usize(self.nodes.len());
        self.nodes.push(Node {
            kind,
            loc,
            ty: TypeInfo::auto(),
        });
        id
    }

    pub fn push_typed(&mut self, kind: NodeKind, loc: CodeLocation, ty: TypeInfo) -> NodeId {
        let id = self.push(kind, loc);
        self.nodes[id.index()].ty = ty;
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    #[inline]
    pub fn loc(&self, id: NodeId) -> CodeLocation {
        self.nodes[id.index()].loc
    }

    #[inline]
    pub fn ty(&self, id: NodeId) -> TypeInfo {
        self.nodes[id.index()].ty
    }

    #[inline]
    pub fn set_ty(&mut self, id: NodeId, ty: TypeInfo) {
        self.nodes[id.index()].ty = ty;
    }

    /// Rewrite a node in place, keeping its id and location.
    pub fn replace(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.index()].kind = kind;
    }

    /// Copy node `from` over node `id` (kind and type).
    pub fn replace_with(&mut self, id: NodeId, from: NodeId) {
        let node = self.nodes[from.index()].clone();
        let slot = &mut self.nodes[id.index()];
        slot.kind = node.kind;
        slot.ty = node.ty;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Literal payload, if the node is a literal.
    pub fn literal(&self, id: NodeId) -> Option<Value> {
        match self.kind(id) {
            NodeKind::Literal(v) => Some(*v),
            _ => None,
        }
    }

    /// Direct children in evaluation order.
    ///
    /// Method bodies of a struct are included; function bodies that are
    /// still unparsed source ranges are not nodes yet.
    pub fn children(&self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        let mut out = SmallVec::new();
        match self.kind(id) {
            NodeKind::Block(b) => out.extend(b.stmts.iter().copied()),
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                out.push(*cond);
                out.push(*then_branch);
                out.extend(*else_branch);
            }
            NodeKind::While { cond, body, post } => {
                out.push(*cond);
                out.push(*body);
                out.extend(*post);
            }
            NodeKind::RangedFor(f) => {
                out.push(f.range);
                out.push(f.body);
            }
            NodeKind::Return { value, .. } => out.extend(*value),
            NodeKind::VariableDef(v) => {
                out.extend(v.init);
                if let Some(args) = &v.ctor_args {
                    out.extend(args.iter().copied());
                }
            }
            NodeKind::ComplexTypeDef(def) => {
                out.extend(def.members.iter().filter_map(|m| m.default));
                out.extend(def.methods.iter().copied());
            }
            NodeKind::Assignment { target, value, .. } => {
                out.push(*target);
                out.push(*value);
            }
            NodeKind::BinaryOp { lhs, rhs, .. } => {
                out.push(*lhs);
                out.push(*rhs);
            }
            NodeKind::UnaryOp { operand, .. } => out.push(*operand),
            NodeKind::Call(call) => {
                out.extend(call.object);
                out.extend(call.args.iter().copied());
            }
            NodeKind::MemberAccess { object, .. } => out.push(*object),
            NodeKind::Subscript { object, index, .. } => {
                out.push(*object);
                out.push(*index);
            }
            NodeKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                out.push(*cond);
                out.push(*then_expr);
                out.push(*else_expr);
            }
            NodeKind::Cast { operand, .. } | NodeKind::AddressOf(operand) => out.push(*operand),
            NodeKind::InitializerList(items) => out.extend(items.iter().copied()),
            NodeKind::ComplexInit(init) => {
                out.push(init.target);
                out.extend(init.fields.iter().map(|f| f.value));
                for ctor in &init.ctors {
                    out.extend(ctor.args.iter().copied());
                }
            }
            NodeKind::Inline(inline) => out.push(inline.body),
            NodeKind::FunctionDef(_)
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Literal(_)
            | NodeKind::VariableRef { .. }
            | NodeKind::This
            | NodeKind::Noop => {}
        }
        out
    }

    /// `true` if evaluating `id` can have no side effect and cannot fail.
    ///
    /// Conservative: only literals, variable reads, `this` and pure
    /// arithmetic/casts over those qualify.
    pub fn is_pure(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Literal(_) | NodeKind::VariableRef { .. } | NodeKind::This => true,
            NodeKind::BinaryOp { op, lhs, rhs } => {
                !matches!(op, BinaryOp::Div | BinaryOp::Mod)
                    && self.is_pure(*lhs)
                    && self.is_pure(*rhs)
            }
            NodeKind::UnaryOp { op, operand } => !op.is_increment() && self.is_pure(*operand),
            NodeKind::Cast { operand, .. } => self.is_pure(*operand),
            NodeKind::MemberAccess { object, .. } => self.is_pure(*object),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests;
