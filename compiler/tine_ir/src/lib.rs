//! Tine IR - Core data model for the Tine compiler.
//!
//! Everything the later phases share lives here:
//!
//! - [`CodeLocation`] / [`LineIndex`]: original-source positions for diagnostics
//! - [`Name`] / [`StringInterner`]: interned identifiers
//! - [`TypeInfo`] / [`NativeType`]: the closed type vocabulary
//! - [`Symbol`] / [`NamespacedIdentifier`]: declared entities
//! - [`Value`]: scalar values with the single definition of their arithmetic
//! - [`Ast`]: the per-unit node arena addressed by [`NodeId`]
//!
//! # Design
//!
//! All cross references are `u32` newtype indices into arenas owned by the
//! compile session. Nothing in this crate is reference counted and nothing
//! holds a pointer into another arena.

pub mod ast;
mod ids;
mod interner;
mod location;
mod name;
mod ops;
mod symbol;
mod token;
mod types;
mod value;

pub use ast::{
    Ast, Block, Call, CallTarget, ComplexInit, ComplexTypeDef, CtorCall, FieldInit, FunctionDecl,
    FunctionDef, FunctionKind, InlineBody, MemberDecl, MemberRef, Node, NodeKind, Param, RangedFor,
    ReturnTarget, VariableDef,
};
pub use ids::{ComplexTypeId, FunctionId, NodeId, ScopeId, SymbolId};
pub use interner::StringInterner;
pub use location::{CodeLocation, LineIndex, SourceRange};
pub use name::{Name, NamespacedIdentifier};
pub use ops::{AssignOp, BinaryOp, UnaryOp};
pub use symbol::{StorageClass, Symbol, Visibility};
pub use token::TokenKind;
pub use types::{IndexPolicy, NativeType, RegisterClass, TemplateArg, TypeFlags, TypeInfo, TypeKind};
pub use value::{ArithError, Value};
