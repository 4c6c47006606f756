//! Complex types for Tine.
//!
//! The [`TypePool`] owns every [`ComplexType`] of a compile session:
//!
//! - `Span(T, N)`: a fixed array of `N` elements stored inline
//! - `Dyn(T)`: a non-owning view `{length, data pointer}` over elements
//!   stored elsewhere
//! - `Struct`: user aggregates and host-registered index types
//!
//! # Design
//!
//! Types are addressed by [`ComplexTypeId`](tine_ir::ComplexTypeId) and
//! deduplicated structurally: asking for `span<float, 4>` twice yields the
//! same id. A struct is *open* while members are added and becomes
//! *finalised* exactly once, after which its layout is fixed. Spans and dyns
//! have no state of their own; their layout derives from the element.

mod layout;
mod pool;

pub use layout::{
    align_up, Layout, DYN_ALIGNMENT, DYN_DATA_OFFSET, DYN_LENGTH_OFFSET, DYN_SIZE, MAX_SIZE,
};
pub use pool::{BaseClass, ComplexType, Member, MemberLookup, MethodLookup, StructType, TypePool};
