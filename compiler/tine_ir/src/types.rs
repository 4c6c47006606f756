//! Type vocabulary.
//!
//! [`TypeInfo`] is either a native scalar or a handle into the complex type
//! pool (`tine_types`), plus [`TypeFlags`] modifiers. The layout and shape of
//! complex types live in `tine_types`; this module only names them.

use bitflags::bitflags;

use crate::ComplexTypeId;

/// Native scalar kinds.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NativeType {
    Void,
    Integer,
    Float,
    Double,
    Bool,
    Pointer,
    /// Not yet resolved (`auto` before its initializer is typed).
    Dynamic,
}

impl NativeType {
    /// Byte size in memory. `Void` and `Dynamic` have no storage.
    pub const fn size(self) -> u32 {
        match self {
            NativeType::Integer | NativeType::Float | NativeType::Bool => 4,
            NativeType::Double | NativeType::Pointer => 8,
            NativeType::Void | NativeType::Dynamic => 0,
        }
    }

    /// Natural alignment; equal to size for every storable scalar.
    pub const fn alignment(self) -> u32 {
        match self.size() {
            0 => 1,
            n => n,
        }
    }

    pub const fn register_class(self) -> RegisterClass {
        match self {
            NativeType::Integer | NativeType::Bool => RegisterClass::Integer,
            NativeType::Float => RegisterClass::Float,
            NativeType::Double => RegisterClass::Double,
            NativeType::Pointer => RegisterClass::Pointer,
            NativeType::Void | NativeType::Dynamic => RegisterClass::DynamicPending,
        }
    }

    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            NativeType::Integer | NativeType::Float | NativeType::Double | NativeType::Bool
        )
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, NativeType::Float | NativeType::Double)
    }

    /// Rank used to pick the common type of a binary expression.
    pub const fn promotion_rank(self) -> u8 {
        match self {
            NativeType::Bool => 0,
            NativeType::Integer => 1,
            NativeType::Float => 2,
            NativeType::Double => 3,
            _ => u8::MAX,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            NativeType::Void => "void",
            NativeType::Integer => "int",
            NativeType::Float => "float",
            NativeType::Double => "double",
            NativeType::Bool => "bool",
            NativeType::Pointer => "pointer",
            NativeType::Dynamic => "auto",
        }
    }
}

/// Which physical register bank may hold a value.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RegisterClass {
    Integer,
    Float,
    Double,
    Pointer,
    /// The value's type is not resolved yet; it may not be materialized.
    DynamicPending,
}

impl RegisterClass {
    /// `true` for classes held in the floating point bank.
    pub const fn is_floating(self) -> bool {
        matches!(self, RegisterClass::Float | RegisterClass::Double)
    }
}

bitflags! {
    /// Declaration modifiers on a [`TypeInfo`].
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct TypeFlags: u8 {
        /// Not assignable after initialisation.
        const CONST = 1 << 0;
        /// Refers to storage owned elsewhere (`auto&`, complex parameters).
        const REF = 1 << 1;
        /// Type still pending resolution (`auto`).
        const UNRESOLVED = 1 << 2;
        /// `static` storage inside a function body.
        const STATIC = 1 << 3;
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeKind {
    Native(NativeType),
    Complex(ComplexTypeId),
}

/// A type plus its modifiers.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TypeInfo {
    pub kind: TypeKind,
    pub flags: TypeFlags,
}

impl TypeInfo {
    pub const fn native(ty: NativeType) -> Self {
        TypeInfo {
            kind: TypeKind::Native(ty),
            flags: TypeFlags::empty(),
        }
    }

    pub const fn complex(id: ComplexTypeId) -> Self {
        TypeInfo {
            kind: TypeKind::Complex(id),
            flags: TypeFlags::empty(),
        }
    }

    pub const fn void() -> Self {
        TypeInfo::native(NativeType::Void)
    }

    pub const fn int() -> Self {
        TypeInfo::native(NativeType::Integer)
    }

    pub const fn float() -> Self {
        TypeInfo::native(NativeType::Float)
    }

    pub const fn double() -> Self {
        TypeInfo::native(NativeType::Double)
    }

    pub const fn bool() -> Self {
        TypeInfo::native(NativeType::Bool)
    }

    /// `auto`: dynamic and unresolved.
    pub const fn auto() -> Self {
        TypeInfo {
            kind: TypeKind::Native(NativeType::Dynamic),
            flags: TypeFlags::UNRESOLVED,
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn without_flags(mut self, flags: TypeFlags) -> Self {
        self.flags &= !flags;
        self
    }

    #[must_use]
    pub fn as_const(self) -> Self {
        self.with_flags(TypeFlags::CONST)
    }

    #[must_use]
    pub fn as_reference(self) -> Self {
        self.with_flags(TypeFlags::REF)
    }

    /// Same type with every modifier removed.
    #[must_use]
    pub fn base(self) -> Self {
        TypeInfo {
            kind: self.kind,
            flags: TypeFlags::empty(),
        }
    }

    pub fn is_const(self) -> bool {
        self.flags.contains(TypeFlags::CONST)
    }

    pub fn is_ref(self) -> bool {
        self.flags.contains(TypeFlags::REF)
    }

    pub fn is_static(self) -> bool {
        self.flags.contains(TypeFlags::STATIC)
    }

    pub fn is_unresolved(self) -> bool {
        self.flags.contains(TypeFlags::UNRESOLVED)
            || matches!(self.kind, TypeKind::Native(NativeType::Dynamic))
    }

    pub fn is_void(self) -> bool {
        matches!(self.kind, TypeKind::Native(NativeType::Void))
    }

    pub fn native_type(self) -> Option<NativeType> {
        match self.kind {
            TypeKind::Native(n) => Some(n),
            TypeKind::Complex(_) => None,
        }
    }

    pub fn complex_id(self) -> Option<ComplexTypeId> {
        match self.kind {
            TypeKind::Complex(id) => Some(id),
            TypeKind::Native(_) => None,
        }
    }

    /// Equal ignoring modifiers.
    pub fn same_base(self, other: TypeInfo) -> bool {
        self.kind == other.kind
    }
}

impl Default for TypeInfo {
    fn default() -> Self {
        TypeInfo::void()
    }
}

/// How a subscript treats an index outside `[0, len)`.
///
/// The policy is a property of the index *type*; the core never inspects a
/// type's name to find it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IndexPolicy {
    /// Plain integer: out of range is a runtime error.
    Checked,
    /// Euclidean modulo of the length.
    Wrapped,
    /// Clamped into `[0, len - 1]`.
    Clamped,
    /// No check by contract; the engine still refuses to leave the memory image.
    Unchecked,
}

impl IndexPolicy {
    /// Map `index` into `[0, len)` or report it as out of range.
    ///
    /// Returns `None` when the access must fail (checked/unchecked out of
    /// range, or an empty container).
    pub fn apply(self, index: i32, len: i32) -> Option<i32> {
        if len <= 0 {
            return None;
        }
        match self {
            IndexPolicy::Checked | IndexPolicy::Unchecked => {
                (0..len).contains(&index).then_some(index)
            }
            IndexPolicy::Wrapped => Some(index.rem_euclid(len)),
            IndexPolicy::Clamped => Some(index.clamp(0, len - 1)),
        }
    }
}

/// Argument of a template instantiation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TemplateArg {
    Type(TypeInfo),
    Int(i32),
}

#[cfg(test)]
mod tests;
