//! Declared entities.

use crate::{NamespacedIdentifier, TypeInfo};

/// How a symbol's value exists at runtime.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum StorageClass {
    Variable,
    /// Compile-time constant; never has storage.
    Constant,
    Function,
    TemplateParameter,
}

/// Member visibility inside a struct.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A namespaced identifier with its type and storage class.
///
/// Unique within the owning scope. Only `ty` may change after declaration,
/// when an `auto` symbol is resolved.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Symbol {
    pub id: NamespacedIdentifier,
    pub ty: TypeInfo,
    pub storage: StorageClass,
}

impl Symbol {
    pub fn variable(id: NamespacedIdentifier, ty: TypeInfo) -> Self {
        Symbol {
            id,
            ty,
            storage: StorageClass::Variable,
        }
    }

    pub fn constant(id: NamespacedIdentifier, ty: TypeInfo) -> Self {
        Symbol {
            id,
            ty,
            storage: StorageClass::Constant,
        }
    }
}
