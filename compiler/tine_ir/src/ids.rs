//! Arena indices.
//!
//! Every arena owned by a compile session is addressed by a `u32` newtype.
//! Handles are plain data: holding one never keeps the referenced entry
//! alive, and a stale handle is detected by the owning arena.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel for "not assigned".
            pub const INVALID: $name = $name(u32::MAX);

            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            /// Create from an arena length. Arenas never exceed `u32::MAX` entries.
            #[inline]
            pub fn from_usize(index: usize) -> Self {
                $name(u32::try_from(index).unwrap_or(u32::MAX))
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}::INVALID", stringify!($name))
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

define_id!(
    /// Index into the AST node arena.
    NodeId
);
define_id!(
    /// Index into the scope arena. Non-owning: a scope's parent link is a `ScopeId`.
    ScopeId
);
define_id!(
    /// Index into the symbol table.
    SymbolId
);
define_id!(
    /// Index into the function registry (one entry per overload).
    FunctionId
);
define_id!(
    /// Index into the complex type pool.
    ComplexTypeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinel() {
        assert!(!NodeId::INVALID.is_valid());
        assert!(NodeId::new(3).is_valid());
        assert_eq!(NodeId::default(), NodeId::INVALID);
        assert_eq!(format!("{:?}", ScopeId::new(7)), "ScopeId(7)");
        assert_eq!(format!("{:?}", SymbolId::INVALID), "SymbolId::INVALID");
    }

    #[test]
    fn from_usize_round_trips_index() {
        assert_eq!(FunctionId::from_usize(42).index(), 42);
    }
}
