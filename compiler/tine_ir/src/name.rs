//! Interned identifiers and namespaced paths.

use std::fmt;

use smallvec::SmallVec;

use crate::StringInterner;

/// Interned string identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty string.
    pub const EMPTY: Name = Name(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// A `::`-separated identifier path such as `Math::sin` or `X::get`.
///
/// The last component is the identifier itself; the preceding ones are its
/// namespace. Synthetic namespaces (ranged-for iterators, inlined bodies) are
/// ordinary components whose text can never be written in source.
#[derive(Clone, Eq, PartialEq, Hash, Default)]
pub struct NamespacedIdentifier {
    path: SmallVec<[Name; 3]>,
}

impl NamespacedIdentifier {
    /// The empty (root) namespace.
    pub fn root() -> Self {
        NamespacedIdentifier::default()
    }

    pub fn new(name: Name) -> Self {
        let mut path = SmallVec::new();
        path.push(name);
        NamespacedIdentifier { path }
    }

    pub fn from_path(path: &[Name]) -> Self {
        NamespacedIdentifier {
            path: path.iter().copied().collect(),
        }
    }

    /// Append `name` below this path.
    #[must_use]
    pub fn child(&self, name: Name) -> Self {
        let mut path = self.path.clone();
        path.push(name);
        NamespacedIdentifier { path }
    }

    /// The last component (`sin` in `Math::sin`).
    pub fn id(&self) -> Name {
        self.path.last().copied().unwrap_or(Name::EMPTY)
    }

    /// Everything but the last component.
    pub fn parent(&self) -> Option<NamespacedIdentifier> {
        if self.path.is_empty() {
            return None;
        }
        Some(NamespacedIdentifier {
            path: self.path[..self.path.len() - 1].iter().copied().collect(),
        })
    }

    pub fn components(&self) -> &[Name] {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_plain(&self) -> bool {
        self.path.len() == 1
    }

    /// `true` if `self` starts with every component of `prefix`.
    pub fn starts_with(&self, prefix: &NamespacedIdentifier) -> bool {
        self.path.starts_with(&prefix.path)
    }

    /// `other`'s components appended below this path.
    #[must_use]
    pub fn join(&self, other: &NamespacedIdentifier) -> Self {
        let mut path = self.path.clone();
        path.extend_from_slice(&other.path);
        NamespacedIdentifier { path }
    }

    /// This path and every enclosing one, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = NamespacedIdentifier> + '_ {
        (0..=self.path.len())
            .rev()
            .map(move |len| NamespacedIdentifier::from_path(&self.path[..len]))
    }

    /// The whole path interned as a single name (`ns::k`). A plain
    /// identifier is its own key.
    pub fn key(&self, interner: &mut StringInterner) -> Name {
        if self.is_plain() {
            return self.id();
        }
        let text = self.display(interner);
        interner.intern(&text)
    }

    /// [`key`](Self::key) without interning; `None` if no such key exists.
    pub fn find_key(&self, interner: &StringInterner) -> Option<Name> {
        if self.is_plain() {
            return Some(self.id());
        }
        interner.get(&self.display(interner))
    }

    /// Render with the interner, e.g. `Math::sin`.
    pub fn display(&self, interner: &StringInterner) -> String {
        let mut out = String::new();
        for (i, name) in self.path.iter().enumerate() {
            if i > 0 {
                out.push_str("::");
            }
            out.push_str(interner.lookup(*name));
        }
        out
    }
}

impl fmt::Debug for NamespacedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.path.iter().map(|n| n.raw())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_paths() {
        let mut interner = StringInterner::new();
        let math = interner.intern("Math");
        let sin = interner.intern("sin");
        let id = NamespacedIdentifier::new(math).child(sin);
        assert_eq!(id.id(), sin);
        assert_eq!(id.parent(), Some(NamespacedIdentifier::new(math)));
        assert_eq!(id.display(&interner), "Math::sin");
        assert!(id.starts_with(&NamespacedIdentifier::new(math)));
        assert!(!id.is_plain());
    }

    #[test]
    fn keys_flatten_the_path() {
        let mut interner = StringInterner::new();
        let ns = interner.intern("ns");
        let k = interner.intern("k");
        let plain = NamespacedIdentifier::new(k);
        let nested = NamespacedIdentifier::new(ns).child(k);

        assert_eq!(plain.key(&mut interner), k);
        assert_eq!(nested.find_key(&interner), None);
        let key = nested.key(&mut interner);
        assert_eq!(interner.lookup(key), "ns::k");
        assert_eq!(nested.find_key(&interner), Some(key));
    }

    #[test]
    fn ancestors_end_at_the_root() {
        let mut interner = StringInterner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        let path = NamespacedIdentifier::new(a).child(b);
        let all: Vec<String> = path.ancestors().map(|p| p.display(&interner)).collect();
        assert_eq!(all, vec!["a::b", "a", ""]);
        let joined = NamespacedIdentifier::new(a).join(&NamespacedIdentifier::new(b));
        assert_eq!(joined, path);
    }

    #[test]
    fn root_has_no_parent() {
        assert_eq!(NamespacedIdentifier::root().parent(), None);
        assert_eq!(NamespacedIdentifier::root().id(), Name::EMPTY);
    }
}
