//! Stack safety for the recursive parts of the compiler.
//!
//! The parser descends once per nesting level of an expression and every
//! AST pass walks the tree recursively, so call depth grows with source
//! nesting. Two tools keep that bounded:
//!
//! - [`ensure_sufficient_stack`] grows the native stack on demand (via
//!   `stacker`) so legitimate deep nesting never overflows.
//! - [`DepthGuard`] caps logical nesting so pathological input is rejected
//!   with an ordinary error instead of consuming unbounded memory.
//!
//! # Configuration
//!
//! - **Red zone**: 100KB - If less than this remains, we grow the stack
//! - **Growth size**: 1MB - Each growth allocates this much additional space

/// Minimum stack space to keep available (100KB red zone).
const RED_ZONE: usize = 100 * 1024;

/// Stack space to allocate when growing (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Default cap on logical nesting (expressions, blocks, inlined bodies).
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// Ensure sufficient stack space is available before executing `f`.
///
/// # Platform Behavior
///
/// - **Native**: Uses `stacker::maybe_grow` to dynamically grow the stack
/// - **WASM**: Simply calls `f()` directly (WASM manages its own stack)
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM version - just call directly (WASM has its own stack management).
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Counts logical nesting depth against a fixed limit.
///
/// ```text
/// self.depth.enter()?;
/// let result = self.parse_unary();
/// self.depth.leave();
/// ```
#[derive(Clone, Debug)]
pub struct DepthGuard {
    current: u32,
    max: u32,
}

/// Returned by [`DepthGuard::enter`] when the limit is exceeded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DepthExceeded {
    pub max: u32,
}

impl DepthGuard {
    pub const fn new(max: u32) -> Self {
        DepthGuard { current: 0, max }
    }

    /// Enter one nesting level.
    #[inline]
    pub fn enter(&mut self) -> Result<(), DepthExceeded> {
        if self.current >= self.max {
            return Err(DepthExceeded { max: self.max });
        }
        self.current += 1;
        Ok(())
    }

    /// Leave one nesting level. Unbalanced calls saturate at zero.
    #[inline]
    pub fn leave(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.current
    }
}

impl Default for DepthGuard {
    fn default() -> Self {
        DepthGuard::new(DEFAULT_MAX_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shallow_recursion() {
        fn factorial(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n <= 1 { 1 } else { n * factorial(n - 1) })
        }

        assert_eq!(factorial(10), 3_628_800);
    }

    #[test]
    fn test_deep_recursion() {
        fn deep_recurse(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { deep_recurse(n - 1) + 1 })
        }

        assert_eq!(deep_recurse(100_000), 100_000);
    }

    #[test]
    fn test_depth_guard_limits_nesting() {
        let mut guard = DepthGuard::new(2);
        assert!(guard.enter().is_ok());
        assert!(guard.enter().is_ok());
        assert_eq!(guard.enter(), Err(DepthExceeded { max: 2 }));
        guard.leave();
        assert_eq!(guard.depth(), 1);
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn test_depth_guard_leave_saturates() {
        let mut guard = DepthGuard::default();
        guard.leave();
        assert_eq!(guard.depth(), 0);
    }
}
