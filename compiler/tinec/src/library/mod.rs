//! Host libraries shipped with the compiler.
//!
//! Both go through the same [`HostLibrary`] protocol any embedding host
//! uses; the compiler itself knows nothing about `Math` or `index`.

mod index;
mod math;

use std::sync::Arc;

use tine_sema::HostLibrary;

pub use index::IndexLibrary;
pub use math::MathLibrary;

/// The libraries [`CompileOptions::default`](crate::CompileOptions) registers.
pub fn default_libraries() -> Vec<Arc<dyn HostLibrary>> {
    vec![Arc::new(MathLibrary), Arc::new(IndexLibrary)]
}

#[cfg(test)]
mod tests;
