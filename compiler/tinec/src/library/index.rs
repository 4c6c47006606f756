//! `index::wrapped<N>`, `index::clamped<N>` and `index::unsafe<N>`.

use tine_ir::IndexPolicy;
use tine_sema::{HostLibrary, HostRegistry};

/// Integer index types whose subscripts follow a bounds policy.
#[derive(Copy, Clone, Debug, Default)]
pub struct IndexLibrary;

impl HostLibrary for IndexLibrary {
    fn name(&self) -> &'static str {
        "index"
    }

    fn register(&self, registry: &mut HostRegistry<'_>) {
        registry.index_type("index::wrapped", IndexPolicy::Wrapped);
        registry.index_type("index::clamped", IndexPolicy::Clamped);
        registry.index_type("index::unsafe", IndexPolicy::Unchecked);
    }
}
