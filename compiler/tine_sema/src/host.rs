//! Host registration protocol.
//!
//! Before a unit is parsed, the host registers its libraries. A library
//! only adds ordinary entries: functions go into the [`FunctionRegistry`]
//! and types into the type pool. Nothing in the compiler refers to a host
//! library by name.

use tine_ir::{IndexPolicy, TypeInfo};
use tine_parse::Frontend;
use tracing::debug;

use crate::functions::{ConstInliner, FunctionData, FunctionRegistry, NativeFn};

/// A set of host functions and types.
pub trait HostLibrary: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    fn register(&self, registry: &mut HostRegistry<'_>);
}

/// Registration handle given to [`HostLibrary::register`].
pub struct HostRegistry<'a> {
    fe: &'a mut Frontend,
    functions: &'a mut FunctionRegistry,
}

impl<'a> HostRegistry<'a> {
    pub fn new(fe: &'a mut Frontend, functions: &'a mut FunctionRegistry) -> Self {
        HostRegistry { fe, functions }
    }

    /// Register a native function under a `::` path such as `Math::sin`.
    pub fn function(&mut self, path: &str, params: &[TypeInfo], ret: TypeInfo, native: NativeFn) {
        let id = self.fe.path(path);
        self.functions
            .add(FunctionData::native(id, params, ret, native));
    }

    /// Register a native function that calls with constant arguments may
    /// be folded through.
    pub fn pure_function(
        &mut self,
        path: &str,
        params: &[TypeInfo],
        ret: TypeInfo,
        native: NativeFn,
        inliner: ConstInliner,
    ) {
        let id = self.fe.path(path);
        let mut data = FunctionData::native(id, params, ret, native);
        data.inliner = Some(inliner);
        self.functions.add(data);
    }

    /// Register an index type template, used as `path<N>`.
    pub fn index_type(&mut self, path: &str, policy: IndexPolicy) {
        self.fe.register_index_type(path, policy);
    }
}

/// Register every library in order.
pub fn register_libraries(
    fe: &mut Frontend,
    functions: &mut FunctionRegistry,
    libraries: &[std::sync::Arc<dyn HostLibrary>],
) {
    let mut registry = HostRegistry::new(fe, functions);
    for library in libraries {
        debug!(library = library.name(), "registering host library");
        library.register(&mut registry);
    }
}
