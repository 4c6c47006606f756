//! Semantic analysis for Tine.
//!
//! A [`Unit`] owns everything one compile knows about the program: the
//! parser's [`Frontend`](tine_parse::Frontend), the [`ScopeArena`], the
//! [`SymbolTable`] and the [`FunctionRegistry`]. [`Unit::analyse`] parses
//! the unit and drives each tree through the front passes:
//!
//! 1. ComplexTypeParsing: struct members and layouts
//! 2. PreSymbolOptimization
//! 3. DataAllocation: scopes, symbols, storage, function registration
//! 4. DataInitialisation: initializer lists and constructors
//! 5. ResolvingSymbols: name binding, overloads, expression types
//! 6. TypeCheck: implicit conversions, assignability, returns
//! 7. PostSymbolOptimization
//!
//! Function bodies are parsed one at a time after the class level, so a
//! body can call anything declared in the unit. Passes may re-enter
//! earlier passes for a sub-tree; see [`PassManager`].

mod functions;
mod host;
pub mod optimize;
mod pass;
mod passes;
mod scope;
mod symbols;
mod unit;

pub use functions::{
    conversion_cost, ConstInliner, FunctionBody, FunctionData, FunctionRegistry, NativeFn,
};
pub use host::{register_libraries, HostLibrary, HostRegistry};
pub use optimize::{builtin_optimizations, select_optimizations, Optimization, Phase};
pub use pass::{AbortFlag, Pass, PassManager};
pub use scope::{Scope, ScopeArena, ScopeKind};
pub use symbols::{Storage, SymbolEntry, SymbolTable};
pub use unit::{FunctionContext, GlobalData, Unit};

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;
