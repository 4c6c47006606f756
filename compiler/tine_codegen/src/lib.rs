//! The Tine back end: register allocation, code generation and execution.
//!
//! [`compile`] takes an analysed [`Unit`](tine_sema::Unit) through the back
//! passes:
//!
//! 1. FunctionCompilation, per function
//!    - RegisterAllocation: the [`FramePlan`] decides where every parameter
//!      and local lives
//!    - CodeGeneration: the emitter lowers the body into [`Code`], drawing
//!      registers from one [`RegisterPool`] shared by the whole unit
//! 2. The unit initializer and finalizer, from the class-level declarations
//!
//! The result is an immutable [`Artifact`]. An [`Instance`] holds the memory
//! image for one call context and runs the artifact's functions.

mod artifact;
mod backend;
mod emit;
mod engine;
mod frame;
mod inst;
mod pool;

pub use artifact::{Artifact, Body, Export, GlobalVariable};
pub use backend::compile;
pub use emit::{DESTROY_NAME, INIT_NAME};
pub use engine::{CallError, Instance, DEFAULT_STACK_SIZE, MAX_CALL_DEPTH};
pub use frame::{FramePlan, ParamSlot, Slot};
pub use inst::{Address, Bank, Base, Code, Inst, Label, Operand, Reg};
pub use pool::{FunctionStats, RegisterPool, RegisterState};

#[cfg(test)]
mod test_support;
