//! The execution engine.
//!
//! An [`Instance`] owns the mutable state of one call context (one voice,
//! one thread): the memory image with global data and the call stack, and
//! an optional debugger hook. The [`Artifact`] it runs stays shared and
//! immutable, so any number of instances can run the same code in parallel.
//!
//! Each activation gets a fresh register file. Native slots are held by the
//! activation; memory-backed slots live in the frame's spill area, exactly
//! where the code generator placed them.

mod memory;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tine_diagnostic::{CompileError, Diagnostic, ErrorCode};
use tine_ir::{ArithError, CodeLocation, FunctionId, IndexPolicy, NativeType, Value};
use tine_stack::ensure_sufficient_stack;
use tracing::{debug, trace};

pub use memory::{global_address, Memory, DEFAULT_STACK_SIZE, GUARD};

use crate::artifact::{Artifact, Body, Export};
use crate::inst::{Address, Bank, Base, Code, Inst, Operand, Reg};

/// Deepest call chain before a stack overflow is reported.
pub const MAX_CALL_DEPTH: u32 = 1024;

/// Why a host call did not produce a value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("no overload of `{name}` accepts ({args})")]
    Signature { name: String, args: String },
    #[error("line {line}: {error}")]
    Runtime { error: CompileError, line: u32 },
}

impl CallError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CallError::UnknownFunction(_) => ErrorCode::E6006,
            CallError::Signature { .. } => ErrorCode::E6005,
            CallError::Runtime { error, .. } => error.code,
        }
    }

    /// The error on the same channel type as compile diagnostics.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CallError::Runtime { error, line } => error.to_diagnostic().on_line(*line),
            _ => Diagnostic::error(self.code()).with_message(self.to_string()),
        }
    }
}

type Hook = Box<dyn FnMut(u32) + Send>;

/// Mutable execution state for one artifact.
pub struct Instance {
    artifact: Arc<Artifact>,
    memory: Memory,
    hook: Option<Hook>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("memory", &self.memory.len())
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

impl Instance {
    /// Create an instance and run the unit initializer.
    pub fn new(artifact: Arc<Artifact>) -> Result<Self, CallError> {
        Self::with_stack_size(artifact, DEFAULT_STACK_SIZE)
    }

    pub fn with_stack_size(artifact: Arc<Artifact>, stack_size: u32) -> Result<Self, CallError> {
        let memory = Memory::new(artifact.globals_size(), artifact.statics(), stack_size)
            .map_err(|error| runtime(&artifact, error))?;
        let mut instance = Instance {
            artifact,
            memory,
            hook: None,
        };
        let artifact = Arc::clone(&instance.artifact);
        instance.run(&artifact.init, &[])?;
        debug!(bytes = instance.memory.len(), "instance ready");
        Ok(instance)
    }

    pub fn artifact(&self) -> &Arc<Artifact> {
        &self.artifact
    }

    /// Called with the source line at every statement of code compiled
    /// in debug mode.
    pub fn set_hook(&mut self, hook: impl FnMut(u32) + Send + 'static) {
        self.hook = Some(Box::new(hook));
    }

    pub fn clear_hook(&mut self) {
        self.hook = None;
    }

    /// Call an exported function by name.
    ///
    /// Overloads are filtered by arity; an overload whose parameter types
    /// match exactly wins, otherwise the first one every argument converts
    /// to implicitly.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, CallError> {
        let artifact = Arc::clone(&self.artifact);
        let mut overloads = artifact.overloads(name).peekable();
        if overloads.peek().is_none() {
            return Err(CallError::UnknownFunction(name.to_string()));
        }
        let candidates: Vec<&Export> = overloads
            .filter(|e| e.params.len() == args.len())
            .collect();
        let exact = candidates.iter().find(|e| {
            e.params
                .iter()
                .zip(args)
                .all(|(&p, a)| a.native_type() == p)
        });
        let export = exact.or_else(|| {
            candidates.iter().find(|e| {
                e.params
                    .iter()
                    .zip(args)
                    .all(|(&p, a)| a.cast(p).is_some())
            })
        });
        let Some(export) = export else {
            let args: Vec<&str> = args.iter().map(|a| a.native_type().name()).collect();
            return Err(CallError::Signature {
                name: name.to_string(),
                args: args.join(", "),
            });
        };
        let converted: Vec<Value> = export
            .params
            .iter()
            .zip(args)
            .filter_map(|(&p, a)| a.cast(p))
            .collect();
        let Some(Body::Code(code)) = artifact.body(export.func) else {
            return Err(CallError::UnknownFunction(name.to_string()));
        };
        let value = self.run(code, &converted)?;
        Ok(export.ret.and(value))
    }

    /// Current value of a scalar unit-level variable.
    pub fn read_global(&self, name: &str) -> Option<Value> {
        let variable = self.artifact.variable(name)?;
        let ty = variable.scalar?;
        self.memory.read(ty, global_address(variable.offset)).ok()
    }

    /// Overwrite a scalar unit-level variable; `false` if there is none or
    /// the value does not convert.
    pub fn write_global(&mut self, name: &str, value: Value) -> bool {
        let Some(variable) = self.artifact.variable(name) else {
            return false;
        };
        let Some(value) = variable.scalar.and_then(|ty| value.cast(ty)) else {
            return false;
        };
        self.memory.write(global_address(variable.offset), value).is_ok()
    }

    /// Run the unit finalizer and release the instance.
    pub fn destroy(mut self) -> Result<(), CallError> {
        let artifact = Arc::clone(&self.artifact);
        self.run(&artifact.destroy, &[])?;
        Ok(())
    }

    fn run(&mut self, code: &Code, args: &[Value]) -> Result<Option<Value>, CallError> {
        let artifact = Arc::clone(&self.artifact);
        let mut machine = Machine {
            artifact: &artifact,
            memory: &mut self.memory,
            hook: &mut self.hook,
            depth: 0,
        };
        let fp = machine.memory.stack_base();
        machine
            .enter(code, fp, args)
            .map_err(|error| runtime(&artifact, error))
    }
}

fn runtime(artifact: &Artifact, error: CompileError) -> CallError {
    let line = artifact.line(error.loc);
    CallError::Runtime { error, line }
}

// ── Interpreter ─────────────────────────────────────────────────────

struct Machine<'a> {
    artifact: &'a Artifact,
    memory: &'a mut Memory,
    hook: &'a mut Option<Hook>,
    depth: u32,
}

/// Register file of one activation.
struct Frame<'c> {
    code: &'c Code,
    fp: u64,
    gp: Vec<Value>,
    fp_regs: Vec<Value>,
}

enum Flow {
    Next,
    Jump(usize),
    Return(Option<Value>),
}

impl Machine<'_> {
    /// Write `args` into the incoming slots at `fp` and run `code`.
    fn enter(
        &mut self,
        code: &Code,
        fp: u64,
        args: &[Value],
    ) -> Result<Option<Value>, CompileError> {
        if self.depth >= MAX_CALL_DEPTH || !self.memory.fits(fp, code.frame_size) {
            return Err(CompileError::runtime(
                ErrorCode::E6003,
                format!("stack overflow calling `{}`", code.name),
                CodeLocation::SYNTHETIC,
            ));
        }
        for (i, &arg) in args.iter().enumerate() {
            self.memory.write(fp + i as u64 * 8, arg)?;
        }
        self.depth += 1;
        trace!(name = %code.name, fp, depth = self.depth, "enter");
        let result = ensure_sufficient_stack(|| self.execute(code, fp));
        self.depth -= 1;
        result
    }

    fn execute(&mut self, code: &Code, fp: u64) -> Result<Option<Value>, CompileError> {
        let mut frame = Frame {
            code,
            fp,
            gp: vec![Value::Int(0); usize::from(Bank::Gp.native_slots())],
            fp_regs: vec![Value::Double(0.0); usize::from(Bank::Fp.native_slots())],
        };
        let mut pc = 0;
        while let Some(inst) = code.insts.get(pc) {
            let loc = code.locs.get(pc).copied().unwrap_or(CodeLocation::SYNTHETIC);
            pc += 1;
            match self.step(&mut frame, inst).map_err(|e| e.or_at(loc))? {
                Flow::Next => {}
                Flow::Jump(target) => pc = target,
                Flow::Return(value) => return Ok(value),
            }
        }
        Ok(None)
    }

    fn step(&mut self, frame: &mut Frame<'_>, inst: &Inst) -> Result<Flow, CompileError> {
        match inst {
            Inst::Move { ty, dst, src } => {
                let value = self.operand(frame, *ty, *src)?;
                self.set(frame, *dst, value)?;
            }
            Inst::Load { ty, dst, addr } => {
                let at = self.resolve(frame, *addr)?;
                let value = self.memory.read(*ty, at)?;
                self.set(frame, *dst, value)?;
            }
            Inst::Store { ty, addr, src } => {
                let at = self.resolve(frame, *addr)?;
                let value = self.operand(frame, *ty, *src)?;
                self.memory.write(at, value)?;
            }
            Inst::Lea { dst, addr } => {
                let at = self.resolve(frame, *addr)?;
                self.set(frame, *dst, Value::Pointer(at))?;
            }
            Inst::Binary {
                op,
                ty,
                dst,
                lhs,
                rhs,
            } => {
                let l = self.get(frame, *lhs, *ty)?;
                let r = self.operand(frame, *ty, *rhs)?;
                let value = Value::binary(*op, l, r).map_err(|e| match e {
                    ArithError::DivisionByZero => CompileError::runtime(
                        ErrorCode::E6002,
                        "integer division by zero",
                        CodeLocation::SYNTHETIC,
                    ),
                    ArithError::TypeMismatch => CompileError::internal(
                        format!("{op:?} on {}", ty.name()),
                        CodeLocation::SYNTHETIC,
                    ),
                })?;
                self.set(frame, *dst, value)?;
            }
            Inst::Unary { op, ty, dst, src } => {
                let v = self.get(frame, *src, *ty)?;
                let value = Value::unary(*op, v).map_err(|_| {
                    CompileError::internal(
                        format!("{op:?} on {}", ty.name()),
                        CodeLocation::SYNTHETIC,
                    )
                })?;
                self.set(frame, *dst, value)?;
            }
            Inst::Convert { from, to, dst, src } => {
                let v = self.get(frame, *src, *from)?;
                let value = v.cast(*to).ok_or_else(|| {
                    CompileError::internal(
                        format!("conversion from {} to {}", from.name(), to.name()),
                        CodeLocation::SYNTHETIC,
                    )
                })?;
                self.set(frame, *dst, value)?;
            }
            Inst::ElementAddr {
                dst,
                base,
                index,
                len,
                stride,
                policy,
            } => {
                let at = self.pointer(frame, *base)?;
                let index = self.int(frame, *index)?;
                let len = self.int(frame, *len)?;
                let element = element_address(at, index, len, *stride, *policy)?;
                self.set(frame, *dst, Value::Pointer(element))?;
            }
            Inst::Copy { dst, src, size } => {
                let to = self.resolve(frame, *dst)?;
                let from = self.resolve(frame, *src)?;
                self.memory.copy(to, from, *size)?;
            }
            Inst::Zero { dst, size } => {
                let to = self.resolve(frame, *dst)?;
                self.memory.zero(to, *size)?;
            }
            Inst::Jump(label) => return Ok(Flow::Jump(target(frame.code, label.index())?)),
            Inst::Branch {
                cond,
                when,
                target: label,
            } => {
                if self.truthy(frame, *cond)? == *when {
                    return Ok(Flow::Jump(target(frame.code, label.index())?));
                }
            }
            Inst::Call { func, args, ret } => {
                let mut values = Vec::with_capacity(args.len());
                for &(ty, arg) in args {
                    values.push(self.operand(frame, ty, arg)?);
                }
                let value = self.call(frame, *func, &values)?;
                if let Some((ty, dst)) = ret {
                    let value = value
                        .and_then(|v| coerce(v, *ty))
                        .or_else(|| Value::zero(*ty))
                        .ok_or_else(|| {
                            CompileError::internal("call without a value", CodeLocation::SYNTHETIC)
                        })?;
                    self.set(frame, *dst, value)?;
                }
            }
            Inst::Ret { value } => {
                let value = match value {
                    Some((ty, op)) => Some(self.operand(frame, *ty, *op)?),
                    None => None,
                };
                return Ok(Flow::Return(value));
            }
            Inst::Hook { line } => {
                if let Some(hook) = self.hook.as_mut() {
                    hook(*line);
                }
            }
        }
        Ok(Flow::Next)
    }

    fn call(
        &mut self,
        caller: &Frame<'_>,
        func: FunctionId,
        args: &[Value],
    ) -> Result<Option<Value>, CompileError> {
        let artifact = self.artifact;
        match artifact.body(func) {
            Some(Body::Code(code)) => {
                let fp = align_up64(caller.fp + u64::from(caller.code.frame_size));
                self.enter(code, fp, args)
            }
            Some(Body::Native(native)) => Ok(Some(native(args))),
            Some(Body::Undefined(name)) => Err(CompileError::runtime(
                ErrorCode::E6006,
                format!("`{name}` is declared but never defined"),
                CodeLocation::SYNTHETIC,
            )),
            None => Err(CompileError::internal(
                format!("call of unknown function {}", func.index()),
                CodeLocation::SYNTHETIC,
            )),
        }
    }

    // ── Registers and operands ──────────────────────────────────

    fn get(&self, frame: &Frame<'_>, reg: Reg, ty: NativeType) -> Result<Value, CompileError> {
        let value = match native_slot(frame, reg) {
            Some(value) => *value,
            None => {
                let bits = self.memory.read_slot(spill(frame, reg)?)?;
                Value::from_bits(ty, bits)
            }
        };
        Ok(reinterpret(value, ty))
    }

    fn set(&mut self, frame: &mut Frame<'_>, reg: Reg, value: Value) -> Result<(), CompileError> {
        let slots = match reg.bank {
            Bank::Gp => &mut frame.gp,
            Bank::Fp => &mut frame.fp_regs,
        };
        if let Some(slot) = slots.get_mut(usize::from(reg.slot)) {
            *slot = value;
            return Ok(());
        }
        let at = spill(frame, reg)?;
        self.memory.write_slot(at, value.to_bits())
    }

    fn operand(
        &self,
        frame: &Frame<'_>,
        ty: NativeType,
        op: Operand,
    ) -> Result<Value, CompileError> {
        match op {
            Operand::Reg(reg) => self.get(frame, reg, ty),
            Operand::Imm(value) => {
                Ok(coerce(value, ty).unwrap_or_else(|| reinterpret(value, ty)))
            }
        }
    }

    fn int(&self, frame: &Frame<'_>, op: Operand) -> Result<i32, CompileError> {
        self.operand(frame, NativeType::Integer, op)?
            .as_i32()
            .ok_or_else(|| CompileError::internal("non-integer index", CodeLocation::SYNTHETIC))
    }

    fn pointer(&self, frame: &Frame<'_>, reg: Reg) -> Result<u64, CompileError> {
        match self.get(frame, reg, NativeType::Pointer)? {
            Value::Pointer(at) => Ok(at),
            other => Ok(other.to_bits()),
        }
    }

    fn truthy(&self, frame: &Frame<'_>, reg: Reg) -> Result<bool, CompileError> {
        if let Some(value) = native_slot(frame, reg) {
            return Ok(value.is_truthy());
        }
        let ty = match reg.bank {
            Bank::Gp => NativeType::Pointer,
            Bank::Fp => NativeType::Double,
        };
        Ok(self.get(frame, reg, ty)?.is_truthy())
    }

    fn resolve(&self, frame: &Frame<'_>, addr: Address) -> Result<u64, CompileError> {
        let base = match addr.base {
            Base::Globals => u64::from(GUARD),
            Base::Frame => frame.fp,
            Base::Reg(reg) => self.pointer(frame, reg)?,
        };
        Ok(base.wrapping_add(u64::from(addr.offset)))
    }
}

fn native_slot<'f>(frame: &'f Frame<'_>, reg: Reg) -> Option<&'f Value> {
    match reg.bank {
        Bank::Gp => frame.gp.get(usize::from(reg.slot)),
        Bank::Fp => frame.fp_regs.get(usize::from(reg.slot)),
    }
}

fn spill(frame: &Frame<'_>, reg: Reg) -> Result<u64, CompileError> {
    frame
        .code
        .spill_address(reg)
        .map(|offset| frame.fp + u64::from(offset))
        .ok_or_else(|| {
            CompileError::internal(format!("no spill slot for {reg}"), CodeLocation::SYNTHETIC)
        })
}

fn target(code: &Code, label: usize) -> Result<usize, CompileError> {
    code.labels
        .get(label)
        .filter(|&&at| at != u32::MAX)
        .map(|&at| at as usize)
        .ok_or_else(|| {
            CompileError::internal(format!("unbound label L{label}"), CodeLocation::SYNTHETIC)
        })
}

/// Same-kind conversion of an operand to the instruction's type.
fn coerce(value: Value, ty: NativeType) -> Option<Value> {
    if value.native_type() == ty {
        Some(value)
    } else {
        value.cast(ty)
    }
}

/// A register holding another kind of value is read bit for bit.
fn reinterpret(value: Value, ty: NativeType) -> Value {
    if value.native_type() == ty {
        value
    } else {
        Value::from_bits(ty, value.to_bits())
    }
}

fn align_up64(at: u64) -> u64 {
    (at + 15) & !15
}

/// Address of element `index` under `policy`.
///
/// An unchecked index out of range still yields an address; the memory
/// checks of the access it feeds catch anything outside the image.
fn element_address(
    base: u64,
    index: i32,
    len: i32,
    stride: u32,
    policy: IndexPolicy,
) -> Result<u64, CompileError> {
    let index = match policy.apply(index, len) {
        Some(i) => i,
        None if policy == IndexPolicy::Unchecked && len > 0 => index,
        None => {
            return Err(CompileError::runtime(
                ErrorCode::E6001,
                format!("index {index} out of range for length {len}"),
                CodeLocation::SYNTHETIC,
            ));
        }
    };
    let offset = i64::from(index) * i64::from(stride);
    Ok(base.wrapping_add_signed(offset))
}

#[cfg(test)]
mod tests;
