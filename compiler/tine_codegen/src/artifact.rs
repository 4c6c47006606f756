//! The compiled unit: code for every function plus the global data image
//! description an [`Instance`](crate::Instance) is built from.

use std::fmt;

use tine_ir::{CodeLocation, FunctionId, LineIndex, NativeType, Value};
use tine_sema::NativeFn;

use crate::inst::Code;
use crate::pool::FunctionStats;

/// What runs when a function is called.
pub enum Body {
    Code(Code),
    Native(NativeFn),
    /// Declared but never defined; calling it is a runtime error.
    Undefined(String),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Code(code) => f.debug_tuple("Code").field(&code.name).finish(),
            Body::Native(_) => f.write_str("Native"),
            Body::Undefined(name) => f.debug_tuple("Undefined").field(name).finish(),
        }
    }
}

/// A top-level function callable by name from the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub func: FunctionId,
    /// Argument kinds; complex and reference parameters take a pointer.
    pub params: Vec<NativeType>,
    pub ret: Option<NativeType>,
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        let ret = self.ret.map_or("void", NativeType::name);
        write!(f, "{ret} {}({})", self.name, params.join(", "))
    }
}

/// A unit-level variable, for host introspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalVariable {
    pub name: String,
    /// Displayed type, e.g. `span<float, 4>`.
    pub ty: String,
    /// Set for variables a host can read as one value.
    pub scalar: Option<NativeType>,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug)]
pub struct Artifact {
    pub(crate) functions: Vec<Body>,
    pub(crate) init: Code,
    pub(crate) destroy: Code,
    pub(crate) exports: Vec<Export>,
    pub(crate) globals_size: u32,
    pub(crate) statics: Vec<(u32, Value)>,
    pub(crate) variables: Vec<GlobalVariable>,
    pub(crate) lines: LineIndex,
    pub(crate) stats: Vec<FunctionStats>,
}

impl Artifact {
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Every exported overload named `name`.
    pub fn overloads<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Export> {
        self.exports.iter().filter(move |e| e.name == name)
    }

    pub fn variables(&self) -> &[GlobalVariable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&GlobalVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Bytes of global data, statics included.
    pub fn globals_size(&self) -> u32 {
        self.globals_size
    }

    /// Initial values written into a fresh image before `__init` runs.
    pub fn statics(&self) -> &[(u32, Value)] {
        &self.statics
    }

    pub fn body(&self, func: FunctionId) -> Option<&Body> {
        self.functions.get(func.index())
    }

    /// Compiled code by displayed name; the first overload wins.
    pub fn code(&self, name: &str) -> Option<&Code> {
        if name == self.init.name {
            return Some(&self.init);
        }
        if name == self.destroy.name {
            return Some(&self.destroy);
        }
        self.functions.iter().find_map(|body| match body {
            Body::Code(code) if code.name == name => Some(code),
            _ => None,
        })
    }

    /// Listing of one function's instructions.
    pub fn disassemble(&self, name: &str) -> Option<String> {
        self.code(name).map(ToString::to_string)
    }

    /// Register allocation statistics, one entry per generated function.
    pub fn stats(&self) -> &[FunctionStats] {
        &self.stats
    }

    /// 1-based source line of a code location.
    pub fn line(&self, loc: CodeLocation) -> u32 {
        self.lines.line(loc)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.init)?;
        for body in &self.functions {
            if let Body::Code(code) = body {
                writeln!(f, "{code}")?;
            }
        }
        write!(f, "{}", self.destroy)
    }
}
