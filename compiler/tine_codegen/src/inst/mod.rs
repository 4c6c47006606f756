//! The backend instruction set.
//!
//! A compact register/immediate/memory machine. Every allocator decision is
//! visible in the instructions: which physical slot a value occupies, which
//! operands are immediates, where loads and flushing stores happen.
//!
//! # Registers
//!
//! Two banks, [`Bank::Gp`] (int, bool, pointer) and [`Bank::Fp`] (float,
//! double). Slots below [`Bank::native_slots`] are machine registers; higher
//! slots are memory-backed and live in the frame's spill area.
//!
//! # Addresses
//!
//! An [`Address`] is a base plus a byte offset. The base is the global data
//! ([`Base::Globals`]), the current frame ([`Base::Frame`]) or a pointer
//! held in a register ([`Base::Reg`]).

use std::fmt;

use smallvec::SmallVec;
use tine_ir::{BinaryOp, CodeLocation, FunctionId, IndexPolicy, NativeType, UnaryOp, Value};

// ── Registers ───────────────────────────────────────────────────────

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Bank {
    /// General purpose: int, bool and pointer values.
    Gp,
    /// Floating point: float and double values.
    Fp,
}

impl Bank {
    pub const fn of(ty: NativeType) -> Bank {
        if ty.is_floating() {
            Bank::Fp
        } else {
            Bank::Gp
        }
    }

    /// Number of machine registers in the bank.
    pub const fn native_slots(self) -> u16 {
        match self {
            Bank::Gp => 14,
            Bank::Fp => 16,
        }
    }

    const fn prefix(self) -> char {
        match self {
            Bank::Gp => 'r',
            Bank::Fp => 'f',
        }
    }
}

/// A physical register slot.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Reg {
    pub bank: Bank,
    pub slot: u16,
}

impl Reg {
    pub const fn new(bank: Bank, slot: u16) -> Self {
        Reg { bank, slot }
    }

    /// `true` if the slot has no machine register and lives in the frame.
    pub const fn is_memory_backed(self) -> bool {
        self.slot >= self.bank.native_slots()
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.bank.prefix(), self.slot)?;
        if self.is_memory_backed() {
            f.write_str("!")?;
        }
        Ok(())
    }
}

// ── Operands ────────────────────────────────────────────────────────

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Base {
    Globals,
    Frame,
    Reg(Reg),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Address {
    pub base: Base,
    pub offset: u32,
}

impl Address {
    pub const fn global(offset: u32) -> Self {
        Address {
            base: Base::Globals,
            offset,
        }
    }

    pub const fn frame(offset: u32) -> Self {
        Address {
            base: Base::Frame,
            offset,
        }
    }

    pub const fn reg(reg: Reg) -> Self {
        Address {
            base: Base::Reg(reg),
            offset: 0,
        }
    }

    #[must_use]
    pub const fn plus(self, offset: u32) -> Self {
        Address {
            base: self.base,
            offset: self.offset + offset,
        }
    }

    /// `true` if the address may point into global data or another frame.
    pub const fn is_indirect(self) -> bool {
        !matches!(self.base, Base::Frame)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base {
            Base::Globals => write!(f, "[g+{}]", self.offset),
            Base::Frame => write!(f, "[fp+{}]", self.offset),
            Base::Reg(reg) => write!(f, "[{reg}+{}]", self.offset),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Operand {
    Reg(Reg),
    Imm(Value),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => reg.fmt(f),
            Operand::Imm(value) => write!(f, "#{value}"),
        }
    }
}

/// A jump target; resolved to an instruction index through [`Code::labels`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Label(pub u32);

impl Label {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

// ── Instructions ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Inst {
    Move {
        ty: NativeType,
        dst: Reg,
        src: Operand,
    },
    Load {
        ty: NativeType,
        dst: Reg,
        addr: Address,
    },
    Store {
        ty: NativeType,
        addr: Address,
        src: Operand,
    },
    /// Materialize an address as a pointer value.
    Lea { dst: Reg, addr: Address },
    /// `dst = lhs op rhs`; `ty` is the operand type. Integer division and
    /// modulo take a register divisor.
    Binary {
        op: BinaryOp,
        ty: NativeType,
        dst: Reg,
        lhs: Reg,
        rhs: Operand,
    },
    Unary {
        op: UnaryOp,
        ty: NativeType,
        dst: Reg,
        src: Reg,
    },
    Convert {
        from: NativeType,
        to: NativeType,
        dst: Reg,
        src: Reg,
    },
    /// `dst = base + policy(index, len) * stride`.
    ElementAddr {
        dst: Reg,
        base: Reg,
        index: Operand,
        len: Operand,
        stride: u32,
        policy: IndexPolicy,
    },
    Copy {
        dst: Address,
        src: Address,
        size: u32,
    },
    Zero {
        dst: Address,
        size: u32,
    },
    Jump(Label),
    Branch {
        cond: Reg,
        /// Jump when the condition's truth equals this.
        when: bool,
        target: Label,
    },
    /// Arguments are written into the callee's parameter homes.
    Call {
        func: FunctionId,
        args: SmallVec<[(NativeType, Operand); 4]>,
        ret: Option<(NativeType, Reg)>,
    },
    Ret {
        value: Option<(NativeType, Operand)>,
    },
    /// Statement boundary for the debugger hook.
    Hook { line: u32 },
}

impl Inst {
    pub fn is_jump(&self) -> bool {
        matches!(self, Inst::Jump(_) | Inst::Branch { .. } | Inst::Ret { .. })
    }
}

fn suffix(ty: NativeType) -> &'static str {
    match ty {
        NativeType::Integer => "i32",
        NativeType::Float => "f32",
        NativeType::Double => "f64",
        NativeType::Bool => "b32",
        NativeType::Pointer => "ptr",
        NativeType::Void | NativeType::Dynamic => "void",
    }
}

fn binary_mnemonic(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Mod => "mod",
        BinaryOp::BitAnd => "and",
        BinaryOp::BitOr => "or",
        BinaryOp::BitXor => "xor",
        BinaryOp::Shl => "shl",
        BinaryOp::Shr => "shr",
        BinaryOp::Eq => "seq",
        BinaryOp::NotEq => "sne",
        BinaryOp::Lt => "slt",
        BinaryOp::LtEq => "sle",
        BinaryOp::Gt => "sgt",
        BinaryOp::GtEq => "sge",
        BinaryOp::And => "land",
        BinaryOp::Or => "lor",
    }
}

fn unary_mnemonic(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "neg",
        UnaryOp::Not => "not",
        UnaryOp::BitNot => "inv",
        UnaryOp::PreInc | UnaryOp::PostInc => "inc",
        UnaryOp::PreDec | UnaryOp::PostDec => "dec",
    }
}

fn policy_name(policy: IndexPolicy) -> &'static str {
    match policy {
        IndexPolicy::Checked => "checked",
        IndexPolicy::Wrapped => "wrapped",
        IndexPolicy::Clamped => "clamped",
        IndexPolicy::Unchecked => "unchecked",
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Move { ty, dst, src } => write!(f, "mov.{} {dst}, {src}", suffix(*ty)),
            Inst::Load { ty, dst, addr } => write!(f, "ld.{} {dst}, {addr}", suffix(*ty)),
            Inst::Store { ty, addr, src } => write!(f, "st.{} {addr}, {src}", suffix(*ty)),
            Inst::Lea { dst, addr } => write!(f, "lea {dst}, {addr}"),
            Inst::Binary {
                op,
                ty,
                dst,
                lhs,
                rhs,
            } => write!(
                f,
                "{}.{} {dst}, {lhs}, {rhs}",
                binary_mnemonic(*op),
                suffix(*ty)
            ),
            Inst::Unary { op, ty, dst, src } => {
                write!(f, "{}.{} {dst}, {src}", unary_mnemonic(*op), suffix(*ty))
            }
            Inst::Convert { from, to, dst, src } => {
                write!(f, "cvt.{}.{} {dst}, {src}", suffix(*from), suffix(*to))
            }
            Inst::ElementAddr {
                dst,
                base,
                index,
                len,
                stride,
                policy,
            } => write!(
                f,
                "elem.{} {dst}, {base}[{index} < {len}] * {stride}",
                policy_name(*policy)
            ),
            Inst::Copy { dst, src, size } => write!(f, "copy {dst}, {src}, {size}"),
            Inst::Zero { dst, size } => write!(f, "zero {dst}, {size}"),
            Inst::Jump(label) => write!(f, "jmp {label}"),
            Inst::Branch { cond, when, target } => {
                let kind = if *when { "t" } else { "f" };
                write!(f, "br.{kind} {cond}, {target}")
            }
            Inst::Call { func, args, ret } => {
                write!(f, "call #{}(", func.raw())?;
                for (i, (_, arg)) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")?;
                if let Some((ty, reg)) = ret {
                    write!(f, " -> {}.{reg}", suffix(*ty))?;
                }
                Ok(())
            }
            Inst::Ret { value: None } => f.write_str("ret"),
            Inst::Ret {
                value: Some((ty, value)),
            } => write!(f, "ret.{} {value}", suffix(*ty)),
            Inst::Hook { line } => write!(f, "hook {line}"),
        }
    }
}

// ── Code ────────────────────────────────────────────────────────────

/// The compiled body of one function.
#[derive(Clone, Debug, Default)]
pub struct Code {
    pub name: String,
    pub insts: Vec<Inst>,
    /// Source location of each instruction, parallel to `insts`.
    pub locs: Vec<CodeLocation>,
    /// Instruction index of each label.
    pub labels: Vec<u32>,
    /// Incoming parameter homes, `this` included.
    pub params: u16,
    pub frame_size: u32,
    /// Slots used per bank, memory-backed ones included.
    pub gp_slots: u16,
    pub fp_slots: u16,
    /// Frame offset of the first memory-backed slot.
    pub spill_offset: u32,
}

impl Code {
    /// Frame offset holding a memory-backed register.
    pub fn spill_address(&self, reg: Reg) -> Option<u32> {
        if !reg.is_memory_backed() {
            return None;
        }
        let gp_memory = u32::from(self.gp_slots.saturating_sub(Bank::Gp.native_slots()));
        let index = u32::from(reg.slot - reg.bank.native_slots());
        Some(match reg.bank {
            Bank::Gp => self.spill_offset + index * 8,
            Bank::Fp => self.spill_offset + (gp_memory + index) * 8,
        })
    }

    pub fn memory_backed_slots(&self) -> u32 {
        u32::from(self.gp_slots.saturating_sub(Bank::Gp.native_slots()))
            + u32::from(self.fp_slots.saturating_sub(Bank::Fp.native_slots()))
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: frame {} params {} slots r{} f{}",
            self.name, self.frame_size, self.params, self.gp_slots, self.fp_slots
        )?;
        for (pc, inst) in self.insts.iter().enumerate() {
            for (label, at) in self.labels.iter().enumerate() {
                if *at as usize == pc {
                    writeln!(f, "{}:", Label(label as u32))?;
                }
            }
            writeln!(f, "    {inst}")?;
        }
        for (label, at) in self.labels.iter().enumerate() {
            if *at as usize == self.insts.len() {
                writeln!(f, "{}:", Label(label as u32))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
