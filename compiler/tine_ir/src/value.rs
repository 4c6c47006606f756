//! Scalar values and their arithmetic.
//!
//! Constant folding and the execution engine both evaluate through
//! [`Value::binary`], [`Value::unary`] and [`Value::cast`], so a folded
//! expression always produces exactly what the unfolded code would.

use std::fmt;

use crate::{BinaryOp, NativeType, UnaryOp};

/// A scalar runtime or compile-time value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Double(f64),
    Bool(bool),
    /// Byte address inside an instance's memory image.
    Pointer(u64),
}

/// Arithmetic that has no result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithError {
    DivisionByZero,
    /// Operands of different kinds, or an operator the kind does not support.
    TypeMismatch,
}

impl fmt::Display for ArithError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithError::DivisionByZero => f.write_str("integer division by zero"),
            ArithError::TypeMismatch => f.write_str("operand type mismatch"),
        }
    }
}

impl Value {
    pub fn native_type(self) -> NativeType {
        match self {
            Value::Int(_) => NativeType::Integer,
            Value::Float(_) => NativeType::Float,
            Value::Double(_) => NativeType::Double,
            Value::Bool(_) => NativeType::Bool,
            Value::Pointer(_) => NativeType::Pointer,
        }
    }

    /// The zero value of a storable scalar type.
    pub fn zero(ty: NativeType) -> Option<Value> {
        match ty {
            NativeType::Integer => Some(Value::Int(0)),
            NativeType::Float => Some(Value::Float(0.0)),
            NativeType::Double => Some(Value::Double(0.0)),
            NativeType::Bool => Some(Value::Bool(false)),
            NativeType::Pointer => Some(Value::Pointer(0)),
            NativeType::Void | NativeType::Dynamic => None,
        }
    }

    pub fn is_truthy(self) -> bool {
        match self {
            Value::Int(v) => v != 0,
            Value::Float(v) => v != 0.0,
            Value::Double(v) => v != 0.0,
            Value::Bool(v) => v,
            Value::Pointer(v) => v != 0,
        }
    }

    pub fn as_i32(self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(v),
            Value::Bool(v) => Some(i32::from(v)),
            _ => None,
        }
    }

    /// Convert to another scalar type. Pointers only convert to themselves.
    pub fn cast(self, to: NativeType) -> Option<Value> {
        let converted = match (self, to) {
            (v, t) if v.native_type() == t => v,
            (Value::Pointer(_), _) | (_, NativeType::Pointer) => return None,
            (_, NativeType::Bool) => Value::Bool(self.is_truthy()),
            (Value::Int(v), NativeType::Float) => Value::Float(v as f32),
            (Value::Int(v), NativeType::Double) => Value::Double(f64::from(v)),
            (Value::Float(v), NativeType::Integer) => Value::Int(v as i32),
            (Value::Float(v), NativeType::Double) => Value::Double(f64::from(v)),
            (Value::Double(v), NativeType::Integer) => Value::Int(v as i32),
            (Value::Double(v), NativeType::Float) => Value::Float(v as f32),
            (Value::Bool(v), NativeType::Integer) => Value::Int(i32::from(v)),
            (Value::Bool(v), NativeType::Float) => Value::Float(if v { 1.0 } else { 0.0 }),
            (Value::Bool(v), NativeType::Double) => Value::Double(if v { 1.0 } else { 0.0 }),
            _ => return None,
        };
        Some(converted)
    }

    /// Apply a binary operator to operands of the same kind.
    pub fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ArithError> {
        if op.is_logical() {
            let (l, r) = (lhs.is_truthy(), rhs.is_truthy());
            return Ok(Value::Bool(if op == BinaryOp::And { l && r } else { l || r }));
        }
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_binary(op, a, b),
            (Value::Float(a), Value::Float(b)) => match float_op_f32(op, a, b) {
                Some(v) => Ok(Value::Float(v)),
                None => float_binary(op, f64::from(a), f64::from(b), Value::Double),
            },
            (Value::Double(a), Value::Double(b)) => float_binary(op, a, b, Value::Double),
            (Value::Bool(a), Value::Bool(b)) => match op {
                BinaryOp::Eq => Ok(Value::Bool(a == b)),
                BinaryOp::NotEq => Ok(Value::Bool(a != b)),
                _ => int_binary(op, i32::from(a), i32::from(b)),
            },
            (Value::Pointer(a), Value::Pointer(b)) => match op {
                BinaryOp::Eq => Ok(Value::Bool(a == b)),
                BinaryOp::NotEq => Ok(Value::Bool(a != b)),
                _ => Err(ArithError::TypeMismatch),
            },
            _ => Err(ArithError::TypeMismatch),
        }
    }

    /// Apply `-`, `!` or `~`. Increments are lowered to [`Value::binary`].
    pub fn unary(op: UnaryOp, operand: Value) -> Result<Value, ArithError> {
        match (op, operand) {
            (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
            (UnaryOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
            (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
            (UnaryOp::Neg, Value::Double(v)) => Ok(Value::Double(-v)),
            (UnaryOp::BitNot, Value::Int(v)) => Ok(Value::Int(!v)),
            _ => Err(ArithError::TypeMismatch),
        }
    }

    /// Register encoding: the value's bits zero-extended to 64 bits.
    pub fn to_bits(self) -> u64 {
        match self {
            Value::Int(v) => u64::from(v as u32),
            Value::Float(v) => u64::from(v.to_bits()),
            Value::Double(v) => v.to_bits(),
            Value::Bool(v) => u64::from(v),
            Value::Pointer(v) => v,
        }
    }

    /// Inverse of [`Value::to_bits`].
    pub fn from_bits(ty: NativeType, bits: u64) -> Value {
        match ty {
            NativeType::Float => Value::Float(f32::from_bits(bits as u32)),
            NativeType::Double => Value::Double(f64::from_bits(bits)),
            NativeType::Bool => Value::Bool(bits & 0xFFFF_FFFF != 0),
            NativeType::Pointer => Value::Pointer(bits),
            _ => Value::Int(bits as u32 as i32),
        }
    }

    /// Little-endian memory encoding, `native_type().size()` bytes.
    pub fn to_le_bytes(self) -> ([u8; 8], usize) {
        let mut out = [0u8; 8];
        let len = match self {
            Value::Int(v) => {
                out[..4].copy_from_slice(&v.to_le_bytes());
                4
            }
            Value::Float(v) => {
                out[..4].copy_from_slice(&v.to_le_bytes());
                4
            }
            Value::Bool(v) => {
                out[..4].copy_from_slice(&i32::from(v).to_le_bytes());
                4
            }
            Value::Double(v) => {
                out.copy_from_slice(&v.to_le_bytes());
                8
            }
            Value::Pointer(v) => {
                out.copy_from_slice(&v.to_le_bytes());
                8
            }
        };
        (out, len)
    }

    /// Decode from little-endian bytes. `bytes` must hold `ty.size()` bytes.
    pub fn from_le_bytes(ty: NativeType, bytes: &[u8]) -> Option<Value> {
        let four = |b: &[u8]| -> Option<[u8; 4]> { b.get(..4)?.try_into().ok() };
        let eight = |b: &[u8]| -> Option<[u8; 8]> { b.get(..8)?.try_into().ok() };
        Some(match ty {
            NativeType::Integer => Value::Int(i32::from_le_bytes(four(bytes)?)),
            NativeType::Float => Value::Float(f32::from_le_bytes(four(bytes)?)),
            NativeType::Bool => Value::Bool(i32::from_le_bytes(four(bytes)?) != 0),
            NativeType::Double => Value::Double(f64::from_le_bytes(eight(bytes)?)),
            NativeType::Pointer => Value::Pointer(u64::from_le_bytes(eight(bytes)?)),
            NativeType::Void | NativeType::Dynamic => return None,
        })
    }

    /// Bitwise equality; unlike `==`, a NaN equals itself.
    pub fn bit_eq(self, other: Value) -> bool {
        self.native_type() == other.native_type() && self.to_bits() == other.to_bits()
    }

    /// Parse a literal of the given type (used by hosts and test files).
    pub fn parse(text: &str, ty: NativeType) -> Option<Value> {
        let text = text.trim();
        match ty {
            NativeType::Integer => text.parse().ok().map(Value::Int),
            NativeType::Float => text.trim_end_matches('f').parse().ok().map(Value::Float),
            NativeType::Double => text.parse().ok().map(Value::Double),
            NativeType::Bool => match text {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

fn int_binary(op: BinaryOp, a: i32, b: i32) -> Result<Value, ArithError> {
    Ok(match op {
        BinaryOp::Add => Value::Int(a.wrapping_add(b)),
        BinaryOp::Sub => Value::Int(a.wrapping_sub(b)),
        BinaryOp::Mul => Value::Int(a.wrapping_mul(b)),
        BinaryOp::Div => {
            if b == 0 {
                return Err(ArithError::DivisionByZero);
            }
            Value::Int(a.wrapping_div(b))
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ArithError::DivisionByZero);
            }
            Value::Int(a.wrapping_rem(b))
        }
        BinaryOp::BitAnd => Value::Int(a & b),
        BinaryOp::BitOr => Value::Int(a | b),
        BinaryOp::BitXor => Value::Int(a ^ b),
        BinaryOp::Shl => Value::Int(a.wrapping_shl(b as u32)),
        BinaryOp::Shr => Value::Int(a.wrapping_shr(b as u32)),
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::NotEq => Value::Bool(a != b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::LtEq => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::GtEq => Value::Bool(a >= b),
        BinaryOp::And | BinaryOp::Or => return Err(ArithError::TypeMismatch),
    })
}

fn float_binary(
    op: BinaryOp,
    a: f64,
    b: f64,
    wrap: impl Fn(f64) -> Value,
) -> Result<Value, ArithError> {
    Ok(match op {
        BinaryOp::Add => wrap(a + b),
        BinaryOp::Sub => wrap(a - b),
        BinaryOp::Mul => wrap(a * b),
        BinaryOp::Div => wrap(a / b),
        BinaryOp::Mod => wrap(a % b),
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::NotEq => Value::Bool(a != b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::LtEq => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::GtEq => Value::Bool(a >= b),
        _ => return Err(ArithError::TypeMismatch),
    })
}

/// Single-precision arithmetic. Computing in `f64` and rounding would double
/// round, so float results are always produced in `f32`.
fn float_op_f32(op: BinaryOp, a: f32, b: f32) -> Option<f32> {
    match op {
        BinaryOp::Add => Some(a + b),
        BinaryOp::Sub => Some(a - b),
        BinaryOp::Mul => Some(a * b),
        BinaryOp::Div => Some(a / b),
        BinaryOp::Mod => Some(a % b),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Pointer(v) => write!(f, "0x{v:x}"),
        }
    }
}

#[cfg(test)]
mod tests;
