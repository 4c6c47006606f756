use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn integer_arithmetic_wraps() {
    assert_eq!(
        Value::binary(BinaryOp::Add, Value::Int(i32::MAX), Value::Int(1)),
        Ok(Value::Int(i32::MIN))
    );
    assert_eq!(
        Value::binary(BinaryOp::Div, Value::Int(i32::MIN), Value::Int(-1)),
        Ok(Value::Int(i32::MIN))
    );
}

#[test]
fn integer_division_by_zero_fails() {
    assert_eq!(
        Value::binary(BinaryOp::Div, Value::Int(1), Value::Int(0)),
        Err(ArithError::DivisionByZero)
    );
    assert_eq!(
        Value::binary(BinaryOp::Mod, Value::Int(1), Value::Int(0)),
        Err(ArithError::DivisionByZero)
    );
}

#[test]
fn float_division_by_zero_is_infinite() {
    assert_eq!(
        Value::binary(BinaryOp::Div, Value::Float(1.0), Value::Float(0.0)),
        Ok(Value::Float(f32::INFINITY))
    );
}

#[test]
fn comparisons_yield_bool() {
    assert_eq!(
        Value::binary(BinaryOp::Lt, Value::Double(1.0), Value::Double(2.0)),
        Ok(Value::Bool(true))
    );
    assert_eq!(
        Value::binary(BinaryOp::And, Value::Int(3), Value::Bool(false)),
        Ok(Value::Bool(false))
    );
}

#[test]
fn mixed_kinds_are_rejected() {
    assert_eq!(
        Value::binary(BinaryOp::Add, Value::Int(1), Value::Float(1.0)),
        Err(ArithError::TypeMismatch)
    );
}

#[test]
fn casts() {
    assert_eq!(Value::Float(2.9).cast(NativeType::Integer), Some(Value::Int(2)));
    assert_eq!(Value::Int(3).cast(NativeType::Double), Some(Value::Double(3.0)));
    assert_eq!(Value::Int(3).cast(NativeType::Bool), Some(Value::Bool(true)));
    assert_eq!(Value::Pointer(8).cast(NativeType::Integer), None);
}

#[test]
fn memory_encoding_is_little_endian() {
    let (bytes, len) = Value::Int(0x0102_0304).to_le_bytes();
    assert_eq!(&bytes[..len], &[4, 3, 2, 1]);
    assert_eq!(
        Value::from_le_bytes(NativeType::Integer, &bytes[..4]),
        Some(Value::Int(0x0102_0304))
    );
}

#[test]
fn parse_literals() {
    assert_eq!(Value::parse("21", NativeType::Integer), Some(Value::Int(21)));
    assert_eq!(Value::parse("1.5f", NativeType::Float), Some(Value::Float(1.5)));
    assert_eq!(Value::parse("true", NativeType::Bool), Some(Value::Bool(true)));
}

proptest! {
    #[test]
    fn bits_round_trip_for_every_kind(i in any::<i32>(), f in any::<f32>(), d in any::<f64>()) {
        for v in [Value::Int(i), Value::Float(f), Value::Double(d)] {
            prop_assert!(Value::from_bits(v.native_type(), v.to_bits()).bit_eq(v));
        }
    }

    #[test]
    fn float_ops_match_native_f32(a in -1.0e6f32..1.0e6, b in -1.0e6f32..1.0e6) {
        prop_assert_eq!(Value::binary(BinaryOp::Mul, Value::Float(a), Value::Float(b)), Ok(Value::Float(a * b)));
        prop_assert_eq!(Value::binary(BinaryOp::Add, Value::Float(a), Value::Float(b)), Ok(Value::Float(a + b)));
    }
}
