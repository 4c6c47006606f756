use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn integer_forms() {
    assert_eq!(parse_number("42"), Ok(Value::Int(42)));
    assert_eq!(parse_number("0"), Ok(Value::Int(0)));
    assert_eq!(parse_number("0x2A"), Ok(Value::Int(42)));
    assert_eq!(parse_number("0XfF"), Ok(Value::Int(255)));
    assert_eq!(parse_number("052"), Ok(Value::Int(42)));
}

#[test]
fn float_forms() {
    assert_eq!(parse_number("1.5"), Ok(Value::Double(1.5)));
    assert_eq!(parse_number("1.5f"), Ok(Value::Float(1.5)));
    assert_eq!(parse_number(".5"), Ok(Value::Double(0.5)));
    assert_eq!(parse_number("1e3"), Ok(Value::Double(1000.0)));
    assert_eq!(parse_number("2.5E-1f"), Ok(Value::Float(0.25)));
    assert_eq!(parse_number("1.6f"), Ok(Value::Float(1.6)));
}

#[test]
fn malformed_literals() {
    assert_eq!(parse_number("09"), Err(NumberError::InvalidDigit));
    assert_eq!(parse_number("12abc"), Err(NumberError::InvalidDigit));
    assert_eq!(parse_number("0x"), Err(NumberError::InvalidDigit));
    assert_eq!(parse_number("0xZZ"), Err(NumberError::InvalidDigit));
    assert_eq!(parse_number("1.2.3"), Err(NumberError::MalformedFloat));
    assert_eq!(parse_number("1e"), Err(NumberError::MalformedFloat));
    assert_eq!(parse_number("3000000000"), Err(NumberError::Overflow));
    assert_eq!(parse_number("2147483648"), Err(NumberError::Overflow));
}

#[test]
fn int_min_magnitude() {
    assert!(is_int_min_magnitude("2147483648"));
    assert!(!is_int_min_magnitude("2147483647"));
    assert!(!is_int_min_magnitude("2147483649"));
    assert!(!is_int_min_magnitude("020000000000"));
}

#[test]
fn scan_stops_at_operators() {
    assert_eq!(scan_number("12+3"), 2);
    assert_eq!(scan_number("1e-5+x"), 4);
    assert_eq!(scan_number("0xFE+1"), 4);
    assert_eq!(scan_number("1.0f;"), 4);
    assert_eq!(scan_number("4]"), 1);
}

proptest! {
    #[test]
    fn decimal_integers_round_trip(v in 0i32..=i32::MAX) {
        prop_assert_eq!(parse_number(&v.to_string()), Ok(Value::Int(v)));
    }

    #[test]
    fn hex_integers_round_trip(v in any::<u32>()) {
        prop_assert_eq!(parse_number(&format!("0x{v:X}")), Ok(Value::Int(v as i32)));
    }
}
