use super::*;

#[test]
fn phase_digit() {
    assert_eq!(ErrorCode::E0003.phase(), 0);
    assert_eq!(ErrorCode::E1005.phase(), 1);
    assert_eq!(ErrorCode::E3001.phase(), 3);
    assert_eq!(ErrorCode::E9002.phase(), 9);
}

#[test]
fn display_matches_variant() {
    assert_eq!(ErrorCode::E2002.to_string(), "E2002");
}

#[test]
fn warning_codes() {
    assert!(ErrorCode::E2101.is_warning());
    assert!(!ErrorCode::E2001.is_warning());
}
