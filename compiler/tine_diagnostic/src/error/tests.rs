use super::*;
use pretty_assertions::assert_eq;

#[test]
fn display_names_the_category() {
    let err = CompileError::layout(
        ErrorCode::E3001,
        "duplicate member `v`",
        CodeLocation::new(4),
    );
    assert_eq!(err.to_string(), "LayoutError: duplicate member `v`");
}

#[test]
fn or_at_only_fills_missing_locations() {
    let located = CompileError::syntax(ErrorCode::E1001, "x", CodeLocation::new(3));
    assert_eq!(located.or_at(CodeLocation::new(9)).loc, CodeLocation::new(3));
    let unlocated = CompileError::internal("y", CodeLocation::SYNTHETIC);
    assert_eq!(unlocated.or_at(CodeLocation::new(9)).loc, CodeLocation::new(9));
}

#[test]
fn converts_to_error_diagnostic() {
    let diag = CompileError::dead_code("unreachable statement", CodeLocation::new(1)).to_diagnostic();
    assert!(diag.is_error());
    assert_eq!(diag.code, Some(ErrorCode::E4001));
    assert_eq!(diag.message, "DeadCodeError: unreachable statement");
}
