use super::*;
use pretty_assertions::assert_eq;

#[test]
fn builder_and_display() {
    let diag = Diagnostic::error(ErrorCode::E1001)
        .with_message("expected `;`, found `}`")
        .at(CodeLocation::new(10))
        .on_line(3);
    assert!(diag.is_error());
    assert_eq!(diag.to_string(), "error[E1001] line 3: expected `;`, found `}`");
}

#[test]
fn info_has_no_code() {
    let diag = Diagnostic::info().with_message("folded constant");
    assert_eq!(diag.code, None);
    assert_eq!(diag.to_string(), "info: folded constant");
}
