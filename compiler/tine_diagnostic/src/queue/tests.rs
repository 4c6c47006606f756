use super::*;
use crate::ErrorCode;
use pretty_assertions::assert_eq;
use tine_ir::CodeLocation;

#[test]
fn keeps_push_order_and_resolves_lines() {
    let mut queue = DiagnosticQueue::new("a\nb\nc");
    queue.push(
        Diagnostic::warning(ErrorCode::E2101)
            .with_message("narrowing")
            .at(CodeLocation::new(2)),
    );
    queue.push_error(&CompileError::type_error(
        ErrorCode::E2001,
        "unknown `x`",
        CodeLocation::new(4),
    ));
    let lines: Vec<_> = queue.iter().map(|d| (d.severity, d.line)).collect();
    assert_eq!(lines, vec![(Severity::Warning, 2), (Severity::Error, 3)]);
    assert!(queue.has_errors());
    assert_eq!(queue.error_count(), 1);
}

#[test]
fn explicit_line_is_kept() {
    let mut queue = DiagnosticQueue::new("a\nb");
    queue.push(Diagnostic::info().with_message("x").on_line(7));
    assert_eq!(queue.into_vec()[0].line, 7);
}
