use super::*;
use pretty_assertions::assert_eq;

fn run(src: &str) -> Preprocessed {
    Preprocessor::new().process(src).unwrap()
}

fn error(src: &str) -> CompileError {
    Preprocessor::new().process(src).unwrap_err()
}

fn line_count(text: &str) -> usize {
    text.matches('\n').count()
}

#[test]
fn plain_text_passes_through() {
    let src = "int test(int i) { return i; }\n";
    let out = run(src);
    assert_eq!(out.text, src);
    assert_eq!(out.map.to_original(10), 10);
    assert!(out.catalogue.is_empty());
}

#[test]
fn function_macro_keeps_call_site_line() {
    let src = "#define TWICE(x) (x)*2\n\nint test(int i){ return TWICE(i); }\n";
    let out = run(src);
    assert_eq!(line_count(&out.text), line_count(src));
    assert!(out.text.contains("return (i)*2;"));
    assert!(out.text.starts_with(&" ".repeat("#define TWICE(x) (x)*2".len())));

    let processed = out.text.find("(i)*2").unwrap() as u32;
    let call_site = src.find("TWICE(i)").unwrap() as u32;
    assert_eq!(out.map.to_original(processed), call_site);
    assert_eq!(out.map.to_original(processed + 3), call_site);
    assert!(out.map.is_expanded(processed));
}

#[test]
fn offsets_after_expansion_map_back() {
    let src = "#define N 1000\nint a = N; int b;\n";
    let out = run(src);
    let processed = out.text.find("int b").unwrap() as u32;
    assert_eq!(out.map.to_original(processed), src.find("int b").unwrap() as u32);
}

#[test]
fn multi_line_invocation_preserves_lines() {
    let src = "#define ADD(a, b) a + b\nint x = ADD(1,\n 2);\nint y;\n";
    let out = run(src);
    assert_eq!(line_count(&out.text), line_count(src));
    let y_line = out.text.lines().position(|l| l.contains("int y")).unwrap();
    assert_eq!(y_line, 3);
}

#[test]
fn nested_and_recursive_definitions() {
    let out = run("#define A B + 1\n#define B A\nint x = A;\n");
    assert!(out.text.contains("int x = A + 1;"));
}

#[test]
fn conditionals_select_branches() {
    let src = "#define CHANNELS 2\n#if CHANNELS == 1\nint mono;\n#elif CHANNELS == 2\nint stereo;\n#else\nint many;\n#endif\n";
    let out = run(src);
    assert!(out.text.contains("int stereo;"));
    assert!(!out.text.contains("mono"));
    assert!(!out.text.contains("many"));
    assert_eq!(out.text.len(), src.len());
    assert_eq!(out.deactivated, vec![3..4, 7..8]);
}

#[test]
fn nested_conditionals_inside_inactive_blocks() {
    let src = "#ifdef MISSING\n#if 1\nint a;\n#else\nint b;\n#endif\n#else\nint c;\n#endif\n";
    let out = run(src);
    assert!(!out.text.contains("int a"));
    assert!(!out.text.contains("int b"));
    assert!(out.text.contains("int c"));
}

#[test]
fn ifndef_and_undef() {
    let out = run("#define X\n#undef X\n#ifndef X\nint gone;\n#endif\n");
    assert!(out.text.contains("int gone;"));
}

#[test]
fn continuation_lines_join_directive() {
    let src = "#define SUM(a, b) \\\n  ((a) + (b))\nint s = SUM(1, 2);\n";
    let out = run(src);
    assert_eq!(line_count(&out.text), line_count(src));
    assert!(out.text.contains("int s = ((1) + (2));"));
    assert_eq!(out.catalogue[0].body, "((a) + (b))");
}

#[test]
fn macros_do_not_expand_in_strings_or_comments() {
    let out = run("#define X 5\n// X\nint a = X; /* X */\n");
    assert!(out.text.contains("// X"));
    assert!(out.text.contains("int a = 5; /* X */"));
}

#[test]
fn external_definitions_are_seeded() {
    let mut pp = Preprocessor::new();
    pp.add_external_definition("GAIN", "3");
    let out = pp.process("int g = GAIN;\n").unwrap();
    assert!(out.text.contains("int g = 3;"));
    assert!(out.catalogue[0].external);
}

#[test]
fn catalogue_records_definitions() {
    let out = run("#define PI 3.14\n#define SQ(x) ((x)*(x))\n");
    assert_eq!(
        out.catalogue,
        vec![
            MacroEntry {
                name: "PI".into(),
                kind: MacroKind::Definition,
                body: "3.14".into(),
                line: 1,
                external: false,
            },
            MacroEntry {
                name: "SQ".into(),
                kind: MacroKind::Macro {
                    params: vec!["x".into()],
                },
                body: "((x)*(x))".into(),
                line: 2,
                external: false,
            },
        ]
    );
}

#[test]
fn redefinition_warns() {
    let out = run("#define A 1\n#define A 2\n");
    assert_eq!(out.warnings.len(), 1);
    assert_eq!(out.warnings[0].code, Some(ErrorCode::E0109));
}

#[test]
fn argument_count_mismatch() {
    let err = error("#define F(a, b) a\nint x = F(1);\n");
    assert_eq!(err.code, ErrorCode::E0106);
    assert!(err.message.contains("macro parameter amount mismatch"));
}

#[test]
fn directive_errors() {
    assert_eq!(error("#else\n").code, ErrorCode::E0103);
    assert_eq!(error("#endif\n").code, ErrorCode::E0103);
    assert_eq!(error("#if 1\nint a;\n").code, ErrorCode::E0104);
    assert_eq!(error("#pragma once\n").code, ErrorCode::E0102);
    assert_eq!(error("#include \"x.h\"\n").code, ErrorCode::E0108);
    assert_eq!(error("#if 1\n#else\n#else\n#endif\n").code, ErrorCode::E0101);
    assert_eq!(error("#define\n").code, ErrorCode::E0101);
}

#[test]
fn error_directive_only_fires_when_active() {
    let err = error("\n#error unsupported channel count\n");
    assert_eq!(err.code, ErrorCode::E0105);
    assert_eq!(err.message, "unsupported channel count");
    assert_eq!(err.loc, CodeLocation::new(1));
    assert!(Preprocessor::new()
        .process("#if 0\n#error never\n#endif\n")
        .is_ok());
}

#[test]
fn unknown_directives_are_ignored_when_inactive() {
    assert!(Preprocessor::new()
        .process("#if 0\n#pragma whatever\n#endif\n")
        .is_ok());
}

#[test]
fn expansion_depth_is_bounded() {
    let mut src = String::new();
    for i in 0..80 {
        src.push_str(&format!("#define M{i} M{}\n", i + 1));
    }
    src.push_str("int x = M0;\n");
    assert_eq!(error(&src).code, ErrorCode::E0107);
}
