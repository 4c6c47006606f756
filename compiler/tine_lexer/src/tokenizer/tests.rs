use super::*;
use pretty_assertions::assert_eq;

fn kinds(src: &str) -> Vec<TokenKind> {
    let map = SourceMap::identity(src.len() as u32);
    let mut tok = Tokenizer::whole(src, &map).unwrap();
    let mut out = Vec::new();
    while tok.kind() != TokenKind::Eof {
        out.push(tok.advance().unwrap().kind);
    }
    out
}

fn first_error(src: &str) -> CompileError {
    let map = SourceMap::identity(src.len() as u32);
    let mut tok = match Tokenizer::whole(src, &map) {
        Ok(t) => t,
        Err(e) => return e,
    };
    loop {
        match tok.advance() {
            Ok(t) if t.kind == TokenKind::Eof => panic!("no error in {src:?}"),
            Ok(_) => {}
            Err(e) => return e,
        }
    }
}

#[test]
fn function_header() {
    assert_eq!(
        kinds("int test(int input) { return input * 2; }"),
        vec![
            TokenKind::Int,
            TokenKind::Ident,
            TokenKind::LParen,
            TokenKind::Int,
            TokenKind::Ident,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::Return,
            TokenKind::Ident,
            TokenKind::Star,
            TokenKind::IntLit,
            TokenKind::Semicolon,
            TokenKind::RBrace,
        ]
    );
}

#[test]
fn longest_match_operators() {
    assert_eq!(
        kinds("a <<= b >= c :: d"),
        vec![
            TokenKind::Ident,
            TokenKind::ShlEq,
            TokenKind::Ident,
            TokenKind::GtEq,
            TokenKind::Ident,
            TokenKind::ColonColon,
            TokenKind::Ident,
        ]
    );
}

#[test]
fn declaration_keywords() {
    assert_eq!(
        kinds("namespace enum class enums"),
        vec![
            TokenKind::Namespace,
            TokenKind::Enum,
            TokenKind::Struct,
            TokenKind::Ident,
        ]
    );
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        kinds("a /* x */ + // y\n b"),
        vec![TokenKind::Ident, TokenKind::Plus, TokenKind::Ident]
    );
}

#[test]
fn literal_payloads() {
    let src = "1.0f 2.5 0x10 true";
    let map = SourceMap::identity(src.len() as u32);
    let mut tok = Tokenizer::whole(src, &map).unwrap();
    let mut values = Vec::new();
    while tok.kind() != TokenKind::Eof {
        values.push(tok.advance().unwrap().value);
    }
    assert_eq!(
        values,
        vec![
            Some(Value::Float(1.0)),
            Some(Value::Double(2.5)),
            Some(Value::Int(16)),
            Some(Value::Bool(true)),
        ]
    );
}

#[test]
fn member_access_on_identifier_is_not_a_number() {
    assert_eq!(
        kinds("d.size()"),
        vec![
            TokenKind::Ident,
            TokenKind::Dot,
            TokenKind::Ident,
            TokenKind::LParen,
            TokenKind::RParen,
        ]
    );
}

#[test]
fn increment_form_flag() {
    let src = "++i; i++; a[0]--;";
    let map = SourceMap::identity(src.len() as u32);
    let mut tok = Tokenizer::whole(src, &map).unwrap();
    let mut forms = Vec::new();
    while tok.kind() != TokenKind::Eof {
        let t = tok.advance().unwrap();
        if let Some(form) = t.increment {
            forms.push(form);
        }
    }
    assert_eq!(
        forms,
        vec![
            IncrementForm::Prefix,
            IncrementForm::Postfix,
            IncrementForm::Postfix
        ]
    );
}

#[test]
fn save_and_restore() {
    let src = "a b c";
    let map = SourceMap::identity(src.len() as u32);
    let mut tok = Tokenizer::whole(src, &map).unwrap();
    let checkpoint = tok.save();
    tok.advance().unwrap();
    tok.advance().unwrap();
    assert_eq!(tok.current().text, "c");
    tok.restore(checkpoint);
    assert_eq!(tok.current().text, "a");
}

#[test]
fn split_shr_for_nested_templates() {
    let src = ">> x";
    let map = SourceMap::identity(src.len() as u32);
    let mut tok = Tokenizer::whole(src, &map).unwrap();
    assert!(tok.split_shr());
    assert_eq!(tok.advance().unwrap().kind, TokenKind::Gt);
    assert_eq!(tok.advance().unwrap().kind, TokenKind::Gt);
    assert_eq!(tok.kind(), TokenKind::Ident);
}

#[test]
fn sub_range_cursor() {
    let src = "int f() { return 1; }";
    let map = SourceMap::identity(src.len() as u32);
    let tok = Tokenizer::new(src, SourceRange::new(10, 19), &map).unwrap();
    assert_eq!(tok.kind(), TokenKind::Return);
    assert_eq!(tok.loc(), CodeLocation::new(10));
}

#[test]
fn doc_comments_attach_to_next_token() {
    let src = "/** The gain. */ float gain;";
    let map = SourceMap::identity(src.len() as u32);
    let tok = Tokenizer::whole(src, &map).unwrap();
    assert_eq!(tok.current().doc_text(), Some("The gain.".to_string()));
}

#[test]
fn lexical_errors() {
    assert_eq!(first_error("\"abc").code, ErrorCode::E0001);
    assert_eq!(first_error("a $ b").code, ErrorCode::E0002);
    assert_eq!(first_error("x = 09;").code, ErrorCode::E0003);
    assert_eq!(first_error("a /* never closed").code, ErrorCode::E0004);
}

#[test]
fn error_location_is_original_offset() {
    let err = first_error("ab\n  $");
    assert_eq!(err.loc, CodeLocation::new(5));
}

fn values(src: &str) -> Vec<Option<Value>> {
    let map = SourceMap::identity(src.len() as u32);
    let mut tok = Tokenizer::whole(src, &map).unwrap();
    let mut out = Vec::new();
    while tok.kind() != TokenKind::Eof {
        out.push(tok.advance().unwrap().value);
    }
    out
}

#[test]
fn int_min_only_after_a_prefix_minus() {
    assert_eq!(
        values("x = -2147483648;"),
        vec![None, None, None, Some(Value::Int(i32::MIN)), None]
    );
    assert_eq!(values("(-2147483648)")[2], Some(Value::Int(i32::MIN)));
    assert_eq!(first_error("x = 2147483648;").code, ErrorCode::E0003);
    // Binary minus: the literal is an operand on its own.
    assert_eq!(first_error("x = a - 2147483648;").code, ErrorCode::E0003);
    assert_eq!(first_error("x = -2147483649;").code, ErrorCode::E0003);
    assert_eq!(first_error("x = -- 2147483648;").code, ErrorCode::E0003);
}
