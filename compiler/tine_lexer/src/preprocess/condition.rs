//! `#if` / `#elif` condition evaluation.
//!
//! The condition is an integer constant expression evaluated after
//! `defined` operators are resolved and definitions are expanded. Unknown
//! identifiers evaluate to 0.

use rustc_hash::FxHashMap;
use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{CodeLocation, Value};

use super::expand::Expander;
use super::MacroEntry;
use crate::number::{parse_number, scan_number};

/// Evaluate a conditional directive's expression.
pub(super) fn evaluate(
    expr: &str,
    defs: &FxHashMap<String, MacroEntry>,
    loc: usize,
) -> Result<bool, CompileError> {
    let error = |msg: &str| {
        CompileError::syntax(
            ErrorCode::E0101,
            format!("malformed conditional: {msg}"),
            CodeLocation::from_usize(loc),
        )
    };
    let resolved = resolve_defined(expr, defs).ok_or_else(|| error("bad `defined` operand"))?;
    let expander = Expander { defs };
    let expanded = expander.expand_to_string(&resolved, &mut Vec::new(), 0, loc)?;
    let tokens = lex(&expanded).ok_or_else(|| error("unexpected character"))?;
    if tokens.is_empty() {
        return Err(error("missing expression"));
    }
    let mut parser = CondParser { tokens, pos: 0 };
    let value = parser.ternary().map_err(|m| error(m))?;
    if parser.pos != parser.tokens.len() {
        return Err(error("trailing tokens"));
    }
    Ok(value != 0)
}

/// Replace `defined NAME` and `defined(NAME)` with `1` or `0`.
fn resolve_defined(expr: &str, defs: &FxHashMap<String, MacroEntry>) -> Option<String> {
    let mut out = String::with_capacity(expr.len());
    let mut rest = expr;
    while let Some(pos) = find_word(rest, "defined") {
        out.push_str(&rest[..pos]);
        let mut after = rest[pos + "defined".len()..].trim_start();
        let parenthesized = after.starts_with('(');
        if parenthesized {
            after = after[1..].trim_start();
        }
        let len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        if len == 0 {
            return None;
        }
        let name = &after[..len];
        after = &after[len..];
        if parenthesized {
            after = after.trim_start().strip_prefix(')')?;
        }
        out.push_str(if defs.contains_key(name) { " 1 " } else { " 0 " });
        rest = after;
    }
    out.push_str(rest);
    Some(out)
}

/// Offset of `word` in `text` as a whole identifier.
fn find_word(text: &str, word: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(p) = text[from..].find(word) {
        let start = from + p;
        let end = start + word.len();
        let boundary = |i: Option<&u8>| !i.is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_');
        if boundary(start.checked_sub(1).and_then(|i| bytes.get(i))) && boundary(bytes.get(end)) {
            return Some(start);
        }
        from = end;
    }
    None
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Num(i64),
    Op(&'static str),
}

const OPERATORS: [&str; 20] = [
    "&&", "||", "==", "!=", "<=", ">=", "<<", ">>", "<", ">", "+", "-", "*", "/", "%", "!", "(",
    ")", "?", ":",
];

fn lex(text: &str) -> Option<Vec<Tok>> {
    let mut tokens = Vec::new();
    let mut i = 0;
    let bytes = text.as_bytes();
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
        } else if b.is_ascii_digit() {
            let len = scan_number(&text[i..]);
            let value = match parse_number(&text[i..i + len]).ok()? {
                Value::Int(v) => i64::from(v),
                Value::Float(v) => v as i64,
                Value::Double(v) => v as i64,
                Value::Bool(v) => i64::from(v),
                Value::Pointer(v) => v as i64,
            };
            tokens.push(Tok::Num(value));
            i += len;
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let len = text[i..]
                .bytes()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == b'_')
                .count();
            tokens.push(Tok::Num(i64::from(&text[i..i + len] == "true")));
            i += len;
        } else {
            let op = OPERATORS.iter().find(|op| text[i..].starts_with(**op))?;
            tokens.push(Tok::Op(op));
            i += op.len();
        }
    }
    Some(tokens)
}

struct CondParser {
    tokens: Vec<Tok>,
    pos: usize,
}

type CondResult = Result<i64, &'static str>;

impl CondParser {
    fn eat(&mut self, op: &str) -> bool {
        if matches!(self.tokens.get(self.pos), Some(Tok::Op(o)) if *o == op) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn ternary(&mut self) -> CondResult {
        let cond = self.binary(0)?;
        if self.eat("?") {
            let a = self.ternary()?;
            if !self.eat(":") {
                return Err("expected `:`");
            }
            let b = self.ternary()?;
            return Ok(if cond != 0 { a } else { b });
        }
        Ok(cond)
    }

    fn binary(&mut self, min_level: usize) -> CondResult {
        const LEVELS: [&[&str]; 6] = [
            &["||"],
            &["&&"],
            &["==", "!="],
            &["<", "<=", ">", ">="],
            &["+", "-", "<<", ">>"],
            &["*", "/", "%"],
        ];
        if min_level == LEVELS.len() {
            return self.unary();
        }
        let mut lhs = self.binary(min_level + 1)?;
        loop {
            let Some(Tok::Op(op)) = self.tokens.get(self.pos).cloned() else {
                return Ok(lhs);
            };
            if !LEVELS[min_level].contains(&op) {
                return Ok(lhs);
            }
            self.pos += 1;
            let rhs = self.binary(min_level + 1)?;
            lhs = match op {
                "||" => i64::from(lhs != 0 || rhs != 0),
                "&&" => i64::from(lhs != 0 && rhs != 0),
                "==" => i64::from(lhs == rhs),
                "!=" => i64::from(lhs != rhs),
                "<" => i64::from(lhs < rhs),
                "<=" => i64::from(lhs <= rhs),
                ">" => i64::from(lhs > rhs),
                ">=" => i64::from(lhs >= rhs),
                "+" => lhs.wrapping_add(rhs),
                "-" => lhs.wrapping_sub(rhs),
                "<<" => lhs.wrapping_shl(rhs as u32),
                ">>" => lhs.wrapping_shr(rhs as u32),
                "*" => lhs.wrapping_mul(rhs),
                "/" | "%" if rhs == 0 => return Err("division by zero"),
                "/" => lhs.wrapping_div(rhs),
                _ => lhs.wrapping_rem(rhs),
            };
        }
    }

    fn unary(&mut self) -> CondResult {
        if self.eat("!") {
            return Ok(i64::from(self.unary()? == 0));
        }
        if self.eat("-") {
            return Ok(self.unary()?.wrapping_neg());
        }
        if self.eat("+") {
            return self.unary();
        }
        if self.eat("(") {
            let v = self.ternary()?;
            if !self.eat(")") {
                return Err("expected `)`");
            }
            return Ok(v);
        }
        match self.tokens.get(self.pos) {
            Some(Tok::Num(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(v)
            }
            _ => Err("expected a value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str, defined: &[(&str, &str)]) -> Result<bool, CompileError> {
        let mut defs = FxHashMap::default();
        for (name, body) in defined {
            defs.insert(
                (*name).to_string(),
                MacroEntry {
                    name: (*name).to_string(),
                    kind: super::super::MacroKind::Definition,
                    body: (*body).to_string(),
                    line: 1,
                    external: false,
                },
            );
        }
        evaluate(expr, &defs, 0)
    }

    #[test]
    fn arithmetic_and_logic() {
        assert_eq!(eval("1 + 2 * 3 == 7", &[]), Ok(true));
        assert_eq!(eval("!(1 && 0) || 0", &[]), Ok(true));
        assert_eq!(eval("(4 % 3) - 1", &[]), Ok(false));
        assert_eq!(eval("1 ? 0 : 1", &[]), Ok(false));
    }

    #[test]
    fn definitions_expand_and_unknowns_are_zero() {
        assert_eq!(eval("CHANNELS == 2", &[("CHANNELS", "2")]), Ok(true));
        assert_eq!(eval("UNKNOWN", &[]), Ok(false));
    }

    #[test]
    fn defined_operator() {
        assert_eq!(eval("defined(FOO)", &[("FOO", "")]), Ok(true));
        assert_eq!(eval("defined FOO && !defined BAR", &[("FOO", "")]), Ok(true));
    }

    #[test]
    fn malformed_expressions() {
        assert!(eval("1 +", &[]).is_err());
        assert!(eval("", &[]).is_err());
        assert!(eval("1 / 0", &[]).is_err());
        assert!(eval("1 $ 2", &[]).is_err());
    }
}
