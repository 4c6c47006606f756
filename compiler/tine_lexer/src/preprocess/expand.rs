//! Textual macro expansion.
//!
//! Expansion happens on identifier tokens outside comments, string literals
//! and numbers. A replacement is rescanned for further macros with the
//! macro itself disabled, so self-referential definitions terminate.

use std::ops::Range;

use rustc_hash::FxHashMap;
use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::CodeLocation;

use super::{MacroEntry, MacroKind};

/// Maximum nesting of macro-in-macro expansions.
pub(super) const MAX_EXPANSION_DEPTH: usize = 64;

/// Either untouched source text or the expansion of one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Piece {
    Verbatim(Range<usize>),
    Expanded { range: Range<usize>, text: String },
}

pub(super) struct Expander<'d> {
    pub defs: &'d FxHashMap<String, MacroEntry>,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// End of the lexeme at `i` if it is a comment, string or number, so
/// callers can copy it without looking inside.
fn skip_opaque(bytes: &[u8], i: usize) -> Option<usize> {
    let b = bytes[i];
    let next = bytes.get(i + 1).copied();
    if b == b'/' && next == Some(b'/') {
        return Some(
            bytes[i..]
                .iter()
                .position(|&c| c == b'\n')
                .map_or(bytes.len(), |p| i + p),
        );
    }
    if b == b'/' && next == Some(b'*') {
        return Some(
            bytes[i + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(bytes.len(), |p| i + 2 + p + 2),
        );
    }
    if b == b'"' {
        let mut j = i + 1;
        while j < bytes.len() && bytes[j] != b'"' && bytes[j] != b'\n' {
            j += if bytes[j] == b'\\' { 2 } else { 1 };
        }
        return Some((j + 1).min(bytes.len()));
    }
    if b.is_ascii_digit() {
        let mut j = i;
        while j < bytes.len() && (is_ident_char(bytes[j]) || bytes[j] == b'.') {
            j += 1;
        }
        return Some(j);
    }
    None
}

impl Expander<'_> {
    /// Split `src` into verbatim text and expansions.
    ///
    /// `base` is the original offset of `src[0]`, used for error locations.
    pub(super) fn scan(
        &self,
        src: &str,
        disabled: &mut Vec<String>,
        depth: usize,
        base: usize,
    ) -> Result<Vec<Piece>, CompileError> {
        let bytes = src.as_bytes();
        let mut pieces = Vec::new();
        let mut verbatim_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if let Some(end) = skip_opaque(bytes, i) {
                i = end.max(i + 1);
                continue;
            }
            if !is_ident_start(bytes[i]) {
                i += 1;
                continue;
            }
            let mut j = i;
            while j < bytes.len() && is_ident_char(bytes[j]) {
                j += 1;
            }
            let name = &src[i..j];
            let Some(entry) = self.defs.get(name).filter(|_| !disabled.iter().any(|d| d == name))
            else {
                i = j;
                continue;
            };
            let loc = CodeLocation::from_usize(base + i);
            if depth >= MAX_EXPANSION_DEPTH {
                return Err(CompileError::syntax(
                    ErrorCode::E0107,
                    format!("macro expansion of `{name}` nested too deeply"),
                    loc,
                ));
            }

            let (replacement, end) = match &entry.kind {
                MacroKind::Definition => (entry.body.clone(), j),
                MacroKind::Macro { params } => {
                    let mut k = j;
                    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                        k += 1;
                    }
                    if bytes.get(k) != Some(&b'(') {
                        i = j;
                        continue;
                    }
                    let (args, close) = split_args(src, k + 1).ok_or_else(|| {
                        CompileError::syntax(
                            ErrorCode::E0101,
                            format!("unterminated invocation of macro `{name}`"),
                            loc,
                        )
                    })?;
                    let args: Vec<&str> = if params.is_empty() && args.len() == 1 && args[0].is_empty() {
                        Vec::new()
                    } else {
                        args
                    };
                    if args.len() != params.len() {
                        return Err(CompileError::syntax(
                            ErrorCode::E0106,
                            format!(
                                "macro parameter amount mismatch: `{name}` expects {} argument(s), found {}",
                                params.len(),
                                args.len()
                            ),
                            loc,
                        ));
                    }
                    let mut expanded_args = Vec::with_capacity(args.len());
                    for arg in args {
                        expanded_args.push(self.expand_to_string(arg, disabled, depth + 1, base + i)?);
                    }
                    (substitute(&entry.body, params, &expanded_args), close + 1)
                }
            };

            disabled.push(name.to_string());
            let text = self.expand_to_string(&replacement, disabled, depth + 1, base + i);
            disabled.pop();
            let text = text?;

            if verbatim_start < i {
                pieces.push(Piece::Verbatim(verbatim_start..i));
            }
            pieces.push(Piece::Expanded {
                range: i..end,
                text,
            });
            i = end;
            verbatim_start = end;
        }
        if verbatim_start < bytes.len() {
            pieces.push(Piece::Verbatim(verbatim_start..bytes.len()));
        }
        Ok(pieces)
    }

    pub(super) fn expand_to_string(
        &self,
        src: &str,
        disabled: &mut Vec<String>,
        depth: usize,
        base: usize,
    ) -> Result<String, CompileError> {
        let pieces = self.scan(src, disabled, depth, base)?;
        let mut out = String::with_capacity(src.len());
        for piece in pieces {
            match piece {
                Piece::Verbatim(range) => out.push_str(&src[range]),
                Piece::Expanded { text, .. } => out.push_str(&text),
            }
        }
        Ok(out)
    }
}

/// Split a macro argument list starting just after `(`.
///
/// Returns the trimmed arguments and the offset of the closing `)`.
fn split_args(src: &str, start: usize) -> Option<(Vec<&str>, usize)> {
    let bytes = src.as_bytes();
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut arg_start = start;
    let mut i = start;
    while i < bytes.len() {
        if let Some(end) = skip_opaque(bytes, i) {
            i = end.max(i + 1);
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b']' | b'}' => depth = depth.saturating_sub(1),
            b')' if depth == 0 => {
                args.push(src[arg_start..i].trim());
                return Some((args, i));
            }
            b')' => depth -= 1,
            b',' if depth == 0 => {
                args.push(src[arg_start..i].trim());
                arg_start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Replace parameter identifiers in `body` with the matching argument text.
fn substitute(body: &str, params: &[String], args: &[String]) -> String {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    let mut copied = 0;
    while i < bytes.len() {
        if let Some(end) = skip_opaque(bytes, i) {
            i = end.max(i + 1);
            continue;
        }
        if !is_ident_start(bytes[i]) {
            i += 1;
            continue;
        }
        let mut j = i;
        while j < bytes.len() && is_ident_char(bytes[j]) {
            j += 1;
        }
        if let Some(idx) = params.iter().position(|p| p == &body[i..j]) {
            out.push_str(&body[copied..i]);
            out.push_str(&args[idx]);
            copied = j;
        }
        i = j;
    }
    out.push_str(&body[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn substitute_replaces_whole_identifiers_only() {
        let params = vec!["x".to_string()];
        let args = vec!["(a+1)".to_string()];
        assert_eq!(substitute("x * xx + x", &params, &args), "(a+1) * xx + (a+1)");
    }

    #[test]
    fn split_args_respects_nesting() {
        let (args, close) = split_args("f(a, (b, c)), d", 2).unwrap();
        assert_eq!(args, vec!["a", "(b, c)"]);
        assert_eq!(close, 11);
    }
}
