//! Forward-only, restartable token cursor.
//!
//! The tokenizer holds exactly one token (the current one). [`Tokenizer::skip`]
//! moves past whitespace and comments and classifies the next lexeme;
//! speculative parsing uses [`Tokenizer::save`] / [`Tokenizer::restore`]
//! instead of a lookahead buffer.

use logos::Logos;
use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{CodeLocation, SourceRange, TokenKind, Value};

use crate::number::{is_int_min_magnitude, parse_number, scan_number, NumberError};
use crate::raw_token::RawToken;
use crate::SourceMap;

/// Whether a `++`/`--` token binds to the operand before or after it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum IncrementForm {
    Prefix,
    Postfix,
}

#[derive(Copy, Clone, Debug)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte range in the processed text.
    pub start: u32,
    pub end: u32,
    /// Position in the original source.
    pub loc: CodeLocation,
    /// Payload of numeric and boolean literals.
    pub value: Option<Value>,
    /// Set on `++`/`--` tokens only.
    pub increment: Option<IncrementForm>,
    /// Raw text of a doc comment directly preceding this token.
    pub doc: Option<&'a str>,
}

/// Saved cursor state for speculative parsing.
#[derive(Copy, Clone, Debug)]
pub struct Checkpoint<'a> {
    pos: usize,
    current: Token<'a>,
    prev_kind: Option<TokenKind>,
    prefix_minus: bool,
}

pub struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
    end: usize,
    map: &'a SourceMap,
    current: Token<'a>,
    prev_kind: Option<TokenKind>,
    /// The last `-` lexed was a prefix minus.
    prefix_minus: bool,
}

impl<'a> Tokenizer<'a> {
    /// Cursor over `range` of the processed `text`, positioned on the first token.
    pub fn new(text: &'a str, range: SourceRange, map: &'a SourceMap) -> Result<Self, CompileError> {
        let end = (range.end as usize).min(text.len());
        let start = (range.start as usize).min(end);
        let mut tokenizer = Tokenizer {
            text,
            pos: start,
            end,
            map,
            current: Token {
                kind: TokenKind::Eof,
                text: "",
                start: range.start,
                end: range.start,
                loc: CodeLocation::new(map.to_original(range.start)),
                value: None,
                increment: None,
                doc: None,
            },
            prev_kind: None,
            prefix_minus: false,
        };
        tokenizer.skip()?;
        Ok(tokenizer)
    }

    /// Cursor over the whole processed text.
    pub fn whole(text: &'a str, map: &'a SourceMap) -> Result<Self, CompileError> {
        let len = u32::try_from(text.len()).unwrap_or(u32::MAX);
        Tokenizer::new(text, SourceRange::new(0, len), map)
    }

    #[inline]
    pub fn current(&self) -> &Token<'a> {
        &self.current
    }

    #[inline]
    pub fn kind(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    pub fn loc(&self) -> CodeLocation {
        self.current.loc
    }

    /// Processed offset where the current token starts.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.current.start
    }

    /// Processed offset just past the previously consumed token.
    #[inline]
    pub fn position(&self) -> u32 {
        u32::try_from(self.pos).unwrap_or(u32::MAX)
    }

    /// Original location of a processed offset.
    pub fn loc_at(&self, processed: u32) -> CodeLocation {
        CodeLocation::new(self.map.to_original(processed))
    }

    pub fn source(&self) -> &'a str {
        self.text
    }

    /// Consume the current token and read the next one.
    pub fn advance(&mut self) -> Result<Token<'a>, CompileError> {
        let token = self.current;
        self.prev_kind = Some(token.kind);
        self.skip()?;
        Ok(token)
    }

    pub fn save(&self) -> Checkpoint<'a> {
        Checkpoint {
            pos: self.pos,
            current: self.current,
            prev_kind: self.prev_kind,
            prefix_minus: self.prefix_minus,
        }
    }

    pub fn restore(&mut self, checkpoint: Checkpoint<'a>) {
        self.pos = checkpoint.pos;
        self.current = checkpoint.current;
        self.prev_kind = checkpoint.prev_kind;
        self.prefix_minus = checkpoint.prefix_minus;
    }

    /// Split a current `>>` into two `>` tokens (closing nested template
    /// argument lists). Returns `false` if the current token is not `>>`.
    pub fn split_shr(&mut self) -> bool {
        if self.current.kind != TokenKind::Shr {
            return false;
        }
        let second = self.current.start + 1;
        self.current.kind = TokenKind::Gt;
        self.current.text = &self.current.text[..1];
        self.current.end = second;
        self.pos = second as usize;
        true
    }

    /// Advance past whitespace and comments and classify the next lexeme.
    pub fn skip(&mut self) -> Result<(), CompileError> {
        let doc = self.skip_trivia()?;
        let start = self.pos;
        let start32 = u32::try_from(start).unwrap_or(u32::MAX);
        let loc = CodeLocation::new(self.map.to_original(start32));

        if start >= self.end {
            self.current = Token {
                kind: TokenKind::Eof,
                text: "",
                start: start32,
                end: start32,
                loc,
                value: None,
                increment: None,
                doc,
            };
            return Ok(());
        }

        let rest = &self.text[start..self.end];
        let bytes = rest.as_bytes();
        let starts_number = bytes[0].is_ascii_digit()
            || (bytes[0] == b'.' && bytes.get(1).is_some_and(u8::is_ascii_digit));

        let (kind, len, value) = if starts_number {
            let len = scan_number(rest);
            let lexeme = &rest[..len];
            let value = match parse_number(lexeme) {
                // `-2147483648` is the one literal whose magnitude only
                // fits once negated.
                Err(NumberError::Overflow) if self.negated() && is_int_min_magnitude(lexeme) => {
                    Value::Int(i32::MIN)
                }
                other => other.map_err(|e| {
                    CompileError::syntax(ErrorCode::E0003, format!("{e}: `{lexeme}`"), loc)
                })?,
            };
            let kind = match value {
                Value::Float(_) => TokenKind::FloatLit,
                Value::Double(_) => TokenKind::DoubleLit,
                _ => TokenKind::IntLit,
            };
            (kind, len, Some(value))
        } else {
            let mut lexer = RawToken::lexer(rest);
            match lexer.next() {
                Some(Ok(raw)) => {
                    let Some(kind) = raw.kind() else {
                        return Err(CompileError::syntax(
                            ErrorCode::E0001,
                            "unterminated string literal",
                            loc,
                        ));
                    };
                    let value = match kind {
                        TokenKind::True => Some(Value::Bool(true)),
                        TokenKind::False => Some(Value::Bool(false)),
                        _ => None,
                    };
                    (kind, lexer.span().end, value)
                }
                Some(Err(())) | None => {
                    let c = rest.chars().next().unwrap_or('\0');
                    return Err(CompileError::syntax(
                        ErrorCode::E0002,
                        format!("unrecognized character `{c}`"),
                        loc,
                    ));
                }
            }
        };

        let increment = match kind {
            TokenKind::PlusPlus | TokenKind::MinusMinus => Some(if self.prev_is_operand() {
                IncrementForm::Postfix
            } else {
                IncrementForm::Prefix
            }),
            _ => None,
        };

        if kind == TokenKind::Minus {
            self.prefix_minus = !self.prev_is_operand();
        }
        self.pos = start + len;
        self.current = Token {
            kind,
            text: &rest[..len],
            start: start32,
            end: u32::try_from(self.pos).unwrap_or(u32::MAX),
            loc,
            value,
            increment,
            doc,
        };
        tracing::trace!(kind = ?kind, offset = start32, "token");
        Ok(())
    }

    /// The token being lexed directly follows a prefix `-`.
    fn negated(&self) -> bool {
        self.prev_kind == Some(TokenKind::Minus) && self.prefix_minus
    }

    fn prev_is_operand(&self) -> bool {
        matches!(
            self.prev_kind,
            Some(
                TokenKind::Ident
                    | TokenKind::IntLit
                    | TokenKind::FloatLit
                    | TokenKind::DoubleLit
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::This
                    | TokenKind::RParen
                    | TokenKind::RBracket
            )
        )
    }

    /// Skip whitespace and comments; return the last doc comment seen.
    fn skip_trivia(&mut self) -> Result<Option<&'a str>, CompileError> {
        let mut doc = None;
        loop {
            let bytes = self.text.as_bytes();
            while self.pos < self.end && bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            let rest = &self.text[self.pos..self.end];
            if rest.starts_with("//") {
                let len = rest.find('\n').unwrap_or(rest.len());
                if rest.starts_with("///") && !rest.starts_with("////") {
                    doc = Some(&rest[3..len]);
                }
                self.pos += len;
            } else if rest.starts_with("/*") {
                let Some(close) = rest[2..].find("*/") else {
                    let start = u32::try_from(self.pos).unwrap_or(u32::MAX);
                    return Err(CompileError::syntax(
                        ErrorCode::E0004,
                        "unterminated block comment",
                        self.loc_at(start),
                    ));
                };
                let len = close + 4;
                if rest.starts_with("/**") && !rest.starts_with("/**/") {
                    doc = Some(&rest[3..len - 2]);
                }
                self.pos += len;
            } else {
                return Ok(doc);
            }
        }
    }
}

/// Strip comment decoration from a raw doc comment.
pub(crate) fn clean_doc(raw: &str) -> String {
    raw.lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Token<'_> {
    /// Cleaned doc comment text, if any.
    pub fn doc_text(&self) -> Option<String> {
        self.doc.map(clean_doc).filter(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests;
