//! The preprocessor.
//!
//! Runs once over the whole unit before tokenization. Directive lines and
//! lines inside inactive conditional blocks are replaced by spaces of the
//! same byte length, so line numbers never move. Active text is expanded in
//! chunks between directives, which means a definition only affects the
//! lines that follow it.

mod condition;
mod expand;

use std::ops::Range;

use rustc_hash::FxHashMap;
use tine_diagnostic::{CompileError, Diagnostic, ErrorCode};
use tine_ir::CodeLocation;
use tracing::{debug, trace};

use crate::SourceMap;
use expand::{Expander, Piece};

/// Shape of a definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroKind {
    /// `#define NAME body`
    Definition,
    /// `#define NAME(a, b) body`
    Macro { params: Vec<String> },
}

/// One entry in the definition catalogue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroEntry {
    pub name: String,
    pub kind: MacroKind,
    pub body: String,
    /// 1-based line of the `#define`; 0 for external definitions.
    pub line: u32,
    pub external: bool,
}

/// Output of [`Preprocessor::process`].
#[derive(Clone, Debug)]
pub struct Preprocessed {
    pub text: String,
    pub map: SourceMap,
    /// 1-based, end-exclusive line ranges removed by conditionals.
    pub deactivated: Vec<Range<u32>>,
    /// Every definition seen, in declaration order (externals first).
    pub catalogue: Vec<MacroEntry>,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Clone, Debug, Default)]
pub struct Preprocessor {
    external: Vec<MacroEntry>,
}

#[derive(Copy, Clone, Debug)]
struct Frame {
    parent_active: bool,
    active: bool,
    taken: bool,
    seen_else: bool,
    loc: usize,
}

/// A physical line: byte range of the content (without the newline) and
/// whether a `\n` follows.
#[derive(Copy, Clone, Debug)]
struct Line {
    start: usize,
    end: usize,
    newline: bool,
}

fn split_lines(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;
    for piece in source.split_inclusive('\n') {
        let newline = piece.ends_with('\n');
        let end = start + piece.len() - usize::from(newline);
        lines.push(Line {
            start,
            end,
            newline,
        });
        start += piece.len();
    }
    lines
}

fn is_continued(text: &str) -> bool {
    text.trim_end().ends_with('\\')
}

fn malformed(message: impl Into<String>, loc: usize) -> CompileError {
    CompileError::syntax(ErrorCode::E0101, message, CodeLocation::from_usize(loc))
}

fn ident_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    if !bytes.first().is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') {
        return 0;
    }
    bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count()
}

impl Preprocessor {
    pub fn new() -> Self {
        Preprocessor::default()
    }

    /// Seed a definition before processing, as if `#define name body`
    /// preceded the source.
    pub fn add_external_definition(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.external.push(MacroEntry {
            name: name.into(),
            kind: MacroKind::Definition,
            body: body.into(),
            line: 0,
            external: true,
        });
    }

    #[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
    pub fn process(&self, source: &str) -> Result<Preprocessed, CompileError> {
        let mut state = State {
            source,
            out: String::with_capacity(source.len()),
            map: SourceMap::new(),
            defs: FxHashMap::default(),
            catalogue: Vec::new(),
            warnings: Vec::new(),
            stack: Vec::new(),
            deactivated: Vec::new(),
        };
        for entry in &self.external {
            state.defs.insert(entry.name.clone(), entry.clone());
            state.catalogue.push(entry.clone());
        }

        let lines = split_lines(source);
        let mut chunk: Option<Range<usize>> = None;
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            let content = &source[line.start..line.end];
            let line_no = i as u32 + 1;

            if content.trim_start().starts_with('#') {
                if let Some(range) = chunk.take() {
                    state.flush(range)?;
                }
                let mut last = i;
                while is_continued(&source[lines[last].start..lines[last].end])
                    && last + 1 < lines.len()
                {
                    last += 1;
                }
                let directive = lines[i..=last]
                    .iter()
                    .map(|l| {
                        let text = &source[l.start..l.end];
                        text.trim_end().strip_suffix('\\').unwrap_or(text)
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                for l in &lines[i..=last] {
                    state.blank(*l);
                }
                let loc = line.start + (content.len() - content.trim_start().len());
                state.directive(&directive, loc, line_no)?;
                i = last + 1;
                continue;
            }

            if state.active() {
                let end = if line.newline { line.end + 1 } else { line.end };
                chunk = Some(chunk.map_or(line.start..end, |c| c.start..end));
            } else {
                if let Some(range) = chunk.take() {
                    state.flush(range)?;
                }
                state.blank(line);
                match state.deactivated.last_mut() {
                    Some(last) if last.end == line_no => last.end += 1,
                    _ => state.deactivated.push(line_no..line_no + 1),
                }
            }
            i += 1;
        }
        if let Some(range) = chunk.take() {
            state.flush(range)?;
        }
        if let Some(frame) = state.stack.last() {
            return Err(CompileError::syntax(
                ErrorCode::E0104,
                "missing #endif",
                CodeLocation::from_usize(frame.loc),
            ));
        }

        debug!(
            definitions = state.catalogue.len(),
            deactivated = state.deactivated.len(),
            "preprocessed"
        );
        Ok(Preprocessed {
            text: state.out,
            map: state.map,
            deactivated: state.deactivated,
            catalogue: state.catalogue,
            warnings: state.warnings,
        })
    }
}

struct State<'s> {
    source: &'s str,
    out: String,
    map: SourceMap,
    defs: FxHashMap<String, MacroEntry>,
    catalogue: Vec<MacroEntry>,
    warnings: Vec<Diagnostic>,
    stack: Vec<Frame>,
    deactivated: Vec<Range<u32>>,
}

impl State<'_> {
    fn active(&self) -> bool {
        self.stack.last().map_or(true, |f| f.active)
    }

    /// Replace a line by spaces of the same length.
    fn blank(&mut self, line: Line) {
        let len = line.end - line.start + usize::from(line.newline);
        self.map
            .push_verbatim(self.out.len() as u32, line.start as u32, len as u32);
        self.out.push_str(&" ".repeat(line.end - line.start));
        if line.newline {
            self.out.push('\n');
        }
    }

    /// Expand an active chunk of source into the output.
    fn flush(&mut self, range: Range<usize>) -> Result<(), CompileError> {
        let source = self.source;
        let text = &source[range.clone()];
        let expander = Expander { defs: &self.defs };
        let pieces = expander.scan(text, &mut Vec::new(), 0, range.start)?;
        for piece in pieces {
            match piece {
                Piece::Verbatim(r) => {
                    self.map.push_verbatim(
                        self.out.len() as u32,
                        (range.start + r.start) as u32,
                        r.len() as u32,
                    );
                    self.out.push_str(&text[r]);
                }
                Piece::Expanded { range: r, text: expansion } => {
                    let call_site = range.start + r.start;
                    let newlines = text[r].bytes().filter(|b| *b == b'\n').count();
                    let start = self.out.len();
                    self.out.push_str(&expansion.replace('\n', " "));
                    self.out.push_str(&"\n".repeat(newlines));
                    self.map.push_expansion(
                        start as u32,
                        (self.out.len() - start) as u32,
                        call_site as u32,
                    );
                }
            }
        }
        Ok(())
    }

    fn directive(&mut self, text: &str, loc: usize, line: u32) -> Result<(), CompileError> {
        let body = text.trim_start().trim_start_matches('#').trim_start();
        let name_len = body
            .bytes()
            .take_while(u8::is_ascii_alphabetic)
            .count();
        let (name, rest) = body.split_at(name_len);
        let rest = rest.trim();
        trace!(directive = name, line, "directive");

        match name {
            "if" | "ifdef" | "ifndef" => {
                let parent_active = self.active();
                let cond = parent_active && self.condition(name, rest, loc)?;
                self.stack.push(Frame {
                    parent_active,
                    active: cond,
                    taken: cond,
                    seen_else: false,
                    loc,
                });
            }
            "elif" => {
                let frame = self.frame(name, loc)?;
                if frame.seen_else {
                    return Err(malformed("#elif after #else", loc));
                }
                let cond = frame.parent_active && !frame.taken && self.condition("if", rest, loc)?;
                if let Some(frame) = self.stack.last_mut() {
                    frame.active = cond;
                    frame.taken |= cond;
                }
            }
            "else" => {
                let frame = self.frame(name, loc)?;
                if frame.seen_else {
                    return Err(malformed("duplicate #else", loc));
                }
                if let Some(frame) = self.stack.last_mut() {
                    frame.active = frame.parent_active && !frame.taken;
                    frame.taken = true;
                    frame.seen_else = true;
                }
            }
            "endif" => {
                self.frame(name, loc)?;
                self.stack.pop();
            }
            _ if !self.active() => {}
            "define" => self.define(rest, loc, line)?,
            "undef" => {
                let len = ident_len(rest);
                if len == 0 {
                    return Err(malformed("#undef expects a name", loc));
                }
                self.defs.remove(&rest[..len]);
            }
            "error" => {
                return Err(CompileError::syntax(
                    ErrorCode::E0105,
                    rest.to_string(),
                    CodeLocation::from_usize(loc),
                ));
            }
            "include" => {
                return Err(CompileError::syntax(
                    ErrorCode::E0108,
                    "#include is not supported",
                    CodeLocation::from_usize(loc),
                ));
            }
            "" if rest.is_empty() => {}
            _ => {
                return Err(CompileError::syntax(
                    ErrorCode::E0102,
                    format!("unknown preprocessor directive `#{name}`"),
                    CodeLocation::from_usize(loc),
                ));
            }
        }
        Ok(())
    }

    fn frame(&self, name: &str, loc: usize) -> Result<Frame, CompileError> {
        self.stack.last().copied().ok_or_else(|| {
            CompileError::syntax(
                ErrorCode::E0103,
                format!("#{name} without #if"),
                CodeLocation::from_usize(loc),
            )
        })
    }

    fn condition(&self, directive: &str, rest: &str, loc: usize) -> Result<bool, CompileError> {
        match directive {
            "ifdef" | "ifndef" => {
                let len = ident_len(rest);
                if len == 0 || !rest[len..].trim().is_empty() {
                    return Err(malformed(format!("#{directive} expects a single name"), loc));
                }
                Ok(self.defs.contains_key(&rest[..len]) == (directive == "ifdef"))
            }
            _ => condition::evaluate(rest, &self.defs, loc),
        }
    }

    fn define(&mut self, rest: &str, loc: usize, line: u32) -> Result<(), CompileError> {
        let len = ident_len(rest);
        if len == 0 {
            return Err(malformed("#define expects a name", loc));
        }
        let name = &rest[..len];
        let after = &rest[len..];
        let (kind, body) = if let Some(inner) = after.strip_prefix('(') {
            let close = inner
                .find(')')
                .ok_or_else(|| malformed(format!("unterminated parameter list of `{name}`"), loc))?;
            let list = inner[..close].trim();
            let params = if list.is_empty() {
                Vec::new()
            } else {
                list.split(',')
                    .map(|p| {
                        let p = p.trim();
                        if ident_len(p) == p.len() && !p.is_empty() {
                            Ok(p.to_string())
                        } else {
                            Err(malformed(format!("invalid macro parameter `{p}`"), loc))
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?
            };
            (
                MacroKind::Macro { params },
                inner[close + 1..].trim().to_string(),
            )
        } else {
            (MacroKind::Definition, after.trim().to_string())
        };

        let entry = MacroEntry {
            name: name.to_string(),
            kind,
            body,
            line,
            external: false,
        };
        if let Some(previous) = self.defs.get(name) {
            if previous.kind != entry.kind || previous.body != entry.body {
                self.warnings.push(
                    Diagnostic::warning(ErrorCode::E0109)
                        .with_message(format!("`{name}` redefined"))
                        .at(CodeLocation::from_usize(loc)),
                );
            }
        }
        self.catalogue.push(entry.clone());
        self.defs.insert(entry.name.clone(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
