//! Source positions.
//!
//! A [`CodeLocation`] is a byte offset into the *original* source text,
//! before macro expansion. Line and column are derived on demand through a
//! [`LineIndex`], only when a diagnostic is rendered.

use std::fmt;

/// Byte offset into the original source.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct CodeLocation(u32);

impl CodeLocation {
    /// Location used for compiler-synthesized nodes without a source position.
    pub const SYNTHETIC: CodeLocation = CodeLocation(u32::MAX);

    #[inline]
    pub const fn new(offset: u32) -> Self {
        CodeLocation(offset)
    }

    #[inline]
    pub fn from_usize(offset: usize) -> Self {
        CodeLocation(u32::try_from(offset).unwrap_or(u32::MAX - 1))
    }

    #[inline]
    pub const fn offset(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_synthetic(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_synthetic() {
            write!(f, "@synthetic")
        } else {
            write!(f, "@{}", self.0)
        }
    }
}

/// Half-open byte range in the *processed* (post-preprocessor) text.
///
/// Function and template bodies are stored as ranges and re-parsed later.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SourceRange {
    pub start: u32,
    pub end: u32,
}

impl SourceRange {
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        SourceRange { start, end }
    }

    #[inline]
    pub const fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.end <= self.start
    }
}

/// Line start table for offset → (line, column) conversion.
///
/// Lines and columns are 1-based.
#[derive(Clone, Debug, Default)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(u32::try_from(i + 1).unwrap_or(u32::MAX));
            }
        }
        LineIndex {
            line_starts,
            len: u32::try_from(text.len()).unwrap_or(u32::MAX),
        }
    }

    /// 1-based line of `loc`. Synthetic locations report line 0.
    pub fn line(&self, loc: CodeLocation) -> u32 {
        if loc.is_synthetic() {
            return 0;
        }
        let offset = loc.offset().min(self.len);
        let idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        u32::try_from(idx + 1).unwrap_or(u32::MAX)
    }

    /// 1-based (line, column) of `loc`.
    pub fn line_col(&self, loc: CodeLocation) -> (u32, u32) {
        let line = self.line(loc);
        if line == 0 {
            return (0, 0);
        }
        let start = self.line_starts[(line - 1) as usize];
        (line, loc.offset().min(self.len) - start + 1)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_and_column() {
        let index = LineIndex::new("ab\ncd\n\nx");
        assert_eq!(index.line_col(CodeLocation::new(0)), (1, 1));
        assert_eq!(index.line_col(CodeLocation::new(1)), (1, 2));
        assert_eq!(index.line_col(CodeLocation::new(3)), (2, 1));
        assert_eq!(index.line_col(CodeLocation::new(6)), (3, 1));
        assert_eq!(index.line_col(CodeLocation::new(7)), (4, 1));
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn out_of_range_clamps_to_last_line() {
        let index = LineIndex::new("a\nb");
        assert_eq!(index.line(CodeLocation::new(100)), 2);
    }

    #[test]
    fn synthetic_has_no_line() {
        let index = LineIndex::new("a");
        assert_eq!(index.line(CodeLocation::SYNTHETIC), 0);
    }

    #[test]
    fn source_range_len() {
        assert_eq!(SourceRange::new(4, 10).len(), 6);
        assert!(SourceRange::new(4, 4).is_empty());
    }
}
