//! Processed → original offset mapping.
//!
//! The preprocessor copies most text verbatim and replaces macro
//! invocations with their expansion. Every byte of an expansion maps to the
//! start of the invocation, so diagnostics inside expanded code point at the
//! line where the macro was used.

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
struct Segment {
    processed_start: u32,
    original_start: u32,
    len: u32,
    expanded: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct SourceMap {
    /// Sorted by `processed_start`, contiguous.
    segments: Vec<Segment>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap::default()
    }

    /// Map covering `len` bytes of unmodified text.
    pub fn identity(len: u32) -> Self {
        let mut map = SourceMap::new();
        map.push_verbatim(0, 0, len);
        map
    }

    /// Record `len` bytes copied unchanged from `original_start`.
    pub fn push_verbatim(&mut self, processed_start: u32, original_start: u32, len: u32) {
        if len == 0 {
            return;
        }
        if let Some(last) = self.segments.last_mut() {
            if !last.expanded
                && last.processed_start + last.len == processed_start
                && last.original_start + last.len == original_start
            {
                last.len += len;
                return;
            }
        }
        self.segments.push(Segment {
            processed_start,
            original_start,
            len,
            expanded: false,
        });
    }

    /// Record `len` bytes of expansion text produced for the invocation at
    /// `call_site`.
    pub fn push_expansion(&mut self, processed_start: u32, len: u32, call_site: u32) {
        if len == 0 {
            return;
        }
        self.segments.push(Segment {
            processed_start,
            original_start: call_site,
            len,
            expanded: true,
        });
    }

    /// Original offset of processed offset `processed`.
    pub fn to_original(&self, processed: u32) -> u32 {
        let idx = self
            .segments
            .partition_point(|s| s.processed_start <= processed);
        if idx == 0 {
            return processed;
        }
        let seg = self.segments[idx - 1];
        if seg.expanded {
            seg.original_start
        } else {
            seg.original_start + (processed - seg.processed_start)
        }
    }

    /// `true` if `processed` lies inside macro-expanded text.
    pub fn is_expanded(&self, processed: u32) -> bool {
        let idx = self
            .segments
            .partition_point(|s| s.processed_start <= processed);
        idx > 0 && {
            let seg = self.segments[idx - 1];
            seg.expanded && processed < seg.processed_start + seg.len
        }
    }
}

#[cfg(test)]
mod tests;
