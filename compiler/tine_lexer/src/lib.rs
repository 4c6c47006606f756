//! Preprocessor and tokenizer for Tine.
//!
//! Source text flows through two stages:
//!
//! 1. [`Preprocessor::process`] resolves `#define`/`#if`/... directives and
//!    expands macros. Line structure is preserved exactly (directive lines
//!    and inactive lines become blank text of the same length), and a
//!    [`SourceMap`] translates processed offsets back to the original text.
//! 2. [`Tokenizer`] is a forward-only cursor over (a range of) the processed
//!    text that produces one [`Token`] at a time. It can be saved and
//!    restored for speculative parsing, and restarted on any sub-range when
//!    function bodies and templates are parsed later.

mod number;
mod preprocess;
mod raw_token;
mod source_map;
mod tokenizer;

pub use number::{parse_number, NumberError};
pub use preprocess::{MacroEntry, MacroKind, Preprocessed, Preprocessor};
pub use source_map::SourceMap;
pub use tokenizer::{Checkpoint, IncrementForm, Token, Tokenizer};
