//! Grammar productions.
//!
//! Each module extends [`Parser`](crate::parser::Parser) with the methods
//! for one part of the language:
//!
//! - `ty`: type expressions and template argument lists
//! - `expr`: precedence climbing over the expression grammar
//! - `stmt`: statements and local declarations
//! - `item`: class-level declarations, structs and templates

mod expr;
mod item;
mod stmt;
mod ty;
