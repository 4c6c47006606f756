//! Error codes for all compiler diagnostics.
//!
//! Format: E#### where the first digit indicates the phase:
//! - E0xxx: Tokenizer / preprocessor
//! - E1xxx: Parser
//! - E2xxx: Symbols and types
//! - E3xxx: Complex type layout
//! - E4xxx: Dead code
//! - E5xxx: Register allocation / backend
//! - E6xxx: Runtime (executing compiled code)
//! - E9xxx: Internal compiler errors

use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Tokenizer / preprocessor (E0xxx)
    /// Unterminated string literal
    E0001,
    /// Unrecognized character
    E0002,
    /// Malformed numeric literal
    E0003,
    /// Unterminated block comment
    E0004,
    /// Malformed preprocessor directive
    E0101,
    /// Unknown preprocessor directive
    E0102,
    /// `#elif`/`#else`/`#endif` without `#if`
    E0103,
    /// Missing `#endif`
    E0104,
    /// `#error` reached in an active region
    E0105,
    /// Macro argument count mismatch
    E0106,
    /// Macro expansion too deep
    E0107,
    /// `#include` is not supported
    E0108,
    /// Definition redefined (warning)
    E0109,

    // Parser (E1xxx)
    /// Unexpected token
    E1001,
    /// Expected expression
    E1002,
    /// Expected type
    E1003,
    /// Expected identifier
    E1004,
    /// Not all paths return a value
    E1005,
    /// Nesting too deep
    E1006,
    /// Invalid template arguments
    E1007,
    /// Invalid declaration
    E1008,

    // Symbols and types (E2xxx)
    /// Unresolved symbol
    E2001,
    /// No matching overload
    E2002,
    /// Type mismatch
    E2003,
    /// Assignment to a constant
    E2004,
    /// Expression is not assignable
    E2005,
    /// Duplicate symbol in scope
    E2006,
    /// Invalid member access
    E2007,
    /// Ambiguous member in several base classes
    E2008,
    /// Private member access
    E2009,
    /// Invalid cast
    E2010,
    /// Type cannot be deduced
    E2011,
    /// Unsupported operation
    E2012,
    /// Implicit narrowing conversion (warning)
    E2101,
    /// Unknown optimization id (warning)
    E2102,

    // Layout (E3xxx)
    /// Duplicate member
    E3001,
    /// Type already finalised
    E3002,
    /// Type cannot be finalised
    E3003,
    /// Invalid span size
    E3004,
    /// Type too large
    E3005,

    // Dead code (E4xxx)
    /// Unreachable statement
    E4001,

    // Backend (E5xxx)
    /// Register left active after a function
    E5001,
    /// Backend limit exceeded
    E5002,

    // Runtime (E6xxx)
    /// Index out of bounds
    E6001,
    /// Integer division by zero
    E6002,
    /// Stack overflow
    E6003,
    /// Invalid memory access
    E6004,
    /// Call signature mismatch
    E6005,
    /// Unknown function
    E6006,
    /// Instance memory cannot be allocated
    E6007,

    // Internal (E9xxx)
    /// Internal compiler error
    E9001,
    /// Compilation aborted
    E9002,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::E0001 => "E0001",
            ErrorCode::E0002 => "E0002",
            ErrorCode::E0003 => "E0003",
            ErrorCode::E0004 => "E0004",
            ErrorCode::E0101 => "E0101",
            ErrorCode::E0102 => "E0102",
            ErrorCode::E0103 => "E0103",
            ErrorCode::E0104 => "E0104",
            ErrorCode::E0105 => "E0105",
            ErrorCode::E0106 => "E0106",
            ErrorCode::E0107 => "E0107",
            ErrorCode::E0108 => "E0108",
            ErrorCode::E0109 => "E0109",
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E1006 => "E1006",
            ErrorCode::E1007 => "E1007",
            ErrorCode::E1008 => "E1008",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2007 => "E2007",
            ErrorCode::E2008 => "E2008",
            ErrorCode::E2009 => "E2009",
            ErrorCode::E2010 => "E2010",
            ErrorCode::E2011 => "E2011",
            ErrorCode::E2012 => "E2012",
            ErrorCode::E2101 => "E2101",
            ErrorCode::E2102 => "E2102",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E3005 => "E3005",
            ErrorCode::E4001 => "E4001",
            ErrorCode::E5001 => "E5001",
            ErrorCode::E5002 => "E5002",
            ErrorCode::E6001 => "E6001",
            ErrorCode::E6002 => "E6002",
            ErrorCode::E6003 => "E6003",
            ErrorCode::E6004 => "E6004",
            ErrorCode::E6005 => "E6005",
            ErrorCode::E6006 => "E6006",
            ErrorCode::E6007 => "E6007",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
        }
    }

    /// Phase digit (the first digit of the code).
    pub fn phase(self) -> u8 {
        self.as_str().as_bytes()[1] - b'0'
    }

    /// Codes that are only ever used for warnings.
    pub fn is_warning(self) -> bool {
        matches!(self, ErrorCode::E0109 | ErrorCode::E2101 | ErrorCode::E2102)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests;
