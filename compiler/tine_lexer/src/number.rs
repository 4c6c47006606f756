//! Numeric literal scanning and parsing.
//!
//! Forms: decimal `42`, hex `0x2A`, octal `052`, floating `1.5`, `.5`,
//! `1e-3`, `2.5E+2`. A trailing `f` selects single precision
//! (`1.0f` is a float, `1.0` a double). Integers must fit in 32 bits;
//! `2147483648` is accepted only right after a prefix `-`.

use std::fmt;

use tine_ir::Value;

/// Why a numeric lexeme is malformed.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NumberError {
    InvalidDigit,
    Overflow,
    MalformedFloat,
}

impl fmt::Display for NumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NumberError::InvalidDigit => "invalid digit in numeric literal",
            NumberError::Overflow => "integer literal does not fit in 32 bits",
            NumberError::MalformedFloat => "malformed floating point literal",
        })
    }
}

/// Byte length of the numeric lexeme at the start of `text`.
///
/// Scans greedily over digits, letters, `_` and `.` so that malformed
/// literals such as `12abc` are reported as one bad number. A sign is only
/// part of the lexeme right after a decimal exponent marker.
pub(crate) fn scan_number(text: &str) -> usize {
    let bytes = text.as_bytes();
    let is_hex = bytes.len() > 1 && bytes[0] == b'0' && matches!(bytes[1], b'x' | b'X');
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
            i += 1;
            if !is_hex
                && matches!(b, b'e' | b'E')
                && i < bytes.len()
                && matches!(bytes[i], b'+' | b'-')
            {
                i += 1;
            }
        } else {
            break;
        }
    }
    i
}

/// Parse a complete numeric lexeme.
pub fn parse_number(lexeme: &str) -> Result<Value, NumberError> {
    if let Some(hex) = lexeme
        .strip_prefix("0x")
        .or_else(|| lexeme.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(NumberError::InvalidDigit);
        }
        let v = u32::from_str_radix(hex, 16).map_err(|_| NumberError::Overflow)?;
        return Ok(Value::Int(v as i32));
    }

    let is_float = lexeme.contains('.')
        || lexeme.contains(['e', 'E'])
        || lexeme.ends_with(['f', 'F']);
    if is_float {
        return parse_float(lexeme);
    }

    if !lexeme.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumberError::InvalidDigit);
    }
    if lexeme.len() > 1 && lexeme.starts_with('0') {
        let v = u32::from_str_radix(&lexeme[1..], 8).map_err(|_| {
            if lexeme.bytes().any(|b| b == b'8' || b == b'9') {
                NumberError::InvalidDigit
            } else {
                NumberError::Overflow
            }
        })?;
        return i32::try_from(v)
            .map(Value::Int)
            .map_err(|_| NumberError::Overflow);
    }
    lexeme
        .parse::<i32>()
        .map(Value::Int)
        .map_err(|_| NumberError::Overflow)
}

/// `true` for the decimal lexeme `2147483648`, which is only valid as the
/// operand of a prefix minus.
pub(crate) fn is_int_min_magnitude(lexeme: &str) -> bool {
    !lexeme.starts_with('0') && lexeme.parse::<u32>() == Ok(1 << 31)
}

fn parse_float(lexeme: &str) -> Result<Value, NumberError> {
    let (body, single) = match lexeme.strip_suffix(['f', 'F']) {
        Some(body) => (body, true),
        None => (lexeme, false),
    };
    let valid_chars = body
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if body.is_empty() || !valid_chars || body.bytes().filter(|&b| b == b'.').count() > 1 {
        return Err(NumberError::MalformedFloat);
    }
    if single {
        body.parse::<f32>()
            .map(Value::Float)
            .map_err(|_| NumberError::MalformedFloat)
    } else {
        body.parse::<f64>()
            .map(Value::Double)
            .map_err(|_| NumberError::MalformedFloat)
    }
}

#[cfg(test)]
mod tests;
