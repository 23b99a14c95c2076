//! Size values in kilobytes
//!
//! Quota limits are written as integers (kilobytes) or as strings with an
//! optional binary suffix: `K`, `M`, `G` or `T`, case-insensitive. A bare
//! number is already in kilobytes.

use crate::error::{Error, Result};
use serde_json::Value;

/// Kilobytes per unit suffix
fn multiplier(suffix: char) -> Option<u64> {
    match suffix.to_ascii_uppercase() {
        'K' => Some(1),
        'M' => Some(1024),
        'G' => Some(1024 * 1024),
        'T' => Some(1024 * 1024 * 1024),
        _ => None,
    }
}

/// Parse a size string into kilobytes.
///
/// `"100M"` is 102400 and `"2G"` is 2097152.
pub fn parse_size(text: &str) -> Result<u64> {
    let invalid = || Error::InvalidSize {
        value: text.to_string(),
    };
    let trimmed = text.trim();
    let (digits, factor) = match trimmed.chars().last() {
        Some(last) if last.is_ascii_alphabetic() => {
            let factor = multiplier(last).ok_or_else(invalid)?;
            (&trimmed[..trimmed.len() - last.len_utf8()], factor)
        }
        Some(_) => (trimmed, 1),
        None => return Err(invalid()),
    };

    let amount: u64 = digits.trim().parse().map_err(|_| invalid())?;
    amount.checked_mul(factor).ok_or_else(invalid)
}

/// Parse a size given as a YAML/JSON value.
pub fn parse_size_value(value: &Value) -> Result<u64> {
    match value {
        Value::Number(number) => number.as_u64().ok_or_else(|| Error::InvalidSize {
            value: number.to_string(),
        }),
        Value::String(text) => parse_size(text),
        other => Err(Error::InvalidSize {
            value: other.to_string(),
        }),
    }
}
