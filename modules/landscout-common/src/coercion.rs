//! Numeric cell coercion.
//!
//! Listing batches and census artifacts carry numbers as loosely formatted
//! text: `$1,250`, `12.5%`, `(X)`, `N/A`. Every call site goes through
//! [`parse_number`] (strict, reports unparseable text) or [`coerce_number`]
//! (soft, unparseable text becomes `None`).

use crate::error::CoercionError;

/// Markers that mean "no value" rather than "bad value". Compared
/// case-insensitively after trimming.
const SENTINELS: &[&str] = &[
    "", "n/a", "na", "nan", "null", "none", "-", "--", "(x)", "*", "**", "***", "*****",
];

/// Characters removed before parsing: currency, thousands separators,
/// percent signs and embedded whitespace.
const NOISE: &[char] = &['$', ',', '%', ' ', '\u{a0}', '\t'];

/// Parse a textual cell into a number.
///
/// - `Ok(Some(n))` for a number once noise characters are stripped
/// - `Ok(None)` for empty cells and sentinel markers
/// - `Err(_)` for anything else
pub fn parse_number(raw: &str) -> Result<Option<f64>, CoercionError> {
    let trimmed = raw.trim();
    if is_sentinel(trimmed) {
        return Ok(None);
    }

    let cleaned: String = trimmed.chars().filter(|c| !NOISE.contains(c)).collect();
    if cleaned.is_empty() {
        return Ok(None);
    }

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(CoercionError {
            raw: raw.to_string(),
        }),
    }
}

/// Soft variant of [`parse_number`]: unparseable text is treated as missing.
pub fn coerce_number(raw: &str) -> Option<f64> {
    parse_number(raw).ok().flatten()
}

/// Render a number the way the master table stores it. Integral values drop
/// the fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Round to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn is_sentinel(trimmed: &str) -> bool {
    SENTINELS.iter().any(|s| s.eq_ignore_ascii_case(trimmed))
}
