//! CLI input validation functions.
//!
//! Used by clap's `value_parser` attribute to reject bad values at parse time.

/// Parse a count that must be at least one.
pub fn validate_positive(s: &str) -> Result<usize, String> {
    let value: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a whole number"))?;
    if value == 0 {
        return Err("must be at least 1".to_string());
    }
    Ok(value)
}
