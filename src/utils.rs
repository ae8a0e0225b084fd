use crate::config::MAX_USERNAME_LEN;

/// Round `value` to `places` decimal digits.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Format a `[0, 1]` fraction as a percentage with two decimals, e.g. `"33.33%"`.
///
/// Ties round half away from zero, matching [`round_to`].
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", round_to(fraction * 100.0, 2))
}

/// Validate a username field, returning the trimmed name.
///
/// # Examples
/// ```
/// use bgg_similarity::utils::validate_username;
/// assert_eq!(validate_username("  alice "), Ok("alice".to_string()));
/// assert!(validate_username("   ").is_err());
/// ```
pub fn validate_username(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Username cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_USERNAME_LEN {
        return Err(format!("Username cannot exceed {} characters", MAX_USERNAME_LEN));
    }
    Ok(trimmed.to_string())
}

/// Percent-encode a query value the way `encodeURIComponent` does.
pub fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_and_percent() {
        assert_eq!(round_to(1.0 / 3.0, 4), 0.3333);
        assert_eq!(round_to(2.0 / 3.0, 4), 0.6667);
        assert_eq!(format_percent(1.0 / 3.0), "33.33%");
        assert_eq!(format_percent(0.0), "0.00%");
        assert_eq!(format_percent(1.0), "100.00%");
        // Exact ties round up rather than to even
        assert_eq!(format_percent(1.0 / 32.0), "3.13%");
        assert_eq!(format_percent(5.0 / 32.0), "15.63%");
        assert_eq!(format_percent(3.0 / 96.0), "3.13%");
    }

    #[test]
    fn username_limits() {
        assert_eq!(validate_username("bob"), Ok("bob".to_string()));
        assert!(validate_username("").is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LEN + 1)).is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LEN)).is_ok());
    }

    #[test]
    fn query_encoding() {
        assert_eq!(encode_query_value("plain_name"), "plain_name");
        assert_eq!(encode_query_value("a b&c"), "a%20b%26c");
        assert_eq!(encode_query_value("é"), "%C3%A9");
    }
}
