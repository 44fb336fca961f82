//! Text normalization helpers shared by the screen matchers.
//!
//! All parsers here are lenient: malformed input degrades to `None`
//! rather than failing the enclosing screen match.

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Floor substituted for a zero-distance parse, in miles.
/// Keeps downstream $/mile math well-defined.
pub const MIN_DISTANCE_MILES: f64 = 0.1;

lazy_static! {
    // "1 hr 16 min", "2 hrs 5 mins", "45 min"
    static ref HOURS_MINUTES: Regex =
        Regex::new(r"(?:(\d+)\s*hrs?)?\s*(?:(\d+)\s*min)").unwrap();

    // "12:45" countdown style
    static ref MM_SS: Regex = Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap();

    // "2.3 mi", "0.8 miles"; the boundary keeps "35 min" from matching
    static ref MILES: Regex = Regex::new(r"([\d.]+)\s*mi(?:les)?\b").unwrap();
}

/// Lenient numeric parse: trim, strip currency symbols and thousands
/// separators, None on failure.
pub fn parse_lenient_f64(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse a dollar amount like "$7.50" or "$1,024.00"
pub fn parse_currency(text: &str) -> Option<f64> {
    if !text.contains('$') {
        return None;
    }
    parse_lenient_f64(text)
}

/// Parse a distance like "2.3 mi" into miles, with a floor substituted
/// for zero so per-mile rates stay finite.
pub fn parse_miles(text: &str) -> Option<f64> {
    let caps = MILES.captures(text)?;
    let miles: f64 = caps.get(1)?.as_str().parse().ok()?;
    if miles <= 0.0 {
        Some(MIN_DISTANCE_MILES)
    } else {
        Some(miles)
    }
}

/// Parse a duration from the small fixed grammar the app uses:
/// "MM:SS" or "N hr M min". None on failure.
pub fn parse_duration_ms_opt(text: &str) -> Option<u64> {
    let text = text.trim();

    if let Some(caps) = MM_SS.captures(text) {
        let minutes: u64 = caps.get(1)?.as_str().parse().ok()?;
        let seconds: u64 = caps.get(2)?.as_str().parse().ok()?;
        return Some((minutes * 60 + seconds) * 1000);
    }

    if let Some(caps) = HOURS_MINUTES.captures(text) {
        let hours: u64 = caps
            .get(1)
            .map(|m| m.as_str().parse().unwrap_or(0))
            .unwrap_or(0);
        let minutes: u64 = caps.get(2)?.as_str().parse().ok()?;
        return Some((hours * 3600 + minutes * 60) * 1000);
    }

    None
}

/// Privacy hash for customer names: 12 hex chars of SHA-256.
///
/// Customer identity never leaves the device in clear text; the hash is
/// stable enough to correlate pickup and delivery screens for one order.
pub fn hash_name(name: &str) -> String {
    let normalized = name.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let hash = hasher.finalize();
    format!(
        "{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        hash[0], hash[1], hash[2], hash[3], hash[4], hash[5]
    )
}

/// Join consecutive address lines into one display string
pub fn join_address(lines: &[&str]) -> Option<String> {
    let joined: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined.join(", "))
    }
}

/// Parse an item count like "3 items" or "1 item"
pub fn parse_item_count(text: &str) -> Option<u32> {
    let text = text.trim();
    if !text.ends_with("item") && !text.ends_with("items") {
        return None;
    }
    text.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_f64() {
        assert_eq!(parse_lenient_f64(" $7.50 "), Some(7.5));
        assert_eq!(parse_lenient_f64("$1,024.00"), Some(1024.0));
        assert_eq!(parse_lenient_f64("garbage"), None);
        assert_eq!(parse_lenient_f64(""), None);
    }

    #[test]
    fn test_parse_currency_requires_dollar_sign() {
        assert_eq!(parse_currency("$7.50"), Some(7.5));
        assert_eq!(parse_currency("7.50"), None);
    }

    #[test]
    fn test_parse_miles_with_floor() {
        assert_eq!(parse_miles("2.3 mi"), Some(2.3));
        assert_eq!(parse_miles("0.8 miles"), Some(0.8));
        assert_eq!(parse_miles("0.0 mi"), Some(MIN_DISTANCE_MILES));
        assert_eq!(parse_miles("no distance here"), None);
        assert_eq!(parse_miles("35 min"), None);
    }

    #[test]
    fn test_duration_hr_min() {
        assert_eq!(
            parse_duration_ms_opt("1 hr 16 min"),
            Some((3600 + 16 * 60) * 1000)
        );
        assert_eq!(parse_duration_ms_opt("45 min"), Some(45 * 60 * 1000));
        assert_eq!(
            parse_duration_ms_opt("2 hrs 5 mins"),
            Some((2 * 3600 + 5 * 60) * 1000)
        );
    }

    #[test]
    fn test_duration_mm_ss() {
        assert_eq!(parse_duration_ms_opt("12:45"), Some((12 * 60 + 45) * 1000));
        assert_eq!(parse_duration_ms_opt("0:30"), Some(30 * 1000));
    }

    #[test]
    fn test_duration_unparsable_is_none() {
        assert_eq!(parse_duration_ms_opt("soon"), None);
        assert_eq!(parse_duration_ms_opt("5:5"), None);
    }

    #[test]
    fn test_hash_name_stable_and_normalized() {
        assert_eq!(hash_name("Alice B."), hash_name("  alice b. "));
        assert_ne!(hash_name("Alice B."), hash_name("Bob C."));
        assert_eq!(hash_name("Alice").len(), 12);
    }

    #[test]
    fn test_join_address() {
        assert_eq!(
            join_address(&["123 Main St", " Apt 4 ", ""]),
            Some("123 Main St, Apt 4".to_string())
        );
        assert_eq!(join_address(&["", "  "]), None);
    }

    #[test]
    fn test_parse_item_count() {
        assert_eq!(parse_item_count("3 items"), Some(3));
        assert_eq!(parse_item_count("1 item"), Some(1));
        assert_eq!(parse_item_count("items"), None);
        assert_eq!(parse_item_count("3 bags"), None);
    }
}
