//! Offer text parsing.
//!
//! The offer screen presents its economics as loose text lines
//! ("$7.50", "Guaranteed (incl. tips)", "2.3 mi", "Deliver by 5:45 PM",
//! store name, "3 items"). This parser turns those lines into a
//! structured [`ParsedOffer`], or `None` when the lines do not look like
//! an offer at all. Individual missing fields degrade to defaults; only
//! a missing pay amount fails the parse.

use crate::classify::text::{
    parse_currency, parse_duration_ms_opt, parse_item_count, parse_miles, MIN_DISTANCE_MILES,
};
use crate::fingerprint::short_hash;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    // Lines that are pure chrome, never offer payload
    static ref NOISE_LINE: Regex =
        Regex::new(r"^(Accept|Decline|Guaranteed.*|Total will be higher.*)$").unwrap();

    // "Deliver by 5:45 PM" style deadline, used only as an offer anchor
    static ref DELIVER_BY: Regex = Regex::new(r"^Deliver by ").unwrap();
}

/// Structured economics of one delivery offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedOffer {
    /// Guaranteed pay, dollars
    pub pay: f64,
    /// Total route distance, miles (floored, never zero)
    pub distance_miles: f64,
    /// Estimated time to complete, milliseconds, if shown
    pub time_estimate_ms: Option<u64>,
    /// Store / merchant name, if shown
    pub store: Option<String>,
    /// Item count, if shown
    pub items: Option<u32>,
    /// Content hash identifying this offer across re-renders
    pub hash: String,
}

impl ParsedOffer {
    /// Pay per mile; distance is floored so this is always finite
    pub fn dollars_per_mile(&self) -> f64 {
        self.pay / self.distance_miles.max(MIN_DISTANCE_MILES)
    }

    /// Projected pay per hour, when a time estimate was shown
    pub fn dollars_per_hour(&self) -> Option<f64> {
        let ms = self.time_estimate_ms?;
        if ms == 0 {
            return None;
        }
        Some(self.pay * 3_600_000.0 / ms as f64)
    }
}

/// Parse offer text lines into a structured offer.
///
/// Stateless; returns `None` when no pay amount or distance is present
/// (the minimum evidence that these lines describe an offer).
pub fn parse(lines: &[String]) -> Option<ParsedOffer> {
    let mut pay: Option<f64> = None;
    let mut distance: Option<f64> = None;
    let mut time_estimate: Option<u64> = None;
    let mut items: Option<u32> = None;
    let mut store: Option<String> = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() || NOISE_LINE.is_match(line) || DELIVER_BY.is_match(line) {
            continue;
        }

        // First dollar amount is the guaranteed pay; later ones are
        // itemized components we ignore
        if pay.is_none() {
            if let Some(amount) = parse_currency(line) {
                pay = Some(amount);
                continue;
            }
        }

        if distance.is_none() {
            if let Some(miles) = parse_miles(line) {
                distance = Some(miles);
                continue;
            }
        }

        if time_estimate.is_none() {
            if let Some(ms) = parse_duration_ms_opt(line) {
                time_estimate = Some(ms);
                continue;
            }
        }

        if items.is_none() {
            if let Some(count) = parse_item_count(line) {
                items = Some(count);
                continue;
            }
        }

        // First unclaimed plain-text line is the store name
        if store.is_none() && !line.contains('$') {
            store = Some(line.to_string());
        }
    }

    let pay = pay?;
    let distance_miles = distance?;

    // Identity covers the fields that distinguish one offer from the
    // next; re-renders of the same offer hash identically
    let hash = short_hash(&format!(
        "{:.2}|{:.1}|{}|{}",
        pay,
        distance_miles,
        store.as_deref().unwrap_or(""),
        items.unwrap_or(0),
    ));

    Some(ParsedOffer {
        pay,
        distance_miles,
        time_estimate_ms: time_estimate,
        store,
        items,
        hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_full_offer() {
        let offer = parse(&lines(&[
            "Walgreens",
            "$7.50",
            "Guaranteed (incl. tips)",
            "2.5 mi",
            "3 items",
            "35 min",
            "Deliver by 5:45 PM",
            "Accept",
            "Decline",
        ]))
        .unwrap();

        assert_eq!(offer.pay, 7.5);
        assert_eq!(offer.distance_miles, 2.5);
        assert_eq!(offer.store.as_deref(), Some("Walgreens"));
        assert_eq!(offer.items, Some(3));
        assert_eq!(offer.time_estimate_ms, Some(35 * 60 * 1000));
        assert!((offer.dollars_per_mile() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_minimal_offer() {
        let offer = parse(&lines(&["$5.25", "1.0 mi"])).unwrap();
        assert_eq!(offer.pay, 5.25);
        assert_eq!(offer.store, None);
        assert_eq!(offer.items, None);
        assert_eq!(offer.time_estimate_ms, None);
        assert_eq!(offer.dollars_per_hour(), None);
    }

    #[test]
    fn test_missing_pay_fails_parse() {
        assert!(parse(&lines(&["Walgreens", "2.5 mi"])).is_none());
        assert!(parse(&lines(&[])).is_none());
    }

    #[test]
    fn test_missing_distance_fails_parse() {
        assert!(parse(&lines(&["$7.50", "Walgreens"])).is_none());
    }

    #[test]
    fn test_hash_stable_across_rerender() {
        let a = parse(&lines(&["Walgreens", "$7.50", "2.5 mi", "3 items"])).unwrap();
        let b = parse(&lines(&["Walgreens", "$7.50", "2.5 mi", "3 items", "Accept"])).unwrap();
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_hash_differs_between_offers() {
        let a = parse(&lines(&["Walgreens", "$7.50", "2.5 mi"])).unwrap();
        let b = parse(&lines(&["Walgreens", "$8.25", "2.5 mi"])).unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_dollars_per_hour() {
        let offer = parse(&lines(&["$6.00", "2.0 mi", "30 min"])).unwrap();
        assert_eq!(offer.dollars_per_hour(), Some(12.0));
    }
}
