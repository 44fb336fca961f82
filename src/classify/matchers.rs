//! The default matcher set, one matcher per recognizable screen.
//!
//! Anchors are the stable texts the observed app renders on each screen.
//! Pickup and delivery navigation share a structural skeleton and are
//! disambiguated by negative checks on each other's anchor text.

use super::text::{hash_name, join_address, parse_currency, parse_duration_ms_opt};
use super::{offer, PickupStatus, ScreenMatcher, ScreenObservation};
use crate::types::Snapshot;

/// Build the default, priority-ordered matcher set
pub fn default_matchers() -> Vec<Box<dyn ScreenMatcher>> {
    vec![
        Box::new(OfferMatcher),
        Box::new(DashPausedMatcher),
        Box::new(PickupDetailsMatcher),
        Box::new(DeliveryNavMatcher),
        Box::new(DeliveryCompletedMatcher),
        Box::new(DashSummaryMatcher),
        Box::new(WaitingForOfferMatcher),
        Box::new(IdleMapMatcher),
    ]
}

/// Text of the line that follows `label` in the flattened text list
fn text_after<'a>(snapshot: &'a Snapshot, label: &str) -> Option<&'a str> {
    let idx = snapshot.texts.iter().position(|t| t.trim() == label)?;
    snapshot.texts.get(idx + 1).map(String::as_str)
}

/// Customer first-name line, rendered as "For <name>" on order screens.
/// Hashed before it leaves the classifier.
fn customer_hash(snapshot: &Snapshot) -> Option<String> {
    snapshot
        .texts
        .iter()
        .find_map(|t| t.trim().strip_prefix("For "))
        .map(hash_name)
}

/// Offer screen: the highest-stakes match, checked first.
pub struct OfferMatcher;

impl ScreenMatcher for OfferMatcher {
    fn priority(&self) -> u8 {
        10
    }

    fn name(&self) -> &'static str {
        "offer"
    }

    fn classify(&self, snapshot: &Snapshot) -> Option<ScreenObservation> {
        // Both action buttons must be present; either alone also shows
        // up on unrelated confirmation dialogs
        if !snapshot.has_text("Accept") || !snapshot.has_text("Decline") {
            return None;
        }
        // The offer body itself is the final anchor: no parsable
        // economics, no offer screen
        let offer = offer::parse(&snapshot.texts)?;
        Some(ScreenObservation::Offer { offer })
    }
}

/// Dash-paused screen with its resume countdown
pub struct DashPausedMatcher;

impl ScreenMatcher for DashPausedMatcher {
    fn priority(&self) -> u8 {
        20
    }

    fn name(&self) -> &'static str {
        "dash_paused"
    }

    fn classify(&self, snapshot: &Snapshot) -> Option<ScreenObservation> {
        if !snapshot.has_text("Dash Paused") {
            return None;
        }
        // Countdown renders as a bare "MM:SS" line
        let resume_deadline_ms = snapshot
            .texts
            .iter()
            .find_map(|t| parse_duration_ms_opt(t).filter(|_| t.contains(':')));
        Some(ScreenObservation::DashPausedScreen { resume_deadline_ms })
    }
}

/// Pickup details / store navigation
pub struct PickupDetailsMatcher;

impl ScreenMatcher for PickupDetailsMatcher {
    fn priority(&self) -> u8 {
        30
    }

    fn name(&self) -> &'static str {
        "pickup_details"
    }

    fn classify(&self, snapshot: &Snapshot) -> Option<ScreenObservation> {
        if !snapshot.has_text("Pick up from") {
            return None;
        }
        // Same skeleton as delivery nav; the delivery anchor rules it out
        if snapshot.has_text("Deliver to") {
            return None;
        }

        let store = text_after(snapshot, "Pick up from").map(str::to_string);
        let status = if snapshot.has_text_like("Order picked up") {
            Some(PickupStatus::OrderPickedUp)
        } else if snapshot.has_text_like("Waiting for order") {
            Some(PickupStatus::WaitingForOrder)
        } else if snapshot.has_text_like("Arrived at store") {
            Some(PickupStatus::ArrivedAtStore)
        } else {
            Some(PickupStatus::Heading)
        };

        Some(ScreenObservation::PickupDetails {
            store,
            status,
            customer_hash: customer_hash(snapshot),
        })
    }
}

/// Navigation to the customer
pub struct DeliveryNavMatcher;

impl ScreenMatcher for DeliveryNavMatcher {
    fn priority(&self) -> u8 {
        40
    }

    fn name(&self) -> &'static str {
        "delivery_nav"
    }

    fn classify(&self, snapshot: &Snapshot) -> Option<ScreenObservation> {
        if !snapshot.has_text("Deliver to") {
            return None;
        }
        if snapshot.has_text("Pick up from") {
            return None;
        }

        // Address renders as up to two lines after the anchor
        let idx = snapshot.texts.iter().position(|t| t.trim() == "Deliver to");
        let address = idx.and_then(|i| {
            let lines: Vec<&str> = snapshot.texts[i + 1..]
                .iter()
                .take(2)
                .map(String::as_str)
                .take_while(|t| !t.starts_with("For ") && parse_duration_ms_opt(t).is_none())
                .collect();
            join_address(&lines)
        });

        let eta_ms = snapshot
            .texts
            .iter()
            .find_map(|t| parse_duration_ms_opt(t).filter(|_| t.contains("min")));

        Some(ScreenObservation::DeliveryNav {
            address,
            customer_hash: customer_hash(snapshot),
            eta_ms,
        })
    }
}

/// Post-delivery recap
pub struct DeliveryCompletedMatcher;

impl ScreenMatcher for DeliveryCompletedMatcher {
    fn priority(&self) -> u8 {
        50
    }

    fn name(&self) -> &'static str {
        "delivery_completed"
    }

    fn classify(&self, snapshot: &Snapshot) -> Option<ScreenObservation> {
        if !snapshot.has_text_like("Delivery Complete") {
            return None;
        }
        let tip = text_after(snapshot, "Tip").and_then(parse_currency);
        Some(ScreenObservation::DeliveryCompleted { tip })
    }
}

/// End-of-dash summary
pub struct DashSummaryMatcher;

impl ScreenMatcher for DashSummaryMatcher {
    fn priority(&self) -> u8 {
        60
    }

    fn name(&self) -> &'static str {
        "dash_summary"
    }

    fn classify(&self, snapshot: &Snapshot) -> Option<ScreenObservation> {
        if !snapshot.has_text("Dash Summary") {
            return None;
        }

        let total_pay = snapshot.texts.iter().find_map(|t| parse_currency(t));
        let offer_count = snapshot.texts.iter().find_map(|t| {
            let t = t.trim();
            t.strip_suffix(" offers")
                .or_else(|| t.strip_suffix(" offer"))
                .and_then(|n| n.parse().ok())
        });
        let active_time_ms = text_after(snapshot, "Active Time").and_then(parse_duration_ms_opt);

        Some(ScreenObservation::DashSummary {
            total_pay,
            offer_count,
            active_time_ms,
        })
    }
}

/// Dashing, waiting for the next offer
pub struct WaitingForOfferMatcher;

impl ScreenMatcher for WaitingForOfferMatcher {
    fn priority(&self) -> u8 {
        70
    }

    fn name(&self) -> &'static str {
        "waiting_for_offer"
    }

    fn classify(&self, snapshot: &Snapshot) -> Option<ScreenObservation> {
        if !snapshot.has_text_like("Looking for orders") {
            return None;
        }

        let pay_so_far = text_after(snapshot, "Earnings")
            .and_then(parse_currency)
            .or_else(|| snapshot.texts.iter().find_map(|t| parse_currency(t)));
        let wait_estimate_ms = snapshot
            .texts
            .iter()
            .find_map(|t| parse_duration_ms_opt(t).filter(|_| t.contains("min")));

        Some(ScreenObservation::WaitingForOffer {
            pay_so_far,
            wait_estimate_ms,
        })
    }
}

/// Main map, not dashing. Lowest priority: its anchors are the most
/// generic and several busier screens render on top of the map.
pub struct IdleMapMatcher;

impl ScreenMatcher for IdleMapMatcher {
    fn priority(&self) -> u8 {
        80
    }

    fn name(&self) -> &'static str {
        "idle_map"
    }

    fn classify(&self, snapshot: &Snapshot) -> Option<ScreenObservation> {
        if !snapshot.has_text("Dash Now") && !snapshot.has_text_like("You're not dashing") {
            return None;
        }

        let zone = text_after(snapshot, "Zone").map(str::to_string);
        let dash_mode = if snapshot.has_text("Earn by Time") {
            Some("by_time".to_string())
        } else if snapshot.has_text("Earn per Offer") {
            Some("per_offer".to_string())
        } else {
            None
        };

        Some(ScreenObservation::IdleMap { zone, dash_mode })
    }
}
