//! Screen classification.
//!
//! The classifier holds an ordered list of matchers, each responsible for
//! recognizing one semantic screen of the observed app. Classification is
//! first-match-wins in ascending priority order and is total: a snapshot
//! that no matcher claims yields [`ScreenObservation::Unrecognized`].
//!
//! Matchers at distinct priorities are an enforced invariant — building a
//! classifier with a duplicate priority is a registration bug, reported at
//! startup rather than silently resolved by list order.

pub mod matchers;
pub mod offer;
pub mod text;

use crate::types::Snapshot;
use offer::ParsedOffer;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

/// Pickup progress as shown on the pickup-details screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupStatus {
    Heading,
    ArrivedAtStore,
    WaitingForOrder,
    OrderPickedUp,
}

/// The classifier's structured verdict about one snapshot.
///
/// Produced fresh per snapshot, never cached across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScreenObservation {
    /// Main map, not dashing
    IdleMap {
        zone: Option<String>,
        dash_mode: Option<String>,
    },
    /// Dashing, waiting for an offer
    WaitingForOffer {
        pay_so_far: Option<f64>,
        wait_estimate_ms: Option<u64>,
    },
    /// An offer is on screen
    Offer { offer: ParsedOffer },
    /// Pickup details / navigation to the store
    PickupDetails {
        store: Option<String>,
        status: Option<PickupStatus>,
        customer_hash: Option<String>,
    },
    /// Navigation to the customer
    DeliveryNav {
        address: Option<String>,
        customer_hash: Option<String>,
        eta_ms: Option<u64>,
    },
    /// Delivery finished, tip/earnings recap
    DeliveryCompleted { tip: Option<f64> },
    /// Dash paused, resume countdown running
    DashPausedScreen { resume_deadline_ms: Option<u64> },
    /// End-of-dash summary
    DashSummary {
        total_pay: Option<f64>,
        offer_count: Option<u32>,
        active_time_ms: Option<u64>,
    },
    /// No matcher claimed the snapshot
    Unrecognized,
}

impl ScreenObservation {
    /// Short tag for logging and persisted records
    pub fn tag(&self) -> &'static str {
        match self {
            ScreenObservation::IdleMap { .. } => "idle_map",
            ScreenObservation::WaitingForOffer { .. } => "waiting_for_offer",
            ScreenObservation::Offer { .. } => "offer",
            ScreenObservation::PickupDetails { .. } => "pickup_details",
            ScreenObservation::DeliveryNav { .. } => "delivery_nav",
            ScreenObservation::DeliveryCompleted { .. } => "delivery_completed",
            ScreenObservation::DashPausedScreen { .. } => "dash_paused",
            ScreenObservation::DashSummary { .. } => "dash_summary",
            ScreenObservation::Unrecognized => "unrecognized",
        }
    }
}

/// One screen-recognition capability.
///
/// A matcher's `classify` performs anchor checks (required texts or ids),
/// negative checks (anchors that rule the screen out), then best-effort
/// field extraction. Field extraction failures degrade to absent fields,
/// never to a failed match.
pub trait ScreenMatcher: Send + Sync {
    /// Lower priority is checked first; priorities must be distinct
    fn priority(&self) -> u8;

    /// Screen name, for logs
    fn name(&self) -> &'static str;

    /// Inspect a snapshot; `Some` claims it and stops classification
    fn classify(&self, snapshot: &Snapshot) -> Option<ScreenObservation>;
}

/// Priority-ordered screen classifier
pub struct ScreenClassifier {
    matchers: Vec<Box<dyn ScreenMatcher>>,
}

impl ScreenClassifier {
    /// Build a classifier with the default matcher set
    pub fn new() -> Self {
        Self::with_matchers(matchers::default_matchers())
    }

    /// Build a classifier from an explicit matcher list.
    ///
    /// Duplicate priorities are a registration bug: debug builds panic,
    /// release builds log an error and keep the first registration.
    pub fn with_matchers(mut matchers: Vec<Box<dyn ScreenMatcher>>) -> Self {
        matchers.sort_by_key(|m| m.priority());

        let mut deduped: Vec<Box<dyn ScreenMatcher>> = Vec::with_capacity(matchers.len());
        for matcher in matchers {
            if let Some(prev) = deduped.last() {
                if prev.priority() == matcher.priority() {
                    debug_assert!(
                        false,
                        "duplicate matcher priority {}: {} vs {}",
                        matcher.priority(),
                        prev.name(),
                        matcher.name()
                    );
                    error!(
                        "Duplicate matcher priority {}: dropping '{}', keeping '{}'",
                        matcher.priority(),
                        matcher.name(),
                        prev.name()
                    );
                    continue;
                }
            }
            deduped.push(matcher);
        }

        debug!("Classifier built with {} matchers", deduped.len());
        Self { matchers: deduped }
    }

    /// Classify a snapshot. Total: always returns an observation.
    pub fn classify(&self, snapshot: &Snapshot) -> ScreenObservation {
        for matcher in &self.matchers {
            if let Some(observation) = matcher.classify(snapshot) {
                trace!(
                    "Matcher '{}' (priority {}) claimed snapshot",
                    matcher.name(),
                    matcher.priority()
                );
                return observation;
            }
        }
        trace!("No matcher claimed snapshot ({} texts)", snapshot.texts.len());
        ScreenObservation::Unrecognized
    }

    /// Number of registered matchers
    pub fn matcher_count(&self) -> usize {
        self.matchers.len()
    }
}

impl Default for ScreenClassifier {
    fn default() -> Self {
        Self::new()
    }
}
