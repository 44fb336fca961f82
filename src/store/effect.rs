//! Effects: descriptions of externally-visible work.
//!
//! Effects are values produced by the reducer and interpreted exclusively
//! by the [`EffectExecutor`](crate::executor::EffectExecutor). The reducer
//! never performs work itself, which keeps it pure and testable.

use crate::classify::offer::ParsedOffer;
use crate::types::ElementBounds;
use serde::{Deserialize, Serialize};

/// Identifies a timeout; scheduling a new timer of the same kind
/// supersedes any pending one of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeoutKind {
    /// Safety net while the dash is paused
    DashPausedSafety,
    /// Offer presumed expired if still on screen after this
    OfferExpiry,
}

impl TimeoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutKind::DashPausedSafety => "dash_paused_safety",
            TimeoutKind::OfferExpiry => "offer_expiry",
        }
    }
}

/// Tone of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeTone {
    Info,
    Success,
    Warning,
    Alert,
}

/// How an offer concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferOutcome {
    Accepted,
    Declined,
    TimedOut,
}

impl OfferOutcome {
    pub fn record_kind(&self) -> RecordKind {
        match self {
            OfferOutcome::Accepted => RecordKind::OfferAccepted,
            OfferOutcome::Declined => RecordKind::OfferDeclined,
            OfferOutcome::TimedOut => RecordKind::OfferTimedOut,
        }
    }
}

/// Kind of a persisted session event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    DashStarted,
    DashPaused,
    DashResumed,
    DashEnded,
    OfferSeen,
    OfferAccepted,
    OfferDeclined,
    OfferTimedOut,
    PickupStarted,
    DeliveryStarted,
    DeliveryCompleted,
    StateRecovered,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::DashStarted => "dash_started",
            RecordKind::DashPaused => "dash_paused",
            RecordKind::DashResumed => "dash_resumed",
            RecordKind::DashEnded => "dash_ended",
            RecordKind::OfferSeen => "offer_seen",
            RecordKind::OfferAccepted => "offer_accepted",
            RecordKind::OfferDeclined => "offer_declined",
            RecordKind::OfferTimedOut => "offer_timed_out",
            RecordKind::PickupStarted => "pickup_started",
            RecordKind::DeliveryStarted => "delivery_started",
            RecordKind::DeliveryCompleted => "delivery_completed",
            RecordKind::StateRecovered => "state_recovered",
        }
    }

    /// True for the offer-outcome records attached to exit transitions
    pub fn is_offer_outcome(&self) -> bool {
        matches!(
            self,
            RecordKind::OfferAccepted | RecordKind::OfferDeclined | RecordKind::OfferTimedOut
        )
    }
}

/// One session event to persist.
///
/// Timestamps are stamped at insert time by the storage worker so the
/// reducer stays pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: RecordKind,
    /// Offer content hash, for offer-related records
    pub offer_hash: Option<String>,
    /// Free-form detail (store name, tip amount, recovery description)
    pub detail: Option<String>,
}

impl EventRecord {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            offer_hash: None,
            detail: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.offer_hash = Some(hash.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Element to click in the live tree: stable id first, bounds fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickTarget {
    pub view_id: Option<String>,
    pub text: Option<String>,
    pub expected_bounds: Option<ElementBounds>,
}

impl ClickTarget {
    pub fn by_text(text: impl Into<String>) -> Self {
        Self {
            view_id: None,
            text: Some(text.into()),
            expected_bounds: None,
        }
    }
}

/// One unit of externally-visible work
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Persist a session event (fire-and-forget, serialized worker)
    PersistEvent(EventRecord),
    /// Update the status of a previously persisted offer
    UpdateOfferStatus {
        offer_hash: String,
        outcome: OfferOutcome,
    },
    /// Post a user-facing notice
    Notice { text: String, tone: NoticeTone },
    /// Schedule a timeout; supersedes pending timers of the same kind
    ScheduleTimeout { kind: TimeoutKind, after_ms: u64 },
    /// Cancel a pending timeout of this kind, if any
    CancelTimeout(TimeoutKind),
    /// Click an element back in the host app
    Click(ClickTarget),
    /// Capture evidence (screenshot) labeled for later review
    CaptureEvidence { label: String },
    /// Evaluate an offer; loops an `OfferEvaluated` event back in
    EvaluateOffer(ParsedOffer),
    /// Execute the inner effect after a delay
    Delayed { after_ms: u64, inner: Box<Effect> },
    /// Execute children in order
    Sequence(Vec<Effect>),
}

impl Effect {
    pub fn notice(text: impl Into<String>, tone: NoticeTone) -> Self {
        Effect::Notice {
            text: text.into(),
            tone,
        }
    }

    /// True for the offer-outcome log effects the reducer attaches to
    /// exit transitions
    pub fn is_offer_outcome_log(&self) -> bool {
        match self {
            Effect::PersistEvent(record) => record.kind.is_offer_outcome(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_record_kinds() {
        assert_eq!(
            OfferOutcome::Accepted.record_kind(),
            RecordKind::OfferAccepted
        );
        assert!(RecordKind::OfferTimedOut.is_offer_outcome());
        assert!(!RecordKind::PickupStarted.is_offer_outcome());
    }

    #[test]
    fn test_offer_outcome_log_detection() {
        let outcome = Effect::PersistEvent(EventRecord::new(RecordKind::OfferAccepted));
        let other = Effect::PersistEvent(EventRecord::new(RecordKind::DashStarted));
        assert!(outcome.is_offer_outcome_log());
        assert!(!other.is_offer_outcome_log());
        assert!(!Effect::CancelTimeout(TimeoutKind::OfferExpiry).is_offer_outcome_log());
    }

    #[test]
    fn test_record_builder() {
        let record = EventRecord::new(RecordKind::OfferSeen)
            .with_hash("abc123")
            .with_detail("Walgreens");
        assert_eq!(record.offer_hash.as_deref(), Some("abc123"));
        assert_eq!(record.detail.as_deref(), Some("Walgreens"));
    }
}
