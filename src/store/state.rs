//! Session state and the events that drive it.

use crate::classify::offer::ParsedOffer;
use crate::classify::{PickupStatus, ScreenObservation};
use crate::store::effect::TimeoutKind;
use serde::{Deserialize, Serialize};

/// Which offer action the user (or the auto-evaluator) clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClickIntent {
    Accept,
    Decline,
}

/// Verdict of the offer evaluation policy, looped back by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferDecision {
    Accept,
    Decline,
}

/// System notifications relevant to the session, pre-parsed upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The observed app left the foreground or was covered
    AppInterrupted,
    /// "Your dash ends soon" style warning
    DashEndingSoon,
    /// Anything else we do not act on
    Other,
}

/// The workflow phase the tracked session is currently believed to be in.
///
/// Exactly one value exists at a time, owned by the [`Store`](super::Store)
/// and replaced atomically on every transition. Serialized (tagged) for
/// the persisted session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionState {
    /// Startup; nothing observed yet
    Initializing,
    /// On the main map, not dashing
    IdleOffline,
    /// Dashing, waiting for an offer
    AwaitingOffer { pay_so_far: f64 },
    /// An offer is on screen, awaiting accept/decline/expiry
    OfferPresented {
        hash: String,
        offer: ParsedOffer,
        click_intent: Option<ClickIntent>,
    },
    /// Heading to / at the store
    OnPickup {
        store: Option<String>,
        status: Option<PickupStatus>,
    },
    /// Heading to the customer
    OnDelivery { address: Option<String> },
    /// Delivery finished, recap on screen
    PostDelivery,
    /// Dash paused with a resume countdown
    DashPaused,
    /// End-of-dash summary on screen
    PostDash,
    /// Observed app interrupted; waiting for an anchor to resync
    PausedOrInterrupted,
}

impl SessionState {
    /// Short tag for logs and the persisted snapshot
    pub fn tag(&self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::IdleOffline => "idle_offline",
            SessionState::AwaitingOffer { .. } => "awaiting_offer",
            SessionState::OfferPresented { .. } => "offer_presented",
            SessionState::OnPickup { .. } => "on_pickup",
            SessionState::OnDelivery { .. } => "on_delivery",
            SessionState::PostDelivery => "post_delivery",
            SessionState::DashPaused => "dash_paused",
            SessionState::PostDash => "post_dash",
            SessionState::PausedOrInterrupted => "paused_or_interrupted",
        }
    }

    /// True for phases where an interruption is worth tracking
    pub fn is_business_phase(&self) -> bool {
        !matches!(
            self,
            SessionState::Initializing
                | SessionState::IdleOffline
                | SessionState::PausedOrInterrupted
        )
    }
}

/// The store's sole input type
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A classified snapshot arrived
    Screen(ScreenObservation),
    /// The user clicked an offer action
    Click(ClickIntent),
    /// A system notification was parsed upstream
    Notification(NotificationKind),
    /// A scheduled timeout fired
    TimerExpired(TimeoutKind),
    /// Loopback from the executor's offer evaluation
    OfferEvaluated {
        hash: String,
        decision: OfferDecision,
    },
}

impl Event {
    pub fn tag(&self) -> &'static str {
        match self {
            Event::Screen(obs) => obs.tag(),
            Event::Click(_) => "click",
            Event::Notification(_) => "notification",
            Event::TimerExpired(_) => "timer_expired",
            Event::OfferEvaluated { .. } => "offer_evaluated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_phase() {
        assert!(!SessionState::Initializing.is_business_phase());
        assert!(!SessionState::IdleOffline.is_business_phase());
        assert!(!SessionState::PausedOrInterrupted.is_business_phase());
        assert!(SessionState::AwaitingOffer { pay_so_far: 0.0 }.is_business_phase());
        assert!(SessionState::DashPaused.is_business_phase());
    }

    #[test]
    fn test_state_snapshot_round_trip() {
        let state = SessionState::AwaitingOffer { pay_so_far: 12.5 };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("awaiting_offer"));
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn test_unknown_phase_tag_fails_deserialize() {
        let err = serde_json::from_str::<SessionState>(r#"{"phase":"warp_drive"}"#);
        assert!(err.is_err());
    }
}
