//! The pure transition function.
//!
//! `reduce` maps (current state, event) to (next state, effects) in three
//! steps:
//!
//! 1. **Sequential handling** — the current phase's own handler decides
//!    whether the event is an internal update, an exit to another phase,
//!    or not its concern.
//! 2. **Anchor recovery** — certain observations are unambiguous proof of
//!    a phase regardless of what the machine believes. If sequential
//!    handling declined and an anchor disagrees with the current phase,
//!    the machine is forced into the anchor-implied phase with a
//!    diagnostic effect attached.
//! 3. **Stasis** — everything else is discarded unchanged. This is the
//!    common case for cosmetic UI churn.
//!
//! `reduce` is total and pure: it never fails, reads no clocks, and
//! produces equal transitions for equal inputs.

use crate::classify::offer::ParsedOffer;
use crate::classify::ScreenObservation;
use crate::store::effect::{
    ClickTarget, Effect, EventRecord, NoticeTone, OfferOutcome, RecordKind, TimeoutKind,
};
use crate::store::state::{
    ClickIntent, Event, NotificationKind, OfferDecision, SessionState,
};
use std::mem::discriminant;

/// Offer presumed expired if still tracked after this long
pub const OFFER_EXPIRY_MS: u64 = 60 * 1000;

/// Safety timeout for a paused dash; expiry treats silence as "ended"
pub const DASH_PAUSED_SAFETY_MS: u64 = 5 * 60 * 1000;

/// Result of one reduce call
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stasis(state: &SessionState) -> Self {
        Self {
            new_state: state.clone(),
            effects: Vec::new(),
        }
    }
}

/// What a per-state sequential handler decided
enum Verdict {
    /// Internal update: same phase, possibly refreshed data
    Stay(SessionState, Vec<Effect>),
    /// Exit transition to a different phase
    Exit(SessionState, Vec<Effect>),
    /// Not this handler's concern; let anchor recovery run
    NoVerdict,
}

/// Reduce one event against the current state.
pub fn reduce(state: &SessionState, event: &Event) -> Transition {
    // Step 1: sequential handling
    match sequential(state, event) {
        Verdict::Stay(new_state, effects) | Verdict::Exit(new_state, effects) => {
            return Transition { new_state, effects };
        }
        Verdict::NoVerdict => {}
    }

    // Step 2: anchor recovery
    if let Event::Screen(obs) = event {
        if let Some(anchor) = anchor_state(obs) {
            if discriminant(&anchor) != discriminant(state) {
                return recover(state, anchor);
            }
        }
    }

    // Step 3: stasis
    Transition::stasis(state)
}

fn sequential(state: &SessionState, event: &Event) -> Verdict {
    // Interruption and ending-soon notifications are handled uniformly
    // across phases before per-state logic
    if let Event::Notification(kind) = event {
        return match kind {
            NotificationKind::AppInterrupted if state.is_business_phase() => {
                let mut effects = exit_bookkeeping(state);
                effects.push(Effect::notice(
                    "Observed app interrupted; waiting to resync",
                    NoticeTone::Warning,
                ));
                Verdict::Exit(SessionState::PausedOrInterrupted, effects)
            }
            NotificationKind::DashEndingSoon => Verdict::Stay(
                state.clone(),
                vec![Effect::notice("Dash ending soon", NoticeTone::Warning)],
            ),
            _ => Verdict::NoVerdict,
        };
    }

    match state {
        SessionState::Initializing => Verdict::NoVerdict,
        SessionState::IdleOffline => idle_offline(event),
        SessionState::AwaitingOffer { pay_so_far } => awaiting_offer(*pay_so_far, event),
        SessionState::OfferPresented {
            hash,
            offer,
            click_intent,
        } => offer_presented(hash, offer, *click_intent, event),
        SessionState::OnPickup { store, status } => on_pickup(store, *status, event),
        SessionState::OnDelivery { address } => on_delivery(address, event),
        SessionState::PostDelivery => post_delivery(event),
        SessionState::DashPaused => dash_paused(event),
        SessionState::PostDash => post_dash(event),
        // Recovery out of an interruption is purely anchor-driven
        SessionState::PausedOrInterrupted => Verdict::NoVerdict,
    }
}

fn idle_offline(event: &Event) -> Verdict {
    match event {
        Event::Screen(ScreenObservation::IdleMap { .. }) => {
            Verdict::Stay(SessionState::IdleOffline, Vec::new())
        }
        Event::Screen(ScreenObservation::WaitingForOffer { pay_so_far, .. }) => Verdict::Exit(
            SessionState::AwaitingOffer {
                pay_so_far: pay_so_far.unwrap_or(0.0),
            },
            vec![
                Effect::PersistEvent(EventRecord::new(RecordKind::DashStarted)),
                Effect::notice("Dash started", NoticeTone::Info),
            ],
        ),
        _ => Verdict::NoVerdict,
    }
}

fn awaiting_offer(pay_so_far: f64, event: &Event) -> Verdict {
    match event {
        Event::Screen(ScreenObservation::WaitingForOffer {
            pay_so_far: new_pay,
            ..
        }) => Verdict::Stay(
            SessionState::AwaitingOffer {
                pay_so_far: new_pay.unwrap_or(pay_so_far),
            },
            Vec::new(),
        ),
        Event::Screen(ScreenObservation::Offer { offer }) => Verdict::Exit(
            SessionState::OfferPresented {
                hash: offer.hash.clone(),
                offer: offer.clone(),
                click_intent: None,
            },
            offer_entry_effects(offer),
        ),
        Event::Screen(ScreenObservation::DashPausedScreen { .. }) => {
            Verdict::Exit(SessionState::DashPaused, dash_paused_entry_effects())
        }
        Event::Screen(ScreenObservation::DashSummary { total_pay, .. }) => Verdict::Exit(
            SessionState::PostDash,
            vec![Effect::PersistEvent(dash_ended_record(*total_pay))],
        ),
        Event::Screen(ScreenObservation::IdleMap { .. }) => Verdict::Exit(
            SessionState::IdleOffline,
            vec![Effect::PersistEvent(EventRecord::new(RecordKind::DashEnded))],
        ),
        _ => Verdict::NoVerdict,
    }
}

fn offer_presented(
    hash: &str,
    offer: &ParsedOffer,
    click_intent: Option<ClickIntent>,
    event: &Event,
) -> Verdict {
    match event {
        // Re-render of the same offer: internal no-op update
        Event::Screen(ScreenObservation::Offer { offer: new_offer })
            if new_offer.hash == hash =>
        {
            Verdict::Stay(
                SessionState::OfferPresented {
                    hash: hash.to_string(),
                    offer: offer.clone(),
                    click_intent,
                },
                Vec::new(),
            )
        }
        // Different hash: previous offer concluded, new one begins
        Event::Screen(ScreenObservation::Offer { offer: new_offer }) => {
            let mut effects = offer_outcome_effects(hash, click_intent);
            effects.extend(offer_entry_effects(new_offer));
            Verdict::Exit(
                SessionState::OfferPresented {
                    hash: new_offer.hash.clone(),
                    offer: new_offer.clone(),
                    click_intent: None,
                },
                effects,
            )
        }
        Event::Click(intent) => Verdict::Stay(
            SessionState::OfferPresented {
                hash: hash.to_string(),
                offer: offer.clone(),
                click_intent: Some(*intent),
            },
            Vec::new(),
        ),
        Event::OfferEvaluated {
            hash: eval_hash,
            decision,
        } if eval_hash == hash => {
            let (button, label) = match decision {
                OfferDecision::Accept => ("Accept", "accepting"),
                OfferDecision::Decline => ("Decline", "declining"),
            };
            Verdict::Stay(
                SessionState::OfferPresented {
                    hash: hash.to_string(),
                    offer: offer.clone(),
                    click_intent,
                },
                vec![
                    Effect::Click(ClickTarget::by_text(button)),
                    Effect::CaptureEvidence {
                        label: format!("offer_{hash}_{label}"),
                    },
                ],
            )
        }
        Event::Screen(ScreenObservation::PickupDetails { store, status, .. }) => {
            let mut effects = offer_outcome_effects(hash, click_intent);
            effects.push(Effect::PersistEvent(
                EventRecord::new(RecordKind::PickupStarted)
                    .with_hash(hash)
                    .with_detail(store.clone().unwrap_or_default()),
            ));
            Verdict::Exit(
                SessionState::OnPickup {
                    store: store.clone(),
                    status: *status,
                },
                effects,
            )
        }
        Event::Screen(ScreenObservation::WaitingForOffer { pay_so_far, .. }) => Verdict::Exit(
            SessionState::AwaitingOffer {
                pay_so_far: pay_so_far.unwrap_or(0.0),
            },
            offer_outcome_effects(hash, click_intent),
        ),
        Event::Screen(ScreenObservation::DashPausedScreen { .. }) => {
            let mut effects = offer_outcome_effects(hash, click_intent);
            effects.extend(dash_paused_entry_effects());
            Verdict::Exit(SessionState::DashPaused, effects)
        }
        Event::TimerExpired(TimeoutKind::OfferExpiry) => Verdict::Exit(
            SessionState::AwaitingOffer { pay_so_far: 0.0 },
            offer_outcome_effects(hash, click_intent),
        ),
        _ => Verdict::NoVerdict,
    }
}

fn on_pickup(
    store: &Option<String>,
    status: Option<crate::classify::PickupStatus>,
    event: &Event,
) -> Verdict {
    match event {
        Event::Screen(ScreenObservation::PickupDetails {
            store: new_store,
            status: new_status,
            ..
        }) => Verdict::Stay(
            SessionState::OnPickup {
                store: new_store.clone().or_else(|| store.clone()),
                status: new_status.or(status),
            },
            Vec::new(),
        ),
        Event::Screen(ScreenObservation::DeliveryNav { address, .. }) => Verdict::Exit(
            SessionState::OnDelivery {
                address: address.clone(),
            },
            vec![Effect::PersistEvent(
                EventRecord::new(RecordKind::DeliveryStarted)
                    .with_detail(store.clone().unwrap_or_default()),
            )],
        ),
        _ => Verdict::NoVerdict,
    }
}

fn on_delivery(address: &Option<String>, event: &Event) -> Verdict {
    match event {
        Event::Screen(ScreenObservation::DeliveryNav {
            address: new_address,
            ..
        }) => Verdict::Stay(
            SessionState::OnDelivery {
                address: new_address.clone().or_else(|| address.clone()),
            },
            Vec::new(),
        ),
        Event::Screen(ScreenObservation::DeliveryCompleted { tip }) => Verdict::Exit(
            SessionState::PostDelivery,
            vec![
                Effect::PersistEvent(delivery_completed_record(*tip)),
                Effect::notice("Delivery completed", NoticeTone::Success),
            ],
        ),
        // Straight back to searching: completion screen was skipped
        Event::Screen(ScreenObservation::WaitingForOffer { pay_so_far, .. }) => Verdict::Exit(
            SessionState::AwaitingOffer {
                pay_so_far: pay_so_far.unwrap_or(0.0),
            },
            vec![Effect::PersistEvent(
                EventRecord::new(RecordKind::DeliveryCompleted).with_detail("inferred"),
            )],
        ),
        _ => Verdict::NoVerdict,
    }
}

fn post_delivery(event: &Event) -> Verdict {
    match event {
        Event::Screen(ScreenObservation::DeliveryCompleted { .. }) => {
            Verdict::Stay(SessionState::PostDelivery, Vec::new())
        }
        Event::Screen(ScreenObservation::WaitingForOffer { pay_so_far, .. }) => Verdict::Exit(
            SessionState::AwaitingOffer {
                pay_so_far: pay_so_far.unwrap_or(0.0),
            },
            Vec::new(),
        ),
        Event::Screen(ScreenObservation::DashSummary { total_pay, .. }) => Verdict::Exit(
            SessionState::PostDash,
            vec![Effect::PersistEvent(dash_ended_record(*total_pay))],
        ),
        Event::Screen(ScreenObservation::IdleMap { .. }) => Verdict::Exit(
            SessionState::IdleOffline,
            vec![Effect::PersistEvent(EventRecord::new(RecordKind::DashEnded))],
        ),
        _ => Verdict::NoVerdict,
    }
}

fn dash_paused(event: &Event) -> Verdict {
    match event {
        Event::Screen(ScreenObservation::DashPausedScreen { .. }) => {
            Verdict::Stay(SessionState::DashPaused, Vec::new())
        }
        Event::Screen(ScreenObservation::WaitingForOffer { pay_so_far, .. }) => Verdict::Exit(
            SessionState::AwaitingOffer {
                pay_so_far: pay_so_far.unwrap_or(0.0),
            },
            vec![
                Effect::PersistEvent(EventRecord::new(RecordKind::DashResumed)),
                Effect::CancelTimeout(TimeoutKind::DashPausedSafety),
            ],
        ),
        // Silence until the safety timer fired: the session ended while
        // paused
        Event::TimerExpired(TimeoutKind::DashPausedSafety) => Verdict::Exit(
            SessionState::IdleOffline,
            vec![
                Effect::PersistEvent(
                    EventRecord::new(RecordKind::DashEnded).with_detail("pause timeout"),
                ),
                Effect::notice("Dash Ended (Timeout)", NoticeTone::Alert),
            ],
        ),
        _ => Verdict::NoVerdict,
    }
}

fn post_dash(event: &Event) -> Verdict {
    match event {
        Event::Screen(ScreenObservation::DashSummary { .. }) => {
            Verdict::Stay(SessionState::PostDash, Vec::new())
        }
        Event::Screen(ScreenObservation::IdleMap { .. }) => {
            Verdict::Exit(SessionState::IdleOffline, Vec::new())
        }
        Event::Screen(ScreenObservation::WaitingForOffer { pay_so_far, .. }) => Verdict::Exit(
            SessionState::AwaitingOffer {
                pay_so_far: pay_so_far.unwrap_or(0.0),
            },
            vec![Effect::PersistEvent(EventRecord::new(RecordKind::DashStarted))],
        ),
        _ => Verdict::NoVerdict,
    }
}

/// The state-independent anchor table: observations that are unambiguous
/// proof of a phase.
fn anchor_state(obs: &ScreenObservation) -> Option<SessionState> {
    match obs {
        ScreenObservation::IdleMap { .. } => Some(SessionState::IdleOffline),
        ScreenObservation::WaitingForOffer { pay_so_far, .. } => {
            Some(SessionState::AwaitingOffer {
                pay_so_far: pay_so_far.unwrap_or(0.0),
            })
        }
        ScreenObservation::Offer { offer } => Some(SessionState::OfferPresented {
            hash: offer.hash.clone(),
            offer: offer.clone(),
            click_intent: None,
        }),
        ScreenObservation::PickupDetails { store, status, .. } => Some(SessionState::OnPickup {
            store: store.clone(),
            status: *status,
        }),
        ScreenObservation::DeliveryNav { address, .. } => Some(SessionState::OnDelivery {
            address: address.clone(),
        }),
        ScreenObservation::DeliveryCompleted { .. } => Some(SessionState::PostDelivery),
        ScreenObservation::DashPausedScreen { .. } => Some(SessionState::DashPaused),
        ScreenObservation::DashSummary { .. } => Some(SessionState::PostDash),
        ScreenObservation::Unrecognized => None,
    }
}

/// Forced transition into an anchor-implied phase.
fn recover(state: &SessionState, anchor: SessionState) -> Transition {
    let mut effects = exit_bookkeeping(state);

    effects.push(Effect::PersistEvent(
        EventRecord::new(RecordKind::StateRecovered)
            .with_detail(format!("{} -> {}", state.tag(), anchor.tag())),
    ));
    effects.push(Effect::notice(
        format!("Resynced: {} -> {}", state.tag(), anchor.tag()),
        NoticeTone::Info,
    ));

    // Phases with entry obligations owe them on the recovery path too:
    // an offer still arms evaluation and expiry, a pause still arms the
    // safety timer
    match &anchor {
        SessionState::OfferPresented { offer, .. } => {
            effects.extend(offer_entry_effects(offer));
        }
        SessionState::DashPaused => {
            effects.extend(dash_paused_entry_effects());
        }
        _ => {}
    }

    Transition {
        new_state: anchor,
        effects,
    }
}

/// Outcome bookkeeping owed when a phase is exited abnormally.
///
/// Today only OfferPresented accumulates data that must be resolved on
/// the way out; other phases persist their records on entry.
fn exit_bookkeeping(state: &SessionState) -> Vec<Effect> {
    match state {
        SessionState::OfferPresented {
            hash, click_intent, ..
        } => offer_outcome_effects(hash, *click_intent),
        SessionState::DashPaused => vec![Effect::CancelTimeout(TimeoutKind::DashPausedSafety)],
        _ => Vec::new(),
    }
}

/// Effects armed whenever the dash enters its paused phase
fn dash_paused_entry_effects() -> Vec<Effect> {
    vec![
        Effect::PersistEvent(EventRecord::new(RecordKind::DashPaused)),
        Effect::ScheduleTimeout {
            kind: TimeoutKind::DashPausedSafety,
            after_ms: DASH_PAUSED_SAFETY_MS,
        },
    ]
}

/// Effects armed whenever a fresh offer starts being tracked
fn offer_entry_effects(offer: &ParsedOffer) -> Vec<Effect> {
    vec![
        Effect::PersistEvent(
            EventRecord::new(RecordKind::OfferSeen)
                .with_hash(&offer.hash)
                .with_detail(format!("${:.2} / {:.1} mi", offer.pay, offer.distance_miles)),
        ),
        Effect::EvaluateOffer(offer.clone()),
        Effect::ScheduleTimeout {
            kind: TimeoutKind::OfferExpiry,
            after_ms: OFFER_EXPIRY_MS,
        },
    ]
}

/// Resolve and log the outcome of a concluded offer.
///
/// Outcome and exit are attached to the same transition so they commit
/// atomically; no click intent recorded means the offer timed out.
fn offer_outcome_effects(hash: &str, click_intent: Option<ClickIntent>) -> Vec<Effect> {
    let outcome = match click_intent {
        Some(ClickIntent::Accept) => OfferOutcome::Accepted,
        Some(ClickIntent::Decline) => OfferOutcome::Declined,
        None => OfferOutcome::TimedOut,
    };

    vec![
        Effect::PersistEvent(EventRecord::new(outcome.record_kind()).with_hash(hash)),
        Effect::UpdateOfferStatus {
            offer_hash: hash.to_string(),
            outcome,
        },
        Effect::CancelTimeout(TimeoutKind::OfferExpiry),
    ]
}

fn dash_ended_record(total_pay: Option<f64>) -> EventRecord {
    let record = EventRecord::new(RecordKind::DashEnded);
    match total_pay {
        Some(pay) => record.with_detail(format!("${pay:.2}")),
        None => record,
    }
}

fn delivery_completed_record(tip: Option<f64>) -> EventRecord {
    let record = EventRecord::new(RecordKind::DeliveryCompleted);
    match tip {
        Some(tip) => record.with_detail(format!("tip ${tip:.2}")),
        None => record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::short_hash;

    fn offer(pay: f64) -> ParsedOffer {
        ParsedOffer {
            pay,
            distance_miles: 2.0,
            time_estimate_ms: Some(30 * 60 * 1000),
            store: Some("Walgreens".to_string()),
            items: Some(2),
            hash: short_hash(&format!("{pay}")),
        }
    }

    fn offer_state(pay: f64, click_intent: Option<ClickIntent>) -> SessionState {
        let o = offer(pay);
        SessionState::OfferPresented {
            hash: o.hash.clone(),
            offer: o,
            click_intent,
        }
    }

    fn outcome_logs(effects: &[Effect]) -> Vec<&Effect> {
        effects.iter().filter(|e| e.is_offer_outcome_log()).collect()
    }

    #[test]
    fn test_reduce_is_pure() {
        let state = SessionState::AwaitingOffer { pay_so_far: 5.0 };
        let event = Event::Screen(ScreenObservation::Offer { offer: offer(7.5) });
        assert_eq!(reduce(&state, &event), reduce(&state, &event));
    }

    #[test]
    fn test_unrecognized_is_stasis_everywhere() {
        let states = [
            SessionState::Initializing,
            SessionState::IdleOffline,
            SessionState::OnDelivery { address: None },
            SessionState::DashPaused,
            SessionState::PausedOrInterrupted,
        ];
        let event = Event::Screen(ScreenObservation::Unrecognized);
        for state in states {
            let t = reduce(&state, &event);
            assert_eq!(t.new_state, state);
            assert!(t.effects.is_empty());
        }
    }

    #[test]
    fn test_same_offer_hash_is_internal_noop() {
        let state = offer_state(7.5, Some(ClickIntent::Accept));
        let event = Event::Screen(ScreenObservation::Offer { offer: offer(7.5) });
        let t = reduce(&state, &event);
        // Click intent survives the re-render
        assert_eq!(t.new_state, state);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_offer_replace_in_place() {
        let state = offer_state(7.5, None);
        let event = Event::Screen(ScreenObservation::Offer { offer: offer(9.0) });
        let t = reduce(&state, &event);

        match &t.new_state {
            SessionState::OfferPresented { offer: o, click_intent, .. } => {
                assert_eq!(o.pay, 9.0);
                assert_eq!(*click_intent, None);
            }
            other => panic!("expected OfferPresented, got {other:?}"),
        }
        // Old offer concluded as timed out, new offer armed
        let logs = outcome_logs(&t.effects);
        assert_eq!(logs.len(), 1);
        assert!(matches!(
            logs[0],
            Effect::PersistEvent(EventRecord { kind: RecordKind::OfferTimedOut, .. })
        ));
        assert!(t
            .effects
            .iter()
            .any(|e| matches!(e, Effect::EvaluateOffer(o) if o.pay == 9.0)));
    }

    #[test]
    fn test_click_recorded_as_internal_update() {
        let state = offer_state(7.5, None);
        let t = reduce(&state, &Event::Click(ClickIntent::Decline));
        match t.new_state {
            SessionState::OfferPresented { click_intent, .. } => {
                assert_eq!(click_intent, Some(ClickIntent::Decline));
            }
            other => panic!("expected OfferPresented, got {other:?}"),
        }
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_evaluation_loopback_clicks_but_stays() {
        let state = offer_state(7.5, None);
        let hash = match &state {
            SessionState::OfferPresented { hash, .. } => hash.clone(),
            _ => unreachable!(),
        };
        let t = reduce(
            &state,
            &Event::OfferEvaluated {
                hash,
                decision: OfferDecision::Accept,
            },
        );
        assert_eq!(discriminant(&t.new_state), discriminant(&state));
        assert!(t
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Click(target) if target.text.as_deref() == Some("Accept"))));
    }

    #[test]
    fn test_stale_evaluation_for_other_offer_is_stasis() {
        let state = offer_state(7.5, None);
        let t = reduce(
            &state,
            &Event::OfferEvaluated {
                hash: "stale".to_string(),
                decision: OfferDecision::Accept,
            },
        );
        assert_eq!(t.new_state, state);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_anchor_recovery_from_initializing() {
        let t = reduce(
            &SessionState::Initializing,
            &Event::Screen(ScreenObservation::PickupDetails {
                store: Some("Walgreens".to_string()),
                status: None,
                customer_hash: None,
            }),
        );
        assert!(matches!(t.new_state, SessionState::OnPickup { .. }));
        assert!(t.effects.iter().any(|e| matches!(
            e,
            Effect::PersistEvent(EventRecord { kind: RecordKind::StateRecovered, .. })
        )));
    }

    #[test]
    fn test_anchor_does_not_override_internal_update() {
        // OnPickup handles PickupDetails itself; no recovery effect may
        // appear even though the anchor table also knows this screen
        let state = SessionState::OnPickup {
            store: Some("Walgreens".to_string()),
            status: None,
        };
        let t = reduce(
            &state,
            &Event::Screen(ScreenObservation::PickupDetails {
                store: Some("Walgreens".to_string()),
                status: Some(crate::classify::PickupStatus::ArrivedAtStore),
                customer_hash: None,
            }),
        );
        assert!(matches!(t.new_state, SessionState::OnPickup { .. }));
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_recovery_resolves_abandoned_offer() {
        // Machine believes an offer is up; reality says we're delivering.
        // The forced transition still owes the offer its outcome log.
        let state = offer_state(7.5, Some(ClickIntent::Accept));
        let t = reduce(
            &state,
            &Event::Screen(ScreenObservation::DeliveryNav {
                address: Some("123 Main St".to_string()),
                customer_hash: None,
                eta_ms: None,
            }),
        );
        assert!(matches!(t.new_state, SessionState::OnDelivery { .. }));
        let logs = outcome_logs(&t.effects);
        assert_eq!(logs.len(), 1);
        assert!(matches!(
            logs[0],
            Effect::PersistEvent(EventRecord { kind: RecordKind::OfferAccepted, .. })
        ));
    }

    #[test]
    fn test_interruption_exits_business_phase() {
        let state = SessionState::OnDelivery { address: None };
        let t = reduce(&state, &Event::Notification(NotificationKind::AppInterrupted));
        assert_eq!(t.new_state, SessionState::PausedOrInterrupted);

        // Non-business phases ignore it
        let t = reduce(
            &SessionState::IdleOffline,
            &Event::Notification(NotificationKind::AppInterrupted),
        );
        assert_eq!(t.new_state, SessionState::IdleOffline);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_interruption_recovery_via_anchor() {
        let t = reduce(
            &SessionState::PausedOrInterrupted,
            &Event::Screen(ScreenObservation::WaitingForOffer {
                pay_so_far: Some(14.0),
                wait_estimate_ms: None,
            }),
        );
        assert_eq!(
            t.new_state,
            SessionState::AwaitingOffer { pay_so_far: 14.0 }
        );
    }

    #[test]
    fn test_stale_timer_is_stasis() {
        let state = SessionState::AwaitingOffer { pay_so_far: 0.0 };
        let t = reduce(&state, &Event::TimerExpired(TimeoutKind::DashPausedSafety));
        assert_eq!(t.new_state, state);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_offer_expiry_timer() {
        let state = offer_state(7.5, None);
        let t = reduce(&state, &Event::TimerExpired(TimeoutKind::OfferExpiry));
        assert!(matches!(t.new_state, SessionState::AwaitingOffer { .. }));
        let logs = outcome_logs(&t.effects);
        assert_eq!(logs.len(), 1);
        assert!(matches!(
            logs[0],
            Effect::PersistEvent(EventRecord { kind: RecordKind::OfferTimedOut, .. })
        ));
    }

    #[test]
    fn test_recovery_into_pause_arms_safety_timer() {
        // Pause reached via resync, not via a sequential handler; the
        // safety timer must still be armed or a dash that dies while
        // paused would be tracked forever
        let state = SessionState::OnPickup {
            store: Some("Walgreens".to_string()),
            status: None,
        };
        let t = reduce(
            &state,
            &Event::Screen(ScreenObservation::DashPausedScreen {
                resume_deadline_ms: None,
            }),
        );
        assert_eq!(t.new_state, SessionState::DashPaused);
        assert!(t.effects.iter().any(|e| matches!(
            e,
            Effect::ScheduleTimeout {
                kind: TimeoutKind::DashPausedSafety,
                ..
            }
        )));
        assert!(t.effects.iter().any(|e| matches!(
            e,
            Effect::PersistEvent(EventRecord { kind: RecordKind::StateRecovered, .. })
        )));

        // The armed timer then ends the dash on expiry
        let t = reduce(&t.new_state, &Event::TimerExpired(TimeoutKind::DashPausedSafety));
        assert_eq!(t.new_state, SessionState::IdleOffline);
    }

    #[test]
    fn test_pause_resume_cancels_safety_timer() {
        let t = reduce(
            &SessionState::DashPaused,
            &Event::Screen(ScreenObservation::WaitingForOffer {
                pay_so_far: None,
                wait_estimate_ms: None,
            }),
        );
        assert!(matches!(t.new_state, SessionState::AwaitingOffer { .. }));
        assert!(t
            .effects
            .contains(&Effect::CancelTimeout(TimeoutKind::DashPausedSafety)));
    }
}
