//! The effect executor: interprets `Effect` values.
//!
//! Effects are isolated from one another: a failed click or persistence
//! write is logged and the remaining effects of the same transition still
//! run. The executor never touches `SessionState` directly; anything it
//! learns flows back into the store as a loopback event over the same
//! serialized queue every other event uses.

use crate::automation::{LiveTreeSource, NoticeSurface};
use crate::classify::offer::ParsedOffer;
use crate::config::OfferPolicyConfig;
use crate::storage::EventStore;
use crate::store::effect::{ClickTarget, Effect, EventRecord, NoticeTone, OfferOutcome, TimeoutKind};
use crate::store::state::{Event, OfferDecision};
use crate::types::ElementNode;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Jobs for the serialized persistence worker
enum PersistJob {
    Insert(EventRecord),
    UpdateStatus {
        offer_hash: String,
        outcome: OfferOutcome,
    },
}

/// Asynchronous effect interpreter
pub struct EffectExecutor {
    tree_source: Arc<dyn LiveTreeSource>,
    notices: Arc<dyn NoticeSurface>,
    policy: OfferPolicyConfig,
    /// Loopback into the store's event queue
    loopback_tx: mpsc::Sender<Event>,
    /// Fire-and-forget channel to the persistence worker
    persist_tx: mpsc::Sender<PersistJob>,
    /// Pending timers, keyed by kind; a new timer supersedes the old one
    timers: Arc<Mutex<HashMap<TimeoutKind, JoinHandle<()>>>>,
}

impl EffectExecutor {
    /// Build an executor and spawn its persistence worker.
    ///
    /// The worker owns the database connection, serializing mutation
    /// order independently of (but eventually consistent with) the
    /// state-transition order.
    pub fn new(
        event_store: EventStore,
        tree_source: Arc<dyn LiveTreeSource>,
        notices: Arc<dyn NoticeSurface>,
        policy: OfferPolicyConfig,
        loopback_tx: mpsc::Sender<Event>,
    ) -> Self {
        let (persist_tx, mut persist_rx) = mpsc::channel::<PersistJob>(256);

        tokio::spawn(async move {
            while let Some(job) = persist_rx.recv().await {
                let result = match job {
                    PersistJob::Insert(record) => event_store.insert(&record).map(|_| ()),
                    PersistJob::UpdateStatus { offer_hash, outcome } => event_store
                        .update_offer_status(&offer_hash, outcome)
                        .map(|_| ()),
                };
                if let Err(e) = result {
                    error!("Persistence write failed: {}", e);
                }
            }
            debug!("Persistence worker stopped");
        });

        Self {
            tree_source,
            notices,
            policy,
            loopback_tx,
            persist_tx,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Execute all effects of one transition, in order
    pub async fn execute_all(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute(effect).await;
        }
    }

    /// Execute one effect. Failures are logged, never propagated.
    pub async fn execute(&self, effect: Effect) {
        self.execute_boxed(effect).await;
    }

    // Boxed for recursion through Delayed/Sequence
    fn execute_boxed(&self, effect: Effect) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            match effect {
                Effect::PersistEvent(record) => {
                    if self.persist_tx.send(PersistJob::Insert(record)).await.is_err() {
                        error!("Persistence worker gone; dropping event record");
                    }
                }
                Effect::UpdateOfferStatus { offer_hash, outcome } => {
                    let job = PersistJob::UpdateStatus { offer_hash, outcome };
                    if self.persist_tx.send(job).await.is_err() {
                        error!("Persistence worker gone; dropping status update");
                    }
                }
                Effect::Notice { text, tone } => {
                    self.notices.post(&text, tone);
                }
                Effect::ScheduleTimeout { kind, after_ms } => {
                    self.schedule_timeout(kind, after_ms);
                }
                Effect::CancelTimeout(kind) => {
                    self.cancel_timeout(kind);
                }
                Effect::Click(target) => {
                    self.click(target).await;
                }
                Effect::CaptureEvidence { label } => {
                    // Screenshot capture is outside this crate's boundary;
                    // the label is logged so the host can correlate
                    info!("Evidence requested: {}", label);
                }
                Effect::EvaluateOffer(offer) => {
                    self.evaluate_offer(offer).await;
                }
                Effect::Delayed { after_ms, inner } => {
                    tokio::time::sleep(Duration::from_millis(after_ms)).await;
                    self.execute_boxed(*inner).await;
                }
                Effect::Sequence(effects) => {
                    for effect in effects {
                        self.execute_boxed(effect).await;
                    }
                }
            }
        })
    }

    /// Schedule a timeout, superseding any pending timer of the same kind
    fn schedule_timeout(&self, kind: TimeoutKind, after_ms: u64) {
        let loopback = self.loopback_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after_ms)).await;
            if loopback.send(Event::TimerExpired(kind)).await.is_err() {
                debug!("Event queue gone; dropping {} timeout", kind.as_str());
            }
        });

        let mut timers = self.timers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(prev) = timers.insert(kind, handle) {
            debug!("Superseding pending {} timer", kind.as_str());
            prev.abort();
        }
    }

    fn cancel_timeout(&self, kind: TimeoutKind) {
        let mut timers = self.timers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = timers.remove(&kind) {
            handle.abort();
            debug!("Cancelled {} timer", kind.as_str());
        }
    }

    /// Re-locate the target in a freshly fetched live tree and click it.
    /// Absence of a live match is not an error, only a logged warning.
    async fn click(&self, target: ClickTarget) {
        let Some(tree) = self.tree_source.fetch_tree().await else {
            warn!("Click skipped: no live tree available");
            return;
        };

        let Some(node) = locate(&tree, &target) else {
            warn!(
                "Click skipped: no live match for {:?}/{:?}",
                target.view_id, target.text
            );
            return;
        };

        let bounds = node.bounds;
        if self.tree_source.click(bounds).await {
            debug!("Clicked element at {:?}", bounds.center());
        } else {
            warn!("Click failed at {:?}", bounds.center());
        }
    }

    /// Compute an accept/decline decision and loop it back as an event.
    /// The decision notice and the loopback are independent of each
    /// other, not ordered.
    async fn evaluate_offer(&self, offer: ParsedOffer) {
        let (decision, reason) = evaluate(&self.policy, &offer);

        self.notices.post(
            &format!(
                "Offer ${:.2} ({:.2}/mi): {} — {}",
                offer.pay,
                offer.dollars_per_mile(),
                match decision {
                    OfferDecision::Accept => "accept",
                    OfferDecision::Decline => "decline",
                },
                reason
            ),
            NoticeTone::Info,
        );

        let event = Event::OfferEvaluated {
            hash: offer.hash,
            decision,
        };
        if self.loopback_tx.send(event).await.is_err() {
            error!("Event queue gone; dropping offer evaluation");
        }
    }

    /// Number of currently pending timers
    pub fn pending_timers(&self) -> usize {
        let timers = self.timers.lock().unwrap_or_else(|p| p.into_inner());
        timers.iter().filter(|(_, h)| !h.is_finished()).count()
    }
}

/// Find the click target in a live tree: stable id first, text next,
/// bounds-equality last.
fn locate<'a>(tree: &'a ElementNode, target: &ClickTarget) -> Option<&'a ElementNode> {
    if let Some(id) = &target.view_id {
        if let Some(node) = tree.find_by_id(id) {
            return Some(node);
        }
    }
    if let Some(text) = &target.text {
        if let Some(node) = tree.find_text(text) {
            return Some(node);
        }
    }
    if let Some(bounds) = &target.expected_bounds {
        return tree.iter().find(|n| n.bounds == *bounds);
    }
    None
}

/// Threshold-based offer evaluation policy
pub fn evaluate(policy: &OfferPolicyConfig, offer: &ParsedOffer) -> (OfferDecision, String) {
    if offer.pay >= policy.auto_accept_pay {
        return (
            OfferDecision::Accept,
            format!("pay >= ${:.2} floor", policy.auto_accept_pay),
        );
    }

    let per_mile = offer.dollars_per_mile();
    if per_mile < policy.min_dollars_per_mile {
        return (
            OfferDecision::Decline,
            format!(
                "${per_mile:.2}/mi below ${:.2}/mi floor",
                policy.min_dollars_per_mile
            ),
        );
    }

    if let Some(per_hour) = offer.dollars_per_hour() {
        if per_hour < policy.min_dollars_per_hour {
            return (
                OfferDecision::Decline,
                format!(
                    "${per_hour:.2}/hr below ${:.2}/hr floor",
                    policy.min_dollars_per_hour
                ),
            );
        }
    }

    (OfferDecision::Accept, "meets rate floors".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{LogNoticeSurface, NullTreeSource};
    use crate::fingerprint::short_hash;
    use crate::store::effect::RecordKind;
    use crate::types::ElementBounds;

    fn offer(pay: f64, miles: f64, minutes: Option<u64>) -> ParsedOffer {
        ParsedOffer {
            pay,
            distance_miles: miles,
            time_estimate_ms: minutes.map(|m| m * 60 * 1000),
            store: None,
            items: None,
            hash: short_hash(&format!("{pay}-{miles}")),
        }
    }

    fn policy() -> OfferPolicyConfig {
        OfferPolicyConfig {
            min_dollars_per_mile: 1.5,
            min_dollars_per_hour: 18.0,
            auto_accept_pay: 12.0,
        }
    }

    #[test]
    fn test_evaluate_flat_pay_accepts() {
        let (decision, _) = evaluate(&policy(), &offer(15.0, 20.0, Some(120)));
        assert_eq!(decision, OfferDecision::Accept);
    }

    #[test]
    fn test_evaluate_low_per_mile_declines() {
        let (decision, reason) = evaluate(&policy(), &offer(3.0, 5.0, None));
        assert_eq!(decision, OfferDecision::Decline);
        assert!(reason.contains("/mi"));
    }

    #[test]
    fn test_evaluate_low_per_hour_declines() {
        // $6 over 2 miles in 45 min: fine per mile, poor per hour
        let (decision, reason) = evaluate(&policy(), &offer(6.0, 2.0, Some(45)));
        assert_eq!(decision, OfferDecision::Decline);
        assert!(reason.contains("/hr"));
    }

    #[test]
    fn test_evaluate_good_rates_accept() {
        let (decision, _) = evaluate(&policy(), &offer(8.0, 2.0, Some(20)));
        assert_eq!(decision, OfferDecision::Accept);
    }

    #[test]
    fn test_evaluate_no_time_estimate_uses_per_mile_only() {
        let (decision, _) = evaluate(&policy(), &offer(5.0, 2.0, None));
        assert_eq!(decision, OfferDecision::Accept);
    }

    #[test]
    fn test_locate_prefers_view_id() {
        let mut root = ElementNode::new("FrameLayout");
        let mut by_id = ElementNode::with_text("Button", "Decline");
        by_id.view_id = Some("accept_button".to_string());
        by_id.bounds = ElementBounds::new(0, 0, 10, 10);
        root.children.push(by_id);
        root.children.push(ElementNode::with_text("Button", "Accept"));

        let target = ClickTarget {
            view_id: Some("accept_button".to_string()),
            text: Some("Accept".to_string()),
            expected_bounds: None,
        };
        let found = locate(&root, &target).unwrap();
        assert_eq!(found.view_id.as_deref(), Some("accept_button"));
    }

    #[test]
    fn test_locate_bounds_fallback() {
        let mut root = ElementNode::new("FrameLayout");
        let mut child = ElementNode::new("Button");
        child.bounds = ElementBounds::new(5, 5, 50, 20);
        root.children.push(child);

        let target = ClickTarget {
            view_id: Some("missing".to_string()),
            text: None,
            expected_bounds: Some(ElementBounds::new(5, 5, 50, 20)),
        };
        assert!(locate(&root, &target).is_some());
    }

    #[test]
    fn test_locate_none_when_no_match() {
        let root = ElementNode::new("FrameLayout");
        let target = ClickTarget::by_text("Accept");
        assert!(locate(&root, &target).is_none());
    }

    fn executor(loopback_tx: mpsc::Sender<Event>) -> EffectExecutor {
        EffectExecutor::new(
            EventStore::open_in_memory().unwrap(),
            Arc::new(NullTreeSource),
            Arc::new(LogNoticeSurface),
            policy(),
            loopback_tx,
        )
    }

    #[tokio::test]
    async fn test_timer_fires_loopback_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let exec = executor(tx);

        exec.execute(Effect::ScheduleTimeout {
            kind: TimeoutKind::OfferExpiry,
            after_ms: 10,
        })
        .await;

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, Event::TimerExpired(TimeoutKind::OfferExpiry));
    }

    #[tokio::test]
    async fn test_reschedule_supersedes_prior_timer() {
        let (tx, mut rx) = mpsc::channel(8);
        let exec = executor(tx);

        exec.execute(Effect::ScheduleTimeout {
            kind: TimeoutKind::OfferExpiry,
            after_ms: 20,
        })
        .await;
        exec.execute(Effect::ScheduleTimeout {
            kind: TimeoutKind::OfferExpiry,
            after_ms: 40,
        })
        .await;

        // Only the superseding timer fires
        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, Event::TimerExpired(TimeoutKind::OfferExpiry));
        let second = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(second.is_err(), "aborted timer must not fire");
    }

    #[tokio::test]
    async fn test_cancel_timeout() {
        let (tx, mut rx) = mpsc::channel(8);
        let exec = executor(tx);

        exec.execute(Effect::ScheduleTimeout {
            kind: TimeoutKind::DashPausedSafety,
            after_ms: 30,
        })
        .await;
        exec.execute(Effect::CancelTimeout(TimeoutKind::DashPausedSafety))
            .await;

        let fired = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(fired.is_err(), "cancelled timer must not fire");
    }

    #[tokio::test]
    async fn test_evaluate_offer_loops_back() {
        let (tx, mut rx) = mpsc::channel(8);
        let exec = executor(tx);

        let o = offer(20.0, 2.0, Some(20));
        let hash = o.hash.clone();
        exec.execute(Effect::EvaluateOffer(o)).await;

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            Event::OfferEvaluated {
                hash,
                decision: OfferDecision::Accept
            }
        );
    }

    #[tokio::test]
    async fn test_sequence_and_delayed() {
        let (tx, mut rx) = mpsc::channel(8);
        let exec = executor(tx);

        exec.execute(Effect::Sequence(vec![
            Effect::PersistEvent(EventRecord::new(RecordKind::DashStarted)),
            Effect::Delayed {
                after_ms: 5,
                inner: Box::new(Effect::ScheduleTimeout {
                    kind: TimeoutKind::OfferExpiry,
                    after_ms: 5,
                }),
            },
        ]))
        .await;

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, Event::TimerExpired(TimeoutKind::OfferExpiry));
    }

    #[tokio::test]
    async fn test_click_with_no_live_tree_is_not_an_error() {
        let (tx, _rx) = mpsc::channel(8);
        let exec = executor(tx);
        // Must not panic or block
        exec.execute(Effect::Click(ClickTarget::by_text("Accept")))
            .await;
    }
}
