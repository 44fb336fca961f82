//! Pipeline wiring: source signals in, effects out.
//!
//! Topology: raw snapshots flow into the debouncer task, debounced
//! snapshots into the single dispatch loop, which classifies, reduces
//! and executes effects. The executor's loopback events merge into the
//! same loop, so exactly one reduce is ever in flight and event order
//! is total.

use crate::automation::{LiveTreeSource, NoticeSurface};
use crate::classify::ScreenClassifier;
use crate::config::{Config, TimeoutConfig};
use crate::debouncer::Debouncer;
use crate::executor::EffectExecutor;
use crate::storage::{EventStore, StateSnapshot};
use crate::store::effect::{Effect, TimeoutKind};
use crate::store::state::{ClickIntent, Event, NotificationKind};
use crate::store::Store;
use crate::types::{SignalKind, Snapshot};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Point-in-time view of the pipeline, for logs and status queries
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    pub paused: bool,
    pub phase: String,
    pub snapshots_classified: u64,
    pub events_dispatched: u64,
}

struct ControlInner {
    paused: AtomicBool,
    snapshots_classified: AtomicU64,
    events_dispatched: AtomicU64,
    phase: Mutex<String>,
}

/// Cloneable pause/resume/status handle
#[derive(Clone)]
pub struct PipelineControl {
    inner: Arc<ControlInner>,
}

impl PipelineControl {
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        info!("Pipeline paused");
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        info!("Pipeline resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            paused: self.is_paused(),
            phase: self
                .inner
                .phase
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
            snapshots_classified: self.inner.snapshots_classified.load(Ordering::SeqCst),
            events_dispatched: self.inner.events_dispatched.load(Ordering::SeqCst),
        }
    }
}

/// Channel endpoints handed to the embedding process
pub struct PipelineHandles {
    /// Raw snapshots from the signal source; debounced before dispatch
    pub raw_tx: mpsc::Sender<Snapshot>,
    /// Direct event injection (pre-parsed notifications, tests)
    pub event_tx: mpsc::Sender<Event>,
    pub control: PipelineControl,
}

/// The dispatch loop and everything it owns
pub struct SessionPipeline {
    classifier: ScreenClassifier,
    store: Store,
    executor: EffectExecutor,
    timeouts: TimeoutConfig,
    snapshot_rx: mpsc::Receiver<Snapshot>,
    event_rx: mpsc::Receiver<Event>,
    control: Arc<ControlInner>,
}

impl SessionPipeline {
    /// Wire up the full pipeline. Must be called inside a tokio runtime;
    /// spawns the debouncer task and the executor's persistence worker.
    pub fn new(
        config: &Config,
        event_store: EventStore,
        tree_source: Arc<dyn LiveTreeSource>,
        notices: Arc<dyn NoticeSurface>,
    ) -> (Self, PipelineHandles) {
        let (raw_tx, mut raw_rx) = mpsc::channel::<Snapshot>(64);
        let (debounced_tx, snapshot_rx) = mpsc::channel::<Snapshot>(64);
        let (event_tx, event_rx) = mpsc::channel::<Event>(64);

        let mut debouncer = Debouncer::new(&config.debounce, debounced_tx);
        tokio::spawn(async move {
            while let Some(snapshot) = raw_rx.recv().await {
                if debouncer.handle(snapshot).await.is_err() {
                    debug!("Snapshot queue closed, stopping debouncer");
                    break;
                }
            }
        });

        let executor = EffectExecutor::new(
            event_store,
            tree_source,
            notices,
            config.offers.clone(),
            event_tx.clone(),
        );

        let state_path = config.persistence.state_path();
        let initial = StateSnapshot::restore(&state_path);
        info!("Starting in phase: {}", initial.tag());

        let control = Arc::new(ControlInner {
            paused: AtomicBool::new(false),
            snapshots_classified: AtomicU64::new(0),
            events_dispatched: AtomicU64::new(0),
            phase: Mutex::new(initial.tag().to_string()),
        });

        let store = Store::new(initial).with_snapshot_hook(Box::new(move |state| {
            StateSnapshot::save(&state_path, state);
        }));

        let pipeline = Self {
            classifier: ScreenClassifier::new(),
            store,
            executor,
            timeouts: config.timeouts.clone(),
            snapshot_rx,
            event_rx,
            control: control.clone(),
        };

        let handles = PipelineHandles {
            raw_tx,
            event_tx,
            control: PipelineControl { inner: control },
        };

        (pipeline, handles)
    }

    /// Run until both input channels close
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                // Loopback events drain before the next snapshot
                biased;
                maybe_event = self.event_rx.recv() => match maybe_event {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
                maybe_snapshot = self.snapshot_rx.recv() => match maybe_snapshot {
                    Some(snapshot) => self.observe(snapshot).await,
                    None => break,
                },
            }
        }
        info!(
            "Pipeline stopped after {} snapshots, {} events",
            self.control.snapshots_classified.load(Ordering::SeqCst),
            self.control.events_dispatched.load(Ordering::SeqCst)
        );
    }

    /// Classify one debounced snapshot and dispatch the resulting events
    async fn observe(&mut self, snapshot: Snapshot) {
        if self.control.paused.load(Ordering::SeqCst) {
            trace!("Paused, dropping snapshot");
            return;
        }
        self.control
            .snapshots_classified
            .fetch_add(1, Ordering::SeqCst);

        // A window switch with no readable tree means the observed app
        // left the foreground
        if snapshot.signal == SignalKind::WindowChanged && snapshot.root.is_none() {
            self.dispatch(Event::Notification(NotificationKind::AppInterrupted))
                .await;
            return;
        }

        // Click intent is dispatched before the screen observation so
        // the store records it ahead of any screen change it causes
        if let Some(intent) = click_intent(&snapshot) {
            self.dispatch(Event::Click(intent)).await;
        }

        let observation = self.classifier.classify(&snapshot);
        self.dispatch(Event::Screen(observation)).await;
    }

    async fn dispatch(&mut self, event: Event) {
        let mut effects = self.store.dispatch(event);
        for effect in &mut effects {
            apply_timeout_config(effect, &self.timeouts);
        }
        self.executor.execute_all(effects).await;

        self.control
            .events_dispatched
            .fetch_add(1, Ordering::SeqCst);
        let mut phase = self
            .control
            .phase
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        *phase = self.store.current_state().tag().to_string();
    }
}

/// Derive a click intent from the element the click landed on
fn click_intent(snapshot: &Snapshot) -> Option<ClickIntent> {
    if snapshot.signal != SignalKind::Click {
        return None;
    }
    let source = snapshot.source.as_ref()?;
    let label = source
        .text
        .as_deref()
        .or(source.description.as_deref())?
        .trim();
    match label {
        "Accept" | "Accept Order" => Some(ClickIntent::Accept),
        "Decline" | "Decline Order" => Some(ClickIntent::Decline),
        other => {
            trace!("Click on '{}' carries no offer intent", other);
            None
        }
    }
}

/// Rewrite scheduled-timeout durations to the configured values.
///
/// The reducer is pure and emits compile-time default durations; the
/// pipeline substitutes the operator's configuration before execution.
fn apply_timeout_config(effect: &mut Effect, timeouts: &TimeoutConfig) {
    match effect {
        Effect::ScheduleTimeout { kind, after_ms } => {
            *after_ms = match kind {
                TimeoutKind::OfferExpiry => timeouts.offer_expiry_ms,
                TimeoutKind::DashPausedSafety => timeouts.pause_safety_ms,
            };
        }
        Effect::Delayed { inner, .. } => apply_timeout_config(inner, timeouts),
        Effect::Sequence(effects) => {
            for effect in effects {
                apply_timeout_config(effect, timeouts);
            }
        }
        _ => {}
    }
}
