//! Dash Observer - Session tracking for a gig-delivery app
//!
//! This crate watches UI element-tree snapshots of a delivery ("dash")
//! app and maintains a recoverable model of the work session:
//!
//! - **Debouncer**: Collapses the noisy raw signal stream into distinct
//!   observations using content/shape fingerprints and coalescing.
//! - **Classifier**: Priority-ordered matchers that recognize semantic
//!   screens (offer, pickup, delivery, summary, ...).
//! - **Store**: A pure reducer driving the session state machine, with
//!   anchor-based recovery when observation and belief diverge.
//! - **Executor**: Interprets the reducer's effects (persistence,
//!   timers, notices, clicks, offer evaluation).
//!
//! # Architecture
//!
//! All events flow through one serialized queue, so exactly one state
//! transition is ever in flight and event order is total. The executor
//! feeds its own conclusions (timer expiries, offer evaluations) back
//! into the same queue.

pub mod automation;
pub mod classify;
pub mod config;
pub mod debouncer;
pub mod executor;
pub mod fingerprint;
pub mod pipeline;
pub mod storage;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use automation::{LiveTreeSource, LogNoticeSurface, NoticeSurface, NullTreeSource};
pub use classify::offer::ParsedOffer;
pub use classify::{PickupStatus, ScreenClassifier, ScreenMatcher, ScreenObservation};
pub use config::Config;
pub use debouncer::Debouncer;
pub use executor::EffectExecutor;
pub use fingerprint::SnapshotFingerprint;
pub use pipeline::{PipelineControl, PipelineHandles, PipelineStatus, SessionPipeline};
pub use storage::{EventStore, SessionEvent, StateSnapshot, StorageError};
pub use store::{
    ClickIntent, ClickTarget, Effect, Event, EventRecord, NoticeTone, NotificationKind,
    OfferDecision, OfferOutcome, RecordKind, SessionState, Store, TimeoutKind, Transition,
};
pub use types::{ElementBounds, ElementNode, ObserverError, SignalKind, Snapshot};
