//! The state store: one immutable session state, replaced per transition.
//!
//! Single-writer discipline: only the serialized event queue (the
//! pipeline's dispatch task) may call [`Store::dispatch`]. Reads of the
//! current state are safe anywhere because the value is replaced, never
//! mutated in place.

pub mod effect;
pub mod reducer;
pub mod state;

pub use effect::{
    ClickTarget, Effect, EventRecord, NoticeTone, OfferOutcome, RecordKind, TimeoutKind,
};
pub use reducer::{reduce, Transition, DASH_PAUSED_SAFETY_MS, OFFER_EXPIRY_MS};
pub use state::{ClickIntent, Event, NotificationKind, OfferDecision, SessionState};

use tracing::{debug, info};

/// Hook invoked after every committed transition, before effects run.
/// Used to persist the session-state snapshot.
pub type SnapshotHook = Box<dyn Fn(&SessionState) + Send>;

/// Owns the single current [`SessionState`]
pub struct Store {
    state: SessionState,
    transitions: u64,
    snapshot_hook: Option<SnapshotHook>,
}

impl Store {
    pub fn new(initial: SessionState) -> Self {
        Self {
            state: initial,
            transitions: 0,
            snapshot_hook: None,
        }
    }

    /// Install the post-transition snapshot hook
    pub fn with_snapshot_hook(mut self, hook: SnapshotHook) -> Self {
        self.snapshot_hook = Some(hook);
        self
    }

    /// Immutable snapshot of the current state
    pub fn current_state(&self) -> &SessionState {
        &self.state
    }

    /// Total number of phase changes since startup
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    /// Reduce one event and commit the result.
    ///
    /// The state is committed before the returned effects are executed;
    /// an effect failure can never corrupt it.
    pub fn dispatch(&mut self, event: Event) -> Vec<Effect> {
        let transition = reduce(&self.state, &event);

        let state_changed = transition.new_state != self.state;
        let phase_changed = transition.new_state.tag() != self.state.tag();
        if phase_changed {
            info!(
                "State: {} -> {} (event: {})",
                self.state.tag(),
                transition.new_state.tag(),
                event.tag()
            );
            self.transitions += 1;
        } else if !transition.effects.is_empty() {
            debug!(
                "Internal update in {} (event: {})",
                self.state.tag(),
                event.tag()
            );
        }

        self.state = transition.new_state;

        if state_changed {
            if let Some(hook) = &self.snapshot_hook {
                hook(&self.state);
            }
        }

        transition.effects
    }
}
