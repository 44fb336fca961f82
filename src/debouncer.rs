//! Signal debouncer: turns the source's noisy snapshot stream into the
//! calm stream the classifier sees.
//!
//! Three rules, applied in order:
//! 1. High-priority signals (clicks, window switches) bypass everything.
//! 2. Snapshots whose fingerprint equals the last one seen are dropped.
//! 3. Everything else is held for a short coalescing window; a newer
//!    snapshot arriving inside the window replaces the held one and
//!    restarts the timer.
//!
//! A starvation guard caps rule 3: if nothing has been forwarded for
//! longer than `max_staleness_ms`, the next snapshot goes out
//! immediately so a rapidly animating screen cannot delay observation
//! forever.

use crate::config::DebounceConfig;
use crate::fingerprint::SnapshotFingerprint;
use crate::types::{ObserverError, Snapshot};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

pub struct Debouncer {
    coalesce: Duration,
    max_staleness: Duration,
    out: mpsc::Sender<Snapshot>,
    last_fingerprint: Option<SnapshotFingerprint>,
    /// Snapshot held during the coalescing window, shared with the flush task
    pending: Arc<Mutex<Option<Snapshot>>>,
    flush_task: Option<JoinHandle<()>>,
    /// When a snapshot last left the debouncer, shared with the flush task
    last_forwarded: Arc<Mutex<Instant>>,
    received: u64,
    suppressed: u64,
}

impl Debouncer {
    pub fn new(config: &DebounceConfig, out: mpsc::Sender<Snapshot>) -> Self {
        Self {
            coalesce: Duration::from_millis(config.coalesce_ms),
            max_staleness: Duration::from_millis(config.max_staleness_ms),
            out,
            last_fingerprint: None,
            pending: Arc::new(Mutex::new(None)),
            flush_task: None,
            last_forwarded: Arc::new(Mutex::new(Instant::now())),
            received: 0,
            suppressed: 0,
        }
    }

    /// Accept one raw snapshot from the source.
    ///
    /// Returns an error only when the downstream queue is gone; every
    /// other outcome (suppressed, held, forwarded) is `Ok`.
    pub async fn handle(&mut self, snapshot: Snapshot) -> Result<(), ObserverError> {
        self.received += 1;

        if snapshot.signal.is_high_priority() {
            // User intent: never delayed, supersedes anything held
            self.cancel_pending();
            self.last_fingerprint = Some(SnapshotFingerprint::of(&snapshot));
            return self.forward(snapshot).await;
        }

        let fingerprint = SnapshotFingerprint::of(&snapshot);
        if self.last_fingerprint.as_ref() == Some(&fingerprint) {
            self.suppressed += 1;
            trace!("Suppressed redundant {} snapshot", snapshot.signal.as_str());
            return Ok(());
        }
        self.last_fingerprint = Some(fingerprint);

        let stale = {
            let last = self.last_forwarded.lock().unwrap_or_else(|p| p.into_inner());
            last.elapsed() >= self.max_staleness
        };
        if stale {
            debug!("Staleness guard: forwarding without coalescing");
            self.cancel_pending();
            return self.forward(snapshot).await;
        }

        self.hold(snapshot);
        Ok(())
    }

    /// Replace the held snapshot and restart the coalescing timer
    fn hold(&mut self, snapshot: Snapshot) {
        {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            if pending.replace(snapshot).is_some() {
                self.suppressed += 1;
            }
        }

        if let Some(task) = self.flush_task.take() {
            task.abort();
        }

        let pending = self.pending.clone();
        let out = self.out.clone();
        let last_forwarded = self.last_forwarded.clone();
        let coalesce = self.coalesce;
        self.flush_task = Some(tokio::spawn(async move {
            tokio::time::sleep(coalesce).await;
            let snapshot = {
                let mut pending = pending.lock().unwrap_or_else(|p| p.into_inner());
                pending.take()
            };
            if let Some(snapshot) = snapshot {
                *last_forwarded.lock().unwrap_or_else(|p| p.into_inner()) = Instant::now();
                if out.send(snapshot).await.is_err() {
                    debug!("Snapshot queue closed during flush");
                }
            }
        }));
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        if pending.take().is_some() {
            self.suppressed += 1;
        }
    }

    async fn forward(&mut self, snapshot: Snapshot) -> Result<(), ObserverError> {
        *self
            .last_forwarded
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Instant::now();
        self.out
            .send(snapshot)
            .await
            .map_err(|_| ObserverError::QueueClosed)
    }

    /// (received, suppressed) counters since startup
    pub fn stats(&self) -> (u64, u64) {
        (self.received, self.suppressed)
    }
}
