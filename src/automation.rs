//! Seams to the host: live tree fetch, clicking, and user notices.
//!
//! The observer itself never talks to an OS accessibility API; these
//! traits are implemented by the embedding process. Logging default
//! implementations let the daemon run headless.

use crate::store::effect::NoticeTone;
use crate::types::{ElementBounds, ElementNode};
use async_trait::async_trait;
use tracing::{debug, info};

/// Source of a fresh, live element tree for click re-location.
///
/// A click effect must never be issued against the stale tree it was
/// observed on; the target is re-located in a tree fetched at click time.
#[async_trait]
pub trait LiveTreeSource: Send + Sync {
    /// Fetch the current tree, `None` when the app is not reachable
    async fn fetch_tree(&self) -> Option<ElementNode>;

    /// Issue a click on the element at the given bounds. Best effort.
    async fn click(&self, bounds: ElementBounds) -> bool;
}

/// Display surface for user-facing notices. Best-effort, no acknowledgment.
pub trait NoticeSurface: Send + Sync {
    fn post(&self, text: &str, tone: NoticeTone);
}

/// Headless tree source: no live tree, clicks are dropped with a log line
pub struct NullTreeSource;

#[async_trait]
impl LiveTreeSource for NullTreeSource {
    async fn fetch_tree(&self) -> Option<ElementNode> {
        None
    }

    async fn click(&self, bounds: ElementBounds) -> bool {
        debug!("No automation surface; dropping click at {:?}", bounds.center());
        false
    }
}

/// Notice surface that writes to the log
pub struct LogNoticeSurface;

impl NoticeSurface for LogNoticeSurface {
    fn post(&self, text: &str, tone: NoticeTone) {
        match tone {
            NoticeTone::Info => info!("[notice] {}", text),
            NoticeTone::Success => info!("[notice] ✅ {}", text),
            NoticeTone::Warning => tracing::warn!("[notice] {}", text),
            NoticeTone::Alert => tracing::error!("[notice] {}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_source_drops_clicks() {
        let source = NullTreeSource;
        assert!(source.fetch_tree().await.is_none());
        assert!(!source.click(ElementBounds::new(0, 0, 10, 10)).await);
    }
}
