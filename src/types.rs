//! Core types used throughout the observer.
//!
//! This module defines the fundamental data structures for UI snapshots:
//! the element tree received from the snapshot source, the signal kinds
//! that trigger an observation, and the `Snapshot` wrapper that flows
//! through the debounce/classify/reduce pipeline.

use serde::{Deserialize, Serialize};

/// What kind of accessibility signal triggered a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Window content changed (scroll, text update, animation frame)
    ContentChanged,
    /// The user clicked/tapped an element
    Click,
    /// A different window came to the foreground
    WindowChanged,
    /// A system notification was posted
    Notification,
    /// Periodic timer fired
    Timer,
}

impl SignalKind {
    /// High-priority signals bypass the debouncer entirely.
    ///
    /// Clicks and window switches are user intent; delaying them loses
    /// the click-intent ordering the reducer depends on.
    pub fn is_high_priority(&self) -> bool {
        matches!(self, SignalKind::Click | SignalKind::WindowChanged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::ContentChanged => "content_changed",
            SignalKind::Click => "click",
            SignalKind::WindowChanged => "window_changed",
            SignalKind::Notification => "notification",
            SignalKind::Timer => "timer",
        }
    }
}

/// Element position and size, in screen pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ElementBounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Get the center point of the element
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width as i32 / 2),
            self.y + (self.height as i32 / 2),
        )
    }

    /// Check if a point is inside this bounds
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }
}

/// One node of an observed UI element tree.
///
/// Immutable once produced; owned exclusively by the snapshot that
/// created it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    /// Visible text, if any
    pub text: Option<String>,
    /// Accessible description (content-description / accessibility label)
    pub description: Option<String>,
    /// Stable view identifier (resource id), if the app exposes one
    pub view_id: Option<String>,
    /// Widget class tag (e.g. "TextView", "Button")
    pub class_tag: String,
    pub clickable: bool,
    pub enabled: bool,
    pub bounds: ElementBounds,
    pub children: Vec<ElementNode>,
}

impl ElementNode {
    pub fn new(class_tag: impl Into<String>) -> Self {
        Self {
            class_tag: class_tag.into(),
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_text(class_tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(class_tag)
        }
    }

    /// Depth-first iteration over this node and all descendants
    pub fn iter(&self) -> ElementIter<'_> {
        ElementIter { stack: vec![self] }
    }

    /// Collect all non-empty text values in document order
    pub fn collect_texts(&self) -> Vec<String> {
        self.iter()
            .filter_map(|n| n.text.as_deref())
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.to_string())
            .collect()
    }

    /// Anchor check: does any node carry exactly this text?
    pub fn contains_text(&self, needle: &str) -> bool {
        self.iter()
            .any(|n| n.text.as_deref().map(str::trim) == Some(needle))
    }

    /// Find the first node whose text matches exactly (trimmed)
    pub fn find_text(&self, needle: &str) -> Option<&ElementNode> {
        self.iter()
            .find(|n| n.text.as_deref().map(str::trim) == Some(needle))
    }

    /// Find the first node with the given stable view id
    pub fn find_by_id(&self, view_id: &str) -> Option<&ElementNode> {
        self.iter().find(|n| n.view_id.as_deref() == Some(view_id))
    }

    /// Text of the node that follows `label` in document order, if any.
    ///
    /// Common layout on the observed screens: a static label TextView
    /// immediately followed by its value TextView.
    pub fn text_after(&self, label: &str) -> Option<String> {
        let texts = self.collect_texts();
        let idx = texts.iter().position(|t| t.trim() == label)?;
        texts.get(idx + 1).cloned()
    }
}

/// Depth-first element tree iterator
pub struct ElementIter<'a> {
    stack: Vec<&'a ElementNode>,
}

impl<'a> Iterator for ElementIter<'a> {
    type Item = &'a ElementNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push in reverse so children come out in document order
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// One observed instant of the monitored app's UI.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Milliseconds since an arbitrary epoch chosen by the snapshot source
    pub timestamp_ms: u64,
    /// Root of the element tree, absent when the source could not read one
    pub root: Option<ElementNode>,
    /// All visible texts, flattened in document order
    pub texts: Vec<String>,
    /// What triggered this snapshot
    pub signal: SignalKind,
    /// The element that triggered the signal, if known
    pub source: Option<ElementNode>,
}

impl Snapshot {
    /// Build a snapshot, flattening texts from the root when present.
    pub fn new(
        timestamp_ms: u64,
        root: Option<ElementNode>,
        signal: SignalKind,
        source: Option<ElementNode>,
    ) -> Self {
        let texts = root
            .as_ref()
            .map(|r| r.collect_texts())
            .unwrap_or_default();
        Self {
            timestamp_ms,
            root,
            texts,
            signal,
            source,
        }
    }

    /// Anchor check over the flattened text list (exact, trimmed)
    pub fn has_text(&self, needle: &str) -> bool {
        self.texts.iter().any(|t| t.trim() == needle)
    }

    /// Anchor check over the flattened text list (substring)
    pub fn has_text_like(&self, needle: &str) -> bool {
        self.texts.iter().any(|t| t.contains(needle))
    }
}

/// Errors raised at the observer's boundaries
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("event queue closed")]
    QueueClosed,

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("automation error: {0}")]
    Automation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
