//! Snapshot fingerprinting for redundant-signal suppression.
//!
//! A fingerprint combines three components: a hash of all extracted text,
//! a hash of the tree shape with text ignored, and the identity of the
//! sub-node that triggered the signal. Two snapshots with equal
//! fingerprints carry no new information for the classifier.

use crate::types::{ElementNode, Snapshot};
use sha2::{Digest, Sha256};

/// Content+structure fingerprint of one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFingerprint {
    /// SHA-256 over the flattened text list
    pub text_hash: String,
    /// SHA-256 over the tree shape (class tags + child counts, no text)
    pub shape_hash: String,
    /// Stable id (or text hint) of the triggering sub-node
    pub source_id: Option<String>,
}

impl SnapshotFingerprint {
    /// Compute the fingerprint for a snapshot.
    pub fn of(snapshot: &Snapshot) -> Self {
        let text_hash = hash_texts(&snapshot.texts);
        let shape_hash = snapshot
            .root
            .as_ref()
            .map(hash_shape)
            .unwrap_or_else(|| hash_texts::<&str>(&[]));
        let source_id = snapshot.source.as_ref().and_then(source_identity);

        Self {
            text_hash,
            shape_hash,
            source_id,
        }
    }
}

/// Hash the flattened text list.
///
/// Texts are length-prefixed before hashing so that ["ab","c"] and
/// ["a","bc"] do not collide.
fn hash_texts<S: AsRef<str>>(texts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for text in texts {
        let t = text.as_ref();
        hasher.update((t.len() as u64).to_le_bytes());
        hasher.update(t.as_bytes());
    }
    to_hex(&hasher.finalize())
}

/// Hash the tree shape, ignoring all text content.
fn hash_shape(root: &ElementNode) -> String {
    let mut hasher = Sha256::new();
    hash_shape_into(root, &mut hasher);
    to_hex(&hasher.finalize())
}

fn hash_shape_into(node: &ElementNode, hasher: &mut Sha256) {
    hasher.update(node.class_tag.as_bytes());
    hasher.update([node.clickable as u8, node.enabled as u8]);
    hasher.update((node.children.len() as u32).to_le_bytes());
    for child in &node.children {
        hash_shape_into(child, hasher);
    }
}

/// Identity of the triggering sub-node: stable id first, text fallback
fn source_identity(node: &ElementNode) -> Option<String> {
    node.view_id
        .clone()
        .or_else(|| node.text.as_ref().map(|t| format!("text:{t}")))
}

/// Compute a short content hash (12 hex chars) for dedup keys.
///
/// Used for offer identity: two offer screens with the same short hash
/// are the same offer being re-rendered.
pub fn short_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = hasher.finalize();
    format!(
        "{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        hash[0], hash[1], hash[2], hash[3], hash[4], hash[5]
    )
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
