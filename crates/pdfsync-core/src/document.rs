use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::pdf;

/// Compute the lowercase hex SHA-256 checksum of document bytes.
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Checksum of a document version: the payload plus its annotations.
///
/// Without annotations this equals [`checksum`] of the payload, so a freshly
/// imported document's version and file checksums match.
pub fn version_checksum(data: &[u8], annotations: &[Annotation]) -> String {
    if annotations.is_empty() {
        return checksum(data);
    }
    let mut hasher = Sha256::new();
    hash_field(&mut hasher, data);
    hasher.update((annotations.len() as u64).to_le_bytes());
    for annotation in annotations {
        hash_field(&mut hasher, annotation.id.as_bytes());
        hasher.update(annotation.page.to_le_bytes());
        hash_field(&mut hasher, format!("{:?}", annotation.kind).as_bytes());
        hash_field(&mut hasher, annotation.content.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Length-prefixed so adjacent fields cannot shift bytes between each other.
fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Sync ordering hint. Higher priority documents are synced first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Metadata about a document stored in an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub page_count: u32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// When the document was last copied to or from a peer
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    pub checksum: String,
    #[serde(default = "default_available_offline")]
    pub available_offline: bool,
    #[serde(default)]
    pub sync_priority: SyncPriority,
}

fn default_available_offline() -> bool {
    true
}

/// A version record for a document.
///
/// `version` is monotonic per document and starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub version: u64,
    pub modified_at: DateTime<Utc>,
    pub checksum: String,
    /// Human readable change descriptions for this version
    #[serde(default)]
    pub changes: Vec<String>,
}

impl DocumentVersion {
    /// Two versions conflict when they claim the same version number but
    /// carry different content.
    pub fn conflicts_with(&self, other: &DocumentVersion) -> bool {
        self.version == other.version && self.checksum != other.checksum
    }

    /// Same version number and same content.
    pub fn is_same_as(&self, other: &DocumentVersion) -> bool {
        self.version == other.version && self.checksum == other.checksum
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Highlight,
    Note,
    Ink,
    Signature,
    Redaction,
}

/// An annotation attached to a page of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    /// 1-indexed page number
    pub page: u32,
    pub kind: AnnotationKind,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One entry in a document's edit history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditHistoryEntry {
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// A document available for offline editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineDocument {
    pub id: String,
    pub metadata: DocumentMetadata,
    pub version: DocumentVersion,
    /// Raw PDF bytes
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub history: Vec<EditHistoryEntry>,
}

impl OfflineDocument {
    /// Create a document at version 1 from raw bytes.
    pub fn new(id: impl Into<String>, filename: impl Into<String>, data: Vec<u8>) -> Self {
        let id = id.into();
        let now = Utc::now();
        let checksum = checksum(&data);

        Self {
            metadata: DocumentMetadata {
                id: id.clone(),
                filename: filename.into(),
                size_bytes: data.len() as u64,
                page_count: pdf::count_pages(&data),
                created_at: now,
                modified_at: now,
                synced_at: None,
                checksum: checksum.clone(),
                available_offline: true,
                sync_priority: SyncPriority::default(),
            },
            version: DocumentVersion {
                version: 1,
                modified_at: now,
                checksum,
                changes: vec!["created".to_string()],
            },
            history: vec![EditHistoryEntry {
                version: 1,
                timestamp: now,
                description: "created".to_string(),
            }],
            annotations: Vec::new(),
            id,
            data,
        }
    }

    pub fn with_priority(mut self, priority: SyncPriority) -> Self {
        self.metadata.sync_priority = priority;
        self
    }

    /// Replace the payload and move to the next version.
    pub fn apply_edit(&mut self, data: Vec<u8>, changes: Vec<String>) {
        self.metadata.size_bytes = data.len() as u64;
        self.metadata.page_count = pdf::count_pages(&data);
        self.data = data;
        self.bump_version(changes);
    }

    /// Add an annotation. Annotations are part of the edit history, so this
    /// creates a new version.
    pub fn add_annotation(&mut self, annotation: Annotation) {
        let change = format!(
            "added {:?} annotation {} on page {}",
            annotation.kind, annotation.id, annotation.page
        );
        self.annotations.push(annotation);
        self.bump_version(vec![change]);
    }

    /// Remove an annotation by ID. Returns false (and keeps the version) if absent.
    pub fn remove_annotation(&mut self, annotation_id: &str) -> bool {
        let Some(pos) = self.annotations.iter().position(|a| a.id == annotation_id) else {
            return false;
        };
        self.annotations.remove(pos);
        self.bump_version(vec![format!("removed annotation {}", annotation_id)]);
        true
    }

    /// Record that the document was exchanged with a peer.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.metadata.synced_at = Some(at);
    }

    /// Restamp this document as a specific version (used when a conflict is
    /// resolved and both sides must converge past their shared number).
    pub fn restamp(&mut self, version: u64, description: impl Into<String>) {
        let now = Utc::now();
        let description = description.into();
        self.version.version = version;
        self.version.modified_at = now;
        self.version.changes = vec![description.clone()];
        self.metadata.modified_at = now;
        self.history.push(EditHistoryEntry {
            version,
            timestamp: now,
            description,
        });
    }

    fn bump_version(&mut self, changes: Vec<String>) {
        let now = Utc::now();
        let next = self.version.version + 1;

        self.metadata.modified_at = now;
        self.metadata.checksum = checksum(&self.data);
        self.history.push(EditHistoryEntry {
            version: next,
            timestamp: now,
            description: changes.join("; "),
        });
        self.version = DocumentVersion {
            version: next,
            modified_at: now,
            checksum: version_checksum(&self.data, &self.annotations),
            changes,
        };
    }
}
