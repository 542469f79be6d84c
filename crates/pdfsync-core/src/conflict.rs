use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentVersion;

/// Two diverging versions of the same document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub document_id: String,
    pub filename: String,
    pub local: DocumentVersion,
    pub remote: DocumentVersion,
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Build a conflict if the two versions diverge, `None` otherwise.
    pub fn detect(
        document_id: impl Into<String>,
        filename: impl Into<String>,
        local: &DocumentVersion,
        remote: &DocumentVersion,
    ) -> Option<Self> {
        if !local.conflicts_with(remote) {
            return None;
        }
        Some(Self {
            document_id: document_id.into(),
            filename: filename.into(),
            local: local.clone(),
            remote: remote.clone(),
            detected_at: Utc::now(),
        })
    }

    /// The version number both sides must move past once resolved.
    pub fn shared_version(&self) -> u64 {
        self.local.version.max(self.remote.version)
    }
}

/// Which side wins when the caller resolves a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    KeepLocal,
    KeepRemote,
}
