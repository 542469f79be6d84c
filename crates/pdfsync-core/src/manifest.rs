//! Installation manifests and the differential update plan derived from two
//! of them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// One file of an installation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the installation root, `/`-separated
    pub path: String,
    /// Lowercase hex SHA-256 of the file content
    pub hash: String,
    pub size: u64,
}

/// Hash manifest for every file of an installed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifest {
    pub version: String,
    pub created_at: DateTime<Utc>,
    /// Entries sorted by path
    #[serde(default)]
    pub files: Vec<ManifestEntry>,
}

impl FileManifest {
    /// Create a manifest, sorting entries by path.
    pub fn new(version: impl Into<String>, mut files: Vec<ManifestEntry>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            version: version.into(),
            created_at: Utc::now(),
            files,
        }
    }

    /// Get an entry by relative path.
    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.files
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    /// Full download size of this version.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string_pretty(self).map_err(|e| {
            SyncError::Serialization(format!("Failed to serialize manifest: {}", e))
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        let mut manifest: FileManifest = serde_json::from_str(json).map_err(|e| {
            SyncError::Serialization(format!("Failed to parse manifest: {}", e))
        })?;
        manifest.files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(manifest)
    }

    /// Compare an expected manifest (self) with one built from a real tree.
    pub fn verify_against(&self, actual: &FileManifest) -> VerificationReport {
        let actual_by_path: BTreeMap<&str, &ManifestEntry> =
            actual.files.iter().map(|e| (e.path.as_str(), e)).collect();

        let mut report = VerificationReport::default();
        for expected in &self.files {
            match actual_by_path.get(expected.path.as_str()) {
                None => report.missing.push(expected.path.clone()),
                Some(found) if found.hash != expected.hash || found.size != expected.size => {
                    report.mismatched.push(expected.path.clone());
                }
                Some(_) => {}
            }
        }
        for found in &actual.files {
            if self.get(&found.path).is_none() {
                report.unexpected.push(found.path.clone());
            }
        }
        report
    }
}

/// Result of checking an installation tree against a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// In the manifest, absent on disk
    pub missing: Vec<String>,
    /// Present with a different hash or size
    pub mismatched: Vec<String>,
    /// On disk, absent from the manifest
    pub unexpected: Vec<String>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}

/// Files to transfer or delete to move from one version to another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFiles {
    pub added: Vec<ManifestEntry>,
    pub modified: Vec<ManifestEntry>,
    pub removed: Vec<String>,
}

/// Differential update plan between two installed versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManifest {
    pub from_version: String,
    pub to_version: String,
    pub files: UpdateFiles,
    /// Bytes for a full download of the target version
    pub total_size: u64,
    /// Bytes for the added and modified files only
    pub delta_size: u64,
}

impl UpdateManifest {
    /// True when both versions have identical trees.
    pub fn is_empty(&self) -> bool {
        self.files.added.is_empty()
            && self.files.modified.is_empty()
            && self.files.removed.is_empty()
    }

    /// Bytes saved by downloading the delta instead of the full version.
    pub fn savings(&self) -> u64 {
        self.total_size.saturating_sub(self.delta_size)
    }

    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string_pretty(self).map_err(|e| {
            SyncError::Serialization(format!("Failed to serialize update manifest: {}", e))
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        serde_json::from_str(json).map_err(|e| {
            SyncError::Serialization(format!("Failed to parse update manifest: {}", e))
        })
    }
}

/// Classify every file of `from` and `to` as added, modified or removed.
pub fn compute_update(from: &FileManifest, to: &FileManifest) -> UpdateManifest {
    let mut files = UpdateFiles::default();

    for target in &to.files {
        match from.get(&target.path) {
            None => files.added.push(target.clone()),
            Some(current) if current.hash != target.hash => files.modified.push(target.clone()),
            Some(_) => {}
        }
    }
    for current in &from.files {
        if to.get(&current.path).is_none() {
            files.removed.push(current.path.clone());
        }
    }

    let delta_size: u64 = files
        .added
        .iter()
        .chain(files.modified.iter())
        .map(|f| f.size)
        .sum();

    UpdateManifest {
        from_version: from.version.clone(),
        to_version: to.version.clone(),
        total_size: to.total_size(),
        delta_size,
        files,
    }
}

/// Result of applying an update plan.
///
/// Patch application is not implemented, so the only outcome is a refusal
/// that callers can tell apart from an I/O failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    NotSupported { reason: String },
}
