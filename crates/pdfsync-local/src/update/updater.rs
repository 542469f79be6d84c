use std::path::{Path, PathBuf};

use pdfsync_core::{
    compute_update, ApplyOutcome, FileManifest, SyncError, UpdateManifest, VerificationReport,
};
use tracing::{info, instrument, warn};

use super::manifest::{build_manifest, verify_installation};

/// Differential updater for one installation directory.
#[derive(Debug, Clone)]
pub struct DifferentialUpdater {
    install_dir: PathBuf,
}

impl DifferentialUpdater {
    pub fn new(install_dir: impl AsRef<Path>) -> Self {
        Self {
            install_dir: install_dir.as_ref().to_path_buf(),
        }
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Hash the current installation as `version`.
    pub async fn current_manifest(&self, version: &str) -> Result<FileManifest, SyncError> {
        build_manifest(&self.install_dir, version).await
    }

    /// Plan the update from the current installation to a target manifest.
    #[instrument(skip(self, target), level = "debug", fields(to = %target.version))]
    pub async fn plan_update(
        &self,
        current_version: &str,
        target: &FileManifest,
    ) -> Result<UpdateManifest, SyncError> {
        let current = self.current_manifest(current_version).await?;
        let update = compute_update(&current, target);
        info!(
            "Update {} -> {}: {} added, {} modified, {} removed, delta {} of {} bytes",
            update.from_version,
            update.to_version,
            update.files.added.len(),
            update.files.modified.len(),
            update.files.removed.len(),
            update.delta_size,
            update.total_size
        );
        Ok(update)
    }

    pub async fn verify(&self, expected: &FileManifest) -> Result<VerificationReport, SyncError> {
        verify_installation(&self.install_dir, expected).await
    }

    /// Apply a differential update to the installation.
    ///
    /// Patch download and application are not implemented. This always
    /// reports `NotSupported` so callers can fall back to a full download;
    /// an `Err` is reserved for real failures.
    #[instrument(
        skip(self, update),
        level = "debug",
        fields(from = %update.from_version, to = %update.to_version)
    )]
    pub async fn apply_delta(&self, update: &UpdateManifest) -> Result<ApplyOutcome, SyncError> {
        warn!(
            "Delta application requested for {} -> {} but is not supported",
            update.from_version, update.to_version
        );
        Ok(ApplyOutcome::NotSupported {
            reason: "differential patch application is not implemented; perform a full download"
                .to_string(),
        })
    }
}
