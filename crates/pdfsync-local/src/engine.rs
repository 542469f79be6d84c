use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use pdfsync_core::{
    Conflict, ConflictResolution, OfflineDocument, SyncAdapter, SyncError, SyncPriority,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// What happened to a single document during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Neither side has the document
    Missing,
    /// Local copy was newer (or remote had none) and was written to remote
    Pushed,
    /// Remote copy was newer (or local had none) and was written to local
    Pulled,
    UpToDate,
    /// Same version, different content. Recorded as pending, nothing written.
    Conflict,
}

/// Summary of a full sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pushed: Vec<String>,
    pub pulled: Vec<String>,
    pub up_to_date: Vec<String>,
    pub conflicts: Vec<String>,
    /// (document id, error message)
    pub failed: Vec<(String, String)>,
    /// The pass stopped early because `cancel_sync` was called
    pub canceled: bool,
}

impl SyncReport {
    fn record(&mut self, id: String, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Missing => {}
            SyncOutcome::Pushed => self.pushed.push(id),
            SyncOutcome::Pulled => self.pulled.push(id),
            SyncOutcome::UpToDate => self.up_to_date.push(id),
            SyncOutcome::Conflict => self.conflicts.push(id),
        }
    }
}

/// Clears the in-progress flag on every exit path.
struct SyncGuard<'a> {
    in_progress: &'a AtomicBool,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.in_progress.store(false, Ordering::Release);
    }
}

/// Synchronizes documents between a local adapter and a remote adapter.
///
/// Versions are compared per document: the higher version number wins and is
/// copied to the other side. Equal version numbers with different checksums
/// are a conflict; conflicts are kept pending until the caller resolves or
/// dismisses them. Only one sync runs at a time per engine.
pub struct SyncEngine {
    /// Local adapter, replaceable while idle
    adapter: RwLock<Arc<dyn SyncAdapter>>,
    in_progress: AtomicBool,
    cancel_requested: AtomicBool,
    /// Pending conflicts: document_id -> Conflict
    pending_conflicts: DashMap<String, Conflict>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("in_progress", &self.in_progress)
            .field("pending_conflicts", &self.pending_conflicts)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Create a new SyncEngine over a local adapter.
    pub fn new(adapter: Arc<dyn SyncAdapter>) -> Self {
        Self {
            adapter: RwLock::new(adapter),
            in_progress: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            pending_conflicts: DashMap::new(),
        }
    }

    /// Replace the local adapter.
    ///
    /// Pending conflicts refer to the previous adapter and are dropped.
    pub async fn set_adapter(&self, adapter: Arc<dyn SyncAdapter>) -> Result<(), SyncError> {
        // Holding the sync slot keeps a pass from starting mid-swap.
        let _guard = self.begin_sync()?;
        let mut current = self.adapter.write().await;
        debug!(
            "Replacing adapter {} with {}",
            current.backend_name(),
            adapter.backend_name()
        );
        *current = adapter;
        self.pending_conflicts.clear();
        Ok(())
    }

    /// Current local adapter.
    pub async fn adapter(&self) -> Arc<dyn SyncAdapter> {
        self.adapter.read().await.clone()
    }

    pub fn is_sync_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Pending conflicts, ordered by document id.
    pub fn get_pending_conflicts(&self) -> Vec<Conflict> {
        let mut conflicts: Vec<Conflict> = self
            .pending_conflicts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        conflicts.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        conflicts
    }

    /// Ask a running sync to stop before its next document.
    ///
    /// No-op when nothing is running. Documents already applied stay applied.
    pub fn cancel_sync(&self) {
        if self.is_sync_in_progress() {
            self.cancel_requested.store(true, Ordering::Release);
            info!("Sync cancellation requested");
        } else {
            debug!("cancel_sync called with no sync running");
        }
    }

    /// Drop a pending conflict without writing anything.
    pub fn dismiss_conflict(&self, document_id: &str) -> bool {
        self.pending_conflicts.remove(document_id).is_some()
    }

    fn begin_sync(&self) -> Result<SyncGuard<'_>, SyncError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::SyncInProgress);
        }
        self.cancel_requested.store(false, Ordering::Release);
        Ok(SyncGuard {
            in_progress: &self.in_progress,
        })
    }

    /// Sync a single document with a remote adapter.
    #[instrument(skip(self, remote), level = "debug", fields(remote = remote.backend_name()))]
    pub async fn sync_document(
        &self,
        document_id: &str,
        remote: &dyn SyncAdapter,
    ) -> Result<SyncOutcome, SyncError> {
        let _guard = self.begin_sync()?;
        let local = self.adapter().await;
        self.sync_one(local.as_ref(), remote, document_id).await
    }

    /// Sync every document known to either side.
    ///
    /// Documents are processed by priority (high first), then by id.
    /// Per-document failures are recorded in the report and the pass goes on.
    #[instrument(skip(self, remote), level = "debug", fields(remote = remote.backend_name()))]
    pub async fn sync_all(&self, remote: &dyn SyncAdapter) -> Result<SyncReport, SyncError> {
        let _guard = self.begin_sync()?;
        let local = self.adapter().await;

        let (local_docs, remote_docs) =
            futures::try_join!(local.list_documents(), remote.list_documents())?;

        let mut priorities: BTreeMap<String, SyncPriority> = BTreeMap::new();
        for metadata in local_docs.into_iter().chain(remote_docs) {
            let priority = metadata.sync_priority;
            priorities
                .entry(metadata.id)
                .and_modify(|p| *p = (*p).max(priority))
                .or_insert(priority);
        }
        let mut order: Vec<(String, SyncPriority)> = priorities.into_iter().collect();
        order.sort_by(|(id_a, prio_a), (id_b, prio_b)| {
            prio_b.cmp(prio_a).then_with(|| id_a.cmp(id_b))
        });

        let mut report = SyncReport::default();
        for (id, _) in order {
            if self.cancel_requested.load(Ordering::Acquire) {
                info!("Sync canceled before document {}", id);
                report.canceled = true;
                break;
            }

            match self.sync_one(local.as_ref(), remote, &id).await {
                Ok(outcome) => report.record(id, outcome),
                Err(e) => {
                    warn!("Failed to sync document {}: {}", id, e);
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        info!(
            "Sync finished: {} pushed, {} pulled, {} up to date, {} conflicts, {} failed{}",
            report.pushed.len(),
            report.pulled.len(),
            report.up_to_date.len(),
            report.conflicts.len(),
            report.failed.len(),
            if report.canceled { " (canceled)" } else { "" }
        );
        Ok(report)
    }

    /// Resolve a pending conflict by keeping one side's copy.
    ///
    /// The kept copy is restamped past both sides' version numbers and
    /// written to both adapters.
    #[instrument(skip(self, remote), level = "debug", fields(remote = remote.backend_name()))]
    pub async fn resolve_conflict(
        &self,
        document_id: &str,
        resolution: ConflictResolution,
        remote: &dyn SyncAdapter,
    ) -> Result<OfflineDocument, SyncError> {
        let _guard = self.begin_sync()?;
        let conflict = self
            .pending_conflicts
            .get(document_id)
            .map(|c| c.clone())
            .ok_or_else(|| {
                SyncError::NotFound(format!("No pending conflict for document {}", document_id))
            })?;
        let local = self.adapter().await;

        let (winner, side): (&dyn SyncAdapter, &str) = match resolution {
            ConflictResolution::KeepLocal => (local.as_ref(), "local"),
            ConflictResolution::KeepRemote => (remote, "remote"),
        };
        let mut document = winner.get_document(document_id).await?.ok_or_else(|| {
            SyncError::NotFound(format!("Document {} not found on {} side", document_id, side))
        })?;

        let (local_version, remote_version) = futures::try_join!(
            local.get_document_version(document_id),
            remote.get_document_version(document_id)
        )?;
        let highest = [local_version, remote_version]
            .into_iter()
            .flatten()
            .map(|v| v.version)
            .fold(conflict.shared_version(), u64::max);

        document.restamp(highest + 1, format!("resolved conflict: kept {} copy", side));
        document.mark_synced(chrono::Utc::now());
        futures::try_join!(local.save_document(&document), remote.save_document(&document))?;
        self.pending_conflicts.remove(document_id);

        info!(
            "Resolved conflict for {} by keeping {} copy as v{}",
            document_id, side, document.version.version
        );
        Ok(document)
    }

    async fn sync_one(
        &self,
        local: &dyn SyncAdapter,
        remote: &dyn SyncAdapter,
        document_id: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let (local_version, remote_version) = futures::try_join!(
            local.get_document_version(document_id),
            remote.get_document_version(document_id)
        )?;

        let outcome = match (local_version, remote_version) {
            (None, None) => SyncOutcome::Missing,
            (Some(_), None) => {
                Self::copy_document(local, remote, document_id).await?;
                SyncOutcome::Pushed
            }
            (None, Some(_)) => {
                Self::copy_document(remote, local, document_id).await?;
                SyncOutcome::Pulled
            }
            (Some(l), Some(r)) if l.is_same_as(&r) => SyncOutcome::UpToDate,
            (Some(l), Some(r)) if l.version == r.version => {
                let filename = local
                    .get_document_metadata(document_id)
                    .await?
                    .map(|m| m.filename)
                    .unwrap_or_default();
                if let Some(conflict) = Conflict::detect(document_id, filename, &l, &r) {
                    let already_pending = self
                        .pending_conflicts
                        .get(document_id)
                        .is_some_and(|c| c.local == l && c.remote == r);
                    if !already_pending {
                        warn!(
                            "Conflict on document {} at v{}: local {} vs remote {}",
                            document_id, l.version, l.checksum, r.checksum
                        );
                        self.pending_conflicts.insert(document_id.to_string(), conflict);
                    }
                }
                return Ok(SyncOutcome::Conflict);
            }
            (Some(l), Some(r)) if l.version > r.version => {
                Self::copy_document(local, remote, document_id).await?;
                SyncOutcome::Pushed
            }
            (Some(_), Some(_)) => {
                Self::copy_document(remote, local, document_id).await?;
                SyncOutcome::Pulled
            }
        };

        if self.pending_conflicts.remove(document_id).is_some() {
            debug!("Cleared stale conflict for document {}", document_id);
        }
        debug!("Document {}: {:?}", document_id, outcome);
        Ok(outcome)
    }

    /// Copy a document from one adapter to another, stamping both copies as synced.
    async fn copy_document(
        from: &dyn SyncAdapter,
        to: &dyn SyncAdapter,
        document_id: &str,
    ) -> Result<(), SyncError> {
        let mut document = from.get_document(document_id).await?.ok_or_else(|| {
            SyncError::NotFound(format!(
                "Document {} disappeared from {} during sync",
                document_id,
                from.backend_name()
            ))
        })?;

        document.mark_synced(chrono::Utc::now());
        to.save_document(&document).await?;
        from.save_document(&document).await?;

        debug!(
            "Copied document {} v{} from {} to {}",
            document_id,
            document.version.version,
            from.backend_name(),
            to.backend_name()
        );
        Ok(())
    }
}
