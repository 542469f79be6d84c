use async_trait::async_trait;

use crate::document::{DocumentMetadata, DocumentVersion, OfflineDocument};
use crate::error::SyncError;

/// Storage adapter abstraction for offline documents.
///
/// One record per document ID. An adapter owns the document payload, its
/// metadata and its version record; deleting a document removes all three.
/// The sync engine talks to a local adapter and a remote adapter through
/// this same interface.
#[async_trait]
pub trait SyncAdapter: Send + Sync {
    /// Returns the adapter identifier (e.g., "memory", "local").
    fn backend_name(&self) -> &'static str;

    /// List metadata for every stored document.
    async fn list_documents(&self) -> Result<Vec<DocumentMetadata>, SyncError>;

    /// Load a full document.
    async fn get_document(&self, id: &str) -> Result<Option<OfflineDocument>, SyncError>;

    /// Load only a document's metadata.
    async fn get_document_metadata(
        &self,
        id: &str,
    ) -> Result<Option<DocumentMetadata>, SyncError>;

    /// Load only a document's version record.
    async fn get_document_version(&self, id: &str)
        -> Result<Option<DocumentVersion>, SyncError>;

    /// Insert or replace a document, persisting its version record as-is.
    async fn save_document(&self, document: &OfflineDocument) -> Result<(), SyncError>;

    /// Delete a document with its metadata and version record.
    ///
    /// Returns whether the document existed.
    async fn delete_document(&self, id: &str) -> Result<bool, SyncError>;
}
