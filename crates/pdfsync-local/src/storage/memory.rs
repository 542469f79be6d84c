use async_trait::async_trait;
use dashmap::DashMap;
use pdfsync_core::{DocumentMetadata, DocumentVersion, OfflineDocument, SyncAdapter, SyncError};
use tracing::{debug, instrument};

/// In-memory storage adapter.
///
/// Holds each document as a single record, so delete is trivially a cascade
/// over document, metadata and version. Never fails.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    documents: DashMap<String, OfflineDocument>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl SyncAdapter for MemoryAdapter {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list_documents(&self) -> Result<Vec<DocumentMetadata>, SyncError> {
        let mut documents: Vec<DocumentMetadata> = self
            .documents
            .iter()
            .map(|entry| entry.value().metadata.clone())
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    async fn get_document(&self, id: &str) -> Result<Option<OfflineDocument>, SyncError> {
        Ok(self.documents.get(id).map(|doc| doc.clone()))
    }

    async fn get_document_metadata(
        &self,
        id: &str,
    ) -> Result<Option<DocumentMetadata>, SyncError> {
        Ok(self.documents.get(id).map(|doc| doc.metadata.clone()))
    }

    async fn get_document_version(
        &self,
        id: &str,
    ) -> Result<Option<DocumentVersion>, SyncError> {
        Ok(self.documents.get(id).map(|doc| doc.version.clone()))
    }

    #[instrument(skip(self, document), level = "debug", fields(id = %document.id))]
    async fn save_document(&self, document: &OfflineDocument) -> Result<(), SyncError> {
        self.documents.insert(document.id.clone(), document.clone());
        debug!("Saved document {} v{}", document.id, document.version.version);
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_document(&self, id: &str) -> Result<bool, SyncError> {
        Ok(self.documents.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let adapter = MemoryAdapter::new();
        let doc = OfflineDocument::new("test-doc-1", "test.pdf", b"%PDF-1.4".to_vec());

        adapter.save_document(&doc).await.unwrap();

        let loaded = adapter.get_document("test-doc-1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "test-doc-1");
        assert_eq!(loaded.metadata.filename, "test.pdf");
        assert_eq!(adapter.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let adapter = MemoryAdapter::new();
        let doc = OfflineDocument::new("test-doc-1", "test.pdf", b"%PDF-1.4".to_vec());
        adapter.save_document(&doc).await.unwrap();

        assert!(adapter.delete_document("test-doc-1").await.unwrap());

        assert!(adapter.get_document("test-doc-1").await.unwrap().is_none());
        assert!(adapter.get_document_metadata("test-doc-1").await.unwrap().is_none());
        assert!(adapter.get_document_version("test-doc-1").await.unwrap().is_none());
        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn test_list_documents() {
        let adapter = MemoryAdapter::new();
        assert!(adapter.list_documents().await.unwrap().is_empty());

        for id in ["b", "a"] {
            adapter
                .save_document(&OfflineDocument::new(id, "x.pdf", vec![]))
                .await
                .unwrap();
        }
        let ids: Vec<_> = adapter
            .list_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
