use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pdfsync_core::{
    checksum, Annotation, DocumentMetadata, DocumentVersion, EditHistoryEntry, OfflineDocument,
    SyncAdapter, SyncError,
};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, instrument, warn};

const META_SUFFIX: &str = ".meta.json";
const PAYLOAD_SUFFIX: &str = ".pdf";

/// Everything about a document except its payload bytes.
///
/// `payload_checksum` names the payload file the record points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentRecord {
    metadata: DocumentMetadata,
    version: DocumentVersion,
    #[serde(default)]
    annotations: Vec<Annotation>,
    #[serde(default)]
    history: Vec<EditHistoryEntry>,
    payload_checksum: String,
}

/// Local filesystem storage adapter.
///
/// Organizes data as:
/// ```text
/// {base_dir}/
///   documents/
///     {id}.meta.json
///     {id}.{payload_sha256}.pdf
/// ```
///
/// Payloads are written under their checksum first, then the record is
/// renamed into place. That rename is the commit point: a failed save leaves
/// the previous record and its payload untouched.
#[derive(Debug, Clone)]
pub struct LocalAdapter {
    base_dir: PathBuf,
}

impl LocalAdapter {
    /// Create a new LocalAdapter with the given base directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn documents_dir(&self) -> PathBuf {
        self.base_dir.join("documents")
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.documents_dir().join(format!("{}{}", id, META_SUFFIX))
    }

    fn payload_path(&self, id: &str, payload_checksum: &str) -> PathBuf {
        self.documents_dir()
            .join(format!("{}.{}{}", id, payload_checksum, PAYLOAD_SUFFIX))
    }

    /// Reject IDs that would escape the documents directory.
    fn validate_id(id: &str) -> Result<(), SyncError> {
        if id.is_empty()
            || id == "."
            || id.contains("..")
            || id.contains('/')
            || id.contains('\\')
        {
            return Err(SyncError::InvalidArgument(format!(
                "Invalid document id: {:?}",
                id
            )));
        }
        Ok(())
    }

    async fn ensure_documents_dir(&self) -> Result<(), SyncError> {
        let dir = self.documents_dir();
        fs::create_dir_all(&dir).await.map_err(|e| {
            SyncError::Io(format!("Failed to create documents dir {}: {}", dir.display(), e))
        })?;
        Ok(())
    }

    /// Write atomically via temp file. The temp file is removed on failure.
    async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), SyncError> {
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        if let Err(e) = fs::write(&temp_path, data).await {
            Self::remove_if_exists(&temp_path).await;
            return Err(SyncError::Io(format!(
                "Failed to write {}: {}",
                temp_path.display(),
                e
            )));
        }
        if let Err(e) = fs::rename(&temp_path, path).await {
            Self::remove_if_exists(&temp_path).await;
            return Err(SyncError::Io(format!(
                "Failed to rename to {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }

    /// Read a file, mapping "not found" to `None`.
    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, SyncError> {
        match fs::read(path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        path: &Path,
    ) -> Result<Option<T>, SyncError> {
        let Some(bytes) = Self::read_optional(path).await? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| {
            SyncError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(value))
    }

    async fn read_record(&self, id: &str) -> Result<Option<DocumentRecord>, SyncError> {
        Self::read_json(&self.record_path(id)).await
    }

    /// Best-effort removal for files that no record points at.
    async fn remove_if_exists(path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to delete {}: {}", path.display(), e);
            }
        }
    }
}

#[async_trait]
impl SyncAdapter for LocalAdapter {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_documents(&self) -> Result<Vec<DocumentMetadata>, SyncError> {
        let dir = self.documents_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut documents = Vec::new();
        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            SyncError::Io(format!("Failed to read dir {}: {}", dir.display(), e))
        })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::Io(format!("Failed to read dir entry: {}", e)))?
        {
            let path = entry.path();
            let is_record = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().ends_with(META_SUFFIX));
            if !is_record {
                continue;
            }

            match Self::read_json::<DocumentRecord>(&path).await {
                Ok(Some(record)) => documents.push(record.metadata),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("Listed {} documents", documents.len());
        Ok(documents)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_document(&self, id: &str) -> Result<Option<OfflineDocument>, SyncError> {
        Self::validate_id(id)?;

        let Some(record) = self.read_record(id).await? else {
            return Ok(None);
        };

        let data = Self::read_optional(&self.payload_path(id, &record.payload_checksum))
            .await?
            .ok_or_else(|| SyncError::Storage(format!("Document {} has no payload", id)))?;
        if checksum(&data) != record.payload_checksum {
            return Err(SyncError::Storage(format!(
                "Payload of document {} does not match its checksum",
                id
            )));
        }

        debug!("Loaded document {} ({} bytes)", id, data.len());
        Ok(Some(OfflineDocument {
            id: id.to_string(),
            metadata: record.metadata,
            version: record.version,
            data,
            annotations: record.annotations,
            history: record.history,
        }))
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_document_metadata(
        &self,
        id: &str,
    ) -> Result<Option<DocumentMetadata>, SyncError> {
        Self::validate_id(id)?;
        Ok(self.read_record(id).await?.map(|r| r.metadata))
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_document_version(
        &self,
        id: &str,
    ) -> Result<Option<DocumentVersion>, SyncError> {
        Self::validate_id(id)?;
        Ok(self.read_record(id).await?.map(|r| r.version))
    }

    #[instrument(
        skip(self, document),
        level = "debug",
        fields(id = %document.id, data_len = document.data.len())
    )]
    async fn save_document(&self, document: &OfflineDocument) -> Result<(), SyncError> {
        let id = document.id.as_str();
        Self::validate_id(id)?;
        if document.metadata.id != document.id {
            return Err(SyncError::InvalidArgument(format!(
                "Metadata id {} does not match document id {}",
                document.metadata.id, document.id
            )));
        }
        self.ensure_documents_dir().await?;

        let previous_payload = match self.read_record(id).await {
            Ok(record) => record.map(|r| r.payload_checksum),
            Err(e) => {
                warn!("Overwriting unreadable record for {}: {}", id, e);
                None
            }
        };

        let record = DocumentRecord {
            metadata: document.metadata.clone(),
            version: document.version.clone(),
            annotations: document.annotations.clone(),
            history: document.history.clone(),
            payload_checksum: checksum(&document.data),
        };
        let record_json = serde_json::to_vec_pretty(&record).map_err(|e| {
            SyncError::Serialization(format!("Failed to serialize document record: {}", e))
        })?;

        let payload_path = self.payload_path(id, &record.payload_checksum);
        let payload_is_new = previous_payload.as_deref() != Some(record.payload_checksum.as_str());
        Self::write_atomic(&payload_path, &document.data).await?;

        if let Err(e) = Self::write_atomic(&self.record_path(id), &record_json).await {
            if payload_is_new {
                Self::remove_if_exists(&payload_path).await;
            }
            return Err(e);
        }

        if let Some(previous) = previous_payload.filter(|_| payload_is_new) {
            Self::remove_if_exists(&self.payload_path(id, &previous)).await;
        }

        debug!(
            "Saved document {} v{} ({} bytes)",
            id,
            document.version.version,
            document.data.len()
        );
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_document(&self, id: &str) -> Result<bool, SyncError> {
        Self::validate_id(id)?;

        let record_path = self.record_path(id);
        let payload_checksum = match self.read_record(id).await {
            Ok(record) => record.map(|r| r.payload_checksum),
            Err(e) => {
                warn!("Deleting unreadable record for {}: {}", id, e);
                None
            }
        };

        // The record defines existence, so failing to remove it is an error.
        let existed = match fs::remove_file(&record_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(SyncError::Io(format!(
                    "Failed to delete {}: {}",
                    record_path.display(),
                    e
                )))
            }
        };
        if let Some(payload_checksum) = payload_checksum {
            Self::remove_if_exists(&self.payload_path(id, &payload_checksum)).await;
        }

        debug!("Deleted document {} (existed: {})", id, existed);
        Ok(existed)
    }
}
