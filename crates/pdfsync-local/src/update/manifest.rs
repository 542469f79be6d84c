use std::path::{Path, PathBuf};

use pdfsync_core::{FileManifest, ManifestEntry, SyncError, VerificationReport};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Build a manifest of every regular file under `root`.
///
/// Symlinks are not followed. Paths are relative to `root` and use `/`.
#[instrument(level = "debug")]
pub async fn build_manifest(root: &Path, version: &str) -> Result<FileManifest, SyncError> {
    let root_meta = match fs::metadata(root).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SyncError::NotFound(format!(
                "Installation directory {} does not exist",
                root.display()
            )));
        }
        Err(e) => {
            return Err(SyncError::Io(format!(
                "Failed to stat {}: {}",
                root.display(),
                e
            )));
        }
    };
    if !root_meta.is_dir() {
        return Err(SyncError::InvalidArgument(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut files = Vec::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            SyncError::Io(format!("Failed to read dir {}: {}", dir.display(), e))
        })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::Io(format!("Failed to read dir entry: {}", e)))?
        {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| {
                SyncError::Io(format!("Failed to get file type of {}: {}", path.display(), e))
            })?;

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let (hash, size) = hash_file(&path).await?;
                files.push(ManifestEntry {
                    path: relative_path(root, &path)?,
                    hash,
                    size,
                });
            } else {
                debug!("Skipping non-regular file {}", path.display());
            }
        }
    }

    debug!("Built manifest for {} with {} files", version, files.len());
    Ok(FileManifest::new(version, files))
}

/// Stream a file through SHA-256. Returns (hex hash, size in bytes).
pub async fn hash_file(path: &Path) -> Result<(String, u64), SyncError> {
    let mut file = fs::File::open(path).await.map_err(|e| {
        SyncError::Io(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    let mut size = 0u64;
    loop {
        let read = file.read(&mut buffer).await.map_err(|e| {
            SyncError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }

    Ok((hex::encode(hasher.finalize()), size))
}

/// Check an installation tree against an expected manifest.
pub async fn verify_installation(
    root: &Path,
    expected: &FileManifest,
) -> Result<VerificationReport, SyncError> {
    let actual = build_manifest(root, &expected.version).await?;
    Ok(expected.verify_against(&actual))
}

/// Read a manifest from a JSON file.
pub async fn read_manifest(path: &Path) -> Result<FileManifest, SyncError> {
    let json = fs::read_to_string(path).await.map_err(|e| {
        SyncError::Io(format!("Failed to read manifest {}: {}", path.display(), e))
    })?;
    FileManifest::from_json(&json)
}

/// Write a manifest to a JSON file.
pub async fn write_manifest(path: &Path, manifest: &FileManifest) -> Result<(), SyncError> {
    let json = manifest.to_json()?;
    fs::write(path, json).await.map_err(|e| {
        SyncError::Io(format!("Failed to write manifest {}: {}", path.display(), e))
    })
}

fn relative_path(root: &Path, path: &Path) -> Result<String, SyncError> {
    let relative = path.strip_prefix(root).map_err(|_| {
        SyncError::Internal(format!(
            "{} is not inside {}",
            path.display(),
            root.display()
        ))
    })?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfsync_core::{checksum, compute_update};
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_build_manifest_walks_recursively() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app.asar", b"application");
        write(temp.path(), "resources/locales/en.pak", b"english");
        write(temp.path(), "resources/icon.png", b"png");

        let manifest = build_manifest(temp.path(), "1.0.0").await.unwrap();

        let paths: Vec<_> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["app.asar", "resources/icon.png", "resources/locales/en.pak"]
        );
        let app = manifest.get("app.asar").unwrap();
        assert_eq!(app.size, 11);
        assert_eq!(app.hash, checksum(b"application"));
        assert_eq!(manifest.version, "1.0.0");
    }

    #[tokio::test]
    async fn test_hash_file_large_content() {
        let temp = TempDir::new().unwrap();
        let content = vec![7u8; HASH_BUFFER_SIZE * 3 + 17];
        write(temp.path(), "big.bin", &content);

        let (hash, size) = hash_file(&temp.path().join("big.bin")).await.unwrap();
        assert_eq!(size, content.len() as u64);
        assert_eq!(hash, checksum(&content));
    }

    #[tokio::test]
    async fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = build_manifest(&temp.path().join("nope"), "1").await;
        assert!(matches!(result, Err(SyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_diff_between_two_trees() {
        let old = TempDir::new().unwrap();
        let new = TempDir::new().unwrap();
        write(old.path(), "same.txt", b"same");
        write(old.path(), "changed.txt", b"old");
        write(old.path(), "gone.txt", b"bye");
        write(new.path(), "same.txt", b"same");
        write(new.path(), "changed.txt", b"new content");
        write(new.path(), "sub/added.txt", b"hello");

        let from = build_manifest(old.path(), "1.0.0").await.unwrap();
        let to = build_manifest(new.path(), "1.1.0").await.unwrap();
        let update = compute_update(&from, &to);

        assert_eq!(update.files.added.len(), 1);
        assert_eq!(update.files.added[0].path, "sub/added.txt");
        assert_eq!(update.files.modified.len(), 1);
        assert_eq!(update.files.modified[0].path, "changed.txt");
        assert_eq!(update.files.removed, vec!["gone.txt".to_string()]);
        assert_eq!(update.total_size, 4 + 11 + 5);
        assert_eq!(update.delta_size, 11 + 5);
    }

    #[tokio::test]
    async fn test_verify_and_manifest_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        write(&install, "a.txt", b"a");
        write(&install, "b.txt", b"b");

        let manifest = build_manifest(&install, "2.0.0").await.unwrap();
        let manifest_path = temp.path().join("manifest.json");
        write_manifest(&manifest_path, &manifest).await.unwrap();
        let loaded = read_manifest(&manifest_path).await.unwrap();
        assert_eq!(loaded, manifest);

        assert!(verify_installation(&install, &loaded).await.unwrap().is_valid());

        std::fs::write(install.join("a.txt"), b"tampered").unwrap();
        std::fs::remove_file(install.join("b.txt")).unwrap();
        let report = verify_installation(&install, &loaded).await.unwrap();
        assert_eq!(report.mismatched, vec!["a.txt".to_string()]);
        assert_eq!(report.missing, vec!["b.txt".to_string()]);
    }
}
