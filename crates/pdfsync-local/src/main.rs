use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pdfsync_core::{compute_update, ApplyOutcome, OfflineDocument, SyncAdapter, UpdateManifest};
use pdfsync_local::config::{Command, Config, Keep, Priority};
use pdfsync_local::update::{build_manifest, read_manifest, verify_installation, write_manifest};
use pdfsync_local::{DifferentialUpdater, LocalAdapter, SyncEngine, SyncOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (stderr, so stdout stays machine readable)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let store_dir = config.effective_store_dir();

    match config.command {
        Command::List => list(&LocalAdapter::new(&store_dir)).await,
        Command::Import { file, id, priority } => {
            import(&LocalAdapter::new(&store_dir), &file, id, priority).await
        }
        Command::Remove { id } => {
            let adapter = LocalAdapter::new(&store_dir);
            if adapter.delete_document(&id).await? {
                info!("Removed document {}", id);
            } else {
                anyhow::bail!("Document {} not found in {}", id, store_dir.display());
            }
            Ok(())
        }
        Command::Sync { remote } => sync(LocalAdapter::new(&store_dir), &remote).await,
        Command::Resolve { id, keep, remote } => {
            resolve(LocalAdapter::new(&store_dir), &id, keep, &remote).await
        }
        Command::Manifest {
            dir,
            version,
            output,
        } => {
            let manifest = build_manifest(&dir, &version).await?;
            info!(
                "Manifest {} covers {} files ({} bytes)",
                manifest.version,
                manifest.files.len(),
                manifest.total_size()
            );
            match output {
                Some(path) => write_manifest(&path, &manifest).await?,
                None => println!("{}", manifest.to_json()?),
            }
            Ok(())
        }
        Command::Diff { from, to } => {
            let from = read_manifest(&from).await?;
            let to = read_manifest(&to).await?;
            let update = compute_update(&from, &to);
            info!(
                "Delta {} bytes vs full {} bytes (saves {})",
                update.delta_size,
                update.total_size,
                update.savings()
            );
            println!("{}", update.to_json()?);
            Ok(())
        }
        Command::Verify { dir, manifest } => {
            let manifest = read_manifest(&manifest).await?;
            let report = verify_installation(&dir, &manifest).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_valid() {
                anyhow::bail!(
                    "Installation does not match manifest {}: {} missing, {} mismatched",
                    manifest.version,
                    report.missing.len(),
                    report.mismatched.len()
                );
            }
            Ok(())
        }
        Command::Apply { update, dir } => {
            let json = tokio::fs::read_to_string(&update)
                .await
                .with_context(|| format!("Failed to read {}", update.display()))?;
            let update = UpdateManifest::from_json(&json)?;
            let ApplyOutcome::NotSupported { reason } =
                DifferentialUpdater::new(&dir).apply_delta(&update).await?;
            anyhow::bail!(
                "Cannot apply {} -> {}: {}",
                update.from_version,
                update.to_version,
                reason
            )
        }
    }
}

async fn list(adapter: &LocalAdapter) -> anyhow::Result<()> {
    let documents = adapter.list_documents().await?;
    for doc in &documents {
        println!(
            "{}\t{}\t{} bytes\t{} pages\t{}\t{}",
            doc.id,
            doc.filename,
            doc.size_bytes,
            doc.page_count,
            serde_json::to_string(&doc.sync_priority)?.trim_matches('"'),
            doc.synced_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never synced".to_string())
        );
    }
    info!("{} documents in {}", documents.len(), adapter.base_dir().display());
    Ok(())
}

async fn import(
    adapter: &LocalAdapter,
    file: &Path,
    id: Option<String>,
    priority: Priority,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if !pdfsync_core::pdf::is_pdf(&data) {
        anyhow::bail!("{} is not a PDF file", file.display());
    }

    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document.pdf".to_string());
    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let document = OfflineDocument::new(id, filename, data).with_priority(priority.into());
    adapter.save_document(&document).await?;

    info!(
        "Imported {} as {} ({} pages, priority {})",
        document.metadata.filename, document.id, document.metadata.page_count, priority
    );
    println!("{}", document.id);
    Ok(())
}

async fn sync(local: LocalAdapter, remote_dir: &Path) -> anyhow::Result<()> {
    let remote = LocalAdapter::new(remote_dir);
    info!(
        "Syncing {} with {}",
        local.base_dir().display(),
        remote.base_dir().display()
    );

    let engine = SyncEngine::new(Arc::new(local));
    let report = engine.sync_all(&remote).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let conflicts = engine.get_pending_conflicts();
    if !conflicts.is_empty() {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        anyhow::bail!("{} documents have unresolved conflicts", conflicts.len());
    }
    Ok(())
}

/// Re-detect a conflict for one document, then keep the chosen side.
///
/// Pending conflicts only live for one engine, so the document is synced
/// first. Documents without a conflict are synced normally.
async fn resolve(
    local: LocalAdapter,
    id: &str,
    keep: Keep,
    remote_dir: &Path,
) -> anyhow::Result<()> {
    let remote = LocalAdapter::new(remote_dir);
    let engine = SyncEngine::new(Arc::new(local));

    match engine.sync_document(id, &remote).await? {
        SyncOutcome::Conflict => {}
        SyncOutcome::Missing => {
            anyhow::bail!("Document {} not found in either store", id);
        }
        outcome => {
            info!("Document {} had no conflict ({:?})", id, outcome);
            println!("{}", serde_json::to_string(&outcome)?);
            return Ok(());
        }
    }

    let resolved = engine.resolve_conflict(id, keep.into(), &remote).await?;
    info!("Kept {:?} copy of {} as v{}", keep, id, resolved.version.version);
    println!("{}", serde_json::to_string_pretty(&resolved.version)?);
    Ok(())
}
