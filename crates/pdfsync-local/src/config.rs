use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pdfsync_core::{ConflictResolution, SyncPriority};

/// Configuration for the pdfsync command line tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "pdfsync")]
#[command(about = "Offline PDF document store with sync and differential update manifests")]
pub struct Config {
    /// Base directory of the local document store
    #[arg(long, global = true, env = "PDFSYNC_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List documents in the local store
    List,

    /// Import a PDF file into the local store
    Import {
        file: PathBuf,
        /// Document id (defaults to a random UUID)
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "normal")]
        priority: Priority,
    },

    /// Remove a document from the local store
    Remove { id: String },

    /// Sync the local store with another store directory
    Sync {
        /// Base directory of the remote store
        #[arg(long, env = "PDFSYNC_REMOTE_DIR")]
        remote: PathBuf,
    },

    /// Resolve a conflict with the remote store by keeping one side's copy
    Resolve {
        id: String,
        #[arg(long)]
        keep: Keep,
        /// Base directory of the remote store
        #[arg(long, env = "PDFSYNC_REMOTE_DIR")]
        remote: PathBuf,
    },

    /// Build a file hash manifest for an installation directory
    Manifest {
        dir: PathBuf,
        /// Version label recorded in the manifest
        #[arg(long)]
        version: String,
        /// Write the manifest here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compute the differential update between two manifests
    Diff { from: PathBuf, to: PathBuf },

    /// Verify an installation directory against a manifest
    Verify { dir: PathBuf, manifest: PathBuf },

    /// Apply a differential update to an installation directory
    Apply { update: PathBuf, dir: PathBuf },
}

impl Config {
    /// Get the effective local store directory.
    ///
    /// This is the adapter's base directory; documents live under its
    /// `documents/` subdirectory.
    pub fn effective_store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pdfsync")
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl From<Priority> for SyncPriority {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => SyncPriority::Low,
            Priority::Normal => SyncPriority::Normal,
            Priority::High => SyncPriority::High,
        }
    }
}

/// Which copy wins when resolving a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Keep {
    Local,
    Remote,
}

impl From<Keep> for ConflictResolution {
    fn from(keep: Keep) -> Self {
        match keep {
            Keep::Local => ConflictResolution::KeepLocal,
            Keep::Remote => ConflictResolution::KeepRemote,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import() {
        let config = Config::try_parse_from([
            "pdfsync",
            "--store-dir",
            "/tmp/store",
            "import",
            "scan.pdf",
            "--priority",
            "high",
        ])
        .unwrap();

        assert_eq!(config.effective_store_dir(), PathBuf::from("/tmp/store"));
        match config.command {
            Command::Import { file, id, priority } => {
                assert_eq!(file, PathBuf::from("scan.pdf"));
                assert!(id.is_none());
                assert_eq!(SyncPriority::from(priority), SyncPriority::High);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_store_dir_after_subcommand() {
        let config = Config::try_parse_from([
            "pdfsync",
            "sync",
            "--remote",
            "/mnt/share",
            "--store-dir",
            "/s",
        ])
        .unwrap();
        assert_eq!(config.store_dir, Some(PathBuf::from("/s")));
        assert!(matches!(config.command, Command::Sync { .. }));
    }

    #[test]
    fn test_parse_resolve() {
        let config = Config::try_parse_from([
            "pdfsync", "resolve", "doc-1", "--keep", "remote", "--remote", "/mnt/share",
        ])
        .unwrap();
        match config.command {
            Command::Resolve { id, keep, remote } => {
                assert_eq!(id, "doc-1");
                assert_eq!(ConflictResolution::from(keep), ConflictResolution::KeepRemote);
                assert_eq!(remote, PathBuf::from("/mnt/share"));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Config::try_parse_from(["pdfsync", "resolve", "doc-1", "--keep", "both"]).is_err());
    }

    #[test]
    fn test_default_store_dir_is_adapter_base() {
        let config = Config {
            store_dir: None,
            command: Command::List,
        };
        let dir = config.effective_store_dir();
        assert!(dir.ends_with("pdfsync"));
        assert!(!dir.ends_with("documents"));
    }

    #[test]
    fn test_manifest_requires_version() {
        assert!(Config::try_parse_from(["pdfsync", "manifest", "/opt/app"]).is_err());
    }
}
