//! Core traits and types for pdfsync.
//!
//! This crate defines the abstractions shared by the storage adapters, the
//! sync engine and the differential updater:
//! - `SyncAdapter`: document, metadata and version storage
//! - `Conflict`: two diverging versions of one document
//! - `FileManifest` / `UpdateManifest`: installation hashes and update plans

mod adapter;
mod conflict;
mod document;
mod error;
mod manifest;
pub mod pdf;

pub use adapter::SyncAdapter;
pub use conflict::{Conflict, ConflictResolution};
pub use document::{
    checksum, version_checksum, Annotation, AnnotationKind, DocumentMetadata, DocumentVersion,
    EditHistoryEntry, OfflineDocument, SyncPriority,
};
pub use error::SyncError;
pub use manifest::{
    compute_update, ApplyOutcome, FileManifest, ManifestEntry, UpdateFiles, UpdateManifest,
    VerificationReport,
};
