//! Local adapters, sync engine and differential updater for pdfsync.

pub mod config;
pub mod engine;
pub mod storage;
pub mod update;

pub use engine::{SyncEngine, SyncOutcome, SyncReport};
pub use storage::{LocalAdapter, MemoryAdapter};
pub use update::DifferentialUpdater;
