mod manifest;
mod updater;

pub use manifest::{build_manifest, hash_file, read_manifest, verify_installation, write_manifest};
pub use updater::DifferentialUpdater;
