mod local;
mod memory;

pub use local::LocalAdapter;
pub use memory::MemoryAdapter;
