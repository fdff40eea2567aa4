//! Storage collaborator of the sync pipeline.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{CandidateFilter, SyncStore};
