pub mod config;
pub mod error;
pub mod ids;
pub mod reconciliation;
pub mod stats;
pub mod types;

pub use config::AppConfig;
pub use error::{SyncError, SyncResult};
