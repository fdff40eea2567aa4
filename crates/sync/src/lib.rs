//! Stays.net import jobs and the service that runs them.

pub mod calendar;
pub mod full_sync;
pub mod guard;
pub mod id_map;
pub mod import_missing;
pub mod owners;
pub mod reconcile;
pub mod scheduler;
pub mod service;
pub mod upsert;
pub mod webhooks;

pub use calendar::{run_calendar_sync, CalendarSyncRequest};
pub use full_sync::{run_full_sync, FullSyncRequest};
pub use guard::{RunGuard, RunPermit};
pub use id_map::IdMapping;
pub use import_missing::{run_import_missing, ImportMissingOptions};
pub use owners::run_owners_sync;
pub use reconcile::{run_reconciliation, ReconcileOptions};
pub use scheduler::spawn_scheduler;
pub use service::{AutoSyncOutcome, StaysNetSyncService};
pub use webhooks::{run_webhook_processing, webhook_limit};
