use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rendizy_core::{SyncError, SyncResult};
use tracing::debug;

/// Per-organization run lock. At most one sync or reconciliation job runs
/// for an organization at a time; a second trigger is rejected, not queued.
#[derive(Clone, Default)]
pub struct RunGuard {
    active: Arc<DashMap<String, &'static str>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, organization_id: &str, job: &'static str) -> SyncResult<RunPermit> {
        match self.active.entry(organization_id.to_string()) {
            Entry::Occupied(running) => {
                debug!(
                    organization_id = %organization_id,
                    requested = job,
                    running = *running.get(),
                    "run rejected, another job is active"
                );
                Err(SyncError::AlreadyRunning(organization_id.to_string()))
            }
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(RunPermit {
                    active: Arc::clone(&self.active),
                    organization_id: organization_id.to_string(),
                })
            }
        }
    }

    /// Name of the job currently holding the organization's lock.
    pub fn running(&self, organization_id: &str) -> Option<&'static str> {
        self.active.get(organization_id).map(|job| *job)
    }
}

/// Releases the organization's lock when dropped.
pub struct RunPermit {
    active: Arc<DashMap<String, &'static str>>,
    organization_id: String,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.active.remove(&self.organization_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_rejected_until_drop() {
        let guard = RunGuard::new();
        let permit = guard.acquire("org-1", "full_sync").unwrap();
        assert_eq!(guard.running("org-1"), Some("full_sync"));

        let err = guard.acquire("org-1", "reconcile").err().unwrap();
        assert!(matches!(err, SyncError::AlreadyRunning(ref org) if org == "org-1"));
        assert!(guard.acquire("org-2", "reconcile").is_ok());

        drop(permit);
        assert!(guard.running("org-1").is_none());
        assert!(guard.acquire("org-1", "reconcile").is_ok());
    }
}
