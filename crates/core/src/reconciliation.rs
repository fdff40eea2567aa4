//! Persistent records of the reservation reconciliation job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Value written to `cancelled_by` when the job cancels a reservation.
pub const RECONCILIATION_ACTOR: &str = "reconciliation-job";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Partial,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Deleted,
    StatusChanged,
    DatesChanged,
    GuestChanged,
    Orphan,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Deleted => "deleted",
            IssueType::StatusChanged => "status_changed",
            IssueType::DatesChanged => "dates_changed",
            IssueType::GuestChanged => "guest_changed",
            IssueType::Orphan => "orphan",
        }
    }

    pub fn is_modification(&self) -> bool {
        matches!(
            self,
            IssueType::StatusChanged | IssueType::DatesChanged | IssueType::GuestChanged
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    Cancelled,
    Updated,
    Skipped,
    Error,
}

impl ActionTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTaken::Cancelled => "cancelled",
            ActionTaken::Updated => "updated",
            ActionTaken::Skipped => "skipped",
            ActionTaken::Error => "error",
        }
    }
}

/// Aggregate counters of a run, incremented as items are recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunCounters {
    pub total_checked: u64,
    pub found_deleted: u64,
    pub found_modified: u64,
    pub found_orphan: u64,
    pub action_cancelled: u64,
    pub action_updated: u64,
    pub action_skipped: u64,
}

impl RunCounters {
    /// Account for one recorded item.
    pub fn record(&mut self, issue: IssueType, action: ActionTaken) {
        match issue {
            IssueType::Deleted => self.found_deleted += 1,
            IssueType::Orphan => self.found_orphan += 1,
            IssueType::StatusChanged | IssueType::DatesChanged | IssueType::GuestChanged => {
                self.found_modified += 1
            }
        }
        match action {
            ActionTaken::Cancelled => self.action_cancelled += 1,
            ActionTaken::Updated => self.action_updated += 1,
            ActionTaken::Skipped => self.action_skipped += 1,
            ActionTaken::Error => {}
        }
    }

    pub fn actions_total(&self) -> u64 {
        self.action_cancelled + self.action_updated + self.action_skipped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationRun {
    pub id: Uuid,
    pub organization_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub status: RunStatus,
    #[serde(flatten)]
    pub counters: RunCounters,
    pub error_message: Option<String>,
    #[schema(value_type = Object)]
    pub summary: serde_json::Value,
}

impl ReconciliationRun {
    pub fn start(organization_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            status: RunStatus::Running,
            counters: RunCounters::default(),
            error_message: None,
            summary: serde_json::Value::Null,
        }
    }

    /// Stamp the terminal status, `finished_at` and `duration_ms`.
    pub fn finish(&mut self, status: RunStatus, summary: serde_json::Value) {
        let now = Utc::now();
        self.status = status;
        self.finished_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        self.summary = summary;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationItem {
    pub id: Uuid,
    pub run_id: Uuid,
    pub reservation_id: Uuid,
    pub external_id: Option<String>,
    pub confirmation_code: Option<String>,
    pub property_id: Option<Uuid>,
    pub issue_type: IssueType,
    pub local_status: String,
    pub api_status: Option<String>,
    pub action_taken: ActionTaken,
    pub action_reason: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_issue_and_action() {
        let mut counters = RunCounters::default();
        counters.record(IssueType::Deleted, ActionTaken::Cancelled);
        counters.record(IssueType::DatesChanged, ActionTaken::Updated);
        counters.record(IssueType::Orphan, ActionTaken::Skipped);
        counters.record(IssueType::StatusChanged, ActionTaken::Error);

        assert_eq!(counters.found_deleted, 1);
        assert_eq!(counters.found_modified, 2);
        assert_eq!(counters.found_orphan, 1);
        assert_eq!(counters.actions_total(), 3);
    }

    #[test]
    fn test_finish_stamps_run() {
        let mut run = ReconciliationRun::start("org-1");
        assert_eq!(run.status, RunStatus::Running);
        assert!(!run.status.is_terminal());

        run.finish(RunStatus::Completed, serde_json::json!({"errors": []}));
        assert!(run.status.is_terminal());
        assert!(run.finished_at.is_some());
        assert!(run.duration_ms.is_some());
    }

    #[test]
    fn test_run_serializes_flat_counters() {
        let run = ReconciliationRun::start("org-1");
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["total_checked"], 0);
        assert_eq!(json["action_skipped"], 0);
    }
}
