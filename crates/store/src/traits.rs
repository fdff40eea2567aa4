use async_trait::async_trait;
use chrono::NaiveDate;
use rendizy_core::reconciliation::{ReconciliationItem, ReconciliationRun};
use rendizy_core::types::{
    Block, Guest, Owner, Property, Reservation, ReservationStatus, StaysNetSettings, WebhookEvent,
};
use rendizy_core::SyncResult;
use std::collections::HashSet;
use uuid::Uuid;

/// Selection of reservations the reconciliation job re-checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFilter {
    pub statuses: Vec<ReservationStatus>,
    pub check_out_from: NaiveDate,
    pub check_out_to: NaiveDate,
    pub limit: usize,
}

/// Multi-tenant record store. Every lookup is scoped by organization and
/// matches on a natural key; callers choose between `insert_*` and
/// `update_*` after a lookup.
#[async_trait]
pub trait SyncStore: Send + Sync {
    // Settings
    async fn get_settings(&self, organization_id: &str) -> SyncResult<Option<StaysNetSettings>>;
    async fn save_settings(&self, organization_id: &str, settings: &StaysNetSettings) -> SyncResult<()>;

    // Guests
    async fn find_guest_by_email(&self, organization_id: &str, email: &str) -> SyncResult<Option<Guest>>;
    async fn find_guest_by_id(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<Guest>>;
    async fn find_guest_by_cpf(&self, organization_id: &str, cpf: &str) -> SyncResult<Option<Guest>>;
    async fn find_guest_by_external_id(&self, organization_id: &str, external_id: &str) -> SyncResult<Option<Guest>>;
    async fn insert_guest(&self, guest: &Guest) -> SyncResult<()>;
    async fn update_guest(&self, guest: &Guest) -> SyncResult<()>;
    async fn count_guests(&self, organization_id: &str) -> SyncResult<usize>;

    // Properties
    async fn find_property(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<Property>>;
    async fn find_property_by_code(&self, organization_id: &str, code: &str) -> SyncResult<Option<Property>>;
    async fn insert_property(&self, property: &Property) -> SyncResult<()>;
    async fn update_property(&self, property: &Property) -> SyncResult<()>;
    async fn count_properties(&self, organization_id: &str) -> SyncResult<usize>;

    // Reservations
    async fn find_reservation(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<Reservation>>;
    async fn find_reservation_by_external_id(&self, organization_id: &str, external_id: &str) -> SyncResult<Option<Reservation>>;
    async fn insert_reservation(&self, reservation: &Reservation) -> SyncResult<()>;
    async fn update_reservation(&self, reservation: &Reservation) -> SyncResult<()>;
    async fn list_reservations(&self, organization_id: &str) -> SyncResult<Vec<Reservation>>;
    /// Candidates ordered by check-in, at most `filter.limit`.
    async fn list_reconciliation_candidates(&self, organization_id: &str, filter: &CandidateFilter) -> SyncResult<Vec<Reservation>>;
    async fn reservation_external_ids(&self, organization_id: &str) -> SyncResult<HashSet<String>>;

    // Blocks
    async fn find_block_by_range(&self, organization_id: &str, property_id: Uuid, start: NaiveDate, end: NaiveDate) -> SyncResult<Option<Block>>;
    async fn insert_block(&self, block: &Block) -> SyncResult<()>;
    async fn list_blocks(&self, organization_id: &str) -> SyncResult<Vec<Block>>;

    // Owners
    async fn find_owner(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<Owner>>;
    async fn insert_owner(&self, owner: &Owner) -> SyncResult<()>;
    async fn update_owner(&self, owner: &Owner) -> SyncResult<()>;
    async fn count_owners(&self, organization_id: &str) -> SyncResult<usize>;

    // Reconciliation
    async fn insert_run(&self, run: &ReconciliationRun) -> SyncResult<()>;
    async fn update_run(&self, run: &ReconciliationRun) -> SyncResult<()>;
    async fn get_run(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<ReconciliationRun>>;
    /// Most recent first.
    async fn list_runs(&self, organization_id: &str, limit: usize) -> SyncResult<Vec<ReconciliationRun>>;
    /// Fails when the referenced run does not exist.
    async fn insert_item(&self, item: &ReconciliationItem) -> SyncResult<()>;
    async fn list_items(&self, run_id: Uuid) -> SyncResult<Vec<ReconciliationItem>>;

    // Webhooks
    async fn insert_webhook(&self, event: &WebhookEvent) -> SyncResult<()>;
    /// Unprocessed events in arrival order, at most `limit`.
    async fn list_pending_webhooks(&self, organization_id: &str, limit: usize) -> SyncResult<Vec<WebhookEvent>>;
    async fn get_webhook(&self, id: Uuid) -> SyncResult<Option<WebhookEvent>>;
    async fn mark_webhook_processed(&self, id: Uuid, error_message: Option<String>) -> SyncResult<()>;
}
