//! In-memory sync store backed by DashMap.
//!
//! Production: replace with PostgreSQL or a similar ACID store behind the same
//! [`SyncStore`] trait. This provides the same surface for development and
//! testing.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use rendizy_core::reconciliation::{ReconciliationItem, ReconciliationRun};
use rendizy_core::types::{
    Block, Guest, Owner, Property, Reservation, StaysNetSettings, WebhookEvent,
};
use rendizy_core::{SyncError, SyncResult};
use tracing::info;
use uuid::Uuid;

use crate::traits::{CandidateFilter, SyncStore};

/// Thread-safe in-memory store for settings, guests, properties,
/// reservations, blocks, owners, reconciliation runs and queued webhooks.
pub struct MemoryStore {
    settings: DashMap<String, StaysNetSettings>,
    guests: DashMap<Uuid, Guest>,
    properties: DashMap<Uuid, Property>,
    reservations: DashMap<Uuid, Reservation>,
    blocks: DashMap<Uuid, Block>,
    owners: DashMap<Uuid, Owner>,
    runs: DashMap<Uuid, ReconciliationRun>,
    items: DashMap<Uuid, ReconciliationItem>,
    webhooks: DashMap<Uuid, WebhookEvent>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("Sync store initialized (in-memory, development mode)");
        Self {
            settings: DashMap::new(),
            guests: DashMap::new(),
            properties: DashMap::new(),
            reservations: DashMap::new(),
            blocks: DashMap::new(),
            owners: DashMap::new(),
            runs: DashMap::new(),
            items: DashMap::new(),
            webhooks: DashMap::new(),
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Make every record write fail with a storage error. Settings,
    /// reconciliation bookkeeping and the webhook queue stay writable.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    fn check_writable(&self, table: &str) -> SyncResult<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Storage(format!("{} is read-only", table)));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn find_one<K, V, F>(map: &DashMap<K, V>, predicate: F) -> Option<V>
where
    K: Eq + Hash,
    V: Clone,
    F: Fn(&V) -> bool,
{
    map.iter()
        .find(|entry| predicate(entry.value()))
        .map(|entry| entry.value().clone())
}

fn insert_new<V: Clone>(map: &DashMap<Uuid, V>, table: &str, id: Uuid, value: &V) -> SyncResult<()> {
    if map.contains_key(&id) {
        return Err(SyncError::Storage(format!(
            "duplicate key value violates unique constraint \"{}_pkey\" ({})",
            table, id
        )));
    }
    map.insert(id, value.clone());
    Ok(())
}

fn replace_existing<V: Clone>(map: &DashMap<Uuid, V>, table: &str, id: Uuid, value: &V) -> SyncResult<()> {
    match map.get_mut(&id) {
        Some(mut entry) => {
            *entry.value_mut() = value.clone();
            Ok(())
        }
        None => Err(SyncError::Storage(format!("{} row {} does not exist", table, id))),
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    // ─── Settings ───────────────────────────────────────────────────────────

    async fn get_settings(&self, organization_id: &str) -> SyncResult<Option<StaysNetSettings>> {
        Ok(self.settings.get(organization_id).map(|s| s.value().clone()))
    }

    async fn save_settings(&self, organization_id: &str, settings: &StaysNetSettings) -> SyncResult<()> {
        self.settings
            .insert(organization_id.to_string(), settings.clone());
        Ok(())
    }

    // ─── Guests ─────────────────────────────────────────────────────────────

    async fn find_guest_by_email(&self, organization_id: &str, email: &str) -> SyncResult<Option<Guest>> {
        Ok(find_one(&self.guests, |g| {
            g.organization_id == organization_id && g.email.eq_ignore_ascii_case(email)
        }))
    }

    async fn find_guest_by_id(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<Guest>> {
        Ok(self
            .guests
            .get(&id)
            .filter(|g| g.organization_id == organization_id)
            .map(|g| g.value().clone()))
    }

    async fn find_guest_by_cpf(&self, organization_id: &str, cpf: &str) -> SyncResult<Option<Guest>> {
        Ok(find_one(&self.guests, |g| {
            g.organization_id == organization_id && g.cpf.as_deref() == Some(cpf)
        }))
    }

    async fn find_guest_by_external_id(&self, organization_id: &str, external_id: &str) -> SyncResult<Option<Guest>> {
        Ok(find_one(&self.guests, |g| {
            g.organization_id == organization_id && g.external_id.as_deref() == Some(external_id)
        }))
    }

    async fn insert_guest(&self, guest: &Guest) -> SyncResult<()> {
        self.check_writable("guests")?;
        insert_new(&self.guests, "guests", guest.id, guest)
    }

    async fn update_guest(&self, guest: &Guest) -> SyncResult<()> {
        self.check_writable("guests")?;
        replace_existing(&self.guests, "guests", guest.id, guest)
    }

    async fn count_guests(&self, organization_id: &str) -> SyncResult<usize> {
        Ok(self
            .guests
            .iter()
            .filter(|g| g.organization_id == organization_id)
            .count())
    }

    // ─── Properties ─────────────────────────────────────────────────────────

    async fn find_property(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<Property>> {
        Ok(self
            .properties
            .get(&id)
            .filter(|p| p.organization_id == organization_id)
            .map(|p| p.value().clone()))
    }

    async fn find_property_by_code(&self, organization_id: &str, code: &str) -> SyncResult<Option<Property>> {
        Ok(find_one(&self.properties, |p| {
            p.organization_id == organization_id && p.code == code
        }))
    }

    async fn insert_property(&self, property: &Property) -> SyncResult<()> {
        self.check_writable("properties")?;
        insert_new(&self.properties, "properties", property.id, property)
    }

    async fn update_property(&self, property: &Property) -> SyncResult<()> {
        self.check_writable("properties")?;
        replace_existing(&self.properties, "properties", property.id, property)
    }

    async fn count_properties(&self, organization_id: &str) -> SyncResult<usize> {
        Ok(self
            .properties
            .iter()
            .filter(|p| p.organization_id == organization_id)
            .count())
    }

    // ─── Reservations ───────────────────────────────────────────────────────

    async fn find_reservation(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<Reservation>> {
        Ok(self
            .reservations
            .get(&id)
            .filter(|r| r.organization_id == organization_id)
            .map(|r| r.value().clone()))
    }

    async fn find_reservation_by_external_id(&self, organization_id: &str, external_id: &str) -> SyncResult<Option<Reservation>> {
        Ok(find_one(&self.reservations, |r| {
            r.organization_id == organization_id && r.external_id.as_deref() == Some(external_id)
        }))
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> SyncResult<()> {
        self.check_writable("reservations")?;
        if !self.properties.contains_key(&reservation.property_id) {
            return Err(SyncError::Storage(format!(
                "reservation {} references unknown property {}",
                reservation.id, reservation.property_id
            )));
        }
        if !self.guests.contains_key(&reservation.guest_id) {
            return Err(SyncError::Storage(format!(
                "reservation {} references unknown guest {}",
                reservation.id, reservation.guest_id
            )));
        }
        insert_new(&self.reservations, "reservations", reservation.id, reservation)
    }

    async fn update_reservation(&self, reservation: &Reservation) -> SyncResult<()> {
        self.check_writable("reservations")?;
        replace_existing(&self.reservations, "reservations", reservation.id, reservation)
    }

    async fn list_reservations(&self, organization_id: &str) -> SyncResult<Vec<Reservation>> {
        let mut reservations: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.organization_id == organization_id)
            .map(|r| r.value().clone())
            .collect();
        reservations.sort_by(|a, b| a.check_in.cmp(&b.check_in));
        Ok(reservations)
    }

    async fn list_reconciliation_candidates(&self, organization_id: &str, filter: &CandidateFilter) -> SyncResult<Vec<Reservation>> {
        let mut candidates: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| {
                r.organization_id == organization_id
                    && filter.statuses.contains(&r.status)
                    && r.check_out >= filter.check_out_from
                    && r.check_out <= filter.check_out_to
            })
            .map(|r| r.value().clone())
            .collect();
        candidates.sort_by(|a, b| a.check_in.cmp(&b.check_in).then(a.id.cmp(&b.id)));
        candidates.truncate(filter.limit);
        Ok(candidates)
    }

    async fn reservation_external_ids(&self, organization_id: &str) -> SyncResult<HashSet<String>> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| r.organization_id == organization_id)
            .filter_map(|r| r.external_id.clone())
            .collect())
    }

    // ─── Blocks ─────────────────────────────────────────────────────────────

    async fn find_block_by_range(&self, organization_id: &str, property_id: Uuid, start: NaiveDate, end: NaiveDate) -> SyncResult<Option<Block>> {
        Ok(find_one(&self.blocks, |b| {
            b.organization_id == organization_id
                && b.property_id == property_id
                && b.start_date == start
                && b.end_date == end
        }))
    }

    async fn insert_block(&self, block: &Block) -> SyncResult<()> {
        self.check_writable("blocks")?;
        insert_new(&self.blocks, "blocks", block.id, block)
    }

    async fn list_blocks(&self, organization_id: &str) -> SyncResult<Vec<Block>> {
        let mut blocks: Vec<Block> = self
            .blocks
            .iter()
            .filter(|b| b.organization_id == organization_id)
            .map(|b| b.value().clone())
            .collect();
        blocks.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        Ok(blocks)
    }

    // ─── Owners ─────────────────────────────────────────────────────────────

    async fn find_owner(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<Owner>> {
        Ok(self
            .owners
            .get(&id)
            .filter(|o| o.organization_id == organization_id)
            .map(|o| o.value().clone()))
    }

    async fn insert_owner(&self, owner: &Owner) -> SyncResult<()> {
        self.check_writable("owners")?;
        insert_new(&self.owners, "owners", owner.id, owner)
    }

    async fn update_owner(&self, owner: &Owner) -> SyncResult<()> {
        self.check_writable("owners")?;
        replace_existing(&self.owners, "owners", owner.id, owner)
    }

    async fn count_owners(&self, organization_id: &str) -> SyncResult<usize> {
        Ok(self
            .owners
            .iter()
            .filter(|o| o.organization_id == organization_id)
            .count())
    }

    // ─── Reconciliation ─────────────────────────────────────────────────────

    async fn insert_run(&self, run: &ReconciliationRun) -> SyncResult<()> {
        insert_new(&self.runs, "reconciliation_runs", run.id, run)
    }

    async fn update_run(&self, run: &ReconciliationRun) -> SyncResult<()> {
        replace_existing(&self.runs, "reconciliation_runs", run.id, run)
    }

    async fn get_run(&self, organization_id: &str, id: Uuid) -> SyncResult<Option<ReconciliationRun>> {
        Ok(self
            .runs
            .get(&id)
            .filter(|r| r.organization_id == organization_id)
            .map(|r| r.value().clone()))
    }

    async fn list_runs(&self, organization_id: &str, limit: usize) -> SyncResult<Vec<ReconciliationRun>> {
        let mut runs: Vec<ReconciliationRun> = self
            .runs
            .iter()
            .filter(|r| r.organization_id == organization_id)
            .map(|r| r.value().clone())
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn insert_item(&self, item: &ReconciliationItem) -> SyncResult<()> {
        if !self.runs.contains_key(&item.run_id) {
            return Err(SyncError::Storage(format!(
                "reconciliation item references unknown run {}",
                item.run_id
            )));
        }
        insert_new(&self.items, "reconciliation_items", item.id, item)
    }

    async fn list_items(&self, run_id: Uuid) -> SyncResult<Vec<ReconciliationItem>> {
        let mut items: Vec<ReconciliationItem> = self
            .items
            .iter()
            .filter(|i| i.run_id == run_id)
            .map(|i| i.value().clone())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    // ─── Webhooks ───────────────────────────────────────────────────────────

    async fn insert_webhook(&self, event: &WebhookEvent) -> SyncResult<()> {
        insert_new(&self.webhooks, "staysnet_webhooks", event.id, event)
    }

    async fn list_pending_webhooks(&self, organization_id: &str, limit: usize) -> SyncResult<Vec<WebhookEvent>> {
        let mut pending: Vec<WebhookEvent> = self
            .webhooks
            .iter()
            .filter(|w| w.organization_id == organization_id && !w.processed)
            .map(|w| w.value().clone())
            .collect();
        pending.sort_by(|a, b| a.received_at.cmp(&b.received_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn get_webhook(&self, id: Uuid) -> SyncResult<Option<WebhookEvent>> {
        Ok(self.webhooks.get(&id).map(|w| w.value().clone()))
    }

    async fn mark_webhook_processed(&self, id: Uuid, error_message: Option<String>) -> SyncResult<()> {
        match self.webhooks.get_mut(&id) {
            Some(mut entry) => {
                let event = entry.value_mut();
                event.processed = true;
                event.processed_at = Some(Utc::now());
                event.error_message = error_message;
                Ok(())
            }
            None => Err(SyncError::Storage(format!("staysnet_webhooks row {} does not exist", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendizy_core::reconciliation::{ActionTaken, IssueType};
    use rendizy_core::types::{
        GuestCounts, PropertyStatus, ReservationPricing, ReservationStatus,
    };

    const ORG: &str = "org-1";

    fn guest(email: &str) -> Guest {
        let now = Utc::now();
        Guest {
            id: Uuid::new_v4(),
            organization_id: ORG.to_string(),
            external_id: Some(format!("ext-{}", email)),
            first_name: "Ana".to_string(),
            last_name: "Lima".to_string(),
            full_name: "Ana Lima".to_string(),
            email: email.to_string(),
            phone: "+55-00-00000-0000".to_string(),
            cpf: Some("111".to_string()),
            passport: None,
            language: "pt-BR".to_string(),
            source: "other".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn property(code: &str) -> Property {
        let now = Utc::now();
        Property {
            id: Uuid::new_v4(),
            organization_id: ORG.to_string(),
            code: code.to_string(),
            name: "Casa".to_string(),
            property_type: "apartment".to_string(),
            status: PropertyStatus::Active,
            address: None,
            max_guests: 2,
            bedrooms: 1,
            beds: 1,
            bathrooms: 1,
            cover_photo: None,
            photos: Vec::new(),
            description: None,
            currency: "BRL".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn reservation(property: &Property, guest: &Guest, check_in: NaiveDate, status: ReservationStatus) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Uuid::new_v4(),
            organization_id: ORG.to_string(),
            external_id: Some(Uuid::new_v4().to_string()),
            confirmation_code: None,
            property_id: property.id,
            guest_id: guest.id,
            check_in,
            check_out: check_in + chrono::Duration::days(2),
            nights: 2,
            guests: GuestCounts::default(),
            pricing: ReservationPricing {
                price_per_night: 0.0,
                base_total: 0.0,
                cleaning_fee: 0.0,
                service_fee: 0.0,
                taxes: 0.0,
                total: 0.0,
                currency: "BRL".to_string(),
            },
            status,
            platform: "staysnet".to_string(),
            notes: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_guest_lookups_are_org_scoped() {
        let store = MemoryStore::new();
        let g = guest("ana@example.com");
        store.insert_guest(&g).await.unwrap();

        assert!(store.find_guest_by_email(ORG, "ANA@example.com").await.unwrap().is_some());
        assert!(store.find_guest_by_email("other-org", "ana@example.com").await.unwrap().is_none());
        assert!(store.find_guest_by_cpf(ORG, "111").await.unwrap().is_some());
        assert!(store.find_guest_by_id("other-org", g.id).await.unwrap().is_none());
        assert_eq!(store.count_guests(ORG).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_and_missing_update_fail() {
        let store = MemoryStore::new();
        let g = guest("dup@example.com");
        store.insert_guest(&g).await.unwrap();
        assert!(matches!(store.insert_guest(&g).await, Err(SyncError::Storage(_))));

        let p = property("L1");
        assert!(matches!(store.update_property(&p).await, Err(SyncError::Storage(_))));
    }

    #[tokio::test]
    async fn test_reservation_requires_known_foreign_keys() {
        let store = MemoryStore::new();
        let g = guest("fk@example.com");
        let p = property("L1");
        let r = reservation(&p, &g, date(2025, 1, 10), ReservationStatus::Confirmed);
        assert!(store.insert_reservation(&r).await.is_err());

        store.insert_guest(&g).await.unwrap();
        store.insert_property(&p).await.unwrap();
        store.insert_reservation(&r).await.unwrap();
        let external = r.external_id.clone().unwrap();
        assert!(store.find_reservation_by_external_id(ORG, &external).await.unwrap().is_some());
        assert!(store.reservation_external_ids(ORG).await.unwrap().contains(&external));
    }

    #[tokio::test]
    async fn test_candidates_filtered_ordered_and_limited() {
        let store = MemoryStore::new();
        let g = guest("c@example.com");
        let p = property("L1");
        store.insert_guest(&g).await.unwrap();
        store.insert_property(&p).await.unwrap();

        let late = reservation(&p, &g, date(2025, 3, 20), ReservationStatus::Confirmed);
        let early = reservation(&p, &g, date(2025, 3, 5), ReservationStatus::Pending);
        let cancelled = reservation(&p, &g, date(2025, 3, 6), ReservationStatus::Cancelled);
        let outside = reservation(&p, &g, date(2025, 9, 1), ReservationStatus::Confirmed);
        for r in [&late, &early, &cancelled, &outside] {
            store.insert_reservation(r).await.unwrap();
        }

        let mut filter = CandidateFilter {
            statuses: vec![
                ReservationStatus::Confirmed,
                ReservationStatus::Pending,
                ReservationStatus::CheckedIn,
            ],
            check_out_from: date(2025, 3, 1),
            check_out_to: date(2025, 4, 30),
            limit: 500,
        };
        let candidates = store.list_reconciliation_candidates(ORG, &filter).await.unwrap();
        assert_eq!(candidates.iter().map(|r| r.id).collect::<Vec<_>>(), vec![early.id, late.id]);

        filter.limit = 1;
        let candidates = store.list_reconciliation_candidates(ORG, &filter).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, early.id);
    }

    #[tokio::test]
    async fn test_items_require_existing_run() {
        let store = MemoryStore::new();
        let run = ReconciliationRun::start(ORG);
        let item = ReconciliationItem {
            id: Uuid::new_v4(),
            run_id: run.id,
            reservation_id: Uuid::new_v4(),
            external_id: None,
            confirmation_code: None,
            property_id: None,
            issue_type: IssueType::Orphan,
            local_status: "confirmed".to_string(),
            api_status: None,
            action_taken: ActionTaken::Skipped,
            action_reason: "no external id".to_string(),
            created_at: Utc::now(),
        };
        assert!(store.insert_item(&item).await.is_err());

        store.insert_run(&run).await.unwrap();
        store.insert_item(&item).await.unwrap();
        assert_eq!(store.list_items(run.id).await.unwrap().len(), 1);
        assert_eq!(store.list_runs(ORG, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reject_writes() {
        let store = MemoryStore::new();
        store.set_reject_writes(true);
        assert!(store.insert_guest(&guest("ro@example.com")).await.is_err());
        store.set_reject_writes(false);
        assert!(store.insert_guest(&guest("ro@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_queue_drains_in_arrival_order() {
        let store = MemoryStore::new();
        let first = WebhookEvent::received(ORG, serde_json::json!({"action": "reservation.created", "payload": {"_id": "R1"}}));
        let mut second = WebhookEvent::received(ORG, serde_json::json!({"action": "reservation.deleted", "payload": {"_id": "R2"}}));
        second.received_at = first.received_at + chrono::Duration::seconds(1);
        let other_org = WebhookEvent::received("other-org", serde_json::json!({"action": "reservation.created"}));
        for event in [&second, &first, &other_org] {
            store.insert_webhook(event).await.unwrap();
        }

        let pending = store.list_pending_webhooks(ORG, 25).await.unwrap();
        assert_eq!(pending.iter().map(|w| w.id).collect::<Vec<_>>(), vec![first.id, second.id]);

        store.mark_webhook_processed(first.id, Some("lookup failed".to_string())).await.unwrap();
        let pending = store.list_pending_webhooks(ORG, 25).await.unwrap();
        assert_eq!(pending.len(), 1);
        let marked = store.get_webhook(first.id).await.unwrap().unwrap();
        assert!(marked.processed && marked.processed_at.is_some());
        assert_eq!(marked.error_message.as_deref(), Some("lookup failed"));

        assert!(store.mark_webhook_processed(uuid::Uuid::new_v4(), None).await.is_err());
    }
}
