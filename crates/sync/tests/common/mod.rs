#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rendizy_core::config::AppConfig;
use rendizy_core::types::StaysNetSettings;
use rendizy_staysnet::fake::{FakeChannel, FakeProvider};
use rendizy_store::{MemoryStore, SyncStore};
use rendizy_sync::{FullSyncRequest, StaysNetSyncService};
use serde_json::{json, Value};

pub const ORG: &str = "7f1c2a9e-0000-4000-8000-000000000001";

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn day(offset: i64) -> String {
    (today() + Duration::days(offset)).format("%Y-%m-%d").to_string()
}

pub fn client(id: &str, name: &str, email: &str) -> Value {
    json!({"_id": id, "name": name, "email": email})
}

pub fn listing(id: &str, title: &str) -> Value {
    json!({"_id": id, "status": "active", "_mstitle": {"pt_BR": title}, "_i_maxGuests": 4})
}

pub fn reservation(id: &str, listing: &str, client: &str, check_in: i64, nights: i64) -> Value {
    json!({
        "_id": id,
        "id": format!("CODE-{}", id),
        "type": "booked",
        "_idlisting": listing,
        "_idclient": client,
        "checkInDate": day(check_in),
        "checkOutDate": day(check_in + nights),
        "creationDate": format!("{}T10:00:00Z", day(-1)),
        "guests": {"adults": 2, "total": 2},
        "_f_total": 120000
    })
}

/// Two guests, three listings and three reservations inside the default
/// reconciliation window.
pub fn populated_channel() -> FakeChannel {
    FakeChannel::new()
        .with_clients(vec![
            client("c1", "Maria Silva", "maria@example.com"),
            client("c2", "João Souza", "joao@example.com"),
        ])
        .with_listings(vec![
            listing("L1", "Apartamento Copacabana"),
            listing("L2", "Casa Búzios"),
            listing("L3", "Loft Centro"),
        ])
        .with_reservations(vec![
            reservation("R1", "L1", "c1", 5, 3),
            reservation("R2", "L2", "c2", 10, 2),
            reservation("R3", "L3", "c1", 20, 4),
        ])
}

pub fn settings() -> StaysNetSettings {
    StaysNetSettings {
        api_key: "test-key".to_string(),
        api_secret: Some("test-secret".to_string()),
        base_url: "https://fake.stays.net/external/v1".to_string(),
        enabled: true,
        auto_sync_enabled: Some(false),
        last_sync: None,
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.organization_id = ORG.to_string();
    config.reconciliation.api_delay_ms = 0;
    config
}

pub struct Harness {
    pub channel: Arc<FakeChannel>,
    pub store: Arc<MemoryStore>,
    pub service: Arc<StaysNetSyncService>,
}

pub async fn harness(channel: FakeChannel) -> Harness {
    let channel = Arc::new(channel);
    let store = Arc::new(MemoryStore::new());
    store.save_settings(ORG, &settings()).await.unwrap();
    let service = Arc::new(StaysNetSyncService::new(
        store.clone(),
        Arc::new(FakeProvider::new(channel.clone())),
        test_config(),
    ));
    Harness {
        channel,
        store,
        service,
    }
}

/// Full-sync window that covers every fixture reservation.
pub fn wide_window() -> FullSyncRequest {
    FullSyncRequest::window(today() - Duration::days(30), today() + Duration::days(120))
}
