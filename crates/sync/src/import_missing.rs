//! Import of reservations that exist on Stays.net but not locally.
//!
//! Two windows are scanned: upcoming arrivals and recently created bookings.
//! Listings are resolved against what is already stored. A client that no
//! full sync has imported yet is created from the reservation's embedded
//! client object.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, Utc};
use rendizy_core::config::ReconciliationConfig;
use rendizy_core::stats::{ImportMissingOutcome, ImportMissingStats, GENERAL_ERROR_PREFIX};
use rendizy_staysnet::mappers;
use rendizy_staysnet::{ChannelClient, DateType, ReservationQuery};
use rendizy_store::SyncStore;
use tracing::{info, warn};

use crate::upsert::upsert_remote_reservation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportMissingOptions {
    pub days_ahead: i64,
    pub days_back: i64,
}

impl ImportMissingOptions {
    pub fn from_config(config: &ReconciliationConfig) -> Self {
        Self {
            days_ahead: config.import_days_ahead,
            days_back: config.import_days_back,
        }
    }

    pub fn with_overrides(mut self, days_ahead: Option<i64>, days_back: Option<i64>) -> Self {
        if let Some(days) = days_ahead {
            self.days_ahead = days.max(0);
        }
        if let Some(days) = days_back {
            self.days_back = days.max(0);
        }
        self
    }

    fn queries(&self, today: NaiveDate) -> [ReservationQuery; 2] {
        [
            ReservationQuery {
                start_date: today,
                end_date: today + Duration::days(self.days_ahead),
                date_type: DateType::Arrival,
            },
            ReservationQuery {
                start_date: today - Duration::days(self.days_back),
                end_date: today,
                date_type: DateType::Creation,
            },
        ]
    }
}

pub async fn run_import_missing(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    options: &ImportMissingOptions,
) -> ImportMissingOutcome {
    let [arrival_query, creation_query] = options.queries(Utc::now().date_naive());

    let arrival = import_window(client, store, organization_id, &arrival_query).await;
    let creation = import_window(client, store, organization_id, &creation_query).await;

    let success = arrival.errors.is_empty() && creation.errors.is_empty();
    info!(
        organization_id = %organization_id,
        success = success,
        arrival_missing = arrival.missing,
        arrival_imported = arrival.imported,
        creation_missing = creation.missing,
        creation_imported = creation.imported,
        "missing-reservation import finished"
    );

    ImportMissingOutcome {
        success,
        arrival,
        creation,
    }
}

async fn import_window(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    query: &ReservationQuery,
) -> ImportMissingStats {
    let mut stats = ImportMissingStats {
        date_type: query.date_type.as_str().to_string(),
        from: query.start_date.to_string(),
        to: query.end_date.to_string(),
        ..Default::default()
    };

    let remote = match client.get_reservations(query).await.into_list(&["reservations"]) {
        Ok(remote) => remote,
        Err(e) => {
            warn!(date_type = query.date_type.as_str(), error = %e, "reservation listing failed");
            stats.errors.push(format!("{GENERAL_ERROR_PREFIX}: {e}"));
            return stats;
        }
    };
    stats.remote_count = remote.len() as u64;

    let mut local_ids: HashSet<String> = match store.reservation_external_ids(organization_id).await {
        Ok(ids) => ids,
        Err(e) => {
            stats.errors.push(format!("{GENERAL_ERROR_PREFIX}: {e}"));
            return stats;
        }
    };

    for raw in &remote {
        let Some(external_id) = mappers::external_id(raw) else {
            stats.failed += 1;
            stats.errors.push("Reserva sem _id/id".to_string());
            continue;
        };
        if local_ids.contains(&external_id) {
            continue;
        }
        stats.missing += 1;

        let kind = mappers::str_at(raw, "type");
        if kind.as_deref().is_some_and(mappers::is_block_like_type) {
            stats.skipped += 1;
            continue;
        }

        match upsert_remote_reservation(store, organization_id, raw).await {
            Ok(_) => {
                stats.imported += 1;
                local_ids.insert(external_id);
                metrics::counter!("staysnet.sync.records", "entity" => "reservation", "outcome" => "imported_missing")
                    .increment(1);
            }
            Err(e) => {
                warn!(reservation_id = %external_id, error = %e, "missing reservation not imported");
                stats.failed += 1;
                stats.errors.push(format!("Reserva {}: {}", external_id, e));
            }
        }
    }

    stats
}
