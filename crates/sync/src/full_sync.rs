//! Full import: guests, then properties, then reservations.
//!
//! Each phase fetches its collection once, maps and upserts record by record,
//! and feeds [`IdMapping`] for the next phase. A record that fails is counted
//! and reported without stopping the phase; a collection that cannot be
//! fetched is reported as a general error and the next phase still runs.

use chrono::NaiveDate;
use rendizy_core::stats::{SyncOutcome, SyncStats, Upserted};
use rendizy_core::SyncResult;
use rendizy_staysnet::mappers::{self, ReservationRefs};
use rendizy_staysnet::{ChannelClient, ReservationQuery};
use rendizy_store::SyncStore;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::id_map::IdMapping;
use crate::upsert::{upsert_guest, upsert_property, upsert_reservation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FullSyncRequest {
    /// Stays.net listing ids to import; empty imports every listing.
    #[serde(default)]
    pub selected_property_ids: Vec<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl FullSyncRequest {
    pub fn window(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            selected_property_ids: Vec::new(),
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }

    /// Reservation window, `2025-01-01..2026-12-31` unless given.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let start = self
            .start_date
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default());
        let end = self
            .end_date
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(2026, 12, 31).unwrap_or_default());
        (start, end)
    }

    fn selects(&self, listing_id: &str) -> bool {
        self.selected_property_ids.is_empty()
            || self.selected_property_ids.iter().any(|id| id == listing_id)
    }
}

pub async fn run_full_sync(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    request: &FullSyncRequest,
) -> SyncOutcome {
    let (start, end) = request.date_range();
    info!(
        organization_id = %organization_id,
        start = %start,
        end = %end,
        selected = request.selected_property_ids.len(),
        "starting Stays.net full sync"
    );

    let mut stats = SyncStats::default();
    let mut ids = IdMapping::new();

    sync_guests(client, store, organization_id, &mut ids, &mut stats).await;
    sync_properties(client, store, organization_id, request, &mut ids, &mut stats).await;
    sync_reservations(client, store, organization_id, (start, end), &ids, &mut stats).await;

    let success = stats.total_failed() == 0 && !stats.has_general_error();
    info!(
        organization_id = %organization_id,
        success = success,
        guests_created = stats.guests.created,
        guests_updated = stats.guests.updated,
        properties_created = stats.properties.created,
        properties_updated = stats.properties.updated,
        reservations_created = stats.reservations.created,
        reservations_updated = stats.reservations.updated,
        failed = stats.total_failed(),
        "Stays.net full sync finished"
    );

    SyncOutcome { success, stats }
}

fn record_metric(entity: &'static str, upserted: Upserted) {
    metrics::counter!(
        "staysnet.sync.records",
        "entity" => entity,
        "outcome" => upserted.as_str()
    )
    .increment(1);
}

async fn sync_guests(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    ids: &mut IdMapping,
    stats: &mut SyncStats,
) {
    let clients = match client.get_clients().await.into_list(&["clients"]) {
        Ok(clients) => clients,
        Err(e) => {
            error!(organization_id = %organization_id, error = %e, "failed to fetch Stays.net clients");
            stats.push_general_error(e);
            return;
        }
    };
    stats.guests.fetched = clients.len() as u64;

    for raw in &clients {
        let label = mappers::external_id(raw).unwrap_or_else(|| "?".to_string());
        match import_guest(store, organization_id, raw).await {
            Ok((upserted, external_id, internal_id)) => {
                upserted.record(&mut stats.guests);
                record_metric("guest", upserted);
                ids.record_guest(&external_id, internal_id);
            }
            Err(e) => {
                warn!(client_id = %label, error = %e, "guest import failed");
                stats.guests.failed += 1;
                stats.errors.push(format!("Hóspede {}: {}", label, e));
            }
        }
    }
}

async fn import_guest(
    store: &dyn SyncStore,
    organization_id: &str,
    raw: &Value,
) -> SyncResult<(Upserted, String, uuid::Uuid)> {
    let guest = mappers::map_guest(raw, organization_id)?;
    let external_id = guest.external_id.clone().unwrap_or_default();
    let (upserted, id) = upsert_guest(store, guest).await?;
    Ok((upserted, external_id, id))
}

async fn sync_properties(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    request: &FullSyncRequest,
    ids: &mut IdMapping,
    stats: &mut SyncStats,
) {
    let listings = match client.get_listings().await.into_list(&["listings"]) {
        Ok(listings) => listings,
        Err(e) => {
            error!(organization_id = %organization_id, error = %e, "failed to fetch Stays.net listings");
            stats.push_general_error(e);
            return;
        }
    };

    let listings: Vec<Value> = listings
        .into_iter()
        .filter(|raw| {
            mappers::external_id(raw)
                .map(|id| request.selects(&id))
                .unwrap_or(request.selected_property_ids.is_empty())
        })
        .collect();
    stats.properties.fetched = listings.len() as u64;

    for raw in &listings {
        let label = mappers::external_id(raw).unwrap_or_else(|| "?".to_string());
        let result = match mappers::map_listing(raw, organization_id) {
            Ok(property) => {
                let code = property.code.clone();
                upsert_property(store, property).await.map(|(u, id)| (u, code, id))
            }
            Err(e) => Err(e),
        };
        match result {
            Ok((upserted, code, internal_id)) => {
                upserted.record(&mut stats.properties);
                record_metric("property", upserted);
                ids.record_property(&code, internal_id);
            }
            Err(e) => {
                warn!(listing_id = %label, error = %e, "property import failed");
                stats.properties.failed += 1;
                stats.errors.push(format!("Propriedade {}: {}", label, e));
            }
        }
    }
}

async fn sync_reservations(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    (start, end): (NaiveDate, NaiveDate),
    ids: &IdMapping,
    stats: &mut SyncStats,
) {
    let query = ReservationQuery::arrival(start, end);
    let reservations = match client.get_reservations(&query).await.into_list(&["reservations"]) {
        Ok(reservations) => reservations,
        Err(e) => {
            error!(organization_id = %organization_id, error = %e, "failed to fetch Stays.net reservations");
            stats.push_general_error(e);
            return;
        }
    };
    stats.reservations.fetched = reservations.len() as u64;

    for raw in &reservations {
        let label = mappers::external_id(raw).unwrap_or_else(|| "?".to_string());
        match import_reservation(store, organization_id, raw, ids).await {
            Ok(upserted) => {
                upserted.record(&mut stats.reservations);
                record_metric("reservation", upserted);
            }
            Err(e) => {
                warn!(reservation_id = %label, error = %e, "reservation import failed");
                stats.reservations.failed += 1;
                stats.errors.push(format!("Reserva {}: {}", label, e));
            }
        }
    }
}

/// Resolve foreign keys through `ids`, then map and upsert. Nothing is
/// written when either key is unresolved.
async fn import_reservation(
    store: &dyn SyncStore,
    organization_id: &str,
    raw: &Value,
    ids: &IdMapping,
) -> SyncResult<Upserted> {
    let ReservationRefs { listing_id, client_id, .. } = mappers::reservation_refs(raw)?;
    let property_id = ids.require_property(listing_id.as_deref())?;
    let guest_id = ids.require_guest(client_id.as_deref())?;
    let reservation = mappers::map_reservation(raw, organization_id, property_id, guest_id)?;
    let (upserted, _) = upsert_reservation(store, reservation).await?;
    Ok(upserted)
}
