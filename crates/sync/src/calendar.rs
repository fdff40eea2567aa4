//! Availability, block and rate import.
//!
//! Only blocks are persisted; availability days and rates are counted. The
//! three sub-steps are independent.

use chrono::{Duration, NaiveDate, Utc};
use rendizy_core::stats::{CalendarOutcome, CalendarStats, GENERAL_ERROR_PREFIX};
use rendizy_core::types::Block;
use rendizy_core::{SyncError, SyncResult};
use rendizy_staysnet::mappers::{self, BlockCandidate};
use rendizy_staysnet::{CalendarQuery, ChannelClient};
use rendizy_store::SyncStore;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSyncRequest {
    /// Stays.net listing id; absent for every listing.
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl CalendarSyncRequest {
    /// Window from today to `days_ahead` days out unless given.
    pub fn query(&self, days_ahead: i64) -> CalendarQuery {
        let today = Utc::now().date_naive();
        let start_date = self.start_date.unwrap_or(today);
        CalendarQuery {
            start_date,
            end_date: self
                .end_date
                .unwrap_or(start_date + Duration::days(days_ahead)),
            property_id: self.property_id.clone(),
        }
    }
}

enum BlockWrite {
    Created,
    AlreadyPresent,
}

pub async fn run_calendar_sync(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    request: &CalendarSyncRequest,
    days_ahead: i64,
) -> CalendarOutcome {
    let query = request.query(days_ahead);
    info!(
        organization_id = %organization_id,
        start = %query.start_date,
        end = %query.end_date,
        property_id = query.property_id.as_deref().unwrap_or("*"),
        "starting Stays.net calendar sync"
    );

    let mut stats = CalendarStats::default();

    match client
        .get_availability_calendar(&query)
        .await
        .into_list(&["calendar", "availability"])
    {
        Ok(items) => {
            stats.availability.fetched = items.len() as u64;
            import_blocks(store, organization_id, &query, &items, &mut stats).await;
        }
        Err(e) => {
            warn!(organization_id = %organization_id, error = %e, "availability fetch failed");
            stats.errors.push(format!("{GENERAL_ERROR_PREFIX}: disponibilidade: {e}"));
        }
    }

    match client
        .get_rates_calendar(&query)
        .await
        .into_list(&["rates", "calendar"])
    {
        Ok(items) => stats.rates.fetched = items.len() as u64,
        Err(e) => {
            warn!(organization_id = %organization_id, error = %e, "rates fetch failed");
            stats.errors.push(format!("{GENERAL_ERROR_PREFIX}: tarifas: {e}"));
        }
    }

    let success = stats.total_failed() == 0 && stats.errors.is_empty();
    info!(
        organization_id = %organization_id,
        success = success,
        availability = stats.availability.fetched,
        blocks_fetched = stats.blocks.fetched,
        blocks_created = stats.blocks.created,
        blocks_failed = stats.blocks.failed,
        rates = stats.rates.fetched,
        "Stays.net calendar sync finished"
    );

    CalendarOutcome { success, stats }
}

async fn import_blocks(
    store: &dyn SyncStore,
    organization_id: &str,
    query: &CalendarQuery,
    items: &[Value],
    stats: &mut CalendarStats,
) {
    for raw in items.iter().filter(|raw| mappers::is_block_item(raw)) {
        stats.blocks.fetched += 1;
        let result = match mappers::block_candidate(raw, query.property_id.as_deref()) {
            Ok(candidate) => write_block(store, organization_id, &candidate)
                .await
                .map_err(|e| (describe(&candidate), e)),
            Err(e) => Err(("?".to_string(), e)),
        };
        match result {
            Ok(BlockWrite::Created) => {
                stats.blocks.created += 1;
                metrics::counter!("staysnet.sync.records", "entity" => "block", "outcome" => "created")
                    .increment(1);
            }
            Ok(BlockWrite::AlreadyPresent) => {}
            Err((label, e)) => {
                warn!(block = %label, error = %e, "block import failed");
                stats.blocks.failed += 1;
                stats.errors.push(format!("Bloqueio {}: {}", label, e));
            }
        }
    }
}

fn describe(candidate: &BlockCandidate) -> String {
    format!(
        "{} {}..{}",
        candidate.listing_id.as_deref().unwrap_or("?"),
        candidate.start_date,
        candidate.end_date
    )
}

async fn write_block(
    store: &dyn SyncStore,
    organization_id: &str,
    candidate: &BlockCandidate,
) -> SyncResult<BlockWrite> {
    let listing_id = candidate
        .listing_id
        .as_deref()
        .ok_or_else(|| SyncError::MissingMapping("block has no listing id".to_string()))?;
    let property = store
        .find_property_by_code(organization_id, listing_id)
        .await?
        .ok_or_else(|| SyncError::MissingMapping(format!("listing {} was not imported", listing_id)))?;

    if store
        .find_block_by_range(organization_id, property.id, candidate.start_date, candidate.end_date)
        .await?
        .is_some()
    {
        debug!(property_id = %property.id, start = %candidate.start_date, "block already present");
        return Ok(BlockWrite::AlreadyPresent);
    }

    store
        .insert_block(&Block {
            id: Uuid::new_v4(),
            organization_id: organization_id.to_string(),
            property_id: property.id,
            start_date: candidate.start_date,
            end_date: candidate.end_date,
            nights: candidate.nights(),
            subtype: candidate.subtype,
            reason: candidate.reason.clone(),
            created_at: Utc::now(),
        })
        .await?;
    Ok(BlockWrite::Created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_is_ninety_days() {
        let query = CalendarSyncRequest::default().query(90);
        assert_eq!(query.end_date - query.start_date, Duration::days(90));
        assert!(query.property_id.is_none());
    }

    #[test]
    fn test_explicit_window_kept() {
        let request = CalendarSyncRequest {
            property_id: Some("L1".to_string()),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 31),
        };
        let query = request.query(90);
        assert_eq!(query.end_date, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert_eq!(query.property_id.as_deref(), Some("L1"));
    }
}
