//! Stays.net webhook queue.
//!
//! Notifications are stored as they arrive and applied later, oldest first.
//! Each `reservation.*` event is re-read from the channel and upserted the
//! same way the missing-reservation import does; deletions and cancellations
//! cancel the local copy. Every drained event is marked processed, with the
//! error message when it could not be applied.

use chrono::Utc;
use rendizy_core::stats::WebhookStats;
use rendizy_core::types::{ReservationStatus, WebhookEvent};
use rendizy_core::{SyncError, SyncResult};
use rendizy_staysnet::mappers;
use rendizy_staysnet::{ChannelClient, ReservationLookup};
use rendizy_store::SyncStore;
use serde_json::Value;
use tracing::{info, warn};

use crate::upsert::upsert_remote_reservation;

/// Value written to `cancelled_by` when a webhook cancels a reservation.
pub const WEBHOOK_ACTOR: &str = "staysnet-webhook";
pub const DEFAULT_WEBHOOK_LIMIT: usize = 25;
pub const MAX_WEBHOOK_LIMIT: usize = 200;
const CANCELLATION_REASON: &str = "Cancelada na Stays.net (webhook)";

/// Events drained per call, `25` unless given, always within `1..=200`.
pub fn webhook_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_WEBHOOK_LIMIT)
        .clamp(1, MAX_WEBHOOK_LIMIT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Updated,
    Skipped,
}

impl Applied {
    fn as_str(&self) -> &'static str {
        match self {
            Applied::Updated => "updated",
            Applied::Skipped => "skipped",
        }
    }
}

/// Apply up to `limit` pending events. Fails only when the queue itself
/// cannot be read.
pub async fn run_webhook_processing(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    limit: usize,
) -> SyncResult<WebhookStats> {
    let pending = store.list_pending_webhooks(organization_id, limit).await?;
    let mut stats = WebhookStats::default();

    for event in &pending {
        stats.processed += 1;
        let error = match apply(client, store, organization_id, event).await {
            Ok(applied) => {
                match applied {
                    Applied::Updated => stats.updated += 1,
                    Applied::Skipped => stats.skipped += 1,
                }
                metrics::counter!("staysnet.webhooks.processed", "outcome" => applied.as_str()).increment(1);
                None
            }
            Err(e) => {
                warn!(webhook_id = %event.id, action = %event.action, error = %e, "webhook not applied");
                stats.errors += 1;
                metrics::counter!("staysnet.webhooks.processed", "outcome" => "error").increment(1);
                Some(e.to_string())
            }
        };

        // An event that cannot be marked stays pending for the next drain.
        if let Err(e) = store.mark_webhook_processed(event.id, error).await {
            warn!(webhook_id = %event.id, error = %e, "failed to mark webhook processed");
        }
    }

    info!(
        organization_id = %organization_id,
        processed = stats.processed,
        updated = stats.updated,
        skipped = stats.skipped,
        errors = stats.errors,
        "Stays.net webhooks processed"
    );

    Ok(stats)
}

async fn apply(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    event: &WebhookEvent,
) -> SyncResult<Applied> {
    let action = event.action.trim();
    if !action.starts_with("reservation.") {
        return Ok(Applied::Skipped);
    }

    let reservation_id = reservation_id(&event.payload)
        .ok_or_else(|| SyncError::Mapping("webhook payload has no reservation id".to_string()))?;

    // Deleted reservations are usually gone from the API already.
    if action == "reservation.deleted" {
        return cancel_local(store, organization_id, &reservation_id).await;
    }
    let cancels = matches!(action, "reservation.canceled" | "reservation.cancelled");

    match client.get_reservation(&reservation_id).await {
        ReservationLookup::Found(remote) => {
            let kind = mappers::str_at(&remote, "type");
            if kind.as_deref().is_some_and(mappers::is_block_like_type) {
                return Ok(Applied::Skipped);
            }
            upsert_remote_reservation(store, organization_id, &remote).await?;
            Ok(Applied::Updated)
        }
        ReservationLookup::NotFound | ReservationLookup::Error(_) if cancels => {
            cancel_local(store, organization_id, &reservation_id).await
        }
        ReservationLookup::NotFound => Err(SyncError::NotFound(format!(
            "reservation {} on Stays.net",
            reservation_id
        ))),
        ReservationLookup::Error(message) => Err(SyncError::Channel(message)),
    }
}

async fn cancel_local(store: &dyn SyncStore, organization_id: &str, external_id: &str) -> SyncResult<Applied> {
    let Some(mut reservation) = store
        .find_reservation_by_external_id(organization_id, external_id)
        .await?
    else {
        return Ok(Applied::Skipped);
    };
    if reservation.status == ReservationStatus::Cancelled {
        return Ok(Applied::Skipped);
    }

    let now = Utc::now();
    reservation.status = ReservationStatus::Cancelled;
    reservation.cancelled_at = Some(now);
    reservation.cancelled_by = Some(WEBHOOK_ACTOR.to_string());
    reservation.cancellation_reason = Some(CANCELLATION_REASON.to_string());
    reservation.updated_at = now;
    store.update_reservation(&reservation).await?;
    Ok(Applied::Updated)
}

/// Stays.net reservation id carried by a webhook payload, looking through
/// the usual envelopes.
fn reservation_id(payload: &Value) -> Option<String> {
    let inner = ["payload", "data", "booking"]
        .iter()
        .find_map(|key| payload.get(*key).filter(|v| v.is_object()))
        .unwrap_or(payload);
    mappers::first_str(
        inner,
        &[
            "_id",
            "reservationId",
            "reserveId",
            "_idreservation",
            "id",
            "confirmationCode",
            "reservation._id",
            "reservation.id",
        ],
    )
}
