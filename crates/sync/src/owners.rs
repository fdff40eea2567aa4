use rendizy_core::stats::{OwnersOutcome, OwnersStats};
use rendizy_staysnet::mappers;
use rendizy_staysnet::ChannelClient;
use rendizy_store::SyncStore;
use tracing::{info, warn};

use crate::upsert::upsert_owner;

/// Import owners. An unavailable endpoint ends the run immediately with no
/// stats; per-record failures are counted and skipped.
pub async fn run_owners_sync(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
) -> OwnersOutcome {
    let response = client.get_owners().await;
    if !response.success {
        let message = response.error_message();
        warn!(organization_id = %organization_id, error = %message, "owners endpoint unavailable");
        return OwnersOutcome {
            success: false,
            stats: None,
            error: Some(message),
        };
    }

    let owners = match response.into_list(&["owners"]) {
        Ok(owners) => owners,
        Err(e) => {
            warn!(organization_id = %organization_id, error = %e, "owners response not decodable");
            return OwnersOutcome {
                success: false,
                stats: None,
                error: Some(e.to_string()),
            };
        }
    };

    let mut stats = OwnersStats::default();
    stats.owners.fetched = owners.len() as u64;

    for raw in &owners {
        let label = mappers::external_id(raw).unwrap_or_else(|| "?".to_string());
        let result = match mappers::map_owner(raw, organization_id) {
            Ok(owner) => upsert_owner(store, owner).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(upserted) => upserted.record(&mut stats.owners),
            Err(e) => {
                warn!(owner_id = %label, error = %e, "owner import failed");
                stats.owners.failed += 1;
                stats.errors.push(format!("Proprietário {}: {}", label, e));
            }
        }
    }

    info!(
        organization_id = %organization_id,
        fetched = stats.owners.fetched,
        created = stats.owners.created,
        updated = stats.owners.updated,
        failed = stats.owners.failed,
        "Stays.net owners sync finished"
    );

    OwnersOutcome {
        success: stats.owners.failed == 0,
        stats: Some(stats),
        error: None,
    }
}
