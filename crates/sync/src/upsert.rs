//! Select-by-natural-key then insert or update, shared by every job.

use rendizy_core::stats::Upserted;
use rendizy_core::types::{Guest, Owner, Property, Reservation};
use rendizy_core::{SyncError, SyncResult};
use rendizy_staysnet::mappers;
use rendizy_store::SyncStore;
use serde_json::Value;
use uuid::Uuid;

/// Upsert a guest matched by email, then id, then cpf. Returns the id the
/// guest is stored under, which is the existing row's id on update.
///
/// Two channel clients sharing an email share one row; the row keeps the
/// channel id it was first stored with.
pub async fn upsert_guest(store: &dyn SyncStore, mut guest: Guest) -> SyncResult<(Upserted, Uuid)> {
    let org = guest.organization_id.clone();

    let mut existing = store.find_guest_by_email(&org, &guest.email).await?;
    let matched_by_email = existing.is_some();
    if existing.is_none() {
        existing = store.find_guest_by_id(&org, guest.id).await?;
    }
    if existing.is_none() {
        if let Some(cpf) = guest.cpf.as_deref() {
            existing = store.find_guest_by_cpf(&org, cpf).await?;
        }
    }

    match existing {
        Some(current) => {
            guest.id = current.id;
            guest.created_at = current.created_at;
            if matched_by_email && current.external_id.is_some() {
                guest.external_id = current.external_id;
            }
            store.update_guest(&guest).await?;
            Ok((Upserted::Updated, guest.id))
        }
        None => {
            store.insert_guest(&guest).await?;
            Ok((Upserted::Created, guest.id))
        }
    }
}

/// Upsert a property matched by id, then by listing code.
pub async fn upsert_property(store: &dyn SyncStore, mut property: Property) -> SyncResult<(Upserted, Uuid)> {
    let org = property.organization_id.clone();

    let existing = match store.find_property(&org, property.id).await? {
        Some(found) => Some(found),
        None => store.find_property_by_code(&org, &property.code).await?,
    };

    match existing {
        Some(current) => {
            property.id = current.id;
            property.created_at = current.created_at;
            store.update_property(&property).await?;
            Ok((Upserted::Updated, property.id))
        }
        None => {
            store.insert_property(&property).await?;
            Ok((Upserted::Created, property.id))
        }
    }
}

/// Upsert a reservation matched by external id, then by id.
pub async fn upsert_reservation(store: &dyn SyncStore, mut reservation: Reservation) -> SyncResult<(Upserted, Uuid)> {
    let org = reservation.organization_id.clone();

    let by_external = match reservation.external_id.as_deref() {
        Some(external) => store.find_reservation_by_external_id(&org, external).await?,
        None => None,
    };
    let existing = match by_external {
        Some(found) => Some(found),
        None => store.find_reservation(&org, reservation.id).await?,
    };

    match existing {
        Some(current) => {
            reservation.id = current.id;
            reservation.created_at = current.created_at;
            store.update_reservation(&reservation).await?;
            Ok((Upserted::Updated, reservation.id))
        }
        None => {
            store.insert_reservation(&reservation).await?;
            Ok((Upserted::Created, reservation.id))
        }
    }
}

pub async fn upsert_owner(store: &dyn SyncStore, mut owner: Owner) -> SyncResult<Upserted> {
    match store.find_owner(&owner.organization_id, owner.id).await? {
        Some(current) => {
            owner.created_at = current.created_at;
            store.update_owner(&owner).await?;
            Ok(Upserted::Updated)
        }
        None => {
            store.insert_owner(&owner).await?;
            Ok(Upserted::Created)
        }
    }
}

/// Upsert a wire reservation whose property and guest are looked up in the
/// store rather than in a run's [`IdMapping`](crate::IdMapping).
///
/// The property must already be stored. The guest is the one stored under
/// the reservation's client id; failing that, the embedded `client` (or
/// `guest`) object is written as a guest first.
pub async fn upsert_remote_reservation(
    store: &dyn SyncStore,
    organization_id: &str,
    raw: &Value,
) -> SyncResult<(Upserted, Uuid)> {
    let refs = mappers::reservation_refs(raw)?;

    let listing_id = refs
        .listing_id
        .ok_or_else(|| SyncError::MissingMapping("reservation has no listing id".to_string()))?;
    let property = store
        .find_property_by_code(organization_id, &listing_id)
        .await?
        .ok_or_else(|| SyncError::MissingMapping(format!("listing {} was not imported", listing_id)))?;

    let guest_id = resolve_guest(store, organization_id, raw, refs.client_id.as_deref()).await?;

    let reservation = mappers::map_reservation(raw, organization_id, property.id, guest_id)?;
    upsert_reservation(store, reservation).await
}

async fn resolve_guest(
    store: &dyn SyncStore,
    organization_id: &str,
    raw: &Value,
    client_id: Option<&str>,
) -> SyncResult<Uuid> {
    if let Some(client_id) = client_id {
        if let Some(guest) = store.find_guest_by_external_id(organization_id, client_id).await? {
            return Ok(guest.id);
        }
    }

    let Some(mut embedded) = ["client", "guest"]
        .iter()
        .find_map(|key| raw.get(*key).filter(|v| v.is_object()))
        .cloned()
    else {
        return Err(SyncError::MissingMapping(match client_id {
            Some(id) => format!("client {} was not imported", id),
            None => "reservation has no client id".to_string(),
        }));
    };

    if mappers::external_id(&embedded).is_none() {
        let (Some(id), Some(fields)) = (client_id, embedded.as_object_mut()) else {
            return Err(SyncError::Mapping("embedded client without _id/id".to_string()));
        };
        fields.insert("_id".to_string(), Value::String(id.to_string()));
    }

    let guest = mappers::map_guest(&embedded, organization_id)?;
    let (_, guest_id) = upsert_guest(store, guest).await?;
    Ok(guest_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendizy_store::MemoryStore;
    use serde_json::json;

    const ORG: &str = "org-upsert";

    async fn store_with_listing() -> MemoryStore {
        let store = MemoryStore::new();
        let property = mappers::map_listing(&json!({"_id": "L1", "status": "active"}), ORG).unwrap();
        store.insert_property(&property).await.unwrap();
        store
    }

    fn booking(client: Value) -> Value {
        let mut raw = json!({
            "_id": "R50",
            "type": "booked",
            "_idlisting": "L1",
            "_idclient": "c50",
            "checkInDate": "2025-05-10",
            "checkOutDate": "2025-05-12"
        });
        if !client.is_null() {
            raw["client"] = client;
        }
        raw
    }

    #[tokio::test]
    async fn test_shared_email_keeps_first_channel_id() {
        let store = MemoryStore::new();
        let first = mappers::map_guest(&json!({"_id": "c1", "name": "Ana Lima", "email": "casa@example.com"}), ORG).unwrap();
        let second = mappers::map_guest(&json!({"_id": "c2", "name": "Ana L.", "email": "casa@example.com"}), ORG).unwrap();

        let (_, first_id) = upsert_guest(&store, first).await.unwrap();
        let (upserted, second_id) = upsert_guest(&store, second).await.unwrap();

        assert_eq!(upserted, Upserted::Updated);
        assert_eq!(first_id, second_id);
        let row = store.find_guest_by_external_id(ORG, "c1").await.unwrap().unwrap();
        assert_eq!(row.id, first_id);
        assert_eq!(row.full_name, "Ana L.");
        assert!(store.find_guest_by_external_id(ORG, "c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remote_reservation_creates_embedded_client() {
        let store = store_with_listing().await;
        let raw = booking(json!({"_id": "c50", "name": "Pedro Alves", "email": "pedro@example.com"}));

        let (upserted, id) = upsert_remote_reservation(&store, ORG, &raw).await.unwrap();

        assert_eq!(upserted, Upserted::Created);
        let guest = store.find_guest_by_external_id(ORG, "c50").await.unwrap().unwrap();
        assert_eq!(guest.email, "pedro@example.com");
        let reservation = store.find_reservation(ORG, id).await.unwrap().unwrap();
        assert_eq!(reservation.guest_id, guest.id);
    }

    #[tokio::test]
    async fn test_embedded_client_without_id_takes_reservation_client_id() {
        let store = store_with_listing().await;
        let raw = booking(json!({"name": "Pedro Alves"}));

        upsert_remote_reservation(&store, ORG, &raw).await.unwrap();

        assert!(store.find_guest_by_external_id(ORG, "c50").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_client_without_embedded_data_fails() {
        let store = store_with_listing().await;

        let err = upsert_remote_reservation(&store, ORG, &booking(Value::Null)).await.unwrap_err();

        assert!(matches!(err, SyncError::MissingMapping(ref m) if m.contains("c50")));
        assert_eq!(store.count_guests(ORG).await.unwrap(), 0);
        assert!(store.find_reservation_by_external_id(ORG, "R50").await.unwrap().is_none());
    }
}
