//! Pure translation of Stays.net wire records into the internal model.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rendizy_core::ids::{internal_id, EntityKind};
use rendizy_core::types::{
    Address, BlockSubtype, Guest, GuestCounts, Owner, Property, PropertyStatus, Reservation,
    ReservationPricing, ReservationStatus,
};
use rendizy_core::{SyncError, SyncResult};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_PHONE: &str = "+55-00-00000-0000";
pub const DEFAULT_LANGUAGE: &str = "pt-BR";
pub const DEFAULT_CURRENCY: &str = "BRL";
pub const DEFAULT_PLATFORM: &str = "staysnet";
pub const GUEST_SOURCE: &str = "other";
pub const UNNAMED_PROPERTY: &str = "Propriedade sem nome";
const EMAIL_DOMAIN: &str = "staysnet.local";

const BLOCK_LIKE_TYPES: [&str; 5] = ["blocked", "maintenance", "unavailable", "owner_block", "owner"];

// ─── Field access ───────────────────────────────────────────────────────────

/// Non-empty string at `path` (dot-separated), numbers rendered as text.
pub fn str_at(raw: &Value, path: &str) -> Option<String> {
    match value_at(raw, path)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-empty string among `paths`.
pub fn first_str(raw: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|p| str_at(raw, p))
}

/// First non-zero number among `paths`. Numeric strings are accepted.
pub fn first_num(raw: &Value, paths: &[&str]) -> Option<f64> {
    paths.iter().find_map(|p| {
        let n = match value_at(raw, p)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        (n != 0.0 && n.is_finite()).then_some(n)
    })
}

fn value_at<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(raw, |node, key| node.get(key))
}

fn count_at(raw: &Value, paths: &[&str], default: u32) -> u32 {
    first_num(raw, paths)
        .map(|n| n.abs().floor() as u32)
        .unwrap_or(default)
}

fn cents_at(raw: &Value, paths: &[&str]) -> f64 {
    first_num(raw, paths).unwrap_or(0.0) / 100.0
}

/// Date part of an ISO date or timestamp.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn timestamp_at(raw: &Value, paths: &[&str]) -> Option<DateTime<Utc>> {
    let value = first_str(raw, paths)?;
    DateTime::parse_from_rfc3339(&value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The record's Stays.net id (`_id`, else `id`).
pub fn external_id(raw: &Value) -> Option<String> {
    first_str(raw, &["_id", "id"])
}

fn require_external_id(raw: &Value, entity: &str) -> SyncResult<String> {
    external_id(raw).ok_or_else(|| SyncError::Mapping(format!("{} without _id/id", entity)))
}

// ─── Status ─────────────────────────────────────────────────────────────────

pub fn is_block_like_type(kind: &str) -> bool {
    let kind = kind.trim().to_lowercase();
    BLOCK_LIKE_TYPES.contains(&kind.as_str())
}

/// Internal status for a wire reservation `type`.
pub fn derive_status(kind: Option<&str>) -> ReservationStatus {
    let kind = kind.map(|k| k.trim().to_lowercase()).unwrap_or_default();
    match kind.as_str() {
        "canceled" | "cancelled" | "cancelada" | "cancelado" => ReservationStatus::Cancelled,
        "booked" | "new" | "contract" | "confirmed" => ReservationStatus::Confirmed,
        "checked_in" | "checkedin" => ReservationStatus::CheckedIn,
        "checked_out" | "checkedout" => ReservationStatus::CheckedOut,
        k if is_block_like_type(k) => ReservationStatus::Confirmed,
        _ => ReservationStatus::Pending,
    }
}

// ─── Guests ─────────────────────────────────────────────────────────────────

pub fn map_guest(raw: &Value, organization_id: &str) -> SyncResult<Guest> {
    let external = require_external_id(raw, "client")?;
    let id = internal_id(EntityKind::Guest, &external);

    let name = str_at(raw, "name");
    let first = str_at(raw, "firstName");
    let last = str_at(raw, "lastName");

    let first_name = first.clone().unwrap_or_else(|| {
        name.as_deref()
            .and_then(|n| n.split_whitespace().next())
            .unwrap_or_default()
            .to_string()
    });
    let last_name = last.clone().unwrap_or_else(|| {
        name.as_deref()
            .map(|n| n.split_whitespace().skip(1).collect::<Vec<_>>().join(" "))
            .unwrap_or_default()
    });
    let full_name = name.unwrap_or_else(|| {
        format!("{} {}", first.unwrap_or_default(), last.unwrap_or_default())
            .trim()
            .to_string()
    });

    let email = str_at(raw, "email").unwrap_or_else(|| placeholder_email(&id));
    let now = Utc::now();

    Ok(Guest {
        id,
        organization_id: organization_id.to_string(),
        external_id: Some(external),
        first_name,
        last_name,
        full_name,
        email,
        phone: first_str(raw, &["phone", "telephone"]).unwrap_or_else(|| DEFAULT_PHONE.to_string()),
        cpf: first_str(raw, &["cpf", "document.cpf"]),
        passport: first_str(raw, &["passport", "document.passport"]),
        language: str_at(raw, "language").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        source: GUEST_SOURCE.to_string(),
        created_at: timestamp_at(raw, &["createdAt"]).unwrap_or(now),
        updated_at: now,
    })
}

fn placeholder_email(id: &Uuid) -> String {
    let simple = id.simple().to_string();
    format!("guest-{}@{}", &simple[..8], EMAIL_DOMAIN)
}

// ─── Properties ─────────────────────────────────────────────────────────────

pub fn map_listing(raw: &Value, organization_id: &str) -> SyncResult<Property> {
    let code = require_external_id(raw, "listing")?;
    let active = str_at(raw, "status").as_deref() == Some("active");
    let cover_photo = str_at(raw, "_t_mainImageMeta.url");
    let now = Utc::now();

    let address = raw.get("address").filter(|a| a.is_object()).map(|a| Address {
        street: str_at(a, "street").unwrap_or_default(),
        number: str_at(a, "streetNumber").unwrap_or_default(),
        complement: str_at(a, "additional"),
        neighborhood: str_at(a, "region").unwrap_or_default(),
        city: str_at(a, "city").unwrap_or_default(),
        state: first_str(a, &["stateCode", "state"]).unwrap_or_default(),
        zip_code: str_at(a, "zip").unwrap_or_default(),
        country: str_at(a, "countryCode").unwrap_or_else(|| "BR".to_string()),
    });

    Ok(Property {
        id: internal_id(EntityKind::Property, &code),
        organization_id: organization_id.to_string(),
        name: first_str(raw, &["_mstitle.pt_BR", "_mstitle.en_US", "internalName"])
            .unwrap_or_else(|| UNNAMED_PROPERTY.to_string()),
        code,
        property_type: "apartment".to_string(),
        status: if active { PropertyStatus::Active } else { PropertyStatus::Draft },
        address,
        max_guests: count_at(raw, &["_i_maxGuests"], 2),
        bedrooms: count_at(raw, &["_i_rooms"], 0),
        beds: count_at(raw, &["_i_beds"], 0),
        bathrooms: count_at(raw, &["_f_bathrooms"], 0),
        photos: cover_photo.iter().cloned().collect(),
        cover_photo,
        description: first_str(raw, &["_msdesc.pt_BR", "_msdesc.en_US"]),
        currency: str_at(raw, "deff_curr").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        is_active: active,
        created_at: timestamp_at(raw, &["createdAt"]).unwrap_or(now),
        updated_at: now,
    })
}

// ─── Reservations ───────────────────────────────────────────────────────────

/// Foreign keys of a wire reservation, resolved before mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRefs {
    pub external_id: String,
    pub listing_id: Option<String>,
    pub client_id: Option<String>,
    pub confirmation_code: Option<String>,
    pub kind: Option<String>,
}

pub fn reservation_refs(raw: &Value) -> SyncResult<ReservationRefs> {
    Ok(ReservationRefs {
        external_id: require_external_id(raw, "reservation")?,
        listing_id: first_str(raw, &["_idlisting", "listingId"]),
        client_id: first_str(raw, &["_idclient", "clientId"]),
        confirmation_code: first_str(raw, &["id", "code", "localizator"]),
        kind: str_at(raw, "type"),
    })
}

/// Check-in and check-out of a wire reservation.
pub fn reservation_dates(raw: &Value) -> Option<(NaiveDate, NaiveDate)> {
    let check_in = first_str(raw, &["checkInDate", "from", "check_in"])
        .as_deref()
        .and_then(parse_date)?;
    let check_out = first_str(raw, &["checkOutDate", "to", "check_out"])
        .as_deref()
        .and_then(parse_date)?;
    Some((check_in, check_out))
}

pub fn nights_between(start: NaiveDate, end: NaiveDate) -> u32 {
    ((end - start).num_days().unsigned_abs() as u32).max(1)
}

/// Map a wire reservation once its property and guest are resolved.
pub fn map_reservation(
    raw: &Value,
    organization_id: &str,
    property_id: Uuid,
    guest_id: Uuid,
) -> SyncResult<Reservation> {
    let refs = reservation_refs(raw)?;
    let (check_in, check_out) = reservation_dates(raw).ok_or_else(|| {
        SyncError::Mapping(format!("reservation {} has invalid dates", refs.external_id))
    })?;

    let max_guests = first_num(raw, &["_i_maxGuests"]).map(|n| n.abs().floor() as u32);
    let guests = GuestCounts {
        adults: count_at(raw, &["guests.adults", "guestsDetails.adults"], max_guests.unwrap_or(1)),
        children: count_at(raw, &["guests.children", "guestsDetails.children"], 0),
        infants: count_at(raw, &["guests.infants", "guestsDetails.infants"], 0),
        pets: count_at(raw, &["guests.pets", "guestsDetails.pets"], 0),
        total: count_at(raw, &["guests.total", "guestsDetails.total"], max_guests.unwrap_or(1)),
    };

    let pricing = ReservationPricing {
        price_per_night: cents_at(raw, &["price.hostingDetails._f_nightPrice", "_f_nightPrice"]),
        base_total: cents_at(raw, &["price.hostingDetails.baseTotal", "_f_total"]),
        cleaning_fee: cents_at(raw, &["price.hostingDetails.fees.cleaning"]),
        service_fee: cents_at(raw, &["price.hostingDetails.fees.service"]),
        taxes: cents_at(raw, &["price.hostingDetails.fees.tax"]),
        total: cents_at(raw, &["stats._f_totalPaid", "_f_total"]),
        currency: str_at(raw, "price.currency").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
    };

    let now = Utc::now();
    Ok(Reservation {
        id: internal_id(EntityKind::Reservation, &refs.external_id),
        organization_id: organization_id.to_string(),
        confirmation_code: refs.confirmation_code,
        status: derive_status(refs.kind.as_deref()),
        external_id: Some(refs.external_id),
        property_id,
        guest_id,
        check_in,
        check_out,
        nights: nights_between(check_in, check_out),
        guests,
        pricing,
        platform: first_str(raw, &["partner.name", "source"])
            .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
        notes: first_str(raw, &["notes", "specialRequests"]),
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        created_at: timestamp_at(raw, &["creationDate", "createdAt"]).unwrap_or(now),
        updated_at: now,
    })
}

// ─── Owners ─────────────────────────────────────────────────────────────────

pub fn map_owner(raw: &Value, organization_id: &str) -> SyncResult<Owner> {
    let external = require_external_id(raw, "owner")?;
    let name = first_str(raw, &["name", "fullName"]).unwrap_or_else(|| {
        format!(
            "{} {}",
            str_at(raw, "firstName").unwrap_or_default(),
            str_at(raw, "lastName").unwrap_or_default()
        )
        .trim()
        .to_string()
    });
    let now = Utc::now();

    Ok(Owner {
        id: internal_id(EntityKind::Owner, &external),
        organization_id: organization_id.to_string(),
        external_id: external,
        name,
        email: str_at(raw, "email"),
        phone: first_str(raw, &["phone", "telephone"]),
        document: first_str(raw, &["cpf", "document.cpf", "document"]),
        created_at: timestamp_at(raw, &["createdAt"]).unwrap_or(now),
        updated_at: now,
    })
}

// ─── Availability blocks ────────────────────────────────────────────────────

/// A blocked range from the availability calendar, before its property is
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCandidate {
    pub listing_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub subtype: BlockSubtype,
    pub reason: String,
}

impl BlockCandidate {
    pub fn nights(&self) -> u32 {
        nights_between(self.start_date, self.end_date)
    }
}

pub fn is_block_item(raw: &Value) -> bool {
    let status = str_at(raw, "status").map(|s| s.to_lowercase());
    matches!(status.as_deref(), Some("blocked") | Some("unavailable"))
        || raw.get("blocked").and_then(Value::as_bool) == Some(true)
}

/// Extract a block from an availability item. A missing end date makes a
/// single-night block.
pub fn block_candidate(raw: &Value, requested_listing: Option<&str>) -> SyncResult<BlockCandidate> {
    let start_date = first_str(raw, &["startDate", "start_date", "from", "date"])
        .as_deref()
        .and_then(parse_date)
        .ok_or_else(|| SyncError::Mapping("availability item without start date".to_string()))?;
    let end_date = first_str(raw, &["endDate", "end_date", "to"])
        .as_deref()
        .and_then(parse_date)
        .unwrap_or(start_date + Duration::days(1));

    let maintenance = str_at(raw, "type").map(|t| t.to_lowercase()).as_deref() == Some("maintenance");
    let (subtype, reason) = if maintenance {
        (BlockSubtype::Maintenance, "Manutenção (Stays.net)")
    } else {
        (BlockSubtype::Simple, "Bloqueio (Stays.net)")
    };

    Ok(BlockCandidate {
        listing_id: first_str(raw, &["propertyId", "listingId", "_idlisting"])
            .or_else(|| requested_listing.map(str::to_string)),
        start_date,
        end_date,
        subtype,
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ORG: &str = "org-1";

    #[test]
    fn test_derive_status_table() {
        assert_eq!(derive_status(Some("canceled")), ReservationStatus::Cancelled);
        assert_eq!(derive_status(Some("Cancelada")), ReservationStatus::Cancelled);
        assert_eq!(derive_status(Some("booked")), ReservationStatus::Confirmed);
        assert_eq!(derive_status(Some("contract")), ReservationStatus::Confirmed);
        assert_eq!(derive_status(Some("owner_block")), ReservationStatus::Confirmed);
        assert_eq!(derive_status(Some("checkedin")), ReservationStatus::CheckedIn);
        assert_eq!(derive_status(Some("checked_out")), ReservationStatus::CheckedOut);
        assert_eq!(derive_status(Some("reserved")), ReservationStatus::Pending);
        assert_eq!(derive_status(None), ReservationStatus::Pending);
    }

    #[test]
    fn test_map_guest_splits_name_and_defaults() {
        let guest = map_guest(&json!({"_id": "c1", "name": "Maria da Silva"}), ORG).unwrap();
        assert_eq!(guest.first_name, "Maria");
        assert_eq!(guest.last_name, "da Silva");
        assert_eq!(guest.full_name, "Maria da Silva");
        assert_eq!(guest.phone, DEFAULT_PHONE);
        assert_eq!(guest.language, "pt-BR");
        assert_eq!(guest.source, "other");
        assert!(guest.email.starts_with("guest-"));
        assert!(guest.email.ends_with("@staysnet.local"));
        assert_eq!(guest.email.len(), "guest-".len() + 8 + "@staysnet.local".len());
    }

    #[test]
    fn test_map_guest_reads_document_fields() {
        let raw = json!({
            "id": "c2",
            "firstName": "João",
            "lastName": "Souza",
            "email": "joao@example.com",
            "telephone": "+55 11 99999-0000",
            "document": {"cpf": "123.456.789-00"}
        });
        let guest = map_guest(&raw, ORG).unwrap();
        assert_eq!(guest.full_name, "João Souza");
        assert_eq!(guest.cpf.as_deref(), Some("123.456.789-00"));
        assert_eq!(guest.phone, "+55 11 99999-0000");
        assert_eq!(guest.external_id.as_deref(), Some("c2"));
    }

    #[test]
    fn test_map_guest_requires_id() {
        assert!(matches!(map_guest(&json!({"name": "x"}), ORG), Err(SyncError::Mapping(_))));
    }

    #[test]
    fn test_map_listing_defaults() {
        let property = map_listing(&json!({"_id": "L1", "_f_bathrooms": 1.5}), ORG).unwrap();
        assert_eq!(property.name, UNNAMED_PROPERTY);
        assert_eq!(property.status, PropertyStatus::Draft);
        assert_eq!(property.max_guests, 2);
        assert_eq!(property.bathrooms, 1);
        assert_eq!(property.currency, "BRL");
        assert!(property.address.is_none());
        assert_eq!(property.code, "L1");
    }

    #[test]
    fn test_map_listing_full() {
        let raw = json!({
            "_id": "L2",
            "status": "active",
            "_mstitle": {"en_US": "Beach House"},
            "_i_maxGuests": 6,
            "_t_mainImageMeta": {"url": "https://img/1.jpg"},
            "address": {"city": "Rio de Janeiro", "stateCode": "RJ"}
        });
        let property = map_listing(&raw, ORG).unwrap();
        assert_eq!(property.name, "Beach House");
        assert!(property.is_active);
        assert_eq!(property.max_guests, 6);
        assert_eq!(property.photos, vec!["https://img/1.jpg".to_string()]);
        let address = property.address.unwrap();
        assert_eq!(address.state, "RJ");
        assert_eq!(address.country, "BR");
    }

    #[test]
    fn test_map_reservation_money_and_nights() {
        let raw = json!({
            "_id": "R1",
            "id": "AB12C",
            "type": "booked",
            "checkInDate": "2025-03-10T14:00:00.000Z",
            "checkOutDate": "2025-03-13",
            "guests": {"adults": 2, "children": 1},
            "_i_maxGuests": 4,
            "price": {"currency": "USD", "hostingDetails": {"_f_nightPrice": 25000, "fees": {"cleaning": 8000}}},
            "stats": {"_f_totalPaid": 83000},
            "partner": {"name": "Airbnb"}
        });
        let property_id = Uuid::new_v4();
        let guest_id = Uuid::new_v4();
        let reservation = map_reservation(&raw, ORG, property_id, guest_id).unwrap();

        assert_eq!(reservation.nights, 3);
        assert_eq!(reservation.check_in, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.pricing.price_per_night, 250.0);
        assert_eq!(reservation.pricing.cleaning_fee, 80.0);
        assert_eq!(reservation.pricing.total, 830.0);
        assert_eq!(reservation.pricing.currency, "USD");
        assert_eq!(reservation.guests.adults, 2);
        assert_eq!(reservation.guests.total, 4);
        assert_eq!(reservation.platform, "Airbnb");
        assert_eq!(reservation.confirmation_code.as_deref(), Some("AB12C"));
        assert_eq!(reservation.external_id.as_deref(), Some("R1"));
        assert_eq!(reservation.property_id, property_id);
    }

    #[test]
    fn test_same_day_reservation_is_one_night() {
        let raw = json!({"_id": "R2", "from": "2025-05-01", "to": "2025-05-01"});
        let reservation = map_reservation(&raw, ORG, Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert_eq!(reservation.nights, 1);
        assert_eq!(reservation.platform, "staysnet");
        assert_eq!(reservation.status, ReservationStatus::Pending);
    }

    #[test]
    fn test_invalid_dates_are_rejected() {
        let raw = json!({"_id": "R3", "checkInDate": "soon", "checkOutDate": "2025-05-01"});
        let err = map_reservation(&raw, ORG, Uuid::new_v4(), Uuid::new_v4()).unwrap_err();
        assert!(err.to_string().contains("R3"));
    }

    #[test]
    fn test_reservation_refs() {
        let refs = reservation_refs(&json!({"_id": "R4", "listingId": "L9", "_idclient": "C9"})).unwrap();
        assert_eq!(refs.listing_id.as_deref(), Some("L9"));
        assert_eq!(refs.client_id.as_deref(), Some("C9"));
    }

    #[test]
    fn test_map_owner() {
        let owner = map_owner(
            &json!({"_id": "O1", "firstName": "Ana", "lastName": "Lima", "document": "987"}),
            ORG,
        )
        .unwrap();
        assert_eq!(owner.name, "Ana Lima");
        assert_eq!(owner.document.as_deref(), Some("987"));
        assert_eq!(owner.external_id, "O1");
    }

    #[test]
    fn test_block_detection_and_subtype() {
        assert!(is_block_item(&json!({"status": "blocked"})));
        assert!(is_block_item(&json!({"status": "Unavailable"})));
        assert!(is_block_item(&json!({"blocked": true})));
        assert!(!is_block_item(&json!({"status": "available", "blocked": false})));

        let block = block_candidate(
            &json!({"startDate": "2025-06-01", "endDate": "2025-06-04", "type": "maintenance"}),
            Some("L1"),
        )
        .unwrap();
        assert_eq!(block.subtype, BlockSubtype::Maintenance);
        assert_eq!(block.reason, "Manutenção (Stays.net)");
        assert_eq!(block.listing_id.as_deref(), Some("L1"));
        assert_eq!(block.nights(), 3);

        let single = block_candidate(&json!({"date": "2025-06-10", "listingId": "L2"}), None).unwrap();
        assert_eq!(single.subtype, BlockSubtype::Simple);
        assert_eq!(single.end_date, NaiveDate::from_ymd_opt(2025, 6, 11).unwrap());
        assert_eq!(single.listing_id.as_deref(), Some("L2"));
    }
}
