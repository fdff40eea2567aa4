//! Internal data model shared by the Stays.net pipeline, the store and the API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ─── Guests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Guest {
    pub id: Uuid,
    pub organization_id: String,
    /// Stays.net client id (`_id`).
    pub external_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub cpf: Option<String>,
    pub passport: Option<String>,
    pub language: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Properties ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Active,
    Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Property {
    pub id: Uuid,
    pub organization_id: String,
    /// Stays.net listing id; the natural key of a synced property.
    pub code: String,
    pub name: String,
    pub property_type: String,
    pub status: PropertyStatus,
    pub address: Option<Address>,
    pub max_guests: u32,
    pub bedrooms: u32,
    pub beds: u32,
    pub bathrooms: u32,
    pub cover_photo: Option<String>,
    pub photos: Vec<String>,
    pub description: Option<String>,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Reservations ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::CheckedIn => "checked_in",
            ReservationStatus::CheckedOut => "checked_out",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses the reconciliation job keeps under watch.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending | ReservationStatus::Confirmed | ReservationStatus::CheckedIn
        )
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
pub struct GuestCounts {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub pets: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReservationPricing {
    pub price_per_night: f64,
    pub base_total: f64,
    pub cleaning_fee: f64,
    pub service_fee: f64,
    pub taxes: f64,
    pub total: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    pub id: Uuid,
    pub organization_id: String,
    /// Stays.net reservation id (`_id`). `None` for reservations created
    /// outside the channel sync.
    pub external_id: Option<String>,
    pub confirmation_code: Option<String>,
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub guests: GuestCounts,
    pub pricing: ReservationPricing,
    pub status: ReservationStatus,
    pub platform: String,
    pub notes: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Calendar ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BlockSubtype {
    Simple,
    Maintenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    pub id: Uuid,
    pub organization_id: String,
    pub property_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub nights: u32,
    pub subtype: BlockSubtype,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

// ─── Owners ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Owner {
    pub id: Uuid,
    pub organization_id: String,
    pub external_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub document: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Webhooks ───────────────────────────────────────────────────────────────

/// A Stays.net notification as received, queued until processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub organization_id: String,
    /// `reservation.created`, `reservation.deleted`, ... or `unknown`.
    pub action: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl WebhookEvent {
    /// Split a raw notification body into action and payload. Non-object
    /// bodies are kept whole under action `unknown`.
    pub fn received(organization_id: &str, body: serde_json::Value) -> Self {
        let (action, payload) = match body {
            serde_json::Value::Object(mut map) => {
                let action = map
                    .get("action")
                    .and_then(serde_json::Value::as_str)
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or("unknown")
                    .trim()
                    .to_string();
                let payload = match map.remove("payload") {
                    Some(payload) if !payload.is_null() => payload,
                    _ => serde_json::Value::Object(map),
                };
                (action, payload)
            }
            other => ("unknown".to_string(), other),
        };
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.to_string(),
            action,
            payload,
            received_at: Utc::now(),
            processed: false,
            processed_at: None,
            error_message: None,
        }
    }
}

// ─── Channel settings ───────────────────────────────────────────────────────

/// The `settings:staysnet` record. Read before every sync; `last_sync` is the
/// only field the pipeline writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaysNetSettings {
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    pub base_url: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub auto_sync_enabled: Option<bool>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

impl StaysNetSettings {
    pub fn auto_sync(&self) -> bool {
        self.enabled && self.auto_sync_enabled.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_webhook_envelope_is_split() {
        let event = WebhookEvent::received(
            "org-1",
            json!({"action": "reservation.modified", "_dt": "2025-03-01T10:00:00Z", "payload": {"_id": "R1"}}),
        );
        assert_eq!(event.action, "reservation.modified");
        assert_eq!(event.payload, json!({"_id": "R1"}));
        assert!(!event.processed);
    }

    #[test]
    fn test_webhook_without_envelope_keeps_body() {
        let event = WebhookEvent::received("org-1", json!({"_id": "R1"}));
        assert_eq!(event.action, "unknown");
        assert_eq!(event.payload, json!({"_id": "R1"}));

        let event = WebhookEvent::received("org-1", json!("not an object"));
        assert_eq!(event.action, "unknown");
        assert_eq!(event.payload, json!("not an object"));
    }
}
