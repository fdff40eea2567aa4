use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rendizy_core::types::StaysNetSettings;
use rendizy_core::{SyncError, SyncResult};
use serde_json::Value;

use crate::payload::EntityList;

/// Result of one channel call. Transport and HTTP failures are folded into
/// `success = false` with a readable `error`, so callers decide whether a
/// failure is phase-fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelResponse {
    pub success: bool,
    pub status: u16,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ChannelResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            status: 200,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(status: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }

    /// Decode the payload into a flat list, failing when the call failed.
    pub fn into_list(self, entity_keys: &[&str]) -> SyncResult<Vec<Value>> {
        if !self.success {
            return Err(SyncError::Channel(self.error_message()));
        }
        Ok(EntityList::decode(self.data.as_ref(), entity_keys)?.into_items())
    }
}

/// Outcome of looking up one reservation by its channel id.
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationLookup {
    Found(Value),
    NotFound,
    Error(String),
}

/// Which date the reservations listing filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateType {
    Arrival,
    Departure,
    Creation,
}

impl DateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateType::Arrival => "arrival",
            DateType::Departure => "departure",
            DateType::Creation => "creation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub date_type: DateType,
}

impl ReservationQuery {
    pub fn arrival(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            date_type: DateType::Arrival,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Stays.net listing id; `None` for every property.
    pub property_id: Option<String>,
}

/// The Stays.net surface the sync jobs consume. Collection calls return every
/// page.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    async fn get_clients(&self) -> ChannelResponse;

    async fn get_listings(&self) -> ChannelResponse;

    async fn get_reservations(&self, query: &ReservationQuery) -> ChannelResponse;

    async fn get_reservation(&self, external_id: &str) -> ReservationLookup;

    async fn get_availability_calendar(&self, query: &CalendarQuery) -> ChannelResponse;

    async fn get_rates_calendar(&self, query: &CalendarQuery) -> ChannelResponse;

    async fn get_owners(&self) -> ChannelResponse;

    /// One lightweight authenticated call that proves the credentials work.
    async fn test_connection(&self) -> ChannelResponse;
}

/// Builds channel clients from stored settings. Implementations share their
/// connection pool across the clients they hand out.
pub trait ChannelProvider: Send + Sync {
    fn client(&self, settings: &StaysNetSettings) -> SyncResult<Arc<dyn ChannelClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_response_is_channel_error() {
        let response = ChannelResponse::failure(503, "Service Unavailable");
        let err = response.into_list(&["clients"]).unwrap_err();
        assert!(matches!(err, SyncError::Channel(ref m) if m == "Service Unavailable"));
    }

    #[test]
    fn test_ok_response_decodes_list() {
        let response = ChannelResponse::ok(json!({"data": [{"_id": "1"}]}));
        let items = response.into_list(&["clients"]).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_error_message_falls_back_to_status() {
        let response = ChannelResponse {
            success: false,
            status: 418,
            data: None,
            error: None,
        };
        assert_eq!(response.error_message(), "HTTP 418");
    }
}
