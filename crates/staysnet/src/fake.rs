//! In-process stand-in for the Stays.net API.
//!
//! `FakeChannel` serves canned collections in a configurable wire shape,
//! answers single-reservation lookups from a mutable remote table, and can be
//! told to fail any endpoint. State lives in `DashMap`s so a test can change
//! the remote side between two runs while the sync code holds the client.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use rendizy_core::types::StaysNetSettings;
use rendizy_core::SyncResult;
use serde_json::{json, Value};

use crate::client::{
    CalendarQuery, ChannelClient, ChannelProvider, ChannelResponse, DateType, ReservationLookup,
    ReservationQuery,
};
use crate::mappers::{external_id, first_str, parse_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Clients,
    Listings,
    Reservations,
    Reservation,
    Availability,
    Rates,
    Owners,
}

impl Endpoint {
    fn entity_key(&self) -> &'static str {
        match self {
            Endpoint::Clients => "clients",
            Endpoint::Listings => "listings",
            Endpoint::Reservations | Endpoint::Reservation => "reservations",
            Endpoint::Availability => "calendar",
            Endpoint::Rates => "rates",
            Endpoint::Owners => "owners",
        }
    }
}

/// Wire shape the fake wraps its collections in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    #[default]
    Bare,
    Keyed,
    Wrapped,
}

#[derive(Default)]
pub struct FakeChannel {
    shape: ResponseShape,
    collections: DashMap<Endpoint, Vec<Value>>,
    remote: DashMap<String, Value>,
    lookup_errors: DashMap<String, String>,
    failures: DashMap<Endpoint, String>,
    calls: DashMap<Endpoint, usize>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_clients(self, clients: Vec<Value>) -> Self {
        self.collections.insert(Endpoint::Clients, clients);
        self
    }

    pub fn with_listings(self, listings: Vec<Value>) -> Self {
        self.collections.insert(Endpoint::Listings, listings);
        self
    }

    /// Reservations are listed by the collection call and also become
    /// visible to single lookups.
    pub fn with_reservations(self, reservations: Vec<Value>) -> Self {
        for reservation in &reservations {
            if let Some(id) = external_id(reservation) {
                self.remote.insert(id, reservation.clone());
            }
        }
        self.collections.insert(Endpoint::Reservations, reservations);
        self
    }

    /// Without this the owners endpoint answers 404.
    pub fn with_owners(self, owners: Vec<Value>) -> Self {
        self.collections.insert(Endpoint::Owners, owners);
        self
    }

    pub fn with_availability(self, items: Vec<Value>) -> Self {
        self.collections.insert(Endpoint::Availability, items);
        self
    }

    pub fn with_rates(self, items: Vec<Value>) -> Self {
        self.collections.insert(Endpoint::Rates, items);
        self
    }

    pub fn failing(self, endpoint: Endpoint, message: &str) -> Self {
        self.fail(endpoint, message);
        self
    }

    pub fn fail(&self, endpoint: Endpoint, message: &str) {
        self.failures.insert(endpoint, message.to_string());
    }

    pub fn recover(&self, endpoint: Endpoint) {
        self.failures.remove(&endpoint);
    }

    /// Add a reservation to the listing and to lookups after construction.
    pub fn push_reservation(&self, reservation: Value) {
        self.set_remote(reservation.clone());
        self.collections
            .entry(Endpoint::Reservations)
            .or_default()
            .push(reservation);
    }

    /// Replace or add the remote copy of a reservation.
    pub fn set_remote(&self, reservation: Value) {
        if let Some(id) = external_id(&reservation) {
            self.remote.insert(id, reservation);
        }
    }

    /// Remove a reservation from the remote side; lookups return not found.
    pub fn delete_remote(&self, external_id: &str) {
        self.remote.remove(external_id);
    }

    pub fn set_lookup_error(&self, external_id: &str, message: &str) {
        self.lookup_errors
            .insert(external_id.to_string(), message.to_string());
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.calls.get(&endpoint).map(|c| *c).unwrap_or(0)
    }

    fn track(&self, endpoint: Endpoint) -> Option<ChannelResponse> {
        *self.calls.entry(endpoint).or_insert(0) += 1;
        self.failures
            .get(&endpoint)
            .map(|message| ChannelResponse::failure(500, message.value().clone()))
    }

    fn respond(&self, endpoint: Endpoint, items: Vec<Value>) -> ChannelResponse {
        let data = match self.shape {
            ResponseShape::Bare => Value::Array(items),
            ResponseShape::Keyed => {
                let mut map = serde_json::Map::new();
                map.insert(endpoint.entity_key().to_string(), Value::Array(items));
                Value::Object(map)
            }
            ResponseShape::Wrapped => {
                let total = items.len();
                json!({ "data": items, "total": total })
            }
        };
        ChannelResponse::ok(data)
    }

    fn collection(&self, endpoint: Endpoint) -> Vec<Value> {
        self.collections
            .get(&endpoint)
            .map(|items| items.value().clone())
            .unwrap_or_default()
    }
}

fn in_window(raw: &Value, paths: &[&str], start: NaiveDate, end: NaiveDate) -> bool {
    match first_str(raw, paths).as_deref().and_then(parse_date) {
        Some(date) => date >= start && date <= end,
        None => true,
    }
}

#[async_trait]
impl ChannelClient for FakeChannel {
    async fn get_clients(&self) -> ChannelResponse {
        if let Some(failure) = self.track(Endpoint::Clients) {
            return failure;
        }
        self.respond(Endpoint::Clients, self.collection(Endpoint::Clients))
    }

    async fn get_listings(&self) -> ChannelResponse {
        if let Some(failure) = self.track(Endpoint::Listings) {
            return failure;
        }
        self.respond(Endpoint::Listings, self.collection(Endpoint::Listings))
    }

    async fn get_reservations(&self, query: &ReservationQuery) -> ChannelResponse {
        if let Some(failure) = self.track(Endpoint::Reservations) {
            return failure;
        }
        let paths: &[&str] = match query.date_type {
            DateType::Arrival => &["checkInDate", "from", "check_in"],
            DateType::Departure => &["checkOutDate", "to", "check_out"],
            DateType::Creation => &["creationDate", "createdAt"],
        };
        let items = self
            .collection(Endpoint::Reservations)
            .into_iter()
            .filter(|r| in_window(r, paths, query.start_date, query.end_date))
            .collect();
        self.respond(Endpoint::Reservations, items)
    }

    async fn get_reservation(&self, external_id: &str) -> ReservationLookup {
        if let Some(failure) = self.track(Endpoint::Reservation) {
            return ReservationLookup::Error(failure.error_message());
        }
        if let Some(message) = self.lookup_errors.get(external_id) {
            return ReservationLookup::Error(message.value().clone());
        }
        match self.remote.get(external_id) {
            Some(reservation) => ReservationLookup::Found(reservation.value().clone()),
            None => ReservationLookup::NotFound,
        }
    }

    async fn get_availability_calendar(&self, query: &CalendarQuery) -> ChannelResponse {
        if let Some(failure) = self.track(Endpoint::Availability) {
            return failure;
        }
        let items = self
            .collection(Endpoint::Availability)
            .into_iter()
            .filter(|item| match &query.property_id {
                Some(id) => first_str(item, &["propertyId", "listingId", "_idlisting"])
                    .map_or(true, |listing| &listing == id),
                None => true,
            })
            .collect();
        self.respond(Endpoint::Availability, items)
    }

    async fn get_rates_calendar(&self, _query: &CalendarQuery) -> ChannelResponse {
        if let Some(failure) = self.track(Endpoint::Rates) {
            return failure;
        }
        self.respond(Endpoint::Rates, self.collection(Endpoint::Rates))
    }

    async fn get_owners(&self) -> ChannelResponse {
        if let Some(failure) = self.track(Endpoint::Owners) {
            return failure;
        }
        if !self.collections.contains_key(&Endpoint::Owners) {
            return ChannelResponse::failure(404, "Endpoint not available");
        }
        self.respond(Endpoint::Owners, self.collection(Endpoint::Owners))
    }

    async fn test_connection(&self) -> ChannelResponse {
        if let Some(failure) = self.track(Endpoint::Listings) {
            return failure;
        }
        let first = self.collection(Endpoint::Listings).into_iter().take(1).collect();
        self.respond(Endpoint::Listings, first)
    }
}

/// Provider that always hands out the same [`FakeChannel`].
pub struct FakeProvider {
    channel: Arc<FakeChannel>,
}

impl FakeProvider {
    pub fn new(channel: Arc<FakeChannel>) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> Arc<FakeChannel> {
        Arc::clone(&self.channel)
    }
}

impl ChannelProvider for FakeProvider {
    fn client(&self, _settings: &StaysNetSettings) -> SyncResult<Arc<dyn ChannelClient>> {
        Ok(self.channel.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_shapes_and_failures() {
        let fake = FakeChannel::new()
            .with_shape(ResponseShape::Keyed)
            .with_clients(vec![json!({"_id": "c1"})]);

        let response = fake.get_clients().await;
        assert_eq!(response.data, Some(json!({"clients": [{"_id": "c1"}]})));

        fake.fail(Endpoint::Clients, "boom");
        assert!(!fake.get_clients().await.success);
        fake.recover(Endpoint::Clients);
        assert!(fake.get_clients().await.success);
        assert_eq!(fake.calls(Endpoint::Clients), 3);
    }

    #[tokio::test]
    async fn test_reservation_window_and_lookup() {
        let fake = FakeChannel::new().with_reservations(vec![
            json!({"_id": "r1", "checkInDate": "2025-02-01", "checkOutDate": "2025-02-03"}),
            json!({"_id": "r2", "checkInDate": "2027-02-01", "checkOutDate": "2027-02-03"}),
        ]);
        let query = ReservationQuery::arrival(date(2025, 1, 1), date(2026, 12, 31));
        let items = fake.get_reservations(&query).await.into_list(&["reservations"]).unwrap();
        assert_eq!(items.len(), 1);

        assert!(matches!(fake.get_reservation("r2").await, ReservationLookup::Found(_)));
        fake.delete_remote("r2");
        assert_eq!(fake.get_reservation("r2").await, ReservationLookup::NotFound);
        fake.set_lookup_error("r1", "timeout");
        assert_eq!(
            fake.get_reservation("r1").await,
            ReservationLookup::Error("timeout".to_string())
        );
    }

    #[tokio::test]
    async fn test_connection_follows_listings_endpoint() {
        let fake = FakeChannel::new().with_listings(vec![json!({"_id": "L1"}), json!({"_id": "L2"})]);
        let response = fake.test_connection().await;
        assert!(response.success);
        assert_eq!(response.data, Some(json!([{"_id": "L1"}])));

        fake.fail(Endpoint::Listings, "401 Unauthorized");
        assert_eq!(fake.test_connection().await.error_message(), "401 Unauthorized");
    }

    #[tokio::test]
    async fn test_owners_unavailable_by_default() {
        let fake = FakeChannel::new();
        let response = fake.get_owners().await;
        assert_eq!(response.status, 404);
        assert_eq!(response.error_message(), "Endpoint not available");
    }
}
