use std::collections::HashMap;

use rendizy_core::{SyncError, SyncResult};
use uuid::Uuid;

/// External → internal ids built as the guest and property phases complete.
/// Lives for a single run; a repeated external id overwrites.
#[derive(Debug, Default, Clone)]
pub struct IdMapping {
    guests: HashMap<String, Uuid>,
    properties: HashMap<String, Uuid>,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_guest(&mut self, external_id: &str, internal_id: Uuid) {
        self.guests.insert(external_id.to_string(), internal_id);
    }

    pub fn record_property(&mut self, listing_id: &str, internal_id: Uuid) {
        self.properties.insert(listing_id.to_string(), internal_id);
    }

    pub fn guest(&self, external_id: &str) -> Option<Uuid> {
        self.guests.get(external_id).copied()
    }

    pub fn property(&self, listing_id: &str) -> Option<Uuid> {
        self.properties.get(listing_id).copied()
    }

    /// Resolve a reservation's property; absence is never substituted.
    pub fn require_property(&self, listing_id: Option<&str>) -> SyncResult<Uuid> {
        let listing_id = listing_id
            .ok_or_else(|| SyncError::MissingMapping("reservation has no listing id".to_string()))?;
        self.property(listing_id).ok_or_else(|| {
            SyncError::MissingMapping(format!("listing {} was not imported", listing_id))
        })
    }

    pub fn require_guest(&self, client_id: Option<&str>) -> SyncResult<Uuid> {
        let client_id = client_id
            .ok_or_else(|| SyncError::MissingMapping("reservation has no client id".to_string()))?;
        self.guest(client_id).ok_or_else(|| {
            SyncError::MissingMapping(format!("client {} was not imported", client_id))
        })
    }
}
