//! Per-run statistics returned by the sync jobs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Prefix for errors that abort a phase rather than a single record.
pub const GENERAL_ERROR_PREFIX: &str = "Erro geral";

/// Counters for one entity type within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EntityStats {
    pub fetched: u64,
    pub created: u64,
    pub updated: u64,
    pub failed: u64,
}

impl EntityStats {
    pub fn processed(&self) -> u64 {
        self.created + self.updated
    }
}

/// Outcome of one upsert: whether a new row was written or an existing one
/// replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

impl Upserted {
    pub fn record(self, stats: &mut EntityStats) {
        match self {
            Upserted::Created => stats.created += 1,
            Upserted::Updated => stats.updated += 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Upserted::Created => "created",
            Upserted::Updated => "updated",
        }
    }
}

/// Statistics of a full import (guests → properties → reservations).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SyncStats {
    pub guests: EntityStats,
    pub properties: EntityStats,
    pub reservations: EntityStats,
    pub errors: Vec<String>,
}

impl SyncStats {
    pub fn total_failed(&self) -> u64 {
        self.guests.failed + self.properties.failed + self.reservations.failed
    }

    pub fn push_general_error(&mut self, message: impl std::fmt::Display) {
        self.errors.push(format!("{GENERAL_ERROR_PREFIX}: {message}"));
    }

    pub fn has_general_error(&self) -> bool {
        self.errors.iter().any(|e| e.starts_with(GENERAL_ERROR_PREFIX))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SyncOutcome {
    pub success: bool,
    pub stats: SyncStats,
}

/// Statistics of a calendar sync. Availability and rates are counted only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CalendarStats {
    pub availability: EntityStats,
    pub blocks: EntityStats,
    pub rates: EntityStats,
    pub errors: Vec<String>,
}

impl CalendarStats {
    pub fn total_failed(&self) -> u64 {
        self.availability.failed + self.blocks.failed + self.rates.failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CalendarOutcome {
    pub success: bool,
    pub stats: CalendarStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OwnersStats {
    pub owners: EntityStats,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OwnersOutcome {
    pub success: bool,
    /// Absent when the owners endpoint itself was unavailable.
    pub stats: Option<OwnersStats>,
    pub error: Option<String>,
}

/// Result of importing reservations missing locally for one date window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImportMissingStats {
    pub date_type: String,
    pub from: String,
    pub to: String,
    pub remote_count: u64,
    pub missing: u64,
    pub imported: u64,
    pub skipped: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImportMissingOutcome {
    pub success: bool,
    pub arrival: ImportMissingStats,
    pub creation: ImportMissingStats,
}

/// Result of draining the webhook queue once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WebhookStats {
    pub processed: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_error_prefix() {
        let mut stats = SyncStats::default();
        assert!(!stats.has_general_error());
        stats.errors.push("Reserva abc: guest missing".to_string());
        assert!(!stats.has_general_error());
        stats.push_general_error("timeout");
        assert_eq!(stats.errors.last().map(String::as_str), Some("Erro geral: timeout"));
        assert!(stats.has_general_error());
    }

    #[test]
    fn test_upserted_records_counts() {
        let mut stats = EntityStats::default();
        Upserted::Created.record(&mut stats);
        Upserted::Updated.record(&mut stats);
        Upserted::Updated.record(&mut stats);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.processed(), 3);
    }
}
