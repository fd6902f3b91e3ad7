//! Versioned per-zone snapshot
//!
//! Everything a zone engine needs to resume after a restart. Every field is
//! `#[serde(default)]`: a snapshot written before a field existed loads with
//! that field at its safe default (empty archive, no rollover date, ...).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::PersistenceError;
use crate::engine::buffer::BufferedSample;
use crate::engine::daily::DayAccumulator;
use crate::engine::EngineState;
use crate::types::DailySummary;

/// Current snapshot schema version. Bump when the layout changes in a way
/// `#[serde(default)]` cannot absorb.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub zone_id: String,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub buffer: Vec<BufferedSample>,
    #[serde(default)]
    pub state: EngineState,
    /// Open (not yet finalized) day
    #[serde(default)]
    pub day: Option<DayAccumulator>,
    #[serde(default)]
    pub history: Vec<DailySummary>,
    #[serde(default)]
    pub archive: Vec<DailySummary>,
    #[serde(default)]
    pub last_rollover: Option<NaiveDate>,
}

impl ZoneSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a snapshot, refusing layouts newer than this build understands.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        if snapshot.schema_version > SCHEMA_VERSION {
            return Err(PersistenceError::UnsupportedSchema(snapshot.schema_version));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_older_snapshot_defaults_missing_fields() {
        // Written before the archive, open day and rollover date were persisted
        let json = r#"{
            "schema_version": 0,
            "zone_id": "living_room",
            "buffer": [],
            "state": {"season": "off_season", "data_hours": 14.5, "ready": true, "last_valid_k": 18.2},
            "history": []
        }"#;
        let snap = ZoneSnapshot::from_bytes(json.as_bytes()).unwrap();
        assert!(snap.archive.is_empty());
        assert!(snap.day.is_none());
        assert!(snap.last_rollover.is_none());
        assert!(snap.state.ready());
        assert_eq!(snap.state.last_valid_k, Some(18.2));
        assert_eq!(snap.state.total_energy_kwh, 0.0);
    }

    #[test]
    fn test_newer_schema_refused() {
        let json = format!(r#"{{"schema_version": {}}}"#, SCHEMA_VERSION + 1);
        assert!(matches!(
            ZoneSnapshot::from_bytes(json.as_bytes()),
            Err(PersistenceError::UnsupportedSchema(_))
        ));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(ZoneSnapshot::from_bytes(b"\x00\x01not json").is_err());
    }
}
