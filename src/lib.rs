//! thermal-zones: per-zone heat-loss coefficient and insulation rating
//!
//! ## Architecture
//!
//! - **Engine**: sample buffer, energy selection, K estimation, season
//!   classification, daily aggregation and insulation rating for one zone
//! - **Storage**: versioned snapshots in sled, at most one save in flight
//! - **Pipeline**: one actor per zone, sample sources and the timer loop
//! - **API**: read-only zone outputs plus the reset commands over HTTP

pub mod api;
pub mod config;
pub mod engine;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use config::{EngineConfig, EngineSettings, HeatSourceType, ZoneConfig};
pub use engine::{TickOutcome, ZoneEngine};
pub use pipeline::{ProcessingLoop, ZoneHandle, ZoneRegistry};
pub use storage::{PersistenceError, PersistenceManager, SledSnapshotStore, ZoneSnapshot};
pub use types::{
    DailySummary, InsulationRating, KSource, Sample, Season, ZoneOutputs, ZoneSample,
};
