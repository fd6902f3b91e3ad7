//! Shared data structures for per-zone heat-loss analysis
//!
//! This module defines the core types flowing through the zone engine:
//! - `Sample`: one periodic reading (temperatures, heating state, energy)
//! - `Season`, `KSource`, `EnergyQuality`: regime and provenance tags
//! - `InsulationRating`: display rating produced by the rating engine
//! - `DailySummary`: one finalized calendar day
//! - `ZoneOutputs`: the read model exposed to UI/automation consumers

mod sample;
mod state;
mod summary;
mod outputs;

pub use sample::*;
pub use state::*;
pub use summary::*;
pub use outputs::*;
