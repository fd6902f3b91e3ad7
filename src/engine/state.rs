//! Mutable per-zone flags carried between ticks and across restarts

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::progress::ProgressTracker;
use crate::types::{CopStatus, InsulationRating, KSource, Season};

/// Engine flags. Every field defaults so older snapshots load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(default)]
    pub season: Season,
    #[serde(flatten)]
    pub progress: ProgressTracker,
    /// Most recent K measured while heating
    #[serde(default)]
    pub last_valid_k: Option<f64>,
    #[serde(default)]
    pub k_source: Option<KSource>,
    /// Last letter grade produced while heating
    #[serde(default)]
    pub last_grade: Option<InsulationRating>,
    #[serde(default)]
    pub last_k_date: Option<NaiveDate>,
    /// Energy consumed since the zone was created (kWh)
    #[serde(default)]
    pub total_energy_kwh: f64,
    #[serde(default)]
    pub window_open: bool,
    /// Latest credited interval had no energy reading. Blanks that tick's K
    /// and keeps the warning to one line per gap.
    #[serde(default, alias = "energy_gap_logged")]
    pub energy_gap: bool,
    /// Latest COP status, so out-of-range warnings log once per episode
    #[serde(default)]
    pub cop_status: Option<CopStatus>,
}

impl EngineState {
    pub fn data_hours(&self) -> f64 {
        self.progress.data_hours
    }

    pub fn ready(&self) -> bool {
        self.progress.ready
    }
}
