//! Read model exposed to UI and automation consumers

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{CopStatus, EnergyQuality, InsulationRating, KHistoryPoint, KSource, Season};

/// A value tagged with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: KSource,
}

/// Energy figure tagged with its quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyEnergy {
    pub kwh: f64,
    pub source: EnergyQuality,
}

/// Everything a consumer may read about one zone.
///
/// While the zone is still collecting (`ready == false`) the coefficient and
/// rating fields are suppressed and only progress is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneOutputs {
    pub zone_id: String,
    pub zone_name: String,

    // === Coefficients ===
    pub k: Option<Sourced<f64>>,
    pub k_per_m2: Option<Sourced<f64>>,
    pub k_per_m3: Option<Sourced<f64>>,
    /// Average K over the rolling history
    pub k_7d: Option<f64>,
    pub last_valid_k: Option<f64>,
    pub last_k_date: Option<NaiveDate>,

    // === Rating ===
    pub insulation_rating: InsulationRating,
    pub rating_message: Option<String>,
    pub season: Season,

    // === Energy & activity ===
    pub daily_energy_kwh: Option<DailyEnergy>,
    pub total_energy_kwh: f64,
    /// Heating time over the trailing 24h (hours)
    pub heating_time_24h: f64,
    /// Fraction of the trailing 24h with heating on (0..1)
    pub heating_ratio: f64,
    pub avg_delta_t_24h: Option<f64>,
    pub window_open: bool,

    // === Heat pump ===
    /// Heat delivered per kWh drawn today. `None` for zones without COP tracking
    #[serde(default)]
    pub measured_cop: Option<f64>,
    #[serde(default)]
    pub cop_status: Option<CopStatus>,

    // === Progress ===
    pub analysis_progress: f64,
    pub data_hours: f64,
    pub ready: bool,

    pub k_history_7d: Vec<KHistoryPoint>,
    pub last_sample_at: Option<DateTime<Utc>>,
}
