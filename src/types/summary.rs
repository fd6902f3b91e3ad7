//! Finalized per-day results

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::EnergyQuality;

/// One calendar day of a zone, finalized at the local-day rollover.
///
/// Fields added after the first snapshot schema carry `#[serde(default)]` so
/// older snapshots still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Heat-loss coefficient (W/°C), `None` when unknown
    pub k: Option<f64>,
    /// K per m² of surface
    #[serde(default)]
    pub k_per_m2: Option<f64>,
    /// K per m³ of volume
    pub k_per_m3: Option<f64>,
    /// Energy consumed over the day (kWh)
    pub energy_kwh: f64,
    #[serde(default)]
    pub energy_source: EnergyQuality,
    pub heating_hours: f64,
    pub avg_delta_t: f64,
    /// Hours of credited sample intervals
    #[serde(default)]
    pub collected_hours: f64,
    /// K values copied forward from a previous day
    pub estimated: bool,
    /// Length of the carry-forward run ending at this day (0 = fresh)
    #[serde(default)]
    pub carried_days: u32,
    /// Rolling 7-day average K at the time this day was archived
    #[serde(default)]
    pub k_7d: Option<f64>,
}

impl DailySummary {
    /// Copy this summary's coefficients onto `date`, flagged as estimated.
    pub fn carried_to(&self, date: NaiveDate) -> Self {
        Self {
            date,
            k: self.k,
            k_per_m2: self.k_per_m2,
            k_per_m3: self.k_per_m3,
            energy_kwh: 0.0,
            energy_source: EnergyQuality::Estimated,
            heating_hours: 0.0,
            avg_delta_t: 0.0,
            collected_hours: 0.0,
            estimated: true,
            carried_days: self.carried_days.saturating_add(1),
            k_7d: None,
        }
    }
}

/// Point of the 7-day K sparkline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KHistoryPoint {
    pub date: NaiveDate,
    pub k: Option<f64>,
    pub estimated: bool,
}

impl From<&DailySummary> for KHistoryPoint {
    fn from(s: &DailySummary) -> Self {
        Self {
            date: s.date,
            k: s.k,
            estimated: s.estimated,
        }
    }
}
