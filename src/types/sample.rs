//! Zone sample types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One periodic reading for a thermal zone.
///
/// Temperatures are in °C. `power_w` is an instantaneous heater power reading
/// and `energy_kwh` a cumulative energy counter; both are optional and only
/// present when the zone has the corresponding meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Indoor temperature (°C)
    pub indoor_temp: f64,
    /// Outdoor temperature (°C)
    pub outdoor_temp: f64,
    /// Heater/thermostat reports heating on
    #[serde(default)]
    pub heating_active: bool,
    /// Instantaneous heater power (W)
    #[serde(default)]
    pub power_w: Option<f64>,
    /// Cumulative energy counter (kWh)
    #[serde(default)]
    pub energy_kwh: Option<f64>,
}

impl Sample {
    pub fn new(
        timestamp: DateTime<Utc>,
        indoor_temp: f64,
        outdoor_temp: f64,
        heating_active: bool,
    ) -> Self {
        Self {
            timestamp,
            indoor_temp,
            outdoor_temp,
            heating_active,
            power_w: None,
            energy_kwh: None,
        }
    }

    pub fn with_power(mut self, power_w: f64) -> Self {
        self.power_w = Some(power_w);
        self
    }

    pub fn with_energy(mut self, energy_kwh: f64) -> Self {
        self.energy_kwh = Some(energy_kwh);
        self
    }

    /// Indoor minus outdoor temperature (°C).
    pub fn delta_t(&self) -> f64 {
        self.indoor_temp - self.outdoor_temp
    }

    /// Every numeric field present is finite.
    ///
    /// Non-finite readings are sensor glitches and never enter the buffer.
    pub fn is_finite(&self) -> bool {
        self.indoor_temp.is_finite()
            && self.outdoor_temp.is_finite()
            && self.power_w.map_or(true, f64::is_finite)
            && self.energy_kwh.map_or(true, f64::is_finite)
    }
}

/// A sample addressed to a zone, as read from an ingestion source.
///
/// JSON lines look like:
/// `{"zone":"living_room","timestamp":"2025-01-10T08:00:00Z","indoor_temp":20.1,"outdoor_temp":4.0,"heating_active":true}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSample {
    pub zone: String,
    #[serde(flatten)]
    pub sample: Sample,
}
