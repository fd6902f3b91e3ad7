//! Regime and provenance tags: Season, KSource, EnergyQuality, InsulationRating

use serde::{Deserialize, Serialize};

// ============================================================================
// Season
// ============================================================================

/// Current thermal regime of a zone, derived from indoor/outdoor ΔT.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// Significant positive ΔT: K can be measured
    #[default]
    Heating,
    /// ΔT too small for a meaningful measurement
    OffSeason,
    /// Outdoor warmer than indoor
    Summer,
}

impl Season {
    /// User-facing message shown while K cannot be freshly measured.
    pub fn message(self) -> Option<&'static str> {
        match self {
            Season::Heating => None,
            Season::OffSeason => Some("Off-season: temperature difference too small to measure"),
            Season::Summer => Some("Summer: outdoor warmer than indoor, showing last valid value"),
        }
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Season::Heating => write!(f, "heating"),
            Season::OffSeason => write!(f, "off_season"),
            Season::Summer => write!(f, "summer"),
        }
    }
}

// ============================================================================
// Provenance
// ============================================================================

/// Where a displayed K value came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KSource {
    /// Computed from metered energy (counter or power integration)
    Measured,
    /// Computed from declared heater power × heating time
    Estimated,
    /// Rating inferred from stability, no numeric K involved
    Inferred,
    /// Frozen value from the last heating period
    LastValid,
}

/// Quality of an energy figure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnergyQuality {
    #[default]
    Measured,
    Estimated,
}

impl EnergyQuality {
    /// Combine qualities across intervals: any estimate taints the total.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (EnergyQuality::Measured, EnergyQuality::Measured) => EnergyQuality::Measured,
            _ => EnergyQuality::Estimated,
        }
    }
}

impl From<EnergyQuality> for KSource {
    fn from(q: EnergyQuality) -> Self {
        match q {
            EnergyQuality::Measured => KSource::Measured,
            EnergyQuality::Estimated => KSource::Estimated,
        }
    }
}

// ============================================================================
// Heat Pump COP
// ============================================================================

/// Outcome of the measured-COP calculation for a heat pump zone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CopStatus {
    Ok,
    /// Zone not ready or no K yet
    WaitingCalibration,
    InsufficientDeltaT,
    InsufficientHeatingTime,
    NoEnergyData,
    /// Below 1.0, likely a sensor or configuration problem
    LowCopWarning,
    /// Above 7.0, likely a sensor or configuration problem
    HighCopWarning,
}

impl CopStatus {
    pub fn is_warning(self) -> bool {
        matches!(self, CopStatus::LowCopWarning | CopStatus::HighCopWarning)
    }
}

// ============================================================================
// Insulation Rating
// ============================================================================

/// Display rating for a zone's insulation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InsulationRating {
    Excellent,
    Good,
    Average,
    Poor,
    VeryPoor,
    ExcellentInferred,
    Waiting,
}

impl InsulationRating {
    /// Map a volume-normalized coefficient (W/°C/m³) onto the five bands.
    pub fn from_k_per_m3(k_per_m3: f64) -> Self {
        if k_per_m3 < 0.4 {
            InsulationRating::Excellent
        } else if k_per_m3 < 0.7 {
            InsulationRating::Good
        } else if k_per_m3 < 1.0 {
            InsulationRating::Average
        } else if k_per_m3 < 1.5 {
            InsulationRating::Poor
        } else {
            InsulationRating::VeryPoor
        }
    }

    /// A letter grade (anything except `Waiting`).
    pub fn is_grade(self) -> bool {
        !matches!(self, InsulationRating::Waiting)
    }
}

impl std::fmt::Display for InsulationRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InsulationRating::Excellent => "excellent",
            InsulationRating::Good => "good",
            InsulationRating::Average => "average",
            InsulationRating::Poor => "poor",
            InsulationRating::VeryPoor => "very_poor",
            InsulationRating::ExcellentInferred => "excellent_inferred",
            InsulationRating::Waiting => "waiting",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bands() {
        assert_eq!(InsulationRating::from_k_per_m3(0.1), InsulationRating::Excellent);
        assert_eq!(InsulationRating::from_k_per_m3(0.4), InsulationRating::Good);
        assert_eq!(InsulationRating::from_k_per_m3(0.51), InsulationRating::Good);
        assert_eq!(InsulationRating::from_k_per_m3(0.7), InsulationRating::Average);
        assert_eq!(InsulationRating::from_k_per_m3(1.2), InsulationRating::Poor);
        assert_eq!(InsulationRating::from_k_per_m3(1.5), InsulationRating::VeryPoor);
    }

    #[test]
    fn test_energy_quality_merge() {
        use EnergyQuality::*;
        assert_eq!(Measured.merge(Measured), Measured);
        assert_eq!(Measured.merge(Estimated), Estimated);
        assert_eq!(Estimated.merge(Measured), Estimated);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Season::OffSeason).unwrap(), "\"off_season\"");
        assert_eq!(
            serde_json::to_string(&InsulationRating::ExcellentInferred).unwrap(),
            "\"excellent_inferred\""
        );
        assert_eq!(serde_json::to_string(&KSource::LastValid).unwrap(), "\"last_valid\"");
    }
}
