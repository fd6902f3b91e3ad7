//! Insulation Rating Engine
//!
//! Resolution order, first match wins:
//!
//! 1. Not heating and a frozen K exists → season message, last grade kept
//! 2. Heating, sustained ΔT, almost no heating and an indoor temperature
//!    that stayed within a narrow band → `ExcellentInferred`
//! 3. Rolling history available → mean K/m³ mapped onto five bands
//! 4. Otherwise → `Waiting`

use chrono::Duration;
use statrs::statistics::Statistics;

use super::buffer::SampleBuffer;
use super::daily::BoundedHistory;
use crate::types::{InsulationRating, KSource, Season};

// ============================================================================
// Stability Signal
// ============================================================================

/// Heating activity and indoor stability over the trailing inference window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StabilitySignal {
    /// Credited seconds whose starting ΔT was at least the season threshold
    pub sustained_delta_t_secs: i64,
    pub heating_secs: i64,
    /// Indoor max − min (°C), `None` with fewer than two readings
    pub indoor_variation: Option<f64>,
    /// Sample variance of indoor readings (°C²), reported only
    pub indoor_variance: Option<f64>,
}

impl StabilitySignal {
    pub fn from_buffer(buffer: &SampleBuffer, window: Duration, min_delta_t: f64) -> Self {
        let mut signal = Self::default();
        for interval in buffer.intervals_within(window) {
            if interval.start_delta_t >= min_delta_t {
                signal.sustained_delta_t_secs += interval.seconds;
            }
            if interval.heating {
                signal.heating_secs += interval.seconds;
            }
        }
        let indoor: Vec<f64> = buffer.window(window).map(|e| e.sample.indoor_temp).collect();
        if indoor.len() >= 2 {
            let variation = Statistics::max(indoor.iter()) - Statistics::min(indoor.iter());
            signal.indoor_variation = variation.is_finite().then_some(variation);
            let variance = indoor.iter().variance();
            signal.indoor_variance = variance.is_finite().then_some(variance);
        }
        signal
    }
}

// ============================================================================
// Rating Engine
// ============================================================================

/// Inputs of one rating evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RatingInputs<'a> {
    pub season: Season,
    pub history: &'a BoundedHistory,
    pub data_hours: f64,
    pub stability: StabilitySignal,
    pub last_valid_k: Option<f64>,
    pub last_grade: Option<InsulationRating>,
}

/// Outcome of a rating evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingAssessment {
    pub rating: InsulationRating,
    pub message: Option<String>,
    /// K shown alongside the rating
    pub reference_k: Option<f64>,
    pub source: Option<KSource>,
}

impl RatingAssessment {
    fn waiting(message: impl Into<String>) -> Self {
        Self {
            rating: InsulationRating::Waiting,
            message: Some(message.into()),
            reference_k: None,
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingEngine {
    pub min_data_hours: f64,
    pub inference_window: Duration,
    pub inference_max_heating: Duration,
    /// Largest indoor max − min still counted as stable (°C)
    pub inference_max_indoor_variation: f64,
}

impl RatingEngine {
    pub fn evaluate(&self, inputs: &RatingInputs<'_>) -> RatingAssessment {
        // 1. Outside heating season: keep showing the frozen value
        if inputs.season != Season::Heating {
            if let Some(k) = inputs.last_valid_k {
                return RatingAssessment {
                    rating: inputs.last_grade.unwrap_or(InsulationRating::Waiting),
                    message: inputs.season.message().map(str::to_string),
                    reference_k: Some(k),
                    source: Some(KSource::LastValid),
                };
            }
        }

        // 2. Barely any heating yet a stable room under real ΔT
        if inputs.season == Season::Heating && self.is_inferred_excellent(&inputs.stability) {
            return RatingAssessment {
                rating: InsulationRating::ExcellentInferred,
                message: Some("Stable temperature with minimal heating".to_string()),
                reference_k: None,
                source: Some(KSource::Inferred),
            };
        }

        // 3. Banded rolling average
        if !inputs.history.is_empty() && inputs.data_hours >= self.min_data_hours {
            return match inputs.history.average_k_per_m3() {
                Some(k_per_m3) => RatingAssessment {
                    rating: InsulationRating::from_k_per_m3(k_per_m3),
                    message: None,
                    reference_k: inputs.history.average_k(),
                    source: None,
                },
                None => RatingAssessment::waiting("Volume not configured or no valid day yet"),
            };
        }

        // 4. Not enough data
        RatingAssessment::waiting("Collecting data")
    }

    fn is_inferred_excellent(&self, s: &StabilitySignal) -> bool {
        s.sustained_delta_t_secs >= self.inference_window.num_seconds()
            && s.heating_secs < self.inference_max_heating.num_seconds()
            && s
                .indoor_variation
                .is_some_and(|v| v < self.inference_max_indoor_variation)
    }
}
