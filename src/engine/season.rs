//! Season Classifier
//!
//! Labels the zone's thermal regime from the current ΔT:
//!
//! - outdoor warmer than indoor → `Summer`
//! - ΔT below `min_delta_t` → `OffSeason`
//! - otherwise → `Heating`
//!
//! Leaving `Heating` happens at `min_delta_t`, but returning to it requires
//! `min_delta_t + hysteresis`, so a zone hovering on the boundary does not
//! flap between states every tick.

use crate::types::Season;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonClassifier {
    pub min_delta_t: f64,
    pub hysteresis: f64,
}

impl SeasonClassifier {
    pub fn new(min_delta_t: f64, hysteresis: f64) -> Self {
        Self {
            min_delta_t,
            hysteresis: hysteresis.max(0.0),
        }
    }

    /// Next season given the current one and the latest indoor/outdoor pair.
    pub fn classify(&self, current: Season, indoor: f64, outdoor: f64) -> Season {
        let delta_t = indoor - outdoor;
        if outdoor > indoor {
            return Season::Summer;
        }
        if delta_t < self.min_delta_t {
            return Season::OffSeason;
        }
        if current == Season::Heating || delta_t >= self.min_delta_t + self.hysteresis {
            Season::Heating
        } else {
            Season::OffSeason
        }
    }
}
