//! Open-window detection from the indoor temperature drop rate.

use super::buffer::BufferedSample;
use crate::config::defaults;
use crate::types::Sample;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowDetector {
    /// Drop rate flagging an open window while heating (°C/min)
    pub heating_rate: f64,
    /// Drop rate flagging an open window in any state (°C/min)
    pub idle_rate: f64,
}

impl Default for WindowDetector {
    fn default() -> Self {
        Self {
            heating_rate: defaults::WINDOW_DROP_RATE_HEATING,
            idle_rate: defaults::WINDOW_DROP_RATE_IDLE,
        }
    }
}

impl WindowDetector {
    /// The heating threshold applies when heating was on at `previous`,
    /// i.e. while the drop happened.
    pub fn detect(&self, previous: &BufferedSample, current: &Sample) -> bool {
        let seconds = (current.timestamp - previous.timestamp()).num_seconds();
        if seconds <= 0 {
            return false;
        }
        let rate = (current.indoor_temp - previous.sample.indoor_temp) / (seconds as f64 / 60.0);
        rate < self.idle_rate || (previous.heating && rate < self.heating_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn prev(indoor: f64, heating: bool) -> BufferedSample {
        BufferedSample {
            sample: Sample::new(Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap(), indoor, 0.0, heating),
            heating,
            interval: None,
        }
    }

    fn cur(indoor: f64, minutes: i64, heating: bool) -> Sample {
        Sample::new(
            Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap() + Duration::minutes(minutes),
            indoor,
            0.0,
            heating,
        )
    }

    #[test]
    fn test_fast_drop_while_heating() {
        let d = WindowDetector::default();
        // -0.8 °C/min
        assert!(d.detect(&prev(21.0, true), &cur(19.4, 2, true)));
        assert!(!d.detect(&prev(21.0, false), &cur(19.4, 2, false)));
    }

    #[test]
    fn test_heating_state_at_start_of_drop_counts() {
        let d = WindowDetector::default();
        // Thermostat switched off as the window opened
        assert!(d.detect(&prev(21.0, true), &cur(19.4, 2, false)));
        // Heating only came on at the end of the drop
        assert!(!d.detect(&prev(21.0, false), &cur(19.4, 2, true)));
    }

    #[test]
    fn test_very_fast_drop_any_state() {
        let d = WindowDetector::default();
        assert!(d.detect(&prev(21.0, false), &cur(18.0, 2, false)));
    }

    #[test]
    fn test_slow_cooling_is_not_a_window() {
        let d = WindowDetector::default();
        assert!(!d.detect(&prev(21.0, true), &cur(20.5, 10, true)));
    }
}
