//! Analysis Progress Tracker
//!
//! `Collecting` until `min_data_hours` of credited data exist, then `Ready`
//! for the zone's lifetime. Only `reset_all` goes back.

use serde::{Deserialize, Serialize};

/// Slack on the readiness comparison, absorbing rounding in summed hours.
const HOURS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    Collecting,
    Ready,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressTracker {
    #[serde(default)]
    pub data_hours: f64,
    #[serde(default)]
    pub ready: bool,
}

impl ProgressTracker {
    /// Credit `hours` of data. Returns `true` on the tick that crosses into
    /// `Ready`, and only then.
    pub fn advance(&mut self, hours: f64, min_data_hours: f64) -> bool {
        if hours > 0.0 && hours.is_finite() {
            self.data_hours += hours;
        }
        if !self.ready && self.data_hours + HOURS_EPSILON >= min_data_hours {
            self.ready = true;
            return true;
        }
        false
    }

    /// Progress towards readiness, 0 to 100.
    pub fn progress(&self, min_data_hours: f64) -> f64 {
        if self.ready {
            return 100.0;
        }
        (self.data_hours / min_data_hours * 100.0).clamp(0.0, 100.0)
    }

    pub fn phase(&self) -> AnalysisPhase {
        if self.ready {
            AnalysisPhase::Ready
        } else {
            AnalysisPhase::Collecting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_exactly_once() {
        let mut p = ProgressTracker::default();
        let mut transitions = 0;
        for _ in 0..48 {
            if p.advance(0.5, 12.0) {
                transitions += 1;
                assert!((p.data_hours - 12.0).abs() < 1e-9);
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(p.phase(), AnalysisPhase::Ready);
        assert!((p.progress(12.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_is_proportional() {
        let mut p = ProgressTracker::default();
        p.advance(3.0, 12.0);
        assert!((p.progress(12.0) - 25.0).abs() < 1e-9);
        assert_eq!(p.phase(), AnalysisPhase::Collecting);
    }

    #[test]
    fn test_ignores_non_finite_hours() {
        let mut p = ProgressTracker::default();
        p.advance(f64::NAN, 12.0);
        p.advance(-2.0, 12.0);
        assert_eq!(p.data_hours, 0.0);
    }
}
