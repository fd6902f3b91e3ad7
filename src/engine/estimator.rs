//! Coefficient Estimator
//!
//! `K = heat_supplied / (avg_ΔT × duration_hours)` in W/°C, where
//! `heat_supplied` is the selected energy times the zone's efficiency factor.
//! The same totals feed both the 24h rolling estimate and the per-day
//! summary, so the two can never disagree on method.

use serde::{Deserialize, Serialize};

use super::buffer::ClippedInterval;
use super::energy::EnergyReading;
use crate::types::EnergyQuality;

/// `K` in W/°C, or `None` when ΔT is too small or nothing was observed.
///
/// `energy_kwh` is heat supplied (already efficiency-adjusted).
pub fn coefficient(energy_kwh: f64, avg_delta_t: f64, hours: f64, delta_t_guard: f64) -> Option<f64> {
    if !(avg_delta_t >= delta_t_guard) || !(hours > 0.0) || !(energy_kwh >= 0.0) {
        return None;
    }
    Some(energy_kwh * 1000.0 / (avg_delta_t * hours))
}

/// Divide by a surface or volume, when configured.
pub fn normalized(k: Option<f64>, divisor: Option<f64>) -> Option<f64> {
    match (k, divisor) {
        (Some(k), Some(d)) if d > 0.0 => Some(k / d),
        _ => None,
    }
}

// ============================================================================
// Totals
// ============================================================================

/// Running sums over credited intervals.
///
/// Intervals without an energy reading still count towards time, heating and
/// the reported ΔT, but K is computed only over the intervals that carried
/// energy, so one gap does not void the whole window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowTotals {
    pub credited_secs: i64,
    pub heating_secs: i64,
    /// Σ ΔT × seconds (°C·s)
    pub delta_t_secs: f64,
    pub energy_kwh: f64,
    /// Worst quality seen, `None` until an interval carried energy
    pub energy_quality: Option<EnergyQuality>,
    /// Some credited interval had no energy reading
    pub energy_missing: bool,
    /// Seconds of intervals that carried energy
    #[serde(default)]
    pub energy_secs: i64,
    /// Σ ΔT × seconds over intervals that carried energy
    #[serde(default)]
    pub energy_delta_t_secs: f64,
}

impl WindowTotals {
    pub fn add(&mut self, seconds: i64, heating: bool, delta_t: f64, energy: Option<EnergyReading>) {
        self.credited_secs += seconds;
        if heating {
            self.heating_secs += seconds;
        }
        self.delta_t_secs += delta_t * seconds as f64;
        match energy {
            Some(r) => {
                self.energy_kwh += r.kwh;
                self.energy_secs += seconds;
                self.energy_delta_t_secs += delta_t * seconds as f64;
                self.energy_quality = Some(match self.energy_quality {
                    Some(q) => q.merge(r.quality),
                    None => r.quality,
                });
            }
            None => self.energy_missing = true,
        }
    }

    pub fn from_intervals<I: IntoIterator<Item = ClippedInterval>>(intervals: I) -> Self {
        let mut totals = Self::default();
        for i in intervals {
            totals.add(i.seconds, i.heating, i.start_delta_t, i.energy);
        }
        totals
    }

    pub fn hours(&self) -> f64 {
        self.credited_secs as f64 / 3600.0
    }

    pub fn heating_hours(&self) -> f64 {
        self.heating_secs as f64 / 3600.0
    }

    /// Time-weighted average ΔT.
    pub fn avg_delta_t(&self) -> Option<f64> {
        (self.credited_secs > 0).then(|| self.delta_t_secs / self.credited_secs as f64)
    }

    /// Seconds and Σ ΔT·s of the intervals that carried energy.
    ///
    /// Without any gap these equal the full totals, which also covers day
    /// accumulators persisted before the split sums existed.
    fn metered(&self) -> (i64, f64) {
        if self.energy_missing {
            (self.energy_secs, self.energy_delta_t_secs)
        } else {
            (self.credited_secs, self.delta_t_secs)
        }
    }

    /// Hours covered by an energy reading.
    pub fn metered_hours(&self) -> f64 {
        self.metered().0 as f64 / 3600.0
    }

    /// Time-weighted average ΔT over the intervals that carried energy.
    pub fn metered_avg_delta_t(&self) -> Option<f64> {
        let (secs, delta_t_secs) = self.metered();
        (secs > 0).then(|| delta_t_secs / secs as f64)
    }

    /// Consumed energy over the intervals that carried a reading, `None`
    /// when none did.
    pub fn energy(&self) -> Option<EnergyReading> {
        self.energy_quality.map(|quality| EnergyReading {
            kwh: self.energy_kwh,
            quality,
        })
    }
}

// ============================================================================
// Estimator
// ============================================================================

/// Result of estimating K over one window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Estimate {
    pub hours: f64,
    pub heating_hours: f64,
    pub avg_delta_t: Option<f64>,
    /// Consumed energy (before efficiency)
    pub energy: Option<EnergyReading>,
    pub k: Option<f64>,
    pub k_per_m2: Option<f64>,
    pub k_per_m3: Option<f64>,
}

impl Estimate {
    /// Share of the window with heating on (0..1).
    pub fn heating_ratio(&self) -> f64 {
        if self.hours > 0.0 {
            (self.heating_hours / self.hours).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Zone-specific parameters of the K computation.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientEstimator {
    pub delta_t_guard: f64,
    pub efficiency: f64,
    pub surface_m2: Option<f64>,
    pub volume_m3: Option<f64>,
}

impl CoefficientEstimator {
    pub fn estimate(&self, totals: &WindowTotals) -> Estimate {
        let hours = totals.hours();
        let avg_delta_t = totals.avg_delta_t();
        let energy = totals.energy();
        let k = match (energy, totals.metered_avg_delta_t()) {
            (Some(e), Some(dt)) => coefficient(
                e.kwh * self.efficiency,
                dt,
                totals.metered_hours(),
                self.delta_t_guard,
            ),
            _ => None,
        };
        Estimate {
            hours,
            heating_hours: totals.heating_hours(),
            avg_delta_t,
            energy,
            k,
            k_per_m2: normalized(k, self.surface_m2),
            k_per_m3: normalized(k, self.volume_m3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> CoefficientEstimator {
        CoefficientEstimator {
            delta_t_guard: 0.1,
            efficiency: 1.0,
            surface_m2: Some(14.0),
            volume_m3: Some(35.0),
        }
    }

    #[test]
    fn test_reference_day() {
        // 1000 W heater, 6h of 24h, ΔT 14 °C
        let k = coefficient(6.0, 14.0, 24.0, 0.1).unwrap();
        assert!((k - 17.857).abs() < 0.01);
        let per_m3 = normalized(Some(k), Some(35.0)).unwrap();
        assert!((per_m3 - 0.51).abs() < 0.01);
    }

    #[test]
    fn test_guard_returns_none_regardless_of_energy() {
        assert!(coefficient(6.0, 0.05, 24.0, 0.1).is_none());
        assert!(coefficient(0.0, 0.0, 24.0, 0.1).is_none());
        assert!(coefficient(100.0, -3.0, 24.0, 0.1).is_none());
        assert!(coefficient(6.0, f64::NAN, 24.0, 0.1).is_none());
    }

    #[test]
    fn test_never_negative() {
        for dt in [0.1, 1.0, 5.0, 20.0] {
            for e in [0.0, 0.5, 12.0] {
                assert!(coefficient(e, dt, 24.0, 0.1).unwrap() >= 0.0);
            }
        }
        assert!(coefficient(-1.0, 10.0, 24.0, 0.1).is_none());
    }

    #[test]
    fn test_gap_interval_is_left_out_of_k() {
        let mut totals = WindowTotals::default();
        totals.add(3600, true, 10.0, Some(EnergyReading::measured(1.0)));
        totals.add(3600, true, 30.0, None);
        let est = estimator().estimate(&totals);
        assert!((est.energy.unwrap().kwh - 1.0).abs() < 1e-9);
        // 1 kWh over the one metered hour at ΔT 10
        assert!((est.k.unwrap() - 100.0).abs() < 1e-9);
        assert!((est.hours - 2.0).abs() < 1e-9);
        assert!((est.avg_delta_t.unwrap() - 20.0).abs() < 1e-9);
        assert!((est.heating_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_k_undefined_when_no_interval_carried_energy() {
        let mut totals = WindowTotals::default();
        totals.add(3600, true, 10.0, None);
        totals.add(3600, false, 10.0, None);
        let est = estimator().estimate(&totals);
        assert!(est.energy.is_none());
        assert!(est.k.is_none());
        assert!(est.avg_delta_t.is_some());
    }

    #[test]
    fn test_totals_without_split_sums_load_as_fully_metered() {
        let json = r#"{"credited_secs": 7200, "heating_secs": 3600, "delta_t_secs": 72000.0,
            "energy_kwh": 2.0, "energy_quality": "measured", "energy_missing": false}"#;
        let totals: WindowTotals = serde_json::from_str(json).unwrap();
        assert!((totals.metered_hours() - 2.0).abs() < 1e-9);
        assert!((estimator().estimate(&totals).k.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_scales_k() {
        let mut totals = WindowTotals::default();
        for _ in 0..24 {
            totals.add(3600, false, 10.0, Some(EnergyReading::measured(0.1)));
        }
        let electric = estimator().estimate(&totals).k.unwrap();
        let heatpump = CoefficientEstimator {
            efficiency: 3.0,
            ..estimator()
        }
        .estimate(&totals)
        .k
        .unwrap();
        assert!((heatpump - 3.0 * electric).abs() < 1e-9);
    }

    #[test]
    fn test_quality_degrades_to_estimated() {
        let mut totals = WindowTotals::default();
        totals.add(600, true, 10.0, Some(EnergyReading::measured(0.1)));
        totals.add(600, true, 10.0, Some(EnergyReading::estimated(0.1)));
        assert_eq!(totals.energy().unwrap().quality, EnergyQuality::Estimated);
    }
}
