//! Daily Aggregator & Archives
//!
//! ## Architecture
//!
//! ```text
//! samples ──▶ DayAccumulator (open day) ──rollover──▶ DailySummary
//!                                                        │
//!                                  ┌─────────────────────┴──────────┐
//!                                  ▼                                ▼
//!                        RollingHistory (7, FIFO)      LongTermArchive (1825, FIFO)
//! ```
//!
//! A day with too little data repeats the previous summary's coefficients
//! with `estimated = true`. After `max_carry_forward_days` repeats the slot
//! is written as unknown (`k = None`) instead.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use super::estimator::{CoefficientEstimator, WindowTotals};
use crate::types::{DailySummary, EnergyQuality};

// ============================================================================
// Bounded History
// ============================================================================

/// FIFO of daily summaries with unique, strictly ascending dates.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedHistory {
    entries: VecDeque<DailySummary>,
    capacity: usize,
}

impl BoundedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Rebuild from persisted entries: sorted, de-duplicated by date (first
    /// wins), newest `capacity` kept.
    pub fn from_entries(mut entries: Vec<DailySummary>, capacity: usize) -> Self {
        entries.sort_by_key(|s| s.date);
        entries.dedup_by_key(|s| s.date);
        let skip = entries.len().saturating_sub(capacity);
        Self {
            entries: entries.into_iter().skip(skip).collect(),
            capacity,
        }
    }

    /// Append a summary, evicting the oldest beyond capacity.
    ///
    /// Summaries not strictly after the newest entry are refused.
    pub fn push(&mut self, summary: DailySummary) -> bool {
        if self.entries.back().is_some_and(|last| summary.date <= last.date) {
            debug!(date = %summary.date, "Refusing out-of-order daily summary");
            return false;
        }
        self.entries.push_back(summary);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    pub fn last(&self) -> Option<&DailySummary> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &DailySummary> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Mean of the entries' K values, ignoring unknown days.
    pub fn average_k(&self) -> Option<f64> {
        mean(self.entries.iter().filter_map(|s| s.k))
    }

    /// Mean of the entries' K/m³ values, ignoring unknown days.
    pub fn average_k_per_m3(&self) -> Option<f64> {
        mean(self.entries.iter().filter_map(|s| s.k_per_m3))
    }

    pub fn to_vec(&self) -> Vec<DailySummary> {
        self.entries.iter().cloned().collect()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

// ============================================================================
// Day Accumulator
// ============================================================================

/// Running totals for the open (not yet finalized) local day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAccumulator {
    pub date: NaiveDate,
    #[serde(default)]
    pub totals: WindowTotals,
    #[serde(default)]
    pub sample_count: u32,
    #[serde(default)]
    pub indoor_min: Option<f64>,
    #[serde(default)]
    pub indoor_max: Option<f64>,
}

impl DayAccumulator {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            totals: WindowTotals::default(),
            sample_count: 0,
            indoor_min: None,
            indoor_max: None,
        }
    }

    pub fn observe_indoor(&mut self, indoor: f64) {
        self.sample_count += 1;
        self.indoor_min = Some(self.indoor_min.map_or(indoor, |m| m.min(indoor)));
        self.indoor_max = Some(self.indoor_max.map_or(indoor, |m| m.max(indoor)));
    }

    /// Indoor temperature swing over the day (°C).
    pub fn indoor_variation(&self) -> Option<f64> {
        Some(self.indoor_max? - self.indoor_min?)
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Turns a finished day into a `DailySummary`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregator {
    pub min_data_hours: f64,
    pub min_delta_t: f64,
    pub max_carry_forward_days: u32,
}

impl DailyAggregator {
    /// Finalize `day`. `previous` is the newest summary already recorded.
    pub fn finalize(
        &self,
        day: &DayAccumulator,
        previous: Option<&DailySummary>,
        estimator: &CoefficientEstimator,
    ) -> DailySummary {
        let estimate = estimator.estimate(&day.totals);
        let avg_delta_t = estimate.avg_delta_t.unwrap_or(0.0);
        let energy_kwh = estimate.energy.map_or(day.totals.energy_kwh, |e| e.kwh);
        let energy_source = estimate
            .energy
            .map_or(EnergyQuality::Estimated, |e| e.quality);

        let sufficient = estimate.hours >= self.min_data_hours
            && avg_delta_t >= self.min_delta_t
            && estimate.k.is_some();

        let observed = DailySummary {
            date: day.date,
            k: estimate.k,
            k_per_m2: estimate.k_per_m2,
            k_per_m3: estimate.k_per_m3,
            energy_kwh,
            energy_source,
            heating_hours: estimate.heating_hours,
            avg_delta_t,
            collected_hours: estimate.hours,
            estimated: false,
            carried_days: 0,
            k_7d: None,
        };

        if sufficient {
            return observed;
        }

        match previous {
            Some(prev) => {
                let mut carried = self.carry_forward(prev, day.date);
                carried.energy_kwh = observed.energy_kwh;
                carried.energy_source = observed.energy_source;
                carried.heating_hours = observed.heating_hours;
                carried.avg_delta_t = observed.avg_delta_t;
                carried.collected_hours = observed.collected_hours;
                carried
            }
            None => DailySummary {
                k: None,
                k_per_m2: None,
                k_per_m3: None,
                ..observed
            },
        }
    }

    /// Summary for a day with no samples at all.
    pub fn fill_missing(&self, previous: Option<&DailySummary>, date: NaiveDate) -> Option<DailySummary> {
        previous.map(|prev| self.carry_forward(prev, date))
    }

    fn carry_forward(&self, prev: &DailySummary, date: NaiveDate) -> DailySummary {
        let mut carried = prev.carried_to(date);
        if prev.carried_days >= self.max_carry_forward_days {
            carried.k = None;
            carried.k_per_m2 = None;
            carried.k_per_m3 = None;
        }
        carried
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::energy::EnergyReading;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn summary(d: u32, k: f64) -> DailySummary {
        DailySummary {
            date: date(d),
            k: Some(k),
            k_per_m2: None,
            k_per_m3: Some(k / 35.0),
            energy_kwh: 6.0,
            energy_source: EnergyQuality::Measured,
            heating_hours: 6.0,
            avg_delta_t: 14.0,
            collected_hours: 24.0,
            estimated: false,
            carried_days: 0,
            k_7d: None,
        }
    }

    fn aggregator() -> DailyAggregator {
        DailyAggregator {
            min_data_hours: 12.0,
            min_delta_t: 5.0,
            max_carry_forward_days: 2,
        }
    }

    fn estimator() -> CoefficientEstimator {
        CoefficientEstimator {
            delta_t_guard: 0.1,
            efficiency: 1.0,
            surface_m2: None,
            volume_m3: Some(35.0),
        }
    }

    fn day_with(hours: i64, delta_t: f64) -> DayAccumulator {
        let mut day = DayAccumulator::new(date(20));
        for _ in 0..hours {
            day.totals
                .add(3600, true, delta_t, Some(EnergyReading::measured(0.25)));
            day.observe_indoor(20.0);
        }
        day
    }

    #[test]
    fn test_fifo_eviction_and_order() {
        let mut h = BoundedHistory::new(7);
        for d in 1..=10 {
            assert!(h.push(summary(d, 10.0 + d as f64)));
        }
        assert_eq!(h.len(), 7);
        assert_eq!(h.iter().next().unwrap().date, date(4));
        assert_eq!(h.last().unwrap().date, date(10));
    }

    #[test]
    fn test_refuses_duplicate_and_older_dates() {
        let mut h = BoundedHistory::new(7);
        assert!(h.push(summary(5, 10.0)));
        assert!(!h.push(summary(5, 11.0)));
        assert!(!h.push(summary(3, 11.0)));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_from_entries_repairs_order() {
        let h = BoundedHistory::from_entries(
            vec![summary(3, 1.0), summary(1, 1.0), summary(3, 2.0), summary(2, 1.0)],
            2,
        );
        let dates: Vec<_> = h.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![date(2), date(3)]);
    }

    #[test]
    fn test_sufficient_day_is_fresh() {
        let s = aggregator().finalize(&day_with(24, 10.0), None, &estimator());
        assert!(!s.estimated);
        // 6 kWh over 24h at ΔT 10 → 25 W/°C
        assert!((s.k.unwrap() - 25.0).abs() < 1e-9);
        assert!((s.collected_hours - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_day_carries_forward() {
        let prev = summary(19, 17.9);
        let s = aggregator().finalize(&day_with(6, 10.0), Some(&prev), &estimator());
        assert!(s.estimated);
        assert_eq!(s.date, date(20));
        assert_eq!(s.k, prev.k);
        assert_eq!(s.carried_days, 1);
        // Observed figures of the day itself are kept
        assert!((s.energy_kwh - 1.5).abs() < 1e-9);
        assert!((s.collected_hours - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_delta_t_day_carries_forward() {
        let prev = summary(19, 17.9);
        let s = aggregator().finalize(&day_with(24, 2.0), Some(&prev), &estimator());
        assert!(s.estimated);
        assert_eq!(s.k, prev.k);
    }

    #[test]
    fn test_carry_forward_run_becomes_unknown() {
        let agg = aggregator();
        let mut prev = summary(10, 17.9);
        for d in 11..=12 {
            prev = agg.fill_missing(Some(&prev), date(d)).unwrap();
            assert_eq!(prev.k, Some(17.9));
        }
        let unknown = agg.fill_missing(Some(&prev), date(13)).unwrap();
        assert!(unknown.estimated);
        assert!(unknown.k.is_none());
        assert_eq!(unknown.carried_days, 3);
    }

    #[test]
    fn test_insufficient_first_day_has_no_k() {
        let s = aggregator().finalize(&day_with(4, 10.0), None, &estimator());
        assert!(s.k.is_none());
        assert!(!s.estimated);
    }

    #[test]
    fn test_averages_skip_unknown_days() {
        let mut h = BoundedHistory::new(7);
        h.push(summary(1, 10.0));
        let mut unknown = summary(2, 0.0);
        unknown.k = None;
        unknown.k_per_m3 = None;
        h.push(unknown);
        h.push(summary(3, 20.0));
        assert!((h.average_k().unwrap() - 15.0).abs() < 1e-9);
    }
}
