//! Zone Engine - heat-loss coefficient and insulation rating for one zone
//!
//! ## Architecture
//!
//! ```text
//! Sample ──▶ SampleBuffer ──┬──▶ CoefficientEstimator (24h rolling K)
//!   │                       ├──▶ SeasonClassifier
//!   │ EnergySelector        └──▶ StabilitySignal ──┐
//!   ▼                                              ▼
//! DayAccumulator ──rollover──▶ RollingHistory ──▶ RatingEngine ──▶ ZoneOutputs
//!                          └─▶ LongTermArchive         ▲
//!                                                      │
//!                                        ProgressTracker (gates outputs)
//! ```
//!
//! One `ZoneEngine` exists per zone and owns all of its state. Every
//! operation takes `&mut self`, so the owner serializes samples, timers and
//! resets. Ticks are infallible: bad input is refused before anything is
//! touched, and each tick's results are committed together at the end.

pub mod buffer;
pub mod cop;
pub mod daily;
pub mod energy;
pub mod estimator;
pub mod progress;
pub mod rating;
pub mod season;
mod state;
pub mod window;

pub use state::EngineState;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, trace, warn};

use crate::config::{defaults, EngineSettings, ZoneConfig};
use crate::storage::{ZoneSnapshot, SCHEMA_VERSION};
use crate::types::{
    DailyEnergy, DailySummary, EnergyQuality, InsulationRating, KHistoryPoint, KSource, Sample,
    Season, Sourced, ZoneOutputs,
};
use buffer::{Admission, BufferedSample, Interval, SampleBuffer};
use cop::{CopInputs, CopReading};
use daily::{BoundedHistory, DailyAggregator, DayAccumulator};
use energy::{EnergyContext, EnergySelector};
use estimator::{CoefficientEstimator, Estimate, WindowTotals};
use rating::{RatingAssessment, RatingEngine, RatingInputs, StabilitySignal};
use season::SeasonClassifier;
use window::WindowDetector;

/// Result of feeding one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Recorded {
        /// This tick crossed into `Ready`
        became_ready: bool,
        /// Days finalized by this tick
        finalized: Vec<NaiveDate>,
    },
    /// Non-finite reading, dropped
    Rejected,
    /// Older than data already processed, dropped
    Backdated,
}

/// Analysis engine for a single zone.
#[derive(Debug)]
pub struct ZoneEngine {
    zone: ZoneConfig,
    settings: EngineSettings,

    selector: EnergySelector,
    estimator: CoefficientEstimator,
    classifier: SeasonClassifier,
    aggregator: DailyAggregator,
    rating: RatingEngine,
    window_detector: WindowDetector,

    buffer: SampleBuffer,
    state: EngineState,
    day: Option<DayAccumulator>,
    history: BoundedHistory,
    archive: BoundedHistory,
    last_rollover: Option<NaiveDate>,
}

impl ZoneEngine {
    pub fn new(zone: ZoneConfig, settings: EngineSettings) -> Self {
        let selector = EnergySelector::for_zone(&zone);
        let estimator = CoefficientEstimator {
            delta_t_guard: settings.k_delta_t_guard,
            efficiency: zone.efficiency(),
            surface_m2: zone.surface_m2,
            volume_m3: zone.volume_m3,
        };
        let classifier = SeasonClassifier::new(settings.min_delta_t, settings.season_hysteresis);
        let aggregator = DailyAggregator {
            min_data_hours: settings.min_data_hours,
            min_delta_t: settings.min_delta_t,
            max_carry_forward_days: settings.max_carry_forward_days,
        };
        let rating = RatingEngine {
            min_data_hours: settings.min_data_hours,
            inference_window: settings.inference_window(),
            inference_max_heating: Duration::minutes(settings.inference_max_heating_minutes),
            inference_max_indoor_variation: settings.inference_max_indoor_variation,
        };

        Self {
            buffer: SampleBuffer::new(settings.retention()),
            zone,
            settings,
            selector,
            estimator,
            classifier,
            aggregator,
            rating,
            window_detector: WindowDetector::default(),
            state: EngineState::default(),
            day: None,
            history: BoundedHistory::new(defaults::ROLLING_HISTORY_DAYS),
            archive: BoundedHistory::new(defaults::ARCHIVE_DAYS),
            last_rollover: None,
        }
    }

    /// Rebuild an engine from a snapshot, repairing anything inconsistent.
    pub fn restore(zone: ZoneConfig, settings: EngineSettings, snapshot: ZoneSnapshot) -> Self {
        let mut engine = Self::new(zone, settings);
        engine.buffer = SampleBuffer::from_entries(snapshot.buffer, engine.settings.retention());
        engine.history =
            BoundedHistory::from_entries(snapshot.history, defaults::ROLLING_HISTORY_DAYS);
        engine.archive = BoundedHistory::from_entries(snapshot.archive, defaults::ARCHIVE_DAYS);
        engine.state = snapshot.state;
        if !engine.state.progress.data_hours.is_finite() || engine.state.progress.data_hours < 0.0 {
            engine.state.progress.data_hours = 0.0;
        }
        engine
            .state
            .progress
            .advance(0.0, engine.settings.min_data_hours);
        engine.day = snapshot.day;
        engine.last_rollover = snapshot.last_rollover;
        engine
    }

    pub fn snapshot(&self) -> ZoneSnapshot {
        ZoneSnapshot {
            schema_version: SCHEMA_VERSION,
            zone_id: self.zone.id.clone(),
            saved_at: Some(Utc::now()),
            buffer: self.buffer.entries().cloned().collect(),
            state: self.state.clone(),
            day: self.day.clone(),
            history: self.history.to_vec(),
            archive: self.archive.to_vec(),
            last_rollover: self.last_rollover,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.zone.id
    }

    pub fn zone(&self) -> &ZoneConfig {
        &self.zone
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn history(&self) -> &BoundedHistory {
        &self.history
    }

    pub fn archive(&self) -> &BoundedHistory {
        &self.archive
    }

    pub fn open_day(&self) -> Option<&DayAccumulator> {
        self.day.as_ref()
    }

    pub fn last_rollover(&self) -> Option<NaiveDate> {
        self.last_rollover
    }

    pub fn k_history_7d(&self) -> Vec<KHistoryPoint> {
        self.history.iter().map(KHistoryPoint::from).collect()
    }

    /// Local calendar date of a timestamp.
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        (ts + Duration::minutes(i64::from(self.settings.utc_offset_minutes))).date_naive()
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Feed one sample.
    pub fn tick(&mut self, sample: Sample) -> TickOutcome {
        match self.buffer.admission(&sample) {
            Admission::NonFinite => {
                debug!(zone = %self.zone.id, "Dropping non-finite sample");
                return TickOutcome::Rejected;
            }
            Admission::Backdated => {
                warn!(
                    zone = %self.zone.id,
                    timestamp = %sample.timestamp,
                    "Discarding backdated sample"
                );
                return TickOutcome::Backdated;
            }
            Admission::Accept => {}
        }

        let sample_date = self.local_date(sample.timestamp);
        if self.day_closed(sample_date) {
            warn!(
                zone = %self.zone.id,
                date = %sample_date,
                "Discarding sample for an already finalized day"
            );
            return TickOutcome::Backdated;
        }

        let heating = self.resolve_heating(&sample);
        let (interval, window_open) = match self.buffer.last() {
            Some(prev) => (
                self.build_interval(prev, &sample),
                self.window_detector.detect(prev, &sample),
            ),
            None => (None, false),
        };

        // The interval belongs to the day it started in, still open here
        if let Some(iv) = &interval {
            self.day
                .get_or_insert_with(|| DayAccumulator::new(sample_date))
                .totals
                .add(iv.seconds, iv.heating, iv.start_delta_t, iv.energy);
        }
        let finalized = self.rollover(sample_date);
        self.day
            .get_or_insert_with(|| DayAccumulator::new(sample_date))
            .observe_indoor(sample.indoor_temp);

        self.note_energy_gap(interval.as_ref());
        let credited_hours = interval.as_ref().map_or(0.0, |iv| iv.seconds as f64 / 3600.0);
        if let Some(e) = interval.as_ref().and_then(|iv| iv.energy) {
            self.state.total_energy_kwh += e.kwh;
        }

        let (indoor, outdoor) = (sample.indoor_temp, sample.outdoor_temp);
        self.buffer.record(BufferedSample {
            sample,
            heating,
            interval,
        });

        let became_ready = self
            .state
            .progress
            .advance(credited_hours, self.settings.min_data_hours);
        if became_ready {
            info!(
                zone = %self.zone.id,
                data_hours = self.state.progress.data_hours,
                "Zone analysis ready"
            );
        }

        self.state.window_open = window_open;
        self.update_season(indoor, outdoor);
        self.refresh_coefficients(sample_date);
        self.refresh_cop();

        TickOutcome::Recorded {
            became_ready,
            finalized,
        }
    }

    fn day_closed(&self, date: NaiveDate) -> bool {
        self.day.as_ref().is_some_and(|d| date < d.date)
            || self.last_rollover.is_some_and(|d| date <= d)
    }

    fn resolve_heating(&self, sample: &Sample) -> bool {
        sample
            .power_w
            .map_or(sample.heating_active, |p| p > self.zone.power_threshold_w)
    }

    fn build_interval(&self, prev: &BufferedSample, sample: &Sample) -> Option<Interval> {
        let seconds = (sample.timestamp - prev.timestamp()).num_seconds();
        if seconds <= 0 {
            return None;
        }
        if seconds > self.settings.max_sample_gap().num_seconds() {
            debug!(zone = %self.zone.id, gap_secs = seconds, "Sample gap too long, interval not credited");
            return None;
        }
        let ctx = EnergyContext {
            previous: &prev.sample,
            current: sample,
            seconds,
            heating: prev.heating,
        };
        let energy = self.selector.select(&ctx).map(|(reading, source)| {
            trace!(zone = %self.zone.id, source, kwh = reading.kwh, "Energy selected");
            reading
        });
        Some(Interval {
            seconds,
            heating: prev.heating,
            start_delta_t: prev.sample.delta_t(),
            energy,
        })
    }

    fn note_energy_gap(&mut self, interval: Option<&Interval>) {
        let Some(iv) = interval else {
            return;
        };
        match (iv.energy.is_some(), self.state.energy_gap) {
            (false, false) => {
                warn!(zone = %self.zone.id, "No energy source available, K undefined until one reports");
                self.state.energy_gap = true;
            }
            (true, true) => {
                info!(zone = %self.zone.id, "Energy source available again");
                self.state.energy_gap = false;
            }
            _ => {}
        }
    }

    fn update_season(&mut self, indoor: f64, outdoor: f64) {
        let next = self.classifier.classify(self.state.season, indoor, outdoor);
        if next == self.state.season {
            return;
        }
        info!(zone = %self.zone.id, from = %self.state.season, to = %next, "Season changed");
        if self.state.season == Season::Heating && self.state.last_valid_k.is_some() {
            self.state.k_source = Some(KSource::LastValid);
        }
        self.state.season = next;
    }

    fn refresh_coefficients(&mut self, date: NaiveDate) {
        if !self.state.progress.ready {
            return;
        }
        if self.state.season != Season::Heating {
            if self.state.last_valid_k.is_some() {
                self.state.k_source = Some(KSource::LastValid);
            }
            return;
        }
        let estimate = self.rolling_estimate();
        if let (false, Some(k), Some(energy)) = (self.state.energy_gap, estimate.k, estimate.energy) {
            self.state.last_valid_k = Some(k);
            self.state.last_k_date = Some(date);
            self.state.k_source = Some(energy.quality.into());
        }
        self.refresh_grade();
    }

    fn refresh_cop(&mut self) {
        if !self.zone.tracks_cop() {
            return;
        }
        let Some(reading) = self.measured_cop(&self.rolling_estimate()) else {
            return;
        };
        if reading.status.is_warning() && self.state.cop_status != Some(reading.status) {
            warn!(
                zone = %self.zone.id,
                cop = reading.cop.unwrap_or_default(),
                status = ?reading.status,
                "Measured COP out of the plausible range, check energy meter and heat source settings"
            );
        }
        self.state.cop_status = Some(reading.status);
    }

    fn refresh_grade(&mut self) {
        if self.state.season != Season::Heating || !self.state.progress.ready {
            return;
        }
        let assessment = self.assess();
        if assessment.rating == InsulationRating::ExcellentInferred {
            self.state.k_source = Some(KSource::Inferred);
        }
        if assessment.rating.is_grade() {
            self.state.last_grade = Some(assessment.rating);
        }
    }

    // ========================================================================
    // Rollover
    // ========================================================================

    /// Finalize every open day before `date`. Safe to call repeatedly.
    pub fn rollover(&mut self, date: NaiveDate) -> Vec<NaiveDate> {
        let Some(open) = self.day.as_ref().map(|d| d.date) else {
            return Vec::new();
        };
        if open >= date {
            return Vec::new();
        }
        let Some(day) = self.day.replace(DayAccumulator::new(date)) else {
            return Vec::new();
        };

        let mut finalized = Vec::new();
        if self.last_rollover.map_or(true, |last| open > last) {
            let summary = self
                .aggregator
                .finalize(&day, self.history.last(), &self.estimator);
            self.commit_summary(summary);
            finalized.push(open);
        }

        // Days without a single sample, newest `capacity` only
        let missing = (date - open).num_days() - 1;
        let skip = missing.saturating_sub(self.history.capacity() as i64).max(0);
        for offset in (skip + 1)..=missing {
            let Some(d) = open.checked_add_signed(Duration::days(offset)) else {
                continue;
            };
            if self.last_rollover.is_some_and(|last| d <= last) {
                continue;
            }
            if let Some(summary) = self.aggregator.fill_missing(self.history.last(), d) {
                self.commit_summary(summary);
                finalized.push(d);
            }
        }

        if let Some(yesterday) = date.pred_opt() {
            self.last_rollover = Some(self.last_rollover.map_or(yesterday, |l| l.max(yesterday)));
        }
        finalized
    }

    /// Timer-driven rollover: closes the open day once it ended more than
    /// one sample gap ago, so a regular midnight sample still lands in it.
    pub fn rollover_if_due(&mut self, now: DateTime<Utc>) -> Vec<NaiveDate> {
        let due = self.local_date(now - self.settings.max_sample_gap());
        let finalized = self.rollover(due);
        if !finalized.is_empty() {
            self.refresh_grade();
        }
        finalized
    }

    fn commit_summary(&mut self, mut summary: DailySummary) {
        let (sum, n) = self
            .history
            .iter()
            .filter_map(|s| s.k)
            .chain(summary.k)
            .fold((0.0, 0usize), |(s, n), k| (s + k, n + 1));
        summary.k_7d = (n > 0).then(|| sum / n as f64);

        info!(
            zone = %self.zone.id,
            date = %summary.date,
            k = ?summary.k,
            estimated = summary.estimated,
            energy_kwh = summary.energy_kwh,
            "Day finalized"
        );
        self.history.push(summary.clone());
        self.archive.push(summary);
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Clear the rolling history. Returns `false` if it was already empty.
    pub fn reset_history(&mut self) -> bool {
        if self.history.is_empty() {
            return false;
        }
        self.history.clear();
        info!(zone = %self.zone.id, "Rolling history cleared");
        true
    }

    /// Return the zone to a never-initialized state.
    pub fn reset_all(&mut self) {
        *self = Self::new(self.zone.clone(), self.settings.clone());
        info!(zone = %self.zone.id, "Zone state reset");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// K estimate over the trailing rolling window.
    pub fn rolling_estimate(&self) -> Estimate {
        let totals =
            WindowTotals::from_intervals(self.buffer.intervals_within(self.settings.rolling_window()));
        self.estimator.estimate(&totals)
    }

    pub fn stability(&self) -> StabilitySignal {
        StabilitySignal::from_buffer(
            &self.buffer,
            self.settings.inference_window(),
            self.settings.min_delta_t,
        )
    }

    pub fn assess(&self) -> RatingAssessment {
        self.rating.evaluate(&RatingInputs {
            season: self.state.season,
            history: &self.history,
            data_hours: self.state.progress.data_hours,
            stability: self.stability(),
            last_valid_k: self.state.last_valid_k,
            last_grade: self.state.last_grade,
        })
    }

    /// COP actually delivered today, for heat pump zones that track it.
    pub fn measured_cop(&self, estimate: &Estimate) -> Option<CopReading> {
        if !self.zone.tracks_cop() {
            return None;
        }
        let (heating_hours, consumed_kwh) = self
            .day
            .as_ref()
            .map_or((0.0, 0.0), |d| (d.totals.heating_hours(), d.totals.energy_kwh));
        let inputs = CopInputs {
            ready: self.state.progress.ready,
            k: if self.state.energy_gap { None } else { estimate.k },
            avg_delta_t: estimate.avg_delta_t,
            heating_hours,
            consumed_kwh,
        };
        Some(cop::measured_cop(&inputs, self.settings.min_delta_t))
    }

    /// Read model for consumers, gated on readiness.
    pub fn outputs(&self) -> ZoneOutputs {
        let estimate = self.rolling_estimate();
        let ready = self.state.progress.ready;
        let progress = self.state.progress.progress(self.settings.min_data_hours);

        let (k, k_per_m2, k_per_m3, rating, message) = if ready {
            let assessment = self.assess();
            let (k, k2, k3) = self.current_k(&estimate, &assessment);
            (k, k2, k3, assessment.rating, assessment.message)
        } else {
            (
                None,
                None,
                None,
                InsulationRating::Waiting,
                Some(format!("Collecting data ({progress:.0}%)")),
            )
        };

        let daily_energy_kwh = self.day.as_ref().and_then(|d| {
            let totals = &d.totals;
            totals.energy_quality.map(|q| DailyEnergy {
                kwh: totals.energy_kwh,
                source: if totals.energy_missing {
                    EnergyQuality::Estimated
                } else {
                    q
                },
            })
        });

        let cop = self.measured_cop(&estimate);

        ZoneOutputs {
            zone_id: self.zone.id.clone(),
            zone_name: self.zone.display_name().to_string(),
            k,
            k_per_m2,
            k_per_m3,
            k_7d: if ready { self.history.average_k() } else { None },
            last_valid_k: self.state.last_valid_k,
            last_k_date: self.state.last_k_date,
            insulation_rating: rating,
            rating_message: message,
            season: self.state.season,
            daily_energy_kwh,
            total_energy_kwh: self.state.total_energy_kwh,
            heating_time_24h: estimate.heating_hours,
            heating_ratio: estimate.heating_ratio(),
            avg_delta_t_24h: estimate.avg_delta_t,
            window_open: self.state.window_open,
            measured_cop: cop.and_then(|c| c.cop),
            cop_status: cop.map(|c| c.status),
            analysis_progress: progress,
            data_hours: self.state.progress.data_hours,
            ready,
            k_history_7d: self.k_history_7d(),
            last_sample_at: self.buffer.last().map(BufferedSample::timestamp),
        }
    }

    #[allow(clippy::type_complexity)]
    fn current_k(
        &self,
        estimate: &Estimate,
        assessment: &RatingAssessment,
    ) -> (Option<Sourced<f64>>, Option<Sourced<f64>>, Option<Sourced<f64>>) {
        let (value, source) = if self.state.season == Season::Heating {
            let source = match (assessment.source, estimate.energy) {
                (Some(KSource::Inferred), _) => KSource::Inferred,
                (_, Some(e)) => e.quality.into(),
                (_, None) => KSource::Estimated,
            };
            let k = if self.state.energy_gap { None } else { estimate.k };
            (k, source)
        } else {
            (self.state.last_valid_k, KSource::LastValid)
        };
        let tag = |v: Option<f64>| v.map(|value| Sourced { value, source });
        (
            tag(value),
            tag(estimator::normalized(value, self.zone.surface_m2)),
            tag(estimator::normalized(value, self.zone.volume_m3)),
        )
    }
}
