//! Sample Buffer - trailing 48h of raw readings for one zone
//!
//! Each entry keeps the raw `Sample`, the resolved heating state and the
//! `Interval` that ended at this sample (elapsed time since the previous
//! accepted sample, the heating state and ΔT at the interval start, and the
//! energy selected for it). Window queries borrow the buffer and are lazy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::energy::EnergyReading;
use crate::types::Sample;

/// Elapsed time between two consecutive accepted samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub seconds: i64,
    /// Heating state at the interval start
    pub heating: bool,
    /// ΔT at the interval start (°C)
    pub start_delta_t: f64,
    /// Energy consumed over the interval, `None` when no provider yielded
    pub energy: Option<EnergyReading>,
}

/// One buffered reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedSample {
    pub sample: Sample,
    /// Resolved heating state (power threshold or reported flag)
    pub heating: bool,
    /// `None` for the first sample and after an uncredited gap
    pub interval: Option<Interval>,
}

impl BufferedSample {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.sample.timestamp
    }
}

/// Portion of an interval falling inside a query window.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedInterval {
    pub seconds: i64,
    pub heating: bool,
    pub start_delta_t: f64,
    /// Energy prorated to the clipped portion
    pub energy: Option<EnergyReading>,
}

/// Admission decision for an incoming sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// Contains a non-finite value
    NonFinite,
    /// Timestamp earlier than the newest buffered sample
    Backdated,
}

/// Trailing buffer of samples ordered by non-decreasing timestamp.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    entries: VecDeque<BufferedSample>,
    retention: Duration,
}

impl SampleBuffer {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
        }
    }

    /// Rebuild from persisted entries, dropping anything that would violate
    /// ordering or finiteness.
    pub fn from_entries(entries: Vec<BufferedSample>, retention: Duration) -> Self {
        let mut buffer = Self::new(retention);
        for entry in entries {
            if buffer.admission(&entry.sample) == Admission::Accept {
                buffer.entries.push_back(entry);
            }
        }
        buffer.purge();
        buffer
    }

    /// Decide whether `sample` may be recorded.
    pub fn admission(&self, sample: &Sample) -> Admission {
        if !sample.is_finite() {
            return Admission::NonFinite;
        }
        match self.entries.back() {
            Some(last) if sample.timestamp < last.timestamp() => Admission::Backdated,
            _ => Admission::Accept,
        }
    }

    /// Append an entry and drop everything older than the retention window
    /// relative to it. Returns `false` when the entry was not admissible.
    pub fn record(&mut self, entry: BufferedSample) -> bool {
        if self.admission(&entry.sample) != Admission::Accept {
            return false;
        }
        self.entries.push_back(entry);
        self.purge();
        true
    }

    fn purge(&mut self) {
        let Some(newest) = self.entries.back().map(BufferedSample::timestamp) else {
            return;
        };
        let cutoff = newest - self.retention;
        while self
            .entries
            .front()
            .is_some_and(|e| e.timestamp() < cutoff)
        {
            self.entries.pop_front();
        }
    }

    pub fn last(&self) -> Option<&BufferedSample> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Samples within the trailing `duration` of the newest sample.
    ///
    /// The iterator is lazy and `Clone`, so it can be restarted.
    pub fn window(
        &self,
        duration: Duration,
    ) -> impl Iterator<Item = &BufferedSample> + Clone + '_ {
        let start = self.window_start(duration);
        self.entries
            .iter()
            .skip_while(move |e| start.is_some_and(|s| e.timestamp() < s))
    }

    /// Credited intervals overlapping the trailing `duration`, with the one
    /// straddling the window start clipped to it.
    pub fn intervals_within(
        &self,
        duration: Duration,
    ) -> impl Iterator<Item = ClippedInterval> + Clone + '_ {
        let start = self.window_start(duration);
        self.entries.iter().filter_map(move |e| {
            let interval = e.interval.as_ref()?;
            let start = start?;
            let end = e.timestamp();
            if end <= start {
                return None;
            }
            let inside = (end - start).num_seconds().min(interval.seconds);
            if inside <= 0 {
                return None;
            }
            let energy = interval.energy.map(|r| {
                if inside == interval.seconds {
                    r
                } else {
                    r.scaled(inside as f64 / interval.seconds as f64)
                }
            });
            Some(ClippedInterval {
                seconds: inside,
                heating: interval.heating,
                start_delta_t: interval.start_delta_t,
                energy,
            })
        })
    }

    fn window_start(&self, duration: Duration) -> Option<DateTime<Utc>> {
        self.entries.back().map(|e| e.timestamp() - duration)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &BufferedSample> + '_ {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnergyQuality;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
    }

    fn entry(minutes: i64, interval_secs: Option<i64>) -> BufferedSample {
        BufferedSample {
            sample: Sample::new(t0() + Duration::minutes(minutes), 20.0, 10.0, false),
            heating: false,
            interval: interval_secs.map(|seconds| Interval {
                seconds,
                heating: true,
                start_delta_t: 10.0,
                energy: Some(EnergyReading {
                    kwh: 1.0,
                    quality: EnergyQuality::Measured,
                }),
            }),
        }
    }

    #[test]
    fn test_purges_older_than_retention() {
        let mut buf = SampleBuffer::new(Duration::hours(48));
        for h in 0..=50 {
            assert!(buf.record(entry(h * 60, None)));
        }
        // newest at 50h, cutoff at 2h inclusive
        assert_eq!(buf.len(), 49);
        assert_eq!(buf.entries().next().unwrap().timestamp(), t0() + Duration::hours(2));
    }

    #[test]
    fn test_rejects_non_finite_silently() {
        let mut buf = SampleBuffer::new(Duration::hours(48));
        let mut bad = entry(0, None);
        bad.sample.indoor_temp = f64::NAN;
        assert!(!buf.record(bad));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_backdated_sample_refused() {
        let mut buf = SampleBuffer::new(Duration::hours(48));
        assert!(buf.record(entry(60, None)));
        assert_eq!(buf.admission(&entry(30, None).sample), Admission::Backdated);
        assert!(!buf.record(entry(30, None)));
        // Equal timestamps are not a regression
        assert!(buf.record(entry(60, None)));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_window_is_restartable() {
        let mut buf = SampleBuffer::new(Duration::hours(48));
        for m in (0..=180).step_by(30) {
            buf.record(entry(m, None));
        }
        let w = buf.window(Duration::hours(1));
        assert_eq!(w.clone().count(), 3);
        assert_eq!(w.count(), 3);
    }

    #[test]
    fn test_straddling_interval_is_clipped() {
        let mut buf = SampleBuffer::new(Duration::hours(48));
        buf.record(entry(0, None));
        buf.record(entry(60, Some(3600)));
        buf.record(entry(120, Some(3600)));
        // 90 minute window starts at minute 30: half of the first interval
        let clipped: Vec<_> = buf.intervals_within(Duration::minutes(90)).collect();
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped[0].seconds, 1800);
        assert!((clipped[0].energy.unwrap().kwh - 0.5).abs() < 1e-9);
        assert_eq!(clipped[1].seconds, 3600);
    }
}
