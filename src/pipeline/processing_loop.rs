//! Sample processing loop.
//!
//! Reads samples from a [`SampleSource`] and routes them to zone actors,
//! while driving the two zone timers: the periodic snapshot save and the
//! wall-clock rollover check.

use chrono::Utc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::registry::ZoneRegistry;
use super::source::{SampleEvent, SampleSource};
use crate::config::defaults;

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub samples_dispatched: u64,
    pub samples_unrouted: u64,
    pub save_rounds: u64,
    pub rollover_checks: u64,
}

/// Owns the registry and timers for one run.
///
/// Built with [`new()`](ProcessingLoop::new), tuned with the builder methods,
/// then consumed by [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop {
    registry: ZoneRegistry,
    cancel_token: CancellationToken,
    save_interval: Duration,
    /// `None` disables wall-clock rollover (replays of historical data)
    rollover_interval: Option<Duration>,
    stop_on_eof: bool,
}

impl ProcessingLoop {
    pub fn new(registry: ZoneRegistry, cancel_token: CancellationToken) -> Self {
        Self {
            registry,
            cancel_token,
            save_interval: Duration::from_secs(defaults::SAVE_INTERVAL_SECS),
            rollover_interval: Some(Duration::from_secs(defaults::ROLLOVER_CHECK_INTERVAL_SECS)),
            stop_on_eof: false,
        }
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn with_rollover_interval(mut self, interval: Option<Duration>) -> Self {
        self.rollover_interval = interval;
        self
    }

    /// Return when the source is exhausted instead of idling on timers.
    pub fn stop_on_eof(mut self, stop: bool) -> Self {
        self.stop_on_eof = stop;
        self
    }

    /// Run until cancellation (or end of input with `stop_on_eof`).
    pub async fn run<S: SampleSource>(self, source: &mut S) -> LoopStats {
        let mut stats = LoopStats::default();

        let mut save_timer = interval_at(Instant::now() + self.save_interval, self.save_interval);
        save_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let rollover_period = self
            .rollover_interval
            .unwrap_or(Duration::from_secs(defaults::ROLLOVER_CHECK_INTERVAL_SECS));
        let mut rollover_timer = interval_at(Instant::now() + rollover_period, rollover_period);
        rollover_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut source_done = false;
        info!(
            source = source.source_name(),
            zones = self.registry.len(),
            save_interval_secs = self.save_interval.as_secs(),
            wall_clock_rollover = self.rollover_interval.is_some(),
            "Processing samples"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                result = source.next_sample(), if !source_done => {
                    match result {
                        Ok(SampleEvent::Sample(zone_sample)) => {
                            match self.registry.dispatch(zone_sample).await {
                                Ok(true) => stats.samples_dispatched += 1,
                                Ok(false) => stats.samples_unrouted += 1,
                                Err(e) => {
                                    warn!(error = %e, "Sample dispatch failed");
                                    stats.samples_unrouted += 1;
                                }
                            }
                        }
                        Ok(SampleEvent::Eof) => {
                            info!(source = source.source_name(), "Source exhausted");
                            source_done = true;
                        }
                        Err(e) => {
                            warn!(source = source.source_name(), error = %e, "Source error");
                            source_done = true;
                        }
                    }
                    if source_done && self.stop_on_eof {
                        break;
                    }
                }
                _ = save_timer.tick() => {
                    self.registry.save_all().await;
                    stats.save_rounds += 1;
                }
                _ = rollover_timer.tick(), if self.rollover_interval.is_some() => {
                    self.registry.rollover_all(Utc::now()).await;
                    stats.rollover_checks += 1;
                }
            }
        }

        info!(
            dispatched = stats.samples_dispatched,
            unrouted = stats.samples_unrouted,
            save_rounds = stats.save_rounds,
            "Processing loop finished"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, ZoneConfig};
    use crate::pipeline::source::ReplaySource;
    use crate::storage::{InMemorySnapshotStore, PersistenceManager};
    use crate::types::{Sample, ZoneSample};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::Arc;

    fn replay(zone: &str, count: i64) -> Vec<ZoneSample> {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| ZoneSample {
                zone: zone.to_string(),
                sample: Sample::new(t0 + ChronoDuration::minutes(10 * i), 20.0, 5.0, i % 2 == 0),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_replay_routes_samples_and_stops_on_eof() {
        let config = EngineConfig {
            zones: vec![ZoneConfig::electric("lounge", 1200.0)],
            ..EngineConfig::default()
        };
        let persistence = PersistenceManager::new(Arc::new(InMemorySnapshotStore::new()));
        let (registry, _tasks) = ZoneRegistry::spawn_all(&config, &persistence);

        let mut samples = replay("lounge", 12);
        samples.extend(replay("garage", 2));
        let mut source = ReplaySource::new(samples, 0);

        let stats = ProcessingLoop::new(registry.clone(), CancellationToken::new())
            .with_rollover_interval(None)
            .stop_on_eof(true)
            .run(&mut source)
            .await;
        assert_eq!(stats.samples_dispatched, 12);
        assert_eq!(stats.samples_unrouted, 2);

        let handle = registry.get("lounge").unwrap();
        let zone_stats = handle.stats().await.unwrap();
        assert_eq!(zone_stats.samples_recorded, 12);
        assert!((handle.outputs().await.unwrap().data_hours - 110.0 / 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cancellation_stops_idle_loop() {
        let token = CancellationToken::new();
        let mut source = ReplaySource::new(Vec::new(), 0);
        let run = ProcessingLoop::new(ZoneRegistry::new(), token.clone()).run(&mut source);
        token.cancel();
        let stats = run.await;
        assert_eq!(stats, LoopStats::default());
    }
}
