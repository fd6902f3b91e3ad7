//! Zone Actor - single owner of one zone's engine
//!
//! Samples, timers and commands for a zone all go through its actor's
//! channel, so the engine never runs concurrently with itself.
//!
//! Each wake-up drains everything already queued and applies it in three
//! passes: samples and rollover checks in arrival order, then resets, then
//! queries, saves and shutdown. A reset queued alongside a rollover is
//! therefore the last writer, and queries see the post-reset state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::engine::{TickOutcome, ZoneEngine};
use crate::storage::{PersistenceError, PersistenceManager, SaveRequest};
use crate::types::{DailySummary, Sample, ZoneOutputs};

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug)]
pub enum ZoneCommand {
    /// Feed one sample
    Sample(Sample),
    /// Wall-clock rollover check
    RolloverCheck(DateTime<Utc>),
    /// Periodic snapshot save (dropped if one is in flight)
    Save,
    ResetHistory {
        response_tx: oneshot::Sender<bool>,
    },
    ResetAll {
        response_tx: oneshot::Sender<()>,
    },
    GetOutputs {
        response_tx: oneshot::Sender<ZoneOutputs>,
    },
    GetHistory {
        response_tx: oneshot::Sender<Vec<DailySummary>>,
    },
    GetArchive {
        response_tx: oneshot::Sender<Vec<DailySummary>>,
    },
    GetStats {
        response_tx: oneshot::Sender<ZoneStats>,
    },
    /// Save synchronously and stop the actor
    Shutdown {
        response_tx: oneshot::Sender<Result<(), PersistenceError>>,
    },
}

impl ZoneCommand {
    fn pass(&self) -> u8 {
        match self {
            ZoneCommand::Sample(_) | ZoneCommand::RolloverCheck(_) => 0,
            ZoneCommand::ResetHistory { .. } | ZoneCommand::ResetAll { .. } => 1,
            _ => 2,
        }
    }
}

/// Per-zone ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ZoneStats {
    pub samples_recorded: u64,
    pub samples_rejected: u64,
    pub samples_backdated: u64,
    pub days_finalized: u64,
    pub saves_started: u64,
    pub saves_dropped: u64,
}

// ============================================================================
// Actor Handle
// ============================================================================

/// Cloneable handle to a running [`ZoneActor`].
#[derive(Clone, Debug)]
pub struct ZoneHandle {
    zone_id: String,
    tx: mpsc::Sender<ZoneCommand>,
}

impl ZoneHandle {
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, cmd: ZoneCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .with_context(|| format!("Zone actor '{}' channel closed", self.zone_id))
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> ZoneCommand) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(build(response_tx)).await?;
        response_rx.await.context("Response channel closed")
    }

    pub async fn send_sample(&self, sample: Sample) -> Result<()> {
        self.send(ZoneCommand::Sample(sample)).await
    }

    pub async fn rollover_check(&self, now: DateTime<Utc>) -> Result<()> {
        self.send(ZoneCommand::RolloverCheck(now)).await
    }

    pub async fn request_save(&self) -> Result<()> {
        self.send(ZoneCommand::Save).await
    }

    /// Clear the rolling history. `false` if it was already empty.
    pub async fn reset_history(&self) -> Result<bool> {
        self.request(|response_tx| ZoneCommand::ResetHistory { response_tx })
            .await
    }

    pub async fn reset_all(&self) -> Result<()> {
        self.request(|response_tx| ZoneCommand::ResetAll { response_tx })
            .await
    }

    pub async fn outputs(&self) -> Result<ZoneOutputs> {
        self.request(|response_tx| ZoneCommand::GetOutputs { response_tx })
            .await
    }

    pub async fn history(&self) -> Result<Vec<DailySummary>> {
        self.request(|response_tx| ZoneCommand::GetHistory { response_tx })
            .await
    }

    pub async fn archive(&self) -> Result<Vec<DailySummary>> {
        self.request(|response_tx| ZoneCommand::GetArchive { response_tx })
            .await
    }

    pub async fn stats(&self) -> Result<ZoneStats> {
        self.request(|response_tx| ZoneCommand::GetStats { response_tx })
            .await
    }

    /// Write the final snapshot and stop the actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response_tx| ZoneCommand::Shutdown { response_tx })
            .await?
            .with_context(|| format!("Final save of zone '{}' failed", self.zone_id))
    }
}

// ============================================================================
// Zone Actor
// ============================================================================

pub struct ZoneActor {
    engine: ZoneEngine,
    persistence: PersistenceManager,
    rx: mpsc::Receiver<ZoneCommand>,
    stats: ZoneStats,
}

impl ZoneActor {
    pub fn new(
        engine: ZoneEngine,
        persistence: PersistenceManager,
        capacity: usize,
    ) -> (Self, ZoneHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = ZoneHandle {
            zone_id: engine.id().to_string(),
            tx,
        };
        let actor = Self {
            engine,
            persistence,
            rx,
            stats: ZoneStats::default(),
        };
        (actor, handle)
    }

    pub async fn run(mut self) {
        info!(zone = %self.engine.id(), "Zone actor starting");

        'outer: while let Some(first) = self.rx.recv().await {
            let mut batch = vec![first];
            while let Ok(cmd) = self.rx.try_recv() {
                batch.push(cmd);
            }
            // Stable: arrival order is kept within each pass
            batch.sort_by_key(ZoneCommand::pass);

            for cmd in batch {
                if self.handle(cmd).await {
                    break 'outer;
                }
            }
        }

        info!(
            zone = %self.engine.id(),
            recorded = self.stats.samples_recorded,
            days_finalized = self.stats.days_finalized,
            "Zone actor stopped"
        );
    }

    /// Apply one command. Returns `true` when the actor should stop.
    async fn handle(&mut self, cmd: ZoneCommand) -> bool {
        match cmd {
            ZoneCommand::Sample(sample) => self.handle_sample(sample),
            ZoneCommand::RolloverCheck(now) => {
                let finalized = self.engine.rollover_if_due(now);
                self.stats.days_finalized += finalized.len() as u64;
            }
            ZoneCommand::Save => self.handle_save(),
            ZoneCommand::ResetHistory { response_tx } => {
                let _ = response_tx.send(self.engine.reset_history());
            }
            ZoneCommand::ResetAll { response_tx } => {
                self.engine.reset_all();
                let _ = response_tx.send(());
            }
            ZoneCommand::GetOutputs { response_tx } => {
                let _ = response_tx.send(self.engine.outputs());
            }
            ZoneCommand::GetHistory { response_tx } => {
                let _ = response_tx.send(self.engine.history().to_vec());
            }
            ZoneCommand::GetArchive { response_tx } => {
                let _ = response_tx.send(self.engine.archive().to_vec());
            }
            ZoneCommand::GetStats { response_tx } => {
                let _ = response_tx.send(self.stats);
            }
            ZoneCommand::Shutdown { response_tx } => {
                let result = self.persistence.save_now(self.engine.snapshot()).await;
                if let Err(e) = &result {
                    error!(zone = %self.engine.id(), error = %e, "Final snapshot save failed");
                }
                let _ = response_tx.send(result);
                return true;
            }
        }
        false
    }

    fn handle_sample(&mut self, sample: Sample) {
        match self.engine.tick(sample) {
            TickOutcome::Recorded { finalized, .. } => {
                self.stats.samples_recorded += 1;
                self.stats.days_finalized += finalized.len() as u64;
            }
            TickOutcome::Rejected => self.stats.samples_rejected += 1,
            TickOutcome::Backdated => self.stats.samples_backdated += 1,
        }
    }

    fn handle_save(&mut self) {
        match self.persistence.request_save(self.engine.snapshot()) {
            SaveRequest::Started(handle) => {
                self.stats.saves_started += 1;
                let zone = self.engine.id().to_string();
                tokio::spawn(async move {
                    match handle.await {
                        Ok(Ok(())) => debug!(zone = %zone, "Periodic save complete"),
                        Ok(Err(e)) => warn!(zone = %zone, error = %e, "Periodic save failed"),
                        Err(e) => warn!(zone = %zone, error = %e, "Periodic save task panicked"),
                    }
                });
            }
            SaveRequest::Dropped => self.stats.saves_dropped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineSettings, ZoneConfig};
    use crate::storage::InMemorySnapshotStore;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
    }

    fn spawn(capacity: usize) -> (ZoneHandle, PersistenceManager, tokio::task::JoinHandle<()>) {
        let persistence = PersistenceManager::new(Arc::new(InMemorySnapshotStore::new()));
        let engine = ZoneEngine::new(
            ZoneConfig::electric("kitchen", 1500.0),
            EngineSettings::default(),
        );
        let (actor, handle) = ZoneActor::new(engine, persistence.clone(), capacity);
        (handle, persistence, tokio::spawn(actor.run()))
    }

    fn sample(minutes: i64) -> Sample {
        Sample::new(t0() + Duration::minutes(minutes), 20.0, 6.0, minutes < 360)
    }

    #[tokio::test]
    async fn test_samples_are_counted() {
        let (handle, _, _task) = spawn(16);
        handle.send_sample(sample(0)).await.unwrap();
        handle.send_sample(sample(10)).await.unwrap();
        handle.send_sample(sample(5)).await.unwrap();
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.samples_recorded, 2);
        assert_eq!(stats.samples_backdated, 1);
    }

    #[tokio::test]
    async fn test_reset_history_twice_is_noop_second_time() {
        let (handle, _, _task) = spawn(512);
        for m in (0..=24 * 60).step_by(10) {
            handle.send_sample(sample(m)).await.unwrap();
        }
        assert_eq!(handle.history().await.unwrap().len(), 1);
        assert!(handle.reset_history().await.unwrap());
        assert!(!handle.reset_history().await.unwrap());
        assert!(handle.history().await.unwrap().is_empty());
        assert_eq!(handle.archive().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_all_wins_over_queued_rollover() {
        let (handle, _, _task) = spawn(512);
        for m in (0..24 * 60).step_by(10) {
            handle.send_sample(sample(m)).await.unwrap();
        }
        // Queued back to back: the reset lands after the rollover
        let (tx, rx) = oneshot::channel();
        handle
            .rollover_check(t0() + Duration::days(1) + Duration::hours(2))
            .await
            .unwrap();
        handle
            .send(ZoneCommand::ResetAll { response_tx: tx })
            .await
            .unwrap();
        rx.await.unwrap();

        let outputs = handle.outputs().await.unwrap();
        assert_eq!(outputs.data_hours, 0.0);
        assert!(!outputs.ready);
        assert!(handle.history().await.unwrap().is_empty());
        assert!(handle.archive().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_writes_snapshot() {
        let (handle, persistence, task) = spawn(16);
        handle.send_sample(sample(0)).await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let snapshot = persistence.load_snapshot("kitchen").unwrap().unwrap();
        assert_eq!(snapshot.buffer.len(), 1);
        assert!(handle.send_sample(sample(10)).await.is_err());
    }
}
