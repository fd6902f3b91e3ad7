//! Zone registry: spawns one actor per configured zone and routes samples.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::actor::{ZoneActor, ZoneHandle};
use crate::config::{defaults, EngineConfig};
use crate::storage::PersistenceManager;
use crate::types::ZoneSample;

/// Handles for every running zone, keyed by zone id.
#[derive(Clone, Debug, Default)]
pub struct ZoneRegistry {
    zones: BTreeMap<String, ZoneHandle>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore every configured zone from storage and spawn its actor.
    pub fn spawn_all(
        config: &EngineConfig,
        persistence: &PersistenceManager,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let mut registry = Self::new();
        let mut tasks = Vec::with_capacity(config.zones.len());
        for zone in &config.zones {
            let engine = persistence.load_engine(zone.clone(), config.engine.clone());
            let (actor, handle) =
                ZoneActor::new(engine, persistence.clone(), defaults::ZONE_CHANNEL_CAPACITY);
            registry.insert(handle);
            tasks.push(tokio::spawn(actor.run()));
        }
        info!(zones = registry.len(), backend = persistence.backend_name(), "Zone actors spawned");
        (registry, tasks)
    }

    pub fn insert(&mut self, handle: ZoneHandle) {
        self.zones.insert(handle.zone_id().to_string(), handle);
    }

    pub fn get(&self, zone_id: &str) -> Option<&ZoneHandle> {
        self.zones.get(zone_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    pub fn handles(&self) -> impl Iterator<Item = &ZoneHandle> {
        self.zones.values()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Route a sample to its zone. `Ok(false)` if the zone is unknown.
    pub async fn dispatch(&self, zone_sample: ZoneSample) -> Result<bool> {
        let Some(handle) = self.zones.get(&zone_sample.zone) else {
            warn!(zone = %zone_sample.zone, "Sample for unknown zone ignored");
            return Ok(false);
        };
        handle.send_sample(zone_sample.sample).await?;
        Ok(true)
    }

    pub async fn rollover_all(&self, now: DateTime<Utc>) {
        for handle in self.zones.values() {
            if let Err(e) = handle.rollover_check(now).await {
                warn!(zone = %handle.zone_id(), error = %e, "Rollover check not delivered");
            }
        }
    }

    pub async fn save_all(&self) {
        for handle in self.zones.values() {
            if let Err(e) = handle.request_save().await {
                warn!(zone = %handle.zone_id(), error = %e, "Save request not delivered");
            }
        }
    }

    /// Final save of every zone. Returns the number of zones that failed.
    pub async fn shutdown_all(&self) -> usize {
        let mut failures = 0;
        for handle in self.zones.values() {
            if let Err(e) = handle.shutdown().await {
                warn!(zone = %handle.zone_id(), error = %e, "Zone shutdown failed");
                failures += 1;
            }
        }
        failures
    }
}
