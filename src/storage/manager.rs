//! Persistence Manager - load, periodic save and shutdown save of zone engines
//!
//! At most one save runs per zone. A periodic save requested while the
//! previous one is still writing is dropped, not queued. The shutdown save
//! waits for any in-flight write and then writes the final state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{PersistenceError, SnapshotStore, ZoneSnapshot};
use crate::config::{EngineSettings, ZoneConfig};
use crate::engine::ZoneEngine;

/// Outcome of a save request.
#[derive(Debug)]
pub enum SaveRequest {
    /// Write running on the blocking pool
    Started(JoinHandle<Result<(), PersistenceError>>),
    /// Another save for the same zone is still in flight
    Dropped,
}

impl SaveRequest {
    pub fn is_started(&self) -> bool {
        matches!(self, SaveRequest::Started(_))
    }
}

#[derive(Clone)]
pub struct PersistenceManager {
    store: Arc<dyn SnapshotStore>,
    gates: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl PersistenceManager {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            gates: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    fn gate(&self, zone_id: &str) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates
            .entry(zone_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Build a zone engine from its stored snapshot.
    ///
    /// A missing, unreadable or corrupt snapshot yields a fresh engine.
    pub fn load_engine(&self, zone: ZoneConfig, settings: EngineSettings) -> ZoneEngine {
        match self.load_snapshot(&zone.id) {
            Ok(Some(snapshot)) => {
                info!(
                    zone = %zone.id,
                    samples = snapshot.buffer.len(),
                    history = snapshot.history.len(),
                    archive = snapshot.archive.len(),
                    "Restored zone snapshot"
                );
                ZoneEngine::restore(zone, settings, snapshot)
            }
            Ok(None) => {
                debug!(zone = %zone.id, "No snapshot found, starting fresh");
                ZoneEngine::new(zone, settings)
            }
            Err(e) => {
                warn!(zone = %zone.id, error = %e, "Snapshot unreadable, starting fresh");
                ZoneEngine::new(zone, settings)
            }
        }
    }

    pub fn load_snapshot(&self, zone_id: &str) -> Result<Option<ZoneSnapshot>, PersistenceError> {
        self.store
            .read(zone_id)?
            .map(|bytes| ZoneSnapshot::from_bytes(&bytes))
            .transpose()
    }

    /// Start a background save unless one is already running for the zone.
    pub fn request_save(&self, snapshot: ZoneSnapshot) -> SaveRequest {
        let Ok(guard) = self.gate(&snapshot.zone_id).try_lock_owned() else {
            debug!(zone = %snapshot.zone_id, "Save already in flight, dropping request");
            return SaveRequest::Dropped;
        };
        let store = Arc::clone(&self.store);
        SaveRequest::Started(tokio::task::spawn_blocking(move || {
            let result = write_snapshot(store.as_ref(), &snapshot);
            drop(guard);
            result
        }))
    }

    /// Wait for any in-flight save of the zone, then write `snapshot`.
    pub async fn save_now(&self, snapshot: ZoneSnapshot) -> Result<(), PersistenceError> {
        let guard = self.gate(&snapshot.zone_id).lock_owned().await;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let result = write_snapshot(store.as_ref(), &snapshot);
            drop(guard);
            result
        })
        .await
        .map_err(|e| PersistenceError::Task(e.to_string()))?
    }

    /// Remove a zone's snapshot (used by `--reset-zone`).
    pub fn remove(&self, zone_id: &str) -> Result<(), PersistenceError> {
        self.store.remove(zone_id)
    }
}

fn write_snapshot(store: &dyn SnapshotStore, snapshot: &ZoneSnapshot) -> Result<(), PersistenceError> {
    let bytes = snapshot.to_bytes()?;
    store.write(&snapshot.zone_id, &bytes)?;
    debug!(zone = %snapshot.zone_id, bytes = bytes.len(), backend = store.backend_name(), "Snapshot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemorySnapshotStore;
    use std::time::Duration;

    /// Store whose writes take a while, to hold a save in flight.
    struct SlowStore {
        inner: InMemorySnapshotStore,
        delay: Duration,
    }

    impl SnapshotStore for SlowStore {
        fn read(&self, zone_id: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
            self.inner.read(zone_id)
        }
        fn write(&self, zone_id: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
            std::thread::sleep(self.delay);
            self.inner.write(zone_id, bytes)
        }
        fn remove(&self, zone_id: &str) -> Result<(), PersistenceError> {
            self.inner.remove(zone_id)
        }
        fn zone_ids(&self) -> Result<Vec<String>, PersistenceError> {
            self.inner.zone_ids()
        }
        fn backend_name(&self) -> &'static str {
            "Slow"
        }
    }

    fn snapshot(zone: &str) -> ZoneSnapshot {
        ZoneSnapshot {
            zone_id: zone.to_string(),
            ..ZoneSnapshot::default()
        }
    }

    #[tokio::test]
    async fn test_second_save_dropped_while_in_flight() {
        let manager = PersistenceManager::new(Arc::new(SlowStore {
            inner: InMemorySnapshotStore::new(),
            delay: Duration::from_millis(300),
        }));

        let first = manager.request_save(snapshot("a"));
        assert!(first.is_started());
        assert!(matches!(manager.request_save(snapshot("a")), SaveRequest::Dropped));

        // Other zones are independent
        let other = manager.request_save(snapshot("b"));
        assert!(other.is_started());

        if let SaveRequest::Started(handle) = first {
            handle.await.unwrap().unwrap();
        }
        assert!(manager.request_save(snapshot("a")).is_started());
    }

    #[tokio::test]
    async fn test_save_now_waits_for_in_flight_save() {
        let manager = PersistenceManager::new(Arc::new(SlowStore {
            inner: InMemorySnapshotStore::new(),
            delay: Duration::from_millis(100),
        }));
        let _ = manager.request_save(snapshot("a"));
        manager.save_now(snapshot("a")).await.unwrap();
        assert!(manager.load_snapshot("a").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_gives_fresh_engine() {
        let store = Arc::new(InMemorySnapshotStore::new());
        store.write("den", b"{\"buffer\": [truncated").unwrap();
        let manager = PersistenceManager::new(store);
        let engine = manager.load_engine(
            ZoneConfig::electric("den", 1000.0),
            EngineSettings::default(),
        );
        assert!(engine.buffer().is_empty());
        assert_eq!(engine.state().data_hours(), 0.0);
        assert!(!engine.state().ready());
    }

    #[tokio::test]
    async fn test_missing_snapshot_gives_fresh_engine() {
        let manager = PersistenceManager::new(Arc::new(InMemorySnapshotStore::new()));
        let engine = manager.load_engine(
            ZoneConfig::electric("attic", 1000.0),
            EngineSettings::default(),
        );
        assert!(engine.history().is_empty());
        assert!(engine.archive().is_empty());
    }
}
