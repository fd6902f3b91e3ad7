//! SnapshotStore trait - pluggable storage backend for zone snapshots
//!
//! Backends store one opaque blob per zone id and must replace it atomically:
//! - `SledSnapshotStore`: durable sled tree, flushed on every write
//! - `InMemorySnapshotStore`: for tests and ephemeral runs

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Trait for pluggable snapshot backends
///
/// Implementations must be thread-safe (Send + Sync): writes run on the
/// blocking pool while the owning zone keeps processing samples.
pub trait SnapshotStore: Send + Sync {
    /// Raw snapshot bytes for a zone, if any
    fn read(&self, zone_id: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Replace a zone's snapshot
    fn write(&self, zone_id: &str, bytes: &[u8]) -> Result<(), PersistenceError>;

    /// Delete a zone's snapshot
    fn remove(&self, zone_id: &str) -> Result<(), PersistenceError>;

    /// Zone ids with a stored snapshot
    fn zone_ids(&self) -> Result<Vec<String>, PersistenceError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("snapshot schema version {0} is newer than supported")]
    UnsupportedSchema(u32),
    #[error("save task failed: {0}")]
    Task(String),
}

// ============================================================================
// In-memory
// ============================================================================

/// In-memory store. Not durable.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn read(&self, zone_id: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let store = self
            .snapshots
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(store.get(zone_id).cloned())
    }

    fn write(&self, zone_id: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        let mut store = self
            .snapshots
            .write()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.insert(zone_id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, zone_id: &str) -> Result<(), PersistenceError> {
        let mut store = self
            .snapshots
            .write()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        store.remove(zone_id);
        Ok(())
    }

    fn zone_ids(&self) -> Result<Vec<String>, PersistenceError> {
        let store = self
            .snapshots
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        let mut ids: Vec<String> = store.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

// ============================================================================
// Sled
// ============================================================================

/// Sled tree holding snapshots.
const SNAPSHOT_TREE: &str = "zone_snapshots";

/// Durable sled-backed store.
///
/// Key: zone id (UTF-8). Value: JSON snapshot. A single `insert` replaces
/// the value atomically and is flushed before `write` returns.
#[derive(Clone)]
pub struct SledSnapshotStore {
    db: Arc<sled::Db>,
    tree: sled::Tree,
}

impl SledSnapshotStore {
    /// Open or create the snapshot database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PersistenceError::Storage(format!("{}: {e}", parent.display())))?;
        }
        let db = sled::open(path)?;
        let tree = db.open_tree(SNAPSHOT_TREE)?;
        tracing::info!(path = %path.display(), zones = tree.len(), "Snapshot store opened");
        Ok(Self {
            db: Arc::new(db),
            tree,
        })
    }

    /// Size of the database on disk (bytes)
    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn read(&self, zone_id: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.tree.get(zone_id.as_bytes())?.map(|v| v.to_vec()))
    }

    fn write(&self, zone_id: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        self.tree.insert(zone_id.as_bytes(), bytes)?;
        self.tree.flush()?;
        Ok(())
    }

    fn remove(&self, zone_id: &str) -> Result<(), PersistenceError> {
        self.tree.remove(zone_id.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }

    fn zone_ids(&self) -> Result<Vec<String>, PersistenceError> {
        let mut ids = Vec::new();
        for key in self.tree.iter().keys() {
            ids.push(String::from_utf8_lossy(&key?).into_owned());
        }
        Ok(ids)
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_round_trip() {
        let store = InMemorySnapshotStore::new();
        store.write("a", b"one").unwrap();
        store.write("a", b"two").unwrap();
        assert_eq!(store.read("a").unwrap().as_deref(), Some(&b"two"[..]));
        assert!(store.read("b").unwrap().is_none());
        store.remove("a").unwrap();
        assert!(store.zone_ids().unwrap().is_empty());
    }

    #[test]
    fn test_sled_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.db");
        {
            let store = SledSnapshotStore::open(&path).unwrap();
            store.write("office", b"{}").unwrap();
        }
        let store = SledSnapshotStore::open(&path).unwrap();
        assert_eq!(store.read("office").unwrap().as_deref(), Some(&b"{}"[..]));
        assert_eq!(store.zone_ids().unwrap(), vec!["office".to_string()]);
    }

    #[test]
    fn test_trait_object() {
        let store: Box<dyn SnapshotStore> = Box::new(InMemorySnapshotStore::new());
        assert_eq!(store.backend_name(), "InMemory");
    }
}
