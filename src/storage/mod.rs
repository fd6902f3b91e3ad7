//! Zone Snapshot Storage
//!
//! Crash-safe persistence of zone engines:
//! - `snapshot`: versioned, forward-compatible `ZoneSnapshot`
//! - `persistence`: `SnapshotStore` trait with sled and in-memory backends
//! - `manager`: load-or-fresh, periodic and shutdown saves, one save in
//!   flight per zone

pub mod manager;
pub mod persistence;
pub mod snapshot;

pub use manager::{PersistenceManager, SaveRequest};
pub use persistence::{InMemorySnapshotStore, PersistenceError, SledSnapshotStore, SnapshotStore};
pub use snapshot::{ZoneSnapshot, SCHEMA_VERSION};
