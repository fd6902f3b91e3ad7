//! Persistence Integration Tests
//!
//! Zone engines saved to a sled database on disk and restored in a new
//! store instance, plus the fresh-state fallbacks for missing, corrupt and
//! older snapshots.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use thermal_zones::config::{EngineSettings, ZoneConfig};
use thermal_zones::engine::ZoneEngine;
use thermal_zones::storage::{
    PersistenceManager, SledSnapshotStore, SnapshotStore, ZoneSnapshot, SCHEMA_VERSION,
};
use thermal_zones::types::{Sample, Season};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 3, 0, 0, 0).unwrap()
}

fn zone() -> ZoneConfig {
    ZoneConfig::electric("bedroom", 800.0).with_volume(30.0)
}

fn engine_with_days(days: i64) -> ZoneEngine {
    let mut engine = ZoneEngine::new(zone(), EngineSettings::default());
    for m in (0..=days * 24 * 60 + 90).step_by(10) {
        let sample = Sample::new(t0() + Duration::minutes(m), 19.0, 3.0, m % 1440 < 480);
        engine.tick(sample);
    }
    engine
}

fn open_manager(path: &std::path::Path) -> PersistenceManager {
    PersistenceManager::new(Arc::new(SledSnapshotStore::open(path).unwrap()))
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("snapshots.db");

    let engine = engine_with_days(2);
    let before = engine.outputs();
    {
        let manager = open_manager(&db);
        manager.save_now(engine.snapshot()).await.unwrap();
    }

    let manager = open_manager(&db);
    let restored = manager.load_engine(zone(), EngineSettings::default());

    assert_eq!(restored.history().to_vec(), engine.history().to_vec());
    assert_eq!(restored.archive().to_vec(), engine.archive().to_vec());
    assert_eq!(restored.buffer().len(), engine.buffer().len());
    assert_eq!(restored.last_rollover(), engine.last_rollover());
    assert_eq!(restored.state(), engine.state());
    assert_eq!(restored.open_day(), engine.open_day());

    let after = restored.outputs();
    assert_eq!(after.ready, before.ready);
    assert_eq!(after.k, before.k);
    assert_eq!(after.insulation_rating, before.insulation_rating);
    assert_eq!(after.k_history_7d, before.k_history_7d);
}

#[tokio::test]
async fn restored_engine_continues_where_it_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let manager = open_manager(&dir.path().join("snapshots.db"));

    let engine = engine_with_days(1);
    let last = engine.buffer().last().unwrap().timestamp();
    manager.save_now(engine.snapshot()).await.unwrap();

    let mut restored = manager.load_engine(zone(), EngineSettings::default());
    let hours_before = restored.state().data_hours();

    // Already-seen time is refused, new time is credited
    assert!(!matches!(
        restored.tick(Sample::new(last - Duration::minutes(30), 19.0, 3.0, false)),
        thermal_zones::TickOutcome::Recorded { .. }
    ));
    restored.tick(Sample::new(last + Duration::minutes(10), 19.0, 3.0, false));
    assert!((restored.state().data_hours() - hours_before - 10.0 / 60.0).abs() < 1e-9);
}

#[tokio::test]
async fn corrupt_snapshot_on_disk_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("snapshots.db");
    {
        let store = SledSnapshotStore::open(&db).unwrap();
        store.write("bedroom", b"{\"schema_version\":1,\"buffer\":[{\"oops\"").unwrap();
    }

    let manager = open_manager(&db);
    let engine = manager.load_engine(zone(), EngineSettings::default());
    assert!(engine.buffer().is_empty());
    assert!(engine.history().is_empty());
    assert!(!engine.state().ready());
    assert_eq!(engine.state().season, Season::Heating);
}

#[tokio::test]
async fn newer_schema_starts_fresh() {
    let manager = PersistenceManager::new(Arc::new(
        thermal_zones::storage::InMemorySnapshotStore::new(),
    ));
    let snapshot = ZoneSnapshot {
        schema_version: SCHEMA_VERSION + 1,
        ..engine_with_days(1).snapshot()
    };
    manager.save_now(snapshot).await.unwrap();

    let engine = manager.load_engine(zone(), EngineSettings::default());
    assert!(engine.archive().is_empty());
    assert_eq!(engine.state().data_hours(), 0.0);
}

#[tokio::test]
async fn older_snapshot_without_archive_loads() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("snapshots.db");
    let json = r#"{
        "zone_id": "bedroom",
        "state": {"season": "heating", "data_hours": 30.0, "ready": true, "last_valid_k": 21.5},
        "history": [
            {"date": "2025-02-01", "k": 21.0, "k_per_m3": 0.7, "energy_kwh": 7.5,
             "heating_hours": 8.0, "avg_delta_t": 15.0, "estimated": false},
            {"date": "2025-02-02", "k": 22.0, "k_per_m3": 0.73, "energy_kwh": 7.9,
             "heating_hours": 8.2, "avg_delta_t": 15.0, "estimated": false}
        ]
    }"#;
    {
        let store = SledSnapshotStore::open(&db).unwrap();
        store.write("bedroom", json.as_bytes()).unwrap();
    }

    let engine = open_manager(&db).load_engine(zone(), EngineSettings::default());
    assert!(engine.state().ready());
    assert_eq!(engine.state().last_valid_k, Some(21.5));
    assert_eq!(engine.history().len(), 2);
    assert!(engine.archive().is_empty());
    assert!(engine.last_rollover().is_none());
    assert!(engine.history().iter().all(|s| s.carried_days == 0 && s.k_7d.is_none()));
}

#[tokio::test]
async fn removed_snapshot_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let manager = open_manager(&dir.path().join("snapshots.db"));
    manager.save_now(engine_with_days(1).snapshot()).await.unwrap();
    assert!(manager.load_snapshot("bedroom").unwrap().is_some());

    manager.remove("bedroom").unwrap();
    assert!(manager.load_snapshot("bedroom").unwrap().is_none());
}
