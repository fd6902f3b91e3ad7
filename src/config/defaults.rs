//! System-wide default constants.
//!
//! Every tunable in `EngineSettings` starts from one of these values.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Sample Buffer
// ============================================================================

/// Retention of raw samples (hours).
pub const SAMPLE_RETENTION_HOURS: i64 = 48;

/// Largest gap between two samples still credited as a measured interval (minutes).
///
/// Longer gaps (host suspend, sensor outage) contribute no heating time,
/// energy or collected hours.
pub const MAX_SAMPLE_GAP_MINUTES: i64 = 60;

// ============================================================================
// Estimation
// ============================================================================

/// Trailing window of the instantaneous K estimate (hours).
pub const ROLLING_WINDOW_HOURS: i64 = 24;

/// Below this average ΔT (°C) K is undefined rather than divided by near-zero.
pub const K_DELTA_T_GUARD: f64 = 0.1;

/// Heater power above which a sample counts as heating (W).
pub const DEFAULT_POWER_THRESHOLD_W: f64 = 50.0;

// ============================================================================
// Season
// ============================================================================

/// ΔT (°C) below which the zone is off-season.
pub const MIN_DELTA_T: f64 = 5.0;

/// Extra ΔT (°C) required to re-enter heating after leaving it.
pub const SEASON_HYSTERESIS: f64 = 1.0;

// ============================================================================
// Readiness
// ============================================================================

/// Cumulative data required before K and ratings are exposed (hours).
pub const MIN_DATA_HOURS: f64 = 12.0;

// ============================================================================
// Daily Aggregation
// ============================================================================

/// Rolling history capacity (days).
pub const ROLLING_HISTORY_DAYS: usize = 7;

/// Long-term archive capacity (days). 1 825 ≈ 5 years.
pub const ARCHIVE_DAYS: usize = 1_825;

/// Consecutive carried-forward days before a slot becomes explicitly unknown.
pub const MAX_CARRY_FORWARD_DAYS: u32 = 7;

// ============================================================================
// Inference
// ============================================================================

/// Window of sustained ΔT required for an inferred-excellent rating (hours).
pub const INFERENCE_WINDOW_HOURS: i64 = 24;

/// Heating time in the inference window must stay below this (minutes).
pub const INFERENCE_MAX_HEATING_MINUTES: i64 = 30;

/// Indoor max − min in the inference window must stay below this (°C).
pub const INFERENCE_MAX_INDOOR_VARIATION: f64 = 2.0;

// ============================================================================
// Heat Pump COP
// ============================================================================

/// Heating time needed today before a COP is computed (hours).
pub const COP_MIN_HEATING_HOURS: f64 = 1.0;

/// Measured COP below this is flagged as implausible.
pub const COP_LOW_WARNING: f64 = 1.0;

/// Measured COP above this is flagged as implausible.
pub const COP_HIGH_WARNING: f64 = 7.0;

// ============================================================================
// Window Detection
// ============================================================================

/// Indoor temperature drop rate flagging an open window while heating (°C/min).
pub const WINDOW_DROP_RATE_HEATING: f64 = -0.7;

/// Indoor temperature drop rate flagging an open window regardless of heating (°C/min).
pub const WINDOW_DROP_RATE_IDLE: f64 = -1.2;

// ============================================================================
// Persistence & Runtime
// ============================================================================

/// Periodic snapshot interval (seconds).
pub const SAVE_INTERVAL_SECS: u64 = 300;

/// How often the rollover timer checks for a finished day (seconds).
pub const ROLLOVER_CHECK_INTERVAL_SECS: u64 = 60;

/// Zone actor mailbox capacity.
pub const ZONE_CHANNEL_CAPACITY: usize = 256;

/// Default data directory for snapshots.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default HTTP bind address.
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";
