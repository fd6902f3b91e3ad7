//! Engine Configuration - zone definitions and analysis tunables as TOML values
//!
//! Each struct implements `Default` with the values in `defaults`, so an
//! absent file or section behaves exactly like the built-in constants.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "THERMAL_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "thermal_zones.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a deployment.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$THERMAL_CONFIG` env var
/// 2. `./thermal_zones.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Analysis tunables shared by every zone
    #[serde(default)]
    pub engine: EngineSettings,

    /// Snapshot storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Monitored zones
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$THERMAL_CONFIG` environment variable
    /// 2. `./thermal_zones.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), zones = config.zones.len(), "Loaded config from THERMAL_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from THERMAL_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "THERMAL_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(zones = config.zones.len(), "Loaded config from ./thermal_zones.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./thermal_zones.toml, using defaults");
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn zone(&self, id: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Validate engine tunables and every zone, collecting all problems.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        self.engine.collect_errors(&mut errors);

        if self.persistence.save_interval_secs == 0 {
            errors.push("persistence.save_interval_secs must be > 0".to_string());
        }

        let mut seen = HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.id.as_str()) {
                errors.push(format!("zones: duplicate zone id '{}'", zone.id));
            }
            zone.collect_errors(&mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Engine Settings
// ============================================================================

/// Analysis tunables. Copied into every `ZoneEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Raw sample retention (hours)
    pub sample_retention_hours: i64,
    /// Gaps longer than this are not credited (minutes)
    pub max_sample_gap_minutes: i64,
    /// Instantaneous K window (hours)
    pub rolling_window_hours: i64,
    /// Average ΔT below which K is undefined (°C)
    pub k_delta_t_guard: f64,
    /// Off-season threshold on ΔT (°C); also the daily validity threshold
    pub min_delta_t: f64,
    /// Extra ΔT needed to re-enter heating (°C); 0 disables hysteresis
    pub season_hysteresis: f64,
    /// Hours of data before outputs are exposed
    pub min_data_hours: f64,
    /// Consecutive carried days before a slot becomes unknown
    pub max_carry_forward_days: u32,
    /// Sustained-ΔT window for the inferred rating (hours)
    pub inference_window_hours: i64,
    /// Heating allowed in the inference window (minutes)
    pub inference_max_heating_minutes: i64,
    /// Indoor max − min allowed in the inference window (°C)
    #[serde(alias = "inference_max_indoor_variance")]
    pub inference_max_indoor_variation: f64,
    /// Offset of the local day boundary from UTC (minutes)
    pub utc_offset_minutes: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_retention_hours: defaults::SAMPLE_RETENTION_HOURS,
            max_sample_gap_minutes: defaults::MAX_SAMPLE_GAP_MINUTES,
            rolling_window_hours: defaults::ROLLING_WINDOW_HOURS,
            k_delta_t_guard: defaults::K_DELTA_T_GUARD,
            min_delta_t: defaults::MIN_DELTA_T,
            season_hysteresis: defaults::SEASON_HYSTERESIS,
            min_data_hours: defaults::MIN_DATA_HOURS,
            max_carry_forward_days: defaults::MAX_CARRY_FORWARD_DAYS,
            inference_window_hours: defaults::INFERENCE_WINDOW_HOURS,
            inference_max_heating_minutes: defaults::INFERENCE_MAX_HEATING_MINUTES,
            inference_max_indoor_variation: defaults::INFERENCE_MAX_INDOOR_VARIATION,
            utc_offset_minutes: 0,
        }
    }
}

impl EngineSettings {
    pub fn retention(&self) -> Duration {
        Duration::hours(self.sample_retention_hours)
    }

    pub fn max_sample_gap(&self) -> Duration {
        Duration::minutes(self.max_sample_gap_minutes)
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::hours(self.rolling_window_hours)
    }

    pub fn inference_window(&self) -> Duration {
        Duration::hours(self.inference_window_hours)
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.sample_retention_hours < self.rolling_window_hours {
            errors.push(format!(
                "engine.sample_retention_hours ({}) must be >= rolling_window_hours ({})",
                self.sample_retention_hours, self.rolling_window_hours
            ));
        }
        if self.sample_retention_hours < self.inference_window_hours {
            errors.push(format!(
                "engine.sample_retention_hours ({}) must be >= inference_window_hours ({})",
                self.sample_retention_hours, self.inference_window_hours
            ));
        }
        if self.rolling_window_hours <= 0 {
            errors.push("engine.rolling_window_hours must be > 0".to_string());
        }
        if self.max_sample_gap_minutes <= 0 {
            errors.push("engine.max_sample_gap_minutes must be > 0".to_string());
        }
        if self.k_delta_t_guard <= 0.0 {
            errors.push("engine.k_delta_t_guard must be > 0".to_string());
        }
        if self.min_delta_t < self.k_delta_t_guard {
            errors.push(format!(
                "engine.min_delta_t ({}) must be >= k_delta_t_guard ({})",
                self.min_delta_t, self.k_delta_t_guard
            ));
        }
        if self.season_hysteresis < 0.0 {
            errors.push("engine.season_hysteresis must be >= 0".to_string());
        }
        if self.min_data_hours <= 0.0 {
            errors.push("engine.min_data_hours must be > 0".to_string());
        }
        if self.inference_max_indoor_variation <= 0.0 {
            errors.push("engine.inference_max_indoor_variation must be > 0".to_string());
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            errors.push(format!(
                "engine.utc_offset_minutes ({}) must be within one day",
                self.utc_offset_minutes
            ));
        }
    }
}

// ============================================================================
// Persistence & Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory holding the snapshot database
    pub data_dir: PathBuf,
    /// Periodic snapshot interval (seconds)
    pub save_interval_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(defaults::DEFAULT_DATA_DIR),
            save_interval_secs: defaults::SAVE_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: defaults::DEFAULT_SERVER_ADDR.to_string(),
            enabled: true,
        }
    }
}

// ============================================================================
// Zones
// ============================================================================

/// Kind of heat source feeding a zone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HeatSourceType {
    #[default]
    Electric,
    #[serde(alias = "heat_pump")]
    Heatpump,
    /// Older configs used plain `gas`
    #[serde(alias = "gas")]
    GasBoiler,
    GasFurnace,
}

impl HeatSourceType {
    /// Heat delivered per unit of energy consumed.
    pub fn default_efficiency(self) -> f64 {
        match self {
            HeatSourceType::Electric => 1.0,
            HeatSourceType::Heatpump => 3.0,
            HeatSourceType::GasBoiler => 0.90,
            HeatSourceType::GasFurnace => 0.85,
        }
    }

    /// Sources whose consumption cannot be derived from a declared heater rating.
    pub fn requires_energy_meter(self) -> bool {
        !matches!(self, HeatSourceType::Electric)
    }
}

/// Static parameters of one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Stable identifier used in samples, snapshots and the API
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Rated heater power (W), used when no meter is available
    #[serde(default)]
    pub declared_power_w: f64,
    #[serde(default)]
    pub surface_m2: Option<f64>,
    #[serde(default)]
    pub volume_m3: Option<f64>,
    #[serde(default)]
    pub heat_source: HeatSourceType,
    /// Overrides the heat source's default efficiency
    #[serde(default)]
    pub efficiency_factor: Option<f64>,
    #[serde(default = "default_power_threshold")]
    pub power_threshold_w: f64,
    /// Samples carry a cumulative `energy_kwh` counter
    #[serde(default)]
    pub energy_meter: bool,
    /// Samples carry an instantaneous `power_w` reading
    #[serde(default)]
    pub power_meter: bool,
    /// Report a measured COP (heat pumps with an energy meter only)
    #[serde(default = "default_true")]
    pub dynamic_cop: bool,
}

fn default_power_threshold() -> f64 {
    defaults::DEFAULT_POWER_THRESHOLD_W
}

fn default_true() -> bool {
    true
}

impl ZoneConfig {
    /// Minimal electric zone with a declared heater rating.
    pub fn electric(id: impl Into<String>, declared_power_w: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            declared_power_w,
            surface_m2: None,
            volume_m3: None,
            heat_source: HeatSourceType::Electric,
            efficiency_factor: None,
            power_threshold_w: defaults::DEFAULT_POWER_THRESHOLD_W,
            energy_meter: false,
            power_meter: false,
            dynamic_cop: true,
        }
    }

    pub fn with_volume(mut self, volume_m3: f64) -> Self {
        self.volume_m3 = Some(volume_m3);
        self
    }

    pub fn with_surface(mut self, surface_m2: f64) -> Self {
        self.surface_m2 = Some(surface_m2);
        self
    }

    /// Effective efficiency factor.
    pub fn efficiency(&self) -> f64 {
        self.efficiency_factor
            .unwrap_or_else(|| self.heat_source.default_efficiency())
    }

    /// Whether outputs carry a measured COP.
    pub fn tracks_cop(&self) -> bool {
        self.dynamic_cop && self.heat_source == HeatSourceType::Heatpump && self.energy_meter
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        let id = &self.id;
        if id.trim().is_empty() {
            errors.push("zones: zone id must not be empty".to_string());
        }
        if !(self.declared_power_w >= 0.0) {
            errors.push(format!("zones.{id}.declared_power_w must be >= 0"));
        }
        if let Some(s) = self.surface_m2 {
            if !(s > 0.0) {
                errors.push(format!("zones.{id}.surface_m2 must be > 0"));
            }
        }
        if let Some(v) = self.volume_m3 {
            if !(v > 0.0) {
                errors.push(format!("zones.{id}.volume_m3 must be > 0"));
            }
        }
        if let Some(e) = self.efficiency_factor {
            if !(e > 0.0) {
                errors.push(format!("zones.{id}.efficiency_factor must be > 0"));
            }
        }
        if !(self.power_threshold_w >= 0.0) {
            errors.push(format!("zones.{id}.power_threshold_w must be >= 0"));
        }
        if self.heat_source.requires_energy_meter() && !self.energy_meter {
            errors.push(format!(
                "zones.{id}: heat source {:?} requires energy_meter = true",
                self.heat_source
            ));
        }
        if !self.heat_source.requires_energy_meter()
            && self.declared_power_w <= 0.0
            && !self.energy_meter
            && !self.power_meter
        {
            errors.push(format!(
                "zones.{id}: electric zone needs declared_power_w > 0 or a power/energy meter"
            ));
        }
    }
}
