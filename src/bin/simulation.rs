//! Thermal Zone Simulation
//!
//! Generates synthetic zone samples for exercising `thermal-zones`. Each zone
//! is a single-node thermal model: a heater driven by a bang-bang thermostat
//! fights a heat loss of `K × (indoor − outdoor)` against a sinusoidal outdoor
//! temperature with sensor noise.
//!
//! # Usage
//! ```bash
//! ./simulation --zones living_room,office --days 3 | ./thermal-zones --replay --exit-on-eof
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;
use std::io::{self, Write};

use thermal_zones::types::{Sample, ZoneSample};

// ============================================================================
// Model Constants
// ============================================================================

/// Heat-loss coefficient of the first zone (W/K)
const BASE_K: f64 = 15.0;
/// K increment for each further zone (W/K)
const K_STEP: f64 = 8.0;
/// Heater power (W)
const HEATER_POWER_W: f64 = 1500.0;
/// Thermal capacitance of a zone (Wh/K)
const CAPACITANCE_WH_PER_K: f64 = 1500.0;
/// Thermostat band (°C)
const SETPOINT_LOW: f64 = 19.5;
const SETPOINT_HIGH: f64 = 20.5;
/// Daily outdoor swing amplitude (°C)
const OUTDOOR_SWING: f64 = 4.0;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "thermal-simulation")]
#[command(about = "Synthetic zone samples for thermal-zones testing")]
#[command(version = "1.0")]
struct Args {
    /// Comma-separated zone ids
    #[arg(long, default_value = "living_room", value_delimiter = ',')]
    zones: Vec<String>,

    /// Simulated days (1-60)
    #[arg(short, long, default_value = "2", value_parser = clap::value_parser!(u32).range(1..=60))]
    days: u32,

    /// Minutes between samples
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(i64).range(1..=60))]
    interval_minutes: i64,

    /// Simulation start (RFC 3339)
    #[arg(long, default_value = "2025-01-06T00:00:00Z")]
    start: DateTime<Utc>,

    /// Mean outdoor temperature (°C)
    #[arg(long, default_value = "4.0", allow_hyphen_values = true)]
    outdoor_mean: f64,

    /// Emit a cumulative energy counter in addition to heater power
    #[arg(long)]
    meter: bool,

    /// Real milliseconds to wait between time steps (0 = as fast as possible)
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the summary on stderr
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Zone Model
// ============================================================================

struct ZoneModel {
    id: String,
    k_w_per_k: f64,
    indoor: f64,
    heating: bool,
    energy_kwh: f64,
}

impl ZoneModel {
    fn new(id: String, index: usize) -> Self {
        Self {
            id,
            k_w_per_k: BASE_K + K_STEP * index as f64,
            indoor: SETPOINT_HIGH,
            heating: false,
            energy_kwh: 0.0,
        }
    }

    /// Advance the model by `hours` against `outdoor`.
    fn step(&mut self, outdoor: f64, hours: f64) {
        if self.indoor < SETPOINT_LOW {
            self.heating = true;
        } else if self.indoor > SETPOINT_HIGH {
            self.heating = false;
        }
        let input_w = if self.heating { HEATER_POWER_W } else { 0.0 };
        let loss_w = self.k_w_per_k * (self.indoor - outdoor);
        self.indoor += (input_w - loss_w) * hours / CAPACITANCE_WH_PER_K;
        self.energy_kwh += input_w * hours / 1000.0;
    }

    fn power_w(&self) -> f64 {
        if self.heating {
            HEATER_POWER_W
        } else {
            0.0
        }
    }
}

fn outdoor_at(mean: f64, ts: DateTime<Utc>, start: DateTime<Utc>) -> f64 {
    let day_fraction = (ts - start).num_seconds() as f64 / 86_400.0;
    // Coldest around 04:00, warmest around 16:00
    mean - OUTDOOR_SWING * (TAU * (day_fraction - 4.0 / 24.0)).cos()
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    if args.zones.is_empty() {
        return Err(anyhow!("at least one zone id is required"));
    }

    let mut rng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let sensor_noise = Normal::new(0.0, 0.05).map_err(|e| anyhow!("{e}"))?;
    let weather_noise = Normal::new(0.0, 0.3).map_err(|e| anyhow!("{e}"))?;

    let mut zones: Vec<ZoneModel> = args
        .zones
        .iter()
        .enumerate()
        .map(|(i, id)| ZoneModel::new(id.trim().to_string(), i))
        .collect();

    let step = Duration::minutes(args.interval_minutes);
    let step_hours = args.interval_minutes as f64 / 60.0;
    let steps = i64::from(args.days) * 24 * 60 / args.interval_minutes;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    for n in 0..=steps {
        let ts = args.start + step * i32::try_from(n).context("simulation too long")?;
        let outdoor = outdoor_at(args.outdoor_mean, ts, args.start) + weather_noise.sample(&mut rng);

        for zone in &mut zones {
            if n > 0 {
                zone.step(outdoor, step_hours);
            }
            let mut sample = Sample::new(
                ts,
                zone.indoor + sensor_noise.sample(&mut rng),
                outdoor,
                zone.heating,
            )
            .with_power(zone.power_w());
            if args.meter {
                sample = sample.with_energy(zone.energy_kwh);
            }
            let line = serde_json::to_string(&ZoneSample {
                zone: zone.id.clone(),
                sample,
            })?;
            writeln!(out, "{line}")?;
        }

        if args.delay_ms > 0 {
            out.flush()?;
            std::thread::sleep(std::time::Duration::from_millis(args.delay_ms));
        }
    }
    out.flush()?;

    if !args.quiet {
        for zone in &zones {
            eprintln!(
                "{}: K = {:.1} W/K, energy = {:.2} kWh",
                zone.id, zone.k_w_per_k, zone.energy_kwh
            );
        }
    }
    Ok(())
}
