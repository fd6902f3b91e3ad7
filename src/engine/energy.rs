//! Energy Source Selector
//!
//! Energy for each sample interval comes from the first provider, in priority
//! order, that can produce a value:
//!
//! 1. `CounterProvider`: increment of a cumulative kWh counter
//! 2. `PowerIntegrationProvider`: trapezoidal integration of heater power
//! 3. `DeclaredPowerProvider`: declared heater rating × heating time
//!
//! Providers are plain objects behind a trait and the selector iterates them;
//! callers never branch on which meters a zone has.

use serde::{Deserialize, Serialize};

use crate::config::ZoneConfig;
use crate::types::{EnergyQuality, Sample};

/// Energy consumed over an interval, tagged with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyReading {
    pub kwh: f64,
    pub quality: EnergyQuality,
}

impl EnergyReading {
    pub fn measured(kwh: f64) -> Self {
        Self {
            kwh,
            quality: EnergyQuality::Measured,
        }
    }

    pub fn estimated(kwh: f64) -> Self {
        Self {
            kwh,
            quality: EnergyQuality::Estimated,
        }
    }

    /// Same reading prorated by `fraction` of the interval.
    pub fn scaled(self, fraction: f64) -> Self {
        Self {
            kwh: self.kwh * fraction,
            quality: self.quality,
        }
    }
}

/// Inputs available to a provider for one interval.
#[derive(Debug, Clone, Copy)]
pub struct EnergyContext<'a> {
    pub previous: &'a Sample,
    pub current: &'a Sample,
    pub seconds: i64,
    /// Heating state at the interval start
    pub heating: bool,
}

impl EnergyContext<'_> {
    fn hours(&self) -> f64 {
        self.seconds as f64 / 3600.0
    }
}

/// One source of interval energy.
pub trait EnergyProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Energy over the interval, or `None` if this source has nothing to say.
    fn try_read(&self, ctx: &EnergyContext<'_>) -> Option<EnergyReading>;
}

// ============================================================================
// Providers
// ============================================================================

/// Cumulative energy counter reported with each sample.
///
/// A decreasing counter is a meter reset; the energy since the reset is the
/// current reading.
#[derive(Debug, Default)]
pub struct CounterProvider;

impl EnergyProvider for CounterProvider {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn try_read(&self, ctx: &EnergyContext<'_>) -> Option<EnergyReading> {
        let previous = ctx.previous.energy_kwh?;
        let current = ctx.current.energy_kwh?;
        let kwh = if current >= previous {
            current - previous
        } else {
            current.max(0.0)
        };
        Some(EnergyReading::measured(kwh))
    }
}

/// Trapezoidal integration of instantaneous power readings.
#[derive(Debug, Default)]
pub struct PowerIntegrationProvider;

impl EnergyProvider for PowerIntegrationProvider {
    fn name(&self) -> &'static str {
        "power_integration"
    }

    fn try_read(&self, ctx: &EnergyContext<'_>) -> Option<EnergyReading> {
        let p0 = ctx.previous.power_w?.max(0.0);
        let p1 = ctx.current.power_w?.max(0.0);
        let avg_w = (p0 + p1) / 2.0;
        Some(EnergyReading::measured(avg_w * ctx.hours() / 1000.0))
    }
}

/// Declared heater rating applied to intervals that started with heating on.
#[derive(Debug)]
pub struct DeclaredPowerProvider {
    declared_power_w: f64,
}

impl DeclaredPowerProvider {
    pub fn new(declared_power_w: f64) -> Self {
        Self { declared_power_w }
    }
}

impl EnergyProvider for DeclaredPowerProvider {
    fn name(&self) -> &'static str {
        "declared_power"
    }

    fn try_read(&self, ctx: &EnergyContext<'_>) -> Option<EnergyReading> {
        if self.declared_power_w <= 0.0 {
            return None;
        }
        let kwh = if ctx.heating {
            self.declared_power_w * ctx.hours() / 1000.0
        } else {
            0.0
        };
        Some(EnergyReading::estimated(kwh))
    }
}

// ============================================================================
// Selector
// ============================================================================

/// Ordered list of providers, highest priority first.
pub struct EnergySelector {
    providers: Vec<Box<dyn EnergyProvider>>,
}

impl EnergySelector {
    pub fn new(providers: Vec<Box<dyn EnergyProvider>>) -> Self {
        Self { providers }
    }

    /// Standard chain for a zone: counter, power integration, declared power.
    pub fn for_zone(zone: &ZoneConfig) -> Self {
        Self::new(vec![
            Box::new(CounterProvider),
            Box::new(PowerIntegrationProvider),
            Box::new(DeclaredPowerProvider::new(zone.declared_power_w)),
        ])
    }

    /// First reading any provider yields, with the provider's name.
    pub fn select(&self, ctx: &EnergyContext<'_>) -> Option<(EnergyReading, &'static str)> {
        self.providers
            .iter()
            .find_map(|p| p.try_read(ctx).map(|r| (r, p.name())))
    }
}

impl std::fmt::Debug for EnergySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("EnergySelector")
            .field("providers", &names)
            .finish()
    }
}
