//! Measured coefficient of performance for heat pump zones.
//!
//! Heat the zone lost today is `K × ΔT × heating_hours`. Dividing it by the
//! electricity the heat pump drew gives the COP it actually delivered:
//!
//! ```text
//! cop = (K · ΔT · heating_hours / 1000) / consumed_kwh
//! ```
//!
//! K and ΔT come from the 24h rolling window; heating time and consumption
//! from the open day.

use crate::config::defaults;
use crate::types::CopStatus;

/// Inputs of one COP evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopInputs {
    pub ready: bool,
    /// Rolling K (W/°C)
    pub k: Option<f64>,
    /// Rolling average ΔT (°C)
    pub avg_delta_t: Option<f64>,
    /// Heating time since local midnight (hours)
    pub heating_hours: f64,
    /// Electricity consumed since local midnight (kWh)
    pub consumed_kwh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopReading {
    pub cop: Option<f64>,
    pub status: CopStatus,
}

impl CopReading {
    fn blocked(status: CopStatus) -> Self {
        Self { cop: None, status }
    }
}

pub fn measured_cop(inputs: &CopInputs, min_delta_t: f64) -> CopReading {
    let k = match (inputs.ready, inputs.k) {
        (true, Some(k)) => k,
        _ => return CopReading::blocked(CopStatus::WaitingCalibration),
    };
    let delta_t = match inputs.avg_delta_t {
        Some(dt) if dt >= min_delta_t => dt,
        _ => return CopReading::blocked(CopStatus::InsufficientDeltaT),
    };
    if inputs.heating_hours < defaults::COP_MIN_HEATING_HOURS {
        return CopReading::blocked(CopStatus::InsufficientHeatingTime);
    }
    if !(inputs.consumed_kwh > 0.0) {
        return CopReading::blocked(CopStatus::NoEnergyData);
    }

    let thermal_kwh = k * delta_t * inputs.heating_hours / 1000.0;
    let cop = thermal_kwh / inputs.consumed_kwh;
    let status = if cop < defaults::COP_LOW_WARNING {
        CopStatus::LowCopWarning
    } else if cop > defaults::COP_HIGH_WARNING {
        CopStatus::HighCopWarning
    } else {
        CopStatus::Ok
    };
    CopReading {
        cop: Some(cop),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> CopInputs {
        CopInputs {
            ready: true,
            k: Some(100.0),
            avg_delta_t: Some(15.0),
            heating_hours: 6.0,
            consumed_kwh: 3.0,
        }
    }

    #[test]
    fn test_cop_from_heat_balance() {
        // 100 W/°C × 15 °C × 6 h = 9 kWh of heat for 3 kWh drawn
        let r = measured_cop(&inputs(), 5.0);
        assert_eq!(r.status, CopStatus::Ok);
        assert!((r.cop.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_waiting_until_calibrated() {
        let r = measured_cop(&CopInputs { ready: false, ..inputs() }, 5.0);
        assert_eq!(r, CopReading::blocked(CopStatus::WaitingCalibration));
        let r = measured_cop(&CopInputs { k: None, ..inputs() }, 5.0);
        assert_eq!(r.status, CopStatus::WaitingCalibration);
    }

    #[test]
    fn test_prerequisites_checked_in_order() {
        let r = measured_cop(
            &CopInputs {
                avg_delta_t: Some(4.9),
                heating_hours: 0.0,
                ..inputs()
            },
            5.0,
        );
        assert_eq!(r.status, CopStatus::InsufficientDeltaT);
        assert_eq!(
            measured_cop(&CopInputs { avg_delta_t: None, ..inputs() }, 5.0).status,
            CopStatus::InsufficientDeltaT
        );

        let r = measured_cop(
            &CopInputs {
                heating_hours: 0.5,
                consumed_kwh: 0.0,
                ..inputs()
            },
            5.0,
        );
        assert_eq!(r.status, CopStatus::InsufficientHeatingTime);

        let r = measured_cop(&CopInputs { consumed_kwh: 0.0, ..inputs() }, 5.0);
        assert_eq!(r, CopReading::blocked(CopStatus::NoEnergyData));
    }

    #[test]
    fn test_implausible_cop_is_reported_with_warning() {
        let r = measured_cop(&CopInputs { consumed_kwh: 10.0, ..inputs() }, 5.0);
        assert_eq!(r.status, CopStatus::LowCopWarning);
        assert!((r.cop.unwrap() - 0.9).abs() < 1e-9);

        let r = measured_cop(&CopInputs { consumed_kwh: 1.0, ..inputs() }, 5.0);
        assert_eq!(r.status, CopStatus::HighCopWarning);
        assert!((r.cop.unwrap() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_band_edges_are_ok() {
        // exactly 1.0 and 7.0
        let r = measured_cop(&CopInputs { consumed_kwh: 9.0, ..inputs() }, 5.0);
        assert_eq!(r.status, CopStatus::Ok);
        let r = measured_cop(
            &CopInputs {
                k: Some(700.0),
                consumed_kwh: 9.0,
                ..inputs()
            },
            5.0,
        );
        assert_eq!(r.status, CopStatus::Ok);
    }
}
