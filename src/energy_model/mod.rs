//! # Device Adapters
//!
//! Energy devices owned by a building:
//!
//! - **StorageTank**: thermal storage for cooling, heating or domestic hot water
//! - **Battery**: electrical storage with power limits and capacity degradation
//! - **HeatPump** / **ElectricHeater**: conversion devices behind [`ConversionDevice`]
//! - **Pv**: rooftop generation scaled from inverter output per installed kW
//!
//! All devices keep fixed-length per-step series and advance in lock-step with the
//! building through the [`Device`] lifecycle.

pub mod battery;
pub mod electric_heater;
pub mod heat_pump;
pub mod pv;
pub mod storage;

pub use battery::{Battery, BatteryConfig};
pub use electric_heater::{ElectricHeater, ElectricHeaterConfig};
pub use heat_pump::{HeatPump, HeatPumpConfig};
pub use pv::Pv;
pub use storage::{StorageTank, StorageTankConfig};

use serde::{Deserialize, Serialize};

/// Whether a conversion device is producing heat or removing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermalMode {
    Heating,
    Cooling,
}

/// Environmental conditions a conversion device operates under for one time step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatingConditions {
    pub outdoor_dry_bulb_temperature: f64,
    pub mode: ThermalMode,
}

impl OperatingConditions {
    pub fn heating(outdoor_dry_bulb_temperature: f64) -> Self {
        Self {
            outdoor_dry_bulb_temperature,
            mode: ThermalMode::Heating,
        }
    }

    pub fn cooling(outdoor_dry_bulb_temperature: f64) -> Self {
        Self {
            outdoor_dry_bulb_temperature,
            mode: ThermalMode::Cooling,
        }
    }
}

/// Per-step lifecycle shared by every device
pub trait Device: Send + Sync {
    fn time_step(&self) -> usize;

    /// Move to the next step, carrying idle state forward
    fn next_time_step(&mut self);

    /// Restore construction-time state at step 0
    fn reset(&mut self);

    /// Allocate per-step series for an episode of `len` steps and reset
    fn set_episode_length(&mut self, len: usize);
}

/// Device converting electricity into heating or cooling energy.
///
/// Implementations that do not depend on outdoor conditions ignore them.
pub trait ConversionDevice: Device {
    fn name(&self) -> &str;

    fn nominal_power(&self) -> f64;

    /// Maximum thermal output deliverable in one step
    fn get_max_output_power(&self, conditions: &OperatingConditions) -> f64;

    /// Electricity needed to deliver `demand`; negative demand yields avoided consumption
    fn get_input_power(&self, demand: f64, conditions: &OperatingConditions) -> f64;

    /// Record electricity drawn at the current step
    fn update_electricity_consumption(&mut self, power: f64);

    /// Electricity consumption for steps `0..=time_step`
    fn electricity_consumption(&self) -> &[f64];

    /// Size nominal power so every step of `demand` can be met
    fn autosize(&mut self, demand: &[f64], conditions: &[OperatingConditions], safety_factor: f64);
}

/// Per-step clock kept by each device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StepClock {
    pub time_step: usize,
    pub episode_length: usize,
}

impl StepClock {
    pub fn new(episode_length: usize) -> Self {
        Self {
            time_step: 0,
            episode_length,
        }
    }

    /// Advance unless already on the final step
    pub fn advance(&mut self) -> bool {
        if self.time_step + 1 < self.episode_length {
            self.time_step += 1;
            true
        } else {
            false
        }
    }
}

pub(crate) fn validate_non_negative(field: &str, value: f64) -> crate::error::Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(crate::error::SimulationError::InvalidDevice(format!(
            "{field} must be a finite non-negative number, got {value}"
        )))
    }
}

pub(crate) fn validate_efficiency(field: &str, value: f64) -> crate::error::Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(crate::error::SimulationError::InvalidDevice(format!(
            "{field} must be within (0, 1], got {value}"
        )))
    }
}
