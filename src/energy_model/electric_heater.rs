use serde::{Deserialize, Serialize};

use super::{
    validate_efficiency, validate_non_negative, ConversionDevice, Device, OperatingConditions,
    StepClock,
};
use crate::error::Result;
use crate::series::StepSeries;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectricHeaterConfig {
    /// Maximum electric input per step in kWh
    pub nominal_power: f64,
    /// Heat delivered per unit of electricity (0.0-1.0]
    pub efficiency: f64,
}

impl Default for ElectricHeaterConfig {
    fn default() -> Self {
        Self {
            nominal_power: 0.0,
            efficiency: 0.9,
        }
    }
}

/// Resistive heater; output does not depend on outdoor conditions
pub struct ElectricHeater {
    config: ElectricHeaterConfig,
    clock: StepClock,
    electricity_consumption: StepSeries,
}

impl ElectricHeater {
    pub fn new(nominal_power: f64) -> Result<Self> {
        Self::from_config(ElectricHeaterConfig {
            nominal_power,
            ..Default::default()
        })
    }

    /// Zero-power stand-in used when a building has no device for an end use
    pub fn zero() -> Self {
        Self {
            config: ElectricHeaterConfig::default(),
            clock: StepClock::new(1),
            electricity_consumption: StepSeries::new(1),
        }
    }

    pub fn from_config(config: ElectricHeaterConfig) -> Result<Self> {
        validate_non_negative("electric heater nominal power", config.nominal_power)?;
        validate_efficiency("electric heater efficiency", config.efficiency)?;

        Ok(Self {
            config,
            clock: StepClock::new(1),
            electricity_consumption: StepSeries::new(1),
        })
    }

    pub fn efficiency(&self) -> f64 {
        self.config.efficiency
    }
}

impl Device for ElectricHeater {
    fn time_step(&self) -> usize {
        self.clock.time_step
    }

    fn next_time_step(&mut self) {
        self.clock.advance();
    }

    fn reset(&mut self) {
        self.clock.time_step = 0;
        self.electricity_consumption.clear();
    }

    fn set_episode_length(&mut self, len: usize) {
        self.clock = StepClock::new(len);
        self.electricity_consumption.resize(len);
    }
}

impl ConversionDevice for ElectricHeater {
    fn name(&self) -> &str {
        "electric_heater"
    }

    fn nominal_power(&self) -> f64 {
        self.config.nominal_power
    }

    fn get_max_output_power(&self, _conditions: &OperatingConditions) -> f64 {
        self.config.nominal_power * self.config.efficiency
    }

    fn get_input_power(&self, demand: f64, _conditions: &OperatingConditions) -> f64 {
        demand / self.config.efficiency
    }

    fn update_electricity_consumption(&mut self, power: f64) {
        self.electricity_consumption.set(self.clock.time_step, power);
    }

    fn electricity_consumption(&self) -> &[f64] {
        self.electricity_consumption.up_to(self.clock.time_step)
    }

    fn autosize(&mut self, demand: &[f64], _conditions: &[OperatingConditions], safety_factor: f64) {
        let peak = demand
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(0.0_f64, f64::max);
        self.config.nominal_power = peak / self.config.efficiency * safety_factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_output_ignores_outdoor_temperature() {
        let heater = ElectricHeater::new(4.0).unwrap();

        let cold = heater.get_max_output_power(&OperatingConditions::heating(-20.0));
        let warm = heater.get_max_output_power(&OperatingConditions::heating(30.0));

        assert_eq!(cold, warm);
        assert_relative_eq!(cold, 3.6);
    }

    #[test]
    fn test_input_power_divides_by_efficiency() {
        let heater = ElectricHeater::new(4.0).unwrap();
        assert_relative_eq!(
            heater.get_input_power(1.8, &OperatingConditions::heating(0.0)),
            2.0
        );
    }

    #[test]
    fn test_autosize() {
        let mut heater = ElectricHeater::new(0.0).unwrap();
        heater.autosize(&[0.9, 2.7], &[], 2.0);
        assert_relative_eq!(heater.nominal_power(), 6.0);
    }
}
