use serde::{Deserialize, Serialize};

use super::{
    validate_efficiency, validate_non_negative, ConversionDevice, Device, OperatingConditions,
    StepClock, ThermalMode,
};
use crate::error::Result;
use crate::series::StepSeries;

const CELSIUS_TO_KELVIN: f64 = 273.15;
const MAX_COP: f64 = 20.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatPumpConfig {
    /// Maximum electric input per step in kWh
    pub nominal_power: f64,
    /// Fraction of the Carnot COP actually achieved
    pub efficiency: f64,
    /// Supply temperature when heating (°C)
    pub target_heating_temperature: f64,
    /// Supply temperature when cooling (°C)
    pub target_cooling_temperature: f64,
}

impl Default for HeatPumpConfig {
    fn default() -> Self {
        Self {
            nominal_power: 0.0,
            efficiency: 0.2,
            target_heating_temperature: 45.0,
            target_cooling_temperature: 8.0,
        }
    }
}

/// Air-source heat pump whose COP follows a scaled Carnot cycle
pub struct HeatPump {
    config: HeatPumpConfig,
    clock: StepClock,
    electricity_consumption: StepSeries,
}

impl HeatPump {
    pub fn new(nominal_power: f64) -> Result<Self> {
        Self::from_config(HeatPumpConfig {
            nominal_power,
            ..Default::default()
        })
    }

    /// Zero-power stand-in used when a building has no device for an end use
    pub fn zero() -> Self {
        Self {
            config: HeatPumpConfig::default(),
            clock: StepClock::new(1),
            electricity_consumption: StepSeries::new(1),
        }
    }

    pub fn from_config(config: HeatPumpConfig) -> Result<Self> {
        validate_non_negative("heat pump nominal power", config.nominal_power)?;
        validate_efficiency("heat pump efficiency", config.efficiency)?;

        Ok(Self {
            config,
            clock: StepClock::new(1),
            electricity_consumption: StepSeries::new(1),
        })
    }

    /// Coefficient of performance; non-physical values saturate at 20
    pub fn cop(&self, conditions: &OperatingConditions) -> f64 {
        let outdoor = conditions.outdoor_dry_bulb_temperature + CELSIUS_TO_KELVIN;
        let cop = match conditions.mode {
            ThermalMode::Heating => {
                let target = self.config.target_heating_temperature + CELSIUS_TO_KELVIN;
                self.config.efficiency * target / (target - outdoor)
            }
            ThermalMode::Cooling => {
                let target = self.config.target_cooling_temperature + CELSIUS_TO_KELVIN;
                self.config.efficiency * target / (outdoor - target)
            }
        };

        if !cop.is_finite() || !(0.0..=MAX_COP).contains(&cop) {
            MAX_COP
        } else {
            cop
        }
    }
}

impl Device for HeatPump {
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

impl ConversionDevice for HeatPump {
    fn name(&self) -> &str {
        "heat_pump"
    }

    fn nominal_power(&self) -> f64 {
        self.config.nominal_power
    }

    fn get_max_output_power(&self, conditions: &OperatingConditions) -> f64 {
        self.config.nominal_power * self.cop(conditions)
    }

    fn get_input_power(&self, demand: f64, conditions: &OperatingConditions) -> f64 {
        demand / self.cop(conditions)
    }

    fn update_electricity_consumption(&mut self, power: f64) {
        self.electricity_consumption.set(self.clock.time_step, power);
    }

    fn electricity_consumption(&self) -> &[f64] {
        self.electricity_consumption.up_to(self.clock.time_step)
    }

    fn autosize(&mut self, demand: &[f64], conditions: &[OperatingConditions], safety_factor: f64) {
        let peak_input = demand
            .iter()
            .zip(conditions)
            .filter(|(d, _)| d.is_finite())
            .map(|(d, c)| d / self.cop(c))
            .fold(0.0_f64, f64::max);
        self.config.nominal_power = peak_input * safety_factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_heating_cop_falls_with_outdoor_temperature() {
        let hp = HeatPump::new(5.0).unwrap();

        let mild = hp.cop(&OperatingConditions::heating(10.0));
        let cold = hp.cop(&OperatingConditions::heating(-10.0));

        assert!(mild > cold);
        assert!(cold >= 1.0);
    }

    #[test]
    fn test_cooling_cop_matches_carnot_fraction() {
        let hp = HeatPump::new(5.0).unwrap();
        let cop = hp.cop(&OperatingConditions::cooling(28.0));

        let expected = 0.2 * (8.0 + 273.15) / 20.0;
        assert_relative_eq!(cop, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_cop_saturates_when_outdoor_beyond_target() {
        let hp = HeatPump::new(5.0).unwrap();

        assert_eq!(hp.cop(&OperatingConditions::cooling(8.0)), MAX_COP);
        assert_eq!(hp.cop(&OperatingConditions::cooling(2.0)), MAX_COP);
    }

    #[test]
    fn test_input_power_inverts_output() {
        let hp = HeatPump::new(2.0).unwrap();
        let conditions = OperatingConditions::heating(0.0);

        let max_output = hp.get_max_output_power(&conditions);
        assert_relative_eq!(hp.get_input_power(max_output, &conditions), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_autosize_covers_peak_input() {
        let mut hp = HeatPump::new(0.0).unwrap();
        let conditions = vec![OperatingConditions::heating(0.0); 3];
        hp.autosize(&[1.0, 4.0, 2.0], &conditions, 1.0);

        let cop = hp.cop(&conditions[0]);
        assert_relative_eq!(hp.nominal_power(), 4.0 / cop, epsilon = 1e-9);
    }

    #[test]
    fn test_consumption_recorded_per_step() {
        let mut hp = HeatPump::new(2.0).unwrap();
        hp.set_episode_length(3);
        hp.update_electricity_consumption(1.5);
        hp.next_time_step();
        hp.update_electricity_consumption(0.5);

        assert_eq!(hp.electricity_consumption(), &[1.5, 0.5]);
        hp.reset();
        assert_eq!(hp.electricity_consumption(), &[0.0]);
    }
}
