use super::{validate_non_negative, Device, StepClock};
use crate::error::Result;

/// Rooftop PV array.
///
/// Generation is reported as a non-positive quantity so it offsets consumption when
/// summed into the building's net electricity consumption.
#[derive(Debug, Clone)]
pub struct Pv {
    nominal_power: f64,
    clock: StepClock,
}

impl Pv {
    /// `nominal_power` in kW installed
    pub fn new(nominal_power: f64) -> Result<Self> {
        validate_non_negative("pv nominal power", nominal_power)?;
        Ok(Self {
            nominal_power,
            clock: StepClock::new(1),
        })
    }

    pub fn empty() -> Self {
        Self {
            nominal_power: 0.0,
            clock: StepClock::new(1),
        }
    }

    pub fn nominal_power(&self) -> f64 {
        self.nominal_power
    }

    /// Generation for one step from inverter AC output in W per installed kW
    pub fn generation(&self, inverter_ac_power_per_kw: f64) -> f64 {
        let raw = if inverter_ac_power_per_kw.is_finite() {
            inverter_ac_power_per_kw.max(0.0)
        } else {
            0.0
        };
        -(self.nominal_power * raw / 1000.0)
    }

    /// Generation series (all values <= 0)
    pub fn get_generation(&self, inverter_ac_power_per_kw: &[f64]) -> Vec<f64> {
        inverter_ac_power_per_kw
            .iter()
            .map(|&x| self.generation(x))
            .collect()
    }

    /// Size the array so peak generation covers peak `demand`
    pub fn autosize(&mut self, demand: &[f64], inverter_ac_power_per_kw: &[f64], safety_factor: f64) {
        let peak_demand = demand
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(0.0_f64, f64::max);
        let peak_yield = inverter_ac_power_per_kw
            .iter()
            .copied()
            .filter(|x| x.is_finite())
            .fold(0.0_f64, f64::max)
            / 1000.0;

        self.nominal_power = if peak_yield > 0.0 {
            peak_demand / peak_yield * safety_factor
        } else {
            0.0
        };
    }
}

impl Device for Pv {
    fn time_step(&self) -> usize {
        self.clock.time_step
    }

    fn next_time_step(&mut self) {
        self.clock.advance();
    }

    fn reset(&mut self) {
        self.clock.time_step = 0;
    }

    fn set_episode_length(&mut self, len: usize) {
        self.clock = StepClock::new(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_generation_is_non_positive() {
        let pv = Pv::new(5.0).unwrap();
        let generation = pv.get_generation(&[0.0, 400.0, 800.0, f64::NAN]);

        assert_eq!(generation.len(), 4);
        assert!(generation.iter().all(|g| *g <= 0.0));
        assert_relative_eq!(generation[2], -4.0);
        assert_eq!(generation[3], 0.0);
    }

    #[test]
    fn test_autosize_matches_peak_demand() {
        let mut pv = Pv::new(0.0).unwrap();
        pv.autosize(&[1.0, 3.0], &[0.0, 600.0], 1.0);

        assert_relative_eq!(pv.nominal_power(), 5.0);
        assert_relative_eq!(pv.generation(600.0), -3.0);
    }
}
