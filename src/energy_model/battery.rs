use serde::{Deserialize, Serialize};

use super::storage::StorageState;
use super::{validate_efficiency, validate_non_negative, Device};
use crate::error::{Result, SimulationError};
use crate::series::StepSeries;

/// Battery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// Usable capacity in kWh
    pub capacity: f64,
    /// Maximum charge/discharge energy per step in kWh
    pub nominal_power: f64,
    /// One-way efficiency used when no power-efficiency curve is given
    pub efficiency: f64,
    /// Capacity fade per full equivalent cycle, as a fraction of initial capacity
    pub capacity_loss_coefficient: f64,
    /// Fraction of stored energy lost per step
    pub loss_coefficient: f64,
    /// Stored energy at step 0 in kWh
    pub initial_soc: f64,
    /// Round-trip efficiency versus normalized power, as `[power_fraction, efficiency]`
    #[serde(default)]
    pub power_efficiency_curve: Option<Vec<[f64; 2]>>,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity: 0.0,
            nominal_power: 0.0,
            efficiency: 0.9,
            capacity_loss_coefficient: 1e-5,
            loss_coefficient: 0.0,
            initial_soc: 0.0,
            power_efficiency_curve: None,
        }
    }
}

/// Electrical storage with power limits, load-dependent efficiency and capacity fade.
///
/// Its electricity consumption equals its energy balance: positive while drawing from
/// the building bus, negative while supplying it.
#[derive(Debug, Clone)]
pub struct Battery {
    capacity: f64,
    initial_capacity: f64,
    nominal_power: f64,
    efficiency: f64,
    capacity_loss_coefficient: f64,
    power_efficiency_curve: Option<Vec<[f64; 2]>>,
    state: StorageState,
    capacity_history: StepSeries,
    efficiency_history: StepSeries,
}

impl Battery {
    pub fn new(capacity: f64, nominal_power: f64) -> Result<Self> {
        Self::from_config(BatteryConfig {
            capacity,
            nominal_power,
            ..Default::default()
        })
    }

    /// Zero-capacity, zero-power stand-in
    pub fn empty() -> Self {
        let mut battery = Self {
            capacity: 0.0,
            initial_capacity: 0.0,
            nominal_power: 0.0,
            efficiency: 1.0,
            capacity_loss_coefficient: 0.0,
            power_efficiency_curve: None,
            state: StorageState::new(0.0, 0.0),
            capacity_history: StepSeries::new(2),
            efficiency_history: StepSeries::new(2),
        };
        battery.reset();
        battery
    }

    pub fn from_config(config: BatteryConfig) -> Result<Self> {
        validate_non_negative("battery capacity", config.capacity)?;
        validate_non_negative("battery nominal power", config.nominal_power)?;
        validate_efficiency("battery efficiency", config.efficiency)?;
        validate_non_negative("battery capacity loss coefficient", config.capacity_loss_coefficient)?;
        validate_non_negative("battery loss coefficient", config.loss_coefficient)?;
        validate_non_negative("battery initial soc", config.initial_soc)?;

        let curve = match config.power_efficiency_curve {
            Some(points) => Some(validate_curve(points)?),
            None => None,
        };

        let mut battery = Self {
            capacity: config.capacity,
            initial_capacity: config.capacity,
            nominal_power: config.nominal_power,
            efficiency: config.efficiency,
            capacity_loss_coefficient: config.capacity_loss_coefficient,
            power_efficiency_curve: curve,
            state: StorageState::new(
                config.initial_soc.min(config.capacity),
                config.loss_coefficient.min(1.0),
            ),
            capacity_history: StepSeries::new(2),
            efficiency_history: StepSeries::new(2),
        };
        battery.reset();
        Ok(battery)
    }

    /// Current (possibly degraded) capacity
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Capacity at construction, before any fade
    pub fn initial_capacity(&self) -> f64 {
        self.initial_capacity
    }

    pub fn nominal_power(&self) -> f64 {
        self.nominal_power
    }

    /// Efficiency at zero load, the reference for space estimation
    pub fn initial_efficiency(&self) -> f64 {
        self.efficiency_at(0.0)
    }

    pub fn soc_at(&self, time_step: usize) -> f64 {
        self.state.soc.get(time_step)
    }

    pub fn soc(&self) -> &[f64] {
        self.state.soc.up_to(self.time_step())
    }

    pub fn energy_balance(&self) -> &[f64] {
        self.state.energy_balance.up_to(self.time_step())
    }

    pub fn electricity_consumption_at(&self, time_step: usize) -> f64 {
        self.state.energy_balance.get(time_step)
    }

    pub fn electricity_consumption(&self) -> &[f64] {
        self.energy_balance()
    }

    /// Capacity available at the start of each step
    pub fn capacity_history(&self) -> &[f64] {
        self.capacity_history.up_to(self.time_step())
    }

    /// Efficiency applied at each step
    pub fn efficiency_history(&self) -> &[f64] {
        self.efficiency_history.up_to(self.time_step())
    }

    /// Charge (positive) or discharge (negative) by `energy` kWh, limited by nominal power.
    ///
    /// The resulting state, consumption and faded capacity belong to the next step.
    pub fn charge(&mut self, energy: f64) {
        let next = self.time_step() + 1;
        let energy = if energy >= 0.0 {
            energy.min(self.nominal_power)
        } else {
            energy.max(-self.nominal_power)
        };

        let efficiency = self.efficiency_at(energy);
        let capacity = self.capacity_history.get(self.time_step());
        self.state.charge(energy, efficiency, capacity);

        self.capacity = (capacity - self.degradation(capacity, next)).max(0.0);
        self.efficiency_history.set(next, efficiency);
        self.capacity_history.set(next, self.capacity);
    }

    /// Size capacity to the largest absolute value of `demand`; nominal power is half of it
    pub fn autosize(&mut self, demand: &[f64], safety_factor: f64) {
        let peak = demand
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(0.0_f64, |acc, d| acc.max(d.abs()));
        self.initial_capacity = peak * safety_factor;
        self.capacity = self.initial_capacity;
        self.nominal_power = self.initial_capacity / 2.0;
        self.state.initial_soc = self.state.initial_soc.min(self.capacity);
        self.reset();
    }

    fn efficiency_at(&self, energy: f64) -> f64 {
        match &self.power_efficiency_curve {
            Some(curve) if self.nominal_power > 0.0 => {
                let x = (energy.abs() / self.nominal_power).min(1.0);
                interpolate(curve, x).sqrt()
            }
            _ => self.efficiency,
        }
    }

    fn degradation(&self, capacity: f64, time_step: usize) -> f64 {
        if capacity <= 0.0 {
            return 0.0;
        }
        let balance = self.state.energy_balance.get(time_step);
        self.capacity_loss_coefficient * self.initial_capacity * balance.abs() / (2.0 * capacity)
    }
}

impl Device for Battery {
    fn time_step(&self) -> usize {
        self.state.clock.time_step
    }

    fn next_time_step(&mut self) {
        let t = self.time_step();
        if !self.state.charged && t + 1 < self.state.clock.episode_length {
            self.capacity_history.set(t + 1, self.capacity);
            self.efficiency_history.set(t + 1, self.efficiency_history.get(t));
        }
        self.state.next_time_step();
    }

    fn reset(&mut self) {
        self.state.reset();
        self.capacity = self.initial_capacity;
        self.capacity_history.clear();
        self.efficiency_history.clear();
        self.capacity_history.set(0, self.capacity);
        self.efficiency_history.set(0, self.efficiency_at(0.0));
    }

    fn set_episode_length(&mut self, len: usize) {
        self.state.set_episode_length(len);
        self.capacity_history.resize(len + 1);
        self.efficiency_history.resize(len + 1);
        self.reset();
    }
}

fn validate_curve(mut points: Vec<[f64; 2]>) -> Result<Vec<[f64; 2]>> {
    if points.len() < 2 {
        return Err(SimulationError::InvalidDevice(
            "power efficiency curve needs at least two points".into(),
        ));
    }
    for [x, efficiency] in &points {
        validate_non_negative("power efficiency curve power fraction", *x)?;
        validate_efficiency("power efficiency curve efficiency", *efficiency)?;
    }
    points.sort_by(|a, b| a[0].total_cmp(&b[0]));
    Ok(points)
}

/// Piecewise-linear interpolation, clamped to the end points
fn interpolate(curve: &[[f64; 2]], x: f64) -> f64 {
    let first = curve[0];
    let last = curve[curve.len() - 1];
    if x <= first[0] {
        return first[1];
    }
    if x >= last[0] {
        return last[1];
    }
    curve
        .windows(2)
        .find(|w| x >= w[0][0] && x <= w[1][0])
        .map(|w| {
            let [x0, y0] = w[0];
            let [x1, y1] = w[1];
            if x1 == x0 {
                y0
            } else {
                y0 + (y1 - y0) * (x - x0) / (x1 - x0)
            }
        })
        .unwrap_or(last[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn battery(capacity: f64, nominal_power: f64) -> Battery {
        let mut battery = Battery::from_config(BatteryConfig {
            capacity,
            nominal_power,
            efficiency: 1.0,
            capacity_loss_coefficient: 0.0,
            ..Default::default()
        })
        .unwrap();
        battery.set_episode_length(6);
        battery
    }

    #[test]
    fn test_charge_limited_by_nominal_power() {
        let mut battery = battery(10.0, 2.0);
        battery.charge(5.0);

        assert_relative_eq!(battery.soc_at(1), 2.0);
        assert_relative_eq!(battery.electricity_consumption_at(1), 2.0);
    }

    #[test]
    fn test_discharge_limited_by_nominal_power() {
        let mut battery = battery(10.0, 3.0);
        battery.charge(3.0);
        battery.next_time_step();
        battery.charge(-10.0);

        assert_relative_eq!(battery.electricity_consumption_at(2), -3.0);
        assert_relative_eq!(battery.soc_at(2), 0.0);
    }

    #[test]
    fn test_zero_battery_is_inert() {
        let mut battery = Battery::empty();
        battery.set_episode_length(2);
        battery.charge(1.0);

        assert_eq!(battery.electricity_consumption_at(1), 0.0);
        assert_eq!(battery.capacity(), 0.0);
    }

    #[test]
    fn test_capacity_fades_with_throughput() {
        let mut battery = Battery::from_config(BatteryConfig {
            capacity: 10.0,
            nominal_power: 5.0,
            efficiency: 1.0,
            capacity_loss_coefficient: 0.1,
            ..Default::default()
        })
        .unwrap();
        battery.set_episode_length(3);
        battery.charge(5.0);
        battery.next_time_step();

        // 0.1 * 10 * 5 / (2 * 10)
        assert_relative_eq!(battery.capacity(), 9.75);
        assert_eq!(battery.capacity_history(), &[10.0, 9.75]);
    }

    #[test]
    fn test_power_efficiency_curve_interpolates() {
        let mut battery = Battery::from_config(BatteryConfig {
            capacity: 10.0,
            nominal_power: 4.0,
            capacity_loss_coefficient: 0.0,
            power_efficiency_curve: Some(vec![[0.0, 0.81], [1.0, 0.64]]),
            ..Default::default()
        })
        .unwrap();
        battery.set_episode_length(2);
        battery.charge(4.0);
        battery.next_time_step();

        assert_relative_eq!(battery.efficiency_history()[1], 0.8);
        assert_relative_eq!(battery.initial_efficiency(), 0.9);
    }

    #[test]
    fn test_consumption_visible_after_advancing() {
        let mut battery = battery(10.0, 5.0);
        battery.charge(3.0);
        assert_eq!(battery.electricity_consumption(), &[0.0]);

        battery.next_time_step();
        assert_eq!(battery.electricity_consumption(), &[0.0, 3.0]);
        assert_eq!(battery.soc(), &[0.0, 3.0]);
    }

    #[test]
    fn test_idle_step_keeps_capacity_history() {
        let mut battery = battery(10.0, 5.0);
        battery.next_time_step();
        battery.next_time_step();

        assert_eq!(battery.capacity_history(), &[10.0, 10.0, 10.0]);
        assert_eq!(battery.electricity_consumption(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_reset_restores_capacity() {
        let mut battery = Battery::from_config(BatteryConfig {
            capacity: 10.0,
            nominal_power: 5.0,
            capacity_loss_coefficient: 0.5,
            ..Default::default()
        })
        .unwrap();
        battery.set_episode_length(2);
        battery.charge(5.0);
        battery.reset();

        assert_eq!(battery.capacity(), 10.0);
        assert_eq!(battery.soc(), &[0.0]);
    }

    #[test]
    fn test_autosize_halves_nominal_power() {
        let mut battery = battery(0.0, 0.0);
        battery.autosize(&[0.0, -3.0, -6.0], 1.0);

        assert_relative_eq!(battery.capacity(), 6.0);
        assert_relative_eq!(battery.nominal_power(), 3.0);
    }

    #[test]
    fn test_curve_requires_two_points() {
        let result = Battery::from_config(BatteryConfig {
            capacity: 1.0,
            power_efficiency_curve: Some(vec![[0.0, 0.9]]),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
