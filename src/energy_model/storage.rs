use serde::{Deserialize, Serialize};

use super::{validate_efficiency, validate_non_negative, Device, StepClock};
use crate::error::Result;
use crate::series::StepSeries;

/// Storage tank configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageTankConfig {
    /// Usable capacity in kWh
    pub capacity: f64,
    /// One-way charge/discharge efficiency (0.0-1.0]
    pub efficiency: f64,
    /// Fraction of stored energy lost per step
    pub loss_coefficient: f64,
    /// Stored energy at step 0 in kWh
    pub initial_soc: f64,
}

impl Default for StorageTankConfig {
    fn default() -> Self {
        Self {
            capacity: 0.0,
            efficiency: 0.9,
            loss_coefficient: 0.006,
            initial_soc: 0.0,
        }
    }
}

/// Stored energy bookkeeping shared by thermal tanks and the battery.
///
/// `soc` is stored energy in kWh. `energy_balance` is the energy exchanged with the
/// outside of the device: positive while charging, negative while discharging.
///
/// A charge at step `t` starts from `soc[t]` and lands in slot `t + 1`, the state the
/// device enters on its next step. The series carry one slot past the episode so the
/// final step can be charged too.
#[derive(Debug, Clone)]
pub(crate) struct StorageState {
    pub clock: StepClock,
    pub soc: StepSeries,
    pub energy_balance: StepSeries,
    pub initial_soc: f64,
    pub loss_coefficient: f64,
    pub charged: bool,
}

impl StorageState {
    pub fn new(initial_soc: f64, loss_coefficient: f64) -> Self {
        let mut state = Self {
            clock: StepClock::new(1),
            soc: StepSeries::new(2),
            energy_balance: StepSeries::new(2),
            initial_soc,
            loss_coefficient,
            charged: false,
        };
        state.reset();
        state
    }

    /// Energy available for the current step's charge after standby losses
    pub fn soc_init(&self) -> f64 {
        self.soc.get(self.clock.time_step) * (1.0 - self.loss_coefficient)
    }

    pub fn charge(&mut self, energy: f64, efficiency: f64, capacity: f64) {
        let next = self.clock.time_step + 1;
        let prior = self.soc_init();

        let soc = if energy >= 0.0 {
            (prior + energy * efficiency).min(capacity.max(prior))
        } else {
            (prior + energy / efficiency).max(0.0)
        };

        let delta = soc - prior;
        let balance = if delta >= 0.0 {
            delta / efficiency
        } else {
            delta * efficiency
        };

        self.soc.set(next, soc);
        self.energy_balance.set(next, balance);
        self.charged = true;
    }

    pub fn next_time_step(&mut self) {
        if self.clock.time_step + 1 >= self.clock.episode_length {
            return;
        }
        if !self.charged {
            // Idle step: standby losses only
            let next = self.clock.time_step + 1;
            self.soc.set(next, self.soc_init());
            self.energy_balance.set(next, 0.0);
        }
        self.clock.advance();
        self.charged = false;
    }

    pub fn reset(&mut self) {
        self.clock.time_step = 0;
        self.charged = false;
        self.soc.clear();
        self.energy_balance.clear();
        self.soc.set(0, self.initial_soc);
    }

    pub fn set_episode_length(&mut self, len: usize) {
        self.clock = StepClock::new(len);
        self.soc.resize(len + 1);
        self.energy_balance.resize(len + 1);
        self.reset();
    }
}

/// Thermal storage tank for cooling, heating or domestic hot water
#[derive(Debug, Clone)]
pub struct StorageTank {
    capacity: f64,
    efficiency: f64,
    state: StorageState,
}

impl StorageTank {
    /// Create a tank with the given capacity and default efficiency and losses
    pub fn new(capacity: f64) -> Result<Self> {
        Self::from_config(StorageTankConfig {
            capacity,
            ..Default::default()
        })
    }

    /// Zero-capacity stand-in used when a building has no tank for an end use
    pub fn empty() -> Self {
        Self {
            capacity: 0.0,
            efficiency: 1.0,
            state: StorageState::new(0.0, 0.0),
        }
    }

    pub fn from_config(config: StorageTankConfig) -> Result<Self> {
        validate_non_negative("storage capacity", config.capacity)?;
        validate_efficiency("storage efficiency", config.efficiency)?;
        validate_non_negative("storage loss coefficient", config.loss_coefficient)?;
        validate_non_negative("storage initial soc", config.initial_soc)?;

        Ok(Self {
            capacity: config.capacity,
            efficiency: config.efficiency,
            state: StorageState::new(
                config.initial_soc.min(config.capacity),
                config.loss_coefficient.min(1.0),
            ),
        })
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn loss_coefficient(&self) -> f64 {
        self.state.loss_coefficient
    }

    /// Stored energy at `time_step`
    pub fn soc_at(&self, time_step: usize) -> f64 {
        self.state.soc.get(time_step)
    }

    pub fn energy_balance_at(&self, time_step: usize) -> f64 {
        self.state.energy_balance.get(time_step)
    }

    /// Stored energy for steps `0..=time_step`
    pub fn soc(&self) -> &[f64] {
        self.state.soc.up_to(self.state.clock.time_step)
    }

    /// Energy exchanged for steps `0..=time_step`
    pub fn energy_balance(&self) -> &[f64] {
        self.state.energy_balance.up_to(self.state.clock.time_step)
    }

    /// Charge (positive) or discharge (negative) by `energy` kWh during the current step;
    /// the resulting state is read from the next step on
    pub fn charge(&mut self, energy: f64) {
        self.state.charge(energy, self.efficiency, self.capacity);
    }

    /// Size capacity to the largest single-step demand
    pub fn autosize(&mut self, demand: &[f64], safety_factor: f64) {
        let peak = demand
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(0.0_f64, f64::max);
        self.capacity = peak * safety_factor;
        self.state.initial_soc = self.state.initial_soc.min(self.capacity);
    }
}

impl Device for StorageTank {
    fn time_step(&self) -> usize {
        self.state.clock.time_step
    }

    fn next_time_step(&mut self) {
        self.state.next_time_step();
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn set_episode_length(&mut self, len: usize) {
        self.state.set_episode_length(len);
    }
}
