//! # Controllers
//!
//! Policies that turn a building's observations into an action vector. The simulation
//! core never decides actions itself; [`crate::runner::run_episode`] drives a
//! [`Controller`] against a [`crate::building::Building`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::spaces::BoxSpace;

pub trait Controller: Send {
    /// Actions for the current step, one per dimension of `action_space`
    fn select_actions(
        &mut self,
        observations: &IndexMap<String, f64>,
        action_space: &BoxSpace,
    ) -> Vec<f64>;

    /// Forget any per-episode state
    fn reset(&mut self) {}
}

/// Built-in hour-of-day schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePreset {
    /// Charge 9.1% of capacity per hour overnight (22-08), discharge 8% during the day (09-21)
    #[default]
    Basic,
    /// Battery-only schedule: charge 11% of capacity per hour from 06 to 14, discharge 6.7% otherwise
    BasicBattery,
    /// Finer overnight charging and staged daytime discharge
    Optimized,
    /// No actions unless overridden
    Idle,
}

impl SchedulePreset {
    pub fn schedule(self) -> BTreeMap<u32, f64> {
        (1..=24)
            .map(|hour| {
                let action = match self {
                    Self::Basic => match hour {
                        9..=21 => -0.08,
                        1..=8 | 22..=24 => 0.091,
                        _ => 0.0,
                    },
                    Self::BasicBattery => match hour {
                        6..=14 => 0.11,
                        _ => -0.067,
                    },
                    Self::Optimized => match hour {
                        7..=15 => -0.02,
                        16..=18 => -0.0044,
                        19..=22 => -0.024,
                        23..=24 => 0.034,
                        1..=6 => 0.05532,
                        _ => 0.0,
                    },
                    Self::Idle => 0.0,
                };
                (hour, action)
            })
            .collect()
    }
}

/// Rule-based controller applying the same fraction to every action for a given hour
#[derive(Debug, Clone, PartialEq)]
pub struct HourScheduleController {
    schedule: BTreeMap<u32, f64>,
    missing_hour_reported: bool,
}

impl Default for HourScheduleController {
    fn default() -> Self {
        Self::from_preset(SchedulePreset::Basic)
    }
}

impl HourScheduleController {
    pub fn new(schedule: BTreeMap<u32, f64>) -> Self {
        Self {
            schedule,
            missing_hour_reported: false,
        }
    }

    pub fn from_preset(preset: SchedulePreset) -> Self {
        Self::new(preset.schedule())
    }

    /// Override the action for one hour (1..=24)
    pub fn with_hour(mut self, hour: u32, action: f64) -> Self {
        self.schedule.insert(hour, action);
        self
    }

    pub fn action_for_hour(&self, hour: u32) -> f64 {
        self.schedule.get(&hour).copied().unwrap_or(0.0)
    }
}

impl Controller for HourScheduleController {
    fn select_actions(
        &mut self,
        observations: &IndexMap<String, f64>,
        action_space: &BoxSpace,
    ) -> Vec<f64> {
        let action = match observations.get("hour") {
            Some(hour) if hour.is_finite() => self.action_for_hour(hour.round() as u32),
            _ => {
                if !self.missing_hour_reported {
                    warn!("Hour observation not active; schedule controller idles");
                    self.missing_hour_reported = true;
                }
                0.0
            }
        };
        action_space.clip(&vec![action; action_space.len()])
    }

    fn reset(&mut self) {
        self.missing_hour_reported = false;
    }
}
