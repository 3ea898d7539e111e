//! # Episode Runner
//!
//! Drives one controller against one building for the full horizon:
//! observe, act, advance. Totals are taken over the whole episode once the last
//! step has been applied.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

use crate::building::Building;
use crate::controller::Controller;
use crate::error::Result;

/// Episode totals for a building and its no-storage baselines
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub building: String,
    pub started_at: DateTime<Utc>,
    pub time_steps: usize,
    pub net_electricity_consumption: f64,
    pub net_electricity_consumption_cost: f64,
    pub net_electricity_consumption_emission: f64,
    pub peak_net_electricity_consumption: f64,
    pub net_electricity_consumption_without_storage: f64,
    pub net_electricity_consumption_without_storage_cost: f64,
    pub net_electricity_consumption_without_storage_emission: f64,
    pub net_electricity_consumption_without_storage_and_pv: f64,
    pub net_electricity_consumption_without_storage_and_pv_cost: f64,
    pub net_electricity_consumption_without_storage_and_pv_emission: f64,
    /// Cost relative to the no-storage baseline; `None` when the baseline is zero
    pub cost_ratio: Option<f64>,
    pub emission_ratio: Option<f64>,
    pub elapsed_ms: u128,
}

impl EpisodeSummary {
    fn from_building(building: &Building, started_at: DateTime<Utc>, elapsed_ms: u128) -> Self {
        let sum = |series: &[f64]| series.iter().sum::<f64>();

        let cost = sum(building.net_electricity_consumption_cost());
        let emission = sum(building.net_electricity_consumption_emission());
        let baseline_cost = sum(&building.net_electricity_consumption_without_storage_cost());
        let baseline_emission =
            sum(&building.net_electricity_consumption_without_storage_emission());

        Self {
            building: building.name().to_string(),
            started_at,
            time_steps: building.time_step() + 1,
            net_electricity_consumption: sum(building.net_electricity_consumption()),
            net_electricity_consumption_cost: cost,
            net_electricity_consumption_emission: emission,
            peak_net_electricity_consumption: building
                .net_electricity_consumption()
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max),
            net_electricity_consumption_without_storage: sum(
                &building.net_electricity_consumption_without_storage(),
            ),
            net_electricity_consumption_without_storage_cost: baseline_cost,
            net_electricity_consumption_without_storage_emission: baseline_emission,
            net_electricity_consumption_without_storage_and_pv: sum(
                &building.net_electricity_consumption_without_storage_and_pv(),
            ),
            net_electricity_consumption_without_storage_and_pv_cost: sum(
                &building.net_electricity_consumption_without_storage_and_pv_cost(),
            ),
            net_electricity_consumption_without_storage_and_pv_emission: sum(
                &building.net_electricity_consumption_without_storage_and_pv_emission(),
            ),
            cost_ratio: ratio(cost, baseline_cost),
            emission_ratio: ratio(emission, baseline_emission),
            elapsed_ms,
        }
    }
}

fn ratio(value: f64, baseline: f64) -> Option<f64> {
    (baseline != 0.0).then(|| value / baseline)
}

/// Reset `building` and `controller`, then run every step of the horizon
pub fn run_episode(
    building: &mut Building,
    controller: &mut dyn Controller,
) -> Result<EpisodeSummary> {
    building.reset();
    controller.reset();

    let started_at = Utc::now();
    let clock = Instant::now();
    let horizon = building.horizon();
    info!(building = %building.name(), horizon, "Starting episode");

    for t in 0..horizon {
        let observations = building.observations(false);
        let actions = controller.select_actions(&observations, building.action_space());
        building.apply_action_vector(&actions)?;
        debug!(time_step = t, ?actions, "Applied actions");

        if t + 1 < horizon {
            building.next_time_step()?;
        }
    }

    let summary =
        EpisodeSummary::from_building(building, started_at, clock.elapsed().as_millis());
    info!(
        building = %summary.building,
        net = summary.net_electricity_consumption,
        cost = summary.net_electricity_consumption_cost,
        emission = summary.net_electricity_consumption_emission,
        "Episode finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{HourScheduleController, SchedulePreset};
    use crate::data::synthetic::{generate, SyntheticConfig};
    use crate::energy_model::{Battery, BatteryConfig};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn building(battery_capacity: f64) -> Building {
        let context = Arc::new(generate(&SyntheticConfig::default().with_hours(48)).unwrap());
        let battery = Battery::from_config(BatteryConfig {
            capacity: battery_capacity,
            nominal_power: battery_capacity / 2.0,
            ..Default::default()
        })
        .unwrap();

        Building::builder(context)
            .with_name("runner")
            .with_electrical_storage(battery)
            .build()
            .unwrap()
    }

    #[test]
    fn test_episode_covers_horizon() {
        let mut building = building(6.0);
        let mut controller = HourScheduleController::default();

        let summary = run_episode(&mut building, &mut controller).unwrap();

        assert_eq!(summary.time_steps, 48);
        assert_eq!(building.net_electricity_consumption().len(), 48);
        assert!(summary.net_electricity_consumption_emission >= 0.0);
        assert!(summary.peak_net_electricity_consumption.is_finite());
    }

    #[test]
    fn test_idle_controller_matches_baseline() {
        let mut building = building(6.0);
        let mut controller = HourScheduleController::from_preset(SchedulePreset::Idle);

        let summary = run_episode(&mut building, &mut controller).unwrap();

        assert_relative_eq!(
            summary.net_electricity_consumption,
            summary.net_electricity_consumption_without_storage,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let mut building = building(6.0);
        let mut controller = HourScheduleController::default();

        let first = run_episode(&mut building, &mut controller).unwrap();
        let second = run_episode(&mut building, &mut controller).unwrap();

        assert_eq!(first.net_electricity_consumption, second.net_electricity_consumption);
        assert_eq!(
            first.net_electricity_consumption_cost,
            second.net_electricity_consumption_cost
        );
    }

    #[test]
    fn test_ratio_undefined_for_zero_baseline() {
        assert_eq!(ratio(3.0, 0.0), None);
        assert_eq!(ratio(3.0, 6.0), Some(0.5));
    }
}
