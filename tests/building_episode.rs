use approx::assert_relative_eq;
use proptest::prelude::*;
use rstest::rstest;
use std::sync::Arc;

use building_energy_sim::data::synthetic::{generate, SyntheticConfig};
use building_energy_sim::energy_model::{
    Battery, ConversionDevice, ElectricHeater, HeatPump, Pv, StorageTank, ThermalMode,
};
use building_energy_sim::{
    run_episode, Building, Config, Context, HourScheduleController, SimulationError,
};

const TOLERANCE: f64 = 1e-9;

fn context(hours: usize, seed: u64) -> Arc<Context> {
    let config = SyntheticConfig::default().with_hours(hours).with_seed(seed);
    Arc::new(generate(&config).unwrap())
}

fn equipped_building(context: Arc<Context>) -> Building {
    let mut building = Building::builder(context)
        .with_name("equipped")
        .with_heating_storage(StorageTank::new(6.0).unwrap())
        .with_dhw_storage(StorageTank::new(4.0).unwrap())
        .with_heating_device(Box::new(HeatPump::new(0.0).unwrap()))
        .with_dhw_device(Box::new(ElectricHeater::new(0.0).unwrap()))
        .with_electrical_storage(Battery::new(6.0, 3.0).unwrap())
        .with_pv(Pv::new(4.0).unwrap())
        .build()
        .unwrap();
    building.autosize_heating_device(2.0).unwrap();
    building.autosize_dhw_device(2.0).unwrap();
    building
}

/// Map unit-interval samples into the building's action space
fn scaled(building: &Building, samples: &[f64]) -> Vec<f64> {
    let space = building.action_space();
    samples
        .iter()
        .zip(space.low.iter().zip(&space.high))
        .map(|(s, (lo, hi))| lo + s * (hi - lo))
        .collect()
}

fn assert_balance_within_device_limits(building: &Building) {
    let context = building.context();
    let checks: [(&[f64], Vec<f64>, &dyn ConversionDevice); 2] = [
        (
            building.heating_storage().energy_balance(),
            building.heating_demand(),
            building.heating_device(),
        ),
        (
            building.dhw_storage().energy_balance(),
            building.dhw_demand(),
            building.dhw_device(),
        ),
    ];

    // The action taken at step t lands in balance[t + 1]
    for (balance, demand, device) in checks {
        for (t, next) in balance.iter().skip(1).enumerate() {
            let max_output =
                device.get_max_output_power(&context.operating_conditions(t, ThermalMode::Heating));
            assert!(*next >= -demand[t] - TOLERANCE, "t={t} {next} < -{}", demand[t]);
            assert!(
                *next <= max_output - demand[t] + TOLERANCE,
                "t={t} {next} > {max_output} - {}",
                demand[t]
            );
        }
    }
}

#[test]
fn test_full_episode_from_default_config() {
    let mut config = Config::load_from("config/default.toml").unwrap();
    config.simulation.horizon = Some(72);
    let context = Arc::new(generate(&config.dataset()).unwrap());
    let mut building = config.build_building(context).unwrap();
    let mut controller = config.controller.controller();

    let summary = run_episode(&mut building, &mut controller).unwrap();

    assert_eq!(summary.time_steps, 72);
    assert_eq!(building.time_step(), 71);
    assert!(summary.net_electricity_consumption_emission >= 0.0);
    assert!(summary.net_electricity_consumption_without_storage_and_pv_emission >= 0.0);
    assert_eq!(
        building.observation_vector(true).len(),
        building.normalized_observation_space().len()
    );
    assert!(matches!(
        building.next_time_step(),
        Err(SimulationError::EpisodeEnded(71))
    ));
}

#[test]
fn test_schedule_controller_keeps_storage_feasible() {
    let mut building = equipped_building(context(96, 3));
    let mut controller = HourScheduleController::default();

    run_episode(&mut building, &mut controller).unwrap();

    assert_balance_within_device_limits(&building);
    for soc in building.electrical_storage().soc() {
        assert!(*soc >= 0.0 && *soc <= 6.0 + TOLERANCE);
    }
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(2024)]
fn test_reset_matches_fresh_building(#[case] seed: u64) {
    let context = context(24, seed);
    let fresh = equipped_building(context.clone());
    let mut building = equipped_building(context);
    let initial = building.observation_vector(false);

    for _ in 0..10 {
        let actions = vec![0.5; building.active_actions().len()];
        building.apply_action_vector(&actions).unwrap();
        building.next_time_step().unwrap();
    }
    building.reset();

    assert_eq!(building.observation_vector(false), initial);
    assert_eq!(building.observation_vector(false), fresh.observation_vector(false));
}

#[test]
fn test_identical_runs_are_bit_identical() {
    let run = || {
        let mut building = equipped_building(context(48, 11));
        let mut controller = HourScheduleController::default();
        run_episode(&mut building, &mut controller).unwrap();
        building.net_electricity_consumption().to_vec()
    };

    assert_eq!(run(), run());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_actions_in_space_never_fail(
        samples in prop::collection::vec(prop::collection::vec(0.0..=1.0_f64, 4), 24)
    ) {
        let mut building = equipped_building(context(24, 5));

        for (t, sample) in samples.iter().enumerate() {
            let actions = scaled(&building, sample);
            prop_assert!(building.apply_action_vector(&actions).is_ok());
            if t + 1 < building.horizon() {
                prop_assert!(building.next_time_step().is_ok());
            }
        }

        assert_balance_within_device_limits(&building);

        let nsl = building.non_shiftable_load_demand();
        let solar = building.solar_generation();
        let battery = building.electrical_storage().electricity_consumption();
        for t in 0..building.horizon() {
            let expected = building.cooling_electricity_consumption()[t]
                + building.heating_electricity_consumption()[t]
                + building.dhw_electricity_consumption()[t]
                + battery[t]
                + nsl[t]
                + solar[t];
            assert_relative_eq!(building.net_electricity_consumption()[t], expected, epsilon = 1e-9);
            prop_assert!(building.net_electricity_consumption_emission()[t] >= 0.0);
        }
    }
}
