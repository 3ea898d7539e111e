//! # Configuration
//!
//! Layered from `config/default.toml` and `BES__`-prefixed environment variables,
//! with `__` separating nested keys (`BES__DATASET__HOURS=720`).

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

use crate::building::{Building, BuildingBuilder, DEFAULT_OBSERVATION_EPSILON};
use crate::controller::{HourScheduleController, SchedulePreset};
use crate::data::synthetic::SyntheticConfig;
use crate::data::Context;
use crate::energy_model::{
    Battery, BatteryConfig, ConversionDevice, ElectricHeater, ElectricHeaterConfig, HeatPump,
    HeatPumpConfig, Pv, StorageTank, StorageTankConfig,
};
use crate::error::Result;
use crate::features::all_active;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "BES__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub simulation: SimulationConfig,
    #[validate(nested)]
    pub dataset: SyntheticConfig,
    pub building: BuildingConfig,
    pub devices: DevicesConfig,
    #[validate(nested)]
    pub autosize: AutosizeConfig,
    #[validate(nested)]
    pub controller: ControllerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationConfig {
    /// Overrides `dataset.seed` when set
    pub seed: Option<u64>,
    /// Overrides `dataset.hours` when set
    #[validate(range(min = 1))]
    pub horizon: Option<usize>,
    #[validate(range(min = 0.0))]
    pub observation_epsilon: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            horizon: None,
            observation_epsilon: DEFAULT_OBSERVATION_EPSILON,
        }
    }
}

/// Building identity and feature selection; unset lists fall back to the building defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingConfig {
    pub name: Option<String>,
    pub observations: Option<Vec<String>>,
    pub actions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversionDeviceConfig {
    HeatPump(HeatPumpConfig),
    ElectricHeater(ElectricHeaterConfig),
}

impl ConversionDeviceConfig {
    pub fn build(&self) -> Result<Box<dyn ConversionDevice>> {
        Ok(match self {
            Self::HeatPump(config) => Box::new(HeatPump::from_config(config.clone())?),
            Self::ElectricHeater(config) => Box::new(ElectricHeater::from_config(config.clone())?),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PvConfig {
    /// Installed kW
    pub nominal_power: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    pub cooling_storage: StorageTankConfig,
    pub heating_storage: StorageTankConfig,
    pub dhw_storage: StorageTankConfig,
    pub electrical_storage: BatteryConfig,
    pub pv: PvConfig,
    pub cooling_device: ConversionDeviceConfig,
    pub heating_device: ConversionDeviceConfig,
    pub dhw_device: ConversionDeviceConfig,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            cooling_storage: StorageTankConfig::default(),
            heating_storage: StorageTankConfig::default(),
            dhw_storage: StorageTankConfig::default(),
            electrical_storage: BatteryConfig::default(),
            pv: PvConfig::default(),
            cooling_device: ConversionDeviceConfig::HeatPump(HeatPumpConfig::default()),
            heating_device: ConversionDeviceConfig::HeatPump(HeatPumpConfig::default()),
            dhw_device: ConversionDeviceConfig::ElectricHeater(ElectricHeaterConfig::default()),
        }
    }
}

impl DevicesConfig {
    fn install(&self, builder: BuildingBuilder) -> Result<BuildingBuilder> {
        Ok(builder
            .with_cooling_storage(StorageTank::from_config(self.cooling_storage.clone())?)
            .with_heating_storage(StorageTank::from_config(self.heating_storage.clone())?)
            .with_dhw_storage(StorageTank::from_config(self.dhw_storage.clone())?)
            .with_electrical_storage(Battery::from_config(self.electrical_storage.clone())?)
            .with_pv(Pv::new(self.pv.nominal_power)?)
            .with_cooling_device(self.cooling_device.build()?)
            .with_heating_device(self.heating_device.build()?)
            .with_dhw_device(self.dhw_device.build()?))
    }
}

/// Safety factor per device; devices left unset keep their configured size
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AutosizeConfig {
    #[validate(range(min = 0.0))]
    pub cooling_device: Option<f64>,
    #[validate(range(min = 0.0))]
    pub heating_device: Option<f64>,
    #[validate(range(min = 0.0))]
    pub dhw_device: Option<f64>,
    #[validate(range(min = 0.0))]
    pub cooling_storage: Option<f64>,
    #[validate(range(min = 0.0))]
    pub heating_storage: Option<f64>,
    #[validate(range(min = 0.0))]
    pub dhw_storage: Option<f64>,
    #[validate(range(min = 0.0))]
    pub pv: Option<f64>,
    #[validate(range(min = 0.0))]
    pub electrical_storage: Option<f64>,
}

impl AutosizeConfig {
    /// Resize the configured devices; PV goes before the battery, which is sized from PV output
    pub fn apply(&self, building: &mut Building) -> Result<()> {
        if let Some(sf) = self.cooling_device {
            building.autosize_cooling_device(sf)?;
        }
        if let Some(sf) = self.heating_device {
            building.autosize_heating_device(sf)?;
        }
        if let Some(sf) = self.dhw_device {
            building.autosize_dhw_device(sf)?;
        }
        if let Some(sf) = self.cooling_storage {
            building.autosize_cooling_storage(sf)?;
        }
        if let Some(sf) = self.heating_storage {
            building.autosize_heating_storage(sf)?;
        }
        if let Some(sf) = self.dhw_storage {
            building.autosize_dhw_storage(sf)?;
        }
        if let Some(sf) = self.pv {
            building.autosize_pv(sf)?;
        }
        if let Some(sf) = self.electrical_storage {
            building.autosize_electrical_storage(sf)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HourAction {
    #[validate(range(min = 1, max = 24))]
    pub hour: u32,
    #[validate(range(min = -1.0, max = 1.0))]
    pub action: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ControllerConfig {
    pub preset: SchedulePreset,
    #[validate(nested)]
    pub overrides: Vec<HourAction>,
}

impl ControllerConfig {
    pub fn controller(&self) -> HourScheduleController {
        self.overrides
            .iter()
            .fold(HourScheduleController::from_preset(self.preset), |c, o| {
                c.with_hour(o.hour, o.action)
            })
    }
}

impl Config {
    /// Load `config/default.toml` overlaid with the environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> std::result::Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Dataset settings with the simulation overrides applied
    pub fn dataset(&self) -> SyntheticConfig {
        let mut dataset = self.dataset.clone();
        if let Some(seed) = self.simulation.seed {
            dataset = dataset.with_seed(seed);
        }
        if let Some(horizon) = self.simulation.horizon {
            dataset = dataset.with_hours(horizon);
        }
        dataset
    }

    /// Construct the building, then autosize it
    pub fn build_building(&self, context: Arc<Context>) -> Result<Building> {
        let mut builder = Building::builder(context)
            .with_observation_epsilon(self.simulation.observation_epsilon);
        if let Some(name) = &self.building.name {
            builder = builder.with_name(name.clone());
        }
        if let Some(observations) = &self.building.observations {
            builder = builder.with_observation_metadata(all_active(observations.iter().cloned()));
        }
        if let Some(actions) = &self.building.actions {
            builder = builder.with_action_metadata(all_active(actions.iter().cloned()));
        }

        let mut building = self.devices.install(builder)?.build()?;
        self.autosize.apply(&mut building)?;
        Ok(building)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::generate;
    use crate::error::SimulationError;

    fn with_toml(toml: &str) -> std::result::Result<Config, ConfigError> {
        Config::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    #[test]
    fn test_defaults_without_file() {
        let config = with_toml("").unwrap();

        assert_eq!(config.simulation.observation_epsilon, DEFAULT_OBSERVATION_EPSILON);
        assert_eq!(config.dataset.hours, SyntheticConfig::default().hours);
        assert!(matches!(
            config.devices.dhw_device,
            ConversionDeviceConfig::ElectricHeater(_)
        ));
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = with_toml(
            r#"
            [simulation]
            horizon = 24
            seed = 7

            [devices.electrical_storage]
            capacity = 8.0
            nominal_power = 4.0

            [devices.heating_device]
            type = "electric_heater"
            nominal_power = 3.0

            [controller]
            preset = "optimized"
            overrides = [{ hour = 12, action = 0.5 }]
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset().hours, 24);
        assert_eq!(config.dataset().seed, 7);
        assert_eq!(config.devices.electrical_storage.capacity, 8.0);
        assert_eq!(config.devices.electrical_storage.efficiency, 0.9);
        match &config.devices.heating_device {
            ConversionDeviceConfig::ElectricHeater(heater) => {
                assert_eq!(heater.nominal_power, 3.0);
                assert_eq!(heater.efficiency, 0.9);
            }
            other => panic!("unexpected device {other:?}"),
        }
        let controller = config.controller.controller();
        assert_eq!(controller.action_for_hour(12), 0.5);
        assert_eq!(controller.action_for_hour(17), -0.0044);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let err = with_toml("[simulation]\nobservation_epsilon = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = with_toml("[controller]\noverrides = [{ hour = 25, action = 0.1 }]").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_unknown_device_type_rejected() {
        let err = with_toml("[devices.cooling_device]\ntype = \"chiller\"").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_build_building_applies_selection_and_autosize() {
        let config = with_toml(
            r#"
            [simulation]
            horizon = 48

            [dataset]
            start = "2024-06-01T00:00:00"

            [building]
            name = "house"
            observations = ["hour", "electrical_storage_soc", "net_electricity_consumption"]
            actions = ["electrical_storage"]

            [devices.pv]
            nominal_power = 4.0

            [autosize]
            electrical_storage = 1.0
            "#,
        )
        .unwrap();
        let context = Arc::new(generate(&config.dataset()).unwrap());

        let building = config.build_building(context).unwrap();

        assert_eq!(building.name(), "house");
        assert_eq!(building.active_observations().len(), 3);
        assert_eq!(building.active_actions().len(), 1);
        assert!(building.electrical_storage().capacity() > 0.0);
    }

    #[test]
    fn test_unknown_observation_surfaces_from_build() {
        let config = with_toml("[simulation]\nhorizon = 24\n[building]\nobservations = [\"humidity\"]")
            .unwrap();
        let context = Arc::new(generate(&config.dataset()).unwrap());

        assert!(matches!(
            config.build_building(context),
            Err(SimulationError::UnknownObservations(_))
        ));
    }
}
