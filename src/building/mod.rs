//! # Building Orchestrator
//!
//! A [`Building`] owns its storage, conversion and generation devices and steps them in
//! lock-step against a shared [`Context`]:
//!
//! ```text
//! observations() -> controller -> apply_actions() -> next_time_step() -> ...
//! ```
//!
//! Actions are fractions of storage capacity. They are clamped to what the end use can
//! absorb and what its conversion device can deliver, so an infeasible request never
//! fails. Storage reacts within the step, so the consumption, cost and emission series
//! derived on [`Building::next_time_step`] carry the previous step's actions.

mod autosize;
mod views;

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::data::Context;
use crate::energy_model::{
    Battery, ConversionDevice, Device, ElectricHeater, HeatPump, OperatingConditions, Pv,
    StorageTank, ThermalMode,
};
use crate::error::{Result, SimulationError};
use crate::features::{
    resolve_actions, resolve_observations, ActionKey, FeatureKind, ObservationFeature,
    ObservationKey,
};
use crate::preprocessing::{min_max, periodic};
use crate::series::StepSeries;
use crate::spaces::{
    BatteryRating, BoxSpace, DeviceRatings, ObservationLimits, SpaceEstimator, StorageRating,
};

/// Call a [`Device`] lifecycle method on every device a building owns
macro_rules! for_each_device {
    ($building:expr, $method:ident($($arg:expr),*)) => {{
        $building.cooling_device.$method($($arg),*);
        $building.heating_device.$method($($arg),*);
        $building.dhw_device.$method($($arg),*);
        $building.cooling_storage.$method($($arg),*);
        $building.heating_storage.$method($($arg),*);
        $building.dhw_storage.$method($($arg),*);
        $building.electrical_storage.$method($($arg),*);
        $building.pv.$method($($arg),*);
    }};
}

/// Default margin added around every observation bound
pub const DEFAULT_OBSERVATION_EPSILON: f64 = 1e-6;

pub struct Building {
    name: String,
    context: Arc<Context>,
    observation_metadata: IndexMap<String, bool>,
    action_metadata: IndexMap<String, bool>,
    observations: Vec<ObservationFeature>,
    actions: Vec<ActionKey>,
    observation_epsilon: f64,

    cooling_storage: StorageTank,
    heating_storage: StorageTank,
    dhw_storage: StorageTank,
    electrical_storage: Battery,
    cooling_device: Box<dyn ConversionDevice>,
    heating_device: Box<dyn ConversionDevice>,
    dhw_device: Box<dyn ConversionDevice>,
    pv: Pv,

    time_step: usize,
    /// PV generation over the whole horizon (<= 0)
    solar_generation: Vec<f64>,
    /// Magnitude of `solar_generation`, as observed
    pv_output: Vec<f64>,
    cooling_electricity_consumption: StepSeries,
    heating_electricity_consumption: StepSeries,
    dhw_electricity_consumption: StepSeries,
    net_electricity_consumption: StepSeries,
    net_electricity_consumption_cost: StepSeries,
    net_electricity_consumption_emission: StepSeries,

    observation_limits: ObservationLimits,
    normalized_observation_limits: ObservationLimits,
    action_space: BoxSpace,
}

/// Builder for [`Building`]; devices not supplied are zero-size stand-ins
pub struct BuildingBuilder {
    context: Arc<Context>,
    name: Option<String>,
    observation_metadata: Option<IndexMap<String, bool>>,
    action_metadata: Option<IndexMap<String, bool>>,
    observation_epsilon: f64,
    cooling_storage: Option<StorageTank>,
    heating_storage: Option<StorageTank>,
    dhw_storage: Option<StorageTank>,
    electrical_storage: Option<Battery>,
    cooling_device: Option<Box<dyn ConversionDevice>>,
    heating_device: Option<Box<dyn ConversionDevice>>,
    dhw_device: Option<Box<dyn ConversionDevice>>,
    pv: Option<Pv>,
}

impl BuildingBuilder {
    pub fn new(context: Arc<Context>) -> Self {
        Self {
            context,
            name: None,
            observation_metadata: None,
            action_metadata: None,
            observation_epsilon: DEFAULT_OBSERVATION_EPSILON,
            cooling_storage: None,
            heating_storage: None,
            dhw_storage: None,
            electrical_storage: None,
            cooling_device: None,
            heating_device: None,
            dhw_device: None,
            pv: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Ordered `observation name -> active` mapping
    pub fn with_observation_metadata(mut self, metadata: IndexMap<String, bool>) -> Self {
        self.observation_metadata = Some(metadata);
        self
    }

    /// Ordered `action name -> active` mapping
    pub fn with_action_metadata(mut self, metadata: IndexMap<String, bool>) -> Self {
        self.action_metadata = Some(metadata);
        self
    }

    pub fn with_observation_epsilon(mut self, epsilon: f64) -> Self {
        self.observation_epsilon = epsilon;
        self
    }

    pub fn with_cooling_storage(mut self, storage: StorageTank) -> Self {
        self.cooling_storage = Some(storage);
        self
    }

    pub fn with_heating_storage(mut self, storage: StorageTank) -> Self {
        self.heating_storage = Some(storage);
        self
    }

    pub fn with_dhw_storage(mut self, storage: StorageTank) -> Self {
        self.dhw_storage = Some(storage);
        self
    }

    pub fn with_electrical_storage(mut self, battery: Battery) -> Self {
        self.electrical_storage = Some(battery);
        self
    }

    pub fn with_cooling_device(mut self, device: Box<dyn ConversionDevice>) -> Self {
        self.cooling_device = Some(device);
        self
    }

    pub fn with_heating_device(mut self, device: Box<dyn ConversionDevice>) -> Self {
        self.heating_device = Some(device);
        self
    }

    pub fn with_dhw_device(mut self, device: Box<dyn ConversionDevice>) -> Self {
        self.dhw_device = Some(device);
        self
    }

    pub fn with_pv(mut self, pv: Pv) -> Self {
        self.pv = Some(pv);
        self
    }

    /// Resolve metadata, size every device to the horizon, estimate spaces and reset
    pub fn build(self) -> Result<Building> {
        let context = self.context;

        let observation_metadata = self
            .observation_metadata
            .unwrap_or_else(|| default_observation_metadata(&context));
        let action_metadata = self.action_metadata.unwrap_or_else(|| {
            ActionKey::iter().map(|k| (k.to_string(), true)).collect()
        });
        let observations = resolve_observations(&observation_metadata)?;
        let actions = resolve_actions(&action_metadata)?;

        if !self.observation_epsilon.is_finite() || self.observation_epsilon < 0.0 {
            return Err(SimulationError::InvalidDevice(format!(
                "observation epsilon must be a finite non-negative number, got {}",
                self.observation_epsilon
            )));
        }

        let horizon = context.horizon();
        let mut building = Building {
            name: self.name.unwrap_or_else(|| Uuid::new_v4().to_string()),
            observation_metadata,
            action_metadata,
            observations,
            actions,
            observation_epsilon: self.observation_epsilon,
            cooling_storage: self.cooling_storage.unwrap_or_else(StorageTank::empty),
            heating_storage: self.heating_storage.unwrap_or_else(StorageTank::empty),
            dhw_storage: self.dhw_storage.unwrap_or_else(StorageTank::empty),
            electrical_storage: self.electrical_storage.unwrap_or_else(Battery::empty),
            cooling_device: self.cooling_device.unwrap_or_else(zero_heat_pump),
            heating_device: self.heating_device.unwrap_or_else(zero_heat_pump),
            dhw_device: self.dhw_device.unwrap_or_else(zero_electric_heater),
            pv: self.pv.unwrap_or_else(Pv::empty),
            time_step: 0,
            solar_generation: vec![0.0; horizon],
            pv_output: vec![0.0; horizon],
            cooling_electricity_consumption: StepSeries::new(horizon),
            heating_electricity_consumption: StepSeries::new(horizon),
            dhw_electricity_consumption: StepSeries::new(horizon),
            net_electricity_consumption: StepSeries::new(horizon),
            net_electricity_consumption_cost: StepSeries::new(horizon),
            net_electricity_consumption_emission: StepSeries::new(horizon),
            observation_limits: ObservationLimits::default(),
            normalized_observation_limits: ObservationLimits::default(),
            action_space: BoxSpace::new(Vec::new(), Vec::new()),
            context,
        };

        for_each_device!(building, set_episode_length(horizon));
        building.refresh()?;

        info!(
            building = %building.name,
            horizon,
            observations = building.observations.len(),
            actions = building.actions.len(),
            "Building constructed"
        );
        Ok(building)
    }
}

fn zero_heat_pump() -> Box<dyn ConversionDevice> {
    Box::new(HeatPump::zero())
}

fn zero_electric_heater() -> Box<dyn ConversionDevice> {
    Box::new(ElectricHeater::zero())
}

/// Every observation with data behind it, in declaration order
fn default_observation_metadata(context: &Context) -> IndexMap<String, bool> {
    ObservationKey::iter()
        .filter(|k| context.series(*k).map_or(true, |s| !s.is_empty()))
        .map(|k| (k.to_string(), true))
        .collect()
}

fn soc_fraction(soc: f64, capacity: f64) -> f64 {
    if capacity > 0.0 {
        soc / capacity
    } else {
        0.0
    }
}

fn sanitize_action(action: Option<f64>) -> f64 {
    action.filter(|a| a.is_finite()).unwrap_or(0.0)
}

/// Charge a thermal store within what the end use can absorb and its device can deliver
fn charge_thermal(
    end_use: ActionKey,
    storage: &mut StorageTank,
    device: &mut dyn ConversionDevice,
    action: f64,
    space_demand: f64,
    conditions: &OperatingConditions,
) {
    let requested = action * storage.capacity();
    let max_output = device.get_max_output_power(conditions);
    let energy = requested.min(max_output - space_demand).max(-space_demand);

    if energy != requested {
        trace!(
            %end_use,
            requested,
            energy,
            space_demand,
            max_output,
            "Clamped storage action"
        );
    }

    storage.charge(energy);
    let input = device.get_input_power(space_demand + energy, conditions);
    device.update_electricity_consumption(input);
}

impl Building {
    pub fn builder(context: Arc<Context>) -> BuildingBuilder {
        BuildingBuilder::new(context)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time_step(&self) -> usize {
        self.time_step
    }

    /// Number of steps in the episode
    pub fn horizon(&self) -> usize {
        self.context.horizon()
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn observation_metadata(&self) -> &IndexMap<String, bool> {
        &self.observation_metadata
    }

    pub fn action_metadata(&self) -> &IndexMap<String, bool> {
        &self.action_metadata
    }

    /// Active observations in vector order
    pub fn active_observations(&self) -> &[ObservationFeature] {
        &self.observations
    }

    /// Active actions in vector order
    pub fn active_actions(&self) -> &[ActionKey] {
        &self.actions
    }

    pub fn observation_epsilon(&self) -> f64 {
        self.observation_epsilon
    }

    pub fn cooling_storage(&self) -> &StorageTank {
        &self.cooling_storage
    }

    pub fn heating_storage(&self) -> &StorageTank {
        &self.heating_storage
    }

    pub fn dhw_storage(&self) -> &StorageTank {
        &self.dhw_storage
    }

    pub fn electrical_storage(&self) -> &Battery {
        &self.electrical_storage
    }

    pub fn cooling_device(&self) -> &dyn ConversionDevice {
        self.cooling_device.as_ref()
    }

    pub fn heating_device(&self) -> &dyn ConversionDevice {
        self.heating_device.as_ref()
    }

    pub fn dhw_device(&self) -> &dyn ConversionDevice {
        self.dhw_device.as_ref()
    }

    pub fn pv(&self) -> &Pv {
        &self.pv
    }

    // ---- Derived series, steps 0..=time_step ----

    pub fn cooling_electricity_consumption(&self) -> &[f64] {
        self.cooling_electricity_consumption.up_to(self.time_step)
    }

    pub fn heating_electricity_consumption(&self) -> &[f64] {
        self.heating_electricity_consumption.up_to(self.time_step)
    }

    pub fn dhw_electricity_consumption(&self) -> &[f64] {
        self.dhw_electricity_consumption.up_to(self.time_step)
    }

    pub fn net_electricity_consumption(&self) -> &[f64] {
        self.net_electricity_consumption.up_to(self.time_step)
    }

    pub fn net_electricity_consumption_cost(&self) -> &[f64] {
        self.net_electricity_consumption_cost.up_to(self.time_step)
    }

    pub fn net_electricity_consumption_emission(&self) -> &[f64] {
        self.net_electricity_consumption_emission.up_to(self.time_step)
    }

    // ---- Spaces ----

    /// Raw observation bounds, one dimension per active observation
    pub fn observation_space(&self) -> BoxSpace {
        self.observation_limits.to_box_space()
    }

    /// `[0, 1]` per normalized channel
    pub fn normalized_observation_space(&self) -> BoxSpace {
        BoxSpace::unit(self.normalized_observation_limits.len())
    }

    pub fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    /// Cached bounds; the normalized layout splits cyclic features into sine and cosine
    pub fn observation_limits(&self, normalize: bool) -> &ObservationLimits {
        if normalize {
            &self.normalized_observation_limits
        } else {
            &self.observation_limits
        }
    }

    /// Re-run bound estimation without touching the cache
    pub fn estimate_observation_limits(&self, normalize: bool) -> Result<ObservationLimits> {
        self.estimator().observation_limits(&self.observations, normalize)
    }

    pub fn estimate_action_space(&self) -> BoxSpace {
        self.estimator().action_space(&self.actions)
    }

    pub fn device_ratings(&self) -> DeviceRatings {
        let storage = |tank: &StorageTank| StorageRating {
            capacity: tank.capacity(),
            efficiency: tank.efficiency(),
        };
        DeviceRatings {
            cooling_storage: storage(&self.cooling_storage),
            heating_storage: storage(&self.heating_storage),
            dhw_storage: storage(&self.dhw_storage),
            battery: BatteryRating {
                capacity: self.electrical_storage.initial_capacity(),
                nominal_power: self.electrical_storage.nominal_power(),
                initial_efficiency: self.electrical_storage.initial_efficiency(),
            },
        }
    }

    fn estimator(&self) -> SpaceEstimator<'_> {
        SpaceEstimator::new(
            &self.context,
            self.device_ratings(),
            &self.pv_output,
            self.observation_epsilon,
        )
    }

    // ---- Observations ----

    /// Active observations at the current step.
    ///
    /// With `normalize`, cyclic features become `<key>_cos` / `<key>_sin` and every value
    /// is min-max scaled against the normalized bounds. Net consumption bounds are loose,
    /// so its scaled value can stray slightly outside `[0, 1]`.
    pub fn observations(&self, normalize: bool) -> IndexMap<String, f64> {
        let mut out = IndexMap::with_capacity(self.normalized_observation_limits.len());

        for feature in &self.observations {
            let key = feature.key;
            let value = self.observation_value(key);

            match (normalize, feature.kind) {
                (false, _) => {
                    out.insert(key.to_string(), value);
                }
                (true, FeatureKind::Cyclic { period }) => {
                    let (sin, cos) = periodic(value, f64::from(period));
                    for (name, x) in [(format!("{key}_cos"), cos), (format!("{key}_sin"), sin)] {
                        let scaled = self.scale(&name, x);
                        out.insert(name, scaled);
                    }
                }
                (true, _) => {
                    let name = key.to_string();
                    let scaled = self.scale(&name, value);
                    out.insert(name, scaled);
                }
            }
        }
        out
    }

    /// Observation values in active order
    pub fn observation_vector(&self, normalize: bool) -> Vec<f64> {
        self.observations(normalize).into_values().collect()
    }

    fn scale(&self, name: &str, x: f64) -> f64 {
        debug_assert!(
            self.normalized_observation_limits.get(name).is_some(),
            "no normalized limits for observation {name}"
        );
        match self.normalized_observation_limits.get(name) {
            Some((low, high)) => min_max(x, low, high),
            None => x,
        }
    }

    fn observation_value(&self, key: ObservationKey) -> f64 {
        let t = self.time_step;
        match key {
            ObservationKey::CoolingStorageSoc => {
                soc_fraction(self.cooling_storage.soc_at(t), self.cooling_storage.capacity())
            }
            ObservationKey::HeatingStorageSoc => {
                soc_fraction(self.heating_storage.soc_at(t), self.heating_storage.capacity())
            }
            ObservationKey::DhwStorageSoc => {
                soc_fraction(self.dhw_storage.soc_at(t), self.dhw_storage.capacity())
            }
            ObservationKey::ElectricalStorageSoc => soc_fraction(
                self.electrical_storage.soc_at(t),
                self.electrical_storage.initial_capacity(),
            ),
            ObservationKey::NetElectricityConsumption => self.net_electricity_consumption.get(t),
            ObservationKey::SolarGeneration => self.pv_output[t],
            _ => self.context.value(key, t),
        }
    }

    // ---- Stepping ----

    /// Apply fractional charge actions for the current step.
    ///
    /// `None` and NaN mean no action. Thermal stores are clamped to
    /// `[-space_demand, max_output - space_demand]`; the battery enforces its own
    /// power limit. The effect shows up in the next step's observations.
    /// Applying again before advancing replaces the earlier actions.
    pub fn apply_actions(
        &mut self,
        cooling_storage: Option<f64>,
        heating_storage: Option<f64>,
        dhw_storage: Option<f64>,
        electrical_storage: Option<f64>,
    ) {
        let t = self.time_step;
        let cooling_conditions = self.context.operating_conditions(t, ThermalMode::Cooling);
        let heating_conditions = self.context.operating_conditions(t, ThermalMode::Heating);

        charge_thermal(
            ActionKey::CoolingStorage,
            &mut self.cooling_storage,
            self.cooling_device.as_mut(),
            sanitize_action(cooling_storage),
            self.context.value(ObservationKey::CoolingDemand, t),
            &cooling_conditions,
        );
        charge_thermal(
            ActionKey::HeatingStorage,
            &mut self.heating_storage,
            self.heating_device.as_mut(),
            sanitize_action(heating_storage),
            self.context.value(ObservationKey::HeatingDemand, t),
            &heating_conditions,
        );
        charge_thermal(
            ActionKey::DhwStorage,
            &mut self.dhw_storage,
            self.dhw_device.as_mut(),
            sanitize_action(dhw_storage),
            self.context.value(ObservationKey::DhwDemand, t),
            &heating_conditions,
        );

        let battery_energy = sanitize_action(electrical_storage) * self.electrical_storage.capacity();
        self.electrical_storage.charge(battery_energy);
    }

    /// Apply an action vector laid out in active-action order
    pub fn apply_action_vector(&mut self, actions: &[f64]) -> Result<()> {
        if actions.len() != self.actions.len() {
            return Err(SimulationError::ActionDimension {
                expected: self.actions.len(),
                actual: actions.len(),
            });
        }

        let mut named = [None; 4];
        for (key, value) in self.actions.iter().zip(actions) {
            named[*key as usize] = Some(*value);
        }
        let [cooling, heating, dhw, electrical] = named;
        self.apply_actions(cooling, heating, dhw, electrical);
        Ok(())
    }

    /// Advance every device, then the building, then derive the new step's series
    pub fn next_time_step(&mut self) -> Result<()> {
        if self.time_step + 1 >= self.horizon() {
            return Err(SimulationError::EpisodeEnded(self.time_step));
        }

        for_each_device!(self, next_time_step());
        self.time_step += 1;
        self.update_variables();

        debug!(
            building = %self.name,
            time_step = self.time_step,
            net_electricity_consumption = self.net_electricity_consumption.get(self.time_step),
            "Advanced time step"
        );
        Ok(())
    }

    /// Return every device and derived series to the state at step 0
    pub fn reset(&mut self) {
        for_each_device!(self, reset());
        self.time_step = 0;

        self.solar_generation = self
            .pv
            .get_generation(&self.context.energy_simulation().solar_generation);
        self.pv_output = self.solar_generation.iter().map(|g| g.abs()).collect();

        for series in [
            &mut self.cooling_electricity_consumption,
            &mut self.heating_electricity_consumption,
            &mut self.dhw_electricity_consumption,
            &mut self.net_electricity_consumption,
            &mut self.net_electricity_consumption_cost,
            &mut self.net_electricity_consumption_emission,
        ] {
            series.clear();
        }
        self.update_variables();

        debug!(building = %self.name, "Building reset");
    }

    /// Recompute consumption, cost and emission at the current step
    fn update_variables(&mut self) {
        let t = self.time_step;
        let context = Arc::clone(&self.context);
        let cooling_conditions = context.operating_conditions(t, ThermalMode::Cooling);
        let heating_conditions = context.operating_conditions(t, ThermalMode::Heating);

        let cooling = self.cooling_device.get_input_power(
            context.value(ObservationKey::CoolingDemand, t) + self.cooling_storage.energy_balance_at(t),
            &cooling_conditions,
        );
        let heating = self.heating_device.get_input_power(
            context.value(ObservationKey::HeatingDemand, t) + self.heating_storage.energy_balance_at(t),
            &heating_conditions,
        );
        let dhw = self.dhw_device.get_input_power(
            context.value(ObservationKey::DhwDemand, t) + self.dhw_storage.energy_balance_at(t),
            &heating_conditions,
        );

        let net = cooling
            + heating
            + dhw
            + self.electrical_storage.electricity_consumption_at(t)
            + context.value(ObservationKey::NonShiftableLoad, t)
            + self.solar_generation[t];
        let cost = net * context.value(ObservationKey::ElectricityPricing, t);
        let emission = (net * context.value(ObservationKey::CarbonIntensity, t)).max(0.0);

        self.cooling_electricity_consumption.set(t, cooling);
        self.heating_electricity_consumption.set(t, heating);
        self.dhw_electricity_consumption.set(t, dhw);
        self.net_electricity_consumption.set(t, net);
        self.net_electricity_consumption_cost.set(t, cost);
        self.net_electricity_consumption_emission.set(t, emission);
    }

    /// Re-estimate spaces after a device change, then reset
    fn refresh(&mut self) -> Result<()> {
        self.reset();
        let estimator = self.estimator();
        let observation_limits = estimator.observation_limits(&self.observations, false)?;
        let normalized_observation_limits = estimator.observation_limits(&self.observations, true)?;
        let action_space = estimator.action_space(&self.actions);

        self.observation_limits = observation_limits;
        self.normalized_observation_limits = normalized_observation_limits;
        self.action_space = action_space;
        Ok(())
    }
}

impl fmt::Debug for Building {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Building")
            .field("name", &self.name)
            .field("time_step", &self.time_step)
            .field("horizon", &self.horizon())
            .field("observations", &self.observations)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}
