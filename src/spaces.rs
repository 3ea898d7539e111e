//! # Space Estimation
//!
//! Static bounds for every active observation and action, computed once from the whole
//! horizon. Bounds never change during an episode; they are only re-estimated when a
//! device is resized.

use indexmap::IndexMap;
use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use crate::data::Context;
use crate::error::{Result, SimulationError};
use crate::features::{ActionKey, FeatureKind, ObservationFeature, ObservationKey};
use crate::preprocessing::periodic;

/// Axis-aligned box, one `[low, high]` pair per dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSpace {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl BoxSpace {
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Self {
        Self { low, high }
    }

    /// `[0, 1]` in every one of `len` dimensions
    pub fn unit(len: usize) -> Self {
        Self {
            low: vec![0.0; len],
            high: vec![1.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.low.is_empty()
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.len()
            && x
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    /// Clamp every component into the box
    pub fn clip(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.low.iter().zip(&self.high))
            .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
            .collect()
    }
}

/// Ordered `name -> (low, high)` bounds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationLimits {
    bounds: IndexMap<String, (f64, f64)>,
}

impl ObservationLimits {
    pub fn insert(&mut self, name: impl Into<String>, low: f64, high: f64) {
        self.bounds.insert(name.into(), (low, high));
    }

    pub fn get(&self, name: &str) -> Option<(f64, f64)> {
        self.bounds.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bounds.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64, f64)> {
        self.bounds.iter().map(|(k, (lo, hi))| (k.as_str(), *lo, *hi))
    }

    pub fn low(&self) -> Vec<f64> {
        self.bounds.values().map(|(lo, _)| *lo).collect()
    }

    pub fn high(&self) -> Vec<f64> {
        self.bounds.values().map(|(_, hi)| *hi).collect()
    }

    pub fn to_box_space(&self) -> BoxSpace {
        BoxSpace::new(self.low(), self.high())
    }

    fn widen(mut self, epsilon: f64) -> Self {
        for (lo, hi) in self.bounds.values_mut() {
            *lo -= epsilon;
            *hi += epsilon;
        }
        self
    }
}

/// Storage rating used for bound estimation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StorageRating {
    pub capacity: f64,
    pub efficiency: f64,
}

/// Battery rating used for bound estimation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryRating {
    pub capacity: f64,
    pub nominal_power: f64,
    pub initial_efficiency: f64,
}

/// Snapshot of a building's storage ratings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceRatings {
    pub cooling_storage: StorageRating,
    pub heating_storage: StorageRating,
    pub dhw_storage: StorageRating,
    pub battery: BatteryRating,
}

/// Pure bound estimator over a context and device ratings
#[derive(Debug, Clone, Copy)]
pub struct SpaceEstimator<'a> {
    context: &'a Context,
    ratings: DeviceRatings,
    /// PV output magnitude per step (non-negative)
    solar_generation: &'a [f64],
    epsilon: f64,
}

impl<'a> SpaceEstimator<'a> {
    pub fn new(
        context: &'a Context,
        ratings: DeviceRatings,
        solar_generation: &'a [f64],
        epsilon: f64,
    ) -> Self {
        Self {
            context,
            ratings,
            solar_generation,
            epsilon,
        }
    }

    /// Bounds for each active observation, widened by epsilon.
    ///
    /// With `normalize`, cyclic features contribute `<key>_cos` and `<key>_sin` entries
    /// instead of their own.
    pub fn observation_limits(
        &self,
        features: &[ObservationFeature],
        normalize: bool,
    ) -> Result<ObservationLimits> {
        let mut limits = ObservationLimits::default();

        for feature in features {
            let key = feature.key;
            match feature.kind {
                FeatureKind::SymmetricBounded => {
                    let m = self.net_consumption_bound();
                    limits.insert(key.as_ref(), -m, m);
                }
                FeatureKind::Fractional01 => limits.insert(key.as_ref(), 0.0, 1.0),
                FeatureKind::Cyclic { period } if normalize => {
                    let (sin, cos) = periodic_channel_bounds(key, period);
                    limits.insert(format!("{key}_cos"), cos.0, cos.1);
                    limits.insert(format!("{key}_sin"), sin.0, sin.1);
                }
                FeatureKind::Cyclic { .. } | FeatureKind::RawBounded => {
                    let (low, high) = self.series_bounds(key)?;
                    limits.insert(key.as_ref(), low, high);
                }
            }
        }

        Ok(limits.widen(self.epsilon))
    }

    /// Worst-case magnitude of net electricity consumption.
    ///
    /// Sums every demand, its storage round-trip loss and the battery's full draw, then
    /// removes PV output. Deliberately loose.
    pub fn net_consumption_bound(&self) -> f64 {
        let es = self.context.energy_simulation();
        let r = &self.ratings;
        let battery_draw = ratio(r.battery.nominal_power, r.battery.initial_efficiency);

        (0..self.context.horizon())
            .map(|t| {
                let nsl = finite_or_zero(es.non_shiftable_load.get(t));
                let dhw = finite_or_zero(es.dhw_demand.get(t));
                let cooling = finite_or_zero(es.cooling_demand.get(t));
                let heating = finite_or_zero(es.heating_demand.get(t));
                let pv = finite_or_zero(self.solar_generation.get(t));

                nsl + dhw
                    + cooling
                    + heating
                    + ratio(dhw, r.dhw_storage.efficiency)
                    + ratio(cooling, r.cooling_storage.efficiency)
                    + ratio(heating, r.heating_storage.efficiency)
                    + battery_draw
                    - pv
            })
            .map(f64::abs)
            .fold(0.0, f64::max)
    }

    /// Fraction-of-capacity bounds for each active action
    pub fn action_space(&self, actions: &[ActionKey]) -> BoxSpace {
        let es = self.context.energy_simulation();
        let (low, high): (Vec<f64>, Vec<f64>) = actions
            .iter()
            .map(|action| match action {
                ActionKey::ElectricalStorage => {
                    let battery = self.ratings.battery;
                    if battery.capacity > 0.0 {
                        let limit = battery.nominal_power / battery.capacity;
                        (-limit, limit)
                    } else {
                        (-1.0, 1.0)
                    }
                }
                ActionKey::CoolingStorage => {
                    thermal_action_bounds(&es.cooling_demand, self.ratings.cooling_storage.capacity)
                }
                ActionKey::HeatingStorage => {
                    thermal_action_bounds(&es.heating_demand, self.ratings.heating_storage.capacity)
                }
                ActionKey::DhwStorage => {
                    thermal_action_bounds(&es.dhw_demand, self.ratings.dhw_storage.capacity)
                }
            })
            .unzip();
        BoxSpace::new(low, high)
    }

    fn series_bounds(&self, key: ObservationKey) -> Result<(f64, f64)> {
        let series = match key {
            ObservationKey::SolarGeneration => Some(self.solar_generation),
            _ => self.context.series(key),
        };
        match series {
            Some(values) if !values.is_empty() => Ok(finite_min_max(values).unwrap_or((0.0, 0.0))),
            _ => Err(SimulationError::MissingSeries(key.to_string())),
        }
    }
}

/// Per-channel min/max of the sine and cosine images of every legal value
fn periodic_channel_bounds(key: ObservationKey, period: u32) -> ((f64, f64), (f64, f64)) {
    let domain = key.periodic_domain().unwrap_or(1..=period);
    let x_max = f64::from(period);
    let (sin, cos): (Vec<f64>, Vec<f64>) = domain.map(|x| periodic(f64::from(x), x_max)).unzip();
    (
        finite_min_max(&sin).unwrap_or((-1.0, 1.0)),
        finite_min_max(&cos).unwrap_or((-1.0, 1.0)),
    )
}

fn thermal_action_bounds(demand: &[f64], capacity: f64) -> (f64, f64) {
    if capacity <= 0.0 {
        return (-1.0, 1.0);
    }
    let max_demand = finite_min_max(demand).map_or(0.0, |(_, hi)| hi);
    let ratio = max_demand / capacity;
    ((-ratio).max(-1.0), ratio.min(1.0))
}

fn finite_min_max(values: &[f64]) -> Option<(f64, f64)> {
    match values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .minmax_by(|a, b| a.total_cmp(b))
    {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(v) => Some((v, v)),
        MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
    }
}

fn finite_or_zero(value: Option<&f64>) -> f64 {
    value.copied().filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EnergySimulation, Weather};
    use crate::features::{all_active, resolve_observations};
    use approx::assert_relative_eq;

    fn context() -> Context {
        let es = EnergySimulation {
            month: vec![1.0, 1.0, 2.0],
            hour: vec![1.0, 2.0, 3.0],
            day_type: vec![1.0, 1.0, 1.0],
            non_shiftable_load: vec![1.0, 3.0, 2.0],
            dhw_demand: vec![0.5, 1.0, 0.0],
            cooling_demand: vec![0.0, 0.0, 0.0],
            heating_demand: vec![2.0, f64::NAN, 4.0],
            solar_generation: vec![0.0, 0.0, 0.0],
            ..Default::default()
        };
        let weather = Weather {
            outdoor_dry_bulb_temperature: vec![1.0, -2.0, 3.0],
            ..Default::default()
        };
        Context::new(es, weather, None, None).unwrap()
    }

    fn ratings() -> DeviceRatings {
        DeviceRatings {
            heating_storage: StorageRating {
                capacity: 8.0,
                efficiency: 1.0,
            },
            battery: BatteryRating {
                capacity: 10.0,
                nominal_power: 5.0,
                initial_efficiency: 1.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_raw_limits_use_series_min_max() {
        let ctx = context();
        let estimator = SpaceEstimator::new(&ctx, ratings(), &[0.0; 3], 0.0);
        let features =
            resolve_observations(&all_active(["outdoor_dry_bulb_temperature", "hour"])).unwrap();

        let limits = estimator.observation_limits(&features, false).unwrap();
        assert_eq!(limits.get("outdoor_dry_bulb_temperature"), Some((-2.0, 3.0)));
        assert_eq!(limits.get("hour"), Some((1.0, 3.0)));
    }

    #[test]
    fn test_cyclic_features_expand_when_normalized() {
        let ctx = context();
        let estimator = SpaceEstimator::new(&ctx, ratings(), &[0.0; 3], 1e-6);
        let features = resolve_observations(&all_active(["hour", "electrical_storage_soc"])).unwrap();

        let limits = estimator.observation_limits(&features, true).unwrap();
        let names: Vec<_> = limits.names().collect();
        assert_eq!(names, vec!["hour_cos", "hour_sin", "electrical_storage_soc"]);

        let (lo, hi) = limits.get("hour_cos").unwrap();
        assert_relative_eq!(lo, -1.0 - 1e-6, epsilon = 1e-9);
        assert_relative_eq!(hi, 1.0 + 1e-6, epsilon = 1e-9);
        assert_eq!(limits.get("electrical_storage_soc"), Some((-1e-6, 1.0 + 1e-6)));
    }

    #[test]
    fn test_net_consumption_bound() {
        let ctx = context();
        let estimator = SpaceEstimator::new(&ctx, ratings(), &[0.0; 3], 0.0);

        // Step 2: 2 + 0 + 0 + 4 + 4/1 + 5/1
        assert_relative_eq!(estimator.net_consumption_bound(), 15.0);
    }

    #[test]
    fn test_action_bounds() {
        let ctx = context();
        let estimator = SpaceEstimator::new(&ctx, ratings(), &[0.0; 3], 0.0);

        let space = estimator.action_space(&[
            ActionKey::HeatingStorage,
            ActionKey::ElectricalStorage,
            ActionKey::DhwStorage,
        ]);
        assert_eq!(space.low, vec![-0.5, -0.5, -1.0]);
        assert_eq!(space.high, vec![0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_missing_series_is_an_error() {
        let ctx = context();
        let estimator = SpaceEstimator::new(&ctx, ratings(), &[0.0; 3], 0.0);
        let features = resolve_observations(&all_active(["indoor_relative_humidity"])).unwrap();

        assert_eq!(
            estimator.observation_limits(&features, false).unwrap_err(),
            SimulationError::MissingSeries("indoor_relative_humidity".into())
        );
    }

    #[test]
    fn test_box_space_clip_and_contains() {
        let space = BoxSpace::new(vec![-1.0, 0.0], vec![1.0, 0.5]);

        assert!(space.contains(&[0.0, 0.5]));
        assert!(!space.contains(&[0.0, 0.6]));
        assert_eq!(space.clip(&[-3.0, 0.7]), vec![-1.0, 0.5]);
    }
}
