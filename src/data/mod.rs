//! # Environmental Context
//!
//! Read-only time series a building is simulated against: temporal features, exogenous
//! demand per end use, weather, pricing and carbon intensity. A [`Context`] is built once,
//! validated against a single horizon and shared between buildings through `Arc`.

pub mod synthetic;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::energy_model::{OperatingConditions, ThermalMode};
use crate::error::{Result, SimulationError};
use crate::features::ObservationKey;

/// Building-level series: calendar features, indoor conditions and demand per end use
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergySimulation {
    pub month: Vec<f64>,
    pub hour: Vec<f64>,
    pub day_type: Vec<f64>,
    pub daylight_savings_status: Vec<f64>,
    pub indoor_dry_bulb_temperature: Vec<f64>,
    pub average_unmet_cooling_setpoint_difference: Vec<f64>,
    pub indoor_relative_humidity: Vec<f64>,
    /// kWh per step
    pub non_shiftable_load: Vec<f64>,
    pub dhw_demand: Vec<f64>,
    pub cooling_demand: Vec<f64>,
    pub heating_demand: Vec<f64>,
    /// Inverter AC output in W per installed kW of PV
    pub solar_generation: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weather {
    pub outdoor_dry_bulb_temperature: Vec<f64>,
    pub outdoor_relative_humidity: Vec<f64>,
    pub diffuse_solar_irradiance: Vec<f64>,
    pub direct_solar_irradiance: Vec<f64>,
    pub outdoor_dry_bulb_temperature_predicted_6h: Vec<f64>,
    pub outdoor_dry_bulb_temperature_predicted_12h: Vec<f64>,
    pub outdoor_dry_bulb_temperature_predicted_24h: Vec<f64>,
    pub outdoor_relative_humidity_predicted_6h: Vec<f64>,
    pub outdoor_relative_humidity_predicted_12h: Vec<f64>,
    pub outdoor_relative_humidity_predicted_24h: Vec<f64>,
    pub diffuse_solar_irradiance_predicted_6h: Vec<f64>,
    pub diffuse_solar_irradiance_predicted_12h: Vec<f64>,
    pub diffuse_solar_irradiance_predicted_24h: Vec<f64>,
    pub direct_solar_irradiance_predicted_6h: Vec<f64>,
    pub direct_solar_irradiance_predicted_12h: Vec<f64>,
    pub direct_solar_irradiance_predicted_24h: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    /// Price per kWh
    pub electricity_pricing: Vec<f64>,
    pub electricity_pricing_predicted_6h: Vec<f64>,
    pub electricity_pricing_predicted_12h: Vec<f64>,
    pub electricity_pricing_predicted_24h: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonIntensity {
    /// kg CO2 per kWh
    pub carbon_intensity: Vec<f64>,
}

/// Validated environment for one episode
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    energy_simulation: EnergySimulation,
    weather: Weather,
    pricing: Pricing,
    carbon_intensity: CarbonIntensity,
    horizon: usize,
}

impl Context {
    /// Validate and assemble a context.
    ///
    /// The horizon is the length of `hour`. Series every building needs must cover it
    /// exactly; optional series may be empty. Missing pricing or carbon intensity
    /// defaults to zero at every step.
    pub fn new(
        energy_simulation: EnergySimulation,
        weather: Weather,
        pricing: Option<Pricing>,
        carbon_intensity: Option<CarbonIntensity>,
    ) -> Result<Self> {
        let horizon = energy_simulation.hour.len();
        if horizon == 0 {
            return Err(SimulationError::EmptyHorizon);
        }

        let pricing = pricing.unwrap_or_else(|| Pricing {
            electricity_pricing: vec![0.0; horizon],
            ..Default::default()
        });
        let carbon_intensity = carbon_intensity.unwrap_or_else(|| CarbonIntensity {
            carbon_intensity: vec![0.0; horizon],
        });

        let context = Self {
            energy_simulation,
            weather,
            pricing,
            carbon_intensity,
            horizon,
        };
        context.validate()?;
        Ok(context)
    }

    fn validate(&self) -> Result<()> {
        for key in ObservationKey::iter().filter(|k| !k.is_building_state()) {
            let Some(series) = self.series(key) else {
                continue;
            };
            let required = Self::is_required(key);
            if series.is_empty() && !required {
                continue;
            }
            if series.len() != self.horizon {
                return Err(SimulationError::HorizonMismatch {
                    name: key.to_string(),
                    expected: self.horizon,
                    actual: series.len(),
                });
            }
        }
        Ok(())
    }

    fn is_required(key: ObservationKey) -> bool {
        matches!(
            key,
            ObservationKey::Month
                | ObservationKey::Hour
                | ObservationKey::DayType
                | ObservationKey::NonShiftableLoad
                | ObservationKey::DhwDemand
                | ObservationKey::CoolingDemand
                | ObservationKey::HeatingDemand
                | ObservationKey::SolarGeneration
                | ObservationKey::OutdoorDryBulbTemperature
                | ObservationKey::ElectricityPricing
                | ObservationKey::CarbonIntensity
        )
    }

    /// Number of time steps in the episode
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn energy_simulation(&self) -> &EnergySimulation {
        &self.energy_simulation
    }

    pub fn weather(&self) -> &Weather {
        &self.weather
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    pub fn carbon_intensity(&self) -> &CarbonIntensity {
        &self.carbon_intensity
    }

    /// Full series backing a context observation.
    ///
    /// `None` for observations computed from building state; an empty slice for an
    /// optional series that was not provided.
    pub fn series(&self, key: ObservationKey) -> Option<&[f64]> {
        use ObservationKey::*;
        let es = &self.energy_simulation;
        let w = &self.weather;
        let p = &self.pricing;

        let series: &[f64] = match key {
            Month => &es.month,
            Hour => &es.hour,
            DayType => &es.day_type,
            DaylightSavingsStatus => &es.daylight_savings_status,
            IndoorDryBulbTemperature => &es.indoor_dry_bulb_temperature,
            AverageUnmetCoolingSetpointDifference => &es.average_unmet_cooling_setpoint_difference,
            IndoorRelativeHumidity => &es.indoor_relative_humidity,
            NonShiftableLoad => &es.non_shiftable_load,
            DhwDemand => &es.dhw_demand,
            CoolingDemand => &es.cooling_demand,
            HeatingDemand => &es.heating_demand,
            SolarGeneration => &es.solar_generation,
            OutdoorDryBulbTemperature => &w.outdoor_dry_bulb_temperature,
            OutdoorRelativeHumidity => &w.outdoor_relative_humidity,
            DiffuseSolarIrradiance => &w.diffuse_solar_irradiance,
            DirectSolarIrradiance => &w.direct_solar_irradiance,
            OutdoorDryBulbTemperaturePredicted6h => &w.outdoor_dry_bulb_temperature_predicted_6h,
            OutdoorDryBulbTemperaturePredicted12h => &w.outdoor_dry_bulb_temperature_predicted_12h,
            OutdoorDryBulbTemperaturePredicted24h => &w.outdoor_dry_bulb_temperature_predicted_24h,
            OutdoorRelativeHumidityPredicted6h => &w.outdoor_relative_humidity_predicted_6h,
            OutdoorRelativeHumidityPredicted12h => &w.outdoor_relative_humidity_predicted_12h,
            OutdoorRelativeHumidityPredicted24h => &w.outdoor_relative_humidity_predicted_24h,
            DiffuseSolarIrradiancePredicted6h => &w.diffuse_solar_irradiance_predicted_6h,
            DiffuseSolarIrradiancePredicted12h => &w.diffuse_solar_irradiance_predicted_12h,
            DiffuseSolarIrradiancePredicted24h => &w.diffuse_solar_irradiance_predicted_24h,
            DirectSolarIrradiancePredicted6h => &w.direct_solar_irradiance_predicted_6h,
            DirectSolarIrradiancePredicted12h => &w.direct_solar_irradiance_predicted_12h,
            DirectSolarIrradiancePredicted24h => &w.direct_solar_irradiance_predicted_24h,
            ElectricityPricing => &p.electricity_pricing,
            ElectricityPricingPredicted6h => &p.electricity_pricing_predicted_6h,
            ElectricityPricingPredicted12h => &p.electricity_pricing_predicted_12h,
            ElectricityPricingPredicted24h => &p.electricity_pricing_predicted_24h,
            ObservationKey::CarbonIntensity => &self.carbon_intensity.carbon_intensity,
            CoolingStorageSoc
            | HeatingStorageSoc
            | DhwStorageSoc
            | ElectricalStorageSoc
            | NetElectricityConsumption => return None,
        };
        Some(series)
    }

    /// Value of a context series at `time_step`; NaN and missing entries read as 0
    pub fn value(&self, key: ObservationKey, time_step: usize) -> f64 {
        self.series(key)
            .and_then(|s| s.get(time_step).copied())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    pub fn operating_conditions(&self, time_step: usize, mode: ThermalMode) -> OperatingConditions {
        OperatingConditions {
            outdoor_dry_bulb_temperature: self.value(ObservationKey::OutdoorDryBulbTemperature, time_step),
            mode,
        }
    }

    /// Operating conditions for every step of the horizon
    pub fn operating_conditions_series(&self, mode: ThermalMode) -> Vec<OperatingConditions> {
        (0..self.horizon)
            .map(|t| self.operating_conditions(t, mode))
            .collect()
    }
}
