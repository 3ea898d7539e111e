//! Typed observation and action keys.
//!
//! Metadata arrives as ordered `name -> active` mappings. Names are parsed once into
//! [`ObservationKey`] / [`ActionKey`] and tagged with a [`FeatureKind`], so stepping never
//! compares strings.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{Result, SimulationError};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr, Display, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ObservationKey {
    Month,
    Hour,
    DayType,
    DaylightSavingsStatus,
    IndoorDryBulbTemperature,
    AverageUnmetCoolingSetpointDifference,
    IndoorRelativeHumidity,
    NonShiftableLoad,
    DhwDemand,
    CoolingDemand,
    HeatingDemand,
    SolarGeneration,
    OutdoorDryBulbTemperature,
    OutdoorRelativeHumidity,
    DiffuseSolarIrradiance,
    DirectSolarIrradiance,
    #[strum(to_string = "outdoor_dry_bulb_temperature_predicted_6h")]
    #[serde(rename = "outdoor_dry_bulb_temperature_predicted_6h")]
    OutdoorDryBulbTemperaturePredicted6h,
    #[strum(to_string = "outdoor_dry_bulb_temperature_predicted_12h")]
    #[serde(rename = "outdoor_dry_bulb_temperature_predicted_12h")]
    OutdoorDryBulbTemperaturePredicted12h,
    #[strum(to_string = "outdoor_dry_bulb_temperature_predicted_24h")]
    #[serde(rename = "outdoor_dry_bulb_temperature_predicted_24h")]
    OutdoorDryBulbTemperaturePredicted24h,
    #[strum(to_string = "outdoor_relative_humidity_predicted_6h")]
    #[serde(rename = "outdoor_relative_humidity_predicted_6h")]
    OutdoorRelativeHumidityPredicted6h,
    #[strum(to_string = "outdoor_relative_humidity_predicted_12h")]
    #[serde(rename = "outdoor_relative_humidity_predicted_12h")]
    OutdoorRelativeHumidityPredicted12h,
    #[strum(to_string = "outdoor_relative_humidity_predicted_24h")]
    #[serde(rename = "outdoor_relative_humidity_predicted_24h")]
    OutdoorRelativeHumidityPredicted24h,
    #[strum(to_string = "diffuse_solar_irradiance_predicted_6h")]
    #[serde(rename = "diffuse_solar_irradiance_predicted_6h")]
    DiffuseSolarIrradiancePredicted6h,
    #[strum(to_string = "diffuse_solar_irradiance_predicted_12h")]
    #[serde(rename = "diffuse_solar_irradiance_predicted_12h")]
    DiffuseSolarIrradiancePredicted12h,
    #[strum(to_string = "diffuse_solar_irradiance_predicted_24h")]
    #[serde(rename = "diffuse_solar_irradiance_predicted_24h")]
    DiffuseSolarIrradiancePredicted24h,
    #[strum(to_string = "direct_solar_irradiance_predicted_6h")]
    #[serde(rename = "direct_solar_irradiance_predicted_6h")]
    DirectSolarIrradiancePredicted6h,
    #[strum(to_string = "direct_solar_irradiance_predicted_12h")]
    #[serde(rename = "direct_solar_irradiance_predicted_12h")]
    DirectSolarIrradiancePredicted12h,
    #[strum(to_string = "direct_solar_irradiance_predicted_24h")]
    #[serde(rename = "direct_solar_irradiance_predicted_24h")]
    DirectSolarIrradiancePredicted24h,
    ElectricityPricing,
    #[strum(to_string = "electricity_pricing_predicted_6h")]
    #[serde(rename = "electricity_pricing_predicted_6h")]
    ElectricityPricingPredicted6h,
    #[strum(to_string = "electricity_pricing_predicted_12h")]
    #[serde(rename = "electricity_pricing_predicted_12h")]
    ElectricityPricingPredicted12h,
    #[strum(to_string = "electricity_pricing_predicted_24h")]
    #[serde(rename = "electricity_pricing_predicted_24h")]
    ElectricityPricingPredicted24h,
    CarbonIntensity,
    CoolingStorageSoc,
    HeatingStorageSoc,
    DhwStorageSoc,
    ElectricalStorageSoc,
    NetElectricityConsumption,
}

/// How an observation is bounded and normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Periodic value over `1..=period`; expands into sine and cosine channels when normalized
    Cyclic { period: u32 },
    /// Fraction of a capacity, always within `[0, 1]`
    Fractional01,
    /// Bounded by `[-M, M]` from a worst-case estimate
    SymmetricBounded,
    /// Bounded by the min/max of its own series
    RawBounded,
}

impl ObservationKey {
    pub fn kind(self) -> FeatureKind {
        match self.periodic_domain() {
            Some(domain) => FeatureKind::Cyclic {
                period: *domain.end(),
            },
            None => match self {
                Self::CoolingStorageSoc
                | Self::HeatingStorageSoc
                | Self::DhwStorageSoc
                | Self::ElectricalStorageSoc => FeatureKind::Fractional01,
                Self::NetElectricityConsumption => FeatureKind::SymmetricBounded,
                _ => FeatureKind::RawBounded,
            },
        }
    }

    /// Legal values of a cyclic observation
    pub fn periodic_domain(self) -> Option<RangeInclusive<u32>> {
        match self {
            Self::Hour => Some(1..=24),
            Self::DayType => Some(1..=8),
            Self::Month => Some(1..=12),
            _ => None,
        }
    }

    /// Whether the value comes from building state rather than the context
    pub fn is_building_state(self) -> bool {
        matches!(
            self.kind(),
            FeatureKind::Fractional01 | FeatureKind::SymmetricBounded
        )
    }
}

/// Resolved observation: key plus its normalization kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationFeature {
    pub key: ObservationKey,
    pub kind: FeatureKind,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr, Display, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionKey {
    CoolingStorage,
    HeatingStorage,
    DhwStorage,
    ElectricalStorage,
}

/// Parse the active entries of an observation metadata mapping, in order
pub fn resolve_observations(metadata: &IndexMap<String, bool>) -> Result<Vec<ObservationFeature>> {
    let (known, unknown) = resolve(metadata, ObservationKey::from_str);
    if !unknown.is_empty() {
        return Err(SimulationError::UnknownObservations(unknown));
    }
    Ok(known
        .into_iter()
        .map(|key| ObservationFeature {
            key,
            kind: key.kind(),
        })
        .collect())
}

/// Parse the active entries of an action metadata mapping, in order
pub fn resolve_actions(metadata: &IndexMap<String, bool>) -> Result<Vec<ActionKey>> {
    let (known, unknown) = resolve(metadata, ActionKey::from_str);
    if !unknown.is_empty() {
        return Err(SimulationError::UnknownActions(unknown));
    }
    Ok(known)
}

/// Metadata with every listed name active
pub fn all_active<I, S>(names: I) -> IndexMap<String, bool>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(|n| (n.into(), true)).collect()
}

fn resolve<K, E>(
    metadata: &IndexMap<String, bool>,
    parse: impl Fn(&str) -> std::result::Result<K, E>,
) -> (Vec<K>, Vec<String>) {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for name in metadata.iter().filter(|(_, active)| **active).map(|(n, _)| n) {
        match parse(name) {
            Ok(key) => known.push(key),
            Err(_) => unknown.push(name.clone()),
        }
    }
    (known, unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_names_round_trip() {
        for key in ObservationKey::iter() {
            assert_eq!(ObservationKey::from_str(key.as_ref()).unwrap(), key);
        }
        assert_eq!(
            ObservationKey::ElectricityPricingPredicted24h.as_ref(),
            "electricity_pricing_predicted_24h"
        );
        assert_eq!(ObservationKey::DayType.as_ref(), "day_type");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ObservationKey::Hour.kind(), FeatureKind::Cyclic { period: 24 });
        assert_eq!(ObservationKey::DayType.kind(), FeatureKind::Cyclic { period: 8 });
        assert_eq!(ObservationKey::DhwStorageSoc.kind(), FeatureKind::Fractional01);
        assert_eq!(
            ObservationKey::NetElectricityConsumption.kind(),
            FeatureKind::SymmetricBounded
        );
        assert_eq!(ObservationKey::CarbonIntensity.kind(), FeatureKind::RawBounded);
    }

    #[test]
    fn test_inactive_entries_are_skipped() {
        let mut metadata = all_active(["hour", "month"]);
        metadata.insert("bogus".into(), false);

        let features = resolve_observations(&metadata).unwrap();
        let keys: Vec<_> = features.iter().map(|f| f.key).collect();
        assert_eq!(keys, vec![ObservationKey::Hour, ObservationKey::Month]);
    }

    #[test]
    fn test_unknown_active_entries_are_reported() {
        let metadata = all_active(["hour", "bogus", "also_bogus"]);
        let err = resolve_observations(&metadata).unwrap_err();

        assert_eq!(
            err,
            SimulationError::UnknownObservations(vec!["bogus".into(), "also_bogus".into()])
        );
    }

    #[test]
    fn test_actions_resolve_in_order() {
        let metadata = all_active(["electrical_storage", "dhw_storage"]);
        assert_eq!(
            resolve_actions(&metadata).unwrap(),
            vec![ActionKey::ElectricalStorage, ActionKey::DhwStorage]
        );
        assert!(resolve_actions(&all_active(["battery"])).is_err());
    }
}
