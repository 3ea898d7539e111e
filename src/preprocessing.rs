//! # Feature Encoders
//!
//! Stateless transforms from raw observation values to agent inputs. The building uses
//! [`Encoder::PeriodicNormalization`] and [`Encoder::Normalize`] for its own normalized
//! observations; [`EncoderSet`] routes a full observation vector for agent-side use.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::features::{ObservationFeature, ObservationKey};
use crate::spaces::ObservationLimits;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Encoder {
    /// Pass the value through unchanged
    NoNormalization,
    /// Map a cyclic value onto the unit circle as `[sin, cos]`
    PeriodicNormalization { x_max: f64 },
    /// One channel per class, 1.0 on the matching class
    OnehotEncoding { classes: Vec<f64> },
    /// Min-max scale into `[0, 1]`
    Normalize { x_min: f64, x_max: f64 },
    /// Drop the feature
    RemoveFeature,
}

impl Encoder {
    pub fn periodic(x_max: f64) -> Self {
        Self::PeriodicNormalization { x_max }
    }

    pub fn normalize(x_min: f64, x_max: f64) -> Self {
        Self::Normalize { x_min, x_max }
    }

    pub fn onehot<I: IntoIterator<Item = f64>>(classes: I) -> Self {
        Self::OnehotEncoding {
            classes: classes.into_iter().collect(),
        }
    }

    /// Number of output channels
    pub fn width(&self) -> usize {
        match self {
            Self::NoNormalization | Self::Normalize { .. } => 1,
            Self::PeriodicNormalization { .. } => 2,
            Self::OnehotEncoding { classes } => classes.len(),
            Self::RemoveFeature => 0,
        }
    }

    pub fn encode(&self, x: f64) -> Vec<f64> {
        match self {
            Self::NoNormalization => vec![x],
            Self::PeriodicNormalization { x_max } => {
                let (sin, cos) = periodic(x, *x_max);
                vec![sin, cos]
            }
            Self::OnehotEncoding { classes } => classes
                .iter()
                .map(|c| if *c == x { 1.0 } else { 0.0 })
                .collect(),
            Self::Normalize { x_min, x_max } => vec![min_max(x, *x_min, *x_max)],
            Self::RemoveFeature => Vec::new(),
        }
    }

    /// Recover the raw value from encoded channels.
    ///
    /// Periodic values come back in `[0, x_max)`. Returns `None` for encoders without an
    /// inverse or when `encoded` has the wrong width.
    pub fn decode(&self, encoded: &[f64]) -> Option<f64> {
        match (self, encoded) {
            (Self::NoNormalization, [x]) => Some(*x),
            (Self::Normalize { x_min, x_max }, [y]) => Some(x_min + y * (x_max - x_min)),
            (Self::PeriodicNormalization { x_max }, [sin, cos]) => {
                let angle = sin.atan2(*cos).rem_euclid(2.0 * PI);
                Some((angle * x_max / (2.0 * PI)).rem_euclid(*x_max))
            }
            (Self::OnehotEncoding { classes }, channels) if channels.len() == classes.len() => channels
                .iter()
                .position(|c| *c == 1.0)
                .map(|i| classes[i]),
            _ => None,
        }
    }
}

/// `(sin, cos)` of `x` on a circle of circumference `x_max`
pub fn periodic(x: f64, x_max: f64) -> (f64, f64) {
    let angle = 2.0 * PI * x / x_max;
    (angle.sin(), angle.cos())
}

/// Min-max scale; degenerate bounds map to 0
pub fn min_max(x: f64, x_min: f64, x_max: f64) -> f64 {
    let range = x_max - x_min;
    if range == 0.0 || !range.is_finite() {
        0.0
    } else {
        (x - x_min) / range
    }
}

/// Encoders for an ordered list of observations
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSet {
    encoders: Vec<(ObservationKey, Encoder)>,
}

impl EncoderSet {
    /// Route each observation to an encoder using its raw (unnormalized) limits.
    ///
    /// `hour` and `month` are periodic, `day_type` and `daylight_savings_status` are
    /// one-hot, everything else is min-max normalized.
    pub fn for_observations(features: &[ObservationFeature], raw_limits: &ObservationLimits) -> Self {
        let encoders = features
            .iter()
            .map(|feature| {
                let key = feature.key;
                let (low, high) = raw_limits.get(key.as_ref()).unwrap_or((0.0, 1.0));
                let encoder = match key {
                    ObservationKey::Hour | ObservationKey::Month => Encoder::periodic(high),
                    ObservationKey::DayType => Encoder::onehot((1..=8).map(f64::from)),
                    ObservationKey::DaylightSavingsStatus => Encoder::onehot([0.0, 1.0]),
                    _ => Encoder::normalize(low, high),
                };
                (key, encoder)
            })
            .collect();
        Self { encoders }
    }

    pub fn from_encoders(encoders: Vec<(ObservationKey, Encoder)>) -> Self {
        Self { encoders }
    }

    /// Replace the encoder for `key`, e.g. to drop a feature
    pub fn with_encoder(mut self, key: ObservationKey, encoder: Encoder) -> Self {
        if let Some(entry) = self.encoders.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = encoder;
        }
        self
    }

    pub fn encoders(&self) -> &[(ObservationKey, Encoder)] {
        &self.encoders
    }

    /// Length of an encoded vector
    pub fn output_len(&self) -> usize {
        self.encoders.iter().map(|(_, e)| e.width()).sum()
    }

    /// Encode a raw observation vector laid out in the same order as the encoders
    pub fn encode(&self, observations: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.output_len());
        for ((_, encoder), x) in self.encoders.iter().zip(observations) {
            out.extend(encoder.encode(*x));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureKind;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_with_equal_bounds_is_zero() {
        assert_eq!(Encoder::normalize(3.0, 3.0).encode(3.0), vec![0.0]);
        assert_eq!(Encoder::normalize(3.0, 3.0).encode(10.0), vec![0.0]);
    }

    #[test]
    fn test_periodic_quarter_turn() {
        let encoded = Encoder::periodic(24.0).encode(6.0);
        assert_relative_eq!(encoded[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(encoded[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_onehot() {
        let encoder = Encoder::onehot((1..=8).map(f64::from));
        let encoded = encoder.encode(3.0);

        assert_eq!(encoded.len(), 8);
        assert_eq!(encoded[2], 1.0);
        assert_eq!(encoded.iter().sum::<f64>(), 1.0);
        assert_eq!(encoder.decode(&encoded), Some(3.0));
    }

    #[test]
    fn test_remove_feature_has_no_channels() {
        assert!(Encoder::RemoveFeature.encode(5.0).is_empty());
        assert_eq!(Encoder::RemoveFeature.decode(&[]), None);
    }

    #[test]
    fn test_encoder_set_routing() {
        let features: Vec<_> = [
            ObservationKey::Hour,
            ObservationKey::DayType,
            ObservationKey::DaylightSavingsStatus,
            ObservationKey::CarbonIntensity,
        ]
        .into_iter()
        .map(|key| ObservationFeature {
            key,
            kind: key.kind(),
        })
        .collect();
        assert_eq!(features[0].kind, FeatureKind::Cyclic { period: 24 });

        let mut limits = ObservationLimits::default();
        limits.insert("hour", 1.0, 24.0);
        limits.insert("day_type", 1.0, 8.0);
        limits.insert("daylight_savings_status", 0.0, 1.0);
        limits.insert("carbon_intensity", 0.1, 0.5);

        let set = EncoderSet::for_observations(&features, &limits);
        assert_eq!(set.output_len(), 2 + 8 + 2 + 1);

        let encoded = set.encode(&[6.0, 2.0, 1.0, 0.3]);
        assert_eq!(encoded.len(), 13);
        assert_relative_eq!(encoded[12], 0.5, epsilon = 1e-12);

        let trimmed = set.with_encoder(ObservationKey::DayType, Encoder::RemoveFeature);
        assert_eq!(trimmed.output_len(), 5);
    }

    proptest! {
        #[test]
        fn prop_normalize_round_trip(
            x in -1e4f64..1e4,
            low in -1e4f64..0.0,
            span in 1e-3f64..1e4,
        ) {
            let encoder = Encoder::normalize(low, low + span);
            let decoded = encoder.decode(&encoder.encode(x)).unwrap();
            prop_assert!((decoded - x).abs() <= 1e-6 * (1.0 + x.abs()));
        }

        #[test]
        fn prop_periodic_recovers_value_modulo_period(x in 0.0f64..1000.0, period in 1u32..=24) {
            let x_max = f64::from(period);
            let encoder = Encoder::periodic(x_max);
            let decoded = encoder.decode(&encoder.encode(x)).unwrap();

            let expected = x.rem_euclid(x_max);
            let diff = (decoded - expected).abs();
            // Values next to the wrap point may come back on the other side of it
            prop_assert!(diff < 1e-6 || (x_max - diff).abs() < 1e-6);
        }
    }
}
