//! # Synthetic Dataset
//!
//! Deterministic hourly context for a single-family house, generated from a seed:
//!
//! - clear-sky irradiance from solar position, attenuated by random cloud cover
//! - outdoor temperature from seasonal and diurnal sinusoids plus Gaussian noise
//! - heating and cooling demand from degree-hours against balance points
//! - domestic hot water from morning and evening draw peaks
//! - plug load from a time-of-day profile
//! - time-of-use pricing and a diurnal carbon intensity curve
//!
//! Predicted series are perfect foresight, held at the last value past the horizon.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Weekday};
use rand::rngs::StdRng;
use rand::distributions::WeightedIndex;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::info;
use validator::Validate;

use super::{CarbonIntensity, Context, EnergySimulation, Pricing, Weather};
use crate::error::{Result, SimulationError};

/// Generator settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Local time of the first step
    pub start: NaiveDateTime,
    /// Number of hourly steps
    #[validate(range(min = 1, max = 87_840))]
    pub hours: usize,
    pub seed: u64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude_deg: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude_deg: f64,
    /// Hours from UTC
    #[validate(range(min = -12, max = 14))]
    pub timezone_offset: i32,
    /// PV output per unit of plane irradiance (inverter and wiring losses)
    #[validate(range(min = 0.0, max = 1.0))]
    pub performance_ratio: f64,
    pub enable_clouds: bool,

    /// Household base load in kWh per step
    #[validate(range(min = 0.0))]
    pub base_load_kw: f64,
    #[validate(range(min = 1.0))]
    pub peak_multiplier: f64,
    /// Noise standard deviation as a fraction of the deterministic value
    #[validate(range(min = 0.0, max = 1.0))]
    pub noise_std_dev: f64,

    pub annual_mean_temperature: f64,
    #[validate(range(min = 0.0))]
    pub seasonal_amplitude: f64,
    #[validate(range(min = 0.0))]
    pub diurnal_amplitude: f64,
    pub heating_balance_point: f64,
    pub cooling_balance_point: f64,
    /// kWh per degree-hour below the heating balance point
    #[validate(range(min = 0.0))]
    pub heating_coefficient: f64,
    /// kWh per degree-hour above the cooling balance point
    #[validate(range(min = 0.0))]
    pub cooling_coefficient: f64,
    #[validate(range(min = 0.0))]
    pub dhw_daily_kwh: f64,

    #[validate(range(min = 0.0))]
    pub offpeak_price: f64,
    #[validate(range(min = 0.0))]
    pub peak_price: f64,
    /// Weekday hours (0-23) billed at the peak price, half-open
    pub peak_hours: (u32, u32),
    #[validate(range(min = 0.0))]
    pub carbon_intensity_mean: f64,
    #[validate(range(min = 0.0))]
    pub carbon_intensity_amplitude: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            hours: 24 * 7,
            seed: 42,
            latitude_deg: 59.3293, // Stockholm
            longitude_deg: 18.0686,
            timezone_offset: 1,
            performance_ratio: 0.85,
            enable_clouds: true,
            base_load_kw: 0.5,
            peak_multiplier: 4.0,
            noise_std_dev: 0.1,
            annual_mean_temperature: 7.0,
            seasonal_amplitude: 11.0,
            diurnal_amplitude: 4.0,
            heating_balance_point: 15.0,
            cooling_balance_point: 22.0,
            heating_coefficient: 0.25,
            cooling_coefficient: 0.3,
            dhw_daily_kwh: 6.0,
            offpeak_price: 0.12,
            peak_price: 0.38,
            peak_hours: (16, 21),
            carbon_intensity_mean: 0.25,
            carbon_intensity_amplitude: 0.08,
        }
    }
}

impl SyntheticConfig {
    pub fn with_hours(mut self, hours: usize) -> Self {
        self.hours = hours;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    pub fn with_clouds(mut self, enable: bool) -> Self {
        self.enable_clouds = enable;
        self
    }
}

/// Relative frequency of each cloud amount, 0 to 8 oktas
const OKTA_WEIGHTS: [u32; 9] = [14, 10, 8, 8, 8, 9, 11, 15, 17];

/// Cloud amount in eighths of the sky
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Oktas(u8);

impl Oktas {
    pub fn new(oktas: u8) -> Self {
        Self(oktas.min(8))
    }

    pub fn fraction(self) -> f64 {
        f64::from(self.0) / 8.0
    }

    /// Kasten-Czeplak attenuation of global irradiance
    pub fn attenuation(self) -> f64 {
        1.0 - 0.75 * self.fraction().powf(3.4)
    }

    /// Share of global irradiance arriving as diffuse light
    pub fn diffuse_fraction(self) -> f64 {
        0.15 + 0.8 * self.fraction()
    }
}

/// Solar geometry and Haurwitz clear-sky irradiance for a fixed site
#[derive(Debug, Clone, Copy)]
pub struct ClearSkyModel {
    latitude: f64,
    longitude_deg: f64,
    timezone_offset: i32,
}

impl ClearSkyModel {
    pub fn new(latitude_deg: f64, longitude_deg: f64, timezone_offset: i32) -> Self {
        Self {
            latitude: latitude_deg.to_radians(),
            longitude_deg,
            timezone_offset,
        }
    }

    /// Cosine of the solar zenith angle, negative below the horizon.
    ///
    /// Declination and equation of time use Spencer's Fourier series in the fractional year.
    pub fn cos_zenith(&self, time: NaiveDateTime) -> f64 {
        let clock_hours = f64::from(time.hour()) + f64::from(time.minute()) / 60.0;
        let gamma = 2.0 * PI / 365.0 * (f64::from(time.ordinal0()) + (clock_hours - 12.0) / 24.0);
        let (s1, c1) = gamma.sin_cos();
        let (s2, c2) = (2.0 * gamma).sin_cos();
        let (s3, c3) = (3.0 * gamma).sin_cos();

        let declination = 0.006918 - 0.399912 * c1 + 0.070257 * s1 - 0.006758 * c2
            + 0.000907 * s2
            - 0.002697 * c3
            + 0.00148 * s3;
        let equation_of_time_min =
            229.18 * (0.000075 + 0.001868 * c1 - 0.032077 * s1 - 0.014615 * c2 - 0.040849 * s2);

        let offset_min = equation_of_time_min + 4.0 * self.longitude_deg
            - 60.0 * f64::from(self.timezone_offset);
        let true_solar_min = clock_hours * 60.0 + offset_min;
        let hour_angle = (true_solar_min / 4.0 - 180.0).to_radians();

        (self.latitude.sin() * declination.sin()
            + self.latitude.cos() * declination.cos() * hour_angle.cos())
        .clamp(-1.0, 1.0)
    }

    /// Solar elevation in degrees above the horizon
    pub fn solar_elevation(&self, time: NaiveDateTime) -> f64 {
        self.cos_zenith(time).asin().to_degrees()
    }

    /// Global horizontal irradiance under a clear sky in W/m²
    pub fn clear_sky_irradiance(&self, time: NaiveDateTime) -> f64 {
        let mu = self.cos_zenith(time);
        if mu <= 0.0 {
            return 0.0;
        }
        1098.0 * mu * (-0.057 / mu).exp()
    }
}

/// Fixed-date public holidays (Swedish calendar)
pub fn is_public_holiday(date: NaiveDate) -> bool {
    matches!(
        (date.month(), date.day()),
        (1, 1) | (1, 6) | (5, 1) | (6, 6) | (12, 24) | (12, 25) | (12, 26) | (12, 31)
    )
}

/// Day type 1..=7 from Monday, 8 on public holidays
pub fn day_type(date: NaiveDate) -> u32 {
    if is_public_holiday(date) {
        8
    } else {
        date.weekday().number_from_monday()
    }
}

/// Hour of day 1..=24, where 24 is midnight
pub fn hour_of_day(time: NaiveDateTime) -> u32 {
    match time.hour() {
        0 => 24,
        h => h,
    }
}

/// European summer time: last Sunday of March to last Sunday of October
pub fn is_daylight_saving(date: NaiveDate) -> bool {
    let (Some(start), Some(end)) = (
        last_sunday(date.year(), 3),
        last_sunday(date.year(), 10),
    ) else {
        return false;
    };
    date >= start && date < end
}

fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?;
    let back = last.weekday().num_days_from_sunday() as i64;
    Some(last - Duration::days(back))
}

/// Plug load multiplier over the base load for a given local time
fn tod_multiplier(time: NaiveDateTime, peak_multiplier: f64) -> f64 {
    let hour = time.hour() as f64;
    let is_weekend = matches!(time.weekday(), Weekday::Sat | Weekday::Sun);

    let base = if hour < 6.0 {
        0.5
    } else if hour < 9.0 {
        2.5 + (hour - 6.0) * 0.5
    } else if hour < 16.0 {
        1.0
    } else if hour < 21.0 {
        3.5 + (hour - 16.0) * 0.3
    } else {
        4.0 - (hour - 21.0) * 0.5
    };

    let multiplier = match (is_weekend, hour) {
        (true, h) if h < 9.0 => base * 0.7,
        (true, h) if h < 22.0 => base * 1.2,
        _ => base,
    };
    multiplier.min(peak_multiplier)
}

/// Share of the daily hot water draw falling in each hour
fn dhw_profile(hour: u32) -> f64 {
    const WEIGHTS: [f64; 24] = [
        0.2, 0.1, 0.1, 0.1, 0.2, 0.6, 2.5, 3.0, 2.0, 1.0, 0.8, 0.8, //
        1.0, 0.8, 0.6, 0.6, 0.8, 1.2, 2.0, 2.5, 2.2, 1.5, 0.8, 0.4,
    ];
    let total: f64 = WEIGHTS.iter().sum();
    WEIGHTS[(hour % 24) as usize] / total
}

fn outdoor_temperature(config: &SyntheticConfig, time: NaiveDateTime) -> f64 {
    // Coldest around 20 January, warmest around 20 July; daily minimum near 05:00
    let day = time.ordinal() as f64;
    let seasonal = -(2.0 * PI * (day - 20.0) / 365.0).cos();
    let hour = time.hour() as f64;
    let diurnal = -(2.0 * PI * (hour - 5.0) / 24.0).cos();
    config.annual_mean_temperature
        + config.seasonal_amplitude * seasonal
        + config.diurnal_amplitude * diurnal
}

fn noise(rng: &mut StdRng, std_dev: f64) -> Result<f64> {
    if std_dev <= 0.0 {
        return Ok(0.0);
    }
    let normal = Normal::new(0.0, std_dev)
        .map_err(|e| SimulationError::InvalidDataset(format!("noise distribution: {e}")))?;
    Ok(normal.sample(rng))
}

/// Values shifted `hours` ahead, holding the final value past the end
fn predicted(series: &[f64], hours: usize) -> Vec<f64> {
    let last = series.len().saturating_sub(1);
    (0..series.len())
        .map(|t| series[(t + hours).min(last)])
        .collect()
}

/// Generate a complete context from `config`
pub fn generate(config: &SyntheticConfig) -> Result<Context> {
    config
        .validate()
        .map_err(|e| SimulationError::InvalidDataset(e.to_string()))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let sky = ClearSkyModel::new(config.latitude_deg, config.longitude_deg, config.timezone_offset);

    let mut es = EnergySimulation::default();
    let mut weather = Weather::default();
    let mut pricing = Pricing::default();
    let mut carbon = CarbonIntensity::default();

    let okta_distribution = WeightedIndex::new(OKTA_WEIGHTS)
        .map_err(|e| SimulationError::InvalidDataset(e.to_string()))?;
    let mut clouds = Oktas::default();
    let mut cloud_hours_left = 0_u32;

    for step in 0..config.hours {
        let time = config.start + Duration::hours(step as i64);
        let date = time.date();
        let hour = time.hour();

        es.month.push(time.month() as f64);
        es.hour.push(hour_of_day(time) as f64);
        es.day_type.push(day_type(date) as f64);
        es.daylight_savings_status
            .push(if is_daylight_saving(date) { 1.0 } else { 0.0 });

        // Weather
        let temperature = outdoor_temperature(config, time) + noise(&mut rng, 0.8)?;
        let humidity = (75.0 - 1.5 * (temperature - config.annual_mean_temperature)
            + noise(&mut rng, 4.0)?)
        .clamp(20.0, 100.0);

        if config.enable_clouds {
            if cloud_hours_left == 0 {
                clouds = Oktas::new(okta_distribution.sample(&mut rng) as u8);
                cloud_hours_left = rng.gen_range(1..=4);
            }
            cloud_hours_left -= 1;
        }
        let clear_sky = sky.clear_sky_irradiance(time);
        let global = clear_sky * clouds.attenuation();
        let diffuse = global * clouds.diffuse_fraction();
        let direct = global - diffuse;

        weather.outdoor_dry_bulb_temperature.push(temperature);
        weather.outdoor_relative_humidity.push(humidity);
        weather.direct_solar_irradiance.push(direct);
        weather.diffuse_solar_irradiance.push(diffuse);

        // PV inverter output in W per installed kW
        es.solar_generation
            .push((direct + diffuse) * config.performance_ratio);

        // Demand
        let load = config.base_load_kw * tod_multiplier(time, config.peak_multiplier);
        es.non_shiftable_load
            .push((load + noise(&mut rng, load * config.noise_std_dev)?).max(0.0));

        let heating = (config.heating_balance_point - temperature).max(0.0) * config.heating_coefficient;
        let cooling = (temperature - config.cooling_balance_point).max(0.0) * config.cooling_coefficient;
        es.heating_demand.push(heating);
        es.cooling_demand.push(cooling);

        let dhw = config.dhw_daily_kwh * dhw_profile(hour);
        es.dhw_demand
            .push((dhw + noise(&mut rng, dhw * config.noise_std_dev)?).max(0.0));

        es.indoor_dry_bulb_temperature
            .push(21.0 + 0.05 * (temperature - 21.0).clamp(-10.0, 10.0));
        es.indoor_relative_humidity
            .push((humidity * 0.6).clamp(25.0, 65.0));

        // Grid signals
        let weekday = !matches!(time.weekday(), Weekday::Sat | Weekday::Sun);
        let (peak_start, peak_end) = config.peak_hours;
        let price = if weekday && !is_public_holiday(date) && (peak_start..peak_end).contains(&hour) {
            config.peak_price
        } else {
            config.offpeak_price
        };
        pricing.electricity_pricing.push(price);

        // Evening peak of fossil generation, midday dip from solar
        let ci = config.carbon_intensity_mean
            + config.carbon_intensity_amplitude * (2.0 * PI * (hour as f64 - 19.0) / 24.0).cos()
            - 0.5 * config.carbon_intensity_amplitude * (clear_sky / 1000.0);
        carbon.carbon_intensity.push(ci.max(0.0));
    }

    weather.outdoor_dry_bulb_temperature_predicted_6h = predicted(&weather.outdoor_dry_bulb_temperature, 6);
    weather.outdoor_dry_bulb_temperature_predicted_12h = predicted(&weather.outdoor_dry_bulb_temperature, 12);
    weather.outdoor_dry_bulb_temperature_predicted_24h = predicted(&weather.outdoor_dry_bulb_temperature, 24);
    weather.outdoor_relative_humidity_predicted_6h = predicted(&weather.outdoor_relative_humidity, 6);
    weather.outdoor_relative_humidity_predicted_12h = predicted(&weather.outdoor_relative_humidity, 12);
    weather.outdoor_relative_humidity_predicted_24h = predicted(&weather.outdoor_relative_humidity, 24);
    weather.diffuse_solar_irradiance_predicted_6h = predicted(&weather.diffuse_solar_irradiance, 6);
    weather.diffuse_solar_irradiance_predicted_12h = predicted(&weather.diffuse_solar_irradiance, 12);
    weather.diffuse_solar_irradiance_predicted_24h = predicted(&weather.diffuse_solar_irradiance, 24);
    weather.direct_solar_irradiance_predicted_6h = predicted(&weather.direct_solar_irradiance, 6);
    weather.direct_solar_irradiance_predicted_12h = predicted(&weather.direct_solar_irradiance, 12);
    weather.direct_solar_irradiance_predicted_24h = predicted(&weather.direct_solar_irradiance, 24);
    pricing.electricity_pricing_predicted_6h = predicted(&pricing.electricity_pricing, 6);
    pricing.electricity_pricing_predicted_12h = predicted(&pricing.electricity_pricing, 12);
    pricing.electricity_pricing_predicted_24h = predicted(&pricing.electricity_pricing, 24);

    info!(
        hours = config.hours,
        seed = config.seed,
        start = %config.start,
        "Generated synthetic context"
    );

    Context::new(es, weather, Some(pricing), Some(carbon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ObservationKey;
    use approx::assert_relative_eq;

    fn jan_first() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_calendar_features() {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(day_type(monday), 1);
        assert_eq!(day_type(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()), 7);
        assert_eq!(day_type(NaiveDate::from_ymd_opt(2024, 12, 25).unwrap()), 8);

        assert_eq!(hour_of_day(jan_first()), 24);
        assert_eq!(hour_of_day(jan_first() + Duration::hours(13)), 13);
    }

    #[test]
    fn test_daylight_saving_window() {
        // 2024: 31 March to 27 October
        assert!(!is_daylight_saving(NaiveDate::from_ymd_opt(2024, 3, 30).unwrap()));
        assert!(is_daylight_saving(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
        assert!(is_daylight_saving(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));
        assert!(!is_daylight_saving(NaiveDate::from_ymd_opt(2024, 10, 27).unwrap()));
    }

    #[test]
    fn test_no_irradiance_at_night() {
        let sky = ClearSkyModel::new(59.3293, 18.0686, 1);
        let midnight = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let noon = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap().and_hms_opt(12, 0, 0).unwrap();

        assert_eq!(sky.clear_sky_irradiance(midnight), 0.0);
        assert!(sky.clear_sky_irradiance(noon) > 500.0);
    }

    #[test]
    fn test_midsummer_noon_elevation() {
        let sky = ClearSkyModel::new(59.3293, 18.0686, 1);
        let noon = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap().and_hms_opt(12, 0, 0).unwrap();

        // Transit elevation is 90 - latitude + declination, about 54.1 degrees
        let elevation = sky.solar_elevation(noon);
        assert!((52.0..=54.2).contains(&elevation), "{elevation}");
    }

    #[test]
    fn test_cloud_attenuation() {
        assert_eq!(Oktas::new(0).attenuation(), 1.0);
        assert_relative_eq!(Oktas::new(8).attenuation(), 0.25);
        assert_eq!(Oktas::new(12), Oktas::new(8));
        assert!(Oktas::new(4).diffuse_fraction() > Oktas::new(0).diffuse_fraction());
    }

    #[test]
    fn test_generate_is_deterministic() {
        let config = SyntheticConfig::default().with_hours(48).with_seed(7);

        let a = generate(&config).unwrap();
        let b = generate(&config).unwrap();
        assert_eq!(a, b);

        let c = generate(&config.clone().with_seed(8)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_generate_covers_horizon() {
        let config = SyntheticConfig::default().with_hours(30).with_start(jan_first());
        let context = generate(&config).unwrap();

        assert_eq!(context.horizon(), 30);
        let es = context.energy_simulation();
        assert_eq!(es.hour[0], 24.0);
        // New Year's Day
        assert_eq!(es.day_type[0], 8.0);
        assert!(es.non_shiftable_load.iter().all(|v| *v >= 0.0));
        assert!(es.solar_generation.iter().all(|v| *v >= 0.0));
        assert!(es.heating_demand.iter().any(|v| *v > 0.0));
        assert!(context
            .carbon_intensity()
            .carbon_intensity
            .iter()
            .all(|v| *v >= 0.0));
        assert_eq!(
            context
                .series(ObservationKey::ElectricityPricingPredicted24h)
                .map(<[f64]>::len),
            Some(30)
        );
    }

    #[test]
    fn test_predictions_hold_last_value() {
        assert_eq!(predicted(&[1.0, 2.0, 3.0], 2), vec![3.0, 3.0, 3.0]);
        assert_eq!(predicted(&[1.0, 2.0, 3.0], 1), vec![2.0, 3.0, 3.0]);
        assert!(predicted(&[], 6).is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SyntheticConfig::default().with_hours(0);
        assert!(matches!(
            generate(&config),
            Err(SimulationError::InvalidDataset(_))
        ));
    }
}
