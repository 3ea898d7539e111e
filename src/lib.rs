//! # Building Energy Sim
//!
//! Step-driven simulation of a building's energy flexibility: thermal storage tanks,
//! a battery, heat pumps and heaters, rooftop PV, and the observation and action spaces
//! a controller sees.

pub mod building;
pub mod config;
pub mod controller;
pub mod data;
pub mod energy_model;
pub mod error;
pub mod features;
pub mod preprocessing;
pub mod runner;
pub mod series;
pub mod spaces;
pub mod telemetry;

pub use building::{Building, BuildingBuilder};
pub use config::{Config, ConfigError};
pub use controller::{Controller, HourScheduleController, SchedulePreset};
pub use data::Context;
pub use error::{Result, SimulationError};
pub use runner::{run_episode, EpisodeSummary};
