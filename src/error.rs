use thiserror::Error;

/// Errors raised by the building simulation.
///
/// Only configuration problems and stepping past the horizon are errors. Degenerate
/// inputs (NaN demand, zero capacity) and infeasible actions are resolved in place.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Unknown observations: {0:?}")]
    UnknownObservations(Vec<String>),
    #[error("Unknown actions: {0:?}")]
    UnknownActions(Vec<String>),
    #[error("Observation '{0}' has no data series in the context")]
    MissingSeries(String),
    #[error("Series '{name}' has {actual} entries, expected {expected}")]
    HorizonMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Context horizon must contain at least one time step")]
    EmptyHorizon,
    #[error("Invalid device configuration: {0}")]
    InvalidDevice(String),
    #[error("Invalid dataset configuration: {0}")]
    InvalidDataset(String),
    #[error("Action vector has {actual} entries, expected {expected}")]
    ActionDimension { expected: usize, actual: usize },
    #[error("Episode ended at time step {0}")]
    EpisodeEnded(usize),
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
