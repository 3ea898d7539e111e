//! Fixed-length per-step series.
//!
//! Every per-step quantity (state of charge, energy balance, electricity consumption,
//! building aggregates) is allocated once for the whole episode and written by index.
//! Reading or writing past the episode length is a programming error and panics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSeries {
    values: Vec<f64>,
}

impl StepSeries {
    /// Zero-filled series covering `len` time steps
    pub fn new(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, time_step: usize) -> f64 {
        self.values[time_step]
    }

    pub fn set(&mut self, time_step: usize, value: f64) {
        self.values[time_step] = value;
    }

    /// Values for steps `0..=time_step`
    pub fn up_to(&self, time_step: usize) -> &[f64] {
        &self.values[..=time_step]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Zero every entry, keeping the allocated length
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Reallocate for a new episode length; all entries become zero
    pub fn resize(&mut self, len: usize) {
        self.values = vec![0.0; len];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_to_includes_current_step() {
        let mut series = StepSeries::new(4);
        series.set(0, 1.0);
        series.set(1, 2.0);

        assert_eq!(series.up_to(1), &[1.0, 2.0]);
        assert_eq!(series.up_to(0).len(), 1);
    }

    #[test]
    fn test_clear_keeps_length() {
        let mut series = StepSeries::new(3);
        series.set(2, 5.0);
        series.clear();

        assert_eq!(series.len(), 3);
        assert_eq!(series.as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    #[should_panic]
    fn test_write_past_horizon_panics() {
        let mut series = StepSeries::new(2);
        series.set(2, 1.0);
    }
}
