//! Device autosizing against the context horizon.
//!
//! Each call resizes one device, re-estimates the observation and action spaces and
//! resets the building, so spaces stay fixed for the rest of the episode.

use tracing::info;

use super::Building;
use crate::energy_model::ThermalMode;
use crate::error::Result;

impl Building {
    /// Size the cooling device to meet peak cooling demand
    pub fn autosize_cooling_device(&mut self, safety_factor: f64) -> Result<()> {
        let conditions = self.context.operating_conditions_series(ThermalMode::Cooling);
        let demand = &self.context.energy_simulation().cooling_demand;
        self.cooling_device.autosize(demand, &conditions, safety_factor);
        self.log_resized("cooling_device", self.cooling_device.nominal_power());
        self.refresh()
    }

    pub fn autosize_heating_device(&mut self, safety_factor: f64) -> Result<()> {
        let conditions = self.context.operating_conditions_series(ThermalMode::Heating);
        let demand = &self.context.energy_simulation().heating_demand;
        self.heating_device.autosize(demand, &conditions, safety_factor);
        self.log_resized("heating_device", self.heating_device.nominal_power());
        self.refresh()
    }

    pub fn autosize_dhw_device(&mut self, safety_factor: f64) -> Result<()> {
        let conditions = self.context.operating_conditions_series(ThermalMode::Heating);
        let demand = &self.context.energy_simulation().dhw_demand;
        self.dhw_device.autosize(demand, &conditions, safety_factor);
        self.log_resized("dhw_device", self.dhw_device.nominal_power());
        self.refresh()
    }

    /// Size the cooling tank to hold the largest single-step cooling demand
    pub fn autosize_cooling_storage(&mut self, safety_factor: f64) -> Result<()> {
        let demand = &self.context.energy_simulation().cooling_demand;
        self.cooling_storage.autosize(demand, safety_factor);
        self.log_resized("cooling_storage", self.cooling_storage.capacity());
        self.refresh()
    }

    pub fn autosize_heating_storage(&mut self, safety_factor: f64) -> Result<()> {
        let demand = &self.context.energy_simulation().heating_demand;
        self.heating_storage.autosize(demand, safety_factor);
        self.log_resized("heating_storage", self.heating_storage.capacity());
        self.refresh()
    }

    pub fn autosize_dhw_storage(&mut self, safety_factor: f64) -> Result<()> {
        let demand = &self.context.energy_simulation().dhw_demand;
        self.dhw_storage.autosize(demand, safety_factor);
        self.log_resized("dhw_storage", self.dhw_storage.capacity());
        self.refresh()
    }

    /// Size the battery to absorb peak PV generation; nominal power is half the capacity
    pub fn autosize_electrical_storage(&mut self, safety_factor: f64) -> Result<()> {
        self.electrical_storage
            .autosize(&self.solar_generation, safety_factor);
        self.log_resized("electrical_storage", self.electrical_storage.capacity());
        self.refresh()
    }

    /// Size the PV array so peak generation covers peak non-shiftable load
    pub fn autosize_pv(&mut self, safety_factor: f64) -> Result<()> {
        let es = self.context.energy_simulation();
        self.pv
            .autosize(&es.non_shiftable_load, &es.solar_generation, safety_factor);
        self.log_resized("pv", self.pv.nominal_power());
        self.refresh()
    }

    fn log_resized(&self, device: &str, size: f64) {
        info!(building = %self.name, device, size, "Autosized device");
    }
}
