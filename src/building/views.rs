//! Derived energy-flow views over steps `0..=time_step`.

use super::Building;
use crate::energy_model::{ConversionDevice, StorageTank, ThermalMode};
use crate::features::ObservationKey;

impl Building {
    fn context_history(&self, key: ObservationKey) -> Vec<f64> {
        (0..=self.time_step)
            .map(|t| self.context.value(key, t))
            .collect()
    }

    /// Electricity a conversion device spends on its storage's energy balance alone
    fn storage_device_consumption(
        &self,
        storage: &StorageTank,
        device: &dyn ConversionDevice,
        mode: ThermalMode,
    ) -> Vec<f64> {
        storage
            .energy_balance()
            .iter()
            .enumerate()
            .map(|(t, balance)| {
                device.get_input_power(*balance, &self.context.operating_conditions(t, mode))
            })
            .collect()
    }

    pub fn cooling_demand(&self) -> Vec<f64> {
        self.context_history(ObservationKey::CoolingDemand)
    }

    pub fn heating_demand(&self) -> Vec<f64> {
        self.context_history(ObservationKey::HeatingDemand)
    }

    pub fn dhw_demand(&self) -> Vec<f64> {
        self.context_history(ObservationKey::DhwDemand)
    }

    pub fn non_shiftable_load_demand(&self) -> Vec<f64> {
        self.context_history(ObservationKey::NonShiftableLoad)
    }

    /// PV generation (<= 0)
    pub fn solar_generation(&self) -> &[f64] {
        &self.solar_generation[..=self.time_step]
    }

    pub fn cooling_storage_electricity_consumption(&self) -> Vec<f64> {
        self.storage_device_consumption(
            &self.cooling_storage,
            self.cooling_device.as_ref(),
            ThermalMode::Cooling,
        )
    }

    pub fn heating_storage_electricity_consumption(&self) -> Vec<f64> {
        self.storage_device_consumption(
            &self.heating_storage,
            self.heating_device.as_ref(),
            ThermalMode::Heating,
        )
    }

    pub fn dhw_storage_electricity_consumption(&self) -> Vec<f64> {
        self.storage_device_consumption(
            &self.dhw_storage,
            self.dhw_device.as_ref(),
            ThermalMode::Heating,
        )
    }

    pub fn electrical_storage_electricity_consumption(&self) -> &[f64] {
        self.electrical_storage.electricity_consumption()
    }

    /// Net consumption had no storage been charged or discharged
    pub fn net_electricity_consumption_without_storage(&self) -> Vec<f64> {
        let cooling = self.cooling_storage_electricity_consumption();
        let heating = self.heating_storage_electricity_consumption();
        let dhw = self.dhw_storage_electricity_consumption();
        let battery = self.electrical_storage_electricity_consumption();

        self.net_electricity_consumption()
            .iter()
            .enumerate()
            .map(|(t, net)| net - (cooling[t] + heating[t] + dhw[t] + battery[t]))
            .collect()
    }

    /// Net consumption with neither storage nor PV
    pub fn net_electricity_consumption_without_storage_and_pv(&self) -> Vec<f64> {
        self.net_electricity_consumption_without_storage()
            .iter()
            .zip(self.solar_generation())
            .map(|(net, solar)| net - solar)
            .collect()
    }

    pub fn net_electricity_consumption_without_storage_cost(&self) -> Vec<f64> {
        self.priced(&self.net_electricity_consumption_without_storage())
    }

    pub fn net_electricity_consumption_without_storage_and_pv_cost(&self) -> Vec<f64> {
        self.priced(&self.net_electricity_consumption_without_storage_and_pv())
    }

    pub fn net_electricity_consumption_without_storage_emission(&self) -> Vec<f64> {
        self.emitted(&self.net_electricity_consumption_without_storage())
    }

    pub fn net_electricity_consumption_without_storage_and_pv_emission(&self) -> Vec<f64> {
        self.emitted(&self.net_electricity_consumption_without_storage_and_pv())
    }

    fn priced(&self, consumption: &[f64]) -> Vec<f64> {
        consumption
            .iter()
            .enumerate()
            .map(|(t, c)| c * self.context.value(ObservationKey::ElectricityPricing, t))
            .collect()
    }

    fn emitted(&self, consumption: &[f64]) -> Vec<f64> {
        consumption
            .iter()
            .enumerate()
            .map(|(t, c)| (c * self.context.value(ObservationKey::CarbonIntensity, t)).max(0.0))
            .collect()
    }

    // ---- Energy flows ----

    pub fn energy_from_cooling_device_to_cooling_storage(&self) -> Vec<f64> {
        charging(self.cooling_storage.energy_balance())
    }

    pub fn energy_from_heating_device_to_heating_storage(&self) -> Vec<f64> {
        charging(self.heating_storage.energy_balance())
    }

    pub fn energy_from_dhw_device_to_dhw_storage(&self) -> Vec<f64> {
        charging(self.dhw_storage.energy_balance())
    }

    pub fn energy_to_electrical_storage(&self) -> Vec<f64> {
        charging(self.electrical_storage.energy_balance())
    }

    pub fn energy_from_cooling_storage(&self) -> Vec<f64> {
        discharging(self.cooling_storage.energy_balance())
    }

    pub fn energy_from_heating_storage(&self) -> Vec<f64> {
        discharging(self.heating_storage.energy_balance())
    }

    pub fn energy_from_dhw_storage(&self) -> Vec<f64> {
        discharging(self.dhw_storage.energy_balance())
    }

    pub fn energy_from_electrical_storage(&self) -> Vec<f64> {
        discharging(self.electrical_storage.energy_balance())
    }

    /// Demand met directly by the cooling device
    pub fn energy_from_cooling_device(&self) -> Vec<f64> {
        difference(&self.cooling_demand(), &self.energy_from_cooling_storage())
    }

    pub fn energy_from_heating_device(&self) -> Vec<f64> {
        difference(&self.heating_demand(), &self.energy_from_heating_storage())
    }

    pub fn energy_from_dhw_device(&self) -> Vec<f64> {
        difference(&self.dhw_demand(), &self.energy_from_dhw_storage())
    }
}

fn charging(balance: &[f64]) -> Vec<f64> {
    balance.iter().map(|b| b.max(0.0)).collect()
}

fn discharging(balance: &[f64]) -> Vec<f64> {
    balance.iter().map(|b| -b.min(0.0)).collect()
}

fn difference(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}
