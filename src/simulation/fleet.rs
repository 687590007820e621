//! Vehicle arena
//!
//! Vehicles are stored in population order and looked up by id. Other
//! components refer to vehicles only by `VehicleId`.

use std::collections::HashMap;

use super::types::VehicleId;
use super::vehicle::Vehicle;

#[derive(Debug, Clone, Default)]
pub struct Fleet {
    vehicles: Vec<Vehicle>,
    index: HashMap<VehicleId, usize>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, vehicle: Vehicle) {
        self.index.insert(vehicle.id, self.vehicles.len());
        self.vehicles.push(vehicle);
    }

    /// Take a vehicle out of the fleet. The rest keep their population
    /// order.
    pub fn remove(&mut self, id: VehicleId) -> Option<Vehicle> {
        let index = self.index.remove(&id)?;
        let vehicle = self.vehicles.remove(index);
        for (i, later) in self.vehicles.iter().enumerate().skip(index) {
            self.index.insert(later.id, i);
        }
        Some(vehicle)
    }

    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.index.get(&id).map(|&i| &self.vehicles[i])
    }

    pub fn get_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        match self.index.get(&id) {
            Some(&i) => Some(&mut self.vehicles[i]),
            None => None,
        }
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.index.contains_key(&id)
    }

    /// Ids in population order. Collected so callers can mutate while walking.
    pub fn ids(&self) -> Vec<VehicleId> {
        self.vehicles.iter().map(|v| v.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vehicle> {
        self.vehicles.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn clear(&mut self) {
        self.vehicles.clear();
        self.index.clear();
    }
}
