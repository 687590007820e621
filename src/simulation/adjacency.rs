//! Neighbor discovery
//!
//! Rebuilds every vehicle's 8-slot neighbor cache from the grid and stamps
//! it with the tick it belongs to.

use super::fleet::Fleet;
use super::grid::Grid;
use super::types::{VehicleId, NEIGHBOR_OFFSETS};
use super::vehicle::Vehicle;

/// Vehicles around `owner` in slot order; cells off the grid are empty
fn scan(grid: &Grid, owner: &Vehicle) -> [Option<VehicleId>; 8] {
    let mut slots = [None; 8];
    for (slot, &(dx, dy)) in slots.iter_mut().zip(NEIGHBOR_OFFSETS.iter()) {
        *slot = grid.occupant(owner.position.offset(dx, dy)).ok().flatten();
    }
    slots
}

/// Recompute the neighbor cache of every vehicle for `tick`.
/// Returns the number of (directed) neighbor links found.
pub fn rebuild(fleet: &mut Fleet, grid: &Grid, tick: u64) -> usize {
    let mut links = 0;
    for vehicle in fleet.iter_mut() {
        let slots = scan(grid, vehicle);
        links += slots.iter().flatten().count();
        vehicle.neighbors.store(tick, slots);
    }
    links
}
