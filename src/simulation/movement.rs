//! Movement engine
//!
//! Advances every vehicle at most one cell per tick in population order.
//! A vehicle whose target cell is taken either swaps with the occupant
//! (when the occupant wants its cell), or stalls and after a while
//! redirects.

use log::debug;
use rand::rngs::StdRng;

use super::error::SimError;
use super::fleet::Fleet;
use super::grid::Grid;
use super::types::{IdAllocator, VehicleId, STALL_LIMIT};
use super::vehicle::{choose_destination, Vehicle};

/// World state the movement engine draws on besides the grid
pub struct MoveContext<'a> {
    pub rng: &'a mut StdRng,
    pub ids: &'a mut IdAllocator,
}

/// What happened during one movement pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementReport {
    pub moved: usize,
    pub swaps: usize,
    pub stalled: usize,
    pub redirected: usize,
    pub boxed_in: usize,
    pub in_transition: usize,
    pub arrivals: usize,
}

/// Give a vehicle standing on its destination a new one and announce it
fn retarget_if_arrived(
    vehicle: &mut Vehicle,
    width: i32,
    height: i32,
    ctx: &mut MoveContext<'_>,
    report: &mut MovementReport,
) {
    if !vehicle.at_destination() {
        return;
    }

    let destination = choose_destination(
        vehicle.kind,
        vehicle.destination,
        width,
        height,
        &mut *ctx.rng,
    );
    let announcement = ctx.ids.next_packet();
    vehicle.retarget(destination, announcement);
    report.arrivals += 1;

    debug!(
        "vehicle {} reached {}, heading for {}",
        vehicle.id, vehicle.position, destination
    );
}

/// Move `id` into its planned cell, which the caller knows is empty
fn step_into_empty(
    fleet: &mut Fleet,
    grid: &mut Grid,
    id: VehicleId,
    ctx: &mut MoveContext<'_>,
    report: &mut MovementReport,
) -> Result<(), SimError> {
    let (width, height) = (grid.width(), grid.height());
    let vehicle = fleet.get_mut(id).ok_or(SimError::UnknownVehicle(id))?;

    grid.vacate(vehicle.position)?;
    grid.place(vehicle.next_position, id)?;
    vehicle.advance();
    report.moved += 1;

    retarget_if_arrived(vehicle, width, height, ctx, report);
    vehicle.plan_next_step();
    Ok(())
}

/// Exchange two vehicles that each want the other's cell
fn swap_pair(
    fleet: &mut Fleet,
    grid: &mut Grid,
    first: VehicleId,
    second: VehicleId,
    ctx: &mut MoveContext<'_>,
    report: &mut MovementReport,
) -> Result<(), SimError> {
    let (width, height) = (grid.width(), grid.height());
    let (a, b) = {
        let vehicle = fleet.get(first).ok_or(SimError::UnknownVehicle(first))?;
        (vehicle.position, vehicle.next_position)
    };
    grid.swap(a, b)?;

    for id in [first, second] {
        let vehicle = fleet.get_mut(id).ok_or(SimError::UnknownVehicle(id))?;
        vehicle.advance();
        report.moved += 1;
        retarget_if_arrived(vehicle, width, height, ctx, report);
        vehicle.plan_next_step();
    }

    report.swaps += 1;
    debug!("vehicles {} and {} swapped {} <-> {}", first, second, a, b);
    Ok(())
}

/// Count a blocked tick and redirect once the vehicle has waited long enough
fn stall(grid: &Grid, vehicle: &mut Vehicle, report: &mut MovementReport) {
    vehicle.stall_ticks += 1;
    report.stalled += 1;

    if vehicle.stall_ticks < STALL_LIMIT {
        return;
    }

    vehicle.stall_ticks = 0;
    if vehicle.redirect(|cell| grid.is_free(cell)) {
        report.redirected += 1;
    } else {
        report.boxed_in += 1;
        debug!("vehicle {} is boxed in at {}", vehicle.id, vehicle.position);
    }
}

/// Run one movement pass over the whole fleet
pub fn move_vehicles(
    fleet: &mut Fleet,
    grid: &mut Grid,
    ctx: &mut MoveContext<'_>,
) -> Result<MovementReport, SimError> {
    let mut report = MovementReport::default();
    let (width, height) = (grid.width(), grid.height());

    for vehicle in fleet.iter_mut() {
        vehicle.has_moved = false;
        vehicle.in_transit = false;
    }

    for id in fleet.ids() {
        let (from, to) = {
            let vehicle = fleet.get_mut(id).ok_or(SimError::UnknownVehicle(id))?;

            // Already moved as the partner of a swap
            if vehicle.has_moved {
                continue;
            }
            if vehicle.in_transition() {
                report.in_transition += 1;
                continue;
            }
            if !vehicle.is_cruising() {
                retarget_if_arrived(vehicle, width, height, ctx, &mut report);
                vehicle.replan_in_place();
                continue;
            }
            (vehicle.position, vehicle.next_position)
        };

        let Some(occupant) = grid.occupant(to)? else {
            step_into_empty(fleet, grid, id, ctx, &mut report)?;
            continue;
        };

        // Only an occupant that has not used its turn this tick can trade
        let wants_swap = fleet.get(occupant).is_some_and(|other| {
            other.next_position == from
                && !other.has_moved
                && !other.in_transit
                && other.pending_transition == 0
        });

        if wants_swap {
            swap_pair(fleet, grid, id, occupant, ctx, &mut report)?;
        } else {
            let vehicle = fleet.get_mut(id).ok_or(SimError::UnknownVehicle(id))?;
            stall(grid, vehicle, &mut report);
        }
    }

    Ok(report)
}
