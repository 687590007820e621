//! Simulation errors

use thiserror::Error;

use super::types::{Coord, PacketId, VehicleId};

/// Errors reported by the simulation core. None of them are fatal; a failed
/// call leaves the world as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("invalid world dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("world has not been initialized")]
    WorldNotInitialized,

    #[error("coordinate {0} is outside the grid")]
    OutOfBounds(Coord),

    #[error("cell {0} is already occupied")]
    CellOccupied(Coord),

    #[error("cannot add {requested} vehicles to {existing}: capacity is below {capacity}")]
    CapacityExceeded {
        requested: usize,
        existing: usize,
        capacity: usize,
    },

    #[error("grid cell {0} does not hold the vehicle recorded there")]
    GridMismatch(Coord),

    #[error("vehicle {0} not found")]
    UnknownVehicle(VehicleId),

    #[error("source and destination are both vehicle {0}")]
    SameEndpoints(VehicleId),

    #[error("packet {0} was not accepted by its source")]
    PacketRejected(PacketId),

    #[error("vehicle {vehicle} adjacency was built for tick {cached}, current tick is {current}")]
    StaleAdjacency {
        vehicle: VehicleId,
        cached: u64,
        current: u64,
    },
}
