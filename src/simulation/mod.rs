//! Vehicle relay simulation core
//!
//! Vehicles drive around a fixed grid and carry packets for each other.
//! Everything here runs headless and is stepped one tick at a time through
//! [`World`].

mod adjacency;
mod directory;
mod display;
mod error;
mod fleet;
mod grid;
mod movement;
mod packet;
mod routing;
mod types;
mod vehicle;
mod world;

pub use directory::{LocationDirectory, LocationEntry};
pub use display::{render, GridView, TILE_ROWS, TILE_WIDTH};
pub use error::SimError;
pub use fleet::Fleet;
pub use grid::Grid;
pub use movement::MovementReport;
pub use packet::{Admission, Mailbox, Packet, PacketKind};
pub use routing::{plan_hop, Delivery, HopPlan, RoutingAlgorithm, RoutingReport};
pub use types::{
    Coord, Heading, IdAllocator, PacketId, VehicleId, FORWARD_MIN_AGE, MAX_REDIRECT_ATTEMPTS,
    NEIGHBOR_OFFSETS, PACKET_TTL, RECLAIM_AGE, STALL_LIMIT,
};
pub use vehicle::{choose_destination, NeighborCache, Vehicle, VehicleKind};
pub use world::{SimOptions, World, WorldSummary};
