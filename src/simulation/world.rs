//! Main simulation world that ties everything together
//!
//! The world owns the grid, every vehicle, the id allocator and the RNG.
//! One tick runs the pipeline:
//!
//! 1. adjacency rebuild, stamped with the tick number
//! 2. movement
//! 3. adjacency refresh against the new positions
//! 4. routing (flood or destination search)

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::adjacency;
use super::display;
use super::error::SimError;
use super::fleet::Fleet;
use super::grid::Grid;
use super::movement::{self, MoveContext, MovementReport};
use super::packet::{Admission, Packet};
use super::routing::{self, Delivery, RoutingAlgorithm, RoutingReport};
use super::types::{Coord, IdAllocator, PacketId, VehicleId};
use super::vehicle::{choose_destination, Vehicle, VehicleKind};

/// Settings fixed when a world is created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimOptions {
    pub algorithm: RoutingAlgorithm,
    /// Seed for every random draw; `None` seeds from the thread RNG
    pub seed: Option<u64>,
    /// Extra ticks a vehicle spends between cells after each move
    pub ticks_per_move: u32,
}

/// Counters describing the current state of a world
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldSummary {
    pub tick: u64,
    pub width: i32,
    pub height: i32,
    pub vehicles: usize,
    pub packets_generated: usize,
    pub packets_delivered: usize,
    /// Payload copies that are still being routed
    pub live_copies: usize,
}

/// The main simulation world
pub struct World {
    /// `None` until `init_world` succeeds
    grid: Option<Grid>,
    fleet: Fleet,
    ids: IdAllocator,
    rng: StdRng,
    options: SimOptions,
    tick: u64,
    /// Set once every vehicle has announced itself for destination search
    directory_bootstrapped: bool,
    generated: Vec<PacketId>,
    deliveries: Vec<Delivery>,
    last_movement: MovementReport,
    last_routing: RoutingReport,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_options(SimOptions::default())
    }

    /// Create a world with a seeded RNG for reproducible runs
    pub fn new_with_seed(seed: u64) -> Self {
        Self::with_options(SimOptions {
            seed: Some(seed),
            ..SimOptions::default()
        })
    }

    pub fn with_options(options: SimOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        Self {
            grid: None,
            fleet: Fleet::new(),
            ids: IdAllocator::new(),
            rng,
            options,
            tick: 0,
            directory_bootstrapped: false,
            generated: Vec::new(),
            deliveries: Vec::new(),
            last_movement: MovementReport::default(),
            last_routing: RoutingReport::default(),
        }
    }

    fn grid(&self) -> Result<&Grid, SimError> {
        self.grid.as_ref().ok_or(SimError::WorldNotInitialized)
    }

    /// Drop every vehicle and packet. Ids already handed out stay used.
    pub fn clear_world(&mut self) {
        self.fleet.clear();
        if let Some((width, height)) = self.dimensions() {
            self.grid = Grid::new(width, height).ok();
        }
        self.tick = 0;
        self.directory_bootstrapped = false;
        self.generated.clear();
        self.deliveries.clear();
        self.last_movement = MovementReport::default();
        self.last_routing = RoutingReport::default();
    }

    /// Replace the world with an empty `width` x `height` grid
    pub fn init_world(&mut self, width: i32, height: i32) -> Result<(), SimError> {
        let grid = Grid::new(width, height)?;
        self.clear_world();
        self.grid = Some(grid);
        info!("{} by {} world created", width, height);
        Ok(())
    }

    /// Place `count` taxis on random free cells, each with a random
    /// destination. Either all of them are placed or none.
    pub fn populate_world(&mut self, count: usize) -> Result<(), SimError> {
        let grid = self.grid()?;
        let (width, height) = (grid.width(), grid.height());
        let capacity = grid.cell_count() / 2;
        let existing = self.fleet.len();

        if count + existing >= capacity {
            warn!(
                "refusing to add {} vehicles to {}: capacity is below {}",
                count, existing, capacity
            );
            return Err(SimError::CapacityExceeded {
                requested: count,
                existing,
                capacity,
            });
        }

        for _ in 0..count {
            let position = loop {
                let candidate = Coord::new(
                    self.rng.random_range(0..width),
                    self.rng.random_range(0..height),
                );
                if self.grid()?.is_free(candidate) {
                    break candidate;
                }
            };
            let destination =
                choose_destination(VehicleKind::Taxi, position, width, height, &mut self.rng);
            self.insert_vehicle(position, destination)?;
        }

        info!("{} vehicles created", count);
        Ok(())
    }

    /// Put one taxi on a chosen cell with a chosen destination. Not bound by
    /// the population capacity.
    pub fn spawn_vehicle_at(
        &mut self,
        position: Coord,
        destination: Coord,
    ) -> Result<VehicleId, SimError> {
        let grid = self.grid()?;
        if !grid.in_bounds(destination) {
            return Err(SimError::OutOfBounds(destination));
        }
        if grid.occupant(position)?.is_some() {
            return Err(SimError::CellOccupied(position));
        }
        self.insert_vehicle(position, destination)
    }

    fn insert_vehicle(
        &mut self,
        position: Coord,
        destination: Coord,
    ) -> Result<VehicleId, SimError> {
        let grid = self.grid.as_mut().ok_or(SimError::WorldNotInitialized)?;
        let id = self.ids.next_vehicle();
        grid.place(position, id)?;

        let vehicle = Vehicle::new(
            id,
            VehicleKind::Taxi,
            position,
            destination,
            grid.width(),
            grid.height(),
            self.options.ticks_per_move,
        );
        debug!(
            "vehicle {} placed at {} heading for {}",
            id, position, destination
        );
        self.fleet.insert(vehicle);
        Ok(id)
    }

    /// Take a vehicle off the grid. Packets it holds go with it; its id is
    /// not handed out again.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> Result<(), SimError> {
        let grid = self.grid.as_mut().ok_or(SimError::WorldNotInitialized)?;
        let position = self
            .fleet
            .get(id)
            .ok_or(SimError::UnknownVehicle(id))?
            .position;

        if grid.occupant(position)? != Some(id) {
            return Err(SimError::GridMismatch(position));
        }
        grid.vacate(position)?;
        self.fleet.remove(id);

        info!("vehicle {} removed from {}", id, position);
        Ok(())
    }

    /// Advance the simulation by one tick
    pub fn tick(&mut self) -> Result<(), SimError> {
        let grid = self.grid.as_mut().ok_or(SimError::WorldNotInitialized)?;
        self.tick += 1;
        let tick = self.tick;

        adjacency::rebuild(&mut self.fleet, grid, tick);

        let mut ctx = MoveContext {
            rng: &mut self.rng,
            ids: &mut self.ids,
        };
        self.last_movement = movement::move_vehicles(&mut self.fleet, grid, &mut ctx)?;

        let links = adjacency::rebuild(&mut self.fleet, grid, tick);

        self.last_routing = match self.options.algorithm {
            RoutingAlgorithm::Flood => routing::flood(&mut self.fleet, tick)?,
            RoutingAlgorithm::DestinationSearch => {
                if !self.directory_bootstrapped {
                    routing::bootstrap_directory(&mut self.fleet, &mut self.ids);
                    self.directory_bootstrapped = true;
                }
                routing::destination_search(&mut self.fleet, tick)?
            }
        };

        self.deliveries
            .extend(self.last_routing.deliveries.iter().cloned());

        debug!(
            "tick {}: moved {}, swapped {}, stalled {}, redirected {}, neighbor links {}",
            tick,
            self.last_movement.moved,
            self.last_movement.swaps,
            self.last_movement.stalled,
            self.last_movement.redirected,
            links
        );
        Ok(())
    }

    /// Run `ticks` ticks and render the result
    pub fn run_world(&mut self, ticks: u32) -> Result<String, SimError> {
        for _ in 0..ticks {
            self.tick()?;
        }
        self.display_world()
    }

    /// Originate a payload at `source` addressed to `destination`. The
    /// source's copy starts at age 1 so it leaves on the next routing pass.
    pub fn generate_packet(
        &mut self,
        message: &str,
        destination: VehicleId,
        source: VehicleId,
    ) -> Result<PacketId, SimError> {
        self.grid()?;

        let dest_coord = self
            .fleet
            .get(destination)
            .ok_or(SimError::UnknownVehicle(destination))?
            .position;
        if !self.fleet.contains(source) {
            return Err(SimError::UnknownVehicle(source));
        }
        if source == destination {
            return Err(SimError::SameEndpoints(source));
        }

        let id = self.ids.next_packet();
        let vehicle = self
            .fleet
            .get_mut(source)
            .ok_or(SimError::UnknownVehicle(source))?;
        let packet = Packet::payload(
            id,
            source,
            vehicle.position,
            destination,
            dest_coord,
            message,
        );

        if vehicle.admit(&packet) != Admission::Originated {
            return Err(SimError::PacketRejected(id));
        }
        if let Some(copy) = vehicle.payloads.get_mut(id) {
            copy.age = 1;
        }

        self.generated.push(id);
        info!(
            "packet {} generated at vehicle {} for vehicle {}: {}",
            id, source, destination, message
        );
        Ok(id)
    }

    /// Text rendering of the grid
    pub fn display_world(&self) -> Result<String, SimError> {
        Ok(display::render(self.grid()?, &self.fleet))
    }

    pub fn set_algorithm(&mut self, algorithm: RoutingAlgorithm) {
        info!("using {} routing", algorithm);
        self.options.algorithm = algorithm;
    }

    pub fn algorithm(&self) -> RoutingAlgorithm {
        self.options.algorithm
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    pub fn is_initialized(&self) -> bool {
        self.grid.is_some()
    }

    /// Width and height, once initialized
    pub fn dimensions(&self) -> Option<(i32, i32)> {
        self.grid.as_ref().map(|g| (g.width(), g.height()))
    }

    /// Number of ticks run since the world was last initialized
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.fleet.get(id)
    }

    /// Vehicles in population order
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.fleet.iter()
    }

    pub fn vehicle_count(&self) -> usize {
        self.fleet.len()
    }

    /// The vehicle on `coord`, if any
    pub fn occupant(&self, coord: Coord) -> Result<Option<VehicleId>, SimError> {
        self.grid()?.occupant(coord)
    }

    /// Every payload delivered since the world was initialized
    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Payload packets generated since the world was initialized
    pub fn generated_packets(&self) -> &[PacketId] {
        &self.generated
    }

    pub fn last_movement(&self) -> &MovementReport {
        &self.last_movement
    }

    pub fn last_routing(&self) -> &RoutingReport {
        &self.last_routing
    }

    /// Every copy of `packet` still held in a mailbox, with its holder
    pub fn packet_copies(&self, packet: PacketId) -> Vec<(VehicleId, &Packet)> {
        self.fleet
            .iter()
            .filter_map(|vehicle| {
                vehicle
                    .payloads
                    .get(packet)
                    .or_else(|| vehicle.updates.get(packet))
                    .map(|copy| (vehicle.id, copy))
            })
            .collect()
    }

    /// True when no copy of `packet` is still being routed
    pub fn is_packet_settled(&self, packet: PacketId) -> bool {
        self.packet_copies(packet).iter().all(|(_, copy)| copy.thrown)
    }

    pub fn summary(&self) -> WorldSummary {
        let (width, height) = self.dimensions().unwrap_or((0, 0));
        WorldSummary {
            tick: self.tick,
            width,
            height,
            vehicles: self.fleet.len(),
            packets_generated: self.generated.len(),
            packets_delivered: self.deliveries.len(),
            live_copies: self.fleet.iter().map(|v| v.payloads.live_count()).sum(),
        }
    }

    /// Check that the grid and the fleet agree: each vehicle's cell holds it
    /// and no other cell is occupied
    pub fn verify_grid(&self) -> Result<(), SimError> {
        let grid = self.grid()?;

        for vehicle in self.fleet.iter() {
            if grid.occupant(vehicle.position)? != Some(vehicle.id) {
                return Err(SimError::GridMismatch(vehicle.position));
            }
        }

        if let Some((coord, _)) = grid
            .occupied()
            .find(|(coord, id)| self.fleet.get(*id).map(|v| v.position) != Some(*coord))
        {
            return Err(SimError::GridMismatch(coord));
        }

        Ok(())
    }

    /// Log the world counters at info level
    pub fn log_summary(&self) {
        let summary = self.summary();
        info!("=== World Summary ===");
        info!("Grid: {} x {}", summary.width, summary.height);
        info!("Algorithm: {}", self.options.algorithm);
        info!("Ticks run: {}", summary.tick);
        info!("Vehicles: {}", summary.vehicles);
        info!("Packets generated: {}", summary.packets_generated);
        info!("Packets delivered: {}", summary.packets_delivered);
        info!("Live packet copies: {}", summary.live_copies);
    }
}
