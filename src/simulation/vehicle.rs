//! Vehicle state, step planning, redirection and packet admission
//!
//! A vehicle only knows the grid bounds. Occupancy of other cells is
//! resolved by the movement engine, which hands `redirect` a predicate
//! telling it which cells are free.

use rand::Rng;

use super::directory::LocationDirectory;
use super::error::SimError;
use super::packet::{Admission, Mailbox, Packet};
use super::types::{Coord, Heading, PacketId, VehicleId, MAX_REDIRECT_ATTEMPTS};

/// The kinds of vehicle the simulation knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VehicleKind {
    /// Roams between uniformly random destinations
    #[default]
    Taxi,
}

impl VehicleKind {
    pub fn label(self) -> char {
        match self {
            VehicleKind::Taxi => 'T',
        }
    }
}

/// Pick the next destination for a vehicle of the given kind.
///
/// Taxis draw uniformly over the whole grid until the result differs from
/// `current`. A single-cell grid keeps `current`.
pub fn choose_destination<R: Rng>(
    kind: VehicleKind,
    current: Coord,
    width: i32,
    height: i32,
    rng: &mut R,
) -> Coord {
    match kind {
        VehicleKind::Taxi => {
            if width <= 0 || height <= 0 || width * height == 1 {
                return current;
            }
            loop {
                let x = rng.random_range(0..width);
                let y = rng.random_range(0..height);
                let candidate = Coord::new(x, y);
                if candidate != current {
                    return candidate;
                }
            }
        }
    }
}

/// Snapshot of the 8 surrounding cells, valid for one tick only
#[derive(Debug, Clone, Copy, Default)]
pub struct NeighborCache {
    tick: Option<u64>,
    slots: [Option<VehicleId>; 8],
}

impl NeighborCache {
    pub(crate) fn store(&mut self, tick: u64, slots: [Option<VehicleId>; 8]) {
        self.tick = Some(tick);
        self.slots = slots;
    }

    /// Tick the snapshot was taken for
    pub fn tick(&self) -> Option<u64> {
        self.tick
    }

    /// Raw slots, regardless of age
    pub fn slots(&self) -> &[Option<VehicleId>; 8] {
        &self.slots
    }

    /// Slots for `tick`; refuses a snapshot taken for any other tick
    pub fn current(
        &self,
        owner: VehicleId,
        tick: u64,
    ) -> Result<[Option<VehicleId>; 8], SimError> {
        match self.tick {
            Some(cached) if cached == tick => Ok(self.slots),
            cached => Err(SimError::StaleAdjacency {
                vehicle: owner,
                cached: cached.unwrap_or(0),
                current: tick,
            }),
        }
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub kind: VehicleKind,
    pub position: Coord,
    pub next_position: Coord,
    pub destination: Coord,
    pub heading: Heading,
    /// Redirection stages used since the last successful move (0..=4)
    pub redirect_attempts: u8,
    /// Heading that was blocked when the current redirection began
    redirect_origin: Heading,
    /// Consecutive ticks spent blocked by another vehicle
    pub stall_ticks: u32,
    pub has_moved: bool,
    /// Spent this tick counting down a multi-tick move
    pub in_transit: bool,
    /// Ticks left before the vehicle may move again
    pub pending_transition: u32,
    /// Ticks a completed move keeps the vehicle in transition
    pub ticks_per_move: u32,
    pub payloads: Mailbox,
    pub updates: Mailbox,
    pub directory: LocationDirectory,
    pub neighbors: NeighborCache,
    width: i32,
    height: i32,
}

impl Vehicle {
    /// Create a vehicle and plan its first step toward `destination`.
    /// `width` and `height` are the bounds of the grid it drives on.
    pub fn new(
        id: VehicleId,
        kind: VehicleKind,
        position: Coord,
        destination: Coord,
        width: i32,
        height: i32,
        ticks_per_move: u32,
    ) -> Self {
        let mut vehicle = Self {
            id,
            kind,
            position,
            next_position: position,
            destination,
            heading: Heading::None,
            redirect_attempts: 0,
            redirect_origin: Heading::None,
            stall_ticks: 0,
            has_moved: false,
            in_transit: false,
            pending_transition: ticks_per_move,
            ticks_per_move,
            payloads: Mailbox::new(),
            updates: Mailbox::new(),
            directory: LocationDirectory::new(),
            neighbors: NeighborCache::default(),
            width,
            height,
        };
        vehicle.plan_next_step();
        vehicle
    }

    pub fn at_destination(&self) -> bool {
        self.position == self.destination
    }

    /// True when the vehicle wants to leave its cell this tick
    pub fn is_cruising(&self) -> bool {
        self.next_position != self.position
    }

    /// Whether any packet is marked for display
    pub fn holds_packet(&self) -> bool {
        self.payloads.carrying
    }

    fn in_bounds(&self, coord: Coord) -> bool {
        (0..self.width).contains(&coord.x) && (0..self.height).contains(&coord.y)
    }

    /// Count down a multi-tick move. Returns true while the vehicle is
    /// still travelling between cells.
    pub fn in_transition(&mut self) -> bool {
        if self.pending_transition > 0 {
            self.pending_transition -= 1;
            self.in_transit = true;
            return true;
        }
        false
    }

    /// Commit the planned move. The caller has already updated the grid.
    pub fn advance(&mut self) {
        self.position = self.next_position;
        self.redirect_attempts = 0;
        self.redirect_origin = Heading::None;
        self.stall_ticks = 0;
        self.has_moved = true;
        self.pending_transition = self.ticks_per_move;
    }

    /// Start over from the current cell after having stopped
    pub fn replan_in_place(&mut self) {
        self.redirect_attempts = 0;
        self.redirect_origin = Heading::None;
        self.stall_ticks = 0;
        self.plan_next_step();
    }

    /// Set a new destination and queue a location announcement for it
    pub fn retarget(&mut self, destination: Coord, announcement: PacketId) -> Admission {
        self.destination = destination;
        self.announce(announcement)
    }

    /// Originate a location update for this vehicle's own mailbox
    pub fn announce(&mut self, id: PacketId) -> Admission {
        let update = Packet::location_update(id, self.id, self.position, self.destination);
        self.admit(&update)
    }

    /// Plan one step toward the destination.
    ///
    /// The axis with the larger remaining distance goes first, horizontal on
    /// a tie. A step that would reverse the current heading is replaced by a
    /// perpendicular one.
    pub fn plan_next_step(&mut self) {
        self.next_position = self.position;

        let dx = self.destination.x - self.position.x;
        let dy = self.destination.y - self.position.y;

        if dx == 0 && dy == 0 {
            self.heading = Heading::None;
            return;
        }

        let preferred = if dx.abs() >= dy.abs() {
            Heading::horizontal(dx)
        } else {
            Heading::vertical(dy)
        };

        let is_u_turn = self.heading != Heading::None && preferred == self.heading.reverse();
        if is_u_turn || !self.try_plan(preferred) {
            self.plan_alternate();
        }
    }

    /// Aim one cell along `heading` if that cell is on the grid
    fn try_plan(&mut self, heading: Heading) -> bool {
        if heading == Heading::None {
            return false;
        }
        let target = self.position + heading.delta();
        if !self.in_bounds(target) {
            return false;
        }
        self.heading = heading;
        self.next_position = target;
        true
    }

    /// Perpendicular to `heading`, on the side of the destination
    fn perpendicular_toward(&self, heading: Heading) -> Heading {
        if heading.is_vertical() {
            if self.destination.x < self.position.x {
                Heading::Left
            } else {
                Heading::Right
            }
        } else if self.destination.y < self.position.y {
            Heading::Up
        } else {
            Heading::Down
        }
    }

    /// Turn 90 degrees, preferring the side of the destination. Stops when
    /// both sides leave the grid.
    fn plan_alternate(&mut self) -> bool {
        self.next_position = self.position;

        if self.heading == Heading::None {
            return false;
        }

        let toward = self.perpendicular_toward(self.heading);
        if self.try_plan(toward) || self.try_plan(toward.reverse()) {
            return true;
        }

        self.stop();
        false
    }

    pub fn stop(&mut self) {
        self.heading = Heading::None;
        self.next_position = self.position;
    }

    /// Heading for the given redirection stage, relative to the heading that
    /// was blocked when redirection began
    fn redirect_stage(&self, origin: Heading, stage: u8) -> Heading {
        match stage {
            1 => self.perpendicular_toward(origin),
            2 => origin.reverse(),
            3 => self.perpendicular_toward(origin).reverse(),
            _ => origin,
        }
    }

    /// Escalate through the redirection stages until one yields a free,
    /// in-bounds cell. Once all four are spent the vehicle stops; further
    /// calls leave it stopped until it moves or replans.
    pub fn redirect(&mut self, is_free: impl Fn(Coord) -> bool) -> bool {
        if self.redirect_attempts == 0 {
            self.redirect_origin = match self.heading {
                Heading::None => {
                    let (dx, dy) = self.position.direction_to(self.destination);
                    match (Heading::horizontal(dx), Heading::vertical(dy)) {
                        (Heading::None, Heading::None) => Heading::Up,
                        (Heading::None, vertical) => vertical,
                        (horizontal, _) => horizontal,
                    }
                }
                heading => heading,
            };
        }

        while self.redirect_attempts < MAX_REDIRECT_ATTEMPTS {
            self.redirect_attempts += 1;
            let heading = self.redirect_stage(self.redirect_origin, self.redirect_attempts);
            let target = self.position + heading.delta();

            if heading != Heading::None && self.in_bounds(target) && is_free(target) {
                self.heading = heading;
                self.next_position = target;
                return true;
            }
        }

        self.stop();
        false
    }

    /// Offer a packet to this vehicle.
    ///
    /// The sender's copy is never touched; on acceptance a copy with this
    /// vehicle appended to `visited` and age 0 is stored in the mailbox that
    /// matches the packet kind.
    pub fn admit(&mut self, packet: &Packet) -> Admission {
        let holder = self.id;
        let is_update = packet.is_update();
        let mailbox = if is_update {
            &mut self.updates
        } else {
            &mut self.payloads
        };

        if packet.source == holder && packet.visited.is_empty() {
            mailbox.store(packet.received_by(holder));
            return Admission::Originated;
        }

        if mailbox.has_seen(packet.id) {
            return Admission::Duplicate;
        }

        if packet.has_visited(holder) {
            return Admission::AlreadyVisited;
        }

        let mut copy = packet.received_by(holder);

        if is_update {
            self.directory.record(&copy);
            mailbox.store(copy);
            return Admission::Accepted;
        }

        if packet.destination == holder {
            copy.at_dest = true;
            copy.thrown = true;
            mailbox.store(copy);
            return Admission::Delivered;
        }

        mailbox.store(copy);
        Admission::Accepted
    }
}
