//! Packets and the per-vehicle mailboxes that hold them

use std::collections::HashSet;

use super::types::{Coord, PacketId, VehicleId, PACKET_TTL, RECLAIM_AGE};

/// What a packet carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// A user message travelling toward a destination vehicle
    Payload,
    /// A location announcement feeding the location directory
    LocationUpdate,
}

/// One copy of a packet held by a vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub id: PacketId,
    pub kind: PacketKind,
    pub source: VehicleId,
    /// Destination vehicle. Location updates are addressed to their source.
    pub destination: VehicleId,
    /// Where the source was when the packet was created
    pub source_coord: Coord,
    /// Payload: where the destination was at creation.
    /// Location update: the announced destination of the source.
    pub dest_coord: Coord,
    /// Routing passes this copy has been held for
    pub age: u32,
    /// Vehicles this copy has passed through, in order
    pub visited: Vec<VehicleId>,
    /// Terminal: delivered, expired or handed on
    pub thrown: bool,
    pub at_dest: bool,
    pub message: String,
}

impl Packet {
    pub fn payload(
        id: PacketId,
        source: VehicleId,
        source_coord: Coord,
        destination: VehicleId,
        dest_coord: Coord,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind: PacketKind::Payload,
            source,
            destination,
            source_coord,
            dest_coord,
            age: 0,
            visited: Vec::new(),
            thrown: false,
            at_dest: false,
            message: message.into(),
        }
    }

    /// Announcement of `source`'s position and destination
    pub fn location_update(
        id: PacketId,
        source: VehicleId,
        position: Coord,
        destination: Coord,
    ) -> Self {
        Self {
            id,
            kind: PacketKind::LocationUpdate,
            source,
            destination: source,
            source_coord: position,
            dest_coord: destination,
            age: 0,
            visited: Vec::new(),
            thrown: false,
            at_dest: false,
            message: String::new(),
        }
    }

    pub fn is_update(&self) -> bool {
        self.kind == PacketKind::LocationUpdate
    }

    pub fn has_visited(&self, vehicle: VehicleId) -> bool {
        self.visited.contains(&vehicle)
    }

    /// Advance the age by one routing pass
    pub fn age_one_pass(&mut self) {
        self.age = self.age.saturating_add(1);
    }

    pub fn is_expired(&self) -> bool {
        self.age >= PACKET_TTL
    }

    /// Copy stored by the vehicle that accepts this packet
    pub(crate) fn received_by(&self, holder: VehicleId) -> Packet {
        let mut copy = self.clone();
        copy.visited.push(holder);
        copy.age = 0;
        copy.thrown = false;
        copy.at_dest = false;
        copy
    }
}

/// Outcome of offering a packet to a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First hop at the source vehicle
    Originated,
    /// Stored for onward routing
    Accepted,
    /// Stored and addressed to this vehicle; the message has arrived
    Delivered,
    /// A copy with the same packet id was accepted before
    Duplicate,
    /// This vehicle already appears in the packet's visited list
    AlreadyVisited,
}

/// Packets held by a vehicle, one store per packet kind
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    packets: Vec<Packet>,
    /// Ids accepted here that are still held or still live somewhere
    seen: HashSet<PacketId>,
    /// Set while the mailbox may hold a packet that still needs routing
    pub carrying: bool,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, id: PacketId) -> bool {
        self.seen.contains(&id)
    }

    pub(crate) fn store(&mut self, packet: Packet) {
        self.seen.insert(packet.id);
        if !packet.thrown {
            self.carrying = true;
        }
        self.packets.push(packet);
    }

    pub fn get(&self, id: PacketId) -> Option<&Packet> {
        self.packets.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PacketId) -> Option<&mut Packet> {
        self.packets.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Packet> {
        self.packets.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Packets still eligible for routing
    pub fn live_count(&self) -> usize {
        self.packets.iter().filter(|p| !p.thrown).count()
    }

    pub fn all_thrown(&self) -> bool {
        self.packets.iter().all(|p| p.thrown)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Drop thrown copies that are old enough. Their ids stay in the
    /// seen-set until `forget_settled` finds no live copy of them.
    pub fn reclaim(&mut self) -> usize {
        let before = self.packets.len();
        self.packets.retain(|p| !(p.thrown && p.age >= RECLAIM_AGE));
        before - self.packets.len()
    }

    /// Forget ids that are not held here and have no live copy in `live`.
    /// Only live copies are ever offered, so such an id cannot come back.
    pub(crate) fn forget_settled(&mut self, live: &HashSet<PacketId>) {
        let held: HashSet<PacketId> = self.packets.iter().map(|p| p.id).collect();
        self.seen.retain(|id| held.contains(id) || live.contains(id));
    }
}
