//! Location directory built from location-update packets

use std::collections::HashMap;

use super::packet::Packet;
use super::types::{Coord, PacketId, VehicleId};

/// Last known whereabouts of a remote vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationEntry {
    /// Destination the vehicle announced
    pub destination: Coord,
    /// Where the vehicle was when it announced
    pub announced_from: Coord,
    /// Update packet the entry came from
    pub announcement: PacketId,
}

#[derive(Debug, Clone, Default)]
pub struct LocationDirectory {
    entries: HashMap<VehicleId, LocationEntry>,
}

impl LocationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the announcement carried by an update packet. An announcement
    /// older than the one on file is ignored.
    pub fn record(&mut self, update: &Packet) {
        if let Some(entry) = self.entries.get(&update.source) {
            if entry.announcement > update.id {
                return;
            }
        }

        self.entries.insert(
            update.source,
            LocationEntry {
                destination: update.dest_coord,
                announced_from: update.source_coord,
                announcement: update.id,
            },
        );
    }

    pub fn get(&self, vehicle: VehicleId) -> Option<&LocationEntry> {
        self.entries.get(&vehicle)
    }

    pub fn knows(&self, vehicle: VehicleId) -> bool {
        self.entries.contains_key(&vehicle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
