//! Routing engine
//!
//! Two ways of moving packets between neighboring vehicles:
//!
//! - **Flood**: every eligible packet is offered to every neighbor each tick
//!   until it expires.
//! - **Destination search**: location updates are flooded to build each
//!   vehicle's location directory, and payload packets are handed to the
//!   single neighbor that scores best against the destination's direction.
//!   A vehicle relays its updates once it has heard new ones and keeps
//!   retrying until some neighbor was there to hear them.
//!
//! Both run after movement and read the neighbor caches stamped for the
//! current tick; an older cache is an error.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info};

use super::error::SimError;
use super::fleet::Fleet;
use super::packet::{Admission, Mailbox, Packet};
use super::types::{IdAllocator, PacketId, VehicleId, FORWARD_MIN_AGE};
use super::vehicle::Vehicle;

/// Which routing algorithm the world runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingAlgorithm {
    #[default]
    Flood,
    DestinationSearch,
}

impl RoutingAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "flood" | "1" => Some(RoutingAlgorithm::Flood),
            "dest" | "dest-search" | "destination-search" | "2" => {
                Some(RoutingAlgorithm::DestinationSearch)
            }
            _ => None,
        }
    }
}

impl fmt::Display for RoutingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingAlgorithm::Flood => write!(f, "flood"),
            RoutingAlgorithm::DestinationSearch => write!(f, "destination search"),
        }
    }
}

/// A payload that reached its destination vehicle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tick: u64,
    pub packet: PacketId,
    pub vehicle: VehicleId,
    pub message: String,
}

/// What happened during one routing pass
#[derive(Debug, Clone, Default)]
pub struct RoutingReport {
    /// Payload copies accepted by a neighbor
    pub forwarded: usize,
    /// Location updates accepted by a neighbor
    pub updates_relayed: usize,
    /// Payload copies that hit the TTL
    pub expired: usize,
    /// Thrown copies dropped from mailboxes
    pub reclaimed: usize,
    pub deliveries: Vec<Delivery>,
}

/// Result of ageing one mailbox
struct Aged {
    /// Copies of packets that may be sent this pass
    eligible: Vec<Packet>,
    expired: usize,
}

/// Age every packet in the mailbox by one pass, expire the ones that
/// reached the TTL and collect the live ones at least `min_age` old
fn age_mailbox(mailbox: &mut Mailbox, min_age: u32) -> Aged {
    let mut aged = Aged {
        eligible: Vec::new(),
        expired: 0,
    };

    for packet in mailbox.iter_mut() {
        packet.age_one_pass();
        if packet.thrown {
            continue;
        }
        if packet.is_expired() {
            packet.thrown = true;
            aged.expired += 1;
            continue;
        }
        if packet.age >= min_age {
            aged.eligible.push(packet.clone());
        }
    }

    aged
}

/// Offer `packet` to `target` and account for the outcome
fn offer(
    fleet: &mut Fleet,
    target: VehicleId,
    packet: &Packet,
    tick: u64,
    report: &mut RoutingReport,
) -> bool {
    let Some(vehicle) = fleet.get_mut(target) else {
        return false;
    };

    match vehicle.admit(packet) {
        Admission::Delivered => {
            info!(
                "packet {} reached vehicle {}: {}",
                packet.id, target, packet.message
            );
            report.deliveries.push(Delivery {
                tick,
                packet: packet.id,
                vehicle: target,
                message: packet.message.clone(),
            });
            true
        }
        Admission::Accepted | Admission::Originated => {
            if packet.is_update() {
                report.updates_relayed += 1;
            } else {
                report.forwarded += 1;
            }
            true
        }
        Admission::Duplicate | Admission::AlreadyVisited => false,
    }
}

/// Drop old thrown copies, then let every mailbox forget ids that no live
/// copy anywhere in the fleet still carries
fn reclaim_all(fleet: &mut Fleet, report: &mut RoutingReport) {
    for vehicle in fleet.iter_mut() {
        report.reclaimed += vehicle.payloads.reclaim();
        report.reclaimed += vehicle.updates.reclaim();
    }

    let live: HashSet<PacketId> = fleet
        .iter()
        .flat_map(|v| v.payloads.iter().chain(v.updates.iter()))
        .filter(|p| !p.thrown)
        .map(|p| p.id)
        .collect();
    for vehicle in fleet.iter_mut() {
        vehicle.payloads.forget_settled(&live);
        vehicle.updates.forget_settled(&live);
    }
}

/// Broadcast every eligible payload to every neighbor
pub fn flood(fleet: &mut Fleet, tick: u64) -> Result<RoutingReport, SimError> {
    let mut report = RoutingReport::default();

    for id in fleet.ids() {
        let (neighbors, outgoing) = {
            let vehicle = fleet.get_mut(id).ok_or(SimError::UnknownVehicle(id))?;
            let neighbors = vehicle.neighbors.current(id, tick)?;

            // Announcements are not routed in this mode, only expired
            age_mailbox(&mut vehicle.updates, u32::MAX);
            vehicle.updates.carrying = !vehicle.updates.all_thrown();

            let aged = age_mailbox(&mut vehicle.payloads, FORWARD_MIN_AGE);
            report.expired += aged.expired;
            vehicle.payloads.carrying = !vehicle.payloads.all_thrown();
            (neighbors, aged.eligible)
        };

        for packet in &outgoing {
            for &neighbor in neighbors.iter().flatten() {
                offer(fleet, neighbor, packet, tick, &mut report);
            }
        }
    }

    reclaim_all(fleet, &mut report);
    debug!(
        "tick {}: flood forwarded {}, expired {}, delivered {}",
        tick,
        report.forwarded,
        report.expired,
        report.deliveries.len()
    );
    Ok(report)
}

/// Have every vehicle announce its own position and destination
pub fn bootstrap_directory(fleet: &mut Fleet, ids: &mut IdAllocator) {
    for vehicle in fleet.iter_mut() {
        let announcement = ids.next_packet();
        vehicle.announce(announcement);
    }
}

/// Where a destination-search holder wants to send one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopPlan {
    /// Direction of the destination's announced target, per axis
    pub ideal: (i32, i32),
    /// Neighbor that is the packet's destination, if adjacent
    pub direct: Option<VehicleId>,
    /// Neighbor scoring strictly above the holder, if any
    pub best: Option<VehicleId>,
    pub holder_score: u32,
    pub best_score: u32,
}

fn neighbor_score(holder: &Vehicle, neighbor: &Vehicle, ideal: (i32, i32)) -> u32 {
    let mut score = 0;

    if ideal != (0, 0) && neighbor.position == holder.position + ideal {
        score += 3;
    }
    if neighbor.heading.matches(ideal) {
        score += 1;
    }
    if ideal.0 != 0 && (neighbor.destination.x - holder.position.x).signum() == ideal.0 {
        score += 1;
    }
    if ideal.1 != 0 && (neighbor.destination.y - holder.position.y).signum() == ideal.1 {
        score += 1;
    }

    score
}

/// Score the holder and its neighbors for `packet`. Ties keep the earlier
/// slot; the holder keeps the packet unless a neighbor beats it.
pub fn plan_hop(
    fleet: &Fleet,
    holder: &Vehicle,
    packet: &Packet,
    neighbors: &[Option<VehicleId>; 8],
) -> HopPlan {
    let ideal = holder
        .directory
        .get(packet.destination)
        .map(|entry| holder.position.direction_to(entry.destination))
        .unwrap_or((0, 0));

    let holder_score = 1 + u32::from(holder.heading.matches(ideal));
    let mut plan = HopPlan {
        ideal,
        direct: None,
        best: None,
        holder_score,
        best_score: holder_score,
    };

    for neighbor in neighbors.iter().flatten().filter_map(|&id| fleet.get(id)) {
        if neighbor.id == packet.destination && plan.direct.is_none() {
            plan.direct = Some(neighbor.id);
        }

        let score = neighbor_score(holder, neighbor, ideal);
        if score > plan.best_score {
            plan.best = Some(neighbor.id);
            plan.best_score = score;
        }
    }

    plan
}

/// Flood location updates, then hand each eligible payload to the best
/// scoring neighbor
pub fn destination_search(fleet: &mut Fleet, tick: u64) -> Result<RoutingReport, SimError> {
    let mut report = RoutingReport::default();

    for id in fleet.ids() {
        let (neighbors, updates) = {
            let vehicle = fleet.get_mut(id).ok_or(SimError::UnknownVehicle(id))?;
            let neighbors = vehicle.neighbors.current(id, tick)?;
            let aged = age_mailbox(&mut vehicle.updates, 0);
            let updates = if vehicle.updates.carrying {
                aged.eligible
            } else {
                Vec::new()
            };
            (neighbors, updates)
        };
        let has_neighbor = neighbors.iter().any(Option::is_some);

        for update in &updates {
            for &neighbor in neighbors.iter().flatten() {
                offer(fleet, neighbor, update, tick, &mut report);
            }
        }

        let aged = {
            let vehicle = fleet.get_mut(id).ok_or(SimError::UnknownVehicle(id))?;
            // Without a neighbor the updates go out again next tick
            if has_neighbor || vehicle.updates.all_thrown() {
                vehicle.updates.carrying = false;
            }
            age_mailbox(&mut vehicle.payloads, FORWARD_MIN_AGE)
        };
        report.expired += aged.expired;
        let attempted = aged.expired > 0 || !aged.eligible.is_empty();

        for packet in &aged.eligible {
            let plan = {
                let holder = fleet.get(id).ok_or(SimError::UnknownVehicle(id))?;
                plan_hop(fleet, holder, packet, &neighbors)
            };

            let mut handed_on = false;
            if let Some(destination) = plan.direct {
                handed_on = offer(fleet, destination, packet, tick, &mut report);
            }
            if !handed_on {
                if let Some(best) = plan.best {
                    handed_on = offer(fleet, best, packet, tick, &mut report);
                }
            }

            if handed_on {
                let vehicle = fleet.get_mut(id).ok_or(SimError::UnknownVehicle(id))?;
                if let Some(copy) = vehicle.payloads.get_mut(packet.id) {
                    copy.thrown = true;
                }
            }
        }

        let vehicle = fleet.get_mut(id).ok_or(SimError::UnknownVehicle(id))?;
        if attempted && vehicle.payloads.all_thrown() {
            vehicle.payloads.carrying = false;
        }
    }

    reclaim_all(fleet, &mut report);
    debug!(
        "tick {}: destination search forwarded {}, relayed {} updates, expired {}, delivered {}",
        tick,
        report.forwarded,
        report.updates_relayed,
        report.expired,
        report.deliveries.len()
    );
    Ok(report)
}
