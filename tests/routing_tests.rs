use std::collections::HashMap;

use vanet_sim::simulation::{
    plan_hop, Admission, Coord, Fleet, LocationDirectory, Packet, PacketId, RoutingAlgorithm,
    SimError, SimOptions, Vehicle, VehicleId, VehicleKind, World, FORWARD_MIN_AGE, PACKET_TTL,
    RECLAIM_AGE,
};

fn world_with(algorithm: RoutingAlgorithm, width: i32, height: i32) -> World {
    let mut world = World::with_options(SimOptions {
        algorithm,
        seed: Some(17),
        ticks_per_move: u32::MAX,
    });
    world.init_world(width, height).unwrap();
    world
}

/// Four vehicles in a row that never move, each heading down the grid
fn line_of_four(world: &mut World) -> Vec<VehicleId> {
    (0..4)
        .map(|x| {
            world
                .spawn_vehicle_at(Coord::new(x, 0), Coord::new(x, 3))
                .unwrap()
        })
        .collect()
}

/// Ticks until the first delivery, giving up after `limit`
fn ticks_until_delivery(world: &mut World, limit: u64) -> Option<u64> {
    let start = world.current_tick();
    for _ in 0..limit {
        world.tick().unwrap();
        if let Some(delivery) = world.deliveries().first() {
            return Some(delivery.tick - start);
        }
    }
    None
}

#[test]
fn test_flood_chain_delivers_one_hop_per_tick() {
    let mut world = world_with(RoutingAlgorithm::Flood, 4, 4);
    let ids = line_of_four(&mut world);
    let packet = world.generate_packet("over the hill", ids[3], ids[0]).unwrap();

    world.tick().unwrap();
    world.tick().unwrap();
    assert!(world.deliveries().is_empty());

    world.tick().unwrap();
    let delivery = &world.deliveries()[0];
    assert_eq!(delivery.tick, 3);
    assert_eq!(delivery.vehicle, ids[3]);
    assert_eq!(delivery.packet, packet);
    assert_eq!(delivery.message, "over the hill");

    let copies = world.packet_copies(packet);
    let (_, delivered) = copies
        .iter()
        .find(|(holder, _)| *holder == ids[3])
        .copied()
        .unwrap();
    assert!(delivered.at_dest);
    assert!(delivered.thrown);
    assert_eq!(delivered.visited, ids);
}

#[test]
fn test_flood_delivers_only_once() {
    let mut world = world_with(RoutingAlgorithm::Flood, 4, 4);
    let ids = line_of_four(&mut world);
    world.generate_packet("once", ids[3], ids[0]).unwrap();

    world.run_world(15).unwrap();
    assert_eq!(world.deliveries().len(), 1);
}

#[test]
fn test_isolated_packet_expires_and_is_reclaimed() {
    let mut world = world_with(RoutingAlgorithm::Flood, 5, 5);
    let a = world
        .spawn_vehicle_at(Coord::new(0, 0), Coord::new(0, 0))
        .unwrap();
    let b = world
        .spawn_vehicle_at(Coord::new(4, 4), Coord::new(4, 4))
        .unwrap();
    let packet = world.generate_packet("alone", b, a).unwrap();

    world.run_world(3).unwrap();
    assert!(!world.is_packet_settled(packet));
    assert!(world.vehicle(a).unwrap().holds_packet());

    world.tick().unwrap();
    assert!(world.is_packet_settled(packet));
    let copies = world.packet_copies(packet);
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].1.age, PACKET_TTL);
    assert!(!world.vehicle(a).unwrap().holds_packet());

    // the thrown copy stays visible until it is old enough to reclaim
    world.run_world(RECLAIM_AGE - PACKET_TTL - 1).unwrap();
    assert_eq!(world.packet_copies(packet).len(), 1);
    assert!(world.vehicle(a).unwrap().payloads.has_seen(packet));
    world.tick().unwrap();
    assert!(world.packet_copies(packet).is_empty());

    // nothing carries the id any more, so it is forgotten as well
    assert!(!world.vehicle(a).unwrap().payloads.has_seen(packet));
    assert_eq!(world.vehicle(a).unwrap().payloads.seen_count(), 0);

    world.run_world(20).unwrap();
    assert!(world.deliveries().is_empty());
}

#[test]
fn test_corner_to_corner_packet_settles_within_twenty_ticks() {
    let mut world = World::with_options(SimOptions {
        algorithm: RoutingAlgorithm::Flood,
        seed: Some(4),
        ticks_per_move: 0,
    });
    world.init_world(10, 10).unwrap();
    let first = world
        .spawn_vehicle_at(Coord::new(0, 0), Coord::new(9, 9))
        .unwrap();
    let second = world
        .spawn_vehicle_at(Coord::new(9, 9), Coord::new(0, 0))
        .unwrap();
    assert_eq!((first, second), (VehicleId(0), VehicleId(1)));

    let packet = world.generate_packet("hi", VehicleId(1), VehicleId(0)).unwrap();
    world.run_world(20).unwrap();

    assert!(world.is_packet_settled(packet));
    for delivery in world.deliveries() {
        assert_eq!(delivery.packet, packet);
        assert_eq!(delivery.vehicle, VehicleId(1));
        assert!(delivery.tick <= 20);
    }
}

#[test]
fn test_destination_search_bootstraps_directories() {
    let mut world = world_with(RoutingAlgorithm::DestinationSearch, 4, 4);
    let ids = line_of_four(&mut world);

    world.tick().unwrap();
    let last = world.vehicle(ids[3]).unwrap();
    for id in &ids[..3] {
        assert!(last.directory.knows(*id));
    }
    assert!(!last.directory.knows(ids[3]));

    assert_eq!(last.neighbors.tick(), Some(1));
    assert_eq!(last.neighbors.slots()[3], Some(ids[2]));
    assert_eq!(last.neighbors.occupied(), 1);
    assert_eq!(
        last.neighbors.current(ids[3], 2),
        Err(SimError::StaleAdjacency {
            vehicle: ids[3],
            cached: 1,
            current: 2,
        })
    );

    world.run_world(3).unwrap();
    let first = world.vehicle(ids[0]).unwrap();
    let entry = first.directory.get(ids[3]).unwrap();
    assert_eq!(entry.destination, Coord::new(3, 3));
    assert_eq!(entry.announced_from, Coord::new(3, 0));
}

#[test]
fn test_destination_search_no_slower_than_flood() {
    let mut flood = world_with(RoutingAlgorithm::Flood, 4, 4);
    let ids = line_of_four(&mut flood);
    flood.run_world(4).unwrap();
    flood.generate_packet("race", ids[3], ids[0]).unwrap();
    let flood_ticks = ticks_until_delivery(&mut flood, 10).unwrap();

    let mut search = world_with(RoutingAlgorithm::DestinationSearch, 4, 4);
    let ids = line_of_four(&mut search);
    search.run_world(4).unwrap();
    let packet = search.generate_packet("race", ids[3], ids[0]).unwrap();
    let search_ticks = ticks_until_delivery(&mut search, 10).unwrap();

    assert!(search_ticks <= flood_ticks);
    assert_eq!(search_ticks, 3);

    // single path: each holder handed the packet on and dropped its copy
    let copies = search.packet_copies(packet);
    assert_eq!(copies.len(), 4);
    assert!(copies.iter().all(|(_, copy)| copy.thrown));
}

#[test]
fn test_destination_search_keeps_packet_without_better_neighbor() {
    let mut world = world_with(RoutingAlgorithm::DestinationSearch, 5, 5);
    let a = world
        .spawn_vehicle_at(Coord::new(2, 2), Coord::new(2, 4))
        .unwrap();
    // Neighbor heading away from the holder
    world
        .spawn_vehicle_at(Coord::new(1, 2), Coord::new(0, 2))
        .unwrap();
    let far = world
        .spawn_vehicle_at(Coord::new(4, 0), Coord::new(4, 0))
        .unwrap();

    let packet = world.generate_packet("stay", far, a).unwrap();
    world.run_world(3).unwrap();

    let copies = world.packet_copies(packet);
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].0, a);
}

#[test]
fn test_ages_never_decrease_and_thrown_copies_never_travel() {
    for algorithm in [RoutingAlgorithm::Flood, RoutingAlgorithm::DestinationSearch] {
        let mut world = World::with_options(SimOptions {
            algorithm,
            seed: Some(31),
            ticks_per_move: 0,
        });
        world.init_world(8, 8).unwrap();
        world.populate_world(24).unwrap();

        let ids: Vec<VehicleId> = world.vehicles().map(|v| v.id).collect();
        let mut packets = Vec::new();
        for pair in ids.chunks(2).take(6) {
            packets.push(world.generate_packet("ping", pair[1], pair[0]).unwrap());
        }

        let snapshot = |world: &World| -> HashMap<(VehicleId, PacketId), (u32, bool)> {
            let mut state = HashMap::new();
            for packet in &packets {
                for (holder, copy) in world.packet_copies(*packet) {
                    state.insert((holder, *packet), (copy.age, copy.thrown));
                }
            }
            state
        };

        let mut before = snapshot(&world);
        for _ in 0..25 {
            world.tick().unwrap();
            let after = snapshot(&world);

            for (key, (age, thrown)) in &after {
                match before.get(key) {
                    Some((old_age, old_thrown)) => {
                        assert!(age >= old_age);
                        assert!(*thrown || !*old_thrown);
                    }
                    None => {
                        let copies = world.packet_copies(key.1);
                        let (_, copy) = copies.iter().find(|(h, _)| *h == key.0).unwrap();
                        let sender = copy.visited[copy.visited.len() - 2];
                        let (_, sender_thrown) = before[&(sender, key.1)];
                        assert!(!sender_thrown, "thrown copy at {} was forwarded", sender);
                    }
                }
            }

            before = after;
        }
    }
}

#[test]
fn test_admission_rules() {
    let mut holder = Vehicle::new(
        VehicleId(1),
        VehicleKind::Taxi,
        Coord::new(1, 1),
        Coord::new(1, 1),
        3,
        3,
        0,
    );

    let packet = Packet::payload(
        PacketId(10),
        VehicleId(0),
        Coord::new(0, 0),
        VehicleId(2),
        Coord::new(2, 2),
        "hello",
    );
    let mut sent = packet.clone();
    sent.visited.push(VehicleId(0));
    sent.age = 3;

    assert_eq!(holder.admit(&sent), Admission::Accepted);
    let stored = holder.payloads.get(PacketId(10)).unwrap();
    assert_eq!(stored.age, 0);
    assert_eq!(stored.visited, vec![VehicleId(0), VehicleId(1)]);
    assert_eq!(sent.visited, vec![VehicleId(0)]);

    assert_eq!(holder.admit(&sent), Admission::Duplicate);

    let mut looped = Packet::payload(
        PacketId(11),
        VehicleId(0),
        Coord::new(0, 0),
        VehicleId(2),
        Coord::new(2, 2),
        "loop",
    );
    looped.visited = vec![VehicleId(0), VehicleId(1), VehicleId(2)];
    assert_eq!(holder.admit(&looped), Admission::AlreadyVisited);
    assert!(!holder.payloads.has_seen(PacketId(11)));

    let mut for_me = Packet::payload(
        PacketId(12),
        VehicleId(0),
        Coord::new(0, 0),
        VehicleId(1),
        Coord::new(1, 1),
        "mine",
    );
    for_me.visited.push(VehicleId(0));
    assert_eq!(holder.admit(&for_me), Admission::Delivered);
    let delivered = holder.payloads.get(PacketId(12)).unwrap();
    assert!(delivered.at_dest && delivered.thrown);

    let update = Packet::location_update(
        PacketId(13),
        VehicleId(1),
        Coord::new(1, 1),
        Coord::new(0, 2),
    );
    assert_eq!(holder.admit(&update), Admission::Originated);
    assert!(!holder.directory.knows(VehicleId(1)));

    let mut relayed = Packet::location_update(
        PacketId(14),
        VehicleId(5),
        Coord::new(2, 0),
        Coord::new(0, 0),
    );
    relayed.visited.push(VehicleId(5));
    assert_eq!(holder.admit(&relayed), Admission::Accepted);
    assert_eq!(
        holder.directory.get(VehicleId(5)).unwrap().announcement,
        PacketId(14)
    );
    assert_eq!(
        holder.directory.get(VehicleId(5)).unwrap().destination,
        Coord::new(0, 0)
    );
    assert!(holder.updates.has_seen(PacketId(14)));
    assert!(!holder.payloads.has_seen(PacketId(14)));

    // an update that already passed through this vehicle is turned away
    let mut echoed = Packet::location_update(
        PacketId(15),
        VehicleId(6),
        Coord::new(0, 1),
        Coord::new(2, 1),
    );
    echoed.visited = vec![VehicleId(6), VehicleId(1), VehicleId(7)];
    assert_eq!(holder.admit(&echoed), Admission::AlreadyVisited);
    assert!(!holder.directory.knows(VehicleId(6)));
    assert!(!holder.updates.has_seen(PacketId(15)));
}

fn parked(id: u32, position: Coord, destination: Coord) -> Vehicle {
    Vehicle::new(
        VehicleId(id),
        VehicleKind::Taxi,
        position,
        destination,
        5,
        5,
        0,
    )
}

fn payload_for(destination: VehicleId) -> Packet {
    let mut packet = Packet::payload(
        PacketId(50),
        VehicleId(0),
        Coord::new(2, 2),
        destination,
        Coord::new(4, 2),
        "m",
    );
    packet.visited.push(VehicleId(0));
    packet
}

/// Holder at (2,2) heading down, knowing vehicle 9 is bound for (4,2)
fn informed_holder() -> Vehicle {
    let mut holder = parked(0, Coord::new(2, 2), Coord::new(2, 4));
    holder.directory.record(&Packet::location_update(
        PacketId(100),
        VehicleId(9),
        Coord::new(4, 0),
        Coord::new(4, 2),
    ));
    holder
}

#[test]
fn test_plan_hop_prefers_cell_toward_destination() {
    let holder = informed_holder();
    let mut fleet = Fleet::new();
    // slot 2: up-right, heading right, bound further right
    fleet.insert(parked(2, Coord::new(3, 1), Coord::new(4, 1)));
    // slot 4: exactly one step toward the destination
    fleet.insert(parked(1, Coord::new(3, 2), Coord::new(3, 2)));

    let mut neighbors = [None; 8];
    neighbors[2] = Some(VehicleId(2));
    neighbors[4] = Some(VehicleId(1));

    let plan = plan_hop(&fleet, &holder, &payload_for(VehicleId(9)), &neighbors);
    assert_eq!(plan.ideal, (1, 0));
    assert_eq!(plan.holder_score, 1);
    assert_eq!(plan.best, Some(VehicleId(1)));
    assert_eq!(plan.best_score, 4);
    assert_eq!(plan.direct, None);
}

#[test]
fn test_plan_hop_ties_keep_earliest_slot() {
    let holder = informed_holder();
    let mut fleet = Fleet::new();
    fleet.insert(parked(3, Coord::new(1, 1), Coord::new(4, 1)));
    fleet.insert(parked(2, Coord::new(3, 1), Coord::new(4, 1)));

    let mut neighbors = [None; 8];
    neighbors[0] = Some(VehicleId(3));
    neighbors[2] = Some(VehicleId(2));

    let plan = plan_hop(&fleet, &holder, &payload_for(VehicleId(9)), &neighbors);
    assert_eq!(plan.best, Some(VehicleId(3)));
    assert_eq!(plan.best_score, 2);
}

#[test]
fn test_plan_hop_without_directory_entry_keeps_packet() {
    let holder = parked(0, Coord::new(2, 2), Coord::new(2, 4));
    let mut fleet = Fleet::new();
    fleet.insert(parked(1, Coord::new(3, 2), Coord::new(4, 2)));

    let mut neighbors = [None; 8];
    neighbors[4] = Some(VehicleId(1));

    let plan = plan_hop(&fleet, &holder, &payload_for(VehicleId(9)), &neighbors);
    assert_eq!(plan.ideal, (0, 0));
    assert_eq!(plan.holder_score, 1);
    assert_eq!(plan.best, None);
}

#[test]
fn test_plan_hop_spots_destination_neighbor() {
    let holder = informed_holder();
    let mut fleet = Fleet::new();
    fleet.insert(parked(9, Coord::new(1, 3), Coord::new(0, 4)));

    let mut neighbors = [None; 8];
    neighbors[5] = Some(VehicleId(9));

    let plan = plan_hop(&fleet, &holder, &payload_for(VehicleId(9)), &neighbors);
    assert_eq!(plan.direct, Some(VehicleId(9)));
    assert_eq!(plan.best, None);
}

#[test]
fn test_destination_search_holder_keeps_flag_until_ttl() {
    let mut world = world_with(RoutingAlgorithm::DestinationSearch, 5, 5);
    let a = world
        .spawn_vehicle_at(Coord::new(2, 2), Coord::new(2, 4))
        .unwrap();
    world
        .spawn_vehicle_at(Coord::new(1, 2), Coord::new(0, 2))
        .unwrap();
    let far = world
        .spawn_vehicle_at(Coord::new(4, 0), Coord::new(4, 0))
        .unwrap();

    let packet = world.generate_packet("hold", far, a).unwrap();

    // kept every tick while it ages toward the TTL
    for age in FORWARD_MIN_AGE..PACKET_TTL {
        world.tick().unwrap();
        let copy = world.vehicle(a).unwrap().payloads.get(packet).unwrap();
        assert_eq!(copy.age, age);
        assert!(!copy.thrown);
        assert!(world.vehicle(a).unwrap().holds_packet());
    }

    world.tick().unwrap();
    let copy = world.vehicle(a).unwrap().payloads.get(packet).unwrap();
    assert_eq!(copy.age, PACKET_TTL);
    assert!(copy.thrown);
    assert!(!world.vehicle(a).unwrap().holds_packet());
    assert_eq!(world.last_routing().expired, 1);
    assert!(world.is_packet_settled(packet));
}

#[test]
fn test_destination_search_flag_follows_the_packet() {
    let mut world = world_with(RoutingAlgorithm::DestinationSearch, 4, 4);
    let ids = line_of_four(&mut world);
    world.run_world(4).unwrap();
    world.generate_packet("relay", ids[3], ids[0]).unwrap();
    assert!(world.vehicle(ids[0]).unwrap().holds_packet());

    // the sender clears once its copy is handed on; the new holder's copy
    // is too young to move, so it keeps the flag
    world.tick().unwrap();
    assert!(!world.vehicle(ids[0]).unwrap().holds_packet());
    assert!(world.vehicle(ids[1]).unwrap().holds_packet());

    world.tick().unwrap();
    assert!(!world.vehicle(ids[1]).unwrap().holds_packet());
    assert!(world.vehicle(ids[2]).unwrap().holds_packet());

    world.tick().unwrap();
    assert_eq!(world.deliveries().len(), 1);
    for id in &ids {
        assert!(!world.vehicle(*id).unwrap().holds_packet());
    }
}

#[test]
fn test_updates_wait_for_a_neighbor_then_go_out_once() {
    let mut world = world_with(RoutingAlgorithm::DestinationSearch, 5, 5);
    let a = world
        .spawn_vehicle_at(Coord::new(0, 0), Coord::new(0, 4))
        .unwrap();
    let b = world
        .spawn_vehicle_at(Coord::new(4, 4), Coord::new(4, 0))
        .unwrap();

    world.run_world(2).unwrap();
    assert_eq!(world.last_routing().updates_relayed, 0);
    assert!(world.vehicle(a).unwrap().updates.carrying);

    let c = world
        .spawn_vehicle_at(Coord::new(1, 0), Coord::new(1, 4))
        .unwrap();
    world.tick().unwrap();
    assert_eq!(world.last_routing().updates_relayed, 1);
    assert!(world.vehicle(c).unwrap().directory.knows(a));
    assert!(!world.vehicle(a).unwrap().updates.carrying);
    assert!(!world.vehicle(c).unwrap().updates.carrying);

    // heard once, nothing new to say
    world.tick().unwrap();
    assert_eq!(world.last_routing().updates_relayed, 0);
    assert!(world.vehicle(b).unwrap().updates.carrying);

    // b never found anyone; its flag drops when its update expires
    world.tick().unwrap();
    assert!(!world.vehicle(b).unwrap().updates.carrying);
}

#[test]
fn test_directory_keeps_latest_announcement() {
    let newer = Packet::location_update(
        PacketId(20),
        VehicleId(4),
        Coord::new(3, 3),
        Coord::new(0, 0),
    );
    let older = Packet::location_update(
        PacketId(12),
        VehicleId(4),
        Coord::new(1, 1),
        Coord::new(2, 2),
    );

    let mut directory = LocationDirectory::new();
    directory.record(&newer);
    directory.record(&older);

    let entry = directory.get(VehicleId(4)).unwrap();
    assert_eq!(entry.destination, Coord::new(0, 0));
    assert_eq!(entry.announced_from, Coord::new(3, 3));
    assert_eq!(entry.announcement, PacketId(20));
    assert_eq!(directory.len(), 1);

    let newest = Packet::location_update(
        PacketId(31),
        VehicleId(4),
        Coord::new(0, 0),
        Coord::new(4, 1),
    );
    directory.record(&newest);
    assert_eq!(
        directory.get(VehicleId(4)).unwrap().destination,
        Coord::new(4, 1)
    );
}

#[test]
fn test_seen_ids_stay_bounded_over_long_runs() {
    for algorithm in [RoutingAlgorithm::Flood, RoutingAlgorithm::DestinationSearch] {
        let mut world = World::with_options(SimOptions {
            algorithm,
            seed: Some(23),
            ticks_per_move: 0,
        });
        world.init_world(10, 10).unwrap();
        world.populate_world(30).unwrap();
        let ids: Vec<VehicleId> = world.vehicles().map(|v| v.id).collect();

        for round in 0..200 {
            if round % 20 == 0 {
                let source = ids[round % ids.len()];
                let destination = ids[(round + 7) % ids.len()];
                world.generate_packet("tick tock", destination, source).unwrap();
            }
            world.tick().unwrap();

            let live: std::collections::HashSet<PacketId> = world
                .vehicles()
                .flat_map(|v| v.payloads.iter().chain(v.updates.iter()))
                .filter(|p| !p.thrown)
                .map(|p| p.id)
                .collect();
            for vehicle in world.vehicles() {
                for mailbox in [&vehicle.payloads, &vehicle.updates] {
                    assert!(mailbox.seen_count() <= mailbox.len() + live.len());
                }
            }
        }
    }
}
