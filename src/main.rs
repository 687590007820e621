use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};

use vanet_sim::console::{self, Command, Reply, HELP};
use vanet_sim::simulation::{RoutingAlgorithm, SimOptions, VehicleId, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AlgorithmArg {
    Flood,
    DestSearch,
}

impl From<AlgorithmArg> for RoutingAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Flood => RoutingAlgorithm::Flood,
            AlgorithmArg::DestSearch => RoutingAlgorithm::DestinationSearch,
        }
    }
}

/// A packet to send before the first tick
#[derive(Debug, Clone)]
struct PacketArg {
    source: VehicleId,
    destination: VehicleId,
    message: String,
}

fn parse_packet(value: &str) -> Result<PacketArg, String> {
    let mut parts = value.splitn(3, ':');
    let mut id = |what: &str| -> Result<VehicleId, String> {
        let part = parts.next().unwrap_or_default();
        part.trim()
            .parse()
            .map(VehicleId)
            .map_err(|_| format!("invalid {} vehicle id '{}'", what, part))
    };
    let source = id("source")?;
    let destination = id("destination")?;
    let message = parts
        .next()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| "expected SRC:DEST:MESSAGE".to_string())?;

    Ok(PacketArg {
        source,
        destination,
        message: message.to_string(),
    })
}

#[derive(Parser)]
#[command(name = "vanet_sim")]
#[command(about = "Vehicles relaying packets to each other on a grid")]
struct Cli {
    /// Grid width in cells
    #[arg(long, default_value = "10")]
    width: i32,

    /// Grid height in cells
    #[arg(long, default_value = "10")]
    height: i32,

    /// Number of vehicles placed at random
    #[arg(long, default_value = "10")]
    vehicles: usize,

    /// Number of simulation ticks to run in headless mode
    #[arg(long, default_value = "50")]
    ticks: u32,

    /// Packet routing algorithm
    #[arg(long, value_enum, default_value_t = AlgorithmArg::Flood)]
    algorithm: AlgorithmArg,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Extra ticks a vehicle waits after every move
    #[arg(long, default_value = "0")]
    ticks_per_move: u32,

    /// Packet to generate before the first tick (repeatable)
    #[arg(long = "packet", value_name = "SRC:DEST:MESSAGE", value_parser = parse_packet)]
    packets: Vec<PacketArg>,

    /// Print the final map to stdout
    #[arg(long)]
    show_map: bool,

    /// Read menu commands from stdin instead of running headless
    #[arg(long)]
    interactive: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut world = World::with_options(SimOptions {
        algorithm: cli.algorithm.into(),
        seed: cli.seed,
        ticks_per_move: cli.ticks_per_move,
    });

    if cli.interactive {
        run_interactive(&mut world)
    } else {
        run_headless(&mut world, &cli)
    }
}

/// Run the simulation in headless mode (no menu)
fn run_headless(world: &mut World, cli: &Cli) -> Result<()> {
    info!("Running vehicle relay simulation in headless mode...");
    info!(
        "Grid: {} x {}, vehicles: {}, ticks: {}, algorithm: {}",
        cli.width,
        cli.height,
        cli.vehicles,
        cli.ticks,
        world.algorithm()
    );

    world
        .init_world(cli.width, cli.height)
        .context("failed to create the world")?;
    world
        .populate_world(cli.vehicles)
        .with_context(|| format!("failed to place {} vehicles", cli.vehicles))?;

    for packet in &cli.packets {
        world
            .generate_packet(&packet.message, packet.destination, packet.source)
            .with_context(|| {
                format!(
                    "failed to generate packet {} -> {}",
                    packet.source, packet.destination
                )
            })?;
    }

    for _ in 0..cli.ticks {
        world.tick().context("tick failed")?;

        let summary = world.summary();
        if summary.tick % 10 == 0 {
            info!(
                "--- After tick {}: {} delivered, {} live packet copies ---",
                summary.tick, summary.packets_delivered, summary.live_copies
            );
        }
    }

    if cli.show_map {
        println!("{}", world.display_world()?);
    }

    info!("=== SIMULATION COMPLETE ===");
    world.log_summary();
    for delivery in world.deliveries() {
        info!(
            "Delivered {} to vehicle {} at tick {}: {}",
            delivery.packet, delivery.vehicle, delivery.tick, delivery.message
        );
    }
    Ok(())
}

/// Read commands from stdin until `q` or end of input
fn run_interactive(world: &mut World) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("{}", HELP);
    print!("Command: ");
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line.context("failed to read command")?;

        match line.parse::<Command>() {
            Ok(command) => {
                debug!("command: {:?}", command);
                match console::execute(world, command) {
                    Reply::Text(text) => println!("{}", text),
                    Reply::Quit => {
                        println!("Simulation terminating...");
                        return Ok(());
                    }
                }
            }
            Err(console::CommandError::Empty) => {}
            Err(err) => {
                warn!("{}", err);
                println!("ERROR: {}", err);
            }
        }

        print!("Command: ");
        stdout.flush()?;
    }

    Ok(())
}
