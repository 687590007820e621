//! Interactive console
//!
//! One command per line:
//!
//! ```text
//! d                 display the world
//! i W H             create an empty W x H world
//! p N               add N random vehicles
//! r                 run one tick
//! R N               run N ticks
//! g SRC DEST MSG    send MSG from vehicle SRC to vehicle DEST
//! x ID              remove vehicle ID
//! a flood|dest      choose the routing algorithm
//! h                 list commands
//! q                 quit
//! ```

use std::str::FromStr;

use log::warn;
use thiserror::Error;

use crate::simulation::{RoutingAlgorithm, VehicleId, World};

pub const HELP: &str = "\
Simulator Commands
  d              - Display world
  i W H          - Initialize a W x H world
  p N            - Populate world with N vehicles
  g SRC DEST MSG - Generate a packet from SRC to DEST
  r              - Run world one tick
  R N            - Run world N ticks
  x ID           - Remove vehicle ID
  a flood|dest   - Select routing algorithm
  h              - Show this help
  q              - Terminate simulator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Display,
    Init { width: i32, height: i32 },
    Populate(usize),
    Run(u32),
    Generate {
        source: VehicleId,
        destination: VehicleId,
        message: String,
    },
    Remove(VehicleId),
    Algorithm(RoutingAlgorithm),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("unknown routing algorithm '{0}'")]
    UnknownAlgorithm(String),
}

fn number<T: FromStr>(
    token: Option<&str>,
    command: &'static str,
    argument: &'static str,
) -> Result<T, CommandError> {
    let token = token.ok_or(CommandError::MissingArgument { command, argument })?;
    token
        .parse()
        .map_err(|_| CommandError::InvalidNumber(token.to_string()))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next().ok_or(CommandError::Empty)?;

        match name {
            "d" => Ok(Command::Display),
            "i" => Ok(Command::Init {
                width: number(tokens.next(), "i", "a width")?,
                height: number(tokens.next(), "i", "a height")?,
            }),
            "p" => Ok(Command::Populate(number(
                tokens.next(),
                "p",
                "a vehicle count",
            )?)),
            "r" => Ok(Command::Run(1)),
            "R" => Ok(Command::Run(number(tokens.next(), "R", "a tick count")?)),
            "g" => {
                let source = VehicleId(number(tokens.next(), "g", "a source vehicle id")?);
                let destination =
                    VehicleId(number(tokens.next(), "g", "a destination vehicle id")?);
                let message = tokens.collect::<Vec<_>>().join(" ");
                if message.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "g",
                        argument: "a message",
                    });
                }
                Ok(Command::Generate {
                    source,
                    destination,
                    message,
                })
            }
            "x" => Ok(Command::Remove(VehicleId(number(
                tokens.next(),
                "x",
                "a vehicle id",
            )?))),
            "a" => {
                let name = tokens.next().ok_or(CommandError::MissingArgument {
                    command: "a",
                    argument: "an algorithm name",
                })?;
                RoutingAlgorithm::from_name(name)
                    .map(Command::Algorithm)
                    .ok_or_else(|| CommandError::UnknownAlgorithm(name.to_string()))
            }
            "h" | "?" => Ok(Command::Help),
            "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// What the console should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// Apply a command to the world. Failures are reported as text; the world
/// is left as it was.
pub fn execute(world: &mut World, command: Command) -> Reply {
    let text = match command {
        Command::Display => match world.display_world() {
            Ok(map) => map,
            Err(err) => failure(err),
        },
        Command::Init { width, height } => match world.init_world(width, height) {
            Ok(()) => format!("{} by {} world created", width, height),
            Err(err) => failure(err),
        },
        Command::Populate(count) => match world.populate_world(count) {
            Ok(()) => format!("{} vehicles created", count),
            Err(err) => failure(err),
        },
        Command::Run(ticks) => match world.run_world(ticks) {
            Ok(map) => format!("tick {}\n{}", world.current_tick(), map),
            Err(err) => failure(err),
        },
        Command::Generate {
            source,
            destination,
            message,
        } => {
            if world.vehicle_count() < 2 {
                warn!("packet not generated: fewer than two vehicles");
                "Too few vehicles in world to generate a packet".to_string()
            } else {
                match world.generate_packet(&message, destination, source) {
                    Ok(id) => format!(
                        "packet {} queued at vehicle {} for vehicle {}",
                        id, source, destination
                    ),
                    Err(err) => failure(err),
                }
            }
        }
        Command::Remove(id) => match world.remove_vehicle(id) {
            Ok(()) => format!("vehicle {} removed", id),
            Err(err) => failure(err),
        },
        Command::Algorithm(algorithm) => {
            world.set_algorithm(algorithm);
            format!("Using {} routing", algorithm)
        }
        Command::Help => HELP.to_string(),
        Command::Quit => return Reply::Quit,
    };

    Reply::Text(text)
}

fn failure(err: impl std::fmt::Display) -> String {
    warn!("{}", err);
    format!("ERROR: {}", err)
}
