//! Text rendering of the grid
//!
//! Every cell is drawn as a 5x9 intersection tile. An occupied tile shows the
//! vehicle id, an arrow for its heading and `*` when it is carrying a packet.
//! Rendering only reads state.

use std::fmt;

use super::fleet::Fleet;
use super::grid::Grid;
use super::types::{Coord, Heading};
use super::vehicle::Vehicle;

pub const TILE_ROWS: usize = 5;
pub const TILE_WIDTH: usize = 9;

const UPPER_SCORE: &str = "\u{23ba}";

/// Road drawn between two tiles on the same row band
const ROADWAY: [&str; TILE_ROWS] = ["_", " ", " ", " ", UPPER_SCORE];

fn centered(text: &str) -> String {
    format!("{:^width$}", text, width = TILE_WIDTH)
}

fn tile(vehicle: Option<&Vehicle>) -> [String; TILE_ROWS] {
    let blank = centered("");
    let mut rows = [
        "_|     |_".to_string(),
        blank.clone(),
        blank.clone(),
        blank,
        format!("{UPPER_SCORE}|     |{UPPER_SCORE}"),
    ];

    let Some(vehicle) = vehicle else {
        return rows;
    };

    let label = vehicle.id.to_string();
    let star = if vehicle.holds_packet() { "*" } else { "" };

    match vehicle.heading {
        Heading::None => rows[2] = centered(&format!("{label}{star}")),
        Heading::Up => {
            rows[1] = centered("^");
            if star.is_empty() {
                rows[2] = centered(&label);
            } else {
                rows[2] = centered(star);
                rows[3] = centered(&label);
            }
        }
        Heading::Down => {
            if star.is_empty() {
                rows[2] = centered(&label);
            } else {
                rows[1] = centered(&label);
                rows[2] = centered(star);
            }
            rows[3] = centered("v");
        }
        Heading::Left => rows[2] = centered(&format!("<{star}{label}")),
        Heading::Right => rows[2] = centered(&format!("{label}{star}>")),
    }

    rows
}

/// Borrowed view of the world that renders as text
pub struct GridView<'a> {
    pub grid: &'a Grid,
    pub fleet: &'a Fleet,
}

impl fmt::Display for GridView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.grid.width();

        for y in 0..self.grid.height() {
            let tiles: Vec<[String; TILE_ROWS]> = (0..width)
                .map(|x| {
                    let occupant = self.grid.occupant(Coord::new(x, y)).ok().flatten();
                    tile(occupant.and_then(|id| self.fleet.get(id)))
                })
                .collect();

            for (row, roadway) in ROADWAY.iter().enumerate() {
                for (x, tile) in tiles.iter().enumerate() {
                    f.write_str(&tile[row])?;
                    if x + 1 < tiles.len() {
                        f.write_str(roadway)?;
                    }
                }
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

/// Render the grid with the vehicles on it
pub fn render(grid: &Grid, fleet: &Fleet) -> String {
    GridView { grid, fleet }.to_string()
}
