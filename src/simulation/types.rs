//! Core types for the vehicle relay simulation
//!
//! Coordinates, headings and identifiers shared by every component.

use std::fmt;
use std::ops::Add;

/// Identifier of a vehicle. Assigned once at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub u32);

/// Identifier of a packet. Every copy of a packet carries the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(pub u32);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source owned by the world
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_vehicle(&mut self) -> VehicleId {
        VehicleId(self.bump())
    }

    pub fn next_packet(&mut self) -> PacketId {
        PacketId(self.bump())
    }

    fn bump(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// A cell address on the grid. `x` is the column, `y` is the row (row 0 at the top).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Unit step toward `target` on each axis (-1, 0 or +1)
    pub fn direction_to(&self, target: Coord) -> (i32, i32) {
        ((target.x - self.x).signum(), (target.y - self.y).signum())
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Coord {
        Coord::new(self.x + dx, self.y + dy)
    }
}

impl Add<(i32, i32)> for Coord {
    type Output = Coord;

    fn add(self, (dx, dy): (i32, i32)) -> Coord {
        self.offset(dx, dy)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Direction of travel of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Heading {
    /// Not moving (at destination, stopped or boxed in)
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    /// Grid displacement of one step in this heading
    pub fn delta(self) -> (i32, i32) {
        match self {
            Heading::None => (0, 0),
            Heading::Up => (0, -1),
            Heading::Down => (0, 1),
            Heading::Left => (-1, 0),
            Heading::Right => (1, 0),
        }
    }

    pub fn reverse(self) -> Heading {
        match self {
            Heading::None => Heading::None,
            Heading::Up => Heading::Down,
            Heading::Down => Heading::Up,
            Heading::Left => Heading::Right,
            Heading::Right => Heading::Left,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Heading::Up | Heading::Down)
    }

    /// Horizontal heading for a signed x step; `None` for zero
    pub fn horizontal(step: i32) -> Heading {
        match step.signum() {
            -1 => Heading::Left,
            1 => Heading::Right,
            _ => Heading::None,
        }
    }

    /// Vertical heading for a signed y step; `None` for zero
    pub fn vertical(step: i32) -> Heading {
        match step.signum() {
            -1 => Heading::Up,
            1 => Heading::Down,
            _ => Heading::None,
        }
    }

    /// True when this heading moves along a non-zero component of `ideal`
    pub fn matches(self, ideal: (i32, i32)) -> bool {
        let (hx, hy) = self.delta();
        (hx != 0 && hx == ideal.0) || (hy != 0 && hy == ideal.1)
    }

    /// Arrow glyph used by the text renderer
    pub fn arrow(self) -> Option<char> {
        match self {
            Heading::None => None,
            Heading::Up => Some('^'),
            Heading::Down => Some('v'),
            Heading::Left => Some('<'),
            Heading::Right => Some('>'),
        }
    }
}

/// Moore-neighborhood offsets in slot order: top row left to right,
/// then the middle row without the centre, then the bottom row.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Ticks a packet may be held before it is thrown away
pub const PACKET_TTL: u32 = 5;

/// Minimum age at which a payload packet may leave its holder
pub const FORWARD_MIN_AGE: u32 = 2;

/// Age at which a thrown copy is dropped from its mailbox
pub const RECLAIM_AGE: u32 = 2 * PACKET_TTL;

/// Consecutive blocked ticks before a vehicle tries to redirect
pub const STALL_LIMIT: u32 = 2;

/// Number of redirection stages before a vehicle gives up and stops
pub const MAX_REDIRECT_ATTEMPTS: u8 = 4;
