//! Fixed-size occupancy grid
//!
//! Each cell holds at most one vehicle id. Every access is bounds-checked
//! and reports failures through `SimError`.

use super::error::SimError;
use super::types::{Coord, VehicleId};

#[derive(Debug, Clone, Default)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Option<VehicleId>>,
}

impl Grid {
    /// Create an empty grid. Dimensions must both be positive.
    pub fn new(width: i32, height: i32) -> Result<Self, SimError> {
        if width <= 0 || height <= 0 {
            return Err(SimError::InvalidDimensions { width, height });
        }

        Ok(Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of addressable cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        (0..self.width).contains(&coord.x) && (0..self.height).contains(&coord.y)
    }

    fn index(&self, coord: Coord) -> Result<usize, SimError> {
        if !self.in_bounds(coord) {
            return Err(SimError::OutOfBounds(coord));
        }
        Ok(coord.y as usize * self.width as usize + coord.x as usize)
    }

    /// The vehicle at `coord`, if any
    pub fn occupant(&self, coord: Coord) -> Result<Option<VehicleId>, SimError> {
        let index = self.index(coord)?;
        Ok(self.cells[index])
    }

    /// In bounds and empty. Out-of-bounds cells are never free.
    pub fn is_free(&self, coord: Coord) -> bool {
        matches!(self.occupant(coord), Ok(None))
    }

    /// Put a vehicle into an empty, in-bounds cell
    pub fn place(&mut self, coord: Coord, vehicle: VehicleId) -> Result<(), SimError> {
        let index = self.index(coord)?;
        if self.cells[index].is_some() {
            return Err(SimError::CellOccupied(coord));
        }
        self.cells[index] = Some(vehicle);
        Ok(())
    }

    /// Empty a cell, returning whatever was there
    pub fn vacate(&mut self, coord: Coord) -> Result<Option<VehicleId>, SimError> {
        let index = self.index(coord)?;
        Ok(self.cells[index].take())
    }

    /// Exchange the contents of two cells in one step
    pub fn swap(&mut self, a: Coord, b: Coord) -> Result<(), SimError> {
        let first = self.index(a)?;
        let second = self.index(b)?;
        self.cells.swap(first, second);
        Ok(())
    }

    /// Every occupied cell with its vehicle, row by row
    pub fn occupied(&self) -> impl Iterator<Item = (Coord, VehicleId)> + '_ {
        let width = self.width as usize;
        self.cells.iter().enumerate().filter_map(move |(index, cell)| {
            cell.map(|id| {
                let coord = Coord::new((index % width) as i32, (index / width) as i32);
                (coord, id)
            })
        })
    }
}
