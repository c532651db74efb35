use std::ops::Add;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

// Grids are at most 16x16 so a coordinate packs into one byte (4 bits per axis)
pub const MAX_EXTENT: isize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub row: isize,
    pub col: isize,
}

impl Coordinate {
    pub fn new(row: isize, col: isize) -> Coordinate {
        Coordinate { row, col }
    }

    pub fn manhattan_distance(&self, other: Coordinate) -> isize {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    // One of row/col is equal and the other differs by exactly one, so never adjacent to self
    pub fn is_adjacent(&self, other: Coordinate) -> bool {
        self.manhattan_distance(other) == 1
    }

    pub fn in_extent(&self, rows: isize, cols: isize) -> bool {
        self.row >= 0 && self.col >= 0 && self.row < rows && self.col < cols
    }

    /// Pack into `row << 4 | col`; only valid for coordinates inside a 16x16 grid.
    pub fn pack(&self) -> u8 {
        debug_assert!(
            self.in_extent(MAX_EXTENT, MAX_EXTENT),
            "cannot pack {self:?}"
        );
        ((self.row as u8) << 4) | (self.col as u8 & 0xF)
    }

}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// Parses `row,col`
impl TryFrom<&str> for Coordinate {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        let (row, col) = value
            .split_once(',')
            .ok_or_else(|| anyhow!("Invalid coordinate: {value}"))?;

        Ok(Coordinate {
            row: row.trim().parse()?,
            col: col.trim().parse()?,
        })
    }
}

impl Add<Coordinate> for Coordinate {
    type Output = Coordinate;

    fn add(self, other: Coordinate) -> Coordinate {
        Coordinate {
            row: self.row + other.row,
            col: self.col + other.col,
        }
    }
}

#[cfg(test)]
mod test_coordinate {
    use super::*;

    #[test]
    fn test_ordering_is_row_major() {
        assert!(Coordinate::new(0, 5) < Coordinate::new(1, 0));
        assert!(Coordinate::new(2, 1) < Coordinate::new(2, 3));
    }

    #[test]
    fn test_adjacent() {
        let c = Coordinate::new(3, 3);

        assert!(c.is_adjacent(Coordinate::new(3, 4)));
        assert!(c.is_adjacent(Coordinate::new(2, 3)));
        assert!(!c.is_adjacent(c));
        assert!(!c.is_adjacent(Coordinate::new(4, 4)));
        assert!(!c.is_adjacent(Coordinate::new(3, 5)));
    }

    #[test]
    fn test_pack() {
        let c = Coordinate::new(7, 12);
        assert_eq!(c.pack(), 0x7C);
        assert_eq!(Coordinate::new(15, 15).pack(), 0xFF);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Coordinate::try_from("2, 3").unwrap(), Coordinate::new(2, 3));
        assert!(Coordinate::try_from("2;3").is_err());
        assert!(Coordinate::try_from("a,3").is_err());
    }
}
