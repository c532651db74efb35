use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl From<Direction> for Coordinate {
    fn from(direction: Direction) -> Coordinate {
        match direction {
            Direction::Up => Coordinate { row: -1, col: 0 },
            Direction::Down => Coordinate { row: 1, col: 0 },
            Direction::Left => Coordinate { row: 0, col: -1 },
            Direction::Right => Coordinate { row: 0, col: 1 },
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(anyhow!("Invalid direction: {value}")),
        }
    }
}

impl TryFrom<char> for Direction {
    type Error = anyhow::Error;

    fn try_from(value: char) -> Result<Self> {
        match value {
            'U' | 'u' | 'N' | 'n' | '↑' => Ok(Direction::Up),
            'D' | 'd' | 'S' | 's' | '↓' => Ok(Direction::Down),
            'L' | 'l' | 'W' | 'w' | '←' => Ok(Direction::Left),
            'R' | 'r' | 'E' | 'e' | '→' => Ok(Direction::Right),
            _ => Err(anyhow!("Invalid direction: {value}")),
        }
    }
}

impl From<Direction> for char {
    fn from(direction: Direction) -> char {
        match direction {
            Direction::Up => 'U',
            Direction::Down => 'D',
            Direction::Left => 'L',
            Direction::Right => 'R',
        }
    }
}

impl Direction {
    pub fn all() -> [Direction; 4] {
        [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ]
    }

    pub fn translate(&self, c: Coordinate) -> Coordinate {
        c + Coordinate::from(*self)
    }

    /// The leading edge of a group of cells moving in this direction: every cell
    /// whose forward neighbor is not itself part of the group.
    ///
    /// For a group that is contiguous along each row/column this is the single
    /// extreme cell per line; a concave group also exposes the cells facing into
    /// its gaps, since those are cells it newly enters too.
    pub fn project(&self, cells: &[Coordinate]) -> Vec<Coordinate> {
        let mut edge = cells
            .iter()
            .filter(|c| !cells.contains(&self.translate(**c)))
            .copied()
            .collect::<Vec<_>>();
        edge.sort();
        edge.dedup();
        edge
    }
}
