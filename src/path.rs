use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::direction::Direction;

/// The moves taken from the initial state, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Direction>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    // Paths are shared by states in the frontier, so extending one copies it
    pub fn append(&self, direction: Direction) -> Path {
        let mut steps = Vec::with_capacity(self.0.len() + 1);
        steps.extend_from_slice(&self.0);
        steps.push(direction);
        Path(steps)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Direction> {
        self.0.iter()
    }

    pub fn steps(&self) -> &[Direction] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Direction;
    type IntoIter = std::slice::Iter<'a, Direction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for direction in &self.0 {
            write!(f, "{}", char::from(*direction))?;
        }
        Ok(())
    }
}

// Whitespace is ignored so long solutions can be grouped
impl FromStr for Path {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .map(Direction::try_from)
            .collect::<Result<Vec<_>>>()
            .map(Path)
    }
}
