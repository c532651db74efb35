use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

// Declared in order of bonding capacity; the ordinal is the capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    Helium,
    Hydrogen,
    Oxygen,
    Nitrogen,
    Carbon,
}

impl Element {
    pub fn max_electrons(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<char> for Element {
    type Error = anyhow::Error;

    fn try_from(value: char) -> Result<Self> {
        use Element::*;

        match value.to_ascii_lowercase() {
            'e' => Ok(Helium),
            'h' => Ok(Hydrogen),
            'o' => Ok(Oxygen),
            'n' => Ok(Nitrogen),
            'c' => Ok(Carbon),
            _ => Err(anyhow!("Invalid element: {value}")),
        }
    }
}

impl From<Element> for char {
    fn from(element: Element) -> char {
        match element {
            Element::Helium => 'e',
            Element::Hydrogen => 'h',
            Element::Oxygen => 'o',
            Element::Nitrogen => 'n',
            Element::Carbon => 'c',
        }
    }
}
