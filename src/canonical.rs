//! Closed set keys.
//!
//! A key lists every atom's packed position (`row << 4 | col`) in atom order,
//! with each run of same-element atoms sorted by position, followed by the bonds
//! as sorted `slot_a << 4 | slot_b` bytes where the slots index that sorted list.
//! Atoms of the same element are interchangeable, so two states that only differ
//! in which of them is where pack to the same key.

use crate::puzzle::Puzzle;
use crate::state::State;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(Vec<u8>);

impl CanonicalKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

pub fn pack(state: &State, puzzle: &Puzzle) -> CanonicalKey {
    let atoms = state.atoms();
    debug_assert_eq!(atoms.len(), puzzle.atom_count());

    let mut buffer = Vec::with_capacity(atoms.len() + state.total_bonds());
    buffer.extend(atoms.iter().map(|a| a.position.pack()));
    for run in puzzle.element_runs() {
        buffer[run.clone()].sort_unstable();
    }

    // Positions are unique, so each one names a slot
    let mut slots = [0u8; 256];
    for (slot, position) in buffer.iter().enumerate() {
        slots[*position as usize] = slot as u8;
    }

    let mut bonds = Vec::with_capacity(state.total_bonds());
    for (a, atom) in atoms.iter().enumerate() {
        for b in atom.bonds.iter().filter(|b| *b > a) {
            let slot_a = slots[atom.position.pack() as usize];
            let slot_b = slots[atoms[b].position.pack() as usize];
            bonds.push(slot_a.min(slot_b) << 4 | slot_a.max(slot_b));
        }
    }
    bonds.sort_unstable();

    buffer.extend(bonds);
    CanonicalKey(buffer)
}
