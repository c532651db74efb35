use std::fmt;

use crate::canonical::{self, CanonicalKey};
use crate::coordinate::Coordinate;
use crate::direction::Direction;
use crate::element::Element;
use crate::path::Path;
use crate::puzzle::Puzzle;

// Atom indices must fit in a 16 bit set and in 4 bits of the canonical key
pub const MAX_ATOMS: usize = 16;

// Preprocessing always puts the player first
pub const PLAYER_ATOM: usize = 0;

/// A set of atom indices.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomSet(u16);

impl AtomSet {
    pub fn empty() -> AtomSet {
        AtomSet(0)
    }

    pub fn single(index: usize) -> AtomSet {
        let mut set = AtomSet::empty();
        set.insert(index);
        set
    }

    // The first `n` indices
    pub fn all(n: usize) -> AtomSet {
        debug_assert!(n <= MAX_ATOMS);
        AtomSet(((1u32 << n) - 1) as u16)
    }

    pub fn contains(&self, index: usize) -> bool {
        index < MAX_ATOMS && self.0 & (1 << index) != 0
    }

    // Returns true if the index was newly added
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(index < MAX_ATOMS, "atom index {index} out of range");
        let added = !self.contains(index);
        self.0 |= 1 << index;
        added
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(&self, other: AtomSet) -> AtomSet {
        AtomSet(self.0 | other.0)
    }

    pub fn intersection(&self, other: AtomSet) -> AtomSet {
        AtomSet(self.0 & other.0)
    }

    pub fn complement(&self, n: usize) -> AtomSet {
        AtomSet(!self.0).intersection(AtomSet::all(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> {
        let bits = self.0;
        (0..MAX_ATOMS).filter(move |i| bits & (1 << i) != 0)
    }
}

impl fmt::Debug for AtomSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for AtomSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut set = AtomSet::empty();
        for i in iter {
            set.insert(i);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub position: Coordinate,
    pub element: Element,
    pub bonds: AtomSet,
}

impl Atom {
    pub fn new(position: Coordinate, element: Element) -> Atom {
        Atom {
            position,
            element,
            bonds: AtomSet::empty(),
        }
    }

    pub fn free_electrons(&self) -> u8 {
        let bonds = self.bonds.len() as u8;
        assert!(
            bonds <= self.element.max_electrons(),
            "{:?} at {} has {bonds} bonds",
            self.element,
            self.position
        );
        self.element.max_electrons() - bonds
    }
}

// Bond two atoms, using up one free electron on each
// Returns false (and changes nothing) if either has none left
pub(crate) fn bond(atoms: &mut [Atom], a: usize, b: usize) -> bool {
    assert!(a != b, "cannot bond atom {a} to itself");
    assert!(
        !atoms[a].bonds.contains(b),
        "atoms {a} and {b} are already bonded"
    );

    if atoms[a].free_electrons() == 0 || atoms[b].free_electrons() == 0 {
        return false;
    }

    atoms[a].bonds.insert(b);
    atoms[b].bonds.insert(a);
    true
}

/// One configuration of the puzzle: where every atom is, what it is bonded to,
/// and the moves that got here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct State {
    atoms: Vec<Atom>,
    path: Path,
}

impl State {
    pub(crate) fn new(atoms: Vec<Atom>, path: Path) -> State {
        let state = State { atoms, path };
        if cfg!(debug_assertions) {
            state.check_invariants();
        }
        state
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn player(&self) -> &Atom {
        &self.atoms[PLAYER_ATOM]
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_bonds(&self) -> usize {
        self.atoms.iter().map(|a| a.bonds.len()).sum::<usize>() / 2
    }

    pub fn is_bonded(&self, a: usize, b: usize) -> bool {
        self.atoms[a].bonds.contains(b)
    }

    pub fn atom_at(&self, position: Coordinate) -> Option<usize> {
        self.atoms.iter().position(|a| a.position == position)
    }

    // Bonds are symmetric and within capacity, and no two atoms share a cell
    fn check_invariants(&self) {
        assert!(self.atoms.len() <= MAX_ATOMS);

        for (i, atom) in self.atoms.iter().enumerate() {
            assert!(atom.bonds.len() <= atom.element.max_electrons() as usize);
            assert!(!atom.bonds.contains(i), "atom {i} bonded to itself");

            for j in atom.bonds.iter() {
                assert!(j < self.atoms.len(), "atom {i} bonded to missing atom {j}");
                assert!(self.atoms[j].bonds.contains(i), "asymmetric bond {i} -> {j}");
            }

            for other in &self.atoms[i + 1..] {
                assert!(atom.position != other.position, "two atoms at {}", atom.position);
            }
        }
    }

    /// All atoms transitively bonded to `atom`, including itself.
    pub fn molecule(&self, atom: usize) -> AtomSet {
        molecule(&self.atoms, atom)
    }

    /// The state after dragging the player's molecule one cell in `direction`,
    /// or None if the move is blocked or would bond nondeterministically.
    pub fn try_move(&self, puzzle: &Puzzle, direction: Direction) -> Option<State> {
        let mut atoms = self.atoms.clone();

        let moved = match push(&mut atoms, self.molecule(PLAYER_ATOM), direction, puzzle) {
            Some(moved) => moved,
            None => {
                log::debug!("{direction:?} failed, blocked");
                return None;
            }
        };

        // If an atom had free electrons before moving, it bonds with every newly
        // adjacent atom that also had free electrons and isn't already bonded
        // If either runs out part way through, that's nondeterministic bonding
        for m in moved.iter() {
            if self.atoms[m].free_electrons() == 0 {
                continue;
            }

            for i in 0..atoms.len() {
                if self.atoms[i].free_electrons() == 0 || atoms[m].bonds.contains(i) {
                    continue;
                }

                if atoms[m].position.is_adjacent(atoms[i].position) && !bond(&mut atoms, m, i) {
                    log::debug!("{direction:?} failed, nondeterministic bond between {m} and {i}");
                    return None;
                }
            }
        }

        Some(State::new(atoms, self.path.append(direction)))
    }

    pub fn next_states(&self, puzzle: &Puzzle) -> Vec<State> {
        Direction::all()
            .into_iter()
            .filter_map(|direction| self.try_move(puzzle, direction))
            .collect()
    }

    pub fn is_solved(&self) -> bool {
        self.atoms.iter().all(|a| a.free_electrons() == 0)
    }

    // A state holding a bond that appears in no geometry-free solution can't be finished
    pub fn is_viable(&self, puzzle: &Puzzle) -> bool {
        self.atoms
            .iter()
            .zip(puzzle.forbidden_bonds())
            .all(|(atom, forbidden)| atom.bonds.intersection(*forbidden).is_empty())
    }

    pub fn key(&self, puzzle: &Puzzle) -> CanonicalKey {
        canonical::pack(self, puzzle)
    }

    pub fn stringify(&self, puzzle: &Puzzle) -> String {
        // Cells sit on even rows/columns, bonds between them
        let height = (puzzle.rows() * 2 - 1).max(0) as usize;
        let width = (puzzle.cols() * 2 - 1).max(0) as usize;
        let mut grid = vec![vec![' '; width]; height];

        for row in 0..puzzle.rows() {
            for col in 0..puzzle.cols() {
                if puzzle.is_blocked(Coordinate::new(row, col)) {
                    grid[row as usize * 2][col as usize * 2] = '#';
                }
            }
        }

        for (i, atom) in self.atoms.iter().enumerate() {
            let c: char = atom.element.into();
            let (row, col) = (atom.position.row as usize * 2, atom.position.col as usize * 2);
            grid[row][col] = if i == PLAYER_ATOM {
                c.to_ascii_uppercase()
            } else {
                c
            };

            for j in atom.bonds.iter().filter(|j| *j > i) {
                let other = self.atoms[j].position;
                let (other_row, other_col) = (other.row as usize * 2, other.col as usize * 2);
                if row == other_row && other_col.abs_diff(col) == 2 {
                    grid[row][col.min(other_col) + 1] = '-';
                } else if col == other_col && other_row.abs_diff(row) == 2 {
                    grid[row.min(other_row) + 1][col] = '|';
                }
            }
        }

        let mut output = String::new();
        for line in grid {
            let line = line.iter().collect::<String>();
            output.push_str(line.trim_end());
            output.push('\n');
        }
        output
    }
}

impl crate::State<Puzzle> for State {
    type Key = CanonicalKey;

    fn next_states(&self, puzzle: &Puzzle) -> Option<Vec<Self>> {
        let next_states = State::next_states(self, puzzle);
        if next_states.is_empty() {
            None
        } else {
            Some(next_states)
        }
    }

    fn is_valid(&self, puzzle: &Puzzle) -> bool {
        self.is_viable(puzzle)
    }

    fn is_solved(&self, _puzzle: &Puzzle) -> bool {
        State::is_solved(self)
    }

    fn key(&self, puzzle: &Puzzle) -> CanonicalKey {
        State::key(self, puzzle)
    }

    // Nothing ever breaks a bond
    fn rank(&self, _puzzle: &Puzzle) -> usize {
        self.total_bonds()
    }

    fn stringify(&self, puzzle: &Puzzle) -> String {
        State::stringify(self, puzzle)
    }
}

// Flood fill over the bond graph
pub(crate) fn molecule(atoms: &[Atom], atom: usize) -> AtomSet {
    let mut molecule = AtomSet::single(atom);
    let mut to_check = vec![atom];

    while let Some(current) = to_check.pop() {
        for bonded in atoms[current].bonds.iter() {
            if molecule.insert(bonded) {
                to_check.push(bonded);
            }
        }
    }

    molecule
}

// Move `moving` one cell in `direction` along with everything it pushes
// Returns every atom that moved, or None (leaving `atoms` untouched) if anything hits the boundary
fn push(
    atoms: &mut [Atom],
    moving: AtomSet,
    direction: Direction,
    puzzle: &Puzzle,
) -> Option<AtomSet> {
    let mut to_move = moving;
    let mut groups = vec![moving];

    while let Some(group) = groups.pop() {
        let cells = group.iter().map(|i| atoms[i].position).collect::<Vec<_>>();

        for edge in direction.project(&cells) {
            let target = direction.translate(edge);
            if puzzle.is_blocked(target) {
                return None;
            }

            // Anything in the way gets pushed, along with its whole molecule
            if let Some(other) = atoms.iter().position(|a| a.position == target) {
                if !to_move.contains(other) {
                    let pushed = molecule(atoms, other);
                    to_move = to_move.union(pushed);
                    groups.push(pushed);
                }
            }
        }
    }

    for i in to_move.iter() {
        atoms[i].position = direction.translate(atoms[i].position);
    }

    Some(to_move)
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State[{}]", self.path)?;
        for atom in &self.atoms {
            write!(f, " {}{}", char::from(atom.element), atom.position)?;
        }
        Ok(())
    }
}
