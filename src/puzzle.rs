use std::collections::BTreeMap;
use std::io::BufRead;
use std::ops::Range;

use anyhow::{anyhow, bail, Context, Result};
use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::coordinate::{Coordinate, MAX_EXTENT};
use crate::element::Element;
use crate::path::Path;
use crate::state::{bond, Atom, AtomSet, State, MAX_ATOMS, PLAYER_ATOM};

// Give up on the forbidden bond analysis after this many bond sets
const FORBIDDEN_BOND_SEARCH_LIMIT: usize = 1 << 20;

/// A puzzle as described by whoever read it off the screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleDefinition {
    // Defaults to one past the largest coordinate mentioned
    #[serde(default)]
    pub rows: Option<isize>,
    #[serde(default)]
    pub cols: Option<isize>,

    #[serde(default)]
    pub boundary: Vec<Coordinate>,
    pub atoms: Vec<(Coordinate, Element)>,
    #[serde(default)]
    pub bonds: Vec<(Coordinate, Coordinate)>,
    pub player: Coordinate,

    // Known solutions, if any
    #[serde(default)]
    pub solutions: Vec<Path>,
}

/// Everything about a puzzle that doesn't change from state to state.
#[derive(Debug, Clone)]
pub struct Puzzle {
    rows: isize,
    cols: isize,
    boundary: FxHashSet<Coordinate>,
    initial: State,

    // Contiguous index ranges of interchangeable atoms
    element_runs: Vec<Range<usize>>,

    // Per atom, the partners it bonds with in no possible solution
    forbidden_bonds: Vec<AtomSet>,

    solutions: Vec<Path>,
}

impl Puzzle {
    pub fn new(definition: PuzzleDefinition) -> Result<Puzzle> {
        let PuzzleDefinition {
            rows,
            cols,
            boundary,
            atoms,
            bonds,
            player,
            solutions,
        } = definition;

        if atoms.is_empty() {
            bail!("Puzzle has no atoms");
        }
        if atoms.len() > MAX_ATOMS {
            bail!("Puzzle has {} atoms, at most {MAX_ATOMS} are supported", atoms.len());
        }

        let mut elements = BTreeMap::new();
        for (position, element) in atoms {
            if elements.insert(position, element).is_some() {
                bail!("Multiple atoms at {position}");
            }
        }

        let mentioned = || elements.keys().chain(boundary.iter());
        let rows = rows.unwrap_or_else(|| mentioned().map(|c| c.row + 1).max().unwrap_or(0));
        let cols = cols.unwrap_or_else(|| mentioned().map(|c| c.col + 1).max().unwrap_or(0));
        if rows <= 0 || cols <= 0 || rows > MAX_EXTENT || cols > MAX_EXTENT {
            bail!("Grid of {rows}x{cols} is not supported, at most {MAX_EXTENT}x{MAX_EXTENT}");
        }

        let boundary = boundary
            .into_iter()
            .filter(|c| c.in_extent(rows, cols))
            .collect::<FxHashSet<_>>();

        for position in elements.keys() {
            if !position.in_extent(rows, cols) {
                bail!("Atom at {position} is outside the {rows}x{cols} grid");
            }
            if boundary.contains(position) {
                bail!("Atom at {position} is on the boundary");
            }
        }

        // Player first, then the rest grouped by element (most electrons first)
        let player_element = *elements
            .get(&player)
            .ok_or_else(|| anyhow!("Player {player} is not an atom"))?;

        let mut order = elements
            .iter()
            .filter(|(position, _)| **position != player)
            .map(|(position, element)| (*position, *element))
            .collect::<Vec<_>>();
        order.sort_by(|(pa, ea), (pb, eb)| eb.cmp(ea).then(pa.cmp(pb)));
        order.insert(PLAYER_ATOM, (player, player_element));

        let mut element_runs = vec![PLAYER_ATOM..PLAYER_ATOM + 1];
        for (i, (_, element)) in order.iter().enumerate().skip(1) {
            match element_runs.last_mut() {
                Some(run) if run.start != PLAYER_ATOM && order[run.start].1 == *element => {
                    run.end = i + 1;
                }
                _ => element_runs.push(i..i + 1),
            }
        }

        let index = order
            .iter()
            .enumerate()
            .map(|(i, (position, _))| (*position, i))
            .collect::<FxHashMap<_, _>>();

        let mut atoms = order
            .iter()
            .map(|(position, element)| Atom::new(*position, *element))
            .collect::<Vec<_>>();

        let mut declared = FxHashSet::default();
        for (a, b) in bonds {
            let pair = if a <= b { (a, b) } else { (b, a) };
            if !declared.insert(pair) {
                bail!("Multiple bonds between {a} and {b} are not supported");
            }

            let ia = *index.get(&a).ok_or_else(|| anyhow!("Bond from {a}, which is not an atom"))?;
            let ib = *index.get(&b).ok_or_else(|| anyhow!("Bond to {b}, which is not an atom"))?;
            if ia == ib {
                bail!("Bond from {a} to itself");
            }
            if !a.is_adjacent(b) {
                bail!("Bond between {a} and {b}, which are not adjacent");
            }

            if !bond(&mut atoms, ia, ib) {
                bail!("Insoluble puzzle: no free electrons to bond {a} and {b}");
            }
        }

        let forbidden_bonds = forbidden_bonds(&atoms, FORBIDDEN_BOND_SEARCH_LIMIT);
        let initial = State::new(atoms, Path::empty());

        Ok(Puzzle {
            rows,
            cols,
            boundary,
            initial,
            element_runs,
            forbidden_bonds,
            solutions,
        })
    }

    /// Read a text map followed by optional `bond` and solution lines.
    pub fn read<R: BufRead>(reader: &mut R) -> Result<Puzzle> {
        let mut definition = PuzzleDefinition::default();
        let mut player = None;
        let mut reading_map = true;
        let mut rows = 0;
        let mut cols = 0;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
            let line = line.trim_end_matches('\r');

            // Only a truly empty line ends the map, a row of spaces is open floor
            if reading_map {
                if line.is_empty() {
                    reading_map = false;
                    continue;
                }

                let row = line_no as isize;
                rows += 1;
                cols = cols.max(line.chars().count() as isize);

                for (col, c) in line.chars().enumerate() {
                    let position = Coordinate::new(row, col as isize);

                    match c {
                        '-' | '.' | ' ' => {}
                        '#' => definition.boundary.push(position),
                        _ => {
                            let element = Element::try_from(c).with_context(|| {
                                format!("line {} column {}", line_no + 1, col + 1)
                            })?;

                            if c.is_uppercase() {
                                if player.is_some() {
                                    bail!("Multiple player atoms, second at {position}");
                                }
                                player = Some(position);
                            }

                            definition.atoms.push((position, element));
                        }
                    }
                }
                continue;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("bond") {
                let parts = rest.split_ascii_whitespace().collect::<Vec<_>>();
                if parts.len() != 2 {
                    bail!("[{}] Expected 'bond <row>,<col> <row>,<col>', got {line}", line_no + 1);
                }
                definition
                    .bonds
                    .push((Coordinate::try_from(parts[0])?, Coordinate::try_from(parts[1])?));
            } else {
                definition.solutions.push(
                    line.parse()
                        .with_context(|| format!("[{}] Invalid solution {line}", line_no + 1))?,
                );
            }
        }

        definition.rows = Some(rows);
        definition.cols = Some(cols);
        definition.player = player.ok_or_else(|| anyhow!("Must have a player atom"))?;

        Puzzle::new(definition)
    }

    /// Read either a JSON definition or a text map.
    pub fn load(input: &str) -> Result<Puzzle> {
        if input.trim_start().starts_with('{') {
            let definition: PuzzleDefinition =
                serde_json::from_str(input).context("parsing puzzle definition")?;
            Puzzle::new(definition)
        } else {
            Puzzle::read(&mut input.as_bytes())
        }
    }

    pub fn rows(&self) -> isize {
        self.rows
    }

    pub fn cols(&self) -> isize {
        self.cols
    }

    // Everything off the grid is as good as a wall
    pub fn is_blocked(&self, c: Coordinate) -> bool {
        !c.in_extent(self.rows, self.cols) || self.boundary.contains(&c)
    }

    pub fn initial_state(&self) -> &State {
        &self.initial
    }

    pub fn atom_count(&self) -> usize {
        self.initial.atoms().len()
    }

    pub fn element_runs(&self) -> &[Range<usize>] {
        &self.element_runs
    }

    pub fn forbidden_bonds(&self) -> &[AtomSet] {
        &self.forbidden_bonds
    }

    pub fn solutions(&self) -> &[Path] {
        &self.solutions
    }
}

// Ignoring geometry entirely, find every bond that shows up in at least one way
// to use up all of the free electrons; the rest can never be part of a solution
fn forbidden_bonds(atoms: &[Atom], limit: usize) -> Vec<AtomSet> {
    let n = atoms.len();
    let mut possible = vec![AtomSet::empty(); n];
    let mut seen = FxHashSet::default();
    let mut to_check = vec![atoms.to_vec()];

    while let Some(current) = to_check.pop() {
        if !seen.insert(current.iter().map(|a| a.bonds).collect::<Vec<_>>()) {
            continue;
        }

        if seen.len() > limit {
            log::warn!("Too many bond combinations, not forbidding any bonds");
            return vec![AtomSet::empty(); n];
        }

        // The first atom with free electrons has to bond with something eventually
        let first = match current.iter().position(|a| a.free_electrons() > 0) {
            Some(first) => first,
            None => {
                for (i, atom) in current.iter().enumerate() {
                    possible[i] = possible[i].union(atom.bonds);
                }
                continue;
            }
        };

        for other in 0..n {
            if other == first
                || current[other].free_electrons() == 0
                || current[first].bonds.contains(other)
            {
                continue;
            }

            let mut next = current.clone();
            if bond(&mut next, first, other) {
                to_check.push(next);
            }
        }
    }

    let forbidden = possible
        .iter()
        .enumerate()
        .map(|(i, possible)| possible.union(AtomSet::single(i)).complement(n))
        .collect::<Vec<_>>();

    log::debug!("forbidden bonds: {forbidden:?}");
    forbidden
}
