use core::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::time::Instant;

use fxhash::FxHashMap;
use rayon::prelude::*;

pub mod canonical;
pub mod config;
pub mod coordinate;
pub mod direction;
pub mod element;
pub mod path;
pub mod puzzle;
pub mod state;

pub use config::SolverConfig;
pub use coordinate::Coordinate;
pub use direction::Direction;
pub use element::Element;
pub use path::Path;
pub use puzzle::{Puzzle, PuzzleDefinition};

/// A node in a search graph, with everything shared between nodes kept in `G`.
///
/// All of these are called concurrently from worker threads and must not
/// depend on anything but `self` and `global`.
pub trait State<G>: Clone + Send + Sync {
    /// Identifies states that should only be expanded once.
    type Key: Eq + Hash + Send;

    fn next_states(&self, global: &G) -> Option<Vec<Self>>
    where
        Self: Sized;

    fn is_valid(&self, global: &G) -> bool;
    fn is_solved(&self, global: &G) -> bool;

    fn key(&self, global: &G) -> Self::Key;

    /// A measure that never decreases from a state to its successors, used to
    /// forget closed set entries that can't come up again.
    fn rank(&self, _global: &G) -> usize {
        0
    }

    fn stringify(&self, global: &G) -> String;
}

/// Breadth first search, expanding one whole level of the graph per step.
pub struct Solver<G, S: State<G>> {
    global_state: G,
    config: SolverConfig,
    pool: Option<rayon::ThreadPool>,
    to_check: Vec<S>,
    checked: FxHashMap<S::Key, usize>,
    solution: Option<S>,
    depth: usize,
    states_checked: usize,
    states_invalidated: usize,
    min_rank: usize,
    time_spent: f32,
}

impl<G, S> Solver<G, S>
where
    G: Sync,
    S: State<G>,
{
    pub fn new(global_state: G, initial_state: S) -> Solver<G, S> {
        let mut checked = FxHashMap::default();
        checked.insert(
            initial_state.key(&global_state),
            initial_state.rank(&global_state),
        );

        let (to_check, solution) = if initial_state.is_solved(&global_state) {
            (Vec::new(), Some(initial_state))
        } else {
            (vec![initial_state], None)
        };

        Solver {
            global_state,
            config: SolverConfig::default(),
            pool: None,
            to_check,
            checked,
            solution,
            depth: 0,
            states_checked: 0,
            states_invalidated: 0,
            min_rank: 0,
            time_spent: 0 as f32,
        }
    }

    pub fn set_config(&mut self, config: SolverConfig) -> &mut Self {
        self.pool = config.threads.and_then(|threads| {
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("Failed to start {threads} threads, using the global pool: {e}");
                    None
                }
            }
        });
        self.config = config;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn states_checked(&self) -> usize {
        self.states_checked
    }

    pub fn states_invalidated(&self) -> usize {
        self.states_invalidated
    }

    pub fn in_queue(&self) -> usize {
        self.to_check.len()
    }

    pub fn closed_set_size(&self) -> usize {
        self.checked.len()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn time_spent(&self) -> f32 {
        self.time_spent
    }

    pub fn get_solution(&self) -> Option<S> {
        self.solution.clone()
    }

    /// Search until a solution is found or the graph is exhausted.
    pub fn run(&mut self) -> Option<S>
    where
        S: Debug,
    {
        while self.next().is_some() {
            if self.depth % self.config.progress_every.max(1) == 0 {
                log::info!("{self}");
            }
        }
        self.get_solution()
    }

    // Expand the whole frontier in parallel; successors come back in frontier order
    fn expand(&self, frontier: &[S]) -> Vec<Option<(S, S::Key, usize)>> {
        let global = &self.global_state;
        let viability_filter = self.config.viability_filter;

        let work = || {
            frontier
                .par_iter()
                .flat_map_iter(|state| state.next_states(global).unwrap_or_default())
                .map(|next| {
                    if viability_filter && !next.is_valid(global) {
                        return None;
                    }
                    let key = next.key(global);
                    let rank = next.rank(global);
                    Some((next, key, rank))
                })
                .collect::<Vec<_>>()
        };

        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }

    // Once everything queued is ranked at least N, nothing ranked below N comes back
    fn prune(&mut self) {
        let min_rank = match self.to_check.iter().map(|s| s.rank(&self.global_state)).min() {
            Some(min_rank) => min_rank,
            None => return,
        };

        if min_rank > self.min_rank {
            let before = self.checked.len();
            self.checked.retain(|_, rank| *rank >= min_rank);
            self.min_rank = min_rank;

            tracing::debug!(
                "pruned closed set to rank {}, removed {}, now {}",
                min_rank,
                before - self.checked.len(),
                self.checked.len()
            );
        }
    }
}

// Each step expands one level and returns a sample of the next one
// Stops once a solution is found or there is nothing left to check
impl<G, S> Iterator for Solver<G, S>
where
    G: Sync,
    S: State<G> + Debug,
{
    type Item = S;

    fn next(&mut self) -> Option<Self::Item> {
        if self.solution.is_some() || self.to_check.is_empty() {
            return None;
        }

        let start = Instant::now();
        let frontier = std::mem::take(&mut self.to_check);
        let successors = self.expand(&frontier);

        self.states_checked += frontier.len();
        self.depth += 1;

        // The closed set is only touched here, in order, so the first solution
        // found is the same no matter how many threads did the expanding
        for successor in successors {
            let (next_state, key, rank) = match successor {
                Some(successor) => successor,
                None => {
                    self.states_invalidated += 1;
                    continue;
                }
            };

            if self.checked.contains_key(&key) {
                continue;
            }
            self.checked.insert(key, rank);

            if next_state.is_solved(&self.global_state) {
                self.solution = Some(next_state);
                self.to_check.clear();
                break;
            }

            self.to_check.push(next_state);
        }

        if self.config.prune_closed_set {
            self.prune();
        }

        tracing::debug!(
            "depth: {}, queue: {}, checked: {}, closed: {}, time: {}",
            self.depth,
            self.to_check.len(),
            self.states_checked,
            self.checked.len(),
            start.elapsed().as_secs_f32()
        );

        self.time_spent += start.elapsed().as_secs_f32();
        self.to_check.first().cloned()
    }
}

impl<G, S> Display for Solver<G, S>
where
    G: Sync,
    S: State<G>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "depth {}, {} checked, {} in queue, {} invalidated, {} closed, {:.3} seconds",
            self.depth,
            self.states_checked,
            self.to_check.len(),
            self.states_invalidated,
            self.closed_set_size(),
            self.time_spent
        )
    }
}

#[cfg(test)]
mod test_solver {
    use super::*;
    use std::io::Cursor;

    fn load(input: &str) -> Puzzle {
        Puzzle::read(&mut Cursor::new(input)).unwrap()
    }

    fn solve(puzzle: Puzzle, config: SolverConfig) -> Option<state::State> {
        let initial = puzzle.initial_state().clone();
        let mut solver = Solver::new(puzzle, initial);
        solver.set_config(config);
        solver.run()
    }

    // Replays a path, checking every step is legal
    fn replay(puzzle: &Puzzle, path: &Path) -> state::State {
        let mut state = puzzle.initial_state().clone();
        for direction in path {
            state = state
                .try_move(puzzle, *direction)
                .unwrap_or_else(|| panic!("{direction:?} not allowed in {path}"));
        }
        state
    }

    const WATER: &str = "\
#######
#h-O-h#
#######";

    #[test]
    fn test_simple_bond() {
        let solution = solve(load("H-h"), SolverConfig::default()).unwrap();
        assert_eq!(solution.path().to_string(), "R");
    }

    #[test]
    fn test_water() {
        let puzzle = load(WATER);
        let solution = solve(puzzle.clone(), SolverConfig::default()).unwrap();

        assert_eq!(solution.path().len(), 3);
        assert!(["RLL", "LRR"].contains(&solution.path().to_string().as_str()));
        assert!(replay(&puzzle, solution.path()).is_solved());
    }

    #[test]
    fn test_already_solved() {
        let puzzle = load("Hh\n\nbond 0,0 0,1");
        let solution = solve(puzzle, SolverConfig::default()).unwrap();
        assert!(solution.path().is_empty());
    }

    #[test]
    fn test_no_solution() {
        let puzzle = load("H#h");
        let initial = puzzle.initial_state().clone();
        let mut solver = Solver::new(puzzle, initial);

        assert!(solver.run().is_none());
        assert!(solver.get_solution().is_none());
    }

    #[test]
    fn test_no_solution_without_geometry() {
        // Three hydrogens can't pair up however they move
        let puzzle = load("H---\n-h--\n---h");
        assert!(solve(puzzle.clone(), SolverConfig::default()).is_none());

        let config = SolverConfig {
            viability_filter: false,
            ..SolverConfig::default()
        };
        assert!(solve(puzzle, config).is_none());
    }

    #[test]
    fn test_configs_agree() {
        let input = "\
######
#h--h#
#-O--#
#----#
######";
        let puzzle = load(input);

        let lengths = [
            SolverConfig::default(),
            SolverConfig {
                threads: Some(1),
                ..SolverConfig::default()
            },
            SolverConfig {
                threads: Some(4),
                ..SolverConfig::default()
            },
            SolverConfig {
                viability_filter: false,
                prune_closed_set: false,
                ..SolverConfig::default()
            },
        ]
        .into_iter()
        .map(|config| {
            let solution = solve(puzzle.clone(), config).unwrap();
            assert!(replay(&puzzle, solution.path()).is_solved());
            solution.path().len()
        })
        .collect::<Vec<_>>();

        assert!(lengths.iter().all(|l| *l == lengths[0]), "{lengths:?}");
    }

    #[test]
    fn test_same_answer_across_thread_counts() {
        let puzzle = load(WATER);
        let one = solve(
            puzzle.clone(),
            SolverConfig {
                threads: Some(1),
                ..SolverConfig::default()
            },
        )
        .unwrap();
        let many = solve(
            puzzle,
            SolverConfig {
                threads: Some(4),
                ..SolverConfig::default()
            },
        )
        .unwrap();

        assert_eq!(one.path(), many.path());
    }

    #[test]
    fn test_stats() {
        let puzzle = load(WATER);
        let initial = puzzle.initial_state().clone();
        let mut solver = Solver::new(puzzle, initial);
        solver.run();

        assert_eq!(solver.depth(), 3);
        assert!(solver.states_checked() > 0);
        assert!(solver.to_string().starts_with("depth 3"));
    }

    #[test]
    fn test_prune_shrinks_closed_set() {
        let closed_set_size = |prune_closed_set| {
            let puzzle = load(WATER);
            let initial = puzzle.initial_state().clone();
            let mut solver = Solver::new(puzzle, initial);
            solver.set_config(SolverConfig {
                prune_closed_set,
                ..SolverConfig::default()
            });
            assert!(solver.run().is_some());
            solver.closed_set_size()
        };

        // Every first move bonds, so the unbonded initial state is forgotten
        assert!(closed_set_size(true) < closed_set_size(false));
    }

    #[test]
    fn test_new_ignores_environment() {
        let puzzle = load(WATER);
        let initial = puzzle.initial_state().clone();
        let solver = Solver::new(puzzle, initial);

        assert_eq!(*solver.config(), SolverConfig::default());
    }
}
