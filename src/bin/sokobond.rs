use std::io::{self, Read};

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;

use sokobond_solver::state::State;
use sokobond_solver::{Path, Puzzle, Solver, SolverConfig};

lazy_static! {
    static ref JSON_OUTPUT: bool = std::env::var("SOKOBOND_JSON").is_ok();
}

fn solve(puzzle: Puzzle) -> Option<State> {
    let initial = puzzle.initial_state().clone();
    let mut solver = Solver::new(puzzle.clone(), initial);
    solver.set_config(SolverConfig::from_env());

    while let Some(state) = solver.next() {
        if solver.depth() % solver.config().progress_every.max(1) != 0 {
            continue;
        }
        log::info!("{solver}, state:\n{}", state.stringify(&puzzle));
    }

    let solution = match solver.get_solution() {
        Some(solution) => solution,
        None => {
            log::error!(
                "No solution found after {} states in {} seconds",
                solver.states_checked(),
                solver.time_spent(),
            );
            return None;
        }
    };

    log::info!(
        "Solved after {} states in {} seconds:\n{}",
        solver.states_checked(),
        solver.time_spent(),
        solution.stringify(&puzzle),
    );

    Some(solution)
}

// Apply each step of a path in turn, failing on the first illegal one
fn replay(puzzle: &Puzzle, path: &Path) -> Result<State> {
    let mut state = puzzle.initial_state().clone();

    for (i, direction) in path.iter().enumerate() {
        state = state
            .try_move(puzzle, *direction)
            .ok_or_else(|| anyhow!("Step {i} ({direction:?}) of {path} is not possible"))?;
        log::info!("After step {i} ({direction:?}):\n{}", state.stringify(puzzle));
    }

    Ok(state)
}

fn render(path: &Path, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string(path)?)
    } else {
        Ok(path.to_string())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("reading puzzle from stdin")?;
    let puzzle = Puzzle::load(&input)?;

    log::info!("Initial state:\n{}", puzzle.initial_state().stringify(&puzzle));

    // If there are args, assume they're paths to check
    if std::env::args().len() > 1 {
        for instructions in std::env::args().skip(1) {
            let path: Path = instructions.parse()?;
            let state = replay(&puzzle, &path)?;
            println!("{path}: solved = {}", state.is_solved());
        }
        return Ok(());
    }

    // Otherwise, try to find a new solution
    if let Some(solution) = solve(puzzle.clone()) {
        let path = solution.path();

        println!("{}", render(path, *JSON_OUTPUT)?);

        // Check against known solutions
        if !puzzle.solutions().is_empty() && !puzzle.solutions().contains(path) {
            log::warn!("Solution does not match known solution")
        }

        return Ok(());
    }

    Err(anyhow!("No solution found"))
}

#[cfg(test)]
mod test_solutions {
    use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    use std::{fs, sync::mpsc, thread};

    use super::*;

    #[test]
    fn test_all_solutions() {
        // Timeout after 5 seconds or SOKOBOND_TEST_TIMEOUT if set
        let timeout = std::time::Duration::from_secs(
            std::env::var("SOKOBOND_TEST_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        );

        let mut test_files = fs::read_dir("data/sokobond")
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|e| e == "txt"))
            .collect::<Vec<_>>();
        test_files.sort();
        println!("Running {} tests", test_files.len());
        assert!(!test_files.is_empty());

        #[derive(Debug, Clone, Eq, PartialEq)]
        enum TestResult {
            Success,
            NoSolution,
            InvalidSolution(String),
            TimedOut,
        }

        let results = test_files
            .par_iter()
            .map(|path| {
                let input = fs::read_to_string(path).unwrap();
                let puzzle = Puzzle::load(&input).unwrap();

                let (tx, rx) = mpsc::channel();
                let solver_puzzle = puzzle.clone();
                thread::spawn(move || {
                    // The receiver may have given up already
                    let _ = tx.send(solve(solver_puzzle));
                });

                match rx.recv_timeout(timeout) {
                    Ok(None) => TestResult::NoSolution,
                    Ok(Some(solution)) => {
                        let found = solution.path();

                        // Breadth first, so never longer than a known solution
                        let shortest = puzzle.solutions().iter().map(|s| s.len()).min();
                        let replayed = replay(&puzzle, found).map(|s| s.is_solved());

                        let too_long = shortest.is_some_and(|l| found.len() > l);
                        if too_long || !matches!(replayed, Ok(true)) {
                            log::debug!("Invalid solution: {found}");
                            TestResult::InvalidSolution(found.to_string())
                        } else {
                            TestResult::Success
                        }
                    }
                    Err(_) => TestResult::TimedOut,
                }
            })
            .collect::<Vec<_>>();

        for (path, result) in test_files.iter().zip(results.iter()) {
            if *result != TestResult::Success {
                println!("  {:?} -> {:?}", path, result);
            }
        }

        assert!(results.iter().all(|r| *r == TestResult::Success));
    }

    #[test]
    fn test_replay_rejects_illegal_step() {
        let puzzle = Puzzle::load("#####\n#H-h#\n#####").unwrap();

        assert!(replay(&puzzle, &"R".parse().unwrap()).unwrap().is_solved());
        assert!(replay(&puzzle, &"U".parse().unwrap()).is_err());
        assert!(!replay(&puzzle, &"".parse().unwrap()).unwrap().is_solved());
    }

    #[test]
    fn test_render_round_trips() {
        let path: Path = "DRRRU".parse().unwrap();

        let json = render(&path, true).unwrap();
        assert_eq!(json, r#"["Down","Right","Right","Right","Up"]"#);
        assert_eq!(serde_json::from_str::<Path>(&json).unwrap(), path);

        let plain = render(&path, false).unwrap();
        assert_eq!(plain, "DRRRU");
        assert_eq!(plain.parse::<Path>().unwrap(), path);
    }
}
