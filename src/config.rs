use lazy_static::lazy_static;

lazy_static! {
    static ref THREADS: Option<usize> = std::env::var("SOKOBOND_THREADS")
        .ok()
        .and_then(|s| s.parse().ok());

    static ref NO_VIABILITY: bool = std::env::var("SOKOBOND_NO_VIABILITY").is_ok();

    static ref NO_PRUNE: bool = std::env::var("SOKOBOND_NO_PRUNE").is_ok();

    static ref PROGRESS: Option<usize> = std::env::var("SOKOBOND_PROGRESS")
        .ok()
        .and_then(|s| s.parse().ok());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverConfig {
    // Worker threads to expand with, or rayon's global pool if None
    pub threads: Option<usize>,

    // Drop successors that fail State::is_valid
    pub viability_filter: bool,

    // Forget closed set keys ranked below everything in the frontier
    pub prune_closed_set: bool,

    // Log progress every this many levels
    pub progress_every: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            threads: None,
            viability_filter: true,
            prune_closed_set: true,
            progress_every: 10,
        }
    }
}

impl SolverConfig {
    pub fn from_env() -> SolverConfig {
        let default = SolverConfig::default();

        SolverConfig {
            threads: *THREADS,
            viability_filter: !*NO_VIABILITY,
            prune_closed_set: !*NO_PRUNE,
            progress_every: PROGRESS.unwrap_or(default.progress_every).max(1),
        }
    }
}
