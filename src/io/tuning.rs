//! Tuning mode (§6): search for good CBC `threads`/`presolve` settings by
//! rebuilding the model fresh for each candidate and timing how long it takes
//! to reach a feasible solution, bounded by `Config::tune_time_limit`.
//!
//! Candidates are swept sequentially unless the `tune-parallel` feature is
//! enabled, in which case they run concurrently via `rayon` (mirrors the
//! teacher's own thread-sizing convention of reaching for `rayon`/`num_cpus`
//! only behind an explicit feature rather than unconditionally).

use std::path::{Path, PathBuf};
use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::builder::{self, BuilderConfig};
use crate::error::{Result, SchedulerError};
use crate::io::config::Config;
use crate::model::Network;
use crate::solver::milp::MilpBackend;
use crate::solver::{SolveStatus, SolverBackend};

/// The winning parameter combination found by [`search`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TunedParams {
    pub threads: usize,
    pub presolve: bool,
    pub solve_seconds: u64,
}

/// Where `write_params` persists its result by default, next to the binary's
/// working directory (the driver lets the caller override this via the
/// schedule path's parent, but this is the fallback used by the CLI).
pub fn default_params_path() -> PathBuf {
    PathBuf::from("tuned_params.json")
}

struct Candidate {
    threads: usize,
    presolve: bool,
}

fn candidates() -> Vec<Candidate> {
    let max_threads = num_cpus::get().max(1);
    let mut threads_to_try = vec![1usize];
    if max_threads > 1 {
        threads_to_try.push(max_threads);
    }

    let mut out = Vec::new();
    for &threads in &threads_to_try {
        for &presolve in &[true, false] {
            out.push(Candidate { threads, presolve });
        }
    }
    out
}

fn time_candidate(
    network: &Network,
    config: &Config,
    builder_config: &BuilderConfig,
    candidate: &Candidate,
) -> Result<Option<u64>> {
    let mut network = network.clone();
    let mut backend = MilpBackend::new(network.hyperperiod() as f64)
        .with_threads(candidate.threads)
        .with_presolve(candidate.presolve);

    builder::build(&mut network, &mut backend, builder_config)?;

    let start = Instant::now();
    let status = backend.solve(config.tune_time_limit)?;
    let elapsed = start.elapsed().as_secs();

    match status {
        SolveStatus::Optimal | SolveStatus::Feasible => Ok(Some(elapsed)),
        SolveStatus::Infeasible | SolveStatus::Timeout => Ok(None),
    }
}

/// Sweep `threads ∈ {1, num_cpus}` × `presolve ∈ {true, false}`, rebuilding the
/// constraint model fresh for each candidate, and keep the fastest one that
/// reached a feasible solution within `config.tune_time_limit`.
pub fn search(network: &Network, config: &Config) -> Result<TunedParams> {
    let builder_config = BuilderConfig {
        path_selection: config.path_selector,
        optimization: config.optimization,
        frame_distance_weight: config.frame_distance_weight,
        link_distance_weight: config.link_distance_weight,
    };

    let results: Vec<(Candidate, Result<Option<u64>>)> = run_candidates(network, config, &builder_config);

    let mut best: Option<TunedParams> = None;
    for (candidate, result) in results {
        let elapsed = match result? {
            Some(e) => e,
            None => continue,
        };
        let better = match &best {
            None => true,
            Some(b) => elapsed < b.solve_seconds,
        };
        if better {
            best = Some(TunedParams {
                threads: candidate.threads,
                presolve: candidate.presolve,
                solve_seconds: elapsed,
            });
        }
    }

    best.ok_or_else(|| {
        SchedulerError::SolverError("no tuning candidate reached a feasible solution".to_string())
    })
}

#[cfg(feature = "tune-parallel")]
fn run_candidates(
    network: &Network,
    config: &Config,
    builder_config: &BuilderConfig,
) -> Vec<(Candidate, Result<Option<u64>>)> {
    use rayon::prelude::*;

    candidates()
        .into_par_iter()
        .map(|candidate| {
            let result = time_candidate(network, config, builder_config, &candidate);
            (candidate, result)
        })
        .collect()
}

#[cfg(not(feature = "tune-parallel"))]
fn run_candidates(
    network: &Network,
    config: &Config,
    builder_config: &BuilderConfig,
) -> Vec<(Candidate, Result<Option<u64>>)> {
    candidates()
        .into_iter()
        .map(|candidate| {
            let result = time_candidate(network, config, builder_config, &candidate);
            (candidate, result)
        })
        .collect()
}

/// Persist `params` as pretty-printed JSON at `path`. Feature-gated on `serde`
/// (enabled by default).
#[cfg(feature = "serde")]
pub fn write_params(params: &TunedParams, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(params)
        .map_err(|e| SchedulerError::internal(format!("cannot serialize tuned params: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| SchedulerError::internal(format!("cannot write {path:?}: {e}")))
}

#[cfg(not(feature = "serde"))]
pub fn write_params(_params: &TunedParams, _path: &Path) -> Result<()> {
    Err(SchedulerError::internal(
        "writing tuned parameters requires the \"serde\" feature",
    ))
}
