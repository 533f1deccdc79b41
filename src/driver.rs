//! Top-level orchestration (§4.5): read the network and configuration
//! documents, build the constraint model, solve it, and write the schedule —
//! or, in tuning mode, search for good solver parameters instead.

use std::path::Path;

use crate::builder::{self, BuilderConfig};
use crate::error::{Result, SchedulerError};
use crate::io::config::{self, SolverKind};
use crate::io::{network, schedule, tuning};
use crate::solver::milp::MilpBackend;
use crate::solver::{AnyBackend, SolveStatus, SolverBackend};

/// What a run accomplished. Infeasibility and timeouts are reported through
/// this enum rather than `Err`, per §6: "infeasibility is reported but not an
/// abnormal exit" — only parse/emission failures are `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A schedule was found and written to the schedule path.
    Scheduled,
    /// The model is provably infeasible; nothing was written.
    Infeasible,
    /// The time limit elapsed before any feasible solution was found.
    Timeout,
    /// Tuning mode ran and persisted its chosen parameters.
    Tuned,
}

/// Read `network_path`/`config_path`, then either tune or solve, writing the
/// result to `schedule_path` on success.
pub fn run(network_path: &Path, schedule_path: &Path, config_path: &Path) -> Result<RunOutcome> {
    let network_xml = std::fs::read_to_string(network_path)
        .map_err(|e| SchedulerError::invalid_input(format!("cannot read {network_path:?}: {e}")))?;
    let config_xml = std::fs::read_to_string(config_path)
        .map_err(|e| SchedulerError::invalid_input(format!("cannot read {config_path:?}: {e}")))?;

    log::info!("reading network document from {network_path:?}");
    let mut net = network::read_network(&network_xml)?;
    log::info!(
        "network has {} links, {} frames, hyperperiod {}",
        net.num_links(),
        net.num_frames(),
        net.hyperperiod()
    );

    log::info!("reading configuration document from {config_path:?}");
    let cfg = config::read_config(&config_xml)?;

    if cfg.tune {
        log::info!("tuning mode: searching threads/presolve combinations");
        let params = tuning::search(&net, &cfg)?;
        log::info!(
            "tuning picked threads={} presolve={} ({}s)",
            params.threads,
            params.presolve,
            params.solve_seconds
        );
        let params_path = tuning::default_params_path();
        tuning::write_params(&params, &params_path)?;
        return Ok(RunOutcome::Tuned);
    }

    let builder_config = BuilderConfig {
        path_selection: cfg.path_selector,
        optimization: cfg.optimization,
        frame_distance_weight: cfg.frame_distance_weight,
        link_distance_weight: cfg.link_distance_weight,
    };

    let mut backend = match cfg.solver {
        SolverKind::Milp => AnyBackend::Milp(MilpBackend::new(net.hyperperiod() as f64)),
        SolverKind::Smt => new_smt_backend()?,
    };

    log::info!("building constraint model (path_selection={}, optimization={})",
        builder_config.path_selection, builder_config.optimization);
    let selectors = builder::build(&mut net, &mut backend, &builder_config)?;

    log::info!("solving with time limit {}s", cfg.time_limit);
    match backend.solve(cfg.time_limit)? {
        SolveStatus::Optimal | SolveStatus::Feasible => {
            schedule::write(&net, &backend, &selectors, &builder_config, schedule_path)?;
            log::info!("schedule written to {schedule_path:?}");
            Ok(RunOutcome::Scheduled)
        }
        SolveStatus::Infeasible => {
            log::warn!("model is infeasible");
            Ok(RunOutcome::Infeasible)
        }
        SolveStatus::Timeout => {
            log::warn!("solve timed out before finding a feasible solution");
            Ok(RunOutcome::Timeout)
        }
    }
}

#[cfg(feature = "smt")]
fn new_smt_backend() -> Result<AnyBackend> {
    Ok(AnyBackend::Smt(crate::solver::smt::SmtBackend::new()))
}

#[cfg(not(feature = "smt"))]
fn new_smt_backend() -> Result<AnyBackend> {
    Err(SchedulerError::invalid_input(
        "configuration requests the \"z3\" solver but this binary was built without the \"smt\" feature",
    ))
}
