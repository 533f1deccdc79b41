use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tt_scheduler::driver::{self, RunOutcome};

/// Build a time-triggered network schedule from a network topology, a set of
/// frames and their candidate paths, and a solver configuration.
#[derive(Debug, Parser)]
struct Cli {
    /// Network topology and frame document.
    network: PathBuf,
    /// Where to write the resolved schedule.
    schedule: PathBuf,
    /// Solver configuration document.
    configuration: PathBuf,
}

fn main() -> ExitCode {
    pretty_env_logger::init_timed();

    let args = Cli::parse();

    match driver::run(&args.network, &args.schedule, &args.configuration) {
        Ok(RunOutcome::Scheduled) => {
            log::info!("done");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Infeasible) => {
            log::warn!("no feasible schedule exists for this input");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Timeout) => {
            log::warn!("solve timed out without a feasible schedule");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Tuned) => {
            log::info!("tuned parameters written");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
