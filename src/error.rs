//! Error kinds for every fallible stage of the scheduling pipeline.
//!
//! One flat enum per §7 of the specification: parsing, structural linkage, declared
//! budgets, the solver backend, and internal invariants the builder itself detects.
//! Every fallible operation in this crate returns a [`SchedulerError`]; nothing is
//! retried, and the driver aborts the run at the first error it sees.

use thiserror::Error;

/// Error produced anywhere in the scheduling pipeline, tagged with the kind of
/// failure per §7 of the specification.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A field was missing, out of range, or violated a documented ordering
    /// (e.g. `deadline > period`, `end_to_end > deadline`, an unknown link type).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A path referenced a link that does not exist, or a frame referenced an
    /// unknown end system.
    #[error("structural error: {0}")]
    StructuralError(String),

    /// The declared count of frames/links/switches/end systems in
    /// `General_Information` does not match the actual number parsed.
    #[error("budget mismatch: {0}")]
    BudgetError(String),

    /// The solver backend reported infeasibility, or timed out without ever
    /// finding a feasible solution.
    #[error("solver error: {0}")]
    SolverError(String),

    /// The builder detected an internally inconsistent variable or constraint
    /// state that should be impossible given a correct emission order.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl SchedulerError {
    /// Build an [`SchedulerError::InvalidInput`] naming the offending entity.
    pub fn invalid_input(context: impl std::fmt::Display) -> Self {
        Self::InvalidInput(context.to_string())
    }

    /// Build an [`SchedulerError::StructuralError`] naming the offending entity.
    pub fn structural(context: impl std::fmt::Display) -> Self {
        Self::StructuralError(context.to_string())
    }

    /// Build an [`SchedulerError::BudgetError`] naming the mismatched count.
    pub fn budget(context: impl std::fmt::Display) -> Self {
        Self::BudgetError(context.to_string())
    }

    /// Build an [`SchedulerError::InternalInvariant`] naming the inconsistency.
    pub fn internal(context: impl std::fmt::Display) -> Self {
        Self::InternalInvariant(context.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SchedulerError>;
