//! Solver adapter abstraction (§4.4): a backend-agnostic capability exposing
//! variable creation, linear/indicator/disjunctive assertions, an objective, and
//! `solve`/`value_of`, with two concrete implementations: [`milp::MilpBackend`]
//! (MILP via `good_lp`/CBC, always available) and [`smt::SmtBackend`] (SMT via `z3`,
//! behind the `smt` feature).
//!
//! Every primitive here maps 1:1 onto a call the constraint model builder makes;
//! the builder itself never reaches into a concrete backend's internals. This
//! mirrors the teacher's `ilp_scheduler` module, which only ever talks to
//! `good_lp`'s `SolverModel`/`ProblemVariables` traits, never to `coin_cbc`
//! directly outside of `mod.rs`'s top-level `solve`/`setup_vars`.

pub mod milp;
#[cfg(feature = "smt")]
pub mod smt;

use crate::error::Result;
use crate::model::offset::VarHandle;

/// Comparison operator for a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `>=`
    Ge,
}

/// Direction of the optimization objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Minimize the objective expression.
    Minimize,
    /// Maximize the objective expression.
    Maximize,
}

/// Outcome of a `solve` call. Solvers may return early with a feasible-but-not-
/// optimal result; the driver treats any solution with all constraints satisfied
/// as acceptable (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// A provably optimal solution was found.
    Optimal,
    /// A feasible (not necessarily optimal) solution was found, e.g. because the
    /// time limit was hit.
    Feasible,
    /// The model is provably infeasible.
    Infeasible,
    /// The time limit was hit before any feasible solution was found.
    Timeout,
}

/// A linear expression: a constant plus a weighted sum of variables.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    /// Constant term.
    pub constant: i64,
    /// `(coefficient, variable)` terms.
    pub terms: Vec<(i64, VarHandle)>,
}

impl LinExpr {
    /// A bare constant expression.
    pub fn constant(c: i64) -> Self {
        Self {
            constant: c,
            terms: Vec::new(),
        }
    }

    /// A single variable with coefficient 1.
    pub fn var(v: VarHandle) -> Self {
        Self {
            constant: 0,
            terms: vec![(1, v)],
        }
    }

    /// Add a `coefficient * variable` term, consuming and returning `self` for
    /// chaining.
    pub fn with_term(mut self, coeff: i64, v: VarHandle) -> Self {
        self.terms.push((coeff, v));
        self
    }

    /// Add a constant, consuming and returning `self` for chaining.
    pub fn with_constant(mut self, c: i64) -> Self {
        self.constant += c;
        self
    }
}

/// A linear constraint: `expr cmp 0`, i.e. `expr.terms . vars + expr.constant cmp 0`.
#[derive(Debug, Clone)]
pub struct LinConstraint {
    /// Left-hand side expression.
    pub expr: LinExpr,
    /// Comparison operator.
    pub cmp: Cmp,
}

/// Backend-agnostic solver capability (§4.4). The constraint model builder only
/// ever talks through this trait.
pub trait SolverBackend {
    /// Allocate an integer decision variable in `[lo, hi]`.
    fn new_integer(&mut self, name: &str, lo: i64, hi: i64) -> VarHandle;

    /// Allocate a binary (0/1) decision variable.
    fn new_binary(&mut self, name: &str) -> VarHandle;

    /// Assert a linear constraint unconditionally.
    fn assert_linear(&mut self, constraint: LinConstraint);

    /// Assert that `constraint` holds whenever `cond == value` (0 or 1). Native on
    /// the SMT backend; decomposed into a big-M pair on the MILP backend.
    fn assert_indicator(&mut self, cond: VarHandle, value: bool, constraint: LinConstraint);

    /// Assert that `cond_out == 1` iff at least one of `inputs` is `1`.
    fn assert_or(&mut self, cond_out: VarHandle, inputs: &[VarHandle]);

    /// Assert `if cond then then_c else else_c`. The SMT backend maps this
    /// natively onto an `ite` term; the MILP backend decomposes it into two
    /// [`SolverBackend::assert_indicator`] calls (§4.4).
    fn assert_ite(&mut self, cond: VarHandle, then_c: LinConstraint, else_c: LinConstraint);

    /// Set (or replace) the optimization objective.
    fn set_objective(&mut self, terms: &[(f64, VarHandle)], direction: Direction);

    /// Solve the model, bounded by `time_limit_sec` (0 means "no limit" is not
    /// permitted by the driver, which always supplies a positive bound — see
    /// `Driver`).
    fn solve(&mut self, time_limit_sec: u64) -> Result<SolveStatus>;

    /// Read back the value assigned to `var` by the last successful `solve` call.
    fn value_of(&self, var: VarHandle) -> i64;
}

/// The backend `Config::solver` (parsed at runtime from a configuration
/// document) selects between, without paying for a `dyn SolverBackend` object
/// and the `?Sized` bounds that would ripple through every generic builder
/// function in [`crate::builder`]. Delegates every [`SolverBackend`] method to
/// whichever variant is active.
pub enum AnyBackend {
    /// MILP via `good_lp`/CBC, always available.
    Milp(milp::MilpBackend),
    /// SMT via `z3`, only constructible when the `smt` feature is compiled in.
    #[cfg(feature = "smt")]
    Smt(smt::SmtBackend),
}

impl SolverBackend for AnyBackend {
    fn new_integer(&mut self, name: &str, lo: i64, hi: i64) -> VarHandle {
        match self {
            AnyBackend::Milp(b) => b.new_integer(name, lo, hi),
            #[cfg(feature = "smt")]
            AnyBackend::Smt(b) => b.new_integer(name, lo, hi),
        }
    }

    fn new_binary(&mut self, name: &str) -> VarHandle {
        match self {
            AnyBackend::Milp(b) => b.new_binary(name),
            #[cfg(feature = "smt")]
            AnyBackend::Smt(b) => b.new_binary(name),
        }
    }

    fn assert_linear(&mut self, constraint: LinConstraint) {
        match self {
            AnyBackend::Milp(b) => b.assert_linear(constraint),
            #[cfg(feature = "smt")]
            AnyBackend::Smt(b) => b.assert_linear(constraint),
        }
    }

    fn assert_indicator(&mut self, cond: VarHandle, value: bool, constraint: LinConstraint) {
        match self {
            AnyBackend::Milp(b) => b.assert_indicator(cond, value, constraint),
            #[cfg(feature = "smt")]
            AnyBackend::Smt(b) => b.assert_indicator(cond, value, constraint),
        }
    }

    fn assert_or(&mut self, cond_out: VarHandle, inputs: &[VarHandle]) {
        match self {
            AnyBackend::Milp(b) => b.assert_or(cond_out, inputs),
            #[cfg(feature = "smt")]
            AnyBackend::Smt(b) => b.assert_or(cond_out, inputs),
        }
    }

    fn assert_ite(&mut self, cond: VarHandle, then_c: LinConstraint, else_c: LinConstraint) {
        match self {
            AnyBackend::Milp(b) => b.assert_ite(cond, then_c, else_c),
            #[cfg(feature = "smt")]
            AnyBackend::Smt(b) => b.assert_ite(cond, then_c, else_c),
        }
    }

    fn set_objective(&mut self, terms: &[(f64, VarHandle)], direction: Direction) {
        match self {
            AnyBackend::Milp(b) => b.set_objective(terms, direction),
            #[cfg(feature = "smt")]
            AnyBackend::Smt(b) => b.set_objective(terms, direction),
        }
    }

    fn solve(&mut self, time_limit_sec: u64) -> Result<SolveStatus> {
        match self {
            AnyBackend::Milp(b) => b.solve(time_limit_sec),
            #[cfg(feature = "smt")]
            AnyBackend::Smt(b) => b.solve(time_limit_sec),
        }
    }

    fn value_of(&self, var: VarHandle) -> i64 {
        match self {
            AnyBackend::Milp(b) => b.value_of(var),
            #[cfg(feature = "smt")]
            AnyBackend::Smt(b) => b.value_of(var),
        }
    }
}
