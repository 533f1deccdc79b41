//! MILP solver backend over `good_lp`/CBC.
//!
//! Grounded directly on `examples/nsg-ethz-Chameleon/src/decomposition/ilp_scheduler/mod.rs`
//! (variable/model/constraint staging against `good_lp::{ProblemVariables,
//! SolverModel, coin_cbc}`) and `or_tools.rs` (the big-M decomposition used here for
//! `assert_indicator`/`assert_ite`/`assert_or`, adapted from `c_if_then_else`/
//! `c_any`/`inequality`).
//!
//! `good_lp` requires every decision variable to be declared up front, before the
//! objective is set and the concrete `CoinCbcProblem` model is built; constraints
//! can only be added to that concrete model. But the constraint model builder
//! (§4.3.8) interleaves variable creation with constraint emission across several
//! stages. We bridge the two by buffering every `new_integer`/`new_binary`/
//! `assert_*`/`set_objective` call as plain data, and only materializing the
//! `good_lp` problem — variables, objective, then every buffered constraint, in
//! that order — inside `solve`.

use good_lp::{
    solvers::coin_cbc::{coin_cbc, CoinCbcProblem},
    variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
};

use crate::error::{Result, SchedulerError};
use crate::model::offset::VarHandle;
use crate::solver::{Cmp, Direction, LinConstraint, LinExpr, SolveStatus, SolverBackend};

/// Declaration of one decision variable, buffered until `solve` time.
#[derive(Debug, Clone)]
enum VarKind {
    Integer { lo: i64, hi: i64 },
    Binary,
}

#[derive(Debug, Clone)]
struct VarSpec {
    kind: VarKind,
    name: String,
}

/// One buffered constraint, in the shape it was asserted through [`SolverBackend`].
#[derive(Debug, Clone)]
enum Queued {
    Linear(LinConstraint),
    Indicator {
        cond: VarHandle,
        value: bool,
        constraint: LinConstraint,
    },
    Or {
        cond_out: VarHandle,
        inputs: Vec<VarHandle>,
    },
    Ite {
        cond: VarHandle,
        then_c: LinConstraint,
        else_c: LinConstraint,
    },
}

/// MILP backend. Buffers variables/constraints/objective as plain data and
/// materializes a `good_lp` CBC model only inside [`SolverBackend::solve`].
#[derive(Debug)]
pub struct MilpBackend {
    var_specs: Vec<VarSpec>,
    constraints: Vec<Queued>,
    objective: Option<(Vec<(f64, VarHandle)>, Direction)>,
    /// Big-M constant used to relax indicator/disjunctive constraints. Must be
    /// larger than any value any variable in the model can take, e.g. the
    /// network's hyperperiod for offset/time variables.
    big_m: f64,
    /// Suppress CBC's own stdout logging (mirrors the teacher's
    /// `hide-cbc-output` feature).
    quiet: bool,
    /// CBC thread count, set via the `threads` CBC parameter when present.
    threads: Option<usize>,
    /// CBC presolve toggle, set via the `presolve` CBC parameter when present.
    presolve: Option<bool>,
    solved: Option<Vec<i64>>,
}

impl MilpBackend {
    /// Create a new, empty MILP backend. `big_m` must exceed any value a variable
    /// in this model can take (the driver passes the network's hyperperiod, since
    /// every offset and distance variable is bounded by it).
    pub fn new(big_m: f64) -> Self {
        Self {
            var_specs: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            big_m,
            quiet: true,
            threads: None,
            presolve: None,
            solved: None,
        }
    }

    /// Let CBC print its own solve log (disabled by default, as in the teacher's
    /// `hide-cbc-output` feature).
    pub fn verbose(mut self) -> Self {
        self.quiet = false;
        self
    }

    /// Pin the number of CBC worker threads, used by the tuning search to sweep
    /// candidate thread counts.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Enable or disable CBC presolve, used by the tuning search to sweep
    /// candidate presolve settings.
    pub fn with_presolve(mut self, enabled: bool) -> Self {
        self.presolve = Some(enabled);
        self
    }

    /// Number of variables declared so far (idempotence property, §8: emitting
    /// the model twice must produce identical variable/constraint counts).
    pub fn variable_count(&self) -> usize {
        self.var_specs.len()
    }

    /// Number of constraint groups buffered so far (each `assert_or`/`assert_ite`
    /// call counts as one group even though it expands into several rows at
    /// `solve` time).
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Every declared variable's name, in declaration order (determinism
    /// property, §5: variable names are deterministic across runs over
    /// identical inputs).
    pub fn variable_names(&self) -> Vec<&str> {
        self.var_specs.iter().map(|s| s.name.as_str()).collect()
    }

    fn expr_of(gvars: &[Variable], e: &LinExpr) -> Expression {
        let mut expr = Expression::from(e.constant as f64);
        for &(coeff, v) in &e.terms {
            expr += (coeff as f64) * gvars[v];
        }
        expr
    }

    fn constraint_of(gvars: &[Variable], c: &LinConstraint) -> good_lp::Constraint {
        let expr = Self::expr_of(gvars, &c.expr);
        match c.cmp {
            Cmp::Le => expr.leq(0.0),
            Cmp::Eq => expr.eq(0.0),
            Cmp::Ge => expr.geq(0.0),
        }
    }

    /// `cond == value => constraint`, decomposed via big-M (grounded on
    /// `or_tools::c_if_then_else`/`inequality`).
    fn add_indicator(
        model: &mut CoinCbcProblem,
        gvars: &[Variable],
        big_m: f64,
        cond: VarHandle,
        value: bool,
        c: &LinConstraint,
    ) {
        let expr = Self::expr_of(gvars, &c.expr);
        let active: Expression = if value {
            Expression::from(1.0) - gvars[cond]
        } else {
            Expression::from(gvars[cond])
        };
        match c.cmp {
            Cmp::Le => model.add_constraint((expr - big_m * active).leq(0.0)),
            Cmp::Ge => model.add_constraint((expr + big_m * active).geq(0.0)),
            Cmp::Eq => {
                model.add_constraint((expr.clone() - big_m * active.clone()).leq(0.0));
                model.add_constraint((expr + big_m * active).geq(0.0));
            }
        }
    }

    /// `cond_out == 1` iff any of `inputs == 1` (grounded on `or_tools::c_any`).
    fn add_or(model: &mut CoinCbcProblem, gvars: &[Variable], cond_out: VarHandle, inputs: &[VarHandle]) {
        for &inp in inputs {
            model.add_constraint((Expression::from(gvars[cond_out]) - gvars[inp]).geq(0.0));
        }
        let sum: Expression = inputs.iter().map(|&i| Expression::from(gvars[i])).sum();
        model.add_constraint((sum - gvars[cond_out]).geq(0.0));
    }
}

impl SolverBackend for MilpBackend {
    fn new_integer(&mut self, name: &str, lo: i64, hi: i64) -> VarHandle {
        self.var_specs.push(VarSpec {
            kind: VarKind::Integer { lo, hi },
            name: name.to_string(),
        });
        self.var_specs.len() - 1
    }

    fn new_binary(&mut self, name: &str) -> VarHandle {
        self.var_specs.push(VarSpec {
            kind: VarKind::Binary,
            name: name.to_string(),
        });
        self.var_specs.len() - 1
    }

    fn assert_linear(&mut self, constraint: LinConstraint) {
        self.constraints.push(Queued::Linear(constraint));
    }

    fn assert_indicator(&mut self, cond: VarHandle, value: bool, constraint: LinConstraint) {
        self.constraints.push(Queued::Indicator {
            cond,
            value,
            constraint,
        });
    }

    fn assert_or(&mut self, cond_out: VarHandle, inputs: &[VarHandle]) {
        self.constraints.push(Queued::Or {
            cond_out,
            inputs: inputs.to_vec(),
        });
    }

    fn assert_ite(&mut self, cond: VarHandle, then_c: LinConstraint, else_c: LinConstraint) {
        self.constraints.push(Queued::Ite {
            cond,
            then_c,
            else_c,
        });
    }

    fn set_objective(&mut self, terms: &[(f64, VarHandle)], direction: Direction) {
        self.objective = Some((terms.to_vec(), direction));
    }

    fn solve(&mut self, time_limit_sec: u64) -> Result<SolveStatus> {
        let mut problem_vars = ProblemVariables::new();
        let mut gvars = Vec::with_capacity(self.var_specs.len());
        for spec in &self.var_specs {
            let def = match spec.kind {
                VarKind::Integer { lo, hi } => variable().integer().min(lo as f64).max(hi as f64),
                VarKind::Binary => variable().binary(),
            };
            gvars.push(problem_vars.add(def.name(spec.name.clone())));
        }

        let (obj_expr, direction) = match &self.objective {
            Some((terms, direction)) => {
                let mut expr = Expression::from(0.0);
                for &(coeff, v) in terms {
                    expr += coeff * gvars[v];
                }
                (expr, *direction)
            }
            None => (Expression::from(0.0), Direction::Minimize),
        };

        let mut model = match direction {
            Direction::Minimize => coin_cbc(problem_vars.minimise(obj_expr)),
            Direction::Maximize => coin_cbc(problem_vars.maximise(obj_expr)),
        };
        model.set_parameter("seconds", &time_limit_sec.to_string());
        if self.quiet {
            model.set_parameter("logLevel", "0");
        }
        if let Some(threads) = self.threads {
            model.set_parameter("threads", &threads.to_string());
        }
        if let Some(presolve) = self.presolve {
            model.set_parameter("presolve", if presolve { "on" } else { "off" });
        }

        for queued in &self.constraints {
            match queued {
                Queued::Linear(c) => model.add_constraint(Self::constraint_of(&gvars, c)),
                Queued::Indicator {
                    cond,
                    value,
                    constraint,
                } => Self::add_indicator(&mut model, &gvars, self.big_m, *cond, *value, constraint),
                Queued::Or { cond_out, inputs } => Self::add_or(&mut model, &gvars, *cond_out, inputs),
                Queued::Ite {
                    cond,
                    then_c,
                    else_c,
                } => {
                    Self::add_indicator(&mut model, &gvars, self.big_m, *cond, true, then_c);
                    Self::add_indicator(&mut model, &gvars, self.big_m, *cond, false, else_c);
                }
            }
        }

        log::debug!(
            "MILP model: {} variables, {} buffered constraint groups",
            gvars.len(),
            self.constraints.len()
        );

        match model.solve() {
            Ok(solution) => {
                // CBC can return an incumbent it never proved optimal, e.g. when
                // the `seconds` limit above is hit before the branch-and-bound
                // tree closes (§4.4: "solvers may return early with a
                // feasible-but-not-optimal result"). `raw()` exposes the
                // underlying `Cbc_isProvenOptimal` flag so we can tell the two
                // apart instead of always reporting `Optimal`.
                let status = if solution.raw().is_proven_optimal() {
                    SolveStatus::Optimal
                } else {
                    SolveStatus::Feasible
                };
                let values = gvars
                    .iter()
                    .map(|v| solution.value(*v).round() as i64)
                    .collect();
                self.solved = Some(values);
                Ok(status)
            }
            Err(ResolutionError::Infeasible) => {
                self.solved = None;
                Ok(SolveStatus::Infeasible)
            }
            Err(ResolutionError::Unbounded) => Err(SchedulerError::SolverError(
                "MILP model is unbounded".to_string(),
            )),
            Err(e) => {
                let msg = e.to_string();
                self.solved = None;
                if msg.to_lowercase().contains("time") {
                    Ok(SolveStatus::Timeout)
                } else {
                    Err(SchedulerError::SolverError(msg))
                }
            }
        }
    }

    fn value_of(&self, var: VarHandle) -> i64 {
        self.solved
            .as_ref()
            .expect("value_of called before a successful solve")[var]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_before_materializing() {
        let mut backend = MilpBackend::new(10_000.0);
        let a = backend.new_integer("a", 0, 100);
        let b = backend.new_integer("b", 0, 100);
        backend.assert_linear(LinConstraint {
            expr: LinExpr::var(a).with_term(-1, b).with_constant(0),
            cmp: Cmp::Eq,
        });
        assert_eq!(backend.var_specs.len(), 2);
        assert_eq!(backend.constraints.len(), 1);
        let _ = a;
        let _ = b;
    }
}
