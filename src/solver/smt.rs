//! SMT solver backend over `z3`'s `Optimize` context (integer theory with
//! optimization, §4.4: "the SMT backend maps this natively").
//!
//! Like [`super::milp::MilpBackend`], every `new_integer`/`new_binary`/`assert_*`/
//! `set_objective` call is buffered as plain data; the `z3::Context` and every
//! `Int`/`Bool` term are only built inside [`SolverBackend::solve`], which keeps
//! this backend free of the self-referential-lifetime problems that come from
//! storing `z3` terms borrowed from a `Context` alongside the buffer itself.

use z3::ast::{Ast, Bool, Int};
use z3::{Config, Context, Optimize, Params, SatResult};

use crate::error::{Result, SchedulerError};
use crate::model::offset::VarHandle;
use crate::solver::{Cmp, Direction, LinConstraint, LinExpr, SolveStatus, SolverBackend};

#[derive(Debug, Clone, Copy)]
enum VarKind {
    Integer { lo: i64, hi: i64 },
    Binary,
}

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

/// SMT backend (integer theory, `Optimize` context). Requires a system `z3`
/// install; enabled via the `smt` feature.
#[derive(Debug, Default)]
pub struct SmtBackend {
    var_kinds: Vec<VarKind>,
    constraints: Vec<Queued>,
    objective: Option<(Vec<(f64, VarHandle)>, Direction)>,
    solved: Option<Vec<i64>>,
}

impl SmtBackend {
    /// Create a new, empty SMT backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn int_expr_of<'ctx>(ctx: &'ctx Context, vars: &[Int<'ctx>], e: &LinExpr) -> Int<'ctx> {
        let mut expr = Int::from_i64(ctx, e.constant);
        for &(coeff, v) in &e.terms {
            expr += Int::from_i64(ctx, coeff) * &vars[v];
        }
        expr
    }

    fn bool_of<'ctx>(ctx: &'ctx Context, vars: &[Int<'ctx>], c: &LinConstraint) -> Bool<'ctx> {
        let expr = Self::int_expr_of(ctx, vars, &c.expr);
        let zero = Int::from_i64(ctx, 0);
        match c.cmp {
            Cmp::Le => expr.le(&zero),
            Cmp::Eq => expr._eq(&zero),
            Cmp::Ge => expr.ge(&zero),
        }
    }
}

impl SolverBackend for SmtBackend {
    fn new_integer(&mut self, _name: &str, lo: i64, hi: i64) -> VarHandle {
        self.var_kinds.push(VarKind::Integer { lo, hi });
        self.var_kinds.len() - 1
    }

    fn new_binary(&mut self, _name: &str) -> VarHandle {
        self.var_kinds.push(VarKind::Binary);
        self.var_kinds.len() - 1
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
        self.objective = Some((
            terms.iter().map(|&(c, v)| (c, v)).collect(),
            direction,
        ));
    }

    fn solve(&mut self, time_limit_sec: u64) -> Result<SolveStatus> {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let zero = Int::from_i64(&ctx, 0);
        let one = Int::from_i64(&ctx, 1);

        let vars: Vec<Int> = (0..self.var_kinds.len())
            .map(|i| Int::new_const(&ctx, format!("v{i}")))
            .collect();

        let opt = Optimize::new(&ctx);

        let mut params = Params::new(&ctx);
        params.set_u32("timeout", (time_limit_sec.saturating_mul(1000)).min(u32::MAX as u64) as u32);
        opt.set_params(&params);

        for (i, kind) in self.var_kinds.iter().enumerate() {
            match *kind {
                VarKind::Integer { lo, hi } => {
                    opt.assert(&vars[i].ge(&Int::from_i64(&ctx, lo)));
                    opt.assert(&vars[i].le(&Int::from_i64(&ctx, hi)));
                }
                VarKind::Binary => {
                    opt.assert(&vars[i].ge(&zero));
                    opt.assert(&vars[i].le(&one));
                }
            }
        }

        for queued in &self.constraints {
            match queued {
                Queued::Linear(c) => opt.assert(&Self::bool_of(&ctx, &vars, c)),
                Queued::Indicator {
                    cond,
                    value,
                    constraint,
                } => {
                    let cond_term = if *value {
                        vars[*cond]._eq(&one)
                    } else {
                        vars[*cond]._eq(&zero)
                    };
                    let body = Self::bool_of(&ctx, &vars, constraint);
                    opt.assert(&cond_term.implies(&body));
                }
                Queued::Or { cond_out, inputs } => {
                    let any = if inputs.is_empty() {
                        Bool::from_bool(&ctx, false)
                    } else {
                        let terms: Vec<Bool> =
                            inputs.iter().map(|&i| vars[i]._eq(&one)).collect();
                        let refs: Vec<&Bool> = terms.iter().collect();
                        Bool::or(&ctx, &refs)
                    };
                    let out_eq_one = vars[*cond_out]._eq(&one);
                    opt.assert(&out_eq_one._eq(&any));
                }
                Queued::Ite {
                    cond,
                    then_c,
                    else_c,
                } => {
                    // Native `ite`, unlike the MILP backend's big-M decomposition
                    // of the same primitive.
                    let cond_bool = vars[*cond]._eq(&one);
                    let then_bool = Self::bool_of(&ctx, &vars, then_c);
                    let else_bool = Self::bool_of(&ctx, &vars, else_c);
                    opt.assert(&cond_bool.ite(&then_bool, &else_bool));
                }
            }
        }

        if let Some((terms, direction)) = &self.objective {
            let mut expr = Int::from_i64(&ctx, 0);
            for &(coeff, v) in terms {
                expr += Int::from_i64(&ctx, coeff as i64) * &vars[v];
            }
            match direction {
                Direction::Minimize => {
                    opt.minimize(&expr);
                }
                Direction::Maximize => {
                    opt.maximize(&expr);
                }
            }
        }

        match opt.check(&[]) {
            SatResult::Sat => {
                let model = opt
                    .get_model()
                    .ok_or_else(|| SchedulerError::internal("z3 reported sat with no model"))?;
                let values = vars
                    .iter()
                    .map(|v| {
                        model
                            .eval(v, true)
                            .and_then(|x| x.as_i64())
                            .unwrap_or_default()
                    })
                    .collect();
                self.solved = Some(values);
                Ok(SolveStatus::Optimal)
            }
            SatResult::Unsat => {
                self.solved = None;
                Ok(SolveStatus::Infeasible)
            }
            SatResult::Unknown => {
                // The `timeout` param above can cut the search short before
                // z3 proves optimality; `get_model()` still returns the best
                // incumbent found so far when one exists (§4.4's
                // feasible-but-not-optimal early exit). Only report a bare
                // timeout when no model was ever found.
                match opt.get_model() {
                    Some(model) => {
                        let values = vars
                            .iter()
                            .map(|v| {
                                model
                                    .eval(v, true)
                                    .and_then(|x| x.as_i64())
                                    .unwrap_or_default()
                            })
                            .collect();
                        self.solved = Some(values);
                        Ok(SolveStatus::Feasible)
                    }
                    None => {
                        self.solved = None;
                        Ok(SolveStatus::Timeout)
                    }
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
