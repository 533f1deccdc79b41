//! Shared helpers used by more than one emission stage.

use crate::model::offset::VarHandle;
use crate::solver::{Cmp, LinConstraint, LinExpr, SolverBackend};

/// Allocate a fresh binary `y` constrained to equal the conjunction of
/// `literals`, where each `(var, true)` literal stands for `var` and each
/// `(var, false)` literal stands for `1 - var`.
///
/// Standard MILP linearization of an AND of booleans: `y <= lit_i` for every
/// literal, and `y >= (sum of literals) - (n - 1)`. Used to build guard variables
/// for constraints conditioned on more than one binary flag at once (e.g. "both
/// offsets are in use AND this is the forward-ordering branch"), since
/// [`SolverBackend::assert_indicator`] only conditions on a single variable.
pub fn assert_and_literals<B: SolverBackend>(
    backend: &mut B,
    name: &str,
    literals: &[(VarHandle, bool)],
) -> VarHandle {
    let y = backend.new_binary(name);

    for &(v, positive) in literals {
        let upper = if positive {
            // y - v <= 0  =>  y <= v
            LinConstraint {
                expr: LinExpr::var(y).with_term(-1, v),
                cmp: Cmp::Le,
            }
        } else {
            // y + v - 1 <= 0  =>  y <= 1 - v
            LinConstraint {
                expr: LinExpr::var(y).with_term(1, v).with_constant(-1),
                cmp: Cmp::Le,
            }
        };
        backend.assert_linear(upper);
    }

    let n = literals.len() as i64;
    let mut neg_count = 0i64;
    let mut lower = LinExpr::var(y);
    for &(v, positive) in literals {
        if positive {
            lower = lower.with_term(-1, v);
        } else {
            lower = lower.with_term(1, v);
            neg_count += 1;
        }
    }
    lower = lower.with_constant(n - 1 - neg_count);
    backend.assert_linear(LinConstraint {
        expr: lower,
        cmp: Cmp::Ge,
    });

    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::milp::MilpBackend;

    #[test]
    fn conjunction_of_two_positive_literals_is_satisfiable_only_when_both_one() {
        let mut backend = MilpBackend::new(1_000.0);
        let a = backend.new_binary("a");
        let b = backend.new_binary("b");
        let y = assert_and_literals(&mut backend, "y", &[(a, true), (b, true)]);
        // Force a = 1, b = 0; y must be forced to 0 by the linearization.
        backend.assert_linear(LinConstraint {
            expr: LinExpr::var(a).with_constant(-1),
            cmp: Cmp::Eq,
        });
        backend.assert_linear(LinConstraint {
            expr: LinExpr::var(b),
            cmp: Cmp::Eq,
        });
        backend.set_objective(&[(1.0, y)], crate::solver::Direction::Maximize);
        let status = backend.solve(5).unwrap();
        assert!(matches!(status, crate::solver::SolveStatus::Optimal));
        assert_eq!(backend.value_of(y), 0);
    }
}
