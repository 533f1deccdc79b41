//! Stage 4 of §4.3.8: instance/replica linkage (§4.3.2). Every `(i, r) != (0, 0)`
//! offset variable is pinned relative to the instance-0/replica-0 variable; when
//! path selection is active the pinning is itself conditioned on whether that
//! anchor variable is in use (the same `U(link, frame)` indicator
//! `path_selection::couple_path_activation` already stored on the offset).

use crate::builder::BuilderConfig;
use crate::error::Result;
use crate::model::Network;
use crate::solver::{Cmp, LinConstraint, LinExpr, SolverBackend};

/// Assert `O[f,ℓ,i,r] = O[f,ℓ,0,0] + i·period(f)` for every `(i, r) != (0, 0)`.
pub fn assert_linkage<B: SolverBackend>(
    network: &Network,
    backend: &mut B,
    config: &BuilderConfig,
) -> Result<()> {
    for (_, frame) in network.frames() {
        let period = frame.period as i64;
        for offset in frame.offsets.iter() {
            let base = offset.start_time[0][0].expect("stage 1 allocated every variable");
            for i in 0..offset.num_instances {
                for r in 0..offset.num_replicas {
                    if i == 0 && r == 0 {
                        continue;
                    }
                    let var = offset.start_time[i as usize][r as usize]
                        .expect("stage 1 allocated every variable");
                    let equality = LinConstraint {
                        expr: LinExpr::var(var)
                            .with_term(-1, base)
                            .with_constant(-(i as i64 * period)),
                        cmp: Cmp::Eq,
                    };
                    if config.path_selection {
                        let used = offset.used.expect(
                            "path_selection::couple_path_activation runs before linkage",
                        );
                        backend.assert_ite(
                            used,
                            equality,
                            LinConstraint {
                                expr: LinExpr::var(var),
                                cmp: Cmp::Eq,
                            },
                        );
                    } else {
                        backend.assert_linear(equality);
                    }
                }
            }
        }
    }
    Ok(())
}
