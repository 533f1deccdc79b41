//! Stages 2-3 of §4.3.8: path-selector variables (§4.3.3 first half) and
//! path-activation coupling (§4.3.3 second half). Only invoked when
//! [`BuilderConfig::path_selection`](crate::builder::BuilderConfig) is set;
//! otherwise every frame uses exactly one (the first) path per receiver
//! unconditionally, and no selector variables exist at all.

use std::collections::HashMap;

use crate::error::{Result, SchedulerError};
use crate::model::offset::VarHandle;
use crate::model::{FrameId, Network};
use crate::solver::{Cmp, LinConstraint, LinExpr, SolverBackend};

/// `X[f, receiver, path]` binary handles, keyed by frame id, the receiver's raw
/// end-system node id, and the path's index within `PathTable::paths_for`.
#[derive(Debug, Default, Clone)]
pub struct PathSelectors {
    vars: HashMap<(FrameId, u32, usize), VarHandle>,
}

impl PathSelectors {
    /// The selector variable for `(frame, receiver, path_index)`, if path
    /// selection is active and this combination was registered.
    pub fn get(&self, frame: FrameId, receiver: u32, path_index: usize) -> Option<VarHandle> {
        self.vars.get(&(frame, receiver, path_index)).copied()
    }

    /// Every `(frame, receiver, path_index, handle)` quadruple, in no particular
    /// order — used by the driver to read back which path each receiver ended up
    /// using after `solve`.
    pub fn iter(&self) -> impl Iterator<Item = (FrameId, u32, usize, VarHandle)> + '_ {
        self.vars.iter().map(|(&(f, k, p), &h)| (f, k, p, h))
    }
}

/// Stage 2: one binary `X[f,k,p]` per available path, named
/// `X_<frame>_<receiver>_<path>`, with `Σ_p X[f,k,p] = 1` per `(frame,
/// receiver)`.
pub fn allocate_selectors<B: SolverBackend>(
    network: &Network,
    backend: &mut B,
) -> Result<PathSelectors> {
    let mut selectors = PathSelectors::default();
    for (fid, frame) in network.frames() {
        let sender_idx = network.end_system_idx(frame.sender_id).ok_or_else(|| {
            SchedulerError::structural(format!(
                "frame {fid} references unknown sender end system {}",
                frame.sender_id
            ))
        })?;
        for &receiver_id in &frame.receivers_id {
            let receiver_idx = network.end_system_idx(receiver_id).ok_or_else(|| {
                SchedulerError::structural(format!(
                    "frame {fid} references unknown receiver end system {receiver_id}"
                ))
            })?;
            let paths = network.paths().paths_for(sender_idx, receiver_idx);
            if paths.is_empty() {
                return Err(SchedulerError::structural(format!(
                    "frame {fid} has no path from sender {} to receiver {receiver_id}",
                    frame.sender_id
                )));
            }

            let mut sum_expr = LinExpr::constant(-1);
            for p in 0..paths.len() {
                let name = format!("X_{fid}_{receiver_id}_{p}");
                let handle = backend.new_binary(&name);
                selectors.vars.insert((fid, receiver_id, p), handle);
                sum_expr = sum_expr.with_term(1, handle);
            }
            backend.assert_linear(LinConstraint {
                expr: sum_expr,
                cmp: Cmp::Eq,
            });
        }
    }
    Ok(selectors)
}

/// Stage 3: for every offset, aggregate the per-receiver usage indicator
/// `S(link, frame, receiver)` into `U(link, frame)` (one binary per offset, `1`
/// iff some receiver's selected path routes frame `f` over this link), and
/// couple it to every replica's instance-0 variable: `U=1 => var >= 1`,
/// `U=0 => var = 0`.
///
/// Replicas each get their own independent instance-0 anchor (see
/// `linkage::assert_linkage`'s doc comment for why), so the coupling ite is
/// applied once per replica, not only to `(0,0)`.
pub fn couple_path_activation<B: SolverBackend>(
    network: &mut Network,
    backend: &mut B,
    selectors: &PathSelectors,
) -> Result<()> {
    let frame_ids: Vec<_> = network.frames().map(|(id, _)| id).collect();
    for fid in frame_ids {
        let frame = network.frame(fid).expect("frame id is stable");
        let sender_idx = network
            .end_system_idx(frame.sender_id)
            .expect("validated in allocate_selectors");
        let link_ids: Vec<_> = frame.offsets.iter().map(|o| o.link).collect();
        let receivers = frame.receivers_id.clone();

        for link_id in link_ids {
            let mut s_vars = Vec::new();
            for &receiver_id in &receivers {
                let receiver_idx = network
                    .end_system_idx(receiver_id)
                    .expect("validated in allocate_selectors");
                let paths = network.paths().paths_for(sender_idx, receiver_idx);
                let containing: Vec<VarHandle> = paths
                    .iter()
                    .enumerate()
                    .filter(|(_, path)| path.links().contains(&link_id))
                    .filter_map(|(p, _)| selectors.get(fid, receiver_id, p))
                    .collect();
                if containing.is_empty() {
                    continue;
                }
                let s_var = backend.new_binary(&format!("S_{fid}_{receiver_id}_{link_id}"));
                let mut expr = LinExpr::var(s_var);
                for v in &containing {
                    expr = expr.with_term(-1, *v);
                }
                backend.assert_linear(LinConstraint { expr, cmp: Cmp::Eq });
                s_vars.push(s_var);
            }

            let u_var = backend.new_binary(&format!("U_{fid}_{link_id}"));
            backend.assert_or(u_var, &s_vars);

            let num_replicas = network
                .frame(fid)
                .and_then(|f| f.offset_for(link_id))
                .map(|o| o.num_replicas)
                .ok_or_else(|| {
                    SchedulerError::internal(format!(
                        "offset for frame {fid} link {link_id} missing after stage 1"
                    ))
                })?;

            for r in 0..num_replicas {
                let base = network
                    .frame(fid)
                    .and_then(|f| f.offset_for(link_id))
                    .and_then(|o| o.start_time[0][r as usize])
                    .ok_or_else(|| {
                        SchedulerError::internal(format!(
                            "offset for frame {fid} link {link_id} replica {r} missing its \
                             instance-0 variable"
                        ))
                    })?;

                backend.assert_ite(
                    u_var,
                    LinConstraint {
                        expr: LinExpr::var(base).with_constant(-1),
                        cmp: Cmp::Ge,
                    },
                    LinConstraint {
                        expr: LinExpr::var(base),
                        cmp: Cmp::Eq,
                    },
                );
            }

            let frame_mut = network.frame_mut(fid).expect("frame id is stable");
            let offset = frame_mut
                .offsets
                .offset_for_mut(link_id)
                .expect("link_id was collected from this frame's own offsets");
            offset.used = Some(u_var);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build, BuilderConfig};
    use crate::model::{Frame, Link, LinkType, Path};
    use crate::solver::milp::MilpBackend;
    use crate::solver::{SolveStatus, SolverBackend};

    #[test]
    fn exactly_one_of_two_alternative_paths_is_selected() {
        let mut net = crate::model::Network::new(0, 100_000, 50_000).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let link_a = net.add_link(Link::new(1000, LinkType::Wired).unwrap());
        let link_b = net.add_link(Link::new(1000, LinkType::Wired).unwrap());
        net.add_path(1, 2, Path::new(vec![link_a]).unwrap()).unwrap();
        net.add_path(1, 2, Path::new(vec![link_b]).unwrap()).unwrap();

        let mut frame = Frame::new(10, 1000, 1000, 1000, 0, 1, vec![2]).unwrap();
        frame.offset_for_link(link_a);
        frame.offset_for_link(link_b);
        let fid = net.add_frame(frame);

        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        let config = BuilderConfig {
            path_selection: true,
            ..BuilderConfig::default()
        };
        let selectors = build(&mut net, &mut backend, &config).unwrap();
        let status = backend.solve(5).unwrap();
        assert!(matches!(status, SolveStatus::Optimal));

        let chosen: Vec<usize> = (0..2)
            .filter(|&p| {
                let h = selectors.get(fid, 2, p).unwrap();
                backend.value_of(h) == 1
            })
            .collect();
        assert_eq!(chosen.len(), 1, "exactly one path must be selected");

        let unused_link = if chosen[0] == 0 { link_b } else { link_a };
        let unused_offset = net.frame(fid).unwrap().offset_for(unused_link).unwrap();
        let unused_value = backend.value_of(unused_offset.start_time[0][0].unwrap());
        assert_eq!(unused_value, 0, "offsets off the selected path must be unused");
    }
}
