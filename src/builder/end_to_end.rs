//! Stage 6 of §4.3.8: end-to-end delay (§4.3.6).

use crate::builder::path_selection::PathSelectors;
use crate::builder::BuilderConfig;
use crate::error::{Result, SchedulerError};
use crate::model::Network;
use crate::solver::{Cmp, LinConstraint, LinExpr, SolverBackend};

/// Assert `O_last + timeslots(o_last) - O_first ≤ end_to_end(f)` for every
/// (frame, receiver, path) triple, guarded by the path selector when path
/// selection is active.
pub fn assert_end_to_end<B: SolverBackend>(
    network: &Network,
    backend: &mut B,
    selectors: &PathSelectors,
    config: &BuilderConfig,
) -> Result<()> {
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
            let active_paths: Vec<usize> = if config.path_selection {
                (0..paths.len()).collect()
            } else {
                vec![0]
            };

            for &p in &active_paths {
                let path = &paths[p];
                let first_offset = frame.offset_for(path.first_link()).ok_or_else(|| {
                    SchedulerError::internal(format!(
                        "frame {fid} has no offset on its own path's first link"
                    ))
                })?;
                let last_offset = frame.offset_for(path.last_link()).ok_or_else(|| {
                    SchedulerError::internal(format!(
                        "frame {fid} has no offset on its own path's last link"
                    ))
                })?;
                let first_var =
                    first_offset.start_time[0][0].expect("stage 1 allocated every variable");
                let last_var =
                    last_offset.start_time[0][0].expect("stage 1 allocated every variable");

                let constraint = LinConstraint {
                    expr: LinExpr::var(last_var)
                        .with_term(-1, first_var)
                        .with_constant(last_offset.timeslots as i64 - frame.end_to_end as i64),
                    cmp: Cmp::Le,
                };

                if config.path_selection {
                    let selector = selectors.get(fid, receiver_id, p).ok_or_else(|| {
                        SchedulerError::internal(format!(
                            "missing path selector for frame {fid} receiver {receiver_id} path {p}"
                        ))
                    })?;
                    backend.assert_indicator(selector, true, constraint);
                } else {
                    backend.assert_linear(constraint);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::builder::{build, BuilderConfig};
    use crate::model::{Frame, Link, LinkType, Network, Path};
    use crate::solver::milp::MilpBackend;
    use crate::solver::{SolveStatus, SolverBackend};

    #[test]
    fn deadline_smaller_than_required_switch_dwell_is_infeasible() {
        let switch_minimum_time = 150;
        let mut net = Network::new(switch_minimum_time, 100_000, 50_000).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let l0 = net.add_link(Link::new(8, LinkType::Wired).unwrap());
        let l1 = net.add_link(Link::new(8, LinkType::Wired).unwrap());
        net.add_path(1, 2, Path::new(vec![l0, l1]).unwrap()).unwrap();

        // timeslots = 100 on each link; the second link must start at least
        // timeslots + switch_minimum_time = 250ns after the first, but the
        // deadline only leaves a 200ns window to work with.
        let mut frame = Frame::new(100, 1000, 200, 200, 0, 1, vec![2]).unwrap();
        frame.offset_for_link(l0);
        frame.offset_for_link(l1);
        net.add_frame(frame);

        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        let config = BuilderConfig::default();
        build(&mut net, &mut backend, &config).unwrap();
        let status = backend.solve(5).unwrap();
        assert!(matches!(status, SolveStatus::Infeasible));
    }
}
