//! Stage 5 of §4.3.8: path ordering and switch dwell (§4.3.4).

use crate::builder::path_selection::PathSelectors;
use crate::builder::BuilderConfig;
use crate::error::{Result, SchedulerError};
use crate::model::Network;
use crate::solver::{Cmp, LinConstraint, LinExpr, SolverBackend};

/// Assert `O[f,ℓj+1,0,0] ≥ O[f,ℓj,0,0] + timeslots(oj) + switch_minimum_time` for
/// every consecutive link pair on every path a frame may use, guarded by the
/// corresponding path selector when path selection is active (otherwise every
/// frame unconditionally uses path index 0).
pub fn assert_path_ordering<B: SolverBackend>(
    network: &Network,
    backend: &mut B,
    selectors: &PathSelectors,
    config: &BuilderConfig,
) -> Result<()> {
    let switch_minimum_time = network.switch_minimum_time as i64;

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
                for (link_a, link_b) in path.consecutive_pairs() {
                    let offset_a = frame.offset_for(link_a).ok_or_else(|| {
                        SchedulerError::internal(format!(
                            "frame {fid} has no offset on link {link_a} referenced by its own path"
                        ))
                    })?;
                    let offset_b = frame.offset_for(link_b).ok_or_else(|| {
                        SchedulerError::internal(format!(
                            "frame {fid} has no offset on link {link_b} referenced by its own path"
                        ))
                    })?;
                    let var_a =
                        offset_a.start_time[0][0].expect("stage 1 allocated every variable");
                    let var_b =
                        offset_b.start_time[0][0].expect("stage 1 allocated every variable");

                    let constraint = LinConstraint {
                        expr: LinExpr::var(var_b)
                            .with_term(-1, var_a)
                            .with_constant(-(offset_a.timeslots as i64) - switch_minimum_time),
                        cmp: Cmp::Ge,
                    };

                    if config.path_selection {
                        let selector = selectors.get(fid, receiver_id, p).ok_or_else(|| {
                            SchedulerError::internal(format!(
                                "missing path selector for frame {fid} receiver {receiver_id} \
                                 path {p}"
                            ))
                        })?;
                        backend.assert_indicator(selector, true, constraint);
                    } else {
                        backend.assert_linear(constraint);
                    }
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
    fn chain_of_three_links_respects_switch_dwell_and_end_to_end() {
        let switch_minimum_time = 100;
        let mut net = Network::new(switch_minimum_time, 100_000, 50_000).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let l0 = net.add_link(Link::new(100, LinkType::Wired).unwrap());
        let l1 = net.add_link(Link::new(100, LinkType::Wired).unwrap());
        let l2 = net.add_link(Link::new(100, LinkType::Wired).unwrap());
        net.add_path(1, 2, Path::new(vec![l0, l1, l2]).unwrap()).unwrap();

        let mut frame = Frame::new(100, 1000, 1000, 500, 0, 1, vec![2]).unwrap();
        frame.offset_for_link(l0);
        frame.offset_for_link(l1);
        frame.offset_for_link(l2);
        let fid = net.add_frame(frame);

        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        let config = BuilderConfig::default();
        build(&mut net, &mut backend, &config).unwrap();
        let status = backend.solve(5).unwrap();
        assert!(matches!(status, SolveStatus::Optimal));

        let frame_ref = net.frame(fid).unwrap();
        let ts = |link| {
            let o = frame_ref.offset_for(link).unwrap();
            (o.timeslots as i64, backend.value_of(o.start_time[0][0].unwrap()))
        };
        let (ts0, v0) = ts(l0);
        let (ts1, v1) = ts(l1);
        let (ts2, v2) = ts(l2);
        assert!(v1 >= v0 + ts0 + switch_minimum_time as i64);
        assert!(v2 >= v1 + ts1 + switch_minimum_time as i64);
        assert!(v2 + ts2 - v0 <= 500);
    }
}
