//! Stage 1 of §4.3.8: variable creation (§4.3.1), plus fixing each offset's
//! `timeslots`/`num_instances`/`num_replicas` (§4.1), which must happen before any
//! later stage can read them.

use crate::builder::BuilderConfig;
use crate::error::Result;
use crate::model::{Network, OffsetState};
use crate::solver::SolverBackend;

/// Default replica count on links whose medium class allows replication
/// (wireless / access point). §6's network input format has no field for this —
/// the spec only requires "at least one, more than one only on wireless" — so we
/// pin a small fixed default (one retransmission per instance) rather than leave
/// it unspecified; see DESIGN.md.
const DEFAULT_WIRELESS_REPLICAS: u64 = 2;

/// Allocate every `O[f, link, i, r]` variable, named `O_<frame>_<instance>_
/// <replica>_<link>` per §5's determinism requirement.
pub fn allocate_variables<B: SolverBackend>(
    network: &mut Network,
    backend: &mut B,
    config: &BuilderConfig,
) -> Result<()> {
    let hyperperiod = network.hyperperiod();
    let frame_ids: Vec<_> = network.frames().map(|(id, _)| id).collect();

    for fid in frame_ids {
        let frame = network.frame(fid).expect("frame id from network.frames()");
        let period = frame.period;
        let deadline = frame.deadline;
        let starting = frame.starting;
        let size = frame.size;
        let link_ids: Vec<_> = frame.offsets.iter().map(|o| o.link).collect();

        for link_id in link_ids {
            let link = *network
                .link(link_id)
                .expect("offset references a link registered with the network");
            let replicas_hint = if link.link_type.allows_replicas() {
                DEFAULT_WIRELESS_REPLICAS
            } else {
                1
            };

            let frame_mut = network.frame_mut(fid).expect("frame id is stable");
            let offset = frame_mut
                .offsets
                .offset_for_mut(link_id)
                .expect("link_id was collected from this frame's own offsets");
            offset.initialize(size, period, hyperperiod, &link, replicas_hint);

            let timeslots = offset.timeslots as i64;
            for i in 0..offset.num_instances {
                let hi = deadline as i64 + (i * period) as i64 - timeslots;
                let lo = if config.path_selection {
                    0
                } else {
                    // §9(b) unifies the comparison to non-strict `>=`; the compared
                    // value itself is `starting + i*period + 1` per §4.3.1, matching
                    // the original's strict `Z3_mk_gt` against `minimum_time` with no
                    // `+1` on its own side (i.e. `offset >= minimum_time + 1`).
                    starting as i64 + (i * period) as i64 + 1
                };
                for r in 0..offset.num_replicas {
                    let name = format!("O_{fid}_{i}_{r}_{link_id}");
                    let handle = backend.new_integer(&name, lo, hi);
                    offset.start_time[i as usize][r as usize] = Some(handle);
                }
            }
            offset.state = OffsetState::VariablesAllocated;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Frame, Link, LinkType, Path};
    use crate::solver::milp::MilpBackend;

    fn network_with_link(link_type: LinkType) -> (Network, crate::model::LinkId, crate::model::FrameId) {
        network_with_link_and_starting(link_type, 0)
    }

    fn network_with_link_and_starting(
        link_type: LinkType,
        starting: u64,
    ) -> (Network, crate::model::LinkId, crate::model::FrameId) {
        let mut net = Network::new(0, 100_000, 50_000).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let link = net.add_link(Link::new(100, link_type).unwrap());
        net.add_path(1, 2, Path::new(vec![link]).unwrap()).unwrap();
        let mut frame = Frame::new(100, 1000, 800, 800, starting, 1, vec![2]).unwrap();
        frame.offset_for_link(link);
        let fid = net.add_frame(frame);
        (net, link, fid)
    }

    #[test]
    fn wired_link_gets_exactly_one_replica() {
        let (mut net, link, fid) = network_with_link(LinkType::Wired);
        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        allocate_variables(&mut net, &mut backend, &BuilderConfig::default()).unwrap();
        let offset = net.frame(fid).unwrap().offset_for(link).unwrap();
        assert_eq!(offset.num_replicas, 1);
        assert_eq!(offset.timeslots, 8);
    }

    #[test]
    fn wireless_link_gets_the_default_replica_count() {
        let (mut net, link, fid) = network_with_link(LinkType::Wireless);
        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        allocate_variables(&mut net, &mut backend, &BuilderConfig::default()).unwrap();
        let offset = net.frame(fid).unwrap().offset_for(link).unwrap();
        assert_eq!(offset.num_replicas, DEFAULT_WIRELESS_REPLICAS);
    }

    #[test]
    fn path_selection_relaxes_the_lower_bound_to_zero() {
        let (mut net, link, fid) = network_with_link_and_starting(LinkType::Wired, 200);
        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        let config = BuilderConfig {
            path_selection: true,
            ..BuilderConfig::default()
        };
        allocate_variables(&mut net, &mut backend, &config).unwrap();
        let offset = net.frame(fid).unwrap().offset_for(link).unwrap();
        let handle = offset.start_time[0][0].unwrap();
        // minimize the start time: with path selection on, the lower bound is 0
        // rather than the frame's `starting` time (§9(b) only unifies the
        // non-path-selection bound; path selection always allows 0, since an
        // unselected path's offset must be forceable down to 0 elsewhere).
        backend.set_objective(&[(-1.0, handle)], crate::solver::Direction::Maximize);
        let status = backend.solve(5).unwrap();
        assert!(matches!(status, crate::solver::SolveStatus::Optimal));
        assert_eq!(backend.value_of(handle), 0);
    }
}
