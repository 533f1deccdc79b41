//! Stage 7 of §4.3.8: contention freedom / pairwise non-overlap (§4.3.5).
//!
//! Runs after [`super::distance::allocate_link_distances`] (reordered ahead of this
//! stage relative to the flat list in §4.3.8, since the `D_ℓ` slack term used below
//! needs a handle already — see `distance`'s module doc and DESIGN.md) and before
//! [`super::distance::allocate_frame_distances_and_objective`].

use std::collections::HashMap;

use itertools::iproduct;

use crate::builder::distance::LinkDistances;
use crate::builder::util::assert_and_literals;
use crate::builder::BuilderConfig;
use crate::error::Result;
use crate::model::offset::{Offset, VarHandle};
use crate::model::{FrameId, LinkId, Network};
use crate::solver::{Cmp, LinConstraint, LinExpr, SolverBackend};

/// Whether windows `[min1, max1)` and `[min2, max2)` can possibly intersect
/// (§4.3.5's interval admissibility test), using `i128` so `period·i` never
/// overflows for large hyperperiods.
#[allow(clippy::too_many_arguments)]
fn windows_can_collide(
    period1: u64,
    starting1: u64,
    deadline1: u64,
    i1: u64,
    period2: u64,
    starting2: u64,
    deadline2: u64,
    i2: u64,
) -> bool {
    let min1 = period1 as i128 * i1 as i128 + starting1 as i128 + 1;
    let max1 = period1 as i128 * i1 as i128 + deadline1 as i128 + 1;
    let min2 = period2 as i128 * i2 as i128 + starting2 as i128 + 1;
    let max2 = period2 as i128 * i2 as i128 + deadline2 as i128 + 1;
    min1 < max2 && min2 < max1
}

/// Emit the disjunctive non-overlap constraint for every admissible pair of
/// `(instance, replica)` windows between every unordered pair of distinct frames
/// sharing a link. The disjunction is symmetric in the two frames, so an unordered
/// pass covers the same ground an ordered pass would, without emitting the same
/// constraint twice.
pub fn assert_contention_freedom<B: SolverBackend>(
    network: &Network,
    backend: &mut B,
    link_distances: &LinkDistances,
    config: &BuilderConfig,
) -> Result<()> {
    let mut frames_by_link: HashMap<LinkId, Vec<FrameId>> = HashMap::new();
    for (fid, frame) in network.frames() {
        for offset in frame.offsets.iter() {
            frames_by_link.entry(offset.link).or_default().push(fid);
        }
    }

    for (&link, frame_ids) in &frames_by_link {
        let d_link = link_distances.get(link);
        for a in 0..frame_ids.len() {
            for b in (a + 1)..frame_ids.len() {
                emit_pair(
                    network,
                    backend,
                    link,
                    frame_ids[a],
                    frame_ids[b],
                    d_link,
                    config,
                )?;
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn emit_pair<B: SolverBackend>(
    network: &Network,
    backend: &mut B,
    link: LinkId,
    f1: FrameId,
    f2: FrameId,
    d_link: Option<VarHandle>,
    config: &BuilderConfig,
) -> Result<()> {
    let frame1 = network.frame(f1).expect("frame id from frames_by_link");
    let frame2 = network.frame(f2).expect("frame id from frames_by_link");
    let offset1 = frame1
        .offset_for(link)
        .expect("link was collected from this frame's own offsets");
    let offset2 = frame2
        .offset_for(link)
        .expect("link was collected from this frame's own offsets");

    for (i1, i2) in iproduct!(0..offset1.num_instances, 0..offset2.num_instances) {
        if !windows_can_collide(
            frame1.period,
            frame1.starting,
            frame1.deadline,
            i1,
            frame2.period,
            frame2.starting,
            frame2.deadline,
            i2,
        ) {
            continue;
        }
        for (r1, r2) in iproduct!(0..offset1.num_replicas, 0..offset2.num_replicas) {
            emit_window_pair(backend, offset1, offset2, i1, r1, i2, r2, d_link, config)?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn emit_window_pair<B: SolverBackend>(
    backend: &mut B,
    offset1: &Offset,
    offset2: &Offset,
    i1: u64,
    r1: u64,
    i2: u64,
    r2: u64,
    d_link: Option<VarHandle>,
    config: &BuilderConfig,
) -> Result<()> {
    let var1 =
        offset1.start_time[i1 as usize][r1 as usize].expect("stage 1 allocated every variable");
    let var2 =
        offset2.start_time[i2 as usize][r2 as usize].expect("stage 1 allocated every variable");

    let mut fwd_expr = LinExpr::var(var2)
        .with_term(-1, var1)
        .with_constant(-(offset1.timeslots as i64));
    let mut bwd_expr = LinExpr::var(var1)
        .with_term(-1, var2)
        .with_constant(-(offset2.timeslots as i64));
    if let Some(d) = d_link {
        fwd_expr = fwd_expr.with_term(-1, d);
        bwd_expr = bwd_expr.with_term(-1, d);
    }
    let fwd = LinConstraint {
        expr: fwd_expr,
        cmp: Cmp::Ge,
    };
    let bwd = LinConstraint {
        expr: bwd_expr,
        cmp: Cmp::Ge,
    };

    let y = backend.new_binary(&format!(
        "Order_{}_{i1}_{r1}_{i2}_{r2}_{var1}_{var2}",
        offset1.link
    ));

    if config.path_selection {
        if let (Some(u1), Some(u2)) = (offset1.used, offset2.used) {
            let fwd_guard = assert_and_literals(
                backend,
                &format!("ContFwd_{u1}_{u2}_{y}"),
                &[(u1, true), (u2, true), (y, true)],
            );
            let bwd_guard = assert_and_literals(
                backend,
                &format!("ContBwd_{u1}_{u2}_{y}"),
                &[(u1, true), (u2, true), (y, false)],
            );
            backend.assert_indicator(fwd_guard, true, fwd);
            backend.assert_indicator(bwd_guard, true, bwd);
            return Ok(());
        }
    }

    backend.assert_indicator(y, true, fwd);
    backend.assert_indicator(y, false, bwd);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build, BuilderConfig};
    use crate::model::{Frame, Link, LinkType, Network, Path};
    use crate::solver::milp::MilpBackend;
    use crate::solver::SolveStatus;

    #[test]
    fn tiling_windows_with_zero_gap_still_collide() {
        // deadline == period, starting == 0: back-to-back instances tile the
        // hyperperiod with no gap, but the admissibility test must still see
        // instance i's window as adjacent to instance i+1's, not overlapping.
        assert!(windows_can_collide(1000, 0, 1000, 0, 1000, 0, 1000, 0));
        assert!(!windows_can_collide(1000, 0, 1000, 0, 1000, 0, 1000, 1));
    }

    #[test]
    fn disjoint_windows_emit_no_constraint() {
        // frame 2's instance 5 window starts long after frame 1's instance 0
        // window ends; the two cannot collide.
        assert!(!windows_can_collide(100, 0, 50, 0, 100, 0, 50, 5));
    }

    #[test]
    fn coprime_periods_still_terminate_and_solve() {
        let mut net = Network::new(0, 100_000, 50_000).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let link = net.add_link(Link::new(8, LinkType::Wired).unwrap());
        net.add_path(1, 2, Path::new(vec![link]).unwrap()).unwrap();

        let mut frame_a = Frame::new(1, 7, 7, 7, 0, 1, vec![2]).unwrap();
        frame_a.offset_for_link(link);
        net.add_frame(frame_a);
        let mut frame_b = Frame::new(1, 11, 11, 11, 0, 1, vec![2]).unwrap();
        frame_b.offset_for_link(link);
        net.add_frame(frame_b);

        assert_eq!(net.hyperperiod(), 77);

        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        let config = BuilderConfig::default();
        build(&mut net, &mut backend, &config).unwrap();
        let status = backend.solve(5).unwrap();
        assert!(matches!(status, SolveStatus::Optimal | SolveStatus::Infeasible));
    }
}
