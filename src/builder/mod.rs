//! The constraint model builder (§4.3): translates a [`Network`] into a complete
//! constraint set on a [`SolverBackend`], in the order of §4.3.8 — adjusted only to
//! move link-distance allocation ahead of contention freedom, since the latter
//! references the former's variables as slack terms; see `distance`'s module doc
//! and DESIGN.md.

pub mod contention;
pub mod distance;
pub mod end_to_end;
pub mod linkage;
pub mod path_ordering;
pub mod path_selection;
pub mod util;
pub mod variables;

use crate::error::Result;
use crate::model::Network;
use crate::solver::SolverBackend;

use path_selection::PathSelectors;

/// Knobs the driver reads from `ScheduleConfiguration` (§6) and threads through
/// every emission stage.
#[derive(Debug, Clone, Copy)]
pub struct BuilderConfig {
    /// Whether path-selector variables and activation coupling (§4.3.3) are
    /// emitted at all. When `false`, every frame uses path index 0 unconditionally
    /// and no `X`/`S`/`U` variables exist.
    pub path_selection: bool,
    /// Whether distance variables are free (and summed into the objective) or
    /// pinned to `0` (§4.3.7).
    pub optimization: bool,
    /// `w_frame` in the objective.
    pub frame_distance_weight: f64,
    /// `w_link` in the objective.
    pub link_distance_weight: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            path_selection: false,
            optimization: false,
            frame_distance_weight: 1.0,
            link_distance_weight: 1.0,
        }
    }
}

/// Run the full emission protocol (§4.3.8) against `network`, returning the
/// path-selector table (empty when `config.path_selection` is `false`).
pub fn build<B: SolverBackend>(
    network: &mut Network,
    backend: &mut B,
    config: &BuilderConfig,
) -> Result<PathSelectors> {
    variables::allocate_variables(network, backend, config)?;

    let selectors = if config.path_selection {
        let selectors = path_selection::allocate_selectors(network, backend)?;
        path_selection::couple_path_activation(network, backend, &selectors)?;
        selectors
    } else {
        PathSelectors::default()
    };

    linkage::assert_linkage(network, backend, config)?;
    path_ordering::assert_path_ordering(network, backend, &selectors, config)?;
    end_to_end::assert_end_to_end(network, backend, &selectors, config)?;

    let link_distances = distance::allocate_link_distances(network, backend, config)?;
    contention::assert_contention_freedom(network, backend, &link_distances, config)?;
    distance::allocate_frame_distances_and_objective(
        network,
        backend,
        &selectors,
        &link_distances,
        config,
    )?;

    Ok(selectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Frame, Link, LinkType, Path};
    use crate::solver::milp::MilpBackend;
    use crate::solver::{SolveStatus, SolverBackend};

    #[test]
    fn single_frame_single_link_is_feasible() {
        let mut net = Network::new(0, 100_000, 50_000).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let link = net.add_link(Link::new(100, LinkType::Wired).unwrap());
        net.add_path(1, 2, Path::new(vec![link]).unwrap()).unwrap();

        let mut frame = Frame::new(100, 1000, 800, 800, 0, 1, vec![2]).unwrap();
        frame.offset_for_link(link);
        let fid = net.add_frame(frame);

        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        let config = BuilderConfig::default();
        build(&mut net, &mut backend, &config).unwrap();
        let status = backend.solve(5).unwrap();
        assert!(matches!(status, SolveStatus::Optimal));

        let offset = net.frame(fid).unwrap().offset_for(link).unwrap();
        let value = backend.value_of(offset.start_time[0][0].unwrap());
        assert!((0..=792).contains(&value));
    }

    #[test]
    fn two_frames_sharing_a_link_do_not_overlap() {
        let mut net = Network::new(0, 100_000, 50_000).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let link = net.add_link(Link::new(800, LinkType::Wired).unwrap());
        net.add_path(1, 2, Path::new(vec![link]).unwrap()).unwrap();

        let mut frame_a = Frame::new(30, 1000, 1000, 1000, 0, 1, vec![2]).unwrap();
        frame_a.offset_for_link(link);
        net.add_frame(frame_a);
        let mut frame_b = Frame::new(30, 1000, 1000, 1000, 0, 1, vec![2]).unwrap();
        frame_b.offset_for_link(link);
        let fid_b = net.add_frame(frame_b);
        let _ = fid_b;

        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        let config = BuilderConfig::default();
        build(&mut net, &mut backend, &config).unwrap();
        let status = backend.solve(5).unwrap();
        assert!(matches!(status, SolveStatus::Optimal));
    }
}
