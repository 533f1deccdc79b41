//! The six concrete end-to-end scenarios of §8, plus the idempotence property,
//! run against the public `tt_scheduler` API the way `scheduler`'s own `main.rs`
//! would drive it (minus the XML boundary, exercised separately in
//! `io::network`'s and `io::schedule`'s own unit tests).

use tt_scheduler::builder::{build, BuilderConfig};
use tt_scheduler::model::{Frame, Link, LinkType, Network, Path};
use tt_scheduler::solver::milp::MilpBackend;
use tt_scheduler::solver::{SolveStatus, SolverBackend};

fn two_end_system_network(switch_minimum_time: u64) -> (Network, impl Fn(&mut Network, u64, LinkType) -> usize) {
    let mut net = Network::new(switch_minimum_time, 100_000, 50_000).unwrap();
    net.register_end_system(1);
    net.register_end_system(2);
    let adder = |net: &mut Network, speed: u64, ty: LinkType| net.add_link(Link::new(speed, ty).unwrap());
    (net, adder)
}

#[test]
fn single_frame_single_link_no_path_choice() {
    let _ = env_logger::try_init();
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

    let offset = net.frame(fid).unwrap().offset_for(link).unwrap();
    assert_eq!(offset.timeslots, 8);
    assert_eq!(offset.num_instances, 1);

    let status = backend.solve(5).unwrap();
    assert!(matches!(status, SolveStatus::Optimal));
    let value = backend.value_of(offset.start_time[0][0].unwrap());
    assert!((0..=792).contains(&value));
}

#[test]
fn two_frames_sharing_one_link_do_not_overlap() {
    let mut net = Network::new(0, 100_000, 50_000).unwrap();
    net.register_end_system(1);
    net.register_end_system(2);
    // speed=8, size=300 bytes -> timeslots = ceil(8*300/8) = 300
    let link = net.add_link(Link::new(8, LinkType::Wired).unwrap());
    net.add_path(1, 2, Path::new(vec![link]).unwrap()).unwrap();

    let mut frame_a = Frame::new(300, 1000, 1000, 1000, 0, 1, vec![2]).unwrap();
    frame_a.offset_for_link(link);
    let fid_a = net.add_frame(frame_a);
    let mut frame_b = Frame::new(300, 1000, 1000, 1000, 0, 1, vec![2]).unwrap();
    frame_b.offset_for_link(link);
    let fid_b = net.add_frame(frame_b);

    let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
    let config = BuilderConfig::default();
    build(&mut net, &mut backend, &config).unwrap();
    let status = backend.solve(10).unwrap();
    assert!(matches!(status, SolveStatus::Optimal));

    let offset_a = net.frame(fid_a).unwrap().offset_for(link).unwrap();
    let offset_b = net.frame(fid_b).unwrap().offset_for(link).unwrap();
    let va = backend.value_of(offset_a.start_time[0][0].unwrap());
    let vb = backend.value_of(offset_b.start_time[0][0].unwrap());
    let ts = offset_a.timeslots as i64;
    assert!(va + ts <= vb || vb + ts <= va, "transmissions must not overlap: {va}..{} vs {vb}..{}", va + ts, vb + ts);
}

#[test]
fn chain_of_three_links_holds_switch_dwell_and_end_to_end() {
    let switch_minimum_time = 100;
    let (mut net, add_link) = two_end_system_network(switch_minimum_time);
    let l0 = add_link(&mut net, 100, LinkType::Wired);
    let l1 = add_link(&mut net, 100, LinkType::Wired);
    let l2 = add_link(&mut net, 100, LinkType::Wired);
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
    let read = |link| {
        let o = frame_ref.offset_for(link).unwrap();
        (o.timeslots as i64, backend.value_of(o.start_time[0][0].unwrap()))
    };
    let (ts0, v0) = read(l0);
    let (ts1, v1) = read(l1);
    let (ts2, v2) = read(l2);
    assert!(v1 >= v0 + ts0 + switch_minimum_time as i64);
    assert!(v2 >= v1 + ts1 + switch_minimum_time as i64);
    assert!(v2 + ts2 - v0 <= frame_ref.end_to_end as i64);
}

#[test]
fn two_alternative_paths_selects_exactly_one() {
    let (mut net, add_link) = two_end_system_network(0);
    let link_a = add_link(&mut net, 1000, LinkType::Wired);
    let link_b = add_link(&mut net, 1000, LinkType::Wired);
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

    let selected: Vec<usize> = (0..2)
        .filter(|&p| backend.value_of(selectors.get(fid, 2, p).unwrap()) == 1)
        .collect();
    assert_eq!(selected.len(), 1);

    let unused_link = if selected[0] == 0 { link_b } else { link_a };
    let used_link = if selected[0] == 0 { link_a } else { link_b };
    let unused_offset = net.frame(fid).unwrap().offset_for(unused_link).unwrap();
    let used_offset = net.frame(fid).unwrap().offset_for(used_link).unwrap();
    assert_eq!(backend.value_of(unused_offset.start_time[0][0].unwrap()), 0);
    assert!(backend.value_of(used_offset.start_time[0][0].unwrap()) >= 0);
}

#[test]
fn infeasible_schedule_reports_infeasible_not_an_error() {
    let switch_minimum_time = 150;
    let (mut net, add_link) = two_end_system_network(switch_minimum_time);
    let l0 = add_link(&mut net, 8, LinkType::Wired);
    let l1 = add_link(&mut net, 8, LinkType::Wired);
    net.add_path(1, 2, Path::new(vec![l0, l1]).unwrap()).unwrap();

    // timeslots = 100 on each link; deadline only leaves 200ns, but the
    // second link cannot start before timeslots + switch_minimum_time = 250ns.
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

#[test]
fn optimization_mode_maximizes_nonnegative_slack() {
    let (mut net, add_link) = two_end_system_network(0);
    let link = add_link(&mut net, 8, LinkType::Wired);
    net.add_path(1, 2, Path::new(vec![link]).unwrap()).unwrap();

    let mut frame_a = Frame::new(10, 1000, 1000, 1000, 0, 1, vec![2]).unwrap();
    frame_a.offset_for_link(link);
    net.add_frame(frame_a);
    let mut frame_b = Frame::new(10, 1000, 1000, 1000, 0, 1, vec![2]).unwrap();
    frame_b.offset_for_link(link);
    net.add_frame(frame_b);

    let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
    let config = BuilderConfig {
        optimization: true,
        frame_distance_weight: 1.0,
        link_distance_weight: 1.0,
        ..BuilderConfig::default()
    };
    build(&mut net, &mut backend, &config).unwrap();
    let status = backend.solve(10).unwrap();
    // Every distance variable is declared with lower bound 0 (§4.3.7), so any
    // feasible solution, optimal or not, already satisfies "all slacks >= 0"
    // by construction; what this test actually exercises is that the model
    // with a live objective still solves.
    assert!(matches!(status, SolveStatus::Optimal | SolveStatus::Feasible));
}

#[test]
fn emitting_the_model_twice_produces_identical_counts_and_names() {
    let build_once = || {
        let mut net = Network::new(100, 100_000, 50_000).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let link = net.add_link(Link::new(100, LinkType::Wired).unwrap());
        net.add_path(1, 2, Path::new(vec![link]).unwrap()).unwrap();
        let mut frame = Frame::new(100, 1000, 800, 800, 0, 1, vec![2]).unwrap();
        frame.offset_for_link(link);
        net.add_frame(frame);

        let mut backend = MilpBackend::new(net.hyperperiod() as f64 + 1.0);
        let config = BuilderConfig::default();
        build(&mut net, &mut backend, &config).unwrap();
        backend
    };

    let backend_a = build_once();
    let backend_b = build_once();
    assert_eq!(backend_a.variable_count(), backend_b.variable_count());
    assert_eq!(backend_a.constraint_count(), backend_b.constraint_count());
    assert_eq!(backend_a.variable_names(), backend_b.variable_names());
}
