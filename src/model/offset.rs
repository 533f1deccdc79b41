//! Offset: the per-`(frame, link)` transmission variable family, replicated across
//! instances (periodic repetitions) and replicas (wireless retransmissions).

use crate::model::link::{Link, LinkId};

/// Lifecycle state of an [`Offset`], monotonically advancing as the builder visits
/// it. Never rewound; there is no deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OffsetState {
    /// Freshly inserted into a [`Frame`](super::frame::Frame); instance/replica
    /// counts not yet fixed.
    Created,
    /// `num_instances` and `num_replicas` have been computed from the network's
    /// hyperperiod and the link's medium class.
    Initialized,
    /// Solver variable handles for every `(instance, replica)` pair have been
    /// allocated (§4.3.1).
    VariablesAllocated,
    /// Every constraint referencing this offset's variables has been emitted.
    Constrained,
}

/// A decision-variable handle, as returned by a [`SolverBackend`](crate::solver::SolverBackend).
///
/// The model never stores raw solver pointers; it stores these opaque handles and
/// asks the adapter to resolve them at `read_value` time.
pub type VarHandle = usize;

/// Per-`(frame, link)` record: transmission duration, instance/replica counts, and
/// the solver variable handle for every `(instance, replica)` pair.
///
/// `start_time[i][r]` is populated only once the builder has allocated variables
/// (state >= [`OffsetState::VariablesAllocated`]); before that it is empty.
#[derive(Debug, Clone)]
pub struct Offset {
    /// Link this offset transmits on.
    pub link: LinkId,
    /// Transmission duration on this link, in ns — `ceil(8 * frame.size / link.speed)`.
    pub timeslots: u64,
    /// Number of instances within the hyperperiod: `hyperperiod / frame.period`.
    pub num_instances: u64,
    /// Number of replicas per instance; `1` unless the link is wireless/AP.
    pub num_replicas: u64,
    /// Solver variable handle per `(instance, replica)`, indexed
    /// `start_time[instance][replica]`.
    pub start_time: Vec<Vec<Option<VarHandle>>>,
    /// Binary `U(link, frame)` handle (§4.3.3): `1` iff some receiver's selected
    /// path routes this frame over this offset's link. `None` when path selection
    /// is inactive (every offset is unconditionally in use).
    pub used: Option<VarHandle>,
    /// Current lifecycle state.
    pub state: OffsetState,
}

impl Offset {
    /// Create a freshly-`Created` offset for the given link. Instance/replica
    /// counts and timeslots are filled in by [`Offset::initialize`].
    pub fn new(link: LinkId) -> Self {
        Self {
            link,
            timeslots: 0,
            num_instances: 0,
            num_replicas: 1,
            start_time: Vec::new(),
            used: None,
            state: OffsetState::Created,
        }
    }

    /// Fix `timeslots`, `num_instances`, and `num_replicas` from the frame's period
    /// relative to the hyperperiod, the frame's size, and the link's speed/type.
    /// `num_replicas` is `replicas_hint` when the link's medium class allows
    /// replicas, `1` otherwise.
    pub fn initialize(
        &mut self,
        frame_size_bytes: u64,
        frame_period: u64,
        hyperperiod: u64,
        link: &Link,
        replicas_hint: u64,
    ) {
        self.timeslots = timeslots_for(frame_size_bytes, link.speed);
        self.num_instances = hyperperiod / frame_period;
        self.num_replicas = if link.link_type.allows_replicas() {
            replicas_hint.max(1)
        } else {
            1
        };
        self.start_time = vec![vec![None; self.num_replicas as usize]; self.num_instances as usize];
        self.state = OffsetState::Initialized;
    }
}

/// Integer-ceiling of `8 * size / speed`, pinned by §4.1/§9(c): the original source
/// conflates units and rounds via plain integer division, which can under-count the
/// transmission window and let two back-to-back transmissions overlap by a
/// fractional timeslot. We round up so a link is never double-booked.
pub fn timeslots_for(size_bytes: u64, speed: u64) -> u64 {
    let bits = size_bytes * 8;
    bits.div_ceil(speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::link::LinkType;

    #[test]
    fn timeslots_round_up() {
        // 100 bytes @ 100 "speed units" -> 800 bits / 100 = 8 exactly.
        assert_eq!(timeslots_for(100, 100), 8);
        // not evenly divisible: must round up, never down.
        assert_eq!(timeslots_for(101, 100), 9);
        assert_eq!(timeslots_for(1, 100), 1);
    }

    #[test]
    fn initialize_collapses_replicas_on_wired_links() {
        let link = Link::new(100, LinkType::Wired).unwrap();
        let mut o = Offset::new(0);
        o.initialize(100, 1000, 4000, &link, 3);
        assert_eq!(o.num_replicas, 1);
        assert_eq!(o.num_instances, 4);
        assert_eq!(o.state, OffsetState::Initialized);
        assert_eq!(o.start_time.len(), 4);
        assert_eq!(o.start_time[0].len(), 1);
    }

    #[test]
    fn initialize_keeps_replicas_on_wireless_links() {
        let link = Link::new(100, LinkType::Wireless).unwrap();
        let mut o = Offset::new(0);
        o.initialize(100, 1000, 4000, &link, 3);
        assert_eq!(o.num_replicas, 3);
        assert_eq!(o.start_time[0].len(), 3);
    }
}
