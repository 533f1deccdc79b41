//! Network: the global registry owning links, frames, and paths, plus the derived
//! quantities (hyperperiod, end-system index) every other stage depends on.

use std::collections::HashMap;

use crate::error::{Result, SchedulerError};
use crate::model::frame::{Frame, FrameId};
use crate::model::link::{Link, LinkId};
use crate::model::path::{Path, PathTable};

/// Global network state: the Network exclusively owns links, frames, and paths
/// (frames exclusively own their offsets). Everything is constructed once at parse
/// time; after that it is mutated only to record solver variable handles during
/// constraint emission.
#[derive(Debug, Clone, Default)]
pub struct Network {
    links: Vec<Link>,
    frames: Vec<Frame>,
    paths: PathTable,
    /// Dense index: raw (sparse) end-system node id -> compact index, used by
    /// [`PathTable`] and by per-frame sender/receiver resolution.
    end_system_index: HashMap<u32, usize>,
    /// Minimum dwell time a frame must spend in a switch before forwarding, in ns.
    pub switch_minimum_time: u64,
    /// Self-healing protocol period, in ns.
    pub protocol_period: u64,
    /// Self-healing protocol reserved time within each protocol period, in ns.
    /// Invariant: `0 < protocol_time < protocol_period`.
    pub protocol_time: u64,
    /// Hyperperiod: lcm of all frame periods. Recomputed by
    /// [`Network::recompute_hyperperiod`] whenever frames are added; `0` until the
    /// first frame is added.
    hyperperiod: u64,
}

impl Network {
    /// Build an empty network with the given switch/self-healing-protocol globals.
    pub fn new(switch_minimum_time: u64, protocol_period: u64, protocol_time: u64) -> Result<Self> {
        if protocol_period == 0 {
            return Err(SchedulerError::invalid_input(
                "protocol_period must be positive",
            ));
        }
        if protocol_time == 0 || protocol_time >= protocol_period {
            return Err(SchedulerError::invalid_input(format!(
                "protocol_time ({protocol_time}) must lie in (0, protocol_period={protocol_period})"
            )));
        }
        Ok(Self {
            switch_minimum_time,
            protocol_period,
            protocol_time,
            ..Default::default()
        })
    }

    /// Register a new link, returning its stable id.
    pub fn add_link(&mut self, link: Link) -> LinkId {
        self.links.push(link);
        self.links.len() - 1
    }

    /// Look up a link by id.
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    /// Number of registered links.
    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    /// Iterate all `(id, link)` pairs in insertion order.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter().enumerate()
    }

    /// Register `node_id` as a known end system, assigning it the next dense index
    /// if it is not already known. Idempotent.
    pub fn register_end_system(&mut self, node_id: u32) -> usize {
        let next = self.end_system_index.len();
        *self.end_system_index.entry(node_id).or_insert(next)
    }

    /// Dense index for a known end system, or `None` if `node_id` was never
    /// registered (§7 `StructuralError`).
    pub fn end_system_idx(&self, node_id: u32) -> Option<usize> {
        self.end_system_index.get(&node_id).copied()
    }

    /// Number of known end systems.
    pub fn num_end_systems(&self) -> usize {
        self.end_system_index.len()
    }

    /// Register a new frame, validating that every link referenced by a path it is
    /// later assigned is a structural concern handled by the caller (paths are
    /// resolved against [`Network::paths`] independently). Recomputes the
    /// hyperperiod.
    pub fn add_frame(&mut self, frame: Frame) -> FrameId {
        self.frames.push(frame);
        self.recompute_hyperperiod();
        self.frames.len() - 1
    }

    /// Look up a frame by id.
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    /// Mutable lookup of a frame by id.
    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(id)
    }

    /// Number of registered frames.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Iterate all `(id, frame)` pairs in ascending id order — the order the
    /// builder is required to visit frames in (§5).
    pub fn frames(&self) -> impl Iterator<Item = (FrameId, &Frame)> {
        self.frames.iter().enumerate()
    }

    /// Current hyperperiod: lcm of all registered frames' periods. `0` if no
    /// frames have been added yet.
    pub fn hyperperiod(&self) -> u64 {
        self.hyperperiod
    }

    /// Add a path from `sender_id` to `receiver_id`, validating that every link it
    /// references exists (§3 Path invariant) and that both end systems are known.
    pub fn add_path(&mut self, sender_id: u32, receiver_id: u32, path: Path) -> Result<()> {
        for &link in path.links() {
            if self.link(link).is_none() {
                return Err(SchedulerError::structural(format!(
                    "path references unknown link {link}"
                )));
            }
        }
        let sender_idx = self.end_system_idx(sender_id).ok_or_else(|| {
            SchedulerError::structural(format!("path references unknown sender {sender_id}"))
        })?;
        let receiver_idx = self.end_system_idx(receiver_id).ok_or_else(|| {
            SchedulerError::structural(format!("path references unknown receiver {receiver_id}"))
        })?;
        self.paths.add_path(sender_idx, receiver_idx, path);
        Ok(())
    }

    /// The path table, for read access by the builder.
    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    fn recompute_hyperperiod(&mut self) {
        self.hyperperiod = self
            .frames
            .iter()
            .map(|f| f.period)
            .fold(1u64, |acc, period| lcm(acc, period));
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        0
    } else {
        a / gcd(a, b) * b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::link::LinkType;

    fn frame(period: u64) -> Frame {
        Frame::new(100, period, period, period, 0, 0, vec![1]).unwrap()
    }

    #[test]
    fn hyperperiod_is_lcm_of_periods() {
        let mut net = Network::new(0, 100, 50).unwrap();
        net.add_frame(frame(1000));
        net.add_frame(frame(1500));
        assert_eq!(net.hyperperiod(), 3000);
    }

    #[test]
    fn coprime_periods_compute_full_product() {
        let mut net = Network::new(0, 100, 50).unwrap();
        net.add_frame(frame(7));
        net.add_frame(frame(11));
        assert_eq!(net.hyperperiod(), 77);
    }

    #[test]
    fn rejects_protocol_time_out_of_range() {
        assert!(Network::new(0, 100, 0).is_err());
        assert!(Network::new(0, 100, 100).is_err());
        assert!(Network::new(0, 100, 150).is_err());
    }

    #[test]
    fn add_path_rejects_unknown_link() {
        let mut net = Network::new(0, 100, 50).unwrap();
        net.register_end_system(1);
        net.register_end_system(2);
        let link = net.add_link(Link::new(100, LinkType::Wired).unwrap());
        let bad = crate::model::path::Path::new(vec![link, link + 1]).unwrap();
        assert!(net.add_path(1, 2, bad).is_err());
    }
}
