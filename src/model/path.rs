//! Path and PathTable: ordered link sequences between end systems, and the dense
//! registry of them keyed by `(sender, receiver)`.

use std::collections::HashMap;

use crate::error::{Result, SchedulerError};
use crate::model::link::LinkId;

/// An ordered, non-empty sequence of link ids from one end system to another.
/// Immutable once built; every referenced link must exist in the owning
/// [`Network`](super::network::Network) (checked at insertion time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    links: Vec<LinkId>,
}

impl Path {
    /// Build a path from an ordered, non-empty sequence of link ids.
    pub fn new(links: Vec<LinkId>) -> Result<Self> {
        if links.is_empty() {
            return Err(SchedulerError::structural(
                "a path must contain at least one link",
            ));
        }
        Ok(Self { links })
    }

    /// The ordered links making up this path.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    /// The first link on the path (the sender's egress link).
    pub fn first_link(&self) -> LinkId {
        self.links[0]
    }

    /// The last link on the path (the receiver's ingress link).
    pub fn last_link(&self) -> LinkId {
        *self.links.last().expect("path is non-empty by construction")
    }

    /// Consecutive `(link[j], link[j+1])` pairs, used to emit switch-dwell
    /// ordering constraints (§4.3.4).
    pub fn consecutive_pairs(&self) -> impl Iterator<Item = (LinkId, LinkId)> + '_ {
        self.links.iter().copied().zip(self.links.iter().skip(1).copied())
    }
}

/// Paths available from one end system to another, indexed densely through the
/// network's end-system index (end-system ids are sparse in the node-id space; see
/// [`Network::end_system_index`](super::network::Network::end_system_index)).
#[derive(Debug, Clone, Default)]
pub struct PathTable {
    /// `paths[sender_idx][receiver_idx]` is the list of paths from sender to
    /// receiver, in insertion order.
    paths: HashMap<(usize, usize), Vec<Path>>,
}

impl PathTable {
    /// Append a path from `sender_idx` to `receiver_idx` (both dense end-system
    /// indices, not raw node ids).
    pub fn add_path(&mut self, sender_idx: usize, receiver_idx: usize, path: Path) {
        self.paths.entry((sender_idx, receiver_idx)).or_default().push(path);
    }

    /// Number of paths known from `sender_idx` to `receiver_idx`.
    pub fn num_paths(&self, sender_idx: usize, receiver_idx: usize) -> usize {
        self.paths
            .get(&(sender_idx, receiver_idx))
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Fetch path number `path_id` from `sender_idx` to `receiver_idx`.
    ///
    /// Indexing an unknown end-system pair or an out-of-range `path_id` returns
    /// `None` rather than a phantom path — see spec.md §4.2 and the corrected
    /// bounds check documented in §9(a): the original's `get_path` compared
    /// `num_paths >= path_id` (off by one, and in the wrong direction for a
    /// zero-based index) and indexed `receivers[sender_pos]` instead of
    /// `receivers[receiver_pos]`. We require `0 <= path_id < num_paths` and index
    /// by the receiver's own position.
    pub fn path(&self, sender_idx: usize, receiver_idx: usize, path_id: usize) -> Option<&Path> {
        let paths = self.paths.get(&(sender_idx, receiver_idx))?;
        if path_id < paths.len() {
            Some(&paths[path_id])
        } else {
            None
        }
    }

    /// All paths from `sender_idx` to `receiver_idx`, in insertion order.
    pub fn paths_for(&self, sender_idx: usize, receiver_idx: usize) -> &[Path] {
        self.paths
            .get(&(sender_idx, receiver_idx))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_pair_returns_none_not_panic() {
        let t = PathTable::default();
        assert_eq!(t.path(0, 1, 0), None);
        assert_eq!(t.num_paths(0, 1), 0);
    }

    #[test]
    fn path_bounds_are_zero_based_and_exclusive() {
        let mut t = PathTable::default();
        t.add_path(0, 1, Path::new(vec![0, 1]).unwrap());
        t.add_path(0, 1, Path::new(vec![2]).unwrap());
        assert_eq!(t.num_paths(0, 1), 2);
        assert!(t.path(0, 1, 0).is_some());
        assert!(t.path(0, 1, 1).is_some());
        assert!(t.path(0, 1, 2).is_none());
    }

    #[test]
    fn rejects_empty_path() {
        assert!(Path::new(vec![]).is_err());
    }
}
