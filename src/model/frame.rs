//! Frame: timing parameters plus an insertion-ordered, de-duplicated-by-link
//! collection of [`Offset`]s with O(1) lookup.

use std::collections::HashMap;

use crate::error::{Result, SchedulerError};
use crate::model::link::LinkId;
use crate::model::offset::Offset;

/// Stable handle to a [`Frame`] inside a [`Network`](super::network::Network).
pub type FrameId = usize;

/// Ordered, unique-by-link collection of a frame's offsets.
///
/// Offsets live in an insertion-ordered `Vec`; a side `HashMap` from link id to
/// index gives O(1) lookup. This replaces the original's singly linked list
/// (REDESIGN FLAG, spec.md §9): iteration order is still exactly insertion order,
/// which is the only order the specification requires to be observable, but lookup
/// and de-duplication no longer need a linear scan.
#[derive(Debug, Clone, Default)]
pub struct OffsetTable {
    offsets: Vec<Offset>,
    by_link: HashMap<LinkId, usize>,
}

impl OffsetTable {
    /// Insert a new offset for `link`, or return the existing one if this frame
    /// already has an offset on that link (de-duplication by link, §4.1).
    pub fn get_or_insert(&mut self, link: LinkId) -> usize {
        if let Some(&idx) = self.by_link.get(&link) {
            return idx;
        }
        let idx = self.offsets.len();
        self.offsets.push(Offset::new(link));
        self.by_link.insert(link, idx);
        idx
    }

    /// O(1) lookup of the offset on `link`, if this frame has one.
    pub fn offset_for(&self, link: LinkId) -> Option<&Offset> {
        self.by_link.get(&link).map(|&idx| &self.offsets[idx])
    }

    /// Mutable O(1) lookup of the offset on `link`.
    pub fn offset_for_mut(&mut self, link: LinkId) -> Option<&mut Offset> {
        let idx = *self.by_link.get(&link)?;
        Some(&mut self.offsets[idx])
    }

    /// Iterate offsets in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Offset> {
        self.offsets.iter()
    }

    /// Iterate offsets mutably in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Offset> {
        self.offsets.iter_mut()
    }

    /// Number of distinct links this frame has an offset on.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether this frame has no offsets yet.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// A periodic frame: size, period, deadline, end-to-end bound, starting time,
/// sender, receivers, and its per-link offsets.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Size of the frame, in bytes.
    pub size: u64,
    /// Period of the frame, in ns.
    pub period: u64,
    /// Deadline of the frame relative to each instance's start, in ns. `deadline <=
    /// period`.
    pub deadline: u64,
    /// Maximum end-to-end delay from send to receipt, in ns. `end_to_end <=
    /// deadline`.
    pub end_to_end: u64,
    /// Starting time of the frame within its first period, in ns. `starting <
    /// deadline`.
    pub starting: u64,
    /// End system id of the sender.
    pub sender_id: u32,
    /// End system ids of the receivers.
    pub receivers_id: Vec<u32>,
    /// This frame's offsets, unique by link, in insertion order.
    pub offsets: OffsetTable,
}

impl Frame {
    /// Validate and construct a frame's timing parameters (§3, §7 `InvalidInput`).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        size: u64,
        period: u64,
        deadline: u64,
        end_to_end: u64,
        starting: u64,
        sender_id: u32,
        receivers_id: Vec<u32>,
    ) -> Result<Self> {
        if size == 0 {
            return Err(SchedulerError::invalid_input("frame size must be positive"));
        }
        if period == 0 {
            return Err(SchedulerError::invalid_input(
                "frame period must be positive",
            ));
        }
        if deadline > period {
            return Err(SchedulerError::invalid_input(format!(
                "deadline ({deadline}) must not exceed period ({period})"
            )));
        }
        if end_to_end > deadline {
            return Err(SchedulerError::invalid_input(format!(
                "end_to_end ({end_to_end}) must not exceed deadline ({deadline})"
            )));
        }
        if starting >= deadline {
            return Err(SchedulerError::invalid_input(format!(
                "starting ({starting}) must be strictly less than deadline ({deadline})"
            )));
        }
        if receivers_id.is_empty() {
            return Err(SchedulerError::invalid_input(
                "frame must have at least one receiver",
            ));
        }
        Ok(Self {
            size,
            period,
            deadline,
            end_to_end,
            starting,
            sender_id,
            receivers_id,
            offsets: OffsetTable::default(),
        })
    }

    /// O(1) lookup of this frame's offset on `link`.
    pub fn offset_for(&self, link: LinkId) -> Option<&Offset> {
        self.offsets.offset_for(link)
    }

    /// Add (or find the existing) offset on `link`, returning its index within
    /// [`OffsetTable`].
    pub fn offset_for_link(&mut self, link: LinkId) -> usize {
        self.offsets.get_or_insert(link)
    }
}
