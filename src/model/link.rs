//! Link: a speed and a medium class, immutable after insertion into the [`Network`].
//!
//! [`Network`]: super::network::Network

use crate::error::{Result, SchedulerError};

/// Stable handle to a [`Link`] inside a [`Network`](super::network::Network).
///
/// Links live in a contiguous arena; this index is the only thing the rest of the
/// model stores, so links themselves never move once inserted.
pub type LinkId = usize;

/// The medium a link transmits over. Only `Wireless` links may carry more than one
/// replica per instance (retransmissions to mask loss).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkType {
    /// A standard wired Ethernet link.
    Wired,
    /// A wireless link; offsets on this link may have `num_replicas > 1`.
    Wireless,
    /// A wireless access point uplink; treated like `Wireless` for replica
    /// purposes but kept distinct because the network input format (§6) names it
    /// separately.
    AccessPoint,
}

impl LinkType {
    /// Whether this medium class allows more than one replica per instance.
    pub fn allows_replicas(self) -> bool {
        matches!(self, LinkType::Wireless | LinkType::AccessPoint)
    }
}

/// A link: a speed (bits per unit time, here bits/ns-equivalent as specified) and a
/// medium class. Immutable after insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Link {
    /// Transmission speed, in bits per unit time (ns-equivalent, see §4.1
    /// `timeslots`).
    pub speed: u64,
    /// Medium class of the link.
    pub link_type: LinkType,
}

impl Link {
    /// Create a new link, rejecting a non-positive speed.
    pub fn new(speed: u64, link_type: LinkType) -> Result<Self> {
        if speed == 0 {
            return Err(SchedulerError::invalid_input(
                "link speed must be a positive integer",
            ));
        }
        Ok(Self { speed, link_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_speed_is_rejected() {
        let err = Link::new(0, LinkType::Wired).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidInput(_)));
    }

    #[test]
    fn only_wireless_and_access_point_allow_replicas() {
        assert!(!LinkType::Wired.allows_replicas());
        assert!(LinkType::Wireless.allows_replicas());
        assert!(LinkType::AccessPoint.allows_replicas());
    }
}
