//! The network/frame data model and its derived quantities (§3): links, paths,
//! offsets, frames, and the network that owns all of them.

pub mod frame;
pub mod link;
pub mod network;
pub mod offset;
pub mod path;

pub use frame::{Frame, FrameId, OffsetTable};
pub use link::{Link, LinkId, LinkType};
pub use network::Network;
pub use offset::{timeslots_for, Offset, OffsetState, VarHandle};
pub use path::{Path, PathTable};
