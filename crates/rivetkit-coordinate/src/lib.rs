//! Coordinate Topology: leader election over a lease CAS and the
//! follower→leader message relay, so exactly one node owns a given actor's
//! live state at a time even though any node can receive its traffic.

pub mod peer;
pub mod relay;

pub use peer::{ActorPeer, PeerHandle, PeerState, PeerStatus};
pub use relay::{request_once, RelayConnection};
