//! Gateway connection drivers: WebSocket, SSE, and one-shot
//! HTTP. Each turns an edge request into either a direct
//! [`rivetkit_core::instance::NewConnection`] against this node's own
//! [`rivetkit_core::ActorHandle`] (when this node holds the lease) or a
//! [`rivetkit_coordinate::RelayConnection`] forwarded to whoever does.

pub mod http;
pub mod sse;
pub mod ws;

use std::sync::Arc;

use rivetkit_coordinate::{PeerHandle, PeerState};
use rivetkit_core::ActorHandle;
use rivetkit_error::{Result, RivetkitError};

use crate::state::ManagerState;

/// Resolves a peer for `actor_id` (spawning it if this is the first access on
/// this node) and returns its handler name alongside, since both the gateway
/// and the relay-connect path need it.
pub async fn peer_for(state: &Arc<ManagerState>, actor_id: &str) -> Result<PeerHandle> {
	let name = state.name_for(actor_id).await?;
	state.peer_for(actor_id, &name).await
}

/// `Some(core)` only once the peer has actually become leader; a peer mid
/// lease-acquisition reports `Follower` and should relay instead of blocking.
pub fn local_core(peer: &PeerHandle) -> Option<ActorHandle> {
	(peer.state() == PeerState::Leader).then(|| peer.core()).flatten()
}

pub(crate) fn new_conn_token() -> String {
	uuid::Uuid::new_v4().to_string()
}

pub(crate) fn new_conn_id() -> String {
	uuid::Uuid::new_v4().to_string()
}

pub(crate) fn check_size(bytes: &[u8], limit: usize) -> Result<()> {
	if bytes.len() > limit {
		return Err(RivetkitError::MessageTooLong {
			size: bytes.len(),
			limit,
		});
	}
	Ok(())
}
