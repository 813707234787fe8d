//! Coordinate Driver: the lease CAS primitives plus the pub/sub transport
//! the relay uses to forward messages to the current leader. All four lease
//! operations must be atomic at the storage layer — a single-key CAS is
//! sufficient, the same contract a FoundationDB-backed KV gives a workflow
//! engine's lease table.

use async_trait::async_trait;
use rivetkit_error::Result;
use std::time::Duration;
use tokio::sync::broadcast;

/// Result of `startActorAndAcquireLease`: the actor record exists either way;
/// `leader_node_id` tells the caller who actually holds the lease, which may
/// not be them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseAcquireResult {
	pub leader_node_id: String,
}

#[async_trait]
pub trait CoordinateDriver: Send + Sync + 'static {
	/// Atomic: create the lease record if missing, claim it for `node_id` if
	/// no valid lease exists, and return whoever ended up holding it.
	async fn start_actor_and_acquire_lease(
		&self,
		actor_id: &str,
		node_id: &str,
		lease_duration: Duration,
	) -> Result<LeaseAcquireResult>;

	/// Extend the lease only if `node_id` still owns it. `Ok(false)` means the
	/// caller has lost the lease and must step down immediately.
	async fn extend_lease(
		&self,
		actor_id: &str,
		node_id: &str,
		lease_duration: Duration,
	) -> Result<bool>;

	/// Claim an expired lease. `Ok(None)` means the lease was still valid
	/// (held by someone else) and the attempt failed.
	async fn attempt_acquire_lease(
		&self,
		actor_id: &str,
		node_id: &str,
		lease_duration: Duration,
	) -> Result<Option<String>>;

	/// Conditional delete: releases the lease only if `node_id` holds it.
	async fn release_lease(&self, actor_id: &str, node_id: &str) -> Result<()>;

	/// Publish a relay message to `topic`. Delivery is best-effort and
	/// fire-and-forget, matching pub/sub semantics generally.
	async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

	/// Subscribe to a topic, receiving every message published after this
	/// call returns.
	async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Vec<u8>>>;
}
