use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use rivetkit_error::Result;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

use crate::coordinate::{CoordinateDriver, LeaseAcquireResult};

fn now_ms() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis() as i64
}

#[derive(Debug, Clone)]
struct LeaseState {
	leader_node_id: String,
	expires_at_ms: i64,
}

/// In-process single-key CAS over a `DashMap`: each entry is mutated only
/// through its shard lock (`entry()`), so the four lease primitives are
/// atomic without a separate `Mutex`.
///
/// The relay's pub/sub channel is a `tokio::sync::broadcast` per topic —
/// good enough to stand in for an external pub/sub backed by
/// FoundationDB/NATS, since every subscriber here lives in the same process.
#[derive(Debug, Default)]
pub struct InMemoryCoordinateDriver {
	leases: DashMap<String, LeaseState>,
	topics: DashMap<String, broadcast::Sender<Vec<u8>>>,
}

impl InMemoryCoordinateDriver {
	pub fn new() -> Self {
		Self::default()
	}

	fn topic_sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
		self.topics
			.entry(topic.to_string())
			.or_insert_with(|| broadcast::channel(1024).0)
			.clone()
	}
}

#[async_trait]
impl CoordinateDriver for InMemoryCoordinateDriver {
	async fn start_actor_and_acquire_lease(
		&self,
		actor_id: &str,
		node_id: &str,
		lease_duration: Duration,
	) -> Result<LeaseAcquireResult> {
		let now = now_ms();
		let expires_at_ms = now + lease_duration.as_millis() as i64;

		let leader_node_id = match self.leases.entry(actor_id.to_string()) {
			Entry::Vacant(entry) => {
				entry.insert(LeaseState {
					leader_node_id: node_id.to_string(),
					expires_at_ms,
				});
				node_id.to_string()
			}
			Entry::Occupied(mut entry) => {
				if entry.get().expires_at_ms <= now {
					entry.insert(LeaseState {
						leader_node_id: node_id.to_string(),
						expires_at_ms,
					});
					node_id.to_string()
				} else {
					entry.get().leader_node_id.clone()
				}
			}
		};

		Ok(LeaseAcquireResult { leader_node_id })
	}

	async fn extend_lease(
		&self,
		actor_id: &str,
		node_id: &str,
		lease_duration: Duration,
	) -> Result<bool> {
		let Some(mut entry) = self.leases.get_mut(actor_id) else {
			return Ok(false);
		};
		if entry.leader_node_id != node_id {
			return Ok(false);
		}
		entry.expires_at_ms = now_ms() + lease_duration.as_millis() as i64;
		Ok(true)
	}

	async fn attempt_acquire_lease(
		&self,
		actor_id: &str,
		node_id: &str,
		lease_duration: Duration,
	) -> Result<Option<String>> {
		let now = now_ms();
		let expires_at_ms = now + lease_duration.as_millis() as i64;

		let acquired = match self.leases.entry(actor_id.to_string()) {
			Entry::Vacant(entry) => {
				entry.insert(LeaseState {
					leader_node_id: node_id.to_string(),
					expires_at_ms,
				});
				true
			}
			Entry::Occupied(mut entry) => {
				if entry.get().expires_at_ms <= now {
					entry.insert(LeaseState {
						leader_node_id: node_id.to_string(),
						expires_at_ms,
					});
					true
				} else {
					false
				}
			}
		};

		Ok(acquired.then(|| node_id.to_string()))
	}

	async fn release_lease(&self, actor_id: &str, node_id: &str) -> Result<()> {
		if let Entry::Occupied(entry) = self.leases.entry(actor_id.to_string()) {
			if entry.get().leader_node_id == node_id {
				entry.remove();
			}
		}
		Ok(())
	}

	async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
		// No receivers is not an error: a relay message published after the
		// leader has already moved on is simply dropped.
		let _ = self.topic_sender(topic).send(payload);
		Ok(())
	}

	async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Vec<u8>>> {
		Ok(self.topic_sender(topic).subscribe())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn first_starter_becomes_leader() {
		let driver = InMemoryCoordinateDriver::new();
		let result = driver
			.start_actor_and_acquire_lease("actor-1", "node-a", Duration::from_secs(15))
			.await
			.unwrap();
		assert_eq!(result.leader_node_id, "node-a");
	}

	#[tokio::test]
	async fn second_starter_observes_existing_leader() {
		let driver = InMemoryCoordinateDriver::new();
		driver
			.start_actor_and_acquire_lease("actor-1", "node-a", Duration::from_secs(15))
			.await
			.unwrap();
		let result = driver
			.start_actor_and_acquire_lease("actor-1", "node-b", Duration::from_secs(15))
			.await
			.unwrap();
		assert_eq!(result.leader_node_id, "node-a");
	}

	#[tokio::test]
	async fn extend_lease_fails_for_non_owner() {
		let driver = InMemoryCoordinateDriver::new();
		driver
			.start_actor_and_acquire_lease("actor-1", "node-a", Duration::from_secs(15))
			.await
			.unwrap();
		assert!(!driver
			.extend_lease("actor-1", "node-b", Duration::from_secs(15))
			.await
			.unwrap());
		assert!(driver
			.extend_lease("actor-1", "node-a", Duration::from_secs(15))
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn attempt_acquire_only_succeeds_after_expiry() {
		let driver = InMemoryCoordinateDriver::new();
		driver
			.start_actor_and_acquire_lease("actor-1", "node-a", Duration::from_millis(1))
			.await
			.unwrap();
		assert!(driver
			.attempt_acquire_lease("actor-1", "node-b", Duration::from_secs(15))
			.await
			.unwrap()
			.is_none());

		tokio::time::sleep(Duration::from_millis(5)).await;

		let winner = driver
			.attempt_acquire_lease("actor-1", "node-b", Duration::from_secs(15))
			.await
			.unwrap();
		assert_eq!(winner.as_deref(), Some("node-b"));
	}

	#[tokio::test]
	async fn release_only_clears_owners_lease() {
		let driver = InMemoryCoordinateDriver::new();
		driver
			.start_actor_and_acquire_lease("actor-1", "node-a", Duration::from_secs(15))
			.await
			.unwrap();

		// node-b doesn't own the lease, so this release is a no-op.
		driver.release_lease("actor-1", "node-b").await.unwrap();
		assert!(driver
			.extend_lease("actor-1", "node-a", Duration::from_secs(15))
			.await
			.unwrap());

		driver.release_lease("actor-1", "node-a").await.unwrap();
		assert!(driver
			.attempt_acquire_lease("actor-1", "node-c", Duration::from_secs(15))
			.await
			.unwrap()
			.is_some());
	}

	#[tokio::test]
	async fn publish_reaches_subscribers() {
		let driver = InMemoryCoordinateDriver::new();
		let mut rx = driver.subscribe("relay/actor-1").await.unwrap();
		driver
			.publish("relay/actor-1", b"hello".to_vec())
			.await
			.unwrap();
		let received = rx.recv().await.unwrap();
		assert_eq!(received, b"hello");
	}
}
