//! Shared state behind every route: the actor definition registry plus the
//! three drivers and the in-process table of live
//! [`rivetkit_coordinate::PeerHandle`]s this node currently holds a reference
//! to.

use std::sync::Arc;

use dashmap::DashMap;
use rivetkit_config::RivetkitConfig;
use rivetkit_coordinate::{ActorPeer, PeerHandle};
use rivetkit_core::Registry;
use rivetkit_drivers::{CoordinateDriver, ManagerDriver, PersistenceDriver};
use rivetkit_error::{Result, RivetkitError};
use rivetkit_protocol::WireValue;

pub struct ManagerState {
	pub node_id: String,
	pub registry: Registry,
	pub manager_driver: Arc<dyn ManagerDriver>,
	pub coordinate_driver: Arc<dyn CoordinateDriver>,
	pub persistence_driver: Arc<dyn PersistenceDriver>,
	pub config: RivetkitConfig,
	peers: DashMap<String, PeerHandle>,
	/// Creation-time `input`, stashed by the management endpoints between
	/// `getOrCreateWithKey`/`create` and the actor's first real access — the
	/// manager driver's directory entry has nowhere to carry it, and
	/// materialization (`onCreate`) only happens lazily when a peer first
	/// spawns for that actor id.
	pending_input: DashMap<String, WireValue>,
}

impl ManagerState {
	pub fn new(
		node_id: impl Into<String>,
		registry: Registry,
		manager_driver: Arc<dyn ManagerDriver>,
		coordinate_driver: Arc<dyn CoordinateDriver>,
		persistence_driver: Arc<dyn PersistenceDriver>,
		config: RivetkitConfig,
	) -> Self {
		Self {
			node_id: node_id.into(),
			registry,
			manager_driver,
			coordinate_driver,
			persistence_driver,
			config,
			peers: DashMap::new(),
			pending_input: DashMap::new(),
		}
	}

	pub fn stash_input(&self, actor_id: &str, input: Option<WireValue>) {
		if let Some(input) = input {
			self.pending_input.insert(actor_id.to_string(), input);
		}
	}

	/// Returns this node's peer for `actor_id`, spawning one (and running
	/// lease acquisition) on first access. `name` is only consulted the
	/// first time, to look up the registered handler.
	pub async fn peer_for(&self, actor_id: &str, name: &str) -> Result<PeerHandle> {
		if let Some(existing) = self.peers.get(actor_id) {
			return Ok(existing.clone());
		}

		let handler = self
			.registry
			.get(name)
			.ok_or_else(|| RivetkitError::internal(format!("no actor registered as '{name}'")))?;
		let input = self.pending_input.remove(actor_id).map(|(_, v)| v);

		let peer = ActorPeer::spawn(
			actor_id.to_string(),
			self.node_id.clone(),
			handler,
			self.persistence_driver.clone(),
			self.coordinate_driver.clone(),
			self.config.actor.clone(),
			self.config.coordinate.clone(),
			input,
		)
		.await?;

		// Another task may have raced us to insert a peer for the same actor;
		// keep whichever ended up in the map first so there's only ever one
		// peer per (actor_id, node_id) in this process.
		let handle = self.peers.entry(actor_id.to_string()).or_insert(peer).clone();
		Ok(handle)
	}

	/// Looks up the actor's registered name, needed to resolve a handler
	/// from a bare actor id carried on the gateway's routing headers.
	pub async fn name_for(&self, actor_id: &str) -> Result<String> {
		self.manager_driver
			.get_for_id(actor_id)
			.await?
			.map(|record| record.name)
			.ok_or(RivetkitError::ActorNotFound)
	}
}
