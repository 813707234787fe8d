//! Wires the three drivers and an embedder's [`Registry`] into a servable
//! [`axum::Router`], the way a service's router is wired up from its driver
//! handles at process bootstrap.

use std::net::SocketAddr;
use std::sync::Arc;

use rivetkit_config::RivetkitConfig;
use rivetkit_core::Registry;
use rivetkit_drivers::{
	CoordinateDriver, InMemoryCoordinateDriver, InMemoryManagerDriver, InMemoryPersistenceDriver,
	ManagerDriver, PersistenceDriver,
};
use rivetkit_manager::ManagerState;

/// Builds a [`ManagerState`] (and from it, a router) for a single node in
/// the cluster. Defaults to the in-memory drivers, which is all a
/// single-process deployment needs; swap in a real `CoordinateDriver`/
/// `PersistenceDriver`/`ManagerDriver` for a multi-node one.
pub struct RivetkitServer {
	node_id: String,
	registry: Registry,
	manager_driver: Arc<dyn ManagerDriver>,
	coordinate_driver: Arc<dyn CoordinateDriver>,
	persistence_driver: Arc<dyn PersistenceDriver>,
	config: RivetkitConfig,
}

impl RivetkitServer {
	/// Starts from the in-memory drivers and an empty registry; `node_id`
	/// distinguishes this process's lease claims from every other node's
	/// and should be stable across restarts of the same node but unique
	/// across the cluster.
	pub fn new(node_id: impl Into<String>) -> Self {
		Self {
			node_id: node_id.into(),
			registry: Registry::new(),
			manager_driver: Arc::new(InMemoryManagerDriver::new()),
			coordinate_driver: Arc::new(InMemoryCoordinateDriver::new()),
			persistence_driver: Arc::new(InMemoryPersistenceDriver::new()),
			config: RivetkitConfig::default(),
		}
	}

	pub fn registry(mut self, registry: Registry) -> Self {
		self.registry = registry;
		self
	}

	pub fn manager_driver(mut self, driver: Arc<dyn ManagerDriver>) -> Self {
		self.manager_driver = driver;
		self
	}

	pub fn coordinate_driver(mut self, driver: Arc<dyn CoordinateDriver>) -> Self {
		self.coordinate_driver = driver;
		self
	}

	pub fn persistence_driver(mut self, driver: Arc<dyn PersistenceDriver>) -> Self {
		self.persistence_driver = driver;
		self
	}

	pub fn config(mut self, config: RivetkitConfig) -> Self {
		self.config = config;
		self
	}

	/// Assembles the `ManagerState` shared across every route. Exposed
	/// directly for embedders that want to mount [`rivetkit_manager::router`]
	/// inside a larger axum app rather than serving it standalone.
	pub fn into_state(self) -> Arc<ManagerState> {
		Arc::new(ManagerState::new(
			self.node_id,
			self.registry,
			self.manager_driver,
			self.coordinate_driver,
			self.persistence_driver,
			self.config,
		))
	}

	/// Binds `addr` and serves the Manager/Router surface until
	/// the process is killed. This is the single-binary path; embedders
	/// wanting more control should use [`Self::into_state`] directly.
	pub async fn serve(self, addr: SocketAddr) -> rivetkit_error::Result<()> {
		let state = self.into_state();
		let app = rivetkit_manager::router(state);

		let listener = tokio::net::TcpListener::bind(addr)
			.await
			.map_err(|err| rivetkit_error::RivetkitError::internal(err.to_string()))?;
		tracing::info!(%addr, "rivetkit manager listening");

		axum::serve(listener, app)
			.await
			.map_err(|err| rivetkit_error::RivetkitError::internal(err.to_string()))
	}
}
