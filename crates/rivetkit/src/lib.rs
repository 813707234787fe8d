//! Top-level facade: re-exports the pieces an embedder needs to register
//! actors and stand up a node, plus process-wide logging setup.
//!
//! A minimal single-node binary looks like:
//!
//! ```no_run
//! use rivetkit::{Registry, RivetkitServer};
//!
//! #[tokio::main]
//! async fn main() -> rivetkit::Result<()> {
//!     rivetkit::logging::init();
//!     let registry = Registry::new();
//!     // registry.register(Arc::new(MyActor));
//!     RivetkitServer::new("node-1")
//!         .registry(registry)
//!         .serve(([0, 0, 0, 0], 8080).into())
//!         .await
//! }
//! ```

pub mod logging;
mod server;

pub use rivetkit_config::RivetkitConfig;
pub use rivetkit_core::{ActorContext, ActorHandler, BroadcastOptions, Intent, Intents, Registry};
pub use rivetkit_drivers::{
	CoordinateDriver, InMemoryCoordinateDriver, InMemoryManagerDriver, InMemoryPersistenceDriver,
	ManagerDriver, PersistenceDriver,
};
pub use rivetkit_error::{Result, RivetkitError};
pub use rivetkit_manager::{router, ManagerState};
pub use rivetkit_protocol::{ClientMessage, Encoding, ServerMessage, WireValue};
pub use server::RivetkitServer;
