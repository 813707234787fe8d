//! The Manager/Router: the HTTP surface clients and the edge
//! proxy talk to — actor discovery/creation against the
//! [`rivetkit_drivers::ManagerDriver`] directory, and the WebSocket/SSE/HTTP
//! gateways that hand a connection to whichever node currently holds that
//! actor's lease, relaying through [`rivetkit_coordinate`] when it isn't this
//! one.

pub mod connections;
pub mod http_api;
pub mod params;
pub mod router;
pub mod state;

pub use router::router;
pub use state::ManagerState;
