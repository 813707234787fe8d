//! Trait boundaries for the three external collaborators a deployment plugs
//! in: the Persistence Driver, the Manager Driver, and the Coordinate
//! Driver.
//!
//! Concrete storage drivers (file/Redis/FoundationDB-backed) are out of
//! scope here; this crate carries the trait definitions plus an in-memory
//! implementation of each, used for single-node operation and as the test
//! fixture for every other crate in the workspace.

pub mod coordinate;
pub mod manager;
pub mod memory;
pub mod persistence;

pub use coordinate::{CoordinateDriver, LeaseAcquireResult};
pub use manager::{ActorRecord, CreateActorInput, ManagerDriver};
pub use memory::{InMemoryCoordinateDriver, InMemoryManagerDriver, InMemoryPersistenceDriver};
pub use persistence::PersistenceDriver;
