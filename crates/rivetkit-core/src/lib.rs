//! The Actor Instance / Lifecycle Engine and Scheduler.
//!
//! This crate owns exactly one actor's live state at a time, running it on a
//! private `tokio::task` behind a mailbox: nothing here locks shared state,
//! because nothing is shared — every access comes through
//! [`instance::ActorHandle`].

pub mod connection;
pub mod context;
pub mod hooks;
pub mod instance;
pub mod registry;
pub mod scheduler;

pub use connection::{Connection, ConnectionRegistry, Transport};
pub use context::{ActorContext, BroadcastOptions};
pub use hooks::{ActorHandler, Intent, Intents};
pub use instance::{ActorHandle, ActorInstance, NewConnection};
pub use registry::Registry;
