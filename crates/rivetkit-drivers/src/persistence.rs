//! Persistence Driver: byte-blob storage keyed by actor id.
//!
//! The driver itself is encoding-agnostic — it stores and returns whatever
//! bytes the actor instance hands it. The `Persisted Record` shape is
//! serialized upstream in `rivetkit-core`.

use async_trait::async_trait;
use rivetkit_error::Result;

#[async_trait]
pub trait PersistenceDriver: Send + Sync + 'static {
	/// Read the stored record for `actor_id`, or `None` if the actor has
	/// never been persisted.
	async fn read(&self, actor_id: &str) -> Result<Option<Vec<u8>>>;

	/// Overwrite the record for `actor_id`. Writes are whole-record: there is
	/// no partial update, so a reader never observes a half-written save.
	async fn write(&self, actor_id: &str, data: Vec<u8>) -> Result<()>;

	/// Remove the stored record, if any. Used when an actor is destroyed.
	async fn delete(&self, actor_id: &str) -> Result<()>;

	/// Enumerate every actor id with a stored record. Used on process start
	/// to re-arm schedulers for actors with pending alarms.
	async fn list(&self) -> Result<Vec<String>>;
}
