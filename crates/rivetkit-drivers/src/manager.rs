//! Manager Driver: directory of `(name, key) → actor id`.

use async_trait::async_trait;
use rivetkit_error::Result;
use serde::{Deserialize, Serialize};

/// `{actor_id, name, key, namespace_id, runner_name_selector, create_ts,
/// connectable_ts?, destroy_ts?, sleep_ts?, start_ts?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRecord {
	pub actor_id: String,
	pub name: String,
	pub key: Vec<String>,
	pub namespace_id: String,
	pub runner_name_selector: Option<String>,
	pub create_ts: i64,
	pub connectable_ts: Option<i64>,
	pub destroy_ts: Option<i64>,
	pub sleep_ts: Option<i64>,
	pub start_ts: Option<i64>,
}

/// `{name, key?, input?, runner_name_selector, crash_policy}`: `key` is
/// autogenerated if omitted on `POST /actors`, required for
/// `getOrCreateWithKey`.
#[derive(Debug, Clone, Default)]
pub struct CreateActorInput {
	pub name: String,
	pub key: Vec<String>,
	pub input: Option<Vec<u8>>,
	pub runner_name_selector: Option<String>,
	pub crash_policy: Option<String>,
}

#[async_trait]
pub trait ManagerDriver: Send + Sync + 'static {
	/// `getForId`: lookup by actor id. `None` → `ActorNotFound` at the caller.
	async fn get_for_id(&self, actor_id: &str) -> Result<Option<ActorRecord>>;

	/// `getWithKey`: lookup-only, does not create.
	async fn get_with_key(&self, name: &str, key: &[String]) -> Result<Option<ActorRecord>>;

	/// `getOrCreateWithKey`: idempotent create-or-fetch. Returns the record
	/// plus whether this call created it.
	async fn get_or_create_with_key(
		&self,
		input: CreateActorInput,
	) -> Result<(ActorRecord, bool)>;

	/// `create`: explicit creation; a duplicate `(name, key)` is an error
	/// rather than returning the existing record (unlike `get_or_create`).
	async fn create(&self, input: CreateActorInput) -> Result<ActorRecord>;
}
