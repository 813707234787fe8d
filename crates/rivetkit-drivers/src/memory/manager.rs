use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use rivetkit_error::{Result, RivetkitError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::manager::{ActorRecord, CreateActorInput, ManagerDriver};

fn now_ms() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis() as i64
}

fn directory_key(name: &str, key: &[String]) -> String {
	format!("{name}\u{0}{}", key.join("\u{0}"))
}

/// Directory of `(name, key) → actorId` backed by two maps, matching the
/// shape `getWithKey`/`getOrCreateWithKey` need: a lookup by key and a lookup
/// by id.
#[derive(Debug, Default)]
pub struct InMemoryManagerDriver {
	by_key: DashMap<String, String>,
	by_id: DashMap<String, ActorRecord>,
}

impl InMemoryManagerDriver {
	pub fn new() -> Self {
		Self::default()
	}

	fn build_record(&self, input: &CreateActorInput) -> ActorRecord {
		ActorRecord {
			actor_id: uuid::Uuid::new_v4().to_string(),
			name: input.name.clone(),
			key: input.key.clone(),
			namespace_id: "default".to_string(),
			runner_name_selector: input.runner_name_selector.clone(),
			create_ts: now_ms(),
			connectable_ts: Some(now_ms()),
			destroy_ts: None,
			sleep_ts: None,
			start_ts: Some(now_ms()),
		}
	}

	/// Atomically inserts the `(name, key)` entry if absent, returning the
	/// record that ended up at that key and whether this call created it.
	/// The shard lock held across `entry()` is what keeps two concurrent
	/// `getOrCreateWithKey` calls for the same key from each materializing a
	/// distinct actor id.
	fn insert_or_get(&self, input: CreateActorInput) -> (ActorRecord, bool) {
		let key = directory_key(&input.name, &input.key);
		match self.by_key.entry(key) {
			Entry::Occupied(entry) => {
				let actor_id = entry.get().clone();
				let record = self
					.by_id
					.get(&actor_id)
					.map(|entry| entry.clone())
					.expect("by_key and by_id are kept in sync");
				(record, false)
			}
			Entry::Vacant(entry) => {
				let record = self.build_record(&input);
				entry.insert(record.actor_id.clone());
				self.by_id.insert(record.actor_id.clone(), record.clone());
				(record, true)
			}
		}
	}
}

#[async_trait]
impl ManagerDriver for InMemoryManagerDriver {
	async fn get_for_id(&self, actor_id: &str) -> Result<Option<ActorRecord>> {
		Ok(self.by_id.get(actor_id).map(|entry| entry.clone()))
	}

	async fn get_with_key(&self, name: &str, key: &[String]) -> Result<Option<ActorRecord>> {
		let Some(actor_id) = self.by_key.get(&directory_key(name, key)) else {
			return Ok(None);
		};
		Ok(self.by_id.get(actor_id.value()).map(|entry| entry.clone()))
	}

	async fn get_or_create_with_key(
		&self,
		input: CreateActorInput,
	) -> Result<(ActorRecord, bool)> {
		Ok(self.insert_or_get(input))
	}

	async fn create(&self, input: CreateActorInput) -> Result<ActorRecord> {
		if input.key.is_empty() {
			let record = self.build_record(&input);
			self.by_key
				.insert(directory_key(&input.name, &input.key), record.actor_id.clone());
			self.by_id.insert(record.actor_id.clone(), record.clone());
			return Ok(record);
		}

		let key = directory_key(&input.name, &input.key);
		match self.by_key.entry(key) {
			Entry::Occupied(_) => Err(RivetkitError::internal(format!(
				"actor with name '{}' and key {:?} already exists",
				input.name, input.key
			))),
			Entry::Vacant(entry) => {
				let record = self.build_record(&input);
				entry.insert(record.actor_id.clone());
				self.by_id.insert(record.actor_id.clone(), record.clone());
				Ok(record)
			}
		}
	}
}
