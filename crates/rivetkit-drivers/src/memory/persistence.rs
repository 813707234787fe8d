use async_trait::async_trait;
use dashmap::DashMap;
use rivetkit_error::Result;

use crate::persistence::PersistenceDriver;

#[derive(Debug, Default)]
pub struct InMemoryPersistenceDriver {
	records: DashMap<String, Vec<u8>>,
}

impl InMemoryPersistenceDriver {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl PersistenceDriver for InMemoryPersistenceDriver {
	async fn read(&self, actor_id: &str) -> Result<Option<Vec<u8>>> {
		Ok(self.records.get(actor_id).map(|entry| entry.clone()))
	}

	async fn write(&self, actor_id: &str, data: Vec<u8>) -> Result<()> {
		self.records.insert(actor_id.to_string(), data);
		Ok(())
	}

	async fn delete(&self, actor_id: &str) -> Result<()> {
		self.records.remove(actor_id);
		Ok(())
	}

	async fn list(&self) -> Result<Vec<String>> {
		Ok(self.records.iter().map(|entry| entry.key().clone()).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn write_then_read_round_trips() {
		let driver = InMemoryPersistenceDriver::new();
		driver.write("actor-1", vec![1, 2, 3]).await.unwrap();
		assert_eq!(driver.read("actor-1").await.unwrap(), Some(vec![1, 2, 3]));
	}

	#[tokio::test]
	async fn read_missing_actor_is_none() {
		let driver = InMemoryPersistenceDriver::new();
		assert_eq!(driver.read("nope").await.unwrap(), None);
	}

	#[tokio::test]
	async fn delete_removes_the_record() {
		let driver = InMemoryPersistenceDriver::new();
		driver.write("actor-1", vec![9]).await.unwrap();
		driver.delete("actor-1").await.unwrap();
		assert_eq!(driver.read("actor-1").await.unwrap(), None);
	}

	#[tokio::test]
	async fn list_enumerates_all_written_actors() {
		let driver = InMemoryPersistenceDriver::new();
		driver.write("a", vec![]).await.unwrap();
		driver.write("b", vec![]).await.unwrap();
		let mut ids = driver.list().await.unwrap();
		ids.sort();
		assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
	}
}
