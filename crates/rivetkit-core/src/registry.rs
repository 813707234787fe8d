//! Registry of actor definitions: the `name → handler` directory an embedder
//! populates at startup, mirroring a config-driven registry of named
//! services.

use std::collections::HashMap;
use std::sync::Arc;

use crate::hooks::ActorHandler;

#[derive(Default, Clone)]
pub struct Registry {
	handlers: HashMap<String, Arc<dyn ActorHandler>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, handler: Arc<dyn ActorHandler>) -> &mut Self {
		self.handlers.insert(handler.name().to_string(), handler);
		self
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn ActorHandler>> {
		self.handlers.get(name).cloned()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.handlers.contains_key(name)
	}
}
