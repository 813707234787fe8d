//! `ActorContext`: the handle hooks and actions receive into one actor
//! instance's live state.

use rivetkit_protocol::{Encoding, ServerMessage, WireValue};
use std::collections::{HashMap, HashSet};

use crate::connection::ConnectionRegistry;
use rivetkit_protocol::persisted::ScheduleEntry;

/// Options for `broadcast`: who to skip.
#[derive(Debug, Clone, Default)]
pub struct BroadcastOptions {
	pub exclude_self: bool,
	pub exclude: Vec<String>,
}

pub struct ActorContext<'a> {
	pub actor_id: &'a str,
	pub name: &'a str,
	state: &'a mut WireValue,
	vars: &'a mut HashMap<String, WireValue>,
	conns: &'a mut ConnectionRegistry,
	schedule: &'a mut Vec<ScheduleEntry>,
	dirty: &'a mut bool,
	calling_conn_id: Option<&'a str>,
}

impl<'a> ActorContext<'a> {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		actor_id: &'a str,
		name: &'a str,
		state: &'a mut WireValue,
		vars: &'a mut HashMap<String, WireValue>,
		conns: &'a mut ConnectionRegistry,
		schedule: &'a mut Vec<ScheduleEntry>,
		dirty: &'a mut bool,
		calling_conn_id: Option<&'a str>,
	) -> Self {
		ActorContext {
			actor_id,
			name,
			state,
			vars,
			conns,
			schedule,
			dirty,
			calling_conn_id,
		}
	}

	pub fn state(&self) -> &WireValue {
		self.state
	}

	/// Every mutation through this accessor marks the actor dirty, scheduling
	/// a save after `state.saveInterval`.
	pub fn state_mut(&mut self) -> &mut WireValue {
		*self.dirty = true;
		self.state
	}

	pub fn set_state(&mut self, state: WireValue) {
		*self.state = state;
		*self.dirty = true;
	}

	pub fn vars(&self) -> &HashMap<String, WireValue> {
		self.vars
	}

	pub fn vars_mut(&mut self) -> &mut HashMap<String, WireValue> {
		self.vars
	}

	pub fn conns(&self) -> &ConnectionRegistry {
		self.conns
	}

	pub fn conns_mut(&mut self) -> &mut ConnectionRegistry {
		self.conns
	}

	/// The connection whose action triggered this context, if any — used by
	/// `exclude_self`.
	pub fn calling_conn_id(&self) -> Option<&str> {
		self.calling_conn_id
	}

	/// `schedule.at(timestamp, actionName, payload?)`.
	pub fn schedule_at(&mut self, id: String, due_at_ms: i64, action_name: String, payload: Option<WireValue>) {
		self.schedule.push(ScheduleEntry {
			id,
			due_at: due_at_ms,
			action_name,
			payload,
		});
		*self.dirty = true;
	}

	/// `schedule.after(delayMs, actionName, payload?)`.
	pub fn schedule_after(&mut self, id: String, delay_ms: i64, action_name: String, payload: Option<WireValue>, now_ms: i64) {
		self.schedule_at(id, now_ms + delay_ms, action_name, payload);
	}

	/// Deliver `event` to every subscribed connection, serializing once per
	/// distinct encoding in use.
	pub fn broadcast(&mut self, event: &str, args: Vec<WireValue>, options: BroadcastOptions) {
		let excluded: HashSet<&str> = options.exclude.iter().map(String::as_str).collect();
		let skip_self = options.exclude_self.then_some(self.calling_conn_id).flatten();

		let mut cache: HashMap<Encoding, Vec<u8>> = HashMap::new();
		let message = ServerMessage::Event {
			event_name: event.to_string(),
			args,
		};

		for conn in self.conns.iter() {
			if !conn.is_subscribed(event) {
				continue;
			}
			if excluded.contains(conn.conn_id.as_str()) || Some(conn.conn_id.as_str()) == skip_self {
				continue;
			}
			let bytes = cache.entry(conn.encoding).or_insert_with(|| {
				message
					.clone()
					.encode(conn.encoding)
					.unwrap_or_default()
			});
			conn.send(bytes.clone());
		}
	}
}
