//! Connection registry: tracks live client connections to a running actor.

use rivetkit_protocol::{Encoding, WireValue};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::mpsc;

/// How an actor's outbound message reaches this connection.
pub enum Transport {
	WebSocket(mpsc::UnboundedSender<Vec<u8>>),
	/// Server-Sent Events: same direction as `WebSocket`, but the client's
	/// inbound messages arrive over a side-channel HTTP POST instead of the
	/// same socket.
	Sse(mpsc::UnboundedSender<Vec<u8>>),
	/// One-shot HTTP: there is no outbound channel — `send` is a no-op, since
	/// the only response this connection ever gets is the one action's
	/// return value.
	Http,
}

/// A live or persisted-but-disconnected client connection.
pub struct Connection {
	pub conn_id: String,
	pub conn_token: String,
	pub params: Option<WireValue>,
	pub auth_data: Option<WireValue>,
	pub encoding: Encoding,
	pub transport: Transport,
	/// Per-connection persisted state set by the handler; survives restarts.
	pub state: Option<WireValue>,
	pub subscriptions: BTreeSet<String>,
}

impl Connection {
	pub fn is_subscribed(&self, event: &str) -> bool {
		self.subscriptions.contains(event)
	}

	pub fn send(&self, bytes: Vec<u8>) {
		match &self.transport {
			Transport::WebSocket(tx) | Transport::Sse(tx) => {
				// A closed receiver means the transport already disconnected;
				// the owning instance will observe that separately when the
				// disconnect event arrives, so there's nothing to do here.
				let _ = tx.send(bytes);
			}
			Transport::Http => {}
		}
	}
}

/// All connections currently registered with an actor instance, keyed by
/// `connId`.
#[derive(Default)]
pub struct ConnectionRegistry {
	conns: HashMap<String, Connection>,
}

impl ConnectionRegistry {
	pub fn insert(&mut self, conn: Connection) {
		self.conns.insert(conn.conn_id.clone(), conn);
	}

	pub fn remove(&mut self, conn_id: &str) -> Option<Connection> {
		self.conns.remove(conn_id)
	}

	pub fn get(&self, conn_id: &str) -> Option<&Connection> {
		self.conns.get(conn_id)
	}

	pub fn get_mut(&mut self, conn_id: &str) -> Option<&mut Connection> {
		self.conns.get_mut(conn_id)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Connection> {
		self.conns.values()
	}

	pub fn len(&self) -> usize {
		self.conns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.conns.is_empty()
	}
}
