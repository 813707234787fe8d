//! Message relay: a follower holds the client's connection but
//! not the actor's state, so it forwards everything — connect, messages,
//! disconnect — to whoever currently holds the lease, and relays the
//! leader's replies (both typed responses and raw broadcast frames) back
//! out. The follower persists nothing about the conversation itself; the
//! topic and the envelope are the only state in flight.

use rivetkit_error::{Result, RivetkitError};
use rivetkit_protocol::messages::ServerMessage;
use rivetkit_protocol::{ClientMessage, Encoding, WireValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rivetkit_drivers::CoordinateDriver;

pub fn request_topic(actor_id: &str) -> String {
	format!("rivetkit/relay/{actor_id}/request")
}

pub fn response_topic(actor_id: &str) -> String {
	format!("rivetkit/relay/{actor_id}/response")
}

/// Follower → leader envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelayToLeader {
	Connect {
		conn_id: String,
		conn_token: String,
		params: Option<WireValue>,
		auth_data: Option<WireValue>,
		encoding: Encoding,
	},
	Message {
		conn_id: String,
		conn_token: String,
		message: ClientMessage,
	},
	Disconnect {
		conn_id: String,
	},
}

impl RelayToLeader {
	fn conn_id(&self) -> &str {
		match self {
			RelayToLeader::Connect { conn_id, .. }
			| RelayToLeader::Message { conn_id, .. }
			| RelayToLeader::Disconnect { conn_id } => conn_id,
		}
	}
}

/// Leader → follower envelope, routed back to the connection that sent the
/// request. Followers filter on `conn_id` since all of them share one
/// response topic per actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelayToFollower {
	/// A typed reply to an `ActionRequest`/`SubscriptionRequest`.
	Response { conn_id: String, message: ServerMessage },
	/// An already-encoded frame pushed by `broadcast` or a direct send —
	/// forwarded byte-for-byte, since the connection's encoding was already
	/// fixed when it connected.
	Frame { conn_id: String, bytes: Vec<u8> },
	/// The leader rejected the connection (`onBeforeConnect`/`onConnect`
	/// returned an error) or tore it down.
	Closed { conn_id: String, reason: String },
}

impl RelayToFollower {
	fn conn_id(&self) -> &str {
		match self {
			RelayToFollower::Response { conn_id, .. }
			| RelayToFollower::Frame { conn_id, .. }
			| RelayToFollower::Closed { conn_id, .. } => conn_id,
		}
	}
}

/// What a follower hands its local transport (WebSocket/SSE driver) as
/// events arrive from the leader.
#[derive(Debug)]
pub enum RelayEvent {
	Message(ServerMessage),
	Frame(Vec<u8>),
	Closed(String),
}

/// A client connection held by a follower node: its messages never touch
/// local actor state, they're published to the leader and the leader's
/// replies are streamed back through the channel returned by `open`.
pub struct RelayConnection {
	actor_id: String,
	conn_id: String,
	conn_token: String,
	driver: Arc<dyn CoordinateDriver>,
	forwarder: JoinHandle<()>,
}

impl RelayConnection {
	/// Subscribes to the actor's response topic, publishes the initial
	/// `Connect` envelope, and starts forwarding events addressed to
	/// `conn_id` onto the returned channel.
	#[allow(clippy::too_many_arguments)]
	pub async fn open(
		driver: Arc<dyn CoordinateDriver>,
		actor_id: impl Into<String>,
		conn_id: impl Into<String>,
		conn_token: impl Into<String>,
		params: Option<WireValue>,
		auth_data: Option<WireValue>,
		encoding: Encoding,
	) -> Result<(Self, mpsc::UnboundedReceiver<RelayEvent>)> {
		let actor_id = actor_id.into();
		let conn_id = conn_id.into();
		let conn_token = conn_token.into();

		let mut sub = driver.subscribe(&response_topic(&actor_id)).await?;
		let (tx, rx) = mpsc::unbounded_channel();
		let filter_conn_id = conn_id.clone();
		let forwarder = tokio::spawn(async move {
			loop {
				match sub.recv().await {
					Ok(bytes) => match serde_bare::from_slice::<RelayToFollower>(&bytes) {
						Ok(envelope) if envelope.conn_id() == filter_conn_id => {
							let event = match envelope {
								RelayToFollower::Response { message, .. } => {
									RelayEvent::Message(message)
								}
								RelayToFollower::Frame { bytes, .. } => RelayEvent::Frame(bytes),
								RelayToFollower::Closed { reason, .. } => {
									RelayEvent::Closed(reason)
								}
							};
							if tx.send(event).is_err() {
								break;
							}
						}
						Ok(_) => continue,
						Err(err) => {
							tracing::warn!(%err, "dropping malformed relay envelope");
						}
					},
					Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "relay follower lagged behind leader replies");
					}
					Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
				}
			}
		});

		let relay = Self {
			actor_id,
			conn_id,
			conn_token,
			driver,
			forwarder,
		};
		relay
			.publish(RelayToLeader::Connect {
				conn_id: relay.conn_id.clone(),
				conn_token: relay.conn_token.clone(),
				params,
				auth_data,
				encoding,
			})
			.await?;

		Ok((relay, rx))
	}

	pub fn conn_id(&self) -> &str {
		&self.conn_id
	}

	/// Publishes an inbound client message to the leader.
	pub async fn send_to_leader(&self, message: ClientMessage) -> Result<()> {
		self.publish(RelayToLeader::Message {
			conn_id: self.conn_id.clone(),
			conn_token: self.conn_token.clone(),
			message,
		})
		.await
	}

	async fn publish(&self, envelope: RelayToLeader) -> Result<()> {
		let bytes = serde_bare::to_vec(&envelope).map_err(RivetkitError::internal)?;
		self.driver
			.publish(&request_topic(&self.actor_id), bytes)
			.await
	}
}

/// One-off request/response relay for a connection whose transport has no
/// standing channel of its own (the SSE side-channel POST): push
/// `message` at the leader and wait for the one reply addressed to `conn_id`,
/// without registering a [`RelayConnection`]. Returns `Ok(None)` if the
/// leader sends no typed reply before `timeout` elapses (e.g. a subscription
/// request, which has no response).
pub async fn request_once(
	driver: &Arc<dyn CoordinateDriver>,
	actor_id: &str,
	conn_id: &str,
	conn_token: &str,
	message: ClientMessage,
	timeout: std::time::Duration,
) -> Result<Option<ServerMessage>> {
	let mut sub = driver.subscribe(&response_topic(actor_id)).await?;

	let envelope = RelayToLeader::Message {
		conn_id: conn_id.to_string(),
		conn_token: conn_token.to_string(),
		message,
	};
	let bytes = serde_bare::to_vec(&envelope).map_err(RivetkitError::internal)?;
	driver.publish(&request_topic(actor_id), bytes).await?;

	let wait = async {
		loop {
			match sub.recv().await {
				Ok(raw) => match serde_bare::from_slice::<RelayToFollower>(&raw) {
					Ok(envelope) if envelope.conn_id() == conn_id => {
						return match envelope {
							RelayToFollower::Response { message, .. } => Ok(Some(message)),
							RelayToFollower::Frame { .. } => continue,
							RelayToFollower::Closed { reason, .. } => {
								Err(RivetkitError::internal(reason))
							}
						};
					}
					Ok(_) => continue,
					Err(err) => {
						tracing::warn!(%err, "dropping malformed relay envelope");
						continue;
					}
				},
				Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
					tracing::warn!(skipped, "relay lagged waiting for one-off reply");
					continue;
				}
				Err(tokio::sync::broadcast::error::RecvError::Closed) => {
					return Err(RivetkitError::internal("coordinate driver topic closed"));
				}
			}
		}
	};

	match tokio::time::timeout(timeout, wait).await {
		Ok(result) => result,
		Err(_) => Ok(None),
	}
}

impl Drop for RelayConnection {
	fn drop(&mut self) {
		self.forwarder.abort();
		let driver = self.driver.clone();
		let topic = request_topic(&self.actor_id);
		let envelope = RelayToLeader::Disconnect {
			conn_id: self.conn_id.clone(),
		};
		tokio::spawn(async move {
			if let Ok(bytes) = serde_bare::to_vec(&envelope) {
				let _ = driver.publish(&topic, bytes).await;
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rivetkit_drivers::InMemoryCoordinateDriver;

	#[tokio::test]
	async fn relayed_message_round_trips_through_both_topics() {
		let driver: Arc<dyn CoordinateDriver> = Arc::new(InMemoryCoordinateDriver::default());

		let mut leader_rx = driver.subscribe(&request_topic("actor-1")).await.unwrap();

		let (relay, mut replies) = RelayConnection::open(
			driver.clone(),
			"actor-1",
			"conn-1",
			"tok-1",
			None,
			None,
			Encoding::Json,
		)
		.await
		.unwrap();

		let connect_raw = leader_rx.recv().await.unwrap();
		match serde_bare::from_slice::<RelayToLeader>(&connect_raw).unwrap() {
			RelayToLeader::Connect { conn_id, .. } => assert_eq!(conn_id, "conn-1"),
			_ => panic!("expected Connect"),
		}

		relay
			.send_to_leader(ClientMessage::SubscriptionRequest {
				event: "tick".into(),
				subscribe: true,
			})
			.await
			.unwrap();

		let raw = leader_rx.recv().await.unwrap();
		match serde_bare::from_slice::<RelayToLeader>(&raw).unwrap() {
			RelayToLeader::Message {
				conn_id,
				conn_token,
				..
			} => {
				assert_eq!(conn_id, "conn-1");
				assert_eq!(conn_token, "tok-1");
			}
			_ => panic!("expected Message"),
		}

		let response = RelayToFollower::Response {
			conn_id: "conn-1".into(),
			message: ServerMessage::ActionResponse {
				request_id: 1,
				output: rivetkit_protocol::WireValue::Int(5),
			},
		};
		driver
			.publish(
				&response_topic("actor-1"),
				serde_bare::to_vec(&response).unwrap(),
			)
			.await
			.unwrap();

		match replies.recv().await.unwrap() {
			RelayEvent::Message(ServerMessage::ActionResponse { request_id, .. }) => {
				assert_eq!(request_id, 1)
			}
			_ => panic!("wrong event"),
		}
	}
}
