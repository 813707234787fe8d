//! `ActorPeer` state machine: per `(actorId, nodeId)`, tracks
//! whether this node holds the lease for an actor and, if so, runs its
//! [`ActorInstance`] locally. Followers never construct an instance — they
//! just poll for an expired lease and relay traffic to whoever does.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rivetkit_config::{ActorConfig, CoordinateConfig};
use rivetkit_core::{ActorHandle, ActorHandler, ActorInstance};
use rivetkit_drivers::{CoordinateDriver, PersistenceDriver};
use rivetkit_error::Result;
use rivetkit_protocol::WireValue;
use tokio::sync::broadcast;
use tokio::sync::{mpsc, watch};

use crate::relay::{RelayToFollower, RelayToLeader, request_topic, response_topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
	Follower,
	Leader,
	Disposed,
}

enum Command {
	AddRef,
	RemoveRef,
	Shutdown,
}

/// A snapshot of the peer's current state plus, when `state == Leader`, the
/// handle to the locally-running actor instance.
#[derive(Clone)]
pub struct PeerStatus {
	pub state: PeerState,
	pub core: Option<ActorHandle>,
}

/// A cheaply-cloneable reference to a running peer. Holding one counts as a
/// reference for the purposes of `referenceConnections` in the state machine
/// — dropping the last handle without calling `remove_ref` leaves the peer
/// running until `shutdown` is called explicitly, mirroring an embedder
/// that's expected to manage connection lifetimes itself.
#[derive(Clone)]
pub struct PeerHandle {
	tx: mpsc::UnboundedSender<Command>,
	status: watch::Receiver<PeerStatus>,
}

impl PeerHandle {
	pub fn state(&self) -> PeerState {
		self.status.borrow().state
	}

	/// The local actor handle, if this node currently holds the lease.
	/// `None` means callers must relay to the actual leader instead.
	pub fn core(&self) -> Option<ActorHandle> {
		self.status.borrow().core.clone()
	}

	pub async fn state_changed(&mut self) -> PeerState {
		let _ = self.status.changed().await;
		self.state()
	}

	pub fn add_ref(&self) {
		let _ = self.tx.send(Command::AddRef);
	}

	pub fn remove_ref(&self) {
		let _ = self.tx.send(Command::RemoveRef);
	}

	pub fn shutdown(&self) {
		let _ = self.tx.send(Command::Shutdown);
	}
}

pub struct ActorPeer;

impl ActorPeer {
	/// Runs `startActorAndAcquireLease` to find out whether this node is the
	/// leader or a follower, then spawns the background task that drives the
	/// rest of the state machine.
	#[allow(clippy::too_many_arguments)]
	pub async fn spawn(
		actor_id: String,
		node_id: String,
		handler: Arc<dyn ActorHandler>,
		persistence: Arc<dyn PersistenceDriver>,
		coordinate: Arc<dyn CoordinateDriver>,
		actor_config: ActorConfig,
		coordinate_config: CoordinateConfig,
		input: Option<WireValue>,
	) -> Result<PeerHandle> {
		let acquired = coordinate
			.start_actor_and_acquire_lease(&actor_id, &node_id, coordinate_config.lease_duration())
			.await?;
		let initial_state = if acquired.leader_node_id == node_id {
			PeerState::Leader
		} else {
			PeerState::Follower
		};

		let (status_tx, status_rx) = watch::channel(PeerStatus {
			state: initial_state,
			core: None,
		});
		let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

		let runtime = PeerRuntime {
			actor_id,
			node_id,
			handler,
			persistence,
			coordinate,
			actor_config,
			coordinate_config,
			input,
			ref_count: 0,
			core: None,
			status_tx,
			cmd_rx,
		};

		tokio::spawn(runtime.run(initial_state));

		Ok(PeerHandle {
			tx: cmd_tx,
			status: status_rx,
		})
	}
}

struct PeerRuntime {
	actor_id: String,
	node_id: String,
	handler: Arc<dyn ActorHandler>,
	persistence: Arc<dyn PersistenceDriver>,
	coordinate: Arc<dyn CoordinateDriver>,
	actor_config: ActorConfig,
	coordinate_config: CoordinateConfig,
	input: Option<WireValue>,
	ref_count: usize,
	core: Option<ActorHandle>,
	status_tx: watch::Sender<PeerStatus>,
	cmd_rx: mpsc::UnboundedReceiver<Command>,
}

/// Receives from an optional relay subscription, never resolving when there
/// is none so it can sit in a `tokio::select!` branch unconditionally.
async fn recv_optional(sub: &mut Option<broadcast::Receiver<Vec<u8>>>) -> Option<Vec<u8>> {
	match sub {
		Some(rx) => rx.recv().await.ok(),
		None => std::future::pending().await,
	}
}

impl PeerRuntime {
	async fn run(mut self, initial: PeerState) {
		let mut state = initial;
		if state == PeerState::Leader {
			if let Err(err) = self.become_leader().await {
				tracing::error!(actor_id = %self.actor_id, %err, "failed to start actor as leader");
				let _ = self.status_tx.send(PeerStatus {
					state: PeerState::Disposed,
					core: None,
				});
				return;
			}
		}

		let mut request_sub = self.subscribe_if_leader(state).await;

		loop {
			if state == PeerState::Disposed {
				break;
			}

			let timer = self.timer_for(state);

			tokio::select! {
				cmd = self.cmd_rx.recv() => {
					state = match cmd {
						Some(Command::AddRef) => {
							self.ref_count += 1;
							state
						}
						Some(Command::RemoveRef) => {
							self.ref_count = self.ref_count.saturating_sub(1);
							if self.ref_count == 0 {
								self.dispose(state).await
							} else {
								state
							}
						}
						Some(Command::Shutdown) | None => self.dispose(state).await,
					};
				}
				_ = tokio::time::sleep(timer) => {
					state = match state {
						PeerState::Leader => self.renew_or_dispose().await,
						PeerState::Follower => self.try_promote().await,
						PeerState::Disposed => state,
					};
					if state == PeerState::Leader && request_sub.is_none() {
						request_sub = self.subscribe_if_leader(state).await;
					}
				}
				Some(raw) = recv_optional(&mut request_sub), if state == PeerState::Leader => {
					self.handle_relayed_request(raw).await;
				}
			}

			let _ = self.status_tx.send(PeerStatus {
				state,
				core: if state == PeerState::Leader {
					self.core.clone()
				} else {
					None
				},
			});
		}
	}

	fn timer_for(&self, state: PeerState) -> Duration {
		match state {
			PeerState::Leader => self.coordinate_config.renew_interval(),
			PeerState::Follower => {
				let jitter_ms = self.coordinate_config.check_lease_jitter().as_millis() as u64;
				let jitter = if jitter_ms == 0 {
					0
				} else {
					rand::thread_rng().gen_range(0..=jitter_ms)
				};
				self.coordinate_config.check_lease_interval() + Duration::from_millis(jitter)
			}
			PeerState::Disposed => Duration::from_secs(3600),
		}
	}

	async fn subscribe_if_leader(
		&self,
		state: PeerState,
	) -> Option<broadcast::Receiver<Vec<u8>>> {
		if state != PeerState::Leader {
			return None;
		}
		match self.coordinate.subscribe(&request_topic(&self.actor_id)).await {
			Ok(sub) => Some(sub),
			Err(err) => {
				tracing::error!(%err, "failed to subscribe to relay request topic");
				None
			}
		}
	}

	async fn become_leader(&mut self) -> Result<()> {
		let handle = ActorInstance::spawn(
			self.actor_id.clone(),
			self.handler.clone(),
			self.persistence.clone(),
			self.actor_config.clone(),
			self.input.clone(),
		)
		.await?;
		self.core = Some(handle);
		Ok(())
	}

	/// `LEADER -> LEADER` on a successful renewal, `LEADER -> DISPOSED` when
	/// the lease was reported invalid: a deposed leader whose lease is
	/// invalid disposes itself rather than demoting to follower.
	async fn renew_or_dispose(&mut self) -> PeerState {
		match self
			.coordinate
			.extend_lease(&self.actor_id, &self.node_id, self.coordinate_config.lease_duration())
			.await
		{
			Ok(true) => PeerState::Leader,
			Ok(false) => {
				tracing::warn!(actor_id = %self.actor_id, "lease invalid on renewal, disposing");
				self.dispose(PeerState::Leader).await
			}
			Err(err) => {
				tracing::error!(%err, "transient error extending lease, retrying next tick");
				PeerState::Leader
			}
		}
	}

	/// `FOLLOWER -> LEADER` on a successful CAS, otherwise stays `FOLLOWER`.
	async fn try_promote(&mut self) -> PeerState {
		match self
			.coordinate
			.attempt_acquire_lease(&self.actor_id, &self.node_id, self.coordinate_config.lease_duration())
			.await
		{
			Ok(Some(_new_leader)) => match self.become_leader().await {
				Ok(()) => PeerState::Leader,
				Err(err) => {
					tracing::error!(%err, "failed to start actor after winning lease");
					PeerState::Follower
				}
			},
			Ok(None) => PeerState::Follower,
			Err(err) => {
				tracing::error!(%err, "transient error attempting lease acquisition");
				PeerState::Follower
			}
		}
	}

	async fn dispose(&mut self, state: PeerState) -> PeerState {
		if state == PeerState::Leader {
			if let Some(core) = self.core.take() {
				core.shutdown().await;
			}
			let _ = self.coordinate.release_lease(&self.actor_id, &self.node_id).await;
		}
		PeerState::Disposed
	}

	async fn handle_relayed_request(&self, raw: Vec<u8>) {
		let envelope: RelayToLeader = match serde_bare::from_slice(&raw) {
			Ok(envelope) => envelope,
			Err(err) => {
				tracing::warn!(%err, "dropping malformed relay request");
				return;
			}
		};
		let Some(core) = &self.core else {
			return;
		};

		match envelope {
			RelayToLeader::Connect {
				conn_id,
				conn_token,
				params,
				auth_data,
				encoding,
			} => {
				let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
				let coordinate = self.coordinate.clone();
				let actor_id = self.actor_id.clone();
				let forward_conn_id = conn_id.clone();
				tokio::spawn(async move {
					while let Some(bytes) = rx.recv().await {
						let frame = RelayToFollower::Frame {
							conn_id: forward_conn_id.clone(),
							bytes,
						};
						if let Ok(encoded) = serde_bare::to_vec(&frame) {
							let _ = coordinate.publish(&response_topic(&actor_id), encoded).await;
						}
					}
				});

				let new_conn = rivetkit_core::NewConnection {
					conn_id: conn_id.clone(),
					conn_token,
					params,
					auth_data,
					encoding,
					transport: rivetkit_core::Transport::WebSocket(tx),
				};
				if let Err(err) = core.create_conn(new_conn).await {
					self.publish_response(RelayToFollower::Closed {
						conn_id,
						reason: err.to_string(),
					})
					.await;
				}
			}
			RelayToLeader::Message {
				conn_id,
				conn_token,
				message,
			} => {
				match core.process_message(conn_id.clone(), conn_token, message).await {
					Ok(Some(response)) => {
						self.publish_response(RelayToFollower::Response {
							conn_id,
							message: response,
						})
						.await;
					}
					Ok(None) => {}
					Err(err) => {
						self.publish_response(RelayToFollower::Closed {
							conn_id,
							reason: err.to_string(),
						})
						.await;
					}
				}
			}
			RelayToLeader::Disconnect { conn_id } => {
				core.remove_conn(conn_id).await;
			}
		}
	}

	async fn publish_response(&self, out: RelayToFollower) {
		match serde_bare::to_vec(&out) {
			Ok(bytes) => {
				if let Err(err) = self
					.coordinate
					.publish(&response_topic(&self.actor_id), bytes)
					.await
				{
					tracing::warn!(%err, "failed to publish relay response");
				}
			}
			Err(err) => tracing::warn!(%err, "failed to encode relay response"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use rivetkit_core::ActorContext;
	use rivetkit_drivers::{InMemoryCoordinateDriver, InMemoryPersistenceDriver};

	struct EchoActor;

	#[async_trait]
	impl ActorHandler for EchoActor {
		fn name(&self) -> &str {
			"echo"
		}

		async fn execute_action(
			&self,
			_ctx: &mut ActorContext<'_>,
			_name: &str,
			args: Vec<WireValue>,
		) -> Result<WireValue> {
			Ok(args.into_iter().next().unwrap_or(WireValue::Null))
		}
	}

	#[tokio::test]
	async fn first_starter_becomes_leader_and_second_stays_follower() {
		let coordinate: Arc<dyn CoordinateDriver> = Arc::new(InMemoryCoordinateDriver::default());
		let persistence: Arc<dyn PersistenceDriver> = Arc::new(InMemoryPersistenceDriver::default());
		let handler: Arc<dyn ActorHandler> = Arc::new(EchoActor);

		let peer_a = ActorPeer::spawn(
			"actor-1".into(),
			"node-a".into(),
			handler.clone(),
			persistence.clone(),
			coordinate.clone(),
			ActorConfig::default(),
			CoordinateConfig::default(),
			None,
		)
		.await
		.unwrap();
		assert_eq!(peer_a.state(), PeerState::Leader);

		let peer_b = ActorPeer::spawn(
			"actor-1".into(),
			"node-b".into(),
			handler,
			persistence,
			coordinate,
			ActorConfig::default(),
			CoordinateConfig::default(),
			None,
		)
		.await
		.unwrap();
		assert_eq!(peer_b.state(), PeerState::Follower);
	}
}
