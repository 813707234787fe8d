//! The Actor Instance / Lifecycle Engine: one live actor, running
//! single-threaded on its own `tokio::task` behind a private mailbox — no
//! locking in the actor body, all access is through the mailbox.

use rivetkit_config::ActorConfig;
use rivetkit_drivers::PersistenceDriver;
use rivetkit_error::{Result, RivetkitError};
use rivetkit_protocol::persisted::{PersistedConn, PersistedRecord, ScheduleEntry};
use rivetkit_protocol::{ClientMessage, Encoding, ServerMessage, WireValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};

use crate::connection::{Connection, ConnectionRegistry, Transport};
use crate::context::ActorContext;
use crate::hooks::ActorHandler;
use crate::scheduler;

const RECORD_VERSION: u32 = 1;

fn now_ms() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis() as i64
}

/// A connection to register, as handed in by the Manager/Router once
/// `onBeforeConnect` has already run at the edge.
pub struct NewConnection {
	pub conn_id: String,
	pub conn_token: String,
	pub params: Option<WireValue>,
	pub auth_data: Option<WireValue>,
	pub encoding: Encoding,
	pub transport: Transport,
}

enum Command {
	ExecuteAction {
		conn_id: Option<String>,
		name: String,
		args: Vec<WireValue>,
		reply: oneshot::Sender<Result<WireValue>>,
	},
	ProcessMessage {
		conn_id: String,
		conn_token: String,
		message: ClientMessage,
		reply: oneshot::Sender<Result<Option<ServerMessage>>>,
	},
	CreateConn {
		conn: NewConnection,
		reply: oneshot::Sender<Result<()>>,
	},
	RemoveConn {
		conn_id: String,
	},
	SaveState {
		immediate: bool,
		reply: oneshot::Sender<Result<()>>,
	},
	Shutdown,
}

/// A cheaply-cloneable reference to a running actor instance's mailbox.
#[derive(Clone)]
pub struct ActorHandle {
	tx: mpsc::Sender<Command>,
}

impl ActorHandle {
	pub async fn execute_action(
		&self,
		conn_id: Option<String>,
		name: impl Into<String>,
		args: Vec<WireValue>,
	) -> Result<WireValue> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(Command::ExecuteAction {
				conn_id,
				name: name.into(),
				args,
				reply,
			})
			.await
			.map_err(|_| RivetkitError::internal("actor instance is shut down"))?;
		rx.await
			.map_err(|_| RivetkitError::internal("actor instance dropped the reply"))?
	}

	/// Validates `conn_token` against the connection's stored token before
	/// dispatching; mismatches surface as `Err(IncorrectConnToken)` rather
	/// than silently running with an unauthenticated caller.
	pub async fn process_message(
		&self,
		conn_id: impl Into<String>,
		conn_token: impl Into<String>,
		message: ClientMessage,
	) -> Result<Option<ServerMessage>> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(Command::ProcessMessage {
				conn_id: conn_id.into(),
				conn_token: conn_token.into(),
				message,
				reply,
			})
			.await
			.map_err(|_| RivetkitError::internal("actor instance is shut down"))?;
		rx.await
			.map_err(|_| RivetkitError::internal("actor instance dropped the reply"))?
	}

	pub async fn create_conn(&self, conn: NewConnection) -> Result<()> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(Command::CreateConn { conn, reply })
			.await
			.map_err(|_| RivetkitError::internal("actor instance is shut down"))?;
		rx.await
			.map_err(|_| RivetkitError::internal("actor instance dropped the reply"))?
	}

	pub async fn remove_conn(&self, conn_id: impl Into<String>) {
		let _ = self
			.tx
			.send(Command::RemoveConn {
				conn_id: conn_id.into(),
			})
			.await;
	}

	pub async fn save_state(&self, immediate: bool) -> Result<()> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(Command::SaveState { immediate, reply })
			.await
			.map_err(|_| RivetkitError::internal("actor instance is shut down"))?;
		rx.await
			.map_err(|_| RivetkitError::internal("actor instance dropped the reply"))?
	}

	pub async fn shutdown(&self) {
		let _ = self.tx.send(Command::Shutdown).await;
	}
}

/// Owns one actor's live state. Never constructed directly by callers outside
/// this crate — obtain an [`ActorHandle`] via [`ActorInstance::spawn`].
pub struct ActorInstance {
	actor_id: String,
	handler: Arc<dyn ActorHandler>,
	persistence: Arc<dyn PersistenceDriver>,
	config: ActorConfig,

	input: Option<WireValue>,
	state: WireValue,
	vars: HashMap<String, WireValue>,
	conns: ConnectionRegistry,
	schedule: Vec<ScheduleEntry>,
	dirty: bool,
	version: u32,

	rx: mpsc::Receiver<Command>,
}

impl ActorInstance {
	/// Loads (or creates) the actor and spawns its mailbox task, per `onStart`.
	pub async fn spawn(
		actor_id: String,
		handler: Arc<dyn ActorHandler>,
		persistence: Arc<dyn PersistenceDriver>,
		config: ActorConfig,
		input: Option<WireValue>,
	) -> Result<ActorHandle> {
		let existing = persistence.read(&actor_id).await?;

		let (mut record, created) = match existing {
			Some(bytes) => {
				let record: PersistedRecord = serde_bare::from_slice(&bytes).map_err(|err| {
					RivetkitError::MalformedMessage {
						reason: format!("corrupt persisted record for {actor_id}: {err}"),
					}
				})?;
				(record, false)
			}
			None => {
				let mut record = PersistedRecord::new(RECORD_VERSION);
				record.input = input.clone();
				(record, true)
			}
		};

		if created {
			let state = handler.on_create(input.as_ref()).await?;
			record.state = Some(state);
		}

		let state = record.state.clone().unwrap_or(WireValue::Null);
		let mut conns = ConnectionRegistry::default();
		for (conn_id, persisted) in record.conns.clone() {
			conns.insert(Connection {
				conn_id: conn_id.clone(),
				conn_token: persisted.conn_token,
				params: persisted.params,
				auth_data: persisted.auth_data,
				encoding: Encoding::Json,
				// Restored connections come back over plain HTTP polling
				// until the client re-establishes a live transport.
				transport: Transport::Http,
				state: persisted.state,
				subscriptions: record
					.subscriptions
					.get(&conn_id)
					.cloned()
					.unwrap_or_default()
					.into_iter()
					.collect(),
			});
		}

		let (tx, rx) = mpsc::channel(256);

		let mut instance = ActorInstance {
			actor_id,
			handler,
			persistence,
			config,
			input: record.input.clone(),
			state,
			vars: HashMap::new(),
			conns,
			schedule: record.schedule,
			dirty: created,
			version: record.version,
			rx,
		};

		{
			let handler = instance.handler.clone();
			let mut ctx = instance.context(None);
			handler.on_start(&mut ctx).await?;
		}

		tokio::spawn(async move {
			instance.run().await;
		});

		Ok(ActorHandle { tx })
	}

	fn context(&mut self, calling_conn_id: Option<&str>) -> ActorContext<'_> {
		// Lifetimes here are awkward because `calling_conn_id` may alias
		// `self`-owned data; callers always pass a borrow that outlives the
		// context's use, so this transmute-free workaround is just cloning.
		ActorContext::new(
			&self.actor_id,
			self.handler.name(),
			&mut self.state,
			&mut self.vars,
			&mut self.conns,
			&mut self.schedule,
			&mut self.dirty,
			calling_conn_id,
		)
	}

	async fn run(mut self) {
		let save_interval = self.config.state_save_interval();
		let mut save_ticker = tokio::time::interval(save_interval);
		save_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			let sleep_for = match scheduler::earliest(&self.schedule) {
				Some(entry) => scheduler::next_sleep_chunk(entry.due_at, now_ms()),
				None => std::time::Duration::from_secs(3600),
			};

			tokio::select! {
				cmd = self.rx.recv() => {
					match cmd {
						Some(Command::Shutdown) | None => {
							let _ = self.flush().await;
							break;
						}
						Some(cmd) => self.handle_command(cmd).await,
					}
				}
				_ = tokio::time::sleep(sleep_for) => {
					self.fire_due_alarms().await;
				}
				_ = save_ticker.tick() => {
					if self.dirty {
						if let Err(err) = self.flush().await {
							tracing::warn!(actor_id = %self.actor_id, ?err, "periodic state save failed");
						}
					}
				}
			}
		}
	}

	async fn handle_command(&mut self, cmd: Command) {
		match cmd {
			Command::ExecuteAction {
				conn_id,
				name,
				args,
				reply,
			} => {
				let result = self.execute_action(conn_id.as_deref(), &name, args).await;
				let _ = reply.send(result);
			}
			Command::ProcessMessage {
				conn_id,
				conn_token,
				message,
				reply,
			} => {
				let result = self.process_message(&conn_id, &conn_token, message).await;
				let _ = reply.send(result);
			}
			Command::CreateConn { conn, reply } => {
				let result = self.create_conn(conn).await;
				let _ = reply.send(result);
			}
			Command::RemoveConn { conn_id } => {
				self.remove_conn(&conn_id).await;
			}
			Command::SaveState { immediate, reply } => {
				let result = if immediate || self.dirty {
					self.flush().await
				} else {
					Ok(())
				};
				let _ = reply.send(result);
			}
			Command::Shutdown => unreachable!("handled in run()"),
		}
	}

	/// `executeAction`: validate, run with a timeout, let
	/// `onBeforeActionResponse` transform the output, schedule a save.
	async fn execute_action(
		&mut self,
		conn_id: Option<&str>,
		name: &str,
		args: Vec<WireValue>,
	) -> Result<WireValue> {
		let timeout = self.config.action_timeout();
		let handler = self.handler.clone();

		let output = {
			let mut ctx = self.context(conn_id);
			let fut = handler.execute_action(&mut ctx, name, args.clone());
			match tokio::time::timeout(timeout, fut).await {
				Ok(result) => result?,
				Err(_) => {
					return Err(RivetkitError::ActionTimedOut {
						timeout_ms: timeout.as_millis() as u64,
					});
				}
			}
		};

		let transformed = {
			let mut ctx = self.context(conn_id);
			handler
				.on_before_action_response(&mut ctx, name, &args, output)
				.await?
		};

		if self.dirty {
			self.schedule_save();
		}

		Ok(transformed)
	}

	/// `processMessage`: dispatch an inbound wire message. `conn_token` must
	/// match the token stored for `conn_id` at `createConn` time — a caller
	/// that guesses a `conn_id` without the matching token never reaches the
	/// action/subscription dispatch below.
	async fn process_message(
		&mut self,
		conn_id: &str,
		conn_token: &str,
		message: ClientMessage,
	) -> Result<Option<ServerMessage>> {
		match self.conns.get(conn_id) {
			Some(conn) if conn.conn_token == conn_token => {}
			Some(_) => return Err(RivetkitError::IncorrectConnToken),
			None => return Err(RivetkitError::ConnNotFound),
		}

		Ok(match message {
			ClientMessage::ActionRequest {
				request_id,
				name,
				args,
			} => {
				let result = self.execute_action(Some(conn_id), &name, args.clone()).await;
				Some(match result {
					Ok(output) => ServerMessage::ActionResponse { request_id, output },
					Err(err) => ServerMessage::Error(
						rivetkit_protocol::messages::Error::from(&err).with_request_id(request_id),
					),
				})
			}
			ClientMessage::SubscriptionRequest { event, subscribe } => {
				if let Some(conn) = self.conns.get_mut(conn_id) {
					if subscribe {
						conn.subscriptions.insert(event);
					} else {
						conn.subscriptions.remove(&event);
					}
				}
				self.persist_subscriptions(conn_id);
				None
			}
		})
	}

	/// `createConn`: register a new connection, running
	/// `onBeforeConnect`/`onConnect`.
	async fn create_conn(&mut self, new_conn: NewConnection) -> Result<()> {
		let handler = self.handler.clone();
		{
			let mut ctx = self.context(None);
			handler
				.on_before_connect(&mut ctx, new_conn.params.as_ref())
				.await?;
		}

		let conn_id = new_conn.conn_id.clone();
		self.conns.insert(Connection {
			conn_id: conn_id.clone(),
			conn_token: new_conn.conn_token,
			params: new_conn.params,
			auth_data: new_conn.auth_data,
			encoding: new_conn.encoding,
			transport: new_conn.transport,
			state: None,
			subscriptions: Default::default(),
		});

		let result = {
			let mut ctx = self.context(Some(&conn_id));
			handler.on_connect(&mut ctx, &conn_id).await
		};
		if let Err(err) = result {
			self.conns.remove(&conn_id);
			return Err(err);
		}

		self.dirty = true;
		Ok(())
	}

	/// `removeConn`: on transport close or explicit disconnect.
	async fn remove_conn(&mut self, conn_id: &str) {
		if self.conns.remove(conn_id).is_some() {
			let handler = self.handler.clone();
			let mut ctx = self.context(Some(conn_id));
			if let Err(err) = handler.on_disconnect(&mut ctx, conn_id).await {
				tracing::warn!(actor_id = %self.actor_id, conn_id, ?err, "on_disconnect hook failed");
			}
			self.dirty = true;
		}
	}

	fn schedule_save(&mut self) {
		// The periodic `save_ticker` in `run()` already coalesces bursts of
		// mutations into one flush per interval (single-flight); marking
		// dirty here is the entire "schedule a save" step.
		self.dirty = true;
	}

	fn persist_subscriptions(&mut self, conn_id: &str) {
		self.dirty = true;
		let _ = conn_id;
	}

	async fn fire_due_alarms(&mut self) {
		let due = scheduler::due_entries(&self.schedule, now_ms());
		if due.is_empty() {
			return;
		}
		let due_ids: std::collections::HashSet<_> = due.iter().map(|e| e.id.clone()).collect();
		self.schedule.retain(|e| !due_ids.contains(&e.id));
		self.dirty = true;

		let handler = self.handler.clone();
		for entry in due {
			let mut ctx = self.context(None);
			if let Err(err) = handler
				.on_alarm(&mut ctx, &entry.action_name, entry.payload)
				.await
			{
				tracing::error!(actor_id = %self.actor_id, action = %entry.action_name, ?err, "scheduled action failed");
			}
		}

		if let Err(err) = self.flush().await {
			tracing::warn!(actor_id = %self.actor_id, ?err, "state save after alarm failed");
		}
	}

	/// Serialize the full `Persisted Record` and write it atomically.
	async fn flush(&mut self) -> Result<()> {
		if !self.dirty {
			return Ok(());
		}

		self.version = self.version.wrapping_add(1);
		let mut record = PersistedRecord::new(self.version);
		record.input = self.input.clone();
		record.state = Some(self.state.clone());

		for conn in self.conns.iter() {
			record.conns.insert(
				conn.conn_id.clone(),
				PersistedConn {
					params: conn.params.clone(),
					state: conn.state.clone(),
					conn_token: conn.conn_token.clone(),
					auth_data: conn.auth_data.clone(),
				},
			);
			if !conn.subscriptions.is_empty() {
				record.subscriptions.insert(
					conn.conn_id.clone(),
					conn.subscriptions.iter().cloned().collect(),
				);
			}
		}
		record.schedule = self.schedule.clone();

		let bytes = serde_bare::to_vec(&record).map_err(RivetkitError::internal)?;
		self.persistence.write(&self.actor_id, bytes).await?;
		self.dirty = false;

		let handler = self.handler.clone();
		let state_snapshot = self.state.clone();
		let mut ctx = self.context(None);
		handler.on_state_change(&mut ctx, &state_snapshot).await;

		Ok(())
	}
}
