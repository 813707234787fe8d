//! WebSocket gateway: the only transport that supports a live two-way event
//! stream. Sub-protocol routing exists because browsers can't set the
//! `x-rivetkit-*` headers the plain-HTTP surfaces use.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use rivetkit_coordinate::relay::RelayEvent;
use rivetkit_coordinate::RelayConnection;
use rivetkit_core::instance::NewConnection;
use rivetkit_core::Transport;
use rivetkit_error::RivetkitError;
use rivetkit_protocol::headers::SubprotocolParams;
use rivetkit_protocol::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;

use crate::http_api::ApiError;
use crate::params::RouteParams;
use crate::state::ManagerState;

use super::{check_size, local_core, new_conn_id, new_conn_token, peer_for};

const SEC_WEBSOCKET_PROTOCOL: &str = "sec-websocket-protocol";

pub async fn upgrade(
	State(state): State<Arc<ManagerState>>,
	headers: HeaderMap,
	ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
	let raw = headers
		.get(SEC_WEBSOCKET_PROTOCOL)
		.and_then(|v| v.to_str().ok())
		.unwrap_or_default();
	let offered = SubprotocolParams::parse(raw)?;
	let actor_id = offered
		.actor_id
		.clone()
		.ok_or(RivetkitError::MissingActorHeader)?;
	let route = RouteParams::from_subprotocol(actor_id, &offered)?;
	let ws = match offered.response_value() {
		Some(protocol) => ws.protocols([protocol]),
		None => ws,
	};

	Ok(ws.on_upgrade(move |socket| async move {
		if let Err(err) = run(state, socket, route).await {
			tracing::warn!(?err, "websocket connection ended with error");
		}
	}))
}

async fn run(state: Arc<ManagerState>, socket: WebSocket, route: RouteParams) -> rivetkit_error::Result<()> {
	let peer = peer_for(&state, &route.actor_id).await?;
	let conn_id = new_conn_id();
	let conn_token = new_conn_token();
	let limit = state.config.protocol.max_incoming_message_size();

	match local_core(&peer) {
		Some(core) => {
			let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
			core.create_conn(NewConnection {
				conn_id: conn_id.clone(),
				conn_token: conn_token.clone(),
				params: route.conn_params,
				auth_data: route.auth_data,
				encoding: route.encoding,
				transport: Transport::WebSocket(tx),
			})
			.await?;

			let (mut sink, mut stream) = socket.split();
			loop {
				tokio::select! {
					inbound = stream.next() => {
						match inbound {
							Some(Ok(Message::Binary(bytes))) => {
								if handle_inbound(&mut sink, &bytes, limit, route.encoding, |msg| {
									let core = core.clone();
									let conn_id = conn_id.clone();
									let conn_token = conn_token.clone();
									async move { core.process_message(conn_id, conn_token, msg).await }
								}).await.is_break() {
									break;
								}
							}
							Some(Ok(Message::Close(_))) | None => break,
							Some(Ok(_)) => {}
							Some(Err(err)) => {
								tracing::warn!(%err, "websocket read error");
								break;
							}
						}
					}
					outbound = rx.recv() => {
						match outbound {
							Some(bytes) => {
								if send_binary(&mut sink, bytes).await.is_err() {
									break;
								}
							}
							None => break,
						}
					}
				}
			}
			core.remove_conn(conn_id).await;
		}
		None => {
			let (relay, mut events) = RelayConnection::open(
				state.coordinate_driver.clone(),
				route.actor_id.clone(),
				conn_id,
				conn_token,
				route.conn_params,
				route.auth_data,
				route.encoding,
			)
			.await?;

			let (mut sink, mut stream) = socket.split();
			loop {
				tokio::select! {
					inbound = stream.next() => {
						match inbound {
							Some(Ok(Message::Binary(bytes))) => {
								if let Err(err) = check_size(&bytes, limit) {
									send_error(&mut sink, route.encoding, &err, None).await;
									continue;
								}
								match ClientMessage::decode(&bytes, route.encoding) {
									Ok(message) => {
										if relay.send_to_leader(message).await.is_err() {
											break;
										}
									}
									Err(err) => send_error(&mut sink, route.encoding, &err, None).await,
								}
							}
							Some(Ok(Message::Close(_))) | None => break,
							Some(Ok(_)) => {}
							Some(Err(err)) => {
								tracing::warn!(%err, "websocket read error");
								break;
							}
						}
					}
					event = events.recv() => {
						match event {
							Some(RelayEvent::Message(message)) => {
								let Ok(bytes) = message.encode(route.encoding) else { continue };
								if send_binary(&mut sink, bytes).await.is_err() {
									break;
								}
							}
							Some(RelayEvent::Frame(bytes)) => {
								if send_binary(&mut sink, bytes).await.is_err() {
									break;
								}
							}
							Some(RelayEvent::Closed(_)) | None => break,
						}
					}
				}
			}
			drop(relay);
		}
	}

	Ok(())
}

type Sink = futures_util::stream::SplitSink<WebSocket, Message>;

async fn send_binary(sink: &mut Sink, bytes: Vec<u8>) -> Result<(), axum::Error> {
	sink.send(Message::Binary(bytes)).await
}

async fn send_error(
	sink: &mut Sink,
	encoding: rivetkit_protocol::Encoding,
	err: &RivetkitError,
	request_id: Option<u32>,
) {
	let mut wire = rivetkit_protocol::ProtocolError::from(err);
	if let Some(id) = request_id {
		wire = wire.with_request_id(id);
	}
	if let Ok(bytes) = ServerMessage::Error(wire).encode(encoding) {
		let _ = send_binary(sink, bytes).await;
	}
}

enum LoopSignal {
	Continue,
	Break,
}

impl LoopSignal {
	fn is_break(&self) -> bool {
		matches!(self, LoopSignal::Break)
	}
}

async fn handle_inbound<F, Fut>(
	sink: &mut Sink,
	bytes: &[u8],
	limit: usize,
	encoding: rivetkit_protocol::Encoding,
	dispatch: F,
) -> LoopSignal
where
	F: FnOnce(ClientMessage) -> Fut,
	Fut: std::future::Future<Output = rivetkit_error::Result<Option<ServerMessage>>>,
{
	if let Err(err) = check_size(bytes, limit) {
		send_error(sink, encoding, &err, None).await;
		return LoopSignal::Continue;
	}
	let message = match ClientMessage::decode(bytes, encoding) {
		Ok(message) => message,
		Err(err) => {
			send_error(sink, encoding, &err, None).await;
			return LoopSignal::Continue;
		}
	};
	match dispatch(message).await {
		Ok(Some(response)) => {
			if let Ok(bytes) = response.encode(encoding) {
				if send_binary(sink, bytes).await.is_err() {
					return LoopSignal::Break;
				}
			}
			LoopSignal::Continue
		}
		Ok(None) => LoopSignal::Continue,
		Err(err @ RivetkitError::IncorrectConnToken) | Err(err @ RivetkitError::ConnNotFound) => {
			send_error(sink, encoding, &err, None).await;
			LoopSignal::Break
		}
		Err(err) => {
			send_error(sink, encoding, &err, None).await;
			LoopSignal::Continue
		}
	}
}
