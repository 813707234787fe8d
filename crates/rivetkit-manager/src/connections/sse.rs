//! Server-Sent Events gateway: one-directional push, paired with a
//! side-channel HTTP POST for the client's inbound messages, for clients that
//! can't (or won't) open a WebSocket.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use base64::Engine;
use rivetkit_coordinate::relay::RelayEvent;
use rivetkit_coordinate::{request_once, RelayConnection};
use rivetkit_core::instance::NewConnection;
use rivetkit_core::Transport;
use rivetkit_error::{Result, RivetkitError};
use rivetkit_protocol::headers::{HEADER_RIVETKIT_CONN, HEADER_RIVETKIT_CONN_TOKEN, HEADER_RIVETKIT_ENCODING};
use rivetkit_protocol::{ClientMessage, Encoding};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt as _;

use crate::http_api::ApiError;
use crate::params::RouteParams;
use crate::state::ManagerState;

use super::{local_core, new_conn_id, new_conn_token, peer_for};

const RESPONSE_WAIT: Duration = Duration::from_secs(30);

/// `GET /actors/connections/sse`: opens the push half. The first
/// event always carries the `conn_id`/`conn_token` the client must echo on
/// every `POST /actors/connections/message`.
pub async fn connect(
	State(state): State<Arc<ManagerState>>,
	headers: HeaderMap,
) -> std::result::Result<Sse<impl futures_util::Stream<Item = std::result::Result<Event, Infallible>>>, ApiError> {
	let route = RouteParams::from_headers(&headers)?;
	let peer = peer_for(&state, &route.actor_id).await?;
	let conn_id = new_conn_id();
	let conn_token = new_conn_token();

	let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();

	match local_core(&peer) {
		Some(core) => {
			core.create_conn(NewConnection {
				conn_id: conn_id.clone(),
				conn_token: conn_token.clone(),
				params: route.conn_params,
				auth_data: route.auth_data,
				encoding: route.encoding,
				transport: Transport::Sse(tx),
			})
			.await?;
		}
		None => {
			let encoding = route.encoding;
			let (relay, mut events) = RelayConnection::open(
				state.coordinate_driver.clone(),
				route.actor_id.clone(),
				conn_id.clone(),
				conn_token.clone(),
				route.conn_params,
				route.auth_data,
				encoding,
			)
			.await?;

			// The relay's own forwarder already turned leader replies into
			// `RelayEvent`s; re-encode those onto the same byte channel
			// `Transport::Sse` would have used so the stream below is
			// transport-agnostic. `relay` must outlive the pump or its
			// `Drop` (which tells the leader to disconnect) fires early.
			tokio::spawn(async move {
				let _relay = relay;
				while let Some(event) = events.recv().await {
					let bytes = match event {
						RelayEvent::Message(message) => match message.encode(encoding) {
							Ok(bytes) => bytes,
							Err(_) => continue,
						},
						RelayEvent::Frame(bytes) => bytes,
						RelayEvent::Closed(_) => break,
					};
					if tx.send(bytes).is_err() {
						break;
					}
				}
			});
		}
	}

	let stream = UnboundedReceiverStream::new(rx).map(|bytes| {
		Ok(Event::default()
			.event("message")
			.data(base64::engine::general_purpose::STANDARD.encode(bytes)))
	});
	let opener = Event::default()
		.event("rivetkit-connection")
		.data(format!(r#"{{"connId":"{conn_id}","connToken":"{conn_token}"}}"#));
	let stream = tokio_stream::once(Ok(opener)).chain(stream);

	Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Debug, serde::Serialize)]
pub struct MessageResponse {
	#[serde(skip_serializing_if = "Option::is_none")]
	response: Option<serde_json::Value>,
}

/// `POST /actors/connections/message`: the inbound half of an SSE
/// connection. The reply (if the message was an action request) comes back
/// directly in this response rather than over the push stream.
pub async fn post_message(
	State(state): State<Arc<ManagerState>>,
	headers: HeaderMap,
	body: axum::body::Bytes,
) -> std::result::Result<Json<MessageResponse>, ApiError> {
	let route = RouteParams::from_headers(&headers)?;
	let conn_id = header_str(&headers, HEADER_RIVETKIT_CONN)
		.ok_or_else(|| RivetkitError::internal("missing conn id header"))?
		.to_string();
	let conn_token = header_str(&headers, HEADER_RIVETKIT_CONN_TOKEN)
		.ok_or(RivetkitError::IncorrectConnToken)?
		.to_string();
	let encoding = header_str(&headers, HEADER_RIVETKIT_ENCODING)
		.map(Encoding::parse)
		.transpose()?
		.unwrap_or(Encoding::Json);

	let message = ClientMessage::decode(&body, encoding)?;

	let peer = peer_for(&state, &route.actor_id).await?;
	let response = match local_core(&peer) {
		Some(core) => core.process_message(conn_id, conn_token.clone(), message).await?,
		None => request_once(
			&state.coordinate_driver,
			&route.actor_id,
			&conn_id,
			&conn_token,
			message,
			RESPONSE_WAIT,
		)
		.await?,
	};

	Ok(Json(MessageResponse {
		response: response.map(|msg| msg.encode(Encoding::Json)).transpose()?.map(|bytes| {
			serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
		}),
	}))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|v| v.to_str().ok())
}
