//! One-shot HTTP action dispatch: no connection is kept open, no state
//! survives the call — `onDisconnect` runs immediately after the single
//! action returns.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use rivetkit_coordinate::request_once;
use rivetkit_core::instance::NewConnection;
use rivetkit_core::Transport;
use rivetkit_error::RivetkitError;
use rivetkit_protocol::{ClientMessage, WireValue};

use crate::http_api::ApiError;
use crate::params::RouteParams;
use crate::state::ManagerState;

use super::{local_core, new_conn_id, new_conn_token, peer_for};

const RESPONSE_WAIT: Duration = Duration::from_secs(60);

/// `POST /actors/actions/{name}`: one request, one reply, no
/// transport registered with the actor afterward.
pub async fn invoke_action(
	State(state): State<Arc<ManagerState>>,
	Path(name): Path<String>,
	headers: HeaderMap,
	Json(args): Json<Vec<serde_json::Value>>,
) -> Result<Json<serde_json::Value>, ApiError> {
	let route = RouteParams::from_headers(&headers)?;
	let peer = peer_for(&state, &route.actor_id).await?;

	let args = args
		.iter()
		.map(WireValue::from_json)
		.collect::<rivetkit_error::Result<Vec<_>>>()?;

	let output = match local_core(&peer) {
		Some(core) => {
			let conn_id = new_conn_id();
			core.create_conn(NewConnection {
				conn_id: conn_id.clone(),
				conn_token: new_conn_token(),
				params: route.conn_params,
				auth_data: route.auth_data,
				encoding: route.encoding,
				transport: Transport::Http,
			})
			.await?;
			let result = core.execute_action(Some(conn_id.clone()), name, args).await;
			core.remove_conn(conn_id).await;
			result?
		}
		None => {
			let conn_id = new_conn_id();
			let conn_token = new_conn_token();
			let request_id = 0;
			let message = ClientMessage::ActionRequest {
				request_id,
				name,
				args,
			};
			let response = request_once(
				&state.coordinate_driver,
				&route.actor_id,
				&conn_id,
				&conn_token,
				message,
				RESPONSE_WAIT,
			)
			.await?;
			match response {
				Some(rivetkit_protocol::ServerMessage::ActionResponse { output, .. }) => output,
				Some(rivetkit_protocol::ServerMessage::Error(err)) => {
					return Err(ApiError(RivetkitError::InternalError { message: err.message }));
				}
				_ => return Err(ApiError(RivetkitError::internal("relay timed out waiting for action response"))),
			}
		}
	};

	Ok(Json(output.to_json()))
}
