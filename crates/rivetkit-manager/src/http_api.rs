//! Management API: actor discovery and creation, the only surface that
//! talks to the [`rivetkit_drivers::ManagerDriver`] directory rather than a
//! specific actor's live state.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Json, http::StatusCode};
use rivetkit_drivers::{ActorRecord, CreateActorInput};
use rivetkit_error::{Result, RivetkitError};
use rivetkit_protocol::WireValue;
use serde::{Deserialize, Serialize};

use crate::state::ManagerState;

/// The full actor record as handed back in a `{actor: ...}` envelope, i.e.
/// everything `ActorRecord` carries.
#[derive(Debug, Serialize)]
pub struct ActorView {
	pub actor_id: String,
	pub name: String,
	pub key: Vec<String>,
	pub namespace_id: String,
	pub runner_name_selector: Option<String>,
	pub create_ts: i64,
	pub connectable_ts: Option<i64>,
	pub destroy_ts: Option<i64>,
	pub sleep_ts: Option<i64>,
	pub start_ts: Option<i64>,
}

impl From<ActorRecord> for ActorView {
	fn from(record: ActorRecord) -> Self {
		ActorView {
			actor_id: record.actor_id,
			name: record.name,
			key: record.key,
			namespace_id: record.namespace_id,
			runner_name_selector: record.runner_name_selector,
			create_ts: record.create_ts,
			connectable_ts: record.connectable_ts,
			destroy_ts: record.destroy_ts,
			sleep_ts: record.sleep_ts,
			start_ts: record.start_ts,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct ActorEnvelope {
	pub actor: ActorView,
}

impl From<ActorRecord> for ActorEnvelope {
	fn from(record: ActorRecord) -> Self {
		ActorEnvelope { actor: record.into() }
	}
}

#[derive(Debug, Serialize)]
pub struct ByIdResponse {
	pub actor_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetOrCreateResponse {
	pub actor_id: String,
	pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct ByIdQuery {
	pub name: String,
	#[serde(default)]
	pub key: Vec<String>,
}

/// `GET /actors/by-id?name&key`: lookup-only, `{actor_id: null}` if absent
/// rather than a 404 — callers use this to probe for existence.
pub async fn get_by_id(
	State(state): State<Arc<ManagerState>>,
	Query(query): Query<ByIdQuery>,
) -> std::result::Result<Json<ByIdResponse>, ApiError> {
	let record = state.manager_driver.get_with_key(&query.name, &query.key).await?;
	Ok(Json(ByIdResponse {
		actor_id: record.map(|r| r.actor_id),
	}))
}

#[derive(Debug, Deserialize)]
pub struct GetOrCreateBody {
	pub name: String,
	#[serde(default)]
	pub key: Vec<String>,
	#[serde(default)]
	pub input: Option<serde_json::Value>,
	#[serde(default)]
	pub runner_name_selector: Option<String>,
	#[serde(default)]
	pub crash_policy: Option<String>,
}

/// `PUT /actors/by-id`: idempotent get-or-create.
pub async fn put_by_id(
	State(state): State<Arc<ManagerState>>,
	Json(body): Json<GetOrCreateBody>,
) -> std::result::Result<Json<GetOrCreateResponse>, ApiError> {
	let input = decode_creation_input(body.input.as_ref())?;
	let (record, created) = state
		.manager_driver
		.get_or_create_with_key(CreateActorInput {
			name: body.name,
			key: body.key,
			input: encode_for_directory(input.as_ref())?,
			runner_name_selector: body.runner_name_selector,
			crash_policy: body.crash_policy,
		})
		.await?;
	if created {
		state.stash_input(&record.actor_id, input);
	}
	Ok(Json(GetOrCreateResponse {
		actor_id: record.actor_id,
		created,
	}))
}

/// `GET /actors/{id}`: lookup by actor id.
pub async fn get_actor(
	State(state): State<Arc<ManagerState>>,
	axum::extract::Path(actor_id): axum::extract::Path<String>,
) -> std::result::Result<Json<ActorEnvelope>, ApiError> {
	let record = state
		.manager_driver
		.get_for_id(&actor_id)
		.await?
		.ok_or(RivetkitError::ActorNotFound)?;
	Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
	pub name: String,
	#[serde(default)]
	pub key: Vec<String>,
	#[serde(default)]
	pub input: Option<serde_json::Value>,
	#[serde(default)]
	pub runner_name_selector: Option<String>,
	#[serde(default)]
	pub crash_policy: Option<String>,
}

/// `POST /actors`: explicit creation, errors on a `(name, key)`
/// collision instead of returning the existing record.
pub async fn create_actor(
	State(state): State<Arc<ManagerState>>,
	Json(body): Json<CreateBody>,
) -> std::result::Result<(StatusCode, Json<ActorEnvelope>), ApiError> {
	let input = decode_creation_input(body.input.as_ref())?;
	let record = state
		.manager_driver
		.create(CreateActorInput {
			name: body.name,
			key: body.key,
			input: encode_for_directory(input.as_ref())?,
			runner_name_selector: body.runner_name_selector,
			crash_policy: body.crash_policy,
		})
		.await?;
	state.stash_input(&record.actor_id, input);
	Ok((StatusCode::CREATED, Json(record.into())))
}

/// `GET /`: a terse liveness banner, not meant to be parsed.
pub async fn root() -> &'static str {
	"rivetkit manager"
}

/// `GET /health`.
pub async fn health() -> StatusCode {
	StatusCode::OK
}

fn decode_creation_input(input: Option<&serde_json::Value>) -> Result<Option<WireValue>> {
	input.map(WireValue::from_json).transpose()
}

/// The manager driver's directory only has room for opaque bytes, not a
/// typed value, so creation input is carried there BARE-encoded and decoded
/// back once the actor's peer actually materializes.
fn encode_for_directory(input: Option<&WireValue>) -> Result<Option<Vec<u8>>> {
	input
		.map(|value| value.encode(rivetkit_protocol::Encoding::Bare))
		.transpose()
}

/// Wraps [`RivetkitError`] so handlers can return it directly and still get
/// the right HTTP status.
pub struct ApiError(pub RivetkitError);

impl From<RivetkitError> for ApiError {
	fn from(err: RivetkitError) -> Self {
		ApiError(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let body = Json(rivetkit_protocol::ProtocolError::from(&self.0));
		(status, body).into_response()
	}
}
