//! Parameter extraction shared by every inbound surface: an
//! HTTP request carries `x-rivetkit-*` headers, a WebSocket upgrade carries
//! the same fields packed into `Sec-WebSocket-Protocol` since browsers can't
//! set custom headers on a WS handshake. Both funnel into one [`RouteParams`]
//! so the gateway and management handlers don't each re-derive it.

use axum::http::HeaderMap;
use rivetkit_error::{Result, RivetkitError};
use rivetkit_protocol::headers::{
	HEADER_GATEWAY_ACTOR, HEADER_RIVETKIT_AUTH_DATA, HEADER_RIVETKIT_CONN_PARAMS,
	HEADER_RIVETKIT_ENCODING,
};
use rivetkit_protocol::{Encoding, WireValue};

#[derive(Debug, Clone)]
pub struct RouteParams {
	pub actor_id: String,
	pub encoding: Encoding,
	pub conn_params: Option<WireValue>,
	pub auth_data: Option<WireValue>,
}

impl RouteParams {
	/// Extracts routing fields from plain HTTP headers, as set on every
	/// request the edge proxy forwards to a specific actor.
	pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
		let actor_id = header_str(headers, HEADER_GATEWAY_ACTOR)
			.ok_or(RivetkitError::MissingActorHeader)?
			.to_string();
		let encoding = header_str(headers, HEADER_RIVETKIT_ENCODING)
			.map(Encoding::parse)
			.transpose()?
			.unwrap_or(Encoding::Json);
		let conn_params = decode_json_field(header_str(headers, HEADER_RIVETKIT_CONN_PARAMS))?;
		let auth_data = decode_json_field(header_str(headers, HEADER_RIVETKIT_AUTH_DATA))?;

		Ok(RouteParams {
			actor_id,
			encoding,
			conn_params,
			auth_data,
		})
	}

	/// Extracts the same fields from an already-parsed WebSocket sub-protocol
	/// string.
	pub fn from_subprotocol(actor_id: String, params: &SubprotocolFields) -> Result<Self> {
		let encoding = params
			.encoding
			.as_deref()
			.map(Encoding::parse)
			.transpose()?
			.unwrap_or(Encoding::Json);
		let conn_params = decode_json_field(params.conn_params_json.as_deref())?;

		Ok(RouteParams {
			actor_id,
			encoding,
			conn_params,
			auth_data: None,
		})
	}
}

/// The subset of [`rivetkit_protocol::headers::SubprotocolParams`] this
/// module consumes, named here to avoid a second dependency edge back to
/// `rivetkit_protocol` for what is otherwise a type alias.
pub type SubprotocolFields = rivetkit_protocol::headers::SubprotocolParams;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|v| v.to_str().ok())
}

fn decode_json_field(raw: Option<&str>) -> Result<Option<WireValue>> {
	match raw {
		None => Ok(None),
		Some(raw) => {
			let json: serde_json::Value =
				serde_json::from_str(raw).map_err(|err| RivetkitError::MalformedMessage {
					reason: err.to_string(),
				})?;
			Ok(Some(WireValue::from_json(&json)?))
		}
	}
}
