//! HTTP header names and WebSocket sub-protocol carriage.

use rivetkit_error::RivetkitError;

pub const HEADER_RIVETKIT_QUERY: &str = "x-rivetkit-query";
pub const HEADER_RIVETKIT_ENCODING: &str = "x-rivetkit-encoding";
pub const HEADER_RIVETKIT_CONN_PARAMS: &str = "x-rivetkit-conn-params";
pub const HEADER_RIVETKIT_AUTH_DATA: &str = "x-rivetkit-auth-data";
pub const HEADER_RIVETKIT_ACTOR: &str = "x-rivetkit-actor";
pub const HEADER_RIVETKIT_CONN: &str = "x-rivetkit-conn";
pub const HEADER_RIVETKIT_CONN_TOKEN: &str = "x-rivetkit-conn-token";
pub const HEADER_EXPOSE_INTERNAL_ERROR: &str = "x-rivetkit-expose-internal-error";

pub const HEADER_GATEWAY_TARGET: &str = "x-rivet-target";
pub const HEADER_GATEWAY_ACTOR: &str = "x-rivet-actor";
pub const GATEWAY_TARGET_ACTOR: &str = "actor";

pub const SUBPROTOCOL_STANDARD: &str = "rivetkit.standard";
pub const SUBPROTOCOL_PREFIX_TARGET: &str = "target.";
pub const SUBPROTOCOL_PREFIX_ACTOR: &str = "actor.";
pub const SUBPROTOCOL_PREFIX_ENCODING: &str = "encoding.";
pub const SUBPROTOCOL_PREFIX_CONN_PARAMS: &str = "conn_params.";
pub const SUBPROTOCOL_PREFIX_CONN_ID: &str = "conn_id.";
pub const SUBPROTOCOL_PREFIX_CONN_TOKEN: &str = "conn_token.";
pub const SUBPROTOCOL_PREFIX_TOKEN: &str = "token.";

/// Parameters carried as WebSocket sub-protocols, since browser WebSocket APIs
/// offer no way to set custom HTTP headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubprotocolParams {
	pub standard: bool,
	pub target: Option<String>,
	pub actor_id: Option<String>,
	pub encoding: Option<String>,
	/// URL-decoded JSON, still as a string (decoding into a value is the
	/// caller's job once the encoding is known).
	pub conn_params_json: Option<String>,
	pub conn_id: Option<String>,
	pub conn_token: Option<String>,
	pub token: Option<String>,
}

impl SubprotocolParams {
	/// Parse the comma-separated `Sec-WebSocket-Protocol` request header value.
	pub fn parse(raw: &str) -> Result<Self, RivetkitError> {
		let mut params = SubprotocolParams::default();

		for part in raw.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
			if part == SUBPROTOCOL_STANDARD {
				params.standard = true;
			} else if let Some(rest) = part.strip_prefix(SUBPROTOCOL_PREFIX_TARGET) {
				params.target = Some(rest.to_string());
			} else if let Some(rest) = part.strip_prefix(SUBPROTOCOL_PREFIX_ACTOR) {
				params.actor_id = Some(rest.to_string());
			} else if let Some(rest) = part.strip_prefix(SUBPROTOCOL_PREFIX_ENCODING) {
				params.encoding = Some(rest.to_string());
			} else if let Some(rest) = part.strip_prefix(SUBPROTOCOL_PREFIX_CONN_PARAMS) {
				let decoded = url::form_urlencoded::parse(rest.as_bytes())
					.map(|(k, v)| {
						if v.is_empty() {
							k.into_owned()
						} else {
							format!("{k}={v}")
						}
					})
					.collect::<Vec<_>>()
					.join("");
				// conn_params is a single URL-encoded JSON blob, not form data;
				// `form_urlencoded` only gives us percent-decoding here, so
				// fall back to percent_decode directly for the common case of
				// a single key with no `=`.
				let decoded = if decoded.is_empty() {
					percent_decode(rest)
				} else {
					decoded
				};
				params.conn_params_json = Some(decoded);
			} else if let Some(rest) = part.strip_prefix(SUBPROTOCOL_PREFIX_CONN_ID) {
				params.conn_id = Some(rest.to_string());
			} else if let Some(rest) = part.strip_prefix(SUBPROTOCOL_PREFIX_CONN_TOKEN) {
				params.conn_token = Some(rest.to_string());
			} else if let Some(rest) = part.strip_prefix(SUBPROTOCOL_PREFIX_TOKEN) {
				params.token = Some(rest.to_string());
			}
			// Unknown sub-protocols are ignored rather than rejected, matching
			// the permissive handling of unknown headers elsewhere.
		}

		Ok(params)
	}

	/// Build the response `Sec-WebSocket-Protocol` value: the server must echo
	/// back `rivetkit.standard` if the client offered it.
	pub fn response_value(&self) -> Option<&'static str> {
		self.standard.then_some(SUBPROTOCOL_STANDARD)
	}
}

fn percent_decode(s: &str) -> String {
	url::form_urlencoded::parse(format!("x={s}").as_bytes())
		.next()
		.map(|(_, v)| v.into_owned())
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_all_recognized_prefixes() {
		let raw = format!(
			"{},{}actor,{}abc123,{}json,{}tok,{}cid,{}ctok",
			SUBPROTOCOL_STANDARD,
			SUBPROTOCOL_PREFIX_TARGET,
			SUBPROTOCOL_PREFIX_ACTOR,
			SUBPROTOCOL_PREFIX_ENCODING,
			SUBPROTOCOL_PREFIX_TOKEN,
			SUBPROTOCOL_PREFIX_CONN_ID,
			SUBPROTOCOL_PREFIX_CONN_TOKEN,
		);
		let parsed = SubprotocolParams::parse(&raw).unwrap();
		assert!(parsed.standard);
		assert_eq!(parsed.target.as_deref(), Some("actor"));
		assert_eq!(parsed.actor_id.as_deref(), Some("abc123"));
		assert_eq!(parsed.encoding.as_deref(), Some("json"));
		assert_eq!(parsed.token.as_deref(), Some("tok"));
		assert_eq!(parsed.conn_id.as_deref(), Some("cid"));
		assert_eq!(parsed.conn_token.as_deref(), Some("ctok"));
	}

	#[test]
	fn echoes_standard_marker_only_if_offered() {
		let parsed = SubprotocolParams::parse("target.actor").unwrap();
		assert_eq!(parsed.response_value(), None);

		let parsed = SubprotocolParams::parse("rivetkit.standard,target.actor").unwrap();
		assert_eq!(parsed.response_value(), Some(SUBPROTOCOL_STANDARD));
	}

	#[test]
	fn conn_params_are_url_decoded() {
		let raw = format!(
			"{}%7B%22foo%22%3A1%7D",
			SUBPROTOCOL_PREFIX_CONN_PARAMS
		);
		let parsed = SubprotocolParams::parse(&raw).unwrap();
		assert_eq!(parsed.conn_params_json.as_deref(), Some("{\"foo\":1}"));
	}
}
