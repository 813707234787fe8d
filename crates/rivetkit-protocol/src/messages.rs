//! Inbound/outbound protocol messages.
//!
//! `ClientMessage`/`ServerMessage` are internally tagged (`tag = "type"`) so
//! `json` and `cbor` carry them as a self-describing object with a `"type"`
//! discriminant. `bare` has no such thing — it is not self-describing, so its
//! `Deserializer` can't buffer an internally-tagged enum the way `serde_json`
//! and `ciborium` can. Frames on a `bare` connection are therefore carried as
//! the externally-tagged [`BareClientMessage`]/[`BareServerMessage`] mirrors
//! below, which `serde_bare` encodes as a plain variant index plus payload.

use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;
use crate::value::WireValue;
use rivetkit_error::RivetkitError;

/// Client → actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
	/// `{i: requestId, n: name, a: args[]}`
	#[serde(rename = "action")]
	ActionRequest {
		#[serde(rename = "i")]
		request_id: u32,
		#[serde(rename = "n")]
		name: String,
		#[serde(rename = "a")]
		args: Vec<WireValue>,
	},
	/// `{e: eventName, s: subscribe}`
	#[serde(rename = "subscription")]
	SubscriptionRequest {
		#[serde(rename = "e")]
		event: String,
		#[serde(rename = "s")]
		subscribe: bool,
	},
}

/// Actor → client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
	#[serde(rename = "action_response")]
	ActionResponse {
		#[serde(rename = "i")]
		request_id: u32,
		#[serde(rename = "o")]
		output: WireValue,
	},
	#[serde(rename = "event")]
	Event {
		#[serde(rename = "en")]
		event_name: String,
		#[serde(rename = "a")]
		args: Vec<WireValue>,
	},
	#[serde(rename = "error")]
	Error(Error),
}

/// Externally-tagged mirror of [`ClientMessage`] for the `bare` encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BareClientMessage {
	ActionRequest {
		request_id: u32,
		name: String,
		args: Vec<WireValue>,
	},
	SubscriptionRequest {
		event: String,
		subscribe: bool,
	},
}

impl From<ClientMessage> for BareClientMessage {
	fn from(msg: ClientMessage) -> Self {
		match msg {
			ClientMessage::ActionRequest {
				request_id,
				name,
				args,
			} => BareClientMessage::ActionRequest {
				request_id,
				name,
				args,
			},
			ClientMessage::SubscriptionRequest { event, subscribe } => {
				BareClientMessage::SubscriptionRequest { event, subscribe }
			}
		}
	}
}

impl From<BareClientMessage> for ClientMessage {
	fn from(msg: BareClientMessage) -> Self {
		match msg {
			BareClientMessage::ActionRequest {
				request_id,
				name,
				args,
			} => ClientMessage::ActionRequest {
				request_id,
				name,
				args,
			},
			BareClientMessage::SubscriptionRequest { event, subscribe } => {
				ClientMessage::SubscriptionRequest { event, subscribe }
			}
		}
	}
}

/// Externally-tagged mirror of [`ServerMessage`] for the `bare` encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BareServerMessage {
	ActionResponse { request_id: u32, output: WireValue },
	Event { event_name: String, args: Vec<WireValue> },
	Error(Error),
}

impl From<ServerMessage> for BareServerMessage {
	fn from(msg: ServerMessage) -> Self {
		match msg {
			ServerMessage::ActionResponse { request_id, output } => {
				BareServerMessage::ActionResponse { request_id, output }
			}
			ServerMessage::Event { event_name, args } => {
				BareServerMessage::Event { event_name, args }
			}
			ServerMessage::Error(err) => BareServerMessage::Error(err),
		}
	}
}

impl From<BareServerMessage> for ServerMessage {
	fn from(msg: BareServerMessage) -> Self {
		match msg {
			BareServerMessage::ActionResponse { request_id, output } => {
				ServerMessage::ActionResponse { request_id, output }
			}
			BareServerMessage::Event { event_name, args } => {
				ServerMessage::Event { event_name, args }
			}
			BareServerMessage::Error(err) => ServerMessage::Error(err),
		}
	}
}

impl ClientMessage {
	pub fn encode(self, encoding: Encoding) -> Result<Vec<u8>, RivetkitError> {
		match encoding {
			Encoding::Json => serde_json::to_vec(&self).map_err(RivetkitError::internal),
			Encoding::Cbor => {
				let mut buf = Vec::new();
				ciborium::into_writer(&self, &mut buf).map_err(RivetkitError::internal)?;
				Ok(buf)
			}
			Encoding::Bare => {
				serde_bare::to_vec(&BareClientMessage::from(self)).map_err(RivetkitError::internal)
			}
		}
	}

	pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<Self, RivetkitError> {
		let malformed = |reason: String| RivetkitError::MalformedMessage { reason };
		match encoding {
			Encoding::Json => {
				serde_json::from_slice(bytes).map_err(|err| malformed(err.to_string()))
			}
			Encoding::Cbor => ciborium::from_reader(bytes).map_err(|err| malformed(err.to_string())),
			Encoding::Bare => serde_bare::from_slice::<BareClientMessage>(bytes)
				.map(ClientMessage::from)
				.map_err(|err| malformed(err.to_string())),
		}
	}
}

impl ServerMessage {
	pub fn encode(self, encoding: Encoding) -> Result<Vec<u8>, RivetkitError> {
		match encoding {
			Encoding::Json => serde_json::to_vec(&self).map_err(RivetkitError::internal),
			Encoding::Cbor => {
				let mut buf = Vec::new();
				ciborium::into_writer(&self, &mut buf).map_err(RivetkitError::internal)?;
				Ok(buf)
			}
			Encoding::Bare => {
				serde_bare::to_vec(&BareServerMessage::from(self)).map_err(RivetkitError::internal)
			}
		}
	}

	pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<Self, RivetkitError> {
		let malformed = |reason: String| RivetkitError::MalformedMessage { reason };
		match encoding {
			Encoding::Json => {
				serde_json::from_slice(bytes).map_err(|err| malformed(err.to_string()))
			}
			Encoding::Cbor => ciborium::from_reader(bytes).map_err(|err| malformed(err.to_string())),
			Encoding::Bare => serde_bare::from_slice::<BareServerMessage>(bytes)
				.map(ServerMessage::from)
				.map_err(|err| malformed(err.to_string())),
		}
	}
}

/// `{c: code, m: message, md: metadata, ai: requestId}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
	#[serde(rename = "c")]
	pub code: String,
	#[serde(rename = "m")]
	pub message: String,
	#[serde(rename = "md", default, skip_serializing_if = "Option::is_none")]
	pub metadata: Option<WireValue>,
	#[serde(rename = "ai", default, skip_serializing_if = "Option::is_none")]
	pub request_id: Option<u32>,
}

impl From<&rivetkit_error::RivetkitError> for Error {
	fn from(err: &rivetkit_error::RivetkitError) -> Self {
		Error {
			code: err.code().to_string(),
			message: err.to_string(),
			metadata: None,
			request_id: None,
		}
	}
}

impl Error {
	pub fn with_request_id(mut self, request_id: u32) -> Self {
		self.request_id = Some(request_id);
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::encoding::Encoding;

	#[test]
	fn action_request_round_trips_over_json() {
		let msg = ClientMessage::ActionRequest {
			request_id: 1,
			name: "increment".into(),
			args: vec![WireValue::Int(5)],
		};
		let json = serde_json::to_value(&msg).unwrap();
		let decoded: ClientMessage = serde_json::from_value(json).unwrap();
		match decoded {
			ClientMessage::ActionRequest {
				request_id, name, ..
			} => {
				assert_eq!(request_id, 1);
				assert_eq!(name, "increment");
			}
			_ => panic!("wrong variant"),
		}
	}

	#[test]
	fn error_converts_from_rivetkit_error() {
		let err = rivetkit_error::RivetkitError::ActionTimedOut { timeout_ms: 60_000 };
		let wire: Error = (&err).into();
		assert_eq!(wire.code, "action_timed_out");
	}

	#[test]
	fn subscription_request_round_trips_over_bare() {
		let msg = ClientMessage::SubscriptionRequest {
			event: "newCount".into(),
			subscribe: true,
		};
		let bytes = msg.clone().encode(Encoding::Bare).unwrap();
		let decoded = ClientMessage::decode(&bytes, Encoding::Bare).unwrap();
		match decoded {
			ClientMessage::SubscriptionRequest { event, subscribe } => {
				assert_eq!(event, "newCount");
				assert!(subscribe);
			}
			_ => panic!("wrong variant"),
		}
	}

	#[test]
	fn action_response_round_trips_over_all_encodings() {
		let msg = ServerMessage::ActionResponse {
			request_id: 9,
			output: WireValue::Int(5),
		};
		for encoding in [Encoding::Json, Encoding::Cbor, Encoding::Bare] {
			let bytes = msg.clone().encode(encoding).unwrap();
			let decoded = ServerMessage::decode(&bytes, encoding).unwrap();
			match decoded {
				ServerMessage::ActionResponse { request_id, output } => {
					assert_eq!(request_id, 9);
					assert_eq!(output, WireValue::Int(5));
				}
				_ => panic!("wrong variant for encoding {encoding}"),
			}
		}
	}
}
