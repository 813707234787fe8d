//! Typed error kinds shared by every layer of the actor runtime.
//!
//! Each variant corresponds to exactly one wire `code` (see the `Error` message in
//! `rivetkit-protocol`) and to exactly one row of the error table in the spec. Call
//! sites should prefer constructing one of these variants over bubbling up an
//! `anyhow::Error`; `anyhow` is still used for internal plumbing (driver calls, hook
//! dispatch) and converted to a [`RivetkitError`] at the boundary where a response is
//! produced.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, thiserror::Error, Clone, Serialize, Deserialize)]
pub enum RivetkitError {
	#[error("unauthorized")]
	Unauthorized,

	#[error("actor not found")]
	ActorNotFound,

	#[error("missing actor routing header")]
	MissingActorHeader,

	#[error("message too long: {size} bytes exceeds limit of {limit} bytes")]
	MessageTooLong { size: usize, limit: usize },

	#[error("malformed message: {reason}")]
	MalformedMessage { reason: String },

	#[error("unsupported feature: {feature}")]
	Unsupported { feature: String },

	#[error("action timed out after {timeout_ms}ms")]
	ActionTimedOut { timeout_ms: u64 },

	#[error("incorrect connection token")]
	IncorrectConnToken,

	#[error("connection not found")]
	ConnNotFound,

	#[error("websockets not enabled on this transport")]
	WebSocketsNotEnabled,

	#[error("action '{name}' not found on actor '{actor_name}'")]
	ActionNotFound { actor_name: String, name: String },

	#[error("internal error: {message}")]
	InternalError { message: String },
}

impl RivetkitError {
	/// The stable wire code sent to clients, e.g. in the `Error{c, m}` protocol frame.
	pub fn code(&self) -> &'static str {
		match self {
			RivetkitError::Unauthorized => "unauthorized",
			RivetkitError::ActorNotFound => "actor_not_found",
			RivetkitError::MissingActorHeader => "missing_actor_header",
			RivetkitError::MessageTooLong { .. } => "message_too_long",
			RivetkitError::MalformedMessage { .. } => "malformed_message",
			RivetkitError::Unsupported { .. } => "unsupported",
			RivetkitError::ActionTimedOut { .. } => "action_timed_out",
			RivetkitError::IncorrectConnToken => "incorrect_conn_token",
			RivetkitError::ConnNotFound => "conn_not_found",
			RivetkitError::WebSocketsNotEnabled => "websockets_not_enabled",
			RivetkitError::ActionNotFound { .. } => "action_not_found",
			RivetkitError::InternalError { .. } => "internal_error",
		}
	}

	/// True if this error can be reported back on a still-open connection
	/// without tearing the transport down.
	pub fn recoverable(&self) -> bool {
		matches!(
			self,
			RivetkitError::MessageTooLong { .. }
				| RivetkitError::MalformedMessage { .. }
				| RivetkitError::ActionTimedOut { .. }
		)
	}

	/// HTTP status this error maps to when surfaced over the manager/router HTTP
	/// surface.
	pub fn http_status(&self) -> u16 {
		match self {
			RivetkitError::Unauthorized => 401,
			RivetkitError::ActorNotFound => 404,
			RivetkitError::MissingActorHeader => 400,
			RivetkitError::MessageTooLong { .. } => 400,
			RivetkitError::MalformedMessage { .. } => 400,
			RivetkitError::Unsupported { .. } => 501,
			RivetkitError::ActionTimedOut { .. } => 504,
			RivetkitError::IncorrectConnToken => 403,
			RivetkitError::ConnNotFound => 404,
			RivetkitError::WebSocketsNotEnabled => 400,
			RivetkitError::ActionNotFound { .. } => 404,
			RivetkitError::InternalError { .. } => 500,
		}
	}

	/// WebSocket close code used when this error terminates a connection outright.
	pub fn ws_close_code(&self) -> u16 {
		match self {
			RivetkitError::Unauthorized => 4401,
			RivetkitError::IncorrectConnToken => 4403,
			_ => 1011,
		}
	}

	pub fn internal(message: impl fmt::Display) -> Self {
		RivetkitError::InternalError {
			message: message.to_string(),
		}
	}
}

impl From<anyhow::Error> for RivetkitError {
	fn from(err: anyhow::Error) -> Self {
		RivetkitError::internal(err)
	}
}

pub type Result<T> = std::result::Result<T, RivetkitError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_stable() {
		assert_eq!(RivetkitError::Unauthorized.code(), "unauthorized");
		assert_eq!(RivetkitError::ActorNotFound.code(), "actor_not_found");
		assert_eq!(
			RivetkitError::MessageTooLong { size: 1, limit: 1 }.code(),
			"message_too_long"
		);
	}

	#[test]
	fn recoverable_matches_spec_table() {
		assert!(RivetkitError::MessageTooLong { size: 1, limit: 1 }.recoverable());
		assert!(RivetkitError::MalformedMessage {
			reason: "x".into()
		}
		.recoverable());
		assert!(!RivetkitError::Unauthorized.recoverable());
		assert!(!RivetkitError::ActorNotFound.recoverable());
	}

	#[test]
	fn http_status_mapping() {
		assert_eq!(RivetkitError::ActorNotFound.http_status(), 404);
		assert_eq!(RivetkitError::Unauthorized.http_status(), 401);
		assert_eq!(RivetkitError::IncorrectConnToken.http_status(), 403);
	}
}
