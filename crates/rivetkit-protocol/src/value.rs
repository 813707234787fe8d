//! [`WireValue`]: a dynamically-typed value that can cross all three encodings
//! while preserving the types JSON can't natively express (`BigInt`, binary
//! blobs).
//!
//! `Cbor` and `Bare` have native binary and big-integer support, so `WireValue`
//! round-trips through them via an ordinary tagged `serde` derive. `Json` does
//! not, so it gets a hand-written codec with a `$`-prefixed tag convention: a
//! binary blob becomes `{"$bytes": "<base64>"}`, a big integer becomes
//! `{"$bigint": "<decimal>"}`, and a user string that itself starts with one
//! or more `$` characters is escaped by doubling its leading `$` run.

use rivetkit_error::RivetkitError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::encoding::Encoding;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	BigInt(i128),
	Bytes(Vec<u8>),
	String(String),
	Array(Vec<WireValue>),
	Map(Vec<(String, WireValue)>),
}

impl WireValue {
	pub fn encode(&self, encoding: Encoding) -> Result<Vec<u8>, RivetkitError> {
		match encoding {
			Encoding::Json => {
				let json = self.to_json();
				serde_json::to_vec(&json).map_err(|err| RivetkitError::internal(err))
			}
			Encoding::Cbor => {
				let mut buf = Vec::new();
				ciborium::into_writer(self, &mut buf).map_err(|err| RivetkitError::internal(err))?;
				Ok(buf)
			}
			Encoding::Bare => {
				serde_bare::to_vec(self).map_err(|err| RivetkitError::internal(err))
			}
		}
	}

	pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<Self, RivetkitError> {
		match encoding {
			Encoding::Json => {
				let json: serde_json::Value = serde_json::from_slice(bytes).map_err(|err| {
					RivetkitError::MalformedMessage {
						reason: err.to_string(),
					}
				})?;
				WireValue::from_json(&json)
			}
			Encoding::Cbor => ciborium::from_reader(bytes).map_err(|err| {
				RivetkitError::MalformedMessage {
					reason: err.to_string(),
				}
			}),
			Encoding::Bare => serde_bare::from_slice(bytes).map_err(|err| {
				RivetkitError::MalformedMessage {
					reason: err.to_string(),
				}
			}),
		}
	}

	/// Convert to a `serde_json::Value`, applying the `$`-tag convention for
	/// types JSON has no native representation for.
	pub fn to_json(&self) -> serde_json::Value {
		use serde_json::Value as J;
		match self {
			WireValue::Null => J::Null,
			WireValue::Bool(b) => J::Bool(*b),
			WireValue::Int(i) => J::Number((*i).into()),
			WireValue::Float(f) => serde_json::Number::from_f64(*f)
				.map(J::Number)
				.unwrap_or(J::Null),
			WireValue::BigInt(i) => {
				let mut map = serde_json::Map::new();
				map.insert("$bigint".into(), J::String(i.to_string()));
				J::Object(map)
			}
			WireValue::Bytes(bytes) => {
				let mut map = serde_json::Map::new();
				map.insert(
					"$bytes".into(),
					J::String(base64::Engine::encode(
						&base64::engine::general_purpose::STANDARD,
						bytes,
					)),
				);
				J::Object(map)
			}
			WireValue::String(s) => J::String(escape_dollar(s)),
			WireValue::Array(items) => J::Array(items.iter().map(WireValue::to_json).collect()),
			WireValue::Map(entries) => {
				let mut map = serde_json::Map::new();
				for (k, v) in entries {
					map.insert(k.clone(), v.to_json());
				}
				J::Object(map)
			}
		}
	}

	pub fn from_json(json: &serde_json::Value) -> Result<Self, RivetkitError> {
		use serde_json::Value as J;
		Ok(match json {
			J::Null => WireValue::Null,
			J::Bool(b) => WireValue::Bool(*b),
			J::Number(n) => {
				if let Some(i) = n.as_i64() {
					WireValue::Int(i)
				} else if let Some(f) = n.as_f64() {
					WireValue::Float(f)
				} else {
					return Err(RivetkitError::MalformedMessage {
						reason: format!("unrepresentable number: {n}"),
					});
				}
			}
			J::String(s) => WireValue::String(unescape_dollar(s)),
			J::Array(items) => {
				let mut out = Vec::with_capacity(items.len());
				for item in items {
					out.push(WireValue::from_json(item)?);
				}
				WireValue::Array(out)
			}
			J::Object(map) => {
				if map.len() == 1 {
					if let Some(J::String(encoded)) = map.get("$bigint") {
						let value: i128 = encoded.parse().map_err(|_| {
							RivetkitError::MalformedMessage {
								reason: format!("invalid $bigint value: {encoded}"),
							}
						})?;
						return Ok(WireValue::BigInt(value));
					}
					if let Some(J::String(encoded)) = map.get("$bytes") {
						let bytes = base64::Engine::decode(
							&base64::engine::general_purpose::STANDARD,
							encoded,
						)
						.map_err(|err| RivetkitError::MalformedMessage {
							reason: format!("invalid $bytes value: {err}"),
						})?;
						return Ok(WireValue::Bytes(bytes));
					}
				}

				let mut entries = Vec::with_capacity(map.len());
				for (k, v) in map {
					entries.push((k.clone(), WireValue::from_json(v)?));
				}
				WireValue::Map(entries)
			}
		})
	}
}

/// `$` → `$$`, `$$` → `$$$`, etc: a leading run of N `$` characters becomes N+1.
fn escape_dollar(s: &str) -> String {
	let dollar_run = s.chars().take_while(|c| *c == '$').count();
	if dollar_run == 0 {
		return s.to_string();
	}
	let mut out = String::with_capacity(s.len() + 1);
	out.push('$');
	out.push_str(s);
	out
}

/// Inverse of [`escape_dollar`]: a leading run of N `$` characters (N >= 1)
/// becomes N-1.
fn unescape_dollar(s: &str) -> String {
	if let Some(rest) = s.strip_prefix('$') {
		if rest.starts_with('$') {
			return rest.to_string();
		}
	}
	s.to_string()
}

pub fn map_from_btree(map: BTreeMap<String, WireValue>) -> WireValue {
	WireValue::Map(map.into_iter().collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn round_trip(value: &WireValue, encoding: Encoding) -> WireValue {
		let bytes = value.encode(encoding).unwrap();
		WireValue::decode(&bytes, encoding).unwrap()
	}

	#[test]
	fn round_trips_across_all_encodings() {
		let value = WireValue::Map(vec![
			("n".into(), WireValue::Int(42)),
			("big".into(), WireValue::BigInt(170141183460469231731687303715884105727)),
			("bin".into(), WireValue::Bytes(vec![0, 1, 2, 255])),
			(
				"nested".into(),
				WireValue::Array(vec![WireValue::Bool(true), WireValue::Null]),
			),
			("dollar".into(), WireValue::String("$hello".into())),
			("plain".into(), WireValue::String("hello".into())),
		]);

		for encoding in [Encoding::Json, Encoding::Cbor, Encoding::Bare] {
			assert_eq!(round_trip(&value, encoding), value, "encoding {encoding}");
		}
	}

	#[test]
	fn json_dollar_escape_is_involutive() {
		for s in ["$", "$$", "$$$", "$hello", "plain", ""] {
			let value = WireValue::String(s.to_string());
			let json = value.to_json();
			let decoded = WireValue::from_json(&json).unwrap();
			assert_eq!(decoded, value, "string {s:?}");
		}
	}

	#[test]
	fn json_bytes_use_dollar_tag() {
		let value = WireValue::Bytes(vec![1, 2, 3]);
		let json = value.to_json();
		assert!(json.get("$bytes").is_some());
		assert_eq!(WireValue::from_json(&json).unwrap(), value);
	}

	#[test]
	fn json_bigint_uses_dollar_tag() {
		let value = WireValue::BigInt(-12345678901234567890i128);
		let json = value.to_json();
		assert!(json.get("$bigint").is_some());
		assert_eq!(WireValue::from_json(&json).unwrap(), value);
	}

	#[test]
	fn oversized_values_still_decode_from_cbor() {
		let value = WireValue::Array((0..1000).map(WireValue::Int).collect());
		assert_eq!(round_trip(&value, Encoding::Cbor), value);
	}
}
