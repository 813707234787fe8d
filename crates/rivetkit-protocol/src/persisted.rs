//! Persisted record layout: what the Persistence Driver stores for a single
//! actor. Keys are stable and short to minimize wire/disk size, mirroring
//! the short field renames used by [`crate::messages`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::WireValue;

/// `{i: input?, s: state?, c: {connId: persistedConn}*, sub: {connId: [event]}*,
/// sch: [{id,t,n,p}]*, v: version}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedRecord {
	#[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
	pub input: Option<WireValue>,

	#[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
	pub state: Option<WireValue>,

	#[serde(rename = "c", default, skip_serializing_if = "BTreeMap::is_empty")]
	pub conns: BTreeMap<String, PersistedConn>,

	/// Per-connection subscriptions: connection id -> subscribed event names.
	#[serde(rename = "sub", default, skip_serializing_if = "BTreeMap::is_empty")]
	pub subscriptions: BTreeMap<String, Vec<String>>,

	#[serde(rename = "sch", default, skip_serializing_if = "Vec::is_empty")]
	pub schedule: Vec<ScheduleEntry>,

	#[serde(rename = "v")]
	pub version: u32,
}

impl PersistedRecord {
	pub fn new(version: u32) -> Self {
		PersistedRecord {
			version,
			..Default::default()
		}
	}
}

/// The slice of connection state that survives a restart: enough to rebuild a
/// `Connection` without re-running `onBeforeConnect`/`onConnect` (those only
/// fire once, at creation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedConn {
	#[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
	pub params: Option<WireValue>,

	#[serde(rename = "st", default, skip_serializing_if = "Option::is_none")]
	pub state: Option<WireValue>,

	#[serde(rename = "ct")]
	pub conn_token: String,

	#[serde(rename = "auth", default, skip_serializing_if = "Option::is_none")]
	pub auth_data: Option<WireValue>,
}

/// A single durable alarm entry: `{id, dueAt, actionName, payload}`. `id` is
/// stable across reschedules of the same logical alarm so a caller can
/// cancel-and-replace it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
	#[serde(rename = "id")]
	pub id: String,

	/// Unix epoch milliseconds.
	#[serde(rename = "t")]
	pub due_at: i64,

	#[serde(rename = "n")]
	pub action_name: String,

	#[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<WireValue>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_record_omits_optional_fields_in_json() {
		let record = PersistedRecord::new(1);
		let json = serde_json::to_value(&record).unwrap();
		let obj = json.as_object().unwrap();
		assert!(!obj.contains_key("i"));
		assert!(!obj.contains_key("s"));
		assert!(!obj.contains_key("c"));
		assert!(!obj.contains_key("sub"));
        assert!(!obj.contains_key("sch"));
		assert_eq!(obj.get("v").and_then(|v| v.as_u64()), Some(1));
	}

	#[test]
	fn round_trips_through_bare() {
		let mut record = PersistedRecord::new(3);
		record.input = Some(WireValue::String("seed".into()));
		record.state = Some(WireValue::Int(7));
		record.conns.insert(
			"conn-1".into(),
			PersistedConn {
				params: None,
				state: Some(WireValue::Bool(true)),
				conn_token: "tok-1".into(),
				auth_data: None,
			},
		);
		record
			.subscriptions
			.insert("conn-1".into(), vec!["newCount".into()]);
		record.schedule.push(ScheduleEntry {
			id: "alarm-1".into(),
			due_at: 1_000,
			action_name: "tick".into(),
			payload: None,
		});

		let bytes = serde_bare::to_vec(&record).unwrap();
		let decoded: PersistedRecord = serde_bare::from_slice(&bytes).unwrap();
		assert_eq!(decoded.version, 3);
		assert_eq!(decoded.conns.len(), 1);
		assert_eq!(decoded.schedule.len(), 1);
		assert_eq!(decoded.schedule[0].due_at, 1_000);
	}
}
