//! Layered runtime configuration.
//!
//! Every field is `Option<T>` with a documented default, read through an accessor
//! method rather than directly — this lets callers override only the knobs they
//! care about while the rest fall back to the values named in the spec. No file
//! format is mandated; construct a [`RivetkitConfig`] programmatically (the
//! `Default` impl matches the spec's recommended defaults exactly) or `serde`
//! it in from whatever layer an embedder prefers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

mod env;
pub use env::LogEnv;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields, default)]
pub struct RivetkitConfig {
	pub actor: ActorConfig,
	pub coordinate: CoordinateConfig,
	pub protocol: ProtocolConfig,
	pub scheduler: SchedulerConfig,
}

/// Actor Instance / Lifecycle Engine timeouts.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields, default)]
pub struct ActorConfig {
	/// Time allowed for `createVars` to resolve before the instance is considered
	/// failed to start.
	///
	/// Unit is milliseconds.
	pub create_vars_timeout_ms: Option<u64>,
	/// Time allowed for a connection's `createConnState` to resolve.
	///
	/// Unit is milliseconds.
	pub create_conn_state_timeout_ms: Option<u64>,
	/// Time allowed for `onConnect` to resolve before the connection is rejected.
	///
	/// Unit is milliseconds.
	pub on_connect_timeout_ms: Option<u64>,
	/// Time allowed for a single action invocation to resolve.
	///
	/// Unit is milliseconds.
	pub action_timeout_ms: Option<u64>,
	/// How often dirty state is flushed to the persistence driver absent an
	/// explicit `saveState({immediate: true})` call.
	///
	/// Unit is milliseconds.
	pub state_save_interval_ms: Option<u64>,
}

impl ActorConfig {
	pub fn create_vars_timeout(&self) -> Duration {
		Duration::from_millis(self.create_vars_timeout_ms.unwrap_or(5_000))
	}

	pub fn create_conn_state_timeout(&self) -> Duration {
		Duration::from_millis(self.create_conn_state_timeout_ms.unwrap_or(5_000))
	}

	pub fn on_connect_timeout(&self) -> Duration {
		Duration::from_millis(self.on_connect_timeout_ms.unwrap_or(5_000))
	}

	pub fn action_timeout(&self) -> Duration {
		Duration::from_millis(self.action_timeout_ms.unwrap_or(60_000))
	}

	pub fn state_save_interval(&self) -> Duration {
		Duration::from_millis(self.state_save_interval_ms.unwrap_or(10_000))
	}
}

/// Coordinate Topology lease + heartbeat timings.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields, default)]
pub struct CoordinateConfig {
	/// How long a leader's lease is valid for without renewal.
	///
	/// Unit is milliseconds.
	pub lease_duration_ms: Option<u64>,
	/// How much time before lease expiry a leader renews it.
	///
	/// Unit is milliseconds.
	pub renew_grace_ms: Option<u64>,
	/// How often a follower polls to check whether the lease has expired.
	///
	/// Unit is milliseconds.
	pub check_lease_interval_ms: Option<u64>,
	/// Upper bound of the jitter added on top of `check_lease_interval_ms` to
	/// avoid thundering-herd lease acquisition attempts.
	///
	/// Unit is milliseconds.
	pub check_lease_jitter_ms: Option<u64>,
}

impl CoordinateConfig {
	pub fn lease_duration(&self) -> Duration {
		Duration::from_millis(self.lease_duration_ms.unwrap_or(15_000))
	}

	pub fn renew_grace(&self) -> Duration {
		Duration::from_millis(self.renew_grace_ms.unwrap_or(3_000))
	}

	pub fn check_lease_interval(&self) -> Duration {
		Duration::from_millis(self.check_lease_interval_ms.unwrap_or(5_000))
	}

	pub fn check_lease_jitter(&self) -> Duration {
		Duration::from_millis(self.check_lease_jitter_ms.unwrap_or(2_000))
	}

	/// Interval at which the leader re-extends the lease: `lease_duration - renew_grace`.
	pub fn renew_interval(&self) -> Duration {
		self.lease_duration().saturating_sub(self.renew_grace())
	}
}

/// Connection Protocol limits.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields, default)]
pub struct ProtocolConfig {
	/// Maximum size of an inbound wire frame before it is rejected with
	/// `MessageTooLong`.
	///
	/// Unit is bytes.
	pub max_incoming_message_size: Option<usize>,
}

impl ProtocolConfig {
	pub fn max_incoming_message_size(&self) -> usize {
		self.max_incoming_message_size.unwrap_or(64 * 1024)
	}
}

/// Scheduler timing.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields, default)]
pub struct SchedulerConfig {
	/// Acceptable drift between a schedule entry's `dueAt` and when its action
	/// actually dispatches, under no load.
	///
	/// Unit is milliseconds.
	pub slack_ms: Option<u64>,
	/// Chunk size used to re-arm a single schedule entry whose delay exceeds the
	/// platform timer's 32-bit millisecond range (~24.8 days).
	///
	/// Unit is milliseconds.
	pub max_timer_delay_ms: Option<u64>,
}

impl SchedulerConfig {
	pub fn slack(&self) -> Duration {
		Duration::from_millis(self.slack_ms.unwrap_or(250))
	}

	pub fn max_timer_delay(&self) -> Duration {
		// 2^31 - 1 ms, the largest delay a 32-bit timer can represent.
		Duration::from_millis(self.max_timer_delay_ms.unwrap_or(i32::MAX as u64))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_spec() {
		let config = RivetkitConfig::default();
		assert_eq!(config.actor.action_timeout(), Duration::from_secs(60));
		assert_eq!(config.actor.state_save_interval(), Duration::from_secs(10));
		assert_eq!(config.coordinate.lease_duration(), Duration::from_secs(15));
		assert_eq!(config.coordinate.renew_grace(), Duration::from_secs(3));
		assert_eq!(
			config.coordinate.renew_interval(),
			Duration::from_secs(12)
		);
		assert_eq!(
			config.protocol.max_incoming_message_size(),
			64 * 1024
		);
		assert_eq!(config.scheduler.slack(), Duration::from_millis(250));
	}

	#[test]
	fn overrides_take_effect() {
		let config = RivetkitConfig {
			actor: ActorConfig {
				action_timeout_ms: Some(1_000),
				..Default::default()
			},
			..Default::default()
		};
		assert_eq!(config.actor.action_timeout(), Duration::from_secs(1));
	}
}
