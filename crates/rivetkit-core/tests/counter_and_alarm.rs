//! End-to-end scenarios S1 (Counter RPC) and S3 (Alarm) against a bare
//! `ActorInstance`, bypassing the Manager/Router entirely the way
//! `pegboard`'s workflow tests drive the engine directly rather than through
//! HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rivetkit_config::ActorConfig;
use rivetkit_core::{ActorContext, ActorHandle, ActorHandler, ActorInstance, BroadcastOptions};
use rivetkit_drivers::{InMemoryPersistenceDriver, PersistenceDriver};
use rivetkit_error::{Result, RivetkitError};
use rivetkit_protocol::WireValue;

struct Counter;

fn count_of(state: &WireValue) -> i64 {
	match state {
		WireValue::Map(entries) => entries
			.iter()
			.find(|(k, _)| k == "count")
			.and_then(|(_, v)| match v {
				WireValue::Int(i) => Some(*i),
				_ => None,
			})
			.unwrap_or(0),
		_ => 0,
	}
}

fn with_count(count: i64) -> WireValue {
	WireValue::Map(vec![("count".to_string(), WireValue::Int(count))])
}

#[async_trait]
impl ActorHandler for Counter {
	fn name(&self) -> &str {
		"counter"
	}

	async fn on_create(&self, _input: Option<&WireValue>) -> Result<WireValue> {
		Ok(with_count(0))
	}

	async fn execute_action(
		&self,
		ctx: &mut ActorContext,
		name: &str,
		args: Vec<WireValue>,
	) -> Result<WireValue> {
		match name {
			"increment" => {
				let delta = match args.first() {
					Some(WireValue::Int(n)) => *n,
					_ => 0,
				};
				let next = count_of(ctx.state()) + delta;
				ctx.set_state(with_count(next));
				ctx.broadcast("newCount", vec![WireValue::Int(next)], BroadcastOptions::default());
				Ok(WireValue::Int(next))
			}
			"getCount" => Ok(WireValue::Int(count_of(ctx.state()))),
			other => Err(RivetkitError::internal(format!("unknown action {other}"))),
		}
	}
}

struct DailyEmail;

fn last_sent_of(state: &WireValue) -> Option<i64> {
	match state {
		WireValue::Map(entries) => entries.iter().find(|(k, _)| k == "lastSentAt").and_then(|(_, v)| match v {
			WireValue::Int(i) => Some(*i),
			_ => None,
		}),
		_ => None,
	}
}

#[async_trait]
impl ActorHandler for DailyEmail {
	fn name(&self) -> &str {
		"daily-email"
	}

	async fn on_create(&self, _input: Option<&WireValue>) -> Result<WireValue> {
		Ok(WireValue::Map(vec![]))
	}

	async fn execute_action(
		&self,
		ctx: &mut ActorContext,
		name: &str,
		_args: Vec<WireValue>,
	) -> Result<WireValue> {
		match name {
			"scheduleSoon" => {
				ctx.schedule_after(
					"daily".to_string(),
					50,
					"sendDailyEmail".to_string(),
					None,
					now_ms(),
				);
				Ok(WireValue::Null)
			}
			"lastSentAt" => Ok(last_sent_of(ctx.state()).map(WireValue::Int).unwrap_or(WireValue::Null)),
			other => Err(RivetkitError::internal(format!("unknown action {other}"))),
		}
	}

	async fn on_alarm(
		&self,
		ctx: &mut ActorContext,
		action_name: &str,
		_payload: Option<WireValue>,
	) -> Result<()> {
		assert_eq!(action_name, "sendDailyEmail");
		ctx.set_state(WireValue::Map(vec![(
			"lastSentAt".to_string(),
			WireValue::Int(now_ms()),
		)]));
		ctx.schedule_after(
			"daily".to_string(),
			24 * 60 * 60 * 1000,
			"sendDailyEmail".to_string(),
			None,
			now_ms(),
		);
		Ok(())
	}
}

fn now_ms() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap()
		.as_millis() as i64
}

async fn spawn_counter(persistence: Arc<dyn PersistenceDriver>) -> ActorHandle {
	ActorInstance::spawn(
		"counter-a".to_string(),
		Arc::new(Counter),
		persistence,
		ActorConfig::default(),
		None,
	)
	.await
	.expect("spawn counter")
}

#[tokio::test]
async fn s1_counter_rpc_survives_a_restart() {
	let persistence: Arc<dyn PersistenceDriver> = Arc::new(InMemoryPersistenceDriver::new());

	let handle = spawn_counter(persistence.clone()).await;
	let five = handle
		.execute_action(None, "increment", vec![WireValue::Int(5)])
		.await
		.expect("increment");
	assert_eq!(five, WireValue::Int(5));

	let eight = handle
		.execute_action(None, "increment", vec![WireValue::Int(3)])
		.await
		.expect("increment");
	assert_eq!(eight, WireValue::Int(8));

	// `immediate` forces the flush a "restart" depends on finding.
	handle.save_state(true).await.expect("save state");
	handle.shutdown().await;

	let restarted = spawn_counter(persistence).await;
	let count = restarted
		.execute_action(None, "getCount", vec![])
		.await
		.expect("getCount");
	assert_eq!(count, WireValue::Int(8));
}

#[tokio::test]
async fn s3_alarm_fires_and_reschedules() {
	let persistence: Arc<dyn PersistenceDriver> = Arc::new(InMemoryPersistenceDriver::new());
	let handle = ActorInstance::spawn(
		"daily-email-a".to_string(),
		Arc::new(DailyEmail),
		persistence,
		ActorConfig::default(),
		None,
	)
	.await
	.expect("spawn daily email");

	handle
		.execute_action(None, "scheduleSoon", vec![])
		.await
		.expect("scheduleSoon");

	assert_eq!(
		handle
			.execute_action(None, "lastSentAt", vec![])
			.await
			.expect("lastSentAt before alarm"),
		WireValue::Null
	);

	// The instance's own select loop sleeps until the next due alarm; give
	// it enough slack past the 50ms schedule to fire under test-runner load.
	tokio::time::sleep(Duration::from_millis(250)).await;

	let last_sent = handle
		.execute_action(None, "lastSentAt", vec![])
		.await
		.expect("lastSentAt after alarm");
	assert!(matches!(last_sent, WireValue::Int(_)));
}
