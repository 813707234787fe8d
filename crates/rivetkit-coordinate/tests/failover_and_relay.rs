//! End-to-end scenarios S4 (Leader failover) and S5 (Relay), exercising
//! [`ActorPeer`]/[`RelayConnection`] directly the way `peer.rs`'s own
//! `#[cfg(test)]` module drives the state machine, but across the full
//! lease-expiry and relay round-trip rather than just the initial election.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rivetkit_config::{ActorConfig, CoordinateConfig};
use rivetkit_core::ActorContext;
use rivetkit_core::ActorHandler;
use rivetkit_coordinate::{ActorPeer, PeerState, RelayConnection};
use rivetkit_drivers::{CoordinateDriver, InMemoryCoordinateDriver, InMemoryPersistenceDriver, PersistenceDriver};
use rivetkit_error::Result;
use rivetkit_protocol::{ClientMessage, Encoding, ServerMessage, WireValue};

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

#[async_trait]
impl ActorHandler for Counter {
	fn name(&self) -> &str {
		"counter"
	}

	async fn on_create(&self, _input: Option<&WireValue>) -> Result<WireValue> {
		Ok(WireValue::Map(vec![("count".to_string(), WireValue::Int(0))]))
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
				ctx.set_state(WireValue::Map(vec![("count".to_string(), WireValue::Int(next))]));
				Ok(WireValue::Int(next))
			}
			"getCount" => Ok(WireValue::Int(count_of(ctx.state()))),
			other => Err(rivetkit_error::RivetkitError::internal(format!("unknown action {other}"))),
		}
	}
}

/// Short enough that the test doesn't wait long, long enough that the
/// follower's periodic poll (`checkLeaseInterval`) has room to
/// actually observe an expired lease rather than racing the leader's own
/// renewal.
fn fast_coordinate_config() -> CoordinateConfig {
	CoordinateConfig {
		lease_duration_ms: Some(150),
		renew_grace_ms: Some(20),
		check_lease_interval_ms: Some(40),
		check_lease_jitter_ms: Some(0),
	}
}

#[tokio::test]
async fn s4_follower_takes_over_after_the_leader_is_killed() {
	let coordinate: Arc<dyn CoordinateDriver> = Arc::new(InMemoryCoordinateDriver::new());
	let persistence: Arc<dyn PersistenceDriver> = Arc::new(InMemoryPersistenceDriver::new());
	let handler: Arc<dyn ActorHandler> = Arc::new(Counter);
	let config = fast_coordinate_config();

	let leader = ActorPeer::spawn(
		"counter-1".into(),
		"node-a".into(),
		handler.clone(),
		persistence.clone(),
		coordinate.clone(),
		ActorConfig::default(),
		config.clone(),
		None,
	)
	.await
	.expect("spawn leader");
	assert_eq!(leader.state(), PeerState::Leader);

	leader
		.core()
		.expect("leader has a local core")
		.execute_action(None, "increment", vec![WireValue::Int(5)])
		.await
		.expect("increment");
	leader
		.core()
		.unwrap()
		.save_state(true)
		.await
		.expect("flush state before the simulated kill");

	let mut follower = ActorPeer::spawn(
		"counter-1".into(),
		"node-b".into(),
		handler,
		persistence,
		coordinate,
		ActorConfig::default(),
		config,
		None,
	)
	.await
	.expect("spawn follower");
	assert_eq!(follower.state(), PeerState::Follower);

	// Kill N1: releasing the lease (rather than just dropping the handle, an
	// in-process test has no other way to simulate process death) is what
	// lets the follower's next poll see an expired lease and promote itself.
	leader.shutdown();

	let promoted = tokio::time::timeout(Duration::from_secs(2), async {
		loop {
			if follower.state_changed().await == PeerState::Leader {
				return;
			}
		}
	})
	.await;
	assert!(promoted.is_ok(), "follower did not take over the lease in time");

	let core = follower.core().expect("promoted follower has a local core");
	let count = core
		.execute_action(None, "getCount", vec![])
		.await
		.expect("getCount after failover");
	assert_eq!(count, WireValue::Int(5));
}

#[tokio::test]
async fn s5_relay_round_trips_an_action_through_the_leader() {
	let coordinate: Arc<dyn CoordinateDriver> = Arc::new(InMemoryCoordinateDriver::new());
	let persistence: Arc<dyn PersistenceDriver> = Arc::new(InMemoryPersistenceDriver::new());
	let handler: Arc<dyn ActorHandler> = Arc::new(Counter);

	let leader = ActorPeer::spawn(
		"counter-2".into(),
		"node-a".into(),
		handler,
		persistence,
		coordinate.clone(),
		ActorConfig::default(),
		CoordinateConfig::default(),
		None,
	)
	.await
	.expect("spawn leader");
	assert_eq!(leader.state(), PeerState::Leader);

	// Simulates what the gateway on a follower node (N2) does when its local
	// peer isn't the leader: hold the client connection, forward everything
	// through the coordinate driver instead of a local `ActorHandle`.
	let (relay, mut events) = RelayConnection::open(
		coordinate,
		"counter-2",
		"conn-1",
		"tok-1",
		None,
		None,
		Encoding::Json,
	)
	.await
	.expect("open relay connection");

	relay
		.send_to_leader(ClientMessage::ActionRequest {
			request_id: 7,
			name: "increment".to_string(),
			args: vec![WireValue::Int(3)],
		})
		.await
		.expect("relay action request");

	let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
		.await
		.expect("relay reply did not arrive in time")
		.expect("relay channel closed");

	match event {
		rivetkit_coordinate::relay::RelayEvent::Message(ServerMessage::ActionResponse { request_id, output }) => {
			assert_eq!(request_id, 7);
			assert_eq!(output, WireValue::Int(3));
		}
		other => panic!("expected an action response relayed from the leader, got {other:?}"),
	}
}
