//! The actor lifecycle hooks. All are optional; the default
//! implementation is a no-op (or, for hooks that return a value, the most
//! permissive answer) so a handler only overrides what it cares about —
//! mirroring how RivetKit's own actor config treats every hook as optional.

use async_trait::async_trait;
use rivetkit_protocol::WireValue;
use std::collections::BTreeSet;

use crate::context::ActorContext;
use rivetkit_error::Result;

/// What a caller is trying to do, passed to `on_auth` so it can apply
/// different policy per intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Intent {
	Get,
	Create,
	Connect,
	Action,
	Message,
}

pub type Intents = BTreeSet<Intent>;

/// Everything a user-defined actor implements. `name()` is the registry key
/// clients address with `getOrCreate(name, key)`.
#[async_trait]
pub trait ActorHandler: Send + Sync + 'static {
	fn name(&self) -> &str;

	/// Runs at the HTTP edge before any actor work; pure, must not touch
	/// actor state. Returning `Err` rejects with `Unauthorized`.
	async fn on_auth(
		&self,
		_params: Option<&WireValue>,
		_intents: &Intents,
	) -> Result<Option<WireValue>> {
		Ok(None)
	}

	/// Once per actor id, on first materialization. Returns the initial
	/// state.
	async fn on_create(&self, input: Option<&WireValue>) -> Result<WireValue> {
		Ok(input.cloned().unwrap_or(WireValue::Null))
	}

	/// Every time the instance loads (boot or wake from hibernation).
	async fn on_start(&self, _ctx: &mut ActorContext) -> Result<()> {
		Ok(())
	}

	/// May reject a connection before it is registered.
	async fn on_before_connect(
		&self,
		_ctx: &mut ActorContext,
		_params: Option<&WireValue>,
	) -> Result<()> {
		Ok(())
	}

	async fn on_connect(&self, _ctx: &mut ActorContext, _conn_id: &str) -> Result<()> {
		Ok(())
	}

	async fn on_disconnect(&self, _ctx: &mut ActorContext, _conn_id: &str) -> Result<()> {
		Ok(())
	}

	/// Called after any state mutation, debounced to once per save cycle.
	async fn on_state_change(&self, _ctx: &mut ActorContext, _new_state: &WireValue) {}

	/// Last chance to transform an action's result before it's sent to the
	/// caller.
	async fn on_before_action_response(
		&self,
		_ctx: &mut ActorContext,
		_name: &str,
		_args: &[WireValue],
		output: WireValue,
	) -> Result<WireValue> {
		Ok(output)
	}

	/// Dispatches a named action. Implementors typically `match name`.
	/// Unknown actions return `Err(RivetkitError::ActionNotFound)`.
	async fn execute_action(
		&self,
		ctx: &mut ActorContext,
		name: &str,
		args: Vec<WireValue>,
	) -> Result<WireValue>;

	/// Invoked when a scheduled entry comes due.
	async fn on_alarm(
		&self,
		ctx: &mut ActorContext,
		action_name: &str,
		payload: Option<WireValue>,
	) -> Result<()> {
		let args = payload.map(|p| vec![p]).unwrap_or_default();
		self.execute_action(ctx, action_name, args).await.map(|_| ())
	}
}
