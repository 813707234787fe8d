//! Assembles the Manager/Router HTTP surface: the management
//! directory endpoints plus the three gateway connection drivers, behind a
//! permissive CORS layer mirroring the request (clients run from arbitrary
//! origins in development and most self-hosted deployments).

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::connections::{http as http_gateway, sse, ws};
use crate::http_api;
use crate::state::ManagerState;

pub fn router(state: Arc<ManagerState>) -> Router {
	Router::new()
		.route("/", get(http_api::root))
		.route("/health", get(http_api::health))
		.route("/actors/by-id", get(http_api::get_by_id))
		.route("/actors/by-id", put(http_api::put_by_id))
		.route("/actors", post(http_api::create_actor))
		.route("/actors/{actor_id}", get(http_api::get_actor))
		.route("/actors/connect/websocket", get(ws::upgrade))
		.route("/actors/connections/sse", get(sse::connect))
		.route("/actors/connections/message", post(sse::post_message))
		.route("/actors/actions/{name}", post(http_gateway::invoke_action))
		.layer(
			CorsLayer::new()
				.allow_origin(tower_http::cors::AllowOrigin::mirror_request())
				.allow_methods(tower_http::cors::AllowMethods::mirror_request())
				.allow_headers(tower_http::cors::AllowHeaders::mirror_request())
				.allow_credentials(true),
		)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}
