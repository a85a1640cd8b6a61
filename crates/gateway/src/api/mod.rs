//! HTTP/WS route table.
//!
//! Routes are split into **public** (no auth required) and **protected**
//! (gated behind the configured bearer-token middleware). `state` is
//! needed to wire up the auth middleware at build time.

mod chat;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth;
use crate::state::AppState;
use crate::ws;

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/healthz", get(healthz));

    let protected = Router::new()
        .route("/v1/chat/stream", post(chat::chat_stream))
        .route("/v1/runs/:run_id/cancel", post(chat::cancel_run))
        .route("/v1/ws", get(ws::ws_handler))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token));

    public.merge(protected)
}

async fn healthz() -> &'static str {
    "ok"
}
