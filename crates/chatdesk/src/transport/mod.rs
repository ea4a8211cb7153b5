// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the chat relay.

pub mod auth;
pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// WebSocket relay endpoint.
pub const CHAT_PATH: &str = "/api/v1/chat";

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Relay endpoint
        .route(CHAT_PATH, get(ws::ws_handler))
        // Support-desk API
        .route("/api/v1/chat/sessions", get(http::list_sessions))
        .route(
            "/api/v1/chat/history/{user_id}",
            get(http::get_history).delete(http::clear_history),
        )
        .route("/api/v1/chat/messages/{id}", delete(http::delete_message))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
