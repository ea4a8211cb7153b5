// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the support-desk API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::health;
use crate::sessions::{summarize, SessionSummary};
use crate::state::RelayState;
use crate::store::{HistoryRecord, StoreError};

// -- Response types -----------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub messages: Vec<HistoryRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub user_id: String,
    pub removed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub removed: bool,
}

fn storage_failure(op: &str, e: StoreError) -> axum::response::Response {
    tracing::warn!(op, err = %e, "store request failed");
    ErrorCode::StorageUnavailable.to_http_response("storage unavailable").into_response()
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(health::report(&s).await)
}

/// `GET /api/v1/chat/sessions`: customers with history or a live connection.
pub async fn list_sessions(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    let records = match s.persistence.all().await {
        Ok(records) => records,
        Err(e) => return storage_failure("list_sessions", e),
    };
    let online = s.registry.snapshot();
    let sessions = summarize(&records, &online, &s.settings.support_id);
    Json(SessionsResponse { sessions }).into_response()
}

/// `GET /api/v1/chat/history/{user_id}`
pub async fn get_history(
    State(s): State<Arc<RelayState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match s.persistence.history_for(&user_id).await {
        Ok(messages) => Json(HistoryResponse { user_id, messages }).into_response(),
        Err(e) => storage_failure("get_history", e),
    }
}

/// `DELETE /api/v1/chat/history/{user_id}`
pub async fn clear_history(
    State(s): State<Arc<RelayState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match s.persistence.clear(&user_id).await {
        Ok(removed) => {
            tracing::info!(user_id = %user_id, removed, "history cleared over http");
            Json(ClearResponse { user_id, removed }).into_response()
        }
        Err(e) => storage_failure("clear_history", e),
    }
}

/// `DELETE /api/v1/chat/messages/{id}`
pub async fn delete_message(
    State(s): State<Arc<RelayState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match s.persistence.delete_record(id).await {
        Ok(true) => Json(DeleteResponse { id, removed: true }).into_response(),
        Ok(false) => ErrorCode::NotFound.to_http_response("message not found").into_response(),
        Err(e) => storage_failure("delete_message", e),
    }
}
