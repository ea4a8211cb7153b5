// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket upgrade and socket plumbing for relay connections.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::outbound::{ChannelTransport, Transport};
use crate::state::RelayState;
use crate::supervisor::{ConnectionSupervisor, Inbound};
use crate::transport::auth;

/// Query parameters for the relay WS upgrade.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatWsQuery {
    pub token: Option<String>,
    /// Identity used when an `auth` frame omits `user_id`.
    pub user_id: Option<String>,
}

/// `GET /api/v1/chat`: WebSocket upgrade for one relay connection.
pub async fn ws_handler(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<ChatWsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if let Err(code) = auth::validate_ws_token(query.token.as_deref(), state.auth_token.as_deref())
    {
        return code.to_http_response("unauthorized").into_response();
    }

    ws.on_upgrade(move |socket| handle_ws(socket, state, query.user_id)).into_response()
}

/// Per-connection WebSocket handler.
async fn handle_ws(socket: WebSocket, state: Arc<RelayState>, requested: Option<String>) {
    let (transport, mut out_rx) = ChannelTransport::new(state.settings.outbound_capacity);
    let cancel = transport.cancelled();
    let transport = Arc::new(transport);
    let (mut ws_tx, ws_rx) = socket.split();

    // Writer: drain the outbound queue into the socket until closed.
    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                frame = out_rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let inbound = ws_rx.filter_map(|msg| async move {
        match msg {
            Ok(Message::Text(text)) => Some(Ok(Inbound::Text(text.as_str().to_owned()))),
            Ok(Message::Binary(bytes)) => {
                Some(Ok(Inbound::Text(String::from_utf8_lossy(&bytes).into_owned())))
            }
            Ok(Message::Close(_)) => Some(Ok(Inbound::Close)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    });
    let inbound = std::pin::pin!(inbound);

    let supervisor = ConnectionSupervisor::new(
        Arc::clone(&state),
        Arc::clone(&transport) as Arc<dyn Transport>,
        cancel,
        requested,
    );
    let reason = supervisor.run(inbound).await;
    tracing::debug!(conn = transport.id(), ?reason, "relay socket finished");

    transport.close();
    let _ = writer.await;
}
