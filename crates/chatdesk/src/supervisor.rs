// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection read loop and lifecycle.
//!
//! The supervisor owns the inbound half of one connection. It decodes each
//! text frame, dispatches it, and on exit (peer close, transport error, idle
//! timeout, eviction, or shutdown) releases the registry entry it owns and
//! announces the identity offline.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::context::SessionContext;
use crate::outbound::Transport;
use crate::protocol::{decode, PresenceStatus};
use crate::state::RelayState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// One inbound event from the socket, already stripped of ping/pong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Close,
}

/// Why the read loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    TransportError(String),
    IdleTimeout,
    Evicted,
    Shutdown,
}

enum Next {
    Frame(String),
    Done(CloseReason),
}

pub struct ConnectionSupervisor {
    state: Arc<RelayState>,
    ctx: SessionContext,
    cancel: CancellationToken,
    phase: ConnectionState,
}

impl ConnectionSupervisor {
    /// `cancel` fires when the transport is closed from elsewhere (eviction).
    pub fn new(
        state: Arc<RelayState>,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
        requested_identity: Option<String>,
    ) -> Self {
        let ctx = SessionContext::new(transport, requested_identity);
        Self { state, ctx, cancel, phase: ConnectionState::Connecting }
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::debug!(conn = self.ctx.connection_id(), from = ?self.phase, to = ?next, "connection state");
        self.phase = next;
    }

    /// Drive the connection until it ends, then clean up.
    pub async fn run<S, E>(mut self, mut inbound: S) -> CloseReason
    where
        S: Stream<Item = Result<Inbound, E>> + Unpin,
        E: std::fmt::Display,
    {
        self.transition(ConnectionState::Open);
        let cancel = self.cancel.clone();
        let shutdown = self.state.shutdown.clone();
        let idle = self.state.settings.idle_timeout;

        let reason = loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => Next::Done(CloseReason::Evicted),
                _ = shutdown.cancelled() => Next::Done(CloseReason::Shutdown),
                next = recv(&mut inbound, idle) => next,
            };
            let text = match next {
                Next::Frame(text) => text,
                Next::Done(reason) => break reason,
            };
            // A handler can wait on a slow reader (history replay); eviction
            // and shutdown still end the connection.
            tokio::select! {
                _ = cancel.cancelled() => break CloseReason::Evicted,
                _ = shutdown.cancelled() => break CloseReason::Shutdown,
                _ = self.process(&text) => {}
            }
        };

        self.transition(ConnectionState::Closing);
        self.cleanup(&reason);
        self.transition(ConnectionState::Closed);
        reason
    }

    async fn process(&mut self, text: &str) {
        match decode(text) {
            Ok(envelope) => {
                self.state.handlers.dispatch(envelope, &mut self.ctx).await;
            }
            Err(e) => {
                tracing::debug!(conn = self.ctx.connection_id(), err = %e, "rejected frame");
                self.ctx.send_error(e.code(), e.to_string());
            }
        }
    }

    fn cleanup(&self, reason: &CloseReason) {
        let conn = self.ctx.connection_id();
        let Some(identity) = self.ctx.identity() else {
            tracing::debug!(conn, ?reason, "unbound connection closed");
            return;
        };
        if let Some(profile) = self.state.registry.release(identity, conn) {
            if identity != self.state.settings.support_id {
                self.state.presence.notify_status(identity, PresenceStatus::Offline, Some(&profile));
            }
        }
        tracing::info!(
            conn,
            identity,
            ?reason,
            online = self.state.registry.len(),
            "connection closed"
        );
    }
}

async fn recv<S, E>(inbound: &mut S, idle: Option<Duration>) -> Next
where
    S: Stream<Item = Result<Inbound, E>> + Unpin,
    E: std::fmt::Display,
{
    let item = match idle {
        Some(limit) => match tokio::time::timeout(limit, inbound.next()).await {
            Ok(item) => item,
            Err(_) => return Next::Done(CloseReason::IdleTimeout),
        },
        None => inbound.next().await,
    };
    match item {
        Some(Ok(Inbound::Text(text))) => Next::Frame(text),
        Some(Ok(Inbound::Close)) | None => Next::Done(CloseReason::PeerClosed),
        Some(Err(e)) => Next::Done(CloseReason::TransportError(e.to_string())),
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
