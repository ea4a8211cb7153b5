// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::error::ErrorCode;
use crate::outbound::{ConnectionId, Transport, TransportError};
use crate::protocol::{encode, Envelope};

/// Per-connection state handed to frame handlers.
pub struct SessionContext {
    transport: Arc<dyn Transport>,
    identity: Option<String>,
    /// Identity supplied at connect time (`?user_id=`), used by bare `auth` frames.
    requested_identity: Option<String>,
}

impl SessionContext {
    pub fn new(transport: Arc<dyn Transport>, requested_identity: Option<String>) -> Self {
        let requested_identity =
            requested_identity.map(|id| id.trim().to_owned()).filter(|id| !id.is_empty());
        Self { transport, identity: None, requested_identity }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.transport.id()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Identity bound by a previous frame, if any.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn requested_identity(&self) -> Option<&str> {
        self.requested_identity.as_deref()
    }

    pub fn bind(&mut self, identity: impl Into<String>) {
        self.identity = Some(identity.into());
    }

    /// Encode and queue a frame back to this connection.
    pub fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.send_frame(encode(envelope))
    }

    /// Queue an already encoded frame back to this connection.
    pub fn send_frame(&self, frame: String) -> Result<(), TransportError> {
        let result = self.transport.send(frame);
        self.log_failure(&result);
        result
    }

    /// Like [`send`](Self::send), but waits for queue space instead of
    /// failing with a backlog.
    pub async fn send_wait(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let result = self.transport.send_wait(encode(envelope)).await;
        self.log_failure(&result);
        result
    }

    fn log_failure(&self, result: &Result<(), TransportError>) {
        if let Err(e) = result {
            tracing::debug!(
                conn = self.connection_id(),
                identity = self.identity().unwrap_or("-"),
                err = %e,
                "send to own connection failed"
            );
        }
    }

    /// Report an error to this connection; failures are only logged.
    pub fn send_error(&self, code: ErrorCode, message: impl Into<String>) {
        let _ = self.send(&Envelope::error(code, message));
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("conn", &self.connection_id())
            .field("identity", &self.identity)
            .finish()
    }
}
