// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound half of a connection, as seen by the rest of the relay.
//!
//! Handlers never touch a socket directly. Each connection owns a bounded
//! queue drained by a writer task; [`ChannelTransport`] is the cloneable
//! handle stored in the registry.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Identifier unique to one live transport for the life of the process.
pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("outbound queue full")]
    Backlogged,
}

/// Boxed future returned by [`Transport::send_wait`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// Frame-oriented send handle for one connection.
pub trait Transport: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Queue a text frame. Fails if the connection is gone or not draining.
    fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Queue a text frame, waiting for room in the queue. Fails only once the
    /// connection is gone.
    fn send_wait(&self, frame: String) -> SendFuture<'_> {
        Box::pin(std::future::ready(self.send(frame)))
    }

    /// Ask the owning supervisor to shut the connection down.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Allocate the next connection id.
pub fn next_connection_id() -> ConnectionId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// [`Transport`] backed by an mpsc queue feeding a socket writer task.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl ChannelTransport {
    /// Create the handle plus the receiver the writer task drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let transport = Self { id: next_connection_id(), tx, cancel: CancellationToken::new() };
        (transport, rx)
    }

    /// Cancelled when [`Transport::close`] is called.
    pub fn cancelled(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Transport for ChannelTransport {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backlogged,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    fn send_wait(&self, frame: String) -> SendFuture<'_> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(TransportError::Closed),
                sent = self.tx.send(frame) => sent.map_err(|_| TransportError::Closed),
            }
        })
    }

    fn close(&self) {
        self.cancel.cancel();
    }

    fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

#[cfg(test)]
#[path = "outbound_tests.rs"]
mod tests;
