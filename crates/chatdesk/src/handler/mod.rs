// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame handlers and the kind-keyed table that dispatches to them.

pub mod auth;
pub mod chat;

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::context::SessionContext;
use crate::error::ErrorCode;
use crate::protocol::{Envelope, FrameKind};
use crate::store::StoreError;

pub use auth::AuthHandler;
pub use chat::ChatHandler;

/// Boxed future returned by [`FrameHandler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0} frame routed to the wrong handler")]
    Mismatch(FrameKind),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Rejected(String),
}

impl HandlerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Mismatch(_) => ErrorCode::Internal,
            Self::Store(_) => ErrorCode::StorageUnavailable,
            Self::Rejected(_) => ErrorCode::BadRequest,
        }
    }

    /// Text shown to the client. Internal details stay in the log.
    pub fn client_message(&self) -> String {
        match self {
            Self::Rejected(reason) => reason.clone(),
            Self::Store(_) => "Storage unavailable".to_owned(),
            Self::Mismatch(_) => "Server error".to_owned(),
        }
    }
}

/// Reacts to one kind of inbound frame.
pub trait FrameHandler: Send + Sync {
    fn kind(&self) -> FrameKind;

    fn can_handle(&self, kind: FrameKind) -> bool {
        self.kind() == kind
    }

    fn handle<'a>(&'a self, envelope: Envelope, ctx: &'a mut SessionContext) -> HandlerFuture<'a>;
}

/// Handler table, built once at startup and read-only afterwards.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<FrameKind, Arc<dyn FrameHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for its kind, replacing any earlier one.
    pub fn register(&mut self, handler: Arc<dyn FrameHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn handles(&self, kind: FrameKind) -> bool {
        self.handlers.get(&kind).is_some_and(|h| h.can_handle(kind))
    }

    /// Route one decoded frame. Returns false if the frame was rejected.
    ///
    /// Handler errors and panics are reported to the connection as error
    /// frames; neither escapes this call.
    pub async fn dispatch(&self, envelope: Envelope, ctx: &mut SessionContext) -> bool {
        let kind = envelope.kind();
        let handler = match self.handlers.get(&kind) {
            Some(h) if h.can_handle(kind) => Arc::clone(h),
            _ => {
                tracing::debug!(conn = ctx.connection_id(), %kind, "no handler for frame");
                ctx.send_error(ErrorCode::UnknownType, format!("Unknown type: {kind}"));
                return false;
            }
        };

        let outcome = AssertUnwindSafe(handler.handle(envelope, ctx)).catch_unwind().await;
        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(conn = ctx.connection_id(), %kind, err = %e, "handler failed");
                ctx.send_error(e.code(), e.client_message());
                false
            }
            Err(_) => {
                tracing::error!(conn = ctx.connection_id(), %kind, "handler panicked");
                ctx.send_error(ErrorCode::Internal, "Server error");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
