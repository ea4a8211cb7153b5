// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `message` frames: route to the receiver, persist, echo. `/clean` clears history.

use std::sync::Arc;

use chrono::Utc;

use super::{FrameHandler, HandlerError, HandlerFuture};
use crate::context::SessionContext;
use crate::error::ErrorCode;
use crate::protocol::{
    encode, ChatFrame, Envelope, FrameKind, DEFAULT_DISPLAY_NAME, DEFAULT_PHONE,
};
use crate::registry::ConnectionRegistry;
use crate::store::{NewRecord, Persistence};

/// Identity given to a connection that chats before authenticating.
pub const ANONYMOUS_IDENTITY: &str = "usuario_anonimo";

/// What happened to the live copy of a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Forwarded,
    ReceiverOffline,
    Failed,
}

pub struct ChatHandler {
    registry: Arc<ConnectionRegistry>,
    persistence: Persistence,
    support_id: String,
}

impl ChatHandler {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        persistence: Persistence,
        support_id: impl Into<String>,
    ) -> Self {
        Self { registry, persistence, support_id: support_id.into() }
    }

    /// Identity to send as, binding a fallback if the connection never authenticated.
    fn sender_identity(ctx: &mut SessionContext, chat: &ChatFrame) -> String {
        if let Some(identity) = ctx.identity() {
            return identity.to_owned();
        }
        let fallback = chat
            .claimed_identity
            .clone()
            .or_else(|| ctx.requested_identity().map(str::to_owned))
            .unwrap_or_else(|| ANONYMOUS_IDENTITY.to_owned());
        tracing::info!(conn = ctx.connection_id(), identity = %fallback, "chat before auth");
        ctx.bind(fallback.clone());
        fallback
    }

    async fn route(&self, sender: String, chat: ChatFrame, ctx: &SessionContext) {
        let display_name = chat.display_name.unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_owned());
        let outgoing = Envelope::Chat(ChatFrame {
            sender: Some(sender.clone()),
            receiver: chat.receiver.clone(),
            text: chat.text.clone(),
            display_name: Some(display_name.clone()),
            phone: Some(chat.phone.unwrap_or_else(|| DEFAULT_PHONE.to_owned())),
            timestamp: Some(Utc::now()),
            ..ChatFrame::default()
        });
        let frame = encode(&outgoing);

        let delivery = match self.registry.lookup(&chat.receiver) {
            // Talking to yourself: the echo below is the only copy.
            Some(receiver) if receiver.id() == ctx.connection_id() => Delivery::Forwarded,
            Some(receiver) => match receiver.send(frame.clone()) {
                Ok(()) => Delivery::Forwarded,
                Err(e) => {
                    tracing::warn!(sender = %sender, receiver = %chat.receiver, err = %e, "delivery failed");
                    ctx.send_error(ErrorCode::DeliveryFailed, "Delivery failed");
                    Delivery::Failed
                }
            },
            None => Delivery::ReceiverOffline,
        };

        let record = NewRecord {
            sender_id: sender.clone(),
            receiver_id: chat.receiver.clone(),
            message: chat.text,
            display_name,
        };
        if let Err(e) = self.persistence.append(record).await {
            tracing::error!(sender = %sender, receiver = %chat.receiver, err = %e, "failed to persist message");
        }

        if delivery != Delivery::Failed {
            let _ = ctx.send_frame(frame);
        }
        tracing::debug!(sender = %sender, receiver = %chat.receiver, ?delivery, "message routed");
    }

    /// Whether this connection holds the registry entry for `identity`.
    fn owns(&self, identity: &str, ctx: &SessionContext) -> bool {
        self.registry.lookup(identity).is_some_and(|t| t.id() == ctx.connection_id())
    }

    async fn clean(
        &self,
        sender: String,
        receiver: String,
        ctx: &SessionContext,
    ) -> Result<(), HandlerError> {
        // Desk clears reach other identities' history; only the registered desk may issue them.
        if sender == self.support_id && !self.owns(&sender, ctx) {
            tracing::warn!(conn = ctx.connection_id(), receiver = %receiver, "clean refused for unauthenticated desk claim");
            return Err(HandlerError::Rejected(
                "Authenticate as the support desk to clear history".to_owned(),
            ));
        }
        let target = if sender == self.support_id { receiver.clone() } else { sender.clone() };

        match self.persistence.clear(&target).await {
            Ok(removed) => tracing::info!(sender = %sender, target = %target, removed, "history cleared"),
            Err(e) => {
                tracing::error!(sender = %sender, target = %target, err = %e, "history clear failed");
                ctx.send_error(ErrorCode::StorageUnavailable, "Clear failed");
            }
        }

        let frame = encode(&Envelope::clean(target));
        if let Some(peer) = self.registry.lookup(&receiver) {
            if peer.id() != ctx.connection_id() {
                if let Err(e) = peer.send(frame.clone()) {
                    tracing::debug!(receiver = %receiver, err = %e, "clean notice not delivered");
                }
            }
        }
        let _ = ctx.send_frame(frame);
        Ok(())
    }
}

impl FrameHandler for ChatHandler {
    fn kind(&self) -> FrameKind {
        FrameKind::Chat
    }

    fn handle<'a>(&'a self, envelope: Envelope, ctx: &'a mut SessionContext) -> HandlerFuture<'a> {
        Box::pin(async move {
            let chat = match envelope {
                Envelope::Chat(chat) => chat,
                other => return Err(HandlerError::Mismatch(other.kind())),
            };
            let sender = Self::sender_identity(ctx, &chat);
            if chat.is_clean_command() {
                self.clean(sender, chat.receiver, ctx).await
            } else {
                self.route(sender, chat, ctx).await;
                Ok(())
            }
        })
    }
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
