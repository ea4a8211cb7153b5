// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `auth` frames: bind the connection, replay history, announce presence.

use std::sync::Arc;

use super::{FrameHandler, HandlerError, HandlerFuture};
use crate::context::SessionContext;
use crate::error::ErrorCode;
use crate::presence::PresenceNotifier;
use crate::protocol::{AuthFrame, ChatFrame, Envelope, FrameKind, PresenceStatus};
use crate::registry::{ConnectionRegistry, Registration};
use crate::store::{HistoryRecord, Persistence};

pub struct AuthHandler {
    registry: Arc<ConnectionRegistry>,
    persistence: Persistence,
    presence: Arc<PresenceNotifier>,
    support_id: String,
    evict_superseded: bool,
}

impl AuthHandler {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        persistence: Persistence,
        presence: Arc<PresenceNotifier>,
        support_id: impl Into<String>,
        evict_superseded: bool,
    ) -> Self {
        Self { registry, persistence, presence, support_id: support_id.into(), evict_superseded }
    }

    async fn authenticate(&self, auth: AuthFrame, ctx: &mut SessionContext) {
        let identity = auth
            .identity
            .or_else(|| ctx.requested_identity().map(str::to_owned))
            .unwrap_or_else(guest_identity);

        // Re-auth under a new identity frees the old one.
        if let Some(previous) = ctx.identity().filter(|prev| *prev != identity).map(str::to_owned) {
            if let Some(profile) = self.registry.release(&previous, ctx.connection_id()) {
                self.presence.notify_status(&previous, PresenceStatus::Offline, Some(&profile));
            }
        }

        match self.registry.register(&identity, Arc::clone(ctx.transport())) {
            Registration::New | Registration::Refreshed => {}
            Registration::Superseded(old) => {
                if self.evict_superseded {
                    tracing::info!(identity = %identity, old_conn = old.id(), "evicting superseded connection");
                    old.close();
                } else {
                    tracing::warn!(identity = %identity, old_conn = old.id(), "identity taken over by new connection");
                }
            }
        }
        self.registry.update_profile(&identity, auth.display_name.as_deref(), auth.phone.as_deref());
        ctx.bind(identity.clone());
        tracing::info!(conn = ctx.connection_id(), identity = %identity, "authenticated");

        self.replay_history(&identity, ctx).await;

        if identity != self.support_id {
            let profile = self.registry.profile(&identity);
            self.presence.notify_status(&identity, PresenceStatus::Online, profile.as_ref());
        }
    }

    async fn replay_history(&self, identity: &str, ctx: &SessionContext) {
        let records = match self.persistence.history_for(identity).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(identity, err = %e, "history load failed");
                ctx.send_error(ErrorCode::StorageUnavailable, "Failed to load history");
                return;
            }
        };
        tracing::debug!(identity, count = records.len(), "replaying history");
        let total = records.len();
        for (sent, record) in records.into_iter().enumerate() {
            if let Err(e) = ctx.send_wait(&history_frame(record)).await {
                tracing::info!(identity, sent, total, err = %e, "history replay cut short");
                break;
            }
        }
    }
}

impl FrameHandler for AuthHandler {
    fn kind(&self) -> FrameKind {
        FrameKind::Auth
    }

    fn handle<'a>(&'a self, envelope: Envelope, ctx: &'a mut SessionContext) -> HandlerFuture<'a> {
        Box::pin(async move {
            let auth = match envelope {
                Envelope::Auth(auth) => auth,
                other => return Err(HandlerError::Mismatch(other.kind())),
            };
            self.authenticate(auth, ctx).await;
            Ok(())
        })
    }
}

/// Stored record as a replayed `message` frame.
pub fn history_frame(record: HistoryRecord) -> Envelope {
    Envelope::Chat(ChatFrame {
        sender: Some(record.sender_id),
        receiver: record.receiver_id,
        text: record.message,
        display_name: Some(record.display_name),
        timestamp: Some(record.created_at),
        is_history: Some(true),
        ..ChatFrame::default()
    })
}

fn guest_identity() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("guest-{}", &id[..12])
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
