// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::RelaySettings;
use crate::handler::{AuthHandler, ChatHandler, HandlerRegistry};
use crate::presence::PresenceNotifier;
use crate::registry::ConnectionRegistry;
use crate::store::{HistoryStore, Persistence};

/// Shared relay state, built once at startup and handed to every connection.
pub struct RelayState {
    pub registry: Arc<ConnectionRegistry>,
    pub persistence: Persistence,
    pub presence: Arc<PresenceNotifier>,
    pub handlers: HandlerRegistry,
    pub settings: RelaySettings,
    /// Bearer token guarding the HTTP API, if configured.
    pub auth_token: Option<String>,
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl RelayState {
    pub fn new(
        settings: RelaySettings,
        store: Arc<dyn HistoryStore>,
        shutdown: CancellationToken,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let persistence = Persistence::new(store);
        let presence =
            Arc::new(PresenceNotifier::new(Arc::clone(&registry), settings.support_id.clone()));

        let mut handlers = HandlerRegistry::new();
        handlers.register(Arc::new(AuthHandler::new(
            Arc::clone(&registry),
            persistence.clone(),
            Arc::clone(&presence),
            settings.support_id.clone(),
            settings.evict_superseded,
        )));
        handlers.register(Arc::new(ChatHandler::new(
            Arc::clone(&registry),
            persistence.clone(),
            settings.support_id.clone(),
        )));

        Self {
            registry,
            persistence,
            presence,
            handlers,
            settings,
            auth_token: None,
            shutdown,
            started_at: Instant::now(),
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }
}
