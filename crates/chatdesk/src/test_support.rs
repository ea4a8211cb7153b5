// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: fake transports, stores, and state builders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::RelaySettings;
use crate::context::SessionContext;
use crate::outbound::{next_connection_id, ConnectionId, Transport, TransportError};
use crate::state::RelayState;
use crate::store::{HistoryRecord, HistoryStore, NewRecord, SqliteStore, StoreError};

pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Transport that keeps every frame it is handed.
pub struct RecordingTransport {
    id: ConnectionId,
    frames: Mutex<Vec<String>>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: next_connection_id(),
            frames: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Type-erased handle for the registry.
    pub fn handle(self: &Arc<Self>) -> Arc<dyn Transport> {
        Arc::clone(self) as Arc<dyn Transport>
    }

    /// Make every subsequent send fail with [`TransportError::Backlogged`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn raw(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// Frames received so far, parsed as JSON.
    pub fn frames(&self) -> anyhow::Result<Vec<Value>> {
        self.frames.lock().iter().map(|f| serde_json::from_str(f).map_err(anyhow::Error::from)).collect()
    }

    /// Parsed frames whose `type` is `kind`.
    pub fn frames_of(&self, kind: &str) -> anyhow::Result<Vec<Value>> {
        Ok(self.frames()?.into_iter().filter(|f| f["type"] == kind).collect())
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

impl Transport for RecordingTransport {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Backlogged);
        }
        self.frames.lock().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Store whose every operation fails, for degraded-mode tests.
pub struct FailingStore;

impl FailingStore {
    fn err() -> StoreError {
        StoreError::Unavailable("disk on fire".to_owned())
    }
}

impl HistoryStore for FailingStore {
    fn append(&self, _: &NewRecord) -> Result<i64, StoreError> {
        Err(Self::err())
    }
    fn history_for(&self, _: &str) -> Result<Vec<HistoryRecord>, StoreError> {
        Err(Self::err())
    }
    fn clear(&self, _: &str) -> Result<usize, StoreError> {
        Err(Self::err())
    }
    fn delete_record(&self, _: i64) -> Result<bool, StoreError> {
        Err(Self::err())
    }
    fn all(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        Err(Self::err())
    }
    fn ping(&self) -> Result<(), StoreError> {
        Err(Self::err())
    }
}

/// Builder for constructing `RelayState` in tests with sensible defaults.
pub struct StateBuilder {
    settings: RelaySettings,
    store: Option<Arc<dyn HistoryStore>>,
    auth_token: Option<String>,
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBuilder {
    pub fn new() -> Self {
        Self { settings: RelaySettings::default(), store: None, auth_token: None }
    }

    pub fn store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn failing_store(self) -> Self {
        self.store(Arc::new(FailingStore))
    }

    pub fn evict_superseded(mut self, evict: bool) -> Self {
        self.settings.evict_superseded = evict;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.settings.idle_timeout = Some(timeout);
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn build(self) -> anyhow::Result<Arc<RelayState>> {
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(SqliteStore::open_in_memory(self.settings.support_id.clone())?),
        };
        let state = RelayState::new(self.settings, store, CancellationToken::new())
            .with_auth_token(self.auth_token);
        Ok(Arc::new(state))
    }
}

/// A recording transport plus a context wrapping it.
pub fn session() -> (Arc<RecordingTransport>, SessionContext) {
    let transport = RecordingTransport::new();
    let ctx = SessionContext::new(transport.handle(), None);
    (transport, ctx)
}
