// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort online/offline notices to the support desk.

use std::sync::Arc;

use crate::protocol::{encode, Envelope, PresenceStatus};
use crate::registry::{ConnectionRegistry, Profile};

pub struct PresenceNotifier {
    registry: Arc<ConnectionRegistry>,
    support_id: String,
}

impl PresenceNotifier {
    pub fn new(registry: Arc<ConnectionRegistry>, support_id: impl Into<String>) -> Self {
        Self { registry, support_id: support_id.into() }
    }

    /// Tell the support desk that `identity` changed status.
    ///
    /// Dropped silently when the desk is offline; one send attempt, no retry.
    /// Returns whether the notice was handed to the desk's transport.
    pub fn notify_status(
        &self,
        identity: &str,
        status: PresenceStatus,
        profile: Option<&Profile>,
    ) -> bool {
        if identity == self.support_id {
            return false;
        }
        let Some(desk) = self.registry.lookup(&self.support_id) else {
            tracing::debug!(identity, status = status.as_str(), "support desk offline, presence dropped");
            return false;
        };
        let frame = encode(&Envelope::status(
            identity,
            status,
            profile.map(|p| p.name.clone()),
            profile.map(|p| p.phone.clone()),
        ));
        match desk.send(frame) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(identity, status = status.as_str(), err = %e, "presence notify failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
