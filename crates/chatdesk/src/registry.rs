// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Who is online, and how to reach them.
//!
//! A single mutex guards the map so a lookup never observes a half-applied
//! register or profile update. The lock is never held across an await or a
//! send: callers get a cloned `Arc<dyn Transport>` and send outside it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::outbound::{ConnectionId, Transport};
use crate::protocol::{DEFAULT_DISPLAY_NAME, DEFAULT_PHONE};

/// Display metadata cached for an online identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: String,
    pub phone: String,
    pub connected_at: DateTime<Utc>,
}

impl Profile {
    fn fresh() -> Self {
        Self {
            name: DEFAULT_DISPLAY_NAME.to_owned(),
            phone: DEFAULT_PHONE.to_owned(),
            connected_at: Utc::now(),
        }
    }
}

/// Outcome of [`ConnectionRegistry::register`].
pub enum Registration {
    /// No entry existed for the identity.
    New,
    /// The same transport authenticated again.
    Refreshed,
    /// A different transport held the identity; it is returned unclosed.
    Superseded(Arc<dyn Transport>),
}

struct Entry {
    transport: Arc<dyn Transport>,
    profile: Profile,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `identity` to `transport`, last writer wins.
    pub fn register(&self, identity: &str, transport: Arc<dyn Transport>) -> Registration {
        let mut entries = self.entries.lock();
        let previous = entries.get(identity).map(|e| Arc::clone(&e.transport));
        match previous {
            Some(old) if old.id() == transport.id() => Registration::Refreshed,
            Some(old) => {
                entries.insert(identity.to_owned(), Entry { transport, profile: Profile::fresh() });
                Registration::Superseded(old)
            }
            None => {
                entries.insert(identity.to_owned(), Entry { transport, profile: Profile::fresh() });
                Registration::New
            }
        }
    }

    /// Drop `identity` regardless of which transport owns it.
    pub fn unregister(&self, identity: &str) -> Option<Arc<dyn Transport>> {
        self.entries.lock().remove(identity).map(|e| e.transport)
    }

    /// Drop `identity` only while `connection` still owns it.
    ///
    /// Returns the profile that was removed, if any.
    pub fn release(&self, identity: &str, connection: ConnectionId) -> Option<Profile> {
        let mut entries = self.entries.lock();
        match entries.get(identity) {
            Some(entry) if entry.transport.id() == connection => {
                entries.remove(identity).map(|e| e.profile)
            }
            _ => None,
        }
    }

    pub fn lookup(&self, identity: &str) -> Option<Arc<dyn Transport>> {
        self.entries.lock().get(identity).map(|e| Arc::clone(&e.transport))
    }

    pub fn is_online(&self, identity: &str) -> bool {
        self.entries.lock().contains_key(identity)
    }

    /// Overwrite the provided fields, keeping the rest. False if offline.
    pub fn update_profile(&self, identity: &str, name: Option<&str>, phone: Option<&str>) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(identity) else {
            return false;
        };
        if let Some(name) = name {
            entry.profile.name = name.to_owned();
        }
        if let Some(phone) = phone {
            entry.profile.phone = phone.to_owned();
        }
        true
    }

    pub fn profile(&self, identity: &str) -> Option<Profile> {
        self.entries.lock().get(identity).map(|e| e.profile.clone())
    }

    /// Point-in-time copy of every online identity and its profile.
    pub fn snapshot(&self) -> BTreeMap<String, Profile> {
        self.entries.lock().iter().map(|(id, e)| (id.clone(), e.profile.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
