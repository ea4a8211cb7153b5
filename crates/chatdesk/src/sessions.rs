// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Support-desk view of customer conversations.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::Profile;
use crate::store::HistoryRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub sid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub last_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<i64>,
    pub last_activity: DateTime<Utc>,
    pub online: bool,
}

/// One entry per customer identity, most recent activity first.
///
/// `records` must be oldest first. Customers known only from `online`
/// appear with an empty `last_message`.
pub fn summarize(
    records: &[HistoryRecord],
    online: &BTreeMap<String, Profile>,
    support_id: &str,
) -> Vec<SessionSummary> {
    let mut by_sid: HashMap<String, SessionSummary> = HashMap::new();

    for record in records {
        let (sid, name) = if record.sender_id != support_id {
            (&record.sender_id, Some(&record.display_name))
        } else if record.receiver_id != support_id {
            (&record.receiver_id, None)
        } else {
            continue;
        };
        let entry = by_sid.entry(sid.clone()).or_insert_with(|| SessionSummary {
            sid: sid.clone(),
            name: String::new(),
            phone: None,
            last_message: String::new(),
            last_id: None,
            last_activity: record.created_at,
            online: false,
        });
        if let Some(name) = name {
            entry.name = name.clone();
        }
        entry.last_message = record.message.clone();
        entry.last_id = Some(record.id);
        entry.last_activity = record.created_at;
    }

    for (sid, profile) in online.iter().filter(|(sid, _)| sid.as_str() != support_id) {
        let entry = by_sid.entry(sid.clone()).or_insert_with(|| SessionSummary {
            sid: sid.clone(),
            name: String::new(),
            phone: None,
            last_message: String::new(),
            last_id: None,
            last_activity: profile.connected_at,
            online: true,
        });
        entry.online = true;
        entry.name = profile.name.clone();
        entry.phone = Some(profile.phone.clone());
    }

    let mut sessions: Vec<SessionSummary> = by_sid
        .into_values()
        .map(|mut s| {
            if s.name.is_empty() {
                s.name = s.sid.clone();
            }
            s
        })
        .collect();
    sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity).then_with(|| a.sid.cmp(&b.sid)));
    sessions
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
