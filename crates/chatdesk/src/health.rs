// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Point-in-time health report: store liveness plus who is online.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::RelayState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Whether the history store answered a ping.
    pub store: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub active_connections: usize,
    pub dependencies: Dependencies,
    pub connections: Vec<ConnectionSummary>,
}

/// Build a report. A failing store degrades the status but never errors.
pub async fn report(state: &RelayState) -> HealthReport {
    let store = match state.persistence.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(err = %e, "health: store ping failed");
            false
        }
    };
    let connections: Vec<ConnectionSummary> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|(user_id, p)| ConnectionSummary {
            user_id,
            name: p.name,
            phone: p.phone,
            connected_at: p.connected_at,
        })
        .collect();

    HealthReport {
        status: if store { HealthStatus::Healthy } else { HealthStatus::Degraded },
        timestamp: Utc::now(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_connections: connections.len(),
        dependencies: Dependencies { store },
        connections,
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
