// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{RecordingTransport, StateBuilder};

#[tokio::test]
async fn healthy_with_connections() -> anyhow::Result<()> {
    let state = StateBuilder::new().build()?;
    let a = RecordingTransport::new();
    let b = RecordingTransport::new();
    state.registry.register("cust1", a.handle());
    state.registry.register("soporte_tecnico", b.handle());
    state.registry.update_profile("cust1", Some("Ana"), Some("555"));

    let report = report(&state).await;

    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.dependencies.store);
    assert_eq!(report.active_connections, 2);
    assert_eq!(report.connections[0].user_id, "cust1");
    assert_eq!(report.connections[0].name, "Ana");
    assert_eq!(report.connections[1].user_id, "soporte_tecnico");
    Ok(())
}

#[tokio::test]
async fn degraded_when_store_down() -> anyhow::Result<()> {
    let state = StateBuilder::new().failing_store().build()?;

    let report = report(&state).await;

    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(!report.dependencies.store);
    assert_eq!(report.active_connections, 0);
    Ok(())
}

#[tokio::test]
async fn serializes_lowercase_status() -> anyhow::Result<()> {
    let state = StateBuilder::new().build()?;
    let json = serde_json::to_value(report(&state).await)?;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["dependencies"]["store"], true);
    assert!(json["connections"].as_array().is_some_and(|c| c.is_empty()));
    Ok(())
}
