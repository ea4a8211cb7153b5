// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `chatdesk` binary and exercise
//! its HTTP and WebSocket surfaces.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use chatdesk::config::DEFAULT_SUPPORT_ID;
use chatdesk_specs::ChatdeskProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn send(ws: &mut Ws, frame: serde_json::Value) -> anyhow::Result<()> {
    ws.send(Message::Text(frame.to_string().into())).await?;
    Ok(())
}

/// Read frames until one of type `kind` arrives.
async fn expect(ws: &mut Ws, kind: &str) -> anyhow::Result<serde_json::Value> {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => anyhow::bail!("ws closed while waiting for {kind}"),
            _ => continue,
        };
        let parsed: serde_json::Value = serde_json::from_str(&text)?;
        if parsed["type"] == kind {
            return Ok(parsed);
        }
    }
}

// -- HTTP ---------------------------------------------------------------------

#[tokio::test]
async fn http_health() -> anyhow::Result<()> {
    let relay = ChatdeskProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", relay.base_url())).await?.json().await?;

    assert_eq!(resp["status"], "healthy");
    assert_eq!(resp["active_connections"], 0);
    assert_eq!(resp["dependencies"]["store"], true);
    assert!(resp["timestamp"].is_string());

    Ok(())
}

#[tokio::test]
async fn http_api_requires_token_when_configured() -> anyhow::Result<()> {
    let relay = ChatdeskProcess::build().auth_token("smoke-token").spawn()?;
    relay.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/chat/sessions", relay.base_url());

    let denied = client.get(&url).send().await?;
    assert_eq!(denied.status().as_u16(), 401);

    let allowed = client.get(&url).bearer_auth("smoke-token").send().await?;
    assert!(allowed.status().is_success());

    Ok(())
}

// -- WebSocket ----------------------------------------------------------------

#[tokio::test]
async fn ws_customer_reaches_support_desk() -> anyhow::Result<()> {
    let relay = ChatdeskProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    let (mut desk, _) = tokio_tungstenite::connect_async(relay.ws_url("")).await?;
    send(&mut desk, serde_json::json!({"type": "auth", "user_id": DEFAULT_SUPPORT_ID})).await?;

    let (mut cust, _) = tokio_tungstenite::connect_async(relay.ws_url("?user_id=smoke1")).await?;
    send(&mut cust, serde_json::json!({"type": "auth", "name": "Smoke"})).await?;

    let online = expect(&mut desk, "command").await?;
    assert_eq!(online["user_id"], "smoke1");
    assert_eq!(online["status"], "online");
    assert_eq!(online["name"], "Smoke");

    send(
        &mut cust,
        serde_json::json!({"type": "message", "receiver_id": DEFAULT_SUPPORT_ID, "message": "hola"}),
    )
    .await?;

    let forwarded = expect(&mut desk, "message").await?;
    assert_eq!(forwarded["sender_id"], "smoke1");
    assert_eq!(forwarded["message"], "hola");
    assert_eq!(forwarded["name"], "Usuario");

    let echo = expect(&mut cust, "message").await?;
    assert_eq!(echo["message"], "hola");

    cust.close(None).await?;
    let offline = expect(&mut desk, "command").await?;
    assert_eq!(offline["status"], "offline");

    Ok(())
}

#[tokio::test]
async fn ws_history_survives_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("history.db");

    {
        let relay = ChatdeskProcess::build().db_path(&db).spawn()?;
        relay.wait_healthy(TIMEOUT).await?;
        let (mut cust, _) = tokio_tungstenite::connect_async(relay.ws_url("")).await?;
        send(&mut cust, serde_json::json!({"type": "auth", "user_id": "smoke2"})).await?;
        send(
            &mut cust,
            serde_json::json!({"type": "message", "receiver_id": DEFAULT_SUPPORT_ID, "message": "persist me"}),
        )
        .await?;
        expect(&mut cust, "message").await?;
    }

    let relay = ChatdeskProcess::build().db_path(&db).spawn()?;
    relay.wait_healthy(TIMEOUT).await?;
    let (mut cust, _) = tokio_tungstenite::connect_async(relay.ws_url("")).await?;
    send(&mut cust, serde_json::json!({"type": "auth", "user_id": "smoke2"})).await?;

    let replay = expect(&mut cust, "message").await?;
    assert_eq!(replay["message"], "persist me");
    assert_eq!(replay["is_history"], true);

    let history: serde_json::Value =
        reqwest::get(format!("{}/api/v1/chat/history/smoke2", relay.base_url())).await?.json().await?;
    assert_eq!(history["messages"].as_array().map(Vec::len), Some(1));

    Ok(())
}

// -- Lifecycle ----------------------------------------------------------------

#[tokio::test]
async fn sigterm_exits_cleanly() -> anyhow::Result<()> {
    let mut relay = ChatdeskProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    relay.terminate()?;
    let status = relay.wait_exit(TIMEOUT).await?;
    assert!(status.success(), "exit status: {status}");

    Ok(())
}

#[tokio::test]
async fn port_in_use_exits_with_failure() -> anyhow::Result<()> {
    let first = ChatdeskProcess::start()?;
    first.wait_healthy(TIMEOUT).await?;

    let mut second = ChatdeskProcess::build().port(first.port()).spawn()?;
    let status = second.wait_exit(TIMEOUT).await?;
    assert_eq!(status.code(), Some(1));

    Ok(())
}
