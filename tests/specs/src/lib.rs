// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `chatdesk` binary as a subprocess and exercises it over
//! HTTP and WebSocket.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `chatdesk` binary.
pub fn chatdesk_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("chatdesk")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `chatdesk` process that is killed on drop.
pub struct ChatdeskProcess {
    child: Child,
    port: u16,
}

/// Builder for the flags a [`ChatdeskProcess`] is started with.
#[derive(Default)]
pub struct ChatdeskBuilder {
    port: Option<u16>,
    db_path: Option<PathBuf>,
    auth_token: Option<String>,
    extra: Vec<String>,
}

impl ChatdeskBuilder {
    /// Listen on a specific port instead of a fresh one.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// SQLite file to use (`--db-path`). Defaults to `:memory:`.
    pub fn db_path(mut self, path: &Path) -> Self {
        self.db_path = Some(path.to_owned());
        self
    }

    /// Require a bearer token on the HTTP API (`--auth-token`).
    pub fn auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    /// Append raw CLI arguments.
    pub fn arg(mut self, arg: &str) -> Self {
        self.extra.push(arg.to_owned());
        self
    }

    pub fn spawn(self) -> anyhow::Result<ChatdeskProcess> {
        ensure_crypto();
        let binary = chatdesk_binary();
        anyhow::ensure!(binary.exists(), "chatdesk binary not found at {}", binary.display());

        let port = match self.port {
            Some(p) => p,
            None => free_port()?,
        };
        let db_path = self
            .db_path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ":memory:".to_owned());

        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--db-path".into(),
            db_path,
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
        ];
        if let Some(token) = self.auth_token {
            args.extend(["--auth-token".into(), token]);
        }
        args.extend(self.extra);

        let child = Command::new(&binary)
            .args(&args)
            .env_remove("CHATDESK_AUTH_TOKEN")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(ChatdeskProcess { child, port })
    }
}

impl ChatdeskProcess {
    /// Create a builder for custom configuration.
    pub fn build() -> ChatdeskBuilder {
        ChatdeskBuilder::default()
    }

    /// Spawn chatdesk on a fresh port with an in-memory store.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Relay WebSocket URL, with an optional query string (`?user_id=...`).
    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://127.0.0.1:{}/api/v1/chat{query}", self.port)
    }

    /// Poll health until responsive.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("chatdesk did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Send SIGTERM via `kill(1)`.
    pub fn terminate(&self) -> anyhow::Result<()> {
        let status = Command::new("kill").args(["-TERM", &self.pid().to_string()]).status()?;
        anyhow::ensure!(status.success(), "kill -TERM failed: {status}");
        Ok(())
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(
        &mut self,
        timeout: Duration,
    ) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("chatdesk did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for ChatdeskProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
