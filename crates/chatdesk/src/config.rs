// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Identity reserved for the support desk unless overridden.
pub const DEFAULT_SUPPORT_ID: &str = "soporte_tecnico";

/// Support chat relay between anonymous customers and the support desk.
#[derive(Debug, Clone, Parser)]
#[command(name = "chatdesk", version, about)]
pub struct RelayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "CHATDESK_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8765, env = "CHATDESK_PORT")]
    pub port: u16,

    /// SQLite database holding chat history (`:memory:` for a throwaway store).
    #[arg(long, default_value = "chat_history.db", env = "CHATDESK_DB_PATH")]
    pub db_path: PathBuf,

    /// Identity that designates the support desk.
    #[arg(long, default_value = DEFAULT_SUPPORT_ID, env = "CHATDESK_SUPPORT_ID")]
    pub support_id: String,

    /// Bearer token for the HTTP chat API. If unset, auth is disabled.
    #[arg(long, env = "CHATDESK_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Close connections that stay silent this long. Disabled when unset.
    #[arg(long, env = "CHATDESK_IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Close the previous socket when an identity authenticates again elsewhere.
    #[arg(long, default_value_t = false, env = "CHATDESK_EVICT_SUPERSEDED")]
    pub evict_superseded: bool,

    /// Outbound frames queued per connection before sends start failing.
    #[arg(long, default_value_t = 256, env = "CHATDESK_OUTBOUND_BUFFER")]
    pub outbound_buffer: usize,

    /// Log format (json or text).
    #[arg(long, default_value = "json", env = "CHATDESK_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "CHATDESK_LOG_LEVEL")]
    pub log_level: String,
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.filter(|secs| *secs > 0).map(Duration::from_secs)
    }

    /// Outbound queue capacity, never zero (tokio channels reject zero).
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_buffer.max(1)
    }

    /// Settings the relay core needs, detached from the CLI surface.
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            support_id: self.support_id.clone(),
            idle_timeout: self.idle_timeout(),
            evict_superseded: self.evict_superseded,
            outbound_capacity: self.outbound_capacity(),
        }
    }
}

/// Runtime settings shared by every connection supervisor.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub support_id: String,
    pub idle_timeout: Option<Duration>,
    pub evict_superseded: bool,
    pub outbound_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            support_id: DEFAULT_SUPPORT_ID.to_owned(),
            idle_timeout: None,
            evict_superseded: false,
            outbound_capacity: 256,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
