// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use chatdesk::config::RelayConfig;

#[tokio::main]
async fn main() {
    let config = RelayConfig::parse();
    chatdesk::init_tracing(&config);

    if let Err(e) = chatdesk::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
