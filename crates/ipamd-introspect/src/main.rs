// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Standalone introspection server
//!
//! Serves the introspection endpoints over static inventory snapshots, for
//! inspecting tooling against a known state without a running daemon.
//!
//! # Usage
//!
//! ```bash
//! # Empty inventory on 127.0.0.1:61679
//! ipamd-introspect
//!
//! # Inventory from a fixture file
//! ipamd-introspect --fixture node-state.json --log-level debug
//!
//! # Disabled: exits after logging the notice
//! DISABLE_INTROSPECTION=true ipamd-introspect
//! ```

use clap::Parser;
use ipamd_introspect::settings::{IPAMD_ENV_KEYS, NETWORKUTILS_ENV_KEYS};
use ipamd_introspect::{serve_introspection, EnvSettings, IntrospectionConfig, InventoryFixture};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// IPAM daemon introspection endpoints
#[derive(Parser, Debug)]
#[command(name = "ipamd-introspect")]
#[command(about = "Read-only introspection endpoints for the IPAM daemon")]
#[command(version)]
struct Args {
    /// Inventory fixture (JSON with `enis`, `eni_configs` and `pods`)
    #[arg(short, long)]
    fixture: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("ipamd-introspect v{}", env!("CARGO_PKG_VERSION"));

    let config = IntrospectionConfig::from_env();
    let fixture = match &args.fixture {
        Some(path) => {
            info!("Loading inventory from {:?}", path);
            InventoryFixture::from_file(path)?
        }
        None => InventoryFixture::default(),
    };
    let collaborators = fixture.into_collaborators(
        EnvSettings::from_env(NETWORKUTILS_ENV_KEYS),
        EnvSettings::from_env(IPAMD_ENV_KEYS),
    );

    let Some(server) = serve_introspection(&config, collaborators) else {
        return Ok(());
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping introspection server");
    server.abort();
    Ok(())
}
