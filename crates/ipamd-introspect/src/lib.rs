// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IPAM daemon introspection endpoints
//!
//! Read-only HTTP endpoints exposing JSON snapshots of the daemon's state:
//! allocated network interfaces, pod address assignments and the active
//! configuration. The server listens on loopback only and never mutates
//! anything.
//!
//! # Endpoints
//!
//! - `GET /v1/enis` - ENI inventory
//! - `GET /v1/eni-configs` - ENI configuration
//! - `GET /v1/pods` - Pod to address assignments
//! - `GET /v1/networkutils-env-settings` - Network utilities settings
//! - `GET /v1/ipamd-env-settings` - Daemon settings
//! - any other path - `{"AvailableCommands": [...]}`
//!
//! # Embedding
//!
//! ```no_run
//! use ipamd_introspect::{serve_introspection, Collaborators, EnvSettings, IntrospectionConfig};
//! use ipamd_introspect::settings::{IPAMD_ENV_KEYS, NETWORKUTILS_ENV_KEYS};
//!
//! # async fn start() {
//! let config = IntrospectionConfig::from_env();
//! let collaborators = Collaborators::new(
//!     || Vec::<String>::new(),
//!     || serde_json::Value::Null,
//!     || Vec::<String>::new(),
//!     EnvSettings::from_env(NETWORKUTILS_ENV_KEYS),
//!     EnvSettings::from_env(IPAMD_ENV_KEYS),
//! );
//! // Runs on its own task; the handle never resolves.
//! let _handle = serve_introspection(&config, collaborators);
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod fixture;
pub mod listener;
pub mod middleware;
pub mod registry;
pub mod settings;
pub mod snapshot;

pub use backoff::{Backoff, BackoffConfig};
pub use config::IntrospectionConfig;
pub use error::{ConfigError, IntrospectError};
pub use fixture::InventoryFixture;
pub use listener::{ListenerStats, ListenerStatsSnapshot, ResilientListener};
pub use registry::{Collaborators, RootResponse, RouteRegistry};
pub use settings::EnvSettings;
pub use snapshot::{JsonSnapshot, SnapshotHandler, SnapshotSource, SnapshotStatsSnapshot};

use axum::Router;
use std::convert::Infallible;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Full handler graph: request logging around the route registry.
pub fn build_router(registry: &RouteRegistry) -> Router {
    registry
        .router()
        .layer(axum::middleware::from_fn(middleware::log_request))
}

/// Build the listener for `config` without starting it.
pub fn introspection_listener(
    config: &IntrospectionConfig,
    collaborators: Collaborators,
) -> Result<ResilientListener, IntrospectError> {
    config.validate()?;
    let registry = RouteRegistry::new(collaborators)?;
    Ok(
        ResilientListener::new(config.bind_address, build_router(&registry), config.backoff)
            .with_request_timeout(config.request_timeout()),
    )
}

/// Start the introspection endpoints unless disabled.
///
/// Returns the handle of the serving task, or `None` when the service is
/// disabled or could not be set up. The task never completes.
pub fn serve_introspection(
    config: &IntrospectionConfig,
    collaborators: Collaborators,
) -> Option<JoinHandle<Infallible>> {
    if !config.is_enabled() {
        info!("Introspection endpoints disabled");
        return None;
    }

    match introspection_listener(config, collaborators) {
        Ok(listener) => Some(listener.spawn()),
        Err(e) => {
            error!("Failed to set up introspection endpoints: {}", e);
            None
        }
    }
}
