// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Introspection service configuration.
//!
//! The configuration is built once at daemon startup and passed by reference
//! to [`crate::serve_introspection`]. Only one switch is read from the
//! environment:
//!
//! - `DISABLE_INTROSPECTION`: disable every introspection endpoint
//!   (`"true"`, `"1"`, `"T"`, ...). Unset, empty or unparseable values keep
//!   the service enabled.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::error;

use crate::backoff::BackoffConfig;
use crate::error::ConfigError;

/// Environment variable disabling the introspection endpoints.
pub const ENV_DISABLE_INTROSPECTION: &str = "DISABLE_INTROSPECTION";

/// Loopback port the introspection endpoints listen on.
pub const INTROSPECTION_PORT: u16 = 61679;

/// Read and write timeout applied to every connection, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Introspection server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionConfig {
    /// Disable the whole service (default: false)
    #[serde(default)]
    pub disabled: bool,

    /// Address to bind to (default: 127.0.0.1:61679)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Per-request read/write timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retry policy for the listen loop
    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, INTROSPECTION_PORT))
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            bind_address: default_bind_address(),
            request_timeout_secs: default_request_timeout(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl IntrospectionConfig {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            disabled: env_bool_with_default(&lookup, ENV_DISABLE_INTROSPECTION, false),
            ..Default::default()
        }
    }

    /// Override the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Override the listen loop backoff.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "request_timeout_secs cannot be 0".into(),
            ));
        }
        self.backoff.validate()
    }
}

/// Read a boolean variable, falling back to `default` when it is unset,
/// empty or unparseable. Parse failures are logged.
pub fn env_bool_with_default<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).filter(|value| !value.is_empty()) {
        Some(value) => parse_bool(name, &value).unwrap_or_else(|err| {
            error!("Failed to parse {}, using default `{}`: {}", name, default, err);
            default
        }),
        None => default,
    }
}

/// Parse the boolean spellings accepted by the daemon's other switches.
pub fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
