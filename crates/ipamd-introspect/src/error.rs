// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the introspection service.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors raised while building or running the introspection server.
#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("http server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse {name}={value:?} as a boolean")]
    InvalidBool { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
