// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Static inventory used when the server runs outside the daemon.
//!
//! A fixture is a JSON document with up to three sections:
//!
//! ```json
//! {
//!   "enis": [{"id": "eni-0a1b", "device_number": 0, "ips": ["10.0.1.12"]}],
//!   "eni_configs": {"name": "us-west-2a", "subnet": "subnet-0123"},
//!   "pods": [{"name": "coredns-5c4f", "namespace": "kube-system", "ip": "10.0.1.12"}]
//! }
//! ```
//!
//! Sections are served verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::registry::Collaborators;
use crate::settings::EnvSettings;

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

/// Inventory snapshots loaded from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryFixture {
    #[serde(default = "empty_list")]
    pub enis: Value,

    #[serde(default)]
    pub eni_configs: Value,

    #[serde(default = "empty_list")]
    pub pods: Value,
}

impl Default for InventoryFixture {
    fn default() -> Self {
        Self {
            enis: empty_list(),
            eni_configs: Value::Null,
            pods: empty_list(),
        }
    }
}

impl InventoryFixture {
    /// Load a fixture from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Wire the fixture sections and settings into the route collaborators.
    pub fn into_collaborators(
        self,
        network_settings: EnvSettings,
        daemon_settings: EnvSettings,
    ) -> Collaborators {
        let fixture = Arc::new(self);
        let enis = fixture.clone();
        let eni_configs = fixture.clone();
        let pods = fixture;

        Collaborators::new(
            move || enis.enis.clone(),
            move || eni_configs.eni_configs.clone(),
            move || pods.pods.clone(),
            network_settings,
            daemon_settings,
        )
    }
}
