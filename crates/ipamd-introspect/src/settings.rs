// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Environment settings snapshots.
//!
//! The settings endpoints report the raw values of the environment variables
//! that tune the network utilities and the daemon itself. Values are captured
//! once at startup; unset variables are reported as `null`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::env;

use crate::config::ENV_DISABLE_INTROSPECTION;
use crate::snapshot::SnapshotSource;

/// Variables read by the host network utilities.
pub const NETWORKUTILS_ENV_KEYS: &[&str] = &[
    "AWS_VPC_CNI_NODE_PORT_SUPPORT",
    "AWS_VPC_K8S_CNI_CONNMARK",
    "AWS_VPC_K8S_CNI_EXTERNALSNAT",
    "AWS_VPC_K8S_CNI_RANDOMIZESNAT",
    "AWS_VPC_K8S_CNI_EXCLUDE_SNAT_CIDRS",
    "AWS_VPC_ENI_MTU",
    "AWS_VPC_K8S_CNI_VETHPREFIX",
];

/// Variables read by the IPAM daemon.
pub const IPAMD_ENV_KEYS: &[&str] = &[
    "WARM_ENI_TARGET",
    "WARM_IP_TARGET",
    "MINIMUM_IP_TARGET",
    "WARM_PREFIX_TARGET",
    "MAX_ENI",
    "AWS_VPC_K8S_CNI_CUSTOM_NETWORK_CFG",
    "ENABLE_POD_ENI",
    "ENABLE_PREFIX_DELEGATION",
    ENV_DISABLE_INTROSPECTION,
];

/// Captured values of a fixed set of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnvSettings {
    values: BTreeMap<String, Option<String>>,
}

impl EnvSettings {
    /// Capture `keys` from the process environment.
    pub fn from_env(keys: &[&str]) -> Self {
        Self::capture(keys, |name| env::var(name).ok())
    }

    /// Capture `keys` through an arbitrary variable lookup.
    pub fn capture<F>(keys: &[&str], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let values = keys
            .iter()
            .map(|&key| (key.to_string(), lookup(key)))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SnapshotSource for EnvSettings {
    type Snapshot = Self;

    fn snapshot(&self) -> Self {
        self.clone()
    }
}
