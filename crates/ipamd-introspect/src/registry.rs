// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route registry for the introspection endpoints.
//!
//! The route table is an ordered list built once. Any path that is not in the
//! table (including `/`) is answered with the list of available paths.

use axum::{
    body::Bytes,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use serde::{Deserialize, Serialize};
use std::future::ready;
use std::sync::Arc;

use crate::error::IntrospectError;
use crate::snapshot::{JsonSnapshot, SnapshotHandler, SnapshotSource, SnapshotStatsSnapshot};

pub const ENIS_PATH: &str = "/v1/enis";
pub const ENI_CONFIGS_PATH: &str = "/v1/eni-configs";
pub const PODS_PATH: &str = "/v1/pods";
pub const NETWORKUTILS_ENV_PATH: &str = "/v1/networkutils-env-settings";
pub const IPAMD_ENV_PATH: &str = "/v1/ipamd-env-settings";

/// Body of the self-describing default route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootResponse {
    #[serde(rename = "AvailableCommands")]
    pub available_commands: Vec<String>,
}

/// The daemon subsystems the endpoints read from.
pub struct Collaborators {
    pub eni_inventory: Arc<dyn JsonSnapshot>,
    pub eni_config: Arc<dyn JsonSnapshot>,
    pub pod_inventory: Arc<dyn JsonSnapshot>,
    pub network_settings: Arc<dyn JsonSnapshot>,
    pub daemon_settings: Arc<dyn JsonSnapshot>,
}

impl Collaborators {
    pub fn new<E, C, P, N, D>(
        eni_inventory: E,
        eni_config: C,
        pod_inventory: P,
        network_settings: N,
        daemon_settings: D,
    ) -> Self
    where
        E: SnapshotSource,
        C: SnapshotSource,
        P: SnapshotSource,
        N: SnapshotSource,
        D: SnapshotSource,
    {
        Self {
            eni_inventory: Arc::new(eni_inventory),
            eni_config: Arc::new(eni_config),
            pod_inventory: Arc::new(pod_inventory),
            network_settings: Arc::new(network_settings),
            daemon_settings: Arc::new(daemon_settings),
        }
    }
}

/// Fixed, ordered table of snapshot routes plus the default route.
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    routes: Vec<SnapshotHandler>,
    root: Bytes,
}

impl RouteRegistry {
    /// Build the route table and encode the root response once.
    pub fn new(collaborators: Collaborators) -> Result<Self, IntrospectError> {
        let routes = vec![
            SnapshotHandler::new(ENIS_PATH, "ENI data", collaborators.eni_inventory),
            SnapshotHandler::new(ENI_CONFIGS_PATH, "ENI config", collaborators.eni_config),
            SnapshotHandler::new(PODS_PATH, "pod data", collaborators.pod_inventory),
            SnapshotHandler::new(
                NETWORKUTILS_ENV_PATH,
                "network env var data",
                collaborators.network_settings,
            ),
            SnapshotHandler::new(
                IPAMD_ENV_PATH,
                "ipamd env var data",
                collaborators.daemon_settings,
            ),
        ];
        let root = RootResponse {
            available_commands: routes.iter().map(|r| r.path().to_string()).collect(),
        };
        let root = Bytes::from(serde_json::to_vec(&root)?);

        Ok(Self { routes, root })
    }

    /// Registered paths in registration order.
    pub fn paths(&self) -> Vec<&'static str> {
        self.routes.iter().map(SnapshotHandler::path).collect()
    }

    /// Counters for the route bound to `path`.
    pub fn stats(&self, path: &str) -> Option<SnapshotStatsSnapshot> {
        self.routes
            .iter()
            .find(|r| r.path() == path)
            .map(SnapshotHandler::stats)
    }

    /// Cached root response body.
    pub fn root_json(&self) -> &Bytes {
        &self.root
    }

    /// Routing for every path, without middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new();
        for route in &self.routes {
            let handler = route.clone();
            router = router.route(
                route.path(),
                any(move |method: Method| ready(handler.respond(&method))),
            );
        }

        let root = self.root.clone();
        router.fallback(move || ready(root_response(root.clone())))
    }
}

fn root_response(body: Bytes) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    fn registry() -> RouteRegistry {
        RouteRegistry::new(Collaborators::new(
            || vec!["eni-1", "eni-2"],
            || serde_json::json!({"subnet": "subnet-1"}),
            Vec::<String>::new,
            || BTreeMap::from([("AWS_VPC_ENI_MTU", "9001")]),
            || BTreeMap::from([("WARM_ENI_TARGET", "1")]),
        ))
        .unwrap()
    }

    async fn get(router: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_paths_are_ordered() {
        assert_eq!(
            registry().paths(),
            vec![
                ENIS_PATH,
                ENI_CONFIGS_PATH,
                PODS_PATH,
                NETWORKUTILS_ENV_PATH,
                IPAMD_ENV_PATH
            ]
        );
    }

    #[test]
    fn test_root_json_is_stable() {
        let first = registry();
        let second = registry();
        assert_eq!(first.root_json(), second.root_json());

        let root: RootResponse = serde_json::from_slice(first.root_json()).unwrap();
        assert_eq!(root.available_commands, first.paths());
        assert!(!root.available_commands.iter().any(|p| p == "/"));
    }

    #[tokio::test]
    async fn test_snapshot_routes() {
        let registry = registry();
        let (status, body) = get(registry.router(), Method::GET, ENIS_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["eni-1", "eni-2"]));

        let (status, body) = get(registry.router(), Method::GET, PODS_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));

        let (_, body) = get(registry.router(), Method::GET, NETWORKUTILS_ENV_PATH).await;
        assert_eq!(body["AWS_VPC_ENI_MTU"], "9001");

        assert_eq!(registry.stats(ENIS_PATH).unwrap().served, 1);
        assert_eq!(registry.stats(IPAMD_ENV_PATH).unwrap().served, 0);
        assert!(registry.stats("/v1/unknown").is_none());
    }

    #[tokio::test]
    async fn test_unknown_paths_describe_api() {
        let registry = registry();
        for uri in ["/", "/v1", "/v2/enis", "/v1/enis/extra", "/nothing?x=1"] {
            let (status, body) = get(registry.router(), Method::GET, uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            let root: RootResponse = serde_json::from_value(body).unwrap();
            let mut listed = root.available_commands.clone();
            let mut expected: Vec<String> =
                registry.paths().iter().map(|p| p.to_string()).collect();
            listed.sort();
            expected.sort();
            assert_eq!(listed, expected);
        }
    }

    #[tokio::test]
    async fn test_any_method_is_routed() {
        let registry = registry();
        let (status, body) = get(registry.router(), Method::POST, ENI_CONFIGS_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subnet"], "subnet-1");
    }

    #[tokio::test]
    async fn test_head_is_not_a_write_failure() {
        let registry = registry();
        let response = registry
            .router()
            .oneshot(
                Request::builder()
                    .method(Method::HEAD)
                    .uri(ENIS_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());

        let stats = registry.stats(ENIS_PATH).unwrap();
        assert_eq!(stats.served, 1);
        assert_eq!(stats.write_failures, 0);
    }
}
