// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request logging middleware.

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::info;

/// Log method, origin and URI of every request, then hand it on untouched.
pub async fn log_request(request: Request, next: Next) -> Response {
    let origin = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        method = %request.method(),
        from = %origin,
        uri = %request.uri(),
        "Handling http request"
    );

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Collaborators, RouteRegistry};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, StatusCode};
    use axum::Router;
    use serde::ser::Error as _;
    use serde::{Serialize, Serializer};
    use tower::ServiceExt;

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("broken settings"))
        }
    }

    fn registry() -> RouteRegistry {
        RouteRegistry::new(Collaborators::new(
            || vec![serde_json::json!({"id": "eni-0abc", "device_number": 0})],
            || serde_json::json!(null),
            || vec!["default/coredns"],
            || serde_json::json!({"AWS_VPC_K8S_CNI_VETHPREFIX": "eni"}),
            || Broken,
        ))
        .unwrap()
    }

    async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let mut request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_middleware_preserves_responses() {
        let registry = registry();
        let bare = registry.router();
        let logged = registry
            .router()
            .layer(axum::middleware::from_fn(log_request));

        for uri in [
            "/",
            "/v1/enis",
            "/v1/eni-configs",
            "/v1/pods",
            "/v1/networkutils-env-settings",
            "/v1/ipamd-env-settings",
            "/v1/unknown",
        ] {
            for method in [Method::GET, Method::POST] {
                let direct = call(bare.clone(), method.clone(), uri).await;
                let wrapped = call(logged.clone(), method, uri).await;
                assert_eq!(direct, wrapped, "{}", uri);
            }
        }
    }

    #[tokio::test]
    async fn test_middleware_without_connect_info() {
        let router = registry()
            .router()
            .layer(axum::middleware::from_fn(log_request));
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri("/v1/pods")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
