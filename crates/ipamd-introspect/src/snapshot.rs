// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot sources and the handler that serves them.
//!
//! A [`SnapshotSource`] is a read-only view over one daemon subsystem. A
//! [`SnapshotHandler`] binds exactly one source to one route: it takes a
//! snapshot, encodes it as JSON and writes it out. Encoding failures turn
//! into a `500 Internal Server Error` without any partial body.

use axum::{
    body::{Body, Bytes},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};
use futures::stream;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Read-only view over a collaborator's state.
///
/// Implementations must be cheap to call: a snapshot is taken on every
/// request, concurrently with other requests.
pub trait SnapshotSource: Send + Sync + 'static {
    type Snapshot: Serialize;

    fn snapshot(&self) -> Self::Snapshot;
}

impl<F, T> SnapshotSource for F
where
    F: Fn() -> T + Send + Sync + 'static,
    T: Serialize,
{
    type Snapshot = T;

    fn snapshot(&self) -> T {
        self()
    }
}

/// Object-safe form of [`SnapshotSource`] producing encoded JSON.
pub trait JsonSnapshot: Send + Sync {
    fn snapshot_json(&self) -> serde_json::Result<Vec<u8>>;
}

impl<S: SnapshotSource> JsonSnapshot for S {
    fn snapshot_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.snapshot())
    }
}

/// Per-route counters.
#[derive(Debug, Default)]
pub struct SnapshotStats {
    /// Snapshots encoded and handed to the server.
    pub served: AtomicU64,
    /// Snapshots that failed to encode.
    pub encode_failures: AtomicU64,
    /// Responses dropped before the body was fully written.
    pub write_failures: AtomicU64,
}

impl SnapshotStats {
    pub fn snapshot(&self) -> SnapshotStatsSnapshot {
        SnapshotStatsSnapshot {
            served: self.served.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SnapshotStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotStatsSnapshot {
    pub served: u64,
    pub encode_failures: u64,
    pub write_failures: u64,
}

/// Serves one collaborator's snapshot as JSON.
#[derive(Clone)]
pub struct SnapshotHandler {
    path: &'static str,
    label: &'static str,
    source: Arc<dyn JsonSnapshot>,
    stats: Arc<SnapshotStats>,
}

impl SnapshotHandler {
    /// Bind `source` to `path`. `label` names the snapshot in error logs.
    pub fn new(path: &'static str, label: &'static str, source: Arc<dyn JsonSnapshot>) -> Self {
        Self {
            path,
            label,
            source,
            stats: Arc::new(SnapshotStats::default()),
        }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn stats(&self) -> SnapshotStatsSnapshot {
        self.stats.snapshot()
    }

    /// Take a snapshot and build the response for it.
    ///
    /// `HEAD` responses carry the full body so the length header is right,
    /// but the server never writes it, so it is not watched for write failures.
    pub fn respond(&self, method: &Method) -> Response {
        match self.source.snapshot_json() {
            Ok(json) => {
                self.stats.served.fetch_add(1, Ordering::Relaxed);
                let json = Bytes::from(json);
                let body = if *method == Method::HEAD {
                    Body::from(json)
                } else {
                    guarded_body(self.path, json, self.stats.clone())
                };
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "application/json")],
                    body,
                )
                    .into_response()
            }
            Err(err) => {
                self.stats.encode_failures.fetch_add(1, Ordering::Relaxed);
                error!(path = self.path, "Failed to marshal {}: {}", self.label, err);
                internal_server_error()
            }
        }
    }
}

impl std::fmt::Debug for SnapshotHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotHandler")
            .field("path", &self.path)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// `500` with the canonical status text as a plain-text body.
pub(crate) fn internal_server_error() -> Response {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        status.canonical_reason().unwrap_or_default(),
    )
        .into_response()
}

/// Logs a write failure if the server drops the body before reaching its end.
struct WriteGuard {
    path: &'static str,
    stats: Arc<SnapshotStats>,
    finished: bool,
}

impl WriteGuard {
    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        if self.finished {
            debug!(path = self.path, "Snapshot written");
        } else {
            self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
            error!(path = self.path, "Write failed: response body dropped before completion");
        }
    }
}

/// Single-chunk body that reports whether it was fully consumed.
pub(crate) fn guarded_body(path: &'static str, bytes: Bytes, stats: Arc<SnapshotStats>) -> Body {
    let guard = WriteGuard {
        path,
        stats,
        finished: false,
    };
    let chunks = stream::unfold((Some(bytes), guard), |(chunk, mut guard)| async move {
        match chunk {
            Some(bytes) => Some((Ok::<_, Infallible>(bytes), (None, guard))),
            None => {
                guard.finish();
                None
            }
        }
    });
    Body::from_stream(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde::ser::Error as _;
    use serde::Serializer;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("value cannot be encoded"))
        }
    }

    #[tokio::test]
    async fn test_empty_inventory_serves_empty_list() {
        let handler = SnapshotHandler::new("/v1/enis", "ENI data", Arc::new(Vec::<u32>::new));
        let response = handler.respond(&Method::GET);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!([]));
        assert_eq!(handler.stats().served, 1);
        assert_eq!(handler.stats().write_failures, 0);
    }

    #[tokio::test]
    async fn test_encode_failure_is_500() {
        let handler =
            SnapshotHandler::new("/v1/pods", "pod data", Arc::new(|| Unencodable));
        let response = handler.respond(&Method::GET);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Internal Server Error");

        let stats = handler.stats();
        assert_eq!(stats.encode_failures, 1);
        assert_eq!(stats.served, 0);
    }

    #[tokio::test]
    async fn test_source_is_queried_per_request() {
        let counter = Arc::new(AtomicU64::new(0));
        let seen = counter.clone();
        let handler = SnapshotHandler::new(
            "/v1/pods",
            "pod data",
            Arc::new(move || seen.fetch_add(1, Ordering::SeqCst) + 1),
        );

        for expected in 1..=3u64 {
            let body = to_bytes(handler.respond(&Method::GET).into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(body, expected.to_string());
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dropped_body_counts_write_failure() {
        let handler = SnapshotHandler::new("/v1/enis", "ENI data", Arc::new(|| vec![1, 2, 3]));
        drop(handler.respond(&Method::GET));
        assert_eq!(handler.stats().write_failures, 1);
    }

    #[tokio::test]
    async fn test_head_response_is_not_a_write_failure() {
        let handler = SnapshotHandler::new("/v1/enis", "ENI data", Arc::new(|| vec![1, 2, 3]));
        let response = handler.respond(&Method::HEAD);
        assert_eq!(response.status(), StatusCode::OK);

        // The server discards HEAD bodies unread.
        drop(response);

        let stats = handler.stats();
        assert_eq!(stats.served, 1);
        assert_eq!(stats.write_failures, 0);
    }

    #[tokio::test]
    async fn test_fully_read_body_is_not_a_write_failure() {
        let handler = SnapshotHandler::new("/v1/enis", "ENI data", Arc::new(|| vec![1, 2, 3]));
        let body = to_bytes(handler.respond(&Method::GET).into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"[1,2,3]");
        assert_eq!(handler.stats().write_failures, 0);
    }
}
