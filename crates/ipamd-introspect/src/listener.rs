// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listen loop that keeps the introspection server alive.
//!
//! Binding or serving may fail at any time (port taken, socket error). The
//! loop logs the first failure of each episode, sleeps according to
//! [`Backoff`], and tries again. It never gives up and never returns.
//!
//! Every accepted connection serves exactly one request under a read and a
//! write deadline, so a stalled client cannot hold a socket open.

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, BackoffConfig};
use crate::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::error::IntrospectError;

/// Pause after a failed `accept` before polling the socket again.
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// Listen loop counters.
#[derive(Debug, Default)]
pub struct ListenerStats {
    /// Bind/serve attempts started.
    pub attempts: AtomicU64,
    /// Attempts that ended in an error.
    pub failures: AtomicU64,
    /// Failure episodes reported in the log.
    pub episodes_logged: AtomicU64,
    /// Connections closed for exceeding the read or write deadline.
    pub connections_timed_out: AtomicU64,
}

impl ListenerStats {
    pub fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            episodes_logged: self.episodes_logged.load(Ordering::Relaxed),
            connections_timed_out: self.connections_timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ListenerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStatsSnapshot {
    pub attempts: u64,
    pub failures: u64,
    pub episodes_logged: u64,
    pub connections_timed_out: u64,
}

/// Binds and serves a router forever, retrying with backoff.
pub struct ResilientListener {
    addr: SocketAddr,
    router: Router,
    backoff: BackoffConfig,
    request_timeout: Duration,
    stats: Arc<ListenerStats>,
}

impl ResilientListener {
    pub fn new(addr: SocketAddr, router: Router, backoff: BackoffConfig) -> Self {
        Self {
            addr,
            router,
            backoff,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            stats: Arc::new(ListenerStats::default()),
        }
    }

    /// Set the read and write timeout applied to every connection.
    ///
    /// A client gets `timeout` to send its request headers and the server
    /// gets another `timeout` to handle the request and write the response.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Shared handle on the loop counters.
    pub fn stats(&self) -> Arc<ListenerStats> {
        self.stats.clone()
    }

    /// Run on a dedicated task. The task never completes on its own.
    pub fn spawn(self) -> JoinHandle<Infallible> {
        tokio::spawn(self.run())
    }

    /// Bind and serve forever.
    pub async fn run(self) -> Infallible {
        let Self {
            addr,
            router,
            backoff,
            request_timeout,
            stats,
        } = self;

        info!("Serving introspection endpoints on {}", addr);
        retry_forever(backoff, &stats, || {
            serve(addr, router.clone(), request_timeout, stats.clone())
        })
        .await
    }
}

/// Bind `addr` and accept connections until the socket fails.
async fn serve(
    addr: SocketAddr,
    router: Router,
    request_timeout: Duration,
    stats: Arc<ListenerStats>,
) -> Result<(), IntrospectError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| IntrospectError::Bind { addr, source })?;
    debug!("Introspection server bound to {}", addr);

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                debug!("New connection from {}", peer_addr);
                let router = router.clone();
                let stats = stats.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        handle_connection(stream, peer_addr, router, request_timeout, &stats)
                            .await
                    {
                        warn!("Connection error from {}: {}", peer_addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
                tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
            }
        }
    }
}

/// Serve a single request on `stream`, then close it.
///
/// The headers must arrive within `request_timeout` and the whole exchange
/// must finish within twice that, otherwise the connection is dropped.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    router: Router,
    request_timeout: Duration,
    stats: &ListenerStats,
) -> Result<(), hyper::Error> {
    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer_addr));
        router.clone().oneshot(request)
    });

    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(request_timeout)
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service);

    let deadline = request_timeout.saturating_mul(2);
    match tokio::time::timeout(deadline, connection).await {
        Ok(Err(e)) if e.is_timeout() => {
            stats.connections_timed_out.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
        Ok(result) => result,
        Err(_) => {
            stats.connections_timed_out.fetch_add(1, Ordering::Relaxed);
            warn!("Connection from {} timed out after {:?}", peer_addr, deadline);
            Ok(())
        }
    }
}

/// Drive `attempt` forever.
///
/// Each outer iteration is a fresh episode with its own backoff and its own
/// `logged` flag; only the first failure of an episode is logged.
pub(crate) async fn retry_forever<F, Fut>(
    config: BackoffConfig,
    stats: &ListenerStats,
    mut attempt: F,
) -> Infallible
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), IntrospectError>>,
{
    loop {
        let mut backoff = Backoff::new(config);
        let mut logged = false;

        loop {
            stats.attempts.fetch_add(1, Ordering::Relaxed);
            match attempt().await {
                Ok(()) => {
                    debug!("Introspection server stopped, starting a new attempt");
                    break;
                }
                Err(err) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    if !logged {
                        logged = true;
                        stats.episodes_logged.fetch_add(1, Ordering::Relaxed);
                        error!("Error running http API: {}", err);
                    }
                    let delay = backoff.next_delay();
                    debug!("Retrying introspection server in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
