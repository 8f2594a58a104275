//! HTTP server and graceful shutdown.
//!
//! # Threading model
//!
//! The whole server runs on the thread that awaits [`Server::serve`]: every
//! connection is a `spawn_local` task on one [`LocalSet`], and requests of all
//! connections interleave cooperatively. Handlers must not block; a slow
//! computation stalls every client.
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use minihttpd::{ApplicationContext, Data, Routes, Server};
//! use minihttpd::renderer::Json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), minihttpd::Error> {
//!     let app = ApplicationContext::builder()
//!         .routes(Routes::new().on("/api/task/get", |_req| async { Data(["task1", "task2"]) }))
//!         .default_renderer(Rc::new(Json))
//!         .build()?;
//!     let pipeline = minihttpd::default_stack(app)?;
//!     Server::bind("127.0.0.1:8080")?.serve(pipeline).await
//! }
//! ```
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. stops accepting connections,
//! 2. lets every in-flight connection run to completion,
//! 3. returns from [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::{JoinSet, LocalSet};
use tracing::{error, info, warn};

use crate::body::Body;
use crate::error::Error;
use crate::middleware::Pipeline;
use crate::response::Response;

/// Largest request body read by default, in bytes (10 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// The HTTP/1.1 server.
pub struct Server {
    listen: Listen,
    max_body_size: usize,
}

enum Listen {
    Addr(SocketAddr),
    Listener(TcpListener),
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. Fails if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::config(format!("invalid listen address {addr:?}: {e}")))?;
        Ok(Self { listen: Listen::Addr(addr), max_body_size: DEFAULT_MAX_BODY_SIZE })
    }

    /// Serves on an already bound listener, e.g. one bound to port 0.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listen: Listen::Listener(listener), max_body_size: DEFAULT_MAX_BODY_SIZE }
    }

    /// Request bodies are buffered before the pipeline runs; larger ones are
    /// answered with `413 Payload Too Large`.
    /// Defaults to [`DEFAULT_MAX_BODY_SIZE`].
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Accepts connections and runs their requests through `pipeline`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight connections completing).
    pub async fn serve(self, pipeline: Pipeline) -> Result<(), Error> {
        self.serve_with_shutdown(pipeline, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), stopping when `signal` resolves.
    pub async fn serve_with_shutdown(
        self,
        pipeline: Pipeline,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = match self.listen {
            Listen::Addr(addr) => TcpListener::bind(addr).await?,
            Listen::Listener(listener) => listener,
        };
        LocalSet::new()
            .run_until(accept_loop(listener, pipeline, self.max_body_size, signal))
            .await
    }
}

async fn accept_loop(
    listener: TcpListener,
    pipeline: Pipeline,
    max_body_size: usize,
    signal: impl Future<Output = ()>,
) -> Result<(), Error> {
    let addr = listener.local_addr()?;
    info!(%addr, "minihttpd listening");

    // Every connection task, so shutdown can wait for all of them.
    let mut tasks = JoinSet::new();

    tokio::pin!(signal);

    loop {
        tokio::select! {
            // Shutdown first: a signal stops accepting even with connections queued.
            biased;

            () = &mut signal => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, peer) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let pipeline = pipeline.clone();
                let io = TokioIo::new(stream);

                tasks.spawn_local(async move {
                    // Called once per request on the connection.
                    let svc = service_fn(move |req| dispatch(pipeline.clone(), max_body_size, req));

                    if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                        warn!(%peer, "connection error: {e}");
                    }
                });
            }

            // Reap finished connections so the set does not grow without bound.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("minihttpd stopped");
    Ok(())
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers the request body, up to `max_body_size` bytes, and runs the
/// request through the pipeline.
///
/// Failures are turned into responses here, so hyper never sees an error.
async fn dispatch(
    pipeline: Pipeline,
    max_body_size: usize,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Body>, Infallible> {
    let (parts, body) = req.into_parts();
    let body: Bytes = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(method = %parts.method, uri = %parts.uri, max_body_size, "request body too large");
            return Ok(Response::empty(StatusCode::PAYLOAD_TOO_LARGE).into_http());
        }
        Err(e) => {
            warn!(method = %parts.method, uri = %parts.uri, "failed to read request body: {e}");
            return Ok(Response::empty(StatusCode::BAD_REQUEST).into_http());
        }
    };

    let response = pipeline.handle(http::Request::from_parts(parts, body)).await;
    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C). On
/// Windows only Ctrl-C is available. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // Never resolves: there is no SIGTERM outside Unix.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
