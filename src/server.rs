//! HTTP server and graceful shutdown.
//!
//! The server owns connections and turns each hyper request into one call of
//! the handler chain:
//!
//! 1. Read the whole body into memory.
//! 2. Build a [`Request`] and a fresh [`ResponseBuffer`].
//! 3. Call the handler; render any failure that escapes it with the server's
//!    [`ErrorHandler`].
//! 4. Send the buffer as the response.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **SIGINT** the server stops accepting, lets in-flight
//! connections finish, then returns from [`Server::serve`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{HttpError, ServerError};
use crate::error_handler::ErrorHandler;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::writer::ResponseBuffer;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    errors: ErrorHandler,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use httpbox::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr, errors: ErrorHandler::new() }
    }

    /// Error handler for failures that escape the outermost handler.
    pub fn error_handler(mut self, errors: ErrorHandler) -> Self {
        self.errors = errors;
        self
    }

    /// Binds, then serves until SIGTERM or Ctrl-C and every in-flight request
    /// has completed.
    pub async fn serve(self, handler: impl Handler) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_with_shutdown(listener, handler, shutdown_signal()).await
    }

    /// Serves on an existing listener until `shutdown` resolves.
    pub async fn serve_with_shutdown(
        self,
        listener: TcpListener,
        handler: impl Handler,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ServerError> {
        let app = Arc::new(App { handler: handler.boxed(), errors: self.errors });

        let addr = listener.local_addr()?;
        info!(%addr, "httpbox listening");

        // Every spawned connection task, so shutdown can wait for them.
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting immediately,
                // even with connections queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { Ok::<_, std::convert::Infallible>(app.dispatch(req, remote_addr).await) }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set does not grow
                // without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("httpbox stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

struct App {
    handler: BoxedHandler,
    errors: ErrorHandler,
}

impl App {
    /// Runs one request through the chain. Never fails: every failure is
    /// rendered into the response.
    async fn dispatch(
        &self,
        req: hyper::Request<hyper::body::Incoming>,
        remote_addr: SocketAddr,
    ) -> http::Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();
        let mut w = ResponseBuffer::new();

        match body.collect().await {
            Ok(collected) => {
                let req = Request::from_parts(parts, collected.to_bytes(), Some(remote_addr));
                self.errors.serve(&*self.handler, &mut w, &req).await;
            }
            Err(e) => {
                let err = HttpError::new(StatusCode::BAD_REQUEST, "unable to read body")
                    .with_details(e.to_string())
                    .without_log();
                self.errors.handle(&mut w, err.into());
            }
        }

        w.into_response()
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C only, off Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
