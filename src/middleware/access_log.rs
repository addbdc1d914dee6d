//! Access-log middleware: one structured record per request.
//!
//! The record is a `tracing` event on the [`ACCESS_TARGET`] target with the
//! message `"Access"` and two field groups:
//!
//! | Field | Value |
//! |---|---|
//! | `req.method` | request method |
//! | `req.url` | full request URL, query string included |
//! | `req.remote_addr` | peer address, when known |
//! | `req.attrs` | JSON object from [`AccessLogConfig::request_attrs`] |
//! | `res.status` | committed status, `200` if the handler never set one |
//! | `res.body_size` | body bytes written |
//! | `res.attrs` | JSON object from [`AccessLogConfig::response_attrs`] |
//!
//! `tracing` has a fixed set of levels, so access records are kept apart from
//! ordinary diagnostics by their target: `RUST_LOG=access=off` silences them,
//! `RUST_LOG=warn,access=info` keeps only them at info.
//!
//! # Placement
//!
//! The record reflects whatever was written *inside* the span it wraps. A
//! failure returned by the inner chain is passed outwards untouched; if it is
//! rendered further out, the record shows the response as it was before
//! rendering (typically an empty `200`). Build chains with
//! [`Pipeline`](crate::Pipeline), which renders errors just inside this
//! middleware, so the record carries the error status and body size.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::field::display;
use tracing::{Dispatch, Level};

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::observer::ResponseObserver;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// `tracing` target of access records.
pub const ACCESS_TARGET: &str = "access";

/// Default level of access records.
///
/// `tracing` has no custom levels, so this is plain `INFO`: a level filter
/// alone cannot tell access records from info diagnostics. Filter on
/// [`ACCESS_TARGET`] instead, e.g. `RUST_LOG=info,access=off` or
/// `RUST_LOG=warn,access=info`.
pub const LEVEL_ACCESS: Level = Level::INFO;

/// Extra attributes for a record group, rendered as one JSON object.
pub type Attrs = Vec<(String, Value)>;

type SkipFn = Arc<dyn Fn(&Request) -> bool + Send + Sync>;
type RequestAttrsFn = Arc<dyn Fn(&Request) -> Attrs + Send + Sync>;
type ResponseAttrsFn = Arc<dyn Fn(&ResponseObserver<'_>) -> Attrs + Send + Sync>;

// ── AccessLogConfig ───────────────────────────────────────────────────────────

/// Settings of one [`AccessLog`] instance. Read-only once the middleware is
/// built.
///
/// ```rust
/// use httpbox::middleware::{AccessLog, AccessLogConfig};
/// use serde_json::json;
/// use tracing::Level;
///
/// let access = AccessLog::new(
///     AccessLogConfig::default()
///         .level(Level::DEBUG)
///         .skip(|req| req.path() == "/healthz")
///         .request_attrs(|req| {
///             let id = req.header("x-request-id").unwrap_or_default();
///             vec![("request_id".to_owned(), json!(id))]
///         }),
/// );
/// ```
#[derive(Clone)]
pub struct AccessLogConfig {
    logger: Dispatch,
    level: Level,
    skip: Option<SkipFn>,
    request_attrs: Option<RequestAttrsFn>,
    response_attrs: Option<ResponseAttrsFn>,
}

impl Default for AccessLogConfig {
    /// Logs through the dispatcher that is current *now*, at [`LEVEL_ACCESS`].
    fn default() -> Self {
        Self {
            logger: tracing::dispatcher::get_default(Dispatch::clone),
            level: LEVEL_ACCESS,
            skip: None,
            request_attrs: None,
            response_attrs: None,
        }
    }
}

impl AccessLogConfig {
    /// Sends records to `logger` instead of the dispatcher captured at
    /// construction.
    pub fn logger(mut self, logger: Dispatch) -> Self {
        self.logger = logger;
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Requests for which `skip` returns `true` pass through unrecorded.
    pub fn skip<F>(mut self, skip: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(skip));
        self
    }

    pub fn request_attrs<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Attrs + Send + Sync + 'static,
    {
        self.request_attrs = Some(Arc::new(f));
        self
    }

    pub fn response_attrs<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResponseObserver<'_>) -> Attrs + Send + Sync + 'static,
    {
        self.response_attrs = Some(Arc::new(f));
        self
    }

    fn skips(&self, req: &Request) -> bool {
        self.skip.as_ref().is_some_and(|skip| skip(req))
    }

    fn emit(&self, request: &Request, observer: &ResponseObserver<'_>) {
        let req_attrs = self.request_attrs.as_ref().map(|f| render(f(request)));
        let res_attrs = self.response_attrs.as_ref().map(|f| render(f(observer)));
        let remote_addr = request.remote_addr().map(display);
        let status = observer.status().as_u16();
        let body_size = observer.bytes_written();

        // Event levels are static per callsite.
        macro_rules! access_event {
            ($level:expr) => {
                tracing::event!(
                    target: ACCESS_TARGET,
                    $level,
                    req.method = %request.method(),
                    req.url = %request.uri(),
                    req.remote_addr = remote_addr,
                    req.attrs = req_attrs.as_deref(),
                    res.status = status,
                    res.body_size = body_size,
                    res.attrs = res_attrs.as_deref(),
                    "Access"
                )
            };
        }

        tracing::dispatcher::with_default(&self.logger, || {
            if self.level == Level::ERROR {
                access_event!(Level::ERROR);
            } else if self.level == Level::WARN {
                access_event!(Level::WARN);
            } else if self.level == Level::INFO {
                access_event!(Level::INFO);
            } else if self.level == Level::DEBUG {
                access_event!(Level::DEBUG);
            } else {
                access_event!(Level::TRACE);
            }
        });
    }
}

impl fmt::Debug for AccessLogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogConfig")
            .field("level", &self.level)
            .field("skip", &self.skip.is_some())
            .field("request_attrs", &self.request_attrs.is_some())
            .field("response_attrs", &self.response_attrs.is_some())
            .finish_non_exhaustive()
    }
}

fn render(attrs: Attrs) -> String {
    Value::Object(attrs.into_iter().collect()).to_string()
}

// ── AccessLog ─────────────────────────────────────────────────────────────────

/// Middleware that records every request it sees.
#[derive(Clone, Debug, Default)]
pub struct AccessLog {
    config: Arc<AccessLogConfig>,
}

impl AccessLog {
    pub fn new(config: AccessLogConfig) -> Self {
        Self { config: Arc::new(config) }
    }
}

impl Middleware for AccessLog {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(AccessLogHandler { config: Arc::clone(&self.config), next })
    }

    fn observes_response(&self) -> bool {
        true
    }
}

struct AccessLogHandler {
    config: Arc<AccessLogConfig>,
    next: BoxedHandler,
}

impl Handler for AccessLogHandler {
    fn call<'a>(
        &'a self,
        w: &'a mut dyn ResponseWriter,
        req: &'a Request,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            if self.config.skips(req) {
                return self.next.call(w, req).await;
            }

            let mut observer = ResponseObserver::new(w);
            let result = self.next.call(&mut observer, req).await;
            self.config.emit(req, &observer);
            result
        })
    }
}
