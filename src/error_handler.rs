//! Centralized translation of handler failures into responses.

use std::sync::Arc;

use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use serde_json::Value;
use tracing::{Dispatch, error, warn};

use crate::error::{DetailsDisplay, Error, HttpError};
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Message sent for any failure that is not an [`HttpError`].
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";

/// Details that replace ones that could not be serialized.
pub const SERIALIZATION_FAILED_DETAILS: &str = "failed to serialize error details";

/// Renders a handler's [`Error`] as the response, exactly once.
///
/// - [`Error::Http`] is sent as `{"code","message","details"?}` with status
///   `code`.
/// - [`Error::Internal`] becomes `500 {"code":500,"message":"Unknown error
///   occurred"}`; the original is kept as the cause for the log only.
/// - Details that cannot be serialized are replaced by
///   `"failed to serialize error details"` and the body is serialized again.
///   The replacement is a plain string, so exactly one body is always
///   written.
/// - Unless the error was built [`without_log`](HttpError::without_log), one
///   diagnostic `error!` event is emitted with `code`, `details` and `error`
///   (the cause).
///
/// Diagnostic events go to the dispatcher captured when the `ErrorHandler`
/// was created, or the one given to [`logger`](Self::logger).
#[derive(Clone, Debug)]
pub struct ErrorHandler {
    logger: Dispatch,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self { logger: tracing::dispatcher::get_default(Dispatch::clone) }
    }

    pub fn logger(mut self, logger: Dispatch) -> Self {
        self.logger = logger;
        self
    }

    /// Runs `handler` and renders its failure, if any.
    pub async fn serve(&self, handler: &dyn Handler, w: &mut dyn ResponseWriter, req: &Request) {
        if let Err(err) = handler.call(w, req).await {
            self.handle(w, err);
        }
    }

    /// Writes `err` as the response.
    pub fn handle(&self, w: &mut dyn ResponseWriter, err: Error) {
        let mut err = match err {
            Error::Http(err) => err,
            Error::Internal(cause) => {
                HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, UNKNOWN_ERROR_MESSAGE)
                    .with_cause(cause)
            }
        };

        tracing::dispatcher::with_default(&self.logger, || {
            let body = match serde_json::to_vec(&err) {
                Ok(body) => body,
                Err(ser_err) => {
                    err.replace_details(Value::from(SERIALIZATION_FAILED_DETAILS));
                    error!(
                        error = %ser_err,
                        original_error = err.cause().map(display_cause),
                        "{}",
                        SERIALIZATION_FAILED_DETAILS
                    );
                    serde_json::to_vec(&err)
                        .unwrap_or_else(|_| err.to_json_value().to_string().into_bytes())
                }
            };

            write_body(w, err.code(), &body);

            if err.should_log() {
                error!(
                    code = err.code().as_u16(),
                    details = %DetailsDisplay(&err),
                    error = err.cause().map(display_cause),
                    "{}",
                    err.message()
                );
            }
        });
    }
}

fn write_body(w: &mut dyn ResponseWriter, code: StatusCode, body: &[u8]) {
    w.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    w.write_header(code);
    if let Err(e) = w.write_all(body) {
        warn!(error = %e, "failed to write error response");
    }
}

fn display_cause(
    cause: &(dyn std::error::Error + Send + Sync + 'static),
) -> tracing::field::DisplayValue<String> {
    tracing::field::display(cause.to_string())
}

/// As a middleware, the `ErrorHandler` is an error boundary: failures from
/// the wrapped chain are rendered on the spot and the layers outside it see
/// success.
impl Middleware for ErrorHandler {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(Boundary { errors: self.clone(), next })
    }
}

struct Boundary {
    errors: ErrorHandler,
    next: BoxedHandler,
}

impl Handler for Boundary {
    fn call<'a>(
        &'a self,
        w: &'a mut dyn ResponseWriter,
        req: &'a Request,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            self.errors.serve(&*self.next, w, req).await;
            Ok(())
        })
    }
}
