//! Error taxonomy.
//!
//! Handlers fail by returning an [`Error`]. There are exactly two kinds:
//!
//! - [`Error::Http`]: a deliberate [`HttpError`] built by the handler. Its
//!   code, message and details are sent to the client as-is.
//! - [`Error::Internal`]: anything else. The client only ever sees a generic
//!   `500 Unknown error occurred`; the original error goes to the diagnostic
//!   log as the cause.
//!
//! The split is a plain enum so the [`ErrorHandler`](crate::ErrorHandler)
//! branch is an exhaustive `match`, not a downcast.

use std::borrow::Cow;
use std::fmt;
use std::io;

use http::StatusCode;
use serde::ser::{Error as _, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Boxed, thread-safe error used for internal causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── Error ─────────────────────────────────────────────────────────────────────

/// A handler failure.
#[derive(Debug, Error)]
pub enum Error {
    /// A recognized error, serialized faithfully to the client.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// An opaque failure. Never shown to the client.
    #[error(transparent)]
    Internal(BoxError),
}

impl Error {
    /// Wraps any error (or message) as an opaque internal failure.
    ///
    /// ```rust
    /// let err = httpbox::Error::internal("database unreachable");
    /// assert_eq!(err.to_string(), "database unreachable");
    /// ```
    pub fn internal(err: impl Into<BoxError>) -> Self {
        Self::Internal(err.into())
    }

    /// Returns the [`HttpError`] if this failure is a recognized one.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(err) => Some(err),
            Self::Internal(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Internal(Box::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(Box::new(e))
    }
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// A structured error with an HTTP status code.
///
/// The client receives `{"code":…,"message":…,"details":…}` with the response
/// status set to `code`. The `cause` is for diagnostics only: it is never
/// serialized and never part of the [`Display`](fmt::Display) output.
///
/// ```rust
/// use httpbox::HttpError;
/// use http::StatusCode;
///
/// let err = HttpError::new(StatusCode::NOT_FOUND, "user not found")
///     .with_details(serde_json::json!({ "id": 42 }))
///     .without_log();
///
/// assert_eq!(err.to_string(), "user not found");
/// assert!(!err.should_log());
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    code: StatusCode,
    message: Cow<'static, str>,
    details: Option<Details>,
    #[source]
    cause: Option<BoxError>,
    log: bool,
}

/// Client-facing details, converted to JSON when attached.
///
/// A value that cannot be represented as JSON is remembered as such; the
/// failure surfaces when the error is serialized.
#[derive(Debug, Clone)]
pub(crate) enum Details {
    Json(Value),
    Unserializable(String),
}

impl HttpError {
    /// Creates an error with diagnostic logging enabled.
    pub fn new(code: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self { code, message: message.into(), details: None, cause: None, log: true }
    }

    /// Attaches client-facing details. Replaces any previous details.
    ///
    /// Details that serialize to JSON `null` (`None`, `()`) count as absent
    /// and are left out of the body.
    pub fn with_details<T: Serialize>(mut self, details: T) -> Self {
        self.details = match serde_json::to_value(details) {
            Ok(Value::Null) => None,
            Ok(value) => Some(Details::Json(value)),
            Err(e) => Some(Details::Unserializable(e.to_string())),
        };
        self
    }

    /// Attaches the internal error that caused this one.
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Suppresses the diagnostic log line for this error.
    pub fn without_log(mut self) -> Self {
        self.log = false;
        self
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The details as JSON, if set and representable.
    pub fn details(&self) -> Option<&Value> {
        match &self.details {
            Some(Details::Json(value)) => Some(value),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn should_log(&self) -> bool {
        self.log
    }

    pub(crate) fn replace_details(&mut self, details: Value) {
        self.details = Some(Details::Json(details));
    }

    /// The wire body, without going through `Serialize`. Infallible.
    pub(crate) fn to_json_value(&self) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("code".to_owned(), Value::from(self.code.as_u16()));
        body.insert("message".to_owned(), Value::from(&*self.message));
        match &self.details {
            Some(Details::Json(value)) => {
                body.insert("details".to_owned(), value.clone());
            }
            Some(Details::Unserializable(reason)) => {
                body.insert("details".to_owned(), Value::from(reason.as_str()));
            }
            None => {}
        }
        Value::Object(body)
    }
}

impl Serialize for HttpError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.details.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("HttpError", len)?;
        state.serialize_field("code", &self.code.as_u16())?;
        state.serialize_field("message", &self.message)?;
        match &self.details {
            Some(Details::Json(value)) => state.serialize_field("details", value)?,
            Some(Details::Unserializable(reason)) => return Err(S::Error::custom(reason)),
            None => {}
        }
        state.end()
    }
}

/// Log-friendly rendering of the details field.
pub(crate) struct DetailsDisplay<'a>(pub(crate) &'a HttpError);

impl fmt::Display for DetailsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.details {
            Some(Details::Json(value)) => write!(f, "{value}"),
            Some(Details::Unserializable(reason)) => write!(f, "<unserializable: {reason}>"),
            None => f.write_str("null"),
        }
    }
}

// ── ServerError ───────────────────────────────────────────────────────────────

/// Infrastructure failure of the [`Server`](crate::Server): binding to a port
/// or accepting on the listener. Request-level failures are [`Error`]s.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
}
