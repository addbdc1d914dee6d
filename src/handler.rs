//! Handler trait and type erasure.
//!
//! # Shape of a handler
//!
//! A handler receives the response sink and the request, writes whatever it
//! wants, and either succeeds or returns an [`Error`]. It never has to turn
//! a failure into a response itself: that is the
//! [`ErrorHandler`](crate::ErrorHandler)'s job.
//!
//! ```text
//! handler_fn(|w, req| Box::pin(async move { … }))   ← user writes this
//!        ↓ Arc::new(…) / .boxed()
//! BoxedHandler = Arc<dyn Handler>                  ← stored in router / chain
//!        ↓
//! handler.call(w, req)  at request time            ← one vtable dispatch
//! ```
//!
//! Handlers that cannot fail, written as `async fn(Request) -> impl
//! IntoResponse`, plug in through [`adapt`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::IntoResponse;
use crate::writer::ResponseWriter;

/// A heap-allocated, type-erased future borrowing from the call arguments.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// A unit of request processing that may fail.
///
/// Implement it on your own types, or build one from a closure with
/// [`handler_fn`]. Handlers are immutable once built and are called
/// concurrently, so any state they carry must be `Send + Sync`.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        w: &'a mut dyn ResponseWriter,
        req: &'a Request,
    ) -> BoxFuture<'a, Result<(), Error>>;

    /// Erases the concrete type.
    fn boxed(self) -> BoxedHandler
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn call<'a>(
        &'a self,
        w: &'a mut dyn ResponseWriter,
        req: &'a Request,
    ) -> BoxFuture<'a, Result<(), Error>> {
        (**self).call(w, req)
    }
}

// ── handler_fn ────────────────────────────────────────────────────────────────

/// Builds a [`Handler`] from a closure.
///
/// ```rust
/// use httpbox::{handler_fn, HttpError};
/// use http::StatusCode;
///
/// let hello = handler_fn(|w, req| Box::pin(async move {
///     if req.path() == "/bob" {
///         return Err(HttpError::new(StatusCode::BAD_REQUEST, "Bob is banned").into());
///     }
///     w.write_all(b"hello")?;
///     Ok(())
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut dyn ResponseWriter, &'a Request) -> BoxFuture<'a, Result<(), Error>>
        + Send
        + Sync
        + 'static,
{
    HandlerFn(f)
}

/// Handler returned by [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F>(F);

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut dyn ResponseWriter, &'a Request) -> BoxFuture<'a, Result<(), Error>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        w: &'a mut dyn ResponseWriter,
        req: &'a Request,
    ) -> BoxFuture<'a, Result<(), Error>> {
        (self.0)(w, req)
    }
}

// ── adapt ─────────────────────────────────────────────────────────────────────

/// Adapts an infallible `async fn(Request) -> impl IntoResponse` into a
/// [`Handler`].
///
/// The wrapped function is called for its response, which is written to the
/// sink as-is. The adapter itself never produces an [`Error::Http`]; only a
/// failing sink can make it return an (internal) error.
///
/// ```rust
/// use httpbox::{adapt, Request, Response};
///
/// async fn liveness(_req: Request) -> Response {
///     Response::text("ok")
/// }
///
/// let handler = adapt(liveness);
/// ```
pub fn adapt<F, Fut, R>(f: F) -> Adapted<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    Adapted(f)
}

/// Handler returned by [`adapt`].
#[derive(Clone, Copy)]
pub struct Adapted<F>(F);

impl<F, Fut, R> Handler for Adapted<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call<'a>(
        &'a self,
        w: &'a mut dyn ResponseWriter,
        req: &'a Request,
    ) -> BoxFuture<'a, Result<(), Error>> {
        // The native signature takes the request by value.
        let fut = (self.0)(req.clone());
        Box::pin(async move {
            fut.await.into_response().write_to(w)?;
            Ok(())
        })
    }
}
