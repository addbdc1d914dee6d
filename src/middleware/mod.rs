//! Middleware layer.
//!
//! A [`Middleware`] turns one handler into another: it receives the next
//! handler in the chain and returns a handler that wraps it. Cross-cutting
//! concerns live here: access logging, authentication-header inspection,
//! request-id injection.
//!
//! # Ordering
//!
//! [`compose`] takes the middleware in reading order. The first one is the
//! outermost layer: it sees the request first and the result last.
//!
//! ```text
//! compose(h, [m0, m1, m2])  ==  m0(m1(m2(h)))
//!
//! request  → m0 → m1 → m2 → h
//! response ← m0 ← m1 ← m2 ← h
//! ```
//!
//! A layer that returns without calling `next` short-circuits the chain.
//! Whatever it already wrote stays written.

mod access_log;

pub use access_log::{AccessLog, AccessLogConfig, Attrs, ACCESS_TARGET, LEVEL_ACCESS};

use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};

/// A type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// A transform from handler to handler.
pub trait Middleware: Send + Sync + 'static {
    /// Wraps `next`, returning the handler that runs in its place.
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;

    /// Whether this middleware inspects the final response (status, size).
    ///
    /// [`Pipeline`](crate::Pipeline) renders errors directly inside the
    /// innermost middleware that returns `true`, so that it sees the error
    /// response rather than an empty one.
    fn observes_response(&self) -> bool {
        false
    }

    /// Erases the concrete type.
    fn boxed(self) -> BoxedMiddleware
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

/// Builds a [`Middleware`] from a closure.
///
/// ```rust
/// use std::sync::Arc;
/// use httpbox::{handler_fn, Handler};
/// use httpbox::middleware::middleware_fn;
/// use http::HeaderValue;
///
/// let tag = middleware_fn(|next| {
///     handler_fn(move |w, req| {
///         let next = Arc::clone(&next);
///         Box::pin(async move {
///             w.headers_mut().insert("x-middleware", HeaderValue::from_static("applied"));
///             next.call(w, req).await
///         })
///     })
///     .boxed()
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    MiddlewareFn(f)
}

/// Middleware returned by [`middleware_fn`].
#[derive(Clone, Copy)]
pub struct MiddlewareFn<F>(F);

impl<F> Middleware for MiddlewareFn<F>
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (self.0)(next)
    }
}

/// Wraps `handler` in `middleware`, first element outermost.
///
/// Pure: no I/O, just one allocation per layer. Composing the same handler
/// twice yields two independent chains; only state the middleware captured
/// themselves (a shared logger, say) is shared between them.
///
/// This does not place an error boundary anywhere. Failures travel outwards
/// as return values; use [`Pipeline`](crate::Pipeline) when a response
/// observer must see rendered errors.
pub fn compose<I>(handler: impl Handler, middleware: I) -> BoxedHandler
where
    I: IntoIterator<Item = BoxedMiddleware>,
    I::IntoIter: DoubleEndedIterator,
{
    middleware
        .into_iter()
        .rev()
        .fold(handler.boxed(), |next, layer| layer.wrap(next))
}

/// `handler.with_middleware([...])` sugar over [`compose`].
pub trait HandlerExt: Handler + Sized {
    fn with_middleware<I>(self, middleware: I) -> BoxedHandler
    where
        I: IntoIterator<Item = BoxedMiddleware>,
        I::IntoIter: DoubleEndedIterator,
    {
        compose(self, middleware)
    }
}

impl<H: Handler> HandlerExt for H {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use http::{HeaderValue, Method, StatusCode, Uri};

    use super::*;
    use crate::error::{Error, HttpError};
    use crate::handler::handler_fn;
    use crate::request::Request;
    use crate::writer::ResponseBuffer;

    fn get() -> Request {
        Request::new(Method::GET, Uri::from_static("/test"))
    }

    /// Writes `[name-before]`, calls next, writes `[name-after]`.
    fn marker(name: &'static str) -> BoxedMiddleware {
        middleware_fn(move |next| {
            handler_fn(move |w, req| {
                let next = Arc::clone(&next);
                Box::pin(async move {
                    w.write_all(format!("[{name}-before]").as_bytes())?;
                    let result = next.call(w, req).await;
                    w.write_all(format!("[{name}-after]").as_bytes())?;
                    result
                })
            })
            .boxed()
        })
        .boxed()
    }

    fn body_handler(body: &'static str) -> BoxedHandler {
        handler_fn(move |w, _req| Box::pin(async move {
            w.write_all(body.as_bytes())?;
            Ok(())
        }))
        .boxed()
    }

    fn failing_handler(message: &'static str) -> BoxedHandler {
        handler_fn(move |_w, _req| Box::pin(async move { Err(Error::internal(message)) }))
            .boxed()
    }

    /// Prefixes any returned error's text with `name: `.
    fn annotate(name: &'static str) -> BoxedMiddleware {
        middleware_fn(move |next| {
            handler_fn(move |w, req| {
                let next = Arc::clone(&next);
                Box::pin(async move {
                    next.call(w, req)
                        .await
                        .map_err(|e| Error::internal(format!("{name}: {e}")))
                })
            })
            .boxed()
        })
        .boxed()
    }

    async fn run(h: &BoxedHandler) -> (ResponseBuffer, Result<(), Error>) {
        let mut w = ResponseBuffer::new();
        let result = h.call(&mut w, &get()).await;
        (w, result)
    }

    #[tokio::test]
    async fn no_middleware() {
        let h = compose(body_handler("original handler"), Vec::new());
        let (w, result) = run(&h).await;

        assert!(result.is_ok());
        assert_eq!(w.status(), StatusCode::OK);
        assert_eq!(w.text(), "original handler");
    }

    #[tokio::test]
    async fn first_listed_is_outermost() {
        let h = body_handler("[handler]").with_middleware([marker("m1"), marker("m2"), marker("m3")]);
        let (w, result) = run(&h).await;

        assert!(result.is_ok());
        assert_eq!(
            w.text(),
            "[m1-before][m2-before][m3-before][handler][m3-after][m2-after][m1-after]"
        );
    }

    #[tokio::test]
    async fn order_matters() {
        let a = marker("A");
        let b = marker("B");

        let (ab, _) = run(&compose(body_handler("H"), [a.clone(), b.clone()])).await;
        let (ba, _) = run(&compose(body_handler("H"), [b, a])).await;

        assert_eq!(ab.text(), "[A-before][B-before]H[B-after][A-after]");
        assert_eq!(ba.text(), "[B-before][A-before]H[A-after][B-after]");
    }

    #[tokio::test]
    async fn short_circuit_skips_inner_layers() {
        let inner_called = Arc::new(AtomicBool::new(false));
        let handler_called = Arc::new(AtomicBool::new(false));

        let deny = middleware_fn(|_next| {
            handler_fn(|w, _req| Box::pin(async move {
                w.write_header(StatusCode::UNAUTHORIZED);
                w.write_all(b"unauthorized")?;
                Ok(())
            }))
            .boxed()
        })
        .boxed();

        let flag = Arc::clone(&inner_called);
        let inner = middleware_fn(move |next| {
            let flag = Arc::clone(&flag);
            handler_fn(move |w, req| {
                flag.store(true, Ordering::SeqCst);
                let next = Arc::clone(&next);
                Box::pin(async move { next.call(w, req).await })
            })
            .boxed()
        })
        .boxed();

        let flag = Arc::clone(&handler_called);
        let handler = handler_fn(move |_w, _req| {
            flag.store(true, Ordering::SeqCst);
            Box::pin(async move { Ok(()) })
        });

        let h = compose(handler, [deny, inner]);
        let (w, result) = run(&h).await;

        assert!(result.is_ok());
        assert!(!inner_called.load(Ordering::SeqCst));
        assert!(!handler_called.load(Ordering::SeqCst));
        assert_eq!(w.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(w.text(), "unauthorized");
    }

    #[tokio::test]
    async fn middleware_error_without_calling_next() {
        let stop = middleware_fn(|_next| {
            handler_fn(|_w, _req| Box::pin(async move { Err(Error::internal("middleware error")) }))
                .boxed()
        })
        .boxed();

        let h = compose(body_handler("this should not be called"), [stop]);
        let (w, result) = run(&h).await;

        assert_eq!(result.unwrap_err().to_string(), "middleware error");
        assert!(w.body().is_empty());
    }

    #[tokio::test]
    async fn errors_travel_outwards_through_every_layer() {
        let h = compose(failing_handler("handler error"), [annotate("m1"), annotate("m2")]);
        let (_, result) = run(&h).await;

        assert_eq!(result.unwrap_err().to_string(), "m1: m2: handler error");
    }

    #[tokio::test]
    async fn middleware_can_inspect_error() {
        let catch = middleware_fn(|next| {
            handler_fn(move |w, req| {
                let next = Arc::clone(&next);
                Box::pin(async move {
                    let result = next.call(w, req).await;
                    if result.is_err() {
                        w.headers_mut().insert("x-error-caught", HeaderValue::from_static("true"));
                    }
                    result
                })
            })
            .boxed()
        })
        .boxed();

        let h = compose(failing_handler("handler error"), [catch]);
        let (w, result) = run(&h).await;

        assert!(result.is_err());
        assert_eq!(w.header("x-error-caught"), Some("true"));
    }

    #[tokio::test]
    async fn middleware_can_recover() {
        let recover = middleware_fn(|next| {
            handler_fn(move |w, req| {
                let next = Arc::clone(&next);
                Box::pin(async move {
                    match next.call(w, req).await {
                        Err(Error::Http(e)) if e.code() == StatusCode::NOT_FOUND => {
                            w.write_all(b"fallback")?;
                            Ok(())
                        }
                        other => other,
                    }
                })
            })
            .boxed()
        })
        .boxed();

        let missing = handler_fn(|_w, _req| Box::pin(async move {
            Err(Error::from(HttpError::new(StatusCode::NOT_FOUND, "not found")))
        }));

        let (w, result) = run(&compose(missing, [recover])).await;

        assert!(result.is_ok());
        assert_eq!(w.text(), "fallback");
    }

    #[tokio::test]
    async fn composing_twice_gives_independent_chains() {
        let calls = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&calls);
        let record = middleware_fn(move |next| {
            let log = Arc::clone(&log);
            handler_fn(move |w, req| {
                log.lock().unwrap().push(req.path().to_owned());
                let next = Arc::clone(&next);
                Box::pin(async move { next.call(w, req).await })
            })
            .boxed()
        })
        .boxed();

        let base = body_handler("[handler]");
        let layers = || vec![marker("outer"), Arc::clone(&record), marker("inner")];
        let first = compose(Arc::clone(&base), layers());
        let second = compose(base, layers());

        let (w1, r1) = run(&first).await;
        let (w2, r2) = run(&second).await;

        assert!(r1.is_ok() && r2.is_ok());
        assert_eq!(w1.status(), w2.status());
        assert_eq!(w1.text(), w2.text());
        // The captured recorder is shared on purpose.
        assert_eq!(*calls.lock().unwrap(), vec!["/test".to_owned(), "/test".to_owned()]);
    }
}
