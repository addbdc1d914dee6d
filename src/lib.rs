//! # httpbox
//!
//! A thin request pipeline on top of hyper: handlers that can fail, one place
//! that turns failures into responses, composable middleware, and an access
//! log that needs nothing from the handlers.
//!
//! ## The contract
//!
//! - **Handlers return errors.** A [`Handler`] writes to a [`ResponseWriter`]
//!   and returns `Result<(), Error>`. It never renders its own failures.
//! - **One error renderer.** The [`ErrorHandler`] sends an [`HttpError`] as
//!   `{"code","message","details"}` with the matching status, and collapses
//!   any other failure to `500 Unknown error occurred` so internals never
//!   reach the client.
//! - **Middleware are handler transforms.** [`compose`] applies them in
//!   reading order, the first one outermost.
//! - **Access logging observes, never participates.**
//!   [`AccessLog`](middleware::AccessLog) wraps the sink in a
//!   [`ResponseObserver`] and emits one `tracing` event per request.
//!
//! What the proxy and the server already own (routing policy, TLS, body-size
//! limits, connection pooling) is not reimplemented here.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use httpbox::middleware::AccessLog;
//! use httpbox::{handler_fn, write_text, HttpError, Pipeline, Router, Server};
//! use http::{Method, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::new().on(Method::GET, "/hello/{name}", handler_fn(|w, req| {
//!         Box::pin(async move {
//!             let name = req.param("name").unwrap_or("stranger");
//!             if name == "bob" {
//!                 return Err(HttpError::new(StatusCode::BAD_REQUEST, "Bob is banned")
//!                     .with_details("Please contact the HR")
//!                     .into());
//!             }
//!             write_text(w, StatusCode::OK, &format!("Hello, {name}!"))
//!         })
//!     }));
//!
//!     let app = Pipeline::new(router).layer(AccessLog::default()).build();
//!
//!     Server::bind("0.0.0.0:8080").serve(app).await.unwrap();
//! }
//! ```
//!
//! ## Where errors are rendered
//!
//! [`compose`] places no error boundary: failures travel outwards as return
//! values and the [`Server`] renders whatever escapes the outermost layer.
//! An access log composed that way records the response *before* rendering.
//! [`Pipeline`] puts the boundary directly inside the innermost
//! response-observing middleware instead, so access records carry the error
//! status and body size.

mod body;
mod error;
mod error_handler;
mod handler;
mod observer;
mod pipeline;
mod request;
mod response;
mod router;
mod server;
mod writer;

pub mod middleware;

pub use body::{read_bytes, read_json, read_xml, write_bytes, write_json, write_text};
pub use error::{BoxError, Error, HttpError, ServerError};
pub use error_handler::{ErrorHandler, SERIALIZATION_FAILED_DETAILS, UNKNOWN_ERROR_MESSAGE};
pub use handler::{adapt, handler_fn, Adapted, BoxFuture, BoxedHandler, Handler, HandlerFn};
pub use middleware::{compose, BoxedMiddleware, HandlerExt, Middleware};
pub use observer::ResponseObserver;
pub use pipeline::Pipeline;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use writer::{ResponseBuffer, ResponseWriter};
