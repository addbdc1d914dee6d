//! Middleware chains with a checked error-boundary placement.
//!
//! An access log only sees what is written inside the span it wraps. If
//! errors are rendered outside it, the record shows an empty `200` for every
//! failed request. [`Pipeline`] makes the placement a property of the chain
//! instead of a convention: it puts the [`ErrorHandler`] boundary directly
//! inside the innermost middleware that
//! [observes the response](Middleware::observes_response).
//!
//! ```text
//! Pipeline::new(h).layer(auth).layer(access_log).layer(cors).build()
//!
//!   auth → access_log → [ErrorHandler] → cors → h
//! ```
//!
//! Failures raised by `auth` itself travel out of the chain and are rendered
//! by the server's own [`ErrorHandler`].

use tracing::debug;

use crate::error_handler::ErrorHandler;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{compose, BoxedMiddleware, Middleware};

/// Builder for a handler chain.
pub struct Pipeline {
    handler: BoxedHandler,
    layers: Vec<BoxedMiddleware>,
    errors: ErrorHandler,
}

impl Pipeline {
    pub fn new(handler: impl Handler) -> Self {
        Self { handler: handler.boxed(), layers: Vec::new(), errors: ErrorHandler::new() }
    }

    /// Appends a layer. The first one added is the outermost.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(middleware.boxed());
        self
    }

    /// Appends an already type-erased layer.
    pub fn layer_boxed(mut self, middleware: BoxedMiddleware) -> Self {
        self.layers.push(middleware);
        self
    }

    /// The error boundary to insert. Defaults to [`ErrorHandler::new`].
    pub fn error_handler(mut self, errors: ErrorHandler) -> Self {
        self.errors = errors;
        self
    }

    pub fn build(self) -> BoxedHandler {
        let Self { handler, mut layers, errors } = self;

        let Some(at) = layers.iter().rposition(|layer| layer.observes_response()) else {
            return compose(handler, layers);
        };

        debug!(layers = layers.len(), boundary = at + 1, "placing error boundary");
        let inner = layers.split_off(at + 1);
        let bounded = errors.wrap(compose(handler, inner));
        compose(bounded, layers)
    }
}
