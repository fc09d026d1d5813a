//! Middleware pipeline: composable before/after request handler logic.
//!
//! Each middleware wraps the next layer, so a layer can inspect the request,
//! short-circuit with its own response, or decorate the response coming back
//! from the route handler at the end of the chain.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`]: converts a [`Middleware`] into a [`MiddlewareHandler`].
//! - [`AccessLog`]: one log line per request.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Response, context::Context, router::Handler};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] invokes the next middleware, or the matched route
/// handler once every middleware has been passed through.
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
    endpoint: Handler,
}

/// A type-erased, reference-counted middleware function.
///
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// Creates a cursor positioned at the start of `middlewares`, ending in `endpoint`.
    pub fn new(middlewares: Vec<MiddlewareHandler>, endpoint: Handler) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// When the chain is exhausted the route handler is called.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => (self.endpoint)(ctx).await,
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through**: call `next.run(ctx).await` without modification.
/// - **Short-circuit**: return a [`Response`] directly without calling `next`.
/// - **Decorate**: call `next.run(ctx).await`, inspect the response, and return
///   a modified copy.
///
/// Implementations are shared across Tokio tasks, hence `Send + Sync`, and must
/// return a `Send` future.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Logs each request's method, path, status, and duration.
///
/// Emits a single `tracing::info!` record after the downstream handler
/// completes. Never short-circuits.
pub struct AccessLog;

impl Middleware for AccessLog {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().to_string();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            tracing::info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request handled"
            );

            response
        })
    }
}
