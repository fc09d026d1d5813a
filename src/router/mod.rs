//! Request routing: map exact paths and HTTP methods to handler functions.
//!
//! Trailing slashes are normalized on both registered paths and incoming
//! paths, so `/api/generate/` and `/api/generate` are treated as equivalent.
//!
//! Routes are matched in registration order; the first route whose method and
//! path both match wins. A path that is registered under other methods only
//! answers `405 Method Not Allowed` with an `Allow` header; an unknown path
//! answers `404 Not Found`.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{Middleware, MiddlewareHandler, Next, from_middleware};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared across
/// threads without copying the underlying closure. Use [`Router::get`] and
/// [`Router::post`] rather than building one by hand.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

// Erase the concrete handler type and store it as a `Handler` trait object.
fn erase(handler: impl IntoHandler) -> Handler {
    Arc::new(move |ctx| handler.call(ctx))
}

fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A single registered route binding a method + exact path to a handler.
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// HTTP request router that dispatches requests to registered handler functions.
///
/// # Examples
///
/// ```rust,no_run
/// use chat_relay::{Router, Response, StatusCode};
/// use chat_relay::middleware::AccessLog;
///
/// let mut router = Router::new();
/// router.layer(AccessLog);
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::OK).body("pong") });
/// ```
pub struct Router {
    routes: Vec<Route>,
    middlewares: Vec<MiddlewareHandler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    /// Register a handler for `GET` requests on `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `POST` requests on `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    /// Append a middleware layer. Layers run in registration order, outermost first,
    /// for every request including 404 and 405 answers.
    pub fn layer<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler: erase(handler),
        });
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    // Picks the handler for `request`, synthesizing 404/405 handlers when nothing matches.
    fn resolve(&self, request: &Request) -> Handler {
        let path = normalize(request.path());
        let mut allowed: Vec<&str> = Vec::new();

        for route in self.routes.iter().filter(|r| r.path == path) {
            if &route.method == request.method() {
                return Arc::clone(&route.handler);
            }
            allowed.push(route.method.as_str());
        }

        if allowed.is_empty() {
            return erase(|_ctx: Context| async {
                Response::new(StatusCode::NOT_FOUND).body("Not Found")
            });
        }

        let allow = allowed.join(", ");
        erase(move |_ctx: Context| {
            let allow = allow.clone();
            async move {
                Response::new(StatusCode::METHOD_NOT_ALLOWED)
                    .header("Allow", allow)
                    .body("Method Not Allowed")
            }
        })
    }

    /// Dispatch `request` through the middleware stack to the matching route.
    pub async fn route(&self, request: Request) -> Response {
        let endpoint = self.resolve(&request);
        Next::new(self.middlewares.clone(), endpoint)
            .run(Context::new(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::parse_complete;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        parse_complete(raw.as_bytes())
    }

    struct Stamp;

    impl Middleware for Stamp {
        fn handle(
            &self,
            ctx: Context,
            next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            Box::pin(async move { next.run(ctx).await.header("X-Stamp", "1") })
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl Middleware for Counting {
        fn handle(
            &self,
            ctx: Context,
            next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(next.run(ctx))
        }
    }

    struct Deny;

    impl Middleware for Deny {
        fn handle(
            &self,
            _ctx: Context,
            _next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            Box::pin(async { Response::new(StatusCode::UNAUTHORIZED) })
        }
    }

    #[test]
    fn router_starts_empty() {
        let mut router = Router::default();
        assert!(router.is_empty());
        router.get("/", |_ctx| async { Response::new(StatusCode::OK) });
        router.post("/api/generate", |_ctx| async { Response::new(StatusCode::OK) });
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn empty_router_returns_404() {
        let router = Router::new();
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_matches_with_trailing_slash() {
        let mut router = Router::new();
        router.post("/api/generate", |_ctx| async { Response::new(StatusCode::OK) });
        let res = router.route(make_request("POST", "/api/generate/")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_method_returns_405_with_allow() {
        let mut router = Router::new();
        router.post("/api/generate", |_ctx| async { Response::new(StatusCode::OK) });
        let res = router.route(make_request("GET", "/api/generate")).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers().get("allow"), Some("POST"));
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/", |_ctx| async { Response::new(StatusCode::OK) });
        router.get("/", |_ctx| async { Response::new(StatusCode::NO_CONTENT) });
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn middleware_runs_for_matched_and_unmatched_routes() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router.layer(Counting(Arc::clone(&hits)));
        router.layer(Stamp);
        router.get("/", |_ctx| async { Response::new(StatusCode::OK) });

        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.headers().get("x-stamp"), Some("1"));

        let res = router.route(make_request("GET", "/missing")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers().get("x-stamp"), Some("1"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let called = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&called);
        let mut router = Router::new();
        router.layer(Deny);
        router.get("/", move |_ctx| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Response::new(StatusCode::OK)
            }
        });

        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }
}
