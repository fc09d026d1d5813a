//! Route table of the relay server.

use std::sync::Arc;

use crate::context::Context;
use crate::middleware::AccessLog;
use crate::relay::{Relay, handler};
use crate::router::Router;
use crate::ui;

pub const GENERATE_PATH: &str = "/api/generate";

/// Builds the router: the chat page at `/` and the relay at [`GENERATE_PATH`],
/// both behind the access log.
pub fn router(relay: Arc<Relay>) -> Router {
    let mut router = Router::new();
    router.layer(AccessLog);
    router.get("/", ui::index);
    router.post(GENERATE_PATH, move |ctx: Context| {
        handler::generate(Arc::clone(&relay), ctx)
    });
    router
}
