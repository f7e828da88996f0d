//! Router assembly.

mod admin;
mod common;
pub use admin::admin_routes;
pub use common::{common_routes, common_routes_with_ready};

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Admin routes under the configured prefix plus health, readiness and version.
pub fn app(state: AppState) -> Router {
    let limit = state.config.max_body_bytes;
    let prefix = state.config.url_prefix.clone();
    let admin = admin_routes(state.clone());
    let mounted = if prefix.is_empty() {
        admin
    } else {
        Router::new().nest(&prefix, admin)
    };
    mounted
        .merge(common_routes_with_ready(state))
        .layer(RequestBodyLimitLayer::new(limit))
}
