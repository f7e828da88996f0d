//! HTTP handlers for the admin pages and login.

pub mod admin;
pub mod auth;
pub use admin::*;
pub use auth::*;

use crate::auth::Session;
use crate::error::AppError;
use crate::extractors::SessionCookie;
use crate::state::AppState;
use crate::view::Outcome;
use axum::response::Response;

async fn load_session(state: &AppState, cookie: &SessionCookie) -> Result<Session, AppError> {
    state.admin.auth().connect(cookie.0.as_deref()).await
}

fn respond(state: &AppState, outcome: Outcome) -> Response {
    outcome.respond(state.renderer.as_ref())
}
