//! Login and logout. The session id travels in an HttpOnly cookie.

use super::{load_session, respond};
use crate::config::ENV_SESSION_COOKIE;
use crate::error::{AppError, ConfigError};
use crate::extractors::SessionCookie;
use crate::service::FormFields;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderValue},
    response::Response,
    Form,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

fn set_cookie(state: &AppState, resp: &mut Response, value: String) -> Result<(), AppError> {
    let header = HeaderValue::from_str(&value).map_err(|_| {
        AppError::Config(ConfigError::Invalid {
            key: ENV_SESSION_COOKIE,
            value: state.config.session_cookie.clone(),
        })
    })?;
    resp.headers_mut().append(SET_COOKIE, header);
    Ok(())
}

pub async fn login_form(State(state): State<AppState>, Query(q): Query<NextParam>) -> Response {
    respond(&state, state.admin.login_form(q.next.as_deref()))
}

pub async fn login_submit(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Query(q): Query<NextParam>,
    Form(form): Form<FormFields>,
) -> Result<Response, AppError> {
    let mut session = load_session(&state, &cookie).await?;
    let outcome = state.admin.login(&mut session, &form, q.next.as_deref()).await?;
    let mut resp = respond(&state, outcome);
    if session.is_authenticated() {
        if let Some(id) = &session.id {
            let value = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                state.config.session_cookie, id
            );
            set_cookie(&state, &mut resp, value)?;
        }
    }
    Ok(resp)
}

pub async fn logout(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Query(q): Query<NextParam>,
) -> Result<Response, AppError> {
    let mut session = load_session(&state, &cookie).await?;
    let outcome = state.admin.logout(&mut session, q.next.as_deref()).await?;
    let mut resp = respond(&state, outcome);
    let value = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        state.config.session_cookie
    );
    set_cookie(&state, &mut resp, value)?;
    Ok(resp)
}
