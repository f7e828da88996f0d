//! Extract the session id from the request's `Cookie` header.

use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts},
};

/// Session id from the cookie named by `AdminConfig::session_cookie`, if present.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionCookie(pub Option<String>);

impl SessionCookie {
    /// Value of cookie `name` in the given `Cookie` header values; blank values count as absent.
    pub fn find<'a, I>(headers: I, name: &str) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        headers
            .into_iter()
            .flat_map(|h| h.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SessionCookie {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());
        Ok(SessionCookie(Self::find(headers, &state.config.session_cookie)))
    }
}
