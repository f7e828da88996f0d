//! What admin operations hand back: a view to render or a named route to redirect to.

use crate::error::AppError;
use crate::response::SuccessOne;
use axum::{
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};
use serde_json::Value;

/// Bytes escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Bytes escaped in a query value that carries a path.
const QUERY_PATH: &AsciiSet = &NON_ALPHANUMERIC.remove(b'/').remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn seg(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT).to_string()
}

/// Encode a path for use as a query parameter value.
pub fn encode_query_path(path: &str) -> String {
    utf8_percent_encode(path, QUERY_PATH).to_string()
}

/// Named admin routes. `path` is the reverse lookup used for redirects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    Logout,
    ViewAll,
    ViewCollection(String),
    EditFields(String, String),
    EditSchema(String, String),
    EditRaw(String, String),
    DeleteCollection(String),
    DeleteItem(String, String),
    AddItem(String),
    AddCollection,
    ModifyCollection(String),
    DropCollection(String),
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Login => "admin_login",
            Route::Logout => "admin_logout",
            Route::ViewAll => "admin_view_all",
            Route::ViewCollection(_) => "admin_view_collection",
            Route::EditFields(..) => "admin_edit_fields",
            Route::EditSchema(..) => "admin_edit_schema",
            Route::EditRaw(..) => "admin_edit_json",
            Route::DeleteCollection(_) => "admin_delete_collection",
            Route::DeleteItem(..) => "admin_delete_collection_item",
            Route::AddItem(_) => "admin_add_collection_item",
            Route::AddCollection => "admin_add_collection",
            Route::ModifyCollection(_) => "admin_mod_collection",
            Route::DropCollection(_) => "admin_drop_collection",
        }
    }

    /// URL path under `prefix` (e.g. "/admin"). Collection names and ids are percent-encoded.
    pub fn path(&self, prefix: &str) -> String {
        let tail = match self {
            Route::Login => "/login".to_string(),
            Route::Logout => "/logout".to_string(),
            Route::ViewAll => String::new(),
            Route::ViewCollection(c) => format!("/view/{}", seg(c)),
            Route::EditFields(c, id) => format!("/edit/{}/{}", seg(c), seg(id)),
            Route::EditSchema(c, id) => format!("/edit_schema/{}/{}", seg(c), seg(id)),
            Route::EditRaw(c, id) => format!("/edit_raw/{}/{}", seg(c), seg(id)),
            Route::DeleteCollection(c) => format!("/delete/{}", seg(c)),
            Route::DeleteItem(c, id) => format!("/delete/{}/{}", seg(c), seg(id)),
            Route::AddItem(c) => format!("/add/{}", seg(c)),
            Route::AddCollection => "/add".to_string(),
            Route::ModifyCollection(c) => format!("/modify/{}", seg(c)),
            Route::DropCollection(c) => format!("/drop/{}", seg(c)),
        };
        let path = format!("{}{}", prefix.trim_end_matches('/'), tail);
        if path.is_empty() {
            "/".to_string()
        } else {
            path
        }
    }
}

/// A named template plus the variables to render it with.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    pub template: &'static str,
    pub context: Value,
    pub status: StatusCode,
}

impl View {
    pub fn new(template: &'static str, context: Value) -> Self {
        View {
            template,
            context,
            status: StatusCode::OK,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Render(View),
    /// Absolute path to send the client to.
    Redirect(String),
}

/// Templating capability: turns a view into a response body.
pub trait Renderer: Send + Sync {
    fn render(&self, view: View) -> Response;
}

/// Renders views as the JSON envelope `{"data": context, "meta": {"template": name}}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, view: View) -> Response {
        let body = SuccessOne {
            data: view.context,
            meta: Some(serde_json::json!({ "template": view.template })),
        };
        (view.status, Json(body)).into_response()
    }
}

impl Outcome {
    pub fn respond(self, renderer: &dyn Renderer) -> Response {
        match self {
            Outcome::Render(view) => renderer.render(view),
            Outcome::Redirect(to) => match HeaderValue::from_str(&to) {
                Ok(location) => (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response(),
                Err(_) => AppError::Validation(format!("redirect target is not a valid header: {:?}", to)).into_response(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_lookup_under_prefix() {
        assert_eq!(Route::ViewAll.path("/admin"), "/admin");
        assert_eq!(Route::ViewAll.path(""), "/");
        assert_eq!(Route::Login.path("/admin/"), "/admin/login");
        assert_eq!(
            Route::EditRaw("posts".into(), "abc".into()).path("/admin"),
            "/admin/edit_raw/posts/abc"
        );
        assert_eq!(Route::ViewCollection("posts".into()).name(), "admin_view_collection");
    }

    #[test]
    fn segments_are_percent_encoded() {
        assert_eq!(Route::ViewCollection("a?b".into()).path("/admin"), "/admin/view/a%3Fb");
        assert_eq!(Route::ViewCollection("a/b#c".into()).path("/admin"), "/admin/view/a%2Fb%23c");
        assert_eq!(Route::ViewCollection("my things".into()).path("/admin"), "/admin/view/my%20things");
        assert_eq!(Route::AddItem("a\nb".into()).path("/admin"), "/admin/add/a%0Ab");
        assert_eq!(encode_query_path("/admin/view/a%3Fb"), "/admin/view/a%253Fb");
    }

    #[test]
    fn unsendable_redirect_is_an_error_not_a_panic() {
        let resp = Outcome::Redirect("/admin/\u{7f}".into()).respond(&JsonRenderer);
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn redirect_is_see_other() {
        let resp = Outcome::Redirect("/admin".into()).respond(&JsonRenderer);
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()["location"], "/admin");
    }

    #[test]
    fn json_renderer_keeps_status() {
        let view = View::new("admin/login.html", serde_json::json!({})).with_status(StatusCode::UNAUTHORIZED);
        let resp = Outcome::Render(view).respond(&JsonRenderer);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
