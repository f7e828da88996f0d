//! Admin operations: gate the session, then read or write through the gateway.
//!
//! Pages a person navigates to (the collection list and a collection view) send unauthenticated
//! visitors to the login page. Every other operation fails with `Unauthorized` before touching the store.
//!
//! The two form editors merge submitted fields into the stored document, so attributes the form did
//! not show survive. The raw editor replaces the whole document with what was submitted.

use crate::auth::{AuthController, Principal, Session};
use crate::error::AppError;
use crate::schema::parse_schema;
use crate::service::Gateway;
use crate::store::{Document, Filter, ID_KEY};
use crate::transform::{cook_data, fields_transform, schema_transform};
use crate::view::{encode_query_path, Outcome, Route, View};
use axum::http::StatusCode;
use serde_json::{json, Value};

/// Submitted form fields in submission order.
pub type FormFields = Vec<(String, String)>;

/// Form keys that are never written to documents.
const INTERNAL_KEYS: &[&str] = &[ID_KEY, "csrf_token"];

fn form_get<'a>(form: &'a FormFields, key: &str) -> Option<&'a str> {
    form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Submitted fields as a document, minus internal keys. A repeated key keeps its last value.
fn form_document(form: FormFields) -> Document {
    let mut doc = Document::new();
    for (k, v) in form {
        if !INTERNAL_KEYS.contains(&k.as_str()) {
            doc.insert(k, Value::String(v));
        }
    }
    doc
}

/// Parse text as a JSON object.
fn parse_structured(text: &str) -> Result<Document, AppError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(m)) => Ok(m),
        Ok(_) => Err(AppError::Validation("content must be a JSON object".into())),
        Err(e) => Err(AppError::Validation(format!("content is not valid JSON: {}", e))),
    }
}

/// Only same-site absolute paths are followed after login or logout. `/\host` is offsite to a
/// browser just like `//host`, and nothing outside printable ASCII is accepted.
fn local_path(next: Option<&str>) -> Option<&str> {
    next.filter(|n| {
        n.starts_with('/')
            && !n.starts_with("//")
            && n.bytes().all(|b| b.is_ascii_graphic() && b != b'\\')
    })
}

fn principal_json(p: &Principal) -> Value {
    match p {
        Principal::Open => Value::Null,
        Principal::User(u) => Value::Object(u.clone()),
    }
}

pub struct AdminService {
    gateway: Gateway,
    auth: AuthController,
    prefix: String,
    allow_direct_drop: bool,
}

impl AdminService {
    pub fn new(gateway: Gateway, auth: AuthController, url_prefix: impl Into<String>) -> Self {
        AdminService {
            gateway,
            auth,
            prefix: url_prefix.into(),
            allow_direct_drop: false,
        }
    }

    /// Enable `drop_collection`, the unprompted drop.
    pub fn with_direct_drop(mut self, allow: bool) -> Self {
        self.allow_direct_drop = allow;
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn auth(&self) -> &AuthController {
        &self.auth
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn allows_direct_drop(&self) -> bool {
        self.allow_direct_drop
    }

    fn redirect(&self, route: Route) -> Outcome {
        Outcome::Redirect(route.path(&self.prefix))
    }

    /// Gate for navigable pages: Err(redirect to login, returning to `here`) when denied.
    fn page_gate(&self, session: &Session, here: Route) -> Result<Principal, Outcome> {
        self.auth.gate(session).map_err(|_| {
            tracing::warn!(route = here.name(), "unauthenticated page request");
            Outcome::Redirect(format!(
                "{}?next={}",
                Route::Login.path(&self.prefix),
                encode_query_path(&here.path(&self.prefix))
            ))
        })
    }

    fn gate(&self, session: &Session, op: &'static str) -> Result<Principal, AppError> {
        self.auth.gate(session).inspect_err(|_| {
            tracing::warn!(op, "unauthenticated request rejected");
        })
    }

    fn login_view(&self, next: Option<&str>, error: Option<&str>) -> View {
        View::new(
            "admin/login.html",
            json!({ "next": local_path(next), "error": error }),
        )
    }

    pub fn login_form(&self, next: Option<&str>) -> Outcome {
        Outcome::Render(self.login_view(next, None))
    }

    /// On success the session carries a new id that the caller must hand back to the client.
    pub async fn login(&self, session: &mut Session, form: &FormFields, next: Option<&str>) -> Result<Outcome, AppError> {
        let username = form_get(form, "username").unwrap_or_default();
        let password = form_get(form, "password").unwrap_or_default();
        match self.auth.login(session, username, password).await {
            Ok(_) => Ok(match local_path(next) {
                Some(path) => Outcome::Redirect(path.to_string()),
                None => self.redirect(Route::ViewAll),
            }),
            Err(AppError::Unauthorized(msg)) => Ok(Outcome::Render(
                self.login_view(next, Some(msg.as_str())).with_status(StatusCode::UNAUTHORIZED),
            )),
            Err(e) => Err(e),
        }
    }

    pub async fn logout(&self, session: &mut Session, next: Option<&str>) -> Result<Outcome, AppError> {
        self.auth.logout(session).await?;
        Ok(Outcome::Redirect(local_path(next).unwrap_or("/").to_string()))
    }

    pub async fn view_all(&self, session: &Session) -> Result<Outcome, AppError> {
        let principal = match self.page_gate(session, Route::ViewAll) {
            Ok(p) => p,
            Err(redirect) => return Ok(redirect),
        };
        let collections = self.gateway.list_collections().await?;
        Ok(Outcome::Render(View::new(
            "admin/view_all.html",
            json!({ "collections": collections, "user": principal_json(&principal) }),
        )))
    }

    pub async fn view_collection(&self, session: &Session, coll: &str) -> Result<Outcome, AppError> {
        let principal = match self.page_gate(session, Route::ViewCollection(coll.to_string())) {
            Ok(p) => p,
            Err(redirect) => return Ok(redirect),
        };
        let data: Vec<Value> = self
            .gateway
            .find(coll, &Filter::All)
            .await?
            .iter()
            .map(|d| d.to_json_with_id())
            .collect();
        let schema = self.gateway.get_schema(coll).await?;
        Ok(Outcome::Render(View::new(
            "admin/view_collection.html",
            json!({
                "coll": coll,
                "data": data,
                "schema": schema,
                "user": principal_json(&principal),
            }),
        )))
    }

    /// Generic form: one field per document attribute.
    pub async fn edit_fields_form(&self, session: &Session, coll: &str, id: &str) -> Result<Outcome, AppError> {
        self.gate(session, "edit_fields")?;
        let id = self.gateway.parse_id(id)?;
        let doc = self.gateway.get(coll, &id).await?;
        let fields = fields_transform(&doc.body);
        Ok(Outcome::Render(View::new(
            "admin/edit_fields.html",
            json!({ "coll": coll, "id": id.to_string(), "fields": fields }),
        )))
    }

    pub async fn edit_fields(&self, session: &Session, coll: &str, id: &str, form: FormFields) -> Result<Outcome, AppError> {
        self.gate(session, "edit_fields")?;
        self.merge_submission(coll, id, form).await
    }

    /// Schema form: fields in schema order; attributes outside the schema are not shown.
    pub async fn edit_schema_form(&self, session: &Session, coll: &str, id: &str) -> Result<Outcome, AppError> {
        self.gate(session, "edit_schema")?;
        let id = self.gateway.parse_id(id)?;
        let schema = self
            .gateway
            .get_schema(coll)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("schema for '{}'", coll)))?;
        let doc = self.gateway.get(coll, &id).await?;
        let fields = schema_transform(&doc.body, &schema)?;
        Ok(Outcome::Render(View::new(
            "admin/edit_schema.html",
            json!({ "coll": coll, "id": id.to_string(), "fields": fields }),
        )))
    }

    pub async fn edit_schema(&self, session: &Session, coll: &str, id: &str, form: FormFields) -> Result<Outcome, AppError> {
        self.gate(session, "edit_schema")?;
        self.merge_submission(coll, id, form).await
    }

    async fn merge_submission(&self, coll: &str, id: &str, form: FormFields) -> Result<Outcome, AppError> {
        let id = self.gateway.parse_id(id)?;
        self.gateway.update_one(coll, &id, form_document(form)).await?;
        Ok(self.redirect(Route::ViewCollection(coll.to_string())))
    }

    /// The whole document, minus its id, as editable JSON text.
    pub async fn edit_raw_form(&self, session: &Session, coll: &str, id: &str) -> Result<Outcome, AppError> {
        self.gate(session, "edit_raw")?;
        let id = self.gateway.parse_id(id)?;
        let doc = self.gateway.get(coll, &id).await?;
        let content = serde_json::to_string(&doc.body)
            .map_err(|e| AppError::Store(format!("document did not serialize: {}", e)))?;
        Ok(Outcome::Render(View::new(
            "admin/edit_json.html",
            json!({ "coll": coll, "id": id.to_string(), "content": content, "error": null }),
        )))
    }

    /// Replace the document with the submitted JSON `content`. Attributes left out are gone afterwards.
    pub async fn edit_raw(&self, session: &Session, coll: &str, id: &str, form: FormFields) -> Result<Outcome, AppError> {
        self.gate(session, "edit_raw")?;
        let id = self.gateway.parse_id(id)?;
        let content = form_get(&form, "content")
            .ok_or_else(|| AppError::Validation("content is required".into()))?;
        let mut doc = parse_structured(content)?;
        doc.shift_remove(ID_KEY);
        self.gateway.replace_one(coll, &id, doc).await?;
        Ok(self.redirect(Route::ViewCollection(coll.to_string())))
    }

    pub async fn add_item_form(&self, session: &Session, coll: &str) -> Result<Outcome, AppError> {
        self.gate(session, "add_item")?;
        Ok(Outcome::Render(View::new("admin/add_json.html", json!({ "coll": coll }))))
    }

    /// Insert `content` as JSON, or as `key: value` lines when it is not a JSON object.
    pub async fn add_item(&self, session: &Session, coll: &str, form: FormFields) -> Result<Outcome, AppError> {
        self.gate(session, "add_item")?;
        let raw = form_get(&form, "content")
            .ok_or_else(|| AppError::Validation("content is required".into()))?;
        let mut doc = parse_structured(raw).unwrap_or_else(|_| cook_data(raw));
        doc.shift_remove(ID_KEY);
        self.gateway.insert_one(coll, doc).await?;
        Ok(self.redirect(Route::ViewCollection(coll.to_string())))
    }

    /// Declaration form, pre-filled from the existing schema when `coll` is given.
    pub async fn collection_form(&self, session: &Session, coll: Option<&str>) -> Result<Outcome, AppError> {
        self.gate(session, "collection_form")?;
        let mut fields = json!({});
        if let Some(name) = coll {
            fields["name"] = json!(name);
            if let Some(rec) = self.gateway.get_schema(name).await? {
                fields["schema"] = json!(rec.schema_text);
            }
        }
        Ok(Outcome::Render(View::new(
            "admin/add_mod_collection.html",
            json!({ "fields": fields }),
        )))
    }

    /// Save the schema when one is given and make sure the collection exists.
    pub async fn save_collection(&self, session: &Session, form: FormFields) -> Result<Outcome, AppError> {
        self.gate(session, "save_collection")?;
        let name = match form_get(&form, "name").map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => return Ok(self.redirect(Route::ViewAll)),
        };
        self.gateway.collection(name)?.check_writable()?;
        if let Some(schema) = form_get(&form, "schema").filter(|s| !s.trim().is_empty()) {
            parse_schema(schema)?;
            self.gateway.upsert_schema(name, schema).await?;
        }
        self.gateway.touch_collection(name).await?;
        Ok(self.redirect(Route::ViewAll))
    }

    pub async fn delete_item_form(&self, session: &Session, coll: &str, id: &str) -> Result<Outcome, AppError> {
        self.gate(session, "delete_item")?;
        let id = self.gateway.parse_id(id)?;
        let doc = self.gateway.get(coll, &id).await?;
        Ok(Outcome::Render(View::new(
            "admin/delete_item.html",
            json!({ "coll": coll, "id": id.to_string(), "item": doc.to_json_with_id() }),
        )))
    }

    /// Delete one document; `NotFound` when the id does not resolve.
    pub async fn delete_item(&self, session: &Session, coll: &str, id: &str) -> Result<Outcome, AppError> {
        self.gate(session, "delete_item")?;
        let id = self.gateway.parse_id(id)?;
        self.gateway.get(coll, &id).await?;
        if !self.gateway.delete_one(coll, &id).await? {
            return Err(AppError::NotFound(format!("{}/{}", coll, id)));
        }
        Ok(self.redirect(Route::ViewCollection(coll.to_string())))
    }

    pub async fn delete_collection_form(&self, session: &Session, coll: &str) -> Result<Outcome, AppError> {
        self.gate(session, "delete_collection")?;
        Ok(Outcome::Render(View::new(
            "admin/delete_collection_prompt.html",
            json!({ "coll": coll, "fields": {} }),
        )))
    }

    /// Drop `coll` only when the form repeats its name and has `agree=on`.
    pub async fn delete_collection(&self, session: &Session, coll: &str, form: FormFields) -> Result<Outcome, AppError> {
        self.gate(session, "delete_collection")?;
        let confirmed = form_get(&form, "name") == Some(coll) && form_get(&form, "agree") == Some("on");
        if confirmed {
            self.gateway.drop_collection(coll).await?;
        } else {
            tracing::info!(collection = coll, "collection delete not confirmed");
        }
        Ok(self.redirect(Route::ViewAll))
    }

    /// Drop a collection with no confirmation. Refused unless enabled with `with_direct_drop`.
    pub async fn drop_collection(&self, session: &Session, coll: &str) -> Result<Outcome, AppError> {
        self.gate(session, "drop_collection")?;
        if !self.allow_direct_drop {
            return Err(AppError::Unauthorized("direct collection drop is disabled".into()));
        }
        tracing::warn!(collection = coll, "unprompted collection drop");
        self.gateway.drop_collection(coll).await?;
        Ok(self.redirect(Route::ViewAll))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Argon2Scheme, MemorySessionStore};
    use crate::store::{DocId, MemoryDocumentStore};
    use std::sync::Arc;

    fn service(require_authentication: bool) -> AdminService {
        let gateway = Gateway::new(Arc::new(MemoryDocumentStore::new()));
        let auth = AuthController::new(
            gateway.clone(),
            Arc::new(MemorySessionStore::new()),
            Arc::new(Argon2Scheme::with_params(1024, 1, 1).unwrap()),
            "users",
            require_authentication,
        );
        AdminService::new(gateway, auth, "/admin")
    }

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    async fn seed(svc: &AdminService) -> DocId {
        svc.gateway()
            .insert_one("things", doc(json!({"a": 1, "b": 2, "c": 3})))
            .await
            .unwrap()
    }

    async fn body(svc: &AdminService, id: &DocId) -> Document {
        svc.gateway().get("things", id).await.unwrap().body
    }

    fn view(outcome: Outcome) -> View {
        match outcome {
            Outcome::Render(v) => v,
            Outcome::Redirect(to) => panic!("expected a view, got redirect to {}", to),
        }
    }

    #[tokio::test]
    async fn schema_edit_merges_and_keeps_unlisted_attributes() {
        let svc = service(false);
        let id = seed(&svc).await;
        svc.gateway().upsert_schema("things", "a: number").await.unwrap();
        let session = Session::anonymous();

        let form_view = view(svc.edit_schema_form(&session, "things", &id.to_string()).await.unwrap());
        assert_eq!(form_view.context["fields"].as_array().unwrap().len(), 1);

        let out = svc
            .edit_schema(&session, "things", &id.to_string(), form(&[("_id", "x"), ("csrf_token", "t"), ("a", "9")]))
            .await
            .unwrap();
        assert_eq!(out, Outcome::Redirect("/admin/view/things".into()));
        assert_eq!(body(&svc, &id).await, doc(json!({"a": "9", "b": 2, "c": 3})));
    }

    #[tokio::test]
    async fn raw_edit_replaces_whole_document() {
        let svc = service(false);
        let id = seed(&svc).await;
        let session = Session::anonymous();

        let raw = view(svc.edit_raw_form(&session, "things", &id.to_string()).await.unwrap());
        assert_eq!(raw.context["content"], json!(r#"{"a":1,"b":2,"c":3}"#));

        svc.edit_raw(&session, "things", &id.to_string(), form(&[("content", r#"{"a": 9}"#)]))
            .await
            .unwrap();
        assert_eq!(body(&svc, &id).await, doc(json!({"a": 9})));
    }

    #[tokio::test]
    async fn raw_edit_rejects_non_object_before_writing() {
        let svc = service(false);
        let id = seed(&svc).await;
        let session = Session::anonymous();
        for bad in ["[1,2]", "not json"] {
            let err = svc
                .edit_raw(&session, "things", &id.to_string(), form(&[("content", bad)]))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(body(&svc, &id).await, doc(json!({"a": 1, "b": 2, "c": 3})));
    }

    #[tokio::test]
    async fn generic_edit_lists_all_fields_and_merges() {
        let svc = service(false);
        let id = seed(&svc).await;
        let session = Session::anonymous();

        let v = view(svc.edit_fields_form(&session, "things", &id.to_string()).await.unwrap());
        let names: Vec<&str> = v.context["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        svc.edit_fields(&session, "things", &id.to_string(), form(&[("b", "20"), ("d", "new")]))
            .await
            .unwrap();
        assert_eq!(body(&svc, &id).await, doc(json!({"a": 1, "b": "20", "c": 3, "d": "new"})));
    }

    #[tokio::test]
    async fn malformed_id_and_missing_schema_are_reported() {
        let svc = service(false);
        seed(&svc).await;
        let session = Session::anonymous();
        assert!(matches!(
            svc.edit_fields(&session, "things", "nope", form(&[("a", "1")])).await,
            Err(AppError::Validation(_))
        ));
        let id = DocId::generate().to_string();
        assert!(matches!(
            svc.edit_schema_form(&session, "things", &id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn add_item_falls_back_to_key_value_lines() {
        let svc = service(false);
        let session = Session::anonymous();
        svc.add_item(&session, "notes", form(&[("content", r#"{"title": "json"}"#)]))
            .await
            .unwrap();
        svc.add_item(&session, "notes", form(&[("content", "title: cooked\nby: me")]))
            .await
            .unwrap();

        let bodies: Vec<Document> = svc
            .gateway()
            .find("notes", &Filter::All)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.body)
            .collect();
        assert_eq!(
            bodies,
            vec![doc(json!({"title": "json"})), doc(json!({"title": "cooked", "by": "me"}))]
        );
    }

    #[tokio::test]
    async fn save_collection_touches_and_upserts_schema() {
        let svc = service(false);
        let session = Session::anonymous();

        let out = svc.save_collection(&session, form(&[("name", "empty")])).await.unwrap();
        assert_eq!(out, Outcome::Redirect("/admin".into()));
        assert!(svc.gateway().list_collections().await.unwrap().contains(&"empty".to_string()));
        assert!(svc.gateway().get_schema("empty").await.unwrap().is_none());

        svc.save_collection(&session, form(&[("name", "posts"), ("schema", "title: text")]))
            .await
            .unwrap();
        let v = view(svc.collection_form(&session, Some("posts")).await.unwrap());
        assert_eq!(v.context["fields"], json!({"name": "posts", "schema": "title: text"}));
        assert!(svc.gateway().find("posts", &Filter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_collection_with_bad_name_writes_no_schema() {
        let svc = service(false);
        let session = Session::anonymous();
        let bad_name = svc
            .save_collection(&session, form(&[("name", "bad$name"), ("schema", "a: text")]))
            .await;
        assert!(matches!(bad_name, Err(AppError::Validation(_))));
        let reserved = svc
            .save_collection(&session, form(&[("name", "system.x"), ("schema", "a: text")]))
            .await;
        assert!(matches!(reserved, Err(AppError::Store(_))));

        let meta = svc.gateway().find(crate::service::META_COLLECTION, &Filter::All).await.unwrap();
        assert!(meta.is_empty());
        assert!(svc.gateway().list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_collection_without_name_changes_nothing() {
        let svc = service(false);
        let session = Session::anonymous();
        let out = svc.save_collection(&session, form(&[("schema", "a: text")])).await.unwrap();
        assert_eq!(out, Outcome::Redirect("/admin".into()));
        assert!(svc.gateway().list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_collection_rejects_malformed_schema() {
        let svc = service(false);
        let session = Session::anonymous();
        let err = svc
            .save_collection(&session, form(&[("name", "posts"), ("schema", "title:")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Schema(_)));
        assert!(svc.gateway().get_schema("posts").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_item_reports_missing_document() {
        let svc = service(false);
        let id = seed(&svc).await;
        let session = Session::anonymous();

        svc.delete_item(&session, "things", &id.to_string()).await.unwrap();
        assert!(matches!(
            svc.delete_item(&session, "things", &id.to_string()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn prompted_delete_needs_name_and_agreement() {
        let svc = service(false);
        seed(&svc).await;
        let session = Session::anonymous();

        svc.delete_collection(&session, "things", form(&[("name", "things")])).await.unwrap();
        svc.delete_collection(&session, "things", form(&[("name", "other"), ("agree", "on")]))
            .await
            .unwrap();
        assert_eq!(svc.gateway().list_collections().await.unwrap(), vec!["things"]);

        svc.delete_collection(&session, "things", form(&[("name", "things"), ("agree", "on")]))
            .await
            .unwrap();
        assert!(svc.gateway().list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn direct_drop_is_off_unless_enabled() {
        let svc = service(false);
        seed(&svc).await;
        let session = Session::anonymous();
        assert!(matches!(
            svc.drop_collection(&session, "things").await,
            Err(AppError::Unauthorized(_))
        ));

        let svc = svc.with_direct_drop(true);
        svc.drop_collection(&session, "things").await.unwrap();
        assert!(svc.gateway().list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gate_blocks_mutations_until_login() {
        let svc = service(true);
        let id = seed(&svc).await;
        let sid = id.to_string();
        svc.auth().create_user("joe", "pw", Document::new()).await.unwrap();
        let mut session = svc.auth().connect(None).await.unwrap();

        let denied = [
            svc.add_item(&session, "things", form(&[("content", "{}")])).await,
            svc.edit_fields(&session, "things", &sid, form(&[("a", "0")])).await,
            svc.edit_schema(&session, "things", &sid, form(&[("a", "0")])).await,
            svc.edit_raw(&session, "things", &sid, form(&[("content", "{}")])).await,
            svc.delete_item(&session, "things", &sid).await,
            svc.delete_collection(&session, "things", form(&[("name", "things"), ("agree", "on")])).await,
            svc.save_collection(&session, form(&[("name", "other")])).await,
        ];
        for result in denied {
            assert!(matches!(result, Err(AppError::Unauthorized(_))));
        }
        assert_eq!(body(&svc, &id).await, doc(json!({"a": 1, "b": 2, "c": 3})));
        assert_eq!(svc.gateway().find("things", &Filter::All).await.unwrap().len(), 1);
        assert!(!svc.gateway().list_collections().await.unwrap().contains(&"other".to_string()));

        let out = svc
            .login(&mut session, &form(&[("username", "joe"), ("password", "pw")]), None)
            .await
            .unwrap();
        assert_eq!(out, Outcome::Redirect("/admin".into()));

        svc.edit_fields(&session, "things", &sid, form(&[("a", "0")])).await.unwrap();
        assert_eq!(body(&svc, &id).await["a"], json!("0"));
    }

    #[tokio::test]
    async fn pages_redirect_to_login_with_next() {
        let svc = service(true);
        let session = Session::anonymous();
        assert_eq!(
            svc.view_all(&session).await.unwrap(),
            Outcome::Redirect("/admin/login?next=/admin".into())
        );
        assert_eq!(
            svc.view_collection(&session, "my things").await.unwrap(),
            Outcome::Redirect("/admin/login?next=/admin/view/my%2520things".into())
        );
    }

    #[tokio::test]
    async fn failed_login_renders_form_with_401() {
        let svc = service(true);
        let mut session = Session::anonymous();
        let v = view(
            svc.login(&mut session, &form(&[("username", "x"), ("password", "y")]), Some("/admin/view/a"))
                .await
                .unwrap(),
        );
        assert_eq!(v.status, StatusCode::UNAUTHORIZED);
        assert_eq!(v.context["next"], json!("/admin/view/a"));
        assert!(v.context["error"].is_string());
    }

    #[tokio::test]
    async fn login_ignores_offsite_next() {
        let svc = service(true);
        svc.auth().create_user("joe", "pw", Document::new()).await.unwrap();
        let mut session = Session::anonymous();
        let out = svc
            .login(&mut session, &form(&[("username", "joe"), ("password", "pw")]), Some("//evil.example"))
            .await
            .unwrap();
        assert_eq!(out, Outcome::Redirect("/admin".into()));

        for offsite in ["/\\evil.example", "/a\\b", "/x\ny", "evil.example"] {
            let mut session = Session::anonymous();
            let out = svc
                .login(&mut session, &form(&[("username", "joe"), ("password", "pw")]), Some(offsite))
                .await
                .unwrap();
            assert_eq!(out, Outcome::Redirect("/admin".into()), "followed {:?}", offsite);
        }

        let mut session = svc.auth().connect(None).await.unwrap();
        let out = svc.logout(&mut session, Some("/\\evil.example")).await.unwrap();
        assert_eq!(out, Outcome::Redirect("/".into()));
    }

    #[tokio::test]
    async fn view_collection_attaches_string_ids_and_schema() {
        let svc = service(false);
        let id = seed(&svc).await;
        svc.gateway().upsert_schema("things", "a: number").await.unwrap();
        let v = view(svc.view_collection(&Session::anonymous(), "things").await.unwrap());
        assert_eq!(v.context["data"][0]["_id"], json!(id.to_string()));
        assert_eq!(v.context["schema"]["schemaText"], json!("a: number"));
        assert_eq!(v.context["user"], Value::Null);
    }
}
