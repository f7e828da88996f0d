//! Login state per session, the authorization gate, and user records.

mod password;
mod session;

pub use password::{Argon2Scheme, PasswordScheme};
pub use session::{
    MemorySessionStore, PgSessionStore, Session, SessionStore, DEFAULT_SESSION_TTL, KEY_AUTHENTICATED,
    KEY_LOGIN_AT, KEY_USER,
};

use crate::error::AppError;
use crate::service::Gateway;
use crate::store::{DocId, Document, Filter, StoredDocument, ID_KEY};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_HASH_KEY: &str = "passwordHash";
/// Plaintext password attribute accepted by `update_user`; hashed before storing.
pub const PASSWORD_KEY: &str = "password";

/// Who passed the gate.
#[derive(Clone, Debug, PartialEq)]
pub enum Principal {
    /// Authentication is not required.
    Open,
    /// Session user, without its password hash.
    User(Document),
}

/// Selects a user record.
#[derive(Clone, Copy, Debug)]
pub enum UserRef<'a> {
    Username(&'a str),
    Id(DocId),
}

pub struct AuthController {
    gateway: Gateway,
    sessions: Arc<dyn SessionStore>,
    passwords: Arc<dyn PasswordScheme>,
    users_collection: String,
    require_authentication: bool,
    /// Checked against when the username is unknown, so both failures cost one verify.
    dummy_hash: OnceLock<Option<String>>,
}

impl AuthController {
    pub fn new(
        gateway: Gateway,
        sessions: Arc<dyn SessionStore>,
        passwords: Arc<dyn PasswordScheme>,
        users_collection: impl Into<String>,
        require_authentication: bool,
    ) -> Self {
        AuthController {
            gateway,
            sessions,
            passwords,
            users_collection: users_collection.into(),
            require_authentication,
            dummy_hash: OnceLock::new(),
        }
    }

    /// Load the session named by the request's cookie, or an anonymous one.
    pub async fn connect(&self, session_id: Option<&str>) -> Result<Session, AppError> {
        match session_id {
            Some(id) => self.sessions.load(id).await,
            None => Ok(Session::anonymous()),
        }
    }

    /// The user record when `password` matches its stored hash.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<StoredDocument>, AppError> {
        let Some(user) = self.get_user(UserRef::Username(username)).await? else {
            let dummy = self
                .dummy_hash
                .get_or_init(|| self.passwords.hash("docadmin-unknown-user").ok());
            if let Some(hash) = dummy {
                self.passwords.verify(password, hash);
            }
            return Ok(None);
        };
        let verified = user
            .body
            .get(PASSWORD_HASH_KEY)
            .and_then(Value::as_str)
            .map(|hash| self.passwords.verify(password, hash))
            .unwrap_or(false);
        Ok(verified.then_some(user))
    }

    /// Authenticate and mark the session logged in under a freshly issued id. The session
    /// stored under the previous id is deleted. The error does not say whether the username exists.
    pub async fn login(&self, session: &mut Session, username: &str, password: &str) -> Result<Document, AppError> {
        let Some(user) = self.authenticate(username, password).await? else {
            tracing::warn!(username, "login failed");
            return Err(AppError::Unauthorized("invalid username or password".into()));
        };
        let public = public_user(&user);
        let previous = session.id.take();
        session.issue_id();
        session.data.insert(KEY_AUTHENTICATED.into(), Value::Bool(true));
        session.data.insert(KEY_USER.into(), Value::Object(public.clone()));
        session
            .data
            .insert(KEY_LOGIN_AT.into(), Value::String(chrono::Utc::now().to_rfc3339()));
        self.sessions.save(session).await?;
        if let Some(old) = previous {
            self.sessions.delete(&old).await?;
        }
        tracing::info!(username, "login");
        Ok(public)
    }

    /// Clear the session and delete it from the store. The session is anonymous afterwards.
    pub async fn logout(&self, session: &mut Session) -> Result<(), AppError> {
        session.data.clear();
        if let Some(id) = session.id.take() {
            self.sessions.delete(&id).await?;
        }
        tracing::info!("logout");
        Ok(())
    }

    /// Pass when authentication is off or the session is logged in.
    pub fn gate(&self, session: &Session) -> Result<Principal, AppError> {
        if !self.require_authentication {
            return Ok(Principal::Open);
        }
        if session.is_authenticated() {
            return Ok(Principal::User(session.user().cloned().unwrap_or_default()));
        }
        Err(AppError::Unauthorized("authentication required".into()))
    }

    pub async fn get_users(&self) -> Result<Vec<StoredDocument>, AppError> {
        self.gateway.find(&self.users_collection, &Filter::All).await
    }

    pub async fn get_user(&self, user: UserRef<'_>) -> Result<Option<StoredDocument>, AppError> {
        let filter = match user {
            UserRef::Username(name) => Filter::field(USERNAME_KEY, name),
            UserRef::Id(id) => Filter::Id(id),
        };
        self.gateway.find_one(&self.users_collection, &filter).await
    }

    /// Create a user. Returns false, writing nothing, when the username is taken.
    /// `extra` may not carry `username`, `password` or `passwordHash`; null values are skipped.
    pub async fn create_user(&self, username: &str, password: &str, extra: Document) -> Result<bool, AppError> {
        if username.trim().is_empty() {
            return Err(AppError::Validation("username must not be empty".into()));
        }
        if self.get_user(UserRef::Username(username)).await?.is_some() {
            return Ok(false);
        }
        let mut record = Document::new();
        record.insert(USERNAME_KEY.into(), Value::String(username.to_string()));
        record.insert(PASSWORD_HASH_KEY.into(), Value::String(self.passwords.hash(password)?));
        for (key, value) in extra {
            check_user_attribute(&key)?;
            if key == PASSWORD_KEY {
                return Err(AppError::Validation("password is set by argument, not attribute".into()));
            }
            if !value.is_null() {
                record.insert(key, value);
            }
        }
        self.gateway.insert_one(&self.users_collection, record).await?;
        tracing::info!(username, "user created");
        Ok(true)
    }

    /// Apply attribute changes. A null value removes the attribute; `password` is re-hashed.
    /// Returns false when no such user exists.
    pub async fn update_user(&self, username: &str, changes: Document) -> Result<bool, AppError> {
        let Some(user) = self.get_user(UserRef::Username(username)).await? else {
            return Ok(false);
        };
        let mut set = Document::new();
        let mut unset = Vec::new();
        for (key, value) in changes {
            check_user_attribute(&key)?;
            if key == PASSWORD_KEY {
                let Value::String(plain) = value else {
                    return Err(AppError::Validation("password must be a string".into()));
                };
                set.insert(PASSWORD_HASH_KEY.into(), Value::String(self.passwords.hash(&plain)?));
            } else if value.is_null() {
                if user.body.contains_key(&key) {
                    unset.push(key);
                }
            } else {
                set.insert(key, value);
            }
        }
        if !set.is_empty() {
            self.gateway.update_one(&self.users_collection, &user.id, set).await?;
        }
        if !unset.is_empty() {
            self.gateway.unset_fields(&self.users_collection, &user.id, &unset).await?;
        }
        Ok(true)
    }

    /// Delete a user, returning the removed record.
    pub async fn delete_user(&self, user: UserRef<'_>) -> Result<Option<StoredDocument>, AppError> {
        let Some(found) = self.get_user(user).await? else {
            return Ok(None);
        };
        self.gateway.delete_one(&self.users_collection, &found.id).await?;
        tracing::info!(id = %found.id, "user deleted");
        Ok(Some(found))
    }
}

fn check_user_attribute(key: &str) -> Result<(), AppError> {
    match key {
        USERNAME_KEY | PASSWORD_HASH_KEY | ID_KEY => Err(AppError::Validation(format!(
            "user attribute '{}' cannot be set directly",
            key
        ))),
        _ => Ok(()),
    }
}

/// User record as kept in the session: `_id` as a string, no password hash.
fn public_user(user: &StoredDocument) -> Document {
    let mut out = match user.to_json_with_id() {
        Value::Object(m) => m,
        _ => Document::new(),
    };
    out.shift_remove(PASSWORD_HASH_KEY);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn controller(require_authentication: bool) -> AuthController {
        controller_with_sessions(require_authentication, Arc::new(MemorySessionStore::new()))
    }

    fn controller_with_sessions(require_authentication: bool, sessions: Arc<dyn SessionStore>) -> AuthController {
        let gateway = Gateway::new(Arc::new(MemoryDocumentStore::new()));
        AuthController::new(
            gateway,
            sessions,
            Arc::new(Argon2Scheme::with_params(1024, 1, 1).unwrap()),
            "users",
            require_authentication,
        )
    }

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let auth = controller(true);
        assert!(auth.create_user("joe", "pw", Document::new()).await.unwrap());
        assert!(!auth.create_user("joe", "other", Document::new()).await.unwrap());

        let joes: Vec<_> = auth
            .get_users()
            .await
            .unwrap()
            .into_iter()
            .filter(|u| u.body[USERNAME_KEY] == json!("joe"))
            .collect();
        assert_eq!(joes.len(), 1);
        assert!(auth.authenticate("joe", "pw").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn password_is_stored_hashed() {
        let auth = controller(true);
        auth.create_user("ann", "hunter2", doc(json!({"email": "ann@x.org"})))
            .await
            .unwrap();
        let user = auth.get_user(UserRef::Username("ann")).await.unwrap().unwrap();
        let hash = user.body[PASSWORD_HASH_KEY].as_str().unwrap();
        assert_ne!(hash, "hunter2");
        assert!(!user.body.contains_key(PASSWORD_KEY));
        assert_eq!(user.body["email"], json!("ann@x.org"));
    }

    #[tokio::test]
    async fn null_update_removes_attribute() {
        let auth = controller(true);
        auth.create_user("joe", "pw", doc(json!({"nickname": "jj", "email": "j@x.org"})))
            .await
            .unwrap();
        assert!(auth
            .update_user("joe", doc(json!({"nickname": null, "email": "new@x.org"})))
            .await
            .unwrap());

        let user = auth.get_user(UserRef::Username("joe")).await.unwrap().unwrap();
        assert!(!user.body.contains_key("nickname"));
        assert_eq!(user.body["email"], json!("new@x.org"));
    }

    #[tokio::test]
    async fn null_update_of_absent_attribute_stores_nothing() {
        let auth = controller(true);
        auth.create_user("joe", "pw", Document::new()).await.unwrap();
        auth.update_user("joe", doc(json!({"nickname": null}))).await.unwrap();
        let user = auth.get_user(UserRef::Username("joe")).await.unwrap().unwrap();
        assert!(!user.body.contains_key("nickname"));
    }

    #[tokio::test]
    async fn update_password_rehashes() {
        let auth = controller(true);
        auth.create_user("joe", "old", Document::new()).await.unwrap();
        auth.update_user("joe", doc(json!({"password": "new"}))).await.unwrap();
        assert!(auth.authenticate("joe", "old").await.unwrap().is_none());
        assert!(auth.authenticate("joe", "new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_unknown_user_is_false_and_protected_keys_fail() {
        let auth = controller(true);
        assert!(!auth.update_user("ghost", Document::new()).await.unwrap());
        auth.create_user("joe", "pw", Document::new()).await.unwrap();
        assert!(matches!(
            auth.update_user("joe", doc(json!({"passwordHash": "x"}))).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_user_by_name_or_id() {
        let auth = controller(true);
        auth.create_user("a", "pw", Document::new()).await.unwrap();
        auth.create_user("b", "pw", Document::new()).await.unwrap();

        let removed = auth.delete_user(UserRef::Username("a")).await.unwrap().unwrap();
        assert_eq!(removed.body[USERNAME_KEY], json!("a"));

        let b = auth.get_user(UserRef::Username("b")).await.unwrap().unwrap();
        assert!(auth.delete_user(UserRef::Id(b.id)).await.unwrap().is_some());
        assert!(auth.get_users().await.unwrap().is_empty());
        assert!(auth.delete_user(UserRef::Username("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_then_logout_drives_gate() {
        let auth = controller(true);
        auth.create_user("joe", "pw", Document::new()).await.unwrap();

        let mut session = auth.connect(None).await.unwrap();
        assert!(matches!(auth.gate(&session), Err(AppError::Unauthorized(_))));

        let user = auth.login(&mut session, "joe", "pw").await.unwrap();
        assert!(!user.contains_key(PASSWORD_HASH_KEY));
        assert!(user.contains_key(ID_KEY));

        // A later request presenting the same id sees the login.
        let reloaded = auth.connect(session.id.as_deref()).await.unwrap();
        match auth.gate(&reloaded).unwrap() {
            Principal::User(u) => assert_eq!(u[USERNAME_KEY], json!("joe")),
            Principal::Open => panic!("expected a user"),
        }

        let mut reloaded = reloaded;
        auth.logout(&mut reloaded).await.unwrap();
        assert!(reloaded.id.is_none());
        assert!(reloaded.data.is_empty());
        let after = auth.connect(session.id.as_deref()).await.unwrap();
        assert!(after.user().is_none());
        assert!(matches!(auth.gate(&after), Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn login_discards_the_pre_login_session() {
        let sessions = Arc::new(MemorySessionStore::new());
        let auth = controller_with_sessions(true, sessions.clone());
        auth.create_user("joe", "pw", Document::new()).await.unwrap();

        let mut session = Session::anonymous();
        let old_id = session.issue_id().to_string();
        session.data.insert("visits".into(), json!(3));
        sessions.save(&session).await.unwrap();

        auth.login(&mut session, "joe", "pw").await.unwrap();
        assert_ne!(session.id.as_deref(), Some(old_id.as_str()));
        assert!(sessions.load(&old_id).await.unwrap().data.is_empty());
        let current = sessions.load(session.id.as_deref().unwrap()).await.unwrap();
        assert!(current.is_authenticated());
    }

    #[tokio::test]
    async fn expired_login_no_longer_passes_gate() {
        let auth = controller_with_sessions(true, Arc::new(MemorySessionStore::with_ttl(std::time::Duration::ZERO)));
        auth.create_user("joe", "pw", Document::new()).await.unwrap();
        let mut session = Session::anonymous();
        auth.login(&mut session, "joe", "pw").await.unwrap();

        let reloaded = auth.connect(session.id.as_deref()).await.unwrap();
        assert!(matches!(auth.gate(&reloaded), Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn unknown_user_still_runs_a_password_check() {
        let auth = controller(true);
        assert!(auth.dummy_hash.get().is_none());
        assert!(auth.authenticate("ghost", "pw").await.unwrap().is_none());
        let dummy = auth.dummy_hash.get().cloned().flatten().unwrap();
        assert!(dummy.starts_with("$argon2id$"));
        assert!(auth.authenticate("ghost", "docadmin-unknown-user").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_credentials_leave_session_anonymous() {
        let auth = controller(true);
        auth.create_user("joe", "pw", Document::new()).await.unwrap();

        for (user, pw) in [("joe", "wrong"), ("nobody", "pw")] {
            let mut session = Session::anonymous();
            let err = auth.login(&mut session, user, pw).await.unwrap_err();
            assert_eq!(err.to_string(), "unauthorized: invalid username or password");
            assert!(session.id.is_none());
            assert!(!session.is_authenticated());
        }
    }

    #[tokio::test]
    async fn gate_is_open_without_required_auth() {
        let auth = controller(false);
        assert_eq!(auth.gate(&Session::anonymous()).unwrap(), Principal::Open);
    }
}
