//! Server-side session storage keyed by an opaque id carried in a cookie.

use crate::error::AppError;
use crate::store::Document;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

pub const KEY_AUTHENTICATED: &str = "is_authenticated";
pub const KEY_USER: &str = "user";
pub const KEY_LOGIN_AT: &str = "login_at";

/// Idle lifetime of a stored session when none is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Mutable session state for one request. Changes persist only through `SessionStore::save`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    /// None until the session has been issued an id (on login).
    pub id: Option<String>,
    pub data: Document,
}

impl Session {
    pub fn anonymous() -> Self {
        Session::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.data.get(KEY_AUTHENTICATED).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn user(&self) -> Option<&Document> {
        self.data.get(KEY_USER).and_then(Value::as_object)
    }

    /// Give the session a fresh random id, discarding any previous one.
    pub fn issue_id(&mut self) -> &str {
        self.id.insert(uuid::Uuid::new_v4().simple().to_string())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Session for `id`. An unknown or expired id yields empty data under that id.
    async fn load(&self, id: &str) -> Result<Session, AppError>;

    /// Persist `session` and restart its lifetime. Sessions without an id are not stored.
    async fn save(&self, session: &Session) -> Result<(), AppError>;

    /// Forget the session stored under `id`, if any.
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Store("session lock poisoned".into())
}

/// Sessions in process memory. Expired entries are dropped on the next save.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, (Document, Instant)>>,
    ttl: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        MemorySessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn live(&self, saved_at: Instant) -> bool {
        saved_at.elapsed() < self.ttl
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions.read().map(|g| g.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Session, AppError> {
        let guard = self.sessions.read().map_err(poisoned)?;
        let data = match guard.get(id) {
            Some((data, saved_at)) if self.live(*saved_at) => data.clone(),
            _ => Document::new(),
        };
        Ok(Session {
            id: Some(id.to_string()),
            data,
        })
    }

    async fn save(&self, session: &Session) -> Result<(), AppError> {
        let Some(id) = &session.id else {
            return Ok(());
        };
        let mut guard = self.sessions.write().map_err(poisoned)?;
        guard.retain(|_, (_, saved_at)| saved_at.elapsed() < self.ttl);
        guard.insert(id.clone(), (session.data.clone(), Instant::now()));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.sessions.write().map_err(poisoned)?.remove(id);
        Ok(())
    }
}

/// Sessions in `<schema>.sessions`, one JSONB row per id. Rows idle longer than the TTL
/// are ignored by `load` and purged by `save`.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    table: String,
    ttl: Duration,
}

impl PgSessionStore {
    pub fn new(pool: PgPool, schema: &str) -> Self {
        PgSessionStore {
            pool,
            table: format!("{}.sessions", crate::store::quote_ident(schema)),
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Create the sessions table if missing. The schema must already exist.
    pub async fn ensure_table(&self) -> Result<(), AppError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &str) -> Result<Session, AppError> {
        let sql = format!(
            "SELECT data FROM {} WHERE id = $1 AND updated_at > NOW() - make_interval(secs => $2)",
            self.table
        );
        let row: Option<(Value,)> = sqlx::query_as(&sql)
            .bind(id)
            .bind(self.ttl.as_secs_f64())
            .fetch_optional(&self.pool)
            .await?;
        let data = match row {
            Some((Value::Object(m),)) => m,
            _ => Document::new(),
        };
        Ok(Session {
            id: Some(id.to_string()),
            data,
        })
    }

    async fn save(&self, session: &Session) -> Result<(), AppError> {
        let Some(id) = &session.id else {
            return Ok(());
        };
        let sql = format!(
            r#"
            INSERT INTO {} (id, data, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (id)
            DO UPDATE SET data = $2, updated_at = NOW()
            "#,
            self.table
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(session.data.clone()))
            .execute(&self.pool)
            .await?;

        let purge = format!(
            "DELETE FROM {} WHERE updated_at <= NOW() - make_interval(secs => $1)",
            self.table
        );
        let purged = sqlx::query(&purge)
            .bind(self.ttl.as_secs_f64())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "expired sessions removed");
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }
}
