//! Shared application state for all routes.

use crate::auth::{Argon2Scheme, AuthController, MemorySessionStore, PasswordScheme, PgSessionStore, SessionStore};
use crate::config::AdminConfig;
use crate::error::AppError;
use crate::service::{AdminService, Gateway};
use crate::store::{ensure_database_exists, DocumentStore, MemoryDocumentStore, PgDocumentStore};
use crate::view::{JsonRenderer, Renderer};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub admin: Arc<AdminService>,
    pub renderer: Arc<dyn Renderer>,
    pub config: Arc<AdminConfig>,
}

impl AppState {
    /// Wire the admin service over the given stores. Views render as JSON until `with_renderer`.
    pub fn from_parts(
        config: AdminConfig,
        store: Arc<dyn DocumentStore>,
        sessions: Arc<dyn SessionStore>,
        passwords: Arc<dyn PasswordScheme>,
    ) -> Self {
        let gateway = Gateway::new(store);
        let auth = AuthController::new(
            gateway.clone(),
            sessions,
            passwords,
            config.users_collection.clone(),
            config.require_authentication,
        );
        let admin = AdminService::new(gateway, auth, config.url_prefix.clone())
            .with_direct_drop(config.allow_direct_drop);
        AppState {
            admin: Arc::new(admin),
            renderer: Arc::new(JsonRenderer),
            config: Arc::new(config),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Process-local documents and sessions; nothing survives a restart.
    pub fn in_memory(config: AdminConfig) -> Self {
        let ttl = config.session_ttl;
        Self::from_parts(
            config,
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemorySessionStore::with_ttl(ttl)),
            Arc::new(Argon2Scheme::default()),
        )
    }

    /// PostgreSQL-backed state when `database_url` is set, in-memory otherwise.
    /// Creates the database, schema and tables as needed.
    pub async fn connect(config: AdminConfig) -> Result<Self, AppError> {
        let Some(url) = config.database_url.clone() else {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            return Ok(Self::in_memory(config));
        };
        ensure_database_exists(&url).await?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = PgDocumentStore::new(pool.clone(), config.db_schema.clone());
        store.ensure_tables().await?;
        let sessions = PgSessionStore::new(pool, &config.db_schema).with_ttl(config.session_ttl);
        sessions.ensure_table().await?;
        tracing::info!(schema = %config.db_schema, "connected to PostgreSQL store");

        Ok(Self::from_parts(
            config,
            Arc::new(store),
            Arc::new(sessions),
            Arc::new(Argon2Scheme::default()),
        ))
    }
}
