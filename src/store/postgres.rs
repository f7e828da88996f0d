//! PostgreSQL document store. Documents live as JSONB rows in `<schema>.documents`; collection
//! names live in `<schema>.collections` so an empty collection still exists.

use super::{CollectionHandle, DocId, Document, DocumentStore, Filter, StoredDocument};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    schema: String,
}

impl PgDocumentStore {
    /// Wrap a pool. `schema` must be a valid PostgreSQL identifier; call `ensure_tables` before use.
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgDocumentStore {
            pool,
            schema: schema.into(),
        }
    }

    fn table(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), table)
    }

    /// Create the schema and store tables if they do not exist.
    pub async fn ensure_tables(&self) -> Result<(), AppError> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&self.schema)))
            .execute(&self.pool)
            .await?;

        let collections_ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                name TEXT PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table("collections")
        );
        sqlx::query(&collections_ddl).execute(&self.pool).await?;

        let documents_ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                collection TEXT NOT NULL,
                id UUID NOT NULL,
                seq BIGSERIAL,
                body JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
            "#,
            self.table("documents")
        );
        sqlx::query(&documents_ddl).execute(&self.pool).await?;
        Ok(())
    }

    /// Extra WHERE clause after `collection = $1`.
    fn filter_sql(filter: &Filter) -> &'static str {
        match filter {
            Filter::All => "",
            Filter::Id(_) => " AND id = $2",
            Filter::Field { .. } => " AND body -> $2 = $3",
        }
    }

    async fn select(
        &self,
        coll: &CollectionHandle,
        filter: &Filter,
        limit: Option<i64>,
    ) -> Result<Vec<StoredDocument>, AppError> {
        let limit_sql = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
        let sql = format!(
            "SELECT id, body FROM {} WHERE collection = $1{} ORDER BY seq{}",
            self.table("documents"),
            Self::filter_sql(filter),
            limit_sql
        );
        tracing::debug!(sql = %sql, collection = coll.name(), "query");
        let query = sqlx::query_as::<_, (uuid::Uuid, Value)>(&sql).bind(coll.name());
        let query = match filter {
            Filter::All => query,
            Filter::Id(id) => query.bind(id.as_uuid()),
            Filter::Field { name, value } => query.bind(name.as_str()).bind(value),
        };
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(id, body)| StoredDocument {
                id: DocId::from(id),
                body: into_document(body),
            })
            .collect())
    }
}

fn into_document(v: Value) -> Document {
    match v {
        Value::Object(m) => m,
        _ => Document::new(),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, AppError> {
        let sql = format!("SELECT name FROM {} ORDER BY name", self.table("collections"));
        let names = sqlx::query_scalar::<_, String>(&sql).fetch_all(&self.pool).await?;
        Ok(names)
    }

    async fn find(&self, coll: &CollectionHandle, filter: &Filter) -> Result<Vec<StoredDocument>, AppError> {
        self.select(coll, filter, None).await
    }

    async fn find_one(&self, coll: &CollectionHandle, filter: &Filter) -> Result<Option<StoredDocument>, AppError> {
        Ok(self.select(coll, filter, Some(1)).await?.into_iter().next())
    }

    async fn insert_one(&self, coll: &CollectionHandle, doc: Document) -> Result<DocId, AppError> {
        coll.check_writable()?;
        let id = DocId::generate();
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "INSERT INTO {} (name) VALUES ($1) ON CONFLICT (name) DO NOTHING",
            self.table("collections")
        ))
        .bind(coll.name())
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "INSERT INTO {} (collection, id, body) VALUES ($1, $2, $3)",
            self.table("documents")
        ))
        .bind(coll.name())
        .bind(id.as_uuid())
        .bind(Value::Object(doc))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_one(&self, coll: &CollectionHandle, id: &DocId, set: Document) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {} SET body = body || $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
            self.table("documents")
        );
        tracing::debug!(sql = %sql, collection = coll.name(), "query");
        let result = sqlx::query(&sql)
            .bind(coll.name())
            .bind(id.as_uuid())
            .bind(Value::Object(set))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unset_fields(&self, coll: &CollectionHandle, id: &DocId, keys: &[String]) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {} SET body = body - $3::text[], updated_at = NOW() WHERE collection = $1 AND id = $2",
            self.table("documents")
        );
        tracing::debug!(sql = %sql, collection = coll.name(), "query");
        let result = sqlx::query(&sql)
            .bind(coll.name())
            .bind(id.as_uuid())
            .bind(keys)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_one(&self, coll: &CollectionHandle, id: &DocId, doc: Document) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {} SET body = $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
            self.table("documents")
        );
        tracing::debug!(sql = %sql, collection = coll.name(), "query");
        let result = sqlx::query(&sql)
            .bind(coll.name())
            .bind(id.as_uuid())
            .bind(Value::Object(doc))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_one(&self, coll: &CollectionHandle, id: &DocId) -> Result<bool, AppError> {
        let sql = format!(
            "DELETE FROM {} WHERE collection = $1 AND id = $2",
            self.table("documents")
        );
        tracing::debug!(sql = %sql, collection = coll.name(), "query");
        let result = sqlx::query(&sql)
            .bind(coll.name())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn drop_collection(&self, coll: &CollectionHandle) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {} WHERE collection = $1", self.table("documents")))
            .bind(coll.name())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(&format!("DELETE FROM {} WHERE name = $1", self.table("collections")))
            .bind(coll.name())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::Validation(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| AppError::Validation("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
