//! docadmin: metadata-driven CRUD administration over a schemaless document store.

pub mod auth;
pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod state;
pub mod store;
pub mod transform;
pub mod view;

pub use auth::{AuthController, Principal, Session, UserRef};
pub use config::AdminConfig;
pub use error::{AppError, ConfigError, SchemaError};
pub use routes::{admin_routes, app, common_routes, common_routes_with_ready};
pub use schema::{parse_schema, FieldTemplate, SchemaRecord};
pub use service::{AdminService, Gateway};
pub use state::AppState;
pub use store::{ensure_database_exists, DocId, Document, DocumentStore, Filter, StoredDocument};
pub use view::{JsonRenderer, Outcome, Renderer, Route, View};
