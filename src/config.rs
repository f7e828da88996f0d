//! Runtime settings read from the environment. Every key is optional.

use crate::auth::DEFAULT_SESSION_TTL;
use crate::error::ConfigError;
use std::net::SocketAddr;
use std::time::Duration;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_SCHEMA: &str = "DOCADMIN_SCHEMA";
pub const ENV_URL_PREFIX: &str = "DOCADMIN_URL_PREFIX";
pub const ENV_USERS_COLLECTION: &str = "DOCADMIN_USERS_COLLECTION";
pub const ENV_REQUIRE_AUTH: &str = "DOCADMIN_REQUIRE_AUTH";
pub const ENV_ALLOW_DIRECT_DROP: &str = "DOCADMIN_ALLOW_DIRECT_DROP";
pub const ENV_BIND: &str = "DOCADMIN_BIND";
pub const ENV_SESSION_COOKIE: &str = "DOCADMIN_SESSION_COOKIE";
pub const ENV_MAX_BODY_BYTES: &str = "DOCADMIN_MAX_BODY_BYTES";
pub const ENV_SESSION_TTL_SECS: &str = "DOCADMIN_SESSION_TTL_SECS";

#[derive(Clone, Debug, PartialEq)]
pub struct AdminConfig {
    /// None selects the in-memory store and sessions.
    pub database_url: Option<String>,
    pub db_schema: String,
    pub url_prefix: String,
    pub users_collection: String,
    pub require_authentication: bool,
    pub allow_direct_drop: bool,
    pub bind: SocketAddr,
    pub session_cookie: String,
    /// Idle time after which a stored session is forgotten.
    pub session_ttl: Duration,
    pub max_body_bytes: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        AdminConfig {
            database_url: None,
            db_schema: "docadmin".into(),
            url_prefix: "/admin".into(),
            users_collection: "admin_users".into(),
            require_authentication: true,
            allow_direct_drop: false,
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            session_cookie: "docadmin_session".into(),
            session_ttl: DEFAULT_SESSION_TTL,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = AdminConfig::default();

        cfg.database_url = get(ENV_DATABASE_URL);
        if let Some(v) = get(ENV_SCHEMA) {
            cfg.db_schema = v;
        }
        if let Some(v) = get(ENV_URL_PREFIX) {
            if !v.starts_with('/') {
                return Err(ConfigError::Invalid { key: ENV_URL_PREFIX, value: v });
            }
            cfg.url_prefix = match v.trim_end_matches('/') {
                "" => String::new(),
                trimmed => trimmed.to_string(),
            };
        }
        if let Some(v) = get(ENV_USERS_COLLECTION) {
            cfg.users_collection = v;
        }
        if let Some(v) = get(ENV_REQUIRE_AUTH) {
            cfg.require_authentication = parse_bool(ENV_REQUIRE_AUTH, v)?;
        }
        if let Some(v) = get(ENV_ALLOW_DIRECT_DROP) {
            cfg.allow_direct_drop = parse_bool(ENV_ALLOW_DIRECT_DROP, v)?;
        }
        if let Some(v) = get(ENV_BIND) {
            cfg.bind = v
                .parse()
                .map_err(|_| ConfigError::Invalid { key: ENV_BIND, value: v.clone() })?;
        }
        if let Some(v) = get(ENV_SESSION_COOKIE) {
            cfg.session_cookie = v;
        }
        if let Some(v) = get(ENV_SESSION_TTL_SECS) {
            let secs: u64 = v
                .parse()
                .map_err(|_| ConfigError::Invalid { key: ENV_SESSION_TTL_SECS, value: v.clone() })?;
            cfg.session_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = get(ENV_MAX_BODY_BYTES) {
            cfg.max_body_bytes = v
                .parse()
                .map_err(|_| ConfigError::Invalid { key: ENV_MAX_BODY_BYTES, value: v.clone() })?;
        }
        Ok(cfg)
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}
