//! Process configuration, read once from the environment at start-up.

use std::net::SocketAddr;

use doctrack_observability::LogFormat;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_JWT_TTL_SECS: i64 = 86_400;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_ADMIN_NAME: &str = "Administrador";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

/// Administrator account created on start-up when missing.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Immutable application configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_ttl: chrono::Duration,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub cors_origin: String,
    pub log_format: LogFormat,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_ttl", &self.jwt_ttl)
            .field("database", &self.database_url.as_ref().map(|_| "postgres"))
            .field("database_max_connections", &self.database_max_connections)
            .field("cors_origin", &self.cors_origin)
            .field("log_format", &self.log_format)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// Load from the process environment, after applying a `.env` file if
    /// one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDR", e))?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());

        let ttl_secs = match get("JWT_TTL_SECS") {
            Some(v) => v
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("JWT_TTL_SECS", "must be a positive integer"))?,
            None => DEFAULT_JWT_TTL_SECS,
        };

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("DATABASE_MAX_CONNECTIONS", "must be a positive integer"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|e| invalid("LOG_FORMAT", e))?,
            None => LogFormat::default(),
        };

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: get("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string()),
            }),
            (None, None) => None,
            _ => {
                return Err(invalid(
                    "BOOTSTRAP_ADMIN_EMAIL",
                    "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together",
                ));
            }
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_ttl: chrono::Duration::seconds(ttl_secs),
            database_url: get("DATABASE_URL"),
            database_max_connections,
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            log_format,
            bootstrap_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 3001);
        assert_eq!(cfg.jwt_secret, DEFAULT_JWT_SECRET);
        assert_eq!(cfg.jwt_ttl, chrono::Duration::days(1));
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.bootstrap_admin.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = load(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("JWT_TTL_SECS", "60"),
            ("DATABASE_URL", "postgres://localhost/doctrack"),
            ("LOG_FORMAT", "pretty"),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@x.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "secret1"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.jwt_ttl, chrono::Duration::seconds(60));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/doctrack"));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.bootstrap_admin.unwrap().name, DEFAULT_ADMIN_NAME);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(load(&[("JWT_TTL_SECS", "0")]).is_err());
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(load(&[("BOOTSTRAP_ADMIN_EMAIL", "root@x.com")]).is_err());
    }

    #[test]
    fn debug_hides_secrets() {
        let cfg = load(&[("JWT_SECRET", "top-secret"), ("DATABASE_URL", "postgres://u:pw@h/db")]).unwrap();
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("top-secret"));
        assert!(!shown.contains("pw@h"));
    }
}
