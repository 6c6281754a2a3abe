use log::warn;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "dev-secret-key-change-in-production-minimum-32-chars";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Postgres,
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" | "postgresql" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin (development).
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub backend: BackendKind,
    pub url: Option<String>,
    pub pool_size: u32,
}

#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub session_hours: i64,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"[REDACTED]")
            .field("session_hours", &self.session_hours)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("DATA_BACKEND") {
            Some(v) => v.parse::<BackendKind>().map_err(|value| ConfigError::Invalid {
                key: "DATA_BACKEND",
                value,
            })?,
            None => BackendKind::Postgres,
        };

        let url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if backend == BackendKind::Postgres && url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                warn!("JWT_SECRET not set, using default development secret - DO NOT USE IN PRODUCTION");
                DEV_JWT_SECRET.to_string()
            });

        Ok(AppConfig {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "SERVER_PORT", 8080)?,
                cors_origins: lookup("CORS_ALLOWED_ORIGINS")
                    .map(|raw| {
                        raw.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            database: DatabaseConfig {
                backend,
                url,
                pool_size: parse_or(&lookup, "DB_POOL_SIZE", 10)?,
            },
            auth: AuthSettings {
                jwt_secret,
                session_hours: parse_or(&lookup, "SESSION_HOURS", 24)?,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = AppConfig::from_lookup(lookup_from(&[])).expect_err("missing url");
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_memory_backend_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("DATA_BACKEND", "memory")]))
            .expect("config");
        assert_eq!(config.database.backend, BackendKind::Memory);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATA_BACKEND", "memory"),
            ("SERVER_PORT", "eighty"),
        ]))
        .expect_err("bad port");
        assert!(matches!(err, ConfigError::Invalid { key: "SERVER_PORT", .. }));
    }

    #[test]
    fn test_explicit_values() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://u:p@localhost/site"),
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9000"),
            ("JWT_SECRET", "s3cr3t"),
            ("SESSION_HOURS", "8"),
            ("CORS_ALLOWED_ORIGINS", "https://site.example.com, ,https://ops.example.com"),
        ]))
        .expect("config");
        assert_eq!(config.server.cors_origins.len(), 2);
        assert_eq!(config.database.backend, BackendKind::Postgres);
        assert_eq!(config.auth.jwt_secret, "s3cr3t");
        assert_eq!(config.auth.session_hours, 8);
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }
}
