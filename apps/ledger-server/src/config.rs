//! Ledger server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ledger_db::DbConfig;

/// Ledger server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen host
    pub host: String,

    /// gRPC server port
    pub port: u16,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Pool size, i.e. the number of Transfer streams served at once
    pub db_max_connections: u32,

    /// How long a new stream waits for a free connection
    pub acquire_timeout: Duration,

    /// Delay between startup connection attempts
    pub connect_retry: Duration,

    /// Enable TLS for gRPC
    pub tls_enabled: bool,

    /// TLS certificate path (PEM)
    pub tls_cert_path: Option<PathBuf>,

    /// TLS key path (PEM)
    pub tls_key_path: Option<PathBuf>,

    /// Metadata header whose first value prefixes a stream's log lines
    pub request_header: Option<String>,

    /// Append-only record of computed but undelivered responses
    pub unsent_log_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => compose_database_url(&lookup)?,
        };

        let config = ServerConfig {
            host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "SERVER_PORT", 50051)?,
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            acquire_timeout: Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 10)?),
            connect_retry: Duration::from_secs(parse_or(&lookup, "DB_CONNECT_RETRY_SECS", 10)?),
            tls_enabled: parse_or(&lookup, "TLS_ENABLED", false)?,
            tls_cert_path: lookup("TLS_CERT_PATH").map(PathBuf::from),
            tls_key_path: lookup("TLS_KEY_PATH").map(PathBuf::from),
            request_header: lookup("REQUEST_HEADER_NAME")
                .map(|name| name.trim().to_ascii_lowercase())
                .filter(|name| !name.is_empty()),
            unsent_log_path: lookup("UNSENT_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("log/unsent_changes.log")),
        };

        // Validate TLS configuration
        if config.tls_enabled && (config.tls_cert_path.is_none() || config.tls_key_path.is_none()) {
            return Err(ConfigError::MissingTlsConfig);
        }

        Ok(config)
    }

    /// Socket address the listener binds to.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("SERVER_HOST".to_string()))
    }

    /// Pool settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_url.clone())
            .max_connections(self.db_max_connections)
            .connect_timeout(self.acquire_timeout)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn compose_database_url<F>(lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let required =
        |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingRequired(key.to_string()));

    let host = required("POSTGRES_HOST")?;
    let port: u16 = parse_or(lookup, "POSTGRES_PORT", 5432)?;
    let db = required("POSTGRES_DB")?;
    let user = required("DB_LOGIN")?;
    let password = required("DB_PASSWORD")?;

    Ok(format!("postgres://{user}:{password}@{host}:{port}/{db}"))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("TLS enabled but certificate or key path not provided")]
    MissingTlsConfig,

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x/y")])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 50051);
        assert_eq!(config.db_max_connections, 20);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_retry, Duration::from_secs(10));
        assert!(!config.tls_enabled);
        assert_eq!(config.request_header, None);
        assert_eq!(config.unsent_log_path, PathBuf::from("log/unsent_changes.log"));
        assert_eq!(config.listen_addr().unwrap().port(), 50051);
    }

    #[test]
    fn test_database_url_composed_from_parts() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("POSTGRES_HOST", "db"),
            ("POSTGRES_PORT", "6432"),
            ("POSTGRES_DB", "ledger"),
            ("DB_LOGIN", "svc"),
            ("DB_PASSWORD", "pw"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://svc:pw@db:6432/ledger");
    }

    #[test]
    fn test_missing_database_parts() {
        let err = ServerConfig::from_lookup(lookup_from(&[("POSTGRES_HOST", "db")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(key) if key == "POSTGRES_DB"));
    }

    #[test]
    fn test_invalid_port() {
        let err = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("SERVER_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "SERVER_PORT"));
    }

    #[test]
    fn test_tls_requires_paths() {
        let err = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("TLS_ENABLED", "true"),
            ("TLS_CERT_PATH", "cert.pem"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingTlsConfig));
    }

    #[test]
    fn test_request_header_is_normalized() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("REQUEST_HEADER_NAME", " X-Request-Id "),
            ("DB_ACQUIRE_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.request_header.as_deref(), Some("x-request-id"));
        assert_eq!(config.db_config().connect_timeout, Duration::from_secs(3));
    }
}
