//! Database connection pool management.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use quizforge_core::defaults::{DB_CONNECT_TIMEOUT_SECS, DB_MAX_CONNECTIONS, POSTGRES_PORT};
use quizforge_core::{Error, Result};

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DB_MAX_CONNECTIONS,
            min_connections: 1,
            connect_timeout: Duration::from_secs(DB_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    /// Set the minimum number of connections.
    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Where to connect, resolved from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &redact_url(&self.url))
            .finish()
    }
}

impl DatabaseConfig {
    /// Resolve the connection URL from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DATABASE_URL` | - | Full URL, takes precedence |
    /// | `POSTGRES_HOST` | `localhost` | Host |
    /// | `POSTGRES_PORT` | `5432` | Port |
    /// | `POSTGRES_USER` | - | User (required without `DATABASE_URL`) |
    /// | `POSTGRES_PASSWORD` | empty | Password |
    /// | `POSTGRES_DB` | - | Database name (required without `DATABASE_URL`) |
    pub fn from_env() -> Result<Self> {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                return Ok(Self { url });
            }
        }

        let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("POSTGRES_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(POSTGRES_PORT);
        let user = std::env::var("POSTGRES_USER")
            .map_err(|_| Error::Config("POSTGRES_USER or DATABASE_URL must be set".into()))?;
        let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();
        let dbname = std::env::var("POSTGRES_DB")
            .map_err(|_| Error::Config("POSTGRES_DB or DATABASE_URL must be set".into()))?;

        Ok(Self::from_parts(&host, port, &user, &password, &dbname))
    }

    /// Build a URL from individual connection parameters.
    pub fn from_parts(host: &str, port: u16, user: &str, password: &str, dbname: &str) -> Self {
        let credentials = if password.is_empty() {
            user.to_string()
        } else {
            format!("{}:{}", user, password)
        };
        Self {
            url: format!("postgres://{}@{}:{}/{}", credentials, host, port, dbname),
        }
    }
}

/// Hide the password component of a postgres URL for logging.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => url.to_string(),
    }
}

/// Create a new PostgreSQL connection pool with default configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Create a new PostgreSQL connection pool with custom configuration.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        url = %redact_url(database_url),
        "Creating database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Log current pool health metrics.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, DB_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, 1);
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new()
            .max_connections(1)
            .min_connections(0)
            .connect_timeout(Duration::from_secs(5));

        assert_eq!(config.max_connections, 1);
        assert_eq!(config.min_connections, 0);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_database_config_from_parts() {
        let config = DatabaseConfig::from_parts("db", 5433, "quiz", "secret", "learning");
        assert_eq!(config.url, "postgres://quiz:secret@db:5433/learning");
    }

    #[test]
    fn test_database_config_from_parts_without_password() {
        let config = DatabaseConfig::from_parts("localhost", 5432, "quiz", "", "learning");
        assert_eq!(config.url, "postgres://quiz@localhost:5432/learning");
    }

    #[test]
    fn test_redact_url_hides_password() {
        assert_eq!(
            redact_url("postgres://quiz:secret@db:5432/learning"),
            "postgres://quiz:***@db:5432/learning"
        );
    }

    #[test]
    fn test_redact_url_without_password() {
        let url = "postgres://quiz@db:5432/learning";
        assert_eq!(redact_url(url), url);
    }

    #[test]
    fn test_database_config_debug_redacts() {
        let config = DatabaseConfig::from_parts("db", 5432, "quiz", "secret", "learning");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
    }
}
