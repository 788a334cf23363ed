//! # quizforge-worker
//!
//! Process bootstrap shared by the `pdf-processor` and `quiz-generator`
//! binaries: logging setup, job store connection and shutdown signals.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizforge_core::defaults::DB_MAX_CONNECTIONS;
use quizforge_db::{Database, DatabaseConfig, PoolConfig};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse a `LOG_FORMAT` value. Anything other than `json` is text.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

/// Logging settings resolved from the environment.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `LOG_FORMAT` | `text` | `json` or `text` |
/// | `LOG_FILE` | - | Log file path, enables daily rotation |
/// | `LOG_ANSI` | auto | Force ANSI colors on or off |
/// | `RUST_LOG` | per binary | Standard env filter |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub ansi: Option<bool>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("LOG_FORMAT").ok().as_deref(),
            std::env::var("LOG_FILE").ok().as_deref(),
            std::env::var("LOG_ANSI").ok().as_deref(),
        )
    }

    fn from_values(format: Option<&str>, file: Option<&str>, ansi: Option<&str>) -> Self {
        Self {
            format: format.map(LogFormat::parse).unwrap_or(LogFormat::Text),
            file: file.filter(|f| !f.trim().is_empty()).map(PathBuf::from),
            ansi: ansi.map(parse_flag),
        }
    }

    /// Directory and file name for the rolling appender.
    fn file_target(&self, default_name: &str) -> Option<(PathBuf, String)> {
        let path = self.file.as_deref()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(default_name)
            .to_string();
        Some((dir, name))
    }
}

/// `true` for `true` or `1`, `false` otherwise.
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Install the global tracing subscriber.
///
/// The returned guard flushes the file appender on drop and must be held
/// for the life of the process.
pub fn init_telemetry(default_filter: &str, default_file_name: &str) -> Option<WorkerGuard> {
    let settings = LogSettings::from_env();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let file_guard = if let Some((dir, name)) = settings.file_target(default_file_name) {
        let file_appender = tracing_appender::rolling::daily(dir, name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        match settings.format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init(),
            LogFormat::Text => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(settings.ansi.unwrap_or(false)),
                )
                .init(),
        }
        Some(guard)
    } else {
        match settings.format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .init(),
            LogFormat::Text => {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = settings.ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
        }
        None
    };

    info!(
        subsystem = "worker",
        log_format = settings.format.as_str(),
        log_file = settings
            .file
            .as_deref()
            .and_then(Path::to_str)
            .unwrap_or("(stdout)"),
        "Logging initialized"
    );

    file_guard
}

/// Pool settings from `DB_MAX_CONNECTIONS`, falling back to the default.
pub fn pool_config_from_env() -> PoolConfig {
    let max = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DB_MAX_CONNECTIONS);
    PoolConfig::new().max_connections(max).min_connections(1)
}

/// Connect to the job store and apply migrations when `RUN_MIGRATIONS` is set.
pub async fn connect_store() -> anyhow::Result<Arc<Database>> {
    let config = DatabaseConfig::from_env()?;
    let db = Database::connect_with_config(&config.url, pool_config_from_env()).await?;

    let run_migrations = std::env::var("RUN_MIGRATIONS")
        .map(|v| parse_flag(&v))
        .unwrap_or(false);
    if run_migrations {
        info!(subsystem = "db", op = "migrate", "Running database migrations");
        db.migrate().await?;
    }

    Ok(Arc::new(db))
}

/// Resolve once Ctrl-C or SIGTERM arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(subsystem = "worker", error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(subsystem = "worker", error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(subsystem = "worker", "Received Ctrl-C"),
        _ = terminate => info!(subsystem = "worker", "Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_log_settings_defaults() {
        let settings = LogSettings::from_values(None, None, None);
        assert_eq!(settings.format, LogFormat::Text);
        assert!(settings.file.is_none());
        assert!(settings.ansi.is_none());
        assert!(settings.file_target("worker.log").is_none());
    }

    #[test]
    fn test_log_settings_blank_file_is_stdout() {
        let settings = LogSettings::from_values(Some("json"), Some("  "), Some("0"));
        assert_eq!(settings.format, LogFormat::Json);
        assert!(settings.file.is_none());
        assert_eq!(settings.ansi, Some(false));
    }

    #[test]
    fn test_file_target_splits_dir_and_name() {
        let settings = LogSettings::from_values(None, Some("/var/log/quizforge/pdf.log"), None);
        let (dir, name) = settings.file_target("worker.log").unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/quizforge"));
        assert_eq!(name, "pdf.log");
    }

    #[test]
    fn test_file_target_bare_name_uses_cwd() {
        let settings = LogSettings::from_values(None, Some("quiz.log"), None);
        let (dir, name) = settings.file_target("worker.log").unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "quiz.log");
    }
}
