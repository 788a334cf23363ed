//! File fetchers: materialize a stored document at a local scratch path.
//!
//! The provider is chosen once at startup from [`FetcherConfig`]; the
//! ingestion pipeline only sees `Arc<dyn FileFetcher>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use quizforge_core::defaults::FETCH_TIMEOUT_SECS;
use quizforge_core::{Error, FileFetcher, Result};

/// Storage provider selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetcherConfig {
    /// Stored paths are local filesystem paths. Relative paths are resolved
    /// against `root` when set, else against the working directory.
    Local { root: Option<PathBuf> },
    /// Stored paths are object keys under `base_url`, downloaded over HTTP(S).
    /// `query_token` (e.g. an Azure SAS token) is appended to every request.
    Http {
        base_url: String,
        query_token: Option<String>,
        timeout_secs: u64,
    },
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig::Local { root: None }
    }
}

impl FetcherConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `STORAGE_PROVIDER` | `local` | `local` or `http` |
    /// | `STORAGE_LOCAL_ROOT` | - | Base for relative local paths |
    /// | `STORAGE_BASE_URL` | - | Object storage base URL (required for `http`) |
    /// | `STORAGE_QUERY_TOKEN` | - | Query string appended to downloads |
    /// | `STORAGE_TIMEOUT_SECS` | `120` | Download timeout |
    pub fn from_env() -> Result<Self> {
        let provider = std::env::var("STORAGE_PROVIDER").unwrap_or_else(|_| "local".to_string());
        match provider.as_str() {
            "local" => Ok(FetcherConfig::Local {
                root: std::env::var("STORAGE_LOCAL_ROOT").ok().map(PathBuf::from),
            }),
            "http" => {
                let base_url = std::env::var("STORAGE_BASE_URL").map_err(|_| {
                    Error::Config("STORAGE_BASE_URL is required for the http provider".into())
                })?;
                let query_token = std::env::var("STORAGE_QUERY_TOKEN")
                    .ok()
                    .filter(|t| !t.is_empty());
                let timeout_secs = std::env::var("STORAGE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(FETCH_TIMEOUT_SECS);
                Ok(FetcherConfig::Http {
                    base_url,
                    query_token,
                    timeout_secs,
                })
            }
            other => Err(Error::Config(format!("unknown STORAGE_PROVIDER: {}", other))),
        }
    }

    /// Build the fetcher for this configuration.
    pub fn build(&self) -> Result<Arc<dyn FileFetcher>> {
        match self {
            FetcherConfig::Local { root } => Ok(Arc::new(LocalFileFetcher::new(root.clone()))),
            FetcherConfig::Http {
                base_url,
                query_token,
                timeout_secs,
            } => Ok(Arc::new(HttpFileFetcher::new(
                base_url.clone(),
                query_token.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
        }
    }
}

/// Copies documents from the local filesystem.
pub struct LocalFileFetcher {
    root: Option<PathBuf>,
}

impl LocalFileFetcher {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn resolve(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl FileFetcher for LocalFileFetcher {
    async fn fetch(&self, source: &str, destination: &Path) -> Result<()> {
        let from = self.resolve(source);
        debug!(
            subsystem = "ingest",
            component = "fetcher",
            op = "fetch",
            from = %from.display(),
            to = %destination.display(),
            "Copying document from local storage"
        );
        tokio::fs::copy(&from, destination).await.map_err(|e| {
            Error::Fetch(format!("copy {} failed: {}", from.display(), e))
        })?;
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Downloads documents from HTTP object storage.
pub struct HttpFileFetcher {
    client: Client,
    base_url: String,
    query_token: Option<String>,
}

impl HttpFileFetcher {
    pub fn new(base_url: String, query_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            query_token: query_token.map(|t| t.trim_start_matches('?').to_string()),
        })
    }

    /// URL for a stored path.
    pub fn url_for(&self, source: &str) -> String {
        let key = source.trim_start_matches('/');
        match &self.query_token {
            Some(token) => format!("{}/{}?{}", self.base_url, key, token),
            None => format!("{}/{}", self.base_url, key),
        }
    }
}

#[async_trait]
impl FileFetcher for HttpFileFetcher {
    async fn fetch(&self, source: &str, destination: &Path) -> Result<()> {
        let url = self.url_for(source);
        debug!(
            subsystem = "ingest",
            component = "fetcher",
            op = "fetch",
            base_url = %self.base_url,
            key = source,
            "Downloading document from object storage"
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("request for {} failed: {}", source, e)))?;

        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "object storage returned {} for {}",
                response.status(),
                source
            )));
        }

        let mut file = tokio::fs::File::create(destination).await.map_err(|e| {
            Error::Fetch(format!("create {} failed: {}", destination.display(), e))
        })?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| Error::Fetch(format!("download of {} failed: {}", source, e)))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_local_fetch_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doc.pdf");
        std::fs::write(&source, b"%PDF-1.4 test").unwrap();
        let dest = dir.path().join("copy.pdf");

        let fetcher = LocalFileFetcher::new(None);
        fetcher
            .fetch(source.to_str().unwrap(), &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn test_local_fetch_resolves_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("uploads/pdfs")).unwrap();
        std::fs::write(dir.path().join("uploads/pdfs/a.pdf"), b"data").unwrap();
        let dest = dir.path().join("out.pdf");

        let fetcher = LocalFileFetcher::new(Some(dir.path().to_path_buf()));
        fetcher.fetch("uploads/pdfs/a.pdf", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_local_fetch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = LocalFileFetcher::new(None);
        let err = fetcher
            .fetch("/definitely/not/here.pdf", &dir.path().join("x.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[test]
    fn test_http_url_for_with_token() {
        let fetcher = HttpFileFetcher::new(
            "https://acct.blob.core.windows.net/uploads/".into(),
            Some("?sv=2024&sig=abc".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            fetcher.url_for("/pdfs/a.pdf"),
            "https://acct.blob.core.windows.net/uploads/pdfs/a.pdf?sv=2024&sig=abc"
        );
    }

    #[tokio::test]
    async fn test_http_fetch_downloads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uploads/pdfs/a.pdf"))
            .and(query_param("sig", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-remote".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpFileFetcher::new(
            format!("{}/uploads", server.uri()),
            Some("sig=abc".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.pdf");
        fetcher.fetch("pdfs/a.pdf", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-remote");
    }

    #[tokio::test]
    async fn test_http_fetch_not_found_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFileFetcher::new(server.uri(), None, Duration::from_secs(5)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher
            .fetch("missing.pdf", &dir.path().join("m.pdf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_default_config_is_local() {
        assert_eq!(FetcherConfig::default(), FetcherConfig::Local { root: None });
        let fetcher = FetcherConfig::default().build().unwrap();
        assert_eq!(fetcher.name(), "local");
    }
}
