//! # quizforge-db
//!
//! Job store for quizforge.
//!
//! This crate provides:
//! - Connection pool management and environment-driven connection settings
//! - PostgreSQL repositories for documents, units and questions
//! - An in-memory store with identical semantics for tests and local runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use quizforge_db::{Database, DatabaseConfig};
//! use quizforge_core::{DocumentRepository, DocumentStatus};
//!
//! let config = DatabaseConfig::from_env()?;
//! let db = Database::connect(&config.url).await?;
//!
//! if let Some(doc) = db.claim_pending_by_path("uploads/pdfs/algebra.pdf").await? {
//!     db.mark_status(&doc.id, DocumentStatus::Processed).await?;
//! }
//! ```
pub mod documents;
pub mod memory;
pub mod pool;
pub mod questions;
pub mod test_fixtures;
pub mod units;

use async_trait::async_trait;

// Re-export core types
pub use quizforge_core::*;

pub use documents::PgDocumentRepository;
pub use memory::MemoryStore;
pub use pool::{
    create_pool, create_pool_with_config, log_pool_metrics, redact_url, DatabaseConfig,
    PoolConfig,
};
pub use questions::PgQuestionRepository;
pub use units::PgUnitRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Uploaded documents and their status.
    pub documents: PgDocumentRepository,
    /// Units (read-only).
    pub units: PgUnitRepository,
    /// Generated questions.
    pub questions: PgQuestionRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            documents: PgDocumentRepository::new(pool.clone()),
            units: PgUnitRepository::new(pool.clone()),
            questions: PgQuestionRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the database with default pool settings.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Close all connections. Pending operations finish first.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DocumentRepository for Database {
    async fn insert(&self, doc: NewDocument) -> Result<Document> {
        self.documents.insert(doc).await
    }

    async fn fetch_document(&self, id: &str) -> Result<Option<Document>> {
        self.documents.fetch_document(id).await
    }

    async fn find_pending_by_path(&self, path: &str) -> Result<Option<Document>> {
        self.documents.find_pending_by_path(path).await
    }

    async fn claim_pending_by_path(&self, path: &str) -> Result<Option<Document>> {
        self.documents.claim_pending_by_path(path).await
    }

    async fn mark_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        self.documents.mark_status(id, status).await
    }

    async fn record_processing_stats(&self, id: &str, stats: ProcessingStats) -> Result<()> {
        self.documents.record_processing_stats(id, stats).await
    }
}

#[async_trait]
impl UnitRepository for Database {
    async fn fetch_unit(&self, id: &str) -> Result<Option<Unit>> {
        self.units.fetch_unit(id).await
    }
}

#[async_trait]
impl QuestionRepository for Database {
    async fn insert_questions(
        &self,
        document_id: &str,
        unit_id: Option<&str>,
        quiz_id: &str,
        questions: &[QuestionRecord],
    ) -> Result<Vec<String>> {
        self.questions
            .insert_questions(document_id, unit_id, quiz_id, questions)
            .await
    }

    async fn questions_for_quiz(&self, quiz_id: &str) -> Result<Vec<Question>> {
        self.questions.questions_for_quiz(quiz_id).await
    }
}
