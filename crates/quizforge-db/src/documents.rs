//! Document repository implementation (`UploadedFile` table).

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use quizforge_core::{
    Document, DocumentRepository, DocumentStatus, Error, NewDocument, ProcessingStats, Result,
};

const DOCUMENT_COLUMNS: &str = "id, file_path, pdf_type, subject, grade, status, \
     extracted_content, page_count, processing_time";

/// PostgreSQL implementation of DocumentRepository.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    /// Create a new PgDocumentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a row into a Document.
    fn parse_document_row(row: sqlx::postgres::PgRow) -> Result<Document> {
        let status: String = row.get("status");
        Ok(Document {
            id: row.get("id"),
            file_path: row.get("file_path"),
            pdf_type: row.get("pdf_type"),
            subject: row.get("subject"),
            grade: row.get("grade"),
            status: status.parse()?,
            extracted_content: row.get("extracted_content"),
            page_count: row.get("page_count"),
            processing_time: row.get("processing_time"),
        })
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn insert(&self, doc: NewDocument) -> Result<Document> {
        let row = sqlx::query(&format!(
            "INSERT INTO \"UploadedFile\" (id, file_path, pdf_type, subject, grade, status, extracted_content)
             VALUES ($1, $2, $3, $4, $5, 'uploaded', false)
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(&doc.id)
        .bind(&doc.file_path)
        .bind(&doc.pdf_type)
        .bind(&doc.subject)
        .bind(&doc.grade)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_document_row(row)
    }

    async fn fetch_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM \"UploadedFile\" WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_document_row).transpose()
    }

    async fn find_pending_by_path(&self, path: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM \"UploadedFile\"
             WHERE file_path = $1 AND status = 'uploaded'
             LIMIT 1"
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_document_row).transpose()
    }

    async fn claim_pending_by_path(&self, path: &str) -> Result<Option<Document>> {
        // Check and transition in one statement; SKIP LOCKED makes a concurrent
        // claimer see no row instead of waiting for ours to commit.
        let row = sqlx::query(&format!(
            "UPDATE \"UploadedFile\"
             SET status = 'processing', extracted_content = false
             WHERE id = (
                 SELECT id FROM \"UploadedFile\"
                 WHERE file_path = $1 AND status = 'uploaded'
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let claimed = row.map(Self::parse_document_row).transpose()?;
        debug!(
            subsystem = "db",
            component = "documents",
            op = "claim",
            path,
            claimed = claimed.is_some(),
            "Claim attempt"
        );
        Ok(claimed)
    }

    async fn mark_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE \"UploadedFile\" SET status = $2, extracted_content = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(status.extracted_content())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn record_processing_stats(&self, id: &str, stats: ProcessingStats) -> Result<()> {
        let result = sqlx::query(
            "UPDATE \"UploadedFile\"
             SET page_count = COALESCE($2, page_count), processing_time = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(stats.page_count)
        .bind(stats.processing_secs)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id.to_string()));
        }
        Ok(())
    }
}
