//! Repository and capability traits.
//!
//! The job store is split into per-entity repositories the way the tables
//! are split; [`JobStore`] is the union the workers depend on.

use std::path::Path;

use async_trait::async_trait;

use crate::{
    Document, DocumentStatus, ExtractionOutput, NewDocument, PdfType, ProcessingStats, Question,
    QuestionRecord, Result, Unit,
};

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for uploaded documents and their status machine.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Register a document in status `uploaded`.
    async fn insert(&self, doc: NewDocument) -> Result<Document>;

    /// Fetch a document by id.
    async fn fetch_document(&self, id: &str) -> Result<Option<Document>>;

    /// Find a document at `path` whose status is exactly `uploaded`.
    async fn find_pending_by_path(&self, path: &str) -> Result<Option<Document>>;

    /// Atomically move the `uploaded` document at `path` to `processing`.
    ///
    /// At most one concurrent caller receives `Some` for a given document.
    async fn claim_pending_by_path(&self, path: &str) -> Result<Option<Document>>;

    /// Unconditionally set the status. `extracted_content` follows the status:
    /// true for `processed`, false otherwise.
    async fn mark_status(&self, id: &str, status: DocumentStatus) -> Result<()>;

    /// Record page count and processing time for a processed document.
    async fn record_processing_stats(&self, id: &str, stats: ProcessingStats) -> Result<()>;
}

/// Read-only access to units.
#[async_trait]
pub trait UnitRepository: Send + Sync {
    /// Fetch a unit by id.
    async fn fetch_unit(&self, id: &str) -> Result<Option<Unit>>;
}

/// Repository for generated questions.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert all questions for a quiz in one transaction, in the given order.
    /// Returns the generated question ids.
    async fn insert_questions(
        &self,
        document_id: &str,
        unit_id: Option<&str>,
        quiz_id: &str,
        questions: &[QuestionRecord],
    ) -> Result<Vec<String>>;

    /// Questions for a quiz in insertion order.
    async fn questions_for_quiz(&self, quiz_id: &str) -> Result<Vec<Question>>;
}

/// Everything the two workers need from persistence.
pub trait JobStore: DocumentRepository + UnitRepository + QuestionRepository {}

impl<T> JobStore for T where T: DocumentRepository + UnitRepository + QuestionRepository {}

// =============================================================================
// CAPABILITY TRAITS
// =============================================================================

/// Materializes a document's bytes at a local path.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Copy/download `source` (the stored `file_path`) to `destination`.
    async fn fetch(&self, source: &str, destination: &Path) -> Result<()>;

    /// Human-readable name of this fetcher.
    fn name(&self) -> &str;
}

/// Extracts content from a local PDF.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract content from the file at `path`.
    async fn extract(&self, path: &Path, pdf_type: PdfType) -> Result<ExtractionOutput>;

    /// Check if the extractor's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this extractor.
    fn name(&self) -> &str;
}

/// Produces an ordered list of questions for a document (and optional unit).
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(
        &self,
        document: &Document,
        unit: Option<&Unit>,
    ) -> Result<Vec<QuestionRecord>>;

    /// Human-readable name of this generator.
    fn name(&self) -> &str;
}
