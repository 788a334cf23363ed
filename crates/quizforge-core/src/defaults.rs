//! Centralized default constants for quizforge.
//!
//! Worker configs read environment variables and fall back to these values.

// =============================================================================
// INGESTION
// =============================================================================

/// Directory watched for uploaded PDFs.
pub const UPLOADS_DIR: &str = "uploads/pdfs";

/// Extension (without dot) of files the ingestion watcher reacts to.
pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Capacity of the channel between the filesystem notifier and the watcher task.
pub const WATCH_CHANNEL_CAPACITY: usize = 1024;

/// Prefix for per-document scratch directories.
pub const SCRATCH_PREFIX: &str = "quizforge-";

// =============================================================================
// QUIZ QUEUE
// =============================================================================

/// Directory polled for quiz generation requests.
pub const QUIZ_QUEUE_DIR: &str = "queue/quiz_generation";

/// Extension (without dot) of quiz request descriptors.
pub const DESCRIPTOR_EXTENSION: &str = "json";

/// Queue polling interval (milliseconds).
pub const QUIZ_POLL_INTERVAL_MS: u64 = 1_000;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Timeout for a single external extraction command (pdftotext, tesseract).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 120;

/// Rendering resolution for OCR rasterisation.
pub const OCR_DPI: u32 = 300;

/// Tesseract language pack.
pub const OCR_LANGUAGE: &str = "eng";

// =============================================================================
// FETCH
// =============================================================================

/// Timeout for a remote object download.
pub const FETCH_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// GENERATION
// =============================================================================

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default generation model.
pub const GEN_MODEL: &str = "llama3.1:8b";

/// Timeout for one generation request.
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// Questions requested per quiz from a model-backed generator.
pub const QUESTIONS_PER_QUIZ: usize = 10;

// =============================================================================
// DATABASE
// =============================================================================

/// Default PostgreSQL port.
pub const POSTGRES_PORT: u16 = 5432;

/// Connections per worker process. Each worker handles one job at a time.
pub const DB_MAX_CONNECTIONS: u32 = 2;

/// Connection acquire timeout.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// EVENTS
// =============================================================================

/// Broadcast capacity for worker events.
pub const EVENT_BUS_CAPACITY: usize = 256;
