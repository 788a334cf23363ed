//! Structured logging field names shared by every quizforge crate.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Job failed or store unreachable, requires operator attention |
//! | WARN  | Recoverable issue, job continues or is discarded |
//! | INFO  | Lifecycle events (startup, shutdown), job completions |
//! | DEBUG | Decision points, ignored events, config choices |
//! | TRACE | Per-item iteration (queue snapshots, OCR pages) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "ingest", "quiz", "worker"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "watcher", "consumer", "pool", "fetcher", "pdf_text"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "claim", "fetch", "extract", "generate", "insert_questions"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document (UploadedFile) id.
pub const DOCUMENT_ID: &str = "document_id";

/// Unit id.
pub const UNIT_ID: &str = "unit_id";

/// Quiz id from a request descriptor.
pub const QUIZ_ID: &str = "quiz_id";

/// Filesystem path (upload or descriptor).
pub const PATH: &str = "path";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of questions generated or inserted.
pub const QUESTION_COUNT: &str = "question_count";

/// Number of pages seen by an extractor.
pub const PAGE_COUNT: &str = "page_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Failure class (see `ErrorKind`).
pub const ERROR_KIND: &str = "error_kind";
