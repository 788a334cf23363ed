//! Error types for quizforge.

use thiserror::Error;

/// Result type alias using quizforge's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quizforge operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document id does not resolve
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Unit id does not resolve
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// File fetcher could not materialize the document bytes
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Content extractor reported failure
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Question generator reported failure
    #[error("Generation error: {0}")]
    Generation(String),

    /// Declared PDF type outside the recognised set
    #[error("Unsupported PDF type: {0}")]
    UnsupportedPdfType(String),

    /// Queue descriptor is unparsable or missing required fields
    #[error("Invalid quiz request: {0}")]
    InvalidDescriptor(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse failure class used for logging and worker events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced document or unit does not exist.
    NotFound,
    /// Fetch, extraction or generation failed.
    ExternalCapability,
    /// Input could not be interpreted.
    MalformedInput,
    /// The job store could not be reached or rejected a query.
    Store,
    /// Anything else (I/O, configuration, internal).
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ExternalCapability => "external_capability",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::Store => "store",
            ErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DocumentNotFound(_) | Error::UnitNotFound(_) => ErrorKind::NotFound,
            Error::Fetch(_) | Error::Extraction(_) | Error::Generation(_) | Error::Request(_) => {
                ErrorKind::ExternalCapability
            }
            Error::UnsupportedPdfType(_) | Error::InvalidDescriptor(_) | Error::Serialization(_) => {
                ErrorKind::MalformedInput
            }
            Error::Database(_) => ErrorKind::Store,
            Error::Config(_) | Error::Internal(_) | Error::Io(_) => ErrorKind::Other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_document_not_found() {
        let err = Error::DocumentNotFound("d1".to_string());
        assert_eq!(err.to_string(), "Document not found: d1");
    }

    #[test]
    fn test_error_display_unsupported_pdf_type() {
        let err = Error::UnsupportedPdfType("unknown".to_string());
        assert_eq!(err.to_string(), "Unsupported PDF type: unknown");
    }

    #[test]
    fn test_error_display_invalid_descriptor() {
        let err = Error::InvalidDescriptor("missing document_id".to_string());
        assert_eq!(err.to_string(), "Invalid quiz request: missing document_id");
    }

    #[test]
    fn test_error_kind_not_found() {
        assert_eq!(
            Error::DocumentNotFound("d".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(Error::UnitNotFound("u".into()).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_error_kind_external_capability() {
        assert_eq!(
            Error::Fetch("gone".into()).kind(),
            ErrorKind::ExternalCapability
        );
        assert_eq!(
            Error::Extraction("bad".into()).kind(),
            ErrorKind::ExternalCapability
        );
        assert_eq!(
            Error::Generation("model".into()).kind(),
            ErrorKind::ExternalCapability
        );
    }

    #[test]
    fn test_error_kind_malformed_input() {
        assert_eq!(
            Error::InvalidDescriptor("x".into()).kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            Error::UnsupportedPdfType("x".into()).kind(),
            ErrorKind::MalformedInput
        );
    }

    #[test]
    fn test_error_kind_store() {
        let err = Error::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Store);
        assert_eq!(err.kind().to_string(), "store");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().contains("Serialization error:"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
