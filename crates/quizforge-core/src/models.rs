//! Data models for documents, units, questions and quiz requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// =============================================================================
// DOCUMENT
// =============================================================================

/// Lifecycle status of an uploaded document.
///
/// `Uploaded` is the only entry state. `Processed` and `Error` are terminal;
/// leaving `Error` requires an external reset to `Uploaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Error => "error",
        }
    }

    /// Whether no further automatic transition happens from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Processed | DocumentStatus::Error)
    }

    /// Value of `extracted_content` that accompanies this status.
    pub fn extracted_content(&self) -> bool {
        matches!(self, DocumentStatus::Processed)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "processing" => Ok(DocumentStatus::Processing),
            "processed" => Ok(DocumentStatus::Processed),
            "error" => Ok(DocumentStatus::Error),
            other => Err(Error::Serialization(format!(
                "unknown document status: {}",
                other
            ))),
        }
    }
}

/// Declared content type of a PDF, selecting the extraction route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfType {
    /// PDF with an embedded text layer.
    Normal,
    /// Image-only PDF that needs OCR.
    Scanned,
}

impl PdfType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfType::Normal => "normal",
            PdfType::Scanned => "scanned",
        }
    }
}

impl fmt::Display for PdfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PdfType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(PdfType::Normal),
            "scanned" => Ok(PdfType::Scanned),
            other => Err(Error::UnsupportedPdfType(other.to_string())),
        }
    }
}

/// An uploaded document (`UploadedFile` row).
///
/// `pdf_type` is kept as the stored string: values outside [`PdfType`] are
/// representable and fail at extraction time rather than at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub file_path: String,
    pub pdf_type: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub status: DocumentStatus,
    pub extracted_content: bool,
    pub page_count: Option<i32>,
    pub processing_time: Option<i32>,
}

impl Document {
    /// Resolve the declared type into a [`PdfType`].
    pub fn declared_type(&self) -> Result<PdfType> {
        self.pdf_type.parse()
    }
}

/// Request to register a document in the store (used by producers and tests).
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub id: String,
    pub file_path: String,
    pub pdf_type: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
}

impl NewDocument {
    pub fn new(
        id: impl Into<String>,
        file_path: impl Into<String>,
        pdf_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            pdf_type: pdf_type.into(),
            subject: None,
            grade: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }
}

/// Statistics recorded alongside a successful extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub page_count: Option<i32>,
    /// Wall-clock seconds spent in the pipeline.
    pub processing_secs: i32,
}

// =============================================================================
// UNIT
// =============================================================================

/// A logical subdivision of a document, used as generation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub title: String,
    pub page_range: Option<String>,
    pub word_count: Option<i32>,
    #[serde(default)]
    pub key_topics: Vec<String>,
}

// =============================================================================
// QUESTIONS
// =============================================================================

/// A generated question, before it is attached to a quiz.
///
/// Accepts the generator wire spelling (`type`, `correctAnswer`) as well as
/// the column spelling (`correct_answer`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(rename = "type")]
    pub question_type: String,
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "correct_answer", alias = "correctAnswer")]
    pub correct_answer: i32,
    #[serde(default)]
    pub reasoning: String,
}

impl QuestionRecord {
    /// Check that the record is usable: non-empty text and options, and the
    /// answer index points into the options.
    pub fn validate(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(Error::Generation("question text is empty".to_string()));
        }
        if self.options.is_empty() {
            return Err(Error::Generation(format!(
                "question '{}' has no options",
                self.question
            )));
        }
        if self.correct_answer < 0 || self.correct_answer as usize >= self.options.len() {
            return Err(Error::Generation(format!(
                "question '{}' has correct_answer {} outside {} options",
                self.question,
                self.correct_answer,
                self.options.len()
            )));
        }
        Ok(())
    }
}

/// A persisted question row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(flatten)]
    pub record: QuestionRecord,
    pub document_id: String,
    pub unit_id: Option<String>,
    pub quiz_id: Option<String>,
}

// =============================================================================
// QUIZ REQUEST DESCRIPTOR
// =============================================================================

/// A quiz generation request, carried as a JSON file on the request queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRequest {
    pub quiz_id: String,
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
}

#[derive(Deserialize)]
struct RawQuizRequest {
    quiz_id: Option<String>,
    document_id: Option<String>,
    unit_id: Option<String>,
}

impl QuizRequest {
    pub fn new(quiz_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            quiz_id: quiz_id.into(),
            document_id: document_id.into(),
            unit_id: None,
        }
    }

    pub fn with_unit(mut self, unit_id: impl Into<String>) -> Self {
        self.unit_id = Some(unit_id.into());
        self
    }

    /// Parse a descriptor body.
    ///
    /// Missing, null or empty `quiz_id`/`document_id` are rejected. An empty
    /// `unit_id` is treated as absent.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: RawQuizRequest = serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidDescriptor(format!("unparsable descriptor: {}", e)))?;

        let quiz_id = non_empty(raw.quiz_id)
            .ok_or_else(|| Error::InvalidDescriptor("missing quiz_id".to_string()))?;
        let document_id = non_empty(raw.document_id)
            .ok_or_else(|| Error::InvalidDescriptor("missing document_id".to_string()))?;

        Ok(Self {
            quiz_id,
            document_id,
            unit_id: non_empty(raw.unit_id),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// What a content extractor reports on success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionOutput {
    pub text: String,
    pub page_count: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_status_round_trip_strings() {
        for status in [
            DocumentStatus::Uploaded,
            DocumentStatus::Processing,
            DocumentStatus::Processed,
            DocumentStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<DocumentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_document_status_unknown() {
        assert!("uploading".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_document_status_terminal() {
        assert!(!DocumentStatus::Uploaded.is_terminal());
        assert!(!DocumentStatus::Processing.is_terminal());
        assert!(DocumentStatus::Processed.is_terminal());
        assert!(DocumentStatus::Error.is_terminal());
    }

    #[test]
    fn test_extracted_content_only_when_processed() {
        assert!(DocumentStatus::Processed.extracted_content());
        assert!(!DocumentStatus::Processing.extracted_content());
        assert!(!DocumentStatus::Error.extracted_content());
        assert!(!DocumentStatus::Uploaded.extracted_content());
    }

    #[test]
    fn test_pdf_type_parse() {
        assert_eq!("normal".parse::<PdfType>().unwrap(), PdfType::Normal);
        assert_eq!("scanned".parse::<PdfType>().unwrap(), PdfType::Scanned);
    }

    #[test]
    fn test_pdf_type_unknown_is_error() {
        let err = "unknown".parse::<PdfType>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedPdfType(ref t) if t == "unknown"));
    }

    #[test]
    fn test_pdf_type_is_case_sensitive() {
        assert!("Normal".parse::<PdfType>().is_err());
    }

    #[test]
    fn test_quiz_request_full() {
        let req =
            QuizRequest::from_json(br#"{"quiz_id":"q1","document_id":"d1","unit_id":"u1"}"#)
                .unwrap();
        assert_eq!(req, QuizRequest::new("q1", "d1").with_unit("u1"));
    }

    #[test]
    fn test_quiz_request_without_unit() {
        let req = QuizRequest::from_json(br#"{"quiz_id":"q1","document_id":"d1"}"#).unwrap();
        assert_eq!(req.unit_id, None);
    }

    #[test]
    fn test_quiz_request_empty_unit_is_absent() {
        let req =
            QuizRequest::from_json(br#"{"quiz_id":"q1","document_id":"d1","unit_id":""}"#)
                .unwrap();
        assert_eq!(req.unit_id, None);
    }

    #[test]
    fn test_quiz_request_missing_document_id() {
        let err = QuizRequest::from_json(br#"{"quiz_id":"q1"}"#).unwrap_err();
        assert!(err.to_string().contains("missing document_id"));
    }

    #[test]
    fn test_quiz_request_empty_quiz_id() {
        let err = QuizRequest::from_json(br#"{"quiz_id":"","document_id":"d1"}"#).unwrap_err();
        assert!(err.to_string().contains("missing quiz_id"));
    }

    #[test]
    fn test_quiz_request_not_json() {
        let err = QuizRequest::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidDescriptor(_)));
    }

    #[test]
    fn test_quiz_request_non_string_id() {
        let err = QuizRequest::from_json(br#"{"quiz_id":7,"document_id":"d1"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidDescriptor(_)));
    }

    #[test]
    fn test_quiz_request_serializes_without_unit() {
        let json = serde_json::to_string(&QuizRequest::new("q1", "d1")).unwrap();
        assert_eq!(json, r#"{"quiz_id":"q1","document_id":"d1"}"#);
    }

    #[test]
    fn test_question_record_accepts_camel_case_answer() {
        let record: QuestionRecord = serde_json::from_str(
            r#"{"type":"true_false","question":"Q?","options":["True","False"],"correctAnswer":1,"reasoning":"r"}"#,
        )
        .unwrap();
        assert_eq!(record.question_type, "true_false");
        assert_eq!(record.correct_answer, 1);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_question_record_answer_out_of_range() {
        let record = QuestionRecord {
            question_type: "multiple_choice".into(),
            question: "Q?".into(),
            options: vec!["a".into(), "b".into()],
            correct_answer: 2,
            reasoning: String::new(),
        };
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_question_record_without_options() {
        let record = QuestionRecord {
            question_type: "multiple_choice".into(),
            question: "Q?".into(),
            options: vec![],
            correct_answer: 0,
            reasoning: String::new(),
        };
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_document_declared_type() {
        let doc = Document {
            id: "d1".into(),
            file_path: "/up/d1.pdf".into(),
            pdf_type: "scanned".into(),
            subject: None,
            grade: None,
            status: DocumentStatus::Uploaded,
            extracted_content: false,
            page_count: None,
            processing_time: None,
        };
        assert_eq!(doc.declared_type().unwrap(), PdfType::Scanned);
    }
}
