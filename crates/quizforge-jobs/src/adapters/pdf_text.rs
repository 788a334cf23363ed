//! Text-layer PDF extraction using `pdfinfo` and `pdftotext` (poppler-utils).

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use quizforge_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use quizforge_core::{ContentExtractor, Error, ExtractionOutput, PdfType, Result};

use super::{binary_available, ensure_pdf, run_cmd_with_timeout};

/// Extractor for `normal` PDFs with an embedded text layer.
///
/// The page count comes from `pdfinfo`; a `pdfinfo` failure is not fatal.
/// Each command is guarded by a per-command timeout.
pub struct PdfTextExtractor {
    timeout_secs: u64,
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self {
            timeout_secs: EXTRACTION_CMD_TIMEOUT_SECS,
        }
    }
}

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Parse the `Pages:` line of `pdfinfo` output.
pub(crate) fn parse_page_count(pdfinfo_output: &str) -> Option<i32> {
    pdfinfo_output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("pages") {
            value.trim().parse::<i32>().ok()
        } else {
            None
        }
    })
}

#[async_trait]
impl ContentExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path, pdf_type: PdfType) -> Result<ExtractionOutput> {
        if pdf_type != PdfType::Normal {
            return Err(Error::Extraction(format!(
                "pdf_text cannot handle {} documents",
                pdf_type
            )));
        }
        ensure_pdf(path).await?;

        let page_count = match run_cmd_with_timeout(
            Command::new("pdfinfo").arg(path),
            self.timeout_secs,
        )
        .await
        {
            Ok(output) => parse_page_count(&output),
            Err(e) => {
                warn!(
                    component = "pdf_text",
                    path = %path.display(),
                    error = %e,
                    "pdfinfo failed, continuing without page count"
                );
                None
            }
        };

        let text = run_cmd_with_timeout(
            Command::new("pdftotext").arg(path).arg("-"),
            self.timeout_secs,
        )
        .await?;

        debug!(
            component = "pdf_text",
            path = %path.display(),
            page_count = ?page_count,
            char_count = text.len(),
            "Extracted text layer"
        );

        Ok(ExtractionOutput { text, page_count })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(binary_available("pdftotext", "-v").await)
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_text_name() {
        assert_eq!(PdfTextExtractor::new().name(), "pdf_text");
    }

    #[tokio::test]
    async fn test_pdf_text_health_check() {
        // Passes whether or not poppler is installed
        assert!(PdfTextExtractor::new().health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_pdf_text_invalid_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        let err = PdfTextExtractor::new()
            .extract(&path, PdfType::Normal)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a valid PDF"));
    }

    #[tokio::test]
    async fn test_pdf_text_rejects_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();

        let err = PdfTextExtractor::new()
            .extract(&path, PdfType::Scanned)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[tokio::test]
    async fn test_pdf_text_extraction() {
        let pdf_bytes = b"%PDF-1.0
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj

2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj

3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792]
   /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>
endobj

4 0 obj
<< /Length 44 >>
stream
BT /F1 12 Tf 100 700 Td (Hello World) Tj ET
endstream
endobj

5 0 obj
<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>
endobj

xref
0 6
0000000000 65535 f
0000000009 00000 n
0000000058 00000 n
0000000115 00000 n
0000000266 00000 n
0000000360 00000 n

trailer
<< /Size 6 /Root 1 0 R >>
startxref
434
%%EOF";

        let extractor = PdfTextExtractor::new();
        if !extractor.health_check().await.unwrap_or(false) {
            eprintln!("Skipping test_pdf_text_extraction: pdftotext not installed");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.pdf");
        std::fs::write(&path, pdf_bytes).unwrap();

        let output = extractor.extract(&path, PdfType::Normal).await.unwrap();
        assert!(
            output.text.contains("Hello World"),
            "Extracted text should contain 'Hello World', got: {}",
            output.text
        );
    }

    #[test]
    fn test_parse_page_count() {
        let pdfinfo_output = "\
Title:          Algebra Basics
Producer:       pdfTeX-1.40.25
Pages:          42
Page size:      612 x 792 pts (letter)
";
        assert_eq!(parse_page_count(pdfinfo_output), Some(42));
    }

    #[test]
    fn test_parse_page_count_missing() {
        assert_eq!(parse_page_count(""), None);
        assert_eq!(parse_page_count("Pages: many"), None);
    }
}
