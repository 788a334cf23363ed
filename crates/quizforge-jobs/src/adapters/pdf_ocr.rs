//! OCR for scanned PDFs using pdftoppm + tesseract.
//!
//! Pipeline: PDF → pdftoppm (render pages to PNG) → tesseract (OCR each page) → concatenate.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use quizforge_core::defaults::{EXTRACTION_CMD_TIMEOUT_SECS, OCR_DPI, OCR_LANGUAGE};
use quizforge_core::{ContentExtractor, Error, ExtractionOutput, PdfType, Result};

use super::{binary_available, ensure_pdf, run_cmd_status};

const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";

/// Extractor for `scanned` (image-only) PDFs.
pub struct PdfOcrExtractor {
    dpi: u32,
    language: String,
    timeout_secs: u64,
}

impl Default for PdfOcrExtractor {
    fn default() -> Self {
        Self {
            dpi: OCR_DPI,
            language: OCR_LANGUAGE.to_string(),
            timeout_secs: EXTRACTION_CMD_TIMEOUT_SECS,
        }
    }
}

impl PdfOcrExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

/// Rendered page images in page order.
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            pages.push(path);
        }
    }
    // pdftoppm zero-pads page numbers, so name order is page order
    pages.sort();
    Ok(pages)
}

/// Join per-page OCR results. `None` marks a page that failed; at least one
/// page must succeed.
fn join_page_texts(pages: Vec<Option<String>>, path: &Path) -> Result<String> {
    if pages.iter().all(Option::is_none) {
        return Err(Error::Extraction(format!(
            "OCR failed for every page of {}",
            path.display()
        )));
    }
    let texts: Vec<String> = pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| text.unwrap_or_else(|| format!("[OCR failed for page {}]", i + 1)))
        .collect();
    Ok(texts.join(PAGE_BREAK))
}

#[async_trait]
impl ContentExtractor for PdfOcrExtractor {
    async fn extract(&self, path: &Path, pdf_type: PdfType) -> Result<ExtractionOutput> {
        if pdf_type != PdfType::Scanned {
            return Err(Error::Extraction(format!(
                "pdf_ocr cannot handle {} documents",
                pdf_type
            )));
        }
        ensure_pdf(path).await?;

        let img_dir = TempDir::new()
            .map_err(|e| Error::Extraction(format!("Failed to create temp dir: {}", e)))?;
        let img_prefix = img_dir.path().join("page");

        debug!(
            component = "pdf_ocr",
            path = %path.display(),
            dpi = self.dpi,
            language = %self.language,
            "Rendering PDF pages for OCR"
        );

        // Rendering is slower than OCR of a single page
        run_cmd_status(
            Command::new("pdftoppm")
                .arg("-png")
                .arg("-r")
                .arg(self.dpi.to_string())
                .arg(path)
                .arg(&img_prefix),
            self.timeout_secs * 3,
        )
        .await?;

        let pages = rendered_pages(img_dir.path())?;
        if pages.is_empty() {
            return Err(Error::Extraction(format!(
                "No pages rendered from {}",
                path.display()
            )));
        }

        let mut page_texts = Vec::with_capacity(pages.len());
        for (i, img_path) in pages.iter().enumerate() {
            // tesseract INPUT OUTPUT_BASE -l LANG writes OUTPUT_BASE.txt
            let output_base = img_dir.path().join(format!("ocr_{}", i));
            let result = run_cmd_status(
                Command::new("tesseract")
                    .arg(img_path)
                    .arg(&output_base)
                    .arg("-l")
                    .arg(&self.language),
                self.timeout_secs,
            )
            .await;

            let text = match result {
                Ok(()) => tokio::fs::read_to_string(output_base.with_extension("txt"))
                    .await
                    .map_err(Error::from),
                Err(e) => Err(e),
            };
            match text {
                Ok(text) => page_texts.push(Some(text)),
                Err(e) => {
                    warn!(component = "pdf_ocr", page = i + 1, error = %e, "OCR failed for page, skipping");
                    page_texts.push(None);
                }
            }
        }

        Ok(ExtractionOutput {
            text: join_page_texts(page_texts, path)?,
            page_count: i32::try_from(pages.len()).ok(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let pdftoppm_ok = binary_available("pdftoppm", "-v").await;
        let tesseract_ok = binary_available("tesseract", "--version").await;
        Ok(pdftoppm_ok && tesseract_ok)
    }

    fn name(&self) -> &str {
        "pdf_ocr"
    }
}
