//! Extractor routing by declared PDF type.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use quizforge_core::defaults::{EXTRACTION_CMD_TIMEOUT_SECS, OCR_DPI, OCR_LANGUAGE};
use quizforge_core::{ContentExtractor, Error, ExtractionOutput, PdfType, Result};

use crate::adapters::{PdfOcrExtractor, PdfTextExtractor};

/// Extraction backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorConfig {
    /// poppler-utils for text PDFs, pdftoppm + tesseract for scanned PDFs.
    Poppler {
        ocr_dpi: u32,
        ocr_language: String,
        timeout_secs: u64,
    },
    /// Accept any readable file without looking at its content.
    Noop,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig::Poppler {
            ocr_dpi: OCR_DPI,
            ocr_language: OCR_LANGUAGE.to_string(),
            timeout_secs: EXTRACTION_CMD_TIMEOUT_SECS,
        }
    }
}

impl ExtractorConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `EXTRACTION_BACKEND` | `poppler` | `poppler` or `noop` |
    /// | `OCR_DPI` | `300` | Rasterisation resolution for scanned PDFs |
    /// | `OCR_LANGUAGE` | `eng` | Tesseract language pack |
    /// | `EXTRACTION_CMD_TIMEOUT_SECS` | `120` | Per-command timeout |
    pub fn from_env() -> Result<Self> {
        let backend = std::env::var("EXTRACTION_BACKEND").unwrap_or_else(|_| "poppler".into());
        match backend.as_str() {
            "poppler" => Ok(ExtractorConfig::Poppler {
                ocr_dpi: std::env::var("OCR_DPI")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(OCR_DPI),
                ocr_language: std::env::var("OCR_LANGUAGE")
                    .unwrap_or_else(|_| OCR_LANGUAGE.to_string()),
                timeout_secs: std::env::var("EXTRACTION_CMD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(EXTRACTION_CMD_TIMEOUT_SECS),
            }),
            "noop" => Ok(ExtractorConfig::Noop),
            other => Err(Error::Config(format!(
                "unknown EXTRACTION_BACKEND: {}",
                other
            ))),
        }
    }

    /// Build the extractor set for this configuration.
    pub fn build(&self) -> ExtractorSet {
        match self {
            ExtractorConfig::Poppler {
                ocr_dpi,
                ocr_language,
                timeout_secs,
            } => ExtractorSet::new()
                .with(
                    PdfType::Normal,
                    Arc::new(PdfTextExtractor::new().with_timeout(*timeout_secs)),
                )
                .with(
                    PdfType::Scanned,
                    Arc::new(
                        PdfOcrExtractor::new()
                            .with_dpi(*ocr_dpi)
                            .with_language(ocr_language.clone())
                            .with_timeout(*timeout_secs),
                    ),
                ),
            ExtractorConfig::Noop => ExtractorSet::uniform(Arc::new(NoopExtractor)),
        }
    }
}

/// Maps each [`PdfType`] to the extractor that handles it.
#[derive(Clone, Default)]
pub struct ExtractorSet {
    extractors: HashMap<PdfType, Arc<dyn ContentExtractor>>,
}

impl ExtractorSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the same extractor for every type.
    pub fn uniform(extractor: Arc<dyn ContentExtractor>) -> Self {
        Self::new()
            .with(PdfType::Normal, extractor.clone())
            .with(PdfType::Scanned, extractor)
    }

    /// Register an extractor. Replaces any existing extractor for the type.
    pub fn with(mut self, pdf_type: PdfType, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractors.insert(pdf_type, extractor);
        self
    }

    /// Extractor registered for `pdf_type`, if any.
    pub fn get(&self, pdf_type: PdfType) -> Option<&Arc<dyn ContentExtractor>> {
        self.extractors.get(&pdf_type)
    }

    /// Extract using the extractor registered for `pdf_type`.
    pub async fn extract(&self, path: &Path, pdf_type: PdfType) -> Result<ExtractionOutput> {
        let extractor = self.get(pdf_type).ok_or_else(|| {
            Error::Extraction(format!("No extractor registered for {} PDFs", pdf_type))
        })?;
        extractor.extract(path, pdf_type).await
    }

    /// Run health checks on all registered extractors.
    pub async fn health_check_all(&self) -> HashMap<PdfType, bool> {
        let mut results = HashMap::new();
        for (pdf_type, extractor) in &self.extractors {
            let healthy = extractor.health_check().await.unwrap_or(false);
            results.insert(*pdf_type, healthy);
        }
        results
    }
}

/// Accepts any readable file and reports no content.
pub struct NoopExtractor;

#[async_trait]
impl ContentExtractor for NoopExtractor {
    async fn extract(&self, path: &Path, _pdf_type: PdfType) -> Result<ExtractionOutput> {
        tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::Extraction(format!("Cannot read {}: {}", path.display(), e)))?;
        Ok(ExtractionOutput::default())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_has_no_extractors() {
        let set = ExtractorSet::new();
        assert!(set.get(PdfType::Normal).is_none());
        assert!(set.get(PdfType::Scanned).is_none());
    }

    #[test]
    fn test_default_config_routes_by_type() {
        let set = ExtractorConfig::default().build();
        assert_eq!(set.get(PdfType::Normal).unwrap().name(), "pdf_text");
        assert_eq!(set.get(PdfType::Scanned).unwrap().name(), "pdf_ocr");
    }

    #[test]
    fn test_noop_config_is_uniform() {
        let set = ExtractorConfig::Noop.build();
        assert_eq!(set.get(PdfType::Normal).unwrap().name(), "noop");
        assert_eq!(set.get(PdfType::Scanned).unwrap().name(), "noop");
    }

    #[tokio::test]
    async fn test_extract_missing_extractor() {
        let set = ExtractorSet::new().with(PdfType::Normal, Arc::new(NoopExtractor));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"x").unwrap();

        let err = set.extract(&path, PdfType::Scanned).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[tokio::test]
    async fn test_noop_requires_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        assert!(NoopExtractor.extract(&path, PdfType::Normal).await.is_err());

        std::fs::write(&path, b"anything").unwrap();
        let output = NoopExtractor.extract(&path, PdfType::Normal).await.unwrap();
        assert_eq!(output, ExtractionOutput::default());
    }

    #[tokio::test]
    async fn test_health_check_all() {
        let set = ExtractorSet::uniform(Arc::new(NoopExtractor));
        let results = set.health_check_all().await;
        assert_eq!(results.len(), 2);
        assert!(results[&PdfType::Normal]);
    }
}
