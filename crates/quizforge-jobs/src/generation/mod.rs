//! Question generators.

mod ollama;

pub use ollama::OllamaQuestionGenerator;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use quizforge_core::defaults::{GEN_MODEL, GEN_TIMEOUT_SECS, OLLAMA_URL, QUESTIONS_PER_QUIZ};
use quizforge_core::{Document, Error, QuestionGenerator, QuestionRecord, Result, Unit};

/// Generator backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorConfig {
    /// Deterministic two-question quiz, no external service.
    Sample,
    /// Ollama chat API with JSON output.
    Ollama {
        base_url: String,
        model: String,
        questions_per_quiz: usize,
        timeout_secs: u64,
    },
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig::Sample
    }
}

impl GeneratorConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUESTION_GENERATOR` | `sample` | `sample` or `ollama` |
    /// | `OLLAMA_BASE` | `http://localhost:11434` | Ollama endpoint |
    /// | `OLLAMA_GEN_MODEL` | `llama3.1:8b` | Generation model |
    /// | `QUESTIONS_PER_QUIZ` | `10` | Questions requested per quiz |
    /// | `OLLAMA_GEN_TIMEOUT_SECS` | `300` | Request timeout |
    pub fn from_env() -> Result<Self> {
        let backend = std::env::var("QUESTION_GENERATOR").unwrap_or_else(|_| "sample".into());
        match backend.as_str() {
            "sample" => Ok(GeneratorConfig::Sample),
            "ollama" => Ok(GeneratorConfig::Ollama {
                base_url: std::env::var("OLLAMA_BASE").unwrap_or_else(|_| OLLAMA_URL.into()),
                model: std::env::var("OLLAMA_GEN_MODEL").unwrap_or_else(|_| GEN_MODEL.into()),
                questions_per_quiz: std::env::var("QUESTIONS_PER_QUIZ")
                    .ok()
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(QUESTIONS_PER_QUIZ)
                    .max(1),
                timeout_secs: std::env::var("OLLAMA_GEN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(GEN_TIMEOUT_SECS),
            }),
            other => Err(Error::Config(format!(
                "unknown QUESTION_GENERATOR: {}",
                other
            ))),
        }
    }

    /// Build the generator for this configuration.
    pub fn build(&self) -> Result<Arc<dyn QuestionGenerator>> {
        match self {
            GeneratorConfig::Sample => Ok(Arc::new(SampleQuestionGenerator)),
            GeneratorConfig::Ollama {
                base_url,
                model,
                questions_per_quiz,
                timeout_secs,
            } => Ok(Arc::new(OllamaQuestionGenerator::new(
                base_url.clone(),
                model.clone(),
                *questions_per_quiz,
                Duration::from_secs(*timeout_secs),
            )?)),
        }
    }
}

/// Topic the questions are about: the unit title when a unit is given,
/// else the document subject, else a generic label.
pub(crate) fn context_label(document: &Document, unit: Option<&Unit>) -> String {
    unit.map(|u| u.title.clone())
        .or_else(|| document.subject.clone())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "this document".to_string())
}

/// `label` with its first character upper-cased, for sentence starts.
fn sentence_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Deterministic generator producing one multiple-choice and one
/// true/false question.
pub struct SampleQuestionGenerator;

#[async_trait]
impl QuestionGenerator for SampleQuestionGenerator {
    async fn generate(
        &self,
        document: &Document,
        unit: Option<&Unit>,
    ) -> Result<Vec<QuestionRecord>> {
        let topic = context_label(document, unit);
        Ok(vec![
            QuestionRecord {
                question_type: "multiple_choice".to_string(),
                question: format!("Which statement best summarises {}?", topic),
                options: vec![
                    "Option 1".to_string(),
                    "Option 2".to_string(),
                    "Option 3".to_string(),
                    "Option 4".to_string(),
                ],
                correct_answer: 0,
                reasoning: "This is the correct answer because...".to_string(),
            },
            QuestionRecord {
                question_type: "true_false".to_string(),
                question: format!("{} is covered in a single page.", sentence_case(&topic)),
                options: vec!["True".to_string(), "False".to_string()],
                correct_answer: 1,
                reasoning: "This is false because...".to_string(),
            },
        ])
    }

    fn name(&self) -> &str {
        "sample"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_core::DocumentStatus;

    fn document(subject: Option<&str>) -> Document {
        Document {
            id: "d1".into(),
            file_path: "uploads/pdfs/d1.pdf".into(),
            pdf_type: "normal".into(),
            subject: subject.map(str::to_string),
            grade: Some("10".into()),
            status: DocumentStatus::Processed,
            extracted_content: true,
            page_count: None,
            processing_time: None,
        }
    }

    fn unit(title: &str) -> Unit {
        Unit {
            id: "u1".into(),
            title: title.into(),
            page_range: Some("1-50".into()),
            word_count: Some(12000),
            key_topics: vec!["Linear Equations".into()],
        }
    }

    #[tokio::test]
    async fn test_sample_generator_shape() {
        let questions = SampleQuestionGenerator
            .generate(&document(Some("Mathematics")), None)
            .await
            .unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question_type, "multiple_choice");
        assert_eq!(questions[0].options.len(), 4);
        assert_eq!(questions[1].question_type, "true_false");
        assert!(questions.iter().all(|q| q.validate().is_ok()));
    }

    #[tokio::test]
    async fn test_sample_generator_is_deterministic() {
        let doc = document(Some("Mathematics"));
        let first = SampleQuestionGenerator.generate(&doc, None).await.unwrap();
        let second = SampleQuestionGenerator.generate(&doc, None).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_context_prefers_unit_title() {
        let doc = document(Some("Mathematics"));
        assert_eq!(context_label(&doc, Some(&unit("Algebra"))), "Algebra");
        assert_eq!(context_label(&doc, None), "Mathematics");
        assert_eq!(context_label(&document(None), None), "this document");
    }

    #[tokio::test]
    async fn test_sample_questions_start_with_capital() {
        let questions = SampleQuestionGenerator
            .generate(&document(None), None)
            .await
            .unwrap();
        assert_eq!(
            questions[1].question,
            "This document is covered in a single page."
        );
        assert_eq!(
            questions[0].question,
            "Which statement best summarises this document?"
        );
    }

    #[test]
    fn test_sentence_case() {
        assert_eq!(sentence_case("algebra"), "Algebra");
        assert_eq!(sentence_case("Mathematics"), "Mathematics");
        assert_eq!(sentence_case("élan"), "Élan");
        assert_eq!(sentence_case(""), "");
    }

    #[test]
    fn test_default_config_is_sample() {
        let generator = GeneratorConfig::default().build().unwrap();
        assert_eq!(generator.name(), "sample");
    }
}
