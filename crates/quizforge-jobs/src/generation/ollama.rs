//! Ollama-backed question generator.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quizforge_core::{Document, Error, QuestionGenerator, QuestionRecord, Result, Unit};

use super::context_label;

const SYSTEM_PROMPT: &str = "You write quiz questions for students. \
Respond with a JSON object of the form {\"questions\": [...]} where each question has \
\"type\" (\"multiple_choice\" or \"true_false\"), \"question\", \"options\" (array of strings), \
\"correct_answer\" (zero-based index into options) and \"reasoning\".";

/// Generates questions through the Ollama `/api/chat` endpoint with JSON output.
pub struct OllamaQuestionGenerator {
    client: Client,
    base_url: String,
    model: String,
    questions_per_quiz: usize,
}

impl OllamaQuestionGenerator {
    pub fn new(
        base_url: String,
        model: String,
        questions_per_quiz: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            questions_per_quiz,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// User prompt describing the document and unit.
    pub(crate) fn build_prompt(&self, document: &Document, unit: Option<&Unit>) -> String {
        let mut prompt = format!(
            "Write {} quiz questions about {}.\n",
            self.questions_per_quiz,
            context_label(document, unit)
        );
        if let Some(subject) = &document.subject {
            prompt.push_str(&format!("Subject: {}\n", subject));
        }
        if let Some(grade) = &document.grade {
            prompt.push_str(&format!("Grade: {}\n", grade));
        }
        if let Some(unit) = unit {
            if let Some(range) = &unit.page_range {
                prompt.push_str(&format!("Pages: {}\n", range));
            }
            if !unit.key_topics.is_empty() {
                prompt.push_str(&format!("Key topics: {}\n", unit.key_topics.join(", ")));
            }
        }
        prompt
    }
}

/// Parse the model's JSON reply into validated question records.
pub(crate) fn parse_questions(content: &str) -> Result<Vec<QuestionRecord>> {
    let reply: QuestionsReply = serde_json::from_str(content)
        .map_err(|e| Error::Generation(format!("Unparsable generator output: {}", e)))?;
    if reply.questions.is_empty() {
        return Err(Error::Generation("Generator returned no questions".into()));
    }
    for question in &reply.questions {
        question.validate()?;
    }
    Ok(reply.questions)
}

#[derive(Deserialize)]
struct QuestionsReply {
    questions: Vec<QuestionRecord>,
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: serde_json::Value,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl QuestionGenerator for OllamaQuestionGenerator {
    async fn generate(
        &self,
        document: &Document,
        unit: Option<&Unit>,
    ) -> Result<Vec<QuestionRecord>> {
        let start = Instant::now();
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: self.build_prompt(document, unit),
                },
            ],
            stream: false,
            format: serde_json::json!("json"),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Failed to parse response: {}", e)))?;

        let questions = parse_questions(&result.message.content)?;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            component = "ollama",
            model = %self.model,
            question_count = questions.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(
                component = "ollama",
                duration_ms = elapsed,
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(questions)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_core::DocumentStatus;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn document() -> Document {
        Document {
            id: "d1".into(),
            file_path: "uploads/pdfs/d1.pdf".into(),
            pdf_type: "normal".into(),
            subject: Some("Mathematics".into()),
            grade: Some("10".into()),
            status: DocumentStatus::Processed,
            extracted_content: true,
            page_count: Some(245),
            processing_time: None,
        }
    }

    fn generator(base_url: String) -> OllamaQuestionGenerator {
        OllamaQuestionGenerator::new(base_url, "test-model".into(), 2, Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![],
            stream: false,
            format: serde_json::json!("json"),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"format\":\"json\""));
        assert!(json.contains("\"stream\":false"));
    }

    #[test]
    fn test_prompt_includes_unit_context() {
        let unit = Unit {
            id: "u1".into(),
            title: "Algebra Fundamentals".into(),
            page_range: Some("1-50".into()),
            word_count: None,
            key_topics: vec!["Linear Equations".into(), "Polynomials".into()],
        };
        let prompt = generator("http://localhost".into()).build_prompt(&document(), Some(&unit));
        assert!(prompt.contains("Write 2 quiz questions about Algebra Fundamentals"));
        assert!(prompt.contains("Key topics: Linear Equations, Polynomials"));
        assert!(prompt.contains("Grade: 10"));
    }

    #[test]
    fn test_parse_questions_valid() {
        let content = r#"{"questions":[
            {"type":"multiple_choice","question":"2+2?","options":["3","4"],"correct_answer":1,"reasoning":"arithmetic"},
            {"type":"true_false","question":"Zero is even.","options":["True","False"],"correctAnswer":0}
        ]}"#;
        let questions = parse_questions(content).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question, "2+2?");
        assert_eq!(questions[1].correct_answer, 0);
        assert_eq!(questions[1].reasoning, "");
    }

    #[test]
    fn test_parse_questions_rejects_bad_index() {
        let content = r#"{"questions":[{"type":"true_false","question":"Q","options":["True","False"],"correct_answer":5}]}"#;
        assert!(matches!(
            parse_questions(content).unwrap_err(),
            Error::Generation(_)
        ));
    }

    #[test]
    fn test_parse_questions_rejects_empty_and_garbage() {
        assert!(parse_questions(r#"{"questions":[]}"#).is_err());
        assert!(parse_questions("not json").is_err());
    }

    #[tokio::test]
    async fn test_generate_via_chat_api() {
        let server = MockServer::start().await;
        let content = r#"{"questions":[{"type":"true_false","question":"Q?","options":["True","False"],"correct_answer":1,"reasoning":"r"}]}"#;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "stream": false,
                "format": "json"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": content}
            })))
            .mount(&server)
            .await;

        let questions = generator(server.uri())
            .generate(&document(), None)
            .await
            .unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Q?");
    }

    #[tokio::test]
    async fn test_generate_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let err = generator(server.uri())
            .generate(&document(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(err.to_string().contains("model not loaded"));
    }
}
