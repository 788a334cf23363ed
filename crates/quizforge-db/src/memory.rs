//! In-process job store.
//!
//! Implements the same repository traits as the PostgreSQL store, with the
//! same status and claim semantics, for tests and database-less local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use quizforge_core::{
    new_id, Document, DocumentRepository, DocumentStatus, Error, NewDocument, ProcessingStats,
    Question, QuestionRecord, QuestionRepository, Result, Unit, UnitRepository,
};

#[derive(Default)]
struct MemoryState {
    documents: HashMap<String, Document>,
    units: HashMap<String, Unit>,
    /// Kept in insertion order.
    questions: Vec<Question>,
    /// When set, every operation fails as if the database were unreachable.
    unavailable: bool,
    /// When set, question inserts fail (simulates a failing write).
    fail_question_inserts: bool,
}

/// Thread-safe in-memory job store. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".into()))?;
        if state.unavailable {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(state)
    }

    /// Add or replace a unit.
    pub fn put_unit(&self, unit: Unit) {
        if let Ok(mut state) = self.state.lock() {
            state.units.insert(unit.id.clone(), unit);
        }
    }

    /// Overwrite a document's status without side effects on other fields
    /// (models an operator reset).
    pub fn force_status(&self, id: &str, status: DocumentStatus) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(doc) = state.documents.get_mut(id) {
                doc.status = status;
            }
        }
    }

    /// Make every subsequent operation fail with a store error.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unavailable = unavailable;
        }
    }

    /// Make question inserts fail with a store error.
    pub fn fail_question_inserts(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_question_inserts = fail;
        }
    }

    /// Total number of stored questions.
    pub fn question_count(&self) -> usize {
        self.state.lock().map(|s| s.questions.len()).unwrap_or(0)
    }

    /// Snapshot of all documents.
    pub fn documents(&self) -> Vec<Document> {
        self.state
            .lock()
            .map(|s| s.documents.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn insert(&self, doc: NewDocument) -> Result<Document> {
        let mut state = self.lock()?;
        if state.documents.contains_key(&doc.id) {
            return Err(Error::Internal(format!("duplicate document id: {}", doc.id)));
        }
        let document = Document {
            id: doc.id,
            file_path: doc.file_path,
            pdf_type: doc.pdf_type,
            subject: doc.subject,
            grade: doc.grade,
            status: DocumentStatus::Uploaded,
            extracted_content: false,
            page_count: None,
            processing_time: None,
        };
        state
            .documents
            .insert(document.id.clone(), document.clone());
        Ok(document)
    }

    async fn fetch_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.lock()?.documents.get(id).cloned())
    }

    async fn find_pending_by_path(&self, path: &str) -> Result<Option<Document>> {
        Ok(self
            .lock()?
            .documents
            .values()
            .find(|d| d.file_path == path && d.status == DocumentStatus::Uploaded)
            .cloned())
    }

    async fn claim_pending_by_path(&self, path: &str) -> Result<Option<Document>> {
        let mut state = self.lock()?;
        let claimed = state
            .documents
            .values_mut()
            .find(|d| d.file_path == path && d.status == DocumentStatus::Uploaded)
            .map(|doc| {
                doc.status = DocumentStatus::Processing;
                doc.extracted_content = false;
                doc.clone()
            });
        Ok(claimed)
    }

    async fn mark_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        let mut state = self.lock()?;
        let doc = state
            .documents
            .get_mut(id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;
        doc.status = status;
        doc.extracted_content = status.extracted_content();
        Ok(())
    }

    async fn record_processing_stats(&self, id: &str, stats: ProcessingStats) -> Result<()> {
        let mut state = self.lock()?;
        let doc = state
            .documents
            .get_mut(id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;
        if stats.page_count.is_some() {
            doc.page_count = stats.page_count;
        }
        doc.processing_time = Some(stats.processing_secs);
        Ok(())
    }
}

#[async_trait]
impl UnitRepository for MemoryStore {
    async fn fetch_unit(&self, id: &str) -> Result<Option<Unit>> {
        Ok(self.lock()?.units.get(id).cloned())
    }
}

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn insert_questions(
        &self,
        document_id: &str,
        unit_id: Option<&str>,
        quiz_id: &str,
        questions: &[QuestionRecord],
    ) -> Result<Vec<String>> {
        let mut state = self.lock()?;
        if state.fail_question_inserts {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        let mut ids = Vec::with_capacity(questions.len());
        for record in questions {
            let id = new_id();
            state.questions.push(Question {
                id: id.clone(),
                record: record.clone(),
                document_id: document_id.to_string(),
                unit_id: unit_id.map(str::to_string),
                quiz_id: Some(quiz_id.to_string()),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn questions_for_quiz(&self, quiz_id: &str) -> Result<Vec<Question>> {
        Ok(self
            .lock()?
            .questions
            .iter()
            .filter(|q| q.quiz_id.as_deref() == Some(quiz_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(question: &str) -> QuestionRecord {
        QuestionRecord {
            question_type: "true_false".into(),
            question: question.into(),
            options: vec!["True".into(), "False".into()],
            correct_answer: 0,
            reasoning: "because".into(),
        }
    }

    #[tokio::test]
    async fn test_insert_starts_uploaded() {
        let store = MemoryStore::new();
        let doc = store
            .insert(NewDocument::new("d1", "/up/d1.pdf", "normal"))
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert!(!doc.extracted_content);
    }

    #[tokio::test]
    async fn test_find_pending_ignores_other_statuses() {
        let store = MemoryStore::new();
        store
            .insert(NewDocument::new("d1", "/up/d1.pdf", "normal"))
            .await
            .unwrap();
        store
            .mark_status("d1", DocumentStatus::Processing)
            .await
            .unwrap();
        assert!(store
            .find_pending_by_path("/up/d1.pdf")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let store = MemoryStore::new();
        store
            .insert(NewDocument::new("d1", "/up/d1.pdf", "normal"))
            .await
            .unwrap();

        let first = store.claim_pending_by_path("/up/d1.pdf").await.unwrap();
        let second = store.claim_pending_by_path("/up/d1.pdf").await.unwrap();

        assert_eq!(first.unwrap().status, DocumentStatus::Processing);
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_mark_processed_sets_extracted_content() {
        let store = MemoryStore::new();
        store
            .insert(NewDocument::new("d1", "/up/d1.pdf", "normal"))
            .await
            .unwrap();
        store
            .mark_status("d1", DocumentStatus::Processed)
            .await
            .unwrap();
        let doc = store.fetch_document("d1").await.unwrap().unwrap();
        assert!(doc.extracted_content);

        store.mark_status("d1", DocumentStatus::Error).await.unwrap();
        let doc = store.fetch_document("d1").await.unwrap().unwrap();
        assert!(!doc.extracted_content);
    }

    #[tokio::test]
    async fn test_mark_status_unknown_document() {
        let store = MemoryStore::new();
        let err = store
            .mark_status("missing", DocumentStatus::Error)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_questions_keep_insertion_order() {
        let store = MemoryStore::new();
        store
            .insert_questions("d1", None, "q1", &[record("first"), record("second")])
            .await
            .unwrap();
        store
            .insert_questions("d1", None, "q2", &[record("other")])
            .await
            .unwrap();

        let questions = store.questions_for_quiz("q1").await.unwrap();
        let texts: Vec<_> = questions.iter().map(|q| q.record.question.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(store.question_count(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.fetch_document("d1").await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn test_record_processing_stats() {
        let store = MemoryStore::new();
        store
            .insert(NewDocument::new("d1", "/up/d1.pdf", "normal"))
            .await
            .unwrap();
        store
            .record_processing_stats(
                "d1",
                ProcessingStats {
                    page_count: Some(12),
                    processing_secs: 3,
                },
            )
            .await
            .unwrap();
        let doc = store.fetch_document("d1").await.unwrap().unwrap();
        assert_eq!(doc.page_count, Some(12));
        assert_eq!(doc.processing_time, Some(3));
    }
}
