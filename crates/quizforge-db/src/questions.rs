//! Question repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use quizforge_core::{new_id, Error, Question, QuestionRecord, QuestionRepository, Result};

/// PostgreSQL implementation of QuestionRepository.
#[derive(Clone)]
pub struct PgQuestionRepository {
    pool: Pool<Postgres>,
}

impl PgQuestionRepository {
    /// Create a new PgQuestionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionRepository for PgQuestionRepository {
    async fn insert_questions(
        &self,
        document_id: &str,
        unit_id: Option<&str>,
        quiz_id: &str,
        questions: &[QuestionRecord],
    ) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut ids = Vec::with_capacity(questions.len());

        // Rows are inserted one by one so the serial `seq` column follows
        // generator order.
        for question in questions {
            let id = new_id();
            sqlx::query(
                "INSERT INTO \"Question\"
                     (id, type, question, options, correct_answer, reasoning, document_id, unit_id, quiz_id)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(&id)
            .bind(&question.question_type)
            .bind(&question.question)
            .bind(&question.options)
            .bind(question.correct_answer)
            .bind(&question.reasoning)
            .bind(document_id)
            .bind(unit_id)
            .bind(quiz_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            ids.push(id);
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "questions",
            op = "insert_questions",
            quiz_id,
            question_count = ids.len(),
            "Inserted questions"
        );
        Ok(ids)
    }

    async fn questions_for_quiz(&self, quiz_id: &str) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT id, type, question, options, correct_answer, reasoning, document_id, unit_id, quiz_id
             FROM \"Question\"
             WHERE quiz_id = $1
             ORDER BY seq ASC",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| Question {
                id: row.get("id"),
                record: QuestionRecord {
                    question_type: row.get("type"),
                    question: row.get("question"),
                    options: row.get("options"),
                    correct_answer: row.get("correct_answer"),
                    reasoning: row
                        .get::<Option<String>, _>("reasoning")
                        .unwrap_or_default(),
                },
                document_id: row.get("document_id"),
                unit_id: row.get("unit_id"),
                quiz_id: row.get("quiz_id"),
            })
            .collect())
    }
}
