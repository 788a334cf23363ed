//! Unit repository implementation (read-only).

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use quizforge_core::{Error, Result, Unit, UnitRepository};

/// PostgreSQL implementation of UnitRepository.
#[derive(Clone)]
pub struct PgUnitRepository {
    pool: Pool<Postgres>,
}

impl PgUnitRepository {
    /// Create a new PgUnitRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitRepository for PgUnitRepository {
    async fn fetch_unit(&self, id: &str) -> Result<Option<Unit>> {
        let row = sqlx::query(
            "SELECT id, title, page_range, word_count, key_topics FROM \"Unit\" WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| Unit {
            id: row.get("id"),
            title: row.get("title"),
            page_range: row.get("page_range"),
            word_count: row.get("word_count"),
            key_topics: row
                .get::<Option<Vec<String>>, _>("key_topics")
                .unwrap_or_default(),
        }))
    }
}
