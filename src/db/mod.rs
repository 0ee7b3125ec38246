// src/db/mod.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use crate::grading::answer::{AnswerKey, AnswerValue};
use crate::grading::progression::SubjectProgress;
use crate::grading::store::{GradingStore, NewAttempt, StoreError};
use crate::models::subject::Subject;

/// Postgres-backed grading store.
///
/// The conditional progression update is a plain `UPDATE ... WHERE stage =
/// $read AND level = $read`; the engine retries on conflict, so no row locks
/// are held across awaits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl GradingStore for PgStore {
    async fn answer_keys(&self, ids: &[i64]) -> Result<HashMap<i64, AnswerKey>, StoreError> {
        let rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, content, answer, explanation FROM questions WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, content, answer, explanation)| {
                (
                    id,
                    AnswerKey {
                        question_id: id,
                        content,
                        answer: AnswerValue::parse(&answer),
                        explanation,
                    },
                )
            })
            .collect())
    }

    async fn insert_attempt(&self, attempt: &NewAttempt) -> Result<Option<i64>, StoreError> {
        // ON CONFLICT DO NOTHING on the attempt key makes this insert the
        // idempotency gate: a duplicate returns no row and the caller skips
        // every follow-up mutation.
        let id: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO test_attempts
                (user_id, subject, mode, topic, attempt_key, outcomes,
                 correct_count, incorrect_count, unanswered_count,
                 score_percentage, passed, total_time_seconds)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (attempt_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(attempt.user_id)
        .bind(attempt.subject)
        .bind(attempt.mode)
        .bind(&attempt.topic)
        .bind(&attempt.attempt_key)
        .bind(Json(&attempt.outcomes))
        .bind(attempt.summary.correct_count)
        .bind(attempt.summary.incorrect_count)
        .bind(attempt.summary.unanswered_count)
        .bind(attempt.summary.score_percentage)
        .bind(attempt.summary.passed)
        .bind(attempt.total_time_seconds)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(|(id,)| id))
    }

    async fn subject_progress(
        &self,
        user_id: i64,
        subject: Subject,
    ) -> Result<SubjectProgress, StoreError> {
        sqlx::query(
            "INSERT INTO subject_progress (user_id, subject) VALUES ($1, $2)
             ON CONFLICT (user_id, subject) DO NOTHING",
        )
        .bind(user_id)
        .bind(subject)
        .execute(&self.pool)
        .await?;

        let (stage, level): (i32, i32) = sqlx::query_as(
            "SELECT stage, level FROM subject_progress WHERE user_id = $1 AND subject = $2",
        )
        .bind(user_id)
        .bind(subject)
        .fetch_one(&self.pool)
        .await?;

        Ok(SubjectProgress { stage, level })
    }

    async fn swap_subject_progress(
        &self,
        user_id: i64,
        subject: Subject,
        from: SubjectProgress,
        to: SubjectProgress,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE subject_progress
            SET stage = $1, level = $2, updated_at = NOW()
            WHERE user_id = $3 AND subject = $4 AND stage = $5 AND level = $6
            "#,
        )
        .bind(to.stage)
        .bind(to.level)
        .bind(user_id)
        .bind(subject)
        .bind(from.stage)
        .bind(from.level)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_topic_attempt(
        &self,
        user_id: i64,
        subject: Subject,
        topic: &str,
        score: i32,
        completed: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO topic_progress
                (user_id, subject, topic, best_score, completed, attempts, last_attempt_at)
            VALUES ($1, $2, $3, $4, $5, 1, $6)
            ON CONFLICT (user_id, subject, topic) DO UPDATE SET
                best_score = GREATEST(topic_progress.best_score, EXCLUDED.best_score),
                completed = topic_progress.completed OR EXCLUDED.completed,
                attempts = topic_progress.attempts + 1,
                last_attempt_at = EXCLUDED.last_attempt_at
            "#,
        )
        .bind(user_id)
        .bind(subject)
        .bind(topic)
        .bind(score)
        .bind(completed)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
