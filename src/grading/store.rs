// src/grading/store.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::attempt::TestMode;
use crate::models::subject::Subject;

use super::answer::{AnswerKey, QuestionOutcome};
use super::progression::SubjectProgress;
use super::score::ScoreSummary;

/// Persistence failures as seen by the engine. The engine distinguishes
/// "referenced row missing" from "store unavailable" because the two have
/// different propagation rules: a missing student aborts only the
/// progression step, while an unavailable store must never discard an
/// already-computed score.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// A fully-graded attempt, computed in memory before any persistence runs.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: i64,
    pub subject: Subject,
    pub mode: TestMode,
    pub topic: Option<String>,
    pub attempt_key: String,
    pub outcomes: Vec<QuestionOutcome>,
    pub summary: ScoreSummary,
    pub total_time_seconds: i32,
}

/// The persistence surface the grading engine needs: find-by-id reads, one
/// append-only insert, and one conditional update. Everything else about the
/// backing store is the caller's business.
#[async_trait]
pub trait GradingStore: Send + Sync {
    /// Fetches answer keys for the requested question ids. Ids with no
    /// matching question are simply absent from the map; the grader turns
    /// those into explicit not-found outcomes.
    async fn answer_keys(&self, ids: &[i64]) -> Result<HashMap<i64, AnswerKey>, StoreError>;

    /// Append-only insert keyed by `attempt_key`. Returns the new row id, or
    /// `None` when an attempt with the same key was already recorded, in
    /// which case no other mutation may run for this submission.
    async fn insert_attempt(&self, attempt: &NewAttempt) -> Result<Option<i64>, StoreError>;

    /// Reads the authoritative (stage, level) for the student and subject,
    /// initializing it to (1, 1) on first use.
    async fn subject_progress(
        &self,
        user_id: i64,
        subject: Subject,
    ) -> Result<SubjectProgress, StoreError>;

    /// Conditional update: applies `to` only while the stored state still
    /// equals `from`. Returns `false` when a concurrent writer won the race,
    /// in which case the caller re-reads and retries.
    async fn swap_subject_progress(
        &self,
        user_id: i64,
        subject: Subject,
        from: SubjectProgress,
        to: SubjectProgress,
    ) -> Result<bool, StoreError>;

    /// Folds one attempt into the (subject, topic) record: best-score max,
    /// completion latch, attempt count, last-attempt timestamp.
    async fn record_topic_attempt(
        &self,
        user_id: i64,
        subject: Subject,
        topic: &str,
        score: i32,
        completed: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
