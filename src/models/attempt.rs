// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::grading::answer::{AnswerValue, QuestionOutcome};
use crate::grading::score::ScoringMode;
use crate::models::subject::Subject;

/// Submission mode. Practice and assessment tests are topic-driven; the
/// legacy mode serves the old stage-test path, which bypasses topic
/// tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "test_mode", rename_all = "lowercase")]
pub enum TestMode {
    Practice,
    Assessment,
    Legacy,
}

/// Represents the append-only 'test_attempts' table.
///
/// Rows are written once per completed submission and never mutated. The
/// outcomes column snapshots question text and explanations, so deleting a
/// question never invalidates history.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestAttempt {
    pub id: i64,
    pub user_id: i64,
    pub subject: Subject,
    pub mode: TestMode,
    pub topic: Option<String>,
    /// Idempotency key: one progression mutation per distinct attempt.
    pub attempt_key: String,
    pub outcomes: Json<Vec<QuestionOutcome>>,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub unanswered_count: i32,
    pub score_percentage: i32,
    pub passed: bool,
    pub total_time_seconds: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TestAttempt {
    /// The score shown for history: always derivable from the outcome list.
    /// Legacy rows with a missing (zero) stored score are recomputed from
    /// the snapshot.
    pub fn effective_score(&self) -> i32 {
        if self.score_percentage != 0 || self.outcomes.0.is_empty() {
            return self.score_percentage;
        }
        let total = self.outcomes.0.len() as f64;
        let correct = self.outcomes.0.iter().filter(|o| o.is_correct).count() as f64;
        ((100.0 * correct) / total).round() as i32
    }
}

/// Aggregated row for the leaderboard (best score per student).
#[derive(Debug, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub username: String,
    pub best_score: i32,
    pub attempts: i64,
}

/// One submitted answer within a test submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    /// Absent for questions the student left unanswered.
    pub selected: Option<AnswerValue>,
    pub time_spent_seconds: Option<i32>,
}

/// DTO for submitting a completed test.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTestRequest {
    pub subject: Subject,
    pub mode: TestMode,
    #[validate(length(min = 1, max = 100))]
    pub topic: Option<String>,
    #[serde(default)]
    pub scoring_mode: ScoringMode,
    pub total_time_seconds: Option<i32>,
    /// Client-supplied idempotency key. Server generates one when absent,
    /// in which case retries are not deduplicated.
    #[validate(length(min = 1, max = 64))]
    pub attempt_key: Option<String>,
    pub answers: Vec<SubmittedAnswer>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::answer::QuestionOutcome;

    fn outcome(is_correct: bool) -> QuestionOutcome {
        QuestionOutcome {
            question_id: 1,
            question_text: None,
            selected: None,
            correct: None,
            is_correct,
            answered: true,
            question_found: true,
            explanation: None,
            time_spent_seconds: None,
        }
    }

    fn attempt(score: i32, outcomes: Vec<QuestionOutcome>) -> TestAttempt {
        TestAttempt {
            id: 1,
            user_id: 1,
            subject: Subject::Physics,
            mode: TestMode::Assessment,
            topic: None,
            attempt_key: "k".to_string(),
            outcomes: Json(outcomes),
            correct_count: 0,
            incorrect_count: 0,
            unanswered_count: 0,
            score_percentage: score,
            passed: false,
            total_time_seconds: 0,
            created_at: None,
        }
    }

    #[test]
    fn zero_stored_score_is_recomputed_from_outcomes() {
        let a = attempt(0, vec![outcome(true), outcome(true), outcome(false), outcome(false)]);
        assert_eq!(a.effective_score(), 50);
    }

    #[test]
    fn nonzero_stored_score_wins() {
        let a = attempt(80, vec![outcome(false)]);
        assert_eq!(a.effective_score(), 80);
    }

    #[test]
    fn empty_outcomes_stay_zero() {
        let a = attempt(0, vec![]);
        assert_eq!(a.effective_score(), 0);
    }
}
