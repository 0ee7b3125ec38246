// src/grading/topic.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-(subject, topic) practice record, independent of stage/level
/// progression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub best_score: i32,
    pub completed: bool,
    pub attempts: i32,
    pub last_attempt_at: DateTime<Utc>,
}

impl TopicProgress {
    pub fn first_attempt(score: i32, completion_threshold: i32, at: DateTime<Utc>) -> Self {
        TopicProgress {
            best_score: score,
            completed: score >= completion_threshold,
            attempts: 1,
            last_attempt_at: at,
        }
    }

    /// Folds a new attempt into the record: best score is monotonic,
    /// completion latches on once reached, attempts always count.
    pub fn record(&mut self, score: i32, completion_threshold: i32, at: DateTime<Utc>) {
        self.best_score = self.best_score.max(score);
        self.completed = self.completed || score >= completion_threshold;
        self.attempts += 1;
        self.last_attempt_at = at;
    }
}
