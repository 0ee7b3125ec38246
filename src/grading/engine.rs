// src/grading/engine.rs

use thiserror::Error;
use uuid::Uuid;

use crate::models::attempt::{SubmittedAnswer, TestMode};
use crate::models::subject::Subject;

use super::answer::{self, QuestionOutcome};
use super::progression::SubjectProgress;
use super::score::{self, ScoreSummary, ScoringMode};
use super::store::{GradingStore, NewAttempt, StoreError};

/// Tunables for one engine instance, sourced from application config.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum percentage for `passed = true` (default 70).
    pub pass_threshold: i32,
    /// Minimum percentage for a topic to count as completed (default 70).
    pub completion_threshold: i32,
    /// Bound on conditional-update retries for the progression write.
    pub max_progress_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            pass_threshold: 70,
            completion_threshold: 70,
            max_progress_retries: 5,
        }
    }
}

/// A complete test submission as handed to the engine.
#[derive(Debug, Clone)]
pub struct Submission {
    pub user_id: i64,
    pub subject: Subject,
    pub mode: TestMode,
    pub topic: Option<String>,
    pub scoring_mode: ScoringMode,
    pub answers: Vec<SubmittedAnswer>,
    pub total_time_seconds: i32,
    /// Idempotency key; generated server-side when the client sends none.
    pub attempt_key: Option<String>,
}

/// Everything the caller learns from one submission.
///
/// The score fields are always present once grading succeeded; the boolean
/// flags report which bookkeeping writes were durably applied, so a store
/// failure after grading degrades the response instead of losing the score.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub summary: ScoreSummary,
    pub outcomes: Vec<QuestionOutcome>,
    /// Progression state after this submission, when it could be read.
    pub progression: Option<SubjectProgress>,
    pub attempt_id: Option<i64>,
    /// True when this attempt key was already recorded; nothing was applied.
    pub duplicate: bool,
    pub attempt_recorded: bool,
    pub progression_applied: bool,
    pub topic_recorded: bool,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid submission: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrates grade → record → progress → topic for one submission.
///
/// Scoring runs to completion in memory before the first persisted mutation,
/// so a crash mid-grading leaves stored state untouched.
pub struct GradingEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: GradingStore> GradingEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        GradingEngine { store, config }
    }

    pub async fn submit(&self, sub: Submission) -> Result<SubmissionResult, EngineError> {
        if sub.answers.is_empty() {
            return Err(EngineError::InvalidInput("no answers submitted".to_string()));
        }

        // Grade fully in memory. A store failure here happens before any
        // mutation and may simply propagate.
        let ids: Vec<i64> = sub.answers.iter().map(|a| a.question_id).collect();
        let keys = self.store.answer_keys(&ids).await?;

        let outcomes: Vec<QuestionOutcome> = sub
            .answers
            .iter()
            .map(|a| {
                answer::grade(
                    keys.get(&a.question_id),
                    a.question_id,
                    a.selected.as_ref(),
                    a.time_spent_seconds,
                )
            })
            .collect();
        let summary = score::aggregate(&outcomes, sub.scoring_mode, self.config.pass_threshold);

        let attempt_key = sub
            .attempt_key
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let attempt = NewAttempt {
            user_id: sub.user_id,
            subject: sub.subject,
            mode: sub.mode,
            topic: sub.topic.clone(),
            attempt_key,
            outcomes: outcomes.clone(),
            summary: summary.clone(),
            total_time_seconds: sub.total_time_seconds,
        };

        let mut result = SubmissionResult {
            summary,
            outcomes,
            progression: None,
            attempt_id: None,
            duplicate: false,
            attempt_recorded: false,
            progression_applied: false,
            topic_recorded: false,
        };

        // Append-only history first. Progression and topic bookkeeping only
        // run when this insert actually inserted, which is what makes a
        // duplicate submission unable to double-increment the level.
        let attempt_id = match self.store.insert_attempt(&attempt).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::info!(
                    user_id = sub.user_id,
                    attempt_key = %attempt.attempt_key,
                    "duplicate attempt key, returning grade without applying"
                );
                result.duplicate = true;
                result.progression = self
                    .store
                    .subject_progress(sub.user_id, sub.subject)
                    .await
                    .ok();
                return Ok(result);
            }
            Err(e) => {
                tracing::warn!(user_id = sub.user_id, "attempt not recorded: {e}");
                return Ok(result);
            }
        };
        result.attempt_recorded = true;
        result.attempt_id = Some(attempt_id);

        self.apply_progression(&sub, &mut result).await;
        self.apply_topic(&sub, &mut result).await;

        Ok(result)
    }

    /// Read-modify-write of (stage, level) as a conditional update, retried
    /// while concurrent submissions for the same student and subject win the
    /// race. State is always re-read from the store, never taken from the
    /// client.
    async fn apply_progression(&self, sub: &Submission, result: &mut SubmissionResult) {
        let mut current = match self.store.subject_progress(sub.user_id, sub.subject).await {
            Ok(p) => p,
            Err(e) => {
                // A missing student (or an unavailable store) aborts only
                // this step; the score has already been computed.
                tracing::warn!(user_id = sub.user_id, "progression skipped: {e}");
                return;
            }
        };

        // Topic practice never moves stage/level; failed attempts never do.
        let advances = result.summary.passed && sub.mode != TestMode::Practice;
        if advances {
            for _ in 0..self.config.max_progress_retries {
                let next = current.advanced();
                match self
                    .store
                    .swap_subject_progress(sub.user_id, sub.subject, current, next)
                    .await
                {
                    Ok(true) => {
                        current = next;
                        result.progression_applied = true;
                        break;
                    }
                    Ok(false) => {
                        // Lost the race; re-read and recompute the increment.
                        match self.store.subject_progress(sub.user_id, sub.subject).await {
                            Ok(p) => current = p,
                            Err(e) => {
                                tracing::warn!(user_id = sub.user_id, "progression re-read failed: {e}");
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(user_id = sub.user_id, "progression update failed: {e}");
                        break;
                    }
                }
            }
            if !result.progression_applied {
                tracing::warn!(
                    user_id = sub.user_id,
                    subject = %sub.subject,
                    "progression not applied after {} retries",
                    self.config.max_progress_retries
                );
            }
        }
        result.progression = Some(current);
    }

    async fn apply_topic(&self, sub: &Submission, result: &mut SubmissionResult) {
        // Legacy stage tests bypass topic tracking entirely.
        if sub.mode == TestMode::Legacy {
            return;
        }
        let Some(topic) = sub.topic.as_deref() else {
            return;
        };

        let score = result.summary.score_percentage;
        let completed = score >= self.config.completion_threshold;
        match self
            .store
            .record_topic_attempt(
                sub.user_id,
                sub.subject,
                topic,
                score,
                completed,
                chrono::Utc::now(),
            )
            .await
        {
            Ok(()) => result.topic_recorded = true,
            Err(e) => {
                tracing::warn!(user_id = sub.user_id, topic, "topic progress not recorded: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::grading::answer::{AnswerKey, AnswerValue};
    use crate::grading::topic::TopicProgress;

    #[derive(Default)]
    struct MemInner {
        keys: HashMap<i64, AnswerKey>,
        attempts: HashMap<String, i64>,
        next_attempt_id: i64,
        progress: HashMap<(i64, Subject), SubjectProgress>,
        topics: HashMap<(i64, Subject, String), TopicProgress>,
        fail_attempt_inserts: bool,
    }

    /// In-memory store with the same conditional-update semantics as the
    /// Postgres store.
    #[derive(Clone, Default)]
    struct MemStore {
        inner: Arc<Mutex<MemInner>>,
    }

    #[async_trait::async_trait]
    impl GradingStore for MemStore {
        async fn answer_keys(&self, ids: &[i64]) -> Result<HashMap<i64, AnswerKey>, StoreError> {
            let inner = self.inner.lock().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| inner.keys.get(id).cloned().map(|k| (*id, k)))
                .collect())
        }

        async fn insert_attempt(&self, attempt: &NewAttempt) -> Result<Option<i64>, StoreError> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_attempt_inserts {
                return Err(StoreError::Unavailable("injected failure".to_string()));
            }
            if inner.attempts.contains_key(&attempt.attempt_key) {
                return Ok(None);
            }
            inner.next_attempt_id += 1;
            let id = inner.next_attempt_id;
            inner.attempts.insert(attempt.attempt_key.clone(), id);
            Ok(Some(id))
        }

        async fn subject_progress(
            &self,
            user_id: i64,
            subject: Subject,
        ) -> Result<SubjectProgress, StoreError> {
            let mut inner = self.inner.lock().unwrap();
            Ok(*inner
                .progress
                .entry((user_id, subject))
                .or_insert_with(SubjectProgress::start))
        }

        async fn swap_subject_progress(
            &self,
            user_id: i64,
            subject: Subject,
            from: SubjectProgress,
            to: SubjectProgress,
        ) -> Result<bool, StoreError> {
            let mut inner = self.inner.lock().unwrap();
            match inner.progress.get_mut(&(user_id, subject)) {
                Some(p) if *p == from => {
                    *p = to;
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => Ok(false),
            }
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
            let mut inner = self.inner.lock().unwrap();
            let threshold = if completed { score } else { i32::MAX };
            inner
                .topics
                .entry((user_id, subject, topic.to_string()))
                .and_modify(|t| t.record(score, threshold, at))
                .or_insert_with(|| TopicProgress::first_attempt(score, threshold, at));
            Ok(())
        }
    }

    fn seeded_store(question_count: i64) -> MemStore {
        let store = MemStore::default();
        {
            let mut inner = store.inner.lock().unwrap();
            for id in 1..=question_count {
                inner.keys.insert(
                    id,
                    AnswerKey {
                        question_id: id,
                        content: format!("Question {id}"),
                        answer: AnswerValue::Index(1),
                        explanation: Some("Because.".to_string()),
                    },
                );
            }
        }
        store
    }

    fn submission(mode: TestMode, correct: usize, wrong: usize) -> Submission {
        let answers = (1..=(correct + wrong) as i64)
            .map(|id| SubmittedAnswer {
                question_id: id,
                selected: Some(if (id as usize) <= correct {
                    AnswerValue::Letter("B".to_string())
                } else {
                    AnswerValue::Index(0)
                }),
                time_spent_seconds: None,
            })
            .collect();
        Submission {
            user_id: 7,
            subject: Subject::Physics,
            mode,
            topic: Some("kinematics".to_string()),
            scoring_mode: ScoringMode::Percentage,
            answers,
            total_time_seconds: 300,
            attempt_key: None,
        }
    }

    fn progress_of(store: &MemStore) -> SubjectProgress {
        store.inner.lock().unwrap().progress[&(7, Subject::Physics)]
    }

    #[tokio::test]
    async fn passing_assessment_advances_and_rolls_over() {
        let store = seeded_store(10);
        store
            .inner
            .lock()
            .unwrap()
            .progress
            .insert((7, Subject::Physics), SubjectProgress { stage: 1, level: 4 });

        let engine = GradingEngine::new(store.clone(), EngineConfig::default());
        let result = engine
            .submit(submission(TestMode::Assessment, 8, 2))
            .await
            .unwrap();

        assert_eq!(result.summary.score_percentage, 80);
        assert!(result.summary.passed);
        assert!(result.attempt_recorded);
        assert!(result.progression_applied);
        assert_eq!(result.progression, Some(SubjectProgress { stage: 2, level: 1 }));
        assert_eq!(progress_of(&store), SubjectProgress { stage: 2, level: 1 });
        assert!(result.topic_recorded);
    }

    #[tokio::test]
    async fn failing_never_moves_stage_or_level() {
        let store = seeded_store(10);
        let engine = GradingEngine::new(store.clone(), EngineConfig::default());

        let result = engine
            .submit(submission(TestMode::Assessment, 3, 7))
            .await
            .unwrap();

        assert!(!result.summary.passed);
        assert!(!result.progression_applied);
        assert_eq!(result.progression, Some(SubjectProgress::start()));
        // Topic progress still records the failed attempt.
        assert!(result.topic_recorded);
    }

    #[tokio::test]
    async fn practice_mode_updates_topic_only() {
        let store = seeded_store(10);
        let engine = GradingEngine::new(store.clone(), EngineConfig::default());

        let result = engine
            .submit(submission(TestMode::Practice, 10, 0))
            .await
            .unwrap();

        assert!(result.summary.passed);
        assert!(!result.progression_applied);
        assert_eq!(progress_of(&store), SubjectProgress::start());
        assert!(result.topic_recorded);
        let topics = &store.inner.lock().unwrap().topics;
        let t = &topics[&(7, Subject::Physics, "kinematics".to_string())];
        assert_eq!(t.best_score, 100);
        assert!(t.completed);
    }

    #[tokio::test]
    async fn legacy_mode_bypasses_topic_tracking() {
        let store = seeded_store(5);
        let engine = GradingEngine::new(store.clone(), EngineConfig::default());

        let mut sub = submission(TestMode::Legacy, 4, 1);
        sub.scoring_mode = ScoringMode::NegativeMarking;
        let result = engine.submit(sub).await.unwrap();

        // 4*4 - 1 = 15 of 20.
        assert_eq!(result.summary.raw_score, 15);
        assert_eq!(result.summary.score_percentage, 75);
        assert!(result.summary.passed);
        assert!(result.progression_applied);
        assert!(!result.topic_recorded);
        assert!(store.inner.lock().unwrap().topics.is_empty());
    }

    #[tokio::test]
    async fn duplicate_attempt_key_applies_nothing() {
        let store = seeded_store(10);
        let engine = GradingEngine::new(store.clone(), EngineConfig::default());

        let mut sub = submission(TestMode::Assessment, 10, 0);
        sub.attempt_key = Some("retry-me".to_string());

        let first = engine.submit(sub.clone()).await.unwrap();
        assert!(first.progression_applied);
        assert_eq!(progress_of(&store), SubjectProgress { stage: 1, level: 2 });

        let second = engine.submit(sub).await.unwrap();
        assert!(second.duplicate);
        assert!(!second.attempt_recorded);
        assert!(!second.progression_applied);
        // Level incremented exactly once across both submissions.
        assert_eq!(progress_of(&store), SubjectProgress { stage: 1, level: 2 });
    }

    #[tokio::test]
    async fn concurrent_passes_apply_sequential_increments() {
        let store = seeded_store(10);
        store
            .inner
            .lock()
            .unwrap()
            .progress
            .insert((7, Subject::Physics), SubjectProgress { stage: 1, level: 2 });

        let a = GradingEngine::new(store.clone(), EngineConfig::default());
        let b = GradingEngine::new(store.clone(), EngineConfig::default());

        let (ra, rb) = tokio::join!(
            a.submit(submission(TestMode::Assessment, 10, 0)),
            b.submit(submission(TestMode::Assessment, 10, 0)),
        );
        assert!(ra.unwrap().progression_applied);
        assert!(rb.unwrap().progression_applied);

        // Two increments from level 2, never a lost update.
        assert_eq!(progress_of(&store), SubjectProgress { stage: 1, level: 4 });
    }

    #[tokio::test]
    async fn empty_submission_is_rejected_before_persistence() {
        let store = seeded_store(10);
        let engine = GradingEngine::new(store.clone(), EngineConfig::default());

        let mut sub = submission(TestMode::Assessment, 1, 0);
        sub.answers.clear();
        let err = engine.submit(sub).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(store.inner.lock().unwrap().attempts.is_empty());
    }

    #[tokio::test]
    async fn store_failure_still_returns_the_grade() {
        let store = seeded_store(10);
        store.inner.lock().unwrap().fail_attempt_inserts = true;

        let engine = GradingEngine::new(store.clone(), EngineConfig::default());
        let result = engine
            .submit(submission(TestMode::Assessment, 8, 2))
            .await
            .unwrap();

        assert_eq!(result.summary.score_percentage, 80);
        assert!(!result.attempt_recorded);
        assert!(!result.progression_applied);
        assert!(!result.topic_recorded);
        assert_eq!(progress_of(&store), SubjectProgress::start());
    }

    #[tokio::test]
    async fn missing_question_is_marked_not_scored_silently() {
        let store = seeded_store(3);
        let engine = GradingEngine::new(store, EngineConfig::default());

        let mut sub = submission(TestMode::Assessment, 3, 0);
        sub.answers.push(SubmittedAnswer {
            question_id: 999,
            selected: Some(AnswerValue::Letter("A".to_string())),
            time_spent_seconds: None,
        });

        let result = engine.submit(sub).await.unwrap();
        let missing = result.outcomes.iter().find(|o| o.question_id == 999).unwrap();
        assert!(!missing.question_found);
        assert!(!missing.is_correct);
        assert_eq!(result.summary.total_questions, 4);
        assert_eq!(result.summary.correct_count, 3);
    }
}
