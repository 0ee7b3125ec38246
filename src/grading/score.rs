// src/grading/score.rs

use serde::{Deserialize, Serialize};

use super::answer::QuestionOutcome;

/// Points awarded per correct answer under negative marking.
const NEGATIVE_MARKING_REWARD: i32 = 4;
/// Points deducted per incorrect answer under negative marking.
const NEGATIVE_MARKING_PENALTY: i32 = 1;

/// Scoring regime for a submission.
///
/// Topic practice and assessment tests use plain percentage-of-correct; one
/// legacy submission path uses +4/−1 negative marking normalized against the
/// maximum possible score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMode {
    Percentage,
    NegativeMarking,
}

impl Default for ScoringMode {
    fn default() -> Self {
        ScoringMode::Percentage
    }
}

/// Aggregated result of a graded submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub total_questions: i32,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub unanswered_count: i32,
    /// Points earned under the active scoring mode (equals `correct_count`
    /// in percentage mode).
    pub raw_score: i32,
    /// Maximum attainable points under the active scoring mode.
    pub max_score: i32,
    pub score_percentage: i32,
    pub passed: bool,
}

/// Turns per-question outcomes into counts, a percentage, and a pass/fail
/// decision.
///
/// An empty outcome list yields a defined zero-state result (0%, not passed)
/// rather than dividing by zero. The pass threshold is supplied by the
/// caller, not hardcoded here.
pub fn aggregate(outcomes: &[QuestionOutcome], mode: ScoringMode, pass_threshold: i32) -> ScoreSummary {
    let total = outcomes.len() as i32;
    let correct = outcomes.iter().filter(|o| o.is_correct).count() as i32;
    let unanswered = outcomes.iter().filter(|o| !o.answered).count() as i32;
    let incorrect = total - correct - unanswered;

    let (raw_score, max_score) = match mode {
        ScoringMode::Percentage => (correct, total),
        ScoringMode::NegativeMarking => {
            // Unanswered questions are neither rewarded nor penalized. A net
            // negative total clamps to zero before normalization.
            let raw = NEGATIVE_MARKING_REWARD * correct - NEGATIVE_MARKING_PENALTY * incorrect;
            (raw.max(0), NEGATIVE_MARKING_REWARD * total)
        }
    };

    let score_percentage = if max_score == 0 {
        0
    } else {
        ((100.0 * raw_score as f64) / max_score as f64).round() as i32
    };

    ScoreSummary {
        total_questions: total,
        correct_count: correct,
        incorrect_count: incorrect,
        unanswered_count: unanswered,
        raw_score,
        max_score,
        score_percentage,
        passed: total > 0 && score_percentage >= pass_threshold,
    }
}
