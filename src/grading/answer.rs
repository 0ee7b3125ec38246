// src/grading/answer.rs

use serde::{Deserialize, Serialize};

/// A choice value as it appears in submissions and in the question bank.
///
/// Both the stored correct option and the submitted answer come in two
/// encodings: a zero-based option index, or a letter tag A-D. Instead of
/// type-sniffing at every comparison site, both are parsed into this union
/// once and normalized through [`AnswerValue::slot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Index(i64),
    Letter(String),
}

impl AnswerValue {
    /// Parses the TEXT answer column of the question bank ("2" or "C").
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(i) = raw.parse::<i64>() {
                return AnswerValue::Index(i);
            }
        }
        AnswerValue::Letter(raw.to_string())
    }

    /// Normalizes either encoding to an option slot.
    ///
    /// Letters map through the fixed ordering A=0, B=1, C=2, D=3. Anything
    /// outside {0..3}/{A..D} has no slot and can therefore never match; an
    /// out-of-range submission is incorrect, not an error.
    pub fn slot(&self) -> Option<usize> {
        match self {
            AnswerValue::Index(i) if (0..=3).contains(i) => Some(*i as usize),
            AnswerValue::Index(_) => None,
            AnswerValue::Letter(s) => {
                let s = s.trim();
                if s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty() {
                    let i = s.parse::<i64>().ok()?;
                    return (0..=3).contains(&i).then_some(i as usize);
                }
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => match c.to_ascii_uppercase() {
                        'A' => Some(0),
                        'B' => Some(1),
                        'C' => Some(2),
                        'D' => Some(3),
                        _ => None,
                    },
                    _ => None,
                }
            }
        }
    }
}

/// The grading-relevant slice of a stored question, fetched once per
/// submission and snapshotted into the attempt record.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    pub question_id: i64,
    pub content: String,
    pub answer: AnswerValue,
    pub explanation: Option<String>,
}

/// Per-question grading outcome.
///
/// Carries a text + explanation snapshot so a later edit or delete of the
/// question never invalidates historical attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: i64,
    pub question_text: Option<String>,
    pub selected: Option<AnswerValue>,
    pub correct: Option<AnswerValue>,
    pub is_correct: bool,
    pub answered: bool,
    /// False when the referenced question no longer exists. The answer is
    /// then scored as incorrect, with this explicit marker instead of a
    /// silent wrong-without-explanation entry.
    pub question_found: bool,
    pub explanation: Option<String>,
    pub time_spent_seconds: Option<i32>,
}

/// Grades one submitted value against its answer key.
///
/// Pure over its inputs; the caller owns all persistence.
pub fn grade(
    key: Option<&AnswerKey>,
    question_id: i64,
    selected: Option<&AnswerValue>,
    time_spent_seconds: Option<i32>,
) -> QuestionOutcome {
    let Some(key) = key else {
        return QuestionOutcome {
            question_id,
            question_text: None,
            selected: selected.cloned(),
            correct: None,
            is_correct: false,
            answered: selected.is_some(),
            question_found: false,
            explanation: None,
            time_spent_seconds,
        };
    };

    let is_correct = match (selected.and_then(AnswerValue::slot), key.answer.slot()) {
        (Some(sub), Some(ans)) => sub == ans,
        _ => false,
    };

    QuestionOutcome {
        question_id,
        question_text: Some(key.content.clone()),
        selected: selected.cloned(),
        correct: Some(key.answer.clone()),
        is_correct,
        answered: selected.is_some(),
        question_found: true,
        explanation: key.explanation.clone(),
        time_spent_seconds,
    }
}
