// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::grading::answer::AnswerValue;
use crate::models::subject::Subject;

/// Difficulty tag for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "difficulty", rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub subject: Subject,

    /// Topic identifier within the subject (e.g., "thermodynamics").
    pub topic: String,

    /// The text content of the question.
    pub content: String,

    /// Ordered list of 2-4 option strings, stored as a JSONB array.
    pub options: Json<Vec<String>>,

    /// The correct option, encoded as either a zero-based index ("2") or a
    /// letter tag ("C"). Validated on create/update to resolve to a slot
    /// within `options`.
    pub answer: String,

    /// Explanation shown after grading.
    pub explanation: Option<String>,

    pub difficulty: Difficulty,

    pub image_url: Option<String>,

    /// Time allocation in seconds.
    pub time_seconds: i32,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a question to the client (excludes answer and
/// explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub subject: Subject,
    pub topic: String,
    pub content: String,
    pub options: Json<Vec<String>>,
    pub difficulty: Difficulty,
    pub image_url: Option<String>,
    pub time_seconds: i32,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            subject: q.subject,
            topic: q.topic,
            content: q.content,
            options: q.options,
            difficulty: q.difficulty,
            image_url: q.image_url,
            time_seconds: q.time_seconds,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub subject: Subject,
    #[validate(length(min = 1, max = 100))]
    pub topic: String,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 10))]
    pub answer: String,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
    pub difficulty: Difficulty,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
    pub time_seconds: Option<i32>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub subject: Option<Subject>,
    pub topic: Option<String>,
    pub content: Option<String>,
    pub options: Option<Vec<String>>,
    pub answer: Option<String>,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub image_url: Option<String>,
    pub time_seconds: Option<i32>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if !(2..=4).contains(&options.len()) {
        return Err(validator::ValidationError::new("options_must_have_2_to_4_entries"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length_invalid"));
        }
    }
    Ok(())
}

/// Checks that an answer encoding resolves to a slot inside the options
/// list. Applied on create and update so the bank never holds a dangling
/// correct-option reference.
pub fn answer_in_options(answer: &str, option_count: usize) -> bool {
    match AnswerValue::parse(answer).slot() {
        Some(slot) => slot < option_count,
        None => false,
    }
}
