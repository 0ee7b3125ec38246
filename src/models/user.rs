// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::subject::Subject;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique login name.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// Display name.
    pub full_name: Option<String>,

    /// Institution label (school/coaching centre).
    pub institution: Option<String>,

    /// User role: 'student' or 'admin'.
    pub role: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One row of the per-subject progression map.
#[derive(Debug, Serialize, FromRow)]
pub struct SubjectProgressEntry {
    pub subject: Subject,
    pub stage: i32,
    pub level: i32,
}

/// One row of the per-subject-per-topic progress map.
#[derive(Debug, Serialize, FromRow)]
pub struct TopicProgressEntry {
    pub subject: Subject,
    pub topic: String,
    pub best_score: i32,
    pub completed: bool,
    pub attempts: i32,
    pub last_attempt_at: chrono::DateTime<chrono::Utc>,
}

/// Aggregated profile data for the current user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub institution: Option<String>,
    pub role: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub progression: Vec<SubjectProgressEntry>,
    pub topics: Vec<TopicProgressEntry>,
    /// Derived from the attempt history, never stored authoritatively.
    pub total_points: i64,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
    #[validate(length(max = 200))]
    pub institution: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
