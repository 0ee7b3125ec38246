// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::user::{MeResponse, SubjectProgressEntry, TopicProgressEntry, User},
    utils::jwt::Claims,
};

/// Get current user's profile: account data, per-subject (stage, level)
/// progression, per-topic progress, and the derived point total.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let user: User = sqlx::query_as(
        r#"
        SELECT id, username, password, full_name, institution, role, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let progression: Vec<SubjectProgressEntry> = sqlx::query_as(
        "SELECT subject, stage, level FROM subject_progress WHERE user_id = $1 ORDER BY subject",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let topics: Vec<TopicProgressEntry> = sqlx::query_as(
        r#"
        SELECT subject, topic, best_score, completed, attempts, last_attempt_at
        FROM topic_progress
        WHERE user_id = $1
        ORDER BY subject, topic
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    // Derived, never stored: the attempt log is the authority.
    let total_points: Option<i64> =
        sqlx::query_scalar("SELECT SUM(score_percentage) FROM test_attempts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

    Ok(Json(MeResponse {
        id: user.id,
        username: user.username,
        full_name: user.full_name,
        institution: user.institution,
        role: user.role,
        created_at: user.created_at,
        progression,
        topics,
        total_points: total_points.unwrap_or(0),
    }))
}
