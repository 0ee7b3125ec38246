// src/handlers/tests.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    db::PgStore,
    error::AppError,
    grading::engine::{EngineConfig, GradingEngine, Submission},
    models::{
        attempt::{LeaderboardEntry, SubmitTestRequest, TestAttempt},
        question::{PublicQuestion, Question},
        subject::Subject,
    },
    state::AppState,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct PaperParams {
    pub subject: Subject,
    pub topic: Option<String>,
    pub count: Option<i64>,
}

/// Generates a random question paper for a subject (optionally narrowed to
/// one topic). Correct answers and explanations are stripped by the public
/// DTO.
pub async fn generate_paper(
    State(pool): State<PgPool>,
    Query(params): Query<PaperParams>,
) -> Result<impl IntoResponse, AppError> {
    let count = params.count.unwrap_or(10).clamp(1, 50);

    let questions: Vec<Question> = sqlx::query_as(
        r#"
        SELECT id, subject, topic, content, options, answer, explanation,
               difficulty, image_url, time_seconds, created_at
        FROM questions
        WHERE subject = $1 AND ($2::TEXT IS NULL OR topic = $2)
        ORDER BY RANDOM()
        LIMIT $3
        "#,
    )
    .bind(params.subject)
    .bind(&params.topic)
    .bind(count)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch paper questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let paper: Vec<PublicQuestion> = questions.into_iter().map(Into::into).collect();

    Ok(Json(paper))
}

/// Submits a completed test and runs the full grading flow.
///
/// * Grades every answer against the stored question bank.
/// * Records the attempt append-only (idempotent on the attempt key).
/// * Advances (stage, level) on a pass for assessment/legacy modes.
/// * Folds the score into the per-topic record for practice/assessment.
///
/// The score is returned even when a bookkeeping write fails; the
/// `attempt_recorded`/`progression_applied`/`topic_recorded` flags tell the
/// client what was durably applied.
pub async fn submit_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let engine = GradingEngine::new(
        PgStore::new(state.pool.clone()),
        EngineConfig {
            pass_threshold: state.config.pass_threshold,
            completion_threshold: state.config.completion_threshold,
            ..EngineConfig::default()
        },
    );

    let result = engine
        .submit(Submission {
            user_id: claims.user_id(),
            subject: payload.subject,
            mode: payload.mode,
            topic: payload.topic,
            scoring_mode: payload.scoring_mode,
            answers: payload.answers,
            total_time_seconds: payload.total_time_seconds.unwrap_or(0),
            attempt_key: payload.attempt_key,
        })
        .await?;

    Ok(Json(json!({
        "total_questions": result.summary.total_questions,
        "correct_count": result.summary.correct_count,
        "incorrect_count": result.summary.incorrect_count,
        "unanswered_count": result.summary.unanswered_count,
        "raw_score": result.summary.raw_score,
        "max_score": result.summary.max_score,
        "score_percentage": result.summary.score_percentage,
        "passed": result.summary.passed,
        "per_question_results": result.outcomes,
        "progression": result.progression,
        "attempt_id": result.attempt_id,
        "duplicate": result.duplicate,
        "attempt_recorded": result.attempt_recorded,
        "progression_applied": result.progression_applied,
        "topic_recorded": result.topic_recorded,
    })))
}

/// Lists the current user's attempt history, newest first.
///
/// Scores are recomputed from the outcome snapshot when the stored value is
/// missing (legacy rows persisted a zero).
pub async fn get_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let attempts: Vec<TestAttempt> = sqlx::query_as(
        r#"
        SELECT id, user_id, subject, mode, topic, attempt_key, outcomes,
               correct_count, incorrect_count, unanswered_count,
               score_percentage, passed, total_time_seconds, created_at
        FROM test_attempts
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 50
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch history: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let history: Vec<serde_json::Value> = attempts
        .into_iter()
        .map(|a| {
            let score = a.effective_score();
            json!({
                "id": a.id,
                "subject": a.subject,
                "mode": a.mode,
                "topic": a.topic,
                "correct_count": a.correct_count,
                "incorrect_count": a.incorrect_count,
                "unanswered_count": a.unanswered_count,
                "score_percentage": score,
                "passed": a.passed,
                "total_time_seconds": a.total_time_seconds,
                "outcomes": a.outcomes,
                "created_at": a.created_at,
            })
        })
        .collect();

    Ok(Json(history))
}

/// Retrieves the top 10 students by best attempt score.
pub async fn get_leaderboard(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let leaderboard: Vec<LeaderboardEntry> = sqlx::query_as(
        r#"
        SELECT u.username, MAX(a.score_percentage) AS best_score, COUNT(a.id) AS attempts
        FROM test_attempts a
        JOIN users u ON a.user_id = u.id
        GROUP BY u.username
        ORDER BY best_score DESC
        LIMIT 10
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(leaderboard))
}
