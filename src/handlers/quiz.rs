// src/handlers/quiz.rs

use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{SqlitePool, types::Json as DbJson};
use validator::Validate;

use crate::{
    error::AppError,
    extract::AppJson,
    models::{
        question::Question,
        quiz::{CreateQuizRequest, Quiz, QuizResponse, UpdateQuizRequest},
    },
    services::{QuizDraft, QuizPipeline},
    utils::{html::clean_html, jwt::Claims},
};

const QUIZ_COLUMNS: &str = "id, user_id, title, description, video_url, created_at, updated_at";
const QUESTION_COLUMNS: &str =
    "id, quiz_id, question_title, question_options, answer, created_at, updated_at";

/// Generates a quiz from a YouTube URL and stores it for the caller.
///
/// * Rejects non-YouTube URLs before anything is downloaded.
/// * Runs download -> transcribe -> generate in the request task.
/// * Persists the quiz and its questions in a single transaction.
///
/// Any pipeline failure is returned as 400 with the error text.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    State(pipeline): State<Arc<QuizPipeline>>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    tracing::info!("User {} requested a quiz for {}", user_id, payload.url);

    let draft = pipeline.run(&payload.url).await?;
    let quiz_id = save_quiz(&pool, user_id, &payload.url, &draft).await?;
    let quiz = load_quiz(&pool, quiz_id).await?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Lists the caller's quizzes, newest first, each with its questions.
pub async fn list_quizzes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let quizzes = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {} FROM quizzes WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        QUIZ_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let questions = sqlx::query_as::<_, Question>(
        "SELECT q.id, q.quiz_id, q.question_title, q.question_options, q.answer, q.created_at, q.updated_at
         FROM questions q
         JOIN quizzes z ON q.quiz_id = z.id
         WHERE z.user_id = ?
         ORDER BY q.id",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let mut by_quiz: HashMap<i64, Vec<Question>> = HashMap::new();
    for question in questions {
        by_quiz.entry(question.quiz_id).or_default().push(question);
    }

    let response: Vec<QuizResponse> = quizzes
        .into_iter()
        .map(|quiz| QuizResponse {
            questions: by_quiz.remove(&quiz.id).unwrap_or_default(),
            quiz,
        })
        .collect();

    Ok(Json(response))
}

pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_owned_quiz(&pool, id, claims.user_id()?).await?;
    let questions = questions_for(&pool, quiz.id).await?;

    Ok(Json(QuizResponse { quiz, questions }))
}

/// Updates title and/or description. Other fields in the body are ignored.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    payload: Result<AppJson<UpdateQuizRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_owned_quiz(&pool, id, claims.user_id()?).await?;
    let AppJson(payload) = payload?;
    payload.validate()?;

    let title = payload.title.as_deref().map(clean_html);
    let description = payload.description.as_deref().map(clean_html);

    if title.is_some() || description.is_some() {
        sqlx::query(
            "UPDATE quizzes
             SET title = COALESCE(?, title),
                 description = COALESCE(?, description),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(Utc::now())
        .bind(quiz.id)
        .execute(&pool)
        .await?;
    }

    Ok(Json(load_quiz(&pool, quiz.id).await?))
}

/// Deletes the quiz; its questions go with it (ON DELETE CASCADE).
pub async fn delete_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_owned_quiz(&pool, id, claims.user_id()?).await?;

    sqlx::query("DELETE FROM quizzes WHERE id = ?")
        .bind(quiz.id)
        .execute(&pool)
        .await?;

    tracing::info!("Quiz {} deleted", quiz.id);

    Ok(StatusCode::NO_CONTENT)
}

/// 404 if the quiz does not exist, 403 if it belongs to someone else.
async fn find_owned_quiz(pool: &SqlitePool, id: i64, user_id: i64) -> Result<Quiz, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {} FROM quizzes WHERE id = ?",
        QUIZ_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found.".to_string()))?;

    if quiz.user_id != user_id {
        return Err(AppError::Forbidden(
            "You do not have permission to access this quiz.".to_string(),
        ));
    }

    Ok(quiz)
}

async fn questions_for(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {} FROM questions WHERE quiz_id = ? ORDER BY id",
        QUESTION_COLUMNS
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

async fn load_quiz(pool: &SqlitePool, id: i64) -> Result<QuizResponse, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {} FROM quizzes WHERE id = ?",
        QUIZ_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found.".to_string()))?;

    let questions = questions_for(pool, quiz.id).await?;
    Ok(QuizResponse { quiz, questions })
}

/// Inserts the quiz and all its questions atomically.
async fn save_quiz(
    pool: &SqlitePool,
    user_id: i64,
    video_url: &str,
    draft: &QuizDraft,
) -> Result<i64, AppError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let quiz_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO quizzes (user_id, title, description, video_url, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(user_id)
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(video_url)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    for question in &draft.questions {
        sqlx::query(
            "INSERT INTO questions (quiz_id, question_title, question_options, answer, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(quiz_id)
        .bind(&question.question_title)
        .bind(DbJson(question.question_options.clone()))
        .bind(&question.answer)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Quiz {} saved for user {} with {} questions",
        quiz_id,
        user_id,
        draft.questions.len()
    );

    Ok(quiz_id)
}
