// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

use super::question::Question;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,

    /// Owner. Never changes after creation, never exposed.
    #[serde(skip)]
    pub user_id: i64,

    pub title: String,

    pub description: String,

    /// The YouTube URL the quiz was generated from, as submitted.
    pub video_url: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A quiz with its questions in creation order, as returned by the API.
#[derive(Debug, Serialize)]
pub struct QuizResponse {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

/// DTO for `POST /api/createQuiz/`.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateQuizRequest {
    #[validate(
        length(min = 1, max = 2048, message = "Enter a valid URL."),
        custom(function = validate_youtube_url)
    )]
    pub url: String,
}

/// DTO for `PATCH /api/quizzes/{id}/`. Every other field is read-only.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters."))]
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Accepts only well-formed URLs that point at YouTube.
fn validate_youtube_url(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url").with_message("Enter a valid URL.".into()));
    }
    if !url.contains("youtube.com") && !url.contains("youtu.be") {
        return Err(validator::ValidationError::new("not_youtube")
            .with_message("URL must be a valid YouTube URL.".into()));
    }
    Ok(())
}
