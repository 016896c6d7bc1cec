// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Represents the 'questions' table in the database.
/// Questions are created together with their quiz and never edited afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    #[serde(skip)]
    pub quiz_id: i64,

    /// The text of the question.
    pub question_title: String,

    /// Exactly four distinct options.
    /// Stored as a JSON array in the database.
    pub question_options: Json<Vec<String>>,

    /// The correct option, verbatim.
    pub answer: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
