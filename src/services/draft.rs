// src/services/draft.rs

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::PipelineError;
use crate::config::{OPTIONS_PER_QUESTION, QUESTIONS_PER_QUIZ};

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(?:json|JSON)?\s*").expect("valid regex"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```$").expect("valid regex"));

/// A generated quiz that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<DraftQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftQuestion {
    pub question_title: String,
    pub question_options: Vec<String>,
    pub answer: String,
}

impl QuizDraft {
    /// Checks the shape the prompt asks for: a title, exactly ten questions,
    /// four distinct options each, and an answer that is one of the options.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.title.trim().is_empty() {
            return Err(PipelineError::MalformedQuiz("title is empty".to_string()));
        }
        if self.questions.len() != QUESTIONS_PER_QUIZ {
            return Err(PipelineError::MalformedQuiz(format!(
                "expected {} questions, got {}",
                QUESTIONS_PER_QUIZ,
                self.questions.len()
            )));
        }
        for (i, q) in self.questions.iter().enumerate() {
            q.validate()
                .map_err(|msg| PipelineError::MalformedQuiz(format!("question {}: {}", i + 1, msg)))?;
        }
        Ok(())
    }
}

impl DraftQuestion {
    fn validate(&self) -> Result<(), String> {
        if self.question_title.trim().is_empty() {
            return Err("question title is empty".to_string());
        }
        if self.question_options.len() != OPTIONS_PER_QUESTION {
            return Err(format!(
                "expected {} options, got {}",
                OPTIONS_PER_QUESTION,
                self.question_options.len()
            ));
        }
        if self.question_options.iter().any(|o| o.trim().is_empty()) {
            return Err("an option is empty".to_string());
        }
        let distinct: HashSet<&str> = self.question_options.iter().map(String::as_str).collect();
        if distinct.len() != self.question_options.len() {
            return Err("options are not distinct".to_string());
        }
        if !self.question_options.contains(&self.answer) {
            return Err(format!("answer '{}' is not one of the options", self.answer));
        }
        Ok(())
    }
}

/// Strips a Markdown code fence wrapped around a model reply.
pub fn clean_json_response(text: &str) -> String {
    let text = LEADING_FENCE.replace(text.trim(), "");
    let text = TRAILING_FENCE.replace(&text, "");
    text.trim().to_string()
}

/// Turns a raw model reply into a validated draft.
pub fn parse_quiz_draft(raw: &str) -> Result<QuizDraft, PipelineError> {
    let cleaned = clean_json_response(raw);
    let draft: QuizDraft = serde_json::from_str(&cleaned)
        .map_err(|e| PipelineError::MalformedQuiz(format!("reply is not valid quiz JSON: {}", e)))?;
    draft.validate()?;
    Ok(draft)
}

/// Prompt sent to the model; the transcript goes last.
pub fn build_quiz_prompt(transcript: &str) -> String {
    format!(
        r#"Based on the following transcript, generate a quiz in valid JSON format.
The quiz must follow this exact structure:
{{
  "title": "Create a concise quiz title based on the topic of the transcript.",
  "description": "Summarize the transcript in no more than 150 characters. Do not include any quiz questions or answers.",
  "questions": [
    {{
      "question_title": "The question goes here.",
      "question_options": ["Option A", "Option B", "Option C", "Option D"],
      "answer": "The correct answer from the above options"
    }},
    ...
    (exactly {count} questions)
  ]
}}
Requirements:
- Each question must have exactly {options} distinct answer options.
- Only one correct answer is allowed per question, and it must be present in 'question_options'.
- The output must be valid JSON and parsable as-is.
- Do not include explanations, comments, or any text outside the JSON.

Transcript:
{transcript}
"#,
        count = QUESTIONS_PER_QUIZ,
        options = OPTIONS_PER_QUESTION,
        transcript = transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> serde_json::Value {
        let questions: Vec<_> = (1..=QUESTIONS_PER_QUIZ)
            .map(|i| {
                json!({
                    "question_title": format!("Question {}?", i),
                    "question_options": ["Alpha", "Beta", "Gamma", "Delta"],
                    "answer": "Gamma"
                })
            })
            .collect();
        json!({
            "title": "Rust Ownership",
            "description": "Borrowing and moves in a nutshell.",
            "questions": questions
        })
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(clean_json_response("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_bare_fence_and_whitespace() {
        assert_eq!(clean_json_response("  ```\n[1, 2]\n```  \n"), "[1, 2]");
        assert_eq!(clean_json_response("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn parses_fenced_reply() {
        let raw = format!("```json\n{}\n```", sample_json());
        let draft = parse_quiz_draft(&raw).unwrap();
        assert_eq!(draft.title, "Rust Ownership");
        assert_eq!(draft.questions.len(), QUESTIONS_PER_QUIZ);
        assert_eq!(draft.questions[0].answer, "Gamma");
    }

    #[test]
    fn prose_reply_is_malformed() {
        let err = parse_quiz_draft("Sure! Here is your quiz.").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedQuiz(_)));
    }

    #[test]
    fn too_few_questions_is_rejected() {
        let mut value = sample_json();
        value["questions"].as_array_mut().unwrap().truncate(7);
        let err = parse_quiz_draft(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("expected 10 questions, got 7"));
    }

    #[test]
    fn answer_must_be_an_option() {
        let mut value = sample_json();
        value["questions"][3]["answer"] = json!("Omega");
        let err = parse_quiz_draft(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("question 4"));
    }

    #[test]
    fn duplicate_options_are_rejected() {
        let mut value = sample_json();
        value["questions"][0]["question_options"] = json!(["Alpha", "Alpha", "Gamma", "Delta"]);
        let err = parse_quiz_draft(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("not distinct"));
    }

    #[test]
    fn missing_description_defaults_to_empty() {
        let mut value = sample_json();
        value.as_object_mut().unwrap().remove("description");
        let draft = parse_quiz_draft(&value.to_string()).unwrap();
        assert!(draft.description.is_empty());
    }

    #[test]
    fn prompt_embeds_transcript_last() {
        let prompt = build_quiz_prompt("the borrow checker is your friend");
        assert!(prompt.trim_end().ends_with("the borrow checker is your friend"));
        assert!(prompt.contains("exactly 10 questions"));
    }
}
