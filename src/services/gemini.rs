// src/services/gemini.rs

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{PipelineError, QuizDraft, QuizGenerator, Transcriber, draft};

const API_BASE: &str = "https://generativelanguage.googleapis.com";

const TRANSCRIBE_PROMPT: &str =
    "Transcribe this audio file. Provide only the transcript text, no explanations.";

/// A file stored through the Gemini file API.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

/// Thin REST client for the Gemini API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key,
            base_url: API_BASE.to_string(),
        }
    }

    /// Points the client at another host, e.g. a local stand-in for the API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_key(&self) -> Result<&str, PipelineError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| PipelineError::Generation("GEMINI_API_KEY not configured".to_string()))
    }

    /// Calls `generateContent` with the given parts and returns the reply text.
    pub async fn generate_text(&self, model: &str, parts: Vec<Value>) -> Result<String, PipelineError> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let body = json!({ "contents": [{ "parts": parts }] });

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Generation(format!(
                "Gemini API returned {}: {}",
                status, body
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;
        extract_text(&json)
    }

    /// Uploads a local file with the resumable upload protocol (start, then upload+finalize).
    pub async fn upload_file(&self, path: &Path) -> Result<UploadedFile, PipelineError> {
        let api_key = self.api_key()?;
        let bytes = tokio::fs::read(path).await?;
        let mime_type = audio_mime_type(path);
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        tracing::debug!("Uploading {} ({} bytes) to Gemini", path.display(), bytes.len());

        let start = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| PipelineError::Transcription(e.to_string()))?;

        if !start.status().is_success() {
            let status = start.status();
            let body = start.text().await.unwrap_or_default();
            return Err(PipelineError::Transcription(format!(
                "Gemini upload start returned {}: {}",
                status, body
            )));
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| {
                PipelineError::Transcription("Gemini did not return an upload URL".to_string())
            })?;

        let resp = self
            .http
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| PipelineError::Transcription(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Transcription(format!(
                "Gemini upload returned {}: {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::Transcription(e.to_string()))?;
        Ok(uploaded.file)
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response: &Value) -> Result<String, PipelineError> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            let reason = response
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            PipelineError::Generation(format!("Gemini returned no content ({})", reason))
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        return Err(PipelineError::Generation("Gemini returned empty text".to_string()));
    }
    Ok(text)
}

fn audio_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("webm") => "audio/webm",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Transcribes by uploading the audio and asking the model for the transcript.
pub struct GeminiTranscriber {
    client: GeminiClient,
    model: String,
}

impl GeminiTranscriber {
    pub fn new(client: GeminiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, PipelineError> {
        let file = self.client.upload_file(audio_path).await?;
        let parts = vec![
            json!({ "file_data": { "mime_type": file.mime_type, "file_uri": file.uri } }),
            json!({ "text": TRANSCRIBE_PROMPT }),
        ];
        self.client
            .generate_text(&self.model, parts)
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| match e {
                PipelineError::Generation(msg) => PipelineError::Transcription(msg),
                other => other,
            })
    }
}

pub struct GeminiQuizGenerator {
    client: GeminiClient,
    model: String,
}

impl GeminiQuizGenerator {
    pub fn new(client: GeminiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl QuizGenerator for GeminiQuizGenerator {
    async fn generate(&self, transcript: &str) -> Result<QuizDraft, PipelineError> {
        let prompt = draft::build_quiz_prompt(transcript);
        let reply = self
            .client
            .generate_text(&self.model, vec![json!({ "text": prompt })])
            .await?;
        draft::parse_quiz_draft(&reply)
    }
}
