// src/services/mod.rs

//! The quiz pipeline: download audio, transcribe it, generate a quiz draft.
//!
//! Each stage sits behind a trait so the HTTP handlers and the console runner receive
//! concrete implementations from the caller, and tests can swap in fakes.

pub mod draft;
pub mod gemini;
pub mod whisper;
pub mod youtube;

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;

use crate::config::{PipelineConfig, TranscriberKind};

pub use draft::{DraftQuestion, QuizDraft};

/// Failure of any pipeline stage.
#[derive(Debug)]
pub enum PipelineError {
    Download(String),
    Transcription(String),
    Generation(String),
    /// The model replied, but not with a usable quiz.
    MalformedQuiz(String),
    Io(std::io::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Download(msg) => write!(f, "audio download failed: {}", msg),
            PipelineError::Transcription(msg) => write!(f, "transcription failed: {}", msg),
            PipelineError::Generation(msg) => write!(f, "quiz generation failed: {}", msg),
            PipelineError::MalformedQuiz(msg) => write!(f, "malformed quiz: {}", msg),
            PipelineError::Io(err) => write!(f, "i/o error: {}", err),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

/// A downloaded audio file that is removed from disk when dropped.
///
/// When the file sits in a per-request scratch directory, the whole directory goes.
#[derive(Debug)]
pub struct TempAudio {
    path: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl TempAudio {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch_dir: None,
        }
    }

    pub fn in_scratch_dir(dir: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch_dir: Some(dir.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        let (target, result) = match &self.scratch_dir {
            Some(dir) => (dir, std::fs::remove_dir_all(dir)),
            None => (&self.path, std::fs::remove_file(&self.path)),
        };
        match result {
            Ok(()) => tracing::debug!("Removed temporary audio {}", target.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove temporary audio {}: {}",
                target.display(),
                e
            ),
        }
    }
}

#[async_trait]
pub trait AudioDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<TempAudio, PipelineError>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, PipelineError>;
}

#[async_trait]
pub trait QuizGenerator: Send + Sync {
    async fn generate(&self, transcript: &str) -> Result<QuizDraft, PipelineError>;
}

/// Download -> transcribe -> generate, strictly in sequence, no retries.
#[derive(Clone)]
pub struct QuizPipeline {
    downloader: Arc<dyn AudioDownloader>,
    transcriber: Arc<dyn Transcriber>,
    generator: Arc<dyn QuizGenerator>,
}

impl QuizPipeline {
    pub fn new(
        downloader: Arc<dyn AudioDownloader>,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn QuizGenerator>,
    ) -> Self {
        Self {
            downloader,
            transcriber,
            generator,
        }
    }

    /// Wires up yt-dlp, the configured transcriber and the Gemini generator.
    pub fn from_config(config: &PipelineConfig, http: reqwest::Client) -> Self {
        let gemini = gemini::GeminiClient::new(http, config.gemini_api_key.clone());

        let transcriber: Arc<dyn Transcriber> = match config.transcriber {
            TranscriberKind::Whisper => Arc::new(whisper::WhisperCliTranscriber::new(
                &config.whisper_bin,
                &config.whisper_model,
            )),
            TranscriberKind::Gemini => Arc::new(gemini::GeminiTranscriber::new(
                gemini.clone(),
                &config.gemini_model,
            )),
        };

        Self::new(
            Arc::new(youtube::YtDlpDownloader::new(
                &config.yt_dlp_bin,
                &config.audio_output_path,
            )),
            transcriber,
            Arc::new(gemini::GeminiQuizGenerator::new(gemini, &config.gemini_model)),
        )
    }

    /// Downloads and transcribes `url`. The audio file is gone once this returns.
    pub async fn transcript(&self, url: &str) -> Result<String, PipelineError> {
        let audio = self.downloader.download(url).await?;
        tracing::info!("Audio downloaded to {}", audio.path().display());

        let transcript = self.transcriber.transcribe(audio.path()).await?;
        tracing::info!("Transcription finished ({} chars)", transcript.len());

        Ok(transcript)
    }

    pub async fn generate(&self, transcript: &str) -> Result<QuizDraft, PipelineError> {
        let draft = self.generator.generate(transcript).await?;
        tracing::info!(
            "Quiz '{}' generated with {} questions",
            draft.title,
            draft.questions.len()
        );
        Ok(draft)
    }

    /// Runs the whole pipeline for one URL.
    pub async fn run(&self, url: &str) -> Result<QuizDraft, PipelineError> {
        let transcript = self.transcript(url).await?;
        self.generate(&transcript).await
    }
}
