// src/services/whisper.rs

use std::{path::Path, process::Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use super::{PipelineError, Transcriber};

/// Runs a locally installed Whisper model through the `whisper` CLI.
///
/// Requires ffmpeg on PATH, as Whisper decodes audio through it.
pub struct WhisperCliTranscriber {
    binary: String,
    model: String,
}

impl WhisperCliTranscriber {
    pub fn new(binary: &str, model: &str) -> Self {
        Self {
            binary: binary.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, PipelineError> {
        let out_dir = std::env::temp_dir().join(format!("quizly-whisper-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&out_dir).await?;

        tracing::debug!(
            "Transcribing {} with whisper model '{}'",
            audio_path.display(),
            self.model
        );

        let result = Command::new(&self.binary)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_format")
            .arg("txt")
            .arg("--output_dir")
            .arg(&out_dir)
            .arg("--fp16")
            .arg("False")
            .arg("--verbose")
            .arg("False")
            .stdin(Stdio::null())
            .output()
            .await;

        let transcript = match result {
            Ok(output) if output.status.success() => {
                let stem = audio_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                tokio::fs::read_to_string(out_dir.join(format!("{}.txt", stem)))
                    .await
                    .map(|text| text.trim().to_string())
                    .map_err(|e| {
                        PipelineError::Transcription(format!("whisper produced no transcript: {}", e))
                    })
            }
            Ok(output) => Err(PipelineError::Transcription(format!(
                "whisper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                PipelineError::Transcription(format!("'{}' not found on PATH", self.binary)),
            ),
            Err(e) => Err(PipelineError::Transcription(format!(
                "failed to run {}: {}",
                self.binary, e
            ))),
        };

        if let Err(e) = tokio::fs::remove_dir_all(&out_dir).await {
            tracing::warn!("Failed to remove {}: {}", out_dir.display(), e);
        }

        transcript
    }
}
