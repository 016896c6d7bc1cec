// src/services/youtube.rs

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tokio::process::Command;

use super::{AudioDownloader, PipelineError, TempAudio};

/// Best-effort video ID from a YouTube URL.
///
/// `watch?v=<id>&...` and `youtu.be/<id>?...` are recognised; anything else comes back unchanged.
pub fn extract_video_id(url: &str) -> &str {
    if let Some((_, rest)) = url.split_once("v=") {
        rest.split('&').next().unwrap_or(rest)
    } else if let Some((_, rest)) = url.split_once("youtu.be/") {
        rest.split('?').next().unwrap_or(rest)
    } else {
        url
    }
}

/// Canonical watch URL for a video ID.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// File stem safe to use as a single path component.
fn file_stem(video_id: &str) -> String {
    video_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Downloads best-available audio through the `yt-dlp` executable.
pub struct YtDlpDownloader {
    binary: String,
    output_dir: PathBuf,
}

impl YtDlpDownloader {
    pub fn new(binary: &str, output_dir: &Path) -> Self {
        Self {
            binary: binary.to_string(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Runs yt-dlp with the given output template and returns the reported file path.
    async fn fetch(&self, source: &str, template: &Path) -> Result<PathBuf, PipelineError> {
        tracing::debug!("Downloading audio via yt-dlp: {}", source);

        let output = Command::new(&self.binary)
            .arg("--format")
            .arg("bestaudio/best")
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--output")
            .arg(template)
            .arg(source)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PipelineError::Download(format!("'{}' not found on PATH", self.binary))
                } else {
                    PipelineError::Download(format!("failed to run {}: {}", self.binary, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Download(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| PipelineError::Download("yt-dlp did not report a file".to_string()))?;

        if !path.exists() {
            return Err(PipelineError::Download(format!(
                "yt-dlp did not produce expected output file: {}",
                path.display()
            )));
        }

        Ok(path)
    }
}

#[async_trait]
impl AudioDownloader for YtDlpDownloader {
    async fn download(&self, url: &str) -> Result<TempAudio, PipelineError> {
        let video_id = extract_video_id(url);
        // Without a recognisable ID the original URL is handed to yt-dlp as-is.
        let source = if video_id == url {
            url.to_string()
        } else {
            watch_url(video_id)
        };

        // Each request gets its own directory, even for the same video.
        let request_dir = self.output_dir.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&request_dir).await?;
        let template = request_dir.join(format!("{}.%(ext)s", file_stem(video_id)));

        match self.fetch(&source, &template).await {
            Ok(path) => Ok(TempAudio::in_scratch_dir(request_dir, path)),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_dir_all(&request_dir).await {
                    tracing::warn!(
                        "Failed to remove {}: {}",
                        request_dir.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }
}
