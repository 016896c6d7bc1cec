// tests/common/mod.rs

#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use quizly::{
    config::{Config, CredentialSource, PipelineConfig, TranscriberKind, ACCESS_COOKIE},
    routes,
    services::{
        AudioDownloader, DraftQuestion, PipelineError, QuizDraft, QuizGenerator, QuizPipeline,
        TempAudio, Transcriber,
    },
    state::AppState,
};
use reqwest::header::{COOKIE, SET_COOKIE};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

pub const PASSWORD: &str = "password123";

/// Writes a small file per download and counts invocations.
pub struct FakeDownloader {
    pub dir: PathBuf,
    pub calls: AtomicUsize,
}

#[async_trait]
impl AudioDownloader for FakeDownloader {
    async fn download(&self, url: &str) -> Result<TempAudio, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = quizly::services::youtube::extract_video_id(url);
        let path = self.dir.join(format!("{}.webm", id));
        std::fs::write(&path, b"fake audio")?;
        Ok(TempAudio::new(path))
    }
}

pub struct FakeTranscriber;

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, PipelineError> {
        Ok(format!("Transcript of {}", audio_path.display()))
    }
}

/// Returns `sample_draft()`, or fails when `fail` is set.
pub struct FakeGenerator {
    pub fail: bool,
}

#[async_trait]
impl QuizGenerator for FakeGenerator {
    async fn generate(&self, _transcript: &str) -> Result<QuizDraft, PipelineError> {
        if self.fail {
            return Err(PipelineError::MalformedQuiz(
                "reply is not valid quiz JSON".to_string(),
            ));
        }
        Ok(sample_draft())
    }
}

pub fn sample_draft() -> QuizDraft {
    QuizDraft {
        title: "Rust Basics".to_string(),
        description: "Ownership, borrowing and lifetimes.".to_string(),
        questions: (1..=10)
            .map(|i| DraftQuestion {
                question_title: format!("Question {}?", i),
                question_options: vec![
                    format!("{}a", i),
                    format!("{}b", i),
                    format!("{}c", i),
                    format!("{}d", i),
                ],
                answer: format!("{}b", i),
            })
            .collect(),
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub pool: SqlitePool,
    pub downloader: Arc<FakeDownloader>,
    pub audio_dir: PathBuf,
}

/// Spawns the app on a random port over an in-memory database.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(false).await
}

pub async fn spawn_app_with(failing_generator: bool) -> TestApp {
    // One connection that never expires, otherwise the in-memory database vanishes.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let audio_dir = std::env::temp_dir().join(format!("quizly-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&audio_dir).unwrap();

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        access_token_ttl: 600,
        refresh_token_ttl: 3600,
        cookie_secure: false,
        credential_source: CredentialSource::Cookie(ACCESS_COOKIE),
        cors_origins: vec!["http://localhost:5500".to_string()],
        bind_addr: "127.0.0.1:0".to_string(),
        rust_log: "error".to_string(),
        pipeline: PipelineConfig {
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            audio_output_path: audio_dir.clone(),
            transcriber: TranscriberKind::Whisper,
            whisper_model: "base".to_string(),
            yt_dlp_bin: "yt-dlp".to_string(),
            whisper_bin: "whisper".to_string(),
        },
    };

    let downloader = Arc::new(FakeDownloader {
        dir: audio_dir.clone(),
        calls: AtomicUsize::new(0),
    });
    let pipeline = QuizPipeline::new(
        downloader.clone(),
        Arc::new(FakeTranscriber),
        Arc::new(FakeGenerator {
            fail: failing_generator,
        }),
    );

    let state = AppState {
        pool: pool.clone(),
        config,
        pipeline: Arc::new(pipeline),
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        pool,
        downloader,
        audio_dir,
    }
}

/// name -> value for every cookie set by the response (removals included, with empty value).
pub fn set_cookies(response: &reqwest::Response) -> HashMap<String, String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn cookie_header(cookies: &HashMap<String, String>) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/register/"))
            .json(&serde_json::json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
                "confirmed_password": PASSWORD
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/login/"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Registers a fresh user, logs in, and returns the auth cookies.
    pub async fn signed_in_user(&self) -> HashMap<String, String> {
        let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
        assert_eq!(self.register(&username).await.status().as_u16(), 201);
        let response = self.login(&username, PASSWORD).await;
        assert_eq!(response.status().as_u16(), 200);
        set_cookies(&response)
    }

    pub async fn create_quiz(&self, cookies: &HashMap<String, String>, url: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/createQuiz/"))
            .header(COOKIE, cookie_header(cookies))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .expect("Failed to execute request")
    }
}
