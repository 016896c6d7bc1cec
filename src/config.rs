// src/config.rs

use std::{env, fmt, path::PathBuf};

use dotenvy::dotenv;

/// Name of the cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "access_token";
/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Number of questions a generated quiz must contain.
pub const QUESTIONS_PER_QUIZ: usize = 10;
/// Number of options every generated question must offer.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Characters of the transcript the console runner prints before the quiz.
pub const TRANSCRIPT_PREVIEW_CHARS: usize = 500;

/// Where the authentication middleware looks for the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// HTTP-only cookie with the given name.
    Cookie(&'static str),
    /// `Authorization: Bearer <token>` header.
    BearerHeader,
}

/// Which backend turns audio into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriberKind {
    /// Locally installed Whisper model, driven through the `whisper` CLI.
    Whisper,
    /// Gemini file API: upload the audio and prompt for a transcript.
    Gemini,
}

#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Settings for the download -> transcribe -> generate pipeline.
/// Shared by the HTTP server and the console runner.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub audio_output_path: PathBuf,
    pub transcriber: TranscriberKind,
    pub whisper_model: String,
    pub yt_dlp_bin: String,
    pub whisper_bin: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds.
    pub refresh_token_ttl: u64,
    pub cookie_secure: bool,
    pub credential_source: CredentialSource,
    pub cors_origins: Vec<String>,
    pub bind_addr: String,
    pub rust_log: String,
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://quizly.db".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ConfigError("JWT_SECRET must be set".to_string()))?;

        let access_token_ttl = parse_var("ACCESS_TOKEN_TTL_SECS", 15 * 60)?;
        let refresh_token_ttl = parse_var("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60)?;
        let cookie_secure = parse_var("AUTH_COOKIE_SECURE", false)?;

        let credential_source = match env::var("AUTH_CREDENTIAL_SOURCE").as_deref() {
            Err(_) | Ok("cookie") => CredentialSource::Cookie(ACCESS_COOKIE),
            Ok("header") => CredentialSource::BearerHeader,
            Ok(other) => {
                return Err(ConfigError(format!(
                    "AUTH_CREDENTIAL_SOURCE must be 'cookie' or 'header', got '{}'",
                    other
                )));
            }
        };

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => [
                "http://localhost:5500",
                "http://127.0.0.1:5500",
                "http://localhost:3000",
                "http://127.0.0.1:3000",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            access_token_ttl,
            refresh_token_ttl,
            cookie_secure,
            credential_source,
            cors_origins,
            bind_addr,
            rust_log,
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());

        let transcriber = match env::var("TRANSCRIBER").as_deref() {
            Err(_) | Ok("whisper") => TranscriberKind::Whisper,
            Ok("gemini") => TranscriberKind::Gemini,
            Ok(other) => {
                return Err(ConfigError(format!(
                    "TRANSCRIBER must be 'whisper' or 'gemini', got '{}'",
                    other
                )));
            }
        };

        Ok(Self {
            gemini_api_key,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            audio_output_path: env::var("AUDIO_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("audio")),
            transcriber,
            whisper_model: env::var("WHISPER_MODEL").unwrap_or_else(|_| "base".to_string()),
            yt_dlp_bin: env::var("YT_DLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string()),
            whisper_bin: env::var("WHISPER_BIN").unwrap_or_else(|_| "whisper".to_string()),
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError(format!("{} has an invalid value: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}
