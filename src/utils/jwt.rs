// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, CredentialSource},
    error::AppError,
};

/// Distinguishes short-lived access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Issued-at as Unix timestamp.
    pub iat: usize,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
    /// Unique token id, the key of the refresh-token blacklist.
    pub jti: String,
    pub kind: TokenKind,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }
}

fn now_secs() -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize)
}

/// Signs a new JWT of the given kind for the user.
pub fn sign_jwt(
    user_id: i64,
    kind: TokenKind,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let now = now_secs()?;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + expiration_seconds as usize,
        jti: uuid::Uuid::new_v4().to_string(),
        kind,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies signature and expiry, then checks the token is of the expected kind.
pub fn verify_jwt(token: &str, secret: &str, expected: TokenKind) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid or expired token".to_string()))?;

    if token_data.claims.kind != expected {
        return Err(AppError::AuthError("Wrong token type".to_string()));
    }

    Ok(token_data.claims)
}

/// Finds the raw access token in the request, wherever `source` says it lives.
pub fn locate_token(headers: &HeaderMap, source: CredentialSource) -> Option<String> {
    match source {
        CredentialSource::Cookie(name) => CookieJar::from_headers(headers)
            .get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty()),
        CredentialSource::BearerHeader => headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(String::from),
    }
}

/// Axum Middleware: Authentication.
///
/// Validates the access token found through the configured `CredentialSource`
/// and injects its `Claims` into the request extensions. Otherwise 401.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = locate_token(req.headers(), config.credential_source).ok_or_else(|| {
        AppError::AuthError("Authentication credentials were not provided.".to_string())
    })?;

    let claims = verify_jwt(&token, &config.jwt_secret, TokenKind::Access)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
