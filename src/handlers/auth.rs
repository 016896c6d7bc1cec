// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use chrono::{TimeZone, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::{Config, REFRESH_COOKIE},
    error::{AppError, FieldErrors},
    extract::AppJson,
    models::user::{LoginRequest, RegisterRequest, User, UserResponse},
    utils::{
        cookies::{clear_auth_cookies, set_access_cookie, set_auth_cookies},
        hash::{hash_password, verify_password},
        jwt::{Claims, TokenKind, sign_jwt, verify_jwt},
    },
};

/// Registers a new user.
///
/// Field errors (including a taken username or email and mismatching passwords)
/// are collected and returned together as 400.
pub async fn register(
    State(pool): State<SqlitePool>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut errors = match payload.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => match AppError::from(e) {
            AppError::Validation(fields) => fields,
            other => return Err(other),
        },
    };

    if payload.password != payload.confirmed_password {
        errors
            .entry("confirmed_password".to_string())
            .or_default()
            .push("Passwords do not match.".to_string());
    }

    let username_taken =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(&payload.username)
            .fetch_one(&pool)
            .await?
            > 0;
    if username_taken {
        errors
            .entry("username".to_string())
            .or_default()
            .push("A user with that username already exists.".to_string());
    }

    let email_taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&payload.email)
        .fetch_one(&pool)
        .await?
        > 0;
    if email_taken {
        errors
            .entry("email".to_string())
            .or_default()
            .push("A user with that email already exists.".to_string());
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let hashed_password = hash_password(&payload.password)?;

    sqlx::query("INSERT INTO users (username, email, password, created_at) VALUES (?, ?, ?, ?)")
        .bind(&payload.username)
        .bind(&payload.email)
        .bind(&hashed_password)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .map_err(|e| {
            // Lost a race with a concurrent registration
            if e.to_string().contains("UNIQUE constraint failed") {
                AppError::field("username", "A user with that username or email already exists.")
            } else {
                tracing::error!("Failed to register user: {:?}", e);
                AppError::from(e)
            }
        })?;

    tracing::info!("Registered user '{}'", payload.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "detail": "User created successfully!" })),
    ))
}

/// Authenticates a user and sets the `access_token` and `refresh_token` cookies.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    jar: CookieJar,
    payload: Result<AppJson<LoginRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let invalid = || AppError::AuthError("Invalid credentials.".to_string());

    // An unreadable body is just another failed login.
    let AppJson(payload) = payload.map_err(|_| invalid())?;
    payload.validate().map_err(|_| invalid())?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password, created_at FROM users WHERE username = ?",
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    let access = sign_jwt(
        user.id,
        TokenKind::Access,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;
    let refresh = sign_jwt(
        user.id,
        TokenKind::Refresh,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    let jar = set_auth_cookies(jar, access, refresh, config.cookie_secure);

    Ok((
        jar,
        Json(json!({
            "detail": "Login successfully!",
            "user": UserResponse::from(user),
        })),
    ))
}

/// Blacklists the refresh token (if any) and clears both cookies.
/// A refresh cookie that is already invalid is ignored.
pub async fn logout(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        match verify_jwt(cookie.value(), &config.jwt_secret, TokenKind::Refresh) {
            Ok(refresh) => {
                if let Err(e) = blacklist(&pool, &refresh).await {
                    tracing::warn!("Failed to blacklist refresh token: {:?}", e);
                }
            }
            Err(_) => tracing::debug!("Ignoring invalid refresh cookie on logout"),
        }
    }

    tracing::info!("User {} logged out", claims.sub);

    Ok((
        clear_auth_cookies(jar),
        Json(json!({
            "detail": "Log-Out successfully! All Tokens will be deleted. Refresh token is now invalid."
        })),
    ))
}

/// Issues a new access cookie from a valid, non-blacklisted refresh cookie.
pub async fn refresh_token(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let raw = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::AuthError("Refresh token not found.".to_string()))?;

    let invalid = || AppError::AuthError("Invalid or expired refresh token.".to_string());

    let claims = verify_jwt(&raw, &config.jwt_secret, TokenKind::Refresh).map_err(|_| invalid())?;

    if is_blacklisted(&pool, &claims.jti).await? {
        return Err(invalid());
    }

    let access = sign_jwt(
        claims.user_id()?,
        TokenKind::Access,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;

    let jar = set_access_cookie(jar, access.clone(), config.cookie_secure);

    Ok((
        jar,
        Json(json!({
            "detail": "Token refreshed",
            "access": access,
        })),
    ))
}

async fn blacklist(pool: &SqlitePool, claims: &Claims) -> Result<(), AppError> {
    let now = Utc::now();
    let expires_at = Utc
        .timestamp_opt(claims.exp as i64, 0)
        .single()
        .unwrap_or(now);

    sqlx::query(
        "INSERT OR IGNORE INTO token_blacklist (jti, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&claims.jti)
    .bind(claims.user_id()?)
    .bind(expires_at)
    .bind(now)
    .execute(pool)
    .await?;

    // Expired tokens are rejected on their own; no need to remember them.
    sqlx::query("DELETE FROM token_blacklist WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(())
}

async fn is_blacklisted(pool: &SqlitePool, jti: &str) -> Result<bool, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM token_blacklist WHERE jti = ?")
        .bind(jti)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}
