// tests/auth_tests.rs

mod common;

use common::{PASSWORD, cookie_header, set_cookies, spawn_app};
use reqwest::header::COOKIE;

#[tokio::test]
async fn unknown_route_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works_once() {
    let app = spawn_app().await;

    let first = app.register("alice").await;
    assert_eq!(first.status().as_u16(), 201);

    let second = app.register("alice").await;
    assert_eq!(second.status().as_u16(), 400);
    let body: serde_json::Value = second.json().await.unwrap();
    assert!(body["username"].is_array(), "expected a username error: {}", body);
    assert!(body["email"].is_array(), "expected an email error: {}", body);
}

#[tokio::test]
async fn register_rejects_mismatched_passwords() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/register/"))
        .json(&serde_json::json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "password123",
            "confirmed_password": "password321"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["confirmed_password"][0], "Passwords do not match.");
}

#[tokio::test]
async fn register_reports_missing_and_invalid_fields() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/register/"))
        .json(&serde_json::json!({ "email": "not-an-email", "password": "123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["username"].is_array());
    assert!(body["email"].is_array());
    assert!(body["password"].is_array());
}

#[tokio::test]
async fn login_sets_both_cookies() {
    let app = spawn_app().await;
    app.register("carol").await;

    let response = app.login("carol", PASSWORD).await;

    assert_eq!(response.status().as_u16(), 200);
    let cookies = set_cookies(&response);
    assert!(!cookies["access_token"].is_empty());
    assert!(!cookies["refresh_token"].is_empty());

    let raw: Vec<_> = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(raw.iter().all(|c| c.contains("HttpOnly") && c.contains("Path=/")));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["username"], "carol");
    assert_eq!(body["user"]["email"], "carol@example.com");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn login_with_wrong_credentials_is_401_without_cookies() {
    let app = spawn_app().await;
    app.register("dave").await;

    for (username, password) in [("dave", "wrong-password"), ("nobody", PASSWORD)] {
        let response = app.login(username, password).await;
        assert_eq!(response.status().as_u16(), 401);
        assert!(set_cookies(&response).is_empty());
    }
}

#[tokio::test]
async fn refresh_issues_new_access_cookie() {
    let app = spawn_app().await;
    let cookies = app.signed_in_user().await;

    let response = app
        .client
        .post(app.url("/api/token/refresh/"))
        .header(COOKIE, format!("refresh_token={}", cookies["refresh_token"]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let refreshed = set_cookies(&response);
    assert!(!refreshed["access_token"].is_empty());
    assert!(!refreshed.contains_key("refresh_token"));

    // The new access token works on a protected route.
    let list = app
        .client
        .get(app.url("/api/quizzes/"))
        .header(COOKIE, format!("access_token={}", refreshed["access_token"]))
        .send()
        .await
        .unwrap();
    assert_eq!(list.status().as_u16(), 200);
}

#[tokio::test]
async fn refresh_rejects_missing_malformed_and_access_tokens() {
    let app = spawn_app().await;
    let cookies = app.signed_in_user().await;

    let attempts = [
        None,
        Some("refresh_token=not.a.jwt".to_string()),
        // An access token is not a refresh token.
        Some(format!("refresh_token={}", cookies["access_token"])),
    ];

    for cookie in attempts {
        let mut request = app.client.post(app.url("/api/token/refresh/"));
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await.unwrap();
        assert_eq!(response.status().as_u16(), 401);
        assert!(set_cookies(&response).is_empty());
    }
}

#[tokio::test]
async fn logout_clears_cookies_and_blacklists_refresh_token() {
    let app = spawn_app().await;
    let cookies = app.signed_in_user().await;

    let response = app
        .client
        .post(app.url("/api/logout/"))
        .header(COOKIE, cookie_header(&cookies))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let cleared = set_cookies(&response);
    assert_eq!(cleared["access_token"], "");
    assert_eq!(cleared["refresh_token"], "");

    let blacklisted: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM token_blacklist")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(blacklisted, 1);

    // The old refresh token is dead.
    let refresh = app
        .client
        .post(app.url("/api/token/refresh/"))
        .header(COOKIE, format!("refresh_token={}", cookies["refresh_token"]))
        .send()
        .await
        .unwrap();
    assert_eq!(refresh.status().as_u16(), 401);
    assert!(set_cookies(&refresh).is_empty());
}

#[tokio::test]
async fn logout_ignores_invalid_refresh_cookie() {
    let app = spawn_app().await;
    let cookies = app.signed_in_user().await;

    let response = app
        .client
        .post(app.url("/api/logout/"))
        .header(
            COOKIE,
            format!("access_token={}; refresh_token=garbage", cookies["access_token"]),
        )
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn logout_requires_authentication() {
    let app = spawn_app().await;

    let response = app.client.post(app.url("/api/logout/")).send().await.unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn api_responses_are_not_cacheable() {
    let app = spawn_app().await;

    let response = app.login("nobody", PASSWORD).await;

    let headers = response.headers();
    assert_eq!(
        headers["cache-control"],
        "no-cache, no-store, must-revalidate, max-age=0"
    );
    assert_eq!(headers["pragma"], "no-cache");
    assert_eq!(headers["expires"], "0");
}

#[tokio::test]
async fn password_bound_is_shared_by_register_and_login() {
    let app = spawn_app().await;
    let register = |username: &'static str, password: String| {
        let client = app.client.clone();
        let url = app.url("/api/register/");
        async move {
            client
                .post(url)
                .json(&serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": password,
                    "confirmed_password": password
                }))
                .send()
                .await
                .unwrap()
        }
    };

    // Too long: refused at registration, not silently at login.
    let too_long = register("longpw", "x".repeat(129)).await;
    assert_eq!(too_long.status().as_u16(), 400);
    let body: serde_json::Value = too_long.json().await.unwrap();
    assert!(body["password"].is_array(), "expected a password error: {}", body);

    // The longest accepted password can log in.
    let longest = "y".repeat(128);
    assert_eq!(register("maxpw", longest.clone()).await.status().as_u16(), 201);
    let login = app.login("maxpw", &longest).await;
    assert_eq!(login.status().as_u16(), 200);
    assert!(set_cookies(&login).contains_key("access_token"));
}

#[tokio::test]
async fn unreadable_bodies_map_to_app_errors() {
    let app = spawn_app().await;

    let register = app
        .client
        .post(app.url("/api/register/"))
        .json(&serde_json::json!({ "username": 5, "email": "e@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(register.status().as_u16(), 400);
    let body: serde_json::Value = register.json().await.unwrap();
    assert!(body["detail"].is_string());

    let login = app
        .client
        .post(app.url("/api/login/"))
        .json(&serde_json::json!({ "username": 5, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status().as_u16(), 401);
    assert!(set_cookies(&login).is_empty());
    let body: serde_json::Value = login.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid credentials.");

    // Not JSON at all, and no content type.
    let raw = app
        .client
        .post(app.url("/api/register/"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(raw.status().as_u16(), 400);
    let body: serde_json::Value = raw.json().await.unwrap();
    assert!(body["detail"].is_string());
}
