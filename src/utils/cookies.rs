// src/utils/cookies.rs

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::{ACCESS_COOKIE, REFRESH_COOKIE};

/// HTTP-only, `SameSite=Lax`, scoped to `/`. Session cookies: the JWT carries the expiry.
fn auth_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn set_access_cookie(jar: CookieJar, token: String, secure: bool) -> CookieJar {
    jar.add(auth_cookie(ACCESS_COOKIE, token, secure))
}

pub fn set_auth_cookies(jar: CookieJar, access: String, refresh: String, secure: bool) -> CookieJar {
    set_access_cookie(jar, access, secure).add(auth_cookie(REFRESH_COOKIE, refresh, secure))
}

/// Expires both auth cookies on the client.
pub fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((ACCESS_COOKIE, "")).path("/"))
        .remove(Cookie::build((REFRESH_COOKIE, "")).path("/"))
}
