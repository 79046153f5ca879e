// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Session cookie handling and the current-user extractors

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::auth;
use crate::db::User;
use crate::YatubeError;

use super::AppState;

/// The logged-in user, or `None` for anonymous visitors
pub struct CurrentUser(pub Option<User>);

/// A logged-in user; anonymous requests are redirected to the login page
pub struct LoginRequired(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = YatubeError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Ok(Self(user_from_headers(state, &parts.headers)?))
    }
}

/// Resolve the session cookie in `headers` to its user
pub fn user_from_headers(state: &AppState, headers: &HeaderMap) -> crate::Result<Option<User>> {
    let jar = CookieJar::from_headers(headers);
    match jar.get(&state.config.auth.cookie_name) {
        Some(cookie) => state.db.session_user(cookie.value()),
        None => Ok(None),
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for LoginRequired {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match user {
            Some(user) => Ok(Self(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(found(&auth::login_url(next)))
            }
        }
    }
}

/// `302 Found` to `location`
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Start a session for `user` and attach its cookie to `jar`
pub fn log_in(state: &AppState, jar: CookieJar, user: &User) -> crate::Result<CookieJar> {
    let ttl = chrono::Duration::hours(state.config.auth.session_ttl_hours);
    let session = state.db.create_session(user.id, ttl)?;
    let cookie = Cookie::build((state.config.auth.cookie_name.clone(), session.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.auth.secure_cookie);
    tracing::info!("User {} logged in", user.username);
    Ok(jar.add(cookie))
}

/// End the session named by the cookie in `jar`, if any, and drop the cookie
pub fn log_out(state: &AppState, jar: CookieJar) -> crate::Result<CookieJar> {
    let name = state.config.auth.cookie_name.clone();
    if let Some(cookie) = jar.get(&name) {
        state.db.delete_session(cookie.value())?;
    }
    Ok(jar.remove(Cookie::build((name, "")).path("/")))
}
