use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{models::Identity, AppState};

/// Session token from the cookie, else from `Authorization: Bearer`.
pub fn session_token(jar: &CookieJar, headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = jar
        .get(cookie_name)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// Raw session credential, if the request carries one. Never rejects.
pub struct SessionCredential(pub Option<String>);

#[axum::async_trait]
impl FromRequestParts<AppState> for SessionCredential {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(SessionCredential(session_token(
            &jar,
            &parts.headers,
            &state.config.session.cookie_name,
        )))
    }
}

/// Identity behind a valid session; rejects with 401 otherwise.
pub struct CurrentIdentity(pub Identity);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match SessionCredential::from_request_parts(parts, state).await {
            Ok(SessionCredential(token)) => token,
            Err(never) => match never {},
        };
        let identity = state.sessions.resolve(token.as_deref()).await?;
        Ok(CurrentIdentity(identity))
    }
}
