use axum::{
    body::Bytes,
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::{
    config::MarketplaceConfig,
    dtos::{
        auth::{
            CheckUserRequest, CheckUserResponse, RegisterRequest, RegisterResponse,
            SessionQuery, SessionRequest, SessionResponse,
        },
        MessageResponse,
    },
    middleware::{CurrentIdentity, SessionCredential},
    services::RegistrationInput,
    utils::ValidatedJson,
    AppState,
};

fn session_cookie(config: &MarketplaceConfig, token: String, max_age: chrono::Duration) -> Cookie<'static> {
    Cookie::build((config.session.cookie_name.clone(), token))
        .http_only(true)
        .secure(config.session.cookie_secure)
        .same_site(SameSite::None)
        .path("/")
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

/// Exchange a provider session id for a local session.
///
/// The id may arrive as `{"providerSessionId": ...}` or as `?session_id=`.
pub async fn create_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: SessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid JSON body: {}", e)))?
    };

    let provider_session_id = request
        .provider_session_id
        .or(query.session_id)
        .unwrap_or_default();

    let (identity, session) = state.sessions.exchange(&provider_session_id).await?;

    let jar = jar.add(session_cookie(
        &state.config,
        session.token,
        state.sessions.ttl(),
    ));

    Ok((
        jar,
        Json(SessionResponse {
            identity: identity.into(),
        }),
    ))
}

pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> impl IntoResponse {
    Json(SessionResponse {
        identity: identity.into(),
    })
}

/// Always succeeds; clears the cookie whether or not a session existed.
pub async fn logout(
    State(state): State<AppState>,
    SessionCredential(token): SessionCredential,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(token) = token {
        if let Err(e) = state.sessions.revoke(&token).await {
            tracing::error!(error = %e, "Failed to revoke session on logout");
        }
    }

    let mut removal = session_cookie(&state.config, String::new(), chrono::Duration::zero());
    removal.make_removal();
    let jar = jar.add(removal);

    (
        jar,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = RegistrationInput {
        first_name: req.first_name,
        last_name: req.last_name,
        email_local_part: req.email_local_part,
        phone: req.phone,
        role: req.role,
        branch: req.branch,
        roll_number: req.roll_number,
        cohort: req.cohort,
        department: req.department,
    };

    let identity = state.registration.register(&input).await?;

    Ok(Json(RegisterResponse {
        identity_id: identity.id,
        message: "Registration successful. Please log in to continue.".to_string(),
    }))
}

pub async fn check_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CheckUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let lookup = state.registration.check_user(&req.email_local_part).await?;

    Ok(Json(CheckUserResponse {
        exists: lookup.exists,
        resolved_email: lookup.resolved_email,
        identity_id: lookup.identity_id,
    }))
}
