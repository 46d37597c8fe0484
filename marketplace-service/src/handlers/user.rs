use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::SessionResponse,
        user::{ProfileCompleteResponse, PublicProfileView, UpdateProfileRequest},
    },
    middleware::CurrentIdentity,
    services::{IdentityStore, ServiceError},
    utils::ValidatedJson,
    AppState,
};

pub async fn profile_complete(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> impl IntoResponse {
    let completeness = state.registration.completeness(&identity);
    Json(ProfileCompleteResponse {
        complete: completeness.complete,
        missing_fields: completeness.missing_fields,
    })
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state
        .registration
        .update_profile(&identity, &req.phone, req.bio, req.picture)
        .await?;

    Ok(Json(SessionResponse {
        identity: updated.into(),
    }))
}

/// Public profile lookup; no session required.
pub async fn public_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state
        .store
        .find_identity_by_id(&user_id)
        .await?
        .ok_or(ServiceError::NotFound("User"))?;

    Ok(Json(PublicProfileView::from(identity)))
}
