use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::listing::{CreateListingRequest, ListingView},
    middleware::SessionCredential,
    services::ListingService,
    utils::ValidatedJson,
    AppState,
};

/// Body is checked before the gate so a malformed request never spends an
/// entitlement.
pub async fn create_listing(
    State(state): State<AppState>,
    SessionCredential(token): SessionCredential,
    ValidatedJson(req): ValidatedJson<CreateListingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input =
        ListingService::validate(&req.title, &req.description, req.price, &req.category)?;

    let listing = state.listings.create(token.as_deref(), input).await?;

    Ok((StatusCode::CREATED, Json(ListingView::from(listing))))
}
