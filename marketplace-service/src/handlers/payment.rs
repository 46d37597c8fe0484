use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        payment::{CreateOrderResponse, EntitlementView, VerifyPaymentRequest},
        MessageResponse,
    },
    middleware::CurrentIdentity,
    utils::ValidatedJson,
    AppState,
};

/// Open a checkout order for one listing fee.
pub async fn create_order(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<impl IntoResponse, AppError> {
    let order = state.ledger.create_order(&identity).await?;

    Ok(Json(CreateOrderResponse {
        order_ref: order.order_ref,
        amount_minor: order.amount_minor,
        currency: order.currency,
        publishable_key: order.publishable_key,
    }))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ValidatedJson(req): ValidatedJson<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .ledger
        .confirm_payment(&identity, &req.order_ref, &req.payment_ref, &req.signature)
        .await?;

    Ok(Json(MessageResponse {
        message: "Payment verified".to_string(),
    }))
}

/// Paid, unexpired entitlements of the caller.
pub async fn list_tokens(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<impl IntoResponse, AppError> {
    let tokens: Vec<EntitlementView> = state
        .ledger
        .list_valid(&identity)
        .await?
        .map(EntitlementView::from)
        .collect();

    Ok(Json(tokens))
}
