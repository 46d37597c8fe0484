use crate::models::{Entitlement, EntitlementStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_ref: String,
    pub amount_minor: i64,
    pub currency: String,
    pub publishable_key: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, max = 64, message = "orderRef is required"))]
    pub order_ref: String,
    #[validate(length(min = 1, max = 64, message = "paymentRef is required"))]
    pub payment_ref: String,
    #[validate(length(min = 1, max = 128, message = "signature is required"))]
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementView {
    pub id: String,
    pub order_ref: String,
    pub payment_ref: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: EntitlementStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Entitlement> for EntitlementView {
    fn from(e: Entitlement) -> Self {
        Self {
            id: e.id,
            order_ref: e.order_ref,
            payment_ref: e.payment_ref,
            amount_minor: e.amount_minor,
            currency: e.currency,
            status: e.status,
            expires_at: e.expires_at,
            created_at: e.created_at,
        }
    }
}
