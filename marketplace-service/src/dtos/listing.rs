use crate::models::{Category, Listing, ListingStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateListingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[validate(length(min = 1, max = 32, message = "category is required"))]
    pub category: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
    pub status: ListingStatus,
    pub seller_id: String,
    pub seller_name: String,
    pub entitlement_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Listing> for ListingView {
    fn from(l: Listing) -> Self {
        Self {
            id: l.id,
            title: l.title,
            description: l.description,
            price: l.price,
            category: l.category,
            status: l.status,
            seller_id: l.seller_id,
            seller_name: l.seller_name,
            entitlement_id: l.entitlement_id,
            created_at: l.created_at,
        }
    }
}
