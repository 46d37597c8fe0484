use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Category {
    Electronics,
    Clothes,
    Stationery,
    Notes,
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Electronics" => Ok(Category::Electronics),
            "Clothes" => Ok(Category::Clothes),
            "Stationery" => Ok(Category::Stationery),
            "Notes" => Ok(Category::Notes),
            _ => Err(format!("Invalid category: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Sold,
}

/// Marketplace listing. Every listing records the entitlement that paid for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
    pub status: ListingStatus,
    pub seller_id: String,
    pub seller_name: String,
    pub seller_email: String,
    pub seller_phone: String,
    pub entitlement_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Validated listing fields supplied by the seller.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
}

impl Listing {
    pub fn new(
        input: NewListing,
        seller: &super::Identity,
        entitlement_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            description: input.description,
            price: input.price,
            category: input.category,
            status: ListingStatus::Available,
            seller_id: seller.id.clone(),
            seller_name: seller.name.clone(),
            seller_email: seller.email.clone(),
            seller_phone: seller.phone.clone(),
            entitlement_id,
            created_at: now,
        }
    }
}
