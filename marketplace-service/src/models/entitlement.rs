use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a listing entitlement. Only `created -> paid -> used` exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
    Created,
    Paid,
    Used,
}

impl EntitlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementStatus::Created => "created",
            EntitlementStatus::Paid => "paid",
            EntitlementStatus::Used => "used",
        }
    }
}

/// A purchased, single-use right to create one listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner_id: String,
    pub order_ref: String,
    pub payment_ref: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: EntitlementStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Entitlement {
    pub fn new(
        owner_id: String,
        order_ref: String,
        amount_minor: i64,
        currency: String,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            order_ref,
            payment_ref: None,
            amount_minor,
            currency,
            status: EntitlementStatus::Created,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Paid and not yet past its expiry.
    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == EntitlementStatus::Paid && now < self.expires_at
    }
}
