//! Persistence seam.
//!
//! Every status transition on an entitlement is a single conditional write
//! keyed on the expected prior status. Implementations must never read the
//! record, check its status and write it back in two steps.

use crate::models::{Entitlement, Identity, Listing, ProfileUpdate, Session};
use crate::services::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fails with `DuplicateIdentity` when the email is already taken.
    async fn insert_identity(&self, identity: &Identity) -> Result<(), ServiceError>;

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>, ServiceError>;

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, ServiceError>;

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, ServiceError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<(), ServiceError>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, ServiceError>;

    /// Deleting an unknown session is not an error.
    async fn delete_session(&self, token_hash: &str) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn insert_entitlement(&self, entitlement: &Entitlement) -> Result<(), ServiceError>;

    async fn find_entitlement_by_order(
        &self,
        order_ref: &str,
    ) -> Result<Option<Entitlement>, ServiceError>;

    /// `created -> paid` for the entitlement with this owner and order ref.
    /// Returns `None` when no such `created` entitlement exists.
    async fn mark_paid(
        &self,
        owner_id: &str,
        order_ref: &str,
        payment_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, ServiceError>;

    /// Paid entitlements of `owner_id` unexpired at `now`, newest first.
    async fn list_claimable(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Entitlement>, ServiceError>;

    /// `paid -> used` on the soonest-expiring claimable entitlement of `owner_id`.
    async fn claim_one(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, ServiceError>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn insert_listing(&self, listing: &Listing) -> Result<(), ServiceError>;
}

/// Everything the service persists, behind one handle.
#[async_trait]
pub trait Store: IdentityStore + SessionStore + EntitlementStore + ListingStore {
    async fn health_check(&self) -> Result<(), ServiceError>;
}
