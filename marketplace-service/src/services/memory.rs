//! In-process store.
//!
//! Used by tests and by `dev` runs with `MONGODB_URI=memory://`. Each
//! conditional transition happens under a single lock acquisition, which gives
//! the same compare-and-swap semantics as the MongoDB filters.

use crate::models::{Entitlement, EntitlementStatus, Identity, Listing, ProfileUpdate, Session};
use crate::services::store::{EntitlementStore, IdentityStore, ListingStore, SessionStore, Store};
use crate::services::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    identities: HashMap<String, Identity>,
    identity_by_email: HashMap<String, String>,
    sessions: HashMap<String, Session>,
    entitlements: HashMap<String, Entitlement>,
    listings: Vec<Listing>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    reject_listings: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Makes every subsequent listing insert fail.
    pub fn reject_listing_inserts(&self, reject: bool) {
        self.reject_listings.store(reject, Ordering::SeqCst);
    }

    pub fn identities_with_email(&self, email: &str) -> usize {
        self.lock()
            .identities
            .values()
            .filter(|i| i.email == email)
            .count()
    }

    pub fn entitlements_of(&self, owner_id: &str) -> Vec<Entitlement> {
        self.lock()
            .entitlements
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub fn listings(&self) -> Vec<Listing> {
        self.lock().listings.clone()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert_identity(&self, identity: &Identity) -> Result<(), ServiceError> {
        let mut inner = self.lock();
        if inner.identity_by_email.contains_key(&identity.email) {
            return Err(ServiceError::DuplicateIdentity);
        }
        inner
            .identity_by_email
            .insert(identity.email.clone(), identity.id.clone());
        inner
            .identities
            .insert(identity.id.clone(), identity.clone());
        Ok(())
    }

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>, ServiceError> {
        Ok(self.lock().identities.get(id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, ServiceError> {
        let inner = self.lock();
        Ok(inner
            .identity_by_email
            .get(email)
            .and_then(|id| inner.identities.get(id))
            .cloned())
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, ServiceError> {
        let mut inner = self.lock();
        Ok(inner.identities.get_mut(id).map(|identity| {
            identity.phone = update.phone.clone();
            if update.bio.is_some() {
                identity.bio = update.bio.clone();
            }
            if update.picture.is_some() {
                identity.picture = update.picture.clone();
            }
            identity.updated_at = now;
            identity.clone()
        }))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<(), ServiceError> {
        self.lock()
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, ServiceError> {
        Ok(self.lock().sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), ServiceError> {
        self.lock().sessions.remove(token_hash);
        Ok(())
    }
}

#[async_trait]
impl EntitlementStore for MemoryStore {
    async fn insert_entitlement(&self, entitlement: &Entitlement) -> Result<(), ServiceError> {
        let mut inner = self.lock();
        if inner
            .entitlements
            .values()
            .any(|e| e.order_ref == entitlement.order_ref)
        {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "duplicate order reference {}",
                entitlement.order_ref
            )));
        }
        inner
            .entitlements
            .insert(entitlement.id.clone(), entitlement.clone());
        Ok(())
    }

    async fn find_entitlement_by_order(
        &self,
        order_ref: &str,
    ) -> Result<Option<Entitlement>, ServiceError> {
        Ok(self
            .lock()
            .entitlements
            .values()
            .find(|e| e.order_ref == order_ref)
            .cloned())
    }

    async fn mark_paid(
        &self,
        owner_id: &str,
        order_ref: &str,
        payment_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, ServiceError> {
        let mut inner = self.lock();
        let target = inner.entitlements.values_mut().find(|e| {
            e.owner_id == owner_id
                && e.order_ref == order_ref
                && e.status == EntitlementStatus::Created
        });

        Ok(target.map(|e| {
            e.status = EntitlementStatus::Paid;
            e.payment_ref = Some(payment_ref.to_string());
            e.updated_at = now;
            e.clone()
        }))
    }

    async fn list_claimable(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Entitlement>, ServiceError> {
        let mut valid: Vec<Entitlement> = self
            .lock()
            .entitlements
            .values()
            .filter(|e| e.owner_id == owner_id && e.is_claimable_at(now))
            .cloned()
            .collect();
        valid.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(valid)
    }

    async fn claim_one(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, ServiceError> {
        let mut inner = self.lock();
        let target = inner
            .entitlements
            .values_mut()
            .filter(|e| e.owner_id == owner_id && e.is_claimable_at(now))
            .min_by_key(|e| e.expires_at);

        Ok(target.map(|e| {
            e.status = EntitlementStatus::Used;
            e.updated_at = now;
            e.clone()
        }))
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn insert_listing(&self, listing: &Listing) -> Result<(), ServiceError> {
        if self.reject_listings.load(Ordering::SeqCst) {
            return Err(ServiceError::Database(anyhow::anyhow!(
                "listing store unavailable"
            )));
        }
        self.lock().listings.push(listing.clone());
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
