use crate::models::{Entitlement, EntitlementStatus, Identity, Listing, ProfileUpdate, Session};
use crate::services::store::{EntitlementStore, IdentityStore, ListingStore, SessionStore, Store};
use crate::services::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::time::Duration;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for marketplace-service");

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            )
            .build();

        self.users().create_index(email_index, None).await.map_err(|e| {
            tracing::error!("Failed to create email index on users collection: {}", e);
            AppError::from(e)
        })?;
        tracing::info!("Created unique index on users.email");

        let token_index = IndexModel::builder()
            .keys(doc! { "token_hash": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("token_hash_unique".to_string())
                    .build(),
            )
            .build();

        // Background reaping of expired sessions
        let session_ttl_index = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Duration::from_secs(0))
                    .name("session_expiry_ttl".to_string())
                    .build(),
            )
            .build();

        self.sessions()
            .create_indexes([token_index, session_ttl_index], None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create indexes on sessions collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created indexes on sessions.(token_hash, expires_at)");

        let claim_index = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "status": 1, "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("owner_status_expiry".to_string())
                    .build(),
            )
            .build();

        let order_index = IndexModel::builder()
            .keys(doc! { "order_ref": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("order_ref_unique".to_string())
                    .build(),
            )
            .build();

        self.entitlements()
            .create_indexes([claim_index, order_index], None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create indexes on entitlements collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created indexes on entitlements.(owner_id, status, expires_at) and order_ref");

        let seller_index = IndexModel::builder()
            .keys(doc! { "seller_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("seller_lookup".to_string())
                    .build(),
            )
            .build();

        self.products()
            .create_index(seller_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create seller index on products collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on products.(seller_id, created_at)");

        Ok(())
    }

    pub fn users(&self) -> Collection<Identity> {
        self.db.collection("users")
    }

    pub fn sessions(&self) -> Collection<Session> {
        self.db.collection("sessions")
    }

    pub fn entitlements(&self) -> Collection<Entitlement> {
        self.db.collection("entitlements")
    }

    pub fn products(&self) -> Collection<Listing> {
        self.db.collection("products")
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl IdentityStore for MongoStore {
    async fn insert_identity(&self, identity: &Identity) -> Result<(), ServiceError> {
        match self.users().insert_one(identity, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(ServiceError::DuplicateIdentity),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>, ServiceError> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, ServiceError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, ServiceError> {
        let mut set = doc! {
            "phone": update.phone.as_str(),
            "updated_at": BsonDateTime::from_chrono(now),
        };
        if let Some(bio) = &update.bio {
            set.insert("bio", bio.as_str());
        }
        if let Some(picture) = &update.picture {
            set.insert("picture", picture.as_str());
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .users()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, options)
            .await?)
    }
}

#[async_trait]
impl SessionStore for MongoStore {
    async fn insert_session(&self, session: &Session) -> Result<(), ServiceError> {
        self.sessions().insert_one(session, None).await?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, ServiceError> {
        Ok(self
            .sessions()
            .find_one(doc! { "token_hash": token_hash }, None)
            .await?)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), ServiceError> {
        self.sessions()
            .delete_one(doc! { "token_hash": token_hash }, None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EntitlementStore for MongoStore {
    async fn insert_entitlement(&self, entitlement: &Entitlement) -> Result<(), ServiceError> {
        self.entitlements().insert_one(entitlement, None).await?;
        Ok(())
    }

    async fn find_entitlement_by_order(
        &self,
        order_ref: &str,
    ) -> Result<Option<Entitlement>, ServiceError> {
        Ok(self
            .entitlements()
            .find_one(doc! { "order_ref": order_ref }, None)
            .await?)
    }

    async fn mark_paid(
        &self,
        owner_id: &str,
        order_ref: &str,
        payment_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, ServiceError> {
        let filter = doc! {
            "owner_id": owner_id,
            "order_ref": order_ref,
            "status": EntitlementStatus::Created.as_str(),
        };
        let update = doc! {
            "$set": {
                "status": EntitlementStatus::Paid.as_str(),
                "payment_ref": payment_ref,
                "updated_at": BsonDateTime::from_chrono(now),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .entitlements()
            .find_one_and_update(filter, update, options)
            .await?)
    }

    async fn list_claimable(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Entitlement>, ServiceError> {
        let filter = doc! {
            "owner_id": owner_id,
            "status": EntitlementStatus::Paid.as_str(),
            "expires_at": { "$gt": BsonDateTime::from_chrono(now) },
        };
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

        let cursor = self.entitlements().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn claim_one(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Entitlement>, ServiceError> {
        let filter = doc! {
            "owner_id": owner_id,
            "status": EntitlementStatus::Paid.as_str(),
            "expires_at": { "$gt": BsonDateTime::from_chrono(now) },
        };
        let update = doc! {
            "$set": {
                "status": EntitlementStatus::Used.as_str(),
                "updated_at": BsonDateTime::from_chrono(now),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .sort(doc! { "expires_at": 1 })
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .entitlements()
            .find_one_and_update(filter, update, options)
            .await?)
    }
}

#[async_trait]
impl ListingStore for MongoStore {
    async fn insert_listing(&self, listing: &Listing) -> Result<(), ServiceError> {
        self.products().insert_one(listing, None).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                ServiceError::from(e)
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    async fn test_store() -> MongoStore {
        let uri = std::env::var("TEST_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db_name = format!("marketplace_test_{}", uuid::Uuid::new_v4().simple());
        let store = MongoStore::connect(&uri, &db_name).await.unwrap();
        store.initialize_indexes().await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore = "requires MongoDB (TEST_MONGODB_URI)"]
    async fn unique_email_maps_to_duplicate_identity() {
        let store = test_store().await;
        let now = Utc::now();
        let a = Identity::pending("dup@thapar.edu".into(), "A".into(), None, now);
        let b = Identity::pending("dup@thapar.edu".into(), "B".into(), None, now);

        store.insert_identity(&a).await.unwrap();
        let err = store.insert_identity(&b).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateIdentity));

        store.database().drop(None).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires MongoDB (TEST_MONGODB_URI)"]
    async fn claim_is_conditional_on_paid_status() {
        let store = test_store().await;
        let now = Utc::now();
        let e = Entitlement::new(
            "u1".into(),
            "order_m1".into(),
            2000,
            "INR".into(),
            now,
            now + ChronoDuration::hours(1),
        );
        store.insert_entitlement(&e).await.unwrap();

        assert!(store.claim_one("u1", now).await.unwrap().is_none());
        store.mark_paid("u1", "order_m1", "pay_1", now).await.unwrap().unwrap();
        let claimed = store.claim_one("u1", now).await.unwrap().unwrap();
        assert_eq!(claimed.status, EntitlementStatus::Used);
        assert!(store.claim_one("u1", now).await.unwrap().is_none());

        store.database().drop(None).await.unwrap();
    }
}
