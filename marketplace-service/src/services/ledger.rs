//! Listing entitlement ledger.
//!
//! An entitlement moves `created -> paid -> used`, each step a conditional
//! write in the store. Gateway calls run under a bounded timeout; a timeout
//! leaves the ledger untouched so the client can safely retry.

use crate::models::{Entitlement, EntitlementStatus, Identity};
use crate::services::clock::Clock;
use crate::services::gateway::PaymentGateway;
use crate::services::metrics::record_entitlement_transition;
use crate::services::razorpay::MAX_RECEIPT_LEN;
use crate::services::store::EntitlementStore;
use crate::services::ServiceError;
use chrono::Duration;
use rand::RngCore;
use std::future::Future;
use std::sync::Arc;

const RECEIPT_PREFIX: &str = "lst";
const RECEIPT_OWNER_CHARS: usize = 12;
const RECEIPT_SUFFIX_BYTES: usize = 10;

/// Fixed price of one listing.
#[derive(Debug, Clone)]
pub struct ListingFee {
    pub amount_minor: i64,
    pub currency: String,
}

/// What the client needs to drive checkout.
#[derive(Debug, Clone)]
pub struct OrderHandle {
    pub entitlement_id: String,
    pub order_ref: String,
    pub amount_minor: i64,
    pub currency: String,
    pub publishable_key: String,
}

/// Snapshot of valid entitlements, newest first. Consumed once.
#[derive(Debug)]
pub struct ValidEntitlements(std::vec::IntoIter<Entitlement>);

impl Iterator for ValidEntitlements {
    type Item = Entitlement;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for ValidEntitlements {}

/// Receipt of at most 40 characters: truncated owner id plus random hex.
pub fn make_receipt(owner_id: &str) -> String {
    let owner: String = owner_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(RECEIPT_OWNER_CHARS)
        .collect();
    let mut suffix = [0u8; RECEIPT_SUFFIX_BYTES];
    rand::thread_rng().fill_bytes(&mut suffix);
    let receipt = format!("{}_{}_{}", RECEIPT_PREFIX, owner, hex::encode(suffix));
    debug_assert!(receipt.len() <= MAX_RECEIPT_LEN);
    receipt
}

#[derive(Clone)]
pub struct EntitlementLedger {
    entitlements: Arc<dyn EntitlementStore>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    fee: ListingFee,
    ttl: Duration,
    gateway_timeout: std::time::Duration,
}

impl EntitlementLedger {
    pub fn new(
        entitlements: Arc<dyn EntitlementStore>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        fee: ListingFee,
        ttl: Duration,
        gateway_timeout: std::time::Duration,
    ) -> Self {
        Self {
            entitlements,
            gateway,
            clock,
            fee,
            ttl,
            gateway_timeout,
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.gateway_timeout, "Payment gateway timed out");
                Err(ServiceError::PaymentGatewayError(format!(
                    "{} timed out",
                    operation
                )))
            }
        }
    }

    /// Opens a gateway order and records a `created` entitlement for it.
    pub async fn create_order(&self, identity: &Identity) -> Result<OrderHandle, ServiceError> {
        if !identity.has_phone() {
            return Err(ServiceError::ProfileIncomplete);
        }

        let receipt = make_receipt(&identity.id);
        let order = self
            .with_timeout(
                "create_order",
                self.gateway
                    .create_order(self.fee.amount_minor, &self.fee.currency, &receipt),
            )
            .await?;

        let now = self.clock.now();
        let entitlement = Entitlement::new(
            identity.id.clone(),
            order.order_ref.clone(),
            self.fee.amount_minor,
            self.fee.currency.clone(),
            now,
            now + self.ttl,
        );
        self.entitlements.insert_entitlement(&entitlement).await?;
        record_entitlement_transition(EntitlementStatus::Created);

        tracing::info!(
            identity_id = %identity.id,
            entitlement_id = %entitlement.id,
            order_ref = %order.order_ref,
            "Listing order created"
        );

        Ok(OrderHandle {
            entitlement_id: entitlement.id,
            order_ref: order.order_ref,
            amount_minor: self.fee.amount_minor,
            currency: self.fee.currency.clone(),
            publishable_key: self.gateway.publishable_key(),
        })
    }

    /// Verifies a checkout result and marks the matching entitlement `paid`.
    ///
    /// Replays by the owner are a no-op success. An order the caller does not
    /// own, or that was never issued, is `NotFound`.
    pub async fn confirm_payment(
        &self,
        identity: &Identity,
        order_ref: &str,
        payment_ref: &str,
        signature: &str,
    ) -> Result<(), ServiceError> {
        if order_ref.trim().is_empty() || payment_ref.trim().is_empty() || signature.is_empty() {
            return Err(ServiceError::PaymentVerificationFailed);
        }

        let verified = self
            .with_timeout(
                "verify",
                self.gateway.verify(order_ref, payment_ref, signature),
            )
            .await;

        match verified {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(identity_id = %identity.id, order_ref = %order_ref, "Payment signature rejected");
                return Err(ServiceError::PaymentVerificationFailed);
            }
            Err(ServiceError::PaymentGatewayError(detail)) => {
                return Err(ServiceError::PaymentGatewayError(detail))
            }
            Err(e) => {
                tracing::warn!(error = %e, order_ref = %order_ref, "Payment verification errored");
                return Err(ServiceError::PaymentVerificationFailed);
            }
        }

        let now = self.clock.now();
        if let Some(paid) = self
            .entitlements
            .mark_paid(&identity.id, order_ref, payment_ref, now)
            .await?
        {
            record_entitlement_transition(EntitlementStatus::Paid);
            if now >= paid.expires_at {
                tracing::warn!(
                    entitlement_id = %paid.id,
                    order_ref = %order_ref,
                    "Payment recorded after entitlement expiry; it cannot be claimed"
                );
            } else {
                tracing::info!(
                    identity_id = %identity.id,
                    entitlement_id = %paid.id,
                    order_ref = %order_ref,
                    "Entitlement paid"
                );
            }
            return Ok(());
        }

        match self.entitlements.find_entitlement_by_order(order_ref).await? {
            Some(existing) if existing.owner_id == identity.id => {
                if existing.payment_ref.as_deref() != Some(payment_ref) {
                    tracing::warn!(
                        entitlement_id = %existing.id,
                        order_ref = %order_ref,
                        "Verification for an already-settled order carried a different payment ref"
                    );
                } else {
                    tracing::info!(
                        entitlement_id = %existing.id,
                        status = %existing.status.as_str(),
                        "Payment verification replayed"
                    );
                }
                Ok(())
            }
            _ => {
                tracing::warn!(
                    identity_id = %identity.id,
                    order_ref = %order_ref,
                    "Verified payment for an order the caller does not own"
                );
                Err(ServiceError::NotFound("Order"))
            }
        }
    }

    /// Paid, unexpired entitlements of `identity`.
    pub async fn list_valid(&self, identity: &Identity) -> Result<ValidEntitlements, ServiceError> {
        let valid = self
            .entitlements
            .list_claimable(&identity.id, self.clock.now())
            .await?;
        Ok(ValidEntitlements(valid.into_iter()))
    }

    /// Atomically spends one entitlement of `identity_id`.
    pub async fn claim_one(&self, identity_id: &str) -> Result<String, ServiceError> {
        let claimed = self
            .entitlements
            .claim_one(identity_id, self.clock.now())
            .await?
            .ok_or(ServiceError::NoValidEntitlement)?;

        record_entitlement_transition(EntitlementStatus::Used);
        tracing::info!(
            identity_id = %identity_id,
            entitlement_id = %claimed.id,
            "Entitlement claimed"
        );
        Ok(claimed.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use crate::services::gateway::MockPaymentGateway;
    use crate::services::memory::MemoryStore;
    use chrono::Utc;

    struct Fixture {
        store: Arc<MemoryStore>,
        gateway: Arc<MockPaymentGateway>,
        clock: ManualClock,
        ledger: EntitlementLedger,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockPaymentGateway::new("secret"));
        let clock = ManualClock::new(Utc::now());
        let ledger = EntitlementLedger::new(
            store.clone(),
            gateway.clone(),
            Arc::new(clock.clone()),
            ListingFee {
                amount_minor: 2000,
                currency: "INR".into(),
            },
            Duration::hours(1),
            std::time::Duration::from_millis(200),
        );
        Fixture {
            store,
            gateway,
            clock,
            ledger,
        }
    }

    fn buyer() -> Identity {
        let mut identity =
            Identity::pending("buyer@thapar.edu".into(), "Buyer".into(), None, Utc::now());
        identity.phone = "+919876543210".into();
        identity
    }

    #[test]
    fn receipt_fits_gateway_limit() {
        let receipt = make_receipt("0f8fad5b-d9cb-469f-a165-70867728950e-with-a-very-long-tail");
        assert!(receipt.len() <= MAX_RECEIPT_LEN);
        assert!(receipt.starts_with("lst_0f8fad5bd9cb_"));
        assert_ne!(receipt, make_receipt("0f8fad5b-d9cb-469f-a165-70867728950e"));
    }

    #[tokio::test]
    async fn order_requires_phone() {
        let f = fixture();
        let mut identity = buyer();
        identity.phone.clear();
        let err = f.ledger.create_order(&identity).await.unwrap_err();
        assert!(matches!(err, ServiceError::ProfileIncomplete));
        assert!(f.gateway.receipts().is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_persists_nothing() {
        let f = fixture();
        let identity = buyer();
        f.gateway.fail_orders(true);
        let err = f.ledger.create_order(&identity).await.unwrap_err();
        assert!(matches!(err, ServiceError::PaymentGatewayError(_)));
        assert!(f.store.entitlements_of(&identity.id).is_empty());

        f.gateway.fail_orders(false);
        f.ledger.create_order(&identity).await.unwrap();
        assert_eq!(f.store.entitlements_of(&identity.id).len(), 1);
    }

    #[tokio::test]
    async fn gateway_timeout_is_gateway_error() {
        let f = fixture();
        let identity = buyer();
        f.gateway.set_delay(Some(std::time::Duration::from_secs(2)));
        let err = f.ledger.create_order(&identity).await.unwrap_err();
        assert!(matches!(err, ServiceError::PaymentGatewayError(_)));
        assert!(f.store.entitlements_of(&identity.id).is_empty());
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let f = fixture();
        let identity = buyer();

        let order = f.ledger.create_order(&identity).await.unwrap();
        assert_eq!(order.amount_minor, 2000);
        assert_eq!(order.publishable_key, "rzp_test_mock");

        let bad = f
            .ledger
            .confirm_payment(&identity, &order.order_ref, "pay_1", "deadbeef")
            .await
            .unwrap_err();
        assert!(matches!(bad, ServiceError::PaymentVerificationFailed));
        let stored = f.store.entitlements_of(&identity.id);
        assert_eq!(stored[0].status, EntitlementStatus::Created);

        let sig = f.gateway.sign(&order.order_ref, "pay_1");
        f.ledger
            .confirm_payment(&identity, &order.order_ref, "pay_1", &sig)
            .await
            .unwrap();
        // replay
        f.ledger
            .confirm_payment(&identity, &order.order_ref, "pay_1", &sig)
            .await
            .unwrap();

        let valid: Vec<_> = f.ledger.list_valid(&identity).await.unwrap().collect();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].payment_ref.as_deref(), Some("pay_1"));

        let claimed = f.ledger.claim_one(&identity.id).await.unwrap();
        assert_eq!(claimed, order.entitlement_id);
        assert!(matches!(
            f.ledger.claim_one(&identity.id).await,
            Err(ServiceError::NoValidEntitlement)
        ));
        assert_eq!(f.store.entitlements_of(&identity.id).len(), 1);
    }

    #[tokio::test]
    async fn foreign_order_is_not_found() {
        let f = fixture();
        let owner = buyer();
        let order = f.ledger.create_order(&owner).await.unwrap();

        let mut intruder =
            Identity::pending("x@thapar.edu".into(), "X".into(), None, Utc::now());
        intruder.phone = "+919000000000".into();
        let sig = f.gateway.sign(&order.order_ref, "pay_1");

        let err = f
            .ledger
            .confirm_payment(&intruder, &order.order_ref, "pay_1", &sig)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(
            f.store.entitlements_of(&owner.id)[0].status,
            EntitlementStatus::Created
        );
    }

    #[tokio::test]
    async fn expired_paid_entitlement_is_neither_listed_nor_claimable() {
        let f = fixture();
        let identity = buyer();
        let order = f.ledger.create_order(&identity).await.unwrap();
        let sig = f.gateway.sign(&order.order_ref, "pay_9");
        f.ledger
            .confirm_payment(&identity, &order.order_ref, "pay_9", &sig)
            .await
            .unwrap();

        f.clock.advance(Duration::hours(1));

        assert_eq!(f.ledger.list_valid(&identity).await.unwrap().len(), 0);
        assert!(matches!(
            f.ledger.claim_one(&identity.id).await,
            Err(ServiceError::NoValidEntitlement)
        ));
    }

    #[tokio::test]
    async fn list_valid_is_newest_first() {
        let f = fixture();
        let identity = buyer();
        let mut orders = Vec::new();
        for i in 0..3 {
            let order = f.ledger.create_order(&identity).await.unwrap();
            let payment = format!("pay_{}", i);
            let sig = f.gateway.sign(&order.order_ref, &payment);
            f.ledger
                .confirm_payment(&identity, &order.order_ref, &payment, &sig)
                .await
                .unwrap();
            orders.push(order.entitlement_id);
            f.clock.advance(Duration::minutes(1));
        }

        let listed: Vec<String> = f
            .ledger
            .list_valid(&identity)
            .await
            .unwrap()
            .map(|e| e.id)
            .collect();
        orders.reverse();
        assert_eq!(listed, orders);
    }
}
