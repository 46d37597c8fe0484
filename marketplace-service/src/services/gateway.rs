use crate::services::ServiceError;
use async_trait::async_trait;
use service_core::utils::signature::hmac_sha256_hex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Order created by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    pub order_ref: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Checkout provider. Treated as a trusted black box.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError>;

    /// Whether `signature` proves `payment_ref` settled `order_ref`.
    async fn verify(
        &self,
        order_ref: &str,
        payment_ref: &str,
        signature: &str,
    ) -> Result<bool, ServiceError>;

    /// Key the browser checkout widget is initialized with.
    fn publishable_key(&self) -> String;
}

/// Gateway double that signs like Razorpay with a known secret.
pub struct MockPaymentGateway {
    key_secret: String,
    next_order: AtomicU64,
    fail_orders: AtomicBool,
    delay: Mutex<Option<Duration>>,
    receipts: Mutex<Vec<String>>,
}

impl MockPaymentGateway {
    pub fn new(key_secret: &str) -> Self {
        Self {
            key_secret: key_secret.to_string(),
            next_order: AtomicU64::new(1),
            fail_orders: AtomicBool::new(false),
            delay: Mutex::new(None),
            receipts: Mutex::new(Vec::new()),
        }
    }

    /// Signature a genuine checkout would hand back for this payment.
    pub fn sign(&self, order_ref: &str, payment_ref: &str) -> String {
        hmac_sha256_hex(&self.key_secret, &format!("{}|{}", order_ref, payment_ref))
            .unwrap_or_default()
    }

    pub fn fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    /// Delay applied before answering any call.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(|p| p.into_inner()) = delay;
    }

    pub fn receipts(&self) -> Vec<String> {
        self.receipts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    async fn maybe_delay(&self) {
        let delay = *self.delay.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        self.maybe_delay().await;
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(ServiceError::PaymentGatewayError(
                "mock gateway configured to fail".to_string(),
            ));
        }
        self.receipts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(receipt.to_string());
        let n = self.next_order.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayOrder {
            order_ref: format!("order_mock{:06}", n),
            amount_minor,
            currency: currency.to_string(),
        })
    }

    async fn verify(
        &self,
        order_ref: &str,
        payment_ref: &str,
        signature: &str,
    ) -> Result<bool, ServiceError> {
        self.maybe_delay().await;
        Ok(self.sign(order_ref, payment_ref) == signature)
    }

    fn publishable_key(&self) -> String {
        "rzp_test_mock".to_string()
    }
}
