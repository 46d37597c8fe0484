//! Razorpay payment provider client.
//!
//! Implements Razorpay's Orders API for payment initiation and
//! signature verification for payment confirmation.

use crate::config::RazorpayConfig;
use crate::services::gateway::{GatewayOrder, PaymentGateway};
use crate::services::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::utils::signature::verify_hmac_sha256_hex;
use std::time::Duration;

/// Razorpay rejects receipts longer than this.
pub const MAX_RECEIPT_LEN: usize = 40;

/// Razorpay client for interacting with the Razorpay API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

/// Request to create a Razorpay order.
#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    /// Amount in smallest currency unit (paise for INR).
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// Response from Razorpay order creation.
#[derive(Debug, Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

/// Razorpay API error response.
#[derive(Debug, Deserialize)]
struct RazorpayError {
    error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorDetail {
    code: String,
    description: String,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ServiceError::Internal(e.into()))?;
        Ok(Self { client, config })
    }

    /// Check if Razorpay is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    /// Verify payment signature from Razorpay checkout.
    ///
    /// The signature is computed as:
    /// `HMAC-SHA256(order_id + "|" + payment_id, key_secret)`
    fn verify_payment_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, ServiceError> {
        let payload = format!("{}|{}", order_id, payment_id);
        let is_valid = verify_hmac_sha256_hex(
            self.config.key_secret.expose_secret(),
            &payload,
            signature,
        )
        .map_err(ServiceError::Internal)?;

        if is_valid {
            tracing::info!(order_id = %order_id, payment_id = %payment_id, "Payment signature verified");
        } else {
            tracing::warn!(order_id = %order_id, payment_id = %payment_id, "Payment signature mismatch");
        }

        Ok(is_valid)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        if !self.is_configured() {
            return Err(ServiceError::PaymentGatewayError(
                "Razorpay credentials not configured".to_string(),
            ));
        }
        if receipt.len() > MAX_RECEIPT_LEN {
            return Err(ServiceError::PaymentGatewayError(format!(
                "receipt exceeds {} characters",
                MAX_RECEIPT_LEN
            )));
        }

        let request = CreateOrderRequest {
            amount: amount_minor,
            currency,
            receipt,
        };

        let url = format!("{}/orders", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentGatewayError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::PaymentGatewayError(e.to_string()))?;

        tracing::debug!(status = %status, "Razorpay create_order response");

        if status.is_success() {
            let order: RazorpayOrder = serde_json::from_str(&body)
                .map_err(|e| ServiceError::PaymentGatewayError(e.to_string()))?;
            tracing::info!(
                order_id = %order.id,
                amount = order.amount,
                currency = %order.currency,
                status = %order.status,
                "Razorpay order created"
            );
            Ok(GatewayOrder {
                order_ref: order.id,
                amount_minor: order.amount,
                currency: order.currency,
            })
        } else {
            let (code, description) = serde_json::from_str::<RazorpayError>(&body)
                .map(|e| (e.error.code, e.error.description))
                .unwrap_or_else(|_| ("UNKNOWN".to_string(), format!("HTTP {}", status)));
            tracing::error!(
                code = %code,
                description = %description,
                "Razorpay order creation failed"
            );
            Err(ServiceError::PaymentGatewayError(format!(
                "Razorpay error: {} - {}",
                code, description
            )))
        }
    }

    async fn verify(
        &self,
        order_ref: &str,
        payment_ref: &str,
        signature: &str,
    ) -> Result<bool, ServiceError> {
        self.verify_payment_signature(order_ref, payment_ref, signature)
    }

    fn publishable_key(&self) -> String {
        self.config.key_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use service_core::utils::signature::hmac_sha256_hex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base: &str) -> RazorpayConfig {
        RazorpayConfig {
            key_id: "rzp_test_123".to_string(),
            key_secret: Secret::new("my_secret_key".to_string()),
            api_base_url: base.to_string(),
            timeout_seconds: 2,
        }
    }

    #[test]
    fn test_is_configured() {
        let client = RazorpayClient::new(test_config("https://api.razorpay.com/v1")).unwrap();
        assert!(client.is_configured());

        let empty = RazorpayConfig {
            key_id: "".to_string(),
            key_secret: Secret::new("".to_string()),
            api_base_url: "".to_string(),
            timeout_seconds: 1,
        };
        assert!(!RazorpayClient::new(empty).unwrap().is_configured());
    }

    #[tokio::test]
    async fn test_payment_signature_verification() {
        let client = RazorpayClient::new(test_config("https://api.razorpay.com/v1")).unwrap();
        let signature = hmac_sha256_hex("my_secret_key", "order_123|pay_456").unwrap();

        assert!(client.verify("order_123", "pay_456", &signature).await.unwrap());
        assert!(!client.verify("order_123", "pay_789", &signature).await.unwrap());
        assert!(!client
            .verify("order_123", "pay_456", "invalid_signature")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn long_receipt_is_rejected_before_network() {
        let client = RazorpayClient::new(test_config("http://127.0.0.1:9")).unwrap();
        let receipt = "r".repeat(MAX_RECEIPT_LEN + 1);
        let err = client.create_order(2000, "INR", &receipt).await.unwrap_err();
        assert!(matches!(err, ServiceError::PaymentGatewayError(_)));
    }

    #[tokio::test]
    async fn create_order_maps_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_Ab12",
                "entity": "order",
                "amount": 2000,
                "amount_paid": 0,
                "amount_due": 2000,
                "currency": "INR",
                "receipt": "lst_x",
                "status": "created",
                "attempts": 0,
                "created_at": 1700000000
            })))
            .mount(&server)
            .await;

        let client = RazorpayClient::new(test_config(&server.uri())).unwrap();
        let order = client.create_order(2000, "INR", "lst_x").await.unwrap();
        assert_eq!(order.order_ref, "order_Ab12");
        assert_eq!(order.amount_minor, 2000);
    }

    #[tokio::test]
    async fn create_order_error_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": "BAD_REQUEST_ERROR", "description": "receipt too long"}
            })))
            .mount(&server)
            .await;

        let client = RazorpayClient::new(test_config(&server.uri())).unwrap();
        let err = client.create_order(2000, "INR", "lst_x").await.unwrap_err();
        match err {
            ServiceError::PaymentGatewayError(detail) => {
                assert!(detail.contains("BAD_REQUEST_ERROR"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
