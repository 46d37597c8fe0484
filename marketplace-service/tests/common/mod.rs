//! Shared setup for marketplace-service integration tests.
//!
//! Builds the full router over an in-memory store with a manual clock and
//! in-process doubles for the identity provider and payment gateway.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use marketplace_service::{
    build_router,
    config::{
        Environment, IdentityProviderConfig, ListingFeeConfig, MarketplaceConfig, MongoConfig,
        RateLimitConfig, RazorpayConfig, RegistrationConfig, SecurityConfig, SessionConfig,
    },
    services::{ManualClock, MemoryStore, MockIdentityProvider, MockPaymentGateway},
    AppState, Collaborators,
};
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const GATEWAY_SECRET: &str = "test_key_secret";
pub const COOKIE_NAME: &str = "session_token";
pub const LISTING_FEE_MINOR: i64 = 2000;

pub fn test_config() -> MarketplaceConfig {
    MarketplaceConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "marketplace-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "memory://".to_string(),
            database: "unused".to_string(),
        },
        identity_provider: IdentityProviderConfig {
            url: "http://127.0.0.1:9/session-data".to_string(),
            timeout_seconds: 1,
        },
        razorpay: RazorpayConfig {
            key_id: "rzp_test_mock".to_string(),
            key_secret: Secret::new(GATEWAY_SECRET.to_string()),
            api_base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 1,
        },
        listing_fee: ListingFeeConfig {
            amount_minor: LISTING_FEE_MINOR,
            currency: "INR".to_string(),
            entitlement_ttl_minutes: 60,
        },
        session: SessionConfig {
            ttl_days: 7,
            cookie_name: COOKIE_NAME.to_string(),
            cookie_secure: true,
        },
        registration: RegistrationConfig {
            institution_email_domain: "thapar.edu".to_string(),
            phone_country_code: "+91".to_string(),
            phone_total_length: 13,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        rate_limit: RateLimitConfig {
            register_attempts: 1000,
            register_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
            trust_forwarded_for: false,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockIdentityProvider>,
    pub gateway: Arc<MockPaymentGateway>,
    pub clock: ManualClock,
}

/// Response parts a test usually asserts on.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn error_code(&self) -> &str {
        self.body["errorCode"].as_str().unwrap_or_default()
    }

    /// Value of the session cookie set by this response, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookie_header().and_then(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            (name.trim() == COOKIE_NAME).then(|| value.trim().to_string())
        })
    }

    pub fn set_cookie_header(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{}=", COOKIE_NAME)))
            .map(str::to_string)
    }
}

/// Which credential transport a request uses.
#[derive(Clone, Copy)]
pub enum Auth<'a> {
    None,
    Cookie(&'a str),
    Bearer(&'a str),
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: MarketplaceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockIdentityProvider::new());
        let gateway = Arc::new(MockPaymentGateway::new(GATEWAY_SECRET));
        let clock = ManualClock::new(Utc::now());

        let state = AppState::new(
            config,
            store.clone(),
            Collaborators {
                identity_provider: provider.clone(),
                payment_gateway: gateway.clone(),
                clock: Arc::new(clock.clone()),
            },
        );
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            store,
            provider,
            gateway,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        auth: Auth<'_>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        builder = match auth {
            Auth::None => builder,
            Auth::Cookie(token) => {
                builder.header(header::COOKIE, format!("{}={}", COOKIE_NAME, token))
            }
            Auth::Bearer(token) => {
                builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
            }
        };

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    /// Logs in through the provider double and returns the session token.
    pub async fn login(&self, provider_session_id: &str, email: &str, name: &str) -> String {
        self.provider.add_session(provider_session_id, email, name);
        let res = self
            .request(
                Method::POST,
                "/auth/session",
                Auth::None,
                Some(json!({ "providerSessionId": provider_session_id })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
        res.session_cookie().expect("session cookie missing")
    }

    pub async fn register_student(&self, local_part: &str, phone: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/auth/register",
            Auth::None,
            Some(json!({
                "firstName": "Meera",
                "lastName": "Kaur",
                "emailLocalPart": local_part,
                "phone": phone,
                "role": "student",
                "branch": "COE",
                "rollNumber": "102103001",
                "cohort": "2025"
            })),
        )
        .await
    }

    /// Registered student with a phone, logged in.
    pub async fn registered_seller(&self, local_part: &str) -> String {
        let res = self.register_student(local_part, "+919876543210").await;
        assert_eq!(res.status, StatusCode::OK, "register failed: {}", res.body);
        self.login(
            &format!("prov-{}", local_part),
            &format!("{}@thapar.edu", local_part),
            "Meera Kaur",
        )
        .await
    }

    pub async fn create_order(&self, token: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/payment/create-order",
            Auth::Cookie(token),
            None,
        )
        .await
    }

    pub async fn verify(&self, token: &str, order_ref: &str, payment_ref: &str, signature: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/payment/verify",
            Auth::Cookie(token),
            Some(json!({
                "orderRef": order_ref,
                "paymentRef": payment_ref,
                "signature": signature,
            })),
        )
        .await
    }

    /// Creates and pays one order; returns its order ref.
    pub async fn buy_entitlement(&self, token: &str) -> String {
        let order = self.create_order(token).await;
        assert_eq!(order.status, StatusCode::OK, "create-order failed: {}", order.body);
        let order_ref = order.body["orderRef"].as_str().unwrap().to_string();
        let payment_ref = format!("pay_{}", order_ref);
        let signature = self.gateway.sign(&order_ref, &payment_ref);

        let res = self.verify(token, &order_ref, &payment_ref, &signature).await;
        assert_eq!(res.status, StatusCode::OK, "verify failed: {}", res.body);
        order_ref
    }

    pub async fn create_listing(&self, token: Option<&str>, body: Value) -> TestResponse {
        let auth = token.map(Auth::Cookie).unwrap_or(Auth::None);
        self.request(Method::POST, "/products", auth, Some(body)).await
    }
}

pub fn listing_body() -> Value {
    json!({
        "title": "Casio fx-991ES calculator",
        "description": "Used for two semesters",
        "price": 450.0,
        "category": "Electronics"
    })
}
