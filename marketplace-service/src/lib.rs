pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{ip_rate_limit_middleware, IpRateLimit},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::MarketplaceConfig;
use crate::services::{
    AuthorizationGate, Clock, EntitlementLedger, IdentityProvider, ListingFee, ListingService,
    PaymentGateway, PhoneRule, RegistrationValidator, SessionAuthenticator, Store,
};

/// External systems the service talks to, chosen by the caller.
#[derive(Clone)]
pub struct Collaborators {
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: MarketplaceConfig,
    pub store: Arc<dyn Store>,
    pub sessions: SessionAuthenticator,
    pub registration: RegistrationValidator,
    pub ledger: EntitlementLedger,
    pub gate: AuthorizationGate,
    pub listings: ListingService,
    pub register_rate_limiter: IpRateLimit,
    pub ip_rate_limiter: IpRateLimit,
}

impl AppState {
    /// Wires every component against one store.
    pub fn new<S: Store + 'static>(
        config: MarketplaceConfig,
        store: Arc<S>,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators {
            identity_provider,
            payment_gateway,
            clock,
        } = collaborators;

        let sessions = SessionAuthenticator::new(
            store.clone(),
            store.clone(),
            identity_provider,
            clock.clone(),
            chrono::Duration::days(config.session.ttl_days),
        );

        let registration = RegistrationValidator::new(
            store.clone(),
            clock.clone(),
            &config.registration.institution_email_domain,
            PhoneRule::new(
                &config.registration.phone_country_code,
                config.registration.phone_total_length,
            ),
        );

        let ledger = EntitlementLedger::new(
            store.clone(),
            payment_gateway,
            clock.clone(),
            ListingFee {
                amount_minor: config.listing_fee.amount_minor,
                currency: config.listing_fee.currency.clone(),
            },
            chrono::Duration::minutes(config.listing_fee.entitlement_ttl_minutes),
            std::time::Duration::from_secs(config.razorpay.timeout_seconds),
        );

        let gate = AuthorizationGate::new(sessions.clone(), ledger.clone());
        let listings = ListingService::new(gate.clone(), store.clone(), clock);

        let register_rate_limiter = IpRateLimit::new(
            config.rate_limit.register_attempts,
            config.rate_limit.register_window_seconds,
            config.rate_limit.trust_forwarded_for,
        );
        let ip_rate_limiter = IpRateLimit::new(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
            config.rate_limit.trust_forwarded_for,
        );

        Self {
            config,
            store,
            sessions,
            registration,
            ledger,
            gate,
            listings,
            register_rate_limiter,
            ip_rate_limiter,
        }
    }
}

fn cors_layer(config: &MarketplaceConfig) -> CorsLayer {
    // Credentialed CORS cannot use a wildcard origin
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let register_limiter = state.register_rate_limiter.clone();
    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            register_limiter,
            ip_rate_limit_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/auth/session", post(handlers::auth::create_session))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/check-user", post(handlers::auth::check_user))
        .merge(register_route)
        .route(
            "/users/profile/complete",
            get(handlers::user::profile_complete),
        )
        .route("/users/profile", put(handlers::user::update_profile))
        .route("/users/:user_id", get(handlers::user::public_profile))
        .route("/payment/create-order", post(handlers::payment::create_order))
        .route("/payment/verify", post(handlers::payment::verify_payment))
        .route("/payment/tokens", get(handlers::payment::list_tokens))
        .route("/products", post(handlers::listing::create_listing))
        .with_state(state.clone())
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config));

    Ok(app)
}
