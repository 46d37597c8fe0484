use marketplace_service::{
    build_router,
    config::MarketplaceConfig,
    services::{HttpIdentityProvider, MemoryStore, MongoStore, RazorpayClient, SystemClock},
    AppState, Collaborators,
};
use service_core::observability::init_tracing;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Fail fast on bad configuration
    let config = MarketplaceConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    marketplace_service::services::metrics::init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting marketplace service"
    );

    let identity_provider = HttpIdentityProvider::new(
        &config.identity_provider.url,
        Duration::from_secs(config.identity_provider.timeout_seconds),
    )?;

    let razorpay = RazorpayClient::new(config.razorpay.clone())?;
    if !razorpay.is_configured() {
        tracing::warn!("Razorpay credentials are empty; order creation will fail");
    }
    if config.rate_limit.trust_forwarded_for {
        tracing::info!("Rate limits keyed by the first x-forwarded-for hop");
    }

    let collaborators = Collaborators {
        identity_provider: Arc::new(identity_provider),
        payment_gateway: Arc::new(razorpay),
        clock: Arc::new(SystemClock),
    };

    let state = if config.uses_memory_store() {
        tracing::warn!("Using in-memory store; data is lost on restart");
        AppState::new(config.clone(), Arc::new(MemoryStore::new()), collaborators)
    } else {
        tracing::info!("Initializing database connection");
        let store = MongoStore::connect(&config.mongodb.uri, &config.mongodb.database).await?;
        store.initialize_indexes().await?;
        tracing::info!("Database initialized successfully");
        AppState::new(config.clone(), Arc::new(store), collaborators)
    };

    let app = build_router(state).await?;

    let addr = config.common.bind_address()?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
