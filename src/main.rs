use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geodesist_dispatch::config::Config;
use geodesist_dispatch::crm_client::AmoCrmClient;
use geodesist_dispatch::dedup::DedupGuard;
use geodesist_dispatch::handlers::{self, AppState};
use geodesist_dispatch::messaging::WappiMaxClient;
use geodesist_dispatch::pipeline::Dispatcher;
use geodesist_dispatch::status_resolver::StatusResolver;
use geodesist_dispatch::webhook_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geodesist_dispatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; missing credentials are fatal here, not later.
    let config = Config::from_env()?;

    let crm = AmoCrmClient::new(
        config.amocrm_base_url(),
        config.amocrm_access_token.clone(),
    )
    .map_err(|e| anyhow::anyhow!("AmoCRM client init failed: {}", e))?;
    tracing::info!("AmoCRM client initialized: {}", config.amocrm_domain);

    let wappi = WappiMaxClient::new(
        config.wappi_base_url.clone(),
        config.wappi_api_token.clone(),
        config.wappi_profile_id.clone(),
    )
    .map_err(|e| anyhow::anyhow!("Wappi client init failed: {}", e))?;
    tracing::info!("Wappi MAX client initialized: {}", config.wappi_base_url);

    // Process-lifetime caches, owned by the state rather than globals.
    let resolver = StatusResolver::new(crm.clone());
    let dedup = DedupGuard::new();
    tracing::info!("Dedup set and status catalog cache initialized");

    let shared_config = Arc::new(config.clone());
    let dispatcher = Arc::new(Dispatcher::new(crm, wappi, resolver, shared_config));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        dedup,
        dispatcher,
    });

    // Rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("governor config is valid"),
    );

    let webhook_routes = Router::new()
        .route(
            "/webhook/amocrm/geodesist-assigned",
            post(webhook_handler::geodesist_assigned),
        )
        .layer(
            ServiceBuilder::new()
                // Webhook payloads are small; 1MB is generous headroom.
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health endpoints bypass rate limiting.
    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(webhook_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
