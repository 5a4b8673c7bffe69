//! Identity Verification Server
//!
//! Production server for identity verification:
//! - `POST /webhook`: signed provider events, reconciled against stored users
//! - `POST /create-verification-session`: hosted document verification links
//! - Health and Prometheus metrics on a separate port
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `IDV_CONFIG` | - | Optional TOML configuration file |
//! | `IDV_PORT` / `PORT` | `3000` | HTTP API port |
//! | `IDV_METRICS_PORT` | `9090` | Metrics/health port |
//! | `IDV_MONGO_URL` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `IDV_MONGO_DB` | `idv` | MongoDB database name |
//! | `IDV_POLICY` | `lenient` | `strict` or `lenient` |
//! | `IDV_AUTH_PROJECT_ID` | - | Auth provider project |
//! | `IDV_LOG_FORMAT` | `text` | `text` or `json` |
//! | `STRIPE_SECRET_KEY` | - | Identity provider API key |
//! | `STRIPE_WEBHOOK_SECRET` | - | Webhook signing secret |
//! | `AUTH_ADMIN_TOKEN` | - | Auth provider admin bearer token |
//! | `RUST_LOG` | `info` | Log filter |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use idv_common::logging::init_logging;
use idv_config::AppConfig;
use idv_platform::accounts::{IdentityToolkitAccounts, IdentityToolkitConfig};
use idv_platform::api::{create_router, AppState};
use idv_platform::domain::{FieldNormalizer, SystemClock};
use idv_platform::provider::{StripeClientConfig, StripeIdentityClient};
use idv_platform::repository::MongoUserRepository;
use idv_platform::service::{
    ProcessorTimeouts, ReconciliationEngine, SignatureVerifier, VerificationEventProcessor,
};
use idv_secrets::{create_provider, SecretsConfig, ServiceSecrets};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(config.logging.format, &config.logging.filter);

    info!(
        policy = %config.reconciliation.policy,
        port = config.server.port,
        "Starting identity verification server"
    );

    // Secrets
    let secrets_provider = create_provider(&SecretsConfig {
        provider: config.secrets.provider.clone(),
        ..Default::default()
    })?;
    let secrets = ServiceSecrets::resolve(secrets_provider.as_ref()).await?;

    // MongoDB
    info!("Connecting to MongoDB: {}/{}", config.mongo.url, config.mongo.database);
    let mut mongo_options = mongodb::options::ClientOptions::parse(&config.mongo.url).await?;
    mongo_options.connect_timeout = Some(config.timeouts.connect());
    mongo_options.server_selection_timeout = Some(config.timeouts.store());
    let mongo_client = mongodb::Client::with_options(mongo_options)?;
    let db = mongo_client.database(&config.mongo.database);
    let store = Arc::new(MongoUserRepository::new(&db, &config.mongo.users_collection));

    // Outbound clients
    let provider = Arc::new(StripeIdentityClient::new(StripeClientConfig {
        api_base_url: config.provider.api_base_url.clone(),
        api_key: secrets.provider_api_key.clone(),
        connect_timeout: config.timeouts.connect(),
        request_timeout: config.timeouts.provider(),
    })?);
    let accounts = Arc::new(IdentityToolkitAccounts::new(IdentityToolkitConfig {
        api_base_url: config.auth_identity.api_base_url.clone(),
        project_id: config.auth_identity.project_id.clone(),
        access_token: secrets.auth_admin_token.clone(),
        connect_timeout: config.timeouts.connect(),
        request_timeout: config.timeouts.store(),
    })?);

    // Event processing
    let engine = ReconciliationEngine::new(
        config.reconciliation.policy,
        FieldNormalizer::new(config.reconciliation.age_suffixes.iter().cloned()),
    );
    let verifier = SignatureVerifier::new(
        &secrets.webhook_signing_secret,
        Duration::from_secs(config.provider.signature_tolerance_secs),
    );
    let processor = VerificationEventProcessor::new(
        verifier,
        engine,
        provider.clone(),
        store,
        accounts,
        Arc::new(SystemClock),
    )
    .with_timeouts(ProcessorTimeouts {
        provider: config.timeouts.provider(),
        store: config.timeouts.store(),
    });

    let app = create_router(AppState {
        processor: Arc::new(processor),
        provider,
    })
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    // Metrics recorder
    let prometheus = PrometheusBuilder::new().install_recorder()?;

    // Start API server
    let api_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("API server listening on http://{}", api_addr);

    let api_listener = TcpListener::bind(&api_addr).await?;
    let api_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(api_listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            warn!(error = %e, "API server stopped with error");
        }
    });

    // Start metrics server
    let metrics_addr = format!("{}:{}", config.server.host, config.server.metrics_port);
    info!("Metrics server listening on http://{}/metrics", metrics_addr);

    let metrics_app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(prometheus);

    let metrics_listener = TcpListener::bind(&metrics_addr).await?;
    let metrics_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            warn!(error = %e, "Metrics server stopped with error");
        }
    });

    info!("Identity verification server started");

    // In-flight requests drain before the API task returns
    if let Err(e) = api_task.await {
        warn!(error = %e, "API task failed");
    }
    metrics_task.abort();

    info!("Identity verification server shutdown complete");
    Ok(())
}

async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received...");
}
