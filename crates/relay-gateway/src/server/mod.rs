//! Gateway server setup
//!
//! Wires the persistence tiers, webhook dispatcher and registry together, and
//! serves the health surface until Ctrl-C.

mod handler;
mod state;

pub use handler::{health_check, readiness, ReadinessResponse};
pub use state::GatewayState;

use crate::credentials::{CredentialStore, LocalDiskCredentialSource};
use crate::registry::{InstanceRegistry, LocalRecordFile, RecordStore};
use crate::session::{SessionDeps, SessionPolicy};
use crate::webhook::{ReqwestTransport, WebhookDispatcher, WebhookPolicy};
use axum::{routing::get, Router};
use relay_cache::{RedisCredentialSource, RedisPool, RedisRecordBackup};
use relay_common::{AppConfig, AppError, DatabaseConfig};
use relay_core::ProtocolConnector;
use relay_db::{PgCredentialSource, PgPool, PgPoolConfig, PgRecordRepository};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the health router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness))
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn connect_postgres(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    let pool = relay_db::create_pool(&PgPoolConfig::from(config))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    relay_db::ensure_schema(&pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(pool)
}

/// Initialize all dependencies and create `GatewayState`
///
/// PostgreSQL and Redis are optional. A configured backend that cannot be
/// reached at startup is logged and left out; the local tiers always work.
pub async fn create_gateway_state(
    config: AppConfig,
    connector: Arc<dyn ProtocolConnector>,
) -> Result<GatewayState, AppError> {
    let mut credentials = CredentialStore::new(Arc::new(LocalDiskCredentialSource::new(
        config.storage.sessions_dir(),
    )));
    let mut records = RecordStore::new(Arc::new(LocalRecordFile::new(
        config.storage.records_file(),
    )));

    // Remote tier first: mirrors are read in the order they are added
    if let Some(db_config) = &config.database {
        tracing::info!("Connecting to PostgreSQL...");
        match connect_postgres(db_config).await {
            Ok(pool) => {
                credentials = credentials.with_mirror(Arc::new(PgCredentialSource::new(pool.clone())));
                records = records.with_remote(Arc::new(PgRecordRepository::new(pool)));
                tracing::info!("PostgreSQL connection established");
            }
            Err(e) => {
                tracing::warn!(error = %e, "PostgreSQL unavailable, remote tier disabled");
            }
        }
    }

    if let Some(redis_config) = &config.redis {
        tracing::info!("Connecting to Redis...");
        match RedisPool::from_config(redis_config) {
            Ok(pool) => {
                if let Err(e) = pool.health_check().await {
                    tracing::warn!(error = %e, "Redis not reachable yet, cache tier will retry per call");
                }
                credentials = credentials.with_mirror(Arc::new(
                    RedisCredentialSource::new(pool.clone()).with_ttl(redis_config.credential_ttl_secs),
                ));
                records = records.with_cache(Arc::new(RedisRecordBackup::new(pool)));
                tracing::info!("Redis cache tier enabled");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Invalid Redis configuration, cache tier disabled");
            }
        }
    }

    tracing::info!(tiers = ?credentials.tier_names(), "Credential tiers ready");

    let transport = ReqwestTransport::new(config.webhook.timeout())
        .map_err(|e| AppError::Webhook(format!("Failed to build HTTP client: {e}")))?;
    let dispatcher = Arc::new(WebhookDispatcher::new(
        Arc::new(transport),
        WebhookPolicy::from(&config.webhook),
    ));
    dispatcher.start();

    let deps = SessionDeps::new(connector, Arc::new(credentials), dispatcher);
    let registry = InstanceRegistry::new(
        deps,
        records,
        SessionPolicy::from(&config.session),
        config.webhook.base_url.clone(),
    );

    Ok(GatewayState::new(registry, config))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Serve the health surface until Ctrl-C
pub async fn run_server(app: Router, addr: &str) -> Result<(), AppError> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway health surface on http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete gateway: restore sessions, serve, then close them
pub async fn run(config: AppConfig, connector: Arc<dyn ProtocolConnector>) -> Result<(), AppError> {
    let addr = config.gateway.address();

    let state = create_gateway_state(config, connector).await?;
    let restored = state.registry().bootstrap().await;
    tracing::info!(restored, "Bootstrap complete");

    let app = create_app(state.clone());
    let served = run_server(app, &addr).await;

    state.registry().shutdown().await;
    served
}
