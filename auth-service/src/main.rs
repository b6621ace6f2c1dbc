use healthdir_auth::{
    build_router,
    config::AuthConfig,
    db,
    services::{PgStore, ResetService, SmtpResetLinkSender, SystemClock},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting auth service"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let sender = SmtpResetLinkSender::new(&config.smtp, config.reset.token_ttl_minutes)
        .map_err(|e| AppError::EmailError(e.to_string()))?;
    tracing::info!("Email sender initialized");

    let reset_service = ResetService::new(
        store,
        Arc::new(sender),
        Arc::new(SystemClock),
        config.reset.clone(),
    );

    match reset_service.purge_expired().await {
        Ok(removed) => tracing::info!(removed, "Expired reset tokens purged"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge expired reset tokens"),
    }

    let app = build_router(AppState::new(reset_service));

    let addr = config.common.bind_address();
    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
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
