use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use smile_towing::config::{DatabaseConfig, EnvironmentConfig, StoreBackend};
use smile_towing::create_app_router;
use smile_towing::repositories::{
    MemoryStore, PgTowRequestRepository, PgUserRepository, PgVehicleRepository,
};
use smile_towing::services::{Geocoder, LocalObjectStorage, MapboxGeocoder, RequestEventBus};
use smile_towing::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚨 SMILE Towing - Dispatch API");
    info!("==============================");

    let config = EnvironmentConfig::from_env()?;
    info!(
        "⚙️ Environment: {} | store: {:?} | match window: {}s",
        config.environment, config.store_backend, config.match_timeout_secs
    );
    if config.expose_reset_tokens {
        warn!("⚠️ EXPOSE_RESET_TOKENS is on: password reset tokens are returned in responses");
    }

    let geocoder: Option<Arc<dyn Geocoder>> = match &config.mapbox_token {
        Some(token) => Some(Arc::new(MapboxGeocoder::new(token.clone())?)),
        None => {
            warn!("⚠️ MAPBOX_TOKEN not set: address lookup disabled");
            None
        }
    };

    let app_state = build_state(config, geocoder).await?;
    let addr: SocketAddr = app_state
        .config
        .server_url()
        .parse()
        .context("HOST/PORT do not form a valid socket address")?;

    tokio::fs::create_dir_all(&app_state.config.upload_dir)
        .await
        .context("Could not create the upload directory")?;

    let app = create_app_router(app_state);

    info!("🌐 Server listening on http://{}", addr);
    info!("🔍 Endpoints:");
    info!("   GET  /health");
    info!("   POST /api/auth/{{customer|driver}}/signup | signin");
    info!("   GET|PUT /api/profile, POST|DELETE /api/profile/image, PUT /api/driver/status");
    info!("   GET|POST /api/vehicles, GET|PUT|DELETE /api/vehicles/:id");
    info!("   POST|GET /api/tow-requests, /:id, /:id/cancel, /:id/assignment, /:id/events");
    info!("   GET /api/jobs, /api/jobs/stream, /api/jobs/mine, POST /api/jobs/:id/accept|decline|complete");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server error: {}", e);
        return Err(e.into());
    }

    info!("👋 Server stopped");
    Ok(())
}

/// Construye el estado según `STORE_BACKEND` y conecta el relay de Redis si hay URL
async fn build_state(
    config: EnvironmentConfig,
    geocoder: Option<Arc<dyn Geocoder>>,
) -> Result<AppState> {
    let mut events = RequestEventBus::new();
    if let Some(redis_url) = &config.redis_url {
        events = events.with_redis(redis_url).await?;
    }

    match config.store_backend {
        StoreBackend::Postgres => {
            let database = DatabaseConfig::from_env()?;
            let pool = database.create_pool().await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("✅ Database ready, migrations applied");

            let storage = Arc::new(LocalObjectStorage::new(
                config.upload_dir.clone(),
                config.public_base_url.clone(),
            ));
            Ok(AppState::new(
                config,
                Arc::new(PgUserRepository::new(pool.clone())),
                Arc::new(PgVehicleRepository::new(pool.clone())),
                Arc::new(PgTowRequestRepository::new(pool)),
                events,
                geocoder,
                storage,
            ))
        }
        StoreBackend::Memory => {
            warn!("⚠️ Using the in-memory store: data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            let storage = Arc::new(LocalObjectStorage::new(
                config.upload_dir.clone(),
                config.public_base_url.clone(),
            ));
            Ok(AppState::new(
                config,
                store.clone(),
                store.clone(),
                store,
                events,
                geocoder,
                storage,
            ))
        }
    }
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ Could not listen for Ctrl+C: {}", e);
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
                error!("❌ Could not install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Ctrl+C received, shutting down...");
        },
        _ = terminate => {
            info!("🛑 Termination signal received, shutting down...");
        },
    }
}
