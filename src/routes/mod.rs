//! Routers HTTP por funcionalidad

pub mod auth_routes;
pub mod geocode_routes;
pub mod job_routes;
pub mod profile_routes;
pub mod tow_request_routes;
pub mod vehicle_routes;

use axum::{response::Json, routing::get, Router};
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::middleware::cors_layer;
use crate::state::AppState;

/// Router completo de la aplicación
pub fn create_app_router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/health", get(health))
        .nest("/api/auth", auth_routes::create_auth_router())
        .nest("/api/profile", profile_routes::create_profile_router())
        .nest("/api/driver", profile_routes::create_driver_router())
        .nest("/api/vehicles", vehicle_routes::create_vehicle_router())
        .nest("/api/tow-requests", tow_request_routes::create_tow_request_router())
        .nest("/api/jobs", job_routes::create_job_router())
        .nest("/api", geocode_routes::create_geocode_router())
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "smile-towing",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
