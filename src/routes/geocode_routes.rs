use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::dto::tow_request_dto::{GeocodeQuery, TruckTypeResponse};
use crate::middleware::AuthenticatedUser;
use crate::models::TruckType;
use crate::services::GeocodeResult;
use crate::state::AppState;
use crate::utils::errors::{validation_error, AppError};

pub fn create_geocode_router() -> Router<AppState> {
    Router::new()
        .route("/geocode", get(geocode))
        .route("/truck-types", get(truck_types))
}

async fn geocode(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<GeocodeQuery>,
) -> Result<Json<GeocodeResult>, AppError> {
    let address = query.address.trim();
    if address.is_empty() {
        return Err(validation_error("address", "Please enter an address."));
    }
    let result = state.geocoder()?.geocode(address).await?;
    Ok(Json(result))
}

/// Catálogo fijo de grúas que se muestra al crear una solicitud
async fn truck_types() -> Json<Vec<TruckTypeResponse>> {
    Json(TruckType::ALL.into_iter().map(TruckTypeResponse::from).collect())
}
