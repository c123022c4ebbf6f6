use axum::{
    body::Bytes,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::controllers::TowRequestController;
use crate::dto::tow_request_dto::{AcceptJobRequest, DriverLocationRequest};
use crate::dto::ApiResponse;
use crate::middleware::DriverUser;
use crate::models::TowRequest;
use crate::services::live_feed_service::job_feed;
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};

pub fn create_job_router() -> Router<AppState> {
    Router::new()
        .route("/", get(pending_jobs))
        .route("/stream", get(job_stream))
        .route("/mine", get(my_jobs))
        .route("/:id/accept", post(accept_job))
        .route("/:id/decline", post(decline_job))
        .route("/:id/complete", post(complete_job))
        .route("/:id/location", put(update_location))
}

async fn pending_jobs(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
) -> Result<Json<Vec<TowRequest>>, AppError> {
    let controller = TowRequestController::new(&state);
    Ok(Json(controller.pending_jobs(&driver).await?))
}

/// Feed SSE: evento `jobs` con la lista completa de pendientes tras cada cambio
async fn job_stream(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let controller = TowRequestController::new(&state);
    controller.ensure_online(&driver).await?;
    let feed = job_feed(controller.subscribe(), controller.requests())
        .map(|jobs| Event::default().event("jobs").json_data(&jobs));

    Ok(Sse::new(feed).keep_alive(KeepAlive::default()))
}

async fn my_jobs(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
) -> Result<Json<Vec<TowRequest>>, AppError> {
    let controller = TowRequestController::new(&state);
    Ok(Json(controller.jobs_for_driver(&driver).await?))
}

async fn accept_job(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiResponse<TowRequest>>, AppError> {
    let request: AcceptJobRequest = optional_json(&body)?;
    let controller = TowRequestController::new(&state);
    let accepted = controller.accept(&driver, id, request).await?;
    Ok(Json(ApiResponse::success_with_message(
        accepted,
        "Job accepted. The customer has been notified.",
    )))
}

async fn decline_job(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TowRequest>>, AppError> {
    let controller = TowRequestController::new(&state);
    let declined = controller.decline(&driver, id).await?;
    Ok(Json(ApiResponse::success_with_message(declined, "Job declined.")))
}

async fn complete_job(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TowRequest>>, AppError> {
    let controller = TowRequestController::new(&state);
    let completed = controller.complete(&driver, id).await?;
    Ok(Json(ApiResponse::success_with_message(
        completed,
        "Job completed.",
    )))
}

async fn update_location(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Path(id): Path<Uuid>,
    Json(request): Json<DriverLocationRequest>,
) -> Result<Json<ApiResponse<TowRequest>>, AppError> {
    let controller = TowRequestController::new(&state);
    let updated = controller.relocate_driver(&driver, id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Cuerpo JSON opcional: vacío equivale a los valores por defecto, mal formado es un 400
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_json_body() {
        let empty: AcceptJobRequest = optional_json(b"").unwrap();
        assert!(empty.driver_eta.is_none());
        let blank: AcceptJobRequest = optional_json(b" \n").unwrap();
        assert!(blank.driver_eta.is_none());

        let eta: AcceptJobRequest = optional_json(br#"{"driver_eta":"5 min"}"#).unwrap();
        assert_eq!(eta.driver_eta.as_deref(), Some("5 min"));

        assert!(matches!(
            optional_json::<AcceptJobRequest>(br#"{"driver_eta":"#),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            optional_json::<AcceptJobRequest>(br#"{"driver_eta":5}"#),
            Err(AppError::BadRequest(_))
        ));
    }
}
