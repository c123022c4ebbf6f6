use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde_json::json;
use uuid::Uuid;

use crate::controllers::TowRequestController;
use crate::dto::tow_request_dto::{AssignmentQuery, CreateTowRequestRequest};
use crate::dto::ApiResponse;
use crate::middleware::{AuthenticatedUser, CustomerUser};
use crate::models::{TowRequest, TowStatus};
use crate::services::live_feed_service::request_watch;
use crate::services::{MatchingOutcome, MatchingState};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_tow_request_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route("/:id", get(get_request))
        .route("/:id/cancel", post(cancel_request))
        .route("/:id/assignment", get(await_assignment))
        .route("/:id/events", get(watch_request))
}

async fn create_request(
    State(state): State<AppState>,
    CustomerUser(customer): CustomerUser,
    Json(request): Json<CreateTowRequestRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TowRequest>>), AppError> {
    let controller = TowRequestController::new(&state);
    let created = controller.create(&customer, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            created,
            "Your tow request has been sent. Looking for a driver...",
        )),
    ))
}

async fn list_requests(
    State(state): State<AppState>,
    CustomerUser(customer): CustomerUser,
) -> Result<Json<Vec<TowRequest>>, AppError> {
    let controller = TowRequestController::new(&state);
    Ok(Json(controller.list_for_customer(&customer).await?))
}

async fn get_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TowRequest>, AppError> {
    let controller = TowRequestController::new(&state);
    Ok(Json(controller.get(&user, id).await?))
}

async fn cancel_request(
    State(state): State<AppState>,
    CustomerUser(customer): CustomerUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TowRequest>>, AppError> {
    let controller = TowRequestController::new(&state);
    let canceled = controller.cancel(&customer, id).await?;
    Ok(Json(ApiResponse::success_with_message(
        canceled,
        "Your tow request has been canceled.",
    )))
}

/// Long-poll del flujo de asignación; responde al asignarse un conductor,
/// al cerrarse la solicitud o al vencer la ventana
async fn await_assignment(
    State(state): State<AppState>,
    CustomerUser(customer): CustomerUser,
    Path(id): Path<Uuid>,
    Query(query): Query<AssignmentQuery>,
) -> Result<Json<MatchingOutcome>, AppError> {
    let controller = TowRequestController::new(&state);
    let outcome = controller
        .await_assignment(&customer, id, query.timeout_secs)
        .await?;
    Ok(Json(outcome))
}

async fn watch_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let controller = TowRequestController::new(&state);
    let (rx, current) = controller.watch(&user, id).await?;

    let events = request_watch(rx, current, controller.requests()).map(|snapshot| {
        if snapshot.status == TowStatus::Completed {
            Event::default().event("completed").json_data(json!({
                "message": MatchingState::Completed.message(),
                "request": snapshot,
            }))
        } else {
            Event::default().event("status").json_data(&snapshot)
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
