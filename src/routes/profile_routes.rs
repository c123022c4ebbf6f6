use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::warn;

use crate::controllers::ProfileController;
use crate::dto::profile_dto::{DriverStatusRequest, UpdateProfileRequest, UserProfileResponse};
use crate::dto::ApiResponse;
use crate::middleware::{AuthenticatedUser, DriverUser};
use crate::services::storage_service::MAX_IMAGE_SIZE;
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Margen para las cabeceras del multipart por encima del tamaño de imagen
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn create_profile_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route(
            "/image",
            post(upload_image)
                .delete(remove_image)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE + MULTIPART_OVERHEAD)),
        )
}

pub fn create_driver_router() -> Router<AppState> {
    Router::new().route("/status", put(set_driver_status))
}

async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserProfileResponse>, AppError> {
    let controller = ProfileController::new(&state);
    Ok(Json(controller.get(user.user_id).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserProfileResponse>>, AppError> {
    let controller = ProfileController::new(&state);
    let profile = controller.update(user.user_id, request).await?;
    Ok(Json(ApiResponse::success_with_message(
        profile,
        "Profile updated successfully.",
    )))
}

/// Primer campo con contenido del formulario (`image` o `file`)
async fn upload_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UserProfileResponse>>, AppError> {
    let mut data = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if matches!(field.name(), Some("image") | Some("file")) {
            data = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            break;
        }
    }
    let data = data.ok_or_else(|| {
        AppError::BadRequest("Please attach an image in the 'image' field.".to_string())
    })?;

    let controller = ProfileController::new(&state);
    let profile = controller.upload_image(user.user_id, data).await?;
    Ok(Json(ApiResponse::success_with_message(
        profile,
        "Profile image updated.",
    )))
}

async fn remove_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<UserProfileResponse>>, AppError> {
    let controller = ProfileController::new(&state);
    let profile = controller.remove_image(user.user_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        profile,
        "Profile image removed.",
    )))
}

async fn set_driver_status(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Json(request): Json<DriverStatusRequest>,
) -> Result<Json<ApiResponse<UserProfileResponse>>, AppError> {
    let controller = ProfileController::new(&state);
    let profile = controller.set_driver_status(driver.user_id, request).await?;
    Ok(Json(ApiResponse::success(profile)))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge("Images must be 15 MB or smaller.".to_string());
    }
    warn!("⚠️ Invalid multipart body: {}", err);
    AppError::BadRequest(err.body_text())
}
