use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde_json::json;

use crate::controllers::AuthController;
use crate::dto::auth_dto::{
    AuthResponse, ChangePasswordRequest, PasswordResetConfirmRequest, PasswordResetRequest,
    SignInRequest, SignUpRequest,
};
use crate::dto::ApiResponse;
use crate::middleware::AuthenticatedUser;
use crate::models::Role;
use crate::state::AppState;
use crate::utils::errors::AppError;

const RESET_REQUESTED: &str =
    "If an account exists for this email, a password reset link has been sent.";

pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/:portal/signup", post(sign_up))
        .route("/:portal/signin", post(sign_in))
        .route("/password", put(change_password))
        .route("/password-reset", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
}

/// `customer` o `driver`; cualquier otro portal no existe
fn portal(value: &str) -> Result<Role, AppError> {
    match value {
        "customer" => Ok(Role::Customer),
        "driver" => Ok(Role::Driver),
        other => Err(AppError::NotFound(format!("Unknown portal '{}'", other))),
    }
}

async fn sign_up(
    State(state): State<AppState>,
    Path(portal_name): Path<String>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), AppError> {
    let controller = AuthController::new(&state);
    let response = controller.sign_up(portal(&portal_name)?, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(response, "Account created successfully.")),
    ))
}

async fn sign_in(
    State(state): State<AppState>,
    Path(portal_name): Path<String>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let controller = AuthController::new(&state);
    let response = controller.sign_in(portal(&portal_name)?, request).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let controller = AuthController::new(&state);
    controller.change_password(user.user_id, request).await?;
    Ok(Json(ApiResponse::message("Password updated successfully.")))
}

/// Siempre 202. El token solo viaja en la respuesta con `EXPOSE_RESET_TOKENS` activo.
async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), AppError> {
    let controller = AuthController::new(&state);
    let token = controller.request_password_reset(request).await?;

    let data = match token {
        Some(token) if state.config.expose_reset_tokens => json!({
            "reset_token": token.token,
            "expires_at": token.expires_at,
        }),
        _ => json!({}),
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success_with_message(data, RESET_REQUESTED)),
    ))
}

async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let controller = AuthController::new(&state);
    controller.confirm_password_reset(request).await?;
    Ok(Json(ApiResponse::message(
        "Your password has been reset. You can now sign in.",
    )))
}
