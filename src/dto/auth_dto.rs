use serde::{Deserialize, Serialize};
use validator::Validate;

use super::profile_dto::UserProfileResponse;
use crate::utils::validation::{
    validate_email_format, validate_not_blank, validate_password_strength,
};

// Registro (cliente o conductor según el portal)
#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(
        length(min = 1, max = 100, message = "First name is required."),
        custom = "validate_not_blank"
    )]
    pub first_name: String,
    #[validate(
        length(min = 1, max = 100, message = "Last name is required."),
        custom = "validate_not_blank"
    )]
    pub last_name: String,
    #[validate(custom = "validate_email_format")]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub accept_terms: bool,
}

// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(custom = "validate_email_format")]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfileResponse,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required."))]
    pub current_password: String,
    #[validate(custom = "validate_password_strength")]
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(custom = "validate_email_format")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(min = 1, message = "Reset token is required."))]
    pub token: String,
    #[validate(custom = "validate_password_strength")]
    pub new_password: String,
    pub confirm_password: String,
}
